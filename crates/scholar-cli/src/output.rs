use std::io::Write;

use owo_colors::OwoColorize;
use scholar_core::session::{ChatMessage, ChatRole, SuggestionPanel};

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

/// Print a section heading such as "Summary".
pub fn print_heading(w: &mut dyn Write, title: &str, color: ColorMode) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(w, "{}", title.bold().cyan())
    } else {
        writeln!(w, "{}", title)?;
        writeln!(w, "{}", "=".repeat(title.chars().count()))
    }
}

pub fn print_summary(w: &mut dyn Write, summary: &str, color: ColorMode) -> std::io::Result<()> {
    print_heading(w, "Summary", color)?;
    writeln!(w, "{}", summary.trim())?;
    writeln!(w)?;
    Ok(())
}

/// Print formatting suggestions. Collapsed items show only their name.
pub fn print_suggestions(
    w: &mut dyn Write,
    panel: &SuggestionPanel,
    color: ColorMode,
) -> std::io::Result<()> {
    print_heading(w, "Formatting Suggestions", color)?;
    if panel.is_empty() {
        if color.enabled() {
            writeln!(w, "{}", "No specific suggestions found.".dimmed())?;
        } else {
            writeln!(w, "No specific suggestions found.")?;
        }
        writeln!(w)?;
        return Ok(());
    }

    for (i, (name, suggestion, open)) in panel.items().enumerate() {
        let marker = if open { "▾" } else { "▸" };
        if color.enabled() {
            writeln!(w, "{} {}", marker.dimmed(), format!("{}. {}", i + 1, name).bold())?;
        } else {
            writeln!(w, "{} {}. {}", marker, i + 1, name)?;
        }
        if open {
            writeln!(w, "    {}", suggestion)?;
        }
    }
    writeln!(w)?;
    Ok(())
}

pub fn print_chat_message(
    w: &mut dyn Write,
    message: &ChatMessage,
    color: ColorMode,
) -> std::io::Result<()> {
    let label = match message.role {
        ChatRole::User => "You",
        ChatRole::Ai => "AI",
    };
    if color.enabled() {
        match message.role {
            ChatRole::User => writeln!(w, "{} {}", format!("{}:", label).bold().green(), message.text),
            ChatRole::Ai => writeln!(w, "{} {}", format!("{}:", label).bold().magenta(), message.text),
        }
    } else {
        writeln!(w, "{}: {}", label, message.text)
    }
}

/// Print a short notice about extracted input.
pub fn print_extraction_notice(
    w: &mut dyn Write,
    source: &str,
    chars: usize,
    color: ColorMode,
) -> std::io::Result<()> {
    let line = format!("Read {} characters from {}", chars, source);
    if color.enabled() {
        writeln!(w, "{}", line.dimmed())
    } else {
        writeln!(w, "{}", line)
    }
}

pub fn print_error(w: &mut dyn Write, message: &str, color: ColorMode) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(w, "{} {}", "error:".bold().red(), message)
    } else {
        writeln!(w, "error: {}", message)
    }
}
