use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use scholar_core::config_file;
use scholar_core::generation::backend_from_config;
use scholar_core::session::PaperSession;
use scholar_core::{Actions, CapabilityInvoker, Config, MediaType, SourceDocument};
use scholar_export::ExportFormat;

mod output;

use output::ColorMode;

/// ScholarAI - summarize, critique, reformat and question research papers
#[derive(Parser, Debug)]
#[command(name = "scholar", version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone)]
struct GlobalArgs {
    /// Generation provider: gemini or openai
    #[arg(long, global = true)]
    provider: Option<String>,

    /// Model name (defaults to the provider's default model)
    #[arg(long, global = true)]
    model: Option<String>,

    /// API key for the selected provider
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the plain text of a PDF or DOCX file
    Extract {
        /// Path to a .pdf or .docx file
        input: PathBuf,

        /// Write the text to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Summarize a paper
    Summarize {
        /// Path to a .pdf, .docx or .txt file, or `-` to read pasted text from stdin
        input: PathBuf,
    },

    /// Suggest formatting improvements per section
    Suggest {
        /// Path to a .pdf, .docx or .txt file, or `-` to read pasted text from stdin
        input: PathBuf,
    },

    /// Reformat a paper to match a template
    Reformat {
        /// Path to a .pdf, .docx or .txt file, or `-` to read pasted text from stdin
        input: PathBuf,

        /// Template format: IEEE, APA, ACM or Custom
        #[arg(short, long)]
        format: String,

        /// Structural exemplar for the Custom format (.pdf, .docx or .txt)
        #[arg(long)]
        template: Option<PathBuf>,

        /// Export format: docx, html, md or txt (default: print HTML)
        #[arg(long)]
        export: Option<String>,

        /// Output path for the exported document
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Document title used in exported metadata
        #[arg(long)]
        title: Option<String>,
    },

    /// Ask questions about a paper
    Chat {
        /// Path to a .pdf, .docx or .txt file
        input: PathBuf,

        /// Ask a single question and exit (otherwise start an interactive session)
        #[arg(short, long)]
        question: Option<String>,
    },

    /// Summarize and suggest formatting at the same time
    Analyze {
        /// Path to a .pdf, .docx or .txt file, or `-` to read pasted text from stdin
        input: PathBuf,
    },

    /// Inspect or create the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Show the resolved configuration (API keys redacted)
    Show,
    /// Print the platform config file path
    Path,
    /// Write a starter config file to the platform config directory
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    let color = ColorMode(!cli.global.no_color && std::env::var_os("NO_COLOR").is_none());

    match cli.command {
        Command::Extract { input, output } => extract(&input, output.as_deref(), color),
        Command::Config { action } => config_command(action, &cli.global),
        Command::Summarize { input } => {
            let actions = build_actions(&cli.global)?;
            summarize(&actions, &input, color).await
        }
        Command::Suggest { input } => {
            let actions = build_actions(&cli.global)?;
            suggest(&actions, &input, color).await
        }
        Command::Reformat {
            input,
            format,
            template,
            export,
            output,
            title,
        } => {
            let actions = build_actions(&cli.global)?;
            reformat(
                &actions,
                &input,
                ReformatOptions {
                    format,
                    template,
                    export,
                    output,
                    title,
                },
                color,
            )
            .await
        }
        Command::Chat { input, question } => {
            let actions = build_actions(&cli.global)?;
            chat(&actions, &input, question, color).await
        }
        Command::Analyze { input } => {
            let actions = build_actions(&cli.global)?;
            analyze(&actions, &input, color).await
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Resolve configuration: CLI flags > env vars > config files > defaults.
fn resolve_config(global: &GlobalArgs) -> anyhow::Result<Config> {
    let file = config_file::load_config();
    let mut config = config_file::resolve_with_env(&file, |name| {
        let flag = match name {
            "SCHOLAR_PROVIDER" => global.provider.clone(),
            "SCHOLAR_MODEL" => global.model.clone(),
            _ => None,
        };
        flag.or_else(|| std::env::var(name).ok().filter(|v| !v.trim().is_empty()))
    })
    .map_err(anyhow::Error::msg)?;
    if let Some(ref key) = global.api_key {
        config.api_key = Some(key.clone());
    }
    Ok(config)
}

fn build_actions(global: &GlobalArgs) -> anyhow::Result<Actions> {
    let config = resolve_config(global)?;
    tracing::debug!(?config, "resolved configuration");
    let backend = backend_from_config(&config).map_err(|e| {
        anyhow::anyhow!(
            "{}. Set GEMINI_API_KEY (or OPENAI_API_KEY with --provider openai), pass --api-key, or run `scholar config init`.",
            e
        )
    })?;
    Ok(Actions::new(CapabilityInvoker::new(backend, &config)))
}

/// Read a paper: `-` is pasted text on stdin, `.txt`/`.md` are read as text,
/// anything else goes through the extractor.
fn load_text(input: &Path) -> anyhow::Result<String> {
    if input.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        return Ok(text);
    }

    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let lower = name.to_lowercase();
    if lower.ends_with(".txt") || lower.ends_with(".md") {
        return Ok(std::fs::read_to_string(input)?);
    }

    let bytes = std::fs::read(input)?;
    let doc = SourceDocument::new(MediaType::from_filename(&name), bytes).with_filename(name);
    scholar_ingest::handle_extract(&doc)
        .into_result()
        .map(|data| data.text.into_string())
        .map_err(anyhow::Error::msg)
}

fn load_session(input: &Path, color: ColorMode) -> anyhow::Result<PaperSession> {
    let text = load_text(input)?;
    let source = if input.as_os_str() == "-" {
        "stdin".to_string()
    } else {
        input.display().to_string()
    };
    output::print_extraction_notice(&mut std::io::stderr(), &source, text.chars().count(), color)?;
    Ok(PaperSession::with_text(text))
}

fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

fn fail(message: &str, color: ColorMode) -> anyhow::Result<()> {
    output::print_error(&mut std::io::stderr(), message, color)?;
    std::process::exit(1);
}

fn extract(input: &Path, output: Option<&Path>, color: ColorMode) -> anyhow::Result<()> {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let bytes = std::fs::read(input)?;
    let doc = SourceDocument::new(MediaType::from_filename(&name), bytes).with_filename(name);

    let result = scholar_ingest::handle_extract(&doc);
    let text = match result.into_result() {
        Ok(data) => data.text,
        Err(message) => return fail(&message, color),
    };

    match output {
        Some(path) => {
            std::fs::write(path, text.as_str())?;
            output::print_extraction_notice(
                &mut std::io::stderr(),
                &input.display().to_string(),
                text.char_count(),
                color,
            )?;
        }
        None => {
            let mut stdout = std::io::stdout();
            writeln!(stdout, "{}", text)?;
        }
    }
    Ok(())
}

async fn summarize(actions: &Actions, input: &Path, color: ColorMode) -> anyhow::Result<()> {
    let mut session = load_session(input, color)?;
    let bar = spinner("Summarizing...");
    let result = actions.handle_summarize(session.text()).await;
    bar.finish_and_clear();

    session.apply_summary(result);
    if let Some(error) = session.last_error() {
        return fail(error, color);
    }
    output::print_summary(&mut std::io::stdout(), session.summary().unwrap_or(""), color)?;
    Ok(())
}

async fn suggest(actions: &Actions, input: &Path, color: ColorMode) -> anyhow::Result<()> {
    let mut session = load_session(input, color)?;
    let bar = spinner("Getting formatting suggestions...");
    let result = actions.handle_suggest_formatting(session.text()).await;
    bar.finish_and_clear();

    session.apply_suggestions(result);
    if let Some(error) = session.last_error() {
        return fail(error, color);
    }
    // Print every suggestion expanded.
    for i in 0..session.suggestions.suggestions().len() {
        if !session.suggestions.is_open(i) {
            session.suggestions.toggle(i);
        }
    }
    output::print_suggestions(&mut std::io::stdout(), &session.suggestions, color)?;
    Ok(())
}

struct ReformatOptions {
    format: String,
    template: Option<PathBuf>,
    export: Option<String>,
    output: Option<PathBuf>,
    title: Option<String>,
}

async fn reformat(
    actions: &Actions,
    input: &Path,
    opts: ReformatOptions,
    color: ColorMode,
) -> anyhow::Result<()> {
    let mut session = load_session(input, color)?;
    let exemplar = match opts.template {
        Some(ref path) => Some(load_text(path)?),
        None => None,
    };

    // Export format: explicit flag, else the output file's extension.
    let export = match (&opts.export, &opts.output) {
        (Some(fmt), _) => Some(fmt.parse::<ExportFormat>().map_err(anyhow::Error::msg)?),
        (None, Some(path)) => Some(
            path.extension()
                .and_then(|e| e.to_str())
                .unwrap_or("")
                .parse::<ExportFormat>()
                .map_err(anyhow::Error::msg)?,
        ),
        (None, None) => None,
    };

    let bar = spinner(&format!("Reformatting to {}...", opts.format));
    let result = actions
        .handle_reformat(session.text(), Some(&opts.format), exemplar.as_deref())
        .await;
    bar.finish_and_clear();

    session.apply_reformat(result);
    if let Some(error) = session.last_error() {
        return fail(error, color);
    }
    let Some(reformatted) = session.reformatted() else {
        return fail("no reformatted content", color);
    };

    match export {
        None => {
            writeln!(std::io::stdout(), "{}", reformatted)?;
        }
        Some(format) => {
            let stem = input
                .file_stem()
                .map(|s| format!("{}-{}", s.to_string_lossy(), opts.format.to_lowercase()))
                .unwrap_or_default();
            let title = opts.title.clone().unwrap_or_else(|| stem.clone());
            let path = opts
                .output
                .clone()
                .unwrap_or_else(|| PathBuf::from(format.file_name(&stem)));
            scholar_export::export_to_path(reformatted, &title, format, &path)?;
            writeln!(std::io::stderr(), "Wrote {}", path.display())?;
        }
    }
    Ok(())
}

async fn chat(
    actions: &Actions,
    input: &Path,
    question: Option<String>,
    color: ColorMode,
) -> anyhow::Result<()> {
    let mut session = load_session(input, color)?;
    let mut stdout = std::io::stdout();

    if let Some(question) = question {
        let result = actions.handle_chat(session.text(), &question).await;
        if let Some(error) = result.error() {
            return fail(error, color);
        }
        session.push_question(question);
        session.apply_answer(result);
        if let Some(answer) = session.chat_history().last() {
            writeln!(stdout, "{}", answer.text)?;
        }
        return Ok(());
    }

    writeln!(
        stdout,
        "Ask questions about the paper. Empty line or `exit` to quit."
    )?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() || question == "exit" || question == "quit" {
            break;
        }

        session.push_question(question);
        let bar = spinner("Thinking...");
        let result = actions.handle_chat(session.text(), question).await;
        bar.finish_and_clear();
        session.apply_answer(result);
        if let Some(answer) = session.chat_history().last() {
            output::print_chat_message(&mut stdout, answer, color)?;
        }
    }
    Ok(())
}

async fn analyze(actions: &Actions, input: &Path, color: ColorMode) -> anyhow::Result<()> {
    let mut session = load_session(input, color)?;
    let snapshot = session.snapshot();

    let bar = spinner("Analyzing...");
    let (summary, suggestions) = tokio::join!(
        actions.handle_summarize(snapshot.as_str()),
        actions.handle_suggest_formatting(snapshot.as_str())
    );
    bar.finish_and_clear();

    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let mut failed = false;

    session.apply_summary(summary);
    match session.last_error() {
        Some(error) => {
            output::print_error(&mut stderr, error, color)?;
            failed = true;
        }
        None => output::print_summary(&mut stdout, session.summary().unwrap_or(""), color)?,
    }

    session.apply_suggestions(suggestions);
    match session.last_error() {
        Some(error) => {
            output::print_error(&mut stderr, error, color)?;
            failed = true;
        }
        None => output::print_suggestions(&mut stdout, &session.suggestions, color)?,
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

fn config_command(action: ConfigAction, global: &GlobalArgs) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout();
    match action {
        ConfigAction::Show => {
            let config = resolve_config(global)?;
            writeln!(stdout, "{:#?}", config)?;
        }
        ConfigAction::Path => match config_file::config_path() {
            Some(path) => writeln!(stdout, "{}", path.display())?,
            None => anyhow::bail!("Could not determine config directory"),
        },
        ConfigAction::Init { force } => {
            if let Some(path) = config_file::config_path()
                && path.exists()
                && !force
            {
                anyhow::bail!(
                    "Config already exists at {} (use --force to overwrite)",
                    path.display()
                );
            }
            let path =
                config_file::save_config(&config_file::starter_config()).map_err(anyhow::Error::msg)?;
            writeln!(stdout, "Wrote {}", path.display())?;
            writeln!(
                stdout,
                "Add your key under [api_keys] or set GEMINI_API_KEY in the environment."
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_reformat() {
        let cli = Cli::try_parse_from([
            "scholar",
            "--no-color",
            "reformat",
            "paper.pdf",
            "--format",
            "Custom",
            "--template",
            "exemplar.docx",
            "--export",
            "docx",
        ])
        .unwrap();
        assert!(cli.global.no_color);
        match cli.command {
            Command::Reformat {
                format,
                template,
                export,
                ..
            } => {
                assert_eq!(format, "Custom");
                assert_eq!(template, Some(PathBuf::from("exemplar.docx")));
                assert_eq!(export.as_deref(), Some("docx"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "scholar", "chat", "p.pdf", "-q", "Why?", "--provider", "openai", "-vv",
        ])
        .unwrap();
        assert_eq!(cli.global.provider.as_deref(), Some("openai"));
        assert_eq!(cli.global.verbose, 2);
    }

    #[test]
    fn text_files_are_read_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paper.txt");
        std::fs::write(&path, "Hello world. This is a test paper about X.").unwrap();
        assert_eq!(
            load_text(&path).unwrap(),
            "Hello world. This is a test paper about X."
        );
    }

    #[test]
    fn unsupported_files_name_allowed_types() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paper.rtf");
        std::fs::write(&path, "{\\rtf1}").unwrap();
        let err = load_text(&path).unwrap_err().to_string();
        assert!(err.contains("PDF") && err.contains("DOCX"));
    }
}
