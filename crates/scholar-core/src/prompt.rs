//! Prompt Request Builder.
//!
//! Turns a capability's typed input into a [`PromptRequest`]: a fixed
//! instruction template, the fields to interpolate into it, and the output
//! schema the invoker validates the response against. Nothing here performs
//! I/O.

use serde_json::{Value, json};

use crate::{Capability, ExtractedText, TemplateSpec};

/// Shape of one field in a capability's expected output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A string.
    Text,
    /// An ordered list of `{sectionName, suggestion}` objects.
    SuggestionList,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub description: &'static str,
}

/// Declared output shape of a capability.
#[derive(Debug)]
pub struct OutputSchema {
    pub fields: &'static [FieldSpec],
}

impl OutputSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// JSON Schema (draft 2020-12 subset) as accepted by OpenAI-style APIs.
    pub fn to_json_schema(&self) -> Value {
        self.render(false)
    }

    /// Gemini `responseSchema` (OpenAPI subset with uppercase type names).
    pub fn to_gemini_schema(&self) -> Value {
        self.render(true)
    }

    fn render(&self, upper: bool) -> Value {
        let ty = |t: &str| {
            if upper {
                Value::String(t.to_uppercase())
            } else {
                Value::String(t.to_string())
            }
        };

        let mut properties = serde_json::Map::new();
        for field in self.fields {
            let prop = match field.kind {
                FieldKind::Text => json!({
                    "type": ty("string"),
                    "description": field.description,
                }),
                FieldKind::SuggestionList => json!({
                    "type": ty("array"),
                    "description": field.description,
                    "items": {
                        "type": ty("object"),
                        "properties": {
                            "sectionName": { "type": ty("string") },
                            "suggestion": { "type": ty("string") },
                        },
                        "required": ["sectionName", "suggestion"],
                    },
                }),
            };
            properties.insert(field.name.to_string(), prop);
        }

        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name)
            .collect();

        json!({
            "type": ty("object"),
            "properties": properties,
            "required": required,
        })
    }
}

pub static SUMMARY_SCHEMA: OutputSchema = OutputSchema {
    fields: &[FieldSpec {
        name: "summary",
        kind: FieldKind::Text,
        required: true,
        description: "A concise summary of the research paper.",
    }],
};

pub static SUGGESTIONS_SCHEMA: OutputSchema = OutputSchema {
    fields: &[FieldSpec {
        name: "suggestions",
        kind: FieldKind::SuggestionList,
        required: false,
        description: "Formatting suggestions, one per identified section, in paper order.",
    }],
};

pub static REFORMAT_SCHEMA: OutputSchema = OutputSchema {
    fields: &[FieldSpec {
        name: "reformattedContent",
        kind: FieldKind::Text,
        required: true,
        description: "The reformatted paper content as an HTML string, using only <h1>, <h2>, <h3>, <p>, <ul>, <li>.",
    }],
};

pub static CHAT_SCHEMA: OutputSchema = OutputSchema {
    fields: &[FieldSpec {
        name: "answer",
        kind: FieldKind::Text,
        required: true,
        description: "The contextual answer to the user question.",
    }],
};

const SUMMARIZE_TEMPLATE: &str = "Summarize the following research paper. Focus on the key findings and main points.

{{paperText}}";

const SUGGEST_FORMATTING_TEMPLATE: &str = "You are an AI assistant specialized in providing formatting suggestions for research papers.

Analyze the following research paper content. Based on the content, identify common academic sections (like Introduction, Methodology, Results, Discussion, Conclusion, Abstract, References, etc.).

For each identified section, provide a brief suggestion for its content or structure.

Return your suggestions as a JSON object with a \"suggestions\" array, in the order the sections appear in the paper. Each entry has a \"sectionName\" (the lowercase section name, e.g. \"introduction\", \"methodology\") and a \"suggestion\" (the suggested content or structure for that section).

Example Output:
{
  \"suggestions\": [
    {\"sectionName\": \"abstract\", \"suggestion\": \"A concise summary of the paper's objectives, methods, key findings, and conclusions.\"},
    {\"sectionName\": \"introduction\", \"suggestion\": \"Provide background information, state the problem, and outline the paper's objectives and scope.\"}
  ]
}

If a section is not applicable or cannot be determined from the content, leave it out. If no section can be identified, return an empty \"suggestions\" array.

Research Paper Content:
{{paperText}}";

const REFORMAT_TEMPLATE: &str = "You are a meticulous, AI-powered typesetter. Your sole purpose is to reformat a given research paper's text to perfectly match the structure and style of a provided template. You must NOT alter the original wording, only the formatting.

**Instructions:**

1.  **Analyze the Template:**
    - If a 'Custom Template Content' is provided, analyze its structure, heading levels (h1, h2, etc.), paragraph breaks, and overall flow. This is your primary guide.
    - If a standard format (IEEE, APA, ACM) is given, replicate the typical structure for that format (e.g., Title, Abstract, Introduction, etc.).

2.  **Reformat the Paper Content:**
    - Take the 'Original Paper Content' and meticulously place it into the structure derived from the template.
    - Match heading levels exactly. If the template uses <h1> for the title and <h2> for sections, do the same.
    - Preserve all original text, equations, and data from the user's paper. Do not summarize, rephrase, or omit any content.

3.  **Output Format:**
    - Generate a **single, clean HTML string** in the \"reformattedContent\" field.
    - Use only basic semantic HTML tags: <h1>, <h2>, <h3>, <p>, <ul>, <li>.
    - **Do NOT include** `<html>`, `<head>`, `<body>`, `<style>`, or any CSS attributes (`style=\"...\"`). The output must be pure structural HTML.

**Template to Emulate:**
Template Format: {{templateFormat}}
{{#if customTemplateContent}}Custom Template Content for Structural Reference:
---
{{customTemplateContent}}
---
{{/if}}
**Content to Reformat:**
Original Paper Content:
---
{{paperText}}
---
";

const CHAT_TEMPLATE: &str = "You are a chatbot that answers questions about a research paper.

Here is the content of the research paper:
{{paperText}}

Now, answer the following question based on the content of the paper:
{{question}}
";

/// Typed input for each capability.
#[derive(Debug, Clone, Copy)]
pub enum CapabilityInput<'a> {
    Summarize {
        paper_text: &'a ExtractedText,
    },
    SuggestFormatting {
        paper_text: &'a ExtractedText,
    },
    Reformat {
        paper_text: &'a ExtractedText,
        template: &'a TemplateSpec,
    },
    Chat {
        paper_text: &'a ExtractedText,
        question: &'a str,
    },
}

impl CapabilityInput<'_> {
    pub fn capability(&self) -> Capability {
        match self {
            CapabilityInput::Summarize { .. } => Capability::Summarize,
            CapabilityInput::SuggestFormatting { .. } => Capability::SuggestFormatting,
            CapabilityInput::Reformat { .. } => Capability::Reformat,
            CapabilityInput::Chat { .. } => Capability::Chat,
        }
    }
}

/// A fully built request for the generation service.
#[derive(Debug, Clone)]
pub struct PromptRequest {
    capability: Capability,
    template: &'static str,
    fields: Vec<(&'static str, String)>,
    schema: &'static OutputSchema,
}

impl PromptRequest {
    pub fn capability(&self) -> Capability {
        self.capability
    }

    /// The fixed instruction template, before interpolation.
    pub fn template(&self) -> &'static str {
        self.template
    }

    pub fn fields(&self) -> &[(&'static str, String)] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn schema(&self) -> &'static OutputSchema {
        self.schema
    }

    /// The instruction text with all fields interpolated.
    pub fn render(&self) -> String {
        render(self.template, &self.fields)
    }
}

/// Build the request for a capability input.
pub fn build(input: CapabilityInput<'_>) -> PromptRequest {
    match input {
        CapabilityInput::Summarize { paper_text } => PromptRequest {
            capability: Capability::Summarize,
            template: SUMMARIZE_TEMPLATE,
            fields: vec![("paperText", paper_text.as_str().to_string())],
            schema: &SUMMARY_SCHEMA,
        },
        CapabilityInput::SuggestFormatting { paper_text } => PromptRequest {
            capability: Capability::SuggestFormatting,
            template: SUGGEST_FORMATTING_TEMPLATE,
            fields: vec![("paperText", paper_text.as_str().to_string())],
            schema: &SUGGESTIONS_SCHEMA,
        },
        CapabilityInput::Reformat {
            paper_text,
            template,
        } => {
            let mut fields = vec![
                ("paperText", paper_text.as_str().to_string()),
                ("templateFormat", template.format().to_string()),
            ];
            if let Some(exemplar) = template.exemplar() {
                fields.push(("customTemplateContent", exemplar.as_str().to_string()));
            }
            PromptRequest {
                capability: Capability::Reformat,
                template: REFORMAT_TEMPLATE,
                fields,
                schema: &REFORMAT_SCHEMA,
            }
        }
        CapabilityInput::Chat {
            paper_text,
            question,
        } => PromptRequest {
            capability: Capability::Chat,
            template: CHAT_TEMPLATE,
            fields: vec![
                ("paperText", paper_text.as_str().to_string()),
                ("question", question.to_string()),
            ],
            schema: &CHAT_SCHEMA,
        },
    }
}

pub fn summarize(paper_text: &ExtractedText) -> PromptRequest {
    build(CapabilityInput::Summarize { paper_text })
}

pub fn suggest_formatting(paper_text: &ExtractedText) -> PromptRequest {
    build(CapabilityInput::SuggestFormatting { paper_text })
}

pub fn reformat(paper_text: &ExtractedText, template: &TemplateSpec) -> PromptRequest {
    build(CapabilityInput::Reformat {
        paper_text,
        template,
    })
}

pub fn chat(paper_text: &ExtractedText, question: &str) -> PromptRequest {
    build(CapabilityInput::Chat {
        paper_text,
        question,
    })
}

fn lookup<'a>(fields: &'a [(&'static str, String)], name: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.as_str())
}

/// Render a template: `{{#if name}}…{{/if}}` sections are kept only when
/// `name` is present and non-blank, then `{{name}}` placeholders are replaced.
///
/// Only the template is scanned; interpolated values are copied verbatim.
pub fn render(template: &str, fields: &[(&'static str, String)]) -> String {
    let resolved = resolve_conditionals(template, fields);

    let extra: usize = fields.iter().map(|(_, v)| v.len()).sum();
    let mut out = String::with_capacity(resolved.len() + extra);
    let mut rest = resolved.as_str();
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let name = after[..end].trim();
                if let Some(value) = lookup(fields, name) {
                    out.push_str(value);
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn resolve_conditionals(template: &str, fields: &[(&'static str, String)]) -> String {
    const OPEN: &str = "{{#if ";
    const CLOSE: &str = "{{/if}}";

    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + OPEN.len()..];
        let Some(name_end) = after_open.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };
        let name = after_open[..name_end].trim();
        let body_and_rest = &after_open[name_end + 2..];
        let Some(body_end) = body_and_rest.find(CLOSE) else {
            out.push_str(&rest[start..]);
            return out;
        };
        let keep = lookup(fields, name).is_some_and(|v| !v.trim().is_empty());
        if keep {
            out.push_str(&body_and_rest[..body_end]);
        }
        rest = &body_and_rest[body_end + CLOSE.len()..];
    }
    out.push_str(rest);
    out
}
