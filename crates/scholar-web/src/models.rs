use serde::Deserialize;

// ── Request bodies (camelCase, as the browser client sends them) ────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaperRequest {
    #[serde(default)]
    pub paper_text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReformatRequest {
    #[serde(default)]
    pub paper_text: String,
    pub template_format: Option<String>,
    pub custom_template_content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub paper_text: String,
    #[serde(default)]
    pub question: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    #[serde(default)]
    pub reformatted_content: String,
    #[serde(default = "default_export_format")]
    pub format: String,
    #[serde(default)]
    pub title: String,
}

fn default_export_format() -> String {
    "docx".to_string()
}
