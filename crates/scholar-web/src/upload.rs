use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use scholar_core::{MediaType, SourceDocument};

/// Why an upload could not be read. Messages never carry the parser error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadError {
    TooLarge { limit_bytes: usize },
    Unreadable,
    NoFile,
}

impl UploadError {
    fn from_multipart(e: MultipartError, limit_bytes: usize) -> Self {
        tracing::warn!(status = %e.status(), error = %e, "failed to read upload");
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            UploadError::TooLarge { limit_bytes }
        } else {
            UploadError::Unreadable
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            UploadError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            UploadError::Unreadable | UploadError::NoFile => StatusCode::BAD_REQUEST,
        }
    }

    pub fn message(&self) -> String {
        match self {
            UploadError::TooLarge { limit_bytes } => {
                format!("File is too large (limit {}).", size_label(*limit_bytes))
            }
            UploadError::Unreadable => "Could not read the uploaded form.".to_string(),
            UploadError::NoFile => "No file uploaded.".to_string(),
        }
    }
}

fn size_label(bytes: usize) -> String {
    const MB: usize = 1024 * 1024;
    if bytes >= MB {
        format!("{} MB", bytes / MB)
    } else {
        format!("{} bytes", bytes)
    }
}

/// An uploaded file with its data and declared metadata.
pub struct UploadedFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl UploadedFile {
    /// Build the document to extract. The declared content type decides the
    /// media type; the filename is only consulted when none was sent.
    pub fn into_document(self) -> SourceDocument {
        let media_type = match self.content_type.as_deref().map(str::trim) {
            Some(mime) if !mime.is_empty() => MediaType::from_mime(mime),
            _ => MediaType::from_filename(&self.filename),
        };
        SourceDocument::new(media_type, self.data).with_filename(self.filename)
    }
}

/// Read the `file` field from a multipart upload. `limit_bytes` is only
/// reported back when the body limit trips.
pub async fn parse_multipart(
    mut multipart: Multipart,
    limit_bytes: usize,
) -> Result<UploadedFile, UploadError> {
    let mut file: Option<UploadedFile> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadError::from_multipart(e, limit_bytes))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(|s| s.to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| UploadError::from_multipart(e, limit_bytes))?
                    .to_vec();

                file = Some(UploadedFile {
                    filename,
                    content_type,
                    data,
                });
            }
            _ => {
                // Ignore unknown fields
                let _ = field.bytes().await;
            }
        }
    }

    file.ok_or(UploadError::NoFile)
}
