//! HTTP client for the layout service.

use std::path::Path;
use std::time::Duration;

use reqwest::multipart;
use tracing::{debug, instrument};

use crate::error::AppError;

use super::parse::{ParsedDocument, parse_layout_json};

/// Layout parsing can take a while on large scanned contracts.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

pub struct LayoutClient {
    http: reqwest::Client,
    api_url: String,
}

impl LayoutClient {
    pub fn new(api_url: &str) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::Layout(format!("http client init failed: {e}")))?;
        Ok(Self {
            http,
            api_url: api_url.to_string(),
        })
    }

    /// Upload a PDF and return both the parsed document and the raw response
    /// body. The raw body is kept so the caller can write a sidecar file and
    /// re-run loading without another upload.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn parse_pdf(&self, path: &Path) -> Result<(ParsedDocument, String), AppError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| AppError::Layout(format!("bad file name: {}", path.display())))?
            .to_string();
        let doc_name = document_name(path)
            .ok_or_else(|| AppError::Layout(format!("bad file name: {}", path.display())))?;

        let bytes = tokio::fs::read(path).await?;
        debug!(size = bytes.len(), "uploading pdf to layout service");

        let part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/pdf")
            .map_err(|e| AppError::Layout(format!("multipart build failed: {e}")))?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .http
            .post(&self.api_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::Layout(format!("layout request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Layout(format!("layout response read failed: {e}")))?;
        if !status.is_success() {
            return Err(AppError::Layout(format!(
                "layout service returned {status}: {}",
                truncate(&body, 300)
            )));
        }

        let parsed = parse_layout_json(&doc_name, &body)?;
        debug!(
            sections = parsed.sections.len(),
            chunks = parsed.chunks.len(),
            tables = parsed.tables.len(),
            "layout parsed"
        );
        Ok((parsed, body))
    }
}

/// Document names drop the `.pdf` extension; the name feeds every composite
/// key and the report `Document` column.
fn document_name(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_name_strips_the_extension() {
        assert_eq!(
            document_name(Path::new("newdata/contrato.pdf")).as_deref(),
            Some("contrato")
        );
        assert_eq!(
            document_name(Path::new("anexo.firmado.pdf")).as_deref(),
            Some("anexo.firmado")
        );
        assert_eq!(document_name(Path::new("sinextension")).as_deref(), Some("sinextension"));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("abcdef", 3), "abc");
        assert_eq!(truncate("ab", 3), "ab");
        assert_eq!(truncate("ññññ", 2), "ññ");
    }
}
