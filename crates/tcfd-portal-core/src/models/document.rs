use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentFormat {
    Pdf,
    Word,
}

impl DocumentFormat {
    /// Path segment of the download endpoint (`/api/download/{pdf,word}`).
    pub fn endpoint(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Word => "word",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Word => "docx",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "PDF",
            DocumentFormat::Word => "Word",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadRequest {
    pub company_name: String,
    pub draft: String,
    pub polished: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DownloadedDocument {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl DownloadedDocument {
    /// Name used when the service sends no usable `Content-Disposition`.
    pub fn fallback_filename(company_name: &str, format: DocumentFormat) -> String {
        let company = sanitize_filename(company_name.trim());
        let company = if company.is_empty() { "company".to_string() } else { company };
        format!("{}_TCFD_report.{}", company, format.extension())
    }

    /// Write the document into `dir`, never overwriting an existing file.
    pub fn save_to(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create download directory {}", dir.display()))?;

        let name = sanitize_filename(&self.filename);
        if name.is_empty() {
            bail!("Document has no usable file name: {:?}", self.filename);
        }
        let (stem, ext) = match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem.to_string(), format!(".{}", ext)),
            _ => (name.clone(), String::new()),
        };

        let mut path = dir.join(&name);
        let mut counter = 1;
        while path.exists() {
            path = dir.join(format!("{} ({}){}", stem, counter, ext));
            counter += 1;
        }

        std::fs::write(&path, &self.bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }
}

/// Extract the filename from a `Content-Disposition` header, already
/// sanitized for the download directory. Names with nothing left after
/// sanitizing (`..`, `reports/`) count as missing.
///
/// RFC 5987 `filename*=UTF-8''...` wins over a plain `filename=`.
pub fn filename_from_content_disposition(header: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;

    for part in header.split(';').map(str::trim) {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                let value = value.trim().trim_matches('"');
                // charset'language'encoded-value
                let encoded = value.splitn(3, '\'').nth(2).unwrap_or(value);
                extended = percent_decode(encoded);
            }
            "filename" => {
                plain = Some(value.trim().trim_matches('"').to_string());
            }
            _ => {}
        }
    }

    extended
        .or(plain)
        .map(|name| sanitize_filename(&name))
        .filter(|name| !name.is_empty())
}

fn percent_decode(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = input.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

/// Strip path separators and control characters so a server-supplied name
/// can't escape the download directory.
fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    base.chars()
        .filter(|c| !c.is_control())
        .map(|c| if matches!(c, ':' | '*' | '?' | '"' | '<' | '>' | '|') { '_' } else { c })
        .collect::<String>()
        .trim()
        .trim_start_matches('.')
        .to_string()
}
