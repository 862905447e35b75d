use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, bail};
use chrono::Utc;

use crate::error::ExtractionError;
use crate::util::sha256_bytes;

/// One uploaded document, held as opaque bytes.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SourceDocument {
    pub fn read(path: &Path) -> Result<Self, ExtractionError> {
        let bytes = fs::read(path).map_err(|error| {
            ExtractionError::Unreadable(format!("failed to read {}: {error}", path.display()))
        })?;
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self { name, bytes })
    }

    #[cfg(test)]
    pub fn from_text(name: &str, text: &str) -> Self {
        Self {
            name: name.to_string(),
            bytes: text.as_bytes().to_vec(),
        }
    }

    pub fn sha256(&self) -> String {
        sha256_bytes(&self.bytes)
    }

    fn is_pdf(&self) -> bool {
        self.bytes.starts_with(b"%PDF-")
    }
}

/// Turns a document into the single text blob the field rules run against.
#[derive(Debug, Clone)]
pub struct TextExtractor {
    pdftotext_bin: String,
}

impl TextExtractor {
    pub fn new(pdftotext_bin: impl Into<String>) -> Self {
        Self {
            pdftotext_bin: pdftotext_bin.into(),
        }
    }

    pub fn extract_text(&self, document: &SourceDocument) -> Result<String, ExtractionError> {
        let pages = if document.is_pdf() {
            self.extract_pdf_pages(document)
                .map_err(|error| ExtractionError::Unreadable(format!("{error:#}")))?
        } else {
            let raw = std::str::from_utf8(&document.bytes).map_err(|error| {
                ExtractionError::Unreadable(format!("text document is not UTF-8: {error}"))
            })?;
            split_form_feed_pages(raw)
        };

        Ok(flatten_pages(&pages))
    }

    fn extract_pdf_pages(&self, document: &SourceDocument) -> Result<Vec<String>> {
        let safe_stem = document
            .name
            .chars()
            .map(|character| {
                if character.is_ascii_alphanumeric() {
                    character
                } else {
                    '_'
                }
            })
            .collect::<String>();
        let stamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let staged_path = std::env::temp_dir().join(format!(
            "petct_{}_{}_{}.pdf",
            safe_stem,
            std::process::id(),
            stamp
        ));

        fs::write(&staged_path, &document.bytes)
            .with_context(|| format!("failed to stage {}", staged_path.display()))?;

        let output = Command::new(&self.pdftotext_bin)
            .arg("-enc")
            .arg("UTF-8")
            .arg(&staged_path)
            .arg("-")
            .output();

        let _ = fs::remove_file(&staged_path);

        let output = output.with_context(|| {
            format!(
                "failed to execute {} for {}",
                self.pdftotext_bin, document.name
            )
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "{} returned non-zero exit status for {}: {}",
                self.pdftotext_bin,
                document.name,
                stderr.trim()
            );
        }

        Ok(split_form_feed_pages(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Ordered concatenation of page texts, with nothing inserted between pages.
///
/// A value printed across a page break is not stitched back together.
pub fn flatten_pages<S: AsRef<str>>(pages: &[S]) -> String {
    let mut text = String::new();
    for page in pages {
        text.push_str(page.as_ref());
    }
    text
}

pub(super) fn split_form_feed_pages(raw: &str) -> Vec<String> {
    let mut pages: Vec<String> = raw
        .split('\u{000C}')
        .map(|chunk| chunk.replace('\u{0000}', ""))
        .collect();

    while let Some(last_page) = pages.last() {
        if last_page.trim().is_empty() {
            pages.pop();
            continue;
        }
        break;
    }

    pages
}
