use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

const DOCUMENT_EXTENSIONS: [&str; 2] = ["pdf", "txt"];

/// Expands the command-line inputs into the ordered list of documents to
/// ingest. Directories contribute their `.pdf`/`.txt` files, sorted by path.
/// Explicit file paths are kept as given, even when they do not exist, so the
/// batch reports them instead of aborting.
pub fn discover_documents(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut documents = Vec::new();

    for input in inputs {
        if input.is_dir() {
            let mut found = discover_in_directory(input)?;
            found.sort();
            debug!(directory = %input.display(), documents = found.len(), "scanned directory");
            if found.is_empty() {
                warn!(directory = %input.display(), "directory holds no intake documents");
            }
            documents.extend(found);
        } else {
            documents.push(input.clone());
        }
    }

    Ok(documents)
}

fn discover_in_directory(directory: &Path) -> Result<Vec<PathBuf>> {
    let mut documents = Vec::new();

    let entries = fs::read_dir(directory)
        .with_context(|| format!("failed to read {}", directory.display()))?;

    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", directory.display()))?;
        let path = entry.path();

        if !entry
            .file_type()
            .with_context(|| format!("failed to inspect file type: {}", path.display()))?
            .is_file()
        {
            continue;
        }

        let is_document = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                DOCUMENT_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            })
            .unwrap_or(false);

        if is_document {
            documents.push(path);
        }
    }

    Ok(documents)
}
