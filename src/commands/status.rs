use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::{StatusArgs, resolve_db_path};
use crate::model::IngestRunSummary;
use crate::store::ExamStore;

pub fn run(args: StatusArgs) -> Result<()> {
    let manifest_dir = args.cache_root.join("manifests");
    let db_path = resolve_db_path(&args.cache_root, args.db_path.as_ref());

    info!(cache_root = %args.cache_root.display(), "status requested");

    if db_path.exists() {
        let store = ExamStore::open(&db_path)?;
        let records = store.count_records()?;
        let schema_version = store.metadata_value("db_schema_version")?;
        let updated_at = store.metadata_value("db_updated_at")?;

        info!(
            path = %db_path.display(),
            schema_version = %schema_version.unwrap_or_default(),
            updated_at = %updated_at.unwrap_or_default(),
            records,
            "database status"
        );
    } else {
        warn!(path = %db_path.display(), "database file missing");
    }

    match latest_ingest_manifest(&manifest_dir)? {
        Some(path) => {
            let raw = fs::read(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let summary: IngestRunSummary = serde_json::from_slice(&raw)
                .with_context(|| format!("failed to parse {}", path.display()))?;

            info!(
                path = %path.display(),
                run_id = %summary.run_id,
                status = %summary.status,
                updated_at = %summary.updated_at,
                documents = summary.counts.document_count,
                stored = summary.counts.stored_count,
                duplicates = summary.counts.duplicate_count,
                extraction_errors = summary.counts.extraction_error_count,
                persist_errors = summary.counts.persist_error_count,
                field_warnings = summary.counts.field_warning_count,
                "loaded latest ingest manifest"
            );
        }
        None => warn!(path = %manifest_dir.display(), "no ingest manifests found"),
    }

    Ok(())
}

/// Manifest names embed a compact UTC timestamp, so the greatest name is the newest run.
fn latest_ingest_manifest(manifest_dir: &Path) -> Result<Option<PathBuf>> {
    if !manifest_dir.is_dir() {
        return Ok(None);
    }

    let mut latest: Option<PathBuf> = None;
    let entries = fs::read_dir(manifest_dir)
        .with_context(|| format!("failed to read {}", manifest_dir.display()))?;
    for entry in entries {
        let path = entry
            .with_context(|| format!("failed to read entry in {}", manifest_dir.display()))?
            .path();
        let is_manifest = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with("ingest_run_") && name.ends_with(".json"))
            .unwrap_or(false);
        if is_manifest && latest.as_ref().is_none_or(|current| path > *current) {
            latest = Some(path);
        }
    }

    Ok(latest)
}
