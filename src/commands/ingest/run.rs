use anyhow::{Result, bail};
use chrono::Utc;
use tracing::info;

use crate::cli::{IngestArgs, resolve_db_path};
use crate::commands::inventory;
use crate::model::{IngestPaths, IngestRunManifest};
use crate::store::{DB_SCHEMA_VERSION, ExamStore};
use crate::util::{ensure_directory, now_utc_string, utc_compact_string, write_json_pretty};

use super::outcome::{DocumentOutcome, tally_outcomes};
use super::pipeline::IngestPipeline;
use super::text_extract::{SourceDocument, TextExtractor};

pub fn run(args: IngestArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let cache_root = args.cache_root.clone();
    ensure_directory(&cache_root)?;

    let manifest_path = args.manifest_path.clone().unwrap_or_else(|| {
        cache_root.join("manifests").join(format!(
            "ingest_run_{}.json",
            utc_compact_string(started_ts)
        ))
    });
    let db_path = resolve_db_path(&cache_root, args.db_path.as_ref());

    info!(cache_root = %cache_root.display(), run_id = %run_id, "starting ingest");

    let document_paths = inventory::discover_documents(&args.inputs)?;
    if document_paths.is_empty() {
        bail!("no intake documents found in the given inputs");
    }
    info!(documents = document_paths.len(), "discovered intake documents");

    let mut store = ExamStore::open(&db_path)?;
    let pipeline = IngestPipeline::new(
        TextExtractor::new(args.pdftotext_bin.clone()),
        args.missing_sex,
    )?;

    let mut outcomes = Vec::with_capacity(document_paths.len());
    for path in &document_paths {
        let outcome = match SourceDocument::read(path) {
            Ok(document) => pipeline.ingest_document(&mut store, &document),
            Err(error) => DocumentOutcome::ExtractionError {
                document: path.display().to_string(),
                error,
            },
        };
        outcome.log();
        outcomes.push(outcome);
    }

    let mut counts = tally_outcomes(&outcomes);
    counts.records_total = store.count_records()?;

    let status = if counts.extraction_error_count + counts.persist_error_count == 0 {
        "completed"
    } else {
        "completed_with_errors"
    };

    let manifest = IngestRunManifest {
        manifest_version: 1,
        run_id,
        db_schema_version: DB_SCHEMA_VERSION.to_string(),
        status: status.to_string(),
        started_at,
        updated_at: now_utc_string(),
        command: render_ingest_command(&args),
        missing_sex_policy: args.missing_sex.as_str().to_string(),
        paths: IngestPaths {
            cache_root: cache_root.display().to_string(),
            db_path: db_path.display().to_string(),
            manifest_path: manifest_path.display().to_string(),
        },
        counts: counts.clone(),
        documents: outcomes.iter().map(DocumentOutcome::to_report).collect(),
    };

    write_json_pretty(&manifest_path, &manifest)?;

    info!(path = %manifest_path.display(), "wrote ingest run manifest");
    info!(
        documents = counts.document_count,
        stored = counts.stored_count,
        duplicates = counts.duplicate_count,
        extraction_errors = counts.extraction_error_count,
        persist_errors = counts.persist_error_count,
        records_total = counts.records_total,
        "ingest completed"
    );

    Ok(())
}

fn render_ingest_command(args: &IngestArgs) -> String {
    let mut parts = vec![
        "petct".to_string(),
        "ingest".to_string(),
        "--cache-root".to_string(),
        args.cache_root.display().to_string(),
    ];

    if let Some(db_path) = &args.db_path {
        parts.push("--db-path".to_string());
        parts.push(db_path.display().to_string());
    }
    if let Some(manifest_path) = &args.manifest_path {
        parts.push("--manifest-path".to_string());
        parts.push(manifest_path.display().to_string());
    }

    parts.push("--missing-sex".to_string());
    parts.push(args.missing_sex.as_str().to_string());
    parts.push("--pdftotext-bin".to_string());
    parts.push(args.pdftotext_bin.clone());

    for input in &args.inputs {
        parts.push(input.display().to_string());
    }

    parts.join(" ")
}
