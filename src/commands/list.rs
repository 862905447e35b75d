use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use crate::cli::{ListArgs, resolve_db_path};
use crate::model::ExamRow;
use crate::store::{DateRange, ExamStore};

pub fn run(args: ListArgs) -> Result<()> {
    let db_path = resolve_db_path(&args.cache_root, args.db_path.as_ref());
    if !db_path.exists() {
        warn!(path = %db_path.display(), "database file missing");
        bail!("no exam database at {}", db_path.display());
    }

    if let (Some(from), Some(to)) = (args.from, args.to) {
        if from > to {
            bail!("--from {from} is after --to {to}");
        }
    }

    let store = ExamStore::open(&db_path)?;
    let range = DateRange {
        from: args.from,
        to: args.to,
    };
    let rows = store
        .list_records(range)?
        .into_iter()
        .map(ExamRow::from)
        .collect::<Vec<ExamRow>>();

    info!(path = %db_path.display(), records = rows.len(), "listed exam records");

    if args.json {
        write_json_rows(&rows)
    } else {
        write_text_rows(&rows)
    }
}

fn write_json_rows(rows: &[ExamRow]) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, rows)
        .context("failed to serialize exam records as json")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

fn write_text_rows(rows: &[ExamRow]) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    writeln!(
        output,
        "id\tpatient\tsex\tage\texam_date\tweight_kg\theight_cm\tbmi\tbmi_class\tglucose\tglucose_class\trestaging\tcancer_type"
    )?;
    for row in rows {
        let record = &row.record;
        writeln!(
            output,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            row.id,
            record.patient_name,
            record.sex.map(|sex| sex.as_str()).unwrap_or("-"),
            display_or_dash(record.age),
            display_or_dash(record.exam_date),
            display_or_dash(record.weight_kg),
            display_or_dash(record.height_cm),
            display_or_dash(record.bmi),
            row.bmi_class.map(|class| class.as_str()).unwrap_or("-"),
            display_or_dash(record.glucose_mgdl),
            row.glucose_class.map(|class| class.as_str()).unwrap_or("-"),
            if record.is_restaging { "sim" } else { "não" },
            record.cancer_type.as_deref().unwrap_or("-"),
        )?;
    }
    writeln!(output, "Records: {}", rows.len())?;
    output.flush()?;
    Ok(())
}

fn display_or_dash<T: std::fmt::Display>(value: Option<T>) -> String {
    value
        .map(|value| value.to_string())
        .unwrap_or_else(|| "-".to_string())
}
