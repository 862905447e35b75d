use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};

use crate::util::parse_cli_date;

#[derive(Parser, Debug)]
#[command(
    name = "petct",
    version,
    about = "PET-CT intake form extraction and exam record store"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Ingest(IngestArgs),
    List(ListArgs),
    Delete(DeleteArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    /// Intake documents (.pdf or pre-extracted .txt) or directories holding them.
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    #[arg(long, default_value = ".cache/petct")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    /// What to record when a form carries neither FEMININO nor MASCULINO.
    #[arg(long, value_enum, default_value_t = MissingSexPolicy::Unknown)]
    pub missing_sex: MissingSexPolicy,

    #[arg(long, default_value = "pdftotext")]
    pub pdftotext_bin: String,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum MissingSexPolicy {
    #[default]
    Unknown,
    /// Legacy behaviour: forms without a marker are recorded as male.
    Male,
}

impl MissingSexPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Male => "male",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    #[arg(long, default_value = ".cache/petct")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long, value_parser = parse_cli_date)]
    pub from: Option<NaiveDate>,

    #[arg(long, value_parser = parse_cli_date)]
    pub to: Option<NaiveDate>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
#[command(group(ArgGroup::new("target").required(true).args(["id", "name"])))]
pub struct DeleteArgs {
    #[arg(long, default_value = ".cache/petct")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub id: Option<i64>,

    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = ".cache/petct")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,
}

pub fn resolve_db_path(cache_root: &std::path::Path, db_path: Option<&PathBuf>) -> PathBuf {
    db_path
        .cloned()
        .unwrap_or_else(|| cache_root.join("petct_exams.sqlite"))
}
