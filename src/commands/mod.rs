pub mod delete;
pub mod ingest;
pub mod inventory;
pub mod list;
pub mod status;
