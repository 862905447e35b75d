mod field_rules;
mod outcome;
mod pipeline;
mod record_assembly;
mod run;
#[cfg(test)]
mod tests;
mod text_extract;

pub use run::run;
