//! Status command implementation

use clap::Parser;
use std::path::PathBuf;

use super::enrich::OutputFormat;
use super::{Cli, CliError};
use crate::dataset::checkpoint::{summarize, CheckpointStatus};
use crate::dataset::DatasetStore;
use crate::FieldSchema;

/// Status command arguments
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Input dataset
    #[arg(long)]
    pub input: PathBuf,

    /// Output dataset of a previous run, if it was written separately
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Column holding the registration number
    #[arg(long, default_value = FieldSchema::DEFAULT_IDENTIFIER_COLUMN)]
    pub identifier_column: String,

    /// Field whose emptiness marks a record as not yet enriched
    #[arg(long, default_value = FieldSchema::DEFAULT_COMPLETION_FIELD)]
    pub completion_field: String,
}

impl StatusArgs {
    /// Locate the checkpoint of the dataset a run would resume from.
    pub fn status(&self) -> Result<(PathBuf, CheckpointStatus), CliError> {
        let output = self.output.clone().unwrap_or_else(|| self.input.clone());
        let store = DatasetStore::new(&self.input, output, false);
        let dataset = store.load(&self.identifier_column)?;
        Ok((
            store.source_path().to_path_buf(),
            summarize(&dataset, &self.completion_field),
        ))
    }

    /// Execute the status command.
    pub fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let (source, status) = self.status()?;
        match cli.output_format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "dataset": source.display().to_string(),
                    "status": status,
                });
                println!("{output}");
            }
            OutputFormat::Human => {
                println!("Dataset: {}", source.display());
                println!("Records: {}", status.total);
                println!("Complete: {}", status.complete);
                println!("Remaining: {}", status.remaining());
                if status.is_done() {
                    println!("Every record is enriched.");
                } else {
                    println!("Next run resumes at record {}.", status.resume_index);
                }
            }
        }
        Ok(())
    }
}
