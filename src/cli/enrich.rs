//! Enrich command implementation

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use super::{CliError, StatusArgs};
use crate::enricher::{EnrichConfig, EnrichError, EnrichPipeline, RunSummary, MAX_BATCH_SIZE};
use crate::events::{EventSink, FanoutSink, PipelineEvent, TracingEventSink};
use crate::fetcher::FaaRegistryFetcher;
use crate::shutdown::SharedShutdown;
use crate::FieldSchema;

/// Parse and validate the batch size
fn parse_batch_size(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if value == 0 {
        return Err("batch size must be at least 1".to_string());
    }
    if value > MAX_BATCH_SIZE {
        return Err(format!(
            "batch size {value} exceeds maximum of {MAX_BATCH_SIZE}"
        ));
    }
    Ok(value)
}

/// Aircraft registry enricher CLI
#[derive(Parser, Debug)]
#[command(name = "aircraft-enricher")]
#[command(about = "Enrich aircraft registration datasets from the FAA registry", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (json or human)
    #[arg(long, global = true, default_value = "human")]
    pub output_format: OutputFormat,

    /// Serve Prometheus metrics on this address (e.g., 127.0.0.1:9090)
    #[arg(long, global = true)]
    pub metrics_addr: Option<SocketAddr>,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch registry details for every incomplete record
    Enrich(EnrichArgs),

    /// Show how far a dataset has been enriched
    Status(StatusArgs),
}

/// Enrich command arguments
#[derive(Parser, Debug)]
pub struct EnrichArgs {
    /// Input dataset (CSV with a header row)
    #[arg(long)]
    pub input: PathBuf,

    /// Output dataset (default: rewrite the input in place)
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Records fetched concurrently and flushed together
    #[arg(long, default_value = "20", value_parser = parse_batch_size)]
    pub batch_size: usize,

    /// Per-request timeout in seconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_secs: Option<u64>,

    /// Fields to extract, comma-separated (default: the FAA registry fields)
    #[arg(long, value_delimiter = ',')]
    pub fields: Option<Vec<String>>,

    /// Column holding the registration number
    #[arg(long, default_value = FieldSchema::DEFAULT_IDENTIFIER_COLUMN)]
    pub identifier_column: String,

    /// Field whose emptiness marks a record as not yet enriched
    #[arg(long, default_value = FieldSchema::DEFAULT_COMPLETION_FIELD)]
    pub completion_field: String,

    /// Registry search URL
    #[arg(long)]
    pub endpoint: Option<String>,

    /// CSS selector of the data tables on the result page
    #[arg(long)]
    pub table_selector: Option<String>,

    /// Ignore an existing output file and start again from the input
    #[arg(long, default_value_t = false)]
    pub force: bool,
}

impl EnrichArgs {
    /// Field schema from the flags.
    pub fn schema(&self) -> Result<FieldSchema, CliError> {
        build_schema(
            &self.identifier_column,
            self.fields.clone(),
            &self.completion_field,
        )
    }

    /// Run configuration from the flags.
    pub fn config(&self) -> Result<EnrichConfig, CliError> {
        let mut config = EnrichConfig::new(&self.input)
            .with_batch_size(self.batch_size)
            .with_schema(self.schema()?)
            .with_force(self.force);
        if let Some(output) = &self.output {
            config = config.with_output_path(output);
        }
        if let Some(secs) = self.timeout_secs {
            config = config.with_request_timeout(Duration::from_secs(secs));
        }
        config.validate()?;
        Ok(config)
    }

    /// Execute the enrich command.
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        let config = self.config()?;
        let mut fetcher = FaaRegistryFetcher::new(config.request_timeout())?;
        if let Some(endpoint) = &self.endpoint {
            fetcher = fetcher.with_endpoint(endpoint.clone());
        }
        let output_path = config.output_path().to_path_buf();

        let progress = match cli.output_format {
            OutputFormat::Human => Some(create_progress_bar()),
            OutputFormat::Json => None,
        };
        let mut events = FanoutSink::new().with(Arc::new(TracingEventSink::new()));
        if let Some(bar) = &progress {
            events = events.with(Arc::new(ProgressBarSink { bar: bar.clone() }));
            tokio::spawn({
                let bar = bar.clone();
                let shutdown = shutdown.clone();
                async move {
                    shutdown.wait_for_shutdown().await;
                    bar.set_message("stopping after current batch...");
                    shutdown.wait_for_abandon().await;
                    bar.set_message("abandoning batch, saving finished records...");
                }
            });
        }

        let mut pipeline = EnrichPipeline::new(config, Arc::new(fetcher))
            .with_shutdown(shutdown)
            .with_events(Arc::new(events));
        if let Some(selector) = &self.table_selector {
            pipeline = pipeline.with_table_selector(selector)?;
        }

        let result = pipeline.run().await;
        if let Some(bar) = &progress {
            bar.finish_and_clear();
        }

        match cli.output_format {
            OutputFormat::Json => output_json(&output_path, &result),
            OutputFormat::Human => output_human(&output_path, &result),
        }

        result.map(|_| ()).map_err(CliError::from)
    }
}

/// Build a schema from CLI flags, defaulting to the FAA registry fields.
pub(crate) fn build_schema(
    identifier_column: &str,
    fields: Option<Vec<String>>,
    completion_field: &str,
) -> Result<FieldSchema, CliError> {
    let fields = fields
        .map(|fields| {
            fields
                .into_iter()
                .filter(|f| !f.trim().is_empty())
                .collect::<Vec<_>>()
        })
        .unwrap_or_else(|| FieldSchema::faa_registry().fields().to_vec());
    Ok(FieldSchema::new(identifier_column, fields, completion_field)?)
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}

/// Output result as JSON
fn output_json(output_path: &std::path::Path, result: &Result<RunSummary, EnrichError>) {
    let summary = match result {
        Ok(summary) => Some(summary),
        Err(e) => e.summary(),
    };
    let output = serde_json::json!({
        "success": result.is_ok(),
        "output_path": output_path.display().to_string(),
        "summary": summary,
        "error": result.as_ref().err().map(|e| e.to_string()),
    });
    println!("{output}");
}

/// Output result in human-readable format
fn output_human(output_path: &std::path::Path, result: &Result<RunSummary, EnrichError>) {
    match result {
        Ok(summary) => {
            println!("\nEnrichment completed successfully!");
            print_summary(output_path, summary);
        }
        Err(EnrichError::Interrupted(summary)) => {
            println!("\nEnrichment interrupted - progress saved.");
            print_summary(output_path, summary);
            println!("Run the same command again to resume from record {}.", summary.next_index);
        }
        Err(EnrichError::Persistence { summary, .. }) => {
            eprintln!("\nEnrichment failed while saving progress.");
            print_summary(output_path, summary);
            println!("Records before {} are on disk.", summary.next_index);
        }
        // The error itself is logged once by the caller
        Err(_) => eprintln!("\nEnrichment failed!"),
    }
}

fn print_summary(output_path: &std::path::Path, summary: &RunSummary) {
    println!("Output: {}", output_path.display());
    println!("Records: {}", summary.total_records);
    println!("Started at record: {}", summary.start_index);
    println!("Enriched: {}", summary.enriched);
    if summary.failed() > 0 {
        println!(
            "Failed: {} (fetch: {}, extract: {}) - left incomplete for the next run",
            summary.failed(),
            summary.fetch_failed,
            summary.extract_failed
        );
    }
    if summary.skipped > 0 {
        println!("Skipped (blank identifier): {}", summary.skipped);
    }
    println!("Batches flushed: {}", summary.batches_flushed);
    println!("Next resume index: {}", summary.next_index);
}

/// Drives an indicatif bar from pipeline events
struct ProgressBarSink {
    bar: ProgressBar,
}

impl EventSink for ProgressBarSink {
    fn emit(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::RunStarted {
                total_records,
                start_index,
                ..
            } => {
                self.bar
                    .set_length(total_records.saturating_sub(*start_index) as u64);
                self.bar.set_message(format!("resuming at record {start_index}"));
            }
            PipelineEvent::BatchFlushed {
                batch, processed, ..
            } => {
                self.bar.set_position(*processed as u64);
                self.bar.set_message(format!("batch {batch} flushed"));
            }
            PipelineEvent::FlushFailed { .. } => {
                self.bar.abandon_with_message("flush failed");
            }
            _ => {}
        }
    }
}

/// Create progress bar with style
fn create_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
            .expect("hardcoded template is valid")
            .progress_chars("#>-"),
    );
    pb
}
