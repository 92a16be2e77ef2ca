//! Defines the command-line interface structure using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::core::model::{OutputFormat, RunMode};

#[derive(Parser)]
#[command(name = "row-enricher", version, about = "Enrich CSV rows with language-model outputs")]
pub struct Cli {
    /// Log provider calls and row progress to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Cmd,
}

#[derive(Subcommand)]
pub enum Cmd {
    /// Run a preset against a CSV file and write the enriched table
    Enrich(EnrichArgs),
    /// Print the prompts a row would be sent, without calling a provider
    Render {
        #[arg(long)]
        preset: PathBuf,
        #[arg(long)]
        input: PathBuf,
        /// Zero-based data row to render
        #[arg(long, default_value_t = 0)]
        row: usize,
    },
    /// Print the JSON schemas a preset sends with its prompts
    Schema {
        #[arg(long)]
        preset: PathBuf,
    },
    /// List integrations and the models they offer
    Models {
        /// Only show this integration
        integration: Option<String>,
        #[arg(long, env = "ROW_ENRICHER_CONFIG")]
        integrations: Option<PathBuf>,
    },
}

#[derive(Args)]
pub struct EnrichArgs {
    /// Enrichment preset (.json, .yaml, .yml or .ts)
    #[arg(long)]
    pub preset: PathBuf,
    /// Input CSV file; the first record is the header row
    #[arg(long)]
    pub input: PathBuf,
    /// Output CSV file (default: <input>_enriched_<timestamp>.csv)
    #[arg(long)]
    pub out: Option<PathBuf>,
    /// Override the preset's run mode
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,
    /// Override the number of rows processed in preview mode
    #[arg(long = "preview-rows")]
    pub preview_rows: Option<usize>,
    /// Override the preset's output layout
    #[arg(long, value_enum)]
    pub format: Option<FormatArg>,
    /// Rows processed at once
    #[arg(long, default_value_t = 1)]
    pub concurrency: usize,
    /// Integrations file (default: ~/.row-enricher/config.toml)
    #[arg(long, env = "ROW_ENRICHER_CONFIG")]
    pub integrations: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Preview,
    Full,
}

impl From<ModeArg> for RunMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Preview => RunMode::Preview,
            ModeArg::Full => RunMode::Full,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum FormatArg {
    NewColumns,
    NewRows,
}

impl From<FormatArg> for OutputFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::NewColumns => OutputFormat::NewColumns,
            FormatArg::NewRows => OutputFormat::NewRows,
        }
    }
}
