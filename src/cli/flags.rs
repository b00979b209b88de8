use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::core::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "phishy",
    version,
    about = "Phishy hybrid threat detection: VirusTotal reputation + local tree ensemble"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to config file (TOML). Default: config/phishy.toml
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Model artifact (LightGBM JSON dump); overrides model_path from config
    #[arg(long, global = true)]
    pub model: Option<PathBuf>,

    /// Increase verbosity (info, debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log file path
    #[arg(long, default_value = "data/phishy.log", global = true)]
    pub log_file: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Analyze a single URL and print the JSON report
    Analyze {
        /// URL to classify
        url: String,
    },
    /// Analyze every URL in a file (one per line, '#' comments allowed)
    Batch {
        #[arg(long)]
        input: PathBuf,
        /// Output format
        #[arg(long, value_enum, default_value = "jsonl")]
        format: OutputFormatArg,
        /// Output file; stdout when omitted
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Report model and reputation service readiness
    Status,
}

#[derive(ValueEnum, Clone, Debug)]
pub enum OutputFormatArg {
    Json,
    Jsonl,
    Markdown,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(value: OutputFormatArg) -> Self {
        match value {
            OutputFormatArg::Json => OutputFormat::Json,
            OutputFormatArg::Jsonl => OutputFormat::Jsonl,
            OutputFormatArg::Markdown => OutputFormat::Markdown,
        }
    }
}
