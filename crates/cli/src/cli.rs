//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// framesync - Multi-source video frame synchronizer
#[derive(Parser, Debug)]
#[command(
    name = "framesync",
    author,
    version,
    about = "Multi-source video frame synchronizer",
    long_about = "Captures several video sources concurrently, tracks the moving region in each \n\
                  and aligns them frame by frame, discarding frames from whichever \n\
                  source has drifted ahead."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "FRAMESYNC_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "FRAMESYNC_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Default log level derived from `-q` / `-v`
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the synchronizer and pull aligned frame sets
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display the effective configuration
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON); defaults are used when absent
    #[arg(short, long, env = "FRAMESYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Source locator; repeat for every source (replaces configured sources)
    #[arg(short, long = "source", value_name = "LOCATOR")]
    pub sources: Vec<String>,

    /// Maximum number of frame sets to pull (0 = unlimited)
    #[arg(long, default_value = "0", env = "FRAMESYNC_MAX_SETS")]
    pub max_sets: u64,

    /// Run timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "FRAMESYNC_TIMEOUT")]
    pub timeout: u64,

    /// Initial manual delay as SOURCE=FRAMES; may be repeated
    #[arg(long = "delay", value_name = "SOURCE=FRAMES", value_parser = parse_delay)]
    pub delays: Vec<(usize, usize)>,

    /// Directory receiving the last comparison crops as PNG
    #[arg(long, value_name = "DIR")]
    pub fragments_dir: Option<PathBuf>,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "FRAMESYNC_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "framesync.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "framesync.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

fn parse_delay(value: &str) -> Result<(usize, usize), String> {
    let (source, frames) = value
        .split_once('=')
        .ok_or_else(|| format!("expected SOURCE=FRAMES, got '{value}'"))?;
    let source = source
        .trim()
        .parse()
        .map_err(|e| format!("invalid source index '{source}': {e}"))?;
    let frames = frames
        .trim()
        .parse()
        .map_err(|e| format!("invalid frame count '{frames}': {e}"))?;
    Ok((source, frames))
}
