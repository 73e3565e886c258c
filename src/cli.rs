use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

#[derive(Debug, Parser)]
#[command(
    name = "haystack",
    about = "Fetch network device configurations and search them"
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log level (overridden by HAYSTACK_LOG)
    #[arg(long, value_enum, default_value_t = LogLevel::Info, global = true)]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch device configurations and rebuild the search corpus
    FetchConfigs(FetchArgs),
    /// Search device configurations (all terms must match)
    Search(SearchArgs),
    /// Show the active corpus
    Status(StatusArgs),
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Fetch --

#[derive(Debug, Parser)]
pub struct FetchArgs {
    /// API server host or URL
    #[arg(long)]
    pub apiserver: String,

    /// Access token, or a path to a file containing it
    #[arg(long)]
    pub access_token: String,

    /// Also fetch devices that are not streaming
    #[arg(long)]
    pub include_inactive: bool,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "30")]
    pub timeout: u64,

    /// Retries for transient request failures
    #[arg(long, default_value = "3")]
    pub retries: u32,
}

// -- Search --

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// Search term; repeat to require several terms
    #[arg(long = "query", required = true)]
    pub queries: Vec<String>,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Status --

#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "haystack",
            &mut std::io::stdout(),
        );
    }
}
