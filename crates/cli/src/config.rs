//! Command-line arguments and configuration loading.
//!
//! Every global flag can also be set from a `HELIOWATCH__*` environment
//! variable; flags win over the environment. Tunables that are not flags live
//! in an optional TOML file whose sections mirror [`HeliowatchConfig`].

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use heliowatch_types::config::{ConfigError, HeliowatchConfig};
use snafu::{ResultExt, Snafu};

/// Default ledger file, relative to the working directory.
pub const DEFAULT_LEDGER_FILE: &str = "heliowatch-ledger.json";

/// Errors from loading configuration.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum LoadError {
    /// The configuration file could not be read.
    #[snafu(display("Failed to read config file {}: {source}", path.display()))]
    Read {
        /// File path.
        path: PathBuf,
        /// I/O error.
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for [`HeliowatchConfig`].
    #[snafu(display("Failed to parse config file {}: {source}", path.display()))]
    Parse {
        /// File path.
        path: PathBuf,
        /// TOML error.
        source: toml::de::Error,
    },

    /// The configuration parsed but violates a constraint.
    #[snafu(display("Invalid configuration: {source}"))]
    Invalid {
        /// Validation error.
        source: ConfigError,
    },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text.
    Text,
    /// One JSON object per event.
    Json,
    /// JSON when stderr is not a terminal, text otherwise.
    #[default]
    Auto,
}

/// Publish and browse space weather impact reports.
#[derive(Debug, Parser)]
#[command(name = "heliowatch", version, about)]
pub struct Cli {
    /// Path of the ledger file.
    #[arg(long, env = "HELIOWATCH__LEDGER", default_value = DEFAULT_LEDGER_FILE, global = true)]
    pub ledger: PathBuf,

    /// Identity recorded as the submitter and matched by `list --mine`.
    #[arg(long, env = "HELIOWATCH__IDENTITY", global = true)]
    pub identity: Option<String>,

    /// Optional TOML configuration file.
    #[arg(long, env = "HELIOWATCH__CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log output format.
    #[arg(
        long,
        env = "HELIOWATCH__LOG_FORMAT",
        value_enum,
        default_value_t = LogFormat::Auto,
        global = true
    )]
    pub log_format: LogFormat,

    /// Command to run.
    #[command(subcommand)]
    pub command: CliCommand,
}

/// Top-level commands.
#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Publish a new report.
    Submit {
        /// Severity from 1 (minor) to 5 (extreme).
        #[arg(long)]
        severity: u8,
        /// Impact category, e.g. "Power Grid".
        #[arg(long = "impact")]
        impact: String,
        /// Affected location.
        #[arg(long)]
        location: String,
        /// Free-text details, stored only inside the protected payload.
        #[arg(long, default_value = "")]
        details: String,
    },

    /// List reports, newest first.
    List {
        /// Case-insensitive filter on location and impact category.
        #[arg(long, default_value = "")]
        search: String,
        /// Only show reports submitted by `--identity`.
        #[arg(long)]
        mine: bool,
    },

    /// Show aggregate statistics over all reports.
    Stats,

    /// Configuration helpers.
    Config {
        /// Action to perform.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration subcommands.
#[derive(Debug, Clone, Copy, Subcommand)]
pub enum ConfigAction {
    /// Print a configuration file with every default value.
    Example,
    /// Print the JSON schema of the configuration file.
    Schema,
}

/// Loads and validates the configuration file, or returns defaults without one.
///
/// # Errors
///
/// Returns [`LoadError`] if the file cannot be read, parsed or validated.
pub fn load_config(path: Option<&Path>) -> Result<HeliowatchConfig, LoadError> {
    let config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path).context(ReadSnafu { path })?;
            toml::from_str::<HeliowatchConfig>(&text).context(ParseSnafu { path })?
        },
        None => HeliowatchConfig::default(),
    };
    config.validate().context(InvalidSnafu)?;
    Ok(config)
}

/// Renders the default configuration as TOML.
///
/// # Errors
///
/// Returns the TOML serialisation error.
pub fn example_config() -> Result<String, toml::ser::Error> {
    toml::to_string_pretty(&HeliowatchConfig::default())
}

/// Renders the configuration JSON schema.
///
/// # Errors
///
/// Returns the JSON serialisation error.
pub fn config_schema() -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&schemars::schema_for!(HeliowatchConfig))
}
