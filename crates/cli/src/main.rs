//! heliowatch command-line client.
//!
//! Publishes space weather impact reports to a ledger file and browses them.
//!
//! # Usage
//!
//! ```bash
//! # Publish a report
//! heliowatch --identity 0x71c7...976f submit --severity 4 --impact "Power Grid" --location Texas
//!
//! # List reports mentioning Texas, or only your own
//! heliowatch list --search tex
//! HELIOWATCH__IDENTITY=0x71c7...976f heliowatch list --mine
//!
//! # Aggregate statistics
//! heliowatch stats
//!
//! # Print a configuration file with every default
//! heliowatch config example > heliowatch.toml
//! ```

mod config;
mod render;

use std::{io::IsTerminal, sync::Arc};

use clap::Parser;
use config::{Cli, CliCommand, ConfigAction, LoadError, LogFormat};
use heliowatch_client::{Reporter, StaticSigner, SubmitError, SyncError, ViewQuery};
use heliowatch_kv::FileLedger;
use heliowatch_types::ReportDraft;
use snafu::{ResultExt, Snafu};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Top-level error type for the binary.
#[derive(Debug, Snafu)]
enum CliError {
    #[snafu(display("{source}"))]
    Load { source: LoadError },

    #[snafu(display("`{command}` needs an identity: pass --identity or set HELIOWATCH__IDENTITY"))]
    MissingIdentity { command: &'static str },

    #[snafu(display("Failed to load reports: {source}"))]
    Sync { source: SyncError },

    #[snafu(display("{}", source.user_message()))]
    Submit { source: SubmitError },

    #[snafu(display("Failed to render example config: {source}"))]
    RenderExample { source: toml::ser::Error },

    #[snafu(display("Failed to render config schema: {source}"))]
    RenderSchema { source: serde_json::Error },
}

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    if let CliCommand::Config { action } = cli.command {
        let text = match action {
            ConfigAction::Example => config::example_config().context(RenderExampleSnafu)?,
            ConfigAction::Schema => config::config_schema().context(RenderSchemaSnafu)?,
        };
        println!("{text}");
        return Ok(());
    }

    init_logging(cli.log_format);

    let settings = config::load_config(cli.config.as_deref()).context(LoadSnafu)?;
    tracing::debug!(ledger = %cli.ledger.display(), "opening ledger file");

    let identity = cli.identity.clone().unwrap_or_default();
    let reporter = Reporter::from_config(
        Arc::new(FileLedger::new(&cli.ledger)),
        Arc::new(StaticSigner::new(identity.clone())),
        &settings,
    );

    match cli.command {
        CliCommand::Submit { severity, impact, location, details } => {
            if identity.is_empty() {
                return MissingIdentitySnafu { command: "submit" }.fail();
            }
            let draft = ReportDraft::new(severity, impact, location).with_details(details);
            let receipt = reporter.submit(draft).await.context(SubmitSnafu)?;
            println!("{}", reporter.view(&ViewQuery::all()).submission.message);
            println!("{}", render::record_line(&receipt.record));
            if let Err(e) = &receipt.refresh {
                tracing::warn!(error = %e, "published, but reloading reports failed");
            }
        },
        CliCommand::List { search, mine } => {
            let mut query = ViewQuery::all().search(search);
            if mine {
                if identity.is_empty() {
                    return MissingIdentitySnafu { command: "list --mine" }.fail();
                }
                query = query.mine(identity);
            }
            let snapshot = reporter.refresh().await.context(SyncSnafu)?;
            let model = reporter.view(&query);
            print!("{}", render::record_list(&model.records));
            eprint!("{}", render::skipped_notes(&snapshot));
        },
        CliCommand::Stats => {
            let snapshot = reporter.refresh().await.context(SyncSnafu)?;
            print!("{}", render::stats_panel(&reporter.view(&ViewQuery::all()).stats));
            eprint!("{}", render::skipped_notes(&snapshot));
        },
        CliCommand::Config { .. } => {},
    }
    Ok(())
}

/// Initializes logging to stderr.
///
/// Supports three formats:
/// - `Text`: Human-readable format
/// - `Json`: JSON structured logging
/// - `Auto`: JSON for non-TTY stderr, text otherwise
fn init_logging(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = match format {
        LogFormat::Json => true,
        LogFormat::Text => false,
        LogFormat::Auto => !std::io::stderr().is_terminal(),
    };

    if use_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
