pub mod args;
pub mod commands;
pub mod validate;

use anyhow::Result;
use args::{Cli, Commands};

use crate::config::Config;
use crate::ui::report;
use commands::download::DownloadFailed;

/// Execute the CLI with parsed arguments
pub async fn run(cli: Cli) -> Result<()> {
    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    match cli.command {
        Some(Commands::Config(args)) => commands::config::execute(args, cli.config.as_deref()).await,
        None => {
            let mut config = Config::load(cli.config.as_deref())?;
            if let Some(secs) = cli.download.timeout {
                config.inactivity_timeout_secs = secs;
            }

            let intent = validate::build_intent(&cli.download, &config, cli.verbose)?;
            tracing::debug!("Resolved request: {:?}", intent);

            if cli.download.info {
                commands::info::execute(&intent, &config).await
            } else {
                if !cli.quiet {
                    report::heading("Universal Downloader");
                }
                commands::download::execute(intent, &config).await
            }
        }
    }
}

/// Print the one final line for a failed run, plus remediation steps when
/// the failure was recognized
pub fn report_error(err: &anyhow::Error) {
    match err.downcast_ref::<DownloadFailed>() {
        Some(failed) => {
            report::error(failed.to_string());
            let steps = failed.diagnosis.remediation();
            if !steps.is_empty() {
                report::hint("How to fix:");
                for (i, step) in steps.iter().enumerate() {
                    report::hint(format!("  {}. {}", i + 1, step));
                }
            }
        }
        None => report::error(format!("{:#}", err)),
    }
}

fn setup_logging(verbose: bool, quiet: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    if quiet {
        return;
    }

    let level = if verbose { "debug" } else { "warn" };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stderr keeps log lines off the spinner's stdout line
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
