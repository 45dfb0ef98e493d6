use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use tracing::debug;

use crate::config::Config;
use crate::fetch::parser::UNKNOWN_FILE_LABEL;
use crate::fetch::plan::InvocationPlan;
use crate::fetch::{
    download_with_fallback, ensure_output_dir, AttemptRunner, CredentialSource, Diagnosis,
    DownloadIntent, FallbackFailure, FallbackSuccess, ProcessError, ProcessRunner, RunOutput,
    Strategy,
};
use crate::ui::{report, Spinner};

/// Every attempt failed; carries the diagnosis for the final message
#[derive(Debug)]
pub struct DownloadFailed {
    pub diagnosis: Diagnosis,
    pub detail: String,
}

impl fmt::Display for DownloadFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.diagnosis {
            Diagnosis::DownloadFailed if !self.detail.is_empty() => {
                write!(f, "{} ({})", self.diagnosis.headline(), self.detail)
            }
            _ => f.write_str(self.diagnosis.headline()),
        }
    }
}

impl std::error::Error for DownloadFailed {}

/// Starts a fresh spinner line for every attempt. The runner's own events
/// finish the line with the attempt's outcome.
struct PresentedRunner {
    inner: ProcessRunner,
    spinner: Spinner,
}

#[async_trait]
impl AttemptRunner for PresentedRunner {
    async fn run(
        &mut self,
        plan: &InvocationPlan,
        credential: Option<&CredentialSource>,
    ) -> Result<RunOutput, ProcessError> {
        let label = match credential {
            Some(CredentialSource::Browser(browser)) => format!("Trying cookies from {}...", browser),
            Some(CredentialSource::CookieFile(path)) => {
                format!("Using cookies from {}...", path.display())
            }
            None => "Downloading...".to_string(),
        };
        self.spinner.start(label);
        let result = self.inner.run(plan, credential).await;
        if self.spinner.is_running() {
            self.spinner.cleanup();
        }
        result
    }
}

pub async fn execute(intent: DownloadIntent, config: &Config) -> Result<()> {
    ensure_output_dir(&intent.output_dir).await?;
    debug!("Output directory: {}", intent.output_dir.display());

    let spinner = Spinner::new(config.redraw_interval());
    let sink = spinner.clone();
    let runner = ProcessRunner::new(&config.binary)
        .with_inactivity_window(config.inactivity_window())
        .with_kill_grace(config.kill_grace())
        .with_events(move |event| sink.apply(event));
    let mut runner = PresentedRunner {
        inner: runner,
        spinner: spinner.clone(),
    };

    let outcome = tokio::select! {
        outcome = download_with_fallback(&mut runner, &intent) => outcome,
        _ = tokio::signal::ctrl_c() => {
            // Dropping the attempt kills the child process
            spinner.cleanup();
            anyhow::bail!("Interrupted");
        }
    };

    match outcome {
        Ok(success) => {
            report_success(&intent, &success);
            Ok(())
        }
        Err(failure) => {
            if intent.verbose {
                dump_failure(&failure);
            }
            Err(DownloadFailed {
                diagnosis: failure.diagnosis,
                detail: failure
                    .last_error()
                    .map(ToString::to_string)
                    .unwrap_or_default(),
            }
            .into())
        }
    }
}

fn report_success(intent: &DownloadIntent, success: &FallbackSuccess) {
    let output = &success.output;
    let name = output
        .filename
        .as_deref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| UNKNOWN_FILE_LABEL.to_string());

    if output.already_downloaded {
        report::success(format!("Already downloaded: {}", name));
    } else {
        report::success(format!("Download complete: {}", name));
    }

    match &success.strategy {
        Strategy::Browser(browser) => report::info(format!("Used cookies from {}", browser)),
        Strategy::CookieFile(path) => report::info(format!("Used cookies file {}", path.display())),
        Strategy::Anonymous if success.attempts > 1 => report::info("Succeeded without cookies"),
        Strategy::Anonymous => {}
    }
    report::info(format!("Saved to: {}", intent.output_dir.display()));

    if let Some(path) = output.filename.as_deref() {
        if !file_exists(path) {
            report::warn(format!(
                "{} was reported but is not on disk. Conversion may have failed.",
                path.display()
            ));
        }
    }
}

fn file_exists(path: &Path) -> bool {
    path.try_exists().unwrap_or(false)
}

/// Raw output of the attempt whose failure is surfaced
fn dump_failure(failure: &FallbackFailure) {
    for (strategy, error) in &failure.attempts {
        eprintln!("  attempt with {}: {}", strategy, error);
    }
    if let Some(error) = failure.last_error() {
        report::heading("Last attempt");
        eprintln!(
            "exit code: {}",
            error
                .exit_code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "none".to_string())
        );
        eprintln!("timed out: {}", error.is_timeout());
        eprintln!("--- stderr ---\n{}", error.stderr().trim_end());
        eprintln!("--- stdout ---\n{}", error.stdout().trim_end());
    }
}
