use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;
use url::Url;

use super::intent::CredentialSource;

#[derive(Debug, Error)]
pub enum InfoError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("metadata query timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("metadata query failed: {}", .stderr.trim())]
    Failed { stderr: String },

    #[error("could not parse metadata: {0}")]
    Parse(#[from] serde_json::Error),
}

/// The few metadata fields shown to the user
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MediaInfo {
    #[serde(default)]
    pub title: String,
    pub uploader: Option<String>,
    /// Seconds; absent for live streams
    pub duration: Option<f64>,
    pub description: Option<String>,
}

impl MediaInfo {
    pub fn from_json(json: &str) -> Result<Self, InfoError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn duration_label(&self) -> Option<String> {
        self.duration.map(format_duration)
    }
}

/// `m:ss`, minutes unbounded
pub fn format_duration(secs: f64) -> String {
    let total = secs.max(0.0).floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

/// Query metadata for `url` without downloading anything
pub async fn fetch_info(
    program: &Path,
    url: &Url,
    credential: Option<&CredentialSource>,
    limit: Duration,
) -> Result<MediaInfo, InfoError> {
    let mut args = credential.map(CredentialSource::args).unwrap_or_default();
    args.extend(
        ["--dump-single-json", "--no-warnings", "--no-playlist", url.as_str()]
            .iter()
            .map(|s| s.to_string()),
    );
    debug!("Querying metadata: {} {:?}", program.display(), args);

    let output = Command::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output();

    let output = match timeout(limit, output).await {
        Ok(Ok(output)) => output,
        Ok(Err(source)) => {
            return Err(InfoError::Spawn {
                program: program.display().to_string(),
                source,
            })
        }
        Err(_) => return Err(InfoError::Timeout(limit)),
    };

    if !output.status.success() {
        return Err(InfoError::Failed {
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    MediaInfo::from_json(&String::from_utf8_lossy(&output.stdout))
}
