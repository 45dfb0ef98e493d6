use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::fetch::{Browser, MediaFormat};

const APP_DIR: &str = "universal-downloader";
const CONFIG_FILE: &str = "config.toml";

/// Settings read from `config.toml`. Every key is optional; command-line
/// flags take precedence over anything set here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// yt-dlp executable, looked up on PATH unless absolute
    pub binary: PathBuf,
    /// Base directory replacing the Downloads folder
    pub output_dir: Option<PathBuf>,
    pub default_format_audio: MediaFormat,
    pub default_format_video: MediaFormat,
    /// Browser tried first for cookies
    pub browser: Option<Browser>,
    pub inactivity_timeout_secs: u64,
    pub kill_grace_secs: u64,
    pub redraw_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("yt-dlp"),
            output_dir: None,
            default_format_audio: MediaFormat::M4a,
            default_format_video: MediaFormat::Mp4,
            browser: None,
            inactivity_timeout_secs: 60,
            kill_grace_secs: 5,
            redraw_interval_ms: 80,
        }
    }
}

impl Config {
    /// Load from `path`, or from the default location when `None`. A missing
    /// file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => default_path(),
        };
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        if !config.default_format_audio.is_audio() {
            anyhow::bail!("default_format_audio must be an audio format, got {}", config.default_format_audio);
        }
        if config.default_format_video.is_audio() {
            anyhow::bail!("default_format_video must be a video format, got {}", config.default_format_video);
        }
        Ok(config)
    }

    pub fn inactivity_window(&self) -> Duration {
        Duration::from_secs(self.inactivity_timeout_secs.max(1))
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_secs(self.kill_grace_secs)
    }

    pub fn redraw_interval(&self) -> Duration {
        Duration::from_millis(self.redraw_interval_ms.max(10))
    }
}

pub fn default_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        config_dir.join(APP_DIR).join(CONFIG_FILE)
    } else {
        PathBuf::from(CONFIG_FILE)
    }
}

/// Commented starting point written by `config --init`
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# universal-downloader configuration

# yt-dlp executable (name on PATH or absolute path)
binary = "yt-dlp"

# Base download directory. Files go to <output_dir>/Audio|Video/<site>.
# Defaults to your Downloads folder.
# output_dir = "/home/me/Media"

# Default formats: audio mp3, m4a, wav, flac, opus; video mp4, mkv, webm
default_format_audio = "m4a"
default_format_video = "mp4"

# Browser whose cookies are tried first (chrome, firefox, safari, edge)
# browser = "firefox"

# Seconds without any output from yt-dlp before it is terminated
inactivity_timeout_secs = 60

# Seconds between the termination signal and a forced kill
kill_grace_secs = 5

# Spinner redraw interval in milliseconds
redraw_interval_ms = 80
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_template_matches_defaults() {
        assert_eq!(Config::parse(DEFAULT_CONFIG_TEMPLATE).unwrap(), Config::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::parse("browser = \"safari\"\ninactivity_timeout_secs = 30\n").unwrap();
        assert_eq!(config.browser, Some(Browser::Safari));
        assert_eq!(config.inactivity_window(), Duration::from_secs(30));
        assert_eq!(config.binary, PathBuf::from("yt-dlp"));
    }

    #[test]
    fn test_format_kind_is_checked() {
        assert!(Config::parse("default_format_audio = \"mp4\"").is_err());
        assert!(Config::parse("default_format_video = \"mp3\"").is_err());
        assert!(Config::parse("browser = \"netscape\"").is_err());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::load(Some(&tmp.path().join("absent.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_reports_path_on_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "kill_grace_secs = \"soon\"").unwrap();
        let err = Config::load(Some(&path)).unwrap_err();
        assert!(format!("{:#}", err).contains("config.toml"));
    }
}
