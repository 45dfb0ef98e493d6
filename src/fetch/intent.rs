use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use url::Url;

/// Output container or audio codec requested by the user
#[derive(ValueEnum, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    Mp3,
    M4a,
    Wav,
    Flac,
    Opus,
    Mp4,
    Mkv,
    Webm,
}

impl MediaFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaFormat::Mp3 => "mp3",
            MediaFormat::M4a => "m4a",
            MediaFormat::Wav => "wav",
            MediaFormat::Flac => "flac",
            MediaFormat::Opus => "opus",
            MediaFormat::Mp4 => "mp4",
            MediaFormat::Mkv => "mkv",
            MediaFormat::Webm => "webm",
        }
    }

    pub fn is_audio(&self) -> bool {
        matches!(
            self,
            MediaFormat::Mp3 | MediaFormat::M4a | MediaFormat::Wav | MediaFormat::Flac | MediaFormat::Opus
        )
    }

    pub fn audio_formats() -> &'static [MediaFormat] {
        &[
            MediaFormat::Mp3,
            MediaFormat::M4a,
            MediaFormat::Wav,
            MediaFormat::Flac,
            MediaFormat::Opus,
        ]
    }

    pub fn video_formats() -> &'static [MediaFormat] {
        &[MediaFormat::Mp4, MediaFormat::Mkv, MediaFormat::Webm]
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requested quality: an extreme, or a maximum video height such as `720p`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Quality {
    Best,
    Worst,
    Height(u32),
}

/// Video heights accepted on the command line
pub const VIDEO_HEIGHTS: [u32; 8] = [144, 240, 360, 480, 720, 1080, 1440, 2160];

impl Quality {
    pub fn is_resolution(&self) -> bool {
        matches!(self, Quality::Height(_))
    }
}

impl FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim().to_ascii_lowercase();
        match token.as_str() {
            "best" => return Ok(Quality::Best),
            "worst" => return Ok(Quality::Worst),
            _ => {}
        }

        // Height is the numeric prefix of the token, e.g. "720p" -> 720
        let digits: String = token.chars().take_while(|c| c.is_ascii_digit()).collect();
        let rest = &token[digits.len()..];
        if digits.is_empty() || rest != "p" {
            return Err(format!(
                "unsupported quality '{}' (expected best, worst or a height like 720p)",
                s
            ));
        }
        digits
            .parse::<u32>()
            .map(Quality::Height)
            .map_err(|_| format!("height out of range: {}", s))
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quality::Best => f.write_str("best"),
            Quality::Worst => f.write_str("worst"),
            Quality::Height(h) => write!(f, "{}p", h),
        }
    }
}

/// Browser whose stored session cookies yt-dlp can read
#[derive(ValueEnum, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    Chrome,
    Firefox,
    Safari,
    Edge,
}

impl Browser {
    /// Order in which browsers are tried when none succeeds on its own
    pub const FALLBACK_ORDER: [Browser; 4] =
        [Browser::Safari, Browser::Chrome, Browser::Firefox, Browser::Edge];

    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chrome => "chrome",
            Browser::Firefox => "firefox",
            Browser::Safari => "safari",
            Browser::Edge => "edge",
        }
    }
}

impl fmt::Display for Browser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the external tool should take session cookies from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CredentialSource {
    Browser(Browser),
    CookieFile(PathBuf),
}

impl CredentialSource {
    /// Arguments that select this source on the yt-dlp command line
    pub fn args(&self) -> Vec<String> {
        match self {
            CredentialSource::Browser(browser) => {
                vec!["--cookies-from-browser".to_string(), browser.as_str().to_string()]
            }
            CredentialSource::CookieFile(path) => {
                vec!["--cookies".to_string(), path.display().to_string()]
            }
        }
    }
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Browser(browser) => write!(f, "{}", browser),
            CredentialSource::CookieFile(path) => write!(f, "cookie file {}", path.display()),
        }
    }
}

/// A validated download request. Built once from CLI input and never mutated.
#[derive(Clone, Debug)]
pub struct DownloadIntent {
    pub url: Url,
    pub audio_only: bool,
    pub format: MediaFormat,
    pub quality: Quality,
    pub browser: Option<Browser>,
    pub cookies_file: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_parse_extremes() {
        assert_eq!("best".parse::<Quality>().unwrap(), Quality::Best);
        assert_eq!("WORST".parse::<Quality>().unwrap(), Quality::Worst);
    }

    #[test]
    fn test_quality_parse_height() {
        assert_eq!("720p".parse::<Quality>().unwrap(), Quality::Height(720));
        assert_eq!("2160p".parse::<Quality>().unwrap(), Quality::Height(2160));
        assert_eq!(Quality::Height(480).to_string(), "480p");
    }

    #[test]
    fn test_quality_parse_rejects_garbage() {
        assert!("p720".parse::<Quality>().is_err());
        assert!("720".parse::<Quality>().is_err());
        assert!("720px".parse::<Quality>().is_err());
        assert!("high".parse::<Quality>().is_err());
    }

    #[test]
    fn test_credential_args() {
        let browser = CredentialSource::Browser(Browser::Firefox);
        assert_eq!(browser.args(), vec!["--cookies-from-browser", "firefox"]);

        let file = CredentialSource::CookieFile(PathBuf::from("/tmp/cookies.txt"));
        assert_eq!(file.args(), vec!["--cookies", "/tmp/cookies.txt"]);
    }

    #[test]
    fn test_format_kinds() {
        assert!(MediaFormat::Flac.is_audio());
        assert!(!MediaFormat::Mkv.is_audio());
        assert!(MediaFormat::video_formats().iter().all(|f| !f.is_audio()));
    }
}
