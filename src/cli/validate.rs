use std::path::PathBuf;
use thiserror::Error;
use url::Url;

use super::args::DownloadArgs;
use crate::config::Config;
use crate::fetch::intent::VIDEO_HEIGHTS;
use crate::fetch::{default_output_dir, DownloadIntent, MediaFormat, Quality};

/// Bad user input, reported before anything is spawned
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Please provide a URL")]
    MissingUrl,

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Unsupported URL scheme '{0}'. Only http and https are supported")]
    UnsupportedScheme(String),

    #[error("Format {format} cannot be used for {mode}. Supported formats: {supported}")]
    WrongFormatKind {
        format: MediaFormat,
        mode: &'static str,
        supported: String,
    },

    #[error("Invalid {mode} quality '{given}'. Supported options: {supported}")]
    InvalidQuality {
        given: String,
        mode: &'static str,
        supported: String,
    },

    #[error("Cookies file not found: {}", .0.display())]
    CookiesNotFound(PathBuf),
}

/// Undo shell escaping (`\?`, `\&`, `\=`) and check the URL is http(s)
pub fn normalize_url(raw: &str) -> Result<Url, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ValidationError::MissingUrl);
    }

    let mut fixed = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' && matches!(chars.peek(), Some('?' | '&' | '=')) {
            continue;
        }
        fixed.push(c);
    }

    let url = Url::parse(&fixed).map_err(|e| ValidationError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ValidationError::UnsupportedScheme(other.to_string())),
    }
}

/// Audio takes `best`/`worst`; video also takes the listed heights
pub fn parse_quality(raw: &str, audio_only: bool) -> Result<Quality, ValidationError> {
    let parsed = raw.parse::<Quality>().ok();
    let accepted = match parsed {
        Some(Quality::Best | Quality::Worst) => parsed,
        Some(Quality::Height(h)) if !audio_only && VIDEO_HEIGHTS.contains(&h) => parsed,
        _ => None,
    };

    accepted.ok_or_else(|| ValidationError::InvalidQuality {
        given: raw.to_string(),
        mode: if audio_only { "audio" } else { "video" },
        supported: quality_options(audio_only).join(", "),
    })
}

fn quality_options(audio_only: bool) -> Vec<String> {
    let mut options = vec!["best".to_string(), "worst".to_string()];
    if !audio_only {
        options.extend(VIDEO_HEIGHTS.iter().map(|h| format!("{}p", h)));
    }
    options
}

fn check_format(format: MediaFormat, audio_only: bool) -> Result<MediaFormat, ValidationError> {
    if format.is_audio() == audio_only {
        return Ok(format);
    }
    let (mode, supported) = if audio_only {
        ("audio", MediaFormat::audio_formats())
    } else {
        ("video", MediaFormat::video_formats())
    };
    Err(ValidationError::WrongFormatKind {
        format,
        mode,
        supported: supported
            .iter()
            .map(MediaFormat::as_str)
            .collect::<Vec<_>>()
            .join(", "),
    })
}

/// Combine flags and config into a checked, immutable request
pub fn build_intent(
    args: &DownloadArgs,
    config: &Config,
    verbose: bool,
) -> Result<DownloadIntent, ValidationError> {
    let url = normalize_url(args.url.as_deref().unwrap_or_default())?;

    // Audio is the default and an explicit --audio beats --video
    let audio_only = args.audio || !args.video;

    let format = match args.format {
        Some(f) => f,
        None if audio_only => config.default_format_audio,
        None => config.default_format_video,
    };
    let format = check_format(format, audio_only)?;
    let quality = parse_quality(&args.quality, audio_only)?;

    if let Some(path) = &args.cookies {
        if !path.is_file() {
            return Err(ValidationError::CookiesNotFound(path.clone()));
        }
    }

    let output_dir = match &args.output {
        Some(dir) => dir.clone(),
        None => default_output_dir(config.output_dir.as_deref(), audio_only, &url),
    };

    Ok(DownloadIntent {
        url,
        audio_only,
        format,
        quality,
        browser: args.browser.or(config.browser),
        cookies_file: args.cookies.clone(),
        output_dir,
        verbose,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::Browser;

    fn args(url: &str) -> DownloadArgs {
        DownloadArgs {
            url: Some(url.to_string()),
            quality: "best".to_string(),
            ..DownloadArgs::default()
        }
    }

    #[test]
    fn test_shell_escapes_are_removed() {
        let url = normalize_url(r"https://www.youtube.com/watch\?v\=abc\&t\=10").unwrap();
        assert_eq!(url.as_str(), "https://www.youtube.com/watch?v=abc&t=10");
    }

    #[test]
    fn test_url_errors() {
        assert_eq!(normalize_url("  "), Err(ValidationError::MissingUrl));
        assert!(matches!(normalize_url("not a url"), Err(ValidationError::InvalidUrl { .. })));
        assert_eq!(
            normalize_url("ftp://example.com/file"),
            Err(ValidationError::UnsupportedScheme("ftp".to_string()))
        );
    }

    #[test]
    fn test_quality_depends_on_mode() {
        assert_eq!(parse_quality("worst", true), Ok(Quality::Worst));
        assert_eq!(parse_quality("1080p", false), Ok(Quality::Height(1080)));
        assert!(parse_quality("1080p", true).is_err());
        assert!(parse_quality("1000p", false).is_err());
        assert!(parse_quality("high", false).is_err());
    }

    #[test]
    fn test_audio_is_default_mode() {
        let intent = build_intent(&args("https://example.com/v"), &Config::default(), false).unwrap();
        assert!(intent.audio_only);
        assert_eq!(intent.format, MediaFormat::M4a);
        assert_eq!(intent.quality, Quality::Best);
    }

    #[test]
    fn test_audio_flag_wins_over_video() {
        let mut a = args("https://example.com/v");
        a.audio = true;
        a.video = true;
        assert!(build_intent(&a, &Config::default(), false).unwrap().audio_only);

        a.audio = false;
        let intent = build_intent(&a, &Config::default(), false).unwrap();
        assert!(!intent.audio_only);
        assert_eq!(intent.format, MediaFormat::Mp4);
    }

    #[test]
    fn test_format_kind_must_match_mode() {
        let mut a = args("https://example.com/v");
        a.format = Some(MediaFormat::Mkv);
        let err = build_intent(&a, &Config::default(), false).unwrap_err();
        assert!(matches!(err, ValidationError::WrongFormatKind { mode: "audio", .. }));
    }

    #[test]
    fn test_missing_cookie_file() {
        let mut a = args("https://example.com/v");
        a.cookies = Some(PathBuf::from("/nonexistent/cookies.txt"));
        assert!(matches!(
            build_intent(&a, &Config::default(), false),
            Err(ValidationError::CookiesNotFound(_))
        ));
    }

    #[test]
    fn test_flags_override_config() {
        let config = Config {
            browser: Some(Browser::Chrome),
            output_dir: Some(PathBuf::from("/media")),
            ..Config::default()
        };
        let intent = build_intent(&args("https://vimeo.com/1"), &config, true).unwrap();
        assert_eq!(intent.browser, Some(Browser::Chrome));
        assert_eq!(intent.output_dir, PathBuf::from("/media/Audio/vimeo"));
        assert!(intent.verbose);

        let mut a = args("https://vimeo.com/1");
        a.browser = Some(Browser::Edge);
        a.output = Some(PathBuf::from("/here"));
        let intent = build_intent(&a, &config, false).unwrap();
        assert_eq!(intent.browser, Some(Browser::Edge));
        assert_eq!(intent.output_dir, PathBuf::from("/here"));
    }

    #[test]
    fn test_existing_cookie_file_is_kept() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut a = args("https://www.youtube.com/watch?v=abc");
        a.cookies = Some(file.path().to_path_buf());
        let intent = build_intent(&a, &Config::default(), false).unwrap();
        assert_eq!(intent.cookies_file.as_deref(), Some(file.path()));
    }
}
