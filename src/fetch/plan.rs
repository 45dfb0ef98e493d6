use std::path::PathBuf;

use super::intent::{CredentialSource, DownloadIntent, MediaFormat, Quality};
use super::site::Site;

/// Maximum number of title characters in the output filename
pub const TITLE_MAX_LENGTH: usize = 200;

const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

const PRIMARY_EXTRACTOR_ARGS: &str = "youtube:player_client=web,android";

const PRIMARY_HEADERS: [&str; 9] = [
    "referer:youtube.com",
    "accept:text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8",
    "accept-language:en-US,en;q=0.9",
    "accept-encoding:gzip, deflate, br",
    "sec-fetch-dest:document",
    "sec-fetch-mode:navigate",
    "sec-fetch-site:none",
    "sec-fetch-user:?1",
    "upgrade-insecure-requests:1",
];

const GENERIC_HEADERS: [&str; 2] = [
    "accept:*/*",
    "accept-language:en-US,en;q=0.9",
];

const CONCURRENT_FRAGMENTS: u32 = 4;
const FRAGMENT_RETRIES: u32 = 10;

/// Fully resolved argument list for one yt-dlp attempt, plus what is needed
/// to make sense of the result afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationPlan {
    args: Vec<String>,
    pub audio_only: bool,
    pub format: MediaFormat,
    pub quality: Quality,
    pub output_path: PathBuf,
}

impl InvocationPlan {
    /// Arguments without any credential source
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Arguments for an attempt, with the credential flag placed first
    pub fn command_args(&self, credential: Option<&CredentialSource>) -> Vec<String> {
        let mut args = credential.map(CredentialSource::args).unwrap_or_default();
        args.extend(self.args.iter().cloned());
        args
    }

    #[cfg(test)]
    pub(crate) fn from_raw(args: Vec<String>) -> Self {
        Self {
            args,
            audio_only: true,
            format: MediaFormat::Mp3,
            quality: Quality::Best,
            output_path: PathBuf::from("."),
        }
    }
}

/// Output template: capped title, id in brackets, original extension
pub fn output_template() -> String {
    format!("%(title).{}s [%(id)s].%(ext)s", TITLE_MAX_LENGTH)
}

/// Format selector for video mode
pub fn video_selector(quality: Quality) -> String {
    match quality {
        Quality::Best => "bestvideo+bestaudio/best".to_string(),
        Quality::Worst => "worst".to_string(),
        Quality::Height(h) => format!("bestvideo[height<={h}]+bestaudio/best[height<={h}]"),
    }
}

/// yt-dlp audio quality scale: 0 is best, 10 is worst
fn audio_quality_value(quality: Quality) -> &'static str {
    match quality {
        Quality::Worst => "10",
        _ => "0",
    }
}

/// Build the invocation plan for an intent.
///
/// Pure and deterministic: the same intent always yields the same arguments.
/// Credential flags are not part of the plan; they are added per attempt by
/// [`InvocationPlan::command_args`].
pub fn resolve(intent: &DownloadIntent) -> InvocationPlan {
    let site = Site::classify(&intent.url);
    let mut args: Vec<String> = Vec::new();
    let mut push = |items: &[&str]| args.extend(items.iter().map(|s| s.to_string()));

    if intent.audio_only {
        let selector = match intent.quality {
            Quality::Worst => "worstaudio/worst",
            _ => "bestaudio/best",
        };
        push(&["-f", selector]);
        push(&["--extract-audio"]);
        push(&["--audio-format", intent.format.as_str()]);
        push(&["--audio-quality", audio_quality_value(intent.quality)]);
    } else {
        let selector = video_selector(intent.quality);
        push(&["-f", selector.as_str()]);
        if !intent.format.is_audio() {
            push(&["--merge-output-format", intent.format.as_str()]);
        }
    }

    let template = intent.output_dir.join(output_template());
    push(&["--output", &*template.to_string_lossy()]);
    push(&["--newline", "--no-warnings"]);

    // Accessibility over strict validation
    push(&["--no-check-certificates", "--compat-options", "no-certifi"]);
    push(&["--age-limit", "99"]);

    let user_agent = format!("user-agent:{}", DESKTOP_USER_AGENT);
    if site.is_primary() {
        push(&["--extractor-args", PRIMARY_EXTRACTOR_ARGS]);
        push(&["--add-header", user_agent.as_str()]);
        for header in PRIMARY_HEADERS {
            push(&["--add-header", header]);
        }
    } else {
        push(&["--add-header", user_agent.as_str()]);
        for header in GENERIC_HEADERS {
            push(&["--add-header", header]);
        }
        push(&["--concurrent-fragments", CONCURRENT_FRAGMENTS.to_string().as_str()]);
        push(&["--fragment-retries", FRAGMENT_RETRIES.to_string().as_str()]);
        push(&["--hls-prefer-native"]);
    }

    push(&[intent.url.as_str()]);

    InvocationPlan {
        args,
        audio_only: intent.audio_only,
        format: intent.format,
        quality: intent.quality,
        output_path: intent.output_dir.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::intent::Browser;
    use pretty_assertions::assert_eq;
    use url::Url;

    fn intent(url: &str, audio_only: bool, format: MediaFormat, quality: Quality) -> DownloadIntent {
        DownloadIntent {
            url: Url::parse(url).unwrap(),
            audio_only,
            format,
            quality,
            browser: None,
            cookies_file: None,
            output_dir: PathBuf::from("/downloads"),
            verbose: false,
        }
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn test_resolution_quality_bounds_height() {
        for height in crate::fetch::intent::VIDEO_HEIGHTS {
            let plan = resolve(&intent(
                "https://example.com/v",
                false,
                MediaFormat::Mp4,
                Quality::Height(height),
            ));
            let selector = value_after(plan.args(), "-f").unwrap();
            assert!(selector.contains(&format!("[height<={}]", height)), "{}", selector);
            assert!(!selector.contains("[height<=0]"));
        }
    }

    #[test]
    fn test_video_extremes_never_extract_audio() {
        for quality in [Quality::Best, Quality::Worst] {
            for format in MediaFormat::video_formats() {
                let plan = resolve(&intent("https://youtu.be/abc", false, *format, quality));
                assert!(!plan.args().iter().any(|a| a == "--extract-audio"));
            }
        }
    }

    #[test]
    fn test_video_selectors() {
        assert_eq!(video_selector(Quality::Best), "bestvideo+bestaudio/best");
        assert_eq!(video_selector(Quality::Worst), "worst");
        assert_eq!(
            video_selector(Quality::Height(720)),
            "bestvideo[height<=720]+bestaudio/best[height<=720]"
        );
    }

    #[test]
    fn test_audio_plan() {
        let plan = resolve(&intent("https://example.com/v", true, MediaFormat::Mp3, Quality::Best));
        let args = plan.args();
        assert!(args.iter().any(|a| a == "--extract-audio"));
        assert_eq!(value_after(args, "--audio-format"), Some("mp3"));
        assert_eq!(value_after(args, "--audio-quality"), Some("0"));
        assert_eq!(args.last().map(String::as_str), Some("https://example.com/v"));
        assert!(plan.audio_only);
    }

    #[test]
    fn test_audio_worst_quality() {
        let plan = resolve(&intent("https://example.com/v", true, MediaFormat::M4a, Quality::Worst));
        assert_eq!(value_after(plan.args(), "--audio-quality"), Some("10"));
        assert_eq!(value_after(plan.args(), "-f"), Some("worstaudio/worst"));
    }

    #[test]
    fn test_output_template_caps_title() {
        let plan = resolve(&intent("https://example.com/v", true, MediaFormat::Mp3, Quality::Best));
        assert_eq!(
            value_after(plan.args(), "--output"),
            Some("/downloads/%(title).200s [%(id)s].%(ext)s")
        );
    }

    #[test]
    fn test_safety_flags_always_present() {
        for url in ["https://example.com/v", "https://www.youtube.com/watch?v=x"] {
            let plan = resolve(&intent(url, true, MediaFormat::Mp3, Quality::Best));
            let args = plan.args();
            assert!(args.iter().any(|a| a == "--no-check-certificates"));
            assert_eq!(value_after(args, "--age-limit"), Some("99"));
        }
    }

    #[test]
    fn test_primary_site_headers() {
        let plan = resolve(&intent(
            "https://www.youtube.com/watch?v=x",
            true,
            MediaFormat::Mp3,
            Quality::Best,
        ));
        let args = plan.args();
        assert_eq!(value_after(args, "--extractor-args"), Some(PRIMARY_EXTRACTOR_ARGS));
        assert!(args.iter().any(|a| a == "referer:youtube.com"));
        assert!(!args.iter().any(|a| a == "--concurrent-fragments"));
    }

    #[test]
    fn test_generic_site_speedups() {
        let plan = resolve(&intent("https://vimeo.com/1", false, MediaFormat::Mkv, Quality::Best));
        let args = plan.args();
        assert_eq!(value_after(args, "--concurrent-fragments"), Some("4"));
        assert_eq!(value_after(args, "--fragment-retries"), Some("10"));
        assert!(args.iter().any(|a| a == "--hls-prefer-native"));
        assert!(!args.iter().any(|a| a == "--extractor-args"));
        assert_eq!(value_after(args, "--merge-output-format"), Some("mkv"));
    }

    #[test]
    fn test_command_args_prepend_credential() {
        let plan = resolve(&intent("https://youtu.be/x", true, MediaFormat::Mp3, Quality::Best));
        let cred = CredentialSource::Browser(Browser::Chrome);
        let args = plan.command_args(Some(&cred));
        assert_eq!(&args[..2], &["--cookies-from-browser".to_string(), "chrome".to_string()]);
        assert_eq!(&args[2..], plan.args());
        assert_eq!(plan.command_args(None), plan.args().to_vec());
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let i = intent("https://youtu.be/x", false, MediaFormat::Mp4, Quality::Height(1080));
        assert_eq!(resolve(&i), resolve(&i));
    }
}
