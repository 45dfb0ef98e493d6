use once_cell::sync::Lazy;
use regex::Regex;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Why a single yt-dlp attempt did not succeed
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("yt-dlp exited with {}", describe_code(.code))]
    Exit {
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("no output from yt-dlp for {}s, process terminated", .window.as_secs())]
    Timeout {
        window: Duration,
        stdout: String,
        stderr: String,
    },

    #[error("lost track of yt-dlp process: {0}")]
    Io(#[from] io::Error),
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("exit code {}", c),
        None => "no exit code (killed by a signal)".to_string(),
    }
}

impl ProcessError {
    pub fn stdout(&self) -> &str {
        match self {
            ProcessError::Exit { stdout, .. } | ProcessError::Timeout { stdout, .. } => stdout,
            _ => "",
        }
    }

    pub fn stderr(&self) -> &str {
        match self {
            ProcessError::Exit { stderr, .. } | ProcessError::Timeout { stderr, .. } => stderr,
            _ => "",
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ProcessError::Exit { code, .. } => *code,
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ProcessError::Timeout { .. })
    }

    /// Spawn failures are environmental; switching cookies cannot fix them
    pub fn is_spawn_failure(&self) -> bool {
        matches!(self, ProcessError::Spawn { .. })
    }

    /// Text used for classification: the error itself plus stderr. Stdout
    /// carries titles and paths, which must not be mistaken for a cause.
    pub fn diagnostic_text(&self) -> String {
        format!("{}\n{}", self, self.stderr())
    }
}

static BOT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)sign in to confirm|\bbot\b|failed to extract any player response").unwrap()
});
static MISSING_DEP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bffmpeg\b|\bffprobe\b").unwrap());

/// User-facing classification of a failed download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagnosis {
    BotDetection,
    MissingDependency,
    Timeout,
    SpawnFailure,
    DownloadFailed,
}

impl Diagnosis {
    pub fn of(error: &ProcessError) -> Self {
        if error.is_spawn_failure() {
            return Diagnosis::SpawnFailure;
        }

        let text = error.diagnostic_text();
        if BOT_RE.is_match(&text) {
            Diagnosis::BotDetection
        } else if MISSING_DEP_RE.is_match(&text) {
            Diagnosis::MissingDependency
        } else if error.is_timeout() {
            Diagnosis::Timeout
        } else {
            Diagnosis::DownloadFailed
        }
    }

    /// Whether the failure looks like account or anti-bot gating, which a
    /// different credential source might get past
    pub fn is_credential_related(&self) -> bool {
        matches!(self, Diagnosis::BotDetection)
    }

    pub fn headline(&self) -> &'static str {
        match self {
            Diagnosis::BotDetection => "The site blocked access. Browser cookies are required.",
            Diagnosis::MissingDependency => "FFmpeg not found. Install FFmpeg to process audio and video.",
            Diagnosis::Timeout => "yt-dlp stopped responding and was terminated.",
            Diagnosis::SpawnFailure => "yt-dlp could not be started. Is it installed and on PATH?",
            Diagnosis::DownloadFailed => "Download failed. Check the URL and your internet connection.",
        }
    }

    pub fn remediation(&self) -> &'static [&'static str] {
        match self {
            Diagnosis::BotDetection => &[
                "Pass a browser explicitly: universal-downloader \"URL\" -b safari",
                "Or export cookies and use: universal-downloader \"URL\" -c cookies.txt",
                "Make sure you are signed in to the site in that browser",
                "On macOS, grant the terminal Full Disk Access so Safari cookies can be read",
            ],
            Diagnosis::MissingDependency => &[
                "macOS: brew install ffmpeg",
                "Linux: sudo apt install ffmpeg",
                "Windows: download from https://ffmpeg.org/download.html",
            ],
            _ => &[],
        }
    }
}
