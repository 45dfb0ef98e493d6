//! Incremental parser for yt-dlp's human-readable stdout.
//!
//! The text protocol is not a stable interface, so matching is best effort:
//! when nothing is recognized the filename simply stays unknown and callers
//! fall back to [`UNKNOWN_FILE_LABEL`]. Everything else in the crate consumes
//! the structured [`ProgressEvent`]s produced here, never raw output.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

/// Label shown when no destination line was ever seen
pub const UNKNOWN_FILE_LABEL: &str = "Downloaded file";

static DOWNLOAD_DEST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[download\]\s+Destination:\s+(.+?)\s*$").unwrap());
static EXTRACT_AUDIO_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[ExtractAudio\]").unwrap());
static EXTRACT_DEST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[ExtractAudio\]\s+Destination:\s+(.+?)\s*$").unwrap());
static MERGER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\[Merger\]\s+Merging formats into\s+"(.+)"\s*$"#).unwrap());
static ALREADY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[download\]\s+(.+?)\s+has already been downloaded").unwrap());
static PROGRESS_STATUS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\[download\]\s+\d{1,3}(?:\.\d+)?%").unwrap());
static PERCENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{1,3}(?:\.\d+)?)%").unwrap());
static ID_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\[[^\[\]]+\]$").unwrap());
static FORMAT_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.f\d+(?:-\d+)?$").unwrap());

/// Structured event derived from the subprocess output
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Title(String),
    Progress(f32),
    ConvertingPhase,
    Completed(String),
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Downloading,
    Converting,
}

/// Parses stdout chunk by chunk.
///
/// Output may be split at any byte offset, so chunks are appended to a
/// buffer and only complete lines (ended by `\n` or `\r`) are matched against
/// the line patterns. An unterminated tail that already reads as a progress
/// status (`[download]  42.0%`) is checked for its percentage, which lets
/// progress show up before the line is finished. Any other tail waits, since
/// a filename may contain `%`.
#[derive(Debug)]
pub struct OutputParser {
    buffer: String,
    phase: Phase,
    last_percent: Option<f32>,
    title: Option<String>,
    destination: Option<PathBuf>,
    final_destination: Option<PathBuf>,
    already_downloaded: bool,
}

impl Default for OutputParser {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputParser {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            phase: Phase::Idle,
            last_percent: None,
            title: None,
            destination: None,
            final_destination: None,
            already_downloaded: false,
        }
    }

    /// Feed one chunk and return the events it produced, in order
    pub fn feed(&mut self, chunk: &str) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        self.buffer.push_str(chunk);

        while let Some(end) = self.buffer.find(['\n', '\r']) {
            let line: String = self.buffer.drain(..=end).collect();
            let line = line.trim_end_matches(['\n', '\r']);
            if !line.trim().is_empty() {
                self.handle_line(line, &mut events);
            }
        }

        if PROGRESS_STATUS_RE.is_match(&self.buffer) {
            let tail = std::mem::take(&mut self.buffer);
            self.handle_progress(&tail, &mut events);
            self.buffer = tail;
        }

        events
    }

    /// Flush whatever is left once the stream has closed
    pub fn finish(&mut self) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        let rest = std::mem::take(&mut self.buffer);
        if !rest.trim().is_empty() {
            self.handle_line(rest.trim_end(), &mut events);
        }
        events
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Best known output file: the post-processing destination when there
    /// was one, since audio extraction and merging rename the file.
    pub fn final_filename(&self) -> Option<&Path> {
        self.final_destination
            .as_deref()
            .or(self.destination.as_deref())
    }

    pub fn already_downloaded(&self) -> bool {
        self.already_downloaded
    }

    pub fn is_converting(&self) -> bool {
        self.phase == Phase::Converting
    }

    fn handle_line(&mut self, line: &str, events: &mut Vec<ProgressEvent>) {
        let line = line.trim_start();

        if let Some(caps) = DOWNLOAD_DEST_RE.captures(line) {
            let path = PathBuf::from(&caps[1]);
            self.phase = Phase::Downloading;
            self.last_percent = None;
            self.emit_title(&path, events);
            self.destination = Some(path);
            return;
        }

        if let Some(caps) = ALREADY_RE.captures(line) {
            let path = PathBuf::from(&caps[1]);
            self.already_downloaded = true;
            self.emit_title(&path, events);
            self.destination = Some(path);
            return;
        }

        if EXTRACT_AUDIO_RE.is_match(line) {
            self.enter_conversion(events);
            if let Some(caps) = EXTRACT_DEST_RE.captures(line) {
                self.final_destination = Some(PathBuf::from(&caps[1]));
            }
            return;
        }

        if let Some(caps) = MERGER_RE.captures(line) {
            self.enter_conversion(events);
            self.final_destination = Some(PathBuf::from(&caps[1]));
            return;
        }

        if line.starts_with("[download]") {
            self.handle_progress(line, events);
        }
    }

    fn enter_conversion(&mut self, events: &mut Vec<ProgressEvent>) {
        if self.phase != Phase::Converting {
            self.phase = Phase::Converting;
            self.last_percent = None;
            events.push(ProgressEvent::ConvertingPhase);
        }
    }

    fn handle_progress(&mut self, text: &str, events: &mut Vec<ProgressEvent>) {
        if self.phase == Phase::Converting {
            return;
        }

        let percent = match PERCENT_RE
            .captures_iter(text)
            .filter_map(|caps| caps[1].parse::<f32>().ok())
            .filter(|p| (0.0..=100.0).contains(p))
            .last()
        {
            Some(p) => p,
            None => return,
        };

        // Non-decreasing within one download phase; repeats are dropped
        if self.last_percent.is_some_and(|last| percent <= last) {
            return;
        }
        self.last_percent = Some(percent);
        events.push(ProgressEvent::Progress(percent));
    }

    fn emit_title(&mut self, path: &Path, events: &mut Vec<ProgressEvent>) {
        let title = title_from_path(path);
        if self.title.as_deref() != Some(title.as_str()) {
            self.title = Some(title.clone());
            events.push(ProgressEvent::Title(title));
        }
    }
}

/// File stem with the per-format `.f137` part and the trailing ` [id]` removed
pub fn title_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = FORMAT_SUFFIX_RE.replace(&stem, "");
    ID_SUFFIX_RE.replace(&stem, "").trim().to_string()
}

/// Display name for a possibly unknown output file
pub fn display_name(path: Option<&Path>) -> String {
    path.and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| UNKNOWN_FILE_LABEL.to_string())
}
