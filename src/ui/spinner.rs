use crossterm::{
    cursor::{Hide, MoveToColumn, Show},
    queue,
    terminal::{Clear, ClearType},
};
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::style;
use crate::fetch::ProgressEvent;

pub const DEFAULT_REDRAW_INTERVAL: Duration = Duration::from_millis(80);

/// Single-line animated status: `<frame> <message> [<percent>%]`.
///
/// Cloning gives another handle to the same line. While running it owns the
/// cursor: hidden on `start`, shown again on `stop` or `cleanup`.
#[derive(Clone)]
pub struct Spinner {
    state: Arc<Mutex<State>>,
    interval: Duration,
}

struct State {
    out: Box<dyn Write + Send>,
    active: bool,
    started: Option<Instant>,
    frame: usize,
    message: String,
    progress: Option<u8>,
    ticker: Option<JoinHandle<()>>,
}

impl State {
    fn draw(&mut self) {
        let frame = style::SPINNER_FRAMES[self.frame % style::SPINNER_FRAMES.len()];
        self.frame = self.frame.wrapping_add(1);
        let line = render_line(frame, &self.message, self.progress);
        let _ = clear_line(&mut self.out);
        let _ = write!(self.out, "{}", line);
        let _ = self.out.flush();
    }

    fn halt(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        self.active = false;
        let _ = clear_line(&mut self.out);
        let _ = queue!(self.out, Show);
    }
}

fn clear_line(out: &mut impl Write) -> io::Result<()> {
    queue!(out, MoveToColumn(0), Clear(ClearType::CurrentLine))
}

impl Spinner {
    /// Spinner drawing to stdout
    pub fn new(interval: Duration) -> Self {
        Self::with_writer(interval, Box::new(io::stdout()))
    }

    pub fn with_writer(interval: Duration, out: Box<dyn Write + Send>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                out,
                active: false,
                started: None,
                frame: 0,
                message: String::new(),
                progress: None,
                ticker: None,
            })),
            interval,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Begin a new session. A session still running is cleaned up first,
    /// without a final status line.
    pub fn start(&self, message: impl Into<String>) {
        let mut state = self.lock();
        if state.active {
            state.halt();
            state.started = None;
        }

        state.active = true;
        state.started = Some(Instant::now());
        state.frame = 0;
        state.message = message.into();
        state.progress = None;
        let _ = queue!(state.out, Hide);
        state.draw();

        // Without a runtime the line is drawn once and never animated
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let shared = Arc::clone(&self.state);
            let period = self.interval;
            state.ticker = Some(handle.spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    let mut state = shared.lock().unwrap_or_else(PoisonError::into_inner);
                    if !state.active {
                        break;
                    }
                    state.draw();
                }
            }));
        }
    }

    pub fn update_message(&self, message: impl Into<String>) {
        let mut state = self.lock();
        if state.active {
            state.message = message.into();
        }
    }

    pub fn update_progress(&self, percent: f32) {
        let mut state = self.lock();
        if state.active {
            state.progress = Some(percent.clamp(0.0, 100.0).round() as u8);
        }
    }

    pub fn clear_progress(&self) {
        let mut state = self.lock();
        if state.active {
            state.progress = None;
        }
    }

    /// End the session with a colored `✓`/`✗` line and the elapsed time
    pub fn stop(&self, success: bool, message: Option<&str>) {
        let mut state = self.lock();
        if !state.active {
            return;
        }
        state.halt();

        if let Some(started) = state.started.take() {
            let default = if success { "Completed!" } else { "Failed!" };
            let line = final_line(success, started.elapsed(), message.unwrap_or(default));
            let _ = writeln!(state.out, "{}", line);
        }
        let _ = state.out.flush();
    }

    pub fn is_running(&self) -> bool {
        self.lock().active
    }

    /// Emergency stop: restore the cursor and clear the line, printing nothing
    pub fn cleanup(&self) {
        let mut state = self.lock();
        state.halt();
        state.started = None;
        let _ = state.out.flush();
    }

    /// Reflect one parser event on the status line
    pub fn apply(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Title(title) => self.update_message(format!("Downloading {}", title)),
            ProgressEvent::Progress(percent) => self.update_progress(percent),
            ProgressEvent::ConvertingPhase => {
                self.clear_progress();
                self.update_message("Converting...");
            }
            ProgressEvent::Completed(name) => self.stop(true, Some(&name)),
            ProgressEvent::Failed(reason) => self.stop(false, Some(&reason)),
        }
    }
}

impl Drop for State {
    fn drop(&mut self) {
        if self.active {
            self.halt();
            let _ = self.out.flush();
        }
    }
}

/// `<frame> <message>` with ` <percent>%` appended when known
pub fn render_line(frame: &str, message: &str, progress: Option<u8>) -> String {
    match progress {
        Some(p) => format!("{} {} {}%", frame, message, p),
        None => format!("{} {}", frame, message),
    }
}

fn final_line(success: bool, elapsed: Duration, message: &str) -> String {
    let secs = elapsed.as_secs_f32();
    let stamp = if success {
        style::success_style(format!("{} {:.1}s", style::CHECK, secs))
    } else {
        style::error_style(format!("{} {:.1}s", style::CROSS, secs))
    };
    format!("{} {}", stamp, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Clonable in-memory terminal
    #[derive(Clone, Default)]
    struct Screen(Arc<Mutex<Vec<u8>>>);

    impl Write for Screen {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Screen {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    const HIDE: &str = "\x1b[?25l";
    const SHOW: &str = "\x1b[?25h";

    fn spinner() -> (Spinner, Screen) {
        let screen = Screen::default();
        let spinner = Spinner::with_writer(DEFAULT_REDRAW_INTERVAL, Box::new(screen.clone()));
        (spinner, screen)
    }

    #[test]
    fn test_render_line() {
        assert_eq!(render_line("⠋", "Working", None), "⠋ Working");
        assert_eq!(render_line("⠙", "Working", Some(42)), "⠙ Working 42%");
    }

    #[tokio::test]
    async fn test_lifecycle_owns_cursor() {
        let (spinner, screen) = spinner();
        assert!(!spinner.is_running());

        spinner.start("Fetching");
        assert!(spinner.is_running());
        assert!(screen.text().contains(HIDE));
        assert!(screen.text().contains("⠋ Fetching"));

        spinner.stop(true, Some("song.mp3"));
        assert!(!spinner.is_running());
        let text = screen.text();
        assert!(text.ends_with("song.mp3\n"), "{:?}", text);
        assert!(text.contains(SHOW));
        assert!(text.contains(style::CHECK));
    }

    #[tokio::test]
    async fn test_updates_ignored_when_stopped() {
        let (spinner, screen) = spinner();
        spinner.update_message("nobody sees this");
        spinner.update_progress(50.0);
        spinner.stop(false, None);
        assert_eq!(screen.text(), "");
    }

    #[tokio::test]
    async fn test_failure_line_uses_default_message() {
        let (spinner, screen) = spinner();
        spinner.start("Fetching");
        spinner.stop(false, None);
        let text = screen.text();
        assert!(text.contains(style::CROSS));
        assert!(text.ends_with("Failed!\n"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_redraws_with_progress() {
        let (spinner, screen) = spinner();
        spinner.start("Downloading");
        spinner.update_progress(33.4);
        tokio::time::sleep(DEFAULT_REDRAW_INTERVAL * 2 + Duration::from_millis(1)).await;
        let text = screen.text();
        assert!(text.contains("Downloading 33%"), "{:?}", text);
        spinner.cleanup();
    }

    #[tokio::test]
    async fn test_restart_cleans_up_previous_session() {
        let (spinner, screen) = spinner();
        spinner.start("first");
        spinner.start("second");
        assert!(spinner.is_running());
        // No final line for the interrupted session
        assert!(!screen.text().contains(style::CHECK));
        assert!(!screen.text().contains(style::CROSS));
        spinner.cleanup();
        assert!(!spinner.is_running());
        assert!(screen.text().ends_with(SHOW));
    }

    #[tokio::test]
    async fn test_apply_events() {
        let (spinner, screen) = spinner();
        spinner.start("Starting");
        spinner.apply(ProgressEvent::Title("Song".to_string()));
        spinner.apply(ProgressEvent::Progress(99.9));
        {
            let state = spinner.lock();
            assert_eq!(state.message, "Downloading Song");
            assert_eq!(state.progress, Some(100));
        }
        spinner.apply(ProgressEvent::ConvertingPhase);
        assert_eq!(spinner.lock().progress, None);

        spinner.apply(ProgressEvent::Completed("Song [id].mp3".to_string()));
        assert!(!spinner.is_running());
        assert!(screen.text().ends_with("Song [id].mp3\n"));
    }
}
