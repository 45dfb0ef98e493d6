use async_trait::async_trait;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::error::ProcessError;
use super::guard::{self, LivenessGuard, DEFAULT_INACTIVITY_WINDOW, DEFAULT_KILL_GRACE};
use super::intent::CredentialSource;
use super::parser::{display_name, OutputParser, ProgressEvent};
use super::plan::InvocationPlan;

const READ_CHUNK: usize = 8 * 1024;

/// Receives progress events synchronously, in stream order
pub type EventSink = Box<dyn Fn(ProgressEvent) + Send + Sync>;

/// Result of an attempt that exited with status 0
#[derive(Debug, Clone, Default)]
pub struct RunOutput {
    pub stdout: String,
    pub stderr: String,
    /// Post-conversion destination if known, otherwise the download destination
    pub filename: Option<PathBuf>,
    pub title: Option<String>,
    pub already_downloaded: bool,
}

/// Executes one attempt of an invocation plan
#[async_trait]
pub trait AttemptRunner: Send {
    async fn run(
        &mut self,
        plan: &InvocationPlan,
        credential: Option<&CredentialSource>,
    ) -> Result<RunOutput, ProcessError>;
}

/// Spawns yt-dlp and watches it until it exits or goes silent
pub struct ProcessRunner {
    program: PathBuf,
    inactivity_window: Duration,
    kill_grace: Duration,
    events: Option<EventSink>,
}

impl ProcessRunner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            inactivity_window: DEFAULT_INACTIVITY_WINDOW,
            kill_grace: DEFAULT_KILL_GRACE,
            events: None,
        }
    }

    pub fn with_inactivity_window(mut self, window: Duration) -> Self {
        self.inactivity_window = window;
        self
    }

    pub fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    /// Forward parsed progress to a presenter
    pub fn with_events(mut self, sink: impl Fn(ProgressEvent) + Send + Sync + 'static) -> Self {
        self.events = Some(Box::new(sink));
        self
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(sink) = &self.events {
            sink(event);
        }
    }

    async fn run_attempt(
        &self,
        plan: &InvocationPlan,
        credential: Option<&CredentialSource>,
    ) -> Result<RunOutput, ProcessError> {
        let args = plan.command_args(credential);
        debug!("Spawning {} {:?}", self.program.display(), args);

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        let mut attempt = Attempt::new(credential.cloned(), self.inactivity_window);
        let status = self.supervise(&mut child, &mut attempt).await?;

        for event in attempt.parser.finish() {
            self.emit(event);
        }

        info!(
            "yt-dlp finished in {:.1}s (credential: {})",
            attempt.started.elapsed().as_secs_f32(),
            attempt
                .credential
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "none".to_string())
        );

        if attempt.killed {
            return Err(ProcessError::Timeout {
                window: self.inactivity_window,
                stdout: attempt.stdout,
                stderr: attempt.stderr,
            });
        }

        match status {
            Some(status) if status.success() => Ok(RunOutput {
                filename: attempt.parser.final_filename().map(PathBuf::from),
                title: attempt.parser.title().map(str::to_string),
                already_downloaded: attempt.parser.already_downloaded(),
                stdout: attempt.stdout,
                stderr: attempt.stderr,
            }),
            other => Err(ProcessError::Exit {
                code: other.and_then(|s| s.code()),
                stdout: attempt.stdout,
                stderr: attempt.stderr,
            }),
        }
    }

    /// Pump both pipes until they close, then reap the child. Returns `None`
    /// when the liveness guard fired and the process was terminated.
    async fn supervise(
        &self,
        child: &mut Child,
        attempt: &mut Attempt,
    ) -> Result<Option<ExitStatus>, ProcessError> {
        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();
        let mut out_buf = vec![0u8; READ_CHUNK];
        let mut err_buf = vec![0u8; READ_CHUNK];

        attempt.guard.arm(Instant::now());

        while stdout.is_some() || stderr.is_some() {
            let deadline = match attempt.guard.deadline() {
                Some(d) => d,
                None => break,
            };

            tokio::select! {
                read = read_some(&mut stdout, &mut out_buf), if stdout.is_some() => {
                    match read {
                        Some(n) => {
                            attempt.guard.touch(Instant::now());
                            let text = attempt.stdout_decoder.decode(&out_buf[..n]);
                            attempt.stdout.push_str(&text);
                            for event in attempt.parser.feed(&text) {
                                self.emit(event);
                            }
                        }
                        None => stdout = None,
                    }
                }
                read = read_some(&mut stderr, &mut err_buf), if stderr.is_some() => {
                    match read {
                        Some(n) => {
                            attempt.guard.touch(Instant::now());
                            // stderr only counts as activity; the parser reads stdout
                            let text = attempt.stderr_decoder.decode(&err_buf[..n]);
                            debug!(target: "yt-dlp", "{}", text.trim_end());
                            attempt.stderr.push_str(&text);
                        }
                        None => stderr = None,
                    }
                }
                _ = tokio::time::sleep_until(deadline) => {
                    if attempt.guard.poll(Instant::now()) {
                        warn!(
                            "No output from yt-dlp for {}s, terminating",
                            self.inactivity_window.as_secs()
                        );
                        attempt.killed = true;
                        self.stop_stalled(child).await;
                        return Ok(None);
                    }
                }
            }
        }

        // Pipes are closed; the process is exiting or has exited
        let status = tokio::select! {
            status = child.wait() => status?,
            _ = tokio::time::sleep(self.inactivity_window) => {
                warn!("yt-dlp closed its output but did not exit, terminating");
                attempt.killed = true;
                self.stop_stalled(child).await;
                return Ok(None);
            }
        };
        attempt.guard.cancel();
        Ok(Some(status))
    }

    /// Escalating termination; the attempt is a timeout whatever happens here
    async fn stop_stalled(&self, child: &mut Child) {
        if let Err(e) = guard::escalate(child, self.kill_grace).await {
            warn!("Failed to stop stalled yt-dlp: {}", e);
        }
    }
}

#[async_trait]
impl AttemptRunner for ProcessRunner {
    async fn run(
        &mut self,
        plan: &InvocationPlan,
        credential: Option<&CredentialSource>,
    ) -> Result<RunOutput, ProcessError> {
        let result = self.run_attempt(plan, credential).await;
        match &result {
            Ok(output) => self.emit(ProgressEvent::Completed(display_name(output.filename.as_deref()))),
            Err(e) => self.emit(ProgressEvent::Failed(e.to_string())),
        }
        result
    }
}

/// State of one spawned process, owned by the runner for its lifetime
struct Attempt {
    credential: Option<CredentialSource>,
    started: Instant,
    stdout: String,
    stderr: String,
    stdout_decoder: Utf8Decoder,
    stderr_decoder: Utf8Decoder,
    parser: OutputParser,
    guard: LivenessGuard,
    killed: bool,
}

impl Attempt {
    fn new(credential: Option<CredentialSource>, window: Duration) -> Self {
        Self {
            credential,
            started: Instant::now(),
            stdout: String::new(),
            stderr: String::new(),
            stdout_decoder: Utf8Decoder::default(),
            stderr_decoder: Utf8Decoder::default(),
            parser: OutputParser::new(),
            guard: LivenessGuard::new(window),
            killed: false,
        }
    }
}

/// Read one chunk; `None` on EOF or a broken pipe
async fn read_some<R: AsyncRead + Unpin>(reader: &mut Option<R>, buf: &mut [u8]) -> Option<usize> {
    let reader = reader.as_mut()?;
    match reader.read(buf).await {
        Ok(0) => None,
        Ok(n) => Some(n),
        Err(e) => {
            warn!("Error reading yt-dlp output: {}", e);
            None
        }
    }
}

/// Lossy UTF-8 decoding that keeps a multi-byte character split across two
/// reads intact.
#[derive(Debug, Default)]
struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let valid_up_to = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            // Incomplete sequence at the end: keep it for the next read
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => self.pending.len(),
        };
        let rest = self.pending.split_off(valid_up_to);
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending = rest;
        text
    }
}
