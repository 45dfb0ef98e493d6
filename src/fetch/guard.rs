use async_trait::async_trait;
use std::io;
use std::time::Duration;
use tokio::process::Child;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Inactivity window after which a silent process is presumed stalled
pub const DEFAULT_INACTIVITY_WINDOW: Duration = Duration::from_secs(60);

/// Time a process gets to exit after the graceful signal
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Idle,
    Armed { deadline: Instant },
    Fired,
    Cancelled,
}

/// Restartable inactivity countdown for one running process.
///
/// `Idle -> Armed -> {Fired | Cancelled}`. The deadline is always the last
/// activity plus the window. `Fired` and `Cancelled` are terminal: touching,
/// re-arming or polling them again does nothing, so the guard fires at most
/// once.
#[derive(Debug)]
pub struct LivenessGuard {
    window: Duration,
    state: GuardState,
}

impl LivenessGuard {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: GuardState::Idle,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn state(&self) -> GuardState {
        self.state
    }

    /// Start the countdown; only valid from `Idle`
    pub fn arm(&mut self, now: Instant) {
        if self.state == GuardState::Idle {
            self.state = GuardState::Armed {
                deadline: now + self.window,
            };
        }
    }

    /// Record stream activity, restarting the countdown from `now`
    pub fn touch(&mut self, now: Instant) {
        if let GuardState::Armed { .. } = self.state {
            self.state = GuardState::Armed {
                deadline: now + self.window,
            };
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            GuardState::Armed { deadline } => Some(deadline),
            _ => None,
        }
    }

    /// Returns `true` exactly once, on the transition to `Fired`
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.state {
            GuardState::Armed { deadline } if now >= deadline => {
                self.state = GuardState::Fired;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        if matches!(self.state, GuardState::Idle | GuardState::Armed { .. }) {
            self.state = GuardState::Cancelled;
        }
    }

    pub fn has_fired(&self) -> bool {
        self.state == GuardState::Fired
    }
}

/// A process that can be asked to stop, then forced to
#[async_trait]
pub trait Terminate: Send {
    /// SIGTERM, or the closest equivalent
    fn terminate(&mut self) -> io::Result<()>;

    /// SIGKILL, or the closest equivalent
    async fn kill(&mut self) -> io::Result<()>;

    async fn wait_exit(&mut self) -> io::Result<()>;
}

#[async_trait]
impl Terminate for Child {
    #[cfg(unix)]
    fn terminate(&mut self) -> io::Result<()> {
        let pid = match self.id() {
            Some(pid) => pid,
            // Already reaped
            None => return Ok(()),
        };
        // SAFETY: plain kill(2) on a pid we spawned and have not yet reaped
        let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
        if rc == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    #[cfg(not(unix))]
    fn terminate(&mut self) -> io::Result<()> {
        self.start_kill()
    }

    async fn kill(&mut self) -> io::Result<()> {
        Child::kill(self).await
    }

    async fn wait_exit(&mut self) -> io::Result<()> {
        self.wait().await.map(|_| ())
    }
}

/// Stop a stalled process: graceful signal first, forceful kill if it is
/// still running after `grace`.
pub async fn escalate<P: Terminate + ?Sized>(process: &mut P, grace: Duration) -> io::Result<()> {
    if let Err(e) = process.terminate() {
        warn!("Graceful termination failed: {}", e);
    }

    match tokio::time::timeout(grace, process.wait_exit()).await {
        Ok(result) => {
            debug!("Process exited after termination signal");
            result
        }
        Err(_) => {
            warn!("Process ignored termination for {:?}, killing", grace);
            process.kill().await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    const WINDOW: Duration = Duration::from_secs(30);

    #[test]
    fn test_touch_keeps_guard_from_firing() {
        let start = Instant::now();
        let mut guard = LivenessGuard::new(WINDOW);
        guard.arm(start);

        let mut now = start;
        for _ in 0..1000 {
            now += Duration::from_secs(29);
            assert!(!guard.poll(now));
            guard.touch(now);
        }
        assert_eq!(guard.deadline(), Some(now + WINDOW));
    }

    #[test]
    fn test_fires_once_after_window() {
        let start = Instant::now();
        let mut guard = LivenessGuard::new(WINDOW);
        guard.arm(start);
        guard.touch(start + Duration::from_secs(10));

        assert!(!guard.poll(start + Duration::from_secs(39)));
        assert!(guard.poll(start + Duration::from_secs(40)));
        assert!(guard.has_fired());
        assert!(!guard.poll(start + Duration::from_secs(100)));

        // Terminal state ignores further activity
        guard.touch(start + Duration::from_secs(101));
        assert_eq!(guard.deadline(), None);
    }

    #[test]
    fn test_deadline_follows_last_activity() {
        let start = Instant::now();
        let mut guard = LivenessGuard::new(WINDOW);
        assert_eq!(guard.deadline(), None);
        guard.arm(start);
        assert_eq!(guard.deadline(), Some(start + WINDOW));
        let later = start + Duration::from_secs(12);
        guard.touch(later);
        assert_eq!(guard.deadline(), Some(later + WINDOW));
    }

    #[test]
    fn test_cancel_is_terminal() {
        let start = Instant::now();
        let mut guard = LivenessGuard::new(WINDOW);
        guard.arm(start);
        guard.cancel();
        assert_eq!(guard.state(), GuardState::Cancelled);
        guard.arm(start);
        guard.touch(start);
        assert!(!guard.poll(start + WINDOW * 10));
        assert_eq!(guard.state(), GuardState::Cancelled);
    }

    #[test]
    fn test_touch_before_arm_is_ignored() {
        let start = Instant::now();
        let mut guard = LivenessGuard::new(WINDOW);
        guard.touch(start);
        assert_eq!(guard.state(), GuardState::Idle);
        assert!(!guard.poll(start + WINDOW));
    }

    /// Records signals; optionally refuses to exit on SIGTERM
    struct FakeProcess {
        signals: Arc<Mutex<Vec<&'static str>>>,
        ignores_term: bool,
        terminated: bool,
    }

    #[async_trait]
    impl Terminate for FakeProcess {
        fn terminate(&mut self) -> io::Result<()> {
            self.signals.lock().unwrap().push("graceful");
            self.terminated = !self.ignores_term;
            Ok(())
        }

        async fn kill(&mut self) -> io::Result<()> {
            self.signals.lock().unwrap().push("forceful");
            Ok(())
        }

        async fn wait_exit(&mut self) -> io::Result<()> {
            if self.terminated {
                Ok(())
            } else {
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_escalates_when_term_is_ignored() {
        let signals = Arc::new(Mutex::new(Vec::new()));
        let mut process = FakeProcess {
            signals: signals.clone(),
            ignores_term: true,
            terminated: false,
        };
        escalate(&mut process, Duration::from_secs(5)).await.unwrap();
        assert_eq!(*signals.lock().unwrap(), vec!["graceful", "forceful"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_kill_when_process_exits_gracefully() {
        let signals = Arc::new(Mutex::new(Vec::new()));
        let mut process = FakeProcess {
            signals: signals.clone(),
            ignores_term: false,
            terminated: false,
        };
        escalate(&mut process, Duration::from_secs(5)).await.unwrap();
        assert_eq!(*signals.lock().unwrap(), vec!["graceful"]);
    }
}
