use std::fmt;
use std::path::PathBuf;
use tracing::{info, warn};

use super::error::{Diagnosis, ProcessError};
use super::intent::{Browser, CredentialSource, DownloadIntent};
use super::plan::{self, InvocationPlan};
use super::runner::{AttemptRunner, RunOutput};
use super::site::Site;

/// One way of attempting a download
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    CookieFile(PathBuf),
    Browser(Browser),
    Anonymous,
}

impl Strategy {
    pub fn credential(&self) -> Option<CredentialSource> {
        match self {
            Strategy::CookieFile(path) => Some(CredentialSource::CookieFile(path.clone())),
            Strategy::Browser(browser) => Some(CredentialSource::Browser(*browser)),
            Strategy::Anonymous => None,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::CookieFile(path) => write!(f, "cookie file {}", path.display()),
            Strategy::Browser(browser) => write!(f, "{} cookies", browser),
            Strategy::Anonymous => f.write_str("no cookies"),
        }
    }
}

/// Ordered attempt list for an intent.
///
/// A cookie file is used alone. On the primary platform every browser is
/// tried, the explicit one first, followed by one anonymous attempt. Other
/// sites get a single anonymous attempt.
pub fn strategies(intent: &DownloadIntent) -> Vec<Strategy> {
    if let Some(path) = &intent.cookies_file {
        return vec![Strategy::CookieFile(path.clone())];
    }

    if !Site::classify(&intent.url).is_primary() {
        return vec![Strategy::Anonymous];
    }

    let mut list: Vec<Strategy> = intent.browser.into_iter().map(Strategy::Browser).collect();
    list.extend(
        Browser::FALLBACK_ORDER
            .iter()
            .filter(|b| Some(**b) != intent.browser)
            .map(|b| Strategy::Browser(*b)),
    );
    list.push(Strategy::Anonymous);
    list
}

#[derive(Debug)]
pub struct FallbackSuccess {
    pub output: RunOutput,
    pub strategy: Strategy,
    /// Number of attempts made, including the successful one
    pub attempts: usize,
}

#[derive(Debug)]
pub struct FallbackFailure {
    /// Every attempt in order, with the error it ended with
    pub attempts: Vec<(Strategy, ProcessError)>,
    pub diagnosis: Diagnosis,
}

impl FallbackFailure {
    /// The attempt whose result is surfaced to the user
    pub fn last_error(&self) -> Option<&ProcessError> {
        self.attempts.last().map(|(_, e)| e)
    }
}

/// Progress through the candidate list for one download call
struct FallbackState {
    candidates: Vec<Strategy>,
    tried: usize,
}

impl FallbackState {
    fn new(candidates: Vec<Strategy>) -> Self {
        Self { candidates, tried: 0 }
    }

    fn next(&mut self) -> Option<&Strategy> {
        let next = self.candidates.get(self.tried);
        if next.is_some() {
            self.tried += 1;
        }
        next
    }

    fn remaining(&self) -> usize {
        self.candidates.len() - self.tried
    }
}

/// Run the intent through each strategy in turn until one succeeds.
///
/// Attempts are strictly sequential. A spawn failure stops the loop at once
/// since no credential can fix a missing binary.
pub async fn download_with_fallback<R: AttemptRunner + ?Sized>(
    runner: &mut R,
    intent: &DownloadIntent,
) -> Result<FallbackSuccess, FallbackFailure> {
    let mut state = FallbackState::new(strategies(intent));
    let mut failures: Vec<(Strategy, ProcessError)> = Vec::new();

    while let Some(strategy) = state.next().cloned() {
        let plan: InvocationPlan = plan::resolve(intent);
        let credential = strategy.credential();
        info!("Attempting download with {}", strategy);

        match runner.run(&plan, credential.as_ref()).await {
            Ok(output) => {
                info!("Download succeeded with {}", strategy);
                return Ok(FallbackSuccess {
                    output,
                    strategy,
                    attempts: failures.len() + 1,
                });
            }
            Err(error) => {
                let diagnosis = Diagnosis::of(&error);
                warn!("Attempt with {} failed: {} ({:?})", strategy, error, diagnosis);
                let fatal = error.is_spawn_failure();
                failures.push((strategy, error));
                if fatal {
                    break;
                }
                if state.remaining() > 0 && !diagnosis.is_credential_related() {
                    info!("Failure is not credential related; trying next source anyway");
                }
            }
        }
    }

    let diagnosis = diagnose(&failures);
    Err(FallbackFailure {
        attempts: failures,
        diagnosis,
    })
}

/// Classify the surfaced attempt. A generic final failure after an earlier
/// anti-bot rejection is still reported as anti-bot gating, since the
/// anonymous retry rarely explains itself.
fn diagnose(failures: &[(Strategy, ProcessError)]) -> Diagnosis {
    let last = match failures.last() {
        Some((_, error)) => Diagnosis::of(error),
        None => return Diagnosis::DownloadFailed,
    };
    if last == Diagnosis::DownloadFailed
        && failures
            .iter()
            .any(|(_, e)| Diagnosis::of(e) == Diagnosis::BotDetection)
    {
        Diagnosis::BotDetection
    } else {
        last
    }
}
