//! Convergence poller
//!
//! Waits for a resource to reach one of a set of target states by probing it
//! at a fixed minimum interval. A session ends in exactly one of three ways:
//!
//! - **Target**: the observed state is in the target set
//! - **Failure**: a probe failed, the state is in the failure set, the state
//!   is in none of the configured sets, or the resource stayed missing
//! - **Timeout**: the wall-clock budget ran out
//!
//! The poller never retries a failed probe. Transient API errors are the
//! prober's concern.

use crate::error::{CloudError, Result};
use crate::probe::{ABSENT, Observation, StateProber};
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::time::{Instant, sleep_until, timeout_at};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20 * 60);
const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_NOT_FOUND_CHECKS: u32 = 20;
// stands in for "never" when a configured duration overflows the clock
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Immutable description of one polling session.
#[derive(Debug, Clone)]
pub struct PollConfig {
    pending: BTreeSet<String>,
    target: BTreeSet<String>,
    failure: BTreeSet<String>,
    timeout: Duration,
    delay: Duration,
    min_interval: Duration,
    not_found_checks: u32,
    continuous_target_occurrence: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            pending: BTreeSet::new(),
            target: BTreeSet::new(),
            failure: BTreeSet::new(),
            timeout: DEFAULT_TIMEOUT,
            delay: Duration::ZERO,
            min_interval: DEFAULT_MIN_INTERVAL,
            not_found_checks: DEFAULT_NOT_FOUND_CHECKS,
            continuous_target_occurrence: 1,
        }
    }
}

impl PollConfig {
    pub fn new<P, T, S>(pending: P, target: T) -> Self
    where
        P: IntoIterator<Item = S>,
        T: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pending: pending.into_iter().map(Into::into).collect(),
            target: target.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Wait for the resource to disappear.
    pub fn until_absent<P, S>(pending: P) -> Self
    where
        P: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pending: pending.into_iter().map(Into::into).collect(),
            target: BTreeSet::from([ABSENT.to_string()]),
            ..Self::default()
        }
    }

    pub fn with_failure<F, S>(mut self, failure: F) -> Self
    where
        F: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failure = failure.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Wait this long before the first probe. Counted against the timeout.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Minimum spacing between the starts of two consecutive probes.
    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    /// Consecutive "not found" observations tolerated when absence is in
    /// none of the configured sets.
    pub fn with_not_found_checks(mut self, checks: u32) -> Self {
        self.not_found_checks = checks;
        self
    }

    /// Consecutive target observations required before declaring success.
    pub fn with_continuous_target_occurrence(mut self, count: u32) -> Self {
        self.continuous_target_occurrence = count.max(1);
        self
    }

    pub fn pending(&self) -> &BTreeSet<String> {
        &self.pending
    }

    pub fn target(&self) -> &BTreeSet<String> {
        &self.target
    }

    pub fn failure(&self) -> &BTreeSet<String> {
        &self.failure
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    fn classify(&self, state: &str) -> Step {
        // failure wins over an overlapping target
        if self.failure.contains(state) {
            Step::Failed
        } else if self.target.contains(state) {
            Step::Reached
        } else if self.pending.contains(state) {
            Step::Pending
        } else {
            Step::Unrecognized
        }
    }

    fn target_list(&self) -> Vec<String> {
        self.target.iter().cloned().collect()
    }
}

enum Step {
    Reached,
    Pending,
    Failed,
    Unrecognized,
}

/// Why a session ended in failure.
#[derive(Debug)]
pub enum PollFailure {
    /// The prober returned an error.
    Probe {
        error: CloudError,
        last_state: Option<String>,
    },
    /// The observed state is in the failure set.
    FailureState(String),
    /// The observed state is in none of the configured sets.
    UnexpectedState(String),
    /// The resource stayed missing longer than tolerated. `last_state` is
    /// the last state seen while it still existed.
    NotFound {
        checks: u32,
        last_state: Option<String>,
    },
}

/// Terminal result of one polling session.
#[derive(Debug)]
pub enum PollOutcome<T> {
    /// A target state was observed. `snapshot` is `None` when the target was
    /// absence.
    Target { snapshot: Option<T>, state: String },
    Failure {
        reason: PollFailure,
        snapshot: Option<T>,
    },
    Timeout {
        last_snapshot: Option<T>,
        last_state: Option<String>,
        elapsed: Duration,
    },
}

impl<T> PollOutcome<T> {
    pub fn is_target(&self) -> bool {
        matches!(self, PollOutcome::Target { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, PollOutcome::Failure { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, PollOutcome::Timeout { .. })
    }

    /// Last snapshot seen by the session, whatever the outcome.
    pub fn snapshot(&self) -> Option<&T> {
        match self {
            PollOutcome::Target { snapshot, .. } | PollOutcome::Failure { snapshot, .. } => {
                snapshot.as_ref()
            }
            PollOutcome::Timeout { last_snapshot, .. } => last_snapshot.as_ref(),
        }
    }

    /// Convert into a `Result`, building errors that name `resource`.
    pub fn into_result(self, resource: &str, config: &PollConfig) -> Result<Option<T>> {
        match self {
            PollOutcome::Target { snapshot, .. } => Ok(snapshot),
            PollOutcome::Failure { reason, .. } => Err(match reason {
                PollFailure::Probe { error, last_state } => CloudError::ProbeFailed {
                    resource: resource.to_string(),
                    last_state,
                    source: Box::new(error),
                },
                PollFailure::FailureState(state) => CloudError::FailureState {
                    resource: resource.to_string(),
                    state,
                },
                PollFailure::UnexpectedState(state) => CloudError::UnexpectedState {
                    resource: resource.to_string(),
                    state,
                    target: config.target_list(),
                },
                PollFailure::NotFound { checks, last_state } => CloudError::NotFound {
                    resource: resource.to_string(),
                    checks,
                    last_state,
                },
            }),
            PollOutcome::Timeout {
                last_state,
                elapsed,
                ..
            } => Err(CloudError::Timeout {
                resource: resource.to_string(),
                last_state: last_state.unwrap_or_default(),
                target: config.target_list(),
                elapsed,
            }),
        }
    }
}

/// Runs polling sessions for one [`PollConfig`].
pub struct Poller<'a> {
    config: &'a PollConfig,
}

impl<'a> Poller<'a> {
    pub fn new(config: &'a PollConfig) -> Self {
        Self { config }
    }

    /// Probe `id` until it converges, fails, or the timeout elapses.
    pub async fn run<P: StateProber>(&self, id: &str, prober: &P) -> PollOutcome<P::Snapshot> {
        let config = self.config;
        let started = Instant::now();
        let deadline = started
            .checked_add(config.timeout)
            .unwrap_or_else(|| started + FAR_FUTURE);

        tracing::info!(
            "Waiting for {} to reach {:?} (timeout {:?})",
            id,
            config.target,
            config.timeout
        );

        if !config.delay.is_zero() {
            sleep_until(offset_clamped(started, config.delay, deadline)).await;
        }

        let mut last_snapshot = None;
        let mut last_state = None;
        let mut last_found_state = None;
        let mut not_found = 0u32;
        let mut target_hits = 0u32;

        loop {
            let probed_at = Instant::now();
            if probed_at >= deadline {
                break;
            }

            let observation = match timeout_at(deadline, prober.probe(id)).await {
                Ok(Ok(observation)) => observation,
                Ok(Err(err)) => {
                    tracing::warn!("Probe of {} failed: {}", id, err);
                    return PollOutcome::Failure {
                        reason: PollFailure::Probe {
                            error: err,
                            last_state,
                        },
                        snapshot: last_snapshot,
                    };
                }
                Err(_) => break,
            };

            let state = observation.state().to_string();
            let is_missing = observation.is_not_found();
            tracing::debug!("{} is '{}'", id, state);

            if is_missing {
                not_found += 1;
            } else {
                not_found = 0;
                last_found_state = Some(state.clone());
                last_snapshot = observation.into_snapshot();
            }
            last_state = Some(state.clone());

            match config.classify(&state) {
                Step::Failed => {
                    tracing::warn!("{} reached failure state '{}'", id, state);
                    return PollOutcome::Failure {
                        reason: PollFailure::FailureState(state),
                        snapshot: last_snapshot,
                    };
                }
                Step::Reached => {
                    target_hits += 1;
                    if target_hits >= config.continuous_target_occurrence {
                        tracing::info!("{} reached '{}' after {:?}", id, state, started.elapsed());
                        return PollOutcome::Target {
                            snapshot: if is_missing { None } else { last_snapshot },
                            state,
                        };
                    }
                }
                Step::Pending => target_hits = 0,
                Step::Unrecognized if is_missing => {
                    target_hits = 0;
                    if not_found > config.not_found_checks {
                        tracing::warn!("{} not found after {} checks", id, not_found);
                        return PollOutcome::Failure {
                            reason: PollFailure::NotFound {
                                checks: not_found,
                                last_state: last_found_state,
                            },
                            snapshot: last_snapshot,
                        };
                    }
                }
                Step::Unrecognized => {
                    tracing::warn!(
                        "{} is in unexpected state '{}' (pending {:?}, target {:?})",
                        id,
                        state,
                        config.pending,
                        config.target
                    );
                    return PollOutcome::Failure {
                        reason: PollFailure::UnexpectedState(state),
                        snapshot: last_snapshot,
                    };
                }
            }

            sleep_until(offset_clamped(probed_at, config.min_interval, deadline)).await;
        }

        let elapsed = started.elapsed();
        tracing::warn!(
            "Timed out after {:?} waiting for {} (last state: {:?})",
            elapsed,
            id,
            last_state
        );
        PollOutcome::Timeout {
            last_snapshot,
            last_state,
            elapsed,
        }
    }

    /// Like [`Poller::run`], but after a timeout probe once more and accept
    /// a target state seen by that last probe. A failure state seen by the
    /// last probe still fails the session.
    pub async fn run_with_final_check<P: StateProber>(
        &self,
        id: &str,
        prober: &P,
    ) -> PollOutcome<P::Snapshot> {
        let outcome = self.run(id, prober).await;
        if !outcome.is_timeout() {
            return outcome;
        }

        tracing::debug!("Final check of {} after timeout", id);
        let observation = match prober.probe(id).await {
            Ok(observation) => observation,
            Err(err) => {
                tracing::warn!("Final check of {} failed: {}", id, err);
                return outcome;
            }
        };

        let state = observation.state().to_string();
        match self.config.classify(&state) {
            Step::Reached => {
                tracing::info!("{} reached '{}' on the final check", id, state);
                PollOutcome::Target {
                    snapshot: observation.into_snapshot(),
                    state,
                }
            }
            Step::Failed => {
                tracing::warn!("{} reached failure state '{}' on the final check", id, state);
                PollOutcome::Failure {
                    reason: PollFailure::FailureState(state),
                    snapshot: observation.into_snapshot(),
                }
            }
            Step::Pending | Step::Unrecognized => outcome,
        }
    }
}

/// `at + by`, never later than `deadline`.
fn offset_clamped(at: Instant, by: Duration, deadline: Instant) -> Instant {
    at.checked_add(by).map_or(deadline, |t| t.min(deadline))
}

/// Poll `id` and convert the outcome into a `Result`.
///
/// Returns the final snapshot, or `None` when the target was absence.
pub async fn wait_for_state<P: StateProber>(
    id: &str,
    prober: &P,
    config: &PollConfig,
) -> Result<Option<P::Snapshot>> {
    Poller::new(config)
        .run(id, prober)
        .await
        .into_result(id, config)
}
