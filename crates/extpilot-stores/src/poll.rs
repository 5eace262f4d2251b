//! Bounded fixed-interval polling
//!
//! Every store reports long-running work differently: Edge uses status
//! strings, addons.mozilla.org uses a handful of booleans. Adapters
//! normalize those into an [`OperationStatus`] before handing them to the
//! loop, so [`PollMachine`] and [`PollDriver`] never see provider fields.
//!
//! [`PollMachine`] is pure bookkeeping: it decides, given the time and the
//! last observed status, whether to wait, finish or give up. [`PollDriver`]
//! owns the side effects (clock, sleeping, cancellation) and steps it.
//!
//! The overall timeout is measured from the first tick and is checked only
//! between ticks: a slow fetch is never interrupted, and the policy has no
//! backoff.

use crate::clock::{Clock, Sleeper, SystemClock, TokioSleeper};
use crate::error::{Result, StoreError};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Normalized state of a remote operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    Pending,
    Succeeded,
    Failed,
}

impl std::fmt::Display for OperationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationState::Pending => write!(f, "Pending"),
            OperationState::Succeeded => write!(f, "Succeeded"),
            OperationState::Failed => write!(f, "Failed"),
        }
    }
}

/// A normalized state plus the provider payload it was derived from
#[derive(Debug, Clone, PartialEq)]
pub struct OperationStatus<T> {
    pub state: OperationState,
    pub payload: T,
}

impl<T> OperationStatus<T> {
    pub fn pending(payload: T) -> Self {
        Self {
            state: OperationState::Pending,
            payload,
        }
    }

    pub fn succeeded(payload: T) -> Self {
        Self {
            state: OperationState::Succeeded,
            payload,
        }
    }

    pub fn failed(payload: T) -> Self {
        Self {
            state: OperationState::Failed,
            payload,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state != OperationState::Pending
    }
}

/// Interval and overall budget of a poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollPolicy {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

/// Phase of a [`PollMachine`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    /// Not started yet
    Idle,
    Pending,
    Succeeded,
    Failed,
    TimedOut,
}

/// What the driver should do after an observation
#[derive(Debug, PartialEq)]
pub enum PollStep<T> {
    /// Sleep this long, then fetch again
    Wait(Duration),
    /// Terminal status reached
    Done(OperationStatus<T>),
}

/// Polling state machine
#[derive(Debug, Clone)]
pub struct PollMachine {
    policy: PollPolicy,
    started_at: Option<DateTime<Utc>>,
    phase: PollPhase,
    attempts: u32,
}

impl PollMachine {
    pub fn new(policy: PollPolicy) -> Self {
        Self {
            policy,
            started_at: None,
            phase: PollPhase::Idle,
            attempts: 0,
        }
    }

    pub fn phase(&self) -> PollPhase {
        self.phase
    }

    /// Number of observations fed so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Gate in front of a fetch; the first call starts the budget
    ///
    /// Returns `false` and moves to [`PollPhase::TimedOut`] once the time
    /// since start exceeds the policy timeout.
    pub fn may_fetch(&mut self, now: DateTime<Utc>) -> bool {
        match self.phase {
            PollPhase::Idle => {
                self.started_at = Some(now);
                self.phase = PollPhase::Pending;
                true
            }
            PollPhase::Pending => {
                if self.elapsed(now) > self.policy.timeout {
                    self.phase = PollPhase::TimedOut;
                    false
                } else {
                    true
                }
            }
            _ => false,
        }
    }

    /// Feed an observed status
    pub fn observe<T>(&mut self, status: OperationStatus<T>) -> PollStep<T> {
        self.attempts += 1;
        match status.state {
            OperationState::Pending => {
                self.phase = PollPhase::Pending;
                PollStep::Wait(self.policy.interval)
            }
            OperationState::Succeeded => {
                self.phase = PollPhase::Succeeded;
                PollStep::Done(status)
            }
            OperationState::Failed => {
                self.phase = PollPhase::Failed;
                PollStep::Done(status)
            }
        }
    }

    /// Time since the first gate check
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        self.started_at
            .and_then(|start| (now - start).to_std().ok())
            .unwrap_or(Duration::ZERO)
    }
}

/// Runs [`PollMachine`]s against real (or injected) time
#[derive(Clone)]
pub struct PollDriver {
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
    cancel: CancellationToken,
}

impl PollDriver {
    pub fn new(
        clock: Arc<dyn Clock>,
        sleeper: Arc<dyn Sleeper>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            clock,
            sleeper,
            cancel,
        }
    }

    /// Wall clock, tokio timer, fresh token
    pub fn system() -> Self {
        Self::new(
            Arc::new(SystemClock),
            Arc::new(TokioSleeper),
            CancellationToken::new(),
        )
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    fn checkpoint(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(StoreError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Fetch until a terminal status or the budget runs out
    ///
    /// `what` names the operation in logs and in the timeout error. A
    /// `Failed` status is returned, not raised; callers decide how to
    /// report it.
    pub async fn poll<T, F, Fut>(
        &self,
        what: &str,
        policy: PollPolicy,
        mut fetch: F,
    ) -> Result<OperationStatus<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<OperationStatus<T>>>,
    {
        let mut machine = PollMachine::new(policy);

        loop {
            self.checkpoint()?;

            let now = self.clock.now();
            if !machine.may_fetch(now) {
                return Err(StoreError::Timeout(format!(
                    "{} still pending after {:?} ({} checks)",
                    what,
                    machine.elapsed(now),
                    machine.attempts()
                )));
            }

            let status = fetch().await?;
            self.checkpoint()?;

            debug!(operation = what, state = %status.state, attempt = machine.attempts() + 1, "Poll tick");

            match machine.observe(status) {
                PollStep::Done(status) => return Ok(status),
                PollStep::Wait(interval) => {
                    tokio::select! {
                        _ = self.sleeper.sleep(interval) => {}
                        _ = self.cancel.cancelled() => return Err(StoreError::Cancelled),
                    }
                }
            }
        }
    }
}
