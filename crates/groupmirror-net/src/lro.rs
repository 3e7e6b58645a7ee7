//! Submit-then-poll driver for work the server finishes asynchronously.
//!
//! Member adds and media uploads share one shape: a submit request that
//! hands back a job handle, then repeated status checks against an endpoint
//! derived from that handle.  Each call site implements [`LongRunningOp`]
//! and [`run_lro`] drives it to a terminal [`LroOutcome`].
//!
//! Polling is bounded by [`PollPolicy::max_attempts`] and can be stopped at
//! any suspension point through a `CancellationToken`.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use groupmirror_shared::ChatResult;

use crate::context::ApiContext;
use crate::error::SyncError;
use crate::transport::{ApiRequest, ApiResponse};

// ---------------------------------------------------------------------------
// Policy / verdict types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Pause between two status checks.
    pub interval: Duration,
    /// Status checks allowed before giving up.
    pub max_attempts: u32,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }
}

/// How the server answered the submit request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission<H, T> {
    /// Job accepted; poll with this handle.
    Accepted(H),
    /// The server finished synchronously.
    Finished(T),
    /// Unexpected status; terminal.
    Rejected(u16),
}

/// How the server answered one status check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollVerdict<T> {
    NotReady,
    Ready(T),
    /// The job's results are no longer available.
    Gone,
    Failed(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LroStage {
    Submit,
    Poll,
}

/// Terminal state of a driven operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LroOutcome<T> {
    Completed(T),
    Expired,
    Failed { stage: LroStage, status: u16 },
    TimedOut { attempts: u32 },
    Cancelled,
}

impl<T> LroOutcome<T> {
    pub fn result(&self) -> ChatResult {
        match self {
            LroOutcome::Completed(_) => ChatResult::Success,
            LroOutcome::Expired => ChatResult::ResultsExpired,
            LroOutcome::Failed { .. } | LroOutcome::TimedOut { .. } | LroOutcome::Cancelled => {
                ChatResult::Failure
            }
        }
    }

    pub fn completed(self) -> Option<T> {
        match self {
            LroOutcome::Completed(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> LroOutcome<U> {
        match self {
            LroOutcome::Completed(value) => LroOutcome::Completed(f(value)),
            LroOutcome::Expired => LroOutcome::Expired,
            LroOutcome::Failed { stage, status } => LroOutcome::Failed { stage, status },
            LroOutcome::TimedOut { attempts } => LroOutcome::TimedOut { attempts },
            LroOutcome::Cancelled => LroOutcome::Cancelled,
        }
    }
}

/// Progress marker used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LroState {
    Idle,
    Submitted,
    Polling,
    Done,
}

// ---------------------------------------------------------------------------
// Operation trait
// ---------------------------------------------------------------------------

/// One asynchronous server job.
///
/// Implementations only build requests and classify responses; sending,
/// sleeping and cancellation belong to [`run_lro`].
#[async_trait]
pub trait LongRunningOp: Send + Sync {
    type Handle: Send + Sync;
    type Output: Send;

    fn name(&self) -> &'static str;

    async fn submit_request(&self, ctx: &ApiContext) -> Result<ApiRequest, SyncError>;

    fn accept(
        &self,
        response: &ApiResponse,
    ) -> Result<Submission<Self::Handle, Self::Output>, SyncError>;

    fn poll_request(&self, ctx: &ApiContext, handle: &Self::Handle) -> ApiRequest;

    fn classify(&self, response: &ApiResponse) -> Result<PollVerdict<Self::Output>, SyncError>;
}

fn transition(op: &'static str, from: LroState, to: LroState) {
    debug!(op, ?from, ?to, "LRO state change");
}

/// Drive `op` from submission to a terminal outcome.
///
/// Transport and decoding faults abort with `Err`; every anticipated
/// server answer ends in an [`LroOutcome`].
pub async fn run_lro<O: LongRunningOp>(
    ctx: &ApiContext,
    op: &O,
    policy: PollPolicy,
    cancel: &CancellationToken,
) -> Result<LroOutcome<O::Output>, SyncError> {
    let name = op.name();
    if cancel.is_cancelled() {
        info!(op = name, "LRO cancelled before submit");
        return Ok(LroOutcome::Cancelled);
    }

    let request = op.submit_request(ctx).await?;
    let response = tokio::select! {
        _ = cancel.cancelled() => {
            info!(op = name, "LRO cancelled during submit");
            return Ok(LroOutcome::Cancelled);
        }
        r = ctx.send(request) => r?,
    };
    transition(name, LroState::Idle, LroState::Submitted);

    let handle = match op.accept(&response)? {
        Submission::Accepted(handle) => handle,
        Submission::Finished(output) => {
            transition(name, LroState::Submitted, LroState::Done);
            info!(op = name, "LRO finished at submit");
            return Ok(LroOutcome::Completed(output));
        }
        Submission::Rejected(status) => {
            transition(name, LroState::Submitted, LroState::Done);
            warn!(op = name, status, "LRO submit rejected");
            return Ok(LroOutcome::Failed {
                stage: LroStage::Submit,
                status,
            });
        }
    };
    transition(name, LroState::Submitted, LroState::Polling);

    for attempt in 1..=policy.max_attempts {
        let request = op.poll_request(ctx, &handle);
        let response = tokio::select! {
            _ = cancel.cancelled() => {
                info!(op = name, attempt, "LRO cancelled while polling");
                return Ok(LroOutcome::Cancelled);
            }
            r = ctx.send(request) => r?,
        };

        match op.classify(&response)? {
            PollVerdict::Ready(output) => {
                transition(name, LroState::Polling, LroState::Done);
                info!(op = name, attempt, "LRO completed");
                return Ok(LroOutcome::Completed(output));
            }
            PollVerdict::Gone => {
                transition(name, LroState::Polling, LroState::Done);
                info!(op = name, attempt, "LRO results expired");
                return Ok(LroOutcome::Expired);
            }
            PollVerdict::Failed(status) => {
                transition(name, LroState::Polling, LroState::Done);
                warn!(op = name, attempt, status, "LRO poll failed");
                return Ok(LroOutcome::Failed {
                    stage: LroStage::Poll,
                    status,
                });
            }
            PollVerdict::NotReady => {
                debug!(op = name, attempt, status = response.status, "LRO not ready");
            }
        }

        if attempt < policy.max_attempts {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(op = name, attempt, "LRO cancelled while waiting");
                    return Ok(LroOutcome::Cancelled);
                }
                _ = tokio::time::sleep(policy.interval) => {}
            }
        }
    }

    warn!(op = name, attempts = policy.max_attempts, "LRO gave up");
    Ok(LroOutcome::TimedOut {
        attempts: policy.max_attempts,
    })
}
