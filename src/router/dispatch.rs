//! Per-event dispatch bookkeeping.
//!
//! Handler steps never abort a dispatch. Each collaborator failure becomes a
//! [`HandlerError`] collected in a [`Dispatch`] report, which the router logs
//! once the event is fully handled.

use std::{fmt, future::Future, time::Duration};

use log::{debug, error, trace};
use matrix_sdk::ruma::OwnedUserId;
use thiserror::Error;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::{kit::BridgeError, store::User};

/// Position of the router in the handling of one event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchState {
    /// Waiting for the next event
    Idle,
    /// Resolving identities and command context
    Dispatching,
    /// Running handler side effects
    Handling,
}

/// Handler step a failure happened in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Acknowledge,
    AllocateGhost,
    CreateRoom,
    SendBotMessage,
    SendGhostMessage,
    HandleEvent,
    MarkRead,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Acknowledge => "acknowledge",
            Step::AllocateGhost => "allocate ghost",
            Step::CreateRoom => "create room",
            Step::SendBotMessage => "send bot message",
            Step::SendGhostMessage => "send ghost message",
            Step::HandleEvent => "handle event",
            Step::MarkRead => "mark read",
        };
        f.write_str(name)
    }
}

/// A failed handler step.
#[derive(Debug, Error)]
#[error("{step} failed: {source}")]
pub struct HandlerError {
    pub step: Step,
    #[source]
    pub source: BridgeError,
}

/// Who sent an inbound Matrix event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Actor {
    /// A user known to the identity store
    Bridged(User),
    /// A sender the store knows nothing about
    Unauthenticated(OwnedUserId),
}

/// Outcome of the handling of one inbound event.
#[derive(Debug)]
pub struct Dispatch {
    /// What was dispatched, used in logs
    label: String,
    state: DispatchState,
    /// Steps that completed successfully, in order
    completed: Vec<Step>,
    errors: Vec<HandlerError>,
}

impl Dispatch {
    pub fn new(label: impl Into<String>) -> Self {
        let dispatch = Dispatch {
            label: label.into(),
            state: DispatchState::Dispatching,
            completed: Vec::new(),
            errors: Vec::new(),
        };
        trace!("{}: idle -> dispatching", dispatch.label);
        dispatch
    }

    /// Moves to the handling state once identities are resolved.
    pub fn handling(&mut self) {
        trace!("{}: {:?} -> handling", self.label, self.state);
        self.state = DispatchState::Handling;
    }

    /// Records the result of a handler step.
    pub fn record(&mut self, step: Step, result: Result<(), BridgeError>) {
        match result {
            Ok(()) => self.completed.push(step),
            Err(source) => self.fail(step, source),
        }
    }

    pub fn fail(&mut self, step: Step, source: BridgeError) {
        self.errors.push(HandlerError { step, source });
    }

    /// Logs the collected failures and returns to idle.
    pub fn finish(mut self) -> Self {
        for error in &self.errors {
            error!("{}: {}", self.label, error);
        }
        if self.errors.is_empty() {
            debug!("{}: handled ({:?})", self.label, self.completed);
        }

        trace!("{}: {:?} -> idle", self.label, self.state);
        self.state = DispatchState::Idle;
        self
    }

    #[cfg(test)]
    pub fn state(&self) -> DispatchState {
        self.state
    }

    #[cfg(test)]
    pub fn completed(&self) -> &[Step] {
        &self.completed
    }

    #[cfg(test)]
    pub fn errors(&self) -> &[HandlerError] {
        &self.errors
    }

    /// Returns `true` if the step failed.
    pub fn failed(&self, step: Step) -> bool {
        self.errors.iter().any(|e| e.step == step)
    }
}

/// Bounds every outbound collaborator call of one event.
///
/// A call fails with [`BridgeError::Cancelled`] as soon as the event's
/// token is cancelled, and with [`BridgeError::Timeout`] once the timeout
/// elapses.
#[derive(Clone, Debug)]
pub struct CallGuard {
    cancel: CancellationToken,
    timeout: Duration,
}

impl CallGuard {
    pub fn new(cancel: CancellationToken, timeout: Duration) -> Self {
        CallGuard { cancel, timeout }
    }

    /// Runs a collaborator call within the guard.
    pub async fn run<T, F>(&self, call: F) -> Result<T, BridgeError>
    where
        F: Future<Output = Result<T, BridgeError>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(BridgeError::Cancelled),
            result = time::timeout(self.timeout, call) => {
                result.unwrap_or(Err(BridgeError::Timeout(self.timeout)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_records_steps_and_errors() {
        let mut dispatch = Dispatch::new("test");
        assert_eq!(dispatch.state(), DispatchState::Dispatching);

        dispatch.handling();
        dispatch.record(Step::CreateRoom, Ok(()));
        dispatch.record(
            Step::SendBotMessage,
            Err(BridgeError::Request("boom".to_string())),
        );
        let dispatch = dispatch.finish();

        assert_eq!(dispatch.state(), DispatchState::Idle);
        assert_eq!(dispatch.completed(), &[Step::CreateRoom]);
        assert!(dispatch.failed(Step::SendBotMessage));
        assert!(!dispatch.failed(Step::CreateRoom));
        assert_eq!(
            dispatch.errors()[0].to_string(),
            "send bot message failed: request failed: boom"
        );
    }

    #[tokio::test]
    async fn test_guard_passes_result_through() {
        let guard = CallGuard::new(CancellationToken::new(), Duration::from_secs(5));

        let result = guard.run(async { Ok::<_, BridgeError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_guard_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let guard = CallGuard::new(token, Duration::from_secs(5));

        let result = guard.run(async { Ok::<_, BridgeError>(()) }).await;
        assert!(matches!(result, Err(BridgeError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_guard_timeout() {
        let guard = CallGuard::new(CancellationToken::new(), Duration::from_secs(1));

        let result = guard
            .run(async {
                time::sleep(Duration::from_secs(10)).await;
                Ok::<_, BridgeError>(())
            })
            .await;
        assert!(matches!(result, Err(BridgeError::Timeout(_))));
    }
}
