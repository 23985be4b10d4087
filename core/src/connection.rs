//! Push-stream lifecycle for one run: the decision half.
//!
//! STATE MACHINE:
//!   Idle → Connecting → Open → (Error → WaitingToReconnect → Connecting)* → Closed
//!
//! RULES:
//!   - Only unknown, WARMING_UP and RUNNING runs get a stream.
//!   - A failure reconnects only while the run is still the active one
//!     AND its last known stage is non-terminal. Otherwise: refresh instead.
//!   - Backoff for attempt n (from 0) is min(n + 1, max_backoff) seconds.
//!   - After `max_attempts` scheduled retries the manager gives up for good.
//!   - The reconnecting notice fires once per failure streak.
//!
//! This type owns no sockets and no timers. The driver holds those in a
//! `StreamSlot` and executes what the manager decides.

use crate::{model::RunStage, types::RunId};
use std::time::Duration;

pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
pub const DEFAULT_MAX_BACKOFF_SECS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts:     u32,
    pub max_backoff_secs: u64,
}

impl ReconnectPolicy {
    /// Wait before retry number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let secs = (u64::from(attempt) + 1).min(self.max_backoff_secs.max(1));
        Duration::from_secs(secs)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts:     DEFAULT_MAX_RECONNECT_ATTEMPTS,
            max_backoff_secs: DEFAULT_MAX_BACKOFF_SECS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Error,
    WaitingToReconnect,
    Closed,
}

/// How a socket ended, as reported by the stream worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndCause {
    /// Connect failure or read error.
    Error(String),
    /// The socket went away without a normal close frame.
    UncleanClose,
    /// The server sent a normal close frame.
    CleanClose,
}

/// What to do after a socket ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureDecision {
    /// Already closed on purpose; nothing to do.
    Ignore,
    /// Schedule a reconnect after `delay`. `notify` is true only for the
    /// first failure of a streak.
    Retry { attempt: u32, delay: Duration, notify: bool },
    /// Run switched or reached a terminal stage: refresh metadata once.
    Abandon,
    /// Out of attempts: persistent notice, refresh, stop for good.
    Exhausted,
    /// Server closed normally: refresh metadata once.
    ServerClosed,
}

/// What to do when a scheduled reconnect timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    Ignore,
    Open { attempt: u32 },
    Abandon,
}

/// Handles to release on a deliberate close, in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CloseOutcome {
    pub cancel_timer: bool,
    pub close_socket: bool,
}

#[derive(Debug, Clone)]
pub struct ConnectionManager {
    run_id:    RunId,
    state:     ConnectionState,
    policy:    ReconnectPolicy,
    /// Retries scheduled in the current failure streak.
    attempt:   u32,
    exhausted: bool,
}

impl ConnectionManager {
    pub fn new(run_id: RunId, policy: ReconnectPolicy) -> Self {
        Self {
            run_id,
            state: ConnectionState::Idle,
            policy,
            attempt: 0,
            exhausted: false,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn has_pending_timer(&self) -> bool {
        self.state == ConnectionState::WaitingToReconnect
    }

    /// First open for this run. Returns true when the caller should connect.
    pub fn start(&mut self, stage: Option<RunStage>) -> bool {
        if self.state != ConnectionState::Idle || !RunStage::allows_stream(stage) {
            return false;
        }
        self.transition(ConnectionState::Connecting);
        true
    }

    /// The socket handshake completed. Ends any failure streak.
    pub fn opened(&mut self) -> bool {
        if self.state != ConnectionState::Connecting {
            return false;
        }
        self.attempt = 0;
        self.transition(ConnectionState::Open);
        true
    }

    /// The socket ended. `still_active` must be evaluated at the moment the
    /// end is handled, against the caller's current active run.
    pub fn ended(
        &mut self,
        cause: &EndCause,
        still_active: bool,
        stage: Option<RunStage>,
    ) -> FailureDecision {
        match self.state {
            ConnectionState::Connecting | ConnectionState::Open => {}
            _ => return FailureDecision::Ignore,
        }

        if *cause == EndCause::CleanClose {
            self.transition(ConnectionState::Closed);
            return FailureDecision::ServerClosed;
        }

        self.transition(ConnectionState::Error);

        let terminal = stage.is_some_and(RunStage::is_terminal);
        if !still_active || terminal {
            self.transition(ConnectionState::Closed);
            return FailureDecision::Abandon;
        }

        if self.attempt >= self.policy.max_attempts {
            self.exhausted = true;
            self.transition(ConnectionState::Closed);
            return FailureDecision::Exhausted;
        }

        let attempt = self.attempt;
        let delay = self.policy.delay_for(attempt);
        self.attempt += 1;
        self.transition(ConnectionState::WaitingToReconnect);
        FailureDecision::Retry {
            attempt,
            delay,
            notify: attempt == 0,
        }
    }

    /// The backoff timer fired. Re-checks both reconnect guards.
    pub fn reconnect_due(&mut self, still_active: bool, stage: Option<RunStage>) -> ReconnectDecision {
        if self.state != ConnectionState::WaitingToReconnect {
            return ReconnectDecision::Ignore;
        }
        let terminal = stage.is_some_and(RunStage::is_terminal);
        if !still_active || terminal {
            self.transition(ConnectionState::Closed);
            return ReconnectDecision::Abandon;
        }
        self.transition(ConnectionState::Connecting);
        ReconnectDecision::Open { attempt: self.attempt }
    }

    /// Deliberate close. Timer first, then socket.
    pub fn close(&mut self) -> CloseOutcome {
        let outcome = match self.state {
            ConnectionState::WaitingToReconnect => CloseOutcome {
                cancel_timer: true,
                close_socket: false,
            },
            ConnectionState::Connecting | ConnectionState::Open => CloseOutcome {
                cancel_timer: false,
                close_socket: true,
            },
            _ => CloseOutcome::default(),
        };
        if self.state != ConnectionState::Closed {
            self.transition(ConnectionState::Closed);
        }
        outcome
    }

    fn transition(&mut self, next: ConnectionState) {
        log::debug!(
            "run={} connection: {:?} -> {:?} (attempt {})",
            self.run_id,
            self.state,
            next,
            self.attempt
        );
        self.state = next;
    }
}
