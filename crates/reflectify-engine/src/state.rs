//! Per-task request state machine.
//!
//! Valid phase transitions for a single-shot task (expression, analysis):
//! - Idle -> Submitting (request sent)
//! - Submitting -> Succeeded (result published)
//! - Submitting -> Failed (error recorded)
//! - Submitting -> Idle (result of a cleared request discarded)
//! - Succeeded / Failed -> Submitting (new request)
//!
//! A request holds an [`InFlight`] ticket stamped with the slot's epoch.
//! Clearing the slot bumps the epoch, so a ticket issued before the clear can
//! still settle the phase but never publishes its result.

use std::fmt;

use serde::Serialize;

use crate::error::{EngineError, ErrorKind};

/// Lifecycle phase of a single-shot task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPhase {
    Idle,
    Submitting,
    Succeeded,
    Failed,
}

impl fmt::Display for TaskPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskPhase::Idle => write!(f, "Idle"),
            TaskPhase::Submitting => write!(f, "Submitting"),
            TaskPhase::Succeeded => write!(f, "Succeeded"),
            TaskPhase::Failed => write!(f, "Failed"),
        }
    }
}

impl TaskPhase {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &TaskPhase) -> bool {
        matches!(
            (self, target),
            (TaskPhase::Idle, TaskPhase::Submitting)
                | (TaskPhase::Succeeded, TaskPhase::Submitting)
                | (TaskPhase::Failed, TaskPhase::Submitting)
                | (TaskPhase::Submitting, TaskPhase::Succeeded)
                | (TaskPhase::Submitting, TaskPhase::Failed)
                // Discarded after a clear
                | (TaskPhase::Submitting, TaskPhase::Idle)
        )
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self, TaskPhase::Submitting)
    }
}

/// Proof that a request was started on a [`TaskSlot`].
#[must_use = "an in-flight ticket must be settled with succeed() or fail()"]
#[derive(Debug)]
pub struct InFlight {
    epoch: u64,
}

impl InFlight {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// State of one single-shot task: its phase, last result and last failure.
#[derive(Debug)]
pub struct TaskSlot<T> {
    name: &'static str,
    phase: TaskPhase,
    epoch: u64,
    result: Option<T>,
    last_error: Option<ErrorKind>,
}

/// Read-only copy of a [`TaskSlot`] handed to front-ends.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskSnapshot<T> {
    pub phase: TaskPhase,
    pub result: Option<T>,
    pub last_error: Option<ErrorKind>,
}

impl<T> TaskSnapshot<T> {
    pub fn is_submitting(&self) -> bool {
        self.phase.is_submitting()
    }
}

impl<T: Clone> TaskSlot<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            phase: TaskPhase::Idle,
            epoch: 0,
            result: None,
            last_error: None,
        }
    }

    pub fn phase(&self) -> TaskPhase {
        self.phase
    }

    pub fn result(&self) -> Option<&T> {
        self.result.as_ref()
    }

    pub fn last_error(&self) -> Option<ErrorKind> {
        self.last_error
    }

    /// Whether `ticket` would still publish its result.
    pub fn is_current(&self, ticket: &InFlight) -> bool {
        ticket.epoch == self.epoch
    }

    /// Start a request. Fails with `Busy` while another is in flight.
    pub fn begin(&mut self) -> Result<InFlight, EngineError> {
        if self.phase.is_submitting() {
            tracing::debug!(task = self.name, "Rejecting submission while busy");
            return Err(EngineError::Busy);
        }
        self.transition(TaskPhase::Submitting);
        Ok(InFlight { epoch: self.epoch })
    }

    /// Publish a result. Returns `false` if the ticket was stale; the result
    /// is then dropped and the slot returns to `Idle`.
    pub fn succeed(&mut self, ticket: InFlight, value: T) -> bool {
        if !self.settle_current(&ticket) {
            return false;
        }
        self.transition(TaskPhase::Succeeded);
        self.result = Some(value);
        self.last_error = None;
        true
    }

    /// Record a failure. The previous result is kept. Returns `false` if the
    /// ticket was stale.
    pub fn fail(&mut self, ticket: InFlight, kind: ErrorKind) -> bool {
        if !self.settle_current(&ticket) {
            return false;
        }
        self.transition(TaskPhase::Failed);
        self.last_error = Some(kind);
        true
    }

    /// Empty the result and invalidate any request in flight.
    ///
    /// The phase stays `Submitting` until that request settles, so a second
    /// request still cannot start alongside it.
    pub fn clear(&mut self) {
        self.epoch += 1;
        self.result = None;
        self.last_error = None;
        if !self.phase.is_submitting() {
            self.phase = TaskPhase::Idle;
        }
        tracing::debug!(task = self.name, epoch = self.epoch, "Task cleared");
    }

    pub fn snapshot(&self) -> TaskSnapshot<T> {
        TaskSnapshot {
            phase: self.phase,
            result: self.result.clone(),
            last_error: self.last_error,
        }
    }

    /// Returns `true` when `ticket` belongs to the current epoch. A stale
    /// ticket still ends the in-flight phase.
    fn settle_current(&mut self, ticket: &InFlight) -> bool {
        if self.is_current(ticket) {
            return true;
        }
        tracing::debug!(
            task = self.name,
            ticket_epoch = ticket.epoch,
            epoch = self.epoch,
            "Discarding result of a cleared request"
        );
        if self.phase.is_submitting() {
            self.transition(TaskPhase::Idle);
        }
        false
    }

    fn transition(&mut self, target: TaskPhase) {
        if self.phase.can_transition_to(&target) {
            tracing::debug!("{} state: {} -> {}", self.name, self.phase, target);
        } else {
            tracing::warn!(
                "{} state: unexpected transition {} -> {}",
                self.name,
                self.phase,
                target
            );
        }
        self.phase = target;
    }
}

// =============================================================================
// Tests
// =============================================================================
