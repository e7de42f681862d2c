//! The execution state machine.
//!
//! Every action walks an explicit finite state machine rather than nested
//! conditionals, so each reachable state and its exit conditions are
//! enumerable and testable in isolation. The transition function is total:
//! an event that makes no sense in the current state lands in `Failed`.

use serde::{Deserialize, Serialize};

/// Where an action currently stands in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionState {
    /// Accepted for processing; nothing checked yet
    Received,
    /// Structural and content validation passed
    Validated,
    /// The policy engine allowed the action
    Authorized,
    /// A human must confirm before the action can run
    AwaitingConfirmation,
    /// The handler ran (successfully or as a dry-run preview)
    Executed,
    /// Terminal failure anywhere in the pipeline
    Failed,
}

impl ExecutionState {
    /// Whether the pipeline stops in this state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExecutionState::AwaitingConfirmation
                | ExecutionState::Executed
                | ExecutionState::Failed
        )
    }
}

/// What just happened to the action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionEvent {
    /// Validation found no errors
    ValidationPassed,
    /// Validation found errors or blocked patterns
    ValidationFailed,
    /// The rate limiter rejected the caller
    RateLimited,
    /// The policy engine allowed the action
    AuthorizationGranted,
    /// The policy engine denied the action
    AuthorizationDenied,
    /// The policy engine demanded confirmation
    ConfirmationRequired,
    /// The handler (or dry-run preview) completed
    HandlerCompleted,
    /// The handler failed or panicked
    HandlerFailed,
}

/// Total transition function.
///
/// Valid transitions follow the pipeline order; everything else is `Failed`.
pub fn transition(state: ExecutionState, event: ExecutionEvent) -> ExecutionState {
    use ExecutionEvent as Event;
    use ExecutionState as State;
    match (state, event) {
        (State::Received, Event::ValidationPassed) => State::Validated,
        (State::Received, Event::ValidationFailed) => State::Failed,
        (State::Validated, Event::RateLimited) => State::Failed,
        (State::Validated, Event::AuthorizationGranted) => State::Authorized,
        (State::Validated, Event::AuthorizationDenied) => State::Failed,
        (State::Validated, Event::ConfirmationRequired) => State::AwaitingConfirmation,
        (State::Authorized, Event::HandlerCompleted) => State::Executed,
        (State::Authorized, Event::HandlerFailed) => State::Failed,
        // An event out of pipeline order is itself a failure.
        _ => State::Failed,
    }
}

/// Tracks one action's progress through the pipeline.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionStateMachine {
    state: ExecutionState,
}

impl ExecutionStateMachine {
    /// Start in `Received`.
    pub fn new() -> Self {
        Self {
            state: ExecutionState::Received,
        }
    }

    /// Apply one event, returning the new state.
    pub fn apply(&mut self, event: ExecutionEvent) -> ExecutionState {
        self.state = transition(self.state, event);
        self.state
    }

    /// The current state.
    pub fn state(&self) -> ExecutionState {
        self.state
    }
}

impl Default for ExecutionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
