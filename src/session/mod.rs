// In: src/session/mod.rs

//! The session state machine.
//!
//! One `ActionDispatcher` exists per server process. It owns the batch store, the
//! lifecycle adapter and the shutdown controller, and advances the session through
//!
//!   Created -> Opened -> (Computing)* -> Exhausted -> Closed -> Terminated
//!
//! one named action at a time.

pub mod dispatcher;
pub mod response;

pub use dispatcher::ActionDispatcher;
pub use response::{ActionResult, ComputeStatus, HEALTH_CHECK_RESPONSE, SUCCESS_RESPONSE};

use std::fmt;
use std::str::FromStr;

use crate::error::BridgeError;

/// The closed set of control actions a caller may invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    HealthCheck,
    Open,
    Compute,
    InputExhausted,
    Close,
    Terminate,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::HealthCheck,
        Action::Open,
        Action::Compute,
        Action::InputExhausted,
        Action::Close,
        Action::Terminate,
    ];

    /// The wire name of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::HealthCheck => "health_check",
            Action::Open => "open",
            Action::Compute => "compute",
            Action::InputExhausted => "input_exhausted",
            Action::Close => "close",
            Action::Terminate => "terminate",
        }
    }
}

impl FromStr for Action {
    type Err = BridgeError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == name)
            .ok_or_else(|| BridgeError::UnknownAction(name.to_string()))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the single session currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    Created,
    Opened,
    Computing,
    Exhausted,
    Closed,
    Terminated,
}

impl LifecycleState {
    /// Whether `action` may run from this state.
    pub fn permits(&self, action: Action) -> bool {
        use LifecycleState::*;
        match action {
            Action::HealthCheck | Action::Terminate => true,
            Action::Open => matches!(self, Created),
            Action::Compute | Action::InputExhausted => matches!(self, Opened | Computing),
            Action::Close => matches!(self, Opened | Computing | Exhausted),
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Created => "created",
            LifecycleState::Opened => "opened",
            LifecycleState::Computing => "computing",
            LifecycleState::Exhausted => "exhausted",
            LifecycleState::Closed => "closed",
            LifecycleState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests;
