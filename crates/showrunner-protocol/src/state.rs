//! Show lifecycle state machine types.

use serde::{Deserialize, Serialize};

use crate::types::TaskKind;

/// The current state of the show supervisor.
///
/// A run moves `Idle -> Starting -> Running -> Stopping -> Idle`; `Idle` is
/// both the initial and the terminal state of every run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum ShowState {
    /// No show is active.
    #[default]
    Idle,

    /// Queue seeding, asset fetch, stream start and intro are in progress.
    Starting {
        /// Identifier of the show being started.
        show_id: String,
    },

    /// The four supervised activities are running.
    Running {
        /// Identifier of the active show.
        show_id: String,
    },

    /// Outro and stream teardown are in progress.
    Stopping {
        /// Why the running phase ended.
        reason: StopReason,
    },
}

impl ShowState {
    /// Returns true if no show is active.
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Returns true if a show is starting up.
    pub fn is_starting(&self) -> bool {
        matches!(self, Self::Starting { .. })
    }

    /// Returns true if a show is in its running phase.
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }

    /// Returns true if a show is winding down.
    pub fn is_stopping(&self) -> bool {
        matches!(self, Self::Stopping { .. })
    }

    /// Returns true while a run is active in any phase.
    pub fn is_active(&self) -> bool {
        !self.is_idle()
    }

    /// Returns a simple string representation of the state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Starting { .. } => "Starting",
            Self::Running { .. } => "Running",
            Self::Stopping { .. } => "Stopping",
        }
    }
}

/// Why the running phase of a show ended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StopReason {
    /// A stop was requested through the control surface.
    Requested,

    /// A supervised activity returned normally.
    TaskEnded {
        /// The activity that ended.
        task: TaskKind,
    },

    /// A supervised activity failed.
    TaskFailed {
        /// The activity that failed.
        task: TaskKind,

        /// Failure detail.
        message: String,
    },

    /// Startup never completed or a supervised activity panicked; the
    /// run unwinds without an outro.
    Faulted {
        /// Failure detail.
        message: String,
    },
}

impl StopReason {
    /// Returns a display message for this reason.
    pub fn message(&self) -> String {
        match self {
            Self::Requested => "Stop requested".to_string(),
            Self::TaskEnded { task } => format!("Activity '{}' completed", task.name()),
            Self::TaskFailed { task, message } => {
                format!("Activity '{}' failed: {message}", task.name())
            }
            Self::Faulted { message } => format!("Startup failed: {message}"),
        }
    }
}
