//! Events published by the engine.

use serde::{Deserialize, Serialize};

use crate::state::ShowState;
use crate::types::{ShowSummary, TaskKind};

/// Events the engine broadcasts to observers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ShowEvent {
    /// Show state has changed.
    StateChanged {
        /// Previous state.
        previous: ShowState,

        /// Current state.
        current: ShowState,
    },

    /// A video was offered to the queue.
    VideoQueued {
        /// The video reference.
        reference: String,

        /// Whether the queue accepted it.
        accepted: bool,
    },

    /// A supervised activity terminated, ending the running phase.
    TaskEnded {
        /// The activity that terminated first.
        task: TaskKind,

        /// Failure detail, if it failed.
        error: Option<String>,
    },

    /// A run completed and the supervisor returned to idle.
    ShowEnded(ShowSummary),
}
