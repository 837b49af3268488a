//! Typed control-surface<->engine messages for the show runner.
//!
//! This crate defines all the message types exchanged between the control
//! surface (HTTP daemon or anything else driving the engine) and the show
//! supervisor core.

mod events;
mod state;
mod types;

pub use events::ShowEvent;
pub use state::{ShowState, StopReason};
pub use types::{AdAsset, OverlayAsset, ShowConfig, ShowSummary, TaskKind, DEFAULT_MAX_DURATION_SECS};

use tokio::sync::broadcast;

/// Channel capacity for events (engine -> observers).
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Creates the broadcast event channel the engine publishes on.
pub fn event_channel() -> (broadcast::Sender<ShowEvent>, broadcast::Receiver<ShowEvent>) {
    broadcast::channel(EVENT_CHANNEL_CAPACITY)
}
