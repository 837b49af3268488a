//! Show orchestration engine.
//!
//! The engine runs an unattended broadcast: it seeds the video queue from a
//! schedule, brings the stream up, and supervises four concurrent
//! activities (video playback, ad rotation, overlay rotation, stream
//! health monitoring) until one of them ends, fails, or a stop is
//! requested. When the running phase ends for any reason, all remaining
//! activities are cancelled and the show winds down through an outro.

use std::time::Duration;

use thiserror::Error;

pub mod overlay;
pub mod runner;
pub mod schedule;
pub mod tasks;

pub use runner::ShowRunner;
pub use schedule::{HttpShowDirectory, MediaSegment, ShowAssets, ShowDirectory};

/// Width every ad is scaled to; height follows the source aspect ratio.
pub const AD_WIDTH: f64 = 600.0;

/// How long each ad stays up before the next one is shown.
pub const AD_ROTATION_INTERVAL: Duration = Duration::from_secs(60);

/// Horizontal distance overlay items move per animation tick.
pub const OVERLAY_STEP: f64 = 1.0;

/// Cadence of the overlay scroll animation.
pub const OVERLAY_TICK: Duration = Duration::from_millis(50);

/// Cadence of the stream health monitor.
pub const MONITOR_TICK: Duration = Duration::from_secs(1);

/// Pause between resizing a source and reading back its rendered bounds.
pub const SETTLE_DELAY: Duration = Duration::from_millis(50);

/// Horizontal gap between neighbouring overlay items.
pub const ITEM_SPACING: f64 = 150.0;

/// Errors surfaced when a show cannot be started.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("A show is already active")]
    AlreadyActive,

    #[error("Show configuration is missing a show id")]
    MissingShowId,

    #[error("Show configuration has no videos")]
    NoVideos,
}
