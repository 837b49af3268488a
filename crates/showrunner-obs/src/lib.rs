//! Broadcast control capability for the show runner.
//!
//! This crate defines the [`BroadcastControl`] trait the engine drives, the
//! scene-level helper operations built on top of it, and an obs-websocket
//! v5 client adapter implementing the trait against a live OBS instance.

mod client;
mod control;
mod error;
pub mod ops;
mod types;

pub use client::ObsClient;
pub use control::BroadcastControl;
pub use error::ControlError;
pub use types::{CanvasSize, ItemTransform, MediaAction, SceneItem, StageMap};

/// Result type for capability operations.
pub type ControlResult<T> = Result<T, ControlError>;

/// How long to wait for a single obs-websocket response.
pub const REQUEST_TIMEOUT_SECS: u64 = 10;
