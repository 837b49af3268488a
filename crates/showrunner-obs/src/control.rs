//! The broadcast control capability trait.

use async_trait::async_trait;
use serde_json::Value;

use crate::types::{CanvasSize, ItemTransform, MediaAction, SceneItem};
use crate::ControlResult;

/// Abstract interface over the live-production backend the engine drives.
///
/// The engine only ever issues commands through this trait; it never owns
/// or mutates the backend's structure. Implementations must be safe to call
/// concurrently from the supervisor's task tree.
#[async_trait]
pub trait BroadcastControl: Send + Sync {
    /// Name of the currently active program scene.
    async fn current_scene(&self) -> ControlResult<String>;

    /// Switch the program scene.
    async fn set_current_scene(&self, scene: &str) -> ControlResult<()>;

    /// Update an input's settings. With `overlay` set, unnamed settings
    /// keep their current values; otherwise they reset to defaults.
    async fn set_input_settings(
        &self,
        input: &str,
        settings: Value,
        overlay: bool,
    ) -> ControlResult<()>;

    /// Current settings of an input.
    async fn input_settings(&self, input: &str) -> ControlResult<Value>;

    /// Create a new input inside a scene, returning its scene item id.
    async fn create_input(
        &self,
        scene: &str,
        input: &str,
        kind: &str,
        settings: Value,
    ) -> ControlResult<i64>;

    /// Remove an input (and its scene items) entirely.
    async fn remove_input(&self, input: &str) -> ControlResult<()>;

    /// Trigger a media action (stop/restart) on a media input.
    async fn trigger_media_action(&self, input: &str, action: MediaAction) -> ControlResult<()>;

    /// Enumerate the items of a scene.
    async fn scene_items(&self, scene: &str) -> ControlResult<Vec<SceneItem>>;

    /// Look up a scene item id by source name.
    async fn scene_item_id(&self, scene: &str, source: &str) -> ControlResult<i64>;

    /// Position and size of a scene item.
    async fn scene_item_transform(&self, scene: &str, item_id: i64)
        -> ControlResult<ItemTransform>;

    /// Move a scene item. `None` leaves that axis unchanged.
    async fn set_scene_item_position(
        &self,
        scene: &str,
        item_id: i64,
        x: Option<f64>,
        y: Option<f64>,
    ) -> ControlResult<()>;

    /// Start the live stream output.
    async fn start_stream(&self) -> ControlResult<()>;

    /// Stop the live stream output.
    async fn stop_stream(&self) -> ControlResult<()>;

    /// Whether the stream output is currently active.
    async fn stream_active(&self) -> ControlResult<bool>;

    /// Start the record output.
    async fn start_record(&self) -> ControlResult<()>;

    /// Stop the record output.
    async fn stop_record(&self) -> ControlResult<()>;

    /// Whether the record output is currently active.
    async fn record_active(&self) -> ControlResult<bool>;

    /// Output canvas dimensions.
    async fn canvas_size(&self) -> ControlResult<CanvasSize>;
}
