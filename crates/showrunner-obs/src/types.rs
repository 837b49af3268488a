//! Value types shared across the control capability.

use serde::{Deserialize, Serialize};

/// Media playback actions the backend understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaAction {
    /// Stop the media input.
    Stop,

    /// Restart the media input from the beginning.
    Restart,
}

impl MediaAction {
    /// The obs-websocket identifier for this action.
    pub fn as_request_str(self) -> &'static str {
        match self {
            Self::Stop => "OBS_WEBSOCKET_MEDIA_INPUT_ACTION_STOP",
            Self::Restart => "OBS_WEBSOCKET_MEDIA_INPUT_ACTION_RESTART",
        }
    }
}

/// One item inside a scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneItem {
    /// Backend-assigned item id.
    pub id: i64,

    /// Name of the source backing the item.
    pub source_name: String,
}

/// Position and rendered size of a scene item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemTransform {
    pub position_x: f64,
    pub position_y: f64,
    pub width: f64,
    pub height: f64,
}

/// Output canvas dimensions of the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

/// Names of the scenes and inputs the engine drives.
///
/// The scene collection is prepared once in the backend; the engine only
/// refers to its pieces by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageMap {
    /// Scene shown while queued videos play.
    pub main_scene: String,

    /// Media input inside the main scene that plays the queued videos.
    pub main_video_input: String,

    /// Scene shown during the intro (and as idle filler).
    pub intro_scene: String,

    /// Media input that plays the intro asset.
    pub intro_input: String,

    /// Scene shown during the outro.
    pub outro_scene: String,

    /// Media input that plays the outro asset.
    pub outro_input: String,

    /// Browser source cycling through advertisement assets.
    pub ad_input: String,

    /// Scene holding the animated informational overlay items.
    pub overlay_scene: String,

    /// Reference image item the overlay geometry is derived from.
    pub overlay_ref_image: String,

    /// Reference text item the overlay captions copy their style from.
    pub overlay_ref_text: String,

    /// Name prefix for generated overlay image items.
    pub overlay_image_prefix: String,

    /// Name prefix for generated overlay text items.
    pub overlay_text_prefix: String,

    /// Blank scene used for scene bounces and as the parked scene.
    pub empty_scene: String,
}

impl Default for StageMap {
    fn default() -> Self {
        Self {
            main_scene: "MainLayout".to_string(),
            main_video_input: "MainVideo".to_string(),
            intro_scene: "IntroScene".to_string(),
            intro_input: "IntroSource".to_string(),
            outro_scene: "OutroScene".to_string(),
            outro_input: "OutroSource".to_string(),
            ad_input: "AdSource".to_string(),
            overlay_scene: "OverlayBar".to_string(),
            overlay_ref_image: "RefOverlayImage".to_string(),
            overlay_ref_text: "RefOverlayText".to_string(),
            overlay_image_prefix: "OverlayImage".to_string(),
            overlay_text_prefix: "OverlayText".to_string(),
            empty_scene: "EmptyScene".to_string(),
        }
    }
}
