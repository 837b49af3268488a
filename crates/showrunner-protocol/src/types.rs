//! Common types used across control messages.

use serde::{Deserialize, Serialize};

/// Default show duration cap in seconds (one hour).
pub const DEFAULT_MAX_DURATION_SECS: u64 = 3600;

/// Configuration for starting a show run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowConfig {
    /// Identifier of the show, used to fetch ad/overlay assets.
    pub show_id: String,

    /// Maximum run duration in seconds (default: 3600).
    pub max_duration_secs: u64,

    /// Ordered list of video references to seed the queue with.
    pub videos: Vec<String>,

    /// Whether to also record the run locally.
    #[serde(default)]
    pub record: bool,
}

impl Default for ShowConfig {
    fn default() -> Self {
        Self {
            show_id: String::new(),
            max_duration_secs: DEFAULT_MAX_DURATION_SECS,
            videos: Vec::new(),
            record: false,
        }
    }
}

/// One of the four concurrent activities supervised during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskKind {
    /// Plays queued videos back to back on the main layout.
    Playback,

    /// Cycles the advertisement source through the fetched ad list.
    AdRotation,

    /// Animates the informational overlay items across the overlay scene.
    OverlayRotation,

    /// Watches stream activity and the duration cap.
    HealthMonitor,
}

impl TaskKind {
    /// Returns the display name for this activity.
    pub fn name(self) -> &'static str {
        match self {
            Self::Playback => "video_playback",
            Self::AdRotation => "ad_rotation",
            Self::OverlayRotation => "overlay_rotation",
            Self::HealthMonitor => "health_monitor",
        }
    }
}

/// An advertisement asset fetched from the show scheduling service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdAsset {
    /// Asset file name, for logging.
    pub file_name: String,

    /// URL the ad browser source should load.
    pub url: String,

    /// Native pixel width of the ad image.
    pub width: u32,

    /// Native pixel height of the ad image.
    pub height: u32,
}

/// An informational overlay asset (image plus caption text).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayAsset {
    /// Asset file name, for logging.
    pub file_name: String,

    /// URL the overlay browser source should load.
    pub url: String,

    /// Caption text rendered next to the image.
    pub text: String,

    /// Native pixel width of the overlay image.
    pub width: u32,

    /// Native pixel height of the overlay image.
    pub height: u32,
}

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowSummary {
    /// Identifier of the show that ran.
    pub show_id: String,

    /// Total elapsed wall-clock duration of the run in seconds.
    pub duration_secs: u64,
}
