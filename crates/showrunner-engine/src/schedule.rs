//! Show directory: where the engine looks up videos, ads and overlays.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use showrunner_protocol::{AdAsset, OverlayAsset};

/// Header carrying the directory API key.
const API_KEY_HEADER: &str = "x-api-key";

/// A playable piece of media, resolved to a URL and a known duration.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaSegment {
    /// Where the media can be fetched from.
    pub url: String,

    /// How long the media plays for.
    pub duration: Duration,
}

/// The rotating assets of a show.
#[derive(Debug, Clone, Default)]
pub struct ShowAssets {
    /// Ads shown one at a time in the ad slot.
    pub ads: Vec<AdAsset>,

    /// Items scrolled across the overlay bar.
    pub overlays: Vec<OverlayAsset>,
}

/// Errors raised when a lookup against the directory fails.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Directory request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Directory returned no entry for '{reference}'")]
    NotFound { reference: String },
}

/// Source of truth for everything the engine plays.
///
/// The engine only ever holds references (video ids, show ids); the
/// directory resolves them to URLs and durations on demand.
#[async_trait]
pub trait ShowDirectory: Send + Sync {
    /// Resolve the rotating assets of a show.
    async fn show_assets(&self, show_id: &str) -> Result<ShowAssets, DirectoryError>;

    /// Resolve a video reference to playable media.
    async fn video(&self, reference: &str) -> Result<MediaSegment, DirectoryError>;

    /// Resolve the intro segment of a show.
    async fn intro(&self, show_id: &str) -> Result<MediaSegment, DirectoryError>;

    /// Resolve the outro segment of a show.
    async fn outro(&self, show_id: &str) -> Result<MediaSegment, DirectoryError>;
}

#[derive(Debug, Deserialize)]
struct SegmentResponse {
    url: String,
    duration_secs: f64,
}

impl From<SegmentResponse> for MediaSegment {
    fn from(response: SegmentResponse) -> Self {
        Self {
            url: response.url,
            duration: Duration::from_secs_f64(response.duration_secs.max(0.0)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AssetsResponse {
    #[serde(default)]
    ads: Vec<AdAsset>,

    #[serde(default)]
    overlays: Vec<OverlayAsset>,
}

/// [`ShowDirectory`] backed by an HTTP content API.
pub struct HttpShowDirectory {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpShowDirectory {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, DirectoryError> {
        // `path` segments are already percent-encoded by the callers.
        let url = format!("{}/{path}", self.base_url.trim_end_matches('/'));
        debug!(%url, "Directory lookup");

        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }
}

/// Path for a show-scoped endpoint, with the id escaped so it cannot
/// change the route.
fn show_path(show_id: &str, tail: &str) -> String {
    format!("shows/{}/{tail}", urlencoding::encode(show_id))
}

/// Path for a video lookup, with the reference escaped.
fn video_path(reference: &str) -> String {
    format!("videos/{}", urlencoding::encode(reference))
}

#[async_trait]
impl ShowDirectory for HttpShowDirectory {
    async fn show_assets(&self, show_id: &str) -> Result<ShowAssets, DirectoryError> {
        let assets: AssetsResponse = self.get_json(&show_path(show_id, "assets")).await?;
        Ok(ShowAssets {
            ads: assets.ads,
            overlays: assets.overlays,
        })
    }

    async fn video(&self, reference: &str) -> Result<MediaSegment, DirectoryError> {
        let segment: SegmentResponse = self.get_json(&video_path(reference)).await?;
        Ok(segment.into())
    }

    async fn intro(&self, show_id: &str) -> Result<MediaSegment, DirectoryError> {
        let segment: SegmentResponse = self.get_json(&show_path(show_id, "intro")).await?;
        Ok(segment.into())
    }

    async fn outro(&self, show_id: &str) -> Result<MediaSegment, DirectoryError> {
        let segment: SegmentResponse = self.get_json(&show_path(show_id, "outro")).await?;
        Ok(segment.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_response_converts_duration() {
        let segment: MediaSegment = SegmentResponse {
            url: "https://cdn.example/clip.mp4".into(),
            duration_secs: 12.5,
        }
        .into();
        assert_eq!(segment.duration, Duration::from_secs_f64(12.5));
    }

    #[test]
    fn test_lookup_paths_escape_reserved_characters() {
        assert_eq!(video_path("clip 7"), "videos/clip%207");
        assert_eq!(video_path("a/b?c"), "videos/a%2Fb%3Fc");
        assert_eq!(show_path("week/end", "intro"), "shows/week%2Fend/intro");
        assert_eq!(show_path("friday", "assets"), "shows/friday/assets");
    }

    #[test]
    fn test_negative_duration_clamps_to_zero() {
        let segment: MediaSegment = SegmentResponse {
            url: "https://cdn.example/clip.mp4".into(),
            duration_secs: -3.0,
        }
        .into();
        assert_eq!(segment.duration, Duration::ZERO);
    }
}
