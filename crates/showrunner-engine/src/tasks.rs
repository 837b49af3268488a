//! Bodies of the supervised activities.
//!
//! Each function here is one long-running activity spawned by the
//! supervisor. Returning `Ok` means the activity ran to its natural end
//! (queue closed, duration cap reached); returning `Err` means it hit a
//! failure it does not retry. Either way the supervisor reacts by
//! cancelling the siblings.

use std::future;
use std::time::Duration;

use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, warn};

use showrunner_obs::{ops, BroadcastControl, ControlError, MediaAction, StageMap};
use showrunner_protocol::AdAsset;
use showrunner_queue::RecirculatingQueue;

use crate::schedule::{DirectoryError, ShowDirectory};
use crate::{AD_ROTATION_INTERVAL, AD_WIDTH, MONITOR_TICK, SETTLE_DELAY};

/// Failure of a supervised activity.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Control(#[from] ControlError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// Point a media input at a URL and restart it from the top.
async fn cue_media(
    control: &dyn BroadcastControl,
    input: &str,
    url: &str,
) -> Result<(), ControlError> {
    control
        .trigger_media_action(input, MediaAction::Stop)
        .await?;
    control
        .set_input_settings(
            input,
            json!({
                "input": url,
                "is_local_file": false,
                "restart_on_activate": true,
                "close_when_inactive": false,
            }),
            true,
        )
        .await?;
    control
        .trigger_media_action(input, MediaAction::Restart)
        .await
}

/// Play one queued video on the main scene, blocking for its duration.
pub async fn play_video(
    control: &dyn BroadcastControl,
    stage: &StageMap,
    directory: &dyn ShowDirectory,
    reference: &str,
) -> Result<(), TaskError> {
    let segment = directory.video(reference).await?;
    ops::change_scene(control, &stage.main_scene, &stage.empty_scene).await?;
    cue_media(control, &stage.main_video_input, &segment.url).await?;

    info!(
        reference,
        duration_secs = segment.duration.as_secs_f64(),
        "Playing video"
    );
    tokio::time::sleep(segment.duration).await;
    Ok(())
}

/// Play the show's intro, blocking for its duration. Doubles as the
/// filler segment when the queue has nothing to offer.
pub async fn play_intro(
    control: &dyn BroadcastControl,
    stage: &StageMap,
    directory: &dyn ShowDirectory,
    show_id: &str,
) -> Result<(), TaskError> {
    let segment = directory.intro(show_id).await?;
    ops::change_scene(control, &stage.intro_scene, &stage.empty_scene).await?;
    cue_media(control, &stage.intro_input, &segment.url).await?;

    info!(duration_secs = segment.duration.as_secs_f64(), "Playing intro");
    tokio::time::sleep(segment.duration).await;
    Ok(())
}

/// Play the show's outro, blocking for its duration.
pub async fn play_outro(
    control: &dyn BroadcastControl,
    stage: &StageMap,
    directory: &dyn ShowDirectory,
    show_id: &str,
) -> Result<(), TaskError> {
    let segment = directory.outro(show_id).await?;
    ops::change_scene(control, &stage.outro_scene, &stage.empty_scene).await?;
    cue_media(control, &stage.outro_input, &segment.url).await?;

    info!(duration_secs = segment.duration.as_secs_f64(), "Playing outro");
    tokio::time::sleep(segment.duration).await;
    Ok(())
}

/// Drive the queue while it stays open: play the next video, or the
/// intro as filler when nothing is queued. The first failed broadcast
/// command ends the activity.
pub async fn run_playback(
    control: &dyn BroadcastControl,
    stage: &StageMap,
    directory: &dyn ShowDirectory,
    queue: &RecirculatingQueue,
    show_id: &str,
) -> Result<(), TaskError> {
    while queue.is_open() {
        match queue.take_next_and_recirculate() {
            Some(reference) => play_video(control, stage, directory, &reference).await?,
            None => {
                debug!("Nothing queued, playing intro as filler");
                play_intro(control, stage, directory, show_id).await?;
            }
        }
    }
    info!("Queue closed, playback ending");
    Ok(())
}

/// Swap the ad slot through the show's ads, one per rotation interval.
///
/// A show without ads leaves this activity parked forever so it never
/// trips the supervisor's first-to-finish policy. A single ad that fails
/// to render is skipped, not fatal.
pub async fn rotate_ads(
    control: &dyn BroadcastControl,
    stage: &StageMap,
    ads: &[AdAsset],
) -> Result<(), TaskError> {
    if ads.is_empty() {
        info!("Show has no ads, ad rotation idle");
        future::pending::<()>().await;
    }

    for ad in ads.iter().cycle() {
        if let Err(e) = show_ad(control, stage, ad).await {
            warn!(ad = %ad.file_name, "Skipping ad: {e}");
        }
        tokio::time::sleep(AD_ROTATION_INTERVAL).await;
    }
    Ok(())
}

/// Load one ad into the ad slot, scaled to the standard width and
/// centered vertically on the canvas.
async fn show_ad(
    control: &dyn BroadcastControl,
    stage: &StageMap,
    ad: &AdAsset,
) -> Result<(), ControlError> {
    let height = f64::from(ad.height) * AD_WIDTH / f64::from(ad.width.max(1));
    control
        .set_input_settings(
            &stage.ad_input,
            json!({
                "url": ad.url,
                "width": AD_WIDTH as i64,
                "height": height as i64,
            }),
            false,
        )
        .await?;

    // Let the backend re-render before reading the new bounds back.
    tokio::time::sleep(SETTLE_DELAY).await;
    ops::center_vertically(control, &stage.main_scene, &stage.ad_input).await?;

    debug!(ad = %ad.file_name, height, "Ad rotated in");
    Ok(())
}

/// Watch the stream output once per tick; ends when the stream drops or
/// the configured duration cap is reached.
pub async fn monitor_stream(
    control: &dyn BroadcastControl,
    max_duration: Duration,
) -> Result<(), TaskError> {
    let mut elapsed = Duration::ZERO;
    loop {
        let active = control.stream_active().await?;
        elapsed += MONITOR_TICK;

        if elapsed >= max_duration {
            info!(?max_duration, "Show duration cap reached");
            return Ok(());
        }
        if !active {
            warn!("Stream output is no longer active");
            return Ok(());
        }
        tokio::time::sleep(MONITOR_TICK).await;
    }
}
