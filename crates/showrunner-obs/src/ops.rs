//! Scene-level helper operations built on the control capability.

use std::time::Duration;

use tracing::{info, warn};

use crate::control::BroadcastControl;
use crate::ControlResult;

/// Pause inserted when a scene switch targets the already-active scene: the
/// backend ignores a no-op switch, so we bounce through the empty scene to
/// force the media inputs to re-activate.
pub const SAME_SCENE_BOUNCE_DELAY: Duration = Duration::from_secs(1);

/// Switch the program scene, bouncing through `empty_scene` when the target
/// is already active.
pub async fn change_scene(
    control: &dyn BroadcastControl,
    scene: &str,
    empty_scene: &str,
) -> ControlResult<()> {
    let current = control.current_scene().await?;
    if current == scene {
        control.set_current_scene(empty_scene).await?;
        tokio::time::sleep(SAME_SCENE_BOUNCE_DELAY).await;
    }
    control.set_current_scene(scene).await
}

/// Center a scene item vertically against the output canvas.
pub async fn center_vertically(
    control: &dyn BroadcastControl,
    scene: &str,
    source: &str,
) -> ControlResult<()> {
    let item_id = control.scene_item_id(scene, source).await?;
    let transform = control.scene_item_transform(scene, item_id).await?;
    let canvas = control.canvas_size().await?;

    let y = (f64::from(canvas.height) - transform.height) / 2.0;
    control
        .set_scene_item_position(scene, item_id, None, Some(y))
        .await
}

/// Start the stream output unless it is already live.
pub async fn ensure_streaming(control: &dyn BroadcastControl) -> ControlResult<()> {
    if control.stream_active().await? {
        warn!("Streaming already started");
        return Ok(());
    }
    control.start_stream().await?;
    info!("Streaming started");
    Ok(())
}

/// Stop the stream output if it is live and park on the empty scene.
pub async fn stop_streaming(
    control: &dyn BroadcastControl,
    empty_scene: &str,
) -> ControlResult<()> {
    if control.stream_active().await? {
        control.stop_stream().await?;
        info!("Streaming ended");
    } else {
        warn!("Streaming not started or previously ended");
    }
    control.set_current_scene(empty_scene).await
}

/// Start the record output unless it is already recording.
pub async fn ensure_recording(control: &dyn BroadcastControl) -> ControlResult<()> {
    if control.record_active().await? {
        warn!("Recording already started");
        return Ok(());
    }
    control.start_record().await?;
    info!("Recording started");
    Ok(())
}

/// Stop the record output if it is recording.
pub async fn stop_recording(control: &dyn BroadcastControl) -> ControlResult<()> {
    if control.record_active().await? {
        control.stop_record().await?;
        info!("Recording ended");
    } else {
        warn!("Recording not started or previously ended");
    }
    Ok(())
}
