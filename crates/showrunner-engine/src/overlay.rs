//! Overlay bar priming and rotation.
//!
//! The overlay scene carries a pair of reference items (one image, one
//! text) whose transforms define the geometry every generated item
//! copies. Priming creates or updates one image/text pair per overlay
//! asset, laid out left to right; rotation then scrolls every generated
//! item horizontally, wrapping each one off the right edge back to the
//! left.

use std::future;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use showrunner_obs::{BroadcastControl, ControlError, ItemTransform, SceneItem, StageMap};
use showrunner_protocol::OverlayAsset;

use crate::tasks::TaskError;
use crate::{ITEM_SPACING, OVERLAY_STEP, OVERLAY_TICK, SETTLE_DELAY};

const IMAGE_INPUT_KIND: &str = "browser_source";
const TEXT_INPUT_KIND: &str = "text_ft2_source_v2";

/// Bring the overlay scene in line with the show's overlay assets.
///
/// Leftover generated items from a previous, longer show are removed;
/// each asset then gets an image/text pair created (or refreshed) and
/// positioned. A show with no overlay assets leaves the scene untouched.
pub async fn sync_overlay_items(
    control: &dyn BroadcastControl,
    stage: &StageMap,
    overlays: &[OverlayAsset],
) -> Result<(), TaskError> {
    if overlays.is_empty() {
        info!("Show has no overlay items");
        return Ok(());
    }

    remove_stale_items(control, stage, overlays.len()).await?;

    let scene = &stage.overlay_scene;
    let image_ref = reference_transform(control, scene, &stage.overlay_ref_image).await?;
    let text_ref = reference_transform(control, scene, &stage.overlay_ref_text).await?;
    let text_style = control.input_settings(&stage.overlay_ref_text).await?;

    let mut left = image_ref.position_x;
    for (index, item) in overlays.iter().enumerate() {
        let image_name = format!("{}{}", stage.overlay_image_prefix, index + 1);
        let text_name = format!("{}{}", stage.overlay_text_prefix, index + 1);

        let image_id = ensure_input(
            control,
            scene,
            &image_name,
            IMAGE_INPUT_KIND,
            json!({
                "url": item.url,
                "width": image_ref.width as i64,
                "height": image_ref.height as i64,
            }),
        )
        .await?;
        control
            .set_scene_item_position(scene, image_id, Some(left), Some(image_ref.position_y))
            .await?;

        let text_id = ensure_input(
            control,
            scene,
            &text_name,
            TEXT_INPUT_KIND,
            text_settings(&item.text, &text_style),
        )
        .await?;

        // The text width depends on the rendered string; wait for the
        // backend to lay it out before centering under the image.
        tokio::time::sleep(SETTLE_DELAY).await;
        let text_transform = control.scene_item_transform(scene, text_id).await?;
        let text_x = left + (image_ref.width - text_transform.width) / 2.0;
        control
            .set_scene_item_position(scene, text_id, Some(text_x), Some(text_ref.position_y))
            .await?;

        debug!(item = %item.file_name, x = left, "Overlay item placed");
        left += image_ref.width + ITEM_SPACING;
    }

    info!(items = overlays.len(), "Overlay bar primed");
    Ok(())
}

/// Scroll every generated overlay item; runs until all animations end.
///
/// Each item animates independently so one failing does not freeze its
/// siblings. A scene with no generated items parks this activity forever.
pub async fn rotate_overlays(
    control: Arc<dyn BroadcastControl>,
    stage: Arc<StageMap>,
) -> Result<(), TaskError> {
    let scene = stage.overlay_scene.clone();
    let items: Vec<SceneItem> = control
        .scene_items(&scene)
        .await?
        .into_iter()
        .filter(|item| generated_index(&item.source_name, &stage).is_some())
        .collect();

    if items.is_empty() {
        info!("No overlay items to rotate");
        future::pending::<()>().await;
    }

    let mut starts = Vec::with_capacity(items.len());
    for item in &items {
        starts.push(control.scene_item_transform(&scene, item.id).await?);
    }

    // Items wrap once they scroll past the rightmost starting position.
    let bound = starts
        .iter()
        .map(|transform| transform.position_x)
        .fold(f64::MIN, f64::max);

    let mut animations = JoinSet::new();
    for (item, start) in items.into_iter().zip(starts) {
        let control = Arc::clone(&control);
        let scene = scene.clone();
        animations.spawn(async move {
            animate_item(control.as_ref(), &scene, item, start, bound).await;
        });
    }

    while animations.join_next().await.is_some() {}
    warn!("All overlay animations ended");
    Ok(())
}

async fn animate_item(
    control: &dyn BroadcastControl,
    scene: &str,
    item: SceneItem,
    start: ItemTransform,
    bound: f64,
) {
    let mut x = start.position_x;
    loop {
        x += OVERLAY_STEP;
        if x > bound {
            x = -start.width;
        }
        if let Err(e) = control
            .set_scene_item_position(scene, item.id, Some(x), None)
            .await
        {
            warn!(item = %item.source_name, "Overlay animation ended: {e}");
            return;
        }
        tokio::time::sleep(OVERLAY_TICK).await;
    }
}

/// Remove generated image/text pairs beyond `keep` left over from a
/// previous show.
async fn remove_stale_items(
    control: &dyn BroadcastControl,
    stage: &StageMap,
    keep: usize,
) -> Result<(), ControlError> {
    for item in control.scene_items(&stage.overlay_scene).await? {
        if let Some(index) = generated_index(&item.source_name, stage) {
            if index > keep {
                info!(item = %item.source_name, "Removing stale overlay item");
                control.remove_input(&item.source_name).await?;
            }
        }
    }
    Ok(())
}

async fn reference_transform(
    control: &dyn BroadcastControl,
    scene: &str,
    source: &str,
) -> Result<ItemTransform, ControlError> {
    let id = control.scene_item_id(scene, source).await?;
    control.scene_item_transform(scene, id).await
}

/// Settings for a generated text item: its string plus the styling of
/// the reference text, so every generated item renders like it.
fn text_settings(text: &str, style: &Value) -> Value {
    json!({
        "text": text,
        "color1": style.get("color1").cloned().unwrap_or(Value::Null),
        "color2": style.get("color2").cloned().unwrap_or(Value::Null),
        "font": style.get("font").cloned().unwrap_or(Value::Null),
    })
}

/// Update an input's settings, creating it first if the scene does not
/// have it yet. Settings carry the full key set, so updates replace
/// rather than merge.
async fn ensure_input(
    control: &dyn BroadcastControl,
    scene: &str,
    input: &str,
    kind: &str,
    settings: Value,
) -> Result<i64, ControlError> {
    match control.scene_item_id(scene, input).await {
        Ok(id) => {
            control.set_input_settings(input, settings, false).await?;
            Ok(id)
        }
        Err(_) => control.create_input(scene, input, kind, settings).await,
    }
}

/// Parse the 1-based index out of a generated overlay item name.
fn generated_index(name: &str, stage: &StageMap) -> Option<usize> {
    indexed(name, &stage.overlay_image_prefix).or_else(|| indexed(name, &stage.overlay_text_prefix))
}

fn indexed(name: &str, prefix: &str) -> Option<usize> {
    name.strip_prefix(prefix)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use showrunner_obs::{CanvasSize, ControlResult, MediaAction};

    const IMAGE_REF_ID: i64 = 1;
    const TEXT_REF_ID: i64 = 2;

    /// Overlay scene stand-in: two reference items with a known style,
    /// plus whatever generated items the test seeds. Records every
    /// input the code under test creates or updates.
    struct OverlayScene {
        stage: StageMap,
        existing: Vec<String>,
        created: Mutex<Vec<(String, String, Value)>>,
        updated: Mutex<Vec<(String, Value, bool)>>,
    }

    impl OverlayScene {
        fn new(existing: Vec<String>) -> Self {
            Self {
                stage: StageMap::default(),
                existing,
                created: Mutex::new(Vec::new()),
                updated: Mutex::new(Vec::new()),
            }
        }

        fn reference_style() -> Value {
            json!({
                "color1": 4278190335u32,
                "color2": 4294901760u32,
                "font": { "face": "Inter", "size": 36 },
            })
        }
    }

    #[async_trait]
    impl BroadcastControl for OverlayScene {
        async fn current_scene(&self) -> ControlResult<String> {
            Ok(self.stage.overlay_scene.clone())
        }

        async fn set_current_scene(&self, _scene: &str) -> ControlResult<()> {
            Ok(())
        }

        async fn set_input_settings(
            &self,
            input: &str,
            settings: Value,
            overlay: bool,
        ) -> ControlResult<()> {
            self.updated.lock().push((input.to_string(), settings, overlay));
            Ok(())
        }

        async fn input_settings(&self, input: &str) -> ControlResult<Value> {
            if input == self.stage.overlay_ref_text {
                Ok(Self::reference_style())
            } else {
                Ok(Value::Null)
            }
        }

        async fn create_input(
            &self,
            _scene: &str,
            input: &str,
            kind: &str,
            settings: Value,
        ) -> ControlResult<i64> {
            let mut created = self.created.lock();
            created.push((input.to_string(), kind.to_string(), settings));
            Ok(100 + created.len() as i64)
        }

        async fn remove_input(&self, _input: &str) -> ControlResult<()> {
            Ok(())
        }

        async fn trigger_media_action(
            &self,
            _input: &str,
            _action: MediaAction,
        ) -> ControlResult<()> {
            Ok(())
        }

        async fn scene_items(&self, _scene: &str) -> ControlResult<Vec<SceneItem>> {
            let mut items = vec![
                SceneItem {
                    id: IMAGE_REF_ID,
                    source_name: self.stage.overlay_ref_image.clone(),
                },
                SceneItem {
                    id: TEXT_REF_ID,
                    source_name: self.stage.overlay_ref_text.clone(),
                },
            ];
            for (index, name) in self.existing.iter().enumerate() {
                items.push(SceneItem {
                    id: 10 + index as i64,
                    source_name: name.clone(),
                });
            }
            Ok(items)
        }

        async fn scene_item_id(&self, _scene: &str, source: &str) -> ControlResult<i64> {
            if source == self.stage.overlay_ref_image {
                return Ok(IMAGE_REF_ID);
            }
            if source == self.stage.overlay_ref_text {
                return Ok(TEXT_REF_ID);
            }
            if let Some(index) = self.existing.iter().position(|name| name == source) {
                return Ok(10 + index as i64);
            }
            Err(ControlError::RequestFailed {
                code: 600,
                message: format!("No source '{source}'"),
            })
        }

        async fn scene_item_transform(
            &self,
            _scene: &str,
            item_id: i64,
        ) -> ControlResult<ItemTransform> {
            Ok(match item_id {
                IMAGE_REF_ID => ItemTransform {
                    position_x: 40.0,
                    position_y: 880.0,
                    width: 200.0,
                    height: 200.0,
                },
                TEXT_REF_ID => ItemTransform {
                    position_x: 40.0,
                    position_y: 1100.0,
                    width: 120.0,
                    height: 40.0,
                },
                _ => ItemTransform {
                    position_x: 0.0,
                    position_y: 0.0,
                    width: 150.0,
                    height: 40.0,
                },
            })
        }

        async fn set_scene_item_position(
            &self,
            _scene: &str,
            _item_id: i64,
            _x: Option<f64>,
            _y: Option<f64>,
        ) -> ControlResult<()> {
            Ok(())
        }

        async fn start_stream(&self) -> ControlResult<()> {
            Ok(())
        }

        async fn stop_stream(&self) -> ControlResult<()> {
            Ok(())
        }

        async fn stream_active(&self) -> ControlResult<bool> {
            Ok(true)
        }

        async fn start_record(&self) -> ControlResult<()> {
            Ok(())
        }

        async fn stop_record(&self) -> ControlResult<()> {
            Ok(())
        }

        async fn record_active(&self) -> ControlResult<bool> {
            Ok(false)
        }

        async fn canvas_size(&self) -> ControlResult<CanvasSize> {
            Ok(CanvasSize {
                width: 1920,
                height: 1080,
            })
        }
    }

    fn asset(text: &str) -> OverlayAsset {
        OverlayAsset {
            file_name: "qr.png".to_string(),
            url: "https://cdn.example/qr.png".to_string(),
            text: text.to_string(),
            width: 200,
            height: 200,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_created_text_copies_reference_styling() {
        let scene = OverlayScene::new(Vec::new());

        sync_overlay_items(&scene, &scene.stage, &[asset("Booth 12")])
            .await
            .unwrap();

        let created = scene.created.lock();
        let style = OverlayScene::reference_style();
        let (_, kind, settings) = created
            .iter()
            .find(|(name, _, _)| name == &format!("{}1", scene.stage.overlay_text_prefix))
            .expect("text input created");
        assert_eq!(kind, TEXT_INPUT_KIND);
        assert_eq!(settings["text"], json!("Booth 12"));
        assert_eq!(settings["color1"], style["color1"]);
        assert_eq!(settings["color2"], style["color2"]);
        assert_eq!(settings["font"], style["font"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refreshed_text_replaces_full_settings() {
        let stage = StageMap::default();
        let scene = OverlayScene::new(vec![
            format!("{}1", stage.overlay_image_prefix),
            format!("{}1", stage.overlay_text_prefix),
        ]);

        sync_overlay_items(&scene, &scene.stage, &[asset("Booth 12")])
            .await
            .unwrap();

        assert!(scene.created.lock().is_empty());
        let updated = scene.updated.lock();
        let (_, settings, overlay) = updated
            .iter()
            .find(|(name, _, _)| name == &format!("{}1", scene.stage.overlay_text_prefix))
            .expect("text input refreshed");
        // Full key set with no merge, so stale styling cannot linger.
        assert!(!overlay);
        assert_eq!(settings["text"], json!("Booth 12"));
        assert_eq!(
            settings["font"],
            OverlayScene::reference_style()["font"]
        );
    }

    #[test]
    fn test_generated_index_parses_both_prefixes() {
        let stage = StageMap::default();
        let image = format!("{}3", stage.overlay_image_prefix);
        let text = format!("{}12", stage.overlay_text_prefix);

        assert_eq!(generated_index(&image, &stage), Some(3));
        assert_eq!(generated_index(&text, &stage), Some(12));
    }

    #[test]
    fn test_generated_index_ignores_other_sources() {
        let stage = StageMap::default();
        assert_eq!(generated_index(&stage.overlay_ref_image, &stage), None);
        assert_eq!(generated_index("MainVideo", &stage), None);
        assert_eq!(
            generated_index(&format!("{}abc", stage.overlay_image_prefix), &stage),
            None
        );
    }
}
