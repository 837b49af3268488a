//! The show supervisor.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use showrunner_obs::{ops, BroadcastControl, StageMap};
use showrunner_protocol::{
    event_channel, ShowConfig, ShowEvent, ShowState, ShowSummary, StopReason, TaskKind,
};
use showrunner_queue::RecirculatingQueue;

use crate::overlay::{rotate_overlays, sync_overlay_items};
use crate::schedule::{ShowAssets, ShowDirectory};
use crate::tasks::{self, TaskError};
use crate::EngineError;

/// Owns the broadcast lifecycle. Cheap to clone; all clones share one
/// supervisor.
///
/// One show runs at a time. `start` moves the state machine
/// `Idle -> Starting` and spawns the run; the run itself walks
/// `Starting -> Running -> Stopping -> Idle`, supervising the four
/// concurrent activities in between. `add_video` and `stop` may be
/// called from any context at any time; they only touch the queue and
/// the cancellation token, never the state directly.
#[derive(Clone)]
pub struct ShowRunner {
    inner: Arc<Inner>,
}

struct Inner {
    control: Arc<dyn BroadcastControl>,
    directory: Arc<dyn ShowDirectory>,
    stage: Arc<StageMap>,
    queue: RecirculatingQueue,
    state: RwLock<ShowState>,
    event_tx: broadcast::Sender<ShowEvent>,
    cancel: Mutex<Option<CancellationToken>>,
    started_at: Mutex<Option<Instant>>,
}

impl ShowRunner {
    pub fn new(
        control: Arc<dyn BroadcastControl>,
        directory: Arc<dyn ShowDirectory>,
        stage: StageMap,
    ) -> Self {
        let (event_tx, _) = event_channel();
        Self {
            inner: Arc::new(Inner {
                control,
                directory,
                stage: Arc::new(stage),
                queue: RecirculatingQueue::new(),
                state: RwLock::new(ShowState::Idle),
                event_tx,
                cancel: Mutex::new(None),
                started_at: Mutex::new(None),
            }),
        }
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<ShowEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Snapshot of the current lifecycle state.
    pub fn state(&self) -> ShowState {
        self.inner.state.read().clone()
    }

    /// Number of videos currently queued.
    pub fn queue_len(&self) -> usize {
        self.inner.queue.len()
    }

    /// How long the current run has been going, if one is active.
    pub fn elapsed(&self) -> Option<Duration> {
        self.inner.started_at.lock().map(|started| started.elapsed())
    }

    /// Start a show. Refused while another run is active.
    pub fn start(&self, config: ShowConfig) -> Result<(), EngineError> {
        if config.show_id.is_empty() {
            return Err(EngineError::MissingShowId);
        }
        if config.videos.is_empty() {
            warn!(show_id = %config.show_id, "Start refused, no videos");
            return Err(EngineError::NoVideos);
        }

        let inner = &self.inner;

        // Check-and-set under one write lock so concurrent starts cannot
        // both pass the idle check.
        {
            let mut state = inner.state.write();
            if state.is_active() {
                warn!(state = state.name(), "Start refused, a show is already active");
                return Err(EngineError::AlreadyActive);
            }
            let previous = std::mem::replace(
                &mut *state,
                ShowState::Starting {
                    show_id: config.show_id.clone(),
                },
            );
            let current = state.clone();
            drop(state);
            let _ = inner.event_tx.send(ShowEvent::StateChanged { previous, current });
        }

        let token = CancellationToken::new();
        *inner.cancel.lock() = Some(token.clone());
        *inner.started_at.lock() = Some(Instant::now());

        info!(show_id = %config.show_id, videos = config.videos.len(), "Starting show");
        let run = Arc::clone(inner);
        tokio::spawn(async move { run.run_show(config, token).await });
        Ok(())
    }

    /// Queue a video at fresh priority. Returns whether it was accepted;
    /// a closed (not running) or full queue refuses it.
    pub fn add_video(&self, reference: &str) -> bool {
        let accepted = self.inner.queue.enqueue_fresh(reference);
        if accepted {
            info!(reference, queued = self.inner.queue.len(), "Video queued");
        }
        let _ = self.inner.event_tx.send(ShowEvent::VideoQueued {
            reference: reference.to_string(),
            accepted,
        });
        accepted
    }

    /// Request a graceful stop: close and drain the queue, then cancel
    /// the supervised activities. Safe to call when no show is active.
    pub fn stop(&self) {
        self.inner.queue.close();
        self.inner.queue.clear();
        match self.inner.cancel.lock().as_ref() {
            Some(token) => {
                info!("Stop requested");
                token.cancel();
            }
            None => warn!("Stop requested but no show is active"),
        }
    }
}

impl Inner {
    async fn run_show(self: Arc<Self>, config: ShowConfig, cancel: CancellationToken) {
        let show_id = config.show_id.clone();
        let max_duration = Duration::from_secs(config.max_duration_secs);
        let started = Instant::now();

        let reason = match self.stage_up(&config).await {
            Ok(assets) => {
                self.transition(ShowState::Running {
                    show_id: show_id.clone(),
                });
                Arc::clone(&self)
                    .run_main(&show_id, max_duration, assets, cancel)
                    .await
            }
            Err(e) => {
                error!(%show_id, "Show startup failed: {e}");
                StopReason::Faulted {
                    message: e.to_string(),
                }
            }
        };

        self.queue.close();
        self.queue.clear();
        self.transition(ShowState::Stopping {
            reason: reason.clone(),
        });

        // A faulted startup never reached the air, so there is nothing to
        // play out of.
        if !matches!(reason, StopReason::Faulted { .. }) {
            if let Err(e) = tasks::play_outro(
                self.control.as_ref(),
                &self.stage,
                self.directory.as_ref(),
                &show_id,
            )
            .await
            {
                warn!("Outro skipped: {e}");
            }
        }
        if config.record {
            if let Err(e) = ops::stop_recording(self.control.as_ref()).await {
                warn!("Failed to stop recording: {e}");
            }
        }
        if let Err(e) = ops::stop_streaming(self.control.as_ref(), &self.stage.empty_scene).await {
            warn!("Failed to stop streaming: {e}");
        }

        let duration = started.elapsed();
        info!(%show_id, duration_secs = duration.as_secs(), "Show ended");
        let _ = self.event_tx.send(ShowEvent::ShowEnded(ShowSummary {
            show_id: show_id.clone(),
            duration_secs: duration.as_secs(),
        }));

        *self.cancel.lock() = None;
        *self.started_at.lock() = None;
        self.transition(ShowState::Idle);
    }

    /// Everything that must succeed before the show counts as running:
    /// seed and open the queue, fetch assets, prime overlays, bring the
    /// stream up, play the intro.
    async fn stage_up(&self, config: &ShowConfig) -> Result<ShowAssets, TaskError> {
        self.queue.open();
        for reference in &config.videos {
            if !self.queue.enqueue_fresh(reference) {
                warn!(%reference, "Initial video refused by queue");
            }
        }

        let assets = self.directory.show_assets(&config.show_id).await?;
        info!(
            ads = assets.ads.len(),
            overlays = assets.overlays.len(),
            "Show assets fetched"
        );

        sync_overlay_items(self.control.as_ref(), &self.stage, &assets.overlays).await?;
        ops::ensure_streaming(self.control.as_ref()).await?;
        if config.record {
            ops::ensure_recording(self.control.as_ref()).await?;
        }
        tasks::play_intro(
            self.control.as_ref(),
            &self.stage,
            self.directory.as_ref(),
            &config.show_id,
        )
        .await?;

        Ok(assets)
    }

    /// Supervise the four concurrent activities. The first one to end or
    /// fail decides the stop reason, and every sibling is then cancelled.
    async fn run_main(
        self: Arc<Self>,
        show_id: &str,
        max_duration: Duration,
        assets: ShowAssets,
        cancel: CancellationToken,
    ) -> StopReason {
        let mut set: JoinSet<(TaskKind, Result<(), TaskError>)> = JoinSet::new();

        {
            let inner = Arc::clone(&self);
            let show_id = show_id.to_string();
            set.spawn(async move {
                let result = tasks::run_playback(
                    inner.control.as_ref(),
                    &inner.stage,
                    inner.directory.as_ref(),
                    &inner.queue,
                    &show_id,
                )
                .await;
                (TaskKind::Playback, result)
            });
        }
        {
            let inner = Arc::clone(&self);
            let ads = assets.ads;
            set.spawn(async move {
                let result =
                    tasks::rotate_ads(inner.control.as_ref(), &inner.stage, &ads).await;
                (TaskKind::AdRotation, result)
            });
        }
        {
            let control = Arc::clone(&self.control);
            let stage = Arc::clone(&self.stage);
            set.spawn(async move {
                (TaskKind::OverlayRotation, rotate_overlays(control, stage).await)
            });
        }
        {
            let inner = Arc::clone(&self);
            set.spawn(async move {
                let result = tasks::monitor_stream(inner.control.as_ref(), max_duration).await;
                (TaskKind::HealthMonitor, result)
            });
        }

        let reason = tokio::select! {
            _ = cancel.cancelled() => {
                info!("Stop requested, unwinding supervised activities");
                StopReason::Requested
            }
            joined = set.join_next() => match joined {
                Some(Ok((task, Ok(())))) => {
                    info!(task = task.name(), "Supervised activity ended");
                    let _ = self.event_tx.send(ShowEvent::TaskEnded { task, error: None });
                    StopReason::TaskEnded { task }
                }
                Some(Ok((task, Err(e)))) => {
                    error!(task = task.name(), "Supervised activity failed: {e}");
                    let _ = self.event_tx.send(ShowEvent::TaskEnded {
                        task,
                        error: Some(e.to_string()),
                    });
                    StopReason::TaskFailed {
                        task,
                        message: e.to_string(),
                    }
                }
                Some(Err(e)) => {
                    error!("Supervised activity panicked: {e}");
                    StopReason::Faulted { message: e.to_string() }
                }
                None => StopReason::Faulted {
                    message: "Supervised set drained unexpectedly".to_string(),
                },
            }
        };

        // Cancel and await every remaining activity before winding down.
        set.shutdown().await;
        reason
    }

    fn transition(&self, next: ShowState) {
        let mut state = self.state.write();
        let previous = std::mem::replace(&mut *state, next);
        let current = state.clone();
        drop(state);

        info!(from = previous.name(), to = current.name(), "Show state changed");
        let _ = self.event_tx.send(ShowEvent::StateChanged { previous, current });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use serde_json::Value;

    use showrunner_obs::{
        CanvasSize, ControlError, ControlResult, ItemTransform, MediaAction, SceneItem,
    };

    use crate::schedule::{DirectoryError, MediaSegment};

    #[derive(Default)]
    struct FakeControl {
        scene: Mutex<String>,
        streaming: AtomicBool,
        recording: AtomicBool,
        // When set, media actions against this input fail.
        fail_media_input: Mutex<Option<String>>,
    }

    #[async_trait]
    impl BroadcastControl for FakeControl {
        async fn current_scene(&self) -> ControlResult<String> {
            Ok(self.scene.lock().clone())
        }

        async fn set_current_scene(&self, scene: &str) -> ControlResult<()> {
            *self.scene.lock() = scene.to_string();
            Ok(())
        }

        async fn set_input_settings(
            &self,
            _input: &str,
            _settings: Value,
            _overlay: bool,
        ) -> ControlResult<()> {
            Ok(())
        }

        async fn input_settings(&self, _input: &str) -> ControlResult<Value> {
            Ok(Value::Null)
        }

        async fn create_input(
            &self,
            _scene: &str,
            _input: &str,
            _kind: &str,
            _settings: Value,
        ) -> ControlResult<i64> {
            Ok(1)
        }

        async fn remove_input(&self, _input: &str) -> ControlResult<()> {
            Ok(())
        }

        async fn trigger_media_action(
            &self,
            input: &str,
            _action: MediaAction,
        ) -> ControlResult<()> {
            if self.fail_media_input.lock().as_deref() == Some(input) {
                return Err(ControlError::ConnectionLost);
            }
            Ok(())
        }

        async fn scene_items(&self, _scene: &str) -> ControlResult<Vec<SceneItem>> {
            Ok(Vec::new())
        }

        async fn scene_item_id(&self, _scene: &str, source: &str) -> ControlResult<i64> {
            Err(ControlError::RequestFailed {
                code: 600,
                message: format!("No scene item named '{source}'"),
            })
        }

        async fn scene_item_transform(
            &self,
            _scene: &str,
            _item_id: i64,
        ) -> ControlResult<ItemTransform> {
            Ok(ItemTransform {
                position_x: 0.0,
                position_y: 0.0,
                width: 100.0,
                height: 100.0,
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
            self.streaming.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn stop_stream(&self) -> ControlResult<()> {
            self.streaming.store(false, Ordering::SeqCst);
            Ok(())
        }

        async fn stream_active(&self) -> ControlResult<bool> {
            Ok(self.streaming.load(Ordering::SeqCst))
        }

        async fn start_record(&self) -> ControlResult<()> {
            self.recording.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn stop_record(&self) -> ControlResult<()> {
            self.recording.store(false, Ordering::SeqCst);
            Ok(())
        }

        async fn record_active(&self) -> ControlResult<bool> {
            Ok(self.recording.load(Ordering::SeqCst))
        }

        async fn canvas_size(&self) -> ControlResult<CanvasSize> {
            Ok(CanvasSize {
                width: 1920,
                height: 1080,
            })
        }
    }

    struct StaticDirectory;

    #[async_trait]
    impl ShowDirectory for StaticDirectory {
        async fn show_assets(&self, _show_id: &str) -> Result<ShowAssets, DirectoryError> {
            Ok(ShowAssets::default())
        }

        async fn video(&self, reference: &str) -> Result<MediaSegment, DirectoryError> {
            Ok(MediaSegment {
                url: format!("https://cdn.test/{reference}.mp4"),
                duration: Duration::from_secs(1),
            })
        }

        async fn intro(&self, _show_id: &str) -> Result<MediaSegment, DirectoryError> {
            Ok(MediaSegment {
                url: "https://cdn.test/intro.mp4".into(),
                duration: Duration::from_secs(1),
            })
        }

        async fn outro(&self, _show_id: &str) -> Result<MediaSegment, DirectoryError> {
            Ok(MediaSegment {
                url: "https://cdn.test/outro.mp4".into(),
                duration: Duration::from_secs(1),
            })
        }
    }

    fn runner_with(control: Arc<FakeControl>) -> ShowRunner {
        ShowRunner::new(control, Arc::new(StaticDirectory), StageMap::default())
    }

    fn config(show_id: &str, max_duration_secs: u64, videos: &[&str]) -> ShowConfig {
        ShowConfig {
            show_id: show_id.to_string(),
            max_duration_secs,
            videos: videos.iter().map(|v| v.to_string()).collect(),
            record: false,
        }
    }

    async fn wait_for(runner: &ShowRunner, predicate: impl Fn(&ShowState) -> bool) {
        for _ in 0..600 {
            if predicate(&runner.state()) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        panic!("Timed out in state {:?}", runner.state());
    }

    fn drain(rx: &mut broadcast::Receiver<ShowEvent>) -> Vec<ShowEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_refuses_bad_config() {
        let runner = runner_with(Arc::new(FakeControl::default()));

        assert!(matches!(
            runner.start(config("", 60, &["v1"])),
            Err(EngineError::MissingShowId)
        ));
        assert!(matches!(
            runner.start(config("show-1", 60, &[])),
            Err(EngineError::NoVideos)
        ));
        assert!(runner.state().is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_refuses_while_active() {
        let runner = runner_with(Arc::new(FakeControl::default()));

        runner.start(config("show-1", 3600, &["v1"])).unwrap();
        assert!(matches!(
            runner.start(config("show-2", 3600, &["v2"])),
            Err(EngineError::AlreadyActive)
        ));

        runner.stop();
        wait_for(&runner, ShowState::is_idle).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_duration_cap_ends_the_show() {
        let control = Arc::new(FakeControl::default());
        let runner = runner_with(Arc::clone(&control));
        let mut rx = runner.subscribe();

        runner.start(config("show-1", 5, &["v1", "v2"])).unwrap();
        wait_for(&runner, ShowState::is_idle).await;

        assert!(!control.streaming.load(Ordering::SeqCst));
        let events = drain(&mut rx);
        assert!(events.iter().any(|event| matches!(
            event,
            ShowEvent::TaskEnded { task: TaskKind::HealthMonitor, error: None }
        )));
        assert!(events
            .iter()
            .any(|event| matches!(event, ShowEvent::ShowEnded(summary) if summary.show_id == "show-1")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_playback_failure_cancels_the_rest() {
        let control = Arc::new(FakeControl::default());
        let stage = StageMap::default();
        *control.fail_media_input.lock() = Some(stage.main_video_input.clone());
        let runner = runner_with(Arc::clone(&control));
        let mut rx = runner.subscribe();

        runner.start(config("show-1", 3600, &["v1"])).unwrap();
        wait_for(&runner, ShowState::is_idle).await;

        let events = drain(&mut rx);
        assert!(events.iter().any(|event| matches!(
            event,
            ShowEvent::TaskEnded { task: TaskKind::Playback, error: Some(_) }
        )));

        // The failure still winds down through Stopping, exactly once.
        let stopping = events
            .iter()
            .filter(|event| matches!(
                event,
                ShowEvent::StateChanged { current: ShowState::Stopping { .. }, .. }
            ))
            .count();
        assert_eq!(stopping, 1);
        assert!(!control.streaming.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recording_follows_the_run() {
        let control = Arc::new(FakeControl::default());
        let runner = runner_with(Arc::clone(&control));

        let mut recorded = config("show-1", 5, &["v1"]);
        recorded.record = true;
        runner.start(recorded).unwrap();

        wait_for(&runner, ShowState::is_running).await;
        assert!(control.recording.load(Ordering::SeqCst));

        wait_for(&runner, ShowState::is_idle).await;
        assert!(!control.recording.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_video_only_while_queue_open() {
        let runner = runner_with(Arc::new(FakeControl::default()));

        assert!(!runner.add_video("early"));

        runner.start(config("show-1", 3600, &["v1"])).unwrap();
        wait_for(&runner, ShowState::is_running).await;
        assert!(runner.add_video("extra"));
        assert!(runner.queue_len() >= 1);

        runner.stop();
        wait_for(&runner, ShowState::is_idle).await;
        assert!(!runner.add_video("late"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_unwinds_to_idle() {
        let control = Arc::new(FakeControl::default());
        let runner = runner_with(Arc::clone(&control));
        let mut rx = runner.subscribe();

        runner.start(config("show-1", 3600, &["v1"])).unwrap();
        wait_for(&runner, ShowState::is_running).await;

        runner.stop();
        wait_for(&runner, ShowState::is_idle).await;

        assert_eq!(runner.queue_len(), 0);
        assert!(!control.streaming.load(Ordering::SeqCst));
        assert!(runner.elapsed().is_none());
        assert!(drain(&mut rx)
            .iter()
            .any(|event| matches!(event, ShowEvent::ShowEnded(_))));
    }
}
