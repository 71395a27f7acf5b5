//! Shared fixtures for the player integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    BridgeError, CacheKind, CacheSubscriptions, Clock, ListenRecord, ListenReporter, LoadRequest,
    MediaEventSink, MediaHandle, OwnerMetadata, RemoteConfig, Segment, Subscription, TrackId,
    TrackMetadata, TrackRepository,
};
use core_playback::{spawn_player, PlaybackSnapshot, PlaybackTuning, PlayerHandle};
use core_runtime::config::CoreConfig;
use mockall::mock;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const WAIT: Duration = Duration::from_secs(2);

// ============================================================================
// Scripted media handle
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum MediaCall {
    Load(u64),
    Play,
    Pause,
    Seek(Duration),
    Stop,
}

#[derive(Default)]
struct MediaInner {
    calls: Vec<MediaCall>,
    loads: Vec<LoadRequest>,
    sinks: Vec<MediaEventSink>,
    position: Duration,
    fail_load: bool,
    fail_seek: bool,
}

/// In-memory media handle that records every call and keeps the sink of
/// each load so tests can fire notifications for any session.
#[derive(Default)]
pub struct ScriptedMedia {
    inner: Mutex<MediaInner>,
}

impl ScriptedMedia {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<MediaCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn count(&self, call: &MediaCall) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    pub fn loads(&self) -> Vec<LoadRequest> {
        self.inner.lock().unwrap().loads.clone()
    }

    /// Sink handed over with the `index`-th load.
    pub fn sink(&self, index: usize) -> MediaEventSink {
        self.inner.lock().unwrap().sinks[index].clone()
    }

    pub fn last_sink(&self) -> MediaEventSink {
        let inner = self.inner.lock().unwrap();
        inner.sinks.last().cloned().expect("nothing loaded yet")
    }

    pub fn set_position(&self, position: Duration) {
        self.inner.lock().unwrap().position = position;
    }

    pub fn fail_next_load(&self) {
        self.inner.lock().unwrap().fail_load = true;
    }

    pub fn fail_next_seek(&self) {
        self.inner.lock().unwrap().fail_seek = true;
    }

    fn record(&self, call: MediaCall) {
        self.inner.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl MediaHandle for ScriptedMedia {
    async fn load(&self, request: LoadRequest, sink: MediaEventSink) -> BridgeResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(MediaCall::Load(request.epoch));
        if std::mem::take(&mut inner.fail_load) {
            return Err(BridgeError::OperationFailed("decoder unavailable".into()));
        }
        inner.loads.push(request);
        inner.sinks.push(sink);
        inner.position = Duration::ZERO;
        Ok(())
    }

    async fn play(&self) -> BridgeResult<()> {
        self.record(MediaCall::Play);
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        self.record(MediaCall::Pause);
        Ok(())
    }

    async fn seek(&self, position: Duration) -> BridgeResult<()> {
        self.record(MediaCall::Seek(position));
        let mut inner = self.inner.lock().unwrap();
        if std::mem::take(&mut inner.fail_seek) {
            return Err(BridgeError::OperationFailed("seek rejected".into()));
        }
        inner.position = position;
        Ok(())
    }

    async fn stop(&self) -> BridgeResult<()> {
        self.record(MediaCall::Stop);
        Ok(())
    }

    async fn position(&self) -> BridgeResult<Duration> {
        Ok(self.inner.lock().unwrap().position)
    }
}

// ============================================================================
// Host bridges
// ============================================================================

/// Catalog holding a fixed set of tracks, all owned by user 1.
#[derive(Default)]
pub struct InMemoryCatalog {
    tracks: HashMap<TrackId, TrackMetadata>,
    delays: HashMap<TrackId, Duration>,
}

impl InMemoryCatalog {
    pub fn with_tracks(ids: &[u64]) -> Self {
        let tracks = ids
            .iter()
            .map(|&id| {
                let track_id = TrackId::new(id);
                (
                    track_id,
                    TrackMetadata {
                        track_id,
                        owner_id: 1,
                        title: format!("Track {id}"),
                        segments: vec![Segment::new(format!("Qm{id}"), 6.0)],
                    },
                )
            })
            .collect();
        Self {
            tracks,
            delays: HashMap::new(),
        }
    }

    /// Makes lookups of `id` slow.
    pub fn delay(mut self, id: u64, delay: Duration) -> Self {
        self.delays.insert(TrackId::new(id), delay);
        self
    }
}

#[async_trait]
impl TrackRepository for InMemoryCatalog {
    async fn get_track(&self, track_id: TrackId) -> BridgeResult<Option<TrackMetadata>> {
        if let Some(delay) = self.delays.get(&track_id) {
            tokio::time::sleep(*delay).await;
        }
        Ok(self.tracks.get(&track_id).cloned())
    }

    async fn get_user(&self, owner_id: u64) -> BridgeResult<Option<OwnerMetadata>> {
        Ok(Some(OwnerMetadata {
            user_id: owner_id,
            handle: "artist".into(),
            endpoint_config: Some("https://cn1.example/,https://cn2.example".into()),
        }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CacheOp {
    Subscribe(u64),
    Unsubscribe(u64),
}

#[derive(Default)]
pub struct RecordingCache {
    ops: Mutex<Vec<CacheOp>>,
}

impl RecordingCache {
    pub fn ops(&self) -> Vec<CacheOp> {
        self.ops.lock().unwrap().clone()
    }
}

#[async_trait]
impl CacheSubscriptions for RecordingCache {
    async fn subscribe(&self, kind: CacheKind, subscriptions: &[Subscription]) -> BridgeResult<()> {
        assert_eq!(kind, CacheKind::Track);
        let mut ops = self.ops.lock().unwrap();
        for sub in subscriptions {
            assert_eq!(sub.subscriber_id, "player");
            ops.push(CacheOp::Subscribe(sub.id));
        }
        Ok(())
    }

    async fn unsubscribe(&self, _kind: CacheKind, subscriptions: &[Subscription]) -> BridgeResult<()> {
        let mut ops = self.ops.lock().unwrap();
        ops.extend(subscriptions.iter().map(|sub| CacheOp::Unsubscribe(sub.id)));
        Ok(())
    }
}

mock! {
    pub Remote {}

    #[async_trait]
    impl RemoteConfig for Remote {
        async fn get_remote_var(&self, key: &str) -> BridgeResult<Option<String>>;
    }
}

mock! {
    pub Reporter {}

    #[async_trait]
    impl ListenReporter for Reporter {
        async fn record_listen(&self, record: ListenRecord) -> BridgeResult<()>;
    }
}

/// Remote config answering the forced-stream key with `forced`.
pub fn remote_with_forced(forced: &'static str) -> MockRemote {
    let mut remote = MockRemote::new();
    remote
        .expect_get_remote_var()
        .returning(move |_| Ok(Some(forced.to_string())));
    remote
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub player: PlayerHandle,
    pub media: Arc<ScriptedMedia>,
    pub cache: Arc<RecordingCache>,
}

pub struct HarnessBuilder {
    catalog: InMemoryCatalog,
    remote: MockRemote,
    reporter: Option<Arc<dyn ListenReporter>>,
    clock: Option<Arc<dyn Clock>>,
    tuning: PlaybackTuning,
    attach: bool,
}

impl HarnessBuilder {
    pub fn new(catalog: InMemoryCatalog) -> Self {
        Self {
            catalog,
            remote: remote_with_forced(""),
            reporter: None,
            clock: None,
            tuning: PlaybackTuning::default()
                .with_stream_endpoint("https://dn.example")
                // Keep the recorder quiet unless a test opts in.
                .with_listen_poll_interval(Duration::from_secs(3600)),
            attach: true,
        }
    }

    pub fn remote(mut self, remote: MockRemote) -> Self {
        self.remote = remote;
        self
    }

    pub fn reporter(mut self, reporter: Arc<dyn ListenReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn tuning(mut self, tuning: PlaybackTuning) -> Self {
        self.tuning = tuning;
        self
    }

    pub fn detached(mut self) -> Self {
        self.attach = false;
        self
    }

    pub fn start(self) -> Harness {
        let media = ScriptedMedia::new();
        let cache = Arc::new(RecordingCache::default());

        let mut builder = CoreConfig::builder()
            .track_repository(Arc::new(self.catalog))
            .cache_subscriptions(cache.clone())
            .remote_config(Arc::new(self.remote));
        if let Some(reporter) = self.reporter {
            builder = builder.listen_reporter(reporter);
        }
        if let Some(clock) = self.clock {
            builder = builder.clock(clock);
        }
        let config = builder.build().unwrap();

        let player = spawn_player(&config, self.tuning).unwrap();
        if self.attach {
            player.attach_media(media.clone());
        }

        Harness {
            player,
            media,
            cache,
        }
    }
}

/// Waits until the player's snapshot satisfies `predicate`.
pub async fn wait_for<F>(player: &PlayerHandle, predicate: F) -> PlaybackSnapshot
where
    F: FnMut(&PlaybackSnapshot) -> bool,
{
    let mut state = player.watch_state();
    let snapshot = tokio::time::timeout(WAIT, state.wait_for(predicate))
        .await
        .expect("timed out waiting for player state")
        .expect("player state channel closed")
        .clone();
    snapshot
}

/// Lets bridge observers drain, then round-trips the control loop so
/// everything queued before this call has been handled.
pub async fn settle(player: &PlayerHandle) {
    tokio::time::sleep(Duration::from_millis(50)).await;
    player.position().await.unwrap();
}

/// Counter usable as an `on_end` callback.
pub fn end_counter() -> (Arc<Mutex<u32>>, core_playback::OnEnd) {
    let count = Arc::new(Mutex::new(0));
    let hits = Arc::clone(&count);
    (count, Arc::new(move || *hits.lock().unwrap() += 1))
}
