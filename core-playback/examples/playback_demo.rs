//! # Player Walkthrough
//!
//! Drives a player against a simulated media handle: plays a track, lets it
//! buffer and finish, advances to the next one from `on_end`, then stops.
//!
//! Run with:
//! ```bash
//! # Pretty format (default in debug)
//! cargo run --example playback_demo --package core-playback
//!
//! # JSON format with a custom filter
//! cargo run --example playback_demo --package core-playback -- json "core_playback=trace"
//! ```

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::time::LogLevel;
use bridge_traits::{
    CacheKind, CacheSubscriptions, LoadRequest, MediaEventSink, MediaHandle, OwnerMetadata,
    RemoteConfig, Segment, Subscription, TrackId, TrackMetadata, TrackRepository,
};
use core_playback::{spawn_player, PlaybackTuning, PlayerStatus};
use core_runtime::config::CoreConfig;
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use std::env;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::info;

// ============================================================================
// Simulated host bridges
// ============================================================================

struct DemoCatalog;

#[async_trait]
impl TrackRepository for DemoCatalog {
    async fn get_track(&self, track_id: TrackId) -> BridgeResult<Option<TrackMetadata>> {
        let title = match track_id.get() {
            42 => "Opening Theme",
            43 => "Second Movement",
            _ => return Ok(None),
        };
        Ok(Some(TrackMetadata {
            track_id,
            owner_id: 7,
            title: title.to_string(),
            segments: vec![Segment::new("QmIntro", 6.0), Segment::new("QmOutro", 6.0)],
        }))
    }

    async fn get_user(&self, owner_id: u64) -> BridgeResult<Option<OwnerMetadata>> {
        Ok(Some(OwnerMetadata {
            user_id: owner_id,
            handle: "demo-artist".to_string(),
            endpoint_config: Some("https://cn1.demo/,https://cn2.demo".to_string()),
        }))
    }
}

struct NoCache;

#[async_trait]
impl CacheSubscriptions for NoCache {
    async fn subscribe(&self, _kind: CacheKind, _subs: &[Subscription]) -> BridgeResult<()> {
        Ok(())
    }

    async fn unsubscribe(&self, _kind: CacheKind, _subs: &[Subscription]) -> BridgeResult<()> {
        Ok(())
    }
}

/// Forces track 43 onto the single-file stream.
struct DemoRemoteConfig;

#[async_trait]
impl RemoteConfig for DemoRemoteConfig {
    async fn get_remote_var(&self, key: &str) -> BridgeResult<Option<String>> {
        Ok((key == "FORCE_MP3_STREAM_TRACK_IDS").then(|| "43".to_string()))
    }
}

/// Media handle that "plays" for a few hundred milliseconds per track,
/// reporting buffering and the end of stream through the sink.
#[derive(Default)]
struct SimulatedMedia {
    position: Arc<Mutex<Duration>>,
}

#[async_trait]
impl MediaHandle for SimulatedMedia {
    async fn load(&self, request: LoadRequest, sink: MediaEventSink) -> BridgeResult<()> {
        info!(
            epoch = request.epoch,
            title = ?request.title,
            locator = ?request.locator,
            "Simulated media loaded"
        );
        *self.position.lock().unwrap() = Duration::ZERO;

        let position = Arc::clone(&self.position);
        tokio::spawn(async move {
            sink.buffering(true);
            tokio::time::sleep(Duration::from_millis(100)).await;
            sink.buffering(false);
            for _ in 0..3 {
                tokio::time::sleep(Duration::from_millis(100)).await;
                *position.lock().unwrap() += Duration::from_secs(1);
            }
            sink.ended();
        });
        Ok(())
    }

    async fn play(&self) -> BridgeResult<()> {
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        Ok(())
    }

    async fn seek(&self, position: Duration) -> BridgeResult<()> {
        *self.position.lock().unwrap() = position;
        Ok(())
    }

    async fn stop(&self) -> BridgeResult<()> {
        Ok(())
    }

    async fn position(&self) -> BridgeResult<Duration> {
        Ok(*self.position.lock().unwrap())
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let format = match args.get(1).map(String::as_str) {
        Some("json") => LogFormat::Json,
        Some("compact") => LogFormat::Compact,
        Some("pretty") => LogFormat::Pretty,
        _ => LogFormat::default(),
    };
    let mut logging = LoggingConfig::default()
        .with_format(format)
        .with_level(LogLevel::Debug);
    if let Some(filter) = args.get(2) {
        logging = logging.with_filter(filter.clone());
    }
    init_logging(logging)?;

    let config = CoreConfig::builder()
        .track_repository(Arc::new(DemoCatalog))
        .cache_subscriptions(Arc::new(NoCache))
        .remote_config(Arc::new(DemoRemoteConfig))
        .build()?;

    let tuning = PlaybackTuning::default().with_listen_poll_interval(Duration::from_millis(250));
    let player = spawn_player(&config, tuning)?;
    player.attach_media(Arc::new(SimulatedMedia::default()));

    let mut events = player.subscribe_events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            info!(?event, "Event");
        }
    });

    let queue = player.clone();
    player.play(
        "queue-0",
        TrackId::new(42),
        Some(Arc::new(move || {
            let _ = queue.play("queue-1", TrackId::new(43), None);
        })),
    )?;

    let mut state = player.watch_state();
    state
        .wait_for(|s| s.uid() == Some("queue-1") && s.current_state == PlayerStatus::Stopped)
        .await?;

    player.stop()?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    info!(snapshot = ?player.snapshot(), "Demo finished");
    player.shutdown();

    Ok(())
}
