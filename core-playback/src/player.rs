//! # Player Handle
//!
//! Host-facing entry point: [`spawn_player`] wires the coordinator, the event
//! bridge and the listen recorder together and hands back a cloneable
//! [`PlayerHandle`].
//!
//! ## Usage
//!
//! ```ignore
//! use core_playback::{spawn_player, PlaybackTuning};
//!
//! let player = spawn_player(&config, PlaybackTuning::default())?;
//! player.attach_media(Arc::new(MyAudioElement::new()));
//!
//! player.play("queue-slot-1", TrackId::new(42), Some(Arc::new(move || queue.advance())))?;
//! let mut state = player.watch_state();
//! state.changed().await?;
//! ```
//!
//! Commands are fire-and-forget: they queue behind whatever the coordinator
//! is doing and return once queued. Watch the snapshot or subscribe to
//! events to see their effect.

use crate::bridge::EventBridge;
use crate::config::PlaybackTuning;
use crate::coordinator::{ControlMessage, Coordinator, CoordinatorDeps, MediaSlot, PlayerCommand};
use crate::error::{PlaybackError, Result};
use crate::listen::ListenRecorder;
use crate::locator::{ForcedStreamPolicy, StreamResolver};
use crate::state::{Collectible, OnEnd, PlaybackSnapshot};
use bridge_traits::{MediaHandle, TrackId};
use core_async::sync::{mpsc, oneshot, watch, CancellationToken};
use core_async::task;
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, Receiver};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Starts a player.
///
/// Must be called from within a tokio runtime. The player runs until
/// [`PlayerHandle::shutdown`] is called.
///
/// # Errors
///
/// Returns `PlaybackError::InvalidConfig` if `config` or `tuning` fail
/// validation.
pub fn spawn_player(config: &CoreConfig, tuning: PlaybackTuning) -> Result<PlayerHandle> {
    config
        .validate()
        .map_err(|e| PlaybackError::InvalidConfig(e.to_string()))?;
    tuning.validate()?;

    let events = EventBus::new(config.event_buffer_size);
    let (control_tx, control_rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(PlaybackSnapshot::default());
    let (media_tx, media_rx) = watch::channel::<MediaSlot>(None);
    let shutdown = CancellationToken::new();

    let (bridge, _observers) =
        EventBridge::spawn(control_tx.clone(), state_rx.clone(), shutdown.child_token());

    let policy = ForcedStreamPolicy::new(
        Arc::clone(&config.remote_config),
        tuning.forced_stream_key.clone(),
    );
    let resolver = Arc::new(StreamResolver::new(
        Arc::clone(&config.track_repository),
        policy,
        tuning.stream_endpoint.clone(),
    ));

    let coordinator = Coordinator::new(
        control_rx,
        control_tx.clone(),
        media_rx,
        state_tx,
        CoordinatorDeps {
            resolver,
            cache: Arc::clone(&config.cache_subscriptions),
            events: events.clone(),
            bridge,
        },
        shutdown.clone(),
    );
    task::spawn(coordinator.run());

    let handle = PlayerHandle {
        control: control_tx,
        state: state_rx,
        media: Arc::new(media_tx),
        events,
        shutdown: shutdown.clone(),
    };

    ListenRecorder::new(
        handle.clone(),
        &tuning,
        config.listen_reporter.clone(),
        Arc::clone(&config.clock),
    )
    .spawn(shutdown.child_token());

    info!(
        listen_threshold = ?tuning.listen_threshold,
        stream_endpoint = %tuning.stream_endpoint,
        "Player started"
    );
    Ok(handle)
}

/// Cloneable handle to a running player.
#[derive(Clone)]
pub struct PlayerHandle {
    control: mpsc::UnboundedSender<ControlMessage>,
    state: watch::Receiver<PlaybackSnapshot>,
    media: Arc<watch::Sender<MediaSlot>>,
    events: EventBus,
    shutdown: CancellationToken,
}

impl PlayerHandle {
    fn send(&self, command: PlayerCommand) -> Result<()> {
        self.control
            .send(ControlMessage::Command(command))
            .map_err(|_| PlaybackError::CoordinatorClosed)
    }

    /// Plays a catalog track in queue slot `uid`, superseding whatever was
    /// playing. `on_end` runs if the track plays to its end.
    pub fn play(&self, uid: impl Into<String>, track_id: TrackId, on_end: Option<OnEnd>) -> Result<()> {
        self.send(PlayerCommand::Play {
            uid: uid.into(),
            track_id,
            on_end,
        })
    }

    /// Resumes the current session. Does nothing without one.
    pub fn resume(&self) -> Result<()> {
        self.send(PlayerCommand::Resume)
    }

    pub fn pause(&self) -> Result<()> {
        self.send(PlayerCommand::Pause {
            only_set_state: false,
        })
    }

    pub fn seek(&self, position: Duration) -> Result<()> {
        self.send(PlayerCommand::Seek(position))
    }

    pub fn stop(&self) -> Result<()> {
        self.send(PlayerCommand::Stop)
    }

    /// Rewinds the current session; see [`PlayerCommand::Reset`].
    pub fn reset(&self, should_autoplay: bool) -> Result<()> {
        self.send(PlayerCommand::Reset { should_autoplay })
    }

    pub fn play_collectible(
        &self,
        uid: impl Into<String>,
        collectible: Collectible,
        on_end: Option<OnEnd>,
    ) -> Result<()> {
        self.send(PlayerCommand::PlayCollectible {
            uid: uid.into(),
            collectible,
            on_end,
        })
    }

    /// Sends a raw command.
    pub fn command(&self, command: PlayerCommand) -> Result<()> {
        self.send(command)
    }

    /// Current position, read from the media handle through the
    /// coordinator. Falls back to the last known position when no handle is
    /// attached or the handle fails to answer.
    pub async fn position(&self) -> Result<Duration> {
        let (reply, response) = oneshot::channel();
        self.control
            .send(ControlMessage::QueryPosition(reply))
            .map_err(|_| PlaybackError::CoordinatorClosed)?;
        response.await.map_err(|_| PlaybackError::CoordinatorClosed)
    }

    /// Attaches (or replaces) the native media handle. Commands issued
    /// before the first attach wait for it.
    pub fn attach_media(&self, media: Arc<dyn MediaHandle>) {
        info!("Media handle attached");
        self.media.send_replace(Some(media));
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.state.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.state.clone()
    }

    pub fn subscribe_events(&self) -> Receiver<CoreEvent> {
        self.events.subscribe()
    }

    pub(crate) fn event_bus(&self) -> EventBus {
        self.events.clone()
    }

    /// Stops the coordinator and every task it owns.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.is_cancelled() && !self.control.is_closed()
    }
}

impl std::fmt::Debug for PlayerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerHandle")
            .field("state", &self.state.borrow().current_state)
            .field("running", &self.is_running())
            .finish()
    }
}
