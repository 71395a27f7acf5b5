//! # Playback Coordinator
//!
//! The single control loop that owns playback state.
//!
//! ## Overview
//!
//! Every mutation goes through one FIFO queue of [`ControlMessage`]s: host
//! commands from [`PlayerHandle`](crate::player::PlayerHandle), corrections
//! from the event bridge, results of off-loop track resolution. The loop
//! handles them one at a time, so there is never more than one writer.
//!
//! ## Sessions and epochs
//!
//! Each `Play` takes a fresh epoch. Anything that arrives later carries the
//! epoch it was produced for, and the loop drops it unless that epoch is both
//! the latest one handed out and the one of the current session (or, for
//! resolutions, of the pending play). A `Play` interrupts the playing session
//! as soon as it is issued, so the old session is silent while the new track
//! resolves. Nothing is cancelled when a session is superseded; late results
//! simply stop mattering.
//!
//! ## State machine
//!
//! ```text
//!            Play ┌─────────┐ load+play ┌─────────┐  Pause   ┌────────┐
//!   Idle ────────>│ Loading ├──────────>│ Playing │<────────>│ Paused │
//!     ▲           └────┬────┘           └────┬────┘  Resume  └────────┘
//!     │ Play           │ media error         │ end of track
//!  ┌──┴──────┐<────────┘                ┌────▼────┐
//!  │ Errored │                          │ Stopped │
//!  └─────────┘                          └─────────┘
//! ```

use crate::bridge::EventBridge;
use crate::error::{PlaybackError, Result};
use crate::locator::{ResolvedTrack, StreamResolver};
use crate::state::{
    Collectible, OnEnd, PlaybackSession, PlaybackSnapshot, PlayerStatus, SessionSource,
};
use bridge_traits::{
    CacheKind, CacheSubscriptions, LoadRequest, MediaFailure, MediaHandle, StreamLocator,
    Subscription, TrackId,
};
use core_async::select;
use core_async::sync::{mpsc, oneshot, watch, CancellationToken};
use core_async::task::{self, panic_message};
use core_runtime::events::{EventBus, PlaybackEvent};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Slot the host fills with its media handle.
pub(crate) type MediaSlot = Option<Arc<dyn MediaHandle>>;

/// Commands a host (or the bridge, on its behalf) can issue.
#[derive(Clone)]
pub enum PlayerCommand {
    /// Start a new session for a catalog track.
    Play {
        uid: String,
        track_id: TrackId,
        on_end: Option<OnEnd>,
    },
    /// Continue the current session.
    Resume,
    /// Pause. With `only_set_state` the media handle is not touched; used when
    /// the handle paused on its own.
    Pause { only_set_state: bool },
    Seek(Duration),
    Stop,
    /// Rewind. With `should_autoplay` the current session is played again
    /// under a new epoch, otherwise the player parks in `Idle`.
    Reset { should_autoplay: bool },
    /// Start a new session for a collectible's media URL.
    PlayCollectible {
        uid: String,
        collectible: Collectible,
        on_end: Option<OnEnd>,
    },
}

impl fmt::Debug for PlayerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerCommand::Play {
                uid,
                track_id,
                on_end,
            } => f
                .debug_struct("Play")
                .field("uid", uid)
                .field("track_id", track_id)
                .field("has_on_end", &on_end.is_some())
                .finish(),
            PlayerCommand::Resume => f.write_str("Resume"),
            PlayerCommand::Pause { only_set_state } => f
                .debug_struct("Pause")
                .field("only_set_state", only_set_state)
                .finish(),
            PlayerCommand::Seek(position) => f.debug_tuple("Seek").field(position).finish(),
            PlayerCommand::Stop => f.write_str("Stop"),
            PlayerCommand::Reset { should_autoplay } => f
                .debug_struct("Reset")
                .field("should_autoplay", should_autoplay)
                .finish(),
            PlayerCommand::PlayCollectible {
                uid,
                collectible,
                on_end,
            } => f
                .debug_struct("PlayCollectible")
                .field("uid", uid)
                .field("collectible", &collectible.id)
                .field("has_on_end", &on_end.is_some())
                .finish(),
        }
    }
}

/// Everything the control loop consumes.
#[derive(Debug)]
pub(crate) enum ControlMessage {
    Command(PlayerCommand),
    /// Correction from the play/pause observer, valid only for `epoch`.
    Reconcile { epoch: u64, command: PlayerCommand },
    /// Outcome of an off-loop track resolution.
    Resolved {
        epoch: u64,
        track_id: TrackId,
        outcome: Result<Option<ResolvedTrack>>,
    },
    Buffering { epoch: u64, buffering: bool },
    MediaFailed { epoch: u64, failure: MediaFailure },
    Ended { epoch: u64 },
    /// A bridge observer panicked and is gone.
    BridgeFailed {
        observer: &'static str,
        message: String,
    },
    QueryPosition(oneshot::Sender<Duration>),
}

/// A play waiting for its resolution.
struct PendingPlay {
    epoch: u64,
    uid: String,
    on_end: Option<OnEnd>,
    /// Whether issuing this play interrupted a session.
    interrupted: bool,
}

/// Collaborators the loop drives.
pub(crate) struct CoordinatorDeps {
    pub resolver: Arc<StreamResolver>,
    pub cache: Arc<dyn CacheSubscriptions>,
    pub events: EventBus,
    pub bridge: EventBridge,
}

pub(crate) struct Coordinator {
    rx: mpsc::UnboundedReceiver<ControlMessage>,
    control: mpsc::UnboundedSender<ControlMessage>,
    media: watch::Receiver<MediaSlot>,
    state_tx: watch::Sender<PlaybackSnapshot>,
    state: PlaybackSnapshot,
    deps: CoordinatorDeps,
    /// Last epoch handed out.
    epoch: u64,
    pending: Option<PendingPlay>,
    /// Track currently pinned in the host cache.
    pinned: Option<TrackId>,
    /// The media handle holds a loaded session that has not been stopped.
    audio_live: bool,
    shutdown: CancellationToken,
}

impl Coordinator {
    pub(crate) fn new(
        rx: mpsc::UnboundedReceiver<ControlMessage>,
        control: mpsc::UnboundedSender<ControlMessage>,
        media: watch::Receiver<MediaSlot>,
        state_tx: watch::Sender<PlaybackSnapshot>,
        deps: CoordinatorDeps,
        shutdown: CancellationToken,
    ) -> Self {
        let state = state_tx.borrow().clone();
        Self {
            rx,
            control,
            media,
            state_tx,
            state,
            deps,
            epoch: 0,
            pending: None,
            pinned: None,
            audio_live: false,
            shutdown,
        }
    }

    /// Runs until shutdown. Cancelling on exit also stops the bridge
    /// observers and the listen recorder.
    pub(crate) async fn run(mut self) {
        info!("Playback coordinator started");

        loop {
            let message = select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                message = self.rx.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
            };
            self.handle(message).await;
        }

        self.release_pin().await;
        self.shutdown.cancel();
        info!("Playback coordinator stopped");
    }

    async fn handle(&mut self, message: ControlMessage) {
        match message {
            ControlMessage::Command(command) => self.execute(command).await,
            ControlMessage::Reconcile { epoch, command } => {
                if self.is_current(epoch) {
                    self.execute(command).await;
                } else {
                    debug!(epoch, ?command, "Dropping correction from stale session");
                }
            }
            ControlMessage::Resolved {
                epoch,
                track_id,
                outcome,
            } => self.on_resolved(epoch, track_id, outcome).await,
            ControlMessage::Buffering { epoch, buffering } => self.on_buffering(epoch, buffering),
            ControlMessage::MediaFailed { epoch, failure } => {
                if self.is_current(epoch) {
                    self.fail(PlaybackError::Media(failure));
                } else {
                    debug!(epoch, %failure, "Dropping media failure from stale session");
                }
            }
            ControlMessage::Ended { epoch } => self.on_ended(epoch),
            ControlMessage::BridgeFailed { observer, message } => {
                self.fail(PlaybackError::BridgeFailure { observer, message });
            }
            ControlMessage::QueryPosition(reply) => {
                let position = self.refresh_position().await;
                let _ = reply.send(position);
            }
        }
    }

    /// Only the session of the latest epoch may touch state; a pending play
    /// silences the session it superseded.
    fn is_current(&self, epoch: u64) -> bool {
        self.epoch == epoch && self.state.epoch() == Some(epoch)
    }

    fn next_epoch(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }

    /// Waits until the host has attached a media handle.
    async fn media_ready(&mut self) -> Option<Arc<dyn MediaHandle>> {
        let attached = self.media.borrow().clone();
        if attached.is_some() {
            return attached;
        }

        debug!("Waiting for media handle");
        let ready = select! {
            _ = self.shutdown.cancelled() => false,
            slot = self.media.wait_for(Option::is_some) => slot.is_ok(),
        };
        if !ready {
            return None;
        }
        self.media.borrow().clone()
    }

    async fn execute(&mut self, command: PlayerCommand) {
        let Some(media) = self.media_ready().await else {
            return;
        };
        debug!(?command, state = %self.state.current_state, "Executing command");

        match command {
            PlayerCommand::Play {
                uid,
                track_id,
                on_end,
            } => self.play(&media, uid, track_id, on_end).await,
            PlayerCommand::Resume => self.resume(&media).await,
            PlayerCommand::Pause { only_set_state } => self.pause(&media, only_set_state).await,
            PlayerCommand::Seek(position) => self.seek(&media, position).await,
            PlayerCommand::Stop => self.stop(&media).await,
            PlayerCommand::Reset { should_autoplay } => self.reset(&media, should_autoplay).await,
            PlayerCommand::PlayCollectible {
                uid,
                collectible,
                on_end,
            } => self.play_collectible(&media, uid, collectible, on_end).await,
        }
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Takes a new epoch, interrupts the current session and resolves the
    /// track off the loop.
    async fn play(
        &mut self,
        media: &Arc<dyn MediaHandle>,
        uid: String,
        track_id: TrackId,
        on_end: Option<OnEnd>,
    ) {
        self.clear_error();
        let epoch = self.next_epoch();
        info!(epoch, %uid, %track_id, "Resolving track");

        let interrupted = self.state.session.is_some();
        if interrupted {
            self.halt_audio(media).await;
            self.release_pin().await;
            self.state.is_buffering = false;
            self.set_status(PlayerStatus::Loading);
        }

        self.pending = Some(PendingPlay {
            epoch,
            uid,
            on_end,
            interrupted,
        });

        let resolver = Arc::clone(&self.deps.resolver);
        let control = self.control.clone();
        let on_panic = self.control.clone();
        task::spawn_guarded(
            async move {
                let outcome = resolver.resolve(track_id).await;
                let _ = control.send(ControlMessage::Resolved {
                    epoch,
                    track_id,
                    outcome,
                });
            },
            move |message| {
                let _ = on_panic.send(ControlMessage::Resolved {
                    epoch,
                    track_id,
                    outcome: Err(PlaybackError::Internal(format!(
                        "track resolution panicked: {message}"
                    ))),
                });
            },
        );
    }

    async fn resume(&mut self, media: &Arc<dyn MediaHandle>) {
        self.clear_error();
        if self.state.session.is_none() {
            debug!("Resume without a session ignored");
            return;
        }
        if self.pending.is_some() {
            debug!("Resume while a play is resolving ignored");
            return;
        }

        if let Err(e) = media.play().await {
            self.fail(e.into());
            return;
        }
        self.set_status(PlayerStatus::Playing);
    }

    async fn pause(&mut self, media: &Arc<dyn MediaHandle>, only_set_state: bool) {
        if matches!(
            self.state.current_state,
            PlayerStatus::Idle | PlayerStatus::Stopped
        ) {
            debug!(state = %self.state.current_state, "Pause with nothing playing ignored");
            return;
        }

        if !only_set_state {
            if let Err(e) = media.pause().await {
                self.fail(e.into());
                return;
            }
        }
        self.set_status(PlayerStatus::Paused);
    }

    async fn seek(&mut self, media: &Arc<dyn MediaHandle>, position: Duration) {
        if let Err(e) = media.seek(position).await {
            self.fail(e.into());
            return;
        }
        self.state.position = position;
        self.publish();
    }

    async fn stop(&mut self, media: &Arc<dyn MediaHandle>) {
        let epoch = self.next_epoch();
        self.pending = None;
        self.release_pin().await;

        self.audio_live = false;
        if let Err(e) = media.stop().await {
            warn!(epoch, error = %e, "Media stop failed");
        }

        info!(epoch, "Playback stopped");
        self.state.session = None;
        self.state.is_buffering = false;
        self.state.position = Duration::ZERO;
        self.set_status(PlayerStatus::Stopped);
    }

    async fn reset(&mut self, media: &Arc<dyn MediaHandle>, should_autoplay: bool) {
        if let Err(e) = media.seek(Duration::ZERO).await {
            self.fail(e.into());
            return;
        }
        self.state.position = Duration::ZERO;

        if !should_autoplay {
            if let Err(e) = media.pause().await {
                self.fail(e.into());
                return;
            }
            self.set_status(PlayerStatus::Idle);
            return;
        }

        let Some(session) = self.state.session.clone() else {
            debug!("Reset without a session, nothing to replay");
            self.publish();
            return;
        };

        let on_end = session.on_end().cloned();
        match session.source {
            SessionSource::Track(track_id) => self.play(media, session.uid, track_id, on_end).await,
            SessionSource::Collectible(collectible) => {
                self.play_collectible(media, session.uid, collectible, on_end)
                    .await
            }
        }
    }

    async fn play_collectible(
        &mut self,
        media: &Arc<dyn MediaHandle>,
        uid: String,
        collectible: Collectible,
        on_end: Option<OnEnd>,
    ) {
        self.clear_error();
        let epoch = self.next_epoch();
        self.pending = None;

        let locator = StreamLocator::Direct {
            url: collectible.media_url.clone(),
        };
        let title = Some(collectible.name.clone());
        let session =
            PlaybackSession::new(uid, epoch, SessionSource::Collectible(collectible), on_end);
        self.begin_session(media, session, title, locator).await;
    }

    // ========================================================================
    // Session lifecycle
    // ========================================================================

    async fn on_resolved(
        &mut self,
        epoch: u64,
        track_id: TrackId,
        outcome: Result<Option<ResolvedTrack>>,
    ) {
        let pending = match self.pending.take() {
            Some(pending) if pending.epoch == epoch && self.epoch == epoch => pending,
            other => {
                self.pending = other;
                debug!(epoch, %track_id, "Dropping stale resolution");
                return;
            }
        };

        match outcome {
            Ok(Some(resolved)) => {
                let Some(media) = self.media_ready().await else {
                    return;
                };
                let session = PlaybackSession::new(
                    pending.uid,
                    epoch,
                    SessionSource::Track(resolved.track_id),
                    pending.on_end,
                );
                self.begin_session(&media, session, Some(resolved.title), resolved.locator)
                    .await;
            }
            Ok(None) => {
                info!(epoch, %track_id, "Track unavailable, play declined");
                self.settle_declined(pending.interrupted);
            }
            Err(e) if e.is_resource_unavailable() => {
                info!(epoch, %track_id, error = %e, "Track unavailable, play declined");
                self.settle_declined(pending.interrupted);
            }
            Err(e) => self.fail_with(e, Some(track_id)),
        }
    }

    /// A declined play leaves an untouched player as it was. One that already
    /// interrupted a session leaves it stopped, as if `Stop` had been issued.
    fn settle_declined(&mut self, interrupted: bool) {
        if !interrupted {
            return;
        }
        self.state.session = None;
        self.state.position = Duration::ZERO;
        self.set_status(PlayerStatus::Stopped);
    }

    /// Replaces the current session with `session` and starts it.
    async fn begin_session(
        &mut self,
        media: &Arc<dyn MediaHandle>,
        session: PlaybackSession,
        title: Option<String>,
        locator: StreamLocator,
    ) {
        let epoch = session.epoch;
        let track_id = session.track_id();

        self.halt_audio(media).await;
        self.release_pin().await;
        if let Some(track_id) = track_id {
            self.pin(track_id).await;
        }

        info!(epoch, uid = %session.uid, ?track_id, "Starting session");
        let request = LoadRequest {
            epoch,
            uid: session.uid.clone(),
            track_id,
            title,
            locator,
        };
        self.deps.events.emit_playback(PlaybackEvent::SessionStarted {
            epoch,
            uid: session.uid.clone(),
            track_id: track_id.map(TrackId::get),
        });

        self.state.session = Some(session);
        self.state.last_error = None;
        self.state.is_buffering = false;
        self.state.position = Duration::ZERO;
        self.set_status(PlayerStatus::Loading);

        if let Err(e) = media.load(request, self.deps.bridge.sink_for(epoch)).await {
            self.fail(e.into());
            return;
        }
        self.audio_live = true;
        if let Err(e) = media.play().await {
            self.fail(e.into());
            return;
        }
        self.set_status(PlayerStatus::Playing);
    }

    fn on_buffering(&mut self, epoch: u64, buffering: bool) {
        if !self.is_current(epoch) {
            debug!(epoch, buffering, "Dropping buffering change from stale session");
            return;
        }
        if self.state.is_buffering == buffering {
            return;
        }

        debug!(epoch, buffering, "Buffering changed");
        self.state.is_buffering = buffering;
        self.deps
            .events
            .emit_playback(PlaybackEvent::BufferingChanged { buffering });
        self.publish();
    }

    fn on_ended(&mut self, epoch: u64) {
        if !self.is_current(epoch) {
            debug!(epoch, "Dropping end of stale session");
            return;
        }
        let Some(session) = self.state.session.clone() else {
            return;
        };

        info!(epoch, track_id = ?session.track_id(), "Session completed");
        self.state.is_buffering = false;
        self.set_status(PlayerStatus::Stopped);
        self.deps.events.emit_playback(PlaybackEvent::Completed {
            epoch,
            track_id: session.track_id().map(TrackId::get),
        });

        if let Some(on_end) = session.on_end() {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| on_end())) {
                self.fail(PlaybackError::BridgeFailure {
                    observer: "end-of-track",
                    message: panic_message(payload.as_ref()),
                });
            }
        }
    }

    /// Stops whatever the media handle is still playing for an older session.
    async fn halt_audio(&mut self, media: &Arc<dyn MediaHandle>) {
        if !std::mem::take(&mut self.audio_live) {
            return;
        }
        if let Err(e) = media.stop().await {
            warn!(epoch = self.epoch, error = %e, "Failed to stop superseded session");
        }
    }

    // ========================================================================
    // State helpers
    // ========================================================================

    /// `Errored` goes back to `Idle` on the next play of any kind.
    fn clear_error(&mut self) {
        if self.state.current_state == PlayerStatus::Errored {
            self.state.last_error = None;
            self.set_status(PlayerStatus::Idle);
        }
    }

    fn fail(&mut self, error: PlaybackError) {
        let track_id = self.state.track_id();
        self.fail_with(error, track_id);
    }

    fn fail_with(&mut self, error: PlaybackError, track_id: Option<TrackId>) {
        let record = error.to_record(track_id);
        error!(?track_id, error = %error, info = ?record.info, "Playback failed");

        self.deps.events.emit_playback(PlaybackEvent::Error {
            track_id: track_id.map(TrackId::get),
            message: record.error.clone(),
            info: record.info.clone(),
        });
        self.state.last_error = Some(record);
        self.state.is_buffering = false;
        self.set_status(PlayerStatus::Errored);
    }

    fn set_status(&mut self, status: PlayerStatus) {
        if self.state.current_state != status {
            debug!(from = %self.state.current_state, to = %status, "State transition");
            self.state.current_state = status;
            self.deps.events.emit_playback(PlaybackEvent::StateChanged {
                state: status.as_str().to_string(),
            });
        }
        self.publish();
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.state.clone());
    }

    async fn refresh_position(&mut self) -> Duration {
        let attached = self.media.borrow().clone();
        let Some(media) = attached else {
            return self.state.position;
        };

        match media.position().await {
            Ok(position) => {
                if position != self.state.position {
                    self.state.position = position;
                    self.publish();
                }
                position
            }
            Err(e) => {
                warn!(error = %e, "Position query failed");
                self.state.position
            }
        }
    }

    async fn pin(&mut self, track_id: TrackId) {
        let subscription = [Subscription::player(track_id.get())];
        match self
            .deps
            .cache
            .subscribe(CacheKind::Track, &subscription)
            .await
        {
            Ok(()) => self.pinned = Some(track_id),
            Err(e) => warn!(%track_id, error = %e, "Failed to pin track in cache"),
        }
    }

    async fn release_pin(&mut self) {
        let Some(track_id) = self.pinned.take() else {
            return;
        };
        let subscription = [Subscription::player(track_id.get())];
        if let Err(e) = self
            .deps
            .cache
            .unsubscribe(CacheKind::Track, &subscription)
            .await
        {
            warn!(%track_id, error = %e, "Failed to release cache pin");
        }
    }
}
