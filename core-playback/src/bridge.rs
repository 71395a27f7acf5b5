//! # Event Bridge
//!
//! Turns media handle callbacks into ordered control-loop messages.
//!
//! ## Overview
//!
//! ```text
//!  MediaHandle ──callback──> MediaEventSink (epoch N)
//!                                 │
//!          ┌──────────────┬───────┴──────┬──────────────┐
//!          ▼              ▼              ▼              ▼
//!     play/pause      buffering        error           end
//!      observer        observer      observer       observer
//!          │              │              │              │
//!          └──────────────┴──────┬───────┴──────────────┘
//!                                ▼
//!                   ControlMessage (tagged with N)
//!                                ▼
//!                          control loop
//! ```
//!
//! Observers never touch state. Each forwards what it saw, tagged with the
//! epoch of the session that produced it, and the loop drops anything from a
//! superseded session. A panic while relaying one notification is reported to
//! the loop as a bridge failure and the observer carries on with the next.

use crate::coordinator::{ControlMessage, PlayerCommand};
use crate::state::{PlaybackSnapshot, PlayerStatus};
use bridge_traits::{MediaEventSink, MediaFailure, MediaNotification};
use core_async::select;
use core_async::sync::{mpsc, watch, CancellationToken};
use core_async::task::{self, panic_message, JoinHandle};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, error, trace};

/// A notification tagged with the session that produced it.
#[derive(Debug)]
struct Tagged<T> {
    epoch: u64,
    value: T,
}

/// Native transport change, as seen by the play/pause observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transport {
    Played,
    Paused { at_end: bool },
}

/// Sending side of the four observer channels.
#[derive(Clone)]
pub(crate) struct EventBridge {
    transport: mpsc::UnboundedSender<Tagged<Transport>>,
    buffering: mpsc::UnboundedSender<Tagged<bool>>,
    errors: mpsc::UnboundedSender<Tagged<MediaFailure>>,
    ended: mpsc::UnboundedSender<Tagged<()>>,
}

impl EventBridge {
    /// Starts the observers. They run until `shutdown` fires or the control
    /// loop goes away.
    pub(crate) fn spawn(
        control: mpsc::UnboundedSender<ControlMessage>,
        state: watch::Receiver<PlaybackSnapshot>,
        shutdown: CancellationToken,
    ) -> (Self, Vec<JoinHandle<()>>) {
        let (transport, transport_rx) = mpsc::unbounded_channel();
        let (buffering, buffering_rx) = mpsc::unbounded_channel();
        let (errors, errors_rx) = mpsc::unbounded_channel();
        let (ended, ended_rx) = mpsc::unbounded_channel();

        let handles = vec![
            spawn_observer(
                "play-pause",
                transport_rx,
                control.clone(),
                shutdown.clone(),
                move |tagged| reconcile_transport(&state.borrow(), tagged),
            ),
            spawn_observer(
                "buffering",
                buffering_rx,
                control.clone(),
                shutdown.clone(),
                |Tagged { epoch, value }| {
                    Some(ControlMessage::Buffering {
                        epoch,
                        buffering: value,
                    })
                },
            ),
            spawn_observer(
                "error",
                errors_rx,
                control.clone(),
                shutdown.clone(),
                |Tagged { epoch, value }| {
                    Some(ControlMessage::MediaFailed {
                        epoch,
                        failure: value,
                    })
                },
            ),
            spawn_observer("end", ended_rx, control, shutdown, |Tagged { epoch, .. }| {
                Some(ControlMessage::Ended { epoch })
            }),
        ];

        (
            Self {
                transport,
                buffering,
                errors,
                ended,
            },
            handles,
        )
    }

    /// Sink handed to the media handle for the session with `epoch`.
    pub(crate) fn sink_for(&self, epoch: u64) -> MediaEventSink {
        let bridge = self.clone();
        MediaEventSink::new(move |notification| bridge.route(epoch, notification))
    }

    fn route(&self, epoch: u64, notification: MediaNotification) {
        trace!(epoch, ?notification, "Media notification");
        // Send failures mean the player is shutting down.
        match notification {
            MediaNotification::Played => {
                let _ = self.transport.send(Tagged {
                    epoch,
                    value: Transport::Played,
                });
            }
            MediaNotification::Paused { at_end } => {
                let _ = self.transport.send(Tagged {
                    epoch,
                    value: Transport::Paused { at_end },
                });
            }
            MediaNotification::BufferingChanged(value) => {
                let _ = self.buffering.send(Tagged { epoch, value });
            }
            MediaNotification::Error(value) => {
                let _ = self.errors.send(Tagged { epoch, value });
            }
            MediaNotification::Ended => {
                let _ = self.ended.send(Tagged { epoch, value: () });
            }
        }
    }
}

/// Decides whether a native transport change needs a state correction.
///
/// A native play while we are neither playing nor starting to becomes a
/// resume; a native pause while we think we are playing becomes a state-only
/// pause. The natural pause at end of stream is left to the end observer.
fn reconcile_transport(
    snapshot: &PlaybackSnapshot,
    Tagged { epoch, value }: Tagged<Transport>,
) -> Option<ControlMessage> {
    if snapshot.epoch() != Some(epoch) {
        debug!(epoch, current = ?snapshot.epoch(), "Ignoring transport change from stale session");
        return None;
    }

    let playing = snapshot.current_state == PlayerStatus::Playing;
    // Loading covers a handle that reports play from inside `play()`.
    let starting = playing || snapshot.current_state == PlayerStatus::Loading;
    let command = match value {
        Transport::Played if !starting => PlayerCommand::Resume,
        Transport::Paused { at_end: false } if playing => PlayerCommand::Pause {
            only_set_state: true,
        },
        _ => return None,
    };

    debug!(epoch, ?command, "Reconciling with native transport");
    Some(ControlMessage::Reconcile { epoch, command })
}

fn spawn_observer<T, F>(
    name: &'static str,
    mut rx: mpsc::UnboundedReceiver<Tagged<T>>,
    control: mpsc::UnboundedSender<ControlMessage>,
    shutdown: CancellationToken,
    mut relay: F,
) -> JoinHandle<()>
where
    T: Send + 'static,
    F: FnMut(Tagged<T>) -> Option<ControlMessage> + Send + 'static,
{
    let failures = control.clone();

    task::spawn_guarded(
        async move {
            loop {
                let next = select! {
                    _ = shutdown.cancelled() => None,
                    next = rx.recv() => next,
                };
                let Some(tagged) = next else { break };

                let message = match catch_unwind(AssertUnwindSafe(|| relay(tagged))) {
                    Ok(Some(message)) => message,
                    Ok(None) => continue,
                    Err(payload) => {
                        let message = panic_message(payload.as_ref());
                        error!(observer = name, %message, "Bridge observer panicked");
                        ControlMessage::BridgeFailed {
                            observer: name,
                            message,
                        }
                    }
                };
                if control.send(message).is_err() {
                    break;
                }
            }
            debug!(observer = name, "Bridge observer stopped");
        },
        move |message| {
            error!(observer = name, %message, "Bridge observer panicked");
            let _ = failures.send(ControlMessage::BridgeFailed {
                observer: name,
                message,
            });
        },
    )
}
