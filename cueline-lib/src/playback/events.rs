//! Player notifications and the hub that fans them out.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use super::state::Track;

/// Everything observers can learn about the player.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    Started,
    Paused,
    /// Manual stop.
    Stopped,
    /// Natural end of the current track.
    TrackEnded,
    PositionChanged(f64),
    DurationChanged(f64),
    VolumeChanged(f64),
    Advanced(Track),
    RetryAttempted { track: Track, attempt: u32, max: u32 },
    PlaybackFailed(Track),
    PlaylistEnded,
    ErrorOccurred(String),
}

/// Fan-out of [`PlayerEvent`]s to any number of subscribers.
///
/// Clones share the subscriber list. Dropped subscriptions are pruned on the
/// next emit.
#[derive(Debug, Clone, Default)]
pub struct EventHub {
    subscribers: Arc<Mutex<Vec<Sender<PlayerEvent>>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = mpsc::channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sender);
        Subscription { receiver }
    }

    pub fn emit(&self, event: PlayerEvent) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|sender| sender.send(event.clone()).is_ok());
    }

    /// Live subscribers as of the last emit.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Receiving end of an [`EventHub`] subscription. Drop to unsubscribe.
#[derive(Debug)]
pub struct Subscription {
    receiver: Receiver<PlayerEvent>,
}

impl Subscription {
    pub fn try_next(&self) -> Option<PlayerEvent> {
        self.receiver.try_recv().ok()
    }

    /// Wait up to `timeout` for the next event.
    pub fn next_timeout(&self, timeout: Duration) -> Option<PlayerEvent> {
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Everything delivered so far.
    pub fn drain(&self) -> Vec<PlayerEvent> {
        self.receiver.try_iter().collect()
    }
}
