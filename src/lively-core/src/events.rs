//! Local notifications emitted while a lively debate runs.
//!
//! The scheduler knows nothing about push transports; an orchestrator
//! subscribes here and forwards whatever its clients need.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::trigger::InterruptionCandidate;

/// Callback for lively events.
pub type EventCallback = Box<dyn Fn(&LivelyEvent) + Send + Sync>;

/// Events emitted during a lively debate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LivelyEvent {
    /// A participant took the floor.
    SpeakerStarted { speaker_id: String, at_ms: u64 },
    /// A participant's turn ended, normally or by interruption.
    SpeakerEnded {
        speaker_id: String,
        duration_ms: u64,
        interrupted: bool,
    },
    /// A streamed chunk was appended to the current turn.
    TokenChunk {
        speaker_id: String,
        chunk: String,
        position: usize,
    },
    /// A safe cut point was found.
    BoundarySafe {
        speaker_id: String,
        position: usize,
        content: String,
    },
    InterruptWindowOpened { speaker_id: String, at_ms: u64 },
    InterruptWindowClosed { speaker_id: String, reason: String },
    /// An interruption was accepted and the floor is changing hands.
    InterruptionFired { candidate: InterruptionCandidate },
}

#[derive(Default)]
struct Subscribers {
    callbacks: Vec<EventCallback>,
    channels: Vec<mpsc::UnboundedSender<LivelyEvent>>,
}

/// Fan-out of [`LivelyEvent`]s to callbacks and channels. Clones share
/// the same subscriber list.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<Subscribers>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback invoked synchronously for every event.
    pub fn on_event(&self, callback: EventCallback) {
        self.subscribers().callbacks.push(callback);
    }

    /// Subscribe through an unbounded channel.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<LivelyEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers().channels.push(tx);
        rx
    }

    /// Emit an event to every subscriber. Closed channels are dropped.
    pub fn emit(&self, event: LivelyEvent) {
        let mut subs = self.subscribers();
        for callback in &subs.callbacks {
            callback(&event);
        }
        subs.channels.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn subscribers(&self) -> MutexGuard<'_, Subscribers> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let subs = self.subscribers();
        f.debug_struct("EventBus")
            .field("callbacks", &subs.callbacks.len())
            .field("channels", &subs.channels.len())
            .finish()
    }
}
