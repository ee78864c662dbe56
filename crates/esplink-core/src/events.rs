//! Session event system for state and reading notifications.
//!
//! The session manager publishes every state transition, every decoded
//! reading and every connection failure as a [`SessionEvent`]. Consumers
//! register with [`EventDispatcher::subscribe`] and receive events in the
//! order they were produced.
//!
//! Delivery never blocks the producer: each subscriber has an unbounded
//! queue, so a slow consumer accumulates events instead of stalling the read
//! loop.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tracing::debug;

use esplink_types::{ConnectionState, DeviceRef, Reading};

use crate::error::ConnectionFailureReason;

/// Events published by a session.
///
/// All events are serializable for logging and IPC.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new event types
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum SessionEvent {
    /// The session moved to a new state.
    StateChanged { state: ConnectionState },
    /// A record was decoded into a reading.
    Reading {
        reading: Reading,
        #[serde(with = "time::serde::rfc3339")]
        received_at: OffsetDateTime,
    },
    /// Opening the stream failed, or an open stream failed.
    ///
    /// The state has already been reset to `Idle` when this is observed.
    ConnectionFailed {
        device: Option<DeviceRef>,
        reason: ConnectionFailureReason,
    },
}

impl SessionEvent {
    /// The new state, for `StateChanged` events.
    pub fn state(&self) -> Option<ConnectionState> {
        match self {
            Self::StateChanged { state } => Some(*state),
            _ => None,
        }
    }

    /// The reading, for `Reading` events.
    pub fn reading(&self) -> Option<&Reading> {
        match self {
            Self::Reading { reading, .. } => Some(reading),
            _ => None,
        }
    }
}

/// Sender for session events.
pub type EventSender = mpsc::UnboundedSender<SessionEvent>;

/// Receiver for session events.
pub type EventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

/// Fan-out of session events to any number of subscribers.
#[derive(Debug, Default)]
pub struct EventDispatcher {
    subscribers: Mutex<Vec<EventSender>>,
}

impl EventDispatcher {
    /// Create a dispatcher with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to events published from now on.
    pub fn subscribe(&self) -> EventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().push(tx);
        rx
    }

    /// Publish an event to every live subscriber.
    ///
    /// Subscribers whose receiver was dropped are pruned.
    pub fn send(&self, event: SessionEvent) {
        let mut subscribers = self.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        if subscribers.is_empty() {
            debug!("No subscribers for {:?}", event);
        }
    }

    /// Get the number of live subscribers.
    pub fn receiver_count(&self) -> usize {
        let mut subscribers = self.lock();
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<EventSender>> {
        // A panic while holding this lock cannot leave the Vec inconsistent.
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
