//! Outbound event sink for the presentation layer
//!
//! The core never formats or delivers user-facing messages; it emits
//! structured events through this trait and lets the consumer decide how
//! to render them.

use crate::error::Result;
use crate::types::LadderEvent;
use crate::utils::{Clock, SystemClock};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::debug;
use uuid::Uuid;

/// Wrapper carrying delivery metadata alongside the event payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: Uuid,
    pub emitted_at: DateTime<Utc>,
    pub event: LadderEvent,
}

impl EventEnvelope {
    pub fn new(event: LadderEvent, emitted_at: DateTime<Utc>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            emitted_at,
            event,
        }
    }
}

/// Trait for publishing ladder events
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: LadderEvent) -> Result<()>;
}

/// Sink that drops every event; useful for tools and tests that do not
/// care about notifications.
#[derive(Debug, Default)]
pub struct NullEventSink;

#[async_trait]
impl EventSink for NullEventSink {
    async fn emit(&self, event: LadderEvent) -> Result<()> {
        debug!(?event, "Discarding event");
        Ok(())
    }
}

/// Sink that records every emitted event for inspection in tests
pub struct RecordingEventSink {
    clock: Arc<dyn Clock>,
    events: Mutex<Vec<EventEnvelope>>,
}

impl Default for RecordingEventSink {
    fn default() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp envelopes from the given clock instead of the system clock
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            events: Mutex::new(Vec::new()),
        }
    }

    /// All events emitted so far
    pub fn events(&self) -> Vec<LadderEvent> {
        self.events
            .lock()
            .map(|events| events.iter().map(|e| e.event.clone()).collect())
            .unwrap_or_default()
    }

    /// Emitted events with their delivery metadata
    pub fn envelopes(&self) -> Vec<EventEnvelope> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Count events of a specific variant name
    pub fn count_of(&self, event_type: &str) -> usize {
        self.events()
            .iter()
            .filter(|event| match event {
                LadderEvent::PlayerJoined(_) => event_type == "PlayerJoined",
                LadderEvent::PlayerLeft(_) => event_type == "PlayerLeft",
                LadderEvent::LobbyFull(_) => event_type == "LobbyFull",
                LadderEvent::DraftPickRequested(_) => event_type == "DraftPickRequested",
                LadderEvent::GameDecided(_) => event_type == "GameDecided",
            })
            .count()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

#[async_trait]
impl EventSink for RecordingEventSink {
    async fn emit(&self, event: LadderEvent) -> Result<()> {
        if let Ok(mut events) = self.events.lock() {
            events.push(EventEnvelope::new(event, self.clock.now()));
        }
        Ok(())
    }
}
