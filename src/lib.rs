//! Pug Ladder - Team matchmaking and point-ladder engine
//!
//! This crate provides per-channel queue management, a game lifecycle
//! state machine with captain drafts, team assembly strategies, and a
//! reversible score/rank ledger for pickup-game communities.

pub mod config;
pub mod error;
pub mod events;
pub mod game;
pub mod queue;
pub mod registry;
pub mod score;
pub mod service;
pub mod store;
pub mod team;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{LadderError, Result};
pub use types::*;

// Re-export key components
pub use events::{EventSink, NullEventSink, RecordingEventSink};
pub use game::GameManager;
pub use queue::{JoinOutcome, LeaveOutcome, QueueManager};
pub use score::ScoreEngine;
pub use service::LadderService;
pub use store::{MemoryStore, Store};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
