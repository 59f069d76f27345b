//! Configuration for the ladder service
//!
//! `AppConfig` covers process-level settings loaded from the environment;
//! `GuildSettings` is the per-guild competition configuration stored with
//! the rest of the guild's data.

pub mod app;
pub mod guild;

pub use app::{AppConfig, QueueSettings, ServiceSettings};
pub use guild::GuildSettings;
