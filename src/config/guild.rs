//! Per-guild competition settings

use crate::types::GuildId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Guild-level configuration consulted by the queue and score engines.
/// Created lazily with defaults the first time a guild is touched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildSettings {
    pub guild_id: GuildId,
    /// Allow a user to wait in more than one lobby at a time
    pub allow_multi_queueing: bool,
    /// Minimum time between two successful joins by the same user
    pub requeue_delay: Option<Duration>,
    /// Points awarded on a win when the player's rank has no override
    pub default_win_modifier: i32,
    /// Points deducted on a loss when the player's rank has no override
    pub default_loss_modifier: i32,
    /// Display-name template for the presentation layer
    pub name_format: String,
}

impl GuildSettings {
    pub fn new(guild_id: GuildId) -> Self {
        Self {
            guild_id,
            allow_multi_queueing: true,
            requeue_delay: None,
            default_win_modifier: 10,
            default_loss_modifier: 5,
            name_format: "{name} [{points}]".to_string(),
        }
    }
}
