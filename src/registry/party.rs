//! Party registry: paired players that queue and leave together
//!
//! A party is keyed by (channel, host). Membership changes are atomic
//! across all members; a user holds at most one party per channel.

use crate::error::{LadderError, Result};
use crate::store::Store;
use crate::types::{ChannelId, PartyMember, UserId};
use std::sync::Arc;
use tracing::info;

/// Result of a party-formation attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartyOutcome {
    Formed { members: Vec<UserId> },
    /// The named user already belongs to a party in this channel
    AlreadyInParty(UserId),
}

/// Result of a disband attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisbandOutcome {
    Disbanded { members: Vec<UserId> },
    NotInParty,
}

/// Manages duo/party membership per lobby channel
pub struct PartyRegistry {
    store: Arc<dyn Store>,
}

impl PartyRegistry {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Form a party of the host plus the given members. All rows are
    /// inserted together or not at all.
    pub fn form_party(
        &self,
        channel_id: ChannelId,
        host: UserId,
        members: &[UserId],
    ) -> Result<PartyOutcome> {
        let lobby = self
            .store
            .get_lobby(channel_id)?
            .ok_or(LadderError::LobbyNotFound { channel_id })?;

        let mut all = vec![host];
        all.extend_from_slice(members);
        for &user_id in &all {
            if self.store.party_member(channel_id, user_id)?.is_some() {
                return Ok(PartyOutcome::AlreadyInParty(user_id));
            }
        }

        let rows = all
            .iter()
            .map(|&user_id| PartyMember {
                channel_id,
                user_id,
                guild_id: lobby.guild_id,
                party_host: host,
            })
            .collect();
        self.store.insert_party(rows)?;

        info!(channel_id, host, size = all.len(), "Party formed");
        Ok(PartyOutcome::Formed { members: all })
    }

    /// Disband the party the user belongs to. Any member can disband; the
    /// whole party goes at once.
    pub fn disband(&self, channel_id: ChannelId, user_id: UserId) -> Result<DisbandOutcome> {
        let Some(member) = self.store.party_member(channel_id, user_id)? else {
            return Ok(DisbandOutcome::NotInParty);
        };

        let members = self
            .store
            .party_members(channel_id, member.party_host)?
            .iter()
            .map(|row| row.user_id)
            .collect();
        self.store.remove_party(channel_id, member.party_host)?;

        info!(channel_id, host = member.party_host, "Party disbanded");
        Ok(DisbandOutcome::Disbanded { members })
    }

    /// All members of the party the user belongs to, or just the user when
    /// they are solo
    pub fn party_of(&self, channel_id: ChannelId, user_id: UserId) -> Result<Vec<UserId>> {
        match self.store.party_member(channel_id, user_id)? {
            Some(member) => Ok(self
                .store
                .party_members(channel_id, member.party_host)?
                .iter()
                .map(|row| row.user_id)
                .collect()),
            None => Ok(vec![user_id]),
        }
    }
}
