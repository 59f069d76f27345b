//! Per-lobby critical sections
//!
//! Every queue or game mutation for a lobby runs under that lobby's lock,
//! serializing the read-check-write sequences in join/leave, the
//! lobby-full transition, draft progress, scoring, and the expiry sweep.

use crate::types::ChannelId;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry of per-lobby async locks, shared by every component that
/// mutates lobby state
#[derive(Debug, Default)]
pub struct LobbyLocks {
    locks: RwLock<HashMap<ChannelId, Arc<Mutex<()>>>>,
}

impl LobbyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, channel_id: ChannelId) -> Arc<Mutex<()>> {
        if let Ok(locks) = self.locks.read() {
            if let Some(lock) = locks.get(&channel_id) {
                return lock.clone();
            }
        }
        match self.locks.write() {
            Ok(mut locks) => locks.entry(channel_id).or_default().clone(),
            // Poisoned registry: fall back to a fresh lock rather than panic
            Err(_) => Arc::new(Mutex::new(())),
        }
    }

    /// Enter the lobby's critical section
    pub async fn acquire(&self, channel_id: ChannelId) -> OwnedMutexGuard<()> {
        self.lock_for(channel_id).lock_owned().await
    }
}
