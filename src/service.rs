//! Service wiring and lifecycle
//!
//! `LadderService` owns every component behind the public surface: the
//! store, the shared lock registry, the queue manager, the game manager,
//! the score engine, and the registries. The binary builds one of these
//! and runs the expiry sweeper until shutdown.

use crate::config::AppConfig;
use crate::error::Result;
use crate::events::{EventSink, NullEventSink};
use crate::game::GameManager;
use crate::queue::{LobbyLocks, QueueManager, RequeueCooldowns};
use crate::registry::{BanRegistry, PartyRegistry};
use crate::score::ScoreEngine;
use crate::store::{MemoryStore, Store};
use crate::types::Lobby;
use crate::utils::{Clock, SystemClock};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Fully wired ladder system
pub struct LadderService {
    config: AppConfig,
    store: Arc<dyn Store>,
    queues: Arc<QueueManager>,
    games: Arc<GameManager>,
    scores: Arc<ScoreEngine>,
    bans: Arc<BanRegistry>,
    parties: Arc<PartyRegistry>,
    running: AtomicBool,
}

impl LadderService {
    /// Wire the service with the in-memory store, the system clock, and a
    /// discarding event sink
    pub fn new(config: AppConfig) -> Self {
        Self::with_parts(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(NullEventSink),
            Arc::new(SystemClock),
        )
    }

    /// Wire the service around caller-supplied seams, used by tests and by
    /// embedders with their own store or sink
    pub fn with_parts(
        config: AppConfig,
        store: Arc<dyn Store>,
        events: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let locks = Arc::new(LobbyLocks::new());
        let games = Arc::new(GameManager::new(
            store.clone(),
            events.clone(),
            clock.clone(),
            locks.clone(),
        ));
        let bans = Arc::new(BanRegistry::new(store.clone(), clock.clone()));
        let parties = Arc::new(PartyRegistry::new(store.clone()));
        let queues = Arc::new(QueueManager::new(
            store.clone(),
            events.clone(),
            clock.clone(),
            locks.clone(),
            games.clone(),
            parties.clone(),
            bans.clone(),
            Arc::new(RequeueCooldowns::new()),
            config.queue.clone(),
        ));
        let scores = Arc::new(ScoreEngine::new(store.clone(), events, clock, locks));

        Self {
            config,
            store,
            queues,
            games,
            scores,
            bans,
            parties,
            running: AtomicBool::new(true),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn queues(&self) -> &QueueManager {
        &self.queues
    }

    pub fn games(&self) -> &GameManager {
        &self.games
    }

    pub fn scores(&self) -> &ScoreEngine {
        &self.scores
    }

    pub fn bans(&self) -> &BanRegistry {
        &self.bans
    }

    pub fn parties(&self) -> &PartyRegistry {
        &self.parties
    }

    /// Register a matchmaking channel
    pub fn create_lobby(&self, lobby: Lobby) -> Result<()> {
        info!(
            channel_id = lobby.channel_id,
            guild_id = lobby.guild_id,
            players_per_team = lobby.players_per_team,
            "Lobby configured"
        );
        self.store.upsert_lobby(lobby)
    }

    /// Spawn the periodic stale-entry sweeper. The loop exits once
    /// `shutdown` is called.
    pub fn start_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let service = self.clone();
        let mut interval = tokio::time::interval(self.config.queue.sweep_interval());
        tokio::spawn(async move {
            loop {
                interval.tick().await;
                if !service.is_running() {
                    break;
                }
                match service.queues.expire_stale().await {
                    Ok(0) => {}
                    Ok(expired) => info!(expired, "Queue sweep removed stale entries"),
                    Err(e) => warn!("Queue sweep failed: {e}"),
                }
            }
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
        info!("Ladder service shutting down");
    }

    /// JSON snapshot of every live queue, for operator inspection
    pub fn dump_queues(&self) -> Result<serde_json::Value> {
        let mut lobbies = Vec::new();
        for channel_id in self.store.channels_with_queues()? {
            let queue = self.store.queue_for_lobby(channel_id)?;
            lobbies.push(json!({
                "channel_id": channel_id,
                "queue_size": queue.len(),
                "entries": queue,
            }));
        }
        Ok(json!({ "lobbies": lobbies }))
    }
}
