//! Test fixtures for exercising the fully wired ladder service

use chrono::{TimeZone, Utc};
use pug_ladder::config::AppConfig;
use pug_ladder::events::RecordingEventSink;
use pug_ladder::service::LadderService;
use pug_ladder::store::{MemoryStore, Store};
use pug_ladder::types::{ChannelId, GuildId, Lobby, PickMode, Player, UserId};
use pug_ladder::utils::{Clock, ManualClock};
use std::sync::Arc;

pub const GUILD: GuildId = 1;

/// A complete service over the in-memory store, with a controllable clock
/// and a recording event sink
pub struct TestSystem {
    pub service: Arc<LadderService>,
    pub store: Arc<MemoryStore>,
    pub sink: Arc<RecordingEventSink>,
    pub clock: Arc<ManualClock>,
}

pub fn create_test_system() -> TestSystem {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
    ));
    let sink = Arc::new(RecordingEventSink::with_clock(clock.clone()));
    let service = Arc::new(LadderService::with_parts(
        AppConfig::default(),
        store.clone(),
        sink.clone(),
        clock.clone(),
    ));
    TestSystem {
        service,
        store,
        sink,
        clock,
    }
}

impl TestSystem {
    pub fn add_lobby(
        &self,
        channel_id: ChannelId,
        players_per_team: usize,
        pick_mode: PickMode,
    ) -> Lobby {
        let mut lobby = Lobby::new(channel_id, GUILD, players_per_team);
        lobby.pick_mode = pick_mode;
        self.service.create_lobby(lobby.clone()).unwrap();
        lobby
    }

    pub fn register(&self, user_id: UserId, points: i32) {
        let mut player = Player::new(GUILD, user_id, format!("player-{user_id}"), self.clock.now());
        player.points = points;
        self.store.upsert_player(player).unwrap();
    }

    pub fn points_of(&self, user_id: UserId) -> i32 {
        self.store.get_player(GUILD, user_id).unwrap().unwrap().points
    }

    /// Join users one by one, asserting each admission succeeds
    pub async fn fill_queue(&self, channel_id: ChannelId, users: &[UserId]) {
        for &user_id in users {
            let outcome = self
                .service
                .queues()
                .join_queue(channel_id, user_id)
                .await
                .unwrap();
            assert!(
                matches!(outcome, pug_ladder::JoinOutcome::Joined { .. }),
                "expected {user_id} to join, got {outcome:?}"
            );
        }
    }
}
