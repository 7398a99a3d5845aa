//! Player write path — commits the write, then notifies the sync engine
//! exactly once per committed change.
//!
//! The full CRUD surface lives in the player-facing services; this is the
//! slice of it the segmentation engine needs as its trigger source.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use playerforge_core::types::Player;
use playerforge_core::ForgeResult;
use playerforge_store::GroupStore;

use crate::sync::SyncEngine;

pub struct PlayerService {
    store: Arc<dyn GroupStore>,
    sync: Arc<SyncEngine>,
}

impl PlayerService {
    pub fn new(store: Arc<dyn GroupStore>, sync: Arc<SyncEngine>) -> Self {
        Self { store, sync }
    }

    /// Create a player with an optional initial property set.
    pub fn create_player(
        &self,
        game_id: Uuid,
        props: Vec<(String, String)>,
    ) -> ForgeResult<Player> {
        self.store.game(game_id)?;

        let mut player = Player::new(game_id);
        for (key, value) in props {
            player.set_prop(key, value);
        }
        self.store.upsert_player(player.clone())?;
        info!(player_id = %player.id, game_id = %game_id, "player created");

        self.sync.notify_player_write(player.id);
        Ok(player)
    }

    /// Apply property writes in one batch: `Some(value)` upserts the key,
    /// `None` deletes it. One sync notification per committed batch.
    pub fn set_player_props(
        &self,
        player_id: Uuid,
        props: Vec<(String, Option<String>)>,
    ) -> ForgeResult<Player> {
        let mut player = self.store.player(player_id)?;
        for (key, value) in props {
            match value {
                Some(value) => player.set_prop(key, value),
                None => player.delete_prop(&key),
            }
        }
        self.store.upsert_player(player.clone())?;

        self.sync.notify_player_write(player_id);
        Ok(player)
    }

    /// Record player activity. `lastSeenAt` feeds rule evaluation, so this
    /// is a sync trigger like any other write.
    pub fn touch_last_seen(&self, player_id: Uuid) -> ForgeResult<Player> {
        let mut player = self.store.player(player_id)?;
        player.last_seen_at = Utc::now();
        self.store.upsert_player(player.clone())?;

        self.sync.notify_player_write(player_id);
        Ok(player)
    }
}
