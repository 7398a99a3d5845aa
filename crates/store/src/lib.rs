//! Storage layer for games, players, groups, and the derived membership
//! relation.
//!
//! The segmentation engine talks to storage through [`GroupStore`]; the
//! in-process [`MemoryStore`] is the default backing. Membership rows are a
//! materialized cache owned by the sync engine — nothing else writes them.

use std::collections::BTreeSet;

use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use playerforge_core::types::{Game, Group, Player};
use playerforge_core::{ForgeError, ForgeResult};

/// Narrow storage interface consumed by the segmentation core.
///
/// All methods are fallible so that backends with real I/O can surface
/// transient failures into the sync engine's retry path.
pub trait GroupStore: Send + Sync {
    fn game(&self, game_id: Uuid) -> ForgeResult<Game>;
    fn insert_game(&self, game: Game) -> ForgeResult<()>;

    fn player(&self, player_id: Uuid) -> ForgeResult<Player>;
    fn upsert_player(&self, player: Player) -> ForgeResult<()>;
    fn players_by_game(&self, game_id: Uuid) -> ForgeResult<Vec<Player>>;

    fn group(&self, group_id: Uuid) -> ForgeResult<Group>;
    fn groups_by_game(&self, game_id: Uuid) -> ForgeResult<Vec<Group>>;
    /// Insert or replace a group together with its rules. Validation happens
    /// upstream; the store persists what it is given.
    fn save_group(&self, group: Group) -> ForgeResult<()>;
    /// Delete a group, its rules, and every membership row referencing it.
    fn delete_group(&self, group_id: Uuid) -> ForgeResult<()>;

    /// Group ids the player currently holds membership in.
    fn memberships_of_player(&self, player_id: Uuid) -> ForgeResult<Vec<Uuid>>;
    fn members_of_group(&self, group_id: Uuid) -> ForgeResult<Vec<Uuid>>;
    fn member_count(&self, group_id: Uuid) -> ForgeResult<usize>;

    /// Apply a membership diff for one player: all additions and removals
    /// commit together or not at all.
    fn apply_membership_diff(
        &self,
        player_id: Uuid,
        added: &[Uuid],
        removed: &[Uuid],
    ) -> ForgeResult<()>;
}

/// Dashmap-backed in-process store.
///
/// Membership is held authoritatively per player; the per-player row set
/// lives in a single map entry, so a diff applies atomically under that
/// entry's lock.
#[derive(Default)]
pub struct MemoryStore {
    games: DashMap<Uuid, Game>,
    players: DashMap<Uuid, Player>,
    groups: DashMap<Uuid, Group>,
    memberships: DashMap<Uuid, BTreeSet<Uuid>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GroupStore for MemoryStore {
    fn game(&self, game_id: Uuid) -> ForgeResult<Game> {
        self.games
            .get(&game_id)
            .map(|g| g.clone())
            .ok_or(ForgeError::NotFound("game"))
    }

    fn insert_game(&self, game: Game) -> ForgeResult<()> {
        self.games.insert(game.id, game);
        Ok(())
    }

    fn player(&self, player_id: Uuid) -> ForgeResult<Player> {
        self.players
            .get(&player_id)
            .map(|p| p.clone())
            .ok_or(ForgeError::NotFound("player"))
    }

    fn upsert_player(&self, player: Player) -> ForgeResult<()> {
        self.players.insert(player.id, player);
        Ok(())
    }

    fn players_by_game(&self, game_id: Uuid) -> ForgeResult<Vec<Player>> {
        Ok(self
            .players
            .iter()
            .filter(|p| p.game_id == game_id)
            .map(|p| p.clone())
            .collect())
    }

    fn group(&self, group_id: Uuid) -> ForgeResult<Group> {
        self.groups
            .get(&group_id)
            .map(|g| g.clone())
            .ok_or(ForgeError::NotFound("group"))
    }

    fn groups_by_game(&self, game_id: Uuid) -> ForgeResult<Vec<Group>> {
        Ok(self
            .groups
            .iter()
            .filter(|g| g.game_id == game_id)
            .map(|g| g.clone())
            .collect())
    }

    fn save_group(&self, group: Group) -> ForgeResult<()> {
        debug!(group_id = %group.id, rules = group.rules.len(), "saving group");
        self.groups.insert(group.id, group);
        Ok(())
    }

    fn delete_group(&self, group_id: Uuid) -> ForgeResult<()> {
        self.groups
            .remove(&group_id)
            .ok_or(ForgeError::NotFound("group"))?;
        for mut entry in self.memberships.iter_mut() {
            entry.value_mut().remove(&group_id);
        }
        Ok(())
    }

    fn memberships_of_player(&self, player_id: Uuid) -> ForgeResult<Vec<Uuid>> {
        Ok(self
            .memberships
            .get(&player_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default())
    }

    fn members_of_group(&self, group_id: Uuid) -> ForgeResult<Vec<Uuid>> {
        Ok(self
            .memberships
            .iter()
            .filter(|entry| entry.value().contains(&group_id))
            .map(|entry| *entry.key())
            .collect())
    }

    fn member_count(&self, group_id: Uuid) -> ForgeResult<usize> {
        Ok(self
            .memberships
            .iter()
            .filter(|entry| entry.value().contains(&group_id))
            .count())
    }

    fn apply_membership_diff(
        &self,
        player_id: Uuid,
        added: &[Uuid],
        removed: &[Uuid],
    ) -> ForgeResult<()> {
        let mut rows = self.memberships.entry(player_id).or_default();
        for group_id in added {
            rows.insert(*group_id);
        }
        for group_id in removed {
            rows.remove(group_id);
        }
        Ok(())
    }
}
