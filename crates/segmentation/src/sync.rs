//! Membership sync engine — re-derives a player's group rows after every
//! committed write.
//!
//! Maintenance is expressed as full re-evaluation: each trigger recomputes
//! the player's membership across all groups of its game and applies the
//! symmetric difference. That keeps the protocol idempotent, so failed or
//! stale syncs converge by simply running again.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use playerforge_core::config::SyncConfig;
use playerforge_core::types::Group;
use playerforge_core::ForgeResult;
use playerforge_store::GroupStore;

use crate::evaluator::CompiledRuleSet;

/// Net membership change from one player sync.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub added: Vec<Uuid>,
    pub removed: Vec<Uuid>,
}

impl SyncOutcome {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

pub struct SyncEngine {
    store: Arc<dyn GroupStore>,
    config: SyncConfig,
    locks: DashMap<Uuid, Arc<tokio::sync::Mutex<()>>>,
    compiled: DashMap<Uuid, (DateTime<Utc>, Arc<CompiledRuleSet>)>,
    retry: Mutex<VecDeque<Uuid>>,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn GroupStore>, config: SyncConfig) -> Self {
        Self {
            store,
            config,
            locks: DashMap::new(),
            compiled: DashMap::new(),
            retry: Mutex::new(VecDeque::new()),
        }
    }

    fn player_lock(&self, player_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .entry(player_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Compiled rule set for a group, cached until the group is edited.
    fn compiled_for(&self, group: &Group) -> ForgeResult<Arc<CompiledRuleSet>> {
        if let Some(entry) = self.compiled.get(&group.id) {
            if entry.0 == group.updated_at {
                return Ok(entry.1.clone());
            }
        }
        let compiled = Arc::new(CompiledRuleSet::for_group(group)?);
        self.compiled
            .insert(group.id, (group.updated_at, compiled.clone()));
        Ok(compiled)
    }

    /// Recompute this player's membership across every group of its game and
    /// apply the difference atomically. Syncs for the same player are
    /// serialized; different players proceed independently.
    pub async fn sync_player(&self, player_id: Uuid) -> ForgeResult<SyncOutcome> {
        let lock = self.player_lock(player_id);
        let _guard = lock.lock().await;

        let player = self.store.player(player_id)?;
        let groups = self.store.groups_by_game(player.game_id)?;
        let current: HashSet<Uuid> = self
            .store
            .memberships_of_player(player_id)?
            .into_iter()
            .collect();

        let mut outcome = SyncOutcome::default();
        for group in &groups {
            let rule_set = match self.compiled_for(group) {
                Ok(rule_set) => rule_set,
                Err(e) => {
                    // One bad stored group must not poison the rest.
                    warn!(group_id = %group.id, error = %e, "skipping group with invalid rules");
                    continue;
                }
            };
            let holds = rule_set.matches(&player);
            if holds && !current.contains(&group.id) {
                outcome.added.push(group.id);
            } else if !holds && current.contains(&group.id) {
                outcome.removed.push(group.id);
            }
        }

        if !outcome.is_noop() {
            self.store
                .apply_membership_diff(player_id, &outcome.added, &outcome.removed)?;
            metrics::counter!("segmentation.memberships_added")
                .increment(outcome.added.len() as u64);
            metrics::counter!("segmentation.memberships_removed")
                .increment(outcome.removed.len() as u64);
            debug!(
                player_id = %player_id,
                added = outcome.added.len(),
                removed = outcome.removed.len(),
                "membership updated"
            );
        }
        Ok(outcome)
    }

    /// Post-commit hook for player writes. Runs the sync off the caller's
    /// path; failures and timeouts are queued for retry and never surfaced
    /// to the triggering request.
    pub fn notify_player_write(self: &Arc<Self>, player_id: Uuid) {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let deadline = Duration::from_millis(engine.config.timeout_ms);
            match tokio::time::timeout(deadline, engine.sync_player(player_id)).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    warn!(player_id = %player_id, error = %e, "membership sync failed, queueing retry");
                    engine.queue_retry(player_id);
                }
                Err(_) => {
                    warn!(player_id = %player_id, "membership sync timed out, queueing retry");
                    engine.queue_retry(player_id);
                }
            }
        });
    }

    fn queue_retry(&self, player_id: Uuid) {
        metrics::counter!("segmentation.sync_retries_queued").increment(1);
        let mut queue = self.retry.lock();
        if queue.len() >= self.config.retry_capacity {
            queue.pop_front();
        }
        queue.push_back(player_id);
    }

    /// Drain the retry queue. Re-running a sync with current inputs
    /// converges to the same state, so retries need no bookkeeping beyond
    /// the player id. Returns how many players were retried.
    pub async fn retry_failed(&self) -> usize {
        let pending: Vec<Uuid> = {
            let mut queue = self.retry.lock();
            queue.drain(..).collect()
        };
        let count = pending.len();
        for player_id in pending {
            if let Err(e) = self.sync_player(player_id).await {
                warn!(player_id = %player_id, error = %e, "retried sync failed again");
                self.queue_retry(player_id);
            }
        }
        count
    }

    /// Re-sync every player of a game. Used after a group definition is
    /// saved or deleted, when memberships derived from the old rules may no
    /// longer hold.
    pub async fn sync_game(&self, game_id: Uuid) -> ForgeResult<usize> {
        let players = self.store.players_by_game(game_id)?;
        let count = players.len();
        for player in players {
            self.sync_player(player.id).await?;
        }
        Ok(count)
    }
}
