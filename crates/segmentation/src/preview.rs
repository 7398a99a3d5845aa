//! Rule set preview — counts how many existing players an ad-hoc (possibly
//! unsaved) rule set would match.
//!
//! Uses the same compiled evaluator as the sync engine, so a preview count
//! always agrees with the membership a saved group would end up with.

use std::sync::Arc;

use uuid::Uuid;

use playerforge_core::types::{GroupRule, RuleMode};
use playerforge_core::ForgeResult;
use playerforge_store::GroupStore;

use crate::evaluator::CompiledRuleSet;

pub struct PreviewService {
    store: Arc<dyn GroupStore>,
}

impl PreviewService {
    pub fn new(store: Arc<dyn GroupStore>) -> Self {
        Self { store }
    }

    /// Count players of `game_id` matching the rule set. Read-only; no
    /// membership rows are touched. Unknown games and invalid rules fail
    /// before any player is evaluated.
    pub fn preview_count(
        &self,
        game_id: Uuid,
        mode: RuleMode,
        rules: &[GroupRule],
    ) -> ForgeResult<u64> {
        self.store.game(game_id)?;
        let rule_set = CompiledRuleSet::compile(mode, rules)?;

        let players = self.store.players_by_game(game_id)?;
        Ok(players.iter().filter(|p| rule_set.matches(p)).count() as u64)
    }
}
