//! Rule set evaluation — boolean combination of compiled predicates.

use playerforge_core::types::{Group, GroupRule, Player, RuleMode};
use playerforge_core::ForgeResult;

use crate::rules::CompiledPredicate;

/// A fully compiled rule set. Compilation validates every rule up front;
/// evaluation is pure, so the same player and rules always produce the same
/// result. Cacheable per group since rules change rarely.
#[derive(Debug, Clone)]
pub struct CompiledRuleSet {
    mode: RuleMode,
    predicates: Vec<CompiledPredicate>,
}

impl CompiledRuleSet {
    pub fn compile(mode: RuleMode, rules: &[GroupRule]) -> ForgeResult<Self> {
        let predicates = rules
            .iter()
            .enumerate()
            .map(|(index, rule)| CompiledPredicate::compile(index, rule))
            .collect::<ForgeResult<Vec<_>>>()?;
        Ok(Self { mode, predicates })
    }

    pub fn for_group(group: &Group) -> ForgeResult<Self> {
        Self::compile(group.rule_mode, &group.rules)
    }

    /// `$and` is true iff every rule holds (vacuously true when empty — an
    /// "everyone" segment); `$or` is true iff at least one holds (vacuously
    /// false when empty).
    pub fn matches(&self, player: &Player) -> bool {
        match self.mode {
            RuleMode::And => self.predicates.iter().all(|p| p.test(player)),
            RuleMode::Or => self.predicates.iter().any(|p| p.test(player)),
        }
    }
}
