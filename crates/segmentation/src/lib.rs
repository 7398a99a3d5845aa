//! Dynamic player segmentation — rule compilation, group membership
//! maintenance, and rule set previews.

pub mod evaluator;
pub mod players;
pub mod preview;
pub mod resolver;
pub mod rules;
pub mod sync;

pub use evaluator::CompiledRuleSet;
pub use players::PlayerService;
pub use preview::PreviewService;
pub use sync::SyncEngine;
