//! Field path resolution — maps a rule's dotted field to either a core
//! player attribute or a dynamic property lookup.

use chrono::{DateTime, Utc};

use playerforge_core::types::Player;

pub const PROPS_PREFIX: &str = "props.";

/// The closed set of core player attributes addressable by rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreField {
    LastSeenAt,
    CreatedAt,
    DevBuild,
}

impl CoreField {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "lastSeenAt" => Some(CoreField::LastSeenAt),
            "createdAt" => Some(CoreField::CreatedAt),
            "devBuild" => Some(CoreField::DevBuild),
            _ => None,
        }
    }
}

/// Parsed form of a rule's field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldPath {
    /// `props.<key>` — dynamic property lookup by key.
    Prop(String),
    /// A core attribute column.
    Core(CoreField),
}

impl FieldPath {
    /// Parse a dotted field path. `None` means the name is outside the
    /// closed core attribute set, a validation error surfaced upstream at
    /// rule compile time.
    pub fn parse(field: &str) -> Option<Self> {
        if let Some(key) = field.strip_prefix(PROPS_PREFIX) {
            if key.is_empty() {
                return None;
            }
            return Some(FieldPath::Prop(key.to_string()));
        }
        CoreField::parse(field).map(FieldPath::Core)
    }

    /// Pure lookup of this field on a concrete player.
    pub fn resolve<'p>(&self, player: &'p Player) -> ResolvedValue<'p> {
        match self {
            FieldPath::Prop(key) => match player.prop(key) {
                Some(value) => ResolvedValue::Text(value),
                None => ResolvedValue::NotPresent,
            },
            FieldPath::Core(CoreField::LastSeenAt) => {
                ResolvedValue::Timestamp(player.last_seen_at)
            }
            FieldPath::Core(CoreField::CreatedAt) => ResolvedValue::Timestamp(player.created_at),
            FieldPath::Core(CoreField::DevBuild) => ResolvedValue::Flag(player.dev_build),
        }
    }
}

/// A rule field resolved against a player. `NotPresent` is distinct from an
/// empty string value.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedValue<'p> {
    Text(&'p str),
    Timestamp(DateTime<Utc>),
    Flag(bool),
    NotPresent,
}

impl ResolvedValue<'_> {
    pub fn is_present(&self) -> bool {
        !matches!(self, ResolvedValue::NotPresent)
    }
}
