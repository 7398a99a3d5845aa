use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A customer title. Players and player groups are scoped to exactly one game.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Game {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

/// A player record: core attributes plus free-form key/value properties.
///
/// Properties are owned by the player-facing write paths; the segmentation
/// engine only reads them. Keys are unique and kept sorted on write.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: Uuid,
    pub game_id: Uuid,
    #[serde(default)]
    pub props: Vec<PlayerProp>,
    #[serde(default)]
    pub dev_build: bool,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl Player {
    pub fn new(game_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            game_id,
            props: Vec::new(),
            dev_build: false,
            created_at: now,
            last_seen_at: now,
        }
    }

    /// Look up a dynamic property value by key.
    pub fn prop(&self, key: &str) -> Option<&str> {
        self.props
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.value.as_str())
    }

    /// Insert or replace a property, keeping keys unique and sorted.
    pub fn set_prop(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.props.binary_search_by(|p| p.key.as_str().cmp(key.as_str())) {
            Ok(idx) => self.props[idx].value = value,
            Err(idx) => self.props.insert(idx, PlayerProp { key, value }),
        }
    }

    /// Remove a property if present.
    pub fn delete_prop(&mut self, key: &str) {
        self.props.retain(|p| p.key != key);
    }
}

/// One key/value pair attached to a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerProp {
    pub key: String,
    pub value: String,
}

/// How a group combines its rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleMode {
    #[serde(rename = "$and")]
    And,
    #[serde(rename = "$or")]
    Or,
}

/// The closed set of rule operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleOperator {
    Equals,
    Set,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
}

/// How rule operands and the resolved player value are interpreted for
/// comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleCastType {
    Char,
    Double,
    Datetime,
}

/// One boolean condition within a group.
///
/// `field` is a dotted path: a `props.` prefix addresses a dynamic property
/// by the remainder of the path, anything else names a core player attribute.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRule {
    pub name: RuleOperator,
    pub field: String,
    #[serde(default)]
    pub operands: Vec<String>,
    #[serde(default)]
    pub negate: bool,
    pub cast_type: RuleCastType,
}

/// A named, saved segmentation rule set. Membership is derived by the sync
/// engine, never written directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: Uuid,
    pub game_id: Uuid,
    pub name: String,
    pub description: String,
    pub rule_mode: RuleMode,
    pub rules: Vec<GroupRule>,
    pub updated_at: DateTime<Utc>,
}

impl Group {
    pub fn new(
        game_id: Uuid,
        name: impl Into<String>,
        description: impl Into<String>,
        rule_mode: RuleMode,
        rules: Vec<GroupRule>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            game_id,
            name: name.into(),
            description: description.into(),
            rule_mode,
            rules,
            updated_at: Utc::now(),
        }
    }
}
