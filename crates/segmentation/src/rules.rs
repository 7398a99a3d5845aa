//! Rule compilation — turns one stored rule into a pure predicate over a
//! player.
//!
//! Operands are parsed once, at compile time, under the rule's declared cast
//! type; an operand that does not parse is a validation error carrying the
//! rule's index, never a runtime surprise. Player-side values are free-form,
//! so a stored value that fails to parse under the cast simply makes the
//! comparison false.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};

use playerforge_core::types::{GroupRule, Player, RuleCastType, RuleOperator};
use playerforge_core::{ForgeError, ForgeResult};

use crate::resolver::{FieldPath, ResolvedValue};

/// The relational half of the operator family. `SET` and `CONTAINS` are not
/// order comparisons and are handled as their own variants in [`Test`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CmpOp {
    /// Whether `player value <ordering> operand` satisfies this operator.
    fn accepts(self, ord: Ordering) -> bool {
        match self {
            CmpOp::Eq => ord == Ordering::Equal,
            CmpOp::Gt => ord == Ordering::Greater,
            CmpOp::Gte => ord != Ordering::Less,
            CmpOp::Lt => ord == Ordering::Less,
            CmpOp::Lte => ord != Ordering::Greater,
        }
    }
}

/// A rule operand parsed under the rule's cast type.
#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Char(String),
    Double(f64),
    /// Date-only operand; both sides collapse to calendar days.
    Day(NaiveDate),
    /// Operand with a time component; compared at full timestamp precision.
    Instant(DateTime<Utc>),
}

#[derive(Debug, Clone, PartialEq)]
enum Test {
    /// Property-key-exists check; operands are ignored.
    Set,
    Cmp { op: CmpOp, operand: Operand },
    Contains { needle: String },
}

/// One compiled rule. Evaluation is side-effect free; `negate` inverts the
/// base result after evaluation, before combination with sibling rules.
#[derive(Debug, Clone)]
pub struct CompiledPredicate {
    path: FieldPath,
    test: Test,
    negate: bool,
}

impl CompiledPredicate {
    /// Validate and compile a rule. `index` identifies the rule within its
    /// set for error reporting.
    pub fn compile(index: usize, rule: &GroupRule) -> ForgeResult<Self> {
        let path = FieldPath::parse(&rule.field).ok_or_else(|| ForgeError::UnknownField {
            index,
            field: rule.field.clone(),
        })?;

        let test = match rule.name {
            RuleOperator::Set => {
                if !matches!(path, FieldPath::Prop(_)) {
                    return Err(ForgeError::RuleValidation {
                        index,
                        message: format!(
                            "SET only applies to props.* fields, got '{}'",
                            rule.field
                        ),
                    });
                }
                Test::Set
            }
            RuleOperator::Contains => {
                if rule.cast_type != RuleCastType::Char {
                    return Err(ForgeError::RuleValidation {
                        index,
                        message: "CONTAINS requires castType CHAR".to_string(),
                    });
                }
                Test::Contains {
                    needle: single_operand(index, rule)?.to_string(),
                }
            }
            RuleOperator::Equals => Test::Cmp {
                op: CmpOp::Eq,
                operand: parse_operand(index, single_operand(index, rule)?, rule.cast_type)?,
            },
            RuleOperator::Gt => Test::Cmp {
                op: CmpOp::Gt,
                operand: parse_operand(index, single_operand(index, rule)?, rule.cast_type)?,
            },
            RuleOperator::Gte => Test::Cmp {
                op: CmpOp::Gte,
                operand: parse_operand(index, single_operand(index, rule)?, rule.cast_type)?,
            },
            RuleOperator::Lt => Test::Cmp {
                op: CmpOp::Lt,
                operand: parse_operand(index, single_operand(index, rule)?, rule.cast_type)?,
            },
            RuleOperator::Lte => Test::Cmp {
                op: CmpOp::Lte,
                operand: parse_operand(index, single_operand(index, rule)?, rule.cast_type)?,
            },
        };

        Ok(Self {
            path,
            test,
            negate: rule.negate,
        })
    }

    /// Evaluate against a player. A missing attribute makes the base result
    /// false for every comparison operator, so a negated rule over a missing
    /// attribute is true.
    pub fn test(&self, player: &Player) -> bool {
        let value = self.path.resolve(player);
        let base = match &self.test {
            Test::Set => value.is_present(),
            Test::Cmp { op, operand } => {
                compare(operand, &value).is_some_and(|ord| op.accepts(ord))
            }
            Test::Contains { needle } => contains_text(&value, needle),
        };
        if self.negate {
            !base
        } else {
            base
        }
    }
}

fn single_operand<'r>(index: usize, rule: &'r GroupRule) -> ForgeResult<&'r str> {
    match rule.operands.as_slice() {
        [one] => Ok(one.as_str()),
        other => Err(ForgeError::RuleValidation {
            index,
            message: format!("operator takes exactly one operand, got {}", other.len()),
        }),
    }
}

fn parse_operand(index: usize, raw: &str, cast: RuleCastType) -> ForgeResult<Operand> {
    match cast {
        RuleCastType::Char => Ok(Operand::Char(raw.to_string())),
        RuleCastType::Double => raw
            .trim()
            .parse::<f64>()
            .map(Operand::Double)
            .map_err(|_| ForgeError::BadOperand {
                index,
                operand: raw.to_string(),
                cast: "DOUBLE",
            }),
        RuleCastType::Datetime => {
            if let Some(day) = parse_day(raw) {
                Ok(Operand::Day(day))
            } else if let Some(instant) = parse_instant(raw) {
                Ok(Operand::Instant(instant))
            } else {
                Err(ForgeError::BadOperand {
                    index,
                    operand: raw.to_string(),
                    cast: "DATETIME",
                })
            }
        }
    }
}

fn parse_day(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|n| n.and_utc())
        })
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|n| n.and_utc())
        })
}

/// Ordering of the player value relative to the operand, or `None` when the
/// value is missing or cannot be interpreted under the operand's cast.
fn compare(operand: &Operand, value: &ResolvedValue<'_>) -> Option<Ordering> {
    match operand {
        Operand::Char(expected) => match value {
            ResolvedValue::Text(actual) => Some((*actual).cmp(expected.as_str())),
            ResolvedValue::Timestamp(ts) => Some(ts.to_rfc3339().as_str().cmp(expected)),
            ResolvedValue::Flag(flag) => Some(flag_text(*flag).cmp(expected.as_str())),
            ResolvedValue::NotPresent => None,
        },
        Operand::Double(expected) => value_as_f64(value)?.partial_cmp(expected),
        Operand::Day(expected) => Some(value_as_datetime(value)?.date_naive().cmp(expected)),
        Operand::Instant(expected) => Some(value_as_datetime(value)?.cmp(expected)),
    }
}

fn value_as_f64(value: &ResolvedValue<'_>) -> Option<f64> {
    match value {
        ResolvedValue::Text(text) => text.trim().parse::<f64>().ok(),
        ResolvedValue::Timestamp(ts) => Some(ts.timestamp() as f64),
        ResolvedValue::Flag(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        ResolvedValue::NotPresent => None,
    }
}

fn value_as_datetime(value: &ResolvedValue<'_>) -> Option<DateTime<Utc>> {
    match value {
        ResolvedValue::Timestamp(ts) => Some(*ts),
        ResolvedValue::Text(text) => parse_instant(text).or_else(|| {
            parse_day(text)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|n| n.and_utc())
        }),
        ResolvedValue::Flag(_) | ResolvedValue::NotPresent => None,
    }
}

fn contains_text(value: &ResolvedValue<'_>, needle: &str) -> bool {
    match value {
        ResolvedValue::Text(text) => text.contains(needle),
        ResolvedValue::Timestamp(ts) => ts.to_rfc3339().contains(needle),
        ResolvedValue::Flag(flag) => flag_text(*flag).contains(needle),
        ResolvedValue::NotPresent => false,
    }
}

fn flag_text(flag: bool) -> &'static str {
    if flag {
        "1"
    } else {
        "0"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn rule(
        name: RuleOperator,
        field: &str,
        operands: &[&str],
        negate: bool,
        cast_type: RuleCastType,
    ) -> GroupRule {
        GroupRule {
            name,
            field: field.to_string(),
            operands: operands.iter().map(|s| s.to_string()).collect(),
            negate,
            cast_type,
        }
    }

    fn player_with(props: &[(&str, &str)]) -> Player {
        let mut player = Player::new(Uuid::new_v4());
        for (key, value) in props {
            player.set_prop(*key, *value);
        }
        player
    }

    #[test]
    fn test_equals_char() {
        let predicate = CompiledPredicate::compile(
            0,
            &rule(
                RuleOperator::Equals,
                "props.zone",
                &["eu"],
                false,
                RuleCastType::Char,
            ),
        )
        .unwrap();

        assert!(predicate.test(&player_with(&[("zone", "eu")])));
        assert!(!predicate.test(&player_with(&[("zone", "us")])));
    }

    #[test]
    fn test_equals_missing_prop_is_false_and_negation_flips_it() {
        let base = rule(
            RuleOperator::Equals,
            "props.zone",
            &["eu"],
            false,
            RuleCastType::Char,
        );
        let plain = CompiledPredicate::compile(0, &base).unwrap();

        let mut negated_rule = base;
        negated_rule.negate = true;
        let negated = CompiledPredicate::compile(0, &negated_rule).unwrap();

        let player = player_with(&[]);
        assert!(!plain.test(&player));
        assert!(negated.test(&player));
    }

    #[test]
    fn test_set_checks_key_presence_not_value() {
        let predicate = CompiledPredicate::compile(
            0,
            &rule(
                RuleOperator::Set,
                "props.hasFinishedGame",
                &[],
                false,
                RuleCastType::Char,
            ),
        )
        .unwrap();

        assert!(predicate.test(&player_with(&[("hasFinishedGame", "1")])));
        assert!(predicate.test(&player_with(&[("hasFinishedGame", "")])));
        assert!(!predicate.test(&player_with(&[])));
    }

    #[test]
    fn test_negated_set_matches_players_without_the_key() {
        let predicate = CompiledPredicate::compile(
            0,
            &rule(
                RuleOperator::Set,
                "props.hasFinishedGame",
                &[],
                true,
                RuleCastType::Char,
            ),
        )
        .unwrap();

        assert!(!predicate.test(&player_with(&[("hasFinishedGame", "1")])));
        assert!(predicate.test(&player_with(&[])));
    }

    #[test]
    fn test_datetime_date_only_operand_ignores_time_of_day() {
        let predicate = CompiledPredicate::compile(
            0,
            &rule(
                RuleOperator::Equals,
                "lastSeenAt",
                &["2022-05-03"],
                false,
                RuleCastType::Datetime,
            ),
        )
        .unwrap();

        let mut player = Player::new(Uuid::new_v4());
        player.last_seen_at = Utc.with_ymd_and_hms(2022, 5, 3, 17, 42, 9).unwrap();
        assert!(predicate.test(&player));

        player.last_seen_at = Utc.with_ymd_and_hms(2022, 5, 4, 0, 0, 1).unwrap();
        assert!(!predicate.test(&player));
    }

    #[test]
    fn test_datetime_full_operand_compares_at_second_precision() {
        let predicate = CompiledPredicate::compile(
            0,
            &rule(
                RuleOperator::Gte,
                "lastSeenAt",
                &["2022-05-03 12:00:00"],
                false,
                RuleCastType::Datetime,
            ),
        )
        .unwrap();

        let mut player = Player::new(Uuid::new_v4());
        player.last_seen_at = Utc.with_ymd_and_hms(2022, 5, 3, 11, 59, 59).unwrap();
        assert!(!predicate.test(&player));

        player.last_seen_at = Utc.with_ymd_and_hms(2022, 5, 3, 12, 0, 0).unwrap();
        assert!(predicate.test(&player));
    }

    #[test]
    fn test_double_ordering_on_props() {
        let predicate = CompiledPredicate::compile(
            0,
            &rule(
                RuleOperator::Gt,
                "props.currentLevel",
                &["10"],
                false,
                RuleCastType::Double,
            ),
        )
        .unwrap();

        assert!(predicate.test(&player_with(&[("currentLevel", "11")])));
        // numeric, not lexicographic: "9" > "10" as strings
        assert!(!predicate.test(&player_with(&[("currentLevel", "9")])));
        // free-form player value that does not parse is not a match
        assert!(!predicate.test(&player_with(&[("currentLevel", "high")])));
    }

    #[test]
    fn test_contains_on_char() {
        let predicate = CompiledPredicate::compile(
            0,
            &rule(
                RuleOperator::Contains,
                "props.clanTag",
                &["dragon"],
                false,
                RuleCastType::Char,
            ),
        )
        .unwrap();

        assert!(predicate.test(&player_with(&[("clanTag", "red-dragon-eu")])));
        assert!(!predicate.test(&player_with(&[("clanTag", "wolves")])));
        assert!(!predicate.test(&player_with(&[])));
    }

    #[test]
    fn test_dev_build_flag_comparisons() {
        let predicate = CompiledPredicate::compile(
            0,
            &rule(
                RuleOperator::Equals,
                "devBuild",
                &["1"],
                false,
                RuleCastType::Char,
            ),
        )
        .unwrap();

        let mut player = Player::new(Uuid::new_v4());
        assert!(!predicate.test(&player));
        player.dev_build = true;
        assert!(predicate.test(&player));
    }

    #[test]
    fn test_compile_rejects_unknown_core_field() {
        let err = CompiledPredicate::compile(
            3,
            &rule(
                RuleOperator::Equals,
                "favouriteColor",
                &["red"],
                false,
                RuleCastType::Char,
            ),
        )
        .unwrap_err();

        assert!(matches!(err, ForgeError::UnknownField { index: 3, .. }));
    }

    #[test]
    fn test_compile_rejects_unparsable_operands() {
        let err = CompiledPredicate::compile(
            0,
            &rule(
                RuleOperator::Gt,
                "props.currentLevel",
                &["many"],
                false,
                RuleCastType::Double,
            ),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ForgeError::BadOperand { cast: "DOUBLE", .. }
        ));

        let err = CompiledPredicate::compile(
            0,
            &rule(
                RuleOperator::Lt,
                "lastSeenAt",
                &["yesterday"],
                false,
                RuleCastType::Datetime,
            ),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ForgeError::BadOperand {
                cast: "DATETIME",
                ..
            }
        ));
    }

    #[test]
    fn test_compile_rejects_set_on_core_field() {
        let err = CompiledPredicate::compile(
            0,
            &rule(RuleOperator::Set, "lastSeenAt", &[], false, RuleCastType::Char),
        )
        .unwrap_err();
        assert!(matches!(err, ForgeError::RuleValidation { index: 0, .. }));
    }

    #[test]
    fn test_compile_rejects_wrong_operand_arity() {
        let err = CompiledPredicate::compile(
            0,
            &rule(
                RuleOperator::Equals,
                "props.zone",
                &[],
                false,
                RuleCastType::Char,
            ),
        )
        .unwrap_err();
        assert!(matches!(err, ForgeError::RuleValidation { .. }));

        let err = CompiledPredicate::compile(
            0,
            &rule(
                RuleOperator::Equals,
                "props.zone",
                &["eu", "us"],
                false,
                RuleCastType::Char,
            ),
        )
        .unwrap_err();
        assert!(matches!(err, ForgeError::RuleValidation { .. }));
    }
}
