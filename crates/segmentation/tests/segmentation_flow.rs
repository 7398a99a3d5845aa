//! End-to-end flow: player writes trigger membership sync, and preview
//! counts agree with the membership a saved group ends up with.

use std::sync::Arc;

use playerforge_core::config::SyncConfig;
use playerforge_core::types::{Game, Group, GroupRule, RuleCastType, RuleMode, RuleOperator};
use playerforge_segmentation::{PlayerService, PreviewService, SyncEngine};
use playerforge_store::{GroupStore, MemoryStore};

struct Harness {
    store: Arc<MemoryStore>,
    sync: Arc<SyncEngine>,
    players: PlayerService,
    preview: PreviewService,
    game_id: uuid::Uuid,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let game = Game::new("space-race");
    let game_id = game.id;
    store.insert_game(game).unwrap();

    let sync = Arc::new(SyncEngine::new(store.clone(), SyncConfig::default()));
    Harness {
        players: PlayerService::new(store.clone(), sync.clone()),
        preview: PreviewService::new(store.clone()),
        store,
        sync,
        game_id,
    }
}

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

#[tokio::test]
async fn write_then_sync_keeps_membership_current() {
    let h = harness();

    let group = Group::new(
        h.game_id,
        "veterans",
        "level 10 and up",
        RuleMode::And,
        vec![rule(
            RuleOperator::Gte,
            "props.currentLevel",
            &["10"],
            false,
            RuleCastType::Double,
        )],
    );
    let group_id = group.id;
    h.store.save_group(group).unwrap();

    let player = h
        .players
        .create_player(
            h.game_id,
            vec![("currentLevel".to_string(), "3".to_string())],
        )
        .unwrap();
    h.sync.sync_player(player.id).await.unwrap();
    assert!(h.store.memberships_of_player(player.id).unwrap().is_empty());

    h.players
        .set_player_props(
            player.id,
            vec![("currentLevel".to_string(), Some("12".to_string()))],
        )
        .unwrap();
    h.sync.sync_player(player.id).await.unwrap();
    assert_eq!(
        h.store.memberships_of_player(player.id).unwrap(),
        vec![group_id]
    );
    assert_eq!(h.store.member_count(group_id).unwrap(), 1);
}

/// The core equivalence property: for any rule set, the preview count equals
/// the number of players holding membership once the same rules are saved as
/// a group and every player is synced.
#[tokio::test]
async fn preview_count_matches_saved_group_membership() {
    let h = harness();

    for level in [1, 5, 9, 10, 15] {
        h.players
            .create_player(
                h.game_id,
                vec![("currentLevel".to_string(), level.to_string())],
            )
            .unwrap();
    }
    // a player with no level prop at all
    h.players.create_player(h.game_id, vec![]).unwrap();

    let rules = vec![
        rule(
            RuleOperator::Gte,
            "props.currentLevel",
            &["5"],
            false,
            RuleCastType::Double,
        ),
        rule(
            RuleOperator::Lt,
            "props.currentLevel",
            &["15"],
            false,
            RuleCastType::Double,
        ),
    ];

    for mode in [RuleMode::And, RuleMode::Or] {
        let expected = h
            .preview
            .preview_count(h.game_id, mode, &rules)
            .unwrap();

        let group = Group::new(h.game_id, "mid-game", "", mode, rules.clone());
        let group_id = group.id;
        h.store.save_group(group).unwrap();
        h.sync.sync_game(h.game_id).await.unwrap();

        assert_eq!(
            h.store.member_count(group_id).unwrap() as u64,
            expected,
            "preview and sync disagree for {mode:?}"
        );
        h.store.delete_group(group_id).unwrap();
    }
}

#[tokio::test]
async fn finished_game_scenario_with_and_without_negation() {
    let h = harness();

    let finisher = h
        .players
        .create_player(
            h.game_id,
            vec![("hasFinishedGame".to_string(), "1".to_string())],
        )
        .unwrap();
    let newcomer = h.players.create_player(h.game_id, vec![]).unwrap();

    let set_rule = |negate| {
        vec![rule(
            RuleOperator::Set,
            "props.hasFinishedGame",
            &[],
            negate,
            RuleCastType::Char,
        )]
    };

    assert_eq!(
        h.preview
            .preview_count(h.game_id, RuleMode::And, &set_rule(false))
            .unwrap(),
        1
    );
    assert_eq!(
        h.preview
            .preview_count(h.game_id, RuleMode::And, &set_rule(true))
            .unwrap(),
        1
    );

    // the negated rule matches the *other* player
    let group = Group::new(h.game_id, "not-finished", "", RuleMode::And, set_rule(true));
    let group_id = group.id;
    h.store.save_group(group).unwrap();
    h.sync.sync_game(h.game_id).await.unwrap();

    assert_eq!(
        h.store.members_of_group(group_id).unwrap(),
        vec![newcomer.id]
    );
    assert!(h
        .store
        .memberships_of_player(finisher.id)
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn group_edit_takes_effect_after_game_resync() {
    let h = harness();

    let player = h
        .players
        .create_player(h.game_id, vec![("zone".to_string(), "eu".to_string())])
        .unwrap();

    let mut group = Group::new(
        h.game_id,
        "eu-players",
        "",
        RuleMode::And,
        vec![rule(
            RuleOperator::Equals,
            "props.zone",
            &["eu"],
            false,
            RuleCastType::Char,
        )],
    );
    let group_id = group.id;
    h.store.save_group(group.clone()).unwrap();
    h.sync.sync_game(h.game_id).await.unwrap();
    assert_eq!(h.store.member_count(group_id).unwrap(), 1);

    // narrow the rules; the compiled-set cache must pick up the new version
    group.rules = vec![rule(
        RuleOperator::Equals,
        "props.zone",
        &["us"],
        false,
        RuleCastType::Char,
    )];
    group.updated_at = chrono::Utc::now();
    h.store.save_group(group).unwrap();
    h.sync.sync_game(h.game_id).await.unwrap();

    assert_eq!(h.store.member_count(group_id).unwrap(), 0);
    assert!(h.store.memberships_of_player(player.id).unwrap().is_empty());
}
