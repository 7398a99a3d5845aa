//! Playerforge — game backend platform core: dynamic player segmentation.
//!
//! Main entry point that wires storage, the sync engine, and the API server.

use clap::Parser;
use playerforge_api::ApiServer;
use playerforge_core::config::AppConfig;
use playerforge_segmentation::{PlayerService, PreviewService, SyncEngine};
use playerforge_store::{GroupStore, MemoryStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "playerforge")]
#[command(about = "Game backend platform core: dynamic player segmentation")]
#[command(version)]
struct Cli {
    /// Node identifier (overrides config)
    #[arg(long, env = "PLAYERFORGE__NODE_ID")]
    node_id: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "PLAYERFORGE__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Seed a demo game with players and groups on startup
    #[arg(long, default_value_t = false)]
    seed_demo: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "playerforge=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Playerforge starting up");

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }

    info!(
        node_id = %config.node_id,
        http_port = config.api.http_port,
        metrics_port = config.metrics.port,
        "Configuration loaded"
    );

    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
    let sync = Arc::new(SyncEngine::new(store.clone(), config.sync.clone()));
    let preview = Arc::new(PreviewService::new(store.clone()));

    if cli.seed_demo {
        seed_demo(store.clone(), sync.clone()).await?;
    }

    // out-of-band recovery for failed syncs
    let retry_engine = sync.clone();
    let retry_interval = Duration::from_millis(config.sync.retry_interval_ms);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(retry_interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let retried = retry_engine.retry_failed().await;
            if retried > 0 {
                info!(retried, "Drained sync retry queue");
            }
        }
    });

    let server = ApiServer::new(config, store, preview, sync);
    server.start_metrics().await?;
    server.start_http().await?;

    Ok(())
}

/// Seed a demo game with a few players and groups so the dashboard has
/// something to look at on a fresh node.
async fn seed_demo(store: Arc<MemoryStore>, sync: Arc<SyncEngine>) -> anyhow::Result<()> {
    use playerforge_core::types::{Game, Group, GroupRule, RuleCastType, RuleMode, RuleOperator};

    let game = Game::new("demo-game");
    let game_id = game.id;
    store.insert_game(game)?;

    let players = PlayerService::new(store.clone(), sync.clone());
    players.create_player(
        game_id,
        vec![
            ("currentLevel".to_string(), "12".to_string()),
            ("hasFinishedGame".to_string(), "1".to_string()),
        ],
    )?;
    players.create_player(game_id, vec![("currentLevel".to_string(), "3".to_string())])?;
    players.create_player(game_id, vec![])?;

    store.save_group(Group::new(
        game_id,
        "everyone",
        "all players of the demo game",
        RuleMode::And,
        vec![],
    ))?;
    store.save_group(Group::new(
        game_id,
        "finishers",
        "players who finished the game",
        RuleMode::And,
        vec![GroupRule {
            name: RuleOperator::Set,
            field: "props.hasFinishedGame".to_string(),
            operands: vec![],
            negate: false,
            cast_type: RuleCastType::Char,
        }],
    ))?;

    let synced = sync.sync_game(game_id).await?;
    info!(game_id = %game_id, players = synced, "Seeded demo game");
    Ok(())
}
