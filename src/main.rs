mod config;
mod game;

mod transports {
    pub mod loopback;
}

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::AppConfig;
use game::{
    load_resource_types, Collaborators, FlatWorld, NetworkSender, PlayerLedger, Point, ResourceEvent,
    ResourceManager, ResourceTypeRegistry, Role,
};
use transports::loopback;

/// How far a simulated player may reach when starting a gather
const GATHER_RANGE: f64 = 256.0;

#[cfg(feature = "jemalloc")]
mod allocator {
    #[cfg(not(target_env = "msvc"))]
    use tikv_jemallocator::Jemalloc;
    #[cfg(not(target_env = "msvc"))]
    #[global_allocator]
    static GLOBAL: Jemalloc = Jemalloc;
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {

    // ================
    //      Tracing
    // ================
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=info", env!("CARGO_CRATE_NAME")).into())
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();
    info!(
        role = ?config.role,
        seed = config.world_seed,
        map_width = config.map_width,
        level_height = config.level_height,
        "Configuration loaded"
    );

    // Resource types (malformed records are logged and skipped)
    let parsed = load_resource_types(&config.resource_config)?;
    if !parsed.issues.is_empty() {
        warn!(issues = parsed.issues.len(), "Resource config loaded with issues");
    }
    let types = parsed.types;

    let world = Arc::new(FlatWorld::new(config.map_width, config.level_height));
    let ledger = PlayerLedger::default();

    let mut tasks: Vec<(&'static str, JoinHandle<()>)> = Vec::new();

    // The manager the simulated player gathers on
    let primary = match config.role {
        Role::SinglePlayer => {
            let manager = Arc::new(ResourceManager::new(
                ResourceTypeRegistry::new(types),
                Role::SinglePlayer,
                Collaborators {
                    world: world.clone(),
                    view: world.clone(),
                    effects: Arc::new(ledger.clone()),
                    network: None,
                },
                config.world_seed,
            ));
            tasks.push(("single-player tick", tokio::spawn(manager.clone().run_tick_task(config.tick_interval))));
            manager
        }
        Role::Server | Role::Client => {
            // Server and one client in-process, joined by two loopback channels
            let (to_client, client_inbox) = loopback::channel();
            let (to_server, server_inbox) = loopback::channel();

            let server = Arc::new(ResourceManager::new(
                ResourceTypeRegistry::new(types.clone()),
                Role::Server,
                Collaborators {
                    world: world.clone(),
                    view: world.clone(),
                    effects: Arc::new(ledger.clone()),
                    network: Some(to_client.clone() as Arc<dyn NetworkSender>),
                },
                config.world_seed,
            ));
            let client = Arc::new(ResourceManager::new(
                ResourceTypeRegistry::new(types),
                Role::Client,
                Collaborators {
                    world: world.clone(),
                    view: world.clone(),
                    effects: Arc::new(PlayerLedger::default()),
                    network: Some(to_server as Arc<dyn NetworkSender>),
                },
                config.world_seed,
            ));

            // Initial sync for the joining client
            to_client.send_event(ResourceEvent::Snapshot {
                resources: server.snapshot(),
            });
            info!(resources = server.resource_count(), "Snapshot sent to client");

            tasks.push(("server tick", tokio::spawn(server.clone().run_tick_task(config.tick_interval))));
            tasks.push(("client tick", tokio::spawn(client.clone().run_tick_task(config.tick_interval))));
            tasks.push(("server receive", tokio::spawn(loopback::run_receiver(server.clone(), server_inbox))));
            tasks.push(("client receive", tokio::spawn(loopback::run_receiver(client.clone(), client_inbox))));

            if config.role == Role::Server {
                server
            } else {
                client
            }
        }
    };

    tasks.push((
        "gatherer",
        tokio::spawn(run_gatherer(primary.clone(), "player_1", config.map_width, Duration::from_secs(2))),
    ));

    let stats_manager = primary.clone();
    let stats_ledger = ledger.clone();
    tasks.push((
        "stats",
        tokio::spawn(async move {
            let mut interval = time::interval(Duration::from_secs(30));
            loop {
                interval.tick().await;
                let stats = stats_manager.stats();
                info!(
                    total = stats.total_resources,
                    collecting = stats.collecting_resources,
                    by_level = ?stats.by_level,
                    players = stats_ledger.player_count(),
                    "Resource stats"
                );
            }
        }),
    ));

    // Print
    info!("Resources v{}", env!("CARGO_PKG_VERSION"));

    let watched = first_finished(tasks);
    tokio::select! {
        name = watched => {
            error!(task = name, "Background task terminated unexpectedly");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    Ok(())

}

/// Resolve with the name of the first task to finish
async fn first_finished(tasks: Vec<(&'static str, JoinHandle<()>)>) -> &'static str {
    let (done_tx, mut done_rx) = tokio::sync::mpsc::channel(tasks.len().max(1));
    for (name, handle) in tasks {
        let done_tx = done_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = handle.await {
                error!(task = name, error = %e, "Task panicked");
            }
            let _ = done_tx.send(name).await;
        });
    }
    drop(done_tx);
    done_rx.recv().await.unwrap_or("none")
}

/// Simulated player: every `every`, walk to the resource nearest a moving
/// probe and start gathering it. The tick finishes the gather.
async fn run_gatherer(manager: Arc<ResourceManager>, player_id: &'static str, map_width: i32, every: Duration) {
    let mut interval = time::interval(every);
    let mut step: i32 = 0;

    loop {
        interval.tick().await;
        step = step.wrapping_add(1);

        let probe = Point::new(step.wrapping_mul(613).rem_euclid(map_width.max(1)), 0);
        let Some(target) = manager.closest(probe) else {
            debug!(player_id, "Nothing to gather");
            continue;
        };

        let origin = Point::new(target.map_x, target.map_y);
        match manager.start_gather(player_id, origin, GATHER_RANGE, false) {
            Some(resource_id) => debug!(player_id, resource_id = %resource_id, "Gather started"),
            None => debug!(player_id, "No gatherable resource in range"),
        }
    }
}
