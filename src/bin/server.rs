//! Process entry point (§9 module map, supplemented feature: graceful
//! shutdown with drain grace period). Generalizes the teacher's
//! `bin/hub.rs` `run_monitoring` — broadcast channels + one actor per
//! server/service, torn down in a fixed order on `ctrl_c` — into "one
//! scheduler entry per monitor, store/hub/dispatcher wired once, same
//! shutdown shape".

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use peekaping_engine::env::EngineEnv;
use peekaping_engine::executor::push::PushTracker;
use peekaping_engine::executor::{self};
use peekaping_engine::hub::Hub;
use peekaping_engine::scheduler::{Scheduler, SchedulerDeps};
use peekaping_engine::seed::{read_seed_file, StaticConfigSource};
use peekaping_engine::store::HeartbeatStore;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Path to a JSON seed file listing monitors/channels/maintenance windows.
    #[arg(short, long)]
    seed: String,
}

fn init_tracing() {
    let filter = filter::Targets::new().with_targets(vec![("peekaping_engine", LevelFilter::TRACE)]);
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr).compact())
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let args = Args::parse();
    let env = EngineEnv::load()?;
    let seed = read_seed_file(&args.seed)?;

    info!(monitors = seed.monitors.len(), channels = seed.channels.len(), "loaded seed config");

    #[cfg(feature = "storage-sqlite")]
    let store: Arc<dyn HeartbeatStore> = {
        use peekaping_engine::store::sqlite::SqliteStore;
        match SqliteStore::new(&env.db_name).await {
            Ok(store) => Arc::new(store),
            Err(e) => {
                error!("failed to open sqlite heartbeat store: {e}, falling back to in-memory");
                Arc::new(peekaping_engine::store::memory::MemoryStore::new())
            }
        }
    };
    #[cfg(not(feature = "storage-sqlite"))]
    let store: Arc<dyn HeartbeatStore> = Arc::new(peekaping_engine::store::memory::MemoryStore::new());

    let push_tracker = Arc::new(PushTracker::new());
    let registry = Arc::new(executor::default_registry(push_tracker.clone()));
    let channel_registry = Arc::new(peekaping_engine::channels::default_registry());
    let hub = Hub::new();
    let config_source = StaticConfigSource::new(seed.clone());

    let deps = SchedulerDeps {
        registry,
        store: store.clone(),
        hub: hub.clone(),
        channel_registry,
        config_source: config_source.clone(),
    };

    let scheduler = Arc::new(Scheduler::new(deps));
    for monitor in &seed.monitors {
        if monitor.active {
            scheduler.start(monitor.clone()).await;
        }
    }
    info!(started = scheduler.monitor_count().await, "scheduler running");

    #[cfg(feature = "api")]
    {
        use peekaping_engine::api::{spawn_api_server, ApiConfig, ApiState};

        let bind_addr = format!("0.0.0.0:{}", env.port).parse()?;
        let api_state = ApiState {
            scheduler: scheduler.clone(),
            store: store.clone(),
            hub: hub.clone(),
            push_tracker: push_tracker.clone(),
            config_source: config_source.clone(),
        };

        match spawn_api_server(ApiConfig { bind_addr, enable_cors: true }, api_state).await {
            Ok(addr) => info!("API server listening on http://{addr}"),
            Err(e) => error!("failed to start API server: {e}"),
        }
    }

    info!("press Ctrl+C to shut down gracefully");
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("unable to listen for shutdown signal: {e}");
    }

    info!("shutting down scheduler (grace period {:?})", SHUTDOWN_GRACE_PERIOD);
    scheduler.shutdown(SHUTDOWN_GRACE_PERIOD).await;
    info!("shutdown complete");

    Ok(())
}
