use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::info;

use campsite::calendar::Calendar;
use campsite::config::{AvailabilityMode, Config};
use campsite::engine::{DayUniverse, Engine};
use campsite::policy::ReservationPolicy;
use campsite::store::WalStore;
use campsite::{compactor, protocol};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    campsite::observability::init(config.metrics_port)?;

    // Ensure data directory exists
    std::fs::create_dir_all(&config.data_dir)?;

    let store = Arc::new(WalStore::open(config.wal_path())?);

    let today = chrono::Local::now().date_naive();
    let (first, last) = Calendar::seed_range(today, config.calendar_years);
    let (first, last) = store.seed_calendar_if_empty(first, last).await?;
    let universe = match config.availability {
        AvailabilityMode::Materialized => {
            DayUniverse::Materialized(Arc::new(Calendar::materialize(first, last)))
        }
        AvailabilityMode::Computed => DayUniverse::Computed,
    };
    let engine = Arc::new(Engine::with_universe(store.clone(), universe));
    let policy = config.enforce_policy.then(ReservationPolicy::default);

    let compactor_store = store.clone();
    let threshold = config.compact_threshold;
    tokio::spawn(async move {
        compactor::run_compactor(compactor_store, threshold).await;
    });

    let max_connections = config.max_connections;
    let semaphore = Arc::new(Semaphore::new(max_connections));

    let addr = config.addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("campsite listening on {addr}");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  max_connections: {max_connections}");
    info!("  calendar: {first}..{last} ({:?})", config.availability);
    info!("  policy: {}", if policy.is_some() { "enforced" } else { "disabled" });
    let metrics_url = config
        .metrics_port
        .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"));
    info!("  metrics: {metrics_url}");

    // Graceful shutdown: stop accepting on SIGTERM/ctrl-c, drain in-flight connections
    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {}
                        _ = sigterm.recv() => {}
                    }
                }
                Err(e) => {
                    tracing::warn!("cannot register SIGTERM handler: {e}");
                    ctrl_c.await.ok();
                }
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
        }
    };
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (socket, peer) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::error!("accept error: {e}");
                        continue;
                    }
                };

                let permit = match semaphore.clone().try_acquire_owned() {
                    Ok(permit) => permit,
                    Err(_) => {
                        tracing::warn!("connection limit reached, rejecting {peer}");
                        metrics::counter!(campsite::observability::CONNECTIONS_REJECTED_TOTAL)
                            .increment(1);
                        drop(socket);
                        continue;
                    }
                };

                info!("connection from {peer}");
                metrics::counter!(campsite::observability::CONNECTIONS_TOTAL).increment(1);
                metrics::gauge!(campsite::observability::CONNECTIONS_ACTIVE).increment(1.0);
                let engine = engine.clone();

                tokio::spawn(async move {
                    let _permit = permit; // held until connection closes
                    if let Err(e) = protocol::process_connection(socket, engine, policy).await {
                        tracing::error!("connection error from {peer}: {e}");
                    }
                    metrics::gauge!(campsite::observability::CONNECTIONS_ACTIVE).decrement(1.0);
                });
            }
            _ = &mut shutdown => {
                info!("shutdown signal received, stopping accept loop");
                break;
            }
        }
    }

    // Wait for in-flight connections to finish (up to 10s)
    info!("draining connections...");
    let drain_deadline = tokio::time::sleep(std::time::Duration::from_secs(10));
    tokio::pin!(drain_deadline);

    loop {
        if semaphore.available_permits() == max_connections {
            info!("all connections drained");
            break;
        }
        tokio::select! {
            _ = &mut drain_deadline => {
                let remaining = max_connections - semaphore.available_permits();
                tracing::warn!("drain timeout, {remaining} connections still open");
                break;
            }
            _ = tokio::time::sleep(std::time::Duration::from_millis(100)) => {}
        }
    }

    info!("campsite stopped");
    Ok(())
}
