use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;
use wx_relay::config::Config;
use wx_relay::jobs::{register_jobs, JobSpec};
use wx_relay::redpanda::{create_producer, KafkaTopicAdmin, RedpandaPublisher};
use wx_relay::scheduler::Scheduler;
use wx_relay::station::StationClient;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cfg = Config::from_env()?;

    let default_level = if cfg.debug { "info,wx_relay=debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    info!(
        station = %cfg.station.url,
        brokers = %cfg.redpanda.brokers,
        debug = cfg.debug,
        "loaded config"
    );

    let station = StationClient::new(&cfg.station)?;
    let producer = create_producer(&cfg.redpanda)?;
    let admin = KafkaTopicAdmin::new(&cfg.redpanda)?;
    let publisher = RedpandaPublisher::new(producer, Arc::new(admin), &cfg.redpanda, cfg.debug);
    publisher.ensure_topics(&cfg.topics.all()).await;
    info!(brokers = %cfg.redpanda.brokers, "connected to Redpanda");

    let scheduler = register_jobs(
        Scheduler::new(),
        JobSpec::defaults(&cfg.topics),
        Arc::new(station),
        Arc::new(publisher),
    );

    scheduler.run(shutdown_signal()).await;

    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown requested");
}
