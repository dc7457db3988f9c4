use std::process::ExitCode;
use std::sync::Arc;

use rdkafka::producer::FutureProducer;
use rdkafka::ClientConfig;
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use kafka_outbox::{KafkaEventPublisher, OutboxRelay, SqlxOutboxStore};
use livechat_finder::config::Config;
use livechat_finder::db::PgStreamStore;
use livechat_finder::error::FinderError;
use livechat_finder::find::LiveStreamFinder;
use livechat_finder::youtube::CatalogClient;

fn init_tracing() {
    let default = match std::env::var("LOG_LEVEL").as_deref() {
        Ok("info") => "info",
        Ok("warn") => "warn",
        Ok("error") => "error",
        _ => "debug",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{default},sqlx=warn,rdkafka=warn")));

    fmt().with_env_filter(env_filter).with_target(false).init();
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate =
            signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = terminate.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    }
}

async fn run(cfg: Config) -> Result<(), FinderError> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&cfg.database_url)
        .await?;

    let producer: FutureProducer = ClientConfig::new()
        .set("bootstrap.servers", &cfg.kafka_brokers)
        .set("acks", "all")
        .set("enable.idempotence", "true")
        .create()
        .map_err(|e| FinderError::Config(format!("kafka producer: {e}")))?;

    let catalog = Arc::new(CatalogClient::new(&cfg.youtube_host, &cfg.youtube_api_key)?);
    let store = Arc::new(PgStreamStore::new(
        pool.clone(),
        &cfg.live_stream_found_topic,
    ));

    let finder = LiveStreamFinder::new(catalog, store);
    finder.find(&cfg.youtube_channels).await?;

    let relay = OutboxRelay::new(
        Arc::new(SqlxOutboxStore::new(pool)),
        Arc::new(KafkaEventPublisher::new(producer)),
    );
    relay.publish_pending().await?;

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let cfg = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("ERROR: failed to load configuration: {e}");
            return ExitCode::from(1);
        }
    };

    info!("Starting...");

    let outcome = tokio::select! {
        res = run(cfg) => res,
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
            Ok(())
        }
    };

    info!("Stopped");

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Finder run failed");
            eprintln!("ERROR: {e}");
            ExitCode::from(1)
        }
    }
}
