use std::collections::HashMap;
use std::process::ExitCode;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use livechat_reader::config::ConsumerConfig;
use livechat_reader::db::PgProgressRepository;
use livechat_reader::kafka::{ConsumerLoop, LiveStreamFoundHandler, MessageHandler};
use livechat_reader::logging;

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

async fn run(cfg: ConsumerConfig) -> anyhow::Result<()> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&cfg.database_url)
        .await?;

    let progress = Arc::new(PgProgressRepository::new(pool));

    let mut handlers: HashMap<String, Arc<dyn MessageHandler>> = HashMap::new();
    handlers.insert(
        cfg.live_stream_found_topic.clone(),
        Arc::new(LiveStreamFoundHandler::new(progress)),
    );

    let consumer = ConsumerLoop::new(&cfg.kafka_brokers, &cfg.group_id, handlers)?;

    let cancel = CancellationToken::new();

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        signal_cancel.cancel();
    });

    consumer.run(cancel).await;

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init_tracing();

    let cfg = match ConsumerConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("ERROR: failed to load configuration: {e}");
            return ExitCode::from(1);
        }
    };

    info!("Starting...");

    let outcome = run(cfg).await;

    info!("Stopped");

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Consumer failed");
            eprintln!("ERROR: {e}");
            ExitCode::from(1)
        }
    }
}
