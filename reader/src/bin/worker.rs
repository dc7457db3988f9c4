use std::process::ExitCode;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tonic::transport::Endpoint;
use tracing::{error, info};

use livechat_reader::config::WorkerConfig;
use livechat_reader::db::{
    PgAuthorRepository, PgBanRepository, PgDonateRepository, PgProgressRepository,
    PgTextMessageRepository,
};
use livechat_reader::engine::{LiveStreamReader, ReaderOptions};
use livechat_reader::logging;
use livechat_reader::proto::v3_data_live_chat_message_service_client::V3DataLiveChatMessageServiceClient;
use livechat_reader::youtube::StreamChatMessagesGrpcClient;
use redis_lock::RedisLocker;

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

async fn run(cfg: WorkerConfig) -> anyhow::Result<()> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&cfg.database_url)
        .await?;

    let redis = redis_lock::connect(&cfg.redis_url).await?;
    let locker = Arc::new(RedisLocker::new(redis, cfg.lock_ttl)?);

    let channel = Endpoint::from_shared(cfg.youtube_grpc_target.clone())?.connect_lazy();
    let grpc = V3DataLiveChatMessageServiceClient::new(channel);
    let streamer = Arc::new(StreamChatMessagesGrpcClient::new(
        grpc,
        cfg.youtube_api_keys.clone(),
    )?);

    let reader = LiveStreamReader::new(
        locker,
        streamer,
        Arc::new(PgProgressRepository::new(pool.clone())),
        Arc::new(PgTextMessageRepository::new(pool.clone())),
        Arc::new(PgBanRepository::new(pool.clone())),
        Arc::new(PgDonateRepository::new(pool.clone())),
        Arc::new(PgAuthorRepository::new(pool)),
        ReaderOptions {
            retry_interval: cfg.retry_interval,
            advance_start: cfg.advance_start,
        },
    )?;

    let cancel = CancellationToken::new();

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        signal_cancel.cancel();
    });

    // Returns once every in-flight stream worker has exited.
    reader.run(cancel).await;

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init_tracing();

    let cfg = match WorkerConfig::from_env() {
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
            error!(error = %e, "Worker failed");
            eprintln!("ERROR: {e}");
            ExitCode::from(1)
        }
    }
}
