use tracing_subscriber::{fmt, EnvFilter};

pub fn init_tracing() {
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
