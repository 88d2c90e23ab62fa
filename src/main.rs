use anyhow::Result;
use bankscraper::{config::Config, pipeline};
use std::path::Path;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();
    info!("startup");

    // ─── 2) configuration ────────────────────────────────────────────
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(Path::new(&path))?,
        None => Config::default(),
    };
    info!(url = %config.url, table = %config.table_name, "run configuration");

    // ─── 3) run the pipeline ─────────────────────────────────────────
    pipeline::run(&config).await
}
