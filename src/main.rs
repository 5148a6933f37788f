use tracing_subscriber::{EnvFilter, fmt};
use tracing::info;

use mediagate::config::{has_flag, ServerConfig, SERVER_USAGE};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("{SERVER_USAGE}");
        return Ok(());
    }

    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let config = ServerConfig::from_env_and_args(&args)?;

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "mediagate",
        "mediagate starting: RUST_LOG='{}', addr={}, media_root='{}', user='{}', cookie_secure={:?}",
        rust_log, config.socket_addr(), config.media_root.display(), config.username, config.cookie_security
    );

    mediagate::server::run(config).await
}
