use tracing_subscriber::{EnvFilter, fmt};
use tracing::info;

use mediagate::config::{has_flag, HoneypotConfig, HONEYPOT_USAGE};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("{HONEYPOT_USAGE}");
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let config = HoneypotConfig::from_env_and_args(&args)?;
    info!(target: "honeypot", "honeypot starting: addr={}, data_dir='{}'", config.socket_addr(), config.data_dir.display());

    mediagate::honeypot::run(config).await
}
