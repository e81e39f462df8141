use anyhow::Context;
use authgate::{config::AuthgateConfig, init_server, init_tracing};
use std::env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    // Get config file path from command line or use default
    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| "config/authgate.yaml".to_string());

    let config = AuthgateConfig::from_file(&config_path).with_context(|| {
        format!(
            "Failed to load configuration from {} (usage: authgate [config_file])",
            config_path
        )
    })?;

    init_server(config).await.context("Server error")?;

    Ok(())
}
