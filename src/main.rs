use anyhow::{Context, Result};
use config::OAuthModelConfig;

mod api;
mod authorization;
mod commands;
mod config;
mod error;
mod etcd_encoding;
mod logging;
mod runtime;
mod store;
mod wire;

fn main() -> Result<()> {
    let config = OAuthModelConfig::new().context("parsing configuration")?;

    logging::init(config.log_level).context("initializing logging")?;
    log::debug!(
        "configuration: {}",
        serde_json::to_string(&config).context("serializing configuration")?
    );

    runtime::prepare_tokio_runtime(config.threads)?.block_on(commands::run(&config))
}
