//! Track gateway HTTP server.
//!
//! Reads its TOML configuration from the first argument, `TRACK_GATEWAY_CONFIG`, or
//! `config.toml` in the working directory, in that order. Log verbosity follows `RUST_LOG`.

// std
use std::{env, path::PathBuf};
// crates.io
use color_eyre::{Result, eyre::WrapErr};
use tracing_subscriber::EnvFilter;
// self
use track_gateway::{config::GatewayConfig, gateway::Gateway, server};

const CONFIG_ENV: &str = "TRACK_GATEWAY_CONFIG";
const DEFAULT_CONFIG: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.init();

	let path = config_path();
	let config = GatewayConfig::load(&path)
		.wrap_err_with(|| format!("failed to load configuration from `{}`", path.display()))?;

	tracing::info!(config = ?config, "configuration loaded");

	let gateway = Gateway::from_config(&config).wrap_err("failed to assemble the gateway")?;
	let cors = server::cors_layer(&config.allowed_origins).wrap_err("invalid allowed origins")?;

	server::serve(&gateway, config.listen_address, cors)
		.await
		.wrap_err_with(|| format!("failed to serve on {}", config.listen_address))?;

	Ok(())
}

fn config_path() -> PathBuf {
	env::args_os()
		.nth(1)
		.or_else(|| env::var_os(CONFIG_ENV))
		.map(PathBuf::from)
		.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG))
}
