//! # Gacha Server
//!
//! ```bash
//! gacha_server [config.toml]     # or GACHA_CONFIG, default config/gacha.toml
//! RUST_LOG=gacha_economy=debug gacha_server
//! ```

use std::process::ExitCode;
use std::sync::Arc;

use gacha_server::telemetry::init_telemetry;
use gacha_server::{build_engine, config_path, serve, GachaConfig, StartupError};

fn main() -> ExitCode {
    init_telemetry();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), StartupError> {
    let config = GachaConfig::load(config_path(std::env::args().nth(1)))?;

    // Built before the runtime exists and dropped after it stops: the chain
    // ledger's blocking HTTP client may not live inside async context.
    let engine = Arc::new(build_engine(&config)?);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(StartupError::Serve)?;
    runtime
        .block_on(serve(config.server.bind_addr, Arc::clone(&engine)))
        .map_err(StartupError::Serve)?;
    drop(runtime);

    tracing::info!("Stopped");
    Ok(())
}
