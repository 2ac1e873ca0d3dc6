// SPDX-License-Identifier: MPL-2.0

mod app;
mod assets;
mod bootstrap;
mod bridge;
mod config;
mod host;
mod logging;
mod runtime;
mod store;

use std::process::ExitCode;

fn main() -> ExitCode {
    let config = config::AppConfig::from_env();
    logging::init(&config.log_filter);

    match bootstrap::launch(&config, assets::AssetBundle::embedded(), host::GtkHost::new()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "startup failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
