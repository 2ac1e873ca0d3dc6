// SPDX-License-Identifier: MPL-2.0

//! Startup sequence: config directory, database, application object, host.

use crate::app::ShionApp;
use crate::assets::AssetBundle;
use crate::bridge::Bound;
use crate::config::{APP_NAME, AppConfig, ConfigError, WINDOW_HEIGHT, WINDOW_WIDTH};
use crate::host::{HostContext, HostError, HostOptions, RuntimeHost};
use crate::store::{Database, StoreError};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Host(#[from] HostError),
}

/// Closes the database when the launch scope ends, whichever way it ends.
/// `release` reports close errors on the normal path; `Drop` covers unwinding.
struct Release {
    db: Database,
}

impl Release {
    fn release(self) -> Result<(), StoreError> {
        self.db.close().map(|_| ())
    }
}

impl Drop for Release {
    fn drop(&mut self) {
        if let Err(e) = self.db.close() {
            tracing::error!(error = %e, "failed to close database");
        }
    }
}

/// Bring the application up and block until the window closes.
pub fn launch<H: RuntimeHost>(
    config: &AppConfig,
    assets: AssetBundle,
    host: H,
) -> Result<(), StartupError> {
    let dir = config.resolve_config_dir()?;
    tracing::info!(path = %dir.display(), "config directory ready");

    let db = Database::open(&dir)?;
    let release = Release { db: db.clone() };

    let app = Arc::new(ShionApp::new(db, dir));

    let on_startup = {
        let app = app.clone();
        Box::new(move |context: HostContext| app.startup(context))
    };

    let options = HostOptions {
        title: APP_NAME.to_string(),
        width: WINDOW_WIDTH,
        height: WINDOW_HEIGHT,
        assets,
        on_startup,
        bind: vec![app as Arc<dyn Bound>],
    };

    let hosted = host.run(options);
    let released = release.release();

    if let Err(e) = &hosted {
        tracing::error!(error = %e, "runtime host failed");
    }

    hosted?;
    released?;
    tracing::info!("shut down cleanly");
    Ok(())
}
