// SPDX-License-Identifier: MPL-2.0

use crate::assets::AssetBundle;
use crate::bridge::{BRIDGE_HANDLER, Bridge};
use crate::config::APP_ID;
use crate::host::{
    HostContext, HostError, HostOptions, HostState, Lifecycle, RuntimeHost, StartupGate,
};
use crate::runtime;
use gtk4::prelude::*;
use gtk4::{gio, glib};
use libadwaita as adw;
use libadwaita::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::{Arc, mpsc};
use std::time::Duration;
use webkit6::prelude::*;

/// Custom URI scheme the bundled frontend is served from
const ASSET_SCHEME: &str = "shion";
/// How often queued replies and events are pushed into the page
const SCRIPT_POLL_INTERVAL: Duration = Duration::from_millis(16);

/// Runtime host backed by libadwaita and a WebKitGTK web view
pub struct GtkHost {
    application_id: String,
}

impl GtkHost {
    pub fn new() -> Self {
        Self {
            application_id: APP_ID.to_string(),
        }
    }
}

impl Default for GtkHost {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeHost for GtkHost {
    fn run(self, options: HostOptions) -> Result<(), HostError> {
        let lifecycle = Rc::new(RefCell::new(Lifecycle::default()));

        if let Err(e) = adw::init() {
            lifecycle.borrow_mut().close()?;
            return Err(HostError::Display(e.to_string()));
        }

        let app = adw::Application::builder()
            .application_id(self.application_id.as_str())
            .build();

        let pending = Rc::new(RefCell::new(Some(options)));
        let failure: Rc<RefCell<Option<HostError>>> = Rc::new(RefCell::new(None));

        {
            let lifecycle = lifecycle.clone();
            let failure = failure.clone();
            app.connect_activate(move |app| {
                // A second launch activates this instance again; just raise the window
                let Some(options) = pending.borrow_mut().take() else {
                    if let Some(window) = app.active_window() {
                        window.present();
                    }
                    return;
                };

                if let Err(e) = open_window(app, options, &lifecycle) {
                    tracing::error!(error = %e, "failed to open main window");
                    failure.replace(Some(e));
                    app.quit();
                }
            });
        }

        // Our own arguments are not GTK's business
        let status = app.run_with_args::<&str>(&[]);

        if let Some(e) = failure.borrow_mut().take() {
            let _ = lifecycle.borrow_mut().close();
            return Err(e);
        }

        let mut lifecycle = lifecycle.borrow_mut();
        match lifecycle.state() {
            HostState::NotStarted if app.is_remote() => {
                tracing::info!("already running, handed off to the primary instance");
                lifecycle.close()
            }
            HostState::NotStarted => {
                lifecycle.close()?;
                Err(HostError::NotStarted)
            }
            HostState::Running => {
                lifecycle.close()?;
                exit_status(status)
            }
            HostState::Closed => exit_status(status),
        }
    }
}

fn exit_status(status: glib::ExitCode) -> Result<(), HostError> {
    if status == glib::ExitCode::SUCCESS {
        Ok(())
    } else {
        Err(HostError::Exited(format!("{status:?}")))
    }
}

fn open_window(
    app: &adw::Application,
    options: HostOptions,
    lifecycle: &Rc<RefCell<Lifecycle>>,
) -> Result<(), HostError> {
    let HostOptions {
        title,
        width,
        height,
        assets,
        on_startup,
        bind,
    } = options;

    let bridge = Arc::new(Bridge::new(bind));
    // Replies and events produced off the main thread, evaluated on it
    let (scripts_tx, scripts_rx) = mpsc::channel::<String>();

    tracing::debug!(files = assets.len(), "serving frontend bundle");
    let web_context = webkit6::WebContext::new();
    web_context.register_uri_scheme(ASSET_SCHEME, move |request: &webkit6::URISchemeRequest| {
        serve_asset(&assets, request);
    });

    let content_manager = webkit6::UserContentManager::new();
    content_manager.add_script(&webkit6::UserScript::new(
        &bridge.runtime_script(),
        webkit6::UserContentInjectedFrames::TopFrame,
        webkit6::UserScriptInjectionTime::Start,
        &[],
        &[],
    ));
    if !content_manager.register_script_message_handler(BRIDGE_HANDLER, None) {
        return Err(HostError::Bridge);
    }

    let replies = scripts_tx.clone();
    content_manager.connect_script_message_received(Some(BRIDGE_HANDLER), move |_, value| {
        let raw = value.to_str().to_string();
        let bridge = bridge.clone();
        let replies = replies.clone();
        let dispatched = runtime::spawn_blocking(move || {
            if let Some(reply) = bridge.handle(&raw) {
                let _ = replies.send(reply.to_script());
            }
        });
        if let Err(e) = dispatched {
            tracing::error!(error = %e, "failed to dispatch frontend call");
        }
    });

    let web_view = webkit6::WebView::builder()
        .web_context(&web_context)
        .user_content_manager(&content_manager)
        .build();
    web_view.set_vexpand(true);

    let weak_view = web_view.downgrade();
    glib::timeout_add_local(SCRIPT_POLL_INTERVAL, move || {
        let Some(web_view) = weak_view.upgrade() else {
            return glib::ControlFlow::Break;
        };
        while let Ok(script) = scripts_rx.try_recv() {
            web_view.evaluate_javascript(
                &script,
                None,
                None,
                None::<&gio::Cancellable>,
                |result| {
                    if let Err(e) = result {
                        tracing::warn!(error = %e, "page script failed");
                    }
                },
            );
        }
        glib::ControlFlow::Continue
    });

    let toolbar = adw::ToolbarView::new();
    toolbar.add_top_bar(&adw::HeaderBar::new());
    toolbar.set_content(Some(&web_view));

    let window = adw::ApplicationWindow::builder()
        .application(app)
        .title(title.as_str())
        .default_width(width)
        .default_height(height)
        .content(&toolbar)
        .build();

    {
        let lifecycle = lifecycle.clone();
        window.connect_close_request(move |_| {
            if let Err(e) = lifecycle.borrow_mut().close() {
                tracing::debug!(error = %e, "window closed twice");
            }
            glib::Propagation::Proceed
        });
    }

    // Events sent before the page's listeners exist would be lost
    let gate = RefCell::new(StartupGate::new(on_startup, HostContext::new(scripts_tx)));
    web_view.connect_load_changed(move |_, event| {
        if event == webkit6::LoadEvent::Finished && gate.borrow_mut().page_loaded() {
            tracing::debug!("page loaded, startup hook ran");
        }
    });

    web_view.load_uri(&format!("{ASSET_SCHEME}://localhost/index.html"));
    window.present();

    lifecycle.borrow_mut().start()?;
    tracing::info!(title = %title, width, height, "window opened");
    Ok(())
}

fn serve_asset(assets: &AssetBundle, request: &webkit6::URISchemeRequest) {
    let path = request.path().map(|p| p.to_string()).unwrap_or_default();

    match assets.resolve(&path) {
        Some(asset) => {
            let bytes = glib::Bytes::from_owned(asset.data);
            let length = bytes.len() as i64;
            let stream = gio::MemoryInputStream::from_bytes(&bytes);
            request.finish(&stream, length, Some(asset.mime));
        }
        None => {
            tracing::warn!(path = %path, "asset not found");
            let mut error = glib::Error::new(
                gio::IOErrorEnum::NotFound,
                &format!("asset not found: {path}"),
            );
            request.finish_error(&mut error);
        }
    }
}
