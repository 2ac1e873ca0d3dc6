// SPDX-License-Identifier: MPL-2.0

//! Native window host for the web frontend.

mod gtk;

pub use gtk::GtkHost;

use crate::assets::AssetBundle;
use crate::bridge::{Bound, event_script};
use serde::Serialize;
use std::sync::{Arc, mpsc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HostError {
    #[error("display unavailable: {0}")]
    Display(String),
    #[error("failed to register the frontend bridge")]
    Bridge,
    #[error("event loop exited before the window opened")]
    NotStarted,
    #[error("event loop exited with {0}")]
    Exited(String),
    #[error("window is closed")]
    Closed,
    #[error("invalid host transition from {from:?} to {to:?}")]
    InvalidTransition { from: HostState, to: HostState },
    #[error("event payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Everything a host needs to put the application on screen
pub struct HostOptions {
    pub title: String,
    pub width: i32,
    pub height: i32,
    pub assets: AssetBundle,
    /// Called once, after the page has loaded
    pub on_startup: StartupHook,
    /// Objects whose methods the frontend may call
    pub bind: Vec<Arc<dyn Bound>>,
}

pub type StartupHook = Box<dyn FnOnce(HostContext)>;

/// Holds the startup hook until the page can receive events
pub struct StartupGate {
    hook: Option<StartupHook>,
    context: HostContext,
}

impl StartupGate {
    pub fn new(hook: StartupHook, context: HostContext) -> Self {
        Self {
            hook: Some(hook),
            context,
        }
    }

    /// Run the hook on the first load. Returns whether it ran.
    pub fn page_loaded(&mut self) -> bool {
        match self.hook.take() {
            Some(hook) => {
                hook(self.context.clone());
                true
            }
            None => false,
        }
    }
}

/// A single-shot window runtime. `run` blocks until the window closes.
pub trait RuntimeHost {
    fn run(self, options: HostOptions) -> Result<(), HostError>;
}

/// Handle given to the startup hook for talking back to the page
#[derive(Clone)]
pub struct HostContext {
    scripts: mpsc::Sender<String>,
}

impl HostContext {
    pub fn new(scripts: mpsc::Sender<String>) -> Self {
        Self { scripts }
    }

    /// Deliver an event to `window.shion.events` listeners on the page
    pub fn emit<T: Serialize>(&self, event: &str, payload: &T) -> Result<(), HostError> {
        let payload = serde_json::to_value(payload)?;
        self.scripts
            .send(event_script(event, &payload))
            .map_err(|_| HostError::Closed)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HostState {
    #[default]
    NotStarted,
    Running,
    Closed,
}

/// NotStarted → Running → Closed, or NotStarted → Closed when startup fails.
/// There is no way back.
#[derive(Debug, Default)]
pub struct Lifecycle {
    state: HostState,
}

impl Lifecycle {
    pub fn state(&self) -> HostState {
        self.state
    }

    pub fn start(&mut self) -> Result<(), HostError> {
        self.transition(HostState::Running)
    }

    pub fn close(&mut self) -> Result<(), HostError> {
        self.transition(HostState::Closed)
    }

    fn transition(&mut self, to: HostState) -> Result<(), HostError> {
        let allowed = matches!(
            (self.state, to),
            (HostState::NotStarted, HostState::Running)
                | (HostState::NotStarted, HostState::Closed)
                | (HostState::Running, HostState::Closed)
        );
        if !allowed {
            return Err(HostError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }
}
