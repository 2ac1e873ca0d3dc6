// SPDX-License-Identifier: MPL-2.0

//! Shared worker runtime for frontend calls.
//!
//! Bridge calls arrive on the GTK main thread; they run here so database work
//! never blocks the window. One runtime is built lazily and shared.

use once_cell::sync::OnceCell;
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;

static RUNTIME: OnceCell<Runtime> = OnceCell::new();

/// Shared multi-threaded runtime. Two workers are enough for local database
/// calls; blocking work goes to the runtime's blocking pool.
fn runtime() -> std::io::Result<&'static Runtime> {
    RUNTIME.get_or_try_init(|| {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .thread_name("shion-worker")
            .build()
    })
}

/// Run a blocking closure on the shared runtime without blocking the caller.
pub fn spawn_blocking<F, R>(f: F) -> std::io::Result<JoinHandle<R>>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    Ok(runtime()?.spawn_blocking(f))
}
