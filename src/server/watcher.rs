//! Background filesystem watcher for a session root
//!
//! Raw notify events are funnelled into a channel and collapsed: the first
//! change opens a [`DEBOUNCE`] window and everything inside it produces a
//! single callback when the window ends, so a steady writer gets one
//! callback per window.

use std::path::Path;
use std::time::Duration;

use notify::{EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

pub const DEBOUNCE: Duration = Duration::from_millis(200);

/// Owns the watcher task; dropping it stops watching
#[derive(Debug)]
pub struct WatcherHandle {
    task: JoinHandle<()>,
}

impl WatcherHandle {
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Watch `root` recursively and call `on_change` after each debounced burst
pub fn watch<F>(root: &Path, on_change: F) -> notify::Result<WatcherHandle>
where
    F: Fn() + Send + 'static,
{
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<()>();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        match res {
            Ok(event) if matches!(event.kind, EventKind::Access(_)) => {}
            Ok(_) => {
                let _ = event_tx.send(());
            }
            Err(e) => warn!(error = %e, "Filesystem watch error"),
        }
    })?;
    watcher.watch(root, RecursiveMode::Recursive)?;

    let root = root.display().to_string();
    let task = tokio::spawn(async move {
        // The watcher lives as long as this task
        let _watcher = watcher;
        let mut deadline: Option<Instant> = None;
        loop {
            let window_end = deadline.unwrap_or_else(Instant::now);
            tokio::select! {
                event = event_rx.recv() => match event {
                    Some(()) => {
                        deadline.get_or_insert_with(|| Instant::now() + DEBOUNCE);
                    }
                    None => break,
                },
                _ = tokio::time::sleep_until(window_end), if deadline.is_some() => {
                    deadline = None;
                    debug!(root = %root, "Workspace changed");
                    on_change();
                }
            }
        }
    });

    Ok(WatcherHandle { task })
}
