//! Long-lived filesystem watcher over the union of recursively indexed
//! roots. Coalesces CREATE/MODIFY bursts via `notify-debouncer-full` and
//! translates the debounced events into re-check/move/remove intents for
//! the scheduler.

use crate::error::{Result, TrackerError};
use notify::RecursiveMode;
use notify_debouncer_full::{new_debouncer, DebounceEventResult, Debouncer, FileIdMap};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, warn};

#[derive(Debug, Clone)]
pub enum FsIntent {
    Recheck(PathBuf),
    Move { from: PathBuf, to: PathBuf },
    Remove(PathBuf),
}

/// Default coalescing window: rapid bursts within this span collapse into
/// one debounced batch.
const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

pub struct Monitor {
    debouncer: Debouncer<notify::RecommendedWatcher, FileIdMap>,
}

impl Monitor {
    pub fn start(roots: &[PathBuf], tx: mpsc::UnboundedSender<FsIntent>) -> Result<Self> {
        let mut debouncer = new_debouncer(DEBOUNCE_WINDOW, None, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    for event in events {
                        for intent in translate(&event.event) {
                            if tx.send(intent).is_err() {
                                warn!("monitor intent channel closed, dropping event");
                            }
                        }
                    }
                }
                Err(errors) => {
                    for err in errors {
                        error!(%err, "filesystem watch error");
                    }
                }
            }
        })
        .map_err(|e| TrackerError::Io {
            path: PathBuf::new(),
            source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
        })?;

        for root in roots {
            debouncer
                .watcher()
                .watch(root, RecursiveMode::Recursive)
                .map_err(|e| TrackerError::Io {
                    path: root.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
                })?;
        }

        Ok(Self { debouncer })
    }

    /// Stops watching `root` ahead of an unmount; queued work under it is
    /// purged by the scheduler, not here.
    pub fn unwatch(&mut self, root: &Path) -> Result<()> {
        self.debouncer.watcher().unwatch(root).map_err(|e| TrackerError::Io {
            path: root.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
        })
    }
}

fn translate(event: &notify::Event) -> Vec<FsIntent> {
    use notify::EventKind::*;
    match &event.kind {
        Create(_) | Modify(_) => event
            .paths
            .iter()
            .cloned()
            .map(FsIntent::Recheck)
            .collect(),
        Remove(_) => event.paths.iter().cloned().map(FsIntent::Remove).collect(),
        _ => {
            // notify-debouncer-full reports renames as two paths on the
            // same event when it can pair them within the debounce window.
            if event.paths.len() == 2 {
                vec![FsIntent::Move {
                    from: event.paths[0].clone(),
                    to: event.paths[1].clone(),
                }]
            } else {
                Vec::new()
            }
        }
    }
}
