//! Change watcher: debounces file signals and triggers re-imports.
//!
//! One task per binding owns the debounce deadline. Each `Changed` signal
//! replaces the deadline; when it fires the watcher either discards the
//! change (loop guard held) or runs the [`ChangeHandler`].
//!
//! ```text
//! Idle -> PendingDebounce -> Idle               (guard held)
//! Idle -> PendingDebounce -> Importing -> Idle  (external edit)
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Result, WatchError};
use crate::guard::LoopGuard;
use crate::source::{FileEventSource, FileSignal, Stability};

/// Signals buffered between the file-event source and the watcher task.
const SIGNAL_BUFFER: usize = 32;

/// Watcher state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WatcherState {
    Idle,
    PendingDebounce,
    Importing,
}

/// Reacts to an external change of the bound file.
#[async_trait]
pub trait ChangeHandler: Send + Sync + 'static {
    /// Re-import `path`. Returns the number of records loaded.
    async fn on_external_change(&self, path: &Path) -> Result<usize>;
}

/// Watcher timing.
#[derive(Debug, Clone, Copy)]
pub struct WatchTiming {
    pub debounce: Duration,
    pub stability: Stability,
}

struct Binding {
    path: PathBuf,
    cancel: CancellationToken,
    task: JoinHandle<()>,
    _source: Option<FileEventSource>,
}

/// Observes one bound file at a time.
pub struct ChangeWatcher {
    handler: Arc<dyn ChangeHandler>,
    guard: LoopGuard,
    timing: WatchTiming,
    state_tx: Arc<watch::Sender<WatcherState>>,
    binding: Mutex<Option<Binding>>,
}

impl ChangeWatcher {
    pub fn new(handler: Arc<dyn ChangeHandler>, guard: LoopGuard, timing: WatchTiming) -> Self {
        let (state_tx, _) = watch::channel(WatcherState::Idle);
        Self {
            handler,
            guard,
            timing,
            state_tx: Arc::new(state_tx),
            binding: Mutex::new(None),
        }
    }

    /// Watch `path` through a `notify` file-event source.
    ///
    /// Any previous binding is cancelled first.
    pub fn bind(&self, path: &Path) -> std::result::Result<(), WatchError> {
        self.unbind();

        let (tx, rx) = mpsc::channel(SIGNAL_BUFFER);
        let source = FileEventSource::spawn(path, self.timing.stability, tx)?;
        self.attach(path, rx, Some(source));
        info!("Watching {}", path.display());
        Ok(())
    }

    /// Watch `path` using signals from a caller-provided source.
    pub fn bind_channel(&self, path: &Path, signals: mpsc::Receiver<FileSignal>) {
        self.unbind();
        self.attach(path, signals, None);
    }

    /// Stop watching. Any pending debounce is discarded.
    pub fn unbind(&self) {
        if let Some(binding) = self.lock().take() {
            binding.cancel.cancel();
            binding.task.abort();
            self.state_tx.send_replace(WatcherState::Idle);
            debug!("Stopped watching {}", binding.path.display());
        }
    }

    /// Currently bound path.
    pub fn bound_path(&self) -> Option<PathBuf> {
        self.lock().as_ref().map(|b| b.path.clone())
    }

    pub fn state(&self) -> WatcherState {
        *self.state_tx.borrow()
    }

    /// Observe state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<WatcherState> {
        self.state_tx.subscribe()
    }

    fn attach(
        &self,
        path: &Path,
        signals: mpsc::Receiver<FileSignal>,
        source: Option<FileEventSource>,
    ) {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_watcher(
            WatchContext {
                path: path.to_path_buf(),
                handler: Arc::clone(&self.handler),
                guard: self.guard.clone(),
                debounce: self.timing.debounce,
                state_tx: Arc::clone(&self.state_tx),
            },
            signals,
            cancel.clone(),
        ));

        *self.lock() = Some(Binding {
            path: path.to_path_buf(),
            cancel,
            task,
            _source: source,
        });
    }

    fn lock(&self) -> MutexGuard<'_, Option<Binding>> {
        self.binding.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for ChangeWatcher {
    fn drop(&mut self) {
        self.unbind();
    }
}

struct WatchContext {
    path: PathBuf,
    handler: Arc<dyn ChangeHandler>,
    guard: LoopGuard,
    debounce: Duration,
    state_tx: Arc<watch::Sender<WatcherState>>,
}

impl WatchContext {
    fn set_state(&self, state: WatcherState) {
        self.state_tx.send_if_modified(|current| {
            let changed = *current != state;
            *current = state;
            changed
        });
    }
}

async fn run_watcher(
    ctx: WatchContext,
    mut signals: mpsc::Receiver<FileSignal>,
    cancel: CancellationToken,
) {
    let mut deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            signal = signals.recv() => match signal {
                Some(FileSignal::Changed) => {
                    deadline = Some(Instant::now() + ctx.debounce);
                    ctx.set_state(WatcherState::PendingDebounce);
                    debug!("Change detected in {}, debouncing", ctx.path.display());
                }
                Some(FileSignal::Error(reason)) => {
                    warn!("Cannot observe {}: {}", ctx.path.display(), reason);
                }
                None => break,
            },

            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                deadline = None;

                if ctx.guard.is_held() {
                    debug!("Ignoring change to {} made by write-back", ctx.path.display());
                    ctx.set_state(WatcherState::Idle);
                    continue;
                }

                ctx.set_state(WatcherState::Importing);
                info!("External change in {}, re-importing", ctx.path.display());
                match ctx.handler.on_external_change(&ctx.path).await {
                    Ok(count) => info!("Re-imported {} records", count),
                    Err(e) => warn!("Re-import of {} failed: {}", ctx.path.display(), e),
                }
                ctx.set_state(WatcherState::Idle);
            }
        }
    }

    ctx.set_state(WatcherState::Idle);
}
