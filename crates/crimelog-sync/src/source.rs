//! File-event source for the bound workbook.
//!
//! Watches the workbook's parent directory with `notify` (editors often save
//! by writing a temporary file and renaming it over the original), keeps only
//! events naming the workbook, and reports a change once the file's size and
//! modification time have stopped moving.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use crate::error::WatchError;

/// What the source reports to the change watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSignal {
    /// The file changed and has been stable for the stability threshold.
    Changed,
    /// The file could not be observed (deleted, unreadable, watcher failure).
    Error(String),
}

/// Raw notification from the notify callback thread.
#[derive(Debug)]
enum RawEvent {
    Touched,
    Failed(String),
}

/// Write-stability timing.
#[derive(Debug, Clone, Copy)]
pub struct Stability {
    /// How long size and mtime must stay unchanged.
    pub threshold: Duration,
    /// How often size and mtime are sampled.
    pub poll_interval: Duration,
}

/// A running file-event source. Dropping it stops watching.
pub struct FileEventSource {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
    path: PathBuf,
}

impl FileEventSource {
    /// Start watching `path`, sending stable changes to `signals`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        path: &Path,
        stability: Stability,
        signals: mpsc::Sender<FileSignal>,
    ) -> Result<Self, WatchError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_os_string())
            .ok_or_else(|| WatchError::InvalidPath(path.to_path_buf()))?;
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            Some(_) => PathBuf::from("."),
            None => return Err(WatchError::InvalidPath(path.to_path_buf())),
        };

        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let target = file_name.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let raw = match res {
                    Ok(event) if is_relevant(&event, &target) => RawEvent::Touched,
                    Ok(_) => return,
                    Err(e) => RawEvent::Failed(e.to_string()),
                };
                let _ = raw_tx.send(raw);
            },
            Config::default(),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        debug!("Watching {} for changes to {:?}", dir.display(), file_name);

        let task = tokio::spawn(run_source(path.to_path_buf(), raw_rx, signals, stability));

        Ok(Self {
            _watcher: watcher,
            task,
            path: path.to_path_buf(),
        })
    }

    /// The watched file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileEventSource {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn is_relevant(event: &Event, file_name: &OsString) -> bool {
    matches!(
        event.kind,
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
    ) && event
        .paths
        .iter()
        .any(|p| p.file_name() == Some(file_name.as_os_str()))
}

async fn run_source(
    path: PathBuf,
    mut raw_rx: mpsc::UnboundedReceiver<RawEvent>,
    signals: mpsc::Sender<FileSignal>,
    stability: Stability,
) {
    while let Some(raw) = raw_rx.recv().await {
        let signal = match raw {
            RawEvent::Touched => await_write_finish(&path, &mut raw_rx, stability).await,
            RawEvent::Failed(reason) => {
                warn!("File watcher error for {}: {}", path.display(), reason);
                FileSignal::Error(reason)
            }
        };
        if signals.send(signal).await.is_err() {
            break;
        }
    }
    debug!("File event source for {} stopped", path.display());
}

type Snapshot = Option<(u64, Option<SystemTime>)>;

async fn snapshot(path: &Path) -> Snapshot {
    let meta = tokio::fs::metadata(path).await.ok()?;
    Some((meta.len(), meta.modified().ok()))
}

/// Wait until size and mtime are unchanged for the stability threshold.
///
/// Raw events that arrive meanwhile are absorbed; the metadata check already
/// covers them.
async fn await_write_finish(
    path: &Path,
    raw_rx: &mut mpsc::UnboundedReceiver<RawEvent>,
    stability: Stability,
) -> FileSignal {
    let mut last = snapshot(path).await;
    let mut stable_since = Instant::now();

    loop {
        sleep(stability.poll_interval).await;
        while raw_rx.try_recv().is_ok() {}

        let current = snapshot(path).await;
        if current != last {
            last = current;
            stable_since = Instant::now();
            continue;
        }

        if stable_since.elapsed() >= stability.threshold {
            return match current {
                Some(_) => FileSignal::Changed,
                None => FileSignal::Error(format!("{} is missing", path.display())),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick() -> Stability {
        Stability {
            threshold: Duration::from_millis(60),
            poll_interval: Duration::from_millis(20),
        }
    }

    #[test]
    fn test_is_relevant_filters_by_name_and_kind() {
        let target = OsString::from("crime.xlsx");
        let event = Event::new(EventKind::Modify(notify::event::ModifyKind::Any))
            .add_path(PathBuf::from("/data/crime.xlsx"));
        assert!(is_relevant(&event, &target));

        let other = Event::new(EventKind::Modify(notify::event::ModifyKind::Any))
            .add_path(PathBuf::from("/data/other.xlsx"));
        assert!(!is_relevant(&other, &target));

        let access = Event::new(EventKind::Access(notify::event::AccessKind::Any))
            .add_path(PathBuf::from("/data/crime.xlsx"));
        assert!(!is_relevant(&access, &target));
    }

    #[tokio::test]
    async fn test_await_write_finish_stable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crime.xlsx");
        std::fs::write(&path, b"contents").unwrap();

        let (_tx, mut rx) = mpsc::unbounded_channel();
        let signal = await_write_finish(&path, &mut rx, quick()).await;
        assert_eq!(signal, FileSignal::Changed);
    }

    #[tokio::test]
    async fn test_await_write_finish_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.xlsx");

        let (_tx, mut rx) = mpsc::unbounded_channel();
        let signal = await_write_finish(&path, &mut rx, quick()).await;
        assert!(matches!(signal, FileSignal::Error(_)));
    }

    #[tokio::test]
    async fn test_spawn_rejects_path_without_file_name() {
        let (tx, _rx) = mpsc::channel(1);
        let result = FileEventSource::spawn(Path::new("/"), quick(), tx);
        assert!(matches!(result, Err(WatchError::InvalidPath(_))));
    }
}
