use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// A debounced change to one path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEvent {
    /// Created or modified
    Changed(PathBuf),
    Removed(PathBuf),
}

impl FileEvent {
    pub fn path(&self) -> &Path {
        match self {
            FileEvent::Changed(path) | FileEvent::Removed(path) => path,
        }
    }
}

/// Recursive watch on the workspace root
///
/// Raw notifications are collected until the tree has been quiet for the
/// debounce interval, then handed to `on_batch` in one sorted batch. Dropping
/// the watcher stops the debounce thread.
pub struct WorkspaceWatcher {
    _watcher: RecommendedWatcher,
}

impl WorkspaceWatcher {
    pub fn new<F>(root: &Path, debounce: Duration, on_batch: F) -> Result<Self, notify::Error>
    where
        F: FnMut(Vec<FileEvent>) + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    let _ = tx.send(event);
                }
                Err(e) => warn!("[Watcher] Notification error: {}", e),
            },
            Config::default(),
        )?;

        watcher.watch(root, RecursiveMode::Recursive)?;
        debug!("[Watcher] Watching {}", root.display());

        std::thread::spawn(move || {
            debounced_loop(rx, debounce, on_batch);
        });

        Ok(Self { _watcher: watcher })
    }
}

fn debounced_loop<F>(rx: mpsc::Receiver<Event>, debounce: Duration, mut on_batch: F)
where
    F: FnMut(Vec<FileEvent>),
{
    let mut pending: HashSet<PathBuf> = HashSet::new();
    let mut last_change = Instant::now();
    let tick = debounce.min(Duration::from_millis(100)).max(Duration::from_millis(10));

    loop {
        match rx.recv_timeout(tick) {
            Ok(event) => {
                if event.kind.is_access() {
                    continue;
                }
                pending.extend(event.paths);
                last_change = Instant::now();
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                break;
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                if !pending.is_empty() && last_change.elapsed() >= debounce {
                    on_batch(classify(pending.drain()));
                }
            }
        }
    }
}

/// Whether a path still exists decides between change and removal
fn classify(paths: impl Iterator<Item = PathBuf>) -> Vec<FileEvent> {
    let mut paths: Vec<PathBuf> = paths.collect();
    paths.sort();
    paths
        .into_iter()
        .map(|path| {
            if path.exists() {
                FileEvent::Changed(path)
            } else {
                FileEvent::Removed(path)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn wait_for(rx: &mpsc::Receiver<Vec<FileEvent>>, wanted: impl Fn(&FileEvent) -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while let Some(left) = deadline.checked_duration_since(Instant::now()) {
            match rx.recv_timeout(left) {
                Ok(batch) if batch.iter().any(&wanted) => return true,
                Ok(_) => continue,
                Err(_) => return false,
            }
        }
        false
    }

    #[test]
    fn test_classify_by_existence() {
        let temp_dir = TempDir::new().unwrap();
        let kept = temp_dir.path().join("kept.js");
        fs::write(&kept, "").unwrap();
        let gone = temp_dir.path().join("gone.js");

        let events = classify(vec![gone.clone(), kept.clone(), kept.clone()].into_iter());
        assert_eq!(
            events,
            vec![
                FileEvent::Removed(gone),
                FileEvent::Changed(kept.clone()),
                FileEvent::Changed(kept),
            ]
        );
    }

    #[test]
    fn test_watcher_reports_new_and_deleted_files() {
        let temp_dir = TempDir::new().unwrap();
        let (tx, rx) = mpsc::channel();
        let debounce = Duration::from_millis(50);
        let _watcher = WorkspaceWatcher::new(temp_dir.path(), debounce, move |batch| {
            let _ = tx.send(batch);
        })
        .unwrap();

        let file = temp_dir.path().join("new.js");
        fs::write(&file, "function f() {}").unwrap();
        assert!(wait_for(&rx, |e| matches!(e, FileEvent::Changed(p) if p.ends_with("new.js"))));

        fs::remove_file(&file).unwrap();
        assert!(wait_for(&rx, |e| matches!(e, FileEvent::Removed(p) if p.ends_with("new.js"))));
    }
}
