//! Directory change notification.
//!
//! [`DirectoryWatcher`] polls a dataset directory and reports what changed
//! as [`ChangeEvent`]s on a channel. It does not touch any viewport; the
//! host decides which events warrant a reload.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A change observed in the watched directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// The directory changed without an attributable file event.
    Changed,
    /// The directory itself disappeared.
    Deleted,
    /// The directory reappeared after being deleted.
    Recreated,
    FileCreated(PathBuf),
    FileModified(PathBuf),
    FileDeleted(PathBuf),
}

impl ChangeEvent {
    /// File the event refers to, for file-level events.
    pub fn path(&self) -> Option<&Path> {
        match self {
            ChangeEvent::FileCreated(path)
            | ChangeEvent::FileModified(path)
            | ChangeEvent::FileDeleted(path) => Some(path),
            ChangeEvent::Changed | ChangeEvent::Deleted | ChangeEvent::Recreated => None,
        }
    }

    /// Returns `true` if the event may change the contents of `dataset`.
    ///
    /// Directory-level events affect every dataset; file events affect the
    /// dataset named by the file stem.
    pub fn affects(&self, dataset: &str) -> bool {
        match self.path() {
            Some(path) => path.file_stem().is_some_and(|stem| stem == dataset),
            None => true,
        }
    }
}

/// Modification times of the files in a directory, plus the directory's own.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirSnapshot {
    modified: Option<SystemTime>,
    files: HashMap<PathBuf, Option<SystemTime>>,
}

/// Reads `root`, or returns `None` if it does not exist.
pub async fn scan(root: &Path) -> Option<DirSnapshot> {
    let metadata = tokio::fs::metadata(root).await.ok()?;
    let mut snapshot = DirSnapshot {
        modified: metadata.modified().ok(),
        files: HashMap::new(),
    };

    let mut entries = match tokio::fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %root.display(), "failed to read directory: {e}");
            return Some(snapshot);
        }
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let Ok(metadata) = entry.metadata().await else {
            continue;
        };
        if metadata.is_file() {
            snapshot.files.insert(entry.path(), metadata.modified().ok());
        }
    }

    Some(snapshot)
}

/// Events that turn `before` into `after`.
pub fn diff(before: Option<&DirSnapshot>, after: Option<&DirSnapshot>) -> Vec<ChangeEvent> {
    let (before, after) = match (before, after) {
        (None, None) => return Vec::new(),
        (Some(_), None) => return vec![ChangeEvent::Deleted],
        (None, Some(_)) => return vec![ChangeEvent::Recreated],
        (Some(before), Some(after)) => (before, after),
    };

    let mut events = Vec::new();
    for (path, modified) in &after.files {
        match before.files.get(path) {
            None => events.push(ChangeEvent::FileCreated(path.clone())),
            Some(previous) if previous != modified => {
                events.push(ChangeEvent::FileModified(path.clone()));
            }
            Some(_) => {}
        }
    }
    for path in before.files.keys() {
        if !after.files.contains_key(path) {
            events.push(ChangeEvent::FileDeleted(path.clone()));
        }
    }
    events.sort_by(|a, b| a.path().cmp(&b.path()));

    if events.is_empty() && before.modified != after.modified {
        events.push(ChangeEvent::Changed);
    }
    events
}

/// Polls a directory and sends a [`ChangeEvent`] for every difference
/// between consecutive scans.
pub struct DirectoryWatcher {
    root: PathBuf,
    poll_interval: Duration,
    tx: mpsc::UnboundedSender<ChangeEvent>,
}

impl DirectoryWatcher {
    #[must_use]
    pub fn new(
        root: impl Into<PathBuf>,
        poll_interval: Duration,
        tx: mpsc::UnboundedSender<ChangeEvent>,
    ) -> Self {
        Self {
            root: root.into(),
            poll_interval,
            tx,
        }
    }

    /// Runs [`run`](Self::run) on a new task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Polls until the receiving side of the channel is dropped.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        ticker.tick().await;
        let mut previous = scan(&self.root).await;
        info!(path = %self.root.display(), exists = previous.is_some(), "watching directory");

        loop {
            ticker.tick().await;
            let current = scan(&self.root).await;
            for event in diff(previous.as_ref(), current.as_ref()) {
                debug!(?event, "directory change");
                if self.tx.send(event).is_err() {
                    return;
                }
            }
            if self.tx.is_closed() {
                return;
            }
            previous = current;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(files: &[(&str, u64)]) -> DirSnapshot {
        DirSnapshot {
            modified: Some(SystemTime::UNIX_EPOCH),
            files: files
                .iter()
                .map(|(name, secs)| {
                    (
                        PathBuf::from(name),
                        Some(SystemTime::UNIX_EPOCH + Duration::from_secs(*secs)),
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn file_level_changes() {
        let before = snapshot(&[("a.jsonl", 1), ("b.jsonl", 1)]);
        let after = snapshot(&[("a.jsonl", 2), ("c.jsonl", 1)]);

        let events = diff(Some(&before), Some(&after));

        assert_eq!(
            events,
            vec![
                ChangeEvent::FileModified(PathBuf::from("a.jsonl")),
                ChangeEvent::FileDeleted(PathBuf::from("b.jsonl")),
                ChangeEvent::FileCreated(PathBuf::from("c.jsonl")),
            ]
        );
    }

    #[test]
    fn directory_lifecycle() {
        let snap = snapshot(&[]);
        assert_eq!(diff(Some(&snap), None), vec![ChangeEvent::Deleted]);
        assert_eq!(diff(None, Some(&snap)), vec![ChangeEvent::Recreated]);
        assert!(diff(None, None).is_empty());
        assert!(diff(Some(&snap), Some(&snap)).is_empty());
    }

    #[test]
    fn directory_mtime_only_is_changed() {
        let before = snapshot(&[("a.jsonl", 1)]);
        let mut after = before.clone();
        after.modified = Some(SystemTime::UNIX_EPOCH + Duration::from_secs(9));

        assert_eq!(diff(Some(&before), Some(&after)), vec![ChangeEvent::Changed]);
    }

    #[test]
    fn affects_matches_file_stem() {
        let event = ChangeEvent::FileModified(PathBuf::from("/data/btc.jsonl"));
        assert!(event.affects("btc"));
        assert!(!event.affects("eth"));
        assert!(ChangeEvent::Recreated.affects("eth"));
    }

    #[tokio::test]
    async fn scan_lists_files_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("btc.jsonl"), "").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let snap = scan(dir.path()).await.unwrap();

        assert_eq!(snap.files.len(), 1);
        assert!(snap.files.contains_key(&dir.path().join("btc.jsonl")));
        assert!(scan(&dir.path().join("missing")).await.is_none());
    }
}
