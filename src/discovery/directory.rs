//! Filesystem discovery: a directory of JSON registration files.
//!
//! Every file in the watched directory is one registration. File creation,
//! modification and removal update the set; a file that fails to parse is
//! logged and treated as absent. Watch events are bridged from notify's
//! callback thread into the source task; a coarse periodic rescan covers
//! missed events and watcher installation failures.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc, watch};

use super::{publish, Report};

const RESCAN_INTERVAL: Duration = Duration::from_secs(5);

pub(super) async fn run(
    service: String,
    dir: PathBuf,
    tx: watch::Sender<Vec<Report>>,
    mut stop: broadcast::Receiver<()>,
) {
    let (fs_tx, mut fs_rx) = mpsc::unbounded_channel();

    // The returned watcher must stay alive for events to keep flowing. The
    // task keeps its own sender so the channel never closes even when
    // installation fails and the callback is dropped.
    let callback_tx = fs_tx.clone();
    let _watcher = install_watcher(&service, &dir, callback_tx);

    publish(&tx, scan(&service, &dir));

    loop {
        tokio::select! {
            _ = stop.recv() => break,
            _ = fs_rx.recv() => {
                // Coalesce whatever else queued up into a single rescan.
                while fs_rx.try_recv().is_ok() {}
                publish(&tx, scan(&service, &dir));
            }
            _ = tokio::time::sleep(RESCAN_INTERVAL) => {
                publish(&tx, scan(&service, &dir));
            }
        }
    }
}

fn install_watcher(
    service: &str,
    dir: &Path,
    events: mpsc::UnboundedSender<()>,
) -> Option<notify::RecommendedWatcher> {
    let mut watcher = match notify::recommended_watcher(move |_: notify::Result<notify::Event>| {
        let _ = events.send(());
    }) {
        Ok(watcher) => watcher,
        Err(e) => {
            tracing::warn!(service = %service, error = %e, "Cannot create file watcher, falling back to rescans");
            return None;
        }
    };

    if let Err(e) = watcher.watch(dir, RecursiveMode::NonRecursive) {
        tracing::warn!(
            service = %service,
            dir = %dir.display(),
            error = %e,
            "Cannot watch discovery directory, falling back to rescans"
        );
        return None;
    }

    Some(watcher)
}

/// Read every registration file in the directory, keyed by file name for a
/// deterministic order.
pub(super) fn scan(service: &str, dir: &Path) -> Vec<Report> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(
                service = %service,
                dir = %dir.display(),
                error = %e,
                "Discovery directory unreadable, reporting empty set"
            );
            return Vec::new();
        }
    };

    let mut reports = BTreeMap::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(service = %service, file = %path.display(), error = %e, "Cannot read discovery file");
                continue;
            }
        };
        match Report::from_json(&bytes) {
            Ok(report) => {
                reports.insert(entry.file_name().to_string_lossy().into_owned(), report);
            }
            Err(e) => {
                tracing::warn!(
                    service = %service,
                    file = %path.display(),
                    error = %e,
                    "Ignoring unparseable discovery file"
                );
            }
        }
    }

    reports.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;

    #[test]
    fn test_scan_parses_and_skips_invalid() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.json"),
            r#"{"name": "a", "host": "10.0.0.1", "port": 80}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("broken.json"), "not json").unwrap();

        let reports = scan("web", dir.path());
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].name, "a");
    }

    #[test]
    fn test_scan_missing_directory_is_empty() {
        assert!(scan("web", Path::new("/nonexistent/backsync-test")).is_empty());
    }

    #[tokio::test]
    async fn test_directory_source_tracks_changes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.json"),
            r#"{"name": "a", "host": "10.0.0.1", "port": 80}"#,
        )
        .unwrap();

        let shutdown = Shutdown::new();
        let (tx, mut rx) = watch::channel(Vec::new());
        let task = tokio::spawn(run(
            "web".into(),
            dir.path().to_path_buf(),
            tx,
            shutdown.subscribe(),
        ));

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().len(), 1);

        std::fs::write(
            dir.path().join("b.json"),
            r#"{"name": "b", "host": "10.0.0.2", "port": 80}"#,
        )
        .unwrap();

        rx.changed().await.unwrap();
        let reports = rx.borrow().clone();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[1].name, "b");

        std::fs::remove_file(dir.path().join("a.json")).unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().len(), 1);

        shutdown.trigger();
        task.await.unwrap();
    }
}
