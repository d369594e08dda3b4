//! ZooKeeper discovery: a two-level watch over a service znode.
//!
//! # Data Flow
//! ```text
//! session task (owns the report set, one per service)
//!     ├── root watch task: exists/children watch on the service path
//!     │       publishes Children / NoNodes node events
//!     └── one data watch task per child znode
//!             publishes Data / Absent node events
//! ```
//!
//! Session state is authoritative. While the session is live, the child set
//! tracks the znode children and each child's JSON payload. Any non-connected
//! session state cancels every watch task, drains their queued events and
//! clears the set — ephemeral registrations have vanished from this client's
//! point of view, and stale reports must never survive a session. The client
//! is then rebuilt with exponential backoff and the watch restarts from the
//! root.
//!
//! Spurious watch re-arms (data changed, created, not-watching) coalesce into
//! a re-read-and-re-watch pass; an explicit NodeDeleted on a child is a
//! removal.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use zookeeper_client as zk;

use crate::config::DiscoveryConfig;
use crate::lifecycle::Shutdown;

use super::{publish, sleep_or_stop, Report};

const RECONNECT_BACKOFF_MIN: Duration = Duration::from_millis(500);
const RECONNECT_BACKOFF_MAX: Duration = Duration::from_secs(10);
const WATCH_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Events flowing from the watch tasks to the session task.
enum NodeEvent {
    /// Current child list; the session spawns data watches for new names.
    Children(Vec<String>),
    /// The service path is absent or empty.
    NoNodes,
    /// A child's registration payload was read or replaced.
    Data(String, Report),
    /// A child is gone (deleted, unreadable, or unparseable).
    Absent(String),
}

/// What folding one node event into the session state requires next.
#[derive(Debug, PartialEq)]
enum EventOutcome {
    /// The report set changed; publish this point-in-time view.
    Publish(Vec<Report>),
    /// Start data watches for these previously unseen children.
    SpawnWatches(Vec<String>),
    /// No state change (duplicate child announcement).
    None,
}

/// Fold a node event into the session's report set and active-watch set.
///
/// Pure state transition: the session task owns the maps, the watch tasks
/// only send events. A `Children` announcement never yields a name that
/// already has a live watch, and `NoNodes` drops every report at once, so a
/// cleared set is published before any later event can repopulate it.
fn apply_event(
    reports: &mut BTreeMap<String, Report>,
    active: &mut HashSet<String>,
    event: NodeEvent,
) -> EventOutcome {
    match event {
        NodeEvent::Children(children) => {
            let new: Vec<String> = children
                .into_iter()
                .filter(|child| active.insert(child.clone()))
                .collect();
            if new.is_empty() {
                EventOutcome::None
            } else {
                EventOutcome::SpawnWatches(new)
            }
        }
        NodeEvent::NoNodes => {
            reports.clear();
            EventOutcome::Publish(Vec::new())
        }
        NodeEvent::Data(name, report) => {
            reports.insert(name, report);
            EventOutcome::Publish(reports.values().cloned().collect())
        }
        NodeEvent::Absent(name) => {
            reports.remove(&name);
            EventOutcome::Publish(reports.values().cloned().collect())
        }
    }
}

enum SessionEnd {
    Shutdown,
    Lost,
}

pub(super) async fn run(
    service: String,
    config: DiscoveryConfig,
    tx: watch::Sender<Vec<Report>>,
    mut stop: broadcast::Receiver<()>,
) {
    let cluster = config.hosts.join(",");
    let session_timeout = Duration::from_millis(config.timeout_ms);
    let mut backoff = RECONNECT_BACKOFF_MIN;

    loop {
        let mut connector = zk::Client::connector();
        connector.session_timeout(session_timeout);

        let client = tokio::select! {
            _ = stop.recv() => return,
            result = connector.connect(&cluster) => match result {
                Ok(client) => client,
                Err(e) => {
                    tracing::warn!(service = %service, error = %e, "ZooKeeper connection failed");
                    publish(&tx, Vec::new());
                    if sleep_or_stop(&mut stop, backoff).await {
                        return;
                    }
                    backoff = (backoff * 2).min(RECONNECT_BACKOFF_MAX);
                    continue;
                }
            }
        };
        backoff = RECONNECT_BACKOFF_MIN;
        tracing::info!(service = %service, path = %config.path, "ZooKeeper session established");

        let end = run_session(&service, &client, &config.path, &tx, &mut stop).await;

        // Whatever the session reported is void now.
        publish(&tx, Vec::new());
        match end {
            SessionEnd::Shutdown => return,
            SessionEnd::Lost => {
                tracing::warn!(service = %service, "ZooKeeper session lost, reconnecting");
            }
        }
    }
}

/// Drive one session: own the report set, apply node events, watch the
/// session state. Returns once the session is unusable or shutdown fired.
async fn run_session(
    service: &str,
    client: &zk::Client,
    path: &str,
    tx: &watch::Sender<Vec<Report>>,
    stop: &mut broadcast::Receiver<()>,
) -> SessionEnd {
    let (node_tx, mut node_rx) = mpsc::unbounded_channel();
    let session_stop = Shutdown::new();
    let mut reports: BTreeMap<String, Report> = BTreeMap::new();
    let mut active: HashSet<String> = HashSet::new();
    let mut child_tasks: JoinSet<String> = JoinSet::new();
    let mut state_watcher = client.state_watcher();

    let root_task = tokio::spawn(watch_root(
        service.to_string(),
        client.clone(),
        path.to_string(),
        node_tx.clone(),
        session_stop.subscribe(),
    ));

    loop {
        tokio::select! {
            _ = stop.recv() => {
                drain(&session_stop, root_task, &mut child_tasks, &mut node_rx).await;
                return SessionEnd::Shutdown;
            }
            state = state_watcher.changed() => {
                if !matches!(state, zk::SessionState::SyncConnected | zk::SessionState::ConnectedReadOnly) {
                    tracing::info!(service = %service, state = ?state, "ZooKeeper session no longer connected");
                    drain(&session_stop, root_task, &mut child_tasks, &mut node_rx).await;
                    return SessionEnd::Lost;
                }
            }
            Some(exited) = child_tasks.join_next(), if !child_tasks.is_empty() => {
                if let Ok(name) = exited {
                    active.remove(&name);
                }
            }
            event = node_rx.recv() => {
                // The session task holds a sender, so recv never yields None.
                let Some(event) = event else { continue };
                match apply_event(&mut reports, &mut active, event) {
                    EventOutcome::Publish(view) => publish(tx, view),
                    EventOutcome::SpawnWatches(children) => {
                        for child in children {
                            child_tasks.spawn(watch_node(
                                service.to_string(),
                                client.clone(),
                                format!("{}/{}", path, child),
                                child,
                                node_tx.clone(),
                                session_stop.subscribe(),
                            ));
                        }
                    }
                    EventOutcome::None => {}
                }
            }
        }
    }
}

/// Cancel every watch task of the session and discard whatever they had
/// already queued.
async fn drain(
    session_stop: &Shutdown,
    root_task: JoinHandle<()>,
    child_tasks: &mut JoinSet<String>,
    node_rx: &mut mpsc::UnboundedReceiver<NodeEvent>,
) {
    session_stop.trigger();
    if let Err(e) = root_task.await {
        tracing::warn!(error = %e, "Root watch task ended abnormally");
    }
    while child_tasks.join_next().await.is_some() {}
    while node_rx.try_recv().is_ok() {}
}

/// Watch the service path itself: wait for it to exist, then track its
/// children, re-reading on every root event.
async fn watch_root(
    service: String,
    client: zk::Client,
    path: String,
    events: mpsc::UnboundedSender<NodeEvent>,
    mut stop: broadcast::Receiver<()>,
) {
    loop {
        let (stat, exists_watcher) = match client.check_and_watch_stat(&path).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(service = %service, path = %path, error = %e, "Cannot watch service path");
                let _ = events.send(NodeEvent::NoNodes);
                if sleep_or_stop(&mut stop, WATCH_RETRY_DELAY).await {
                    return;
                }
                continue;
            }
        };

        if stat.is_none() {
            tracing::warn!(service = %service, path = %path, "Service path does not exist, waiting for creation");
            let _ = events.send(NodeEvent::NoNodes);
            tokio::select! {
                _ = stop.recv() => return,
                _ = exists_watcher.changed() => continue,
            }
        }

        let (children, _stat, root_watcher) = match client.get_and_watch_children(&path).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(service = %service, path = %path, error = %e, "Cannot watch service children");
                if sleep_or_stop(&mut stop, WATCH_RETRY_DELAY).await {
                    return;
                }
                continue;
            }
        };

        if children.is_empty() {
            let _ = events.send(NodeEvent::NoNodes);
        } else {
            let _ = events.send(NodeEvent::Children(children));
        }

        tokio::select! {
            _ = stop.recv() => return,
            event = root_watcher.changed() => {
                tracing::trace!(service = %service, event = ?event, "Root watch event");
                if event.event_type == zk::EventType::NodeDeleted {
                    let _ = events.send(NodeEvent::NoNodes);
                }
                // Everything else is a re-arm; loop re-reads and re-watches.
            }
        }
    }
}

/// Watch one child znode's data until it is deleted or the session ends.
async fn watch_node(
    service: String,
    client: zk::Client,
    node_path: String,
    name: String,
    events: mpsc::UnboundedSender<NodeEvent>,
    mut stop: broadcast::Receiver<()>,
) -> String {
    tracing::debug!(service = %service, node = %node_path, "New backend node watch");

    loop {
        let (data, _stat, watcher) = match client.get_and_watch_data(&node_path).await {
            Ok(result) => result,
            Err(e) => {
                // Probably died just after arrival.
                tracing::debug!(service = %service, node = %node_path, error = %e, "Backend node gone before watch");
                let _ = events.send(NodeEvent::Absent(name.clone()));
                return name;
            }
        };

        match Report::from_json(&data) {
            Ok(report) => {
                let _ = events.send(NodeEvent::Data(name.clone(), report));
            }
            Err(e) => {
                tracing::warn!(service = %service, node = %node_path, error = %e, "Ignoring unparseable registration");
                let _ = events.send(NodeEvent::Absent(name.clone()));
            }
        }

        tokio::select! {
            _ = stop.recv() => return name,
            event = watcher.changed() => {
                tracing::trace!(service = %service, node = %node_path, event = ?event, "Node watch event");
                if event.event_type == zk::EventType::NodeDeleted {
                    let _ = events.send(NodeEvent::Absent(name.clone()));
                    return name;
                }
                // Data changed or watch re-arm; loop re-reads.
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(host: &str) -> Report {
        Report {
            name: host.to_string(),
            host: host.to_string(),
            port: 80,
            ..Default::default()
        }
    }

    fn session_state(
        entries: &[(&str, &str)],
    ) -> (BTreeMap<String, Report>, HashSet<String>) {
        let mut reports = BTreeMap::new();
        let mut active = HashSet::new();
        for (child, host) in entries {
            reports.insert(child.to_string(), report(host));
            active.insert(child.to_string());
        }
        (reports, active)
    }

    #[test]
    fn test_no_nodes_clears_reports_and_publishes_empty() {
        let (mut reports, mut active) =
            session_state(&[("node-1", "10.0.0.1"), ("node-2", "10.0.0.2")]);

        let outcome = apply_event(&mut reports, &mut active, NodeEvent::NoNodes);

        assert_eq!(outcome, EventOutcome::Publish(Vec::new()));
        assert!(reports.is_empty());
    }

    #[test]
    fn test_children_spawns_only_unseen_watches() {
        let (mut reports, mut active) = session_state(&[("node-1", "10.0.0.1")]);

        let outcome = apply_event(
            &mut reports,
            &mut active,
            NodeEvent::Children(vec!["node-1".into(), "node-2".into()]),
        );
        assert_eq!(outcome, EventOutcome::SpawnWatches(vec!["node-2".into()]));

        // A repeated announcement must not produce duplicate watches.
        let outcome = apply_event(
            &mut reports,
            &mut active,
            NodeEvent::Children(vec!["node-1".into(), "node-2".into()]),
        );
        assert_eq!(outcome, EventOutcome::None);
    }

    #[test]
    fn test_data_and_absent_update_the_view() {
        let (mut reports, mut active) = session_state(&[]);

        let outcome = apply_event(
            &mut reports,
            &mut active,
            NodeEvent::Data("node-2".into(), report("10.0.0.2")),
        );
        assert_eq!(outcome, EventOutcome::Publish(vec![report("10.0.0.2")]));

        // The view is ordered by child name, not arrival order.
        let outcome = apply_event(
            &mut reports,
            &mut active,
            NodeEvent::Data("node-1".into(), report("10.0.0.1")),
        );
        assert_eq!(
            outcome,
            EventOutcome::Publish(vec![report("10.0.0.1"), report("10.0.0.2")])
        );

        let outcome = apply_event(&mut reports, &mut active, NodeEvent::Absent("node-1".into()));
        assert_eq!(outcome, EventOutcome::Publish(vec![report("10.0.0.2")]));

        // An unknown removal republishes the unchanged view.
        let outcome = apply_event(&mut reports, &mut active, NodeEvent::Absent("ghost".into()));
        assert_eq!(outcome, EventOutcome::Publish(vec![report("10.0.0.2")]));
    }

    #[test]
    fn test_cleared_set_is_observable_before_repopulation() {
        let (mut reports, mut active) =
            session_state(&[("node-1", "10.0.0.1"), ("node-2", "10.0.0.2")]);

        let cleared = apply_event(&mut reports, &mut active, NodeEvent::NoNodes);
        assert_eq!(cleared, EventOutcome::Publish(Vec::new()));

        // Anything arriving afterwards starts from the empty view.
        let outcome = apply_event(
            &mut reports,
            &mut active,
            NodeEvent::Data("node-1".into(), report("10.0.0.1")),
        );
        assert_eq!(outcome, EventOutcome::Publish(vec![report("10.0.0.1")]));
    }

    #[tokio::test]
    async fn test_drain_cancels_tasks_and_discards_queued_events() {
        let session_stop = Shutdown::new();
        let (node_tx, mut node_rx) = mpsc::unbounded_channel();

        let mut root_stop = session_stop.subscribe();
        let root_task = tokio::spawn(async move {
            let _ = root_stop.recv().await;
        });

        let mut child_tasks: JoinSet<String> = JoinSet::new();
        let mut child_stop = session_stop.subscribe();
        child_tasks.spawn(async move {
            let _ = child_stop.recv().await;
            "node-1".to_string()
        });

        // Events already in flight when the session ends must be discarded,
        // never replayed into the next session.
        node_tx
            .send(NodeEvent::Data("node-1".into(), report("10.0.0.1")))
            .unwrap();

        drain(&session_stop, root_task, &mut child_tasks, &mut node_rx).await;

        assert!(child_tasks.is_empty());
        assert!(node_rx.try_recv().is_err());
    }
}
