//! Static discovery: a fixed server set taken from the configuration.
//!
//! The change signal fires once at startup; afterwards the task only waits
//! for shutdown.

use tokio::sync::{broadcast, watch};

use super::{publish, Report};

/// Parse the configured `host:port` endpoints, dropping invalid entries.
pub(super) fn parse(service: &str, endpoints: &[String]) -> Vec<Report> {
    let mut reports = Vec::new();
    for endpoint in endpoints {
        match Report::from_endpoint(endpoint) {
            Ok(report) => reports.push(report),
            Err(e) => {
                tracing::warn!(
                    service = %service,
                    endpoint = %endpoint,
                    error = %e,
                    "Ignoring invalid static endpoint"
                );
            }
        }
    }
    reports
}

pub(super) async fn run(
    service: String,
    endpoints: Vec<String>,
    tx: watch::Sender<Vec<Report>>,
    mut stop: broadcast::Receiver<()>,
) {
    let reports = parse(&service, &endpoints);
    tracing::debug!(service = %service, servers = reports.len(), "Static server set loaded");
    publish(&tx, reports);

    let _ = stop.recv().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;

    #[tokio::test]
    async fn test_static_set_published_once() {
        let shutdown = Shutdown::new();
        let (tx, mut rx) = watch::channel(Vec::new());
        let task = tokio::spawn(run(
            "web".into(),
            vec!["10.0.0.1:80".into(), "bogus".into()],
            tx,
            shutdown.subscribe(),
        ));

        rx.changed().await.unwrap();
        let reports = rx.borrow().clone();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].host, "10.0.0.1");

        shutdown.trigger();
        task.await.unwrap();
    }
}
