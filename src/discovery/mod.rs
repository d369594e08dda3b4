//! Discovery subsystem: one source per service, each publishing the current
//! set of registered upstream servers.
//!
//! # Data Flow
//! ```text
//! external origin (config / directory / zookeeper)
//!     → source task (owns the report set)
//!     → watch channel (point-in-time copies, level-triggered change signal)
//!     → reconciler samples current() at tick boundaries
//! ```
//!
//! # Design Decisions
//! - Each source task is the only mutator of its report set; readers get
//!   copies through the watch channel, nothing shared is mutable
//! - The set is only published when it actually mutates, so the change
//!   signal stays level-triggered
//! - A failing origin reports the empty set until it recovers

pub mod directory;
pub mod fixed;
pub mod zookeeper;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::config::{DiscoveryConfig, DiscoveryKind};
use crate::lifecycle::Shutdown;

/// What a discovery origin says about one registered server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Report {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub weight: u8,

    /// Registered but taken out of rotation; maps to a disabled server.
    pub maintenance: bool,

    /// Per-server options to append to the generated server line.
    pub extra_options: String,
}

/// Error type for report parsing.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("report has no host")]
    MissingHost,

    #[error("report has no port")]
    MissingPort,

    #[error("invalid endpoint '{0}', expected host:port")]
    Endpoint(String),
}

impl Report {
    /// Parse a JSON registration payload (discovery file or znode content).
    ///
    /// A report without a host or port is invalid. A report without a name
    /// falls back to `host:port`, matching what registrars publish when the
    /// instance name is left empty.
    pub fn from_json(bytes: &[u8]) -> Result<Report, ReportError> {
        let mut report: Report = serde_json::from_slice(bytes)?;
        if report.host.is_empty() {
            return Err(ReportError::MissingHost);
        }
        if report.port == 0 {
            return Err(ReportError::MissingPort);
        }
        if report.name.is_empty() {
            report.name = format!("{}:{}", report.host, report.port);
        }
        Ok(report)
    }

    /// Parse a `host:port` endpoint from the static host list.
    pub fn from_endpoint(endpoint: &str) -> Result<Report, ReportError> {
        let (host, port) = endpoint
            .rsplit_once(':')
            .ok_or_else(|| ReportError::Endpoint(endpoint.to_string()))?;
        let port: u16 = port
            .parse()
            .map_err(|_| ReportError::Endpoint(endpoint.to_string()))?;
        if host.is_empty() || port == 0 {
            return Err(ReportError::Endpoint(endpoint.to_string()));
        }
        Ok(Report {
            name: endpoint.to_string(),
            host: host.to_string(),
            port,
            ..Default::default()
        })
    }
}

/// Handle to a running discovery source.
///
/// The background task is started by [`DiscoverySource::spawn`] and runs
/// until the shutdown signal fires; [`DiscoverySource::stop`] then joins it.
pub struct DiscoverySource {
    reports: watch::Receiver<Vec<Report>>,
    task: JoinHandle<()>,
}

impl DiscoverySource {
    /// Start the background task for the configured variant.
    pub fn spawn(service: &str, config: &DiscoveryConfig, shutdown: &Shutdown) -> Self {
        let (tx, rx) = watch::channel(Vec::new());
        let service = service.to_string();
        let stop = shutdown.subscribe();

        // Local origins are primed synchronously so the first reconcile tick
        // never observes an empty set that a moment later turns into the real
        // one (and costs a spurious reload). ZooKeeper stays empty until its
        // session is up.
        let task = match config.kind {
            DiscoveryKind::Static => {
                publish(&tx, fixed::parse(&service, &config.hosts));
                tokio::spawn(fixed::run(service, config.hosts.clone(), tx, stop))
            }
            DiscoveryKind::Filesystem => {
                let dir: std::path::PathBuf = config.path.clone().into();
                publish(&tx, directory::scan(&service, &dir));
                tokio::spawn(directory::run(service, dir, tx, stop))
            }
            DiscoveryKind::Zookeeper => {
                tokio::spawn(zookeeper::run(service, config.clone(), tx, stop))
            }
        };

        Self { reports: rx, task }
    }

    /// Point-in-time copy of the current report set.
    pub fn current(&self) -> Vec<Report> {
        self.reports.borrow().clone()
    }

    /// Level-triggered change signal; `changed().await` on the returned
    /// receiver resolves whenever the set mutates.
    pub fn watch(&self) -> watch::Receiver<Vec<Report>> {
        self.reports.clone()
    }

    /// Await task exit. The shutdown signal passed at spawn time must have
    /// been triggered first.
    pub async fn stop(self) {
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Discovery task ended abnormally");
        }
    }
}

/// Publish a new report set, signalling watchers only on real change.
pub(crate) fn publish(tx: &watch::Sender<Vec<Report>>, reports: Vec<Report>) {
    tx.send_if_modified(|current| {
        if *current == reports {
            false
        } else {
            *current = reports;
            true
        }
    });
}

/// Sleep that aborts early on shutdown; returns true if shutdown fired.
pub(crate) async fn sleep_or_stop(
    stop: &mut broadcast::Receiver<()>,
    duration: std::time::Duration,
) -> bool {
    tokio::select! {
        _ = stop.recv() => true,
        _ = tokio::time::sleep(duration) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_name_falls_back_to_endpoint() {
        let report = Report::from_json(br#"{"host": "10.0.0.1", "port": 80}"#).unwrap();
        assert_eq!(report.name, "10.0.0.1:80");
        assert!(!report.maintenance);
        assert_eq!(report.weight, 0);
    }

    #[test]
    fn test_report_requires_host_and_port() {
        assert!(matches!(
            Report::from_json(br#"{"port": 80}"#),
            Err(ReportError::MissingHost)
        ));
        assert!(matches!(
            Report::from_json(br#"{"host": "10.0.0.1"}"#),
            Err(ReportError::MissingPort)
        ));
        assert!(matches!(Report::from_json(b"nonsense"), Err(ReportError::Json(_))));
    }

    #[test]
    fn test_report_full_payload() {
        let report = Report::from_json(
            br#"{"name": "a", "host": "10.0.0.1", "port": 80,
                 "weight": 10, "maintenance": true, "extra_options": "backup"}"#,
        )
        .unwrap();
        assert_eq!(report.name, "a");
        assert_eq!(report.weight, 10);
        assert!(report.maintenance);
        assert_eq!(report.extra_options, "backup");
    }

    #[test]
    fn test_endpoint_parsing() {
        let report = Report::from_endpoint("10.0.0.1:8080").unwrap();
        assert_eq!(report.host, "10.0.0.1");
        assert_eq!(report.port, 8080);
        assert_eq!(report.name, "10.0.0.1:8080");

        assert!(Report::from_endpoint("10.0.0.1").is_err());
        assert!(Report::from_endpoint(":80").is_err());
        assert!(Report::from_endpoint("host:notaport").is_err());
    }

    #[test]
    fn test_publish_signals_only_on_change() {
        let (tx, rx) = watch::channel(Vec::new());
        let report = Report::from_endpoint("10.0.0.1:80").unwrap();

        publish(&tx, vec![report.clone()]);
        assert!(rx.has_changed().unwrap());

        let mut rx = rx;
        rx.mark_unchanged();
        publish(&tx, vec![report]);
        assert!(!rx.has_changed().unwrap());
    }
}
