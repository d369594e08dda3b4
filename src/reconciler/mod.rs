//! Reconciler: the top-level driver.
//!
//! # Data Flow
//! ```text
//! init:  start discovery sources, adopt persisted state if fresh
//! loop:  every write_interval_ms
//!            sample sources → assemble candidate
//!            classify against applied snapshot
//!            apply via effector
//!            on success: adopt candidate, persist state
//! stop:  shutdown signal → join sources → exit
//! ```
//!
//! Nothing in the steady-state loop is fatal: a failed tick keeps the
//! previous applied snapshot and the next tick retries.

use std::time::Duration;

use tokio::sync::broadcast;

use crate::config::{DaemonConfig, ServiceConfig};
use crate::discovery::{DiscoverySource, Report};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::proxy::{assemble, classify, Delta, Effector, Snapshot, StateStore};

struct Service {
    config: ServiceConfig,
    source: DiscoverySource,
}

/// Owns the applied snapshot and drives the reconcile loop.
pub struct Reconciler {
    services: Vec<Service>,
    effector: Effector,
    store: Option<StateStore>,
    interval: Duration,
    applied: Snapshot,
    stop: broadcast::Receiver<()>,
}

impl Reconciler {
    /// Start one discovery source per configured service and wire everything
    /// to the shutdown signal. Subscribes before returning, so a signal
    /// triggered any time after `new` is never missed.
    pub fn new(config: &DaemonConfig, shutdown: &Shutdown) -> Self {
        let services = config
            .services
            .iter()
            .map(|service| Service {
                source: DiscoverySource::spawn(&service.name, &service.discovery, shutdown),
                config: service.clone(),
            })
            .collect();

        Self {
            services,
            effector: Effector::new(config.haproxy.clone()),
            store: StateStore::new(&config.haproxy.state_file_path),
            interval: Duration::from_millis(config.write_interval_ms),
            applied: Vec::new(),
            stop: shutdown.subscribe(),
        }
    }

    /// Run until the shutdown signal fires.
    pub async fn run(mut self) {
        if let Some(store) = &self.store {
            match store.load() {
                Ok(Some(snapshot)) => {
                    tracing::info!(backends = snapshot.len(), "Adopted persisted state");
                    self.applied = snapshot;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Cannot load persisted state, starting empty");
                }
            }
        }

        loop {
            self.tick().await;

            tokio::select! {
                _ = self.stop.recv() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        tracing::info!("Reconciler stopping");
        for service in self.services {
            service.source.stop().await;
        }
    }

    async fn tick(&mut self) {
        metrics::record_tick();

        let inputs: Vec<(&ServiceConfig, Vec<Report>)> = self
            .services
            .iter()
            .map(|service| (&service.config, service.source.current()))
            .collect();
        let candidate = assemble(&inputs);

        let delta = match classify(&self.applied, &candidate, self.services.len()) {
            Ok(delta) => delta,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping tick, keeping last valid state");
                metrics::record_tick_skipped();
                return;
            }
        };

        if delta == Delta::NoChange {
            tracing::trace!("No modification since last check");
            return;
        }

        tracing::debug!(structural = matches!(delta, Delta::Structural), "Backends modified");
        match self.effector.apply(&delta, &candidate).await {
            Ok(()) => {
                for backend in &candidate {
                    metrics::record_backend_servers(&backend.name, backend.servers.len());
                }
                self.applied = candidate;
                if let Some(store) = &self.store {
                    if let Err(e) = store.save(&self.applied) {
                        tracing::warn!(error = %e, "Cannot persist applied state");
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Cannot apply backend changes, keeping previous state");
            }
        }
    }
}
