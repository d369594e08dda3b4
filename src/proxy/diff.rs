//! Snapshot comparison: classify change as socket-reconfigurable or
//! reload-required.
//!
//! Both snapshots are canonically ordered, so comparison is positional. Only
//! a pure flip of per-server `disabled` flags can be applied over the admin
//! socket; everything else needs the proxy to re-read its configuration.

use thiserror::Error;

use crate::proxy::backend::Snapshot;

/// Classification of the delta between the applied and candidate snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delta {
    /// Snapshots are identical; nothing to do.
    NoChange,

    /// Only `disabled` flags differ; the ordered admin-socket commands to
    /// apply, one per flipped server.
    EnableDisable(Vec<String>),

    /// Anything else: the configuration file must be rewritten and the proxy
    /// reloaded.
    Structural,
}

/// Error type for snapshot comparison.
#[derive(Debug, Error)]
pub enum DiffError {
    /// The candidate does not carry one backend per configured service; the
    /// tick is skipped and the last good state preserved.
    #[error("{candidate} backends to apply != {configured} configured services")]
    BackendCount { candidate: usize, configured: usize },
}

/// Compare the applied snapshot against the candidate.
pub fn classify(
    applied: &Snapshot,
    candidate: &Snapshot,
    configured_services: usize,
) -> Result<Delta, DiffError> {
    if candidate.len() != configured_services {
        return Err(DiffError::BackendCount {
            candidate: candidate.len(),
            configured: configured_services,
        });
    }

    if applied.len() != candidate.len() {
        return Ok(Delta::Structural);
    }

    let mut commands = Vec::new();
    for (prev, next) in applied.iter().zip(candidate) {
        if prev.name != next.name
            || prev.port != next.port
            || prev.server_options != next.server_options
            || prev.listen != next.listen
        {
            return Ok(Delta::Structural);
        }
        if prev.servers.len() != next.servers.len() {
            return Ok(Delta::Structural);
        }
        for (old, new) in prev.servers.iter().zip(&next.servers) {
            if old.name != new.name
                || old.host != new.host
                || old.port != new.port
                || old.weight != new.weight
                || old.extra_options != new.extra_options
            {
                return Ok(Delta::Structural);
            }
            if old.disabled != new.disabled {
                let command = if new.disabled {
                    format!("disable server {}/{}", next.name, new.name)
                } else {
                    format!("enable server {}/{}", next.name, new.name)
                };
                tracing::debug!(command = %command, "Server state flip");
                commands.push(command);
            }
        }
    }

    if commands.is_empty() {
        Ok(Delta::NoChange)
    } else {
        Ok(Delta::EnableDisable(commands))
    }
}
