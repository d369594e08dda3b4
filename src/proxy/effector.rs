//! Effector: apply a classified delta to the proxy with the minimum-impact
//! action.
//!
//! # Data Flow
//! ```text
//! Structural:      write config file → reload
//! EnableDisable:   write config file → socket commands
//!                                          └─ on failure or do_socket off: reload
//! NoChange:        nothing
//! ```
//!
//! Three independent gate flags short-circuit their action: `do_writes`,
//! `do_reloads`, `do_socket`. A gated-off action logs and counts as success.
//! The config file is rewritten even for a pure enable/disable delta so that
//! a proxy restarted outside our control re-reads the same state.

use thiserror::Error;
use tokio::process::Command;

use crate::config::HaproxyConfig;
use crate::observability::metrics;
use crate::proxy::backend::Snapshot;
use crate::proxy::diff::Delta;
use crate::proxy::{socket, writer};

/// Error type for effector passes. Socket failures never surface here; they
/// are consumed by the in-tick fallback reload.
#[derive(Debug, Error)]
pub enum EffectorError {
    #[error("cannot write configuration file: {0}")]
    Write(std::io::Error),

    #[error("cannot run reload command: {0}")]
    Reload(std::io::Error),

    #[error("reload command exited with {0}")]
    ReloadStatus(std::process::ExitStatus),
}

/// Applies classified deltas against one HAProxy instance.
pub struct Effector {
    config: HaproxyConfig,
}

impl Effector {
    pub fn new(config: HaproxyConfig) -> Self {
        Self { config }
    }

    /// Apply `delta` for `snapshot`. On `Ok(())` the caller may adopt the
    /// snapshot as applied; on error it must keep the previous one and retry
    /// next tick.
    pub async fn apply(&self, delta: &Delta, snapshot: &Snapshot) -> Result<(), EffectorError> {
        match delta {
            Delta::NoChange => Ok(()),
            Delta::Structural => {
                self.write_config(snapshot).await?;
                self.reload().await
            }
            Delta::EnableDisable(commands) => {
                self.write_config(snapshot).await?;

                if !self.config.do_socket {
                    tracing::debug!("Socket updates disabled by do_socket flag, reloading instead");
                    return self.reload().await;
                }

                match socket::send_commands(&self.config.socket_file_path, commands).await {
                    Ok(()) => {
                        metrics::record_socket_commands(commands.len() as u64);
                        tracing::info!(commands = commands.len(), "Server states updated over admin socket");
                        Ok(())
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Admin socket pass failed, falling back to reload");
                        metrics::record_socket_fallback();
                        self.reload().await
                    }
                }
            }
        }
    }

    async fn write_config(&self, snapshot: &Snapshot) -> Result<(), EffectorError> {
        if !self.config.do_writes {
            tracing::debug!("Config write disabled by do_writes flag");
            return Ok(());
        }

        let contents = writer::render(&self.config, snapshot);
        writer::write_file(&self.config.config_file_path, &contents)
            .await
            .map_err(EffectorError::Write)?;

        metrics::record_config_write();
        tracing::debug!(path = %self.config.config_file_path, "Configuration file written");
        Ok(())
    }

    async fn reload(&self) -> Result<(), EffectorError> {
        if !self.config.do_reloads {
            tracing::debug!("Reload disabled by do_reloads flag");
            return Ok(());
        }

        let command = &self.config.reload_command;
        let status = Command::new(&command.binary)
            .args(&command.arguments)
            .status()
            .await
            .map_err(EffectorError::Reload)?;

        if !status.success() {
            return Err(EffectorError::ReloadStatus(status));
        }

        metrics::record_reload();
        tracing::info!("HAProxy reloaded");
        Ok(())
    }
}
