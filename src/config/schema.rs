//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the daemon.
//! All types derive Serde traits for deserialization from the JSON config
//! file; every field has a default so minimal configs stay minimal.

use serde::{Deserialize, Serialize};

/// Root configuration for the daemon.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Opaque instance label, only used in logs.
    pub instance_id: String,

    /// Log verbosity (trace, debug, info, warn, error).
    #[serde(rename = "log-level")]
    pub log_level: String,

    /// Reconcile tick interval in milliseconds.
    pub write_interval_ms: u64,

    /// Optional Prometheus exporter bind address.
    pub metrics_address: Option<String>,

    /// Services whose backends are watched and synchronized.
    pub services: Vec<ServiceConfig>,

    /// HAProxy effector configuration.
    pub haproxy: HaproxyConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            instance_id: String::new(),
            log_level: String::new(),
            write_interval_ms: 1000,
            metrics_address: None,
            services: Vec::new(),
            haproxy: HaproxyConfig::default(),
        }
    }
}

/// One watched service: a discovery source plus HAProxy parameters.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Service name; becomes the backend name in the generated config.
    pub name: String,

    /// Servers always present in the backend, regardless of discovery.
    pub default_servers: Vec<DefaultServerConfig>,

    /// Where the dynamic server set comes from.
    pub discovery: DiscoveryConfig,

    /// Per-service HAProxy parameters.
    pub haproxy: ServiceHaproxyConfig,
}

/// A statically configured server entry.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DefaultServerConfig {
    pub name: String,
    pub host: String,
    pub port: u16,
}

/// Discovery source selection and parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Which variant to run.
    #[serde(rename = "type")]
    pub kind: DiscoveryKind,

    /// Watched directory (filesystem) or service znode path (zookeeper).
    pub path: String,

    /// `host:port` endpoints: the fixed set (static) or the ensemble
    /// members (zookeeper).
    pub hosts: Vec<String>,

    /// ZooKeeper session timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            kind: DiscoveryKind::Static,
            path: String::new(),
            hosts: Vec::new(),
            timeout_ms: 2000,
        }
    }
}

/// Discovery variant tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryKind {
    #[default]
    Static,
    Filesystem,
    Zookeeper,
}

/// Per-service HAProxy parameters.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceHaproxyConfig {
    /// Port the generated backend binds.
    pub port: u16,

    /// Options appended to every server line of this backend.
    pub server_options: String,

    /// Extra lines inserted after the bind directive.
    pub listen: Vec<String>,
}

/// HAProxy effector configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HaproxyConfig {
    /// Command invoked to reload the proxy daemon.
    pub reload_command: ReloadCommandConfig,

    /// Where the generated configuration file is written.
    pub config_file_path: String,

    /// HAProxy admin socket path.
    pub socket_file_path: String,

    /// Where the applied snapshot is persisted. Empty disables persistence.
    pub state_file_path: String,

    /// Gate: write the configuration file.
    pub do_writes: bool,

    /// Gate: invoke the reload command.
    pub do_reloads: bool,

    /// Gate: apply enable/disable deltas over the admin socket.
    pub do_socket: bool,

    /// Lines of the generated `global` section.
    pub global: Vec<String>,

    /// Lines of the generated `defaults` section.
    pub defaults: Vec<String>,

    /// Verbatim extra sections appended after `defaults`.
    pub extra_sections: Vec<ExtraSectionConfig>,
}

/// Reload command: binary plus arguments.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ReloadCommandConfig {
    pub binary: String,
    pub arguments: Vec<String>,
}

/// An opaque configuration section copied into the generated file.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ExtraSectionConfig {
    /// Section header line, e.g. `listen stats`.
    pub head: String,

    /// Indented body lines.
    pub content: Vec<String>,
}
