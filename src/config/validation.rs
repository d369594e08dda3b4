//! Configuration validation logic.

use std::collections::HashSet;

use crate::config::schema::{DaemonConfig, DiscoveryKind};

/// Error type for configuration validation failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError(pub String);

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Validation error: {}", self.0)
    }
}

/// Validate a DaemonConfig for semantic correctness.
pub fn validate_config(config: &DaemonConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.services.is_empty() {
        errors.push(ValidationError("at least one service is required".to_string()));
    }

    let mut seen_names: HashSet<&str> = HashSet::new();
    for service in &config.services {
        if service.name.is_empty() {
            errors.push(ValidationError("service name must not be empty".to_string()));
            continue;
        }
        if !seen_names.insert(service.name.as_str()) {
            errors.push(ValidationError(format!(
                "duplicate service name '{}'",
                service.name
            )));
        }

        for server in &service.default_servers {
            if server.name.is_empty() {
                errors.push(ValidationError(format!(
                    "service '{}': default server name must not be empty",
                    service.name
                )));
            }
            if server.port == 0 {
                errors.push(ValidationError(format!(
                    "service '{}': default server '{}' has port 0",
                    service.name, server.name
                )));
            }
        }

        match service.discovery.kind {
            DiscoveryKind::Static => {
                if service.discovery.hosts.is_empty() && service.default_servers.is_empty() {
                    errors.push(ValidationError(format!(
                        "service '{}': static discovery with no hosts and no default servers",
                        service.name
                    )));
                }
            }
            DiscoveryKind::Filesystem => {
                if service.discovery.path.is_empty() {
                    errors.push(ValidationError(format!(
                        "service '{}': filesystem discovery requires a path",
                        service.name
                    )));
                }
            }
            DiscoveryKind::Zookeeper => {
                if service.discovery.path.is_empty() {
                    errors.push(ValidationError(format!(
                        "service '{}': zookeeper discovery requires a path",
                        service.name
                    )));
                }
                if service.discovery.hosts.is_empty() {
                    errors.push(ValidationError(format!(
                        "service '{}': zookeeper discovery requires ensemble hosts",
                        service.name
                    )));
                }
            }
        }
    }

    let haproxy = &config.haproxy;
    if haproxy.do_writes && haproxy.config_file_path.is_empty() {
        errors.push(ValidationError(
            "haproxy.config_file_path is required when do_writes is set".to_string(),
        ));
    }
    if haproxy.do_reloads && haproxy.reload_command.binary.is_empty() {
        errors.push(ValidationError(
            "haproxy.reload_command.binary is required when do_reloads is set".to_string(),
        ));
    }
    if haproxy.do_socket && haproxy.socket_file_path.is_empty() {
        errors.push(ValidationError(
            "haproxy.socket_file_path is required when do_socket is set".to_string(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
