//! Desired-state model: backends, servers, snapshots.
//!
//! Ordering is a contract here. Backends are sorted by name and servers by
//! (name, host, port); default and discovered servers participate in the same
//! sort. The differ and the config writer both rely on this determinism to
//! tell reorder-noise apart from real change.

use serde::{Deserialize, Serialize};

/// One upstream server inside a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Server {
    pub name: String,
    pub host: String,
    pub port: u16,

    /// Rendered as a trailing `disabled` keyword and driven at runtime over
    /// the admin socket.
    pub disabled: bool,

    pub weight: u8,

    /// Per-server options appended after the backend-wide server options.
    pub extra_options: String,
}

/// A named group of upstream servers the proxy dispatches to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Backend {
    pub name: String,
    pub port: u16,
    pub server_options: String,
    pub listen: Vec<String>,
    pub servers: Vec<Server>,
}

/// The totally-ordered desired-state view for one reconcile tick.
pub type Snapshot = Vec<Backend>;

impl Backend {
    /// Restore the canonical server order.
    pub fn sort_servers(&mut self) {
        self.servers.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then_with(|| a.host.cmp(&b.host))
                .then_with(|| a.port.cmp(&b.port))
        });
    }
}

/// Restore the canonical backend order.
pub fn sort_backends(backends: &mut Snapshot) {
    backends.sort_by(|a, b| a.name.cmp(&b.name));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(name: &str, host: &str, port: u16) -> Server {
        Server {
            name: name.into(),
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    #[test]
    fn test_servers_sort_by_name_host_port() {
        let mut backend = Backend {
            name: "web".into(),
            servers: vec![
                server("b", "10.0.0.1", 80),
                server("a", "10.0.0.2", 80),
                server("a", "10.0.0.1", 81),
                server("a", "10.0.0.1", 80),
            ],
            ..Default::default()
        };
        backend.sort_servers();

        let order: Vec<(&str, &str, u16)> = backend
            .servers
            .iter()
            .map(|s| (s.name.as_str(), s.host.as_str(), s.port))
            .collect();
        assert_eq!(
            order,
            vec![
                ("a", "10.0.0.1", 80),
                ("a", "10.0.0.1", 81),
                ("a", "10.0.0.2", 80),
                ("b", "10.0.0.1", 80),
            ]
        );
    }

    #[test]
    fn test_backends_sort_by_name() {
        let mut backends = vec![
            Backend { name: "web".into(), ..Default::default() },
            Backend { name: "api".into(), ..Default::default() },
        ];
        sort_backends(&mut backends);
        assert_eq!(backends[0].name, "api");
        assert_eq!(backends[1].name, "web");
    }

    #[test]
    fn test_snapshot_round_trips_through_json() {
        let snapshot: Snapshot = vec![Backend {
            name: "web".into(),
            port: 3212,
            server_options: "check inter 2s".into(),
            listen: vec!["mode http".into()],
            servers: vec![server("a", "10.0.0.1", 80)],
        }];
        let json = serde_json::to_string(&snapshot).unwrap();
        let decoded: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, snapshot);
    }
}
