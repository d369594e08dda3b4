//! Snapshot assembly: merge configured defaults with discovered reports into
//! the canonical desired-state view.
//!
//! Pure function of its inputs. Same inputs must produce the same snapshot,
//! down to the byte once rendered; the differ and the reload-avoidance logic
//! depend on it.

use crate::config::ServiceConfig;
use crate::discovery::Report;
use crate::proxy::backend::{sort_backends, Backend, Server, Snapshot};

/// Build the candidate snapshot for one tick.
///
/// Default servers join with `disabled=false, weight=0` and no extra options;
/// discovered reports join with `disabled` tracking their maintenance flag.
/// Both participate in the same (name, host, port) sort.
pub fn assemble(inputs: &[(&ServiceConfig, Vec<Report>)]) -> Snapshot {
    let mut backends: Snapshot = inputs
        .iter()
        .map(|(service, reports)| {
            let mut backend = Backend {
                name: service.name.clone(),
                port: service.haproxy.port,
                server_options: service.haproxy.server_options.clone(),
                listen: service.haproxy.listen.clone(),
                servers: Vec::with_capacity(service.default_servers.len() + reports.len()),
            };

            for server in &service.default_servers {
                backend.servers.push(Server {
                    name: server.name.clone(),
                    host: server.host.clone(),
                    port: server.port,
                    disabled: false,
                    weight: 0,
                    extra_options: String::new(),
                });
            }

            for report in reports {
                backend.servers.push(Server {
                    name: report.name.clone(),
                    host: report.host.clone(),
                    port: report.port,
                    disabled: report.maintenance,
                    weight: report.weight,
                    extra_options: report.extra_options.clone(),
                });
            }

            backend.sort_servers();
            backend
        })
        .collect();

    sort_backends(&mut backends);
    backends
}
