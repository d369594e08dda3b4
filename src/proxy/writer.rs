//! Configuration file rendering and writing.
//!
//! Rendering is a pure function of the proxy configuration and the snapshot,
//! and must be byte-identical for identical inputs: the restart-avoidance
//! logic compares snapshots, and any nondeterminism here (ordering,
//! timestamps) would turn into spurious reloads.

use std::os::unix::fs::PermissionsExt;

use crate::config::HaproxyConfig;
use crate::proxy::backend::Snapshot;

/// Render the full HAProxy configuration file.
pub fn render(config: &HaproxyConfig, snapshot: &Snapshot) -> String {
    let mut out = String::new();

    out.push_str("#\n");
    out.push_str("# HAProxy configuration generated by backsync\n");
    out.push_str("# Do not edit, changes are overwritten on the next reconcile\n");
    out.push_str("#\n\n");

    out.push_str("global\n");
    for line in &config.global {
        out.push_str("  ");
        out.push_str(line);
        out.push('\n');
    }

    out.push_str("\ndefaults\n");
    for line in &config.defaults {
        out.push_str("  ");
        out.push_str(line);
        out.push('\n');
    }
    out.push('\n');

    for section in &config.extra_sections {
        out.push_str(&section.head);
        out.push('\n');
        for line in &section.content {
            out.push_str("  ");
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
    }

    for backend in snapshot {
        out.push_str("backend ");
        out.push_str(&backend.name);
        out.push('\n');
        out.push_str("  bind ");
        out.push_str(&backend.port.to_string());
        out.push('\n');
        for line in &backend.listen {
            out.push_str("  ");
            out.push_str(line);
            out.push('\n');
        }
        for server in &backend.servers {
            out.push_str("  server ");
            out.push_str(&server.name);
            out.push(' ');
            out.push_str(&server.host);
            out.push(':');
            out.push_str(&server.port.to_string());
            out.push(' ');
            out.push_str(&backend.server_options);
            if !server.extra_options.is_empty() {
                out.push(' ');
                out.push_str(&server.extra_options);
            }
            if server.disabled {
                out.push_str(" disabled");
            }
            out.push('\n');
        }
        out.push('\n');
    }

    out
}

/// Write the rendered file with owner rw, group/world read.
pub async fn write_file(path: &str, contents: &str) -> std::io::Result<()> {
    tokio::fs::write(path, contents).await?;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644)).await
}
