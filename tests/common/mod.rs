//! Shared utilities for integration testing.
//!
//! Each test gets a scratch directory holding the discovery directory, the
//! generated HAProxy config, the state file, a fake admin socket, and a
//! reload "command" that appends a line to a marker file so tests can count
//! invocations.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use backsync::config::schema::{
    DaemonConfig, DiscoveryConfig, DiscoveryKind, HaproxyConfig, ReloadCommandConfig,
    ServiceConfig, ServiceHaproxyConfig,
};
use backsync::lifecycle::Shutdown;
use backsync::reconciler::Reconciler;

pub struct TestEnv {
    pub dir: tempfile::TempDir,
    pub discovery_dir: PathBuf,
    pub haproxy_cfg: PathBuf,
    pub reload_marker: PathBuf,
    pub admin_socket: PathBuf,
    pub state_file: PathBuf,
}

pub fn test_env() -> TestEnv {
    let dir = tempfile::tempdir().unwrap();
    let discovery_dir = dir.path().join("discovery");
    std::fs::create_dir(&discovery_dir).unwrap();
    TestEnv {
        discovery_dir,
        haproxy_cfg: dir.path().join("haproxy.cfg"),
        reload_marker: dir.path().join("reloads"),
        admin_socket: dir.path().join("admin.sock"),
        state_file: dir.path().join("state.json"),
        dir,
    }
}

impl TestEnv {
    /// One filesystem-discovered service `web`, all gates on, 50ms ticks.
    pub fn daemon_config(&self) -> DaemonConfig {
        DaemonConfig {
            instance_id: "test".into(),
            write_interval_ms: 50,
            services: vec![ServiceConfig {
                name: "web".into(),
                default_servers: vec![],
                discovery: DiscoveryConfig {
                    kind: DiscoveryKind::Filesystem,
                    path: self.discovery_dir.to_str().unwrap().into(),
                    ..Default::default()
                },
                haproxy: ServiceHaproxyConfig {
                    port: 3212,
                    server_options: "check".into(),
                    listen: vec![],
                },
            }],
            haproxy: HaproxyConfig {
                reload_command: ReloadCommandConfig {
                    binary: "/bin/sh".into(),
                    arguments: vec![
                        "-c".into(),
                        format!("echo reload >> {}", self.reload_marker.display()),
                    ],
                },
                config_file_path: self.haproxy_cfg.to_str().unwrap().into(),
                socket_file_path: self.admin_socket.to_str().unwrap().into(),
                state_file_path: self.state_file.to_str().unwrap().into(),
                do_writes: true,
                do_reloads: true,
                do_socket: true,
                global: vec!["daemon".into()],
                defaults: vec!["mode http".into()],
                extra_sections: vec![],
            },
            ..Default::default()
        }
    }

    pub fn write_report(&self, file: &str, json: &str) {
        std::fs::write(self.discovery_dir.join(file), json).unwrap();
    }

    pub fn remove_report(&self, file: &str) {
        std::fs::remove_file(self.discovery_dir.join(file)).unwrap();
    }

    pub fn reload_count(&self) -> usize {
        std::fs::read_to_string(&self.reload_marker)
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }

    pub fn haproxy_cfg(&self) -> String {
        std::fs::read_to_string(&self.haproxy_cfg).unwrap_or_default()
    }
}

/// Fake HAProxy admin endpoint: answers every command line with `response`
/// and forwards the received commands to the returned channel.
pub fn start_admin_socket(
    path: &Path,
    response: &'static str,
) -> mpsc::UnboundedReceiver<String> {
    let listener = UnixListener::bind(path).unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                let (read, mut write) = stream.into_split();
                let mut lines = BufReader::new(read).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let _ = tx.send(line);
                    if write.write_all(response.as_bytes()).await.is_err() {
                        break;
                    }
                }
            });
        }
    });

    rx
}

pub struct RunningDaemon {
    shutdown: Shutdown,
    task: JoinHandle<()>,
}

pub fn start_daemon(config: &DaemonConfig) -> RunningDaemon {
    let shutdown = Shutdown::new();
    let reconciler = Reconciler::new(config, &shutdown);
    let task = tokio::spawn(reconciler.run());
    RunningDaemon { shutdown, task }
}

impl RunningDaemon {
    pub async fn stop(self) {
        self.shutdown.trigger();
        self.task.await.unwrap();
    }
}

/// Poll `condition` until it holds or a generous timeout elapses.
pub async fn wait_until<F: Fn() -> bool>(what: &str, condition: F) {
    for _ in 0..240 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("timed out waiting for {}", what);
}
