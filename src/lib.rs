//! HAProxy backend synchronization sidecar.
//!
//! `backsync` continuously reconciles the set of registered upstream servers
//! for a fixed list of services with the configuration of a local HAProxy.
//!
//! # Architecture Overview
//!
//! ```text
//!  static config ──┐
//!  directory of ───┼─▶ discovery sources ──▶ watch channels
//!  JSON files      │   (one task each)            │
//!  zookeeper ──────┘                              ▼
//!                                          reconciler loop
//!                                     assemble → diff → effect
//!                                                │
//!                            ┌───────────────────┼──────────────────┐
//!                            ▼                   ▼                  ▼
//!                      config file         reload command      admin socket
//!                      (do_writes)         (do_reloads)        (do_socket)
//! ```
//!
//! The reconciler owns the applied snapshot; discovery sources own their
//! report sets and publish copies. Change is applied with the cheapest action
//! that covers it: pure enable/disable flips go over the admin socket,
//! everything else rewrites the config file and reloads the daemon.

pub mod config;
pub mod discovery;
pub mod lifecycle;
pub mod observability;
pub mod proxy;
pub mod reconciler;

pub use config::{load_config, DaemonConfig};
pub use lifecycle::Shutdown;
pub use reconciler::Reconciler;
