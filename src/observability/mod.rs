//! Observability subsystem.
//!
//! # Design Decisions
//! - Structured logging via tracing; the config's log level seeds the filter
//!   and `RUST_LOG` overrides it
//! - Metrics are cheap facade calls; the Prometheus exporter only runs when
//!   an address is configured

pub mod logging;
pub mod metrics;
