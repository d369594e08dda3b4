//! Proxy subsystem: desired-state model and the machinery that converges a
//! running HAProxy to it.
//!
//! # Data Flow
//! ```text
//! service configs + discovery reports
//!     → assembler.rs (canonical candidate snapshot)
//!     → diff.rs (NoChange / EnableDisable / Structural)
//!     → effector.rs (config write, reload, socket commands, fallback)
//!     → state.rs (persisted applied snapshot, short TTL)
//! ```
//!
//! # Design Decisions
//! - Total ordering everywhere: a reorder of inputs must never look like a
//!   real change
//! - The socket path is an optimization only; every escalation ends in the
//!   reload path, which is always correct

pub mod assembler;
pub mod backend;
pub mod diff;
pub mod effector;
pub mod socket;
pub mod state;
pub mod writer;

pub use assembler::assemble;
pub use backend::{Backend, Server, Snapshot};
pub use diff::{classify, Delta, DiffError};
pub use effector::{Effector, EffectorError};
pub use state::{StateStore, STATE_TTL};
