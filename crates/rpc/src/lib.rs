//! LendLedger RPC - invocation surface and CLI
//!
//! Operations are invoked by name with one JSON argument. [`AppContext`]
//! wraps each call in a single ledger invocation and commits it; the
//! `lendledger` binary exposes the same surface on the command line and as a
//! newline-delimited JSON stream.

pub mod config;
pub mod context;
pub mod router;
pub mod server;

pub use config::LedgerConfig;
pub use context::{AppContext, InvocationResult};
pub use router::{Handler, Router, Services};
pub use server::{handle_line, serve};
