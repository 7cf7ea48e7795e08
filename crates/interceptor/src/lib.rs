//! Per-call execution trace capture over JSON-RPC.
//!
//! Development nodes expose instruction-level traces only for mined
//! transactions, never for read-only calls or gas estimates. This middleware
//! sits in the host's JSON-RPC pipeline and closes that gap: transactions are
//! traced after they land, while calls are replayed as throwaway transactions
//! under a state snapshot that is reverted afterwards, so the caller still
//! observes a side-effect-free call. A concurrency gate keeps genuine
//! transactions out of the snapshot/revert window.

pub mod error;
pub mod extractor;
pub mod gate;
pub mod interceptor;
pub mod snapshot;
pub mod types;

#[cfg(test)]
mod tests;
