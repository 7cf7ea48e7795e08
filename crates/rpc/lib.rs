//! JSON-RPC plumbing for the covtrace middleware.
//!
//! This crate holds everything that crosses a process boundary:
//! - [`utils`]: the JSON-RPC 2.0 request/response envelope shared with the
//!   host pipeline, plus [`utils::RpcErr`] with proper error-code mapping.
//! - [`types`]: node-facing payloads and the instruction-trace wire format.
//! - [`client`]: the [`client::NodeClient`] trait the interceptor drives and
//!   its HTTP implementation, [`client::RpcClient`].
//! - [`error`]: the client error taxonomy with retryability classification.

pub mod client;
pub mod error;
pub mod types;
pub mod utils;
