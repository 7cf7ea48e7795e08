//! Core data types for trace capture.

use bytes::Bytes;
use covtrace_rpc::types::TraceStep;
use ethereum_types::{Address, H256};
use serde::Serialize;

/// Gas ceiling forced onto synthetic transactions. Generous so a replayed
/// call never runs out of gas before producing the part of the trace the
/// caller asked about.
pub const SYNTHETIC_GAS_LIMIT: u64 = 100_000_000;

/// Which request kinds get trace capture, plus the sender used when a call
/// omits `from`. Fixed for the lifetime of the interceptor.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Capture traces for `eth_sendTransaction`.
    pub capture_transactions: bool,
    /// Capture traces for `eth_call`.
    pub capture_calls: bool,
    /// Capture traces for `eth_estimateGas`.
    pub capture_gas_estimates: bool,
    /// Sender substituted when a call payload has no `from`.
    pub default_sender: Address,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            capture_transactions: true,
            capture_calls: true,
            capture_gas_estimates: true,
            default_sender: Address::zero(),
        }
    }
}

/// Identifies whose code a sub-trace ran in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ContractId {
    /// Code already deployed at this address.
    Deployed(Address),
    /// The contract being created by the traced transaction; it has no
    /// usable address while its creation frame runs.
    New,
}

/// Bytecode attribution for one sub-trace. Exactly one variant applies:
/// the discriminant is whether the sub-execution was a creation frame of
/// the enclosing transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ContractKind {
    /// A contract that was already deployed; `runtime_bytecode` is the code
    /// at `address`, fetched after execution.
    Existing {
        address: Address,
        runtime_bytecode: Bytes,
    },
    /// The contract being deployed by this very transaction;
    /// `creation_bytecode` is the payload submitted to deploy it.
    New { creation_bytecode: Bytes },
}

/// One contract frame's contiguous slice of a transaction's instruction
/// trace, with the bytecode that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct TraceInfo {
    pub subtrace: Vec<TraceStep>,
    pub tx_hash: H256,
    pub contract: ContractKind,
}

/// Whether a submitted transaction came from the host or was manufactured
/// internally for trace capture. Passed alongside the payload, never
/// serialized onto the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Sent by the host; must serialize against capture cycles.
    Genuine,
    /// Manufactured inside a capture cycle that already holds the gate.
    Synthetic,
}
