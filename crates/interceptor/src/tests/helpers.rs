//! Shared test helpers: an in-memory node and trace fixtures.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use bytes::Bytes;
use covtrace_rpc::client::NodeClient;
use covtrace_rpc::error::ClientError;
use covtrace_rpc::types::{
    BlockSelector, RpcBlock, RpcBlockTransaction, TraceStep, TransactionPayload,
};
use ethereum_types::{Address, H256, U256};

/// Standard deployed-contract address.
pub const CONTRACT_ADDR: u64 = 0x42;

/// A second deployed contract, for nested-call scenarios.
pub const SECOND_CONTRACT_ADDR: u64 = 0x43;

/// Standard sender address.
pub const SENDER_ADDR: u64 = 0x100;

pub fn addr(n: u64) -> Address {
    Address::from_low_u64_be(n)
}

/// An address widened to a stack word.
pub fn word(address: Address) -> U256 {
    U256::from_big_endian(address.as_bytes())
}

pub fn step(pc: u64, op: &str, depth: u64, stack: &[U256]) -> TraceStep {
    TraceStep {
        pc,
        op: op.to_string(),
        depth,
        stack: stack.to_vec(),
    }
}

/// A CALL instruction targeting `callee`: gas on top of the stack, the
/// callee address one word below.
pub fn call_step(pc: u64, depth: u64, callee: Address) -> TraceStep {
    step(pc, "CALL", depth, &[word(callee), U256::from(0xffff)])
}

/// The trace every transaction gets unless a test programs its own.
pub fn flat_trace() -> Vec<TraceStep> {
    vec![
        step(0, "PUSH1", 1, &[]),
        step(2, "STOP", 1, &[U256::from(0x60)]),
    ]
}

#[derive(Default)]
struct MockState {
    /// Stand-in for all chain state; every mined transaction bumps it.
    counter: u64,
    next_hash: u64,
    next_snapshot: u64,
    /// Snapshot id -> (counter, block count) at snapshot time.
    snapshots: HashMap<U256, (u64, usize)>,
    /// One entry per mined block; the last entry is the head block.
    blocks: Vec<Vec<RpcBlockTransaction>>,
    traces: HashMap<H256, Vec<TraceStep>>,
    code: HashMap<Address, Bytes>,
    sent: Vec<TransactionPayload>,
    calls: Vec<String>,
    trace_for_next_send: Option<Vec<TraceStep>>,
    fail_next_send: bool,
}

/// In-memory node with snapshot/revert semantics over a state counter,
/// programmable traces, and a recorded method-call log.
#[derive(Default)]
pub struct MockNode {
    state: Mutex<MockState>,
    /// Artificial latency on trace fetches, to widen race windows.
    trace_delay: Duration,
}

impl MockNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trace_delay(delay: Duration) -> Self {
        Self {
            trace_delay: delay,
            ..Default::default()
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn counter(&self) -> u64 {
        self.lock().counter
    }

    pub fn block_count(&self) -> usize {
        self.lock().blocks.len()
    }

    pub fn sent_payloads(&self) -> Vec<TransactionPayload> {
        self.lock().sent.clone()
    }

    pub fn method_calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn set_code(&self, address: Address, code: Bytes) {
        self.lock().code.insert(address, code);
    }

    pub fn set_trace(&self, hash: H256, steps: Vec<TraceStep>) {
        self.lock().traces.insert(hash, steps);
    }

    /// Program the trace the next submitted transaction will report,
    /// whatever hash it gets assigned.
    pub fn set_trace_for_next_send(&self, steps: Vec<TraceStep>) {
        self.lock().trace_for_next_send = Some(steps);
    }

    /// Make the next send mine its transaction but report a JSON-RPC error,
    /// the way nodes reject reverting transactions after producing them.
    pub fn fail_next_send(&self) {
        self.lock().fail_next_send = true;
    }

    /// Pre-mine a block with the given transactions (head-block fixtures
    /// for the fallback-scan paths).
    pub fn push_block(&self, transactions: Vec<RpcBlockTransaction>) {
        self.lock().blocks.push(transactions);
    }
}

#[async_trait::async_trait]
impl NodeClient for MockNode {
    async fn send_transaction(&self, payload: &TransactionPayload) -> Result<H256, ClientError> {
        let mut state = self.lock();
        state.calls.push("eth_sendTransaction".into());
        state.sent.push(payload.clone());

        state.next_hash += 1;
        let hash = H256::from_low_u64_be(state.next_hash);
        if let Some(steps) = state.trace_for_next_send.take() {
            state.traces.insert(hash, steps);
        }

        // The transaction is mined either way; a failing send only means
        // the node reported the failure after producing it.
        state.counter += 1;
        let mined = RpcBlockTransaction {
            hash,
            to: payload.to,
            input: payload.data.clone().unwrap_or_default(),
        };
        state.blocks.push(vec![mined]);

        if state.fail_next_send {
            state.fail_next_send = false;
            return Err(ClientError::JsonRpc {
                method: "eth_sendTransaction".into(),
                code: -32000,
                message: "execution reverted".into(),
            });
        }
        Ok(hash)
    }

    async fn wait_mined(&self, _hash: H256) -> Result<(), ClientError> {
        self.lock().calls.push("eth_getTransactionReceipt".into());
        Ok(())
    }

    async fn trace_transaction(&self, hash: H256) -> Result<Vec<TraceStep>, ClientError> {
        if !self.trace_delay.is_zero() {
            tokio::time::sleep(self.trace_delay).await;
        }
        let mut state = self.lock();
        state.calls.push("debug_traceTransaction".into());
        Ok(state.traces.get(&hash).cloned().unwrap_or_else(flat_trace))
    }

    async fn get_code(&self, address: Address) -> Result<Bytes, ClientError> {
        let mut state = self.lock();
        state.calls.push("eth_getCode".into());
        Ok(state.code.get(&address).cloned().unwrap_or_default())
    }

    async fn get_block_by_number(&self, _selector: BlockSelector) -> Result<RpcBlock, ClientError> {
        let mut state = self.lock();
        state.calls.push("eth_getBlockByNumber".into());
        let transactions = state.blocks.last().cloned().unwrap_or_default();
        Ok(RpcBlock {
            number: Some(U256::from(state.blocks.len())),
            hash: Some(H256::from_low_u64_be(state.blocks.len() as u64)),
            transactions,
        })
    }

    async fn take_snapshot(&self) -> Result<U256, ClientError> {
        let mut state = self.lock();
        state.calls.push("evm_snapshot".into());
        state.next_snapshot += 1;
        let id = U256::from(state.next_snapshot);
        let checkpoint = (state.counter, state.blocks.len());
        state.snapshots.insert(id, checkpoint);
        Ok(id)
    }

    async fn revert_snapshot(&self, id: U256) -> Result<bool, ClientError> {
        let mut state = self.lock();
        state.calls.push("evm_revert".into());
        match state.snapshots.remove(&id) {
            Some((counter, block_count)) => {
                state.counter = counter;
                state.blocks.truncate(block_count);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
