//! Splits a flat instruction trace into per-contract sub-traces.

use covtrace_rpc::types::TraceStep;
use ethereum_types::{Address, U256};
use indexmap::IndexMap;

use crate::types::ContractId;

// Opcodes that hand control to another account. For the four call variants
// the callee address sits one word below the gas word on the stack.
const OP_CALL: &str = "CALL";
const OP_CALLCODE: &str = "CALLCODE";
const OP_DELEGATECALL: &str = "DELEGATECALL";
const OP_STATICCALL: &str = "STATICCALL";
const OP_CREATE: &str = "CREATE";
const OP_CREATE2: &str = "CREATE2";

/// Maps a mined transaction's instruction log to the contiguous sub-trace
/// each contract executed, keyed by contract in first-execution order.
///
/// `root` names the owner of the top-level frame: the call target, or
/// [`ContractId::New`] when the transaction is a contract creation. Depth
/// transitions are resolved from the call instruction that caused them;
/// repeated visits to the same contract within one transaction merge into
/// one entry. Pure and deterministic: the same log and root always produce
/// the same mapping.
pub fn extract_subtraces(
    steps: &[TraceStep],
    root: ContractId,
) -> IndexMap<ContractId, Vec<TraceStep>> {
    let mut subtraces: IndexMap<ContractId, Vec<TraceStep>> = IndexMap::new();
    let mut frames: Vec<ContractId> = vec![root];
    let mut previous: Option<&TraceStep> = None;

    for step in steps {
        if let Some(previous) = previous {
            if step.depth > previous.depth {
                frames.push(callee_of(previous));
            } else if step.depth < previous.depth {
                // A frame can return more than one level at once (e.g. an
                // exceptional halt); the root frame is never popped.
                for _ in 0..(previous.depth - step.depth) {
                    if frames.len() > 1 {
                        frames.pop();
                    }
                }
            }
        }
        let owner = frames.last().copied().unwrap_or(root);
        subtraces.entry(owner).or_default().push(step.clone());
        previous = Some(step);
    }

    subtraces
}

/// Resolves the contract a call-depth increase transferred control to,
/// from the instruction that caused it.
fn callee_of(step: &TraceStep) -> ContractId {
    match step.op.as_str() {
        OP_CREATE | OP_CREATE2 => ContractId::New,
        OP_CALL | OP_CALLCODE | OP_DELEGATECALL | OP_STATICCALL => {
            // Stack is listed bottom-to-top: top word is gas, the callee
            // address is the word below it.
            match step.stack.len().checked_sub(2).and_then(|i| step.stack.get(i)) {
                Some(word) => ContractId::Deployed(address_from_word(*word)),
                // A call instruction with fewer than two stack words is a
                // malformed log; attribute to the sentinel rather than
                // inventing an address.
                None => ContractId::New,
            }
        }
        // Depth only grows through calls and creates; a log that disagrees
        // gets the sentinel too.
        _ => ContractId::New,
    }
}

/// Low 20 bytes of a stack word, as an address.
fn address_from_word(word: U256) -> Address {
    Address::from_slice(&word.to_big_endian()[12..])
}
