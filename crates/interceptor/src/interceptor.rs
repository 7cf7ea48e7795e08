//! Request classification and capture orchestration.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use bytes::Bytes;
use ethereum_types::{Address, H256};
use serde_json::Value;
use tracing::{debug, info, warn};

use covtrace_rpc::client::NodeClient;
use covtrace_rpc::error::ClientError;
use covtrace_rpc::types::{BlockSelector, TransactionPayload};
use covtrace_rpc::utils::{RpcErr, RpcRequest};

use crate::error::InterceptorError;
use crate::extractor::extract_subtraces;
use crate::gate::Gate;
use crate::snapshot::Snapshot;
use crate::types::{
    CaptureConfig, ContractId, ContractKind, Provenance, SYNTHETIC_GAS_LIMIT, TraceInfo,
};

/// JSON-RPC interception middleware that accumulates per-call traces.
///
/// Sits in front of the transport: every request goes through
/// [`Interceptor::process`], which either forwards it untouched or runs a
/// capture procedure after the forwarded call completes. Captured
/// [`TraceInfo`] records accumulate in an in-memory registry until a
/// consumer drains them.
pub struct Interceptor {
    config: CaptureConfig,
    gate: Gate,
    node: OnceLock<Arc<dyn NodeClient>>,
    enabled: AtomicBool,
    registry: Mutex<Vec<TraceInfo>>,
}

impl Interceptor {
    /// Starts enabled; capture is inert until [`Interceptor::attach`] binds
    /// a node client.
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            gate: Gate::new(),
            node: OnceLock::new(),
            enabled: AtomicBool::new(true),
            registry: Mutex::new(Vec::new()),
        }
    }

    /// Setup hook: binds the node client once, when the middleware is
    /// installed on a transport. Later calls are ignored.
    pub fn attach(&self, node: Arc<dyn NodeClient>) {
        if self.node.set(node).is_err() {
            warn!("node client already attached, ignoring");
        } else {
            info!("trace capture attached to transport");
        }
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    /// Stops intercepting subsequent requests. Captures already in flight
    /// run to completion.
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Snapshot of the accumulated trace records, oldest first.
    pub fn collected_traces(&self) -> Vec<TraceInfo> {
        self.registry().clone()
    }

    /// Drains the registry, handing ownership of the records to the caller.
    pub fn take_traces(&self) -> Vec<TraceInfo> {
        std::mem::take(&mut *self.registry())
    }

    /// Interception entrypoint. Forwards `request` via `next` and, for the
    /// capture-enabled methods, runs the matching capture procedure around
    /// it. The caller always receives exactly what `next` produced; capture
    /// failures are logged and swallowed.
    pub async fn process<F, Fut>(&self, request: &RpcRequest, next: F) -> Result<Value, RpcErr>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, RpcErr>>,
    {
        if !self.is_enabled() {
            return next().await;
        }
        let Some(node) = self.node.get() else {
            return next().await;
        };
        match request.method.as_str() {
            "eth_sendTransaction" if self.config.capture_transactions => {
                self.process_transaction(node.as_ref(), request, next).await
            }
            "eth_call" if self.config.capture_calls => {
                self.process_call(node.as_ref(), request, next).await
            }
            "eth_estimateGas" if self.config.capture_gas_estimates => {
                self.process_call(node.as_ref(), request, next).await
            }
            _ => next().await,
        }
    }

    /// Submits a payload to the node, waiting until it is mined. Genuine
    /// submissions serialize against capture cycles; synthetic ones run
    /// inside a cycle that already holds the gate and must not re-acquire.
    pub async fn submit(
        &self,
        node: &dyn NodeClient,
        payload: &TransactionPayload,
        provenance: Provenance,
    ) -> Result<H256, ClientError> {
        let _permit = match provenance {
            Provenance::Genuine => Some(self.gate.acquire().await),
            Provenance::Synthetic => None,
        };
        let hash = node.send_transaction(payload).await?;
        node.wait_mined(hash).await?;
        Ok(hash)
    }

    /// `eth_sendTransaction` path: hold the gate across the genuine send so
    /// it cannot land inside a snapshot window, then record its trace.
    async fn process_transaction<F, Fut>(
        &self,
        node: &dyn NodeClient,
        request: &RpcRequest,
        next: F,
    ) -> Result<Value, RpcErr>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, RpcErr>>,
    {
        let payload = match parse_payload(request) {
            Ok(payload) => payload,
            Err(err) => {
                debug!(%err, "uninterpretable transaction payload, passing through");
                return next().await;
            }
        };

        let _permit = self.gate.acquire().await;
        let outcome = next().await;

        let mined = outcome
            .as_ref()
            .ok()
            .and_then(|value| serde_json::from_value::<H256>(value.clone()).ok());
        if let Err(err) = self.record_transaction(node, &payload, mined).await {
            warn!(%err, "transaction trace capture failed");
        }

        outcome
    }

    /// `eth_call`/`eth_estimateGas` path: forward first (the caller's result
    /// comes from the ordinary read-only execution), then run the capture
    /// cycle.
    async fn process_call<F, Fut>(
        &self,
        node: &dyn NodeClient,
        request: &RpcRequest,
        next: F,
    ) -> Result<Value, RpcErr>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, RpcErr>>,
    {
        let payload = match parse_payload(request) {
            Ok(payload) => payload,
            Err(err) => {
                debug!(%err, "uninterpretable call payload, passing through");
                return next().await;
            }
        };

        let result = next().await;
        if let Err(err) = self.capture_call(node, &payload).await {
            warn!(%err, "call trace capture failed");
        }
        result
    }

    /// Full synthetic-transaction cycle for one call: gate, snapshot,
    /// replay, record, revert. The snapshot is rolled back before any error
    /// propagates so a failed capture cannot leak synthetic state.
    async fn capture_call(
        &self,
        node: &dyn NodeClient,
        call: &TransactionPayload,
    ) -> Result<(), InterceptorError> {
        let _permit = self.gate.acquire().await;
        let snapshot = Snapshot::take(node).await?;
        let outcome = self.replay_as_transaction(node, call).await;
        let reverted = snapshot.revert(node).await;
        outcome?;
        reverted
    }

    async fn replay_as_transaction(
        &self,
        node: &dyn NodeClient,
        call: &TransactionPayload,
    ) -> Result<(), InterceptorError> {
        let synthetic = self.synthesize_transaction(call);
        let root = resolve_recipient(synthetic.to);

        let hash = match self.submit(node, &synthetic, Provenance::Synthetic).await {
            Ok(hash) => Some(hash),
            Err(err) => {
                // A reverting call still produces a trace: the node mines
                // the transaction before reporting the failure. Recover its
                // hash from the head block.
                debug!(%err, "synthetic transaction rejected, recovering from head block");
                let head = node.get_block_by_number(BlockSelector::Latest).await?;
                head.transactions.last().map(|tx| tx.hash)
            }
        };
        let Some(hash) = hash else {
            debug!("nothing mined after rejected synthetic send, skipping capture");
            return Ok(());
        };

        let creation_data = synthetic.data.clone().unwrap_or_default();
        self.record_trace(node, hash, root, &creation_data).await
    }

    /// Builds the throwaway transaction that stands in for a call.
    fn synthesize_transaction(&self, call: &TransactionPayload) -> TransactionPayload {
        TransactionPayload {
            from: call.from.or(Some(self.config.default_sender)),
            to: call.to,
            gas: Some(SYNTHETIC_GAS_LIMIT.into()),
            gas_price: call.gas_price,
            value: call.value,
            data: call.data.clone(),
        }
    }

    /// Records the trace of a genuine transaction the host just sent.
    /// Called with the gate held.
    async fn record_transaction(
        &self,
        node: &dyn NodeClient,
        payload: &TransactionPayload,
        mined: Option<H256>,
    ) -> Result<(), InterceptorError> {
        let root = resolve_recipient(payload.to);
        let creation_data = payload.data.clone().unwrap_or_default();

        match mined {
            Some(hash) => self.record_trace(node, hash, root, &creation_data).await,
            None => {
                // The node reported an error with no definite hash. Scan the
                // head block and record whatever is there. With several
                // transactions pending this can over- or under-attribute;
                // known imprecision, kept as-is.
                warn!("send reported no hash, scanning head block (attribution is best-effort)");
                let head = node.get_block_by_number(BlockSelector::Latest).await?;
                for tx in &head.transactions {
                    self.record_trace(node, tx.hash, root, &tx.input).await?;
                }
                Ok(())
            }
        }
    }

    /// Fetches and extracts the trace of one mined transaction, appending a
    /// [`TraceInfo`] per contract it touched.
    async fn record_trace(
        &self,
        node: &dyn NodeClient,
        tx_hash: H256,
        root: ContractId,
        creation_data: &Bytes,
    ) -> Result<(), InterceptorError> {
        node.wait_mined(tx_hash).await?;
        let steps = node.trace_transaction(tx_hash).await?;
        let subtraces = extract_subtraces(&steps, root);
        debug!(
            tx = %tx_hash,
            contracts = subtraces.len(),
            steps = steps.len(),
            "extracted sub-traces"
        );

        for (id, subtrace) in subtraces {
            let contract = match id {
                ContractId::Deployed(address) => {
                    let runtime_bytecode = node.get_code(address).await?;
                    ContractKind::Existing {
                        address,
                        runtime_bytecode,
                    }
                }
                ContractId::New => ContractKind::New {
                    creation_bytecode: creation_data.clone(),
                },
            };
            self.registry().push(TraceInfo {
                subtrace,
                tx_hash,
                contract,
            });
        }
        Ok(())
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, Vec<TraceInfo>> {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Call target resolution: an absent or null-address recipient means the
/// transaction deploys a new contract.
fn resolve_recipient(to: Option<Address>) -> ContractId {
    match to {
        Some(address) if !address.is_zero() => ContractId::Deployed(address),
        _ => ContractId::New,
    }
}

/// The transaction/call object is the first positional parameter for all
/// three intercepted methods.
fn parse_payload(request: &RpcRequest) -> Result<TransactionPayload, InterceptorError> {
    let param = request
        .first_param()
        .ok_or_else(|| InterceptorError::Payload {
            method: request.method.clone(),
            cause: "missing params".to_string(),
        })?;
    serde_json::from_value(param.clone()).map_err(|err| InterceptorError::Payload {
        method: request.method.clone(),
        cause: err.to_string(),
    })
}
