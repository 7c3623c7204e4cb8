//! RPC client with primary → fallback failover and circuit breaker.

use async_trait::async_trait;
use near_crypto::{PublicKey, Signer};
use near_jsonrpc_client::methods;
use near_jsonrpc_client::JsonRpcClient;
use near_gas::NearGas;
use near_jsonrpc_primitives::types::query::QueryResponseKind;
use near_primitives::hash::CryptoHash;
use near_primitives::transaction::{
    Action, FunctionCallAction, SignedTransaction, Transaction, TransactionV0,
};
use near_primitives::types::{AccountId, BlockReference, Finality, FunctionArgs};
use near_primitives::views::{
    AccessKeyView, FinalExecutionOutcomeView, FinalExecutionStatus, QueryRequest,
};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::ledger::{CallOutcome, FunctionCall, Ledger};
use crate::metrics::METRICS;
use crate::schedule::now_ms;

/// Cached block hash TTL.
const BLOCK_HASH_TTL_SECS: u64 = 30;

const CIRCUIT_BREAKER_THRESHOLD: u64 = 5;
const CIRCUIT_BREAKER_WINDOW_MS: u64 = 30_000;

struct CircuitState {
    failures: u64,
    last_failure_ms: u64,
    open: bool,
}

/// RPC client with primary → fallback failover and block hash caching.
pub struct RpcClient {
    primary: JsonRpcClient,
    fallback: JsonRpcClient,
    primary_url: String,
    fallback_url: String,
    circuit: Mutex<CircuitState>,
    total_failovers: AtomicU64,
    cached_block_hash: RwLock<Option<(CryptoHash, Instant)>>,
    block_hash_stale: AtomicBool,
}

impl RpcClient {
    pub fn new(primary_url: &str, fallback_url: &str) -> Self {
        info!(
            primary = primary_url,
            fallback = fallback_url,
            "RPC client initialized with failover"
        );
        Self {
            primary: JsonRpcClient::connect(primary_url),
            fallback: JsonRpcClient::connect(fallback_url),
            primary_url: primary_url.to_string(),
            fallback_url: fallback_url.to_string(),
            circuit: Mutex::new(CircuitState {
                failures: 0,
                last_failure_ms: 0,
                open: false,
            }),
            total_failovers: AtomicU64::new(0),
            cached_block_hash: RwLock::new(None),
            block_hash_stale: AtomicBool::new(false),
        }
    }

    pub fn primary_url(&self) -> &str {
        &self.primary_url
    }

    pub fn fallback_url(&self) -> &str {
        &self.fallback_url
    }

    // --- Views ---

    /// Call a contract view method. Automatic failover.
    pub async fn call_view(
        &self,
        contract_id: &AccountId,
        method_name: &str,
        args: &Value,
    ) -> Result<Vec<u8>, crate::Error> {
        let args = serde_json::to_vec(args)
            .map_err(|e| crate::Error::Decode(format!("view args: {e}")))?;
        let make_request = || methods::query::RpcQueryRequest {
            block_reference: BlockReference::Finality(Finality::Final),
            request: QueryRequest::CallFunction {
                account_id: contract_id.clone(),
                method_name: method_name.to_string(),
                args: FunctionArgs::from(args.clone()),
            },
        };

        let resp = match self.active().call(make_request()).await {
            Ok(r) => {
                self.record_success();
                r
            }
            Err(e) => {
                self.record_failure();
                warn!(error = %e, method = method_name, "RPC view call failed, trying fallback");
                self.fallback.call(make_request()).await.map_err(|e2| {
                    crate::Error::Rpc(format!(
                        "view {method_name} failed: primary={e}, fallback={e2}"
                    ))
                })?
            }
        };

        match resp.kind {
            QueryResponseKind::CallResult(result) => Ok(result.result),
            other => Err(crate::Error::Rpc(format!(
                "unexpected query response: {other:?}"
            ))),
        }
    }

    /// Query an account's liquid balance. Automatic failover.
    pub async fn query_balance(&self, account_id: &AccountId) -> Result<u128, crate::Error> {
        let make_request = || methods::query::RpcQueryRequest {
            block_reference: BlockReference::Finality(Finality::Final),
            request: QueryRequest::ViewAccount {
                account_id: account_id.clone(),
            },
        };

        let resp = match self.active().call(make_request()).await {
            Ok(r) => {
                self.record_success();
                r
            }
            Err(e) => {
                self.record_failure();
                warn!(error = %e, "RPC view_account failed, trying fallback");
                self.fallback.call(make_request()).await.map_err(|e2| {
                    crate::Error::Rpc(format!(
                        "view_account failed: primary={e}, fallback={e2}"
                    ))
                })?
            }
        };

        match resp.kind {
            QueryResponseKind::ViewAccount(account) => Ok(account.amount),
            other => Err(crate::Error::Rpc(format!(
                "unexpected query response: {other:?}"
            ))),
        }
    }

    // --- TX construction & submission ---

    /// Get a recent block hash, using cache when fresh (<30s).
    pub async fn latest_block_hash(&self) -> Result<CryptoHash, crate::Error> {
        if !self.block_hash_stale.load(Ordering::Relaxed) {
            let cache = self.cached_block_hash.read().await;
            if let Some((hash, when)) = *cache {
                if when.elapsed().as_secs() < BLOCK_HASH_TTL_SECS {
                    return Ok(hash);
                }
            }
        }
        let make_request = || methods::block::RpcBlockRequest {
            block_reference: BlockReference::Finality(Finality::Final),
        };
        let block = match self.active().call(make_request()).await {
            Ok(b) => {
                self.record_success();
                b
            }
            Err(e) => {
                self.record_failure();
                warn!(error = %e, "RPC block query failed, trying fallback");
                self.fallback.call(make_request()).await.map_err(|e2| {
                    crate::Error::Rpc(format!(
                        "block query failed on both RPCs: primary={e}, fallback={e2}"
                    ))
                })?
            }
        };
        let hash = block.header.hash;
        {
            let mut cache = self.cached_block_hash.write().await;
            *cache = Some((hash, Instant::now()));
            self.block_hash_stale.store(false, Ordering::Relaxed);
        }
        Ok(hash)
    }

    /// Query an access key's on-chain nonce. Automatic failover.
    pub async fn query_access_key(
        &self,
        account_id: &AccountId,
        public_key: &PublicKey,
    ) -> Result<AccessKeyView, crate::Error> {
        let make_request = || methods::query::RpcQueryRequest {
            block_reference: BlockReference::Finality(Finality::Final),
            request: QueryRequest::ViewAccessKey {
                account_id: account_id.clone(),
                public_key: public_key.clone(),
            },
        };

        let resp = match self.active().call(make_request()).await {
            Ok(r) => {
                self.record_success();
                r
            }
            Err(e) => {
                self.record_failure();
                warn!(error = %e, "RPC access_key query failed, trying fallback");
                self.fallback.call(make_request()).await.map_err(|e2| {
                    crate::Error::Rpc(format!(
                        "access_key query failed: primary={e}, fallback={e2}"
                    ))
                })?
            }
        };

        match resp.kind {
            QueryResponseKind::AccessKey(ak) => Ok(ak),
            other => Err(crate::Error::Rpc(format!(
                "unexpected query response: {other:?}"
            ))),
        }
    }

    /// Send a signed transaction and wait for finality. Automatic failover.
    pub async fn send_signed_tx(
        &self,
        signed_tx: SignedTransaction,
    ) -> Result<FinalExecutionOutcomeView, crate::Error> {
        match self
            .active()
            .call(methods::broadcast_tx_commit::RpcBroadcastTxCommitRequest {
                signed_transaction: signed_tx.clone(),
            })
            .await
        {
            Ok(outcome) => {
                self.record_success();
                Ok(outcome)
            }
            Err(e) => {
                self.record_failure();
                warn!(error = %e, "Primary broadcast_tx_commit failed, trying fallback");
                self.fallback
                    .call(methods::broadcast_tx_commit::RpcBroadcastTxCommitRequest {
                        signed_transaction: signed_tx,
                    })
                    .await
                    .map_err(|e2| {
                        crate::Error::Rpc(format!(
                            "broadcast_tx_commit failed: primary={e}, fallback={e2}"
                        ))
                    })
            }
        }
    }

    /// Quick connectivity check. Returns "ok", "degraded", or error.
    pub async fn health_check(&self) -> Result<&'static str, crate::Error> {
        let make_request = || methods::block::RpcBlockRequest {
            block_reference: BlockReference::Finality(Finality::Final),
        };
        match self.primary.call(make_request()).await {
            Ok(_) => Ok("ok"),
            Err(_) => match self.fallback.call(make_request()).await {
                Ok(_) => Ok("degraded"),
                Err(e) => Err(crate::Error::Rpc(format!("Both RPCs unreachable: {e}"))),
            },
        }
    }

    // --- Failover / circuit breaker ---

    /// Active client (primary unless circuit is open).
    fn active(&self) -> &JsonRpcClient {
        if self.is_circuit_open() {
            &self.fallback
        } else {
            &self.primary
        }
    }

    fn record_success(&self) {
        let mut circuit = self.circuit.lock().unwrap_or_else(|e| e.into_inner());
        if circuit.failures > 0 {
            info!(primary = %self.primary_url, "Primary RPC recovered");
            circuit.failures = 0;
            circuit.open = false;
        }
    }

    fn record_failure(&self) {
        METRICS.rpc_errors.fetch_add(1, Ordering::Relaxed);
        let mut circuit = self.circuit.lock().unwrap_or_else(|e| e.into_inner());
        circuit.failures += 1;
        circuit.last_failure_ms = now_ms();
        if circuit.failures >= CIRCUIT_BREAKER_THRESHOLD && !circuit.open {
            circuit.open = true;
            self.total_failovers.fetch_add(1, Ordering::Relaxed);
            METRICS.rpc_failovers.fetch_add(1, Ordering::Relaxed);
            // Fallback may be on a different chain head.
            self.block_hash_stale.store(true, Ordering::Relaxed);
            warn!(
                failures = circuit.failures,
                fallback = %self.fallback_url,
                "Circuit breaker opened, routing to fallback"
            );
        }
    }

    pub fn is_circuit_open(&self) -> bool {
        let mut circuit = self.circuit.lock().unwrap_or_else(|e| e.into_inner());
        if !circuit.open {
            return false;
        }
        if now_ms().saturating_sub(circuit.last_failure_ms) > CIRCUIT_BREAKER_WINDOW_MS {
            circuit.open = false;
            circuit.failures = 0;
            info!(primary = %self.primary_url, "Circuit breaker half-open, retrying primary");
            return false;
        }
        true
    }

    pub fn failover_count(&self) -> u64 {
        self.total_failovers.load(Ordering::Relaxed)
    }

    /// Currently active RPC URL.
    pub fn active_url(&self) -> &str {
        if self.is_circuit_open() {
            &self.fallback_url
        } else {
            &self.primary_url
        }
    }
}

#[async_trait]
impl Ledger for RpcClient {
    async fn view_function(
        &self,
        contract_id: &AccountId,
        method_name: &str,
        args: Value,
    ) -> Result<Vec<u8>, crate::Error> {
        self.call_view(contract_id, method_name, &args).await
    }

    async fn view_account_balance(&self, account_id: &AccountId) -> Result<u128, crate::Error> {
        self.query_balance(account_id).await
    }

    async fn function_call(
        &self,
        signer: &Signer,
        call: FunctionCall,
    ) -> Result<CallOutcome, crate::Error> {
        let signer_id = signer.get_account_id().clone();
        let public_key = signer.public_key();

        let access_key = self.query_access_key(&signer_id, &public_key).await?;
        let block_hash = self.latest_block_hash().await?;

        let signed_tx = Transaction::V0(TransactionV0 {
            signer_id,
            public_key,
            nonce: access_key.nonce + 1,
            receiver_id: call.receiver_id.clone(),
            block_hash,
            actions: build_function_call_actions(&call)?,
        })
        .sign(signer);

        debug!(
            receiver = %call.receiver_id,
            method = %call.method_name,
            gas = %NearGas::from_gas(call.gas),
            deposit = call.deposit,
            "Submitting function call"
        );

        let outcome = self.send_signed_tx(signed_tx).await?;
        into_call_outcome(outcome)
    }
}

/// Build the single FunctionCall action for a call.
fn build_function_call_actions(call: &FunctionCall) -> Result<Vec<Action>, crate::Error> {
    let args = serde_json::to_vec(&call.args)
        .map_err(|e| crate::Error::Decode(format!("call args: {e}")))?;

    Ok(vec![Action::FunctionCall(Box::new(FunctionCallAction {
        method_name: call.method_name.clone(),
        args,
        gas: call.gas,
        deposit: call.deposit,
    }))])
}

/// Map a final outcome to a [`CallOutcome`] or an execution failure.
fn into_call_outcome(outcome: FinalExecutionOutcomeView) -> Result<CallOutcome, crate::Error> {
    let tx_hash = outcome.transaction_outcome.id.to_string();
    match outcome.status {
        FinalExecutionStatus::SuccessValue(bytes) => Ok(CallOutcome {
            tx_hash,
            value: serde_json::from_slice(&bytes).ok(),
        }),
        FinalExecutionStatus::Failure(failure) => {
            let failure = serde_json::to_value(&failure)
                .unwrap_or_else(|_| Value::String(format!("{failure:?}")));
            Err(crate::Error::Execution(failure))
        }
        FinalExecutionStatus::NotStarted | FinalExecutionStatus::Started => Err(
            crate::Error::Rpc(format!("transaction {tx_hash} not finalized")),
        ),
    }
}
