//! Chain access seam used by the wallet session and the orchestrator.

use async_trait::async_trait;
use near_crypto::Signer;
use near_primitives::types::AccountId;
use serde_json::Value;

/// A single function-call transaction to submit.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub receiver_id: AccountId,
    pub method_name: String,
    pub args: Value,
    pub gas: u64,
    /// Attached deposit in yoctoNEAR.
    pub deposit: u128,
}

/// Result of a successful function call.
#[derive(Debug, Clone)]
pub struct CallOutcome {
    pub tx_hash: String,
    pub value: Option<Value>,
}

/// Read and write access to a NEAR network.
///
/// [`crate::rpc::RpcClient`] is the production implementation.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Call a view method and return its raw result bytes.
    async fn view_function(
        &self,
        contract_id: &AccountId,
        method_name: &str,
        args: Value,
    ) -> Result<Vec<u8>, crate::Error>;

    /// Liquid balance of an account in yoctoNEAR.
    async fn view_account_balance(&self, account_id: &AccountId) -> Result<u128, crate::Error>;

    /// Sign with `signer`, submit and wait for the final outcome.
    ///
    /// An on-chain failure is returned as [`crate::Error::Execution`].
    async fn function_call(
        &self,
        signer: &Signer,
        call: FunctionCall,
    ) -> Result<CallOutcome, crate::Error>;
}
