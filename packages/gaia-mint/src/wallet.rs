//! Wallet session manager.
//!
//! Owns the connection to the NEAR network and the signed-in wallet session.
//! Dependents hold an `Arc<WalletSessionManager>` and read snapshots through
//! [`WalletSessionManager::wallet`]; only sign-in, sign-out and
//! (re)initialization replace the session.

use crate::config::Config;
use crate::credentials::CredentialStore;
use crate::ledger::{CallOutcome, FunctionCall, Ledger};
use crate::rpc::RpcClient;
use near_crypto::{InMemorySigner, KeyType, PublicKey, SecretKey, Signer};
use near_primitives::types::AccountId;
use near_token::NearToken;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use tracing::{debug, error, info, warn};
use url::Url;

/// Fixed network endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    pub network_id: String,
    pub node_url: String,
    pub fallback_node_url: String,
    pub wallet_url: String,
    pub helper_url: String,
    pub explorer_url: String,
}

/// Connection handle to a NEAR network.
pub struct NearConnection {
    network: NetworkConfig,
    ledger: Arc<dyn Ledger>,
}

impl NearConnection {
    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }
}

/// Wallet session handle: the signed-in account, if any, and its signer.
pub struct WalletConnection {
    near: Arc<NearConnection>,
    account_id: Option<AccountId>,
    signer: Option<Signer>,
    balance: Option<u128>,
}

impl WalletConnection {
    pub fn is_signed_in(&self) -> bool {
        self.signer.is_some()
    }

    pub fn account_id(&self) -> Option<&AccountId> {
        self.account_id.as_ref()
    }

    /// Balance in yoctoNEAR, fetched when the session was established.
    pub fn balance(&self) -> Option<u128> {
        self.balance
    }

    /// Call a view method and decode its JSON result.
    pub async fn view_function<T: DeserializeOwned>(
        &self,
        contract_id: &AccountId,
        method_name: &str,
        args: Value,
    ) -> Result<T, crate::Error> {
        let bytes = self
            .near
            .ledger
            .view_function(contract_id, method_name, args)
            .await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| crate::Error::Decode(format!("{method_name} result: {e}")))
    }

    /// Sign and submit a function call as the signed-in account.
    pub async fn function_call(&self, call: FunctionCall) -> Result<CallOutcome, crate::Error> {
        let signer = self
            .signer
            .as_ref()
            .ok_or_else(|| crate::Error::Credentials("wallet is not signed in".into()))?;
        self.near.ledger.function_call(signer, call).await
    }
}

/// Read-only snapshot of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub account_id: Option<AccountId>,
    pub is_signed_in: bool,
    pub network_endpoint: String,
}

/// Where to send the user to authorize this client.
#[derive(Debug, Clone)]
pub struct SignInRequest {
    pub url: Url,
    /// Key the wallet is asked to add; pending until [`WalletSessionManager::complete_sign_in`].
    pub public_key: PublicKey,
}

#[derive(Default)]
struct State {
    near: Option<Arc<NearConnection>>,
    wallet: Option<Arc<WalletConnection>>,
    store: Option<Arc<dyn CredentialStore>>,
}

type Connector = Box<dyn Fn(&NetworkConfig) -> Arc<dyn Ledger> + Send + Sync>;

/// Owns the lifecycle of the authenticated session.
pub struct WalletSessionManager {
    network: NetworkConfig,
    contract_id: AccountId,
    success_url: Option<String>,
    failure_url: Option<String>,
    connector: Connector,
    state: RwLock<State>,
}

impl WalletSessionManager {
    /// Session manager talking JSON-RPC to the configured endpoints.
    pub fn new(config: &Config) -> Result<Self, crate::Error> {
        Self::with_connector(
            config,
            Box::new(|network: &NetworkConfig| -> Arc<dyn Ledger> {
                Arc::new(RpcClient::new(&network.node_url, &network.fallback_node_url))
            }),
        )
    }

    /// Session manager over an existing ledger client.
    pub fn with_ledger(config: &Config, ledger: Arc<dyn Ledger>) -> Result<Self, crate::Error> {
        Self::with_connector(config, Box::new(move |_: &NetworkConfig| ledger.clone()))
    }

    fn with_connector(config: &Config, connector: Connector) -> Result<Self, crate::Error> {
        let contract_id = config
            .contract_id
            .parse()
            .map_err(|e| crate::Error::Config(format!("Invalid contract id: {e}")))?;
        Ok(Self {
            network: config.network(),
            contract_id,
            success_url: config.success_url.clone(),
            failure_url: config.failure_url.clone(),
            connector,
            state: RwLock::new(State::default()),
        })
    }

    /// Connect and restore any stored session.
    ///
    /// `None` (no credential store yet) is a no-op. Errors are logged and
    /// leave the session unestablished; they never propagate.
    pub async fn initialize(&self, store: Option<Arc<dyn CredentialStore>>) {
        let Some(store) = store else {
            debug!("No credential store available, skipping connect");
            return;
        };

        match self.connect(store.as_ref()).await {
            Ok((near, wallet)) => {
                info!(
                    network = %self.network.network_id,
                    account = ?wallet.account_id().map(|a| a.as_str()),
                    "Connected to NEAR"
                );
                let mut state = self.write_state();
                state.near = Some(near);
                state.wallet = Some(wallet);
                state.store = Some(store);
            }
            Err(e) => {
                error!(error = %e, "Failed to connect to NEAR, session not established");
                *self.write_state() = State::default();
            }
        }
    }

    async fn connect(
        &self,
        store: &dyn CredentialStore,
    ) -> Result<(Arc<NearConnection>, Arc<WalletConnection>), crate::Error> {
        Url::parse(&self.network.wallet_url)
            .map_err(|e| crate::Error::Config(format!("Invalid wallet URL: {e}")))?;

        let near = Arc::new(NearConnection {
            network: self.network.clone(),
            ledger: (self.connector)(&self.network),
        });

        let credentials = store.load()?;
        let signer = if !credentials.network_id.is_empty()
            && credentials.network_id != self.network.network_id
        {
            warn!(
                stored = %credentials.network_id,
                network = %self.network.network_id,
                "Stored credentials belong to another network, ignoring"
            );
            None
        } else {
            restore_signer(&credentials)?
        };

        let (account_id, balance) = match &signer {
            Some(signer) => {
                let account_id = signer.get_account_id().clone();
                let balance = near.ledger.view_account_balance(&account_id).await?;
                info!(account = %account_id, balance = %NearToken::from_yoctonear(balance), "Wallet signed in");
                (Some(account_id), Some(balance))
            }
            None => (None, None),
        };

        let wallet = Arc::new(WalletConnection {
            near: near.clone(),
            account_id,
            signer,
            balance,
        });
        Ok((near, wallet))
    }

    /// Start authorizing this client with the wallet.
    ///
    /// Returns `None` when no session handle exists. Otherwise stores a fresh
    /// pending key and returns the wallet URL the user must visit.
    pub fn sign_in(&self) -> Result<Option<SignInRequest>, crate::Error> {
        let Some(store) = self.session_store() else {
            return Ok(None);
        };

        let secret_key = SecretKey::from_random(KeyType::ED25519);
        let public_key = secret_key.public_key();

        let mut credentials = store.load()?;
        credentials.network_id = self.network.network_id.clone();
        credentials.add_pending(public_key.to_string(), secret_key.to_string());
        store.save(&credentials)?;

        let url = self.login_url(&public_key)?;
        info!(contract = %self.contract_id, key = %public_key, "Sign-in requested");
        Ok(Some(SignInRequest { url, public_key }))
    }

    fn login_url(&self, public_key: &PublicKey) -> Result<Url, crate::Error> {
        let base = format!("{}/login/", self.network.wallet_url.trim_end_matches('/'));
        let mut url = Url::parse(&base)
            .map_err(|e| crate::Error::Config(format!("Invalid wallet URL: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(success_url) = &self.success_url {
                query.append_pair("success_url", success_url);
            }
            if let Some(failure_url) = &self.failure_url {
                query.append_pair("failure_url", failure_url);
            }
            query.append_pair("contract_id", self.contract_id.as_str());
            query.append_pair("public_key", &public_key.to_string());
        }
        Ok(url)
    }

    /// Finish sign-in after the wallet approved `public_key` for `account_id`.
    ///
    /// Returns whether the session is now signed in.
    pub async fn complete_sign_in(
        &self,
        account_id: &str,
        public_key: &str,
    ) -> Result<bool, crate::Error> {
        let Some(store) = self.session_store() else {
            return Ok(false);
        };
        let account_id: AccountId = account_id
            .parse()
            .map_err(|e| crate::Error::Config(format!("Invalid account id: {e}")))?;

        let mut credentials = store.load()?;
        if !credentials.promote_pending(account_id.as_str(), public_key) {
            warn!(account = %account_id, key = public_key, "No pending key to complete sign-in");
            return Ok(false);
        }
        credentials.network_id = self.network.network_id.clone();
        store.save(&credentials)?;

        self.initialize(Some(store)).await;
        Ok(self.is_signed_in())
    }

    /// Forget the signed-in account and reload the session.
    ///
    /// No-op when no session handle exists.
    pub async fn sign_out(&self) -> Result<(), crate::Error> {
        if self.wallet().is_none() {
            return Ok(());
        }
        let Some(store) = self.session_store() else {
            return Ok(());
        };

        let mut credentials = store.load()?;
        let account = credentials.account_id.clone();
        credentials.forget_account();
        store.save(&credentials)?;
        info!(account = ?account, "Signed out, reloading session");

        self.initialize(Some(store)).await;
        Ok(())
    }

    // --- Read access ---

    pub fn near(&self) -> Option<Arc<NearConnection>> {
        self.read_state().near.clone()
    }

    pub fn wallet(&self) -> Option<Arc<WalletConnection>> {
        self.read_state().wallet.clone()
    }

    /// An absent session handle reads as signed out.
    pub fn is_signed_in(&self) -> bool {
        self.wallet().is_some_and(|w| w.is_signed_in())
    }

    pub fn session(&self) -> Session {
        let wallet = self.wallet();
        Session {
            account_id: wallet.as_ref().and_then(|w| w.account_id().cloned()),
            is_signed_in: wallet.as_ref().is_some_and(|w| w.is_signed_in()),
            network_endpoint: self.network.node_url.clone(),
        }
    }

    pub fn contract_id(&self) -> &AccountId {
        &self.contract_id
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    fn session_store(&self) -> Option<Arc<dyn CredentialStore>> {
        let state = self.read_state();
        state.wallet.as_ref()?;
        state.store.clone()
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Signer for the stored signed-in account, if it has a key.
fn restore_signer(
    credentials: &crate::credentials::Credentials,
) -> Result<Option<Signer>, crate::Error> {
    let Some(account) = credentials.account_id.as_deref() else {
        return Ok(None);
    };
    let Some(key) = credentials.account_key(account) else {
        warn!(account, "Signed-in account has no stored key");
        return Ok(None);
    };

    let account_id: AccountId = account
        .parse()
        .map_err(|e| crate::Error::Credentials(format!("Invalid stored account: {e}")))?;
    let secret_key = SecretKey::from_str(&key.secret_key)
        .map_err(|e| crate::Error::Credentials(format!("Invalid stored secret key: {e}")))?;

    Ok(Some(InMemorySigner::from_secret_key(account_id, secret_key)))
}
