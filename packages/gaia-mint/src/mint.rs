//! Mint orchestrator: supply polling, price selection and the mint call.
//!
//! The orchestrator keeps a locally cached total-minted counter fresh by
//! polling the contract, and drives one `nft_mint` transaction at a time
//! through the wallet session. Outcomes surface as notifications.

use crate::config::Config;
use crate::ledger::FunctionCall;
use crate::metrics::METRICS;
use crate::notify::{Notification, Notifier, CONNECT_WALLET, NFT_MINTED, SALE_NOT_STARTED};
use crate::pricing::{mint_price, MintPrice};
use crate::schedule::{now_ms, SaleSchedule};
use crate::wallet::{WalletConnection, WalletSessionManager};
use near_primitives::types::AccountId;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const TOTAL_SUPPLY_METHOD: &str = "get_total_supply";
const DISCOUNT_LIST_METHOD: &str = "get_contributor_0";
const MINT_METHOD: &str = "nft_mint";

/// Sale parameters the orchestrator works with.
#[derive(Debug, Clone)]
pub struct MintSettings {
    pub free_limit: u64,
    pub total_supply: u64,
    pub paid_price: String,
    pub max_gas: u64,
    pub poll_interval: Duration,
    pub enforce_schedule: bool,
}

impl Default for MintSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for MintSettings {
    fn from(config: &Config) -> Self {
        Self {
            free_limit: config.free_limit,
            total_supply: config.total_supply,
            paid_price: config.mint_price.clone(),
            max_gas: config.max_gas,
            poll_interval: config.poll_interval(),
            enforce_schedule: config.enforce_schedule,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MintState {
    Idle,
    InFlight,
}

/// What a call to [`MintOrchestrator::mint`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MintOutcome {
    Minted { tx_hash: String, price: MintPrice },
    NotSignedIn,
    SaleNotStarted,
    /// Another mint is still in flight; nothing was submitted.
    AlreadyMinting,
    Failed { message: String },
}

/// RAII guard for the in-flight flag. Back to idle on drop.
struct MintingGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> MintingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for MintingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct MintOrchestrator {
    session: Arc<WalletSessionManager>,
    notifier: Arc<dyn Notifier>,
    settings: MintSettings,
    schedule: SaleSchedule,
    supply: Arc<AtomicU64>,
    minting: AtomicBool,
}

impl MintOrchestrator {
    pub fn new(
        session: Arc<WalletSessionManager>,
        notifier: Arc<dyn Notifier>,
        settings: MintSettings,
    ) -> Self {
        Self {
            session,
            notifier,
            settings,
            schedule: SaleSchedule::default(),
            supply: Arc::new(AtomicU64::new(0)),
            minting: AtomicBool::new(false),
        }
    }

    pub fn with_schedule(mut self, schedule: SaleSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    // --- Read access ---

    /// Total minted, as last read from the contract.
    pub fn supply(&self) -> u64 {
        self.supply.load(Ordering::Relaxed)
    }

    /// `total_supply - supply`. Not clamped: negative if the contract
    /// reports more than the configured total.
    pub fn remaining(&self) -> i64 {
        self.settings.total_supply as i64 - self.supply() as i64
    }

    pub fn state(&self) -> MintState {
        if self.minting.load(Ordering::Acquire) {
            MintState::InFlight
        } else {
            MintState::Idle
        }
    }

    pub fn is_minting(&self) -> bool {
        self.state() == MintState::InFlight
    }

    /// Price shown before the discount list is consulted.
    pub fn price_preview(&self) -> MintPrice {
        if self.supply() > self.settings.free_limit {
            MintPrice::new(self.settings.paid_price.clone())
        } else {
            MintPrice::free()
        }
    }

    pub fn settings(&self) -> &MintSettings {
        &self.settings
    }

    pub fn schedule(&self) -> &SaleSchedule {
        &self.schedule
    }

    // --- Polling ---

    /// Read the total supply once and cache it. Requires a signed-in session.
    pub async fn refresh_supply(&self) -> Result<u64, crate::Error> {
        let wallet = self
            .signed_in_wallet()
            .ok_or_else(|| crate::Error::Credentials("wallet is not signed in".into()))?;
        let total = fetch_total_supply(&wallet, self.session.contract_id()).await?;
        self.supply.store(total, Ordering::Relaxed);
        Ok(total)
    }

    /// Start refreshing the supply counter every poll interval.
    ///
    /// Ticks are skipped while signed out; failed reads are ignored until the
    /// next tick. The poller stops when the returned handle is stopped or dropped.
    pub fn start_polling(&self) -> SupplyPoller {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(poll_supply(
            Arc::clone(&self.session),
            Arc::clone(&self.supply),
            self.settings.poll_interval,
            cancel.clone(),
        ));
        info!(interval_ms = self.settings.poll_interval.as_millis() as u64, "Supply poller started");
        SupplyPoller {
            cancel,
            task: Some(task),
        }
    }

    // --- Minting ---

    /// Mint one token for the signed-in account.
    pub async fn mint(&self) -> MintOutcome {
        METRICS.mint_total.fetch_add(1, Ordering::Relaxed);

        let Some((wallet, account_id)) = self
            .signed_in_wallet()
            .and_then(|w| w.account_id().cloned().map(|a| (w, a)))
        else {
            METRICS.mint_rejected.fetch_add(1, Ordering::Relaxed);
            self.notifier.notify(Notification::warning(CONNECT_WALLET));
            return MintOutcome::NotSignedIn;
        };

        if self.settings.enforce_schedule && !self.schedule.has_started(now_ms()) {
            METRICS.mint_rejected.fetch_add(1, Ordering::Relaxed);
            self.notifier.notify(Notification::warning(SALE_NOT_STARTED));
            return MintOutcome::SaleNotStarted;
        }

        let contract_id = self.session.contract_id();
        let discount_list: Vec<AccountId> = match wallet
            .view_function(contract_id, DISCOUNT_LIST_METHOD, json!({}))
            .await
        {
            Ok(list) => list,
            Err(e) => return self.fail(&e, "Failed to read discount list"),
        };

        let price = mint_price(
            self.supply(),
            self.settings.free_limit,
            &self.settings.paid_price,
            &discount_list,
            &account_id,
        );
        let deposit = match price.to_yocto() {
            Ok(d) => d,
            Err(e) => return self.fail(&e, "Invalid mint price"),
        };

        let Some(_guard) = MintingGuard::acquire(&self.minting) else {
            METRICS.mint_rejected.fetch_add(1, Ordering::Relaxed);
            warn!(account = %account_id, "Mint already in flight, ignoring");
            return MintOutcome::AlreadyMinting;
        };

        info!(account = %account_id, supply = self.supply(), price = %price, "Minting");
        let start = Instant::now();
        let result = wallet
            .function_call(FunctionCall {
                receiver_id: contract_id.clone(),
                method_name: MINT_METHOD.to_string(),
                args: json!({}),
                gas: self.settings.max_gas,
                deposit,
            })
            .await;
        METRICS.record_mint_duration(start);

        match result {
            Ok(outcome) => {
                METRICS.mint_success.fetch_add(1, Ordering::Relaxed);
                info!(account = %account_id, tx_hash = %outcome.tx_hash, "NFT minted");
                self.notifier.notify(Notification::success(NFT_MINTED));
                MintOutcome::Minted {
                    tx_hash: outcome.tx_hash,
                    price,
                }
            }
            Err(e) => self.fail(&e, "Mint transaction failed"),
        }
    }

    /// Re-read the supply, then [`mint`](Self::mint).
    ///
    /// When signed in and the supply cannot be read, fails without
    /// submitting: the cached counter may still be the initial 0, which
    /// would price the mint as free.
    pub async fn mint_with_fresh_supply(&self) -> MintOutcome {
        if self.signed_in_wallet().is_some() {
            if let Err(e) = self.refresh_supply().await {
                return self.fail(&e, "Could not read supply before minting");
            }
        }
        self.mint().await
    }

    fn fail(&self, e: &crate::Error, context: &'static str) -> MintOutcome {
        METRICS.mint_error.fetch_add(1, Ordering::Relaxed);
        error!(error = %e, "{context}");
        let message = e.user_message();
        self.notifier.notify(Notification::error(message.clone()));
        MintOutcome::Failed { message }
    }

    fn signed_in_wallet(&self) -> Option<Arc<WalletConnection>> {
        self.session.wallet().filter(|w| w.is_signed_in())
    }
}

/// Handle to a running supply poller.
pub struct SupplyPoller {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SupplyPoller {
    /// Stop polling and wait for the task to exit. No query is issued after
    /// this returns.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Supply poller task ended abnormally");
            }
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for SupplyPoller {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn poll_supply(
    session: Arc<WalletSessionManager>,
    supply: Arc<AtomicU64>,
    interval: Duration,
    cancel: CancellationToken,
) {
    // Fixed cadence from start; a slow query does not push later ticks back.
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {},
            _ = cancel.cancelled() => {
                debug!("Supply poller shutting down");
                return;
            }
        }

        let Some(wallet) = session.wallet().filter(|w| w.is_signed_in()) else {
            continue;
        };

        METRICS.polls_total.fetch_add(1, Ordering::Relaxed);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Supply poller shutting down mid-query");
                return;
            }
            result = fetch_total_supply(&wallet, session.contract_id()) => {
                match result {
                    Ok(total) => {
                        // Last write wins.
                        supply.store(total, Ordering::Relaxed);
                    }
                    Err(e) => {
                        METRICS.poll_errors.fetch_add(1, Ordering::Relaxed);
                        debug!(error = %e, "Supply poll failed");
                    }
                }
            }
        }
    }
}

async fn fetch_total_supply(
    wallet: &WalletConnection,
    contract_id: &AccountId,
) -> Result<u64, crate::Error> {
    wallet
        .view_function(contract_id, TOTAL_SUPPLY_METHOD, json!({}))
        .await
}
