//! Wallet session lifecycle over a credential file.

use anyhow::Result;
use gaia_mint::credentials::{CredentialStore, FileCredentialStore};
use gaia_mint::notify::TracingNotifier;
use gaia_mint::{MintOrchestrator, MintOutcome, MintSettings};
use std::sync::Arc;
use std::time::Duration;

use crate::utils::{open_sale, session, ScriptedLedger};

fn file_store(dir: &tempfile::TempDir, key: Option<&str>) -> Arc<dyn CredentialStore> {
    let path = dir.path().join("credentials").join("gaia-mint.json");
    match key {
        Some(key) => Arc::new(FileCredentialStore::new_encrypted(path, key).unwrap()),
        None => Arc::new(FileCredentialStore::new_plaintext(path)),
    }
}

/// Sign `account` in through the wallet flow.
async fn sign_in(ledger: Arc<ScriptedLedger>, store: Arc<dyn CredentialStore>, account: &str) {
    let manager = session(ledger, Some(store)).await;
    assert!(!manager.is_signed_in());
    let request = manager.sign_in().unwrap().expect("session handle exists");
    let ok = manager
        .complete_sign_in(account, &request.public_key.to_string())
        .await
        .unwrap();
    assert!(ok);
}

#[tokio::test]
async fn test_sign_in_persists_across_restarts() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let ledger = ScriptedLedger::new(10);
    sign_in(ledger.clone(), file_store(&dir, None), "alice.testnet").await;

    let restarted = session(ledger, Some(file_store(&dir, None))).await;
    let s = restarted.session();
    assert!(s.is_signed_in);
    assert_eq!(s.account_id.unwrap().as_str(), "alice.testnet");
    assert_eq!(s.network_endpoint, "https://rpc.testnet.near.org");
    Ok(())
}

#[tokio::test]
async fn test_encrypted_store_round_trips_session() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let key = format!("{}=", "A".repeat(43));
    let ledger = ScriptedLedger::new(10);
    sign_in(ledger.clone(), file_store(&dir, Some(&key)), "alice.testnet").await;

    let raw = std::fs::read(dir.path().join("credentials").join("gaia-mint.json"))?;
    assert!(!String::from_utf8_lossy(&raw).contains("alice.testnet"));

    let restarted = session(ledger.clone(), Some(file_store(&dir, Some(&key)))).await;
    assert!(restarted.is_signed_in());

    // Wrong key: load fails, session stays unestablished.
    let other_key = format!("{}A=", "B".repeat(42));
    let wrong = session(ledger, Some(file_store(&dir, Some(&other_key)))).await;
    assert!(wrong.wallet().is_none());
    assert!(!wrong.is_signed_in());
    Ok(())
}

#[tokio::test]
async fn test_sign_out_then_mint_is_rejected() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let ledger = ScriptedLedger::new(10);
    sign_in(ledger.clone(), file_store(&dir, None), "alice.testnet").await;

    let manager = session(ledger.clone(), Some(file_store(&dir, None))).await;
    let orch = MintOrchestrator::new(
        manager.clone(),
        Arc::new(TracingNotifier),
        MintSettings::default(),
    )
    .with_schedule(open_sale());
    assert!(matches!(orch.mint().await, MintOutcome::Minted { .. }));

    manager.sign_out().await?;
    assert!(!manager.is_signed_in());
    assert_eq!(orch.mint().await, MintOutcome::NotSignedIn);
    assert_eq!(ledger.calls().len(), 1);

    let restarted = session(ledger, Some(file_store(&dir, None))).await;
    assert!(!restarted.is_signed_in());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_poller_pauses_after_sign_out() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let ledger = ScriptedLedger::new(10);
    sign_in(ledger.clone(), file_store(&dir, None), "alice.testnet").await;

    let manager = session(ledger.clone(), Some(file_store(&dir, None))).await;
    let orch = MintOrchestrator::new(
        manager.clone(),
        Arc::new(TracingNotifier),
        MintSettings::default(),
    );
    let poller = orch.start_polling();

    tokio::time::sleep(Duration::from_millis(2001)).await;
    assert_eq!(ledger.supply_queries(), 1);

    manager.sign_out().await?;
    tokio::time::sleep(Duration::from_millis(6000)).await;
    assert_eq!(ledger.supply_queries(), 1);

    poller.stop().await;
    Ok(())
}
