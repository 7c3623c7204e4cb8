//! End-to-end mint flows against a scripted sale contract.

use anyhow::Result;
use gaia_mint::notify::{Level, CONNECT_WALLET, NFT_MINTED, SALE_NOT_STARTED};
use gaia_mint::schedule::{SalePhase, SaleSchedule};
use gaia_mint::{MintOrchestrator, MintOutcome, MintSettings};
use near_token::NearToken;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::utils::{
    orchestrator, session, signed_in_store, MintBehavior, RecordingNotifier, ScriptedLedger,
};

#[tokio::test]
async fn test_free_mint_below_free_limit() -> Result<()> {
    let ledger = ScriptedLedger::new(400);
    let (orch, notes) = orchestrator(ledger.clone(), Some("alice.testnet")).await;
    orch.refresh_supply().await?;

    let outcome = orch.mint().await;
    assert!(matches!(outcome, MintOutcome::Minted { ref price, .. } if price.is_free()));

    let calls = ledger.calls();
    assert_eq!(calls.len(), 1);
    let (signer, call) = &calls[0];
    assert_eq!(signer.as_str(), "alice.testnet");
    assert_eq!(call.receiver_id.as_str(), "gloryfifth.testnet");
    assert_eq!(call.method_name, "nft_mint");
    assert_eq!(call.args, json!({}));
    assert_eq!(call.gas, 300_000_000_000_000);
    assert_eq!(call.deposit, 0);

    let notes = notes.all();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].level, Level::Success);
    assert_eq!(notes[0].message, NFT_MINTED);
    Ok(())
}

#[tokio::test]
async fn test_paid_mint_above_free_limit() -> Result<()> {
    let ledger = ScriptedLedger::new(500);
    let (orch, _) = orchestrator(ledger.clone(), Some("alice.testnet")).await;
    orch.refresh_supply().await?;

    match orch.mint().await {
        MintOutcome::Minted { price, .. } => assert_eq!(price.as_str(), "5"),
        other => panic!("expected a mint, got {other:?}"),
    }
    assert_eq!(ledger.calls()[0].1.deposit, NearToken::from_near(5).as_yoctonear());
    Ok(())
}

#[tokio::test]
async fn test_free_limit_boundary() -> Result<()> {
    let ledger = ScriptedLedger::new(434);
    let (orch, _) = orchestrator(ledger.clone(), Some("alice.testnet")).await;

    orch.refresh_supply().await?;
    orch.mint().await;
    ledger.set_supply(435);
    orch.refresh_supply().await?;
    orch.mint().await;

    let deposits: Vec<u128> = ledger.calls().iter().map(|(_, c)| c.deposit).collect();
    assert_eq!(deposits, vec![0, NearToken::from_near(5).as_yoctonear()]);
    Ok(())
}

#[tokio::test]
async fn test_discount_list_mints_free_after_limit() -> Result<()> {
    let ledger = ScriptedLedger::new(500);
    ledger.set_discount_list(&["bob.testnet", "alice.testnet"]);
    let (orch, _) = orchestrator(ledger.clone(), Some("alice.testnet")).await;
    orch.refresh_supply().await?;

    assert!(matches!(orch.mint().await, MintOutcome::Minted { .. }));
    assert_eq!(ledger.calls()[0].1.deposit, 0);
    Ok(())
}

#[tokio::test]
async fn test_contract_panic_surfaces_message() -> Result<()> {
    let ledger = ScriptedLedger::new(500);
    ledger.set_behavior(MintBehavior::Panic("Sold out".into()));
    let (orch, notes) = orchestrator(ledger.clone(), Some("alice.testnet")).await;
    orch.refresh_supply().await?;

    assert_eq!(
        orch.mint().await,
        MintOutcome::Failed {
            message: "Sold out".into()
        }
    );
    let notes = notes.all();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].level, Level::Error);
    assert_eq!(notes[0].message, "Sold out");
    assert!(!orch.is_minting());
    Ok(())
}

#[tokio::test]
async fn test_unrecognized_failure_is_unknown_error() -> Result<()> {
    let ledger = ScriptedLedger::new(10);
    ledger.set_behavior(MintBehavior::Fail(json!({ "InvalidTxError": "Expired" })));
    let (orch, notes) = orchestrator(ledger, Some("alice.testnet")).await;

    assert_eq!(
        orch.mint().await,
        MintOutcome::Failed {
            message: "unknown error".into()
        }
    );
    assert_eq!(notes.all()[0].message, "unknown error");
    Ok(())
}

#[tokio::test]
async fn test_mint_requires_sign_in() -> Result<()> {
    let ledger = ScriptedLedger::new(10);
    let (orch, notes) = orchestrator(ledger.clone(), None).await;

    assert_eq!(orch.mint().await, MintOutcome::NotSignedIn);
    assert!(ledger.calls().is_empty());
    let notes = notes.all();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].level, Level::Warning);
    assert_eq!(notes[0].message, CONNECT_WALLET);
    Ok(())
}

#[tokio::test]
async fn test_discount_list_read_failure_aborts_mint() -> Result<()> {
    let ledger = ScriptedLedger::new(10);
    let (orch, notes) = orchestrator(ledger.clone(), Some("alice.testnet")).await;
    ledger.set_fail_views(true);

    assert!(matches!(orch.mint().await, MintOutcome::Failed { .. }));
    assert!(ledger.calls().is_empty());
    assert_eq!(notes.all()[0].level, Level::Error);
    assert!(!orch.is_minting());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_second_mint_rejected_while_in_flight() -> Result<()> {
    let ledger = ScriptedLedger::new(10);
    ledger.set_call_delay(Duration::from_millis(500));
    let (orch, notes) = orchestrator(ledger.clone(), Some("alice.testnet")).await;

    let (first, second) = tokio::join!(orch.mint(), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(orch.is_minting());
        orch.mint().await
    });

    assert!(matches!(first, MintOutcome::Minted { .. }));
    assert_eq!(second, MintOutcome::AlreadyMinting);
    assert_eq!(ledger.calls().len(), 1);
    // Only the first mint reports anything.
    assert_eq!(notes.all().len(), 1);
    assert!(!orch.is_minting());

    assert!(matches!(orch.mint().await, MintOutcome::Minted { .. }));
    assert_eq!(ledger.calls().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_sale_not_started_blocks_mint() -> Result<()> {
    let ledger = ScriptedLedger::new(10);
    let session = session(ledger.clone(), Some(signed_in_store("alice.testnet"))).await;
    let notes = Arc::new(RecordingNotifier::default());
    let future = SaleSchedule::new(vec![SalePhase {
        name: "Public",
        starts_at_ms: u64::MAX,
        started_message: "Public Sale Started",
    }]);
    let orch = MintOrchestrator::new(session, notes.clone(), MintSettings::default())
        .with_schedule(future);

    assert_eq!(orch.mint().await, MintOutcome::SaleNotStarted);
    assert!(ledger.calls().is_empty());
    assert_eq!(notes.all()[0].message, SALE_NOT_STARTED);
    Ok(())
}

#[tokio::test]
async fn test_schedule_gate_can_be_disabled() -> Result<()> {
    let ledger = ScriptedLedger::new(10);
    let session = session(ledger.clone(), Some(signed_in_store("alice.testnet"))).await;
    let settings = MintSettings {
        enforce_schedule: false,
        ..MintSettings::default()
    };
    let future = SaleSchedule::new(vec![SalePhase {
        name: "Public",
        starts_at_ms: u64::MAX,
        started_message: "Public Sale Started",
    }]);
    let orch = MintOrchestrator::new(session, Arc::new(RecordingNotifier::default()), settings)
        .with_schedule(future);

    assert!(matches!(orch.mint().await, MintOutcome::Minted { .. }));
    assert_eq!(ledger.calls().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_remaining_goes_negative_when_oversold() -> Result<()> {
    let ledger = ScriptedLedger::new(540);
    let (orch, _) = orchestrator(ledger, Some("alice.testnet")).await;
    assert_eq!(orch.remaining(), 538);

    orch.refresh_supply().await?;
    assert_eq!(orch.supply(), 540);
    assert_eq!(orch.remaining(), -2);
    assert_eq!(orch.price_preview().as_str(), "5");
    Ok(())
}

#[tokio::test]
async fn test_refresh_requires_sign_in() -> Result<()> {
    let ledger = ScriptedLedger::new(10);
    let (orch, _) = orchestrator(ledger.clone(), None).await;

    assert!(orch.refresh_supply().await.is_err());
    assert_eq!(ledger.supply_queries(), 0);
    assert_eq!(orch.supply(), 0);
    Ok(())
}

#[tokio::test]
async fn test_mint_with_fresh_supply_prices_from_chain() -> Result<()> {
    let ledger = ScriptedLedger::new(500);
    let (orch, _) = orchestrator(ledger.clone(), Some("alice.testnet")).await;
    assert_eq!(orch.supply(), 0);

    assert!(matches!(
        orch.mint_with_fresh_supply().await,
        MintOutcome::Minted { .. }
    ));
    assert_eq!(orch.supply(), 500);
    assert_eq!(
        ledger.calls()[0].1.deposit,
        NearToken::from_near(5).as_yoctonear()
    );
    Ok(())
}

#[tokio::test]
async fn test_mint_with_unreadable_supply_is_refused() -> Result<()> {
    let ledger = ScriptedLedger::new(500);
    ledger.set_fail_views(true);
    let (orch, notes) = orchestrator(ledger.clone(), Some("alice.testnet")).await;

    assert!(matches!(
        orch.mint_with_fresh_supply().await,
        MintOutcome::Failed { .. }
    ));
    assert!(ledger.calls().is_empty());
    assert_eq!(notes.all()[0].level, Level::Error);
    assert!(!orch.is_minting());
    Ok(())
}

#[tokio::test]
async fn test_mint_with_fresh_supply_signed_out_warns() -> Result<()> {
    let ledger = ScriptedLedger::new(500);
    let (orch, notes) = orchestrator(ledger.clone(), None).await;

    assert_eq!(orch.mint_with_fresh_supply().await, MintOutcome::NotSignedIn);
    assert_eq!(ledger.supply_queries(), 0);
    assert_eq!(notes.all()[0].message, CONNECT_WALLET);
    Ok(())
}
