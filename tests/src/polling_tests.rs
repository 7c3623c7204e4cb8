//! Supply poller behavior under virtual time.

use anyhow::Result;
use std::time::Duration;

use crate::utils::{orchestrator, ScriptedLedger};

const TICK: Duration = Duration::from_millis(2000);
const JUST_AFTER_TICK: Duration = Duration::from_millis(2001);

#[tokio::test(start_paused = true)]
async fn test_poller_tracks_remote_supply() -> Result<()> {
    let ledger = ScriptedLedger::new(100);
    let (orch, _) = orchestrator(ledger.clone(), Some("alice.testnet")).await;
    let poller = orch.start_polling();
    assert_eq!(orch.supply(), 0);

    tokio::time::sleep(JUST_AFTER_TICK).await;
    assert_eq!(orch.supply(), 100);
    assert_eq!(orch.remaining(), 438);

    // Another buyer mints; visible within one interval.
    ledger.set_supply(101);
    tokio::time::sleep(TICK).await;
    assert_eq!(orch.supply(), 101);

    poller.stop().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_no_queries_after_stop() -> Result<()> {
    let ledger = ScriptedLedger::new(100);
    let (orch, _) = orchestrator(ledger.clone(), Some("alice.testnet")).await;
    let poller = orch.start_polling();

    tokio::time::sleep(JUST_AFTER_TICK * 2).await;
    let seen = ledger.supply_queries();
    assert_eq!(seen, 2);

    poller.stop().await;
    ledger.set_supply(200);
    tokio::time::sleep(TICK * 5).await;
    assert_eq!(ledger.supply_queries(), seen);
    assert_eq!(orch.supply(), 100);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_dropping_poller_stops_it() -> Result<()> {
    let ledger = ScriptedLedger::new(100);
    let (orch, _) = orchestrator(ledger.clone(), Some("alice.testnet")).await;
    let poller = orch.start_polling();
    assert!(!poller.is_stopped());
    drop(poller);

    tokio::time::sleep(TICK * 5).await;
    assert_eq!(ledger.supply_queries(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_poller_idle_while_signed_out() -> Result<()> {
    let ledger = ScriptedLedger::new(100);
    let (orch, _) = orchestrator(ledger.clone(), None).await;
    let poller = orch.start_polling();

    tokio::time::sleep(TICK * 3).await;
    assert_eq!(ledger.supply_queries(), 0);
    assert_eq!(orch.supply(), 0);

    poller.stop().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_failed_poll_keeps_last_value() -> Result<()> {
    let ledger = ScriptedLedger::new(100);
    let (orch, _) = orchestrator(ledger.clone(), Some("alice.testnet")).await;
    let poller = orch.start_polling();

    tokio::time::sleep(JUST_AFTER_TICK).await;
    assert_eq!(orch.supply(), 100);

    ledger.set_supply(150);
    ledger.set_fail_views(true);
    tokio::time::sleep(TICK).await;
    assert_eq!(orch.supply(), 100);

    ledger.set_fail_views(false);
    tokio::time::sleep(TICK).await;
    assert_eq!(orch.supply(), 150);

    poller.stop().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_slow_reads_keep_fixed_cadence() -> Result<()> {
    let ledger = ScriptedLedger::new(100);
    ledger.set_supply_delay(Duration::from_millis(1500));
    let (orch, _) = orchestrator(ledger.clone(), Some("alice.testnet")).await;
    let poller = orch.start_polling();

    // Ticks at 2, 4, 6, 8 and 10 s regardless of read latency.
    tokio::time::sleep(Duration::from_millis(10_001)).await;
    assert_eq!(ledger.supply_queries(), 5);

    poller.stop().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_slow_reads_stay_within_one_interval() -> Result<()> {
    let ledger = ScriptedLedger::new(100);
    ledger.set_supply_delay(Duration::from_millis(1500));
    let (orch, _) = orchestrator(ledger.clone(), Some("alice.testnet")).await;
    let poller = orch.start_polling();

    // The read issued at 6 s returns at 7.5 s; change the supply just after.
    tokio::time::sleep(Duration::from_millis(7_501)).await;
    assert_eq!(orch.supply(), 100);
    ledger.set_supply(200);
    let changed_at = tokio::time::Instant::now();

    while orch.supply() != 200 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(changed_at.elapsed() <= TICK * 2, "supply never refreshed");
    }
    assert!(changed_at.elapsed() <= TICK);

    poller.stop().await;
    Ok(())
}
