//! Prometheus-style counters (lock-free atomics).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    // --- Polling ---
    pub polls_total: AtomicU64,
    pub poll_errors: AtomicU64,

    // --- Minting ---
    pub mint_total: AtomicU64,
    pub mint_success: AtomicU64,
    pub mint_error: AtomicU64,
    pub mint_rejected: AtomicU64,
    pub mint_duration_us_sum: AtomicU64,

    // --- RPC ---
    pub rpc_failovers: AtomicU64,
    pub rpc_errors: AtomicU64,
}

impl Metrics {
    const fn new() -> Self {
        Self {
            polls_total: AtomicU64::new(0),
            poll_errors: AtomicU64::new(0),
            mint_total: AtomicU64::new(0),
            mint_success: AtomicU64::new(0),
            mint_error: AtomicU64::new(0),
            mint_rejected: AtomicU64::new(0),
            mint_duration_us_sum: AtomicU64::new(0),
            rpc_failovers: AtomicU64::new(0),
            rpc_errors: AtomicU64::new(0),
        }
    }

    pub fn record_mint_duration(&self, start: Instant) {
        let us = start.elapsed().as_micros() as u64;
        self.mint_duration_us_sum.fetch_add(us, Ordering::Relaxed);
    }

    /// Render in Prometheus text exposition format.
    pub fn render(&self, supply: u64, remaining: i64) -> String {
        let polls_total = self.polls_total.load(Ordering::Relaxed);
        let poll_errors = self.poll_errors.load(Ordering::Relaxed);
        let mint_total = self.mint_total.load(Ordering::Relaxed);
        let mint_success = self.mint_success.load(Ordering::Relaxed);
        let mint_error = self.mint_error.load(Ordering::Relaxed);
        let mint_rejected = self.mint_rejected.load(Ordering::Relaxed);
        let mint_dur_sum_s =
            self.mint_duration_us_sum.load(Ordering::Relaxed) as f64 / 1_000_000.0;
        let rpc_failovers = self.rpc_failovers.load(Ordering::Relaxed);
        let rpc_errors = self.rpc_errors.load(Ordering::Relaxed);

        format!(
            "\
# HELP gaia_mint_polls_total Total supply polls issued.\n\
# TYPE gaia_mint_polls_total counter\n\
gaia_mint_polls_total {polls_total}\n\
# HELP gaia_mint_poll_errors_total Supply polls that failed.\n\
# TYPE gaia_mint_poll_errors_total counter\n\
gaia_mint_poll_errors_total {poll_errors}\n\
# HELP gaia_mint_mint_total Mint attempts.\n\
# TYPE gaia_mint_mint_total counter\n\
gaia_mint_mint_total {mint_total}\n\
# HELP gaia_mint_mint_success_total Mints that succeeded on chain.\n\
# TYPE gaia_mint_mint_success_total counter\n\
gaia_mint_mint_success_total {mint_success}\n\
# HELP gaia_mint_mint_error_total Mints that failed.\n\
# TYPE gaia_mint_mint_error_total counter\n\
gaia_mint_mint_error_total {mint_error}\n\
# HELP gaia_mint_mint_rejected_total Mints rejected before submission.\n\
# TYPE gaia_mint_mint_rejected_total counter\n\
gaia_mint_mint_rejected_total {mint_rejected}\n\
# HELP gaia_mint_mint_duration_seconds_sum Total mint submission time (seconds).\n\
# TYPE gaia_mint_mint_duration_seconds_sum counter\n\
gaia_mint_mint_duration_seconds_sum {mint_dur_sum_s:.6}\n\
# HELP gaia_mint_rpc_failovers_total RPC primary-to-fallback failovers.\n\
# TYPE gaia_mint_rpc_failovers_total counter\n\
gaia_mint_rpc_failovers_total {rpc_failovers}\n\
# HELP gaia_mint_rpc_errors_total RPC errors.\n\
# TYPE gaia_mint_rpc_errors_total counter\n\
gaia_mint_rpc_errors_total {rpc_errors}\n\
# HELP gaia_mint_supply Total minted, as last polled.\n\
# TYPE gaia_mint_supply gauge\n\
gaia_mint_supply {supply}\n\
# HELP gaia_mint_remaining Remaining supply (may be negative).\n\
# TYPE gaia_mint_remaining gauge\n\
gaia_mint_remaining {remaining}\n"
        )
    }
}
