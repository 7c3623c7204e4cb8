//! Sale phases and their countdowns.

use std::time::{SystemTime, UNIX_EPOCH};

/// One phase of the sale, opening at `starts_at_ms` (unix millis).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SalePhase {
    pub name: &'static str,
    pub starts_at_ms: u64,
    /// Shown once the phase has opened.
    pub started_message: &'static str,
}

/// The four phases of the Gaia Archives sale, in order.
pub const GAIA_SALE: [SalePhase; 4] = [
    SalePhase {
        name: "OG/Alpha",
        starts_at_ms: 1_663_851_600_000,
        started_message: "OG Sale Started",
    },
    SalePhase {
        name: "Apprentice",
        starts_at_ms: 1_663_853_400_000,
        started_message: "OG Sale Ended and Apprentice Sale Started",
    },
    SalePhase {
        name: "Whitelist",
        starts_at_ms: 1_663_855_200_000,
        started_message: "Apprentice Sale Ended and Whitelist Sale Started",
    },
    SalePhase {
        name: "Public",
        starts_at_ms: 1_663_857_000_000,
        started_message: "Whitelist Sale Ended and Public Sale Started",
    },
];

/// Time left until an instant, split the way the countdown shows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl Countdown {
    pub fn until(target_ms: u64, now_ms: u64) -> Option<Self> {
        let total = target_ms.checked_sub(now_ms).filter(|t| *t > 0)?;
        let secs = total / 1000;
        Some(Self {
            days: secs / 86_400,
            hours: secs / 3_600 % 24,
            minutes: secs / 60 % 60,
            seconds: secs % 60,
        })
    }
}

impl std::fmt::Display for Countdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} days {} hours {} minutes {} seconds",
            self.days, self.hours, self.minutes, self.seconds
        )
    }
}

/// Ordered sale phases.
#[derive(Debug, Clone)]
pub struct SaleSchedule {
    phases: Vec<SalePhase>,
}

impl Default for SaleSchedule {
    fn default() -> Self {
        Self::new(GAIA_SALE.to_vec())
    }
}

impl SaleSchedule {
    pub fn new(mut phases: Vec<SalePhase>) -> Self {
        phases.sort_by_key(|p| p.starts_at_ms);
        Self { phases }
    }

    pub fn phases(&self) -> &[SalePhase] {
        &self.phases
    }

    /// Latest phase that has opened at `now_ms`.
    pub fn current_phase(&self, now_ms: u64) -> Option<&SalePhase> {
        self.phases.iter().rev().find(|p| p.starts_at_ms <= now_ms)
    }

    /// Whether the first phase has opened. An empty schedule is always open.
    pub fn has_started(&self, now_ms: u64) -> bool {
        self.phases
            .first()
            .map_or(true, |p| p.starts_at_ms <= now_ms)
    }

    /// One status line per phase: countdown, or its started message.
    pub fn status_lines(&self, now_ms: u64) -> Vec<(&'static str, String)> {
        self.phases
            .iter()
            .map(|p| {
                let text = match Countdown::until(p.starts_at_ms, now_ms) {
                    Some(countdown) => countdown.to_string(),
                    None => p.started_message.to_string(),
                };
                (p.name, text)
            })
            .collect()
    }
}

/// Current unix time in milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
