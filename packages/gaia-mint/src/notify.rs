//! User-facing notifications (fire-and-forget toasts).

use tokio::sync::broadcast;
use tracing::{error, info, warn};

pub const SALE_NOT_STARTED: &str = "NFT Sale is not started yet";
pub const CONNECT_WALLET: &str = "Please connect wallet!";
pub const NFT_MINTED: &str = "NFT minted!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Warning,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: Level,
    pub message: String,
}

impl Notification {
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: Level::Warning,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: Level::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            message: message.into(),
        }
    }
}

/// Sink for notifications. Delivery is best-effort and never blocks.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Emits notifications as log events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, n: Notification) {
        match n.level {
            Level::Warning => warn!(target: "gaia_mint::notify", "{}", n.message),
            Level::Success => info!(target: "gaia_mint::notify", "{}", n.message),
            Level::Error => error!(target: "gaia_mint::notify", "{}", n.message),
        }
    }
}

/// Fans notifications out to whoever is subscribed right now.
///
/// Nothing is retained for later subscribers.
pub struct BroadcastNotifier {
    tx: broadcast::Sender<Notification>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, notification: Notification) {
        // No receivers is fine.
        let _ = self.tx.send(notification);
    }
}
