//! # Gaia Mint
//!
//! Minting client for the Gaia Archives NFT sale on NEAR. Keeps a wallet
//! session, polls the sale contract for the minted supply and submits
//! `nft_mint` transactions at the right price.
//!
//! ## Quick Start
//! ```bash
//! cargo run --bin gaia-mint -- login
//! cargo run --bin gaia-mint -- mint
//! ```

pub mod config;
pub mod credentials;
mod error;
pub mod ledger;
pub mod metrics;
pub mod mint;
pub mod notify;
pub mod pricing;
pub mod rpc;
pub mod schedule;
pub mod wallet;

pub use config::Config;
pub use error::{panic_message, Error};
pub use mint::{MintOrchestrator, MintOutcome, MintSettings, SupplyPoller};
pub use wallet::{Session, WalletSessionManager};
