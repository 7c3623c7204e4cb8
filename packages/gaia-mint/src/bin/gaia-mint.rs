//! Gaia Mint command-line client.

use clap::{Parser, Subcommand};
use gaia_mint::credentials::{CredentialStore, FileCredentialStore};
use gaia_mint::metrics::METRICS;
use gaia_mint::notify::TracingNotifier;
use gaia_mint::schedule::now_ms;
use near_token::NearToken;
use gaia_mint::{Config, MintOrchestrator, MintOutcome, MintSettings, WalletSessionManager};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "gaia-mint", version, about = "Mint Gaia Archives NFTs on NEAR")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the session, supply and sale schedule.
    Status,
    /// Print the wallet URL that authorizes this client.
    Login,
    /// Finish sign-in once the wallet approved the key.
    LoginComplete {
        account_id: String,
        public_key: String,
    },
    /// Forget the signed-in account.
    Logout,
    /// Mint one NFT.
    Mint,
    /// Poll the supply until interrupted.
    Watch,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config: Config = config::Config::builder()
        .add_source(config::File::with_name("gaia-mint").required(false))
        .add_source(config::Environment::with_prefix("GAIA_MINT"))
        .build()
        .and_then(|c| c.try_deserialize())
        .unwrap_or_else(|e| {
            warn!(error = %e, "Config unreadable, using defaults");
            Config::default()
        });

    info!(contract = %config.contract_id, rpc = %config.rpc_url, "Configuration loaded");

    let store: Arc<dyn CredentialStore> = match &config.credentials_key {
        Some(key) => Arc::new(FileCredentialStore::new_encrypted(
            PathBuf::from(&config.credentials_path),
            key,
        )?),
        None => Arc::new(FileCredentialStore::new_plaintext(PathBuf::from(
            &config.credentials_path,
        ))),
    };

    let session = Arc::new(WalletSessionManager::new(&config)?);
    session.initialize(Some(store)).await;

    let orchestrator = MintOrchestrator::new(
        Arc::clone(&session),
        Arc::new(TracingNotifier),
        MintSettings::from(&config),
    );

    match cli.command {
        Command::Status => status(&session, &orchestrator).await,
        Command::Login => match session.sign_in()? {
            Some(request) => {
                println!("Open this URL to authorize gaia-mint:\n{}", request.url);
                println!(
                    "Then run: gaia-mint login-complete <account_id> {}",
                    request.public_key
                );
            }
            None => error!("Not connected to NEAR, cannot sign in"),
        },
        Command::LoginComplete {
            account_id,
            public_key,
        } => {
            if session.complete_sign_in(&account_id, &public_key).await? {
                println!("Signed in as {account_id}");
            } else {
                error!(account = %account_id, "Sign-in could not be completed");
            }
        }
        Command::Logout => {
            session.sign_out().await?;
            println!("Signed out");
        }
        Command::Mint => {
            if let MintOutcome::Minted { tx_hash, price } =
                orchestrator.mint_with_fresh_supply().await
            {
                println!(
                    "Minted for {price}: {}/transactions/{tx_hash}",
                    session.network().explorer_url.trim_end_matches('/')
                );
            }
        }
        Command::Watch => watch(&session, &orchestrator).await,
    }

    Ok(())
}

async fn status(session: &WalletSessionManager, orchestrator: &MintOrchestrator) {
    let s = session.session();
    println!("Network:   {}", s.network_endpoint);
    match (&s.account_id, session.wallet().and_then(|w| w.balance())) {
        (Some(account), Some(balance)) => {
            println!("Account:   {account} ({})", NearToken::from_yoctonear(balance))
        }
        (Some(account), None) => println!("Account:   {account}"),
        _ => println!("Account:   not signed in"),
    }

    if s.is_signed_in {
        if let Err(e) = orchestrator.refresh_supply().await {
            warn!(error = %e, "Could not read supply");
        }
    }
    println!(
        "Supply:    {} / {} ({} remaining)",
        orchestrator.supply(),
        orchestrator.settings().total_supply,
        orchestrator.remaining()
    );
    println!("Price:     {}", orchestrator.price_preview());

    for (phase, line) in orchestrator.schedule().status_lines(now_ms()) {
        println!("{phase:<11}{line}");
    }
}

async fn watch(session: &WalletSessionManager, orchestrator: &MintOrchestrator) {
    if !session.is_signed_in() {
        warn!("Not signed in; the supply will not refresh until you log in");
    }
    let poller = orchestrator.start_polling();
    let mut ticker = tokio::time::interval(orchestrator.settings().poll_interval);
    let mut last = None;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let supply = orchestrator.supply();
                if last != Some(supply) {
                    info!(supply, remaining = orchestrator.remaining(), "Supply updated");
                    last = Some(supply);
                }
            }
            _ = &mut shutdown => break,
        }
    }

    poller.stop().await;
    info!("Supply poller stopped");
    print!(
        "{}",
        METRICS.render(orchestrator.supply(), orchestrator.remaining())
    );
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}
