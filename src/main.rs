//! Presale command-line client.
//!
//! The application root: loads configuration, constructs every
//! component explicitly, and passes references down. No component
//! reaches for a global.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use presale_client::config::{load_config, load_from_env, AppConfig};
use presale_client::contract::{ChainClient, PresaleContract};
use presale_client::lifecycle::{signals, Shutdown};
use presale_client::observability::logging;
use presale_client::purchase::{PurchaseController, PurchaseState};
use presale_client::session::{SessionEvent, SessionStore};
use presale_client::storage::Preferences;
use presale_client::wallet::pairing::unix_now;
use presale_client::wallet::WalletBridge;

/// Wallet-specific deep-link schemes rendered next to the pairing URI.
const DEEP_LINK_SCHEMES: &[&str] = &["metamask", "trust"];

#[derive(Parser)]
#[command(name = "presale", about = "Token presale client", version)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, short)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show presale totals and the countdown.
    Status,
    /// Establish and verify a wallet session.
    Connect,
    /// Purchase tokens with the given native-currency amount.
    Buy {
        /// Decimal amount, e.g. "0.01".
        #[arg(long)]
        amount: String,
    },
    /// End the current session and disable auto-reconnect.
    Disconnect,
    /// Record acceptance of the legal notice.
    AcceptDisclaimer,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => load_from_env()?,
    };
    logging::init(&config.observability.log_level);

    let app = App::build(config)?;
    match cli.command {
        Command::Status => app.status().await,
        Command::Connect => app.connect().await,
        Command::Buy { amount } => app.buy(&amount).await,
        Command::Disconnect => app.disconnect().await,
        Command::AcceptDisclaimer => app.accept_disclaimer(),
    }
}

/// Everything wired together, owned here and borrowed by components.
struct App {
    config: Arc<AppConfig>,
    store: Arc<SessionStore>,
    bridge: Arc<WalletBridge>,
    contract: Arc<PresaleContract>,
    controller: PurchaseController,
    shutdown: Shutdown,
}

impl App {
    fn build(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let config = Arc::new(config);
        let shutdown = Shutdown::new();
        let store = Arc::new(SessionStore::new());
        let chain = Arc::new(ChainClient::new(&config.chain)?);
        let bridge = Arc::new(WalletBridge::new(
            Arc::clone(&config),
            Arc::clone(&store),
            Arc::clone(&chain),
            shutdown.clone(),
        ));
        let contract = Arc::new(PresaleContract::new(
            &config.contract.address,
            Arc::clone(&chain),
            config.contract.receipt_timeout_secs,
        )?);
        // Validated at config load, so this parse cannot fail here.
        let min_purchase_wei = presale_client::contract::parse_native(&config.contract.min_purchase)?;
        let controller = PurchaseController::new(
            Arc::clone(&store),
            Arc::clone(&contract),
            Arc::clone(&bridge),
            min_purchase_wei,
        );

        Ok(Self {
            config,
            store,
            bridge,
            contract,
            controller,
            shutdown,
        })
    }

    fn prefs_path(&self) -> &Path {
        Path::new(&self.config.storage.prefs_path)
    }

    async fn status(&self) -> Result<(), Box<dyn std::error::Error>> {
        let info = self.contract.balance_info().await?;
        println!("Total raised:     {} BNB", info.total_raised_display());
        println!("Remaining tokens: {}", info.remaining_tokens_display());

        if let Some(end) = self.config.app.presale_end_unix {
            let now = match &self.config.app.time_api_url {
                Some(url) => fetch_server_time(url).await.unwrap_or_else(unix_now),
                None => unix_now(),
            };
            let (days, hours, minutes, seconds) = countdown(end.saturating_sub(now));
            println!(
                "Presale ends in:  {}d {}h {}m {}s",
                days, hours, minutes, seconds
            );
        }
        Ok(())
    }

    async fn connect(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_pairing_printer();

        let session = self.bridge.connect().await?;
        println!("Connected: {} (chain {})", session.address, session.chain_id);

        println!("Press ctrl-c to disconnect.");
        signals::shutdown_signal().await;
        self.bridge.disconnect().await;
        self.shutdown.trigger();
        println!("Disconnected.");
        Ok(())
    }

    async fn buy(&self, amount: &str) -> Result<(), Box<dyn std::error::Error>> {
        let prefs = Preferences::load(self.prefs_path())?;
        prefs.require_disclaimer()?;

        self.spawn_pairing_printer();
        if !self.store.is_connected() {
            let session = self.bridge.connect().await?;
            println!("Connected: {} (chain {})", session.address, session.chain_id);
        }

        let mut state_rx = self.controller.watch();
        let reporter = tokio::spawn(async move {
            while state_rx.changed().await.is_ok() {
                let state = *state_rx.borrow();
                if state != PurchaseState::Idle {
                    println!("  ... {}", state);
                }
            }
        });

        let result = self.controller.purchase(amount).await;
        reporter.abort();

        self.bridge.disconnect().await;
        self.shutdown.trigger();

        let record = result?;
        println!("Purchase confirmed: {} ({:?})", record.hash, record.status);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.bridge.disconnect().await;
        let mut prefs = Preferences::load(self.prefs_path())?;
        if prefs.auto_reconnect {
            prefs.auto_reconnect = false;
            prefs.save(self.prefs_path())?;
        }
        println!("Disconnected.");
        Ok(())
    }

    fn accept_disclaimer(&self) -> Result<(), Box<dyn std::error::Error>> {
        let mut prefs = Preferences::load(self.prefs_path())?;
        prefs.disclaimer_accepted = true;
        prefs.save(self.prefs_path())?;
        println!("Legal notice accepted.");
        Ok(())
    }

    /// Print the pairing URI and deep links when relay pairing starts.
    fn spawn_pairing_printer(&self) {
        let mut events = self.store.subscribe();
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                if let SessionEvent::PairingReady { uri, expires_at } = event {
                    println!("Scan or open to approve (valid until {}):", expires_at);
                    println!("  {}", uri);
                    if let Ok(pairing) = presale_client::wallet::Pairing::from_uri(&uri) {
                        for scheme in DEEP_LINK_SCHEMES {
                            println!("  {}", pairing.deep_link(scheme));
                        }
                    }
                }
            }
        });
    }
}

/// Break a remaining duration into days/hours/minutes/seconds.
fn countdown(remaining_secs: u64) -> (u64, u64, u64, u64) {
    let days = remaining_secs / 86_400;
    let hours = (remaining_secs % 86_400) / 3_600;
    let minutes = (remaining_secs % 3_600) / 60;
    let seconds = remaining_secs % 60;
    (days, hours, minutes, seconds)
}

/// Ask the optional time endpoint for authoritative unix time.
async fn fetch_server_time(url: &str) -> Option<u64> {
    let value: serde_json::Value = reqwest::get(url).await.ok()?.json().await.ok()?;
    value
        .get("now")
        .and_then(|v| v.as_u64())
        .or_else(|| value.as_u64())
}
