//! pinvault: encrypted file vault with on-chain pinning
//!
//! Commands:
//!   upload <path>...          - encrypt and publish files, register them
//!   download <id> [<dest>]    - fetch, decrypt, verify and write a file
//!   list                      - show registered files and their pin state
//!   delete <id>               - forget a file (optionally unpin it locally)
//!   quote <id>... --days N    - price a pin batch without sending anything
//!   pin <id>... --days N      - buy on-chain pins, one transaction per file
//!   status                    - content store and ledger health
//!   wallet new|address        - create a key / show the configured address
//!   config show               - display current configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::{ExposeSecret, SecretString};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use pinvault_core::config::PinvaultConfig;
use pinvault_core::PinvaultError;
use pinvault_ledger::units::{format_ether, wei_to_gwei};
use pinvault_ledger::{Address, JsonRpcLedger, LedgerClient, NetworkSpec, PinningContract, Wallet};
use pinvault_sync::{
    record_successes, BatchOutcome, FileRegistry, GasPriceSetting, Lifecycle, PinEvent, PinPlan,
    PinRequest, PinTarget, PinningOrchestrator, ProgressFn, RecordSummary, SharedRegistry,
};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "pinvault",
    version,
    about = "Encrypted file vault with on-chain pinning",
    long_about = "pinvault: encrypt files locally, publish them to IPFS, and pay a pinning contract to keep them available"
)]
struct Cli {
    /// Path to pinvault.toml configuration file
    #[arg(
        long,
        short = 'c',
        env = "PINVAULT_CONFIG",
        default_value = "~/.config/pinvault/config.toml"
    )]
    config: PathBuf,

    /// Log level or filter (overrides logging.level; RUST_LOG wins over both)
    #[arg(long, env = "PINVAULT_LOG")]
    log: Option<String>,

    /// Log format (overrides logging.format)
    #[arg(long, env = "PINVAULT_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// File holding the hex signing key (otherwise PINVAULT_PRIVATE_KEY)
    #[arg(long, global = true)]
    key_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt files and publish them to the content store
    ///
    /// The password is read from PINVAULT_PASSWORD or prompted for.
    Upload {
        /// Files to upload
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Download and decrypt a registered file
    Download {
        /// File id (see `pinvault list`)
        file_id: String,
        /// Destination file or directory (default: current directory)
        dest: Option<PathBuf>,
    },

    /// List registered files
    List {
        /// Print the registry entries as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove a file from the registry
    Delete {
        file_id: String,
        /// Delete even when the file is pinned on-chain
        #[arg(long)]
        force: bool,
        /// Also release the content store's local pins
        #[arg(long)]
        unpin: bool,
    },

    /// Price an on-chain pin for files without sending a transaction
    Quote {
        #[command(flatten)]
        selection: Selection,
    },

    /// Pin files on-chain: one signed transaction per file
    Pin {
        #[command(flatten)]
        selection: Selection,
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Show content store and ledger status
    Status,

    /// Wallet management
    Wallet {
        #[command(subcommand)]
        action: WalletAction,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug)]
struct Selection {
    /// File ids to include
    file_ids: Vec<String>,
    /// Select every unpinned file
    #[arg(long, conflicts_with = "file_ids")]
    all: bool,
    /// Pin duration in days (default: pinning.default_duration_days)
    #[arg(long, short = 'd')]
    days: Option<u32>,
    /// Gas price in Gwei, or "auto"
    #[arg(long, default_value = "auto")]
    gas_price: String,
}

#[derive(Subcommand, Debug)]
enum WalletAction {
    /// Generate a new signing key and print it
    New,
    /// Show the address of the configured key
    Address,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = expand_tilde(&cli.config);
    let config = load_config(&config_path).await?;

    let level = cli.log.clone().unwrap_or_else(|| config.logging.level.clone());
    let format = cli.log_format.clone().unwrap_or(match config.logging.format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    });
    init_logging(&level, &format);
    debug!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        found = config_path.exists(),
        "pinvault starting"
    );

    config.validate().context("invalid configuration")?;

    match cli.command {
        Commands::Upload { paths } => cmd_upload(&config, &paths).await,
        Commands::Download { file_id, dest } => {
            cmd_download(&config, &file_id, dest.as_deref()).await
        }
        Commands::List { json } => cmd_list(&config, json),
        Commands::Delete { file_id, force, unpin } => {
            cmd_delete(&config, &file_id, force, unpin).await
        }
        Commands::Quote { selection } => {
            cmd_pin(&config, cli.key_file.as_deref(), &selection, PinMode::QuoteOnly).await
        }
        Commands::Pin { selection, yes } => {
            let mode = if yes { PinMode::Confirmed } else { PinMode::Ask };
            cmd_pin(&config, cli.key_file.as_deref(), &selection, mode).await
        }
        Commands::Status => cmd_status(&config, cli.key_file.as_deref()).await,
        Commands::Wallet { action: WalletAction::New } => cmd_wallet_new(),
        Commands::Wallet { action: WalletAction::Address } => {
            let wallet = load_wallet(cli.key_file.as_deref())?;
            println!("{}", wallet.address());
            Ok(())
        }
        Commands::Config { action: ConfigAction::Show } => cmd_config_show(&config, &config_path),
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // logs go to stderr so command output stays pipeable
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── Config, secrets, collaborators ────────────────────────────────────────────

async fn load_config(path: &Path) -> Result<PinvaultConfig> {
    if path.exists() {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading config: {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing config: {}", path.display()))
    } else {
        Ok(PinvaultConfig::default())
    }
}

/// Expand `~` in path to the user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    match s.strip_prefix("~/") {
        Some(rest) => {
            let home = std::env::var("HOME").unwrap_or_default();
            PathBuf::from(home).join(rest)
        }
        None => path.to_path_buf(),
    }
}

fn read_password(confirm: bool) -> Result<SecretString> {
    if let Ok(pw) = std::env::var("PINVAULT_PASSWORD") {
        return Ok(SecretString::from(pw));
    }
    let pw = rpassword::prompt_password("Password: ").context("reading password")?;
    if pw.is_empty() {
        anyhow::bail!("password must not be empty");
    }
    if confirm {
        let again = rpassword::prompt_password("Repeat password: ").context("reading password")?;
        if again != pw {
            anyhow::bail!("passwords do not match");
        }
    }
    Ok(SecretString::from(pw))
}

/// Signing key: --key-file > PINVAULT_PRIVATE_KEY
fn load_wallet(key_file: Option<&Path>) -> Result<Wallet> {
    let raw = match key_file {
        Some(path) => {
            let path = expand_tilde(path);
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("reading key file: {}", path.display()))?;
            SecretString::from(content.trim().to_string())
        }
        None => SecretString::from(std::env::var("PINVAULT_PRIVATE_KEY").context(
            "no signing key\n\
             Set PINVAULT_PRIVATE_KEY or pass --key-file <path>.\n\
             Create one with: pinvault wallet new",
        )?),
    };
    Wallet::from_hex(&raw).context("parsing signing key")
}

fn open_registry(config: &PinvaultConfig) -> Result<SharedRegistry> {
    let path = expand_tilde(&config.registry.path);
    let registry = FileRegistry::open(&path)
        .with_context(|| format!("opening registry: {}", path.display()))?;
    Ok(registry.into_shared())
}

fn open_lifecycle(config: &PinvaultConfig) -> Result<Lifecycle> {
    let local_root = expand_tilde(&config.storage.local_root);
    let store = pinvault_storage::build_content_store(&config.storage, &local_root)
        .context("building content store")?;
    Ok(Lifecycle::new(store, open_registry(config)?, &config.crypto))
}

/// Resolve the network and check the node agrees on the chain id.
async fn connect_ledger(config: &PinvaultConfig) -> Result<(NetworkSpec, Arc<JsonRpcLedger>)> {
    let network = NetworkSpec::from_config(&config.ledger)?;
    let ledger = JsonRpcLedger::new(
        network.rpc_url.clone(),
        Duration::from_secs(config.ledger.request_timeout_secs),
        Duration::from_millis(config.ledger.receipt_poll_interval_ms),
    )?;
    let chain_id = ledger
        .chain_id()
        .await
        .with_context(|| format!("connecting to {} ({})", network.name, network.rpc_url))?;
    if let Some(expected) = network.chain_id {
        if expected != chain_id {
            anyhow::bail!(
                "{} expects chain id {expected}, but {} reports {chain_id}",
                network.name,
                network.rpc_url
            );
        }
    }
    info!(network = %network.name, chain_id, "ledger connected");
    Ok((network, Arc::new(ledger)))
}

/// Bind the pinning contract and make sure it answers.
async fn connect_contract(
    config: &PinvaultConfig,
    ledger: Arc<JsonRpcLedger>,
) -> Result<PinningContract> {
    if config.ledger.contract_address.trim().is_empty() {
        anyhow::bail!("ledger.contract_address is not set");
    }
    let address: Address = config
        .ledger
        .contract_address
        .parse()
        .context("parsing ledger.contract_address")?;
    let contract = PinningContract::new(ledger, address);
    let price = contract
        .price_per_gb_per_day()
        .await
        .with_context(|| format!("contract {address} did not answer pricePerGBPerDay()"))?;
    debug!(contract = %address, price_per_gb_per_day = %price, "contract reachable");
    Ok(contract)
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N] ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}

// ── Progress bar helpers ──────────────────────────────────────────────────────

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-")
}

fn make_progress_bar(total: u64, prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(bar_style());
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn step_progress(pb: &ProgressBar) -> ProgressFn {
    let pb = pb.clone();
    Box::new(move |done, total, msg| {
        pb.set_length(total);
        pb.set_position(done);
        pb.set_message(msg.to_string());
    })
}

// ── `pinvault upload` ─────────────────────────────────────────────────────────

async fn cmd_upload(config: &PinvaultConfig, paths: &[PathBuf]) -> Result<()> {
    let lifecycle = open_lifecycle(config)?;
    let password = read_password(true)?;
    let mut failures = 0usize;

    for path in paths {
        let pb = make_progress_bar(3, "upload");
        pb.set_message(path.display().to_string());
        let progress = step_progress(&pb);

        match lifecycle.upload(path, &password, Some(&progress)).await {
            Ok(result) => {
                pb.finish_with_message("done".to_string());
                println!("{}", path.display());
                println!("  file id:  {}", result.file_id);
                println!("  content:  {}", result.content_id);
                println!("  metadata: {}", result.metadata_id);
                println!(
                    "  size:     {} → {} encrypted",
                    fmt_bytes(result.original_size),
                    fmt_bytes(result.ciphertext_size)
                );
                if let Some(url) = &result.gateway_url {
                    println!("  gateway:  {url}");
                }
            }
            Err(e) => {
                pb.abandon_with_message("failed".to_string());
                eprintln!("{}: {e}", path.display());
                failures += 1;
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} of {} uploads failed", paths.len());
    }
    Ok(())
}

// ── `pinvault download` ───────────────────────────────────────────────────────

async fn cmd_download(config: &PinvaultConfig, file_id: &str, dest: Option<&Path>) -> Result<()> {
    let lifecycle = open_lifecycle(config)?;
    let dest = dest.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    let password = read_password(false)?;

    let pb = make_progress_bar(4, "download");
    let progress = step_progress(&pb);
    let result = lifecycle
        .download(file_id, &dest, &password, Some(&progress))
        .await;
    let result = match result {
        Ok(r) => r,
        Err(e) => {
            pb.abandon_with_message("failed".to_string());
            return Err(e).with_context(|| format!("downloading {file_id}"));
        }
    };
    pb.finish_with_message("done".to_string());

    println!("Downloaded:");
    println!("  local:     {}", result.local_path.display());
    println!("  bytes:     {}", fmt_bytes(result.bytes));
    println!(
        "  integrity: {}",
        if result.verified { "verified" } else { "not checked" }
    );
    Ok(())
}

// ── `pinvault list` ───────────────────────────────────────────────────────────

fn cmd_list(config: &PinvaultConfig, json: bool) -> Result<()> {
    let path = expand_tilde(&config.registry.path);
    let registry = FileRegistry::open(&path)
        .with_context(|| format!("opening registry: {}", path.display()))?;

    if json {
        let records = registry.list();
        println!(
            "{}",
            serde_json::to_string_pretty(&records).context("serializing registry")?
        );
        return Ok(());
    }

    if registry.is_empty() {
        println!("No files registered ({}).", path.display());
        return Ok(());
    }

    println!(
        "{:<16}  {:>10}  {:<16}  {:<10}  NAME",
        "FILE ID", "SIZE", "UPLOADED", "PINNED"
    );
    for record in registry.list() {
        let pinned = match (record.blockchain_pinned, record.pin_duration_days) {
            (true, Some(days)) => format!("{days}d"),
            (true, None) => "yes".to_string(),
            (false, _) => "-".to_string(),
        };
        println!(
            "{:<16}  {:>10}  {:<16}  {:<10}  {}",
            record.file_id,
            fmt_bytes(record.original_size),
            record.upload_date.format("%Y-%m-%d %H:%M"),
            pinned,
            record.original_name
        );
    }
    println!();
    println!("{} files", registry.len());
    Ok(())
}

// ── `pinvault delete` ─────────────────────────────────────────────────────────

async fn cmd_delete(config: &PinvaultConfig, file_id: &str, force: bool, unpin: bool) -> Result<()> {
    let lifecycle = open_lifecycle(config)?;

    let pinned = lifecycle
        .registry()
        .lock()
        .await
        .get(file_id)
        .map(|r| r.blockchain_pinned)
        .ok_or_else(|| PinvaultError::NotFound(file_id.to_string()))?;

    let mut force = force;
    if pinned && !force {
        println!("{file_id} has an active on-chain pin; deleting only removes the local entry.");
        if !confirm("Delete anyway?")? {
            println!("Aborted.");
            return Ok(());
        }
        force = true;
    }

    let removed = lifecycle.delete(file_id, force, unpin).await?;
    println!("Deleted {} ({})", removed.file_id, removed.original_name);
    Ok(())
}

// ── `pinvault quote` / `pinvault pin` ─────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PinMode {
    QuoteOnly,
    Ask,
    Confirmed,
}

async fn select_targets(registry: &SharedRegistry, selection: &Selection) -> Result<Vec<PinTarget>> {
    let registry = registry.lock().await;
    if selection.all {
        return Ok(registry
            .list()
            .into_iter()
            .filter(|r| !r.blockchain_pinned)
            .map(PinTarget::from)
            .collect());
    }
    selection
        .file_ids
        .iter()
        .map(|id| {
            registry
                .get(id)
                .map(PinTarget::from)
                .ok_or_else(|| anyhow::Error::from(PinvaultError::NotFound(id.clone())))
        })
        .collect()
}

fn print_plan(plan: &PinPlan, network: &NetworkSpec) {
    let cur = &network.currency;
    println!(
        "Pin quote: {} file(s), {} total, {} days on {}",
        plan.targets.len(),
        fmt_bytes(plan.total_size),
        plan.duration_days,
        network.name
    );
    for t in &plan.targets {
        println!("  {}  {:>10}  {}", t.file_id, fmt_bytes(t.size), t.name);
    }
    println!("  pin cost:   {} {cur}", format_ether(plan.quote.pin_cost_wei));
    println!(
        "  gas (est.): {} {cur}  ({:.2} gwei, {:?})",
        format_ether(plan.quote.gas_cost_wei),
        wei_to_gwei(plan.gas.gas_price_wei),
        plan.gas.source
    );
    println!("  total:      {} {cur}", format_ether(plan.quote.total_wei));
    println!(
        "  balance:    {} {cur}  (need {})",
        format_ether(plan.balance),
        format_ether(plan.required)
    );
}

fn print_outcome(outcome: &BatchOutcome, network: &NetworkSpec) {
    println!();
    println!(
        "Pinning finished: {} succeeded, {} failed",
        outcome.successful, outcome.failed
    );
    for file in &outcome.results {
        match &file.result {
            Ok(receipt) => {
                println!("  ok    {}  {}", file.file_id, file.name);
                println!(
                    "        tx {}  block {}  gas {} @ {:.2} gwei",
                    receipt.tx_hash,
                    receipt.block_number,
                    receipt.gas_used,
                    receipt.gas_price_gwei()
                );
                if let Some(url) = network.tx_url(&receipt.tx_hash) {
                    println!("        {url}");
                }
            }
            Err(failure) => {
                println!("  FAIL  {}  {}", file.file_id, file.name);
                println!("        {}", failure.message);
                if let Some(hint) = failure.kind.guidance() {
                    println!("        hint: {hint}");
                }
                if let Some(hash) = &failure.tx_hash {
                    println!("        tx {hash}");
                }
            }
        }
    }
}

/// Confirmed pins missing from the registry, with the hashes needed to
/// reconcile them by hand.
fn unrecorded_lines(summary: &RecordSummary) -> Vec<String> {
    let mut lines = vec![format!(
        "warning: {} confirmed pin(s) were paid for but not recorded:",
        summary.unrecorded.len()
    )];
    for pin in &summary.unrecorded {
        lines.push(format!("  {}  tx {}  ({})", pin.file_id, pin.tx_hash, pin.reason));
    }
    lines
}

async fn cmd_pin(
    config: &PinvaultConfig,
    key_file: Option<&Path>,
    selection: &Selection,
    mode: PinMode,
) -> Result<()> {
    let registry = open_registry(config)?;
    let targets = select_targets(&registry, selection).await?;
    let wallet = Arc::new(load_wallet(key_file)?);

    let (network, ledger) = connect_ledger(config).await?;
    let contract = connect_contract(config, ledger).await?;

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let orchestrator =
        PinningOrchestrator::new(contract, wallet, config, network.name.clone()).with_events(tx);

    let request = PinRequest {
        files: targets,
        duration_days: selection
            .days
            .unwrap_or(config.pinning.default_duration_days),
        gas_price: selection
            .gas_price
            .parse::<GasPriceSetting>()
            .unwrap_or(GasPriceSetting::Auto),
    };
    let plan = orchestrator.prepare(request).await?;
    print_plan(&plan, &network);

    match mode {
        PinMode::QuoteOnly => return Ok(()),
        PinMode::Ask => {
            if !confirm("Submit one transaction per file?")? {
                println!("Aborted, nothing sent.");
                return Ok(());
            }
        }
        PinMode::Confirmed => {}
    }

    let pb = make_progress_bar(plan.targets.len() as u64, "pin");
    let printer = {
        let pb = pb.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    PinEvent::FileStarted { name, .. } => pb.set_message(name),
                    PinEvent::EstimateFallback {
                        file_id, gas_limit, ..
                    } => pb.println(format!(
                        "  {file_id}: gas estimation failed, using limit {gas_limit}"
                    )),
                    PinEvent::Submitted { tx_hash, .. } => {
                        pb.set_message(format!("waiting for {tx_hash}"))
                    }
                    PinEvent::Confirmed { .. } | PinEvent::Failed { .. } => pb.inc(1),
                    PinEvent::Quoted { .. } | PinEvent::GasResolved { .. } | PinEvent::Finished { .. } => {}
                }
            }
        })
    };

    let outcome = orchestrator.execute(&plan).await;
    // closes the event channel
    drop(orchestrator);
    let _ = printer.await;
    pb.finish_with_message("done".to_string());

    // print receipts first so paid transactions are visible even if recording fails
    print_outcome(&outcome, &network);

    let summary = record_successes(&registry, &outcome).await;
    debug!(recorded = summary.recorded, "registry updated");
    if !summary.is_complete() {
        for line in unrecorded_lines(&summary) {
            eprintln!("{line}");
        }
        anyhow::bail!(
            "{} confirmed pin(s) could not be recorded in the registry",
            summary.unrecorded.len()
        );
    }
    if outcome.failed > 0 {
        anyhow::bail!("{} of {} pins failed", outcome.failed, outcome.results.len());
    }
    Ok(())
}

// ── `pinvault status` ─────────────────────────────────────────────────────────

async fn cmd_status(config: &PinvaultConfig, key_file: Option<&Path>) -> Result<()> {
    let local_root = expand_tilde(&config.storage.local_root);
    let store = pinvault_storage::build_content_store(&config.storage, &local_root)
        .context("building content store")?;
    match store.status().await {
        Ok(status) => println!("content store: {} [ok] {}", status.backend, status.detail),
        Err(e) => println!("content store: UNREACHABLE ({e})"),
    }

    let registry = open_registry(config)?;
    let (files, pinned) = {
        let registry = registry.lock().await;
        let pinned = registry.list().iter().filter(|r| r.blockchain_pinned).count();
        (registry.len(), pinned)
    };
    println!("registry:      {files} files, {pinned} pinned");

    let (network, ledger) = match connect_ledger(config).await {
        Ok(v) => v,
        Err(e) => {
            println!("ledger:        UNREACHABLE ({e:#})");
            return Ok(());
        }
    };
    println!("ledger:        {} ({})", network.name, network.rpc_url);
    let gas_price = ledger.gas_price().await?;
    println!("  gas price:   {:.2} gwei", wei_to_gwei(gas_price));

    if let Ok(wallet) = load_wallet(key_file) {
        let balance = ledger.balance(&wallet.address()).await?;
        println!("  wallet:      {}", wallet.address());
        println!("  balance:     {} {}", format_ether(balance), network.currency);
    }
    if !config.ledger.contract_address.trim().is_empty() {
        match connect_contract(config, ledger).await {
            Ok(contract) => {
                let price = contract.price_per_gb_per_day().await?;
                println!("  contract:    {} ({} wei/GB/day)", contract.address(), price);
            }
            Err(e) => println!("  contract:    UNREACHABLE ({e:#})"),
        }
    }
    Ok(())
}

// ── `pinvault wallet new` ─────────────────────────────────────────────────────

fn cmd_wallet_new() -> Result<()> {
    let wallet = Wallet::generate();
    let key = wallet.export_hex();
    println!("address:     {}", wallet.address());
    println!("private key: {}", key.expose_secret());
    eprintln!();
    eprintln!("Store the private key somewhere safe; it cannot be recovered.");
    eprintln!("Use it with: export PINVAULT_PRIVATE_KEY=<key>  or  --key-file <path>");
    Ok(())
}

// ── `pinvault config show` ────────────────────────────────────────────────────

fn cmd_config_show(config: &PinvaultConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinvault_sync::UnrecordedPin;

    #[test]
    fn unrecorded_pins_list_their_tx_hashes() {
        let summary = RecordSummary {
            recorded: 1,
            unrecorded: vec![UnrecordedPin {
                file_id: "00000000000000aa".into(),
                tx_hash: "0xabc".into(),
                reason: "I/O error: Is a directory".into(),
            }],
        };
        let lines = unrecorded_lines(&summary);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("1 confirmed pin(s)"));
        assert!(lines[1].contains("00000000000000aa"));
        assert!(lines[1].contains("tx 0xabc"));
    }

    #[test]
    fn cli_parses_pin_selection() {
        let cli = Cli::try_parse_from([
            "pinvault", "pin", "aaaa", "bbbb", "--days", "90", "--gas-price", "12.5", "-y",
        ])
        .unwrap();
        match cli.command {
            Commands::Pin { selection, yes } => {
                assert_eq!(selection.file_ids, vec!["aaaa", "bbbb"]);
                assert_eq!(selection.days, Some(90));
                assert_eq!(selection.gas_price, "12.5");
                assert!(yes);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn all_conflicts_with_ids() {
        assert!(Cli::try_parse_from(["pinvault", "quote", "aaaa", "--all"]).is_err());
    }

    #[test]
    fn tilde_expands_to_home() {
        std::env::set_var("HOME", "/home/vault");
        assert_eq!(
            expand_tilde(Path::new("~/.config/pinvault/config.toml")),
            PathBuf::from("/home/vault/.config/pinvault/config.toml")
        );
        assert_eq!(expand_tilde(Path::new("/etc/x")), PathBuf::from("/etc/x"));
    }

    #[test]
    fn bytes_are_humanized() {
        assert_eq!(fmt_bytes(10), "10 B");
        assert_eq!(fmt_bytes(2048), "2.0 KB");
        assert_eq!(fmt_bytes(5 * 1024 * 1024), "5.0 MB");
    }
}
