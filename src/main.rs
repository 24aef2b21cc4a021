//! mpayd - batched multi-output payout daemon
//!
//! Converts a transfer file of (address, amount) intents into a sequence of
//! batched, signed and broadcast multi-send transactions, one confirmed
//! batch at a time. Supports a single online pass (`start`) and staged
//! build/sign/broadcast flows for offline signing setups.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

// Module declarations
mod address;
mod app;
mod batcher;
mod broadcaster;
mod builder;
mod client;
mod config;
mod endpoints;
mod gas;
mod keyring;
mod loader;
mod metrics;
mod signer;
mod tx;
mod types;

use app::{App, RunOptions};
use client::HttpChainClient;
use config::Config;
use keyring::Keyring;
use tx::TxFile;

/// Command line interface
#[derive(Parser, Debug)]
#[command(
    name = "mpayd",
    version,
    about = "Daemon for sending batched multi-output payout transactions"
)]
struct Cli {
    /// Application home directory
    #[arg(long, global = true, default_value = "~/.mpay", env = "MPAY_HOME")]
    home: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Initialize the home directory and write a default config
    Init,

    /// Run the full transfer process, one confirmed batch at a time
    Start(StartArgs),

    /// Build unsigned multi-send transactions and dump them to a file
    BuildTxs(BuildTxsArgs),

    /// Sign built transactions offline with sequential sequence numbers
    SignTxs(SignTxsArgs),

    /// Broadcast signed transactions in order, confirming each one
    BroadcastTxs(BroadcastTxsArgs),

    /// Manage signing keys
    #[command(subcommand)]
    Keys(KeysCommand),

    /// Generate a random transfer input file for rehearsal runs
    GenerateTransfers(GenerateArgs),
}

/// Standard transaction flags shared by the pipeline subcommands
#[derive(clap::Args, Debug, Clone)]
struct TxFlags {
    /// Signer key name, or a sender address where signing is not required
    #[arg(long, default_value = "")]
    from: String,

    /// Chain id override
    #[arg(long)]
    chain_id: Option<String>,

    /// Gateway RPC endpoint override
    #[arg(long)]
    node: Option<String>,

    /// Account sequence for offline operation
    #[arg(long, default_value_t = 0)]
    sequence: u64,

    /// Account number for offline operation
    #[arg(long, default_value_t = 0)]
    account_number: u64,

    /// Operate without querying the chain
    #[arg(long)]
    offline: bool,

    /// Fixed gas limit per transaction; 0 determines it automatically
    #[arg(long, default_value_t = 0)]
    gas: u64,
}

#[derive(clap::Args, Debug)]
struct StartArgs {
    /// Path to the JSON transfer file with recipients
    #[arg(long)]
    file: PathBuf,

    /// Batch size for multi-send messages
    #[arg(long, default_value_t = 10_000)]
    batch_size: usize,

    /// Start index into the transfer recipient list
    #[arg(long, default_value_t = 0)]
    start_index: usize,

    /// Only validate the transfer file and report totals
    #[arg(long)]
    validate_only: bool,

    #[command(flatten)]
    tx: TxFlags,
}

#[derive(clap::Args, Debug)]
struct BuildTxsArgs {
    /// Path to the JSON transfer file with recipients
    #[arg(long)]
    file: PathBuf,

    /// Batch size for multi-send messages
    #[arg(long, default_value_t = 10_000)]
    batch_size: usize,

    /// Start index into the transfer recipient list
    #[arg(long, default_value_t = 0)]
    start_index: usize,

    /// Only validate the transfer file and report totals
    #[arg(long)]
    validate_only: bool,

    /// File the unsigned transactions are dumped to
    #[arg(long, default_value = "unsigned_txs.json")]
    output_file: PathBuf,

    #[command(flatten)]
    tx: TxFlags,
}

#[derive(clap::Args, Debug)]
struct SignTxsArgs {
    /// Path to the JSON file with unsigned transactions
    #[arg(long)]
    file: PathBuf,

    /// Start index into the transaction list
    #[arg(long, default_value_t = 0)]
    start_index: usize,

    /// File the signed transactions are dumped to
    #[arg(long, default_value = "signed_txs.json")]
    output_file: PathBuf,

    #[command(flatten)]
    tx: TxFlags,
}

#[derive(clap::Args, Debug)]
struct BroadcastTxsArgs {
    /// Path to the JSON file with signed transactions
    #[arg(long)]
    file: PathBuf,

    /// Start index into the transaction list
    #[arg(long, default_value_t = 0)]
    start_index: usize,

    #[command(flatten)]
    tx: TxFlags,
}

#[derive(Subcommand, Debug)]
enum KeysCommand {
    /// Generate a new signing key
    Add { name: String },
    /// Show the address of a key
    Show { name: String },
    /// List all keys in the key directory
    List,
}

#[derive(clap::Args, Debug)]
struct GenerateArgs {
    /// Number of random recipients
    count: u64,

    /// Display-denomination amount assigned to every recipient
    amount: f64,

    /// Output path; defaults to a timestamped transfer-*.json
    #[arg(long)]
    output_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let home = expand_path(&cli.home);

    match cli.command {
        Commands::Init => run_init(&home),
        Commands::Keys(cmd) => run_keys(&home, cmd),
        Commands::GenerateTransfers(args) => run_generate(&home, args),
        Commands::Start(args) => run_start(&home, args).await,
        Commands::BuildTxs(args) => run_build_txs(&home, args).await,
        Commands::SignTxs(args) => run_sign_txs(&home, args).await,
        Commands::BroadcastTxs(args) => run_broadcast_txs(&home, args).await,
    }
}

/// Initialize logging subsystem
fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "mpayd=debug,info"
    } else {
        "mpayd=info,warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

fn run_init(home: &Path) -> Result<()> {
    if home.exists() {
        bail!("home path {} already exists", home.display());
    }
    std::fs::create_dir_all(home)
        .with_context(|| format!("failed to create home directory {}", home.display()))?;

    let config = Config::default();
    std::fs::create_dir_all(config.key_dir(home))?;
    config.write_to_home(home)?;

    info!(home = %home.display(), "home directory initialized");
    Ok(())
}

async fn run_start(home: &Path, args: StartArgs) -> Result<()> {
    let app = load_app(home, &args.tx)?;
    let run_id = Uuid::new_v4();
    info!(%run_id, file = %args.file.display(), batch_size = args.batch_size, "starting transfer process");

    if app.config().monitoring.enable_metrics {
        let port = app.config().monitoring.metrics_port;
        tokio::spawn(async move {
            if let Err(e) = endpoints::endpoint_server(port).await {
                tracing::error!("metrics server error: {e}");
            }
        });
    }

    let opts = RunOptions {
        from: args.tx.from.clone(),
        batch_size: args.batch_size,
        start_index: args.start_index,
        validate_only: args.validate_only,
        sequence: args.tx.sequence,
        account_number: args.tx.account_number,
        offline: false,
        gas: args.tx.gas,
    };
    supervised("transfer", async move { app.start(&args.file, &opts).await }).await
}

async fn run_build_txs(home: &Path, args: BuildTxsArgs) -> Result<()> {
    let app = load_app(home, &args.tx)?;
    let opts = RunOptions {
        from: args.tx.from.clone(),
        batch_size: args.batch_size,
        start_index: args.start_index,
        validate_only: args.validate_only,
        sequence: args.tx.sequence,
        account_number: args.tx.account_number,
        offline: args.tx.offline,
        gas: args.tx.gas,
    };
    supervised("build", async move {
        let Some(txs) = app.build_txs(&args.file, &opts).await? else {
            return Ok(());
        };
        TxFile::new(txs).write(Some(&args.output_file))?;
        info!(output = %args.output_file.display(), "done, unsigned transactions generated");
        Ok(())
    })
    .await
}

async fn run_sign_txs(home: &Path, args: SignTxsArgs) -> Result<()> {
    let app = load_app(home, &args.tx)?;
    let opts = RunOptions {
        from: args.tx.from.clone(),
        start_index: args.start_index,
        sequence: args.tx.sequence,
        account_number: args.tx.account_number,
        offline: args.tx.offline,
        ..Default::default()
    };
    supervised("sign", async move {
        info!(file = %args.file.display(), "reading transactions from file");
        let file = TxFile::read(&args.file)?;
        let signed = app.sign_txs(&file.txs, &opts)?;
        TxFile::new(signed).write(Some(&args.output_file))?;
        info!(output = %args.output_file.display(), "done signing the transactions");
        Ok(())
    })
    .await
}

async fn run_broadcast_txs(home: &Path, args: BroadcastTxsArgs) -> Result<()> {
    let app = load_app(home, &args.tx)?;
    supervised("broadcast", async move {
        info!(file = %args.file.display(), "reading transactions from file");
        let file = TxFile::read(&args.file)?;
        app.broadcast_txs(&file.txs, args.start_index).await
    })
    .await
}

fn run_keys(home: &Path, cmd: KeysCommand) -> Result<()> {
    let keyring = load_keyring(home)?;
    match cmd {
        KeysCommand::Add { name } => {
            let address = keyring.generate(&name)?;
            println!("{name}: {address}");
        }
        KeysCommand::Show { name } => {
            println!("{name}: {}", keyring.address(&name)?);
        }
        KeysCommand::List => {
            for name in keyring.list()? {
                println!("{name}: {}", keyring.address(&name)?);
            }
        }
    }
    Ok(())
}

fn run_generate(home: &Path, args: GenerateArgs) -> Result<()> {
    use rand::RngCore;

    let config = load_config(home)?;
    let prefix = &config.chain.account_prefix;

    let mut recipients = serde_json::Map::new();
    let mut rng = rand::thread_rng();
    for _ in 0..args.count {
        let mut hash = [0u8; address::KEY_HASH_LEN];
        rng.fill_bytes(&mut hash);
        let addr = address::Address::from_key_hash(prefix, &hash);
        recipients.insert(
            addr.to_string(),
            serde_json::json!({ "aggregates": { "total_baby": args.amount } }),
        );
    }

    let output = args.output_file.unwrap_or_else(|| {
        let stamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
        PathBuf::from(format!("transfer-{stamp}.json"))
    });
    std::fs::write(
        &output,
        serde_json::to_string_pretty(&serde_json::Value::Object(recipients))?,
    )?;
    info!(output = %output.display(), count = args.count, "random transfer file generated");
    Ok(())
}

/// Run a pipeline future on a background task while watching for an
/// operating-system interrupt. On shutdown the foreground returns promptly;
/// in-flight network calls are not cancelled, and a rerun with the next
/// unsent start index is the recovery procedure.
async fn supervised<F>(what: &str, fut: F) -> Result<()>
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    let mut task = tokio::spawn(fut);
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received, stopping {what} process");
            Ok(())
        }
        res = &mut task => res?,
    }
}

fn load_config(home: &Path) -> Result<Config> {
    let path = Config::file_path(home);
    if !path.exists() {
        bail!(
            "no config found at {}; run 'mpayd init' first",
            path.display()
        );
    }
    Config::from_file(&path)
}

fn load_keyring(home: &Path) -> Result<Keyring> {
    let config = load_config(home)?;
    Ok(Keyring::new(
        config.key_dir(home),
        config.chain.account_prefix.clone(),
    ))
}

fn load_app(home: &Path, flags: &TxFlags) -> Result<App> {
    let mut config = load_config(home)?;
    if let Some(chain_id) = &flags.chain_id {
        config.chain.chain_id = chain_id.clone();
    }
    if let Some(node) = &flags.node {
        config.rpc.endpoint = node.clone();
    }

    let client = Arc::new(HttpChainClient::new(config.rpc.endpoint.clone()));
    let keyring = Keyring::new(config.key_dir(home), config.chain.account_prefix.clone());
    Ok(App::new(config, client, keyring))
}

/// Expand a leading `~` to the user's home directory.
fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~") {
        if let Ok(user_home) = std::env::var("HOME") {
            return PathBuf::from(format!("{user_home}{rest}"));
        }
    }
    PathBuf::from(path)
}
