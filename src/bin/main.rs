//! btcwallet CLI - drive the wallet core from a terminal.
//!
//!   btcwallet setup [--words 12]         → generate + store a mnemonic
//!   btcwallet login [--mnemonic <words>] → start a session, mark logged in
//!   btcwallet logout                     → stop the session
//!   btcwallet status                     → balance, sync state, last tx
//!   btcwallet address                    → next receive address
//!   btcwallet validate <addr> <amount>   → validation pair + bounds + fee
//!   btcwallet send <addr> <amount>       → validate, broadcast, store record
//!
//! Configuration flags fall back to BTCWALLET_* environment variables.

use anyhow::{anyhow, bail, Context, Result};
use serde_json::{json, Value};
use std::env;
use std::io::IsTerminal;

use btcwallet::logging::init_logging;
use btcwallet::{
    format_btc, mnemonic, Network, Settings, Validation, WalletConfig, WalletManager,
};

fn main() {
    init_logging();
    #[cfg(feature = "bdk")]
    let _ = rustls::crypto::ring::default_provider().install_default();

    let args: Vec<String> = env::args().collect();
    let opts = ParsedArgs::parse(&args[1..]);

    if opts.help {
        print_usage();
        return;
    }
    if opts.version {
        println!("btcwallet 0.1.0");
        return;
    }

    let result = match opts.command.as_deref() {
        Some("setup") => cmd_setup(&opts),
        Some("login") => cmd_login(&opts),
        Some("logout") => cmd_logout(&opts),
        Some("status") => cmd_status(&opts),
        Some("address") => cmd_address(&opts),
        Some("validate") => cmd_validate(&opts),
        Some("send") => cmd_send(&opts),
        Some(cmd) => Err(anyhow!("unknown command: {cmd}")),
        None => {
            print_usage();
            return;
        }
    };

    match result {
        Ok(output) => {
            if opts.pretty || std::io::stdout().is_terminal() {
                println!("{}", serde_json::to_string_pretty(&output).unwrap());
            } else {
                println!("{}", serde_json::to_string(&output).unwrap());
            }
        }
        Err(e) => {
            eprintln!("{}", serde_json::to_string(&json!({"error": e.to_string()})).unwrap());
            std::process::exit(1);
        }
    }
}

#[derive(Default)]
struct ParsedArgs {
    command: Option<String>,
    address: Option<String>,
    amount: Option<String>,
    mnemonic: Option<String>,
    network: Option<String>,
    electrum_url: Option<String>,
    data_dir: Option<String>,
    fee_rate: Option<u64>,
    words: Option<usize>,
    pretty: bool,
    help: bool,
    version: bool,
}

impl ParsedArgs {
    fn parse(args: &[String]) -> Self {
        let mut opts = ParsedArgs::default();
        let mut positional = Vec::new();
        let mut i = 0;

        while i < args.len() {
            let arg = &args[i];
            match arg.as_str() {
                "--help" | "-h" => opts.help = true,
                "--version" | "-V" => opts.version = true,
                "--pretty" => opts.pretty = true,
                "--mnemonic" | "-m" => {
                    if i + 1 < args.len() {
                        opts.mnemonic = Some(args[i + 1].clone());
                        i += 1;
                    }
                }
                "--network" | "-n" => {
                    if i + 1 < args.len() {
                        opts.network = Some(args[i + 1].clone());
                        i += 1;
                    }
                }
                "--electrum" | "-e" => {
                    if i + 1 < args.len() {
                        opts.electrum_url = Some(args[i + 1].clone());
                        i += 1;
                    }
                }
                "--data-dir" | "-d" => {
                    if i + 1 < args.len() {
                        opts.data_dir = Some(args[i + 1].clone());
                        i += 1;
                    }
                }
                "--fee-rate" => {
                    if i + 1 < args.len() {
                        opts.fee_rate = args[i + 1].parse().ok();
                        i += 1;
                    }
                }
                "--words" => {
                    if i + 1 < args.len() {
                        opts.words = args[i + 1].parse().ok();
                        i += 1;
                    }
                }
                _ if !arg.starts_with('-') => positional.push(arg.clone()),
                _ => {} // Ignore unknown flags
            }
            i += 1;
        }

        if !positional.is_empty() {
            opts.command = Some(positional.remove(0));
        }
        if !positional.is_empty() {
            opts.address = Some(positional.remove(0));
        }
        if !positional.is_empty() {
            opts.amount = Some(positional.remove(0));
        }

        // Environment variables (lower priority than CLI args)
        if opts.mnemonic.is_none() {
            opts.mnemonic = env::var("BTCWALLET_MNEMONIC").ok().filter(|s| !s.is_empty());
        }
        if opts.network.is_none() {
            opts.network = env::var("BTCWALLET_NETWORK").ok().filter(|s| !s.is_empty());
        }
        if opts.electrum_url.is_none() {
            opts.electrum_url = env::var("BTCWALLET_ELECTRUM").ok().filter(|s| !s.is_empty());
        }
        if opts.data_dir.is_none() {
            opts.data_dir = env::var("BTCWALLET_DATA_DIR").ok().filter(|s| !s.is_empty());
        }
        if opts.fee_rate.is_none() {
            opts.fee_rate = env::var("BTCWALLET_FEE_RATE").ok().and_then(|s| s.parse().ok());
        }

        opts
    }

    fn config(&self) -> Result<WalletConfig> {
        let mut config = WalletConfig::default();
        if let Some(raw) = self.network.as_deref() {
            config.network =
                Network::from_str(raw).ok_or_else(|| anyhow!("invalid network: {raw}"))?;
        }
        if let Some(url) = self.electrum_url.clone() {
            config = config.with_electrum(url);
        }
        if let Some(dir) = self.data_dir.clone() {
            config = config.with_data_dir(dir);
        }
        if let Some(rate) = self.fee_rate {
            config = config.with_fee_rate(rate);
        }
        Ok(config)
    }

    fn settings(&self) -> Result<Settings> {
        let path = match self.data_dir.as_deref() {
            Some(dir) => std::path::Path::new(dir).join("settings.json"),
            None => Settings::default_path("btcwallet"),
        };
        Ok(Settings::open(path)?)
    }
}

fn print_usage() {
    println!(
        r#"btcwallet - Bitcoin wallet core CLI

USAGE:
    btcwallet <command> [args] [options]

COMMANDS:
    setup                   Generate and store a mnemonic phrase
    login                   Start a wallet session (stores the phrase)
    logout                  Stop the session, clear the login flag
    status                  Balance, sync state, last transaction
    address                 Next receive address
    validate <addr> <amt>   Validate a send without broadcasting
    send <addr> <amt>       Validate, sign and broadcast

OPTIONS:
    --mnemonic, -m <words>  BIP39 phrase (env: BTCWALLET_MNEMONIC)
    --network, -n <net>     bitcoin|testnet|signet|regtest (env: BTCWALLET_NETWORK)
    --electrum, -e <url>    Electrum server URL (env: BTCWALLET_ELECTRUM)
    --data-dir, -d <path>   Data directory (env: BTCWALLET_DATA_DIR)
    --fee-rate <sat/vb>     Fee rate (env: BTCWALLET_FEE_RATE, default 3)
    --words <n>             Mnemonic length for setup (default 12)
    --pretty                Pretty-print JSON
    --version, -V           Print version

EXAMPLES:
    btcwallet setup
    btcwallet login --network signet
    btcwallet validate tb1q... 0.0001
    btcwallet send tb1q... 0.0001
"#
    );
}

#[cfg(feature = "bdk")]
fn open_manager(opts: &ParsedArgs) -> Result<WalletManager> {
    Ok(WalletManager::new(opts.config()?))
}

#[cfg(not(feature = "bdk"))]
fn open_manager(_opts: &ParsedArgs) -> Result<WalletManager> {
    bail!("built without the `bdk` feature; no chain backend available")
}

/// Resolve the phrase: explicit flag wins, then the stored one.
fn resolve_phrase(opts: &ParsedArgs, settings: &Settings) -> Result<String> {
    if let Some(phrase) = opts.mnemonic.clone() {
        return Ok(phrase);
    }
    settings
        .mnemonic()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("no mnemonic stored; run `btcwallet setup` or pass --mnemonic"))
}

/// Start a session from stored credentials and sync it once.
async fn start_session(opts: &ParsedArgs, settings: &Settings) -> Result<WalletManager> {
    let phrase = resolve_phrase(opts, settings)?;
    let manager = open_manager(opts)?;
    manager.login(&phrase).await.context("login failed")?;
    manager.sync().await.context("sync failed")?;
    Ok(manager)
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("tokio runtime")
}

fn cmd_setup(opts: &ParsedArgs) -> Result<Value> {
    let phrase = mnemonic::generate(opts.words.unwrap_or(mnemonic::PHRASE_WORD_COUNT))?;
    let mut settings = opts.settings()?;
    settings.set_mnemonic(Some(phrase.clone()))?;
    Ok(json!({
        "status": "stored",
        "mnemonic": phrase,
        "words": phrase.split_whitespace().count(),
    }))
}

fn cmd_login(opts: &ParsedArgs) -> Result<Value> {
    let mut settings = opts.settings()?;
    let phrase = resolve_phrase(opts, &settings)?;

    let rt = runtime()?;
    let manager = open_manager(opts)?;
    rt.block_on(manager.login(&phrase)).context("login failed")?;

    settings.set_mnemonic(Some(phrase))?;
    settings.set_logged_in(true)?;

    Ok(json!({
        "status": "logged_in",
        "network": manager.config().network.as_str(),
    }))
}

fn cmd_logout(opts: &ParsedArgs) -> Result<Value> {
    let mut settings = opts.settings()?;
    settings.set_logged_in(false)?;
    settings.set_last_transaction(None)?;
    Ok(json!({"status": "logged_out"}))
}

fn cmd_status(opts: &ParsedArgs) -> Result<Value> {
    let settings = opts.settings()?;
    if !settings.logged_in() {
        bail!("not logged in; run `btcwallet login` first");
    }

    let rt = runtime()?;
    let manager = rt.block_on(start_session(opts, &settings))?;
    let state = manager.state();
    let balance = state.balance.unwrap_or_default();
    manager.logout();

    Ok(json!({
        "network": manager.config().network.as_str(),
        "sync_state": format!("{:?}", state.sync_state),
        "address": state.address,
        "balance": {
            "confirmed": balance.confirmed.to_sat(),
            "spendable": balance.spendable().to_sat(),
            "total": balance.total().to_sat(),
        },
        "last_transaction": settings.last_transaction(),
    }))
}

fn cmd_address(opts: &ParsedArgs) -> Result<Value> {
    let settings = opts.settings()?;
    let rt = runtime()?;
    let manager = rt.block_on(start_session(opts, &settings))?;
    let address = manager.receive_address()?;
    manager.logout();
    Ok(json!({"address": address}))
}

fn validation_json(validation: &Validation) -> Value {
    match validation {
        Validation::Pending => json!({"result": "pending"}),
        Validation::Valid(m) => json!({"result": "valid", "message": m}),
        Validation::Invalid(m) => json!({"result": "invalid", "message": m}),
    }
}

fn cmd_validate(opts: &ParsedArgs) -> Result<Value> {
    let address = opts.address.as_deref().context("usage: validate <addr> <amount>")?;
    let amount = opts.amount.as_deref().context("usage: validate <addr> <amount>")?;
    let settings = opts.settings()?;

    let rt = runtime()?;
    let manager = rt.block_on(start_session(opts, &settings))?;

    let (address_validation, _) = manager.set_address(Some(address));
    let amount_validation = manager.set_amount(Some(amount));
    let range = manager.spendable_range_for(address).ok();
    manager.logout();

    Ok(json!({
        "address": validation_json(&address_validation),
        "amount": validation_json(&amount_validation),
        "min_btc": range.map(|r| format_btc(r.min)),
        "max_btc": range.map(|r| format_btc(r.max)),
    }))
}

fn cmd_send(opts: &ParsedArgs) -> Result<Value> {
    let address = opts.address.as_deref().context("usage: send <addr> <amount>")?;
    let amount = opts.amount.as_deref().context("usage: send <addr> <amount>")?;
    let mut settings = opts.settings()?;

    let rt = runtime()?;
    let manager = rt.block_on(start_session(opts, &settings))?;

    manager.set_address(Some(address));
    manager.set_amount(Some(amount));
    let result = rt.block_on(manager.send());
    manager.logout();

    let record = result?;
    settings.set_last_transaction(Some(record.clone()))?;

    Ok(json!({
        "status": "broadcast",
        "hash": record.hash,
        "amount_btc": record.amount,
    }))
}
