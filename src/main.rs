use color_eyre::eyre::{
    Result,
    eyre,
};
use solanaroll::{
    AddressOverrides,
    DEFAULT_DEVNET_RPC_URL,
    DEFAULT_LOCAL_RPC_URL,
    DEFAULT_TESTNET_RPC_URL,
    NetworkTarget,
    wallets::KeypairSource,
};
use std::time::Duration;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::EnvFilter;

mod client;
mod ui;

const LOG_DIR: &str = "logs";
const LOG_FILE: &str = "solanaroll.log";
const DEFAULT_POLL_SECS: u64 = 10;

fn print_usage_and_exit() -> ! {
    println!(
        "Usage: solanaroll [--devnet | --testnet | --local] [--rpc-url <url>]\n\
         [--keypair <path|prompt>] [--mint-authority <path|prompt>]\n\
         [--program-id <address>] [--treasury <address>] [--mint <address>]\n\
         [--poll-secs <seconds>]\n\
         \n\
         Flags:\n\
           --devnet              Connect to Solana devnet (default, RPC {})\n\
           --testnet             Connect to Solana testnet (default RPC {})\n\
           --local               Connect to a local validator (default RPC {})\n\
           --rpc-url <url>       Override the RPC URL for the selected network\n\
           --keypair <path>      Wallet keypair (defaults to ~/.config/solana/id.json);\n\
                                 pass `prompt` to enter a seed phrase\n\
           --mint-authority <path> Treasury mint authority that signs deposits\n\
                                 (defaults to the wallet itself)\n\
           --program-id <addr>   Treasury program id\n\
           --treasury <addr>     Treasury account\n\
           --mint <addr>         Treasury token mint\n\
           --poll-secs <secs>    Background refresh interval, 0 disables (default {})",
        DEFAULT_DEVNET_RPC_URL,
        DEFAULT_TESTNET_RPC_URL,
        DEFAULT_LOCAL_RPC_URL,
        DEFAULT_POLL_SECS,
    );
    std::process::exit(0);
}

fn parse_cli_args() -> Result<client::AppConfig> {
    #[derive(Clone, Copy)]
    enum NetworkFlag {
        Devnet,
        Testnet,
        Local,
    }

    let mut args = std::env::args().skip(1);
    let mut network_flag: Option<NetworkFlag> = None;
    let mut custom_url: Option<String> = None;
    let mut keypair: Option<String> = None;
    let mut mint_authority: Option<String> = None;
    let mut overrides = AddressOverrides::default();
    let mut poll_secs = DEFAULT_POLL_SECS;

    fn once(slot: &mut Option<String>, flag: &str, value: Option<String>) -> Result<()> {
        let value = value.ok_or_else(|| eyre!("{flag} requires an argument"))?;
        if slot.is_some() {
            return Err(eyre!("{flag} may only be specified once"));
        }
        *slot = Some(value);
        Ok(())
    }

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--devnet" | "--testnet" | "--local" => {
                if network_flag.is_some() {
                    return Err(eyre!(
                        "Multiple network flags provided; choose one of --devnet/--testnet/--local"
                    ));
                }
                network_flag = Some(match arg.as_str() {
                    "--devnet" => NetworkFlag::Devnet,
                    "--testnet" => NetworkFlag::Testnet,
                    _ => NetworkFlag::Local,
                });
            }
            "--rpc-url" => once(&mut custom_url, "--rpc-url", args.next())?,
            "--keypair" => once(&mut keypair, "--keypair", args.next())?,
            "--mint-authority" => {
                once(&mut mint_authority, "--mint-authority", args.next())?
            }
            "--program-id" => once(&mut overrides.program_id, "--program-id", args.next())?,
            "--treasury" => once(&mut overrides.treasury, "--treasury", args.next())?,
            "--mint" => once(&mut overrides.treasury_mint, "--mint", args.next())?,
            "--poll-secs" => {
                let raw = args
                    .next()
                    .ok_or_else(|| eyre!("--poll-secs requires a number of seconds"))?;
                poll_secs = raw
                    .parse()
                    .map_err(|_| eyre!("--poll-secs expects whole seconds, got {raw}"))?;
            }
            "--help" | "-h" => print_usage_and_exit(),
            other => return Err(eyre!("Unknown argument: {other}")),
        }
    }

    let network = match network_flag.unwrap_or(NetworkFlag::Devnet) {
        NetworkFlag::Devnet => NetworkTarget::Devnet {
            url: custom_url.unwrap_or_else(|| DEFAULT_DEVNET_RPC_URL.to_string()),
        },
        NetworkFlag::Testnet => NetworkTarget::Testnet {
            url: custom_url.unwrap_or_else(|| DEFAULT_TESTNET_RPC_URL.to_string()),
        },
        NetworkFlag::Local => NetworkTarget::LocalNode {
            url: custom_url.unwrap_or_else(|| DEFAULT_LOCAL_RPC_URL.to_string()),
        },
    };

    Ok(client::AppConfig {
        network,
        keypair: KeypairSource::resolve(keypair.as_deref())?,
        mint_authority: mint_authority
            .as_deref()
            .map(|raw| KeypairSource::resolve(Some(raw)))
            .transpose()?,
        overrides,
        poll_interval: (poll_secs > 0).then(|| Duration::from_secs(poll_secs)),
    })
}

/// The terminal belongs to the UI, so logs go to a rolling file.
fn init_tracing() -> WorkerGuard {
    let appender = rolling::daily(LOG_DIR, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let _log_guard = init_tracing();
    tracing::info!("starting solanaroll dashboard");
    let app_config = parse_cli_args()?;
    client::run_app(app_config).await
}
