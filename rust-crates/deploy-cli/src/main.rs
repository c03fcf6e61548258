mod loader;
mod wallets;

use anyhow::{
    Context,
    Result,
};
use clap::{
    ArgGroup,
    Parser,
};
use deployments::{
    DeploymentEnv,
    DeploymentRecord,
    DeploymentStore,
};
use program_client::{
    GAME_ACCOUNT_SPACE,
    GameAccount,
    ProgramAddresses,
    instruction,
    parse_pubkey,
};
use solana_client::{
    nonblocking::rpc_client::RpcClient,
    rpc_request::TokenAccountsFilter,
};
use solana_sdk::{
    commitment_config::CommitmentConfig,
    instruction::Instruction,
    native_token::lamports_to_sol,
    pubkey::Pubkey,
    signature::{
        Keypair,
        Signature,
        Signer,
    },
};
use std::{
    path::Path,
    str::FromStr,
};
use tracing_subscriber::EnvFilter;

use crate::loader::DeployBudget;

const DEFAULT_DEVNET_RPC_URL: &str = "https://api.devnet.solana.com";
const DEFAULT_TESTNET_RPC_URL: &str = "https://api.testnet.solana.com";
const DEFAULT_LOCAL_RPC_URL: &str = "http://127.0.0.1:8899";
const DEFAULT_DEPOSIT_LAMPORTS: u64 = 100_000_000;
/// `cargo xtask build-program` writes the program here.
const PROGRAM_BIN_CANDIDATES: [&str; 1] = ["./target/deploy/solanaroll.so"];
/// Transactions outside the chunked program writes: buffer, deploy,
/// accounts, deposit, with headroom.
const FIXED_TRANSACTIONS: u64 = 8;

#[derive(Parser, Debug)]
#[command(
    name = "solanaroll-deploy",
    about = "Deploy the solanaroll program, provision its accounts and report their state",
    version,
    group(
        ArgGroup::new("network")
            .args(["devnet", "testnet", "local"])
            .required(false)
    )
)]
struct Args {
    /// Deploy to Solana devnet (default)
    #[arg(long)]
    devnet: bool,

    /// Deploy to Solana testnet
    #[arg(long)]
    testnet: bool,

    /// Deploy to a local validator
    #[arg(long)]
    local: bool,

    /// Override RPC URL
    #[arg(long)]
    rpc_url: Option<String>,

    /// Fee payer keypair (defaults to ~/.config/solana/id.json, `prompt` for a seed phrase)
    #[arg(long)]
    keypair: Option<String>,

    /// Program binary (defaults to ./target/deploy/solanaroll.so)
    #[arg(long, env = "SOLANAROLL_PROGRAM_SO")]
    program: Option<String>,

    /// Lamports deposited into the treasury after deploying
    #[arg(long, default_value_t = DEFAULT_DEPOSIT_LAMPORTS)]
    deposit_lamports: u64,

    /// Which action to perform (defaults to deploy)
    #[arg(short, long, value_enum, default_value = "deploy")]
    action: Action,
}

#[derive(Debug, Clone, clap::ValueEnum)]
enum Action {
    Deploy,
    Report,
}

impl Args {
    fn network(&self) -> (DeploymentEnv, String) {
        let (env, default_url) = if self.testnet {
            (DeploymentEnv::Test, DEFAULT_TESTNET_RPC_URL)
        } else if self.local {
            (DeploymentEnv::Local, DEFAULT_LOCAL_RPC_URL)
        } else {
            (DeploymentEnv::Dev, DEFAULT_DEVNET_RPC_URL)
        };
        let url = self
            .rpc_url
            .clone()
            .unwrap_or_else(|| default_url.to_string());
        (env, url)
    }
}

/// Accounts created (or reused) for one deployment.
#[derive(Clone, Copy, Debug)]
struct ProvisionedAccounts {
    game: Pubkey,
    addresses: ProgramAddresses,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    deployments::ensure_structure().context("initializing deployment directories")?;

    let (env, rpc_url) = args.network();
    let store = DeploymentStore::new(env).context("opening deployment store")?;
    let rpc = establish_connection(&rpc_url).await?;

    if let Action::Report = args.action {
        let record = latest_record(&store)?;
        let accounts = accounts_from_record(&record)?;
        report(&rpc, &accounts).await?;
        return Ok(());
    }

    let program_path = match args.program.as_deref() {
        Some(path) => path,
        None => choose_binary(&PROGRAM_BIN_CANDIDATES).context("locating program binary")?,
    };
    let program_bytes = std::fs::read(program_path)
        .with_context(|| format!("Failed to read program binary from {program_path}"))?;
    let budget = estimate_budget(&rpc, program_bytes.len(), args.deposit_lamports).await?;
    let owner = establish_owner(&rpc, args.keypair.as_deref(), budget).await?;

    let previous = store.latest().context("loading deployment records")?;
    let bytecode_hash = deployments::hash_bytes(&program_bytes);
    let (program_id, reused) =
        load_program(&rpc, &owner, &program_bytes, &bytecode_hash, previous.as_ref()).await?;
    let reusable_record = previous.as_ref().filter(|_| reused);
    let accounts = create_game_account(&rpc, &owner, program_id, reusable_record).await?;
    let deposit_signature =
        send_deposit(&rpc, &owner, &accounts.addresses, args.deposit_lamports).await?;
    report(&rpc, &accounts).await?;

    let mut record = DeploymentRecord::new(program_id.to_string(), bytecode_hash, rpc_url);
    record.game_account = Some(accounts.game.to_string());
    record.treasury_account = Some(accounts.addresses.treasury.to_string());
    record.treasury_mint = Some(accounts.addresses.treasury_mint.to_string());
    record.deposit_signature = Some(deposit_signature.to_string());
    store.append(record).context("recording deployment")?;
    println!("Deployment metadata written to {}", store.path().display());
    println!("Success");
    Ok(())
}

async fn establish_connection(url: &str) -> Result<RpcClient> {
    let rpc = RpcClient::new_with_commitment(url.to_string(), CommitmentConfig::confirmed());
    let version = rpc
        .get_version()
        .await
        .with_context(|| format!("failed to connect to {url}"))?;
    println!(
        "Connection to cluster established: {} (solana-core {})",
        url, version.solana_core
    );
    Ok(rpc)
}

async fn estimate_budget(rpc: &RpcClient, program_len: usize, deposit: u64) -> Result<DeployBudget> {
    let mut rent = loader::program_rent(rpc, program_len).await?;
    for size in [
        GAME_ACCOUNT_SPACE,
        0,
        instruction::MINT_ACCOUNT_SPACE,
        instruction::TOKEN_ACCOUNT_SPACE,
    ] {
        rent += rpc
            .get_minimum_balance_for_rent_exemption(size)
            .await
            .context("fetching account rent")?;
    }
    Ok(DeployBudget {
        rent,
        deposit,
        transactions: loader::write_transaction_count(program_len) + FIXED_TRANSACTIONS,
    })
}

async fn establish_owner(
    rpc: &RpcClient,
    keypair: Option<&str>,
    budget: DeployBudget,
) -> Result<Keypair> {
    let owner = wallets::unlock_owner(keypair).context("loading fee payer keypair")?;
    let mut balance = rpc
        .get_balance(&owner.pubkey())
        .await
        .context("fetching fee payer balance")?;
    let shortfall = budget.shortfall(balance);
    if shortfall > 0 {
        println!(
            "Requesting airdrop of {} SOL to cover the estimated {} SOL",
            lamports_to_sol(shortfall),
            lamports_to_sol(budget.total())
        );
        let signature = rpc
            .request_airdrop(&owner.pubkey(), shortfall)
            .await
            .context("requesting airdrop")?;
        rpc.poll_for_signature(&signature)
            .await
            .context("confirming airdrop")?;
        balance = rpc
            .get_balance(&owner.pubkey())
            .await
            .context("fetching fee payer balance")?;
    }
    println!(
        "Using account {} containing {} SOL to pay for fees",
        owner.pubkey(),
        lamports_to_sol(balance)
    );
    Ok(owner)
}

async fn load_program(
    rpc: &RpcClient,
    owner: &Keypair,
    program_bytes: &[u8],
    bytecode_hash: &str,
    previous: Option<&DeploymentRecord>,
) -> Result<(Pubkey, bool)> {
    if let Some(record) = previous {
        let program_id = parse_pubkey(&record.program_id)
            .with_context(|| format!("parsing stored program id {}", record.program_id))?;
        let account = rpc
            .get_account_with_commitment(&program_id, rpc.commitment())
            .await
            .context("fetching recorded program account")?
            .value;
        if loader::is_reusable(previous, bytecode_hash, account.as_ref()) {
            println!("Program already loaded to account {program_id}");
            return Ok((program_id, true));
        }
    }
    println!("Loading program ({} bytes)...", program_bytes.len());
    let program_id = loader::deploy_program(rpc, owner, program_bytes)
        .await
        .context("deploying program")?;
    println!("Program loaded to account {program_id}");
    Ok((program_id, false))
}

async fn create_game_account(
    rpc: &RpcClient,
    owner: &Keypair,
    program_id: Pubkey,
    reusable: Option<&DeploymentRecord>,
) -> Result<ProvisionedAccounts> {
    let payer = owner.pubkey();
    let game = Keypair::new();
    let game_rent = rpc
        .get_minimum_balance_for_rent_exemption(GAME_ACCOUNT_SPACE)
        .await
        .context("fetching game account rent")?;
    let mut instructions = vec![instruction::create_program_account(
        &program_id,
        &payer,
        &game.pubkey(),
        game_rent,
        GAME_ACCOUNT_SPACE as u64,
    )];
    let treasury = Keypair::new();
    let mint = Keypair::new();
    let mut signers = vec![&game];

    let stored = match reusable.and_then(stored_treasury) {
        Some((treasury_id, mint_id)) => {
            let mint_account = rpc
                .get_account_with_commitment(&mint_id, rpc.commitment())
                .await
                .context("fetching stored treasury mint")?
                .value;
            if mint_account.is_some_and(|a| owner_can_mint(&a.data, &payer)) {
                Some((treasury_id, mint_id))
            } else {
                println!(
                    "Stored treasury mint {mint_id} is not minted by {payer}; creating a new one"
                );
                None
            }
        }
        None => None,
    };
    let (treasury_id, mint_id) = match stored {
        Some((treasury_id, mint_id)) => {
            println!("Reusing treasury {treasury_id} and mint {mint_id}");
            (treasury_id, mint_id)
        }
        None => {
            let treasury_rent = rpc
                .get_minimum_balance_for_rent_exemption(0)
                .await
                .context("fetching treasury rent")?;
            let mint_rent = rpc
                .get_minimum_balance_for_rent_exemption(instruction::MINT_ACCOUNT_SPACE)
                .await
                .context("fetching mint rent")?;
            instructions.extend(treasury_instructions(
                &program_id,
                &payer,
                &treasury.pubkey(),
                &mint.pubkey(),
                treasury_rent,
                mint_rent,
            )?);
            signers.push(&treasury);
            signers.push(&mint);
            (treasury.pubkey(), mint.pubkey())
        }
    };

    loader::send_instructions(rpc, owner, &instructions, &signers)
        .await
        .context("creating game accounts")?;
    println!("Created game account {}", game.pubkey());
    println!("Treasury account {treasury_id}, treasury mint {mint_id}");
    Ok(ProvisionedAccounts {
        game: game.pubkey(),
        addresses: ProgramAddresses {
            program_id,
            treasury: treasury_id,
            treasury_mint: mint_id,
        },
    })
}

async fn send_deposit(
    rpc: &RpcClient,
    owner: &Keypair,
    addresses: &ProgramAddresses,
    lamports: u64,
) -> Result<Signature> {
    if lamports == 0 {
        anyhow::bail!("--deposit-lamports must be greater than 0");
    }
    let payer = owner.pubkey();
    let token_account = Keypair::new();
    let fund = Keypair::new();
    let mut signers: Vec<&Keypair> = Vec::with_capacity(2);

    let existing = rpc
        .get_token_accounts_by_owner(&payer, TokenAccountsFilter::Mint(addresses.treasury_mint))
        .await
        .context("fetching owner token accounts")?
        .into_iter()
        .next()
        .map(|keyed| Pubkey::from_str(&keyed.pubkey))
        .transpose()
        .context("parsing owner token account")?;
    let (user_token, new_token_rent) = match existing {
        Some(account) => (account, None),
        None => {
            let rent = rpc
                .get_minimum_balance_for_rent_exemption(instruction::TOKEN_ACCOUNT_SPACE)
                .await
                .context("fetching token account rent")?;
            signers.push(&token_account);
            (token_account.pubkey(), Some(rent))
        }
    };
    let instructions = deposit_instructions(
        addresses,
        &payer,
        &fund.pubkey(),
        &user_token,
        new_token_rent,
        lamports,
    )?;
    signers.push(&fund);

    let signature = loader::send_instructions(rpc, owner, &instructions, &signers)
        .await
        .context("sending treasury deposit")?;
    println!(
        "Deposited {} SOL into the treasury (tx: {signature})",
        lamports_to_sol(lamports)
    );
    Ok(signature)
}

async fn report(rpc: &RpcClient, accounts: &ProvisionedAccounts) -> Result<()> {
    let game = rpc
        .get_account(&accounts.game)
        .await
        .with_context(|| format!("fetching game account {}", accounts.game))?;
    let state = GameAccount::try_from(game.data.as_slice()).context("decoding game account")?;
    println!("Game account {}:", accounts.game);
    println!("  roll under:   {}", state.roll_under);
    println!("  commit slot:  {}", state.commit_slot);
    println!("  committed:    {}", state.is_committed());
    println!("  resolved:     {} (result {})", state.is_resolved(), state.result);

    let treasury = rpc
        .get_balance(&accounts.addresses.treasury)
        .await
        .context("fetching treasury balance")?;
    println!(
        "Treasury {} holds {} SOL",
        accounts.addresses.treasury,
        lamports_to_sol(treasury)
    );
    let supply = rpc
        .get_token_supply(&accounts.addresses.treasury_mint)
        .await
        .context("fetching treasury token supply")?;
    println!(
        "Treasury token supply: {} ({})",
        supply.ui_amount_string, accounts.addresses.treasury_mint
    );
    Ok(())
}

/// Treasury account plus a mint whose authority is the deploying owner, so
/// the owner can sign deposits.
fn treasury_instructions(
    program_id: &Pubkey,
    owner: &Pubkey,
    treasury: &Pubkey,
    mint: &Pubkey,
    treasury_rent: u64,
    mint_rent: u64,
) -> Result<Vec<Instruction>> {
    let mut instructions = vec![instruction::create_program_account(
        program_id,
        owner,
        treasury,
        treasury_rent,
        0,
    )];
    instructions.extend(
        instruction::create_treasury_mint(owner, mint, owner, mint_rent)
            .context("building treasury mint instructions")?,
    );
    Ok(instructions)
}

/// Owner-funded deposit. `new_token_rent` creates `user_token` first.
fn deposit_instructions(
    addresses: &ProgramAddresses,
    owner: &Pubkey,
    fund: &Pubkey,
    user_token: &Pubkey,
    new_token_rent: Option<u64>,
    lamports: u64,
) -> Result<Vec<Instruction>> {
    let mut instructions = Vec::with_capacity(4);
    if let Some(rent) = new_token_rent {
        instructions.extend(
            instruction::create_token_account(
                owner,
                user_token,
                &addresses.treasury_mint,
                owner,
                rent,
            )
            .context("building token account instructions")?,
        );
    }
    instructions.push(instruction::create_fund_account(
        &addresses.program_id,
        owner,
        fund,
        lamports,
    ));
    instructions.push(instruction::deposit(
        addresses,
        owner,
        fund,
        user_token,
        lamports,
    ));
    Ok(instructions)
}

fn stored_treasury(record: &DeploymentRecord) -> Option<(Pubkey, Pubkey)> {
    Some((
        parse_pubkey(record.treasury_account.as_deref()?).ok()?,
        parse_pubkey(record.treasury_mint.as_deref()?).ok()?,
    ))
}

fn owner_can_mint(mint_data: &[u8], owner: &Pubkey) -> bool {
    matches!(
        program_client::treasury_mint_authority(mint_data),
        Ok(Some(authority)) if authority == *owner
    )
}

fn accounts_from_record(record: &DeploymentRecord) -> Result<ProvisionedAccounts> {
    let field = |name: &str, value: &Option<String>| -> Result<Pubkey> {
        let raw = value
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("latest deployment has no {name}"))?;
        parse_pubkey(raw).with_context(|| format!("parsing stored {name}"))
    };
    Ok(ProvisionedAccounts {
        game: field("game account", &record.game_account)?,
        addresses: ProgramAddresses {
            program_id: parse_pubkey(&record.program_id).context("parsing stored program id")?,
            treasury: field("treasury account", &record.treasury_account)?,
            treasury_mint: field("treasury mint", &record.treasury_mint)?,
        },
    })
}

fn choose_binary<'a>(paths: &'a [&str]) -> Result<&'a str> {
    paths
        .iter()
        .find(|p| Path::new(p).exists())
        .copied()
        .ok_or_else(|| anyhow::anyhow!("Program binary not found. Tried {:?}", paths))
}

fn latest_record(store: &DeploymentStore) -> Result<DeploymentRecord> {
    store
        .latest()
        .context("loading deployment records")?
        .ok_or_else(|| anyhow::anyhow!("no deployments found for this environment"))
}
