#![allow(deprecated)]

use anyhow::{
    Context,
    Result,
};
use deployments::DeploymentRecord;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::{
    account::Account,
    bpf_loader_upgradeable::{
        self,
        UpgradeableLoaderState,
    },
    instruction::Instruction,
    packet::PACKET_DATA_SIZE,
    pubkey::Pubkey,
    signature::{
        Keypair,
        Signature,
        Signer,
    },
    transaction::Transaction,
};
use tracing::{
    debug,
    info,
};

/// Bytes of program data per write transaction, leaving room for the
/// signature, keys and instruction header.
pub const WRITE_CHUNK_SIZE: usize = PACKET_DATA_SIZE - 300;
/// Fee per signature on every cluster this tool targets.
pub const LAMPORTS_PER_SIGNATURE: u64 = 5_000;
/// Upper bound on signers in one deploy transaction.
const MAX_SIGNERS: u64 = 4;

/// Lamports a full deploy may spend, used to size the owner airdrop.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DeployBudget {
    pub rent: u64,
    pub deposit: u64,
    pub transactions: u64,
}

impl DeployBudget {
    pub fn total(&self) -> u64 {
        self.rent
            .saturating_add(self.deposit)
            .saturating_add(self.transactions * MAX_SIGNERS * LAMPORTS_PER_SIGNATURE)
    }

    pub fn shortfall(&self, balance: u64) -> u64 {
        self.total().saturating_sub(balance)
    }
}

/// Offsets and slices of `bytes` in loader write order.
pub fn write_chunks(bytes: &[u8], chunk_size: usize) -> impl Iterator<Item = (u32, &[u8])> {
    bytes
        .chunks(chunk_size)
        .enumerate()
        .map(move |(i, chunk)| ((i * chunk_size) as u32, chunk))
}

pub fn write_transaction_count(program_len: usize) -> u64 {
    program_len.div_ceil(WRITE_CHUNK_SIZE) as u64
}

/// A recorded program is reused when its bytecode is unchanged and the
/// account is still there and executable.
pub fn is_reusable(
    record: Option<&DeploymentRecord>,
    bytecode_hash: &str,
    program_account: Option<&Account>,
) -> bool {
    record.is_some_and(|r| r.is_compatible_with_hash(bytecode_hash))
        && program_account.is_some_and(|a| a.executable)
}

pub async fn send_instructions(
    rpc: &RpcClient,
    payer: &Keypair,
    instructions: &[Instruction],
    extra_signers: &[&Keypair],
) -> Result<Signature> {
    let blockhash = rpc
        .get_latest_blockhash()
        .await
        .context("fetching latest blockhash")?;
    let mut signers: Vec<&dyn Signer> = vec![payer];
    signers.extend(extra_signers.iter().map(|k| *k as &dyn Signer));
    let tx = Transaction::new_signed_with_payer(
        instructions,
        Some(&payer.pubkey()),
        &signers,
        blockhash,
    );
    rpc.send_and_confirm_transaction(&tx)
        .await
        .context("submitting transaction")
}

/// Rent for everything the upgradeable loader allocates for a program of
/// `program_len` bytes.
pub async fn program_rent(rpc: &RpcClient, program_len: usize) -> Result<u64> {
    let mut total = 0u64;
    for size in [
        UpgradeableLoaderState::size_of_buffer(program_len),
        UpgradeableLoaderState::size_of_programdata(program_len * 2),
        UpgradeableLoaderState::size_of_program(),
    ] {
        total += rpc
            .get_minimum_balance_for_rent_exemption(size)
            .await
            .context("fetching loader rent")?;
    }
    Ok(total)
}

/// Buffer, chunked writes, then deploy. Returns the new program id.
pub async fn deploy_program(rpc: &RpcClient, payer: &Keypair, bytes: &[u8]) -> Result<Pubkey> {
    let buffer = Keypair::new();
    let program = Keypair::new();
    let program_len = bytes.len();

    let buffer_rent = rpc
        .get_minimum_balance_for_rent_exemption(UpgradeableLoaderState::size_of_buffer(
            program_len,
        ))
        .await
        .context("fetching buffer rent")?;
    let create = bpf_loader_upgradeable::create_buffer(
        &payer.pubkey(),
        &buffer.pubkey(),
        &payer.pubkey(),
        buffer_rent,
        program_len,
    )
    .context("building buffer instructions")?;
    send_instructions(rpc, payer, &create, &[&buffer])
        .await
        .context("creating program buffer")?;
    info!(buffer = %buffer.pubkey(), program_len, "program buffer created");

    let writes = write_transaction_count(program_len);
    for (offset, chunk) in write_chunks(bytes, WRITE_CHUNK_SIZE) {
        let ix = bpf_loader_upgradeable::write(
            &buffer.pubkey(),
            &payer.pubkey(),
            offset,
            chunk.to_vec(),
        );
        send_instructions(rpc, payer, &[ix], &[])
            .await
            .with_context(|| format!("writing program bytes at offset {offset}"))?;
        debug!(offset, writes, "program chunk written");
    }

    let program_lamports = rpc
        .get_minimum_balance_for_rent_exemption(UpgradeableLoaderState::size_of_program())
        .await
        .context("fetching program account rent")?;
    let deploy = bpf_loader_upgradeable::deploy_with_max_program_len(
        &payer.pubkey(),
        &program.pubkey(),
        &buffer.pubkey(),
        &payer.pubkey(),
        program_lamports,
        program_len * 2,
    )
    .context("building deploy instructions")?;
    send_instructions(rpc, payer, &deploy, &[&program])
        .await
        .context("deploying program from buffer")?;
    Ok(program.pubkey())
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn write_chunks__covers_every_byte_once() {
        // given
        let bytes: Vec<u8> = (0..2_500u32).map(|i| i as u8).collect();

        // when
        let chunks: Vec<(u32, &[u8])> = write_chunks(&bytes, 1_000).collect();

        // then
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].0, 0);
        assert_eq!(chunks[1].0, 1_000);
        assert_eq!(chunks[2].0, 2_000);
        assert_eq!(chunks[2].1.len(), 500);
        let rebuilt: Vec<u8> = chunks.iter().flat_map(|(_, c)| c.iter().copied()).collect();
        assert_eq!(rebuilt, bytes);
    }

    #[test]
    fn write_transaction_count__rounds_up() {
        assert_eq!(write_transaction_count(0), 0);
        assert_eq!(write_transaction_count(1), 1);
        assert_eq!(write_transaction_count(WRITE_CHUNK_SIZE), 1);
        assert_eq!(write_transaction_count(WRITE_CHUNK_SIZE + 1), 2);
    }

    #[test]
    fn deploy_budget__shortfall_only_when_underfunded() {
        // given
        let budget = DeployBudget {
            rent: 1_000_000,
            deposit: 500_000,
            transactions: 10,
        };

        // then
        assert_eq!(budget.total(), 1_700_000);
        assert_eq!(budget.shortfall(2_000_000), 0);
        assert_eq!(budget.shortfall(1_000_000), 700_000);
    }

    #[test]
    fn is_reusable__needs_matching_hash_and_executable_account() {
        // given
        let record = DeploymentRecord::new(Pubkey::new_unique().to_string(), "abc", "url");
        let executable = Account {
            executable: true,
            ..Account::default()
        };
        let data_only = Account::default();

        // then
        assert!(is_reusable(Some(&record), "abc", Some(&executable)));
        assert!(!is_reusable(Some(&record), "def", Some(&executable)));
        assert!(!is_reusable(Some(&record), "abc", Some(&data_only)));
        assert!(!is_reusable(Some(&record), "abc", None));
        assert!(!is_reusable(None, "abc", Some(&executable)));
    }
}
