//! Instruction packing for the treasury program plus the system/SPL token
//! instructions that bootstrap the accounts it expects.

#![allow(deprecated)]

use crate::{
    ProgramAddresses,
    TREASURY_TOKEN_DECIMALS,
};
use solana_sdk::{
    instruction::{
        AccountMeta,
        Instruction,
    },
    program_error::ProgramError,
    pubkey::Pubkey,
    system_instruction,
};
use spl_token::solana_program::program_pack::Pack;

const DEPOSIT_TAG: u8 = 2;
const WITHDRAW_TAG: u8 = 3;

/// Treasury instructions the clients submit. Amounts are little-endian u64.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TreasuryInstruction {
    /// Moves the lamports of a fund account into the treasury and mints
    /// treasury tokens pro rata. The program reads the deposit from the fund
    /// account balance, `amount` only has to be non-zero.
    Deposit { amount: u64 },
    /// Burns `amount` treasury tokens and pays out the SOL equivalent.
    Withdraw { amount: u64 },
}

impl TreasuryInstruction {
    pub fn pack(&self) -> Vec<u8> {
        let (tag, amount) = match *self {
            TreasuryInstruction::Deposit { amount } => (DEPOSIT_TAG, amount),
            TreasuryInstruction::Withdraw { amount } => (WITHDRAW_TAG, amount),
        };
        let mut data = Vec::with_capacity(9);
        data.push(tag);
        data.extend_from_slice(&amount.to_le_bytes());
        data
    }
}

/// `mint_authority` sits in account slot 0 and signs: the program mints the
/// depositor's tokens with it as the `mint_to` authority.
pub fn deposit(
    addresses: &ProgramAddresses,
    mint_authority: &Pubkey,
    fund_account: &Pubkey,
    user_token_account: &Pubkey,
    amount: u64,
) -> Instruction {
    Instruction::new_with_bytes(
        addresses.program_id,
        &TreasuryInstruction::Deposit { amount }.pack(),
        vec![
            AccountMeta::new(*mint_authority, true),
            AccountMeta::new(*fund_account, false),
            AccountMeta::new(addresses.treasury_mint, false),
            AccountMeta::new(*user_token_account, false),
            AccountMeta::new_readonly(spl_token::id(), false),
            AccountMeta::new(addresses.treasury, false),
        ],
    )
}

pub fn withdraw(
    addresses: &ProgramAddresses,
    payer: &Pubkey,
    user_token_account: &Pubkey,
    amount: u64,
) -> Instruction {
    Instruction::new_with_bytes(
        addresses.program_id,
        &TreasuryInstruction::Withdraw { amount }.pack(),
        vec![
            AccountMeta::new(*payer, true),
            AccountMeta::new(addresses.treasury_mint, false),
            AccountMeta::new(*user_token_account, false),
            AccountMeta::new_readonly(spl_token::id(), false),
            AccountMeta::new(addresses.treasury, false),
        ],
    )
}

/// A zero-data account owned by the program that carries one deposit.
pub fn create_fund_account(
    program_id: &Pubkey,
    payer: &Pubkey,
    fund_account: &Pubkey,
    lamports: u64,
) -> Instruction {
    system_instruction::create_account(payer, fund_account, lamports, 0, program_id)
}

/// Program-owned account with `space` bytes of data.
pub fn create_program_account(
    program_id: &Pubkey,
    payer: &Pubkey,
    account: &Pubkey,
    rent_lamports: u64,
    space: u64,
) -> Instruction {
    system_instruction::create_account(payer, account, rent_lamports, space, program_id)
}

pub fn create_token_account(
    payer: &Pubkey,
    token_account: &Pubkey,
    mint: &Pubkey,
    owner: &Pubkey,
    rent_lamports: u64,
) -> Result<[Instruction; 2], ProgramError> {
    Ok([
        system_instruction::create_account(
            payer,
            token_account,
            rent_lamports,
            spl_token::state::Account::LEN as u64,
            &spl_token::id(),
        ),
        spl_token::instruction::initialize_account(
            &spl_token::id(),
            token_account,
            mint,
            owner,
        )?,
    ])
}

/// Creates the treasury mint. `mint_authority` has to sign every later
/// deposit.
pub fn create_treasury_mint(
    payer: &Pubkey,
    mint: &Pubkey,
    mint_authority: &Pubkey,
    rent_lamports: u64,
) -> Result<[Instruction; 2], ProgramError> {
    Ok([
        system_instruction::create_account(
            payer,
            mint,
            rent_lamports,
            spl_token::state::Mint::LEN as u64,
            &spl_token::id(),
        ),
        spl_token::instruction::initialize_mint(
            &spl_token::id(),
            mint,
            mint_authority,
            None,
            TREASURY_TOKEN_DECIMALS,
        )?,
    ])
}

pub const TOKEN_ACCOUNT_SPACE: usize = spl_token::state::Account::LEN;
pub const MINT_ACCOUNT_SPACE: usize = spl_token::state::Mint::LEN;
