//! Deposit and withdraw transaction sequences.
//!
//! Nothing here guards against submitting the same action twice; every call
//! builds and sends a fresh transaction.

use crate::odds::sol_to_lamports;
use color_eyre::eyre::{
    Result,
    WrapErr,
    bail,
    eyre,
};
use program_client::{
    ProgramAddresses,
    TREASURY_TOKEN_DECIMALS,
    instruction,
};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::{
    instruction::Instruction,
    pubkey::Pubkey,
    signature::{
        Keypair,
        Signature,
        Signer,
    },
    transaction::Transaction,
};
use tracing::info;

/// Instructions of one action plus the extra keypairs (beyond the wallet)
/// that have to sign them.
pub struct ActionPlan {
    pub instructions: Vec<Instruction>,
    pub extra_signers: Vec<Keypair>,
    pub user_token_account: Pubkey,
}

impl ActionPlan {
    pub fn describe(&self) -> String {
        format!(
            "{} instruction(s), {} extra signer(s)",
            self.instructions.len(),
            self.extra_signers.len()
        )
    }
}

/// Converts a token amount in whole tokens to base units.
pub fn tokens_to_base_units(tokens: f64) -> u64 {
    (tokens * 10f64.powi(i32::from(TREASURY_TOKEN_DECIMALS))).round() as u64
}

/// Deposit sequence: optional user token account, a fresh fund account
/// holding the deposit, then the program's deposit instruction.
///
/// The wallet funds both accounts and owns the token account. The deposit
/// itself is signed by the treasury mint authority, which may be the wallet.
/// `token_account_rent` is only read when the user has no token account yet.
pub fn plan_deposit(
    addresses: &ProgramAddresses,
    wallet: &Pubkey,
    mint_authority: &Pubkey,
    existing_token_account: Option<Pubkey>,
    lamports: u64,
    token_account_rent: u64,
) -> Result<ActionPlan> {
    if lamports == 0 {
        bail!("deposit amount must be greater than zero");
    }
    let mut instructions = Vec::with_capacity(4);
    let mut extra_signers = Vec::with_capacity(2);

    let user_token_account = match existing_token_account {
        Some(account) => account,
        None => {
            let token_account = Keypair::new();
            instructions.extend(
                instruction::create_token_account(
                    wallet,
                    &token_account.pubkey(),
                    &addresses.treasury_mint,
                    wallet,
                    token_account_rent,
                )
                .map_err(|e| eyre!("building token account instructions: {e}"))?,
            );
            let address = token_account.pubkey();
            extra_signers.push(token_account);
            address
        }
    };

    let fund_account = Keypair::new();
    instructions.push(instruction::create_fund_account(
        &addresses.program_id,
        wallet,
        &fund_account.pubkey(),
        lamports,
    ));
    instructions.push(instruction::deposit(
        addresses,
        mint_authority,
        &fund_account.pubkey(),
        &user_token_account,
        lamports,
    ));
    extra_signers.push(fund_account);

    Ok(ActionPlan {
        instructions,
        extra_signers,
        user_token_account,
    })
}

/// Withdraw sequence: burn `token_amount` base units for their SOL share.
pub fn plan_withdraw(
    addresses: &ProgramAddresses,
    wallet: &Pubkey,
    user_token_account: Option<Pubkey>,
    token_balance: u64,
    token_amount: u64,
) -> Result<ActionPlan> {
    let Some(user_token_account) = user_token_account else {
        bail!("no treasury token account to withdraw from");
    };
    if token_balance == 0 {
        bail!("treasury token balance is empty");
    }
    if token_amount == 0 {
        bail!("withdraw amount must be greater than zero");
    }
    Ok(ActionPlan {
        instructions: vec![instruction::withdraw(
            addresses,
            wallet,
            &user_token_account,
            token_amount,
        )],
        extra_signers: Vec::new(),
        user_token_account,
    })
}

/// Signs with the wallet as fee payer, the plan's own keypairs and an
/// optional co-signer that is not the wallet.
pub async fn send_plan(
    rpc: &RpcClient,
    wallet: &Keypair,
    co_signer: Option<&Keypair>,
    plan: &ActionPlan,
) -> Result<Signature> {
    let blockhash = rpc
        .get_latest_blockhash()
        .await
        .wrap_err("fetching latest blockhash")?;
    let mut signers: Vec<&dyn Signer> = vec![wallet];
    signers.extend(
        co_signer
            .filter(|k| k.pubkey() != wallet.pubkey())
            .map(|k| k as &dyn Signer),
    );
    signers.extend(plan.extra_signers.iter().map(|k| k as &dyn Signer));
    let tx = Transaction::new_signed_with_payer(
        &plan.instructions,
        Some(&wallet.pubkey()),
        &signers,
        blockhash,
    );
    rpc.send_and_confirm_transaction(&tx)
        .await
        .wrap_err("submitting transaction")
}

/// Without a separate `mint_authority` the wallet has to be the treasury
/// mint authority itself.
pub async fn send_deposit_sequence(
    rpc: &RpcClient,
    addresses: &ProgramAddresses,
    wallet: &Keypair,
    mint_authority: Option<&Keypair>,
    existing_token_account: Option<Pubkey>,
    amount_sol: f64,
) -> Result<(Signature, Pubkey)> {
    let lamports = sol_to_lamports(amount_sol);
    let rent = if existing_token_account.is_some() {
        0
    } else {
        rpc.get_minimum_balance_for_rent_exemption(instruction::TOKEN_ACCOUNT_SPACE)
            .await
            .wrap_err("fetching token account rent")?
    };
    let authority = mint_authority.unwrap_or(wallet);
    let plan = plan_deposit(
        addresses,
        &wallet.pubkey(),
        &authority.pubkey(),
        existing_token_account,
        lamports,
        rent,
    )?;
    info!(
        lamports,
        mint_authority = %authority.pubkey(),
        plan = %plan.describe(),
        "depositing to treasury"
    );
    let signature = send_plan(rpc, wallet, Some(authority), &plan).await?;
    Ok((signature, plan.user_token_account))
}

pub async fn send_withdraw_sequence(
    rpc: &RpcClient,
    addresses: &ProgramAddresses,
    wallet: &Keypair,
    user_token_account: Option<Pubkey>,
    token_balance: u64,
    amount_tokens: f64,
) -> Result<Signature> {
    let amount = tokens_to_base_units(amount_tokens);
    let plan = plan_withdraw(
        addresses,
        &wallet.pubkey(),
        user_token_account,
        token_balance,
        amount,
    )?;
    info!(amount, "withdrawing from treasury");
    send_plan(rpc, wallet, None, &plan).await
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use program_client::instruction::TreasuryInstruction;

    fn addresses() -> ProgramAddresses {
        ProgramAddresses {
            program_id: Pubkey::new_unique(),
            treasury: Pubkey::new_unique(),
            treasury_mint: Pubkey::new_unique(),
        }
    }

    #[test]
    fn plan_deposit__creates_token_account_when_missing() {
        // given
        let addresses = addresses();
        let wallet = Pubkey::new_unique();

        // when
        let plan =
            plan_deposit(&addresses, &wallet, &wallet, None, 1_000_000_000, 2_039_280).unwrap();

        // then
        assert_eq!(plan.instructions.len(), 4);
        assert_eq!(plan.extra_signers.len(), 2);
        assert_eq!(plan.user_token_account, plan.extra_signers[0].pubkey());
        let deposit = plan.instructions.last().unwrap();
        assert_eq!(deposit.program_id, addresses.program_id);
        assert_eq!(deposit.accounts[1].pubkey, plan.extra_signers[1].pubkey());
        assert_eq!(deposit.accounts[3].pubkey, plan.user_token_account);
        assert_eq!(
            deposit.data,
            TreasuryInstruction::Deposit {
                amount: 1_000_000_000
            }
            .pack()
        );
    }

    #[test]
    fn plan_deposit__reuses_existing_token_account() {
        // given
        let addresses = addresses();
        let wallet = Pubkey::new_unique();
        let existing = Pubkey::new_unique();

        // when
        let plan = plan_deposit(&addresses, &wallet, &wallet, Some(existing), 5, 0).unwrap();

        // then
        assert_eq!(plan.instructions.len(), 2);
        assert_eq!(plan.extra_signers.len(), 1);
        assert_eq!(plan.user_token_account, existing);
    }

    #[test]
    fn plan_deposit__rejects_zero_amount() {
        let wallet = Pubkey::new_unique();
        let result = plan_deposit(&addresses(), &wallet, &wallet, None, 0, 0);
        assert!(result.is_err());
    }

    #[test]
    fn plan_deposit__mint_authority_signs_while_wallet_funds() {
        // given
        let addresses = addresses();
        let wallet = Pubkey::new_unique();
        let authority = Pubkey::new_unique();

        // when
        let plan = plan_deposit(&addresses, &wallet, &authority, None, 10, 2_039_280).unwrap();

        // then
        let [create_token, init_token, create_fund, deposit] = plan.instructions.as_slice() else {
            panic!("expected four instructions");
        };
        assert_eq!(create_token.accounts[0].pubkey, wallet);
        assert_eq!(init_token.accounts[2].pubkey, wallet);
        assert_eq!(create_fund.accounts[0].pubkey, wallet);
        assert_eq!(deposit.accounts[0].pubkey, authority);
        assert!(deposit.accounts[0].is_signer);
        assert!(plan.extra_signers.iter().all(|k| k.pubkey() != authority));
    }

    #[test]
    fn plan_withdraw__requires_token_account_and_balance() {
        // given
        let addresses = addresses();
        let wallet = Pubkey::new_unique();
        let account = Pubkey::new_unique();

        // then
        assert!(plan_withdraw(&addresses, &wallet, None, 10, 1).is_err());
        assert!(plan_withdraw(&addresses, &wallet, Some(account), 0, 1).is_err());
        assert!(plan_withdraw(&addresses, &wallet, Some(account), 10, 0).is_err());
        let plan = plan_withdraw(&addresses, &wallet, Some(account), 10, 3).unwrap();
        assert_eq!(plan.instructions.len(), 1);
        assert!(plan.extra_signers.is_empty());
        assert_eq!(
            plan.instructions[0].data,
            TreasuryInstruction::Withdraw { amount: 3 }.pack()
        );
    }

    #[test]
    fn tokens_to_base_units__uses_nine_decimals() {
        assert_eq!(tokens_to_base_units(1.0), 1_000_000_000);
        assert_eq!(tokens_to_base_units(0.25), 250_000_000);
    }
}
