use crate::holders::HolderBalance;
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use solana_client::{
    nonblocking::rpc_client::RpcClient,
    rpc_request::TokenAccountsFilter,
};
use solana_sdk::{
    commitment_config::CommitmentConfig,
    pubkey::Pubkey,
};
use std::{
    future::Future,
    str::FromStr,
    sync::Arc,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct UserTokenAccount {
    pub address: Pubkey,
    pub amount: u64,
}

/// Read side of the ledger the dashboard depends on.
pub trait Ledger: Clone + Send + Sync + 'static {
    fn balance(&self, account: &Pubkey) -> impl Future<Output = Result<u64>> + Send;

    fn token_supply(&self, mint: &Pubkey) -> impl Future<Output = Result<u64>> + Send;

    /// Largest token accounts of `mint`, largest first.
    fn largest_token_accounts(
        &self,
        mint: &Pubkey,
    ) -> impl Future<Output = Result<Vec<HolderBalance>>> + Send;

    /// First token account of `owner` for `mint`, if any.
    fn token_account_of(
        &self,
        owner: &Pubkey,
        mint: &Pubkey,
    ) -> impl Future<Output = Result<Option<UserTokenAccount>>> + Send;
}

#[derive(Clone)]
pub struct RpcLedger {
    rpc: Arc<RpcClient>,
}

impl RpcLedger {
    pub fn new(rpc: Arc<RpcClient>) -> Self {
        Self { rpc }
    }

    pub fn connect(url: impl Into<String>) -> Self {
        Self::new(Arc::new(RpcClient::new_with_commitment(
            url.into(),
            CommitmentConfig::confirmed(),
        )))
    }

    pub fn rpc(&self) -> &Arc<RpcClient> {
        &self.rpc
    }
}

fn parse_amount(raw: &str) -> Result<u64> {
    raw.parse::<u64>()
        .wrap_err_with(|| format!("token amount is not an integer: {raw}"))
}

impl Ledger for RpcLedger {
    async fn balance(&self, account: &Pubkey) -> Result<u64> {
        self.rpc
            .get_balance(account)
            .await
            .wrap_err_with(|| format!("fetching balance of {account}"))
    }

    async fn token_supply(&self, mint: &Pubkey) -> Result<u64> {
        let supply = self
            .rpc
            .get_token_supply(mint)
            .await
            .wrap_err_with(|| format!("fetching token supply of {mint}"))?;
        parse_amount(&supply.amount)
    }

    async fn largest_token_accounts(&self, mint: &Pubkey) -> Result<Vec<HolderBalance>> {
        let accounts = self
            .rpc
            .get_token_largest_accounts(mint)
            .await
            .wrap_err_with(|| format!("fetching largest accounts of {mint}"))?;
        accounts
            .into_iter()
            .map(|account| {
                Ok(HolderBalance::new(
                    account.address,
                    parse_amount(&account.amount.amount)?,
                ))
            })
            .collect()
    }

    async fn token_account_of(
        &self,
        owner: &Pubkey,
        mint: &Pubkey,
    ) -> Result<Option<UserTokenAccount>> {
        let accounts = self
            .rpc
            .get_token_accounts_by_owner(owner, TokenAccountsFilter::Mint(*mint))
            .await
            .wrap_err_with(|| format!("fetching token accounts of {owner}"))?;
        let Some(keyed) = accounts.into_iter().next() else {
            return Ok(None);
        };
        let address = Pubkey::from_str(&keyed.pubkey)
            .wrap_err_with(|| format!("malformed token account address {}", keyed.pubkey))?;
        let balance = self
            .rpc
            .get_token_account_balance(&address)
            .await
            .wrap_err_with(|| format!("fetching token balance of {address}"))?;
        Ok(Some(UserTokenAccount {
            address,
            amount: parse_amount(&balance.amount)?,
        }))
    }
}
