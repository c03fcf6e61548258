use solana_sdk::{
    program_error::ProgramError,
    pubkey::Pubkey,
};
use spl_token::solana_program::program_pack::Pack;
use std::{
    fmt,
    str::FromStr,
};

pub mod game;
pub mod instruction;

pub use game::{
    GAME_ACCOUNT_SPACE,
    GameAccount,
    InvalidGameAccount,
};

pub const DEFAULT_PROGRAM_ID: &str = "8Nj5RBeppFvrLzF5t4t5i3i3B2ucx9qVUxp2nc5dVDGt";
pub const DEFAULT_TREASURY_ACCOUNT: &str = "9KcZXqCFCYoGXTATt1ze5SuMk1FiTsve84nP3Rvjbsbg";
pub const DEFAULT_TREASURY_MINT: &str = "6ME9zXExwYxqGV3XiXGVQwvQS6mq5QCucaVEnF5HyQ71";

/// Treasury tokens use the same precision as lamports.
pub const TREASURY_TOKEN_DECIMALS: u8 = 9;

/// The three addresses every dashboard read and every treasury action needs.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ProgramAddresses {
    pub program_id: Pubkey,
    pub treasury: Pubkey,
    pub treasury_mint: Pubkey,
}

impl ProgramAddresses {
    pub fn parse(
        program_id: &str,
        treasury: &str,
        treasury_mint: &str,
    ) -> Result<Self, InvalidAddress> {
        Ok(Self {
            program_id: parse_pubkey(program_id)?,
            treasury: parse_pubkey(treasury)?,
            treasury_mint: parse_pubkey(treasury_mint)?,
        })
    }
}

impl Default for ProgramAddresses {
    fn default() -> Self {
        Self {
            program_id: Pubkey::from_str_const(DEFAULT_PROGRAM_ID),
            treasury: Pubkey::from_str_const(DEFAULT_TREASURY_ACCOUNT),
            treasury_mint: Pubkey::from_str_const(DEFAULT_TREASURY_MINT),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InvalidAddress(pub String);

impl fmt::Display for InvalidAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid base58 address: {}", self.0)
    }
}

impl std::error::Error for InvalidAddress {}

pub fn parse_pubkey(raw: &str) -> Result<Pubkey, InvalidAddress> {
    Pubkey::from_str(raw.trim()).map_err(|_| InvalidAddress(raw.to_string()))
}

/// Mint authority stored in a treasury mint account. Deposits only succeed
/// when this key signs as account 0.
pub fn treasury_mint_authority(mint_data: &[u8]) -> Result<Option<Pubkey>, ProgramError> {
    let mint = spl_token::state::Mint::unpack(mint_data)?;
    Ok(mint.mint_authority.into())
}

pub fn explorer_address_url(address: &Pubkey, cluster: &str) -> String {
    format!("https://explorer.solana.com/address/{address}?cluster={cluster}")
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn program_addresses__default_matches_published_devnet_addresses() {
        // when
        let addresses = ProgramAddresses::default();

        // then
        assert_eq!(addresses.program_id.to_string(), DEFAULT_PROGRAM_ID);
        assert_eq!(addresses.treasury.to_string(), DEFAULT_TREASURY_ACCOUNT);
        assert_eq!(addresses.treasury_mint.to_string(), DEFAULT_TREASURY_MINT);
    }

    #[test]
    fn program_addresses__parse_rejects_malformed_address() {
        // when
        let result =
            ProgramAddresses::parse(DEFAULT_PROGRAM_ID, "not-base58!", DEFAULT_TREASURY_MINT);

        // then
        assert_eq!(result, Err(InvalidAddress("not-base58!".to_string())));
    }

    #[test]
    fn treasury_mint_authority__reads_initialized_mint() {
        // given
        let authority = Pubkey::new_unique();
        let mint = spl_token::state::Mint {
            mint_authority: Some(authority).into(),
            supply: 0,
            decimals: TREASURY_TOKEN_DECIMALS,
            is_initialized: true,
            freeze_authority: None.into(),
        };
        let mut data = vec![0u8; spl_token::state::Mint::LEN];
        spl_token::state::Mint::pack(mint, &mut data).unwrap();

        // when
        let stored = treasury_mint_authority(&data).unwrap();

        // then
        assert_eq!(stored, Some(authority));
    }

    #[test]
    fn treasury_mint_authority__rejects_uninitialized_data() {
        let data = vec![0u8; spl_token::state::Mint::LEN];
        assert!(treasury_mint_authority(&data).is_err());
    }

    #[test]
    fn explorer_address_url__includes_cluster() {
        let address = Pubkey::from_str_const(DEFAULT_TREASURY_MINT);
        assert_eq!(
            explorer_address_url(&address, "devnet"),
            format!("https://explorer.solana.com/address/{DEFAULT_TREASURY_MINT}?cluster=devnet")
        );
    }
}
