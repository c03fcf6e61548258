pub use deployments as deployment;
pub use program_client::{
    ProgramAddresses,
    explorer_address_url,
};

pub mod actions;
pub mod dashboard;
pub mod holders;
pub mod ledger;
pub mod odds;
pub mod refresh;
pub mod wallets;

pub const DEFAULT_DEVNET_RPC_URL: &str = "https://api.devnet.solana.com";
pub const DEFAULT_TESTNET_RPC_URL: &str = "https://api.testnet.solana.com";
pub const DEFAULT_LOCAL_RPC_URL: &str = "http://127.0.0.1:8899";

/// Cluster the tools talk to, with the RPC URL actually used.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum NetworkTarget {
    Devnet { url: String },
    Testnet { url: String },
    LocalNode { url: String },
}

impl NetworkTarget {
    pub fn devnet() -> Self {
        NetworkTarget::Devnet {
            url: DEFAULT_DEVNET_RPC_URL.to_string(),
        }
    }

    pub fn url(&self) -> &str {
        match self {
            NetworkTarget::Devnet { url }
            | NetworkTarget::Testnet { url }
            | NetworkTarget::LocalNode { url } => url,
        }
    }

    pub fn env(&self) -> deployment::DeploymentEnv {
        match self {
            NetworkTarget::Devnet { .. } => deployment::DeploymentEnv::Dev,
            NetworkTarget::Testnet { .. } => deployment::DeploymentEnv::Test,
            NetworkTarget::LocalNode { .. } => deployment::DeploymentEnv::Local,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            NetworkTarget::Devnet { .. } => "DEVNET",
            NetworkTarget::Testnet { .. } => "TESTNET",
            NetworkTarget::LocalNode { .. } => "LOCAL",
        }
    }
}

/// Address overrides from the command line. Anything left unset falls back
/// to the latest deployment record, then to the published defaults.
#[derive(Clone, Debug, Default)]
pub struct AddressOverrides {
    pub program_id: Option<String>,
    pub treasury: Option<String>,
    pub treasury_mint: Option<String>,
}

pub fn resolve_addresses(
    overrides: &AddressOverrides,
    record: Option<&deployment::DeploymentRecord>,
) -> Result<ProgramAddresses, program_client::InvalidAddress> {
    let defaults = ProgramAddresses::default();
    let pick = |flag: &Option<String>,
                stored: Option<&String>,
                fallback: solana_sdk::pubkey::Pubkey| {
        match flag.as_ref().or(stored) {
            Some(raw) => program_client::parse_pubkey(raw),
            None => Ok(fallback),
        }
    };
    Ok(ProgramAddresses {
        program_id: pick(
            &overrides.program_id,
            record.map(|r| &r.program_id),
            defaults.program_id,
        )?,
        treasury: pick(
            &overrides.treasury,
            record.and_then(|r| r.treasury_account.as_ref()),
            defaults.treasury,
        )?,
        treasury_mint: pick(
            &overrides.treasury_mint,
            record.and_then(|r| r.treasury_mint.as_ref()),
            defaults.treasury_mint,
        )?,
    })
}
