//! Fire-and-forget refresh of everything the dashboard shows.
//!
//! Each routine runs as its own task and reports back through the event
//! channel. Nothing orders the tasks against each other; whichever result
//! arrives last is what the dashboard keeps.

use crate::{
    holders::{
        self,
        HolderChart,
    },
    ledger::{
        Ledger,
        UserTokenAccount,
    },
    odds::TreasurySummary,
};
use program_client::ProgramAddresses;
use solana_sdk::pubkey::Pubkey;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
};
use tracing::{
    debug,
    warn,
};

#[derive(Clone, Debug, PartialEq)]
pub enum RefreshEvent {
    Holders(HolderChart),
    Treasury(TreasurySummary),
    Supply(u64),
    UserBalance { owner: Pubkey, lamports: u64 },
    UserTokenAccount { owner: Pubkey, account: Option<UserTokenAccount> },
}

pub type RefreshSender = mpsc::UnboundedSender<RefreshEvent>;
pub type RefreshReceiver = mpsc::UnboundedReceiver<RefreshEvent>;

pub fn refresh_channel() -> (RefreshSender, RefreshReceiver) {
    mpsc::unbounded_channel()
}

#[derive(Clone)]
pub struct RefreshOrchestrator<L> {
    ledger: L,
    addresses: ProgramAddresses,
    events: RefreshSender,
}

impl<L: Ledger> RefreshOrchestrator<L> {
    pub fn new(ledger: L, addresses: ProgramAddresses, events: RefreshSender) -> Self {
        Self {
            ledger,
            addresses,
            events,
        }
    }

    pub fn addresses(&self) -> &ProgramAddresses {
        &self.addresses
    }

    /// Starts every routine. The user routines only run with a connected
    /// wallet.
    pub fn refresh_all(&self, user: Option<Pubkey>) -> Vec<JoinHandle<()>> {
        let mut handles = vec![
            self.refresh_chart_data(),
            self.refresh_treasury_balance(),
            self.refresh_token_supply(),
        ];
        if let Some(owner) = user {
            handles.push(self.refresh_user_balance(owner));
            handles.push(self.refresh_user_token_account(owner));
        }
        handles
    }

    pub fn refresh_chart_data(&self) -> JoinHandle<()> {
        let ledger = self.ledger.clone();
        let mint = self.addresses.treasury_mint;
        self.spawn("chart data", async move {
            let ranked = ledger.largest_token_accounts(&mint).await?;
            debug!(holders = ranked.len(), "fetched largest token accounts");
            Ok(RefreshEvent::Holders(holders::aggregate(&ranked)))
        })
    }

    pub fn refresh_treasury_balance(&self) -> JoinHandle<()> {
        let ledger = self.ledger.clone();
        let treasury = self.addresses.treasury;
        self.spawn("treasury balance", async move {
            let lamports = ledger.balance(&treasury).await?;
            Ok(RefreshEvent::Treasury(TreasurySummary::from_lamports(lamports)))
        })
    }

    pub fn refresh_token_supply(&self) -> JoinHandle<()> {
        let ledger = self.ledger.clone();
        let mint = self.addresses.treasury_mint;
        self.spawn("token supply", async move {
            let supply = ledger.token_supply(&mint).await?;
            debug!(supply, "got treasury token supply");
            Ok(RefreshEvent::Supply(supply))
        })
    }

    pub fn refresh_user_balance(&self, owner: Pubkey) -> JoinHandle<()> {
        let ledger = self.ledger.clone();
        self.spawn("user balance", async move {
            let lamports = ledger.balance(&owner).await?;
            Ok(RefreshEvent::UserBalance { owner, lamports })
        })
    }

    pub fn refresh_user_token_account(&self, owner: Pubkey) -> JoinHandle<()> {
        let ledger = self.ledger.clone();
        let mint = self.addresses.treasury_mint;
        self.spawn("user token account", async move {
            let account = ledger.token_account_of(&owner, &mint).await?;
            Ok(RefreshEvent::UserTokenAccount { owner, account })
        })
    }

    fn spawn<F>(&self, routine: &'static str, fetch: F) -> JoinHandle<()>
    where
        F: Future<Output = color_eyre::eyre::Result<RefreshEvent>> + Send + 'static,
    {
        let events = self.events.clone();
        tokio::spawn(async move {
            match fetch.await {
                Ok(event) => {
                    if events.send(event).is_err() {
                        debug!(routine, "refresh result dropped, receiver closed");
                    }
                }
                Err(err) => warn!(routine, ?err, "refresh failed"),
            }
        })
    }
}
