use crate::{
    holders::HolderChart,
    ledger::UserTokenAccount,
    odds::{
        self,
        DEFAULT_ROLL_UNDER,
        DEFAULT_WAGER_SOL,
        MAX_ROLL_UNDER,
        MIN_ROLL_UNDER,
        TreasurySummary,
        WagerQuote,
    },
    refresh::RefreshEvent,
};
use solana_sdk::pubkey::Pubkey;

const WAGER_STEP_SOL: f64 = 0.1;

/// Everything the dashboard renders. Rebuilt from ledger reads; nothing here
/// survives a restart.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DashboardState {
    pub holders: HolderChart,
    pub treasury: Option<TreasurySummary>,
    pub token_supply: Option<u64>,
    pub user: Option<UserState>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UserState {
    pub owner: Pubkey,
    pub lamports: Option<u64>,
    pub token_account: Option<UserTokenAccount>,
}

impl UserState {
    pub fn new(owner: Pubkey) -> Self {
        Self {
            owner,
            lamports: None,
            token_account: None,
        }
    }

    pub fn token_balance(&self) -> u64 {
        self.token_account.map(|a| a.amount).unwrap_or(0)
    }
}

impl DashboardState {
    pub fn connect(&mut self, owner: Pubkey) {
        self.user = Some(UserState::new(owner));
    }

    pub fn disconnect(&mut self) {
        self.user = None;
    }

    pub fn is_connected(&self) -> bool {
        self.user.is_some()
    }

    /// Results land in arrival order. User results for a wallet that is no
    /// longer connected are discarded.
    pub fn apply(&mut self, event: RefreshEvent) {
        match event {
            RefreshEvent::Holders(chart) => self.holders = chart,
            RefreshEvent::Treasury(summary) => self.treasury = Some(summary),
            RefreshEvent::Supply(supply) => self.token_supply = Some(supply),
            RefreshEvent::UserBalance { owner, lamports } => {
                if let Some(user) = self.user_mut(&owner) {
                    user.lamports = Some(lamports);
                }
            }
            RefreshEvent::UserTokenAccount { owner, account } => {
                if let Some(user) = self.user_mut(&owner) {
                    user.token_account = account;
                }
            }
        }
    }

    fn user_mut(&mut self, owner: &Pubkey) -> Option<&mut UserState> {
        self.user.as_mut().filter(|user| user.owner == *owner)
    }

    pub fn max_profit(&self) -> f64 {
        self.treasury.map(|t| t.max_profit).unwrap_or(0.0)
    }

    /// User share of the token supply, in percent.
    pub fn user_share_percent(&self) -> Option<f64> {
        let user = self.user.as_ref()?;
        let supply = self.token_supply.filter(|s| *s > 0)?;
        Some(user.token_balance() as f64 / supply as f64 * 100.0)
    }

    /// SOL the user's tokens would redeem at the current treasury balance.
    pub fn user_sol_equivalent(&self) -> Option<f64> {
        let user = self.user.as_ref()?;
        let supply = self.token_supply.filter(|s| *s > 0)?;
        let treasury = self.treasury?;
        Some(user.token_balance() as f64 / supply as f64 * treasury.balance_sol)
    }

    pub fn can_withdraw(&self) -> bool {
        self.user.as_ref().is_some_and(|u| u.token_balance() > 0)
    }
}

/// Roll-under threshold and wager size the user is editing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WagerInput {
    pub roll_under: u32,
    pub wager: f64,
}

impl Default for WagerInput {
    fn default() -> Self {
        Self {
            roll_under: DEFAULT_ROLL_UNDER,
            wager: DEFAULT_WAGER_SOL,
        }
    }
}

impl WagerInput {
    pub fn raise_threshold(&mut self) {
        self.roll_under = (self.roll_under + 1).min(MAX_ROLL_UNDER);
    }

    pub fn lower_threshold(&mut self) {
        self.roll_under = self.roll_under.saturating_sub(1).max(MIN_ROLL_UNDER);
    }

    pub fn increase_wager(&mut self) {
        self.wager = round_step(self.wager + WAGER_STEP_SOL);
    }

    pub fn decrease_wager(&mut self) {
        self.wager = round_step((self.wager - WAGER_STEP_SOL).max(0.0));
    }

    pub fn quote(&self, state: &DashboardState) -> WagerQuote {
        odds::WagerQuote::new(self.roll_under, self.wager, state.max_profit())
    }
}

fn round_step(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
