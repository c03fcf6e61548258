use crate::ui;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use crossterm::event::EventStream;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{
        Keypair,
        Signer,
    },
};
use solanaroll::{
    AddressOverrides,
    NetworkTarget,
    ProgramAddresses,
    actions,
    dashboard::{
        DashboardState,
        WagerInput,
    },
    deployment,
    ledger::RpcLedger,
    odds::WagerQuote,
    refresh::{
        RefreshEvent,
        RefreshOrchestrator,
        RefreshReceiver,
        refresh_channel,
    },
    resolve_addresses,
    wallets::KeypairSource,
};
use std::time::Duration;
use tokio::time::{
    self,
    Instant,
};
use tracing::{
    error,
    info,
};

/// Errors kept around for the error panel.
const MAX_ERRORS: usize = 50;
/// Errors the error panel shows.
pub const VISIBLE_ERRORS: usize = 5;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub network: NetworkTarget,
    pub keypair: KeypairSource,
    /// Signs deposits when the wallet is not the treasury mint authority.
    pub mint_authority: Option<KeypairSource>,
    pub overrides: AddressOverrides,
    pub poll_interval: Option<Duration>,
}

/// What one frame renders.
#[derive(Clone, Debug)]
pub struct AppSnapshot {
    pub network: NetworkTarget,
    pub addresses: ProgramAddresses,
    pub dashboard: DashboardState,
    pub quote: WagerQuote,
    pub keypair_source: String,
    pub status: String,
    pub errors: Vec<String>,
}

pub struct AppController {
    network: NetworkTarget,
    ledger: RpcLedger,
    orchestrator: RefreshOrchestrator<RpcLedger>,
    keypair_source: KeypairSource,
    keypair: Option<Keypair>,
    mint_authority_source: Option<KeypairSource>,
    mint_authority: Option<Keypair>,
    pub dashboard: DashboardState,
    pub wager: WagerInput,
    pub status: String,
    pub errors: Vec<String>,
}

impl AppController {
    pub fn new(config: &AppConfig) -> Result<(Self, RefreshReceiver)> {
        let record = deployment::read_latest(config.network.env())
            .map_err(|e| eyre!("reading deployment records: {e:#}"))?;
        let addresses = resolve_addresses(&config.overrides, record.as_ref())
            .wrap_err("resolving program addresses")?;
        info!(
            network = config.network.url(),
            program_id = %addresses.program_id,
            treasury = %addresses.treasury,
            mint = %addresses.treasury_mint,
            "dashboard configured"
        );
        Ok(Self::with_addresses(config, addresses))
    }

    pub fn with_addresses(
        config: &AppConfig,
        addresses: ProgramAddresses,
    ) -> (Self, RefreshReceiver) {
        let ledger = RpcLedger::connect(config.network.url());
        let (events_tx, events_rx) = refresh_channel();
        let orchestrator = RefreshOrchestrator::new(ledger.clone(), addresses, events_tx);
        let controller = Self {
            network: config.network.clone(),
            ledger,
            orchestrator,
            keypair_source: config.keypair.clone(),
            keypair: None,
            mint_authority_source: config.mint_authority.clone(),
            mint_authority: None,
            dashboard: DashboardState::default(),
            wager: WagerInput::default(),
            status: String::from("Disconnected. Press c to connect a wallet."),
            errors: Vec::new(),
        };
        (controller, events_rx)
    }

    pub fn addresses(&self) -> &ProgramAddresses {
        self.orchestrator.addresses()
    }

    /// Seed phrases are read before the terminal switches to raw mode.
    pub fn preload_keypair(&mut self) -> Result<()> {
        if self.keypair_source == KeypairSource::Prompt {
            self.keypair = Some(self.keypair_source.load()?);
        }
        if self.mint_authority_source == Some(KeypairSource::Prompt) {
            self.load_mint_authority()?;
        }
        Ok(())
    }

    fn load_mint_authority(&mut self) -> Result<()> {
        if self.mint_authority.is_some() {
            return Ok(());
        }
        if let Some(source) = &self.mint_authority_source {
            let keypair = source
                .load()
                .wrap_err_with(|| format!("loading mint authority ({})", source.describe()))?;
            info!(mint_authority = %keypair.pubkey(), "mint authority loaded");
            self.mint_authority = Some(keypair);
        }
        Ok(())
    }

    pub fn snapshot(&self) -> AppSnapshot {
        AppSnapshot {
            network: self.network.clone(),
            addresses: *self.addresses(),
            dashboard: self.dashboard.clone(),
            quote: self.wager.quote(&self.dashboard),
            keypair_source: self.keypair_source.describe(),
            status: self.status.clone(),
            errors: self.errors.clone(),
        }
    }

    pub fn refresh(&self) {
        let owner = self.connected_owner();
        // Results come back through the event channel.
        let _ = self.orchestrator.refresh_all(owner);
    }

    pub fn apply(&mut self, event: RefreshEvent) {
        self.dashboard.apply(event);
    }

    fn connected_wallet(&self) -> Option<&Keypair> {
        let owner = self.dashboard.user.as_ref()?.owner;
        self.keypair.as_ref().filter(|k| k.pubkey() == owner)
    }

    pub fn toggle_wallet(&mut self) {
        if self.dashboard.is_connected() {
            self.dashboard.disconnect();
            self.set_status("Wallet disconnected");
            info!("wallet disconnected");
        } else {
            if self.keypair.is_none() {
                match self.keypair_source.load() {
                    Ok(keypair) => self.keypair = Some(keypair),
                    Err(err) => {
                        self.push_errors(vec![format!(
                            "Connect failed ({}): {err}",
                            self.keypair_source.describe()
                        )]);
                        return;
                    }
                }
            }
            let Some(owner) = self.keypair.as_ref().map(|k| k.pubkey()) else {
                return;
            };
            self.dashboard.connect(owner);
            self.set_status(format!("Connected {owner}"));
            info!(%owner, "wallet connected");
        }
        self.refresh();
    }

    pub async fn deposit(&mut self, amount_sol: f64) -> Result<()> {
        if self.connected_wallet().is_none() {
            return Err(eyre!("Connect a wallet before depositing"));
        }
        self.load_mint_authority()?;
        let wallet = self
            .connected_wallet()
            .ok_or_else(|| eyre!("Connect a wallet before depositing"))?;
        let existing = self
            .dashboard
            .user
            .as_ref()
            .and_then(|u| u.token_account)
            .map(|a| a.address);
        let (signature, token_account) = actions::send_deposit_sequence(
            self.ledger.rpc(),
            self.orchestrator.addresses(),
            wallet,
            self.mint_authority.as_ref(),
            existing,
            amount_sol,
        )
        .await
        .wrap_err("deposit failed")?;
        info!(%signature, %token_account, amount_sol, "deposit confirmed");
        self.set_status(format!("Deposited {amount_sol} SOL ({signature})"));
        Ok(())
    }

    pub async fn withdraw(&mut self, amount_tokens: f64) -> Result<()> {
        let wallet = self
            .connected_wallet()
            .ok_or_else(|| eyre!("Connect a wallet before withdrawing"))?;
        let (token_account, balance) = self
            .dashboard
            .user
            .as_ref()
            .map(|u| (u.token_account.map(|a| a.address), u.token_balance()))
            .unwrap_or((None, 0));
        let signature = actions::send_withdraw_sequence(
            self.ledger.rpc(),
            self.orchestrator.addresses(),
            wallet,
            token_account,
            balance,
            amount_tokens,
        )
        .await
        .wrap_err("withdraw failed")?;
        info!(%signature, amount_tokens, "withdraw confirmed");
        self.set_status(format!("Withdrew {amount_tokens} tokens ({signature})"));
        Ok(())
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    pub fn connected_owner(&self) -> Option<Pubkey> {
        self.dashboard.user.as_ref().map(|u| u.owner)
    }

    fn push_errors(&mut self, mut items: Vec<String>) {
        if items.is_empty() {
            return;
        }
        for item in &items {
            error!("{}", item);
        }
        self.errors.append(&mut items);
        if self.errors.len() > MAX_ERRORS {
            let drain = self.errors.len() - MAX_ERRORS;
            self.errors.drain(0..drain);
        }
    }
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    let (mut controller, refresh_events) = AppController::new(&config)?;
    controller.preload_keypair()?;
    let mut ui_state = ui::UiState::default();

    ui::terminal_enter(&mut ui_state)?;
    let res = run_loop(
        &mut controller,
        &mut ui_state,
        refresh_events,
        config.poll_interval,
    )
    .await;
    ui::terminal_exit()?;
    res
}

fn show_processing_status(
    controller: &mut AppController,
    ui_state: &mut ui::UiState,
    message: impl Into<String>,
    context: &'static str,
) -> Result<()> {
    controller.set_status(message);
    ui::draw(ui_state, &controller.snapshot()).wrap_err(context)
}

fn poll_ticker(poll_interval: Option<Duration>) -> time::Interval {
    // Without polling the ticker still exists but its branch stays disabled.
    let period = poll_interval.unwrap_or(Duration::from_secs(3600));
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
    ticker
}

async fn run_loop(
    controller: &mut AppController,
    ui_state: &mut ui::UiState,
    mut refresh_events: RefreshReceiver,
    poll_interval: Option<Duration>,
) -> Result<()> {
    info!("Running app loop");
    let mut input_events = EventStream::new();
    let mut ticker = poll_ticker(poll_interval);
    let polling = poll_interval.is_some();

    controller.refresh();
    ui::draw(ui_state, &controller.snapshot()).wrap_err("initial draw failed")?;

    loop {
        tokio::select! {
            Some(event) = refresh_events.recv() => {
                controller.apply(event);
            }
            _ = ticker.tick(), if polling => {
                controller.refresh();
                continue;
            }
            _ = tokio::signal::ctrl_c() => { break; }
            raw_ev = ui::next_raw_event(&mut input_events) => {
                let Some(ev) = ui::interpret_event(ui_state, raw_ev?) else {
                    continue;
                };
                match ev {
                    ui::UserEvent::Quit => break,
                    ui::UserEvent::ToggleWallet => controller.toggle_wallet(),
                    ui::UserEvent::RaiseThreshold => controller.wager.raise_threshold(),
                    ui::UserEvent::LowerThreshold => controller.wager.lower_threshold(),
                    ui::UserEvent::IncreaseWager => controller.wager.increase_wager(),
                    ui::UserEvent::DecreaseWager => controller.wager.decrease_wager(),
                    ui::UserEvent::Refresh => {
                        controller.set_status("Refreshing...");
                        controller.refresh();
                    }
                    ui::UserEvent::Deposit(amount) => {
                        show_processing_status(
                            controller,
                            ui_state,
                            format!("Depositing {amount} SOL..."),
                            "draw while submitting deposit failed",
                        )?;
                        if let Err(err) = controller.deposit(amount).await {
                            controller.set_status("Deposit failed");
                            controller.push_errors(vec![format!("{err:#}")]);
                        }
                        controller.refresh();
                    }
                    ui::UserEvent::Withdraw(amount) => {
                        show_processing_status(
                            controller,
                            ui_state,
                            format!("Withdrawing {amount} tokens..."),
                            "draw while submitting withdraw failed",
                        )?;
                        if let Err(err) = controller.withdraw(amount).await {
                            controller.set_status("Withdraw failed");
                            controller.push_errors(vec![format!("{err:#}")]);
                        }
                        controller.refresh();
                    }
                    ui::UserEvent::Redraw => {}
                }
            }
        }
        ui::draw(ui_state, &controller.snapshot()).wrap_err("draw failed")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use solana_sdk::signature::write_keypair_file;

    fn config(keypair: KeypairSource) -> AppConfig {
        AppConfig {
            network: NetworkTarget::LocalNode {
                url: String::from("http://127.0.0.1:1"),
            },
            keypair,
            mint_authority: None,
            overrides: AddressOverrides::default(),
            poll_interval: None,
        }
    }

    fn controller(keypair: KeypairSource) -> (AppController, RefreshReceiver) {
        AppController::with_addresses(&config(keypair), ProgramAddresses::default())
    }

    #[tokio::test]
    async fn toggle_wallet__connects_then_disconnects() {
        // given
        let keypair = Keypair::new();
        let path = std::env::temp_dir().join(format!("solanaroll-client-{}.json", keypair.pubkey()));
        write_keypair_file(&keypair, &path).unwrap();
        let (mut controller, _rx) = controller(KeypairSource::File(path.clone()));

        // when
        controller.toggle_wallet();
        let connected = controller.connected_owner();
        controller.toggle_wallet();

        // then
        assert_eq!(connected, Some(keypair.pubkey()));
        assert_eq!(controller.connected_owner(), None);
        assert!(controller.errors.is_empty());
        std::fs::remove_file(path).unwrap();
    }

    #[tokio::test]
    async fn toggle_wallet__missing_keypair_reports_error() {
        // given
        let (mut controller, _rx) = controller(KeypairSource::File(
            "/nonexistent/solanaroll/id.json".into(),
        ));

        // when
        controller.toggle_wallet();

        // then
        assert!(!controller.dashboard.is_connected());
        assert_eq!(controller.errors.len(), 1);
        assert!(controller.errors[0].starts_with("Connect failed"));
    }

    #[tokio::test]
    async fn deposit__requires_connected_wallet() {
        // given
        let (mut controller, _rx) = controller(KeypairSource::Prompt);

        // when
        let deposit = controller.deposit(1.0).await;
        let withdraw = controller.withdraw(1.0).await;

        // then
        assert!(deposit.is_err());
        assert!(withdraw.is_err());
    }

    #[tokio::test]
    async fn deposit__missing_mint_authority_file_fails_before_sending() {
        // given
        let keypair = Keypair::new();
        let path = std::env::temp_dir().join(format!("solanaroll-mint-{}.json", keypair.pubkey()));
        write_keypair_file(&keypair, &path).unwrap();
        let mut config = config(KeypairSource::File(path.clone()));
        config.mint_authority = Some(KeypairSource::File(
            "/nonexistent/solanaroll/mint-authority.json".into(),
        ));
        let (mut controller, _rx) =
            AppController::with_addresses(&config, ProgramAddresses::default());
        controller.toggle_wallet();

        // when
        let deposit = controller.deposit(1.0).await;

        // then
        let err = deposit.unwrap_err();
        assert!(format!("{err:#}").contains("loading mint authority"));
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn push_errors__keeps_most_recent() {
        // given
        let (mut controller, _rx) = controller(KeypairSource::Prompt);

        // when
        controller.push_errors((0..60).map(|i| format!("err {i}")).collect());

        // then
        assert_eq!(controller.errors.len(), MAX_ERRORS);
        assert_eq!(controller.errors.last().unwrap(), "err 59");
        assert_eq!(controller.errors[0], "err 10");
    }

    #[test]
    fn snapshot__quote_follows_wager_input_and_treasury() {
        // given
        let (mut controller, _rx) = controller(KeypairSource::Prompt);
        controller.wager.lower_threshold();

        // when
        let snapshot = controller.snapshot();

        // then
        assert_eq!(snapshot.quote.roll_under, 50);
        assert!(!snapshot.quote.is_valid());
        assert_eq!(snapshot.addresses, ProgramAddresses::default());
    }
}
