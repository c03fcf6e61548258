use crate::client::{
    AppSnapshot,
    VISIBLE_ERRORS,
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use crossterm::{
    event::{
        Event,
        EventStream,
        KeyCode,
        KeyEvent,
        KeyEventKind,
        KeyModifiers,
    },
    terminal::{
        disable_raw_mode,
        enable_raw_mode,
    },
};
use futures::StreamExt;
use itertools::Itertools;
use program_client::TREASURY_TOKEN_DECIMALS;
use ratatui::{
    prelude::*,
    widgets::*,
};
use solanaroll::{
    explorer_address_url,
    holders::Rgb,
    odds::lamports_to_sol,
};
use std::io::stdout;
use unicode_width::{
    UnicodeWidthChar,
    UnicodeWidthStr,
};

const HELP_KEYS: [(&str, &str); 8] = [
    ("c", "connect/disconnect"),
    ("d", "deposit"),
    ("w", "withdraw"),
    ("Left/Right", "roll under"),
    ("Up/Down", "wager"),
    ("r", "refresh"),
    ("q/Esc", "quit"),
    ("Ctrl-C", "exit"),
];
const LEGEND_LABEL_WIDTH: usize = 12;

#[derive(Clone, Debug, PartialEq)]
pub enum UserEvent {
    Quit,
    ToggleWallet,
    RaiseThreshold,
    LowerThreshold,
    IncreaseWager,
    DecreaseWager,
    Refresh,
    Deposit(f64),
    Withdraw(f64),
    Redraw,
}

#[derive(Debug, Default)]
pub struct UiState {
    mode: Mode,
    can_withdraw: bool,
    token_balance: u64,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
}

#[derive(Clone, Debug, Default, PartialEq)]
enum Mode {
    #[default]
    Normal,
    DepositModal(AmountInput),
    WithdrawModal(AmountInput),
    QuitModal,
}

#[derive(Clone, Debug, Default, PartialEq)]
struct AmountInput {
    buffer: String,
    error: Option<String>,
}

impl AmountInput {
    fn push(&mut self, c: char) {
        if c == '.' && self.buffer.contains('.') {
            return;
        }
        self.buffer.push(c);
        self.error = None;
    }

    fn pop(&mut self) {
        self.buffer.pop();
        self.error = None;
    }

    fn parse(&self) -> std::result::Result<f64, String> {
        match self.buffer.parse::<f64>() {
            Ok(amount) if amount.is_finite() && amount > 0.0 => Ok(amount),
            Ok(_) => Err(String::from("Amount must be greater than zero")),
            Err(_) => Err(format!("Not a number: {:?}", self.buffer)),
        }
    }
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(
        std::io::stdout(),
        crossterm::terminal::EnterAlternateScreen,
        crossterm::event::EnableMouseCapture
    )?;
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(
        std::io::stdout(),
        crossterm::event::DisableMouseCapture,
        crossterm::terminal::LeaveAlternateScreen
    )?;
    Ok(())
}

pub fn draw(state: &mut UiState, snap: &AppSnapshot) -> Result<()> {
    // key handling needs these between frames
    state.can_withdraw = snap.dashboard.can_withdraw();
    state.token_balance = snap
        .dashboard
        .user
        .as_ref()
        .map(|u| u.token_balance())
        .unwrap_or(0);
    if let Mode::WithdrawModal(_) = state.mode {
        if !state.can_withdraw {
            state.mode = Mode::Normal;
        }
    }
    if let Some(mut term) = state.terminal.take() {
        term.draw(|f| ui(f, state, snap))?;
        state.terminal = Some(term);
    }
    Ok(())
}

pub async fn next_raw_event(input: &mut EventStream) -> Result<Event> {
    match input.next().await {
        Some(event) => Ok(event?),
        None => Err(eyre!("terminal input stream closed")),
    }
}

/// Maps a terminal event to an action, updating modal state on the way.
/// `None` means nothing changed and no redraw is needed.
pub fn interpret_event(state: &mut UiState, event: Event) -> Option<UserEvent> {
    let k = match event {
        Event::Key(k) if k.kind == KeyEventKind::Press => k,
        Event::Resize(..) => return Some(UserEvent::Redraw),
        _ => return None,
    };
    // raw mode swallows SIGINT
    if is_ctrl_c(&k) {
        return Some(UserEvent::Quit);
    }
    match &mut state.mode {
        Mode::DepositModal(input) | Mode::WithdrawModal(input) => match k.code {
            KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Enter => match input.parse() {
                Ok(amount) => {
                    let ev = if matches!(state.mode, Mode::DepositModal(_)) {
                        UserEvent::Deposit(amount)
                    } else {
                        UserEvent::Withdraw(amount)
                    };
                    state.mode = Mode::Normal;
                    Some(ev)
                }
                Err(msg) => {
                    input.error = Some(msg);
                    Some(UserEvent::Redraw)
                }
            },
            KeyCode::Backspace => {
                input.pop();
                Some(UserEvent::Redraw)
            }
            KeyCode::Char(c) if c.is_ascii_digit() || c == '.' => {
                input.push(c);
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::QuitModal => match k.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => Some(UserEvent::Quit),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::Normal => match k.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                state.mode = Mode::QuitModal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Char('c') => Some(UserEvent::ToggleWallet),
            KeyCode::Char('d') => {
                state.mode = Mode::DepositModal(AmountInput::default());
                Some(UserEvent::Redraw)
            }
            KeyCode::Char('w') if state.can_withdraw => {
                state.mode = Mode::WithdrawModal(AmountInput::default());
                Some(UserEvent::Redraw)
            }
            KeyCode::Right | KeyCode::Char('l') => Some(UserEvent::RaiseThreshold),
            KeyCode::Left | KeyCode::Char('h') => Some(UserEvent::LowerThreshold),
            KeyCode::Up | KeyCode::Char('k') => Some(UserEvent::IncreaseWager),
            KeyCode::Down | KeyCode::Char('j') => Some(UserEvent::DecreaseWager),
            KeyCode::Char('r') => Some(UserEvent::Refresh),
            _ => None,
        },
    }
}

fn is_ctrl_c(k: &KeyEvent) -> bool {
    k.modifiers.contains(KeyModifiers::CONTROL) && matches!(k.code, KeyCode::Char('c'))
}

fn ui(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),  // status
            Constraint::Min(12),    // holders
            Constraint::Length(9),  // treasury + account
            Constraint::Length(10), // wager + errors
        ])
        .split(f.area());

    draw_top(f, chunks[0], snap);
    draw_holders(f, chunks[1], snap);
    let middle = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[2]);
    draw_treasury(f, middle[0], snap);
    draw_account(f, middle[1], snap);
    let lower = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[3]);
    draw_wager(f, lower[0], snap);
    draw_bottom(f, lower[1], snap);
    draw_modals(f, state);
}

fn draw_top(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let status = Paragraph::new(snap.status.as_str())
        .block(Block::default().borders(Borders::ALL).title(format!(
            "SOLANAROLL TREASURY - {} - {}",
            snap.network.label(),
            snap.network.url()
        )));
    f.render_widget(status, area);
}

fn draw_holders(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("TREASURY TOKEN HOLDERS");
    let chart = &snap.dashboard.holders;
    if chart.is_empty() {
        let empty = Paragraph::new(Line::styled(
            "No holders yet",
            Style::default().fg(Color::DarkGray),
        ))
        .block(block);
        f.render_widget(empty, area);
        return;
    }
    let inner = block.inner(area);
    f.render_widget(block, area);
    let split = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(inner);

    let percentages = chart.percentages();
    let count = chart.entries.len() as u16;
    let bar_width = (split[0].width / count.max(1)).saturating_sub(1).max(1);
    let bars: Vec<Bar> = chart
        .entries
        .iter()
        .zip_eq(&percentages)
        .map(|(entry, pct)| {
            Bar::default()
                .value(entry.value)
                .label(Line::from(fit_width(&entry.label, bar_width as usize)))
                .text_value(format!("{pct:.0}%"))
                .style(Style::default().fg(color(entry.color)))
        })
        .collect();
    let bar_chart = BarChart::default()
        .data(BarGroup::default().bars(&bars))
        .bar_width(bar_width)
        .bar_gap(1);
    f.render_widget(bar_chart, split[0]);

    let legend: Vec<Line> = chart
        .entries
        .iter()
        .zip_eq(&percentages)
        .map(|(entry, pct)| {
            Line::from(vec![
                Span::styled("■ ", Style::default().fg(color(entry.color))),
                Span::raw(pad_width(&entry.label, LEGEND_LABEL_WIDTH)),
                Span::raw(format!(" {:>14} ", format_tokens(entry.value))),
                Span::styled(format!("{pct:6.2}%"), Style::default().fg(Color::Gray)),
            ])
        })
        .collect();
    f.render_widget(Paragraph::new(legend), split[1]);
}

fn draw_treasury(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let cluster = snap.network.env().explorer_cluster();
    let addresses = &snap.addresses;
    let balance = match snap.dashboard.treasury {
        Some(t) => format!("{:.4} SOL (~${} USD)", t.balance_sol, t.usd_display()),
        None => String::from("-"),
    };
    let supply = snap
        .dashboard
        .token_supply
        .map(format_tokens)
        .unwrap_or_else(|| String::from("-"));
    let lines = vec![
        Line::from(format!("Treasury: {}", addresses.treasury)),
        Line::styled(
            explorer_address_url(&addresses.treasury, cluster),
            Style::default().fg(Color::DarkGray),
        ),
        Line::from(format!("Balance:  {balance}")),
        Line::from(format!("Mint:     {}", addresses.treasury_mint)),
        Line::styled(
            explorer_address_url(&addresses.treasury_mint, cluster),
            Style::default().fg(Color::DarkGray),
        ),
        Line::from(format!("Supply:   {supply} tokens")),
    ];
    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("TREASURY FUND"));
    f.render_widget(p, area);
}

fn draw_account(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let dashboard = &snap.dashboard;
    let (state_label, title_style) = if dashboard.is_connected() {
        ("Connected", Style::default().fg(Color::Green))
    } else {
        ("Disconnected", Style::default().fg(Color::DarkGray))
    };
    let title = Span::styled(
        format!("MY ACCOUNT - {state_label} - {}", snap.network.label()),
        title_style,
    );
    let lines = match &dashboard.user {
        None => vec![
            Line::from(format!("Keypair: {}", snap.keypair_source)),
            Line::styled(
                "Press c to connect",
                Style::default().fg(Color::DarkGray),
            ),
        ],
        Some(user) => {
            let sol = user
                .lamports
                .map(|l| format!("{:.4} SOL", lamports_to_sol(l)))
                .unwrap_or_else(|| String::from("-"));
            let token_account = user
                .token_account
                .map(|a| a.address.to_string())
                .unwrap_or_else(|| String::from("none"));
            let share = dashboard
                .user_share_percent()
                .map(|p| format!(" ({p:.2}% of supply)"))
                .unwrap_or_default();
            let equivalent = dashboard
                .user_sol_equivalent()
                .map(|s| format!("{s:.9} SOL"))
                .unwrap_or_else(|| String::from("-"));
            vec![
                Line::from(format!("Wallet:  {}", user.owner)),
                Line::from(format!("Balance: {sol}")),
                Line::from(format!("Tokens:  {token_account}")),
                Line::from(format!(
                    "Holding: {} tokens{share}",
                    format_tokens(user.token_balance())
                )),
                Line::from(format!("Worth:   {equivalent}")),
            ]
        }
    };
    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(p, area);
}

fn draw_wager(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let quote = &snap.quote;
    let verdict = if quote.is_valid() {
        Line::styled("VALID", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD))
    } else {
        Line::styled(
            "INVALID: profit exceeds max profit",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )
    };
    let lines = vec![
        Line::from(format!("Roll under:  {}", quote.roll_under)),
        Line::from(format!("Win chance:  {}%", quote.win_chance)),
        Line::from(format!("Payout:      {:.4}x", quote.payout_multiplier)),
        Line::from(format!("Wager:       {:.1} SOL", quote.wager)),
        Line::from(format!("Profit:      {:.4} SOL", quote.profit)),
        Line::from(format!("Max profit:  {:.4} SOL", quote.max_profit)),
        verdict,
    ];
    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("WAGER"));
    f.render_widget(p, area);
}

fn draw_bottom(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let mut lines: Vec<Line> = snap
        .errors
        .iter()
        .rev()
        .take(VISIBLE_ERRORS)
        .rev()
        .map(|e| Line::styled(e.clone(), Style::default().fg(Color::Red)))
        .collect();
    if lines.is_empty() {
        lines.push(Line::styled("No errors", Style::default().fg(Color::DarkGray)));
    }
    let help = HELP_KEYS
        .iter()
        .map(|(key, action)| format!("{key} {action}"))
        .join(" | ");
    lines.push(Line::styled(help, Style::default().fg(Color::Cyan)));
    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("Errors / Help"));
    f.render_widget(p, area);
}

fn draw_modals(f: &mut Frame, state: &UiState) {
    match &state.mode {
        Mode::DepositModal(input) => {
            draw_amount_modal(f, "Deposit SOL", "Amount (SOL)", input, None);
        }
        Mode::WithdrawModal(input) => {
            let balance = format!("Balance: {} tokens", format_tokens(state.token_balance));
            draw_amount_modal(f, "Withdraw", "Amount (tokens)", input, Some(balance));
        }
        Mode::QuitModal => {
            let area = centered_rect(40, 20, f.area());
            let block = Block::default().borders(Borders::ALL).title("Confirm Quit");
            let p = Paragraph::new("Quit the dashboard? (Y/N)");
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(p, block.inner(area));
        }
        Mode::Normal => {}
    }
}

fn draw_amount_modal(
    f: &mut Frame,
    title: &str,
    prompt: &str,
    input: &AmountInput,
    note: Option<String>,
) {
    let area = centered_rect(50, 30, f.area());
    let block = Block::default().borders(Borders::ALL).title(title.to_string());
    let mut lines = Vec::new();
    if let Some(note) = note {
        lines.push(Line::from(note));
    }
    lines.push(Line::from(format!("{prompt}: {}_", input.buffer)));
    if let Some(err) = &input.error {
        lines.push(Line::styled(err.clone(), Style::default().fg(Color::Red)));
    }
    lines.push(Line::from("Enter=confirm, Esc=cancel"));
    f.render_widget(Clear, area);
    f.render_widget(block.clone(), area);
    f.render_widget(Paragraph::new(lines), block.inner(area));
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h_percent) / 2),
            Constraint::Percentage(h_percent),
            Constraint::Percentage((100 - h_percent) / 2),
        ])
        .split(r);

    let vertical = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(popup_layout[1]);

    vertical[1]
}

fn color(rgb: Rgb) -> Color {
    Color::Rgb(rgb.0, rgb.1, rgb.2)
}

fn format_tokens(base_units: u64) -> String {
    let tokens = base_units as f64 / 10f64.powi(i32::from(TREASURY_TOKEN_DECIMALS));
    format!("{tokens:.4}")
}

/// Cuts `text` to at most `width` terminal columns.
fn fit_width(text: &str, width: usize) -> String {
    let mut used = 0;
    text.chars()
        .take_while(|c| {
            used += c.width().unwrap_or(0);
            used <= width
        })
        .collect()
}

fn pad_width(text: &str, width: usize) -> String {
    let fitted = fit_width(text, width);
    let pad = width.saturating_sub(fitted.width());
    format!("{fitted}{}", " ".repeat(pad))
}
