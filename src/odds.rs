//! Wager odds and treasury-derived limits.
//!
//! A roll is uniform in `1..=100` and wins when it lands strictly below the
//! roll-under threshold. The payout keeps a fixed 1% house fee.

use solana_sdk::native_token::LAMPORTS_PER_SOL;

pub const HOUSE_FEE_NUMERATOR: f64 = 990.0;
pub const HOUSE_FEE_DENOMINATOR: f64 = 1000.0;
/// Share of the treasury a single wager may win.
pub const MAX_PROFIT_RATIO: f64 = 0.01;
/// Fixed SOL/USD rate used for the treasury estimate.
pub const SOL_USD_ESTIMATE: f64 = 1.8;

pub const DEFAULT_ROLL_UNDER: u32 = 51;
pub const DEFAULT_WAGER_SOL: f64 = 1.0;
pub const MIN_ROLL_UNDER: u32 = 1;
pub const MAX_ROLL_UNDER: u32 = 100;

pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

pub fn sol_to_lamports(sol: f64) -> u64 {
    (sol * LAMPORTS_PER_SOL as f64).round() as u64
}

/// Win probability in percent.
pub fn win_chance(roll_under: u32) -> f64 {
    f64::from(roll_under) - 1.0
}

/// Total return per unit wagered, stake included. Not defined for a
/// threshold of 1, where it comes out infinite.
pub fn payout_multiplier(roll_under: u32) -> f64 {
    let losing_floor = f64::from(roll_under) - 1.0;
    let outcomes = 100.0 - losing_floor;
    (outcomes / losing_floor + 1.0) * HOUSE_FEE_NUMERATOR / HOUSE_FEE_DENOMINATOR
}

pub fn winning_ratio(roll_under: u32) -> f64 {
    payout_multiplier(roll_under) - 1.0
}

pub fn profit(roll_under: u32, wager: f64) -> f64 {
    winning_ratio(roll_under) * wager
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TreasurySummary {
    pub lamports: u64,
    pub balance_sol: f64,
    pub usd_estimate: f64,
    pub max_profit: f64,
}

impl TreasurySummary {
    pub fn from_lamports(lamports: u64) -> Self {
        let balance_sol = lamports_to_sol(lamports);
        Self {
            lamports,
            balance_sol,
            usd_estimate: balance_sol * SOL_USD_ESTIMATE,
            max_profit: balance_sol * MAX_PROFIT_RATIO,
        }
    }

    pub fn usd_display(&self) -> String {
        format!("{:.2}", self.usd_estimate)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WagerQuote {
    pub roll_under: u32,
    pub wager: f64,
    pub win_chance: f64,
    pub payout_multiplier: f64,
    pub profit: f64,
    pub max_profit: f64,
    pub exceeds_cap: bool,
}

impl WagerQuote {
    pub fn new(roll_under: u32, wager: f64, max_profit: f64) -> Self {
        let profit = profit(roll_under, wager);
        Self {
            roll_under,
            wager,
            win_chance: win_chance(roll_under),
            payout_multiplier: payout_multiplier(roll_under),
            profit,
            max_profit,
            exceeds_cap: profit > max_profit,
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.exceeds_cap
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn profit__default_wager_matches_displayed_value() {
        // when
        let profit = profit(DEFAULT_ROLL_UNDER, DEFAULT_WAGER_SOL);

        // then
        assert!((profit - 0.98).abs() < 1e-9, "profit was {profit}");
    }

    #[test]
    fn win_chance__is_threshold_minus_one() {
        assert_eq!(win_chance(51), 50.0);
        assert_eq!(win_chance(2), 1.0);
    }

    #[test]
    fn profit__increases_as_threshold_drops_below_fifty() {
        // given
        let wager = 2.5;

        // when
        let profits: Vec<f64> = (2..=50).rev().map(|r| profit(r, wager)).collect();

        // then
        assert!(profits.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn payout_multiplier__threshold_one_is_not_guarded() {
        assert!(payout_multiplier(1).is_infinite());
    }

    #[test]
    fn payout_multiplier__threshold_hundred_barely_returns_the_stake() {
        let ratio = winning_ratio(MAX_ROLL_UNDER);
        assert!(ratio.abs() < 1e-3, "ratio was {ratio}");
    }

    #[test]
    fn treasury_summary__derives_usd_and_profit_cap() {
        // when
        let summary = TreasurySummary::from_lamports(250 * LAMPORTS_PER_SOL);

        // then
        assert_eq!(summary.balance_sol, 250.0);
        assert_eq!(summary.usd_display(), "450.00");
        assert!((summary.max_profit - 2.5).abs() < 1e-12);
    }

    #[test]
    fn wager_quote__flags_profit_above_cap() {
        // given
        let summary = TreasurySummary::from_lamports(50 * LAMPORTS_PER_SOL);

        // when
        let ok = WagerQuote::new(51, 0.5, summary.max_profit);
        let too_big = WagerQuote::new(51, 1.0, summary.max_profit);

        // then
        assert!(ok.is_valid());
        assert!(!too_big.is_valid());
        assert!(too_big.exceeds_cap);
    }

    #[test]
    fn wager_quote__without_treasury_data_is_invalid() {
        let quote = WagerQuote::new(DEFAULT_ROLL_UNDER, DEFAULT_WAGER_SOL, 0.0);
        assert!(!quote.is_valid());
    }

    #[test]
    fn sol_to_lamports__rounds_to_nearest_lamport() {
        assert_eq!(sol_to_lamports(1.5), 1_500_000_000);
        assert_eq!(sol_to_lamports(0.000_000_001), 1);
        assert_eq!(lamports_to_sol(sol_to_lamports(3.25)), 3.25);
    }
}
