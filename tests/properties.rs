#![allow(non_snake_case)]
use proptest::prelude::*;
use solanaroll::{
    holders::{
        HolderBalance,
        OTHERS_LABEL,
        TOP_HOLDERS,
        aggregate,
        label_color,
    },
    odds::{
        WagerQuote,
        profit,
    },
};

fn holder_list(max_len: usize) -> impl Strategy<Value = Vec<HolderBalance>> {
    prop::collection::vec(
        ("[1-9A-HJ-NP-Za-km-z]{32,44}", 0u64..1_000_000_000_000),
        0..max_len,
    )
    .prop_map(|pairs| {
        pairs
            .into_iter()
            .map(|(address, amount)| HolderBalance::new(address, amount))
            .collect()
    })
}

proptest! {
    #[test]
    fn aggregate__preserves_total(holders in holder_list(40)) {
        let input_total: u64 = holders.iter().map(|h| h.amount).sum();
        let chart = aggregate(&holders);
        prop_assert_eq!(chart.total(), input_total);
    }

    #[test]
    fn aggregate__short_lists_have_no_others_bucket(holders in holder_list(TOP_HOLDERS + 1)) {
        let chart = aggregate(&holders);
        prop_assert_eq!(chart.entries.len(), holders.len());
        prop_assert!(chart.entries.iter().all(|e| e.label != OTHERS_LABEL));
    }

    #[test]
    fn aggregate__long_lists_keep_top_nine_verbatim(holders in holder_list(40)) {
        prop_assume!(holders.len() > TOP_HOLDERS);
        let chart = aggregate(&holders);
        prop_assert_eq!(chart.entries.len(), TOP_HOLDERS + 1);
        for (entry, holder) in chart.entries.iter().take(TOP_HOLDERS).zip(&holders) {
            prop_assert_eq!(entry.value, holder.amount);
            prop_assert!(entry.label.ends_with("..."));
            prop_assert!(holder.address.starts_with(entry.label.trim_end_matches("...")));
            prop_assert_eq!(entry.color, label_color(&holder.address));
        }
        let others = &chart.entries[TOP_HOLDERS];
        prop_assert_eq!(others.label.as_str(), OTHERS_LABEL);
        prop_assert_eq!(
            others.value,
            holders[TOP_HOLDERS..].iter().map(|h| h.amount).sum::<u64>()
        );
    }

    #[test]
    fn profit__grows_as_threshold_drops_below_fifty(
        roll_under in 3u32..=50,
        wager in 0.01f64..1_000.0,
    ) {
        prop_assert!(profit(roll_under - 1, wager) > profit(roll_under, wager));
    }

    #[test]
    fn wager_quote__valid_iff_profit_within_cap(
        roll_under in 2u32..=100,
        wager in 0.0f64..100.0,
        max_profit in 0.0f64..50.0,
    ) {
        let quote = WagerQuote::new(roll_under, wager, max_profit);
        prop_assert_eq!(quote.is_valid(), quote.profit <= max_profit);
    }
}
