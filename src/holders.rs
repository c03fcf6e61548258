//! Turns the ranked largest-holder list of the treasury mint into chart
//! series: the first nine holders verbatim and everyone else folded into a
//! single "Others" bucket.

use std::fmt;

pub const TOP_HOLDERS: usize = 9;
pub const OTHERS_LABEL: &str = "Others";
const LABEL_PREFIX_CHARS: usize = 8;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HolderBalance {
    pub address: String,
    pub amount: u64,
}

impl HolderBalance {
    pub fn new(address: impl Into<String>, amount: u64) -> Self {
        Self {
            address: address.into(),
            amount,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn from_hash(hash: i32) -> Self {
        let [_, r, g, b] = (hash as u32 & 0x00ff_ffff).to_be_bytes();
        Rgb(r, g, b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChartEntry {
    pub label: String,
    pub value: u64,
    pub color: Rgb,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct HolderChart {
    pub entries: Vec<ChartEntry>,
}

impl HolderChart {
    pub fn total(&self) -> u64 {
        saturating_sum(self.entries.iter().map(|e| e.value))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Share of the charted total per entry, in percent.
    pub fn percentages(&self) -> Vec<f64> {
        let total = self.total();
        self.entries
            .iter()
            .map(|e| {
                if total == 0 {
                    0.0
                } else {
                    e.value as f64 / total as f64 * 100.0
                }
            })
            .collect()
    }
}

/// 31-multiplier string hash over UTF-16 code units with 32-bit wraparound.
pub fn label_hash(label: &str) -> i32 {
    label.encode_utf16().fold(0i32, |hash, unit| {
        i32::from(unit).wrapping_add(hash.wrapping_shl(5).wrapping_sub(hash))
    })
}

pub fn label_color(label: &str) -> Rgb {
    Rgb::from_hash(label_hash(label))
}

/// Sums clamp at `u64::MAX` instead of overflowing.
fn saturating_sum(values: impl Iterator<Item = u64>) -> u64 {
    values.fold(0u64, u64::saturating_add)
}

fn short_label(address: &str) -> String {
    let prefix: String = address.chars().take(LABEL_PREFIX_CHARS).collect();
    format!("{prefix}...")
}

pub fn aggregate(holders: &[HolderBalance]) -> HolderChart {
    let split = holders.len().min(TOP_HOLDERS);
    let (top, rest) = holders.split_at(split);

    let mut entries: Vec<ChartEntry> = top
        .iter()
        .map(|holder| ChartEntry {
            label: short_label(&holder.address),
            value: holder.amount,
            color: label_color(&holder.address),
        })
        .collect();

    if !rest.is_empty() {
        entries.push(ChartEntry {
            label: OTHERS_LABEL.to_string(),
            value: saturating_sum(rest.iter().map(|h| h.amount)),
            color: label_color(OTHERS_LABEL),
        });
    }

    HolderChart { entries }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    fn holders(amounts: &[u64]) -> Vec<HolderBalance> {
        amounts
            .iter()
            .enumerate()
            .map(|(i, amount)| HolderBalance::new(format!("Holder{i:02}Address"), *amount))
            .collect()
    }

    #[test]
    fn aggregate__twelve_holders_fold_last_three_into_others() {
        // given
        let input = holders(&[120, 110, 100, 90, 80, 70, 60, 50, 40, 30, 20, 10]);

        // when
        let chart = aggregate(&input);

        // then
        assert_eq!(chart.entries.len(), 10);
        let others = &chart.entries[9];
        assert_eq!(others.label, OTHERS_LABEL);
        assert_eq!(others.value, 30 + 20 + 10);
        assert_eq!(others.color, label_color(OTHERS_LABEL));
    }

    #[test]
    fn aggregate__short_list_has_no_others_bucket() {
        // given
        let input = holders(&[5, 4, 3, 2, 1, 1, 1, 1, 1]);

        // when
        let chart = aggregate(&input);

        // then
        assert_eq!(chart.entries.len(), 9);
        assert!(chart.entries.iter().all(|e| e.label != OTHERS_LABEL));
        assert_eq!(chart.total(), 19);
    }

    #[test]
    fn aggregate__ten_holders_make_a_single_holder_others_bucket() {
        let chart = aggregate(&holders(&[10, 9, 8, 7, 6, 5, 4, 3, 2, 1]));
        assert_eq!(chart.entries.len(), 10);
        assert_eq!(chart.entries[9].value, 1);
    }

    #[test]
    fn aggregate__oversized_amounts_clamp_instead_of_overflowing() {
        // given
        let mut amounts = vec![u64::MAX; 9];
        amounts.extend([u64::MAX, 1]);

        // when
        let chart = aggregate(&holders(&amounts));

        // then
        assert_eq!(chart.entries[9].value, u64::MAX);
        assert_eq!(chart.total(), u64::MAX);
        assert!(chart.percentages().iter().all(|p| p.is_finite()));
    }

    #[test]
    fn aggregate__empty_input_yields_empty_chart() {
        let chart = aggregate(&[]);
        assert!(chart.is_empty());
        assert_eq!(chart.total(), 0);
        assert!(chart.percentages().is_empty());
    }

    #[test]
    fn aggregate__labels_truncate_address_and_color_hashes_full_address() {
        // given
        let address = "6ME9zXExwYxqGV3XiXGVQwvQS6mq5QCucaVEnF5HyQ71";

        // when
        let chart = aggregate(&[HolderBalance::new(address, 1)]);

        // then
        let entry = &chart.entries[0];
        assert_eq!(entry.label, "6ME9zXEx...");
        assert_eq!(entry.color, label_color(address));
        assert_eq!(entry.color.to_string(), "#E06249");
    }

    #[test]
    fn label_color__matches_known_values() {
        assert_eq!(label_hash("abc"), 96354);
        assert_eq!(label_color("abc").to_string(), "#017862");
        assert_eq!(label_hash(OTHERS_LABEL), -1922936957);
        assert_eq!(label_color(OTHERS_LABEL).to_string(), "#624F83");
    }

    #[test]
    fn percentages__sum_to_one_hundred() {
        let chart = aggregate(&holders(&[3, 1]));
        assert_eq!(chart.percentages(), vec![75.0, 25.0]);
    }
}
