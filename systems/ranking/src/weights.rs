//! Weighted tier sampler built from the global weight table.

use std::collections::HashMap;

use rand::Rng;
use rank_pressure_core::Tier;

/// Single resolved entry of the weight table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WeightEntry {
    tier: Tier,
    weight: u32,
}

impl WeightEntry {
    /// Tier selected by the entry.
    #[must_use]
    pub const fn tier(&self) -> Tier {
        self.tier
    }

    /// Relative probability mass of the entry.
    #[must_use]
    pub const fn weight(&self) -> u32 {
        self.weight
    }
}

/// Ordered table of tier weights, never empty once built.
#[derive(Clone, Debug, PartialEq)]
pub struct WeightTable {
    entries: Vec<WeightEntry>,
    total: f64,
}

impl Default for WeightTable {
    fn default() -> Self {
        Self::fallback()
    }
}

impl WeightTable {
    /// Resolves named weights against the catalog's lowercase name map.
    ///
    /// Entries with a zero weight or naming an unknown tier are dropped. When
    /// nothing survives, the table holds the lowest tier with weight one.
    #[must_use]
    pub fn build(weights: &[(String, u32)], name_to_tier: &HashMap<String, Tier>) -> Self {
        let entries: Vec<WeightEntry> = weights
            .iter()
            .filter(|(_, weight)| *weight > 0)
            .filter_map(|(name, weight)| {
                name_to_tier
                    .get(&name.to_lowercase())
                    .map(|tier| WeightEntry {
                        tier: *tier,
                        weight: *weight,
                    })
            })
            .collect();

        if entries.is_empty() {
            return Self::fallback();
        }

        let total = entries.iter().map(|entry| f64::from(entry.weight)).sum();
        Self { entries, total }
    }

    fn fallback() -> Self {
        Self {
            entries: vec![WeightEntry {
                tier: Tier::LOWEST,
                weight: 1,
            }],
            total: 1.0,
        }
    }

    /// Entries in declaration order.
    #[must_use]
    pub fn entries(&self) -> &[WeightEntry] {
        &self.entries
    }

    /// Sum of every entry weight.
    #[must_use]
    pub const fn total(&self) -> f64 {
        self.total
    }

    /// Expected selection frequency of `tier`.
    #[must_use]
    pub fn probability(&self, tier: Tier) -> f64 {
        if self.total <= 0.0 {
            return 0.0;
        }
        let mass: f64 = self
            .entries
            .iter()
            .filter(|entry| entry.tier == tier)
            .map(|entry| f64::from(entry.weight))
            .sum();
        mass / self.total
    }

    /// Draws a tier proportionally to its weight.
    ///
    /// The draw is uniform over `[0, total]` and the table is walked in
    /// declaration order; the last entry absorbs rounding at the upper bound.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Tier> {
        let last = self.entries.last()?;
        if self.total <= 0.0 {
            return None;
        }

        let draw = rng.gen_range(0.0..=self.total);
        let mut cumulative = 0.0;
        for entry in &self.entries {
            cumulative += f64::from(entry.weight);
            if draw <= cumulative {
                return Some(entry.tier);
            }
        }
        Some(last.tier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn names(entries: &[(&str, usize)]) -> HashMap<String, Tier> {
        entries
            .iter()
            .map(|(name, index)| {
                (
                    name.to_lowercase(),
                    Tier::from_index(*index).expect("tier"),
                )
            })
            .collect()
    }

    #[test]
    fn unknown_and_zero_weights_fall_back_to_lowest_tier() {
        let table = WeightTable::build(
            &[("Z".to_owned(), 10), ("F".to_owned(), 0)],
            &names(&[("F", 0), ("E", 1)]),
        );
        assert_eq!(table, WeightTable::default());
        assert_eq!(table.entries()[0].tier(), Tier::LOWEST);
        assert_eq!(table.total(), 1.0);
    }

    #[test]
    fn resolves_names_case_insensitively() {
        let table = WeightTable::build(
            &[("e".to_owned(), 3), ("f".to_owned(), 1)],
            &names(&[("F", 0), ("E", 1)]),
        );
        let tiers: Vec<usize> = table.entries().iter().map(|e| e.tier().index()).collect();
        assert_eq!(tiers, [1, 0]);
        assert_eq!(table.total(), 4.0);
        assert!((table.probability(Tier::LOWEST) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn single_entry_always_wins() {
        let table = WeightTable::build(&[("E".to_owned(), 7)], &names(&[("F", 0), ("E", 1)]));
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..500 {
            assert_eq!(table.sample(&mut rng).map(Tier::index), Some(1));
        }
    }
}
