#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Rank catalog, weighted tier sampler and clamped tier arithmetic.
//!
//! [`RankSystem`] owns the active [`RankConfiguration`], the case-insensitive
//! name lookup built from its catalog and the resolved [`WeightTable`]. The
//! host constructs it once and passes it by reference to spawn logic; a
//! failed reload leaves the previously installed configuration in place.

pub mod weights;

use std::{collections::HashMap, path::Path};

use rand::Rng;
use rank_pressure_core::{
    ConfigError, InstanceContext, PressureSettings, RankConfiguration, RankDefinition,
    RankScalarTarget, RankScalars, Tier, DEFAULT_TIER_NAMES, NO_TIER_NAME, TIER_CAPACITY,
};
use tracing::info;

pub use weights::{WeightEntry, WeightTable};

/// Added before flooring so exact multiples of the bias scale are not lost to rounding.
const OFFSET_EPSILON: f64 = 1e-9;

/// Rank system facade consumed by spawn logic.
#[derive(Clone, Debug)]
pub struct RankSystem {
    config: RankConfiguration,
    name_to_tier: HashMap<String, Tier>,
    weights: WeightTable,
}

impl Default for RankSystem {
    fn default() -> Self {
        Self::from_configuration(RankConfiguration::default())
    }
}

impl RankSystem {
    /// Builds a rank system around an already parsed configuration.
    #[must_use]
    pub fn from_configuration(mut config: RankConfiguration) -> Self {
        config.ensure_catalog();
        config.order.truncate(TIER_CAPACITY);

        let mut name_to_tier = HashMap::with_capacity(config.order.len());
        for (index, definition) in config.order.iter().enumerate() {
            if let Some(tier) = Tier::from_index(index) {
                let _ = name_to_tier
                    .entry(definition.name.to_lowercase())
                    .or_insert(tier);
            }
        }

        let weights = WeightTable::build(&config.global_weights, &name_to_tier);
        Self {
            config,
            name_to_tier,
            weights,
        }
    }

    /// Loads a configuration document from disk, replacing the active one.
    ///
    /// On failure the previously installed configuration stays active.
    pub fn load(&mut self, path: &Path) -> Result<(), ConfigError> {
        let config = RankConfiguration::from_file(path)?;
        self.install(config);
        info!(path = %path.display(), "loaded rank configuration");
        Ok(())
    }

    /// Parses a configuration document, replacing the active one on success.
    pub fn load_from_str(&mut self, document: &str) -> Result<(), ConfigError> {
        let config = RankConfiguration::from_json_str(document)?;
        self.install(config);
        Ok(())
    }

    fn install(&mut self, config: RankConfiguration) {
        *self = Self::from_configuration(config);
        info!(
            enabled = self.config.enabled,
            tiers = self.config.order.len(),
            weights = self.weights.entries().len(),
            floor_rules = self.config.floor_rules.len(),
            instance_rules = self.config.instance_rules.len(),
            "installed rank configuration"
        );
    }

    /// Active configuration.
    #[must_use]
    pub const fn configuration(&self) -> &RankConfiguration {
        &self.config
    }

    /// Pressure parameters derived from the active configuration.
    #[must_use]
    pub fn pressure_settings(&self) -> PressureSettings {
        PressureSettings::from_configuration(&self.config)
    }

    /// Whether weighted sampling is active.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Ordered catalog of tier definitions.
    #[must_use]
    pub fn catalog(&self) -> &[RankDefinition] {
        &self.config.order
    }

    /// Number of tiers in the catalog.
    #[must_use]
    pub fn catalog_len(&self) -> usize {
        self.config.order.len()
    }

    /// Resolved weight table used by [`RankSystem::sample_base_tier`].
    #[must_use]
    pub const fn weight_table(&self) -> &WeightTable {
        &self.weights
    }

    /// Iterates over every tier of the catalog, weakest first.
    pub fn tiers(&self) -> impl Iterator<Item = Tier> {
        (0..self.catalog_len()).filter_map(Tier::from_index)
    }

    /// Draws the tier a monster spawns with before any pressure offset.
    ///
    /// `context_key` identifies the monster template; the global table is used
    /// for every key, so callers must not rely on per-key determinism.
    pub fn sample_base_tier<R: Rng + ?Sized>(&self, context_key: &str, rng: &mut R) -> Tier {
        let _ = context_key;
        if !self.config.enabled {
            return Tier::LOWEST;
        }
        self.weights.sample(rng).unwrap_or(Tier::LOWEST)
    }

    /// Converts a pressure bias into a non-negative tier offset.
    #[must_use]
    pub fn bias_to_offset(&self, bias: f64) -> u32 {
        let scale = self.config.bias_scale;
        if !(bias > 0.0) || !(scale > 0.0) {
            return 0;
        }

        let steps = (bias / scale + OFFSET_EPSILON).floor();
        steps.clamp(0.0, self.catalog_len() as f64) as u32
    }

    /// Moves `base` by `offset` tiers, clamping to the catalog bounds.
    ///
    /// The "none" sentinel and tiers beyond the catalog start from the lowest tier.
    #[must_use]
    pub fn clamped_advance(&self, base: Option<Tier>, offset: i32) -> Tier {
        let len = self.catalog_len();
        if len == 0 {
            return Tier::LOWEST;
        }

        let index = base
            .map(Tier::index)
            .filter(|index| *index < len)
            .unwrap_or(0);
        let advanced = (index as i64 + i64::from(offset)).clamp(0, len as i64 - 1);
        Tier::from_index(advanced as usize).unwrap_or(Tier::LOWEST)
    }

    /// Assigns the scalars of `tier` to `entity`.
    ///
    /// Tiers missing from the catalog assign neutral scalars.
    pub fn apply_scalars<T: RankScalarTarget + ?Sized>(&self, entity: &mut T, tier: Tier) {
        let scalars = self
            .definition(tier)
            .map_or_else(RankScalars::default, |definition| definition.scalars);
        entity.assign_rank(tier, &scalars);
    }

    /// Definition of `tier` in the active catalog.
    #[must_use]
    pub fn definition(&self, tier: Tier) -> Option<&RankDefinition> {
        self.config.order.get(tier.index())
    }

    /// Resolves a tier by name, ignoring case.
    #[must_use]
    pub fn parse_tier(&self, name: &str) -> Option<Tier> {
        if name.is_empty() {
            return None;
        }
        self.name_to_tier.get(&name.to_lowercase()).copied()
    }

    /// Display name of a tier, or of the "none" sentinel.
    #[must_use]
    pub fn name_of(&self, tier: Option<Tier>) -> &str {
        let Some(tier) = tier else {
            return NO_TIER_NAME;
        };
        match self.definition(tier) {
            Some(definition) => &definition.name,
            None => DEFAULT_TIER_NAMES
                .get(tier.index())
                .copied()
                .unwrap_or(NO_TIER_NAME),
        }
    }

    /// Sum of the offsets of every floor rule covering `z`.
    #[must_use]
    pub fn floor_offset(&self, z: i32) -> i32 {
        self.config
            .floor_rules
            .iter()
            .filter(|rule| rule.contains(z))
            .fold(0_i32, |total, rule| total.saturating_add(rule.offset))
    }

    /// Sum of the offsets of every instance rule matching `instance`.
    #[must_use]
    pub fn instance_offset(&self, instance: &InstanceContext) -> i32 {
        self.config
            .instance_rules
            .iter()
            .filter(|rule| rule.matches(instance))
            .fold(0_i32, |total, rule| total.saturating_add(rule.offset))
    }
}
