//! Rank configuration schema shared by the rank system and the pressure store.
//!
//! Documents are parsed leniently: the top level must be a JSON object, but any
//! malformed element nested inside it is skipped with a warning instead of
//! failing the whole load. Every scalar is clamped into its documented range.

use std::{
    collections::HashSet,
    fs, io,
    path::{Path, PathBuf},
};

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use crate::{InstanceContext, Tier, DEFAULT_TIER_NAMES, TIER_CAPACITY};

/// Decay factor applied per elapsed minute when a document omits one.
pub const DEFAULT_DECAY_PER_MINUTE: f64 = 0.99;
/// Bias scale used when a document omits one.
pub const DEFAULT_BIAS_SCALE: f64 = 0.5;

const MAX_BIAS_SCALE: f64 = 10.0;
const MAX_INTENSITY_PER_KILL: f64 = 1_000.0;
const DEFAULT_FLOOR_RULE_Z_LTE: i32 = 15;

/// Scalar modifiers a tier applies to a monster.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RankScalars {
    /// Health multiplier, clamped to `[0.01, 100]`.
    pub hp: f64,
    /// Outgoing damage multiplier, clamped to `[0.01, 100]`.
    pub dmg: f64,
    /// Fraction of incoming damage mitigated, clamped to `[0, 0.80]`.
    pub mit: f64,
    /// Additive speed delta, clamped to `[-1000, 1000]`.
    pub speed_delta: i32,
    /// Experience multiplier, clamped to `[0, 100]`.
    pub xp: f64,
    /// Loot multiplier, clamped to `[0, 100]`.
    pub loot_mult: f64,
    /// Extra loot rolls granted on death.
    pub extra_rolls: u8,
    /// AI cooldown multiplier, clamped to `[0.01, 100]`.
    pub ai_cd_mult: f64,
    /// Number of additional spells unlocked.
    pub spell_unlock: u8,
    /// Resistance percentage, clamped to `[0, 50]`.
    pub resist: i32,
}

impl Default for RankScalars {
    fn default() -> Self {
        Self {
            hp: 1.0,
            dmg: 1.0,
            mit: 0.0,
            speed_delta: 0,
            xp: 1.0,
            loot_mult: 1.0,
            extra_rolls: 0,
            ai_cd_mult: 1.0,
            spell_unlock: 0,
            resist: 0,
        }
    }
}

/// Named tier entry of the catalog.
#[derive(Clone, Debug, PartialEq)]
pub struct RankDefinition {
    /// Display name, unique under case-insensitive comparison.
    pub name: String,
    /// Scalars applied to monsters holding the tier.
    pub scalars: RankScalars,
}

impl RankDefinition {
    /// Creates a definition with neutral scalars.
    #[must_use]
    pub fn neutral(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scalars: RankScalars::default(),
        }
    }
}

/// Tier offset applied to spawns on a range of floors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FloorRule {
    /// Lowest floor covered by the rule.
    pub z_gte: i32,
    /// Highest floor covered by the rule.
    pub z_lte: i32,
    /// Tier offset contributed when the rule matches.
    pub offset: i32,
}

impl FloorRule {
    /// Reports whether the rule covers the provided floor.
    #[must_use]
    pub const fn contains(&self, z: i32) -> bool {
        z >= self.z_gte && z <= self.z_lte
    }
}

/// Tier offset applied to spawns inside qualifying instances.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InstanceRule {
    /// Minimum instance tier the rule applies to.
    pub tier_gte: i32,
    /// Rule only applies to hard-mode instances.
    pub hard: bool,
    /// Rule only applies to permadeath instances.
    pub permadeath: bool,
    /// Tier offset contributed when the rule matches.
    pub offset: i32,
}

impl InstanceRule {
    /// Reports whether the rule applies to the provided instance.
    #[must_use]
    pub const fn matches(&self, instance: &InstanceContext) -> bool {
        instance.tier >= self.tier_gte
            && (!self.hard || instance.hard)
            && (!self.permadeath || instance.permadeath)
    }
}

/// Complete rank configuration, replaced wholesale on every successful load.
#[derive(Clone, Debug, PartialEq)]
pub struct RankConfiguration {
    /// Whether weighted tier sampling is active.
    pub enabled: bool,
    /// Fraction of pressure intensity retained per elapsed minute.
    pub decay_per_minute: f64,
    /// Bias produced by a fully saturated region.
    pub bias_scale: f64,
    /// Ordered tier catalog, weakest first.
    pub order: Vec<RankDefinition>,
    /// Global weight table in declaration order.
    pub global_weights: Vec<(String, u32)>,
    /// Floor-based offset rules.
    pub floor_rules: Vec<FloorRule>,
    /// Instance-based offset rules.
    pub instance_rules: Vec<InstanceRule>,
    /// Intensity added to a region per kill, keyed by tier name.
    pub intensity_per_kill: Vec<(String, f64)>,
}

impl Default for RankConfiguration {
    fn default() -> Self {
        Self {
            enabled: false,
            decay_per_minute: DEFAULT_DECAY_PER_MINUTE,
            bias_scale: DEFAULT_BIAS_SCALE,
            order: Self::default_ladder(),
            global_weights: Vec::new(),
            floor_rules: Vec::new(),
            instance_rules: Vec::new(),
            intensity_per_kill: Vec::new(),
        }
    }
}

impl RankConfiguration {
    /// Built-in ladder of neutral tiers used when a document declares none.
    #[must_use]
    pub fn default_ladder() -> Vec<RankDefinition> {
        DEFAULT_TIER_NAMES
            .iter()
            .map(|name| RankDefinition::neutral(*name))
            .collect()
    }

    /// Reads and parses a configuration document from disk.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    /// Parses a configuration document.
    pub fn from_json_str(document: &str) -> Result<Self, ConfigError> {
        let document: Value = serde_json::from_str(document)?;
        let root = document.as_object().ok_or(ConfigError::RootNotObject)?;

        let mut config = Self {
            enabled: root.get("enabled").and_then(Value::as_bool).unwrap_or(false),
            decay_per_minute: number_field(root, "pressureDecayPerMinute", DEFAULT_DECAY_PER_MINUTE)
                .clamp(0.0, 1.0),
            bias_scale: number_field(root, "biasScale", DEFAULT_BIAS_SCALE)
                .clamp(0.0, MAX_BIAS_SCALE),
            order: parse_order(root.get("order")),
            global_weights: parse_weights(root.get("globalWeights")),
            floor_rules: parse_floor_rules(root.get("floorRules")),
            instance_rules: parse_instance_rules(root.get("instanceRules")),
            intensity_per_kill: parse_intensities(root.get("intensityPerKillByRank")),
        };
        config.ensure_catalog();
        Ok(config)
    }

    /// Substitutes the built-in ladder when the catalog is empty.
    pub fn ensure_catalog(&mut self) {
        if self.order.is_empty() {
            self.order = Self::default_ladder();
        }
    }

    /// Configured per-kill intensity for a tier name, compared case-insensitively.
    #[must_use]
    pub fn intensity_for(&self, name: &str) -> Option<f64> {
        let wanted = name.to_lowercase();
        self.intensity_per_kill
            .iter()
            .find(|(candidate, _)| candidate.to_lowercase() == wanted)
            .map(|(_, delta)| *delta)
    }
}

/// Parameters the pressure store derives from the rank configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct PressureSettings {
    decay_per_minute: f64,
    bias_scale: f64,
    intensity_by_tier: [f64; TIER_CAPACITY],
}

impl Default for PressureSettings {
    fn default() -> Self {
        Self::from_configuration(&RankConfiguration::default())
    }
}

impl PressureSettings {
    /// Creates settings from explicit values, clamping them into range.
    #[must_use]
    pub fn new(
        decay_per_minute: f64,
        bias_scale: f64,
        intensity_by_tier: [f64; TIER_CAPACITY],
    ) -> Self {
        Self {
            decay_per_minute: clamp_or(decay_per_minute, 0.0, 1.0, DEFAULT_DECAY_PER_MINUTE),
            bias_scale: clamp_or(bias_scale, 0.0, MAX_BIAS_SCALE, DEFAULT_BIAS_SCALE),
            intensity_by_tier: intensity_by_tier.map(|delta| clamp_or(delta, 0.0, f64::MAX, 0.0)),
        }
    }

    /// Resolves the per-tier intensity table against the configuration's catalog.
    #[must_use]
    pub fn from_configuration(config: &RankConfiguration) -> Self {
        let mut intensity_by_tier = [0.0; TIER_CAPACITY];
        for (slot, definition) in intensity_by_tier.iter_mut().zip(&config.order) {
            *slot = config.intensity_for(&definition.name).unwrap_or(0.0);
        }
        Self::new(config.decay_per_minute, config.bias_scale, intensity_by_tier)
    }

    /// Fraction of intensity retained per elapsed minute.
    #[must_use]
    pub const fn decay_per_minute(&self) -> f64 {
        self.decay_per_minute
    }

    /// Bias produced by a fully saturated region.
    #[must_use]
    pub const fn bias_scale(&self) -> f64 {
        self.bias_scale
    }

    /// Non-negative intensity added to a region when a monster of `tier` dies.
    #[must_use]
    pub fn intensity_delta(&self, tier: Tier) -> f64 {
        self.intensity_by_tier
            .get(tier.index())
            .copied()
            .unwrap_or(0.0)
            .max(0.0)
    }
}

/// Errors that abort a configuration load.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document could not be read from disk.
    #[error("could not open rank config {}: {source}", .path.display())]
    Read {
        /// Location of the document.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The document is not valid JSON.
    #[error("failed to parse rank config: {0}")]
    Parse(#[from] serde_json::Error),
    /// The document parsed but its root is not an object.
    #[error("rank config root must be an object")]
    RootNotObject,
}

fn clamp_or(value: f64, min: f64, max: f64, fallback: f64) -> f64 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(min, max)
    }
}

fn number_field(object: &Map<String, Value>, key: &str, default: f64) -> f64 {
    object.get(key).and_then(Value::as_f64).unwrap_or(default)
}

fn integer_field(object: &Map<String, Value>, key: &str, default: i64) -> i64 {
    object
        .get(key)
        .and_then(|value| {
            value
                .as_i64()
                .or_else(|| value.as_f64().map(|number| number as i64))
        })
        .unwrap_or(default)
}

fn clamped_i32(object: &Map<String, Value>, key: &str, default: i32, min: i32, max: i32) -> i32 {
    integer_field(object, key, i64::from(default)).clamp(i64::from(min), i64::from(max)) as i32
}

fn clamped_u8(object: &Map<String, Value>, key: &str, default: u8) -> u8 {
    integer_field(object, key, i64::from(default)).clamp(0, i64::from(u8::MAX)) as u8
}

fn saturating_i32(object: &Map<String, Value>, key: &str, default: i32) -> i32 {
    clamped_i32(object, key, default, i32::MIN, i32::MAX)
}

fn parse_scalars(object: &Map<String, Value>) -> RankScalars {
    let neutral = RankScalars::default();
    RankScalars {
        hp: number_field(object, "hp", neutral.hp).clamp(0.01, 100.0),
        dmg: number_field(object, "dmg", neutral.dmg).clamp(0.01, 100.0),
        mit: number_field(object, "mit", neutral.mit).clamp(0.0, 0.80),
        xp: number_field(object, "xp", neutral.xp).clamp(0.0, 100.0),
        loot_mult: number_field(object, "lootMult", neutral.loot_mult).clamp(0.0, 100.0),
        ai_cd_mult: number_field(object, "aiCdMult", neutral.ai_cd_mult).clamp(0.01, 100.0),
        speed_delta: clamped_i32(object, "speedDelta", neutral.speed_delta, -1_000, 1_000),
        resist: clamped_i32(object, "resist", neutral.resist, 0, 50),
        extra_rolls: clamped_u8(object, "extraRolls", neutral.extra_rolls),
        spell_unlock: clamped_u8(object, "spellUnlock", neutral.spell_unlock),
    }
}

fn parse_order(value: Option<&Value>) -> Vec<RankDefinition> {
    let Some(entries) = value.and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut order: Vec<RankDefinition> = Vec::new();
    let mut seen = HashSet::new();
    for (position, entry) in entries.iter().enumerate() {
        let Some(object) = entry.as_object() else {
            warn!(position, "skipping rank order entry that is not an object");
            continue;
        };
        if order.len() >= TIER_CAPACITY {
            warn!(
                capacity = TIER_CAPACITY,
                "ignoring rank order entries beyond the catalog capacity"
            );
            break;
        }

        let name = match object.get("name").and_then(Value::as_str) {
            Some(name) if !name.is_empty() => name.to_owned(),
            _ => DEFAULT_TIER_NAMES[order.len()].to_owned(),
        };
        if !seen.insert(name.to_lowercase()) {
            warn!(%name, position, "skipping rank whose name is already declared");
            continue;
        }

        let scalars = object
            .get("s")
            .and_then(Value::as_object)
            .map_or_else(RankScalars::default, parse_scalars);
        order.push(RankDefinition { name, scalars });
    }
    order
}

fn parse_weights(value: Option<&Value>) -> Vec<(String, u32)> {
    let Some(object) = value.and_then(Value::as_object) else {
        return Vec::new();
    };

    object
        .iter()
        .filter_map(|(name, weight)| {
            let raw = weight
                .as_i64()
                .or_else(|| weight.as_u64().map(|_| i64::MAX));
            let Some(raw) = raw else {
                warn!(%name, "skipping global weight that is not an integer");
                return None;
            };
            if raw <= 0 {
                return None;
            }
            Some((name.clone(), raw.min(i64::from(u32::MAX)) as u32))
        })
        .collect()
}

fn parse_floor_rules(value: Option<&Value>) -> Vec<FloorRule> {
    let Some(entries) = value.and_then(Value::as_array) else {
        return Vec::new();
    };

    entries
        .iter()
        .enumerate()
        .filter_map(|(position, entry)| {
            let Some(object) = entry.as_object() else {
                warn!(position, "skipping floor rule that is not an object");
                return None;
            };
            let z_gte = saturating_i32(object, "zGte", 0);
            let z_lte = saturating_i32(object, "zLte", DEFAULT_FLOOR_RULE_Z_LTE);
            Some(FloorRule {
                z_gte: z_gte.min(z_lte),
                z_lte: z_gte.max(z_lte),
                offset: saturating_i32(object, "offset", 0),
            })
        })
        .collect()
}

fn parse_instance_rules(value: Option<&Value>) -> Vec<InstanceRule> {
    let Some(entries) = value.and_then(Value::as_array) else {
        return Vec::new();
    };

    entries
        .iter()
        .enumerate()
        .filter_map(|(position, entry)| {
            let Some(object) = entry.as_object() else {
                warn!(position, "skipping instance rule that is not an object");
                return None;
            };
            Some(InstanceRule {
                tier_gte: saturating_i32(object, "tierGte", 0),
                hard: object.get("hard").and_then(Value::as_bool).unwrap_or(false),
                permadeath: object
                    .get("permadeath")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
                offset: saturating_i32(object, "offset", 0),
            })
        })
        .collect()
}

fn parse_intensities(value: Option<&Value>) -> Vec<(String, f64)> {
    let Some(object) = value.and_then(Value::as_object) else {
        return Vec::new();
    };

    object
        .iter()
        .filter_map(|(name, delta)| {
            let Some(delta) = delta.as_f64() else {
                warn!(%name, "skipping kill intensity that is not a number");
                return None;
            };
            Some((name.clone(), delta.clamp(0.0, MAX_INTENSITY_PER_KILL)))
        })
        .collect()
}
