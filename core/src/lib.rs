#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the rank pressure engine.
//!
//! This crate defines the vocabulary that connects the host world, the rank
//! system and the regional pressure store. The host submits [`Command`] values
//! describing lifecycle hooks (spawn, kill, tick), the world executes them via
//! its `apply` entry point, and then broadcasts [`Event`] values describing the
//! resulting tier assignments and pressure maintenance. The shared rank
//! configuration schema lives in [`config`].

pub mod config;

use serde::Serialize;

pub use config::{
    ConfigError, FloorRule, InstanceRule, PressureSettings, RankConfiguration, RankDefinition,
    RankScalars,
};

/// Maximum number of tiers a catalog may hold.
pub const TIER_CAPACITY: usize = 12;

/// Built-in tier ladder substituted whenever a configuration declares no tiers.
pub const DEFAULT_TIER_NAMES: [&str; TIER_CAPACITY] = [
    "F", "E", "D", "C", "B", "A", "S", "SS", "SSS", "SSSS", "SSSSS", "SSSSSS",
];

/// Display name reported for the "no tier" sentinel.
pub const NO_TIER_NAME: &str = "None";

/// Ordinal rank level assigned to a monster, weakest first.
///
/// The wrapped value is the tier's index within the active catalog, so the
/// ordering of tiers is exactly their relative strength. The "none" sentinel is
/// expressed as `Option::<Tier>::None` by every API that accepts it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tier(u8);

impl Tier {
    /// Weakest tier of every catalog.
    pub const LOWEST: Tier = Tier(0);

    /// Creates a tier from a catalog index, rejecting indices beyond [`TIER_CAPACITY`].
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        if index < TIER_CAPACITY {
            Some(Self(index as u8))
        } else {
            None
        }
    }

    /// Catalog index backing the tier.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Location of an entity expressed in integer world coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WorldPosition {
    x: i32,
    y: i32,
    z: i32,
}

impl WorldPosition {
    /// Creates a new world position.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Horizontal world coordinate.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    /// Vertical world coordinate.
    #[must_use]
    pub const fn y(&self) -> i32 {
        self.y
    }

    /// Floor the position lies on.
    #[must_use]
    pub const fn z(&self) -> i32 {
        self.z
    }
}

/// Coarse spatial bucket aggregating pressure for many world positions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RegionKey {
    rx: i32,
    ry: i32,
    z: i32,
}

impl RegionKey {
    /// Creates a region key from already quantized coordinates.
    #[must_use]
    pub const fn new(rx: i32, ry: i32, z: i32) -> Self {
        Self { rx, ry, z }
    }

    /// Quantized horizontal coordinate.
    #[must_use]
    pub const fn rx(&self) -> i32 {
        self.rx
    }

    /// Quantized vertical coordinate.
    #[must_use]
    pub const fn ry(&self) -> i32 {
        self.ry
    }

    /// Raw floor of the region.
    #[must_use]
    pub const fn z(&self) -> i32 {
        self.z
    }
}

/// Unique identifier assigned to a monster by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonsterId(u32);

impl MonsterId {
    /// Creates a new monster identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Describes the dungeon instance a monster spawns into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct InstanceContext {
    /// Difficulty tier of the instance, compared against `tierGte` rules.
    pub tier: i32,
    /// Whether the instance runs in hard mode.
    pub hard: bool,
    /// Whether deaths inside the instance are permanent.
    pub permadeath: bool,
}

/// Lifecycle hooks the host submits to the world.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Requests that a monster spawn and receive a rank tier.
    SpawnMonster {
        /// Monster template key, forwarded to the sampler.
        key: String,
        /// Location of the spawn point.
        position: WorldPosition,
        /// Unranked stats of the monster template.
        base: BaseStats,
        /// Instance the spawn happens in, if any.
        instance: Option<InstanceContext>,
        /// Monotonic timestamp of the spawn in milliseconds.
        now_ms: u64,
    },
    /// Reports that a monster was killed.
    KillMonster {
        /// Identifier of the monster that died.
        monster: MonsterId,
        /// Monotonic timestamp of the kill in milliseconds.
        now_ms: u64,
    },
    /// Periodic maintenance tick.
    Tick {
        /// Monotonic timestamp of the tick in milliseconds.
        now_ms: u64,
    },
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Confirms that a monster spawned with a resolved tier.
    MonsterSpawned {
        /// Identifier assigned to the monster.
        monster: MonsterId,
        /// Tier drawn from the weight table before any offset.
        base_tier: Tier,
        /// Tier assigned after applying offsets.
        tier: Tier,
        /// Total offset applied to the base tier.
        offset: i32,
        /// Pressure bias observed in the spawn region.
        bias: f64,
    },
    /// Confirms that a kill was registered with the pressure store.
    MonsterKilled {
        /// Identifier of the monster that died.
        monster: MonsterId,
        /// Tier the monster held.
        tier: Tier,
        /// Region credited with the kill.
        region: RegionKey,
    },
    /// Reports that a kill referenced a monster the world does not know.
    KillIgnored {
        /// Identifier provided in the kill command.
        monster: MonsterId,
    },
    /// Reports that the periodic decay pass ran.
    PressureDecayed {
        /// Number of regions normalized by the pass.
        regions: usize,
        /// Timestamp the regions were decayed to.
        now_ms: u64,
    },
}

/// Entity capable of receiving rank scalar modifiers.
///
/// Implementations must assign rather than accumulate so repeated application
/// of the same tier leaves the entity unchanged.
pub trait RankScalarTarget {
    /// Replaces the rank assignment of the entity.
    fn assign_rank(&mut self, tier: Tier, scalars: &RankScalars);
}

/// Unranked stats of a monster template.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct BaseStats {
    /// Maximum health before rank scaling.
    pub max_health: u32,
    /// Outgoing damage per hit before rank scaling.
    pub damage: u32,
    /// Movement speed before the rank delta.
    pub speed: i32,
    /// Experience awarded on death before rank scaling.
    pub experience: u64,
}

/// Combat profile of a spawned monster, derived from base stats and its rank.
#[derive(Clone, Debug, PartialEq)]
pub struct CombatProfile {
    base: BaseStats,
    tier: Option<Tier>,
    scalars: RankScalars,
}

impl CombatProfile {
    /// Creates an unranked profile with neutral scalars.
    #[must_use]
    pub fn new(base: BaseStats) -> Self {
        Self {
            base,
            tier: None,
            scalars: RankScalars::default(),
        }
    }

    /// Unranked stats the profile derives from.
    #[must_use]
    pub const fn base(&self) -> &BaseStats {
        &self.base
    }

    /// Tier currently assigned, if any.
    #[must_use]
    pub const fn tier(&self) -> Option<Tier> {
        self.tier
    }

    /// Scalars currently assigned.
    #[must_use]
    pub const fn scalars(&self) -> &RankScalars {
        &self.scalars
    }

    /// Maximum health after rank scaling; never drops a living template to zero.
    #[must_use]
    pub fn max_health(&self) -> u32 {
        if self.base.max_health == 0 {
            return 0;
        }
        scale_u32(self.base.max_health, self.scalars.hp).max(1)
    }

    /// Outgoing damage after rank scaling.
    #[must_use]
    pub fn damage(&self) -> u32 {
        scale_u32(self.base.damage, self.scalars.dmg)
    }

    /// Movement speed after the rank delta.
    #[must_use]
    pub fn speed(&self) -> i32 {
        self.base.speed.saturating_add(self.scalars.speed_delta)
    }

    /// Fraction of incoming damage absorbed.
    #[must_use]
    pub fn mitigation(&self) -> f64 {
        self.scalars.mit
    }

    /// Flat resistance percentage.
    #[must_use]
    pub fn resist_percent(&self) -> i32 {
        self.scalars.resist
    }

    /// Experience awarded on death after rank scaling.
    #[must_use]
    pub fn experience(&self) -> u64 {
        let scaled = (self.base.experience as f64 * self.scalars.xp).round();
        scaled.clamp(0.0, u64::MAX as f64) as u64
    }

    /// Multiplier applied to loot drop chances.
    #[must_use]
    pub fn loot_multiplier(&self) -> f64 {
        self.scalars.loot_mult
    }

    /// Additional loot rolls granted on death.
    #[must_use]
    pub fn extra_loot_rolls(&self) -> u8 {
        self.scalars.extra_rolls
    }

    /// Multiplier applied to AI ability cooldowns.
    #[must_use]
    pub fn ai_cooldown_multiplier(&self) -> f64 {
        self.scalars.ai_cd_mult
    }

    /// Number of extra spells unlocked by the rank.
    #[must_use]
    pub fn spell_unlocks(&self) -> u8 {
        self.scalars.spell_unlock
    }
}

impl RankScalarTarget for CombatProfile {
    fn assign_rank(&mut self, tier: Tier, scalars: &RankScalars) {
        self.tier = Some(tier);
        self.scalars = *scalars;
    }
}

fn scale_u32(value: u32, factor: f64) -> u32 {
    let scaled = (f64::from(value) * factor).round();
    scaled.clamp(0.0, f64::from(u32::MAX)) as u32
}
