#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state hosting the rank and pressure systems.
//!
//! The world owns the active [`RankSystem`], the [`WorldPressureManager`], the
//! seeded random source used for tier draws and every living monster. Hosts
//! drive it exclusively through [`apply`] and observe it through [`query`].

use std::collections::BTreeMap;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rank_pressure_core::{
    BaseStats, CombatProfile, Command, Event, InstanceContext, MonsterId, Tier, WorldPosition,
};
use rank_pressure_system_pressure::WorldPressureManager;
use rank_pressure_system_ranking::RankSystem;
use tracing::debug;

#[derive(Clone, Debug)]
struct Monster {
    key: String,
    position: WorldPosition,
    base_tier: Tier,
    profile: CombatProfile,
}

/// Represents the authoritative world state.
#[derive(Debug)]
pub struct World {
    ranks: RankSystem,
    pressure: WorldPressureManager,
    rng: ChaCha8Rng,
    monsters: BTreeMap<MonsterId, Monster>,
    next_monster: u32,
}

impl World {
    /// Creates a world whose tier draws replay identically for the same `seed`.
    ///
    /// The pressure manager is reconfigured from the rank configuration so both
    /// systems agree on decay and bias parameters.
    #[must_use]
    pub fn new(ranks: RankSystem, mut pressure: WorldPressureManager, seed: u64) -> Self {
        pressure.configure(ranks.pressure_settings());
        Self {
            ranks,
            pressure,
            rng: ChaCha8Rng::seed_from_u64(seed),
            monsters: BTreeMap::new(),
            next_monster: 0,
        }
    }

    /// Installs a new rank system, keeping monsters and accumulated pressure.
    ///
    /// Already spawned monsters keep the tier and scalars they were assigned.
    pub fn replace_ranks(&mut self, ranks: RankSystem) {
        self.pressure.configure(ranks.pressure_settings());
        self.ranks = ranks;
    }

    /// Mutable access to the pressure manager, used to persist and restore it.
    pub fn pressure_mut(&mut self) -> &mut WorldPressureManager {
        &mut self.pressure
    }

    fn allocate_monster_id(&mut self) -> MonsterId {
        let id = MonsterId::new(self.next_monster);
        self.next_monster = self.next_monster.wrapping_add(1);
        id
    }

    fn resolve_tier(
        &mut self,
        key: &str,
        position: WorldPosition,
        instance: Option<&InstanceContext>,
        now_ms: u64,
    ) -> TierResolution {
        if !self.ranks.is_enabled() {
            return TierResolution {
                base_tier: Tier::LOWEST,
                tier: Tier::LOWEST,
                offset: 0,
                bias: 0.0,
            };
        }

        let bias = self.pressure.observe_pressure_bias(position, now_ms);
        let base_tier = self.ranks.sample_base_tier(key, &mut self.rng);
        let pressure_offset = i32::try_from(self.ranks.bias_to_offset(bias)).unwrap_or(i32::MAX);
        let instance_offset = instance.map_or(0, |instance| self.ranks.instance_offset(instance));
        let offset = pressure_offset
            .saturating_add(self.ranks.floor_offset(position.z()))
            .saturating_add(instance_offset);

        TierResolution {
            base_tier,
            tier: self.ranks.clamped_advance(Some(base_tier), offset),
            offset,
            bias,
        }
    }

    fn spawn(
        &mut self,
        key: String,
        position: WorldPosition,
        base: BaseStats,
        instance: Option<InstanceContext>,
        now_ms: u64,
    ) -> Event {
        let resolution = self.resolve_tier(&key, position, instance.as_ref(), now_ms);
        let mut profile = CombatProfile::new(base);
        self.ranks.apply_scalars(&mut profile, resolution.tier);

        let monster = self.allocate_monster_id();
        debug!(
            monster = monster.get(),
            key = key.as_str(),
            base_tier = self.ranks.name_of(Some(resolution.base_tier)),
            tier = self.ranks.name_of(Some(resolution.tier)),
            offset = resolution.offset,
            bias = resolution.bias,
            "spawned monster"
        );

        let _ = self.monsters.insert(
            monster,
            Monster {
                key,
                position,
                base_tier: resolution.base_tier,
                profile,
            },
        );

        Event::MonsterSpawned {
            monster,
            base_tier: resolution.base_tier,
            tier: resolution.tier,
            offset: resolution.offset,
            bias: resolution.bias,
        }
    }

    fn kill(&mut self, monster: MonsterId, now_ms: u64) -> Event {
        let Some(dead) = self.monsters.remove(&monster) else {
            debug!(monster = monster.get(), "ignoring kill of unknown monster");
            return Event::KillIgnored { monster };
        };

        let tier = dead.profile.tier().unwrap_or(Tier::LOWEST);
        self.pressure.register_kill(dead.position, Some(tier), now_ms);
        Event::MonsterKilled {
            monster,
            tier,
            region: WorldPressureManager::region_of(dead.position),
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct TierResolution {
    base_tier: Tier,
    tier: Tier,
    offset: i32,
    bias: f64,
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::SpawnMonster {
            key,
            position,
            base,
            instance,
            now_ms,
        } => {
            out_events.push(world.spawn(key, position, base, instance, now_ms));
        }
        Command::KillMonster { monster, now_ms } => {
            out_events.push(world.kill(monster, now_ms));
        }
        Command::Tick { now_ms } => {
            let regions = world.pressure.decay_touched(now_ms);
            out_events.push(Event::PressureDecayed { regions, now_ms });
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use super::World;
    use rank_pressure_core::{CombatProfile, MonsterId, Tier, WorldPosition};
    use rank_pressure_system_pressure::WorldPressureManager;
    use rank_pressure_system_ranking::RankSystem;

    /// Provides read-only access to the active rank system.
    #[must_use]
    pub fn ranks(world: &World) -> &RankSystem {
        &world.ranks
    }

    /// Provides read-only access to the pressure manager.
    #[must_use]
    pub fn pressure(world: &World) -> &WorldPressureManager {
        &world.pressure
    }

    /// Bias the region containing `position` would exert at `now_ms`.
    #[must_use]
    pub fn pressure_bias(world: &World, position: WorldPosition, now_ms: u64) -> f64 {
        world.pressure.pressure_bias(position, now_ms)
    }

    /// Captures the monster identified by `monster`, if it is alive.
    #[must_use]
    pub fn monster(world: &World, monster: MonsterId) -> Option<MonsterSnapshot> {
        world
            .monsters
            .get(&monster)
            .map(|entry| MonsterSnapshot::capture(monster, entry))
    }

    /// Captures every living monster in identifier order.
    #[must_use]
    pub fn monster_view(world: &World) -> MonsterView {
        MonsterView {
            snapshots: world
                .monsters
                .iter()
                .map(|(id, entry)| MonsterSnapshot::capture(*id, entry))
                .collect(),
        }
    }

    /// Read-only snapshot describing all living monsters.
    #[derive(Clone, Debug)]
    pub struct MonsterView {
        snapshots: Vec<MonsterSnapshot>,
    }

    impl MonsterView {
        /// Iterator over the captured monsters in identifier order.
        pub fn iter(&self) -> impl Iterator<Item = &MonsterSnapshot> {
            self.snapshots.iter()
        }

        /// Number of living monsters.
        #[must_use]
        pub fn len(&self) -> usize {
            self.snapshots.len()
        }

        /// Reports whether no monster is alive.
        #[must_use]
        pub fn is_empty(&self) -> bool {
            self.snapshots.is_empty()
        }

        /// Consumes the view, yielding the snapshots.
        #[must_use]
        pub fn into_vec(self) -> Vec<MonsterSnapshot> {
            self.snapshots
        }
    }

    /// Immutable representation of a single monster.
    #[derive(Clone, Debug, PartialEq)]
    pub struct MonsterSnapshot {
        /// Identifier assigned by the world.
        pub id: MonsterId,
        /// Template key the monster spawned from.
        pub key: String,
        /// Spawn location.
        pub position: WorldPosition,
        /// Tier drawn before offsets were applied.
        pub base_tier: Tier,
        /// Stats after rank scaling.
        pub profile: CombatProfile,
    }

    impl MonsterSnapshot {
        fn capture(id: MonsterId, monster: &super::Monster) -> Self {
            Self {
                id,
                key: monster.key.clone(),
                position: monster.position,
                base_tier: monster.base_tier,
                profile: monster.profile.clone(),
            }
        }
    }
}
