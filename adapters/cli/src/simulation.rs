//! Scripted spawn, kill and tick session driven against a world.

use anyhow::{Context, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rank_pressure_core::{
    BaseStats, Command, Event, InstanceContext, MonsterId, WorldPosition, TIER_CAPACITY,
};
use rank_pressure_world::{self as world, query, World};

const MILLIS_PER_MINUTE: u64 = 60_000;
/// Mixed into the session seed so host decisions do not mirror tier draws.
const HOST_SEED_SALT: u64 = 0x9e37_79b9_7f4a_7c15;

const TEMPLATES: [(&str, BaseStats); 3] = [
    (
        "rat",
        BaseStats {
            max_health: 30,
            damage: 4,
            speed: 120,
            experience: 5,
        },
    ),
    (
        "orc",
        BaseStats {
            max_health: 180,
            damage: 18,
            speed: 90,
            experience: 40,
        },
    ),
    (
        "dragon",
        BaseStats {
            max_health: 1_500,
            damage: 90,
            speed: 70,
            experience: 600,
        },
    ),
];

/// Shape of a scripted session.
#[derive(Clone, Debug)]
pub(crate) struct SessionPlan {
    /// Simulated minutes to run.
    pub(crate) minutes: u32,
    /// Spawns issued during each minute.
    pub(crate) spawns_per_minute: u32,
    /// Probability that a freshly spawned monster is killed before the next spawn.
    pub(crate) kill_chance: f64,
    /// Half-width of the square area spawns are scattered across.
    pub(crate) spread: i32,
    /// Highest floor spawns may land on.
    pub(crate) max_floor: i32,
    /// Instance every spawn happens in, if any.
    pub(crate) instance: Option<InstanceContext>,
}

/// Aggregated outcome of a session.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct SessionReport {
    pub(crate) spawned: usize,
    pub(crate) killed: usize,
    pub(crate) promoted: usize,
    pub(crate) tiers: [usize; TIER_CAPACITY],
    pub(crate) peak_bias: f64,
    pub(crate) finished_at_ms: u64,
}

/// Runs `plan` against `world`, starting at `start_ms`.
pub(crate) fn run_session(
    world: &mut World,
    plan: &SessionPlan,
    seed: u64,
    start_ms: u64,
) -> SessionReport {
    let mut host = ChaCha8Rng::seed_from_u64(seed ^ HOST_SEED_SALT);
    let kill_chance = if plan.kill_chance.is_nan() {
        0.0
    } else {
        plan.kill_chance.clamp(0.0, 1.0)
    };
    let spread = plan.spread.max(0);
    let max_floor = plan.max_floor.max(0);
    let step_ms = MILLIS_PER_MINUTE / u64::from(plan.spawns_per_minute.max(1));

    let mut report = SessionReport {
        spawned: 0,
        killed: 0,
        promoted: 0,
        tiers: [0; TIER_CAPACITY],
        peak_bias: 0.0,
        finished_at_ms: start_ms,
    };
    let mut events = Vec::new();

    for minute in 0..u64::from(plan.minutes) {
        let minute_start = start_ms.saturating_add(minute * MILLIS_PER_MINUTE);
        for spawn in 0..u64::from(plan.spawns_per_minute) {
            let now_ms = minute_start.saturating_add(spawn * step_ms);
            let (key, base) = TEMPLATES[host.gen_range(0..TEMPLATES.len())];
            let position = WorldPosition::new(
                host.gen_range(-spread..=spread),
                host.gen_range(-spread..=spread),
                host.gen_range(0..=max_floor),
            );

            events.clear();
            world::apply(
                world,
                Command::SpawnMonster {
                    key: key.to_owned(),
                    position,
                    base,
                    instance: plan.instance,
                    now_ms,
                },
                &mut events,
            );
            let Some(monster) = record_spawns(&events, &mut report) else {
                continue;
            };

            if host.gen_bool(kill_chance) {
                events.clear();
                world::apply(world, Command::KillMonster { monster, now_ms }, &mut events);
                report.killed += events
                    .iter()
                    .filter(|event| matches!(event, Event::MonsterKilled { .. }))
                    .count();
            }
        }

        let now_ms = minute_start.saturating_add(MILLIS_PER_MINUTE);
        events.clear();
        world::apply(world, Command::Tick { now_ms }, &mut events);
        report.finished_at_ms = now_ms;
    }

    report
}

fn record_spawns(events: &[Event], report: &mut SessionReport) -> Option<MonsterId> {
    let mut spawned = None;
    for event in events {
        if let Event::MonsterSpawned {
            monster,
            base_tier,
            tier,
            bias,
            ..
        } = event
        {
            report.spawned += 1;
            report.tiers[tier.index()] += 1;
            if tier > base_tier {
                report.promoted += 1;
            }
            report.peak_bias = report.peak_bias.max(*bias);
            spawned = Some(*monster);
        }
    }
    spawned
}

/// Timestamp a resumed session should start from, after every persisted update.
///
/// Fails when the latest persisted update leaves no room on the clock for
/// every minute of `plan`.
pub(crate) fn resume_time(world: &World, plan: &SessionPlan) -> Result<u64> {
    let latest = query::pressure(world)
        .store()
        .sorted()
        .into_iter()
        .map(|(_, record)| record.last_update_ms())
        .max()
        .unwrap_or(0);
    latest
        .max(MILLIS_PER_MINUTE)
        .checked_add(1)
        .filter(|start_ms| session_end(*start_ms, plan.minutes).is_some())
        .with_context(|| {
            format!(
                "pressure was last updated at {latest} ms, too late to run {} more minutes",
                plan.minutes
            )
        })
}

fn session_end(start_ms: u64, minutes: u32) -> Option<u64> {
    u64::from(minutes)
        .checked_mul(MILLIS_PER_MINUTE)?
        .checked_add(start_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rank_pressure_system_pressure::WorldPressureManager;
    use rank_pressure_system_ranking::RankSystem;

    const BUILTIN_RANKS: &str = include_str!("../data/ranks.json");

    fn world(seed: u64) -> World {
        let mut ranks = RankSystem::default();
        ranks.load_from_str(BUILTIN_RANKS).expect("builtin ranks load");
        World::new(ranks, WorldPressureManager::default(), seed)
    }

    fn plan() -> SessionPlan {
        SessionPlan {
            minutes: 3,
            spawns_per_minute: 40,
            kill_chance: 0.75,
            spread: 96,
            max_floor: 12,
            instance: None,
        }
    }

    #[test]
    fn builtin_ranks_declare_full_ladder() {
        let mut ranks = RankSystem::default();
        ranks.load_from_str(BUILTIN_RANKS).expect("builtin ranks load");
        assert!(ranks.is_enabled());
        assert_eq!(ranks.catalog_len(), TIER_CAPACITY);
        assert_eq!(ranks.weight_table().entries().len(), TIER_CAPACITY - 1);
    }

    #[test]
    fn session_reports_every_spawn() {
        let mut world = world(4);
        let report = run_session(&mut world, &plan(), 4, 1_000);
        assert_eq!(report.spawned, 120);
        assert_eq!(report.tiers.iter().sum::<usize>(), 120);
        assert!(report.killed <= report.spawned);
        assert_eq!(
            query::monster_view(&world).len(),
            report.spawned - report.killed
        );
        assert_eq!(report.finished_at_ms, 1_000 + 3 * MILLIS_PER_MINUTE);
        assert_eq!(query::pressure(&world).store().touched_len(), 0);
    }

    #[test]
    fn sessions_replay_for_the_same_seed() {
        let first = run_session(&mut world(9), &plan(), 9, 1_000);
        let second = run_session(&mut world(9), &plan(), 9, 1_000);
        assert_eq!(first, second);
    }

    #[test]
    fn resumed_sessions_start_after_persisted_updates() {
        let mut world = world(2);
        assert_eq!(
            resume_time(&world, &plan()).expect("fresh world resumes"),
            MILLIS_PER_MINUTE + 1
        );
        let report = run_session(&mut world, &plan(), 2, 5_000);
        assert_eq!(
            resume_time(&world, &plan()).expect("session resumes"),
            report.finished_at_ms + 1
        );
    }

    #[test]
    fn late_persisted_updates_leave_no_room_to_resume() {
        let directory = tempfile::tempdir().expect("tempdir");
        let path = directory.path().join("pressure.json");
        std::fs::write(
            &path,
            format!(
                r#"{{ "regions": [ {{ "rx": 0, "ry": 0, "z": 7, "lastUpdateMs": {} }} ] }}"#,
                u64::MAX
            ),
        )
        .expect("write state");

        let mut world = world(3);
        let restored = world
            .pressure_mut()
            .restore(&path)
            .expect("state restores");
        assert_eq!(restored, 1);

        let error = resume_time(&world, &plan()).expect_err("clock is exhausted");
        assert!(error.to_string().contains("too late"), "{error}");
    }

    #[test]
    fn sessions_near_the_end_of_the_clock_saturate() {
        let mut world = world(6);
        let start_ms = u64::MAX - 1_000;
        let report = run_session(&mut world, &plan(), 6, start_ms);
        assert_eq!(report.spawned, 120);
        assert_eq!(report.finished_at_ms, u64::MAX);
    }

    #[test]
    fn out_of_range_kill_chance_is_clamped() {
        let mut world = world(5);
        let plan = SessionPlan {
            kill_chance: 7.0,
            minutes: 1,
            ..plan()
        };
        let report = run_session(&mut world, &plan, 5, 1_000);
        assert_eq!(report.killed, report.spawned);
    }
}
