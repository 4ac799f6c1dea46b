#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that drives the rank pressure engine.

mod simulation;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rank_pressure_core::InstanceContext;
use rank_pressure_system_pressure::WorldPressureManager;
use rank_pressure_system_ranking::RankSystem;
use rank_pressure_world::{query, World};
use tracing::info;

use crate::simulation::{run_session, SessionPlan};

const BUILTIN_RANKS: &str = include_str!("../data/ranks.json");

#[derive(Parser, Debug)]
#[command(
    name = "rank-pressure",
    version,
    about = "Simulate and inspect monster rank tiers driven by regional kill pressure"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a seeded spawn, kill and tick session and report the tiers assigned.
    Simulate {
        /// Rank configuration document; the built-in ladder is used when omitted.
        #[arg(long)]
        ranks: Option<PathBuf>,
        /// Pressure state to resume from and write back after the session.
        #[arg(long)]
        pressure: Option<PathBuf>,
        /// Seed for tier draws and scripted host decisions.
        #[arg(long, default_value_t = 1)]
        seed: u64,
        /// Simulated minutes to run.
        #[arg(long, default_value_t = 10)]
        minutes: u32,
        /// Spawns issued per simulated minute.
        #[arg(long, default_value_t = 30)]
        spawns_per_minute: u32,
        /// Probability that a spawned monster is killed right away.
        #[arg(long, default_value_t = 0.6)]
        kill_chance: f64,
        /// Half-width, in tiles, of the area spawns are scattered across.
        #[arg(long, default_value_t = 128)]
        spread: i32,
        /// Highest floor spawns may land on.
        #[arg(long, default_value_t = 12)]
        max_floor: i32,
        /// Difficulty tier of the instance every spawn happens in.
        #[arg(long)]
        instance_tier: Option<i32>,
        /// Marks the instance as hard mode.
        #[arg(long, requires = "instance_tier")]
        hard: bool,
        /// Marks the instance as permadeath.
        #[arg(long, requires = "instance_tier")]
        permadeath: bool,
    },
    /// Print persisted pressure regions, strongest first.
    Inspect {
        /// Pressure state to read.
        pressure: PathBuf,
        /// Rank configuration used for tier names and decay parameters.
        #[arg(long)]
        ranks: Option<PathBuf>,
        /// Timestamp the reported bias is projected to; defaults to the latest update.
        #[arg(long)]
        now_ms: Option<u64>,
        /// Maximum number of regions to print.
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

/// Entry point for the rank pressure command-line interface.
fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Simulate {
            ranks,
            pressure,
            seed,
            minutes,
            spawns_per_minute,
            kill_chance,
            spread,
            max_floor,
            instance_tier,
            hard,
            permadeath,
        } => {
            let plan = SessionPlan {
                minutes,
                spawns_per_minute,
                kill_chance,
                spread,
                max_floor,
                instance: instance_tier.map(|tier| InstanceContext {
                    tier,
                    hard,
                    permadeath,
                }),
            };
            simulate(ranks.as_deref(), pressure.as_deref(), seed, &plan)
        }
        Command::Inspect {
            pressure,
            ranks,
            now_ms,
            limit,
        } => inspect(&pressure, ranks.as_deref(), now_ms, limit),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_ranks(path: Option<&Path>) -> Result<RankSystem> {
    let mut ranks = RankSystem::default();
    match path {
        Some(path) => ranks
            .load(path)
            .with_context(|| format!("failed to load rank configuration {}", path.display()))?,
        None => ranks
            .load_from_str(BUILTIN_RANKS)
            .context("built-in rank configuration is invalid")?,
    }
    Ok(ranks)
}

fn simulate(
    ranks_path: Option<&Path>,
    pressure_path: Option<&Path>,
    seed: u64,
    plan: &SessionPlan,
) -> Result<()> {
    let ranks = load_ranks(ranks_path)?;
    let mut world = World::new(ranks, WorldPressureManager::default(), seed);

    if let Some(path) = pressure_path {
        let restored = world
            .pressure_mut()
            .restore_or_empty(path)
            .with_context(|| format!("failed to restore pressure state {}", path.display()))?;
        println!("restored {restored} pressure regions from {}", path.display());
    }

    let start_ms = simulation::resume_time(&world, plan)?;
    info!(
        seed,
        start_ms,
        minutes = plan.minutes,
        spawns_per_minute = plan.spawns_per_minute,
        "starting simulated session"
    );
    let report = run_session(&mut world, plan, seed, start_ms);

    println!(
        "spawned {} monsters, killed {}, promoted by pressure or rules {}",
        report.spawned, report.killed, report.promoted
    );
    println!(
        "peak bias {:.4}, session ended at {} ms",
        report.peak_bias, report.finished_at_ms
    );

    let ranks = query::ranks(&world);
    println!("{:<8} {:>8} {:>8}", "TIER", "SPAWNS", "SHARE");
    for tier in ranks.tiers() {
        let count = report.tiers[tier.index()];
        if count == 0 {
            continue;
        }
        let share = count as f64 / report.spawned.max(1) as f64;
        println!(
            "{:<8} {:>8} {:>7.2}%",
            ranks.name_of(Some(tier)),
            count,
            share * 100.0
        );
    }

    if let Some(path) = pressure_path {
        query::pressure(&world)
            .persist(path)
            .with_context(|| format!("failed to persist pressure state {}", path.display()))?;
        println!(
            "persisted {} pressure regions to {}",
            query::pressure(&world).store().len(),
            path.display()
        );
    }

    Ok(())
}

fn inspect(
    pressure_path: &Path,
    ranks_path: Option<&Path>,
    now_ms: Option<u64>,
    limit: usize,
) -> Result<()> {
    let ranks = load_ranks(ranks_path)?;
    let mut pressure = WorldPressureManager::new(ranks.pressure_settings());
    let _ = pressure
        .restore(pressure_path)
        .with_context(|| format!("failed to read pressure state {}", pressure_path.display()))?;

    let mut regions = pressure.store().sorted();
    if regions.is_empty() {
        println!("no pressure regions recorded");
        return Ok(());
    }
    regions.sort_by(|(left_key, left), (right_key, right)| {
        right
            .intensity()
            .total_cmp(&left.intensity())
            .then_with(|| left_key.cmp(right_key))
    });

    let now_ms = now_ms.unwrap_or_else(|| {
        regions
            .iter()
            .map(|(_, record)| record.last_update_ms())
            .max()
            .unwrap_or(0)
    });
    let decay_per_minute = pressure.settings().decay_per_minute();

    println!(
        "{:>6} {:>6} {:>4} {:>10} {:>10} {:>8} {:>14}  KILLS",
        "RX", "RY", "Z", "INTENSITY", "PROJECTED", "OUTBRKS", "UPDATED_MS"
    );
    for (key, record) in regions.iter().take(limit) {
        let kills: Vec<String> = ranks
            .tiers()
            .filter(|tier| record.kills_of(*tier) > 0)
            .map(|tier| format!("{}={}", ranks.name_of(Some(tier)), record.kills_of(tier)))
            .collect();
        println!(
            "{:>6} {:>6} {:>4} {:>10.4} {:>10.4} {:>8} {:>14}  {}",
            key.rx(),
            key.ry(),
            key.z(),
            record.intensity(),
            record.projected_intensity(now_ms, decay_per_minute),
            record.recent_outbreaks(),
            record.last_update_ms(),
            if kills.is_empty() {
                "-".to_owned()
            } else {
                kills.join(" ")
            }
        );
    }
    if regions.len() > limit {
        println!("... {} more regions", regions.len() - limit);
    }

    let bias = pressure.region_bias(regions[0].0, now_ms);
    let offset = ranks.bias_to_offset(bias);
    println!("strongest region bias {bias:.4} at {now_ms} ms lifts spawns by {offset} tiers");

    Ok(())
}
