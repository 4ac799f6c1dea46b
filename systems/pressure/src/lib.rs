#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Regional kill pressure with continuous-time exponential decay.
//!
//! Kills deposit intensity into the region containing the corpse. Intensity
//! decays toward zero as minutes pass, and spawn logic reads it back as a bias
//! that pushes new monsters up the rank ladder. The store can be persisted to
//! and restored from a JSON document.

pub mod persistence;
pub mod region;
pub mod store;

use std::path::Path;

use rank_pressure_core::{PressureSettings, RegionKey, Tier, WorldPosition};
use tracing::{debug, info};

pub use persistence::PressureStoreError;
pub use region::REGION_CELL_SIZE;
pub use store::{decay_factor, PressureStore, RegionPressure};

/// Owns the pressure store and the parameters that drive it.
#[derive(Clone, Debug, Default)]
pub struct WorldPressureManager {
    store: PressureStore,
    settings: PressureSettings,
}

impl WorldPressureManager {
    /// Creates an empty manager driven by `settings`.
    #[must_use]
    pub fn new(settings: PressureSettings) -> Self {
        Self {
            store: PressureStore::default(),
            settings,
        }
    }

    /// Replaces the decay and bias parameters, keeping accumulated pressure.
    pub fn configure(&mut self, settings: PressureSettings) {
        self.settings = settings;
    }

    /// Active parameters.
    #[must_use]
    pub const fn settings(&self) -> &PressureSettings {
        &self.settings
    }

    /// Region records tracked so far.
    #[must_use]
    pub const fn store(&self) -> &PressureStore {
        &self.store
    }

    /// Region that aggregates the pressure of `position`.
    #[must_use]
    pub const fn region_of(position: WorldPosition) -> RegionKey {
        region::region_of(position)
    }

    /// Credits a kill of `tier` to the region containing `position`.
    ///
    /// Existing intensity is decayed to `now_ms` before the tier's delta is
    /// added. A kill without a tier only counts toward recent outbreaks.
    pub fn register_kill(&mut self, position: WorldPosition, tier: Option<Tier>, now_ms: u64) {
        let key = region::region_of(position);
        let delta = tier.map_or(0.0, |tier| self.settings.intensity_delta(tier));
        let decay_per_minute = self.settings.decay_per_minute();

        let record = self.store.get_or_create(key);
        record.decay(now_ms, decay_per_minute);
        record.record_kill(tier, delta, now_ms);
        let intensity = record.intensity();
        self.store.mark_touched(key);

        debug!(
            rx = key.rx(),
            ry = key.ry(),
            z = key.z(),
            tier = tier.map(Tier::index),
            delta,
            intensity,
            "registered kill"
        );
    }

    /// Bias the region containing `position` would exert at `now_ms`.
    ///
    /// Intensity is projected forward without mutating the store, clamped to
    /// `[0, 1]` and scaled by the configured bias scale. Unknown regions exert
    /// no bias and are not created.
    #[must_use]
    pub fn pressure_bias(&self, position: WorldPosition, now_ms: u64) -> f64 {
        self.region_bias(region::region_of(position), now_ms)
    }

    /// Bias the region `key` would exert at `now_ms`, as [`Self::pressure_bias`].
    #[must_use]
    pub fn region_bias(&self, key: RegionKey, now_ms: u64) -> f64 {
        let Some(record) = self.store.get(key) else {
            return 0.0;
        };
        let intensity = record.projected_intensity(now_ms, self.settings.decay_per_minute());
        intensity.clamp(0.0, 1.0) * self.settings.bias_scale()
    }

    /// Decays the region containing `position` to `now_ms` in place and marks
    /// it for the next batch pass.
    ///
    /// Returns `false` when the region has never recorded a kill.
    pub fn advance_region(&mut self, position: WorldPosition, now_ms: u64) -> bool {
        let key = region::region_of(position);
        let decay_per_minute = self.settings.decay_per_minute();
        let Some(record) = self.store.get_mut(key) else {
            return false;
        };
        record.decay(now_ms, decay_per_minute);
        self.store.mark_touched(key);
        true
    }

    /// Advances the region containing `position` and then reports its bias.
    pub fn observe_pressure_bias(&mut self, position: WorldPosition, now_ms: u64) -> f64 {
        let _ = self.advance_region(position, now_ms);
        self.pressure_bias(position, now_ms)
    }

    /// Decays every region touched since the previous pass to `now_ms`.
    ///
    /// Returns the number of regions processed; the touched set is cleared.
    pub fn decay_touched(&mut self, now_ms: u64) -> usize {
        let decay_per_minute = self.settings.decay_per_minute();
        let keys = self.store.take_touched();
        for key in &keys {
            if let Some(record) = self.store.get_mut(*key) {
                record.decay(now_ms, decay_per_minute);
            }
        }
        if !keys.is_empty() {
            debug!(regions = keys.len(), now_ms, "decayed touched regions");
        }
        keys.len()
    }

    /// Writes every region to `path`, replacing its previous contents.
    pub fn persist(&self, path: &Path) -> Result<(), PressureStoreError> {
        self.store.persist(path)
    }

    /// Replaces every region with those stored at `path`.
    ///
    /// On failure the current regions are kept.
    pub fn restore(&mut self, path: &Path) -> Result<usize, PressureStoreError> {
        self.store.restore(path)
    }

    /// Restores from `path`, treating a missing file as an empty world.
    pub fn restore_or_empty(&mut self, path: &Path) -> Result<usize, PressureStoreError> {
        match self.store.restore(path) {
            Err(error) if error.is_not_found() => {
                info!(path = %path.display(), "no pressure state found, starting empty");
                self.store.replace_regions(Default::default());
                Ok(0)
            }
            result => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rank_pressure_core::TIER_CAPACITY;

    fn settings(delta: f64) -> PressureSettings {
        PressureSettings::new(0.5, 1.0, [delta; TIER_CAPACITY])
    }

    #[test]
    fn bias_saturates_at_scale() {
        let mut manager = WorldPressureManager::new(settings(0.7));
        let position = WorldPosition::new(5, 5, 3);
        manager.register_kill(position, Some(Tier::LOWEST), 1_000);
        manager.register_kill(position, Some(Tier::LOWEST), 1_000);
        assert!((manager.store().sorted()[0].1.intensity() - 1.4).abs() < 1e-12);
        assert_eq!(manager.pressure_bias(position, 1_000), 1.0);
    }

    #[test]
    fn advancing_unknown_region_creates_nothing() {
        let mut manager = WorldPressureManager::new(settings(0.3));
        assert!(!manager.advance_region(WorldPosition::new(0, 0, 0), 5_000));
        assert_eq!(manager.observe_pressure_bias(WorldPosition::new(0, 0, 0), 5_000), 0.0);
        assert!(manager.store().is_empty());
    }

    #[test]
    fn region_bias_reaches_regions_no_position_maps_to() {
        let mut manager = WorldPressureManager::new(settings(0.4));
        let far = RegionKey::new(i32::MAX, i32::MIN, 2);
        let _ = manager
            .store
            .restore_from_str(&format!(
                r#"{{ "regions": [ {{
                    "rx": {}, "ry": {}, "z": 2,
                    "intensity": 0.8,
                    "lastUpdateMs": 1000
                }} ] }}"#,
                i32::MAX,
                i32::MIN
            ))
            .expect("document restores");

        assert!((manager.region_bias(far, 1_000) - 0.8).abs() < 1e-12);
        assert!((manager.region_bias(far, 61_000) - 0.4).abs() < 1e-12);
        assert_eq!(manager.region_bias(RegionKey::new(0, 0, 2), 1_000), 0.0);
        let nearest = WorldPosition::new(i32::MAX, i32::MIN, 2);
        assert_ne!(WorldPressureManager::region_of(nearest), far);
    }

    #[test]
    fn configure_keeps_accumulated_pressure() {
        let mut manager = WorldPressureManager::new(settings(0.4));
        let position = WorldPosition::new(0, 0, 1);
        manager.register_kill(position, Some(Tier::LOWEST), 1_000);
        manager.configure(PressureSettings::new(0.5, 0.5, [0.0; TIER_CAPACITY]));
        assert_eq!(manager.store().len(), 1);
        assert!((manager.pressure_bias(position, 1_000) - 0.2).abs() < 1e-12);
    }
}
