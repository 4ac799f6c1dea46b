//! Region pressure records and the continuous-time decay model.

use std::collections::{HashMap, HashSet};

use rank_pressure_core::{RegionKey, Tier, TIER_CAPACITY};

/// Milliseconds in one decay period.
pub const MILLIS_PER_MINUTE: f64 = 60_000.0;

/// Fraction of intensity retained after `elapsed_ms` at `decay_per_minute`.
///
/// Zero elapsed time always yields `1.0`, which also settles `0^0`.
#[must_use]
pub fn decay_factor(elapsed_ms: u64, decay_per_minute: f64) -> f64 {
    if elapsed_ms == 0 || decay_per_minute.is_nan() {
        return 1.0;
    }

    let minutes = elapsed_ms as f64 / MILLIS_PER_MINUTE;
    let factor = decay_per_minute.clamp(0.0, 1.0).powf(minutes);
    if factor.is_finite() {
        factor.clamp(0.0, 1.0)
    } else {
        1.0
    }
}

/// Decaying pressure accumulated by a single region.
#[derive(Clone, Debug, PartialEq)]
pub struct RegionPressure {
    kills: [u32; TIER_CAPACITY],
    intensity: f64,
    last_update_ms: u64,
    recent_outbreaks: u32,
}

impl Default for RegionPressure {
    fn default() -> Self {
        Self {
            kills: [0; TIER_CAPACITY],
            intensity: 0.0,
            last_update_ms: 0,
            recent_outbreaks: 0,
        }
    }
}

impl RegionPressure {
    /// Rebuilds a record from persisted values.
    #[must_use]
    pub fn from_parts(
        kills: [u32; TIER_CAPACITY],
        intensity: f64,
        last_update_ms: u64,
        recent_outbreaks: u32,
    ) -> Self {
        Self {
            kills,
            intensity,
            last_update_ms,
            recent_outbreaks,
        }
    }

    /// Kill counters indexed by tier.
    #[must_use]
    pub const fn kills(&self) -> &[u32; TIER_CAPACITY] {
        &self.kills
    }

    /// Kills recorded for `tier`.
    #[must_use]
    pub const fn kills_of(&self, tier: Tier) -> u32 {
        self.kills[tier.index()]
    }

    /// Stored intensity as of [`RegionPressure::last_update_ms`].
    #[must_use]
    pub const fn intensity(&self) -> f64 {
        self.intensity
    }

    /// Timestamp of the last update, `0` while unset.
    #[must_use]
    pub const fn last_update_ms(&self) -> u64 {
        self.last_update_ms
    }

    /// Number of kills registered in the region, regardless of tier.
    #[must_use]
    pub const fn recent_outbreaks(&self) -> u32 {
        self.recent_outbreaks
    }

    /// Advances the record to `now_ms`, decaying its intensity.
    ///
    /// The first observation only establishes a baseline, and timestamps at or
    /// before the last update are ignored so decay never runs backwards.
    pub fn decay(&mut self, now_ms: u64, decay_per_minute: f64) {
        if self.last_update_ms == 0 {
            self.last_update_ms = now_ms;
            return;
        }
        if now_ms <= self.last_update_ms {
            return;
        }

        let elapsed = now_ms - self.last_update_ms;
        self.intensity *= decay_factor(elapsed, decay_per_minute);
        self.last_update_ms = now_ms;
    }

    /// Intensity the record would hold at `now_ms`, without mutating it.
    #[must_use]
    pub fn projected_intensity(&self, now_ms: u64, decay_per_minute: f64) -> f64 {
        if self.last_update_ms == 0 || now_ms <= self.last_update_ms {
            return self.intensity;
        }
        self.intensity * decay_factor(now_ms - self.last_update_ms, decay_per_minute)
    }

    pub(crate) fn record_kill(&mut self, tier: Option<Tier>, delta: f64, now_ms: u64) {
        if let Some(tier) = tier {
            let counter = &mut self.kills[tier.index()];
            *counter = counter.saturating_add(1);
            self.intensity += delta.max(0.0);
        }
        self.recent_outbreaks = self.recent_outbreaks.saturating_add(1);
        self.last_update_ms = now_ms;
    }
}

/// Region records keyed by [`RegionKey`], plus the set touched since the last pass.
///
/// Records are created lazily and never evicted.
#[derive(Clone, Debug, Default)]
pub struct PressureStore {
    regions: HashMap<RegionKey, RegionPressure>,
    touched: HashSet<RegionKey>,
}

impl PressureStore {
    /// Record for `key`, if one exists.
    #[must_use]
    pub fn get(&self, key: RegionKey) -> Option<&RegionPressure> {
        self.regions.get(&key)
    }

    /// Number of tracked regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Reports whether no region is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Records in ascending key order.
    #[must_use]
    pub fn sorted(&self) -> Vec<(RegionKey, &RegionPressure)> {
        let mut regions: Vec<(RegionKey, &RegionPressure)> =
            self.regions.iter().map(|(key, record)| (*key, record)).collect();
        regions.sort_by_key(|(key, _)| *key);
        regions
    }

    /// Reports whether `key` awaits the next batch decay pass.
    #[must_use]
    pub fn is_touched(&self, key: RegionKey) -> bool {
        self.touched.contains(&key)
    }

    /// Number of regions awaiting the next batch decay pass.
    #[must_use]
    pub fn touched_len(&self) -> usize {
        self.touched.len()
    }

    pub(crate) fn get_mut(&mut self, key: RegionKey) -> Option<&mut RegionPressure> {
        self.regions.get_mut(&key)
    }

    pub(crate) fn get_or_create(&mut self, key: RegionKey) -> &mut RegionPressure {
        self.regions.entry(key).or_default()
    }

    pub(crate) fn mark_touched(&mut self, key: RegionKey) {
        let _ = self.touched.insert(key);
    }

    pub(crate) fn take_touched(&mut self) -> Vec<RegionKey> {
        let mut keys: Vec<RegionKey> = self.touched.drain().collect();
        keys.sort_unstable();
        keys
    }

    pub(crate) fn replace_regions(&mut self, regions: HashMap<RegionKey, RegionPressure>) {
        self.regions = regions;
        self.touched.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(intensity: f64, last_update_ms: u64) -> RegionPressure {
        RegionPressure::from_parts([0; TIER_CAPACITY], intensity, last_update_ms, 0)
    }

    #[test]
    fn first_observation_sets_baseline_only() {
        let mut pressure = record(0.8, 0);
        pressure.decay(5_000, 0.5);
        assert_eq!(pressure.intensity(), 0.8);
        assert_eq!(pressure.last_update_ms(), 5_000);
    }

    #[test]
    fn decay_ignores_stale_and_repeated_timestamps() {
        let mut pressure = record(0.6, 10_000);
        pressure.decay(10_000, 0.5);
        pressure.decay(4_000, 0.5);
        assert_eq!(pressure.intensity(), 0.6);
        assert_eq!(pressure.last_update_ms(), 10_000);
    }

    #[test]
    fn decay_is_idempotent_for_identical_timestamps() {
        let mut pressure = record(0.6, 10_000);
        pressure.decay(70_000, 0.5);
        let once = pressure.clone();
        pressure.decay(70_000, 0.5);
        assert_eq!(pressure, once);
        assert!((pressure.intensity() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn decay_uses_fractional_minutes() {
        let mut pressure = record(1.0, 1);
        pressure.decay(30_001, 0.25);
        assert!((pressure.intensity() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn zero_rate_zero_elapsed_keeps_intensity() {
        assert_eq!(decay_factor(0, 0.0), 1.0);
        assert_eq!(decay_factor(1, 0.0), 0.0);
    }

    #[test]
    fn extreme_elapsed_durations_stay_finite() {
        for rate in [0.0, 1e-300, 0.5, 0.99, 1.0] {
            let factor = decay_factor(u64::MAX, rate);
            assert!(factor.is_finite(), "rate {rate} produced {factor}");
            assert!((0.0..=1.0).contains(&factor));
        }
        let mut pressure = record(1_000.0, 1);
        pressure.decay(u64::MAX, 0.99);
        assert_eq!(pressure.intensity(), 0.0);
        assert_eq!(decay_factor(u64::MAX, 1.0), 1.0);
    }

    #[test]
    fn projection_matches_in_place_decay() {
        let mut pressure = record(0.9, 2_000);
        let projected = pressure.projected_intensity(182_000, 0.9);
        pressure.decay(182_000, 0.9);
        assert_eq!(projected, pressure.intensity());
        assert_eq!(record(0.4, 0).projected_intensity(99_000, 0.1), 0.4);
    }

    #[test]
    fn kills_without_tier_only_count_outbreaks() {
        let mut pressure = RegionPressure::default();
        pressure.record_kill(None, 5.0, 1_000);
        assert_eq!(pressure.intensity(), 0.0);
        assert_eq!(pressure.recent_outbreaks(), 1);
        assert_eq!(pressure.kills().iter().sum::<u32>(), 0);
        assert_eq!(pressure.last_update_ms(), 1_000);
    }

    #[test]
    fn negative_deltas_never_reduce_intensity() {
        let mut pressure = record(0.2, 1_000);
        pressure.record_kill(Some(Tier::LOWEST), -1.0, 1_000);
        assert_eq!(pressure.intensity(), 0.2);
        assert_eq!(pressure.kills_of(Tier::LOWEST), 1);
    }

    #[test]
    fn taking_touched_clears_the_set() {
        let mut store = PressureStore::default();
        let key = RegionKey::new(1, 2, 3);
        let _ = store.get_or_create(key);
        store.mark_touched(key);
        store.mark_touched(key);
        assert_eq!(store.touched_len(), 1);
        assert_eq!(store.take_touched(), vec![key]);
        assert_eq!(store.touched_len(), 0);
        assert_eq!(store.len(), 1);
    }
}
