//! Spatial quantization of world positions into pressure regions.

use rank_pressure_core::{RegionKey, WorldPosition};

/// Edge length, in tiles, of the square cell aggregated into one region.
pub const REGION_CELL_SIZE: i32 = 64;

/// Maps a world position to the region that aggregates its pressure.
///
/// Horizontal coordinates are floor-divided by [`REGION_CELL_SIZE`] so negative
/// coordinates land in their own cells; the floor is kept as-is.
#[must_use]
pub const fn region_of(position: WorldPosition) -> RegionKey {
    RegionKey::new(
        position.x().div_euclid(REGION_CELL_SIZE),
        position.y().div_euclid(REGION_CELL_SIZE),
        position.z(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_within_a_cell_share_a_region() {
        let origin = region_of(WorldPosition::new(0, 0, 7));
        assert_eq!(origin, RegionKey::new(0, 0, 7));
        assert_eq!(region_of(WorldPosition::new(63, 63, 7)), origin);
        assert_eq!(
            region_of(WorldPosition::new(64, 0, 7)),
            RegionKey::new(1, 0, 7)
        );
    }

    #[test]
    fn floors_are_never_merged() {
        assert_ne!(
            region_of(WorldPosition::new(10, 10, 7)),
            region_of(WorldPosition::new(10, 10, 8))
        );
    }

    #[test]
    fn negative_coordinates_round_toward_negative_infinity() {
        assert_eq!(
            region_of(WorldPosition::new(-1, -64, 0)),
            RegionKey::new(-1, -1, 0)
        );
        assert_eq!(
            region_of(WorldPosition::new(-65, 0, 0)),
            RegionKey::new(-2, 0, 0)
        );
    }
}
