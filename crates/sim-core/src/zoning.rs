//! Zoned land use: building counts and occupancy per size class.

use crate::{checked_building_count, BuildingType, SimError, TypeVector, ZoneSize};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Land-use category of a zoning simulator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ZoneUse {
    /// Occupants are households.
    Residential,
    /// Occupants are business tenants.
    Commercial,
}

/// Per-size building counts with capacity-bounded occupants.
///
/// Invariant: `occupants[s] <= occupant_max[s]` for every size, where
/// `occupant_max[s] = buildings[s] * s.units() * capacity_per_size`.
#[derive(Clone, Debug)]
pub struct ZoningSimulator {
    zone_use: ZoneUse,
    capacity_per_size: u64,
    buildings: TypeVector<ZoneSize>,
    occupants: TypeVector<ZoneSize>,
    occupant_max: TypeVector<ZoneSize>,
}

/// Immutable copy of a zoning simulator for display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoningSnapshot {
    pub zone_use: ZoneUse,
    pub buildings: Vec<u64>,
    pub occupants: Vec<u64>,
    pub occupant_max: Vec<u64>,
    pub occupant_count: u64,
    pub capacity: u64,
}

impl ZoningSimulator {
    pub fn new(zone_use: ZoneUse, capacity_per_size: u64) -> Self {
        Self {
            zone_use,
            capacity_per_size,
            buildings: TypeVector::new(),
            occupants: TypeVector::new(),
            occupant_max: TypeVector::new(),
        }
    }

    pub fn zone_use(&self) -> ZoneUse {
        self.zone_use
    }

    /// Building count that `increment_buildings(delta, size)` would produce.
    pub fn check_buildings(&self, delta: i64, size: ZoneSize) -> Result<u64, SimError> {
        checked_building_count(self.buildings.get(size), delta, size)
    }

    /// Change the building count of one size class and re-derive capacity.
    /// Occupants above the new capacity are dropped.
    pub fn increment_buildings(&mut self, delta: i64, size: ZoneSize) -> Result<(), SimError> {
        let count = self.check_buildings(delta, size)?;
        let max = count
            .saturating_mul(size.units())
            .saturating_mul(self.capacity_per_size);
        self.buildings.set(size, count);
        self.occupant_max.set(size, max);
        if self.occupants.get(size) > max {
            debug!(
                zone = ?self.zone_use,
                size = size.label(),
                evicted = self.occupants.get(size) - max,
                "capacity shrank below occupancy"
            );
            self.occupants.set(size, max);
        }
        Ok(())
    }

    /// Add a delta per size, saturating into `[0, occupant_max]`.
    pub fn increment_occupants(&mut self, delta: &TypeVector<ZoneSize, i64>) {
        for (size, d) in delta.iter() {
            let next = self
                .occupants
                .get(size)
                .saturating_add_signed(d)
                .min(self.occupant_max.get(size));
            self.occupants.set(size, next);
        }
    }

    /// Split a scalar growth increment across size classes, smallest first.
    ///
    /// Positive increments only go where free capacity exists; negative ones
    /// only drain occupied slots, so applying the result never saturates.
    pub fn spread(&self, increment: i64) -> TypeVector<ZoneSize, i64> {
        let mut out = TypeVector::new();
        let mut left = increment.unsigned_abs();
        for size in ZoneSize::ALL.iter().copied() {
            if left == 0 {
                break;
            }
            let room = if increment > 0 {
                self.occupant_max.get(size) - self.occupants.get(size)
            } else {
                self.occupants.get(size)
            };
            let take = room.min(left);
            left -= take;
            let take = i64::try_from(take).unwrap_or(i64::MAX);
            out.set(size, if increment > 0 { take } else { -take });
        }
        out
    }

    pub fn buildings(&self) -> &TypeVector<ZoneSize> {
        &self.buildings
    }

    pub fn occupants(&self) -> &TypeVector<ZoneSize> {
        &self.occupants
    }

    pub fn occupant_max(&self) -> &TypeVector<ZoneSize> {
        &self.occupant_max
    }

    /// Total occupants across all sizes.
    pub fn occupant_count(&self) -> u64 {
        self.occupants.total()
    }

    /// Total capacity across all sizes.
    pub fn capacity(&self) -> u64 {
        self.occupant_max.total()
    }

    pub fn snapshot(&self) -> ZoningSnapshot {
        ZoningSnapshot {
            zone_use: self.zone_use,
            buildings: self.buildings.as_slice().to_vec(),
            occupants: self.occupants.as_slice().to_vec(),
            occupant_max: self.occupant_max.as_slice().to_vec(),
            occupant_count: self.occupant_count(),
            capacity: self.capacity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn deltas(values: [i64; 3]) -> TypeVector<ZoneSize, i64> {
        TypeVector::from_slice(&values).unwrap()
    }

    fn bounded(sim: &ZoningSimulator) -> bool {
        ZoneSize::ALL
            .iter()
            .all(|s| sim.occupants().get(*s) <= sim.occupant_max().get(*s))
    }

    #[test]
    fn capacity_follows_buildings_and_size() {
        let mut sim = ZoningSimulator::new(ZoneUse::Residential, 10);
        sim.increment_buildings(2, ZoneSize::Medium).unwrap();
        sim.increment_buildings(1, ZoneSize::Large).unwrap();
        assert_eq!(sim.occupant_max().as_slice(), &[0, 40, 30]);
        assert_eq!(sim.capacity(), 70);
    }

    #[test]
    fn occupants_saturate_at_capacity_and_zero() {
        let mut sim = ZoningSimulator::new(ZoneUse::Commercial, 5);
        sim.increment_buildings(1, ZoneSize::Small).unwrap();
        sim.increment_occupants(&deltas([100, 7, 0]));
        assert_eq!(sim.occupants().as_slice(), &[5, 0, 0]);
        sim.increment_occupants(&deltas([-50, -1, 0]));
        assert_eq!(sim.occupant_count(), 0);
    }

    #[test]
    fn demolition_clamps_occupants() {
        let mut sim = ZoningSimulator::new(ZoneUse::Residential, 10);
        sim.increment_buildings(3, ZoneSize::Small).unwrap();
        sim.increment_occupants(&deltas([30, 0, 0]));
        sim.increment_buildings(-2, ZoneSize::Small).unwrap();
        assert_eq!(sim.occupant_max().get(ZoneSize::Small), 10);
        assert_eq!(sim.occupants().get(ZoneSize::Small), 10);
    }

    #[test]
    fn negative_building_count_rejected_without_change() {
        let mut sim = ZoningSimulator::new(ZoneUse::Residential, 10);
        sim.increment_buildings(1, ZoneSize::Large).unwrap();
        let before = sim.snapshot();
        let err = sim.increment_buildings(-2, ZoneSize::Large).unwrap_err();
        assert!(matches!(err, SimError::BuildingCountOutOfRange { current: 1, delta: -2, .. }));
        assert_eq!(sim.snapshot(), before);
    }

    #[test]
    fn zero_deltas_are_idempotent() {
        let mut sim = ZoningSimulator::new(ZoneUse::Residential, 10);
        sim.increment_buildings(2, ZoneSize::Medium).unwrap();
        sim.increment_occupants(&deltas([0, 13, 0]));
        let before = sim.snapshot();
        sim.increment_buildings(0, ZoneSize::Medium).unwrap();
        sim.increment_occupants(&TypeVector::new());
        assert_eq!(sim.snapshot(), before);
    }

    #[test]
    fn spread_fills_free_capacity_in_order() {
        let mut sim = ZoningSimulator::new(ZoneUse::Residential, 10);
        sim.increment_buildings(1, ZoneSize::Small).unwrap();
        sim.increment_buildings(1, ZoneSize::Medium).unwrap();
        sim.increment_occupants(&deltas([4, 0, 0]));
        assert_eq!(sim.spread(10).as_slice(), &[6, 4, 0]);
        assert_eq!(sim.spread(100).as_slice(), &[6, 20, 0]);
        assert_eq!(sim.spread(-3).as_slice(), &[-3, 0, 0]);
        assert_eq!(sim.spread(0).as_slice(), &[0, 0, 0]);
    }

    proptest! {
        #[test]
        fn occupancy_stays_bounded(ops in proptest::collection::vec(
            (0usize..3, -3i64..4, -40i64..60, any::<bool>()), 1..64)) {
            let mut sim = ZoningSimulator::new(ZoneUse::Residential, 8);
            for (idx, b, o, use_spread) in ops {
                let size = ZoneSize::from_index(idx).unwrap();
                let _ = sim.increment_buildings(b, size);
                prop_assert!(bounded(&sim));
                let delta = if use_spread {
                    sim.spread(o)
                } else {
                    let mut d = TypeVector::new();
                    d.set(size, o);
                    d
                };
                sim.increment_occupants(&delta);
                prop_assert!(bounded(&sim));
            }
        }
    }
}
