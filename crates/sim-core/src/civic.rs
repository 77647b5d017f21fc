//! Civic services: building counts and filled seats per service category.

use crate::{checked_building_count, BuildingType, SimError, TypeVector};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Seat-based civic service over a category taxonomy `C`.
///
/// `seat_max[c]` is the physical capacity `buildings[c] * seats_per_building[c]`,
/// capped by the last generated demand target when one exists.
#[derive(Clone, Debug)]
pub struct CivicSimulator<C: BuildingType> {
    seats_per_building: TypeVector<C>,
    buildings: TypeVector<C>,
    seats: TypeVector<C>,
    seat_max: TypeVector<C>,
    targets: Option<TypeVector<C>>,
}

/// Immutable copy of a civic simulator for display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CivicSnapshot {
    pub service: String,
    pub categories: Vec<String>,
    pub buildings: Vec<u64>,
    pub seats: Vec<u64>,
    pub seat_max: Vec<u64>,
    pub seat_count: u64,
}

impl<C: BuildingType> CivicSimulator<C> {
    pub fn new(seats_per_building: TypeVector<C>) -> Self {
        Self {
            seats_per_building,
            buildings: TypeVector::new(),
            seats: TypeVector::new(),
            seat_max: TypeVector::new(),
            targets: None,
        }
    }

    pub fn seats_per_building(&self, category: C) -> u64 {
        self.seats_per_building.get(category)
    }

    /// Seats the buildings of `category` could hold, ignoring targets.
    pub fn physical_capacity(&self, category: C) -> u64 {
        self.buildings
            .get(category)
            .saturating_mul(self.seats_per_building.get(category))
    }

    /// Building count that `increment_buildings(delta, category)` would produce.
    pub fn check_buildings(&self, delta: i64, category: C) -> Result<u64, SimError> {
        checked_building_count(self.buildings.get(category), delta, category)
    }

    /// Change the building count of one category and re-derive its seat ceiling.
    pub fn increment_buildings(&mut self, delta: i64, category: C) -> Result<(), SimError> {
        let count = self.check_buildings(delta, category)?;
        self.buildings.set(category, count);
        self.refresh(category);
        Ok(())
    }

    /// Replace the demand targets and re-derive every seat ceiling.
    pub fn generate(&mut self, targets: &TypeVector<C>) {
        self.targets = Some(targets.clone());
        for category in C::ALL.iter().copied() {
            self.refresh(category);
        }
    }

    /// Add a delta per category, saturating into `[0, seat_max]`.
    pub fn adjust_seats(&mut self, delta: &TypeVector<C, i64>) {
        for (category, d) in delta.iter() {
            self.increment_seats(d, category);
        }
    }

    /// Add a delta to one category, saturating into `[0, seat_max]`.
    pub fn increment_seats(&mut self, delta: i64, category: C) {
        let next = self
            .seats
            .get(category)
            .saturating_add_signed(delta)
            .min(self.seat_max.get(category));
        self.seats.set(category, next);
    }

    fn refresh(&mut self, category: C) {
        let physical = self.physical_capacity(category);
        let max = match &self.targets {
            Some(t) => physical.min(t.get(category)),
            None => physical,
        };
        self.seat_max.set(category, max);
        let filled = self.seats.get(category);
        if filled > max {
            debug!(
                service = C::TAXONOMY,
                category = category.label(),
                dropped = filled - max,
                "seat ceiling shrank below filled seats"
            );
            self.seats.set(category, max);
        }
    }

    pub fn buildings(&self) -> &TypeVector<C> {
        &self.buildings
    }

    pub fn seats(&self) -> &TypeVector<C> {
        &self.seats
    }

    pub fn seat_max(&self) -> &TypeVector<C> {
        &self.seat_max
    }

    /// Last generated targets, if any.
    pub fn targets(&self) -> Option<&TypeVector<C>> {
        self.targets.as_ref()
    }

    /// Total filled seats across categories.
    pub fn seat_count(&self) -> u64 {
        self.seats.total()
    }

    pub fn snapshot(&self) -> CivicSnapshot {
        CivicSnapshot {
            service: C::TAXONOMY.to_string(),
            categories: C::ALL.iter().map(|c| c.label().to_string()).collect(),
            buildings: self.buildings.as_slice().to_vec(),
            seats: self.seats.as_slice().to_vec(),
            seat_max: self.seat_max.as_slice().to_vec(),
            seat_count: self.seat_count(),
        }
    }
}
