#![deny(warnings)]

//! Core domain models and invariants for the city economy simulation.
//!
//! This crate defines the building taxonomies, typed per-building vectors,
//! validated configuration, the tick clock and the occupancy simulators.
//! Everything here is plain synchronous bookkeeping; scheduling lives in
//! `sim-runtime` and money in `sim-econ`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use thiserror::Error;

pub mod civic;
pub mod config;
pub mod time;
pub mod zoning;

pub use civic::{CivicSimulator, CivicSnapshot};
pub use config::{
    CadenceConfig, CivicConfig, ConfigError, CostConfig, DemandConfig, SimConfig, ZoningConfig,
};
pub use time::{Cadence, Timekeeper};
pub use zoning::{ZoneUse, ZoningSimulator, ZoningSnapshot};

/// A closed building taxonomy whose variants index a [`TypeVector`].
///
/// `ALL` must list every variant in `index` order.
pub trait BuildingType: Copy + Eq + fmt::Debug + Send + Sync + 'static {
    /// Taxonomy name used in errors and logs.
    const TAXONOMY: &'static str;
    /// Every variant, ordered by index.
    const ALL: &'static [Self];

    /// Position of this variant in vectors of this taxonomy.
    fn index(self) -> usize;

    /// Human-readable label.
    fn label(self) -> &'static str;

    /// Convert a raw index (e.g. from a UI widget) into a variant.
    fn from_index(index: usize) -> Result<Self, SimError> {
        Self::ALL.get(index).copied().ok_or(SimError::UnknownType {
            taxonomy: Self::TAXONOMY,
            index,
        })
    }
}

/// Size class of a zoned building. The discriminant is the numeric size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ZoneSize {
    /// Single-unit lot.
    Small = 1,
    /// Mid-rise, two size units.
    Medium = 2,
    /// High-rise, three size units.
    Large = 3,
}

impl ZoneSize {
    /// Numeric size used for capacity and pricing.
    pub fn units(self) -> u64 {
        self as u64
    }
}

impl BuildingType for ZoneSize {
    const TAXONOMY: &'static str = "zone size";
    const ALL: &'static [Self] = &[ZoneSize::Small, ZoneSize::Medium, ZoneSize::Large];

    fn index(self) -> usize {
        self as usize - 1
    }

    fn label(self) -> &'static str {
        match self {
            ZoneSize::Small => "small",
            ZoneSize::Medium => "medium",
            ZoneSize::Large => "large",
        }
    }
}

/// Education building categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EducationLevel {
    Elementary,
    Middle,
    High,
}

impl BuildingType for EducationLevel {
    const TAXONOMY: &'static str = "education";
    const ALL: &'static [Self] = &[
        EducationLevel::Elementary,
        EducationLevel::Middle,
        EducationLevel::High,
    ];

    fn index(self) -> usize {
        self as usize
    }

    fn label(self) -> &'static str {
        match self {
            EducationLevel::Elementary => "elementary school",
            EducationLevel::Middle => "middle school",
            EducationLevel::High => "high school",
        }
    }
}

/// Health building categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HealthFacility {
    Clinic,
    Hospital,
}

impl BuildingType for HealthFacility {
    const TAXONOMY: &'static str = "health";
    const ALL: &'static [Self] = &[HealthFacility::Clinic, HealthFacility::Hospital];

    fn index(self) -> usize {
        self as usize
    }

    fn label(self) -> &'static str {
        match self {
            HealthFacility::Clinic => "clinic",
            HealthFacility::Hospital => "hospital",
        }
    }
}

/// Fixed-length vector with one slot per variant of a [`BuildingType`].
///
/// Counters use the default `u64`; growth deltas use `i64`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeVector<T, V = u64> {
    values: Vec<V>,
    _taxonomy: PhantomData<fn() -> T>,
}

impl<T: BuildingType, V: Copy + Default> TypeVector<T, V> {
    /// All slots set to `V::default()`.
    pub fn new() -> Self {
        Self::from_fn(|_| V::default())
    }

    /// Build a vector by evaluating `f` for each variant.
    pub fn from_fn(mut f: impl FnMut(T) -> V) -> Self {
        Self {
            values: T::ALL.iter().map(|&t| f(t)).collect(),
            _taxonomy: PhantomData,
        }
    }

    /// Build from raw values; `None` unless the length matches the taxonomy.
    pub fn from_slice(values: &[V]) -> Option<Self> {
        (values.len() == T::ALL.len()).then(|| Self {
            values: values.to_vec(),
            _taxonomy: PhantomData,
        })
    }

    pub fn get(&self, t: T) -> V {
        self.values[t.index()]
    }

    pub fn set(&mut self, t: T, value: V) {
        self.values[t.index()] = value;
    }

    /// Iterate `(variant, value)` pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (T, V)> + '_ {
        T::ALL.iter().copied().zip(self.values.iter().copied())
    }

    pub fn as_slice(&self) -> &[V] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<T: BuildingType> TypeVector<T, u64> {
    /// Saturating sum of all slots.
    pub fn total(&self) -> u64 {
        self.values.iter().fold(0u64, |acc, v| acc.saturating_add(*v))
    }
}

impl<T: BuildingType, V: Copy + Default> Default for TypeVector<T, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Rejected state commands. State is unchanged whenever one is returned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SimError {
    /// Applying the delta would make a building count negative or overflow.
    #[error("{taxonomy} {label}: cannot apply {delta} to {current} buildings")]
    BuildingCountOutOfRange {
        taxonomy: &'static str,
        label: &'static str,
        current: u64,
        delta: i64,
    },
    /// Raw index does not name a variant of the taxonomy.
    #[error("unknown {taxonomy} type index {index}")]
    UnknownType { taxonomy: &'static str, index: usize },
}

/// Apply a signed building delta, rejecting negative or overflowing results.
pub(crate) fn checked_building_count<T: BuildingType>(
    current: u64,
    delta: i64,
    t: T,
) -> Result<u64, SimError> {
    current
        .checked_add_signed(delta)
        .ok_or(SimError::BuildingCountOutOfRange {
            taxonomy: T::TAXONOMY,
            label: t.label(),
            current,
            delta,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_size_indices_follow_all() {
        for (i, size) in ZoneSize::ALL.iter().enumerate() {
            assert_eq!(size.index(), i);
            assert_eq!(ZoneSize::from_index(i).unwrap(), *size);
        }
        assert_eq!(ZoneSize::Large.units(), 3);
    }

    #[test]
    fn from_index_rejects_out_of_range() {
        assert_eq!(
            HealthFacility::from_index(2),
            Err(SimError::UnknownType {
                taxonomy: "health",
                index: 2
            })
        );
        assert!(EducationLevel::from_index(2).is_ok());
    }

    #[test]
    fn type_vector_len_is_fixed_by_taxonomy() {
        let v: TypeVector<EducationLevel> = TypeVector::new();
        assert_eq!(v.len(), 3);
        assert!(TypeVector::<HealthFacility>::from_slice(&[1, 2, 3]).is_none());
        let h = TypeVector::<HealthFacility>::from_slice(&[4, 5]).unwrap();
        assert_eq!(h.get(HealthFacility::Hospital), 5);
        assert_eq!(h.total(), 9);
    }

    #[test]
    fn building_count_rejects_negative_result() {
        assert_eq!(checked_building_count(2, -2, ZoneSize::Small), Ok(0));
        assert!(checked_building_count(2, -3, ZoneSize::Small).is_err());
        assert!(checked_building_count(u64::MAX, 1, ZoneSize::Small).is_err());
    }
}
