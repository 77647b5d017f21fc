//! Session configuration: cadence periods, cost constants, capacities and
//! demand tuning. Set once at startup and read-only afterwards.

use crate::{BuildingType, EducationLevel, HealthFacility, TypeVector};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Invalid configuration, surfaced before any ticking begins.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A cadence period of zero ticks.
    #[error("{0} must be greater than zero")]
    ZeroPeriod(&'static str),
    /// A longer period is not a whole multiple of the shorter one.
    #[error("{longer} ({longer_ticks}) is not a multiple of {shorter} ({shorter_ticks})")]
    Misaligned {
        longer: &'static str,
        longer_ticks: u64,
        shorter: &'static str,
        shorter_ticks: u64,
    },
    /// A per-category table has the wrong number of entries.
    #[error("{taxonomy}.{field} has {found} entries, expected {expected}")]
    CategoryCount {
        taxonomy: &'static str,
        field: &'static str,
        expected: usize,
        found: usize,
    },
    /// A ratio or multiplier outside its allowed range.
    #[error("{0} is out of range")]
    OutOfRange(&'static str),
    /// A cost or balance that must not be negative.
    #[error("{0} must not be negative")]
    Negative(&'static str),
}

/// Ticks per cadence. Each period must divide the next one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CadenceConfig {
    pub ticks_per_day: u64,
    pub ticks_per_week: u64,
    pub ticks_per_episode: u64,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            ticks_per_day: 10,
            ticks_per_week: 70,
            ticks_per_episode: 280,
        }
    }
}

impl CadenceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let periods = [
            ("ticks_per_day", self.ticks_per_day),
            ("ticks_per_week", self.ticks_per_week),
            ("ticks_per_episode", self.ticks_per_episode),
        ];
        for (name, ticks) in periods {
            if ticks == 0 {
                return Err(ConfigError::ZeroPeriod(name));
            }
        }
        for pair in periods.windows(2) {
            let (shorter, shorter_ticks) = pair[0];
            let (longer, longer_ticks) = pair[1];
            if longer_ticks % shorter_ticks != 0 {
                return Err(ConfigError::Misaligned {
                    longer,
                    longer_ticks,
                    shorter,
                    shorter_ticks,
                });
            }
        }
        Ok(())
    }
}

/// Cost constants used by the funding ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostConfig {
    /// Cost of one size unit of zoned construction.
    pub base_zoning_cost: i64,
    /// Bulk discount applied to sizes above one.
    pub high_density_multiplier: Decimal,
    /// Signed factor applied to construction cost on demolition.
    /// Negative values refund money.
    pub demolition_multiplier: Decimal,
    /// Cost of one civic seat; also the weekly income per filled seat.
    pub base_civic_seat_cost: i64,
    /// Construction surcharge for civic buildings.
    pub base_civic_multiplier: Decimal,
    /// Weekly tax per zoning occupant.
    pub base_tax_revenue: i64,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            base_zoning_cost: 200,
            high_density_multiplier: Decimal::new(875, 3),
            demolition_multiplier: Decimal::new(-25, 2),
            base_civic_seat_cost: 10,
            base_civic_multiplier: Decimal::new(15, 1),
            base_tax_revenue: 20,
        }
    }
}

impl CostConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_zoning_cost < 0 {
            return Err(ConfigError::Negative("base_zoning_cost"));
        }
        if self.base_civic_seat_cost < 0 {
            return Err(ConfigError::Negative("base_civic_seat_cost"));
        }
        if self.base_tax_revenue < 0 {
            return Err(ConfigError::Negative("base_tax_revenue"));
        }
        if self.high_density_multiplier <= Decimal::ZERO {
            return Err(ConfigError::OutOfRange("high_density_multiplier"));
        }
        if self.base_civic_multiplier <= Decimal::ZERO {
            return Err(ConfigError::OutOfRange("base_civic_multiplier"));
        }
        Ok(())
    }
}

/// Occupant capacity per size unit of a zoned building.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoningConfig {
    pub households_per_size: u64,
    pub tenants_per_size: u64,
}

impl Default for ZoningConfig {
    fn default() -> Self {
        Self {
            households_per_size: 10,
            tenants_per_size: 6,
        }
    }
}

/// Per-category tables for one civic service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CivicConfig {
    /// Seats provided by one building of each category.
    pub seats_per_building: Vec<u64>,
    /// Seats demanded per resident for each category.
    pub seats_per_capita: Vec<Decimal>,
}

impl CivicConfig {
    pub fn education_default() -> Self {
        Self {
            seats_per_building: vec![300, 400, 500],
            seats_per_capita: vec![
                Decimal::new(10, 2),
                Decimal::new(7, 2),
                Decimal::new(6, 2),
            ],
        }
    }

    pub fn health_default() -> Self {
        Self {
            seats_per_building: vec![40, 250],
            seats_per_capita: vec![Decimal::new(2, 2), Decimal::new(1, 2)],
        }
    }

    /// Typed seats-per-building table.
    pub fn seats_for<C: BuildingType>(&self) -> Result<TypeVector<C>, ConfigError> {
        TypeVector::from_slice(&self.seats_per_building).ok_or(ConfigError::CategoryCount {
            taxonomy: C::TAXONOMY,
            field: "seats_per_building",
            expected: C::ALL.len(),
            found: self.seats_per_building.len(),
        })
    }

    /// Typed seats-per-capita table.
    pub fn per_capita_for<C: BuildingType>(&self) -> Result<TypeVector<C, Decimal>, ConfigError> {
        TypeVector::from_slice(&self.seats_per_capita).ok_or(ConfigError::CategoryCount {
            taxonomy: C::TAXONOMY,
            field: "seats_per_capita",
            expected: C::ALL.len(),
            found: self.seats_per_capita.len(),
        })
    }

    pub fn validate<C: BuildingType>(&self) -> Result<(), ConfigError> {
        self.seats_for::<C>()?;
        let per_capita = self.per_capita_for::<C>()?;
        if per_capita.iter().any(|(_, ratio)| ratio < Decimal::ZERO) {
            return Err(ConfigError::Negative("seats_per_capita"));
        }
        Ok(())
    }
}

/// Tuning for the demand evaluators and the display scaling factors.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemandConfig {
    /// Fraction of the gap to the demand target closed each day, in (0, 1].
    pub growth_rate: Decimal,
    /// Households that move in with no local jobs at all.
    pub baseline_households: u64,
    /// Households attracted by each commercial tenant.
    pub households_per_tenant: Decimal,
    /// Tenants that open with no local households at all.
    pub baseline_tenants: u64,
    /// Tenants supported by each household.
    pub tenants_per_household: Decimal,
    /// Residents per household, for population figures.
    pub household_size: u64,
    /// Jobs per commercial tenant, for employment figures.
    pub jobs_per_tenant: u64,
}

impl Default for DemandConfig {
    fn default() -> Self {
        Self {
            growth_rate: Decimal::new(25, 2),
            baseline_households: 40,
            households_per_tenant: Decimal::new(15, 1),
            baseline_tenants: 10,
            tenants_per_household: Decimal::new(4, 1),
            household_size: 3,
            jobs_per_tenant: 4,
        }
    }
}

impl DemandConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.growth_rate <= Decimal::ZERO || self.growth_rate > Decimal::ONE {
            return Err(ConfigError::OutOfRange("growth_rate"));
        }
        if self.households_per_tenant < Decimal::ZERO {
            return Err(ConfigError::Negative("households_per_tenant"));
        }
        if self.tenants_per_household < Decimal::ZERO {
            return Err(ConfigError::Negative("tenants_per_household"));
        }
        Ok(())
    }
}

/// Top-level simulation configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub initial_funds: i64,
    pub cadence: CadenceConfig,
    pub costs: CostConfig,
    pub zoning: ZoningConfig,
    pub education: CivicConfig,
    pub health: CivicConfig,
    pub demand: DemandConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            initial_funds: 10_000,
            cadence: CadenceConfig::default(),
            costs: CostConfig::default(),
            zoning: ZoningConfig::default(),
            education: CivicConfig::education_default(),
            health: CivicConfig::health_default(),
            demand: DemandConfig::default(),
        }
    }
}

impl SimConfig {
    /// Validate every section, including cross-references to taxonomies.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_funds < 0 {
            return Err(ConfigError::Negative("initial_funds"));
        }
        self.cadence.validate()?;
        self.costs.validate()?;
        self.education.validate::<EducationLevel>()?;
        self.health.validate::<HealthFacility>()?;
        self.demand.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        SimConfig::default().validate().unwrap();
    }

    #[test]
    fn zero_period_is_rejected() {
        let cadence = CadenceConfig {
            ticks_per_day: 0,
            ..CadenceConfig::default()
        };
        assert_eq!(
            cadence.validate(),
            Err(ConfigError::ZeroPeriod("ticks_per_day"))
        );
    }

    #[test]
    fn misaligned_week_is_rejected() {
        let cadence = CadenceConfig {
            ticks_per_day: 10,
            ticks_per_week: 75,
            ticks_per_episode: 300,
        };
        assert!(matches!(
            cadence.validate(),
            Err(ConfigError::Misaligned {
                longer: "ticks_per_week",
                ..
            })
        ));
    }

    #[test]
    fn civic_table_length_must_match_taxonomy() {
        let mut cfg = SimConfig::default();
        cfg.health.seats_per_building.push(10);
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::CategoryCount {
                taxonomy: "health",
                field: "seats_per_building",
                expected: 2,
                found: 3,
            })
        );
    }

    #[test]
    fn growth_rate_bounds() {
        let mut cfg = SimConfig::default();
        cfg.demand.growth_rate = Decimal::new(11, 1);
        assert_eq!(cfg.validate(), Err(ConfigError::OutOfRange("growth_rate")));
        cfg.demand.growth_rate = Decimal::ONE;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn negative_funds_rejected() {
        let cfg = SimConfig {
            initial_funds: -1,
            ..SimConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::Negative("initial_funds")));
    }

    #[test]
    fn json_roundtrip_and_partial_sections() {
        let cfg = SimConfig::default();
        let s = serde_json::to_string(&cfg).unwrap();
        let back: SimConfig = serde_json::from_str(&s).unwrap();
        assert_eq!(back, cfg);

        let partial: SimConfig =
            serde_json::from_str(r#"{"initial_funds": 500, "cadence": {"ticks_per_day": 5}}"#)
                .unwrap();
        assert_eq!(partial.initial_funds, 500);
        assert_eq!(partial.cadence.ticks_per_day, 5);
        assert_eq!(partial.cadence.ticks_per_week, 70);
        assert_eq!(partial.costs, CostConfig::default());
    }
}
