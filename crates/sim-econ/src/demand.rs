//! Demand evaluators.
//!
//! Evaluators are pure functions of a market snapshot: given the same input
//! they always return the same targets and increments, and they keep no state
//! between calls beyond their immutable tuning. Inputs are owned values so
//! they can be built once and evaluated anywhere.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sim_core::{
    BuildingType, CivicConfig, CivicSimulator, ConfigError, DemandConfig, TypeVector,
    ZoningSimulator,
};

/// A demand policy over some market snapshot `S`.
pub trait DemandEvaluator<S: ?Sized> {
    type Output;

    fn evaluate(&self, state: &S) -> Self::Output;
}

/// Boxed zoning policy, as stored by the scheduler.
pub type ZoningPolicy = Box<dyn DemandEvaluator<ZoningMarket, Output = Demand> + Send + Sync>;

/// Boxed civic policy for taxonomy `C`.
pub type CivicPolicy<C> =
    Box<dyn DemandEvaluator<CivicMarket<C>, Output = CivicOutlook<C>> + Send + Sync>;

/// Filled and available units of one zoning simulator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupancy {
    pub current: u64,
    pub capacity: u64,
}

impl Occupancy {
    pub fn of(sim: &ZoningSimulator) -> Self {
        Self {
            current: sim.occupant_count(),
            capacity: sim.capacity(),
        }
    }
}

/// Input of the zoning evaluators.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ZoningMarket {
    /// Households against housing capacity.
    pub housing: Occupancy,
    /// Tenants against commercial capacity.
    pub commerce: Occupancy,
}

impl ZoningMarket {
    pub fn new(residential: &ZoningSimulator, commercial: &ZoningSimulator) -> Self {
        Self {
            housing: Occupancy::of(residential),
            commerce: Occupancy::of(commercial),
        }
    }
}

/// Evaluator result for one zoning simulator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Demand {
    /// Occupant change proposed for this day; negative when over target.
    pub increment: i64,
    /// Ceiling the simulator grows toward.
    pub max: u64,
}

impl Demand {
    /// Unmet demand, `max - current` (negative when oversupplied).
    pub fn remaining(&self, current: u64) -> i64 {
        signed_gap(current, self.max)
    }
}

fn signed_gap(current: u64, target: u64) -> i64 {
    let gap = i128::from(target) - i128::from(current);
    gap.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}

/// Round `count × ratio` to a whole count, half away from zero.
fn scale_count(count: u64, ratio: Decimal) -> u64 {
    Decimal::from(count)
        .checked_mul(ratio)
        .map(|d| d.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|d| d.to_u64())
        .unwrap_or(u64::MAX)
}

/// Closes a fixed fraction of the gap between current and target each step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GrowthCurve {
    rate: Decimal,
}

impl GrowthCurve {
    /// `rate` must lie in (0, 1].
    pub fn new(rate: Decimal) -> Result<Self, ConfigError> {
        if rate <= Decimal::ZERO || rate > Decimal::ONE {
            return Err(ConfigError::OutOfRange("growth_rate"));
        }
        Ok(Self { rate })
    }

    /// Signed step toward `target`, rounded away from zero and at least one
    /// unit while any gap remains.
    pub fn step(&self, current: u64, target: u64) -> i64 {
        let gap = signed_gap(current, target);
        if gap == 0 {
            return 0;
        }
        let step = Decimal::from(gap)
            .checked_mul(self.rate)
            .map(|d| d.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
            .and_then(|d| d.to_i64())
            .unwrap_or(gap);
        if step == 0 {
            gap.signum()
        } else {
            step
        }
    }
}

/// Housing demand driven by local commerce.
///
/// `max = min(housing capacity, baseline_households + tenants × households_per_tenant)`.
#[derive(Clone, Debug)]
pub struct ResidentialDemand {
    pub baseline_households: u64,
    pub households_per_tenant: Decimal,
    pub growth: GrowthCurve,
}

impl ResidentialDemand {
    pub fn from_config(cfg: &DemandConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            baseline_households: cfg.baseline_households,
            households_per_tenant: cfg.households_per_tenant,
            growth: GrowthCurve::new(cfg.growth_rate)?,
        })
    }
}

impl DemandEvaluator<ZoningMarket> for ResidentialDemand {
    type Output = Demand;

    fn evaluate(&self, market: &ZoningMarket) -> Demand {
        let attracted = scale_count(market.commerce.current, self.households_per_tenant);
        let max = market
            .housing
            .capacity
            .min(self.baseline_households.saturating_add(attracted));
        Demand {
            increment: self.growth.step(market.housing.current, max),
            max,
        }
    }
}

/// Commercial demand driven by the resident labor pool.
///
/// `max = min(commercial capacity, baseline_tenants + households × tenants_per_household)`.
#[derive(Clone, Debug)]
pub struct WorkforceDemand {
    pub baseline_tenants: u64,
    pub tenants_per_household: Decimal,
    pub growth: GrowthCurve,
}

impl WorkforceDemand {
    pub fn from_config(cfg: &DemandConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            baseline_tenants: cfg.baseline_tenants,
            tenants_per_household: cfg.tenants_per_household,
            growth: GrowthCurve::new(cfg.growth_rate)?,
        })
    }
}

impl DemandEvaluator<ZoningMarket> for WorkforceDemand {
    type Output = Demand;

    fn evaluate(&self, market: &ZoningMarket) -> Demand {
        let supported = scale_count(market.housing.current, self.tenants_per_household);
        let max = market
            .commerce
            .capacity
            .min(self.baseline_tenants.saturating_add(supported));
        Demand {
            increment: self.growth.step(market.commerce.current, max),
            max,
        }
    }
}

/// Input of a civic evaluator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CivicMarket<C: BuildingType> {
    pub population: u64,
    pub seats: TypeVector<C>,
    pub seat_max: TypeVector<C>,
}

impl<C: BuildingType> CivicMarket<C> {
    pub fn new(population: u64, sim: &CivicSimulator<C>) -> Self {
        Self {
            population,
            seats: sim.seats().clone(),
            seat_max: sim.seat_max().clone(),
        }
    }
}

/// Civic evaluator result: per-category seat targets and today's seat changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CivicOutlook<C: BuildingType> {
    pub targets: TypeVector<C>,
    pub increments: TypeVector<C, i64>,
}

impl<C: BuildingType> CivicOutlook<C> {
    /// Unmet demand per category, `target - filled`.
    pub fn remaining(&self, seats: &TypeVector<C>) -> TypeVector<C, i64> {
        TypeVector::from_fn(|c| signed_gap(seats.get(c), self.targets.get(c)))
    }
}

impl<C: BuildingType> Default for CivicOutlook<C> {
    fn default() -> Self {
        Self {
            targets: TypeVector::new(),
            increments: TypeVector::new(),
        }
    }
}

/// Seats demanded in proportion to population.
///
/// `target[c] = ceil(population × seats_per_capita[c])`; seats grow toward
/// `min(target[c], seat_max[c])`.
#[derive(Clone, Debug)]
pub struct CivicDemand<C: BuildingType> {
    pub seats_per_capita: TypeVector<C, Decimal>,
    pub growth: GrowthCurve,
}

impl<C: BuildingType> CivicDemand<C> {
    pub fn from_config(civic: &CivicConfig, demand: &DemandConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            seats_per_capita: civic.per_capita_for::<C>()?,
            growth: GrowthCurve::new(demand.growth_rate)?,
        })
    }
}

impl<C: BuildingType> DemandEvaluator<CivicMarket<C>> for CivicDemand<C> {
    type Output = CivicOutlook<C>;

    fn evaluate(&self, market: &CivicMarket<C>) -> CivicOutlook<C> {
        let population = Decimal::from(market.population);
        let targets = TypeVector::from_fn(|c| {
            population
                .checked_mul(self.seats_per_capita.get(c))
                .and_then(|d| d.ceil().to_u64())
                .unwrap_or(u64::MAX)
        });
        let increments = TypeVector::from_fn(|c| {
            let ceiling = targets.get(c).min(market.seat_max.get(c));
            self.growth.step(market.seats.get(c), ceiling)
        });
        CivicOutlook {
            targets,
            increments,
        }
    }
}
