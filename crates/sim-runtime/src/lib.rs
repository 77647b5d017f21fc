#![deny(warnings)]

//! ECS runtime for the city simulation.
//!
//! A [`Simulation`] owns a bevy_ecs [`World`] holding the clock, treasury,
//! simulators and demand policies as resources, plus one single-threaded
//! [`Schedule`] per [`Cadence`]. Each call to [`Simulation::step`] advances the
//! clock by one tick and runs the day, week and episode schedules, in that
//! order, for every boundary the tick lands on.

use bevy_ecs::prelude::*;
use bevy_ecs::schedule::ExecutorKind;
use serde::{Deserialize, Serialize};
use sim_core::{
    BuildingType, Cadence, CivicSimulator, CivicSnapshot, ConfigError, EducationLevel,
    HealthFacility, SimConfig, SimError, Timekeeper, TypeVector, ZoneSize, ZoneUse,
    ZoningSimulator, ZoningSnapshot,
};
use sim_econ::{
    CivicDemand, CivicMarket, CivicOutlook, CivicPolicy, Demand, FundingError, FundingManager,
    ResidentialDemand, Transaction, WorkforceDemand, ZoningMarket, ZoningPolicy,
};
use thiserror::Error;
use tracing::{debug, info, trace};

/// Tick clock resource.
#[derive(Resource)]
pub struct Clock(pub Timekeeper);

/// Funds ledger resource.
#[derive(Resource)]
pub struct Treasury(pub FundingManager);

/// Session configuration resource (read-only).
#[derive(Resource)]
pub struct Settings(pub SimConfig);

/// All growth simulators.
#[derive(Resource)]
pub struct City {
    pub residential: ZoningSimulator,
    pub commercial: ZoningSimulator,
    pub education: CivicSimulator<EducationLevel>,
    pub health: CivicSimulator<HealthFacility>,
}

impl City {
    pub fn from_config(cfg: &SimConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            residential: ZoningSimulator::new(ZoneUse::Residential, cfg.zoning.households_per_size),
            commercial: ZoningSimulator::new(ZoneUse::Commercial, cfg.zoning.tenants_per_size),
            education: CivicSimulator::new(cfg.education.seats_for()?),
            health: CivicSimulator::new(cfg.health.seats_for()?),
        })
    }

    pub fn zoning(&self, zone: ZoneUse) -> &ZoningSimulator {
        match zone {
            ZoneUse::Residential => &self.residential,
            ZoneUse::Commercial => &self.commercial,
        }
    }

    pub fn zoning_mut(&mut self, zone: ZoneUse) -> &mut ZoningSimulator {
        match zone {
            ZoneUse::Residential => &mut self.residential,
            ZoneUse::Commercial => &mut self.commercial,
        }
    }

    pub fn zoning_occupants(&self) -> u64 {
        self.residential
            .occupant_count()
            .saturating_add(self.commercial.occupant_count())
    }

    pub fn civic_seats(&self) -> u64 {
        self.education
            .seat_count()
            .saturating_add(self.health.seat_count())
    }
}

/// Selects the civic simulator for a category taxonomy.
pub trait CivicService: BuildingType {
    fn service(city: &City) -> &CivicSimulator<Self>;
    fn service_mut(city: &mut City) -> &mut CivicSimulator<Self>;
}

impl CivicService for EducationLevel {
    fn service(city: &City) -> &CivicSimulator<Self> {
        &city.education
    }

    fn service_mut(city: &mut City) -> &mut CivicSimulator<Self> {
        &mut city.education
    }
}

impl CivicService for HealthFacility {
    fn service(city: &City) -> &CivicSimulator<Self> {
        &city.health
    }

    fn service_mut(city: &mut City) -> &mut CivicSimulator<Self> {
        &mut city.health
    }
}

/// Demand strategies evaluated every day.
#[derive(Resource)]
pub struct DemandPolicies {
    pub residential: ZoningPolicy,
    pub workforce: ZoningPolicy,
    pub education: CivicPolicy<EducationLevel>,
    pub health: CivicPolicy<HealthFacility>,
}

impl DemandPolicies {
    /// The stock policies tuned by `cfg.demand`.
    pub fn from_config(cfg: &SimConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            residential: Box::new(ResidentialDemand::from_config(&cfg.demand)?),
            workforce: Box::new(WorkforceDemand::from_config(&cfg.demand)?),
            education: Box::new(CivicDemand::<EducationLevel>::from_config(
                &cfg.education,
                &cfg.demand,
            )?),
            health: Box::new(CivicDemand::<HealthFacility>::from_config(
                &cfg.health,
                &cfg.demand,
            )?),
        })
    }
}

/// Unmet demand per simulator, `target - current`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemandRemaining {
    pub residential: i64,
    pub commercial: i64,
    pub education: Vec<i64>,
    pub health: Vec<i64>,
}

/// Latest evaluator output, overwritten every day.
#[derive(Resource, Default)]
pub struct DemandBoard {
    pub residential: Demand,
    pub workforce: Demand,
    pub education: CivicOutlook<EducationLevel>,
    pub health: CivicOutlook<HealthFacility>,
    pub remaining: DemandRemaining,
}

/// Weekly aggregates.
#[derive(Resource, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityStats {
    pub population: u64,
    pub employment: u64,
    pub zoning_occupants: u64,
    pub civic_seats: u64,
    pub last_income: i64,
}

/// Cadence firings: running totals and the order they fired on the last tick.
#[derive(Resource, Clone, Debug, Default)]
pub struct CadenceLog {
    pub days: u64,
    pub weeks: u64,
    pub episodes: u64,
    pub tick: u64,
    pub fired: Vec<Cadence>,
}

impl CadenceLog {
    fn record(&mut self, cadence: Cadence, tick: u64) {
        if self.tick != tick {
            self.tick = tick;
            self.fired.clear();
        }
        self.fired.push(cadence);
        match cadence {
            Cadence::Day => self.days += 1,
            Cadence::Week => self.weeks += 1,
            Cadence::Episode => self.episodes += 1,
        }
    }
}

/// Ordering inside each cadence schedule: core bookkeeping, then hooks.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Core,
    Hooks,
}

fn population(city: &City, cfg: &SimConfig) -> u64 {
    city.residential
        .occupant_count()
        .saturating_mul(cfg.demand.household_size)
}

fn evaluate_demand(
    city: Res<City>,
    settings: Res<Settings>,
    policies: Res<DemandPolicies>,
    mut board: ResMut<DemandBoard>,
) {
    let market = ZoningMarket::new(&city.residential, &city.commercial);
    let population = population(&city, &settings.0);
    board.residential = policies.residential.evaluate(&market);
    board.workforce = policies.workforce.evaluate(&market);
    board.education = policies
        .education
        .evaluate(&CivicMarket::new(population, &city.education));
    board.health = policies
        .health
        .evaluate(&CivicMarket::new(population, &city.health));
    trace!(
        residential = ?board.residential,
        workforce = ?board.workforce,
        population,
        "demand evaluated"
    );
}

fn apply_growth(mut city: ResMut<City>, board: Res<DemandBoard>) {
    let city = &mut *city;
    let delta = city.residential.spread(board.residential.increment);
    city.residential.increment_occupants(&delta);
    let delta = city.commercial.spread(board.workforce.increment);
    city.commercial.increment_occupants(&delta);
    city.education.adjust_seats(&board.education.increments);
    city.health.adjust_seats(&board.health.increments);
}

fn refresh_remaining(city: Res<City>, mut board: ResMut<DemandBoard>) {
    let board = &mut *board;
    board.remaining = DemandRemaining {
        residential: board
            .residential
            .remaining(city.residential.occupant_count()),
        commercial: board.workforce.remaining(city.commercial.occupant_count()),
        education: board.education.remaining(city.education.seats()).as_slice().to_vec(),
        health: board.health.remaining(city.health.seats()).as_slice().to_vec(),
    };
}

fn refresh_civic_capacity(mut city: ResMut<City>, board: Res<DemandBoard>) {
    city.education.generate(&board.education.targets);
    city.health.generate(&board.health.targets);
}

fn update_stats(city: Res<City>, settings: Res<Settings>, mut stats: ResMut<CityStats>) {
    stats.population = population(&city, &settings.0);
    stats.employment = city
        .commercial
        .occupant_count()
        .saturating_mul(settings.0.demand.jobs_per_tenant);
    stats.zoning_occupants = city.zoning_occupants();
    stats.civic_seats = city.civic_seats();
}

fn collect_income(mut stats: ResMut<CityStats>, mut treasury: ResMut<Treasury>) {
    stats.last_income = treasury
        .0
        .generate_income(stats.zoning_occupants, stats.civic_seats);
}

fn cadence_schedule() -> Schedule {
    let mut schedule = Schedule::default();
    schedule.set_executor_kind(ExecutorKind::SingleThreaded);
    schedule.configure_sets((Phase::Core, Phase::Hooks).chain());
    schedule
}

/// Rejected player or presentation command. State is unchanged.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error(transparent)]
    Sim(#[from] SimError),
    #[error(transparent)]
    Funding(#[from] FundingError),
}

/// Immutable view of the whole simulation for presentation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitySnapshot {
    pub tick: u64,
    pub day: u64,
    pub week: u64,
    pub episode: u64,
    pub funds: i64,
    pub residential: ZoningSnapshot,
    pub commercial: ZoningSnapshot,
    pub education: CivicSnapshot,
    pub health: CivicSnapshot,
    pub demand: DemandRemaining,
    pub stats: CityStats,
}

/// The simulation: world resources plus one schedule per cadence.
pub struct Simulation {
    world: World,
    day: Schedule,
    week: Schedule,
    episode: Schedule,
}

impl Simulation {
    /// Build a simulation with the stock demand policies.
    pub fn new(config: SimConfig) -> Result<Self, ConfigError> {
        let policies = DemandPolicies::from_config(&config)?;
        Self::with_policies(config, policies)
    }

    /// Build a simulation with caller-supplied demand policies.
    pub fn with_policies(config: SimConfig, policies: DemandPolicies) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut world = World::new();
        world.insert_resource(Clock(Timekeeper::new(config.cadence)?));
        world.insert_resource(Treasury(FundingManager::new(
            config.initial_funds,
            config.costs.clone(),
        )?));
        world.insert_resource(City::from_config(&config)?);
        world.insert_resource(policies);
        world.insert_resource(Settings(config));
        world.init_resource::<DemandBoard>();
        world.init_resource::<CityStats>();
        world.init_resource::<CadenceLog>();

        let mut day = cadence_schedule();
        day.add_systems(
            (evaluate_demand, apply_growth, refresh_remaining)
                .chain()
                .in_set(Phase::Core),
        );
        let mut week = cadence_schedule();
        week.add_systems(
            (refresh_civic_capacity, update_stats, collect_income)
                .chain()
                .in_set(Phase::Core),
        );
        Ok(Self {
            world,
            day,
            week,
            episode: cadence_schedule(),
        })
    }

    /// Attach systems that run after the core work of `cadence`.
    pub fn add_systems<M>(
        &mut self,
        cadence: Cadence,
        systems: impl IntoSystemConfigs<M>,
    ) -> &mut Self {
        let schedule = match cadence {
            Cadence::Day => &mut self.day,
            Cadence::Week => &mut self.week,
            Cadence::Episode => &mut self.episode,
        };
        schedule.add_systems(systems.in_set(Phase::Hooks));
        self
    }

    /// Advance one tick and fire every boundary it lands on. Returns the tick.
    pub fn step(&mut self) -> u64 {
        let tick = self.world.resource_mut::<Clock>().0.advance();
        for cadence in Cadence::ALL {
            // Systems never touch the clock, so the boundary set is fixed for this tick.
            if !self.world.resource::<Clock>().0.is_boundary(cadence) {
                continue;
            }
            self.world
                .resource_mut::<CadenceLog>()
                .record(cadence, tick);
            match cadence {
                Cadence::Day => self.day.run(&mut self.world),
                Cadence::Week => self.week.run(&mut self.world),
                Cadence::Episode => {
                    info!(
                        tick,
                        episode = self.world.resource::<Clock>().0.episode(),
                        funds = self.funds(),
                        "episode boundary"
                    );
                    self.episode.run(&mut self.world)
                }
            }
        }
        tick
    }

    pub fn run_ticks(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.step();
        }
    }

    pub fn run_days(&mut self, days: u64) {
        let per_day = self.world.resource::<Clock>().0.cadence().ticks_per_day;
        self.run_ticks(days.saturating_mul(per_day));
    }

    /// Buy and place `count` zoned buildings. Charges first; nothing changes
    /// if either the money or the building count is rejected.
    pub fn build_zoning(
        &mut self,
        zone: ZoneUse,
        count: u32,
        size: ZoneSize,
    ) -> Result<Transaction, CommandError> {
        let delta = i64::from(count);
        self.city().zoning(zone).check_buildings(delta, size)?;
        let tx = self
            .world
            .resource_mut::<Treasury>()
            .0
            .construct_zoning(count, size)?;
        self.city_mut()
            .zoning_mut(zone)
            .increment_buildings(delta, size)?;
        debug!(?zone, count, size = size.label(), "zoning built");
        Ok(tx)
    }

    /// Demolish `count` zoned buildings, paying or refunding the demolition cost.
    pub fn demolish_zoning(
        &mut self,
        zone: ZoneUse,
        count: u32,
        size: ZoneSize,
    ) -> Result<Transaction, CommandError> {
        let delta = -i64::from(count);
        self.city().zoning(zone).check_buildings(delta, size)?;
        let tx = self
            .world
            .resource_mut::<Treasury>()
            .0
            .demolish_zoning(count, size)?;
        self.city_mut()
            .zoning_mut(zone)
            .increment_buildings(delta, size)?;
        debug!(?zone, count, size = size.label(), "zoning demolished");
        Ok(tx)
    }

    /// Buy `count` civic buildings of `category`, priced by their seats.
    pub fn build_civic<C: CivicService>(
        &mut self,
        category: C,
        count: u32,
    ) -> Result<Transaction, CommandError> {
        let delta = i64::from(count);
        let seats = self.civic_seats_for(category, delta, count)?;
        let tx = self.world.resource_mut::<Treasury>().0.construct_civic(seats)?;
        C::service_mut(&mut self.city_mut()).increment_buildings(delta, category)?;
        debug!(service = C::TAXONOMY, category = category.label(), count, "civic built");
        Ok(tx)
    }

    pub fn demolish_civic<C: CivicService>(
        &mut self,
        category: C,
        count: u32,
    ) -> Result<Transaction, CommandError> {
        let delta = -i64::from(count);
        let seats = self.civic_seats_for(category, delta, count)?;
        let tx = self.world.resource_mut::<Treasury>().0.demolish_civic(seats)?;
        C::service_mut(&mut self.city_mut()).increment_buildings(delta, category)?;
        debug!(service = C::TAXONOMY, category = category.label(), count, "civic demolished");
        Ok(tx)
    }

    fn civic_seats_for<C: CivicService>(
        &self,
        category: C,
        delta: i64,
        count: u32,
    ) -> Result<u64, SimError> {
        let sim = C::service(self.city());
        sim.check_buildings(delta, category)?;
        Ok(sim
            .seats_per_building(category)
            .saturating_mul(u64::from(count)))
    }

    /// Change a zoning building count without touching funds.
    pub fn increment_buildings(
        &mut self,
        zone: ZoneUse,
        delta: i64,
        index: usize,
    ) -> Result<(), SimError> {
        let size = ZoneSize::from_index(index)?;
        self.city_mut().zoning_mut(zone).increment_buildings(delta, size)
    }

    /// Add occupants to one size class, saturating at capacity.
    pub fn adjust_occupants(
        &mut self,
        zone: ZoneUse,
        delta: i64,
        index: usize,
    ) -> Result<(), SimError> {
        let size = ZoneSize::from_index(index)?;
        let mut deltas = TypeVector::new();
        deltas.set(size, delta);
        self.city_mut().zoning_mut(zone).increment_occupants(&deltas);
        Ok(())
    }

    /// Change a civic building count without touching funds.
    pub fn increment_civic_buildings<C: CivicService>(
        &mut self,
        delta: i64,
        index: usize,
    ) -> Result<(), SimError> {
        let category = C::from_index(index)?;
        C::service_mut(&mut self.city_mut()).increment_buildings(delta, category)
    }

    /// Fill or free seats of one civic category, saturating at the ceiling.
    pub fn adjust_seats<C: CivicService>(
        &mut self,
        delta: i64,
        index: usize,
    ) -> Result<(), SimError> {
        let category = C::from_index(index)?;
        C::service_mut(&mut self.city_mut()).increment_seats(delta, category);
        Ok(())
    }

    pub fn tick(&self) -> u64 {
        self.world.resource::<Clock>().0.tick()
    }

    pub fn funds(&self) -> i64 {
        self.world.resource::<Treasury>().0.funds()
    }

    pub fn treasury(&self) -> &FundingManager {
        &self.world.resource::<Treasury>().0
    }

    pub fn city(&self) -> &City {
        self.world.resource::<City>()
    }

    fn city_mut(&mut self) -> Mut<'_, City> {
        self.world.resource_mut::<City>()
    }

    pub fn demand(&self) -> &DemandBoard {
        self.world.resource::<DemandBoard>()
    }

    pub fn stats(&self) -> &CityStats {
        self.world.resource::<CityStats>()
    }

    pub fn cadence_log(&self) -> &CadenceLog {
        self.world.resource::<CadenceLog>()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable world access, e.g. to insert resources used by hook systems.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn snapshot(&self) -> CitySnapshot {
        let clock = &self.world.resource::<Clock>().0;
        let city = self.city();
        CitySnapshot {
            tick: clock.tick(),
            day: clock.day(),
            week: clock.week(),
            episode: clock.episode(),
            funds: self.funds(),
            residential: city.residential.snapshot(),
            commercial: city.commercial.snapshot(),
            education: city.education.snapshot(),
            health: city.health.snapshot(),
            demand: self.demand().remaining.clone(),
            stats: self.stats().clone(),
        }
    }
}
