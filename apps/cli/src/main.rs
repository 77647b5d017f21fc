#![deny(warnings)]

//! Headless CLI: seeds a starter city, simulates a number of days and prints
//! the resulting KPIs (or the full snapshot as JSON).

use anyhow::{Context, Result};
use sim_core::{EducationLevel, HealthFacility, SimConfig, ZoneSize, ZoneUse};
use sim_runtime::Simulation;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

struct Args {
    config: Option<String>,
    days: u64,
    json: bool,
}

fn parse_args() -> Args {
    let mut args = Args {
        config: None,
        days: 28,
        json: false,
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => args.config = it.next(),
            "--days" => {
                if let Some(days) = it.next().and_then(|s| s.parse().ok()) {
                    args.days = days;
                }
            }
            "--json" => args.json = true,
            _ => {}
        }
    }
    args
}

fn load_config(path: Option<&str>) -> Result<SimConfig> {
    let Some(path) = path else {
        return Ok(SimConfig::default());
    };
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    let cfg: SimConfig =
        serde_yaml::from_str(&text).with_context(|| format!("parsing {path}"))?;
    cfg.validate()
        .with_context(|| format!("validating {path}"))?;
    Ok(cfg)
}

/// Place a small starter town. Orders the treasury cannot afford are skipped.
fn seed_city(sim: &mut Simulation) {
    let orders = [
        ("small homes", sim.build_zoning(ZoneUse::Residential, 4, ZoneSize::Small)),
        ("apartments", sim.build_zoning(ZoneUse::Residential, 2, ZoneSize::Medium)),
        ("shops", sim.build_zoning(ZoneUse::Commercial, 3, ZoneSize::Small)),
        ("elementary school", sim.build_civic(EducationLevel::Elementary, 1)),
        ("clinic", sim.build_civic(HealthFacility::Clinic, 1)),
    ];
    for (what, result) in orders {
        match result {
            Ok(tx) => info!(what, cost = -tx.amount, funds = tx.balance, "seeded"),
            Err(e) => warn!(what, error = %e, "seed order rejected"),
        }
    }
}

fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args();
    info!(config = ?args.config, days = args.days, "starting CLI");

    let cfg = load_config(args.config.as_deref())?;
    let mut sim = Simulation::new(cfg)?;
    seed_city(&mut sim);
    sim.run_days(args.days);

    let snap = sim.snapshot();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&snap)?);
        return Ok(());
    }
    println!(
        "City OK | day: {} | week: {} | funds: {} | last income: {}",
        snap.day, snap.week, snap.funds, snap.stats.last_income
    );
    println!(
        "KPI | households: {}/{} | tenants: {}/{} | population: {} | employment: {} | civic seats: {}",
        snap.residential.occupant_count,
        snap.residential.capacity,
        snap.commercial.occupant_count,
        snap.commercial.capacity,
        snap.stats.population,
        snap.stats.employment,
        snap.stats.civic_seats
    );
    println!(
        "Demand | residential: {} | commercial: {} | education: {:?} | health: {:?}",
        snap.demand.residential, snap.demand.commercial, snap.demand.education, snap.demand.health
    );

    Ok(())
}
