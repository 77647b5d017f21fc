#![deny(warnings)]

//! Economic models: the funding ledger and demand evaluators.
//!
//! This crate provides:
//! - Cost quotes for zoning and civic construction/demolition with bulk discounts
//! - An all-or-nothing funds ledger that never goes negative
//! - Periodic income accrual from occupants and civic seats
//! - Pluggable demand evaluators (see [`demand`])
//!
//! Every currency amount is rounded to whole units with
//! [`RoundingStrategy::MidpointAwayFromZero`].

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sim_core::{ConfigError, CostConfig, ZoneSize};
use std::collections::VecDeque;
use thiserror::Error;
use tracing::{debug, info};

pub mod demand;

pub use demand::{
    CivicDemand, CivicMarket, CivicOutlook, CivicPolicy, Demand, DemandEvaluator, GrowthCurve,
    Occupancy, ResidentialDemand, WorkforceDemand, ZoningMarket, ZoningPolicy,
};

/// Number of recent transactions kept by [`FundingManager::journal`].
pub const JOURNAL_CAPACITY: usize = 64;

/// Rejected funding transactions. Funds are unchanged whenever one is returned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FundingError {
    /// Committing would leave the balance below zero.
    #[error("insufficient funds: transaction costs {required}, balance is {available}")]
    InsufficientFunds { required: i64, available: i64 },
    /// A cost or balance does not fit the ledger's integer range.
    #[error("currency arithmetic overflowed")]
    Overflow,
}

/// What a ledger entry paid for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    ConstructZoning { count: u32, size: ZoneSize },
    DemolishZoning { count: u32, size: ZoneSize },
    ConstructCivic { seats: u64 },
    DemolishCivic { seats: u64 },
    Income { zoning_occupants: u64, civic_seats: u64 },
}

/// A committed ledger entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub kind: TransactionKind,
    /// Signed change applied to funds (negative for charges).
    pub amount: i64,
    /// Funds after the change.
    pub balance: i64,
}

/// Round a currency value to whole units.
fn to_currency(value: Decimal) -> Result<i64, FundingError> {
    value
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(FundingError::Overflow)
}

/// Multiply a whole amount by a factor and round.
fn scale(amount: i64, factor: Decimal) -> Result<i64, FundingError> {
    Decimal::from(amount)
        .checked_mul(factor)
        .ok_or(FundingError::Overflow)
        .and_then(to_currency)
}

/// The city treasury.
///
/// Construction and demolition recompute their quote and then check-and-commit
/// in one call; they are not composable into larger transactions.
#[derive(Clone, Debug)]
pub struct FundingManager {
    funds: i64,
    costs: CostConfig,
    journal: VecDeque<Transaction>,
}

impl FundingManager {
    pub fn new(initial_funds: i64, costs: CostConfig) -> Result<Self, ConfigError> {
        if initial_funds < 0 {
            return Err(ConfigError::Negative("initial_funds"));
        }
        costs.validate()?;
        Ok(Self {
            funds: initial_funds,
            costs,
            journal: VecDeque::with_capacity(JOURNAL_CAPACITY),
        })
    }

    pub fn funds(&self) -> i64 {
        self.funds
    }

    pub fn costs(&self) -> &CostConfig {
        &self.costs
    }

    /// Most recent transactions, oldest first.
    pub fn journal(&self) -> impl Iterator<Item = &Transaction> {
        self.journal.iter()
    }

    /// `count × round(size × base_zoning_cost × discount)`, where the
    /// high-density discount applies to sizes above one.
    pub fn quote_zoning_construction(
        &self,
        count: u32,
        size: ZoneSize,
    ) -> Result<i64, FundingError> {
        let mut unit = Decimal::from(size.units())
            .checked_mul(Decimal::from(self.costs.base_zoning_cost))
            .ok_or(FundingError::Overflow)?;
        if size.units() > 1 {
            unit = unit
                .checked_mul(self.costs.high_density_multiplier)
                .ok_or(FundingError::Overflow)?;
        }
        to_currency(unit)?
            .checked_mul(i64::from(count))
            .ok_or(FundingError::Overflow)
    }

    /// Construction quote scaled by the signed demolition multiplier.
    /// Negative results are refunds.
    pub fn quote_zoning_demolition(&self, count: u32, size: ZoneSize) -> Result<i64, FundingError> {
        scale(
            self.quote_zoning_construction(count, size)?,
            self.costs.demolition_multiplier,
        )
    }

    /// `round(seats × base_civic_seat_cost × base_civic_multiplier)`.
    pub fn quote_civic_construction(&self, seats: u64) -> Result<i64, FundingError> {
        let cost = Decimal::from(seats)
            .checked_mul(Decimal::from(self.costs.base_civic_seat_cost))
            .and_then(|c| c.checked_mul(self.costs.base_civic_multiplier))
            .ok_or(FundingError::Overflow)?;
        to_currency(cost)
    }

    pub fn quote_civic_demolition(&self, seats: u64) -> Result<i64, FundingError> {
        scale(
            self.quote_civic_construction(seats)?,
            self.costs.demolition_multiplier,
        )
    }

    pub fn construct_zoning(
        &mut self,
        count: u32,
        size: ZoneSize,
    ) -> Result<Transaction, FundingError> {
        let cost = self.quote_zoning_construction(count, size)?;
        self.commit(cost, TransactionKind::ConstructZoning { count, size })
    }

    pub fn demolish_zoning(
        &mut self,
        count: u32,
        size: ZoneSize,
    ) -> Result<Transaction, FundingError> {
        let cost = self.quote_zoning_demolition(count, size)?;
        self.commit(cost, TransactionKind::DemolishZoning { count, size })
    }

    pub fn construct_civic(&mut self, seats: u64) -> Result<Transaction, FundingError> {
        let cost = self.quote_civic_construction(seats)?;
        self.commit(cost, TransactionKind::ConstructCivic { seats })
    }

    pub fn demolish_civic(&mut self, seats: u64) -> Result<Transaction, FundingError> {
        let cost = self.quote_civic_demolition(seats)?;
        self.commit(cost, TransactionKind::DemolishCivic { seats })
    }

    /// Credit `civic_seats × base_civic_seat_cost + zoning_occupants × base_tax_revenue`.
    /// Never rejected; funds saturate at `i64::MAX` and the return value is
    /// what was actually credited.
    pub fn generate_income(&mut self, zoning_occupants: u64, civic_seats: u64) -> i64 {
        let seat_income = i64::try_from(civic_seats)
            .unwrap_or(i64::MAX)
            .saturating_mul(self.costs.base_civic_seat_cost);
        let tax_income = i64::try_from(zoning_occupants)
            .unwrap_or(i64::MAX)
            .saturating_mul(self.costs.base_tax_revenue);
        let before = self.funds;
        self.funds = before.saturating_add(seat_income.saturating_add(tax_income));
        let credited = self.funds - before;
        self.record(Transaction {
            kind: TransactionKind::Income {
                zoning_occupants,
                civic_seats,
            },
            amount: credited,
            balance: self.funds,
        });
        info!(income = credited, funds = self.funds, "income collected");
        credited
    }

    fn commit(&mut self, cost: i64, kind: TransactionKind) -> Result<Transaction, FundingError> {
        let balance = self.funds.checked_sub(cost).ok_or(FundingError::Overflow)?;
        if balance < 0 {
            debug!(?kind, cost, funds = self.funds, "transaction rejected");
            return Err(FundingError::InsufficientFunds {
                required: cost,
                available: self.funds,
            });
        }
        self.funds = balance;
        let tx = Transaction {
            kind,
            amount: -cost,
            balance,
        };
        self.record(tx);
        debug!(?kind, cost, funds = balance, "transaction committed");
        Ok(tx)
    }

    fn record(&mut self, tx: Transaction) {
        if self.journal.len() == JOURNAL_CAPACITY {
            self.journal.pop_front();
        }
        self.journal.push_back(tx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ledger(funds: i64) -> FundingManager {
        FundingManager::new(
            funds,
            CostConfig {
                base_zoning_cost: 200,
                high_density_multiplier: Decimal::new(875, 3),
                demolition_multiplier: Decimal::new(-5, 1),
                base_civic_seat_cost: 10,
                base_civic_multiplier: Decimal::new(15, 1),
                base_tax_revenue: 20,
            },
        )
        .unwrap()
    }

    #[test]
    fn bulk_construction_until_broke() {
        let mut f = ledger(1000);
        assert_eq!(f.quote_zoning_construction(1, ZoneSize::Medium), Ok(350));
        assert_eq!(f.construct_zoning(1, ZoneSize::Medium).unwrap().balance, 650);
        assert_eq!(f.construct_zoning(1, ZoneSize::Medium).unwrap().balance, 300);
        assert_eq!(
            f.construct_zoning(1, ZoneSize::Medium),
            Err(FundingError::InsufficientFunds {
                required: 350,
                available: 300
            })
        );
        assert_eq!(f.funds(), 300);
        assert_eq!(f.journal().count(), 2);
    }

    #[test]
    fn small_lots_are_not_discounted() {
        let f = ledger(0);
        assert_eq!(f.quote_zoning_construction(3, ZoneSize::Small), Ok(600));
        assert_eq!(f.quote_zoning_construction(2, ZoneSize::Large), Ok(1050));
        assert_eq!(f.quote_zoning_construction(0, ZoneSize::Large), Ok(0));
    }

    #[test]
    fn income_credits_seats_and_taxes() {
        let mut f = ledger(0);
        assert_eq!(f.generate_income(100, 50), 2500);
        assert_eq!(f.funds(), 2500);
        let last = f.journal().last().unwrap();
        assert_eq!(last.amount, 2500);
    }

    #[test]
    fn demolition_sign_follows_multiplier() {
        let refund = ledger(0);
        assert!(refund.quote_zoning_construction(1, ZoneSize::Large).unwrap() > 0);
        assert_eq!(refund.quote_zoning_demolition(1, ZoneSize::Large), Ok(-263));

        let mut costs = refund.costs().clone();
        costs.demolition_multiplier = Decimal::new(2, 1);
        let fee = FundingManager::new(0, costs).unwrap();
        assert_eq!(fee.quote_zoning_demolition(1, ZoneSize::Large), Ok(105));
    }

    #[test]
    fn refunding_demolition_succeeds_with_empty_treasury() {
        let mut f = ledger(0);
        let tx = f.demolish_zoning(2, ZoneSize::Small).unwrap();
        assert_eq!(tx.amount, 200);
        assert_eq!(f.funds(), 200);
    }

    #[test]
    fn civic_costs_use_surcharge_and_round_half_away() {
        let mut f = ledger(500);
        assert_eq!(f.quote_civic_construction(20), Ok(300));
        f.construct_civic(20).unwrap();
        assert_eq!(f.funds(), 200);
        assert_eq!(f.quote_civic_demolition(20), Ok(-150));
        assert!(f.construct_civic(14).is_err());
        assert_eq!(f.funds(), 200);

        let mut costs = f.costs().clone();
        costs.base_civic_seat_cost = 1;
        costs.base_civic_multiplier = Decimal::new(5, 1);
        let half = FundingManager::new(0, costs).unwrap();
        assert_eq!(half.quote_civic_construction(1), Ok(1));
        assert_eq!(half.quote_civic_demolition(1), Ok(-1));
    }

    #[test]
    fn journal_is_bounded() {
        let mut f = ledger(0);
        for _ in 0..(JOURNAL_CAPACITY + 5) {
            f.generate_income(1, 0);
        }
        assert_eq!(f.journal().count(), JOURNAL_CAPACITY);
    }

    #[test]
    fn income_saturates_at_ledger_ceiling() {
        let mut f = ledger(i64::MAX - 10);
        assert_eq!(f.generate_income(1, 0), 10);
        assert_eq!(f.funds(), i64::MAX);
        let last = f.journal().last().unwrap();
        assert_eq!((last.amount, last.balance), (10, i64::MAX));

        assert_eq!(f.generate_income(u64::MAX, u64::MAX), 0);
        assert_eq!(f.funds(), i64::MAX);
        assert_eq!(f.journal().last().unwrap().amount, 0);
    }

    #[test]
    fn overflowing_quotes_leave_ledger_untouched() {
        let mut costs = ledger(0).costs().clone();
        costs.base_zoning_cost = i64::MAX;
        let mut f = FundingManager::new(1_000, costs).unwrap();
        f.generate_income(1, 0);
        let entries = f.journal().count();

        assert_eq!(f.quote_zoning_construction(1, ZoneSize::Medium), Err(FundingError::Overflow));
        assert_eq!(f.construct_zoning(1, ZoneSize::Medium), Err(FundingError::Overflow));
        assert_eq!(f.construct_zoning(u32::MAX, ZoneSize::Small), Err(FundingError::Overflow));
        assert_eq!(f.demolish_zoning(2, ZoneSize::Small), Err(FundingError::Overflow));
        assert_eq!(f.funds(), 1_020);
        assert_eq!(f.journal().count(), entries);
    }

    #[test]
    fn refund_past_ledger_ceiling_is_rejected() {
        let mut f = ledger(i64::MAX);
        assert_eq!(f.demolish_zoning(1, ZoneSize::Small), Err(FundingError::Overflow));
        assert_eq!(f.funds(), i64::MAX);
        assert_eq!(f.journal().count(), 0);
    }

    #[test]
    fn rejects_invalid_setup() {
        assert_eq!(
            FundingManager::new(-1, CostConfig::default()).unwrap_err(),
            ConfigError::Negative("initial_funds")
        );
    }

    proptest! {
        #[test]
        fn funds_never_negative(start in 0i64..5_000,
                                ops in proptest::collection::vec((0u8..5, 0u32..4, 0usize..3, 0u64..200), 1..64)) {
            let mut f = ledger(start);
            for (op, count, size_idx, seats) in ops {
                let size = [ZoneSize::Small, ZoneSize::Medium, ZoneSize::Large][size_idx];
                let before = f.funds();
                let result = match op {
                    0 => f.construct_zoning(count, size).map(|_| ()),
                    1 => f.demolish_zoning(count, size).map(|_| ()),
                    2 => f.construct_civic(seats).map(|_| ()),
                    3 => f.demolish_civic(seats).map(|_| ()),
                    _ => {
                        f.generate_income(seats, seats / 2);
                        Ok(())
                    }
                };
                if result.is_err() {
                    prop_assert_eq!(f.funds(), before);
                }
                prop_assert!(f.funds() >= 0);
            }
        }
    }
}
