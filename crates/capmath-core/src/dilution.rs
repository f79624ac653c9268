//! Financing-round dilution.
//!
//! Resolves the round price (supplied, or `pre_money / pre-round shares`),
//! converts SAFEs and notes when asked to, then issues investor and option
//! pool shares. The pool is sized with the closed form
//! `pool = p × (pre + investor) / (1 − p)` so it equals `p` of the post-round
//! total without iterating. Every share-count division floors; fractional
//! shares are forfeited so the parts never exceed the total.

use serde::{Deserialize, Serialize};

use crate::domain::{ensure_unique_ids, mul_div_floor, percentage_of};
use crate::{
    ArithmeticError, BasisPoints, ConservationViolation, EngineError, Instrument, Money,
    ShareClass, SharePrice, ShareholderPosition, ValidationError,
};

/// Terms of a priced financing round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundScenario {
    pub name: String,
    pub pre_money: Money,
    pub investment_amount: Money,
    /// Supplied price; derived from `pre_money` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_per_share: Option<Money>,
    pub share_class: ShareClass,
    /// Post-round option pool target, in basis points of fully-diluted shares.
    #[serde(default)]
    pub option_pool_increase_bps: BasisPoints,
    #[serde(default)]
    pub include_conversion: bool,
}

impl RoundScenario {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.pre_money.ensure_non_negative("pre_money")?;
        self.investment_amount.ensure_positive("investment_amount")?;
        if let Some(price) = self.price_per_share {
            price.ensure_positive("price_per_share")?;
        }
        self.option_pool_increase_bps
            .ensure_below("option_pool_increase_bps", BasisPoints::ONE_HUNDRED_PERCENT)?;
        Ok(())
    }
}

/// A position annotated with its share of the snapshot total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OwnershipLine {
    #[serde(flatten)]
    pub position: ShareholderPosition,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreRoundSnapshot {
    pub total_shares: u64,
    pub shareholder_positions: Vec<OwnershipLine>,
}

/// Shares created by the round for a party that held none before it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssuedBlock {
    pub shares: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostRoundSnapshot {
    pub total_shares: u64,
    pub shareholder_positions: Vec<OwnershipLine>,
    pub new_shares_issued: u64,
    pub investor_share_class: ShareClass,
    pub investor: IssuedBlock,
    pub option_pool: IssuedBlock,
}

/// Percentage-point change in one holder's ownership.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HolderDilution {
    pub id: String,
    pub name: String,
    pub pre_round_percentage: f64,
    pub post_round_percentage: f64,
    pub dilution: f64,
}

/// A SAFE or note turned into priced shares by the round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionRecord {
    pub id: String,
    pub instrument: &'static str,
    pub amount: Money,
    /// Conversion price rounded down to a minor unit.
    pub conversion_price: Money,
    pub shares: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DilutionResult {
    pub scenario_name: String,
    /// Round price rounded down to a minor unit.
    pub price_per_share: Money,
    pub price_derived: bool,
    pub pre_round: PreRoundSnapshot,
    pub post_round: PostRoundSnapshot,
    pub dilution: Vec<HolderDilution>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conversions: Vec<ConversionRecord>,
}

impl DilutionResult {
    pub fn holder(&self, id: &str) -> Option<&HolderDilution> {
        self.dilution.iter().find(|entry| entry.id == id)
    }
}

/// Produces the post-round cap table for `scenario` applied to `positions`.
///
/// Inputs are never mutated; every call builds its own working state.
pub fn compute_dilution(
    positions: &[ShareholderPosition],
    scenario: &RoundScenario,
) -> Result<DilutionResult, EngineError> {
    if positions.is_empty() {
        return Err(ValidationError::EmptyCollection {
            collection: "positions",
        }
        .into());
    }
    for position in positions {
        position.validate()?;
    }
    ensure_unique_ids(positions.iter().map(|position| position.id.as_str()))?;
    scenario.validate()?;

    let base_shares = sum_shares(positions.iter().map(|position| position.shares))?;
    if base_shares == 0 {
        return Err(ValidationError::ZeroTotalShares.into());
    }

    let price = resolve_round_price(scenario, base_shares)?;
    tracing::debug!(
        scenario = %scenario.name,
        price_minor_units = price.as_f64(),
        derived = scenario.price_per_share.is_none(),
        "resolved round price"
    );

    let (holders, conversions) = if scenario.include_conversion {
        convert_instruments(positions, price, base_shares, scenario.share_class)?
    } else {
        (positions.to_vec(), Vec::new())
    };

    let pre_total = sum_shares(holders.iter().map(|position| position.shares))?;

    let investor_shares = price.shares_for(scenario.investment_amount)?;
    if investor_shares == 0 {
        tracing::warn!(
            scenario = %scenario.name,
            "investment buys less than one share; the round issues no investor shares"
        );
    }

    let pool_shares = option_pool_shares(
        scenario.option_pool_increase_bps,
        pre_total,
        investor_shares,
    )?;

    let new_shares_issued = investor_shares
        .checked_add(pool_shares)
        .ok_or(ArithmeticError::Overflow {
            context: "new share issuance",
        })?;
    let post_total = pre_total
        .checked_add(new_shares_issued)
        .ok_or(ArithmeticError::Overflow {
            context: "post-round share total",
        })?;

    let pre_lines = ownership_lines(&holders, pre_total);
    let post_lines = ownership_lines(&holders, post_total);

    let dilution = pre_lines
        .iter()
        .zip(&post_lines)
        .map(|(pre, post)| HolderDilution {
            id: pre.position.id.clone(),
            name: pre.position.name.clone(),
            pre_round_percentage: pre.percentage,
            post_round_percentage: post.percentage,
            dilution: pre.percentage - post.percentage,
        })
        .collect();

    let held_after = sum_shares(post_lines.iter().map(|line| line.position.shares))?;
    let accounted = held_after.saturating_add(new_shares_issued);
    if accounted != post_total {
        return Err(ConservationViolation::Shares {
            expected: post_total,
            actual: accounted,
        }
        .into());
    }

    Ok(DilutionResult {
        scenario_name: scenario.name.clone(),
        price_per_share: price.floor_money()?,
        price_derived: scenario.price_per_share.is_none(),
        pre_round: PreRoundSnapshot {
            total_shares: pre_total,
            shareholder_positions: pre_lines,
        },
        post_round: PostRoundSnapshot {
            total_shares: post_total,
            shareholder_positions: post_lines,
            new_shares_issued,
            investor_share_class: scenario.share_class,
            investor: IssuedBlock {
                shares: investor_shares,
                percentage: percentage_of(u128::from(investor_shares), u128::from(post_total)),
            },
            option_pool: IssuedBlock {
                shares: pool_shares,
                percentage: percentage_of(u128::from(pool_shares), u128::from(post_total)),
            },
        },
        dilution,
        conversions,
    })
}

/// Supplied price, else `pre_money / fully-diluted pre-round shares`.
pub fn resolve_round_price(
    scenario: &RoundScenario,
    pre_round_shares: u64,
) -> Result<SharePrice, EngineError> {
    if let Some(price) = scenario.price_per_share {
        return Ok(SharePrice::from_money(price.ensure_positive("price_per_share")?));
    }

    if scenario.pre_money.minor_units() <= 0 || pre_round_shares == 0 {
        return Err(ArithmeticError::NonPositivePrice {
            pre_money: scenario.pre_money.minor_units(),
            shares: pre_round_shares,
        }
        .into());
    }

    Ok(SharePrice::from_ratio(scenario.pre_money, pre_round_shares)?)
}

/// `floor(bps × (pre + investor) / (10_000 − bps))`, the pool size that makes
/// the pool `bps` of the post-round total.
pub fn option_pool_shares(
    pool: BasisPoints,
    pre_round_shares: u64,
    investor_shares: u64,
) -> Result<u64, ArithmeticError> {
    if pool.is_zero() {
        return Ok(0);
    }
    let context = "option pool sizing";
    let remaining = BasisPoints::ONE_HUNDRED_PERCENT
        .checked_sub(pool.get())
        .filter(|remaining| *remaining > 0)
        .ok_or(ArithmeticError::Overflow { context })?;
    let base = u128::from(pre_round_shares) + u128::from(investor_shares);
    let shares = mul_div_floor(base, u128::from(pool.get()), u128::from(remaining), context)?;
    u64::try_from(shares).map_err(|_| ArithmeticError::Overflow { context })
}

fn convert_instruments(
    positions: &[ShareholderPosition],
    round_price: SharePrice,
    base_shares: u64,
    share_class: ShareClass,
) -> Result<(Vec<ShareholderPosition>, Vec<ConversionRecord>), EngineError> {
    let mut holders = Vec::with_capacity(positions.len());
    let mut conversions = Vec::new();

    for position in positions {
        let Some(terms) = position.instrument.conversion_terms()? else {
            holders.push(position.clone());
            continue;
        };

        let mut price = round_price.discounted(terms.discount)?;
        if let Some(cap) = terms.valuation_cap {
            price = price.min(SharePrice::from_ratio(cap, base_shares)?)?;
        }
        if !price.is_positive() {
            return Err(ArithmeticError::NonPositiveConversionPrice {
                id: position.id.clone(),
            }
            .into());
        }

        let shares = price.shares_for(terms.amount)?;
        let conversion_price = price.floor_money()?;
        tracing::debug!(
            id = %position.id,
            instrument = position.instrument.kind(),
            shares,
            "converted instrument into priced equity"
        );

        conversions.push(ConversionRecord {
            id: position.id.clone(),
            instrument: position.instrument.kind(),
            amount: terms.amount,
            conversion_price,
            shares,
        });
        holders.push(ShareholderPosition {
            id: position.id.clone(),
            name: position.name.clone(),
            shares,
            share_class,
            price_per_share: conversion_price,
            instrument: Instrument::Equity,
        });
    }

    Ok((holders, conversions))
}

fn ownership_lines(positions: &[ShareholderPosition], total_shares: u64) -> Vec<OwnershipLine> {
    positions
        .iter()
        .map(|position| OwnershipLine {
            position: position.clone(),
            percentage: percentage_of(u128::from(position.shares), u128::from(total_shares)),
        })
        .collect()
}

fn sum_shares(mut shares: impl Iterator<Item = u64>) -> Result<u64, ArithmeticError> {
    shares
        .try_fold(0u64, u64::checked_add)
        .ok_or(ArithmeticError::Overflow {
            context: "share total",
        })
}
