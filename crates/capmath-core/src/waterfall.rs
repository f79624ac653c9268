//! Exit-proceeds waterfall.
//!
//! Preferences are paid tier by tier (seniority rank 1 first, equal ranks share
//! a tier pro rata by claim), then whatever is left is shared by as-converted
//! shares among converted classes, participating classes and the common pool.
//! Participation caps are clamped iteratively, with the excess redistributed
//! to the uncapped participants.
//!
//! Classes whose payout can improve by converting (non-participating, or
//! participating with a cap) elect conversion only when it pays strictly more.
//! Elections are re-evaluated against the current election vector until a
//! sweep over all classes changes nothing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{ensure_unique_ids, percentage_of, split_pro_rata};
use crate::{ArithmeticError, ConservationViolation, EngineError, Money, ValidationError};

/// Identifier of the residual common pool in distributions.
pub const COMMON_POOL_ID: &str = "common";

/// A security class in the preference stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaterfallClass {
    pub id: String,
    pub name: String,
    /// Rank 1 is paid first; equal ranks share a tier.
    pub seniority: u32,
    /// Total preference claim (multiple × original investment).
    pub liquidation_preference_amount: Money,
    #[serde(default)]
    pub participating: bool,
    /// Ceiling on preference plus participation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participation_cap: Option<Money>,
    pub as_converted_shares: u64,
}

impl WaterfallClass {
    /// Whether converting to common could ever beat keeping the preference.
    fn may_elect_conversion(&self) -> bool {
        !self.participating || self.participation_cap.is_some()
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.liquidation_preference_amount
            .ensure_non_negative("liquidation_preference_amount")?;
        if let Some(cap) = self.participation_cap {
            cap.ensure_non_negative("participation_cap")?;
            if cap < self.liquidation_preference_amount {
                return Err(ValidationError::CapBelowPreference {
                    id: self.id.clone(),
                    cap: cap.minor_units(),
                    preference: self.liquidation_preference_amount.minor_units(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaterfallInput {
    pub exit_value: Money,
    pub classes: Vec<WaterfallClass>,
    /// Common shares outside every preferred class.
    pub common_as_converted_shares: u64,
}

impl WaterfallInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.exit_value.ensure_non_negative("exit_value")?;
        ensure_unique_ids(
            self.classes
                .iter()
                .map(|class| class.id.as_str())
                .chain(std::iter::once(COMMON_POOL_ID)),
        )?;
        for class in &self.classes {
            class.validate()?;
        }

        let total_shares = self
            .classes
            .iter()
            .map(|class| u128::from(class.as_converted_shares))
            .sum::<u128>()
            + u128::from(self.common_as_converted_shares);
        let preference_stack = self
            .classes
            .iter()
            .map(|class| class.liquidation_preference_amount.as_u128())
            .sum::<u128>();
        if total_shares == 0 && self.exit_value.as_u128() > preference_stack {
            return Err(ValidationError::NoResidualClaimant);
        }

        Ok(())
    }

    /// Same structure at a different exit value, for scenario sweeps.
    pub fn with_exit_value(&self, exit_value: Money) -> Self {
        Self {
            exit_value,
            ..self.clone()
        }
    }
}

/// Payout to one class, or to the common pool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Distribution {
    pub id: String,
    pub name: String,
    pub as_converted_shares: u64,
    pub converted: bool,
    pub liquidation_pref: Money,
    pub participation: Money,
    pub common: Money,
    pub total: Money,
    pub percentage: f64,
    /// `total / as_converted_shares` rounded down; absent without shares.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implied_share_price: Option<Money>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaterfallResult {
    pub exit_value: Money,
    pub distributions: Vec<Distribution>,
    /// Election sweeps run before the election vector settled.
    pub election_sweeps: usize,
}

impl WaterfallResult {
    pub fn distribution(&self, id: &str) -> Option<&Distribution> {
        self.distributions.iter().find(|entry| entry.id == id)
    }

    pub fn total_distributed(&self) -> Money {
        Money::from_minor(
            self.distributions
                .iter()
                .map(|entry| entry.total.minor_units())
                .sum(),
        )
    }
}

/// Computes the exact payout to every class and the common pool.
///
/// The distribution totals always sum to `exit_value`; anything else is
/// reported as [`ConservationViolation::Money`].
pub fn compute_waterfall(input: &WaterfallInput) -> Result<WaterfallResult, EngineError> {
    input.validate()?;

    let (converted, election_sweeps) = settle_elections(input)?;
    let allocation = allocate(input, &converted)?;

    if allocation.unallocated > 0 {
        tracing::error!(
            unallocated = %allocation.unallocated,
            "waterfall left proceeds without a claimant"
        );
    }

    let exit = input.exit_value.as_u128();
    let mut distributions = Vec::with_capacity(input.classes.len() + 1);
    for (index, class) in input.classes.iter().enumerate() {
        let preference = allocation.preference[index];
        let residual = allocation.residual[index];
        let (participation, common) = if converted[index] {
            (0, residual)
        } else {
            (residual, 0)
        };
        distributions.push(build_distribution(
            &class.id,
            &class.name,
            class.as_converted_shares,
            converted[index],
            [preference, participation, common],
            exit,
        )?);
    }
    distributions.push(build_distribution(
        COMMON_POOL_ID,
        "Common",
        input.common_as_converted_shares,
        false,
        [0, 0, allocation.common],
        exit,
    )?);

    let result = WaterfallResult {
        exit_value: input.exit_value,
        distributions,
        election_sweeps,
    };

    let distributed = result.total_distributed();
    if distributed != input.exit_value {
        return Err(ConservationViolation::Money {
            expected: input.exit_value.minor_units(),
            actual: distributed.minor_units(),
        }
        .into());
    }

    Ok(result)
}

/// One holder's stake inside a single class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolderStake {
    pub holder_id: String,
    pub shares: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HolderPayout {
    pub holder_id: String,
    pub shares: u64,
    pub amount: Money,
}

/// Splits one class's total across its holders by share count. Units lost to
/// flooring go to the largest holder.
pub fn allocate_to_holders(
    distribution: &Distribution,
    holders: &[HolderStake],
) -> Result<Vec<HolderPayout>, EngineError> {
    ensure_unique_ids(holders.iter().map(|holder| holder.holder_id.as_str()))?;

    let weights: Vec<u128> = holders
        .iter()
        .map(|holder| u128::from(holder.shares))
        .collect();
    let total = distribution.total.as_u128();
    if total > 0 && weights.iter().all(|weight| *weight == 0) {
        return Err(ValidationError::ZeroTotalShares.into());
    }

    let parts = split_pro_rata(total, &weights)?;
    let payouts = holders
        .iter()
        .zip(parts)
        .map(|(holder, part)| {
            Ok(HolderPayout {
                holder_id: holder.holder_id.clone(),
                shares: holder.shares,
                amount: Money::from_u128(part, "holder payout")?,
            })
        })
        .collect::<Result<Vec<_>, ArithmeticError>>()?;

    let paid: i64 = payouts.iter().map(|payout| payout.amount.minor_units()).sum();
    if paid != distribution.total.minor_units() {
        return Err(ConservationViolation::Money {
            expected: distribution.total.minor_units(),
            actual: paid,
        }
        .into());
    }

    Ok(payouts)
}

/// Amounts in minor units, indexed like `WaterfallInput::classes`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Allocation {
    preference: Vec<u128>,
    residual: Vec<u128>,
    common: u128,
    unallocated: u128,
}

impl Allocation {
    fn payout(&self, index: usize) -> u128 {
        self.preference[index] + self.residual[index]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Participant {
    Class(usize),
    CommonPool,
}

/// Iterates class-by-class best responses until a full sweep is stable.
fn settle_elections(input: &WaterfallInput) -> Result<(Vec<bool>, usize), EngineError> {
    let class_count = input.classes.len();
    let max_sweeps = 2 * class_count + 2;
    let mut converted = vec![false; class_count];

    let eligible: Vec<usize> = input
        .classes
        .iter()
        .enumerate()
        .filter(|(_, class)| class.may_elect_conversion())
        .map(|(index, _)| index)
        .collect();
    if eligible.is_empty() || input.exit_value.is_zero() {
        return Ok((converted, 0));
    }

    let mut sweeps = 0;
    loop {
        sweeps += 1;
        let mut changed = false;

        for &index in &eligible {
            let previous = converted[index];
            converted[index] = false;
            let keep_preference = allocate(input, &converted)?.payout(index);
            converted[index] = true;
            let as_converted = allocate(input, &converted)?.payout(index);

            // Ties keep the preference.
            let elect = as_converted > keep_preference;
            converted[index] = elect;

            if elect != previous {
                changed = true;
                tracing::debug!(
                    class = %input.classes[index].id,
                    keep_preference = %keep_preference,
                    as_converted = %as_converted,
                    elect,
                    sweep = sweeps,
                    "conversion election changed"
                );
            }
        }

        if !changed {
            tracing::debug!(sweeps, "conversion elections settled");
            return Ok((converted, sweeps));
        }
        if sweeps >= max_sweeps {
            return Err(ConservationViolation::ElectionUnstable { sweeps }.into());
        }
    }
}

/// Runs preferences then participation for a fixed election vector.
fn allocate(input: &WaterfallInput, converted: &[bool]) -> Result<Allocation, ArithmeticError> {
    let class_count = input.classes.len();
    let mut preference = vec![0u128; class_count];
    let mut remaining = input.exit_value.as_u128();

    let mut tiers: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (index, class) in input.classes.iter().enumerate() {
        if !converted[index] {
            tiers.entry(class.seniority).or_default().push(index);
        }
    }

    for members in tiers.values() {
        let claims: Vec<u128> = members
            .iter()
            .map(|&index| input.classes[index].liquidation_preference_amount.as_u128())
            .collect();
        let tier_claim: u128 = claims.iter().sum();

        if tier_claim <= remaining {
            for (&index, claim) in members.iter().zip(&claims) {
                preference[index] = *claim;
            }
            remaining -= tier_claim;
        } else {
            let parts = split_pro_rata(remaining, &claims)?;
            for (&index, part) in members.iter().zip(parts) {
                preference[index] = part;
            }
            remaining = 0;
        }
    }

    let mut participants = Vec::with_capacity(class_count + 1);
    for (index, class) in input.classes.iter().enumerate() {
        if converted[index] {
            participants.push((Participant::Class(index), class.as_converted_shares, None));
        } else if class.participating {
            let headroom = class
                .participation_cap
                .map(|cap| cap.as_u128().saturating_sub(preference[index]));
            participants.push((Participant::Class(index), class.as_converted_shares, headroom));
        }
    }
    participants.push((
        Participant::CommonPool,
        input.common_as_converted_shares,
        None,
    ));

    let mut residual = vec![0u128; class_count];
    let mut common = 0u128;
    let mut fixed = vec![false; participants.len()];
    let mut pool = remaining;

    loop {
        let active: Vec<usize> = (0..participants.len()).filter(|&i| !fixed[i]).collect();
        let weights: Vec<u128> = active
            .iter()
            .map(|&i| u128::from(participants[i].1))
            .collect();
        let parts = split_pro_rata(pool, &weights)?;

        let mut clamped = false;
        for (&i, part) in active.iter().zip(&parts) {
            if let Some(headroom) = participants[i].2 {
                if *part > headroom {
                    fixed[i] = true;
                    clamped = true;
                    pool -= headroom;
                    if let Participant::Class(index) = participants[i].0 {
                        residual[index] = headroom;
                    }
                }
            }
        }

        if clamped {
            tracing::trace!(pool = %pool, "participation cap clamped, redistributing");
            continue;
        }

        let mut allocated = 0u128;
        for (&i, part) in active.iter().zip(parts) {
            match participants[i].0 {
                Participant::Class(index) => residual[index] = part,
                Participant::CommonPool => common = part,
            }
            allocated += part;
        }

        return Ok(Allocation {
            preference,
            residual,
            common,
            unallocated: pool - allocated,
        });
    }
}

fn build_distribution(
    id: &str,
    name: &str,
    as_converted_shares: u64,
    converted: bool,
    [preference, participation, common]: [u128; 3],
    exit: u128,
) -> Result<Distribution, ArithmeticError> {
    let total = preference + participation + common;
    let implied_share_price = if as_converted_shares == 0 {
        None
    } else {
        Some(Money::from_u128(
            total / u128::from(as_converted_shares),
            "implied share price",
        )?)
    };

    Ok(Distribution {
        id: id.to_owned(),
        name: name.to_owned(),
        as_converted_shares,
        converted,
        liquidation_pref: Money::from_u128(preference, "liquidation preference")?,
        participation: Money::from_u128(participation, "participation")?,
        common: Money::from_u128(common, "common payout")?,
        total: Money::from_u128(total, "distribution total")?,
        percentage: percentage_of(total, exit),
        implied_share_price,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(id: &str, seniority: u32, preference_major: i64, shares: u64) -> WaterfallClass {
        WaterfallClass {
            id: id.to_owned(),
            name: id.to_uppercase(),
            seniority,
            liquidation_preference_amount: Money::from_major(preference_major),
            participating: false,
            participation_cap: None,
            as_converted_shares: shares,
        }
    }

    fn input(exit_major: i64, classes: Vec<WaterfallClass>, common: u64) -> WaterfallInput {
        WaterfallInput {
            exit_value: Money::from_major(exit_major),
            classes,
            common_as_converted_shares: common,
        }
    }

    fn total(result: &WaterfallResult, id: &str) -> Money {
        result.distribution(id).expect("distribution present").total
    }

    #[test]
    fn tie_between_preference_and_conversion_keeps_preference() {
        let result = compute_waterfall(&input(
            20_000_000,
            vec![class("series_a", 1, 5_000_000, 3_333_333)],
            10_000_000,
        ))
        .expect("valid waterfall");

        let preferred = result.distribution("series_a").expect("present");
        assert!(!preferred.converted);
        assert_eq!(preferred.liquidation_pref, Money::from_major(5_000_000));
        assert_eq!(total(&result, COMMON_POOL_ID), Money::from_major(15_000_000));
        assert_eq!(result.total_distributed(), result.exit_value);
    }

    #[test]
    fn conversion_value_is_measured_after_senior_preferences() {
        // Half the shares would be half of $20M, but only $10M is left behind
        // the senior stack, so converting is worth $5M against a $6M preference.
        let result = compute_waterfall(&input(
            20_000_000,
            vec![
                class("senior", 1, 10_000_000, 0),
                class("junior", 2, 6_000_000, 1_000_000),
            ],
            1_000_000,
        ))
        .expect("valid waterfall");

        let junior = result.distribution("junior").expect("present");
        assert!(!junior.converted);
        assert_eq!(junior.liquidation_pref, Money::from_major(6_000_000));
        assert_eq!(junior.total, Money::from_major(6_000_000));

        let senior = result.distribution("senior").expect("present");
        assert!(!senior.converted);
        assert_eq!(senior.total, Money::from_major(10_000_000));
        assert_eq!(total(&result, COMMON_POOL_ID), Money::from_major(4_000_000));
    }

    #[test]
    fn converts_when_pro_rata_beats_preference() {
        let result = compute_waterfall(&input(
            50_000_000,
            vec![class("series_a", 1, 5_000_000, 3_333_333)],
            10_000_000,
        ))
        .expect("valid waterfall");

        let preferred = result.distribution("series_a").expect("present");
        assert!(preferred.converted);
        assert_eq!(preferred.liquidation_pref, Money::ZERO);
        assert_eq!(preferred.common, Money::from_minor(1_249_999_906));
        assert_eq!(
            total(&result, COMMON_POOL_ID),
            Money::from_minor(3_750_000_094)
        );
        assert!(result.election_sweeps <= 4);
    }

    #[test]
    fn senior_tier_is_paid_before_junior() {
        let result = compute_waterfall(&input(
            8_000_000,
            vec![
                class("series_b", 1, 6_000_000, 1_000_000),
                class("series_a", 2, 4_000_000, 1_000_000),
            ],
            8_000_000,
        ))
        .expect("valid waterfall");

        assert_eq!(total(&result, "series_b"), Money::from_major(6_000_000));
        assert_eq!(total(&result, "series_a"), Money::from_major(2_000_000));
        assert_eq!(total(&result, COMMON_POOL_ID), Money::ZERO);
    }

    #[test]
    fn shared_tier_splits_shortfall_by_claim() {
        let result = compute_waterfall(&input(
            2_000_000,
            vec![
                class("series_b", 1, 3_000_000, 1_000_000),
                class("series_a", 1, 1_000_000, 1_000_000),
            ],
            8_000_000,
        ))
        .expect("valid waterfall");

        assert_eq!(total(&result, "series_b"), Money::from_major(1_500_000));
        assert_eq!(total(&result, "series_a"), Money::from_major(500_000));
    }

    #[test]
    fn participating_class_takes_preference_and_pro_rata() {
        let mut participating = class("series_a", 1, 1_000_000, 1_000_000);
        participating.participating = true;

        let result = compute_waterfall(&input(5_000_000, vec![participating], 1_000_000))
            .expect("valid waterfall");

        let preferred = result.distribution("series_a").expect("present");
        assert_eq!(preferred.liquidation_pref, Money::from_major(1_000_000));
        assert_eq!(preferred.participation, Money::from_major(2_000_000));
        assert_eq!(total(&result, COMMON_POOL_ID), Money::from_major(2_000_000));
        assert_eq!(result.election_sweeps, 0);
    }

    #[test]
    fn cap_clamps_participation_until_conversion_pays_more() {
        let mut capped = class("series_a", 1, 1_000_000, 1_000_000);
        capped.participating = true;
        capped.participation_cap = Some(Money::from_major(2_000_000));

        let low = compute_waterfall(&input(3_000_000, vec![capped.clone()], 1_000_000))
            .expect("valid waterfall");
        let preferred = low.distribution("series_a").expect("present");
        assert!(!preferred.converted);
        assert_eq!(preferred.total, Money::from_major(2_000_000));
        assert_eq!(total(&low, COMMON_POOL_ID), Money::from_major(1_000_000));

        let high = compute_waterfall(&input(10_000_000, vec![capped], 1_000_000))
            .expect("valid waterfall");
        let preferred = high.distribution("series_a").expect("present");
        assert!(preferred.converted);
        assert_eq!(preferred.common, Money::from_major(5_000_000));
        assert_eq!(total(&high, COMMON_POOL_ID), Money::from_major(5_000_000));
    }

    #[test]
    fn odd_amounts_are_conserved_to_the_cent() {
        let mut capped = class("b", 2, 0, 3);
        capped.liquidation_preference_amount = Money::from_minor(101);
        capped.participating = true;
        capped.participation_cap = Some(Money::from_minor(500));
        let mut senior = class("a", 1, 0, 7);
        senior.liquidation_preference_amount = Money::from_minor(333);
        let mut junior = class("c", 2, 0, 11);
        junior.liquidation_preference_amount = Money::from_minor(99);

        let result = compute_waterfall(&WaterfallInput {
            exit_value: Money::from_minor(1_001),
            classes: vec![senior, capped, junior],
            common_as_converted_shares: 13,
        })
        .expect("valid waterfall");

        assert_eq!(total(&result, "a"), Money::from_minor(333));
        assert_eq!(total(&result, "b"), Money::from_minor(164));
        assert_eq!(total(&result, "c"), Money::from_minor(231));
        assert!(result.distribution("c").expect("present").converted);
        assert_eq!(total(&result, COMMON_POOL_ID), Money::from_minor(273));
        assert_eq!(result.total_distributed(), Money::from_minor(1_001));
    }

    #[test]
    fn zero_exit_pays_nothing() {
        let result = compute_waterfall(&input(
            0,
            vec![class("series_a", 1, 5_000_000, 3_333_333)],
            10_000_000,
        ))
        .expect("valid waterfall");

        for distribution in &result.distributions {
            assert_eq!(distribution.total, Money::ZERO);
            assert_eq!(distribution.percentage, 0.0);
        }
    }

    #[test]
    fn rejects_negative_exit_value() {
        let mut waterfall = input(0, Vec::new(), 1);
        waterfall.exit_value = Money::from_minor(-1);
        let err = compute_waterfall(&waterfall).expect_err("must fail");
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::NegativeValue { .. })
        ));
    }

    #[test]
    fn rejects_class_named_like_common_pool() {
        let err = compute_waterfall(&input(1, vec![class(COMMON_POOL_ID, 1, 1, 1)], 1))
            .expect_err("must fail");
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::DuplicateId { .. })
        ));
    }

    #[test]
    fn rejects_proceeds_without_claimant() {
        let err = compute_waterfall(&input(10, vec![class("a", 1, 5, 0)], 0))
            .expect_err("must fail");
        assert_eq!(
            err,
            EngineError::Validation(ValidationError::NoResidualClaimant)
        );
    }

    #[test]
    fn splits_class_total_across_holders() {
        let result = compute_waterfall(&input(
            20_000_000,
            vec![class("series_a", 1, 5_000_000, 3_333_333)],
            10_000_000,
        ))
        .expect("valid waterfall");
        let preferred = result.distribution("series_a").expect("present");

        let payouts = allocate_to_holders(
            preferred,
            &[
                HolderStake {
                    holder_id: "fund-1".to_owned(),
                    shares: 2_222_222,
                },
                HolderStake {
                    holder_id: "fund-2".to_owned(),
                    shares: 1_111_111,
                },
            ],
        )
        .expect("valid holders");

        let paid: i64 = payouts.iter().map(|payout| payout.amount.minor_units()).sum();
        assert_eq!(paid, preferred.total.minor_units());
        assert!(payouts[0].amount > payouts[1].amount);
    }
}
