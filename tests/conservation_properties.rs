//! Property tests for the invariants every computation must hold for any
//! valid input: shares and money are conserved and vesting only moves forward.

use capmath_core::{
    compute_dilution, compute_vested, compute_waterfall, vesting_events, BasisPoints,
    CalendarDate, Instrument, Money, RoundScenario, ShareClass, ShareholderPosition,
    VestingFrequency, VestingSchedule, WaterfallClass, WaterfallInput,
};
use capmath_tests::common_holder;
use proptest::prelude::*;

fn waterfall_class() -> impl Strategy<Value = (u32, i64, u64, bool, Option<i64>)> {
    (
        1u32..=3,
        0i64..1_000_000_000,
        0u64..10_000_000,
        any::<bool>(),
        prop::option::of(0i64..2_000_000_000),
    )
}

/// A SAFE or note holding no shares until the round converts it.
fn convertible() -> impl Strategy<Value = Instrument> {
    (
        any::<bool>(),
        1i64..1_000_000_000,
        0i64..100_000_000,
        prop::option::of(1_000_000i64..10_000_000_000_000),
        0u32..10_000,
    )
        .prop_map(|(note, amount, interest, cap, discount)| {
            let valuation_cap = cap.map(Money::from_minor);
            let discount_bps = BasisPoints::new(discount);
            if note {
                Instrument::ConvertibleNote {
                    principal: Money::from_minor(amount),
                    accrued_interest: Money::from_minor(interest),
                    valuation_cap,
                    discount_bps,
                }
            } else {
                Instrument::Safe {
                    investment: Money::from_minor(amount),
                    valuation_cap,
                    discount_bps,
                }
            }
        })
}

fn frequency() -> impl Strategy<Value = VestingFrequency> {
    prop::sample::select(VestingFrequency::ALL.to_vec())
}

proptest! {
    #[test]
    fn dilution_conserves_shares(
        holdings in prop::collection::vec(1u64..100_000_000, 1..6),
        convertibles in prop::collection::vec(convertible(), 0..4),
        include_conversion in any::<bool>(),
        pre_money in 1_000_000i64..1_000_000_000_000,
        investment in 1i64..100_000_000_000,
        price in prop::option::of(1i64..100_000),
        pool_bps in 0u32..5_000,
    ) {
        let base_shares: u64 = holdings.iter().sum();
        let mut positions: Vec<_> = holdings
            .iter()
            .enumerate()
            .map(|(index, shares)| common_holder(&format!("holder-{index}"), *shares))
            .collect();
        for (index, instrument) in convertibles.iter().enumerate() {
            let id = format!("convertible-{index}");
            let position = ShareholderPosition::new(&id, &id, 0, ShareClass::Common, Money::ZERO)
                .and_then(|position| position.with_instrument(instrument.clone()))
                .expect("valid convertible");
            positions.push(position);
        }
        let scenario = RoundScenario {
            name: "property".to_owned(),
            pre_money: Money::from_minor(pre_money),
            investment_amount: Money::from_minor(investment),
            price_per_share: price.map(Money::from_minor),
            share_class: ShareClass::Preferred,
            option_pool_increase_bps: BasisPoints::new(pool_bps),
            include_conversion,
        };

        let result = compute_dilution(&positions, &scenario).expect("valid round");
        let post = &result.post_round;

        let converted: u64 = result.conversions.iter().map(|record| record.shares).sum();
        let expected_conversions = if include_conversion { convertibles.len() } else { 0 };
        prop_assert_eq!(result.conversions.len(), expected_conversions);
        prop_assert_eq!(result.pre_round.total_shares, base_shares + converted);

        prop_assert_eq!(post.new_shares_issued, post.investor.shares + post.option_pool.shares);
        prop_assert_eq!(post.total_shares, result.pre_round.total_shares + post.new_shares_issued);

        let percentage_sum: f64 = post
            .shareholder_positions
            .iter()
            .map(|line| line.percentage)
            .sum::<f64>()
            + post.investor.percentage
            + post.option_pool.percentage;
        prop_assert!((percentage_sum - 100.0).abs() < 1e-6);

        for holder in &result.dilution {
            prop_assert!(holder.post_round_percentage <= holder.pre_round_percentage + 1e-9);
        }
        prop_assert!(
            u128::from(post.option_pool.shares) * 10_000
                <= u128::from(pool_bps) * u128::from(post.total_shares)
        );
    }

    #[test]
    fn waterfall_distributes_exactly_the_exit_value(
        classes in prop::collection::vec(waterfall_class(), 0..4),
        common_shares in 1u64..10_000_000,
        exit in 0i64..5_000_000_000,
    ) {
        let classes: Vec<WaterfallClass> = classes
            .into_iter()
            .enumerate()
            .map(|(index, (seniority, preference, shares, participating, cap_headroom))| {
                WaterfallClass {
                    id: format!("class-{index}"),
                    name: format!("Class {index}"),
                    seniority,
                    liquidation_preference_amount: Money::from_minor(preference),
                    participating,
                    participation_cap: cap_headroom
                        .filter(|_| participating)
                        .map(|headroom| Money::from_minor(preference + headroom)),
                    as_converted_shares: shares,
                }
            })
            .collect();
        let input = WaterfallInput {
            exit_value: Money::from_minor(exit),
            classes,
            common_as_converted_shares: common_shares,
        };

        let result = compute_waterfall(&input).expect("valid waterfall");

        prop_assert_eq!(result.total_distributed(), input.exit_value);
        prop_assert!(result.election_sweeps <= input.classes.len() + 1);
        for (class, distribution) in input.classes.iter().zip(&result.distributions) {
            prop_assert!(distribution.total >= Money::ZERO);
            prop_assert!(distribution.total <= input.exit_value);
            if distribution.converted {
                continue;
            }
            prop_assert!(distribution.liquidation_pref <= class.liquidation_preference_amount);
            if !class.participating {
                prop_assert_eq!(distribution.participation, Money::ZERO);
            }
            if let Some(cap) = class.participation_cap {
                prop_assert!(distribution.total <= cap);
            }
        }
    }

    #[test]
    fn vesting_is_monotonic_and_bounded(
        quantity in 0u64..10_000_000,
        (year, month, day) in (2000i32..2030, 1u8..=12, 1u8..=28),
        cliff in 0u32..24,
        extra in 1u32..60,
        frequency in frequency(),
        first_offset in 0i64..2_500,
        gap in 0i64..400,
    ) {
        let start = CalendarDate::from_ymd(year, month, day).expect("valid date");
        let schedule = VestingSchedule {
            start,
            cliff_months: cliff,
            duration_months: cliff + extra,
            frequency,
            acceleration: None,
        };
        let shift = |days: i64| {
            CalendarDate::from_date(start.into_inner() + time::Duration::days(days - 200))
        };

        let earlier = compute_vested(quantity, &schedule, shift(first_offset)).expect("valid");
        let later = compute_vested(quantity, &schedule, shift(first_offset + gap)).expect("valid");
        prop_assert!(earlier <= later);
        prop_assert!(later <= quantity);

        let end = schedule.end_date().expect("end date");
        prop_assert_eq!(compute_vested(quantity, &schedule, end).expect("valid"), quantity);

        let events = vesting_events(quantity, &schedule).expect("valid");
        prop_assert_eq!(events.iter().map(|event| event.increment).sum::<u64>(), quantity);
        prop_assert!(events.windows(2).all(|pair| pair[0].date < pair[1].date));
    }
}
