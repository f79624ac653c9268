//! Shared fixtures for capmath behavior tests.

pub use capmath_core::{
    BasisPoints, CalendarDate, Money, RoundScenario, ShareClass, ShareholderPosition,
    VestingFrequency, VestingSchedule, WaterfallClass, WaterfallInput,
};

pub fn common_holder(id: &str, shares: u64) -> ShareholderPosition {
    ShareholderPosition::new(id, id, shares, ShareClass::Common, Money::from_minor(1))
        .expect("fixture position is valid")
}

/// Founders at 80/20 of ten million shares.
pub fn founders() -> Vec<ShareholderPosition> {
    vec![common_holder("alice", 8_000_000), common_holder("bob", 2_000_000)]
}

/// $10M pre, $5M raise at $1.50, 10% post-round pool.
pub fn series_a() -> RoundScenario {
    RoundScenario {
        name: "Series A".to_owned(),
        pre_money: Money::from_major(10_000_000),
        investment_amount: Money::from_major(5_000_000),
        price_per_share: Some(Money::from_minor(150)),
        share_class: ShareClass::Preferred,
        option_pool_increase_bps: BasisPoints::new(1_000),
        include_conversion: false,
    }
}

pub fn preferred_class(id: &str, seniority: u32, preference_major: i64, shares: u64) -> WaterfallClass {
    WaterfallClass {
        id: id.to_owned(),
        name: id.to_owned(),
        seniority,
        liquidation_preference_amount: Money::from_major(preference_major),
        participating: false,
        participation_cap: None,
        as_converted_shares: shares,
    }
}

pub fn exit_input(exit_major: i64, classes: Vec<WaterfallClass>, common_shares: u64) -> WaterfallInput {
    WaterfallInput {
        exit_value: Money::from_major(exit_major),
        classes,
        common_as_converted_shares: common_shares,
    }
}

pub fn date(input: &str) -> CalendarDate {
    CalendarDate::parse(input).expect("fixture date is valid")
}

/// Four years monthly with a one-year cliff from 2024-01-01.
pub fn standard_schedule() -> VestingSchedule {
    VestingSchedule {
        start: date("2024-01-01"),
        cliff_months: 12,
        duration_months: 48,
        frequency: VestingFrequency::Monthly,
        acceleration: None,
    }
}
