//! # Domain Model
//!
//! Numeric and security types shared by the dilution, waterfall and vesting
//! engines.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Money`] | Exact amount in minor currency units |
//! | [`BasisPoints`] | Fraction in 1/10_000ths |
//! | [`SharePrice`] | Exact rational price per share |
//! | [`ShareholderPosition`] | One holder's stake and its [`Instrument`] |
//! | [`CalendarDate`] | `YYYY-MM-DD` date with month arithmetic |
//! | [`VestingFrequency`] | Monthly, quarterly or annual periods |
//! | [`UtcTimestamp`] | Envelope generation time |
//!
//! Money never passes through floating point. Percentages are `f64` and are
//! for reporting only.

mod date;
mod frequency;
mod money;
mod price;
mod security;
mod timestamp;

pub use date::CalendarDate;
pub use frequency::VestingFrequency;
pub use money::{BasisPoints, Money};
pub use price::SharePrice;
pub use security::{ConversionTerms, Instrument, ShareClass, ShareholderPosition};
pub use timestamp::UtcTimestamp;

pub(crate) use money::{mul_div_floor, percentage_of, split_pro_rata};
pub(crate) use security::ensure_unique_ids;
