//! Equity math for capitalization tables.
//!
//! This crate contains:
//! - Money, basis-point, price and calendar value types
//! - Financing-round dilution with option pools and convertible conversion
//! - Liquidation waterfalls with seniority, participation caps and conversion elections
//! - Time-based vesting with cliffs and acceleration
//! - The response envelope shared by machine-readable outputs
//!
//! Every operation is a pure function of its inputs.

pub mod computation;
pub mod dilution;
pub mod domain;
pub mod envelope;
pub mod error;
pub mod vesting;
pub mod waterfall;

pub use computation::Computation;
pub use dilution::{
    compute_dilution, option_pool_shares, resolve_round_price, ConversionRecord, DilutionResult,
    HolderDilution, IssuedBlock, OwnershipLine, PostRoundSnapshot, PreRoundSnapshot,
    RoundScenario,
};
pub use domain::{
    BasisPoints, CalendarDate, ConversionTerms, Instrument, Money, ShareClass, SharePrice,
    ShareholderPosition, UtcTimestamp, VestingFrequency,
};
pub use envelope::{Envelope, EnvelopeError, EnvelopeMeta, SCHEMA_VERSION};
pub use error::{ArithmeticError, ConservationViolation, EngineError, ValidationError};
pub use vesting::{
    compute_unvested, compute_vested, next_vesting_date, vesting_events, Acceleration,
    AccelerationTrigger, Grant, VestingEvent, VestingSchedule, VestingSummary,
};
pub use waterfall::{
    allocate_to_holders, compute_waterfall, Distribution, HolderPayout, HolderStake,
    WaterfallClass, WaterfallInput, WaterfallResult, COMMON_POOL_ID,
};
