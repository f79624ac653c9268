use thiserror::Error;

/// Malformed or out-of-range input rejected before any computation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("field '{field}' must be non-negative, got {value}")]
    NegativeValue { field: &'static str, value: i64 },
    #[error("field '{field}' must be positive")]
    NonPositiveValue { field: &'static str },
    #[error("field '{field}' must be between 0 and {max} basis points, got {value}")]
    BasisPointsOutOfRange {
        field: &'static str,
        value: u32,
        max: u32,
    },

    #[error("invalid amount '{value}', expected major units with at most two decimals")]
    InvalidAmount { value: String },

    #[error("{collection} cannot be empty")]
    EmptyCollection { collection: &'static str },
    #[error("identifier cannot be empty")]
    EmptyId,
    #[error("duplicate identifier '{id}'")]
    DuplicateId { id: String },

    #[error("total pre-round shares must be greater than zero")]
    ZeroTotalShares,
    #[error("position '{id}' is a convertible instrument and cannot hold {shares} shares before conversion")]
    ConvertibleHoldsShares { id: String, shares: u64 },

    #[error("participation cap {cap} of class '{id}' is below its preference {preference}")]
    CapBelowPreference {
        id: String,
        cap: i64,
        preference: i64,
    },
    #[error("exit proceeds exceed the preference stack but no class or common pool holds as-converted shares")]
    NoResidualClaimant,

    #[error("vesting duration {duration_months} months must exceed cliff {cliff_months} months")]
    DurationNotAfterCliff {
        cliff_months: u32,
        duration_months: u32,
    },
    #[error("invalid vesting frequency '{value}', expected one of monthly, quarterly, annually")]
    InvalidFrequency { value: String },
    #[error("date must be formatted YYYY-MM-DD: '{value}'")]
    InvalidDate { value: String },
    #[error("date arithmetic out of range")]
    DateOutOfRange,

    #[error("invalid computation '{value}', expected one of dilution, waterfall, vesting")]
    InvalidComputation { value: String },
    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },
    #[error("request_id must be at least 8 characters")]
    InvalidRequestId,
    #[error("schema_version must match vMAJOR.MINOR.PATCH: '{value}'")]
    InvalidSchemaVersion { value: String },
    #[error("error code cannot be empty")]
    EmptyErrorCode,
    #[error("error message cannot be empty")]
    EmptyErrorMessage,
}

/// Inputs were individually valid but produced a non-positive divisor or an
/// out-of-range intermediate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArithmeticError {
    #[error("derived price per share is not positive (pre-money {pre_money}, shares {shares})")]
    NonPositivePrice { pre_money: i64, shares: u64 },
    #[error("conversion price for '{id}' is not positive")]
    NonPositiveConversionPrice { id: String },
    #[error("arithmetic overflow while computing {context}")]
    Overflow { context: &'static str },
}

/// An internal invariant failed after computation. Always an engine defect.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConservationViolation {
    #[error("share count not conserved: total {expected}, parts sum to {actual}")]
    Shares { expected: u64, actual: u64 },
    #[error("money not conserved: exit value {expected}, distributions sum to {actual}")]
    Money { expected: i64, actual: i64 },
    #[error("vesting increments sum to {actual}, granted {expected}")]
    Vesting { expected: u64, actual: u64 },
    #[error("conversion elections did not settle after {sweeps} sweeps")]
    ElectionUnstable { sweeps: usize },
}

/// Top-level error type for engine operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Arithmetic(#[from] ArithmeticError),

    #[error("internal invariant violated: {0}")]
    Conservation(#[from] ConservationViolation),
}

impl EngineError {
    /// Stable machine-readable code for envelopes and exit-code mapping.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Arithmetic(_) => "arithmetic_error",
            Self::Conservation(_) => "conservation_violation",
        }
    }
}
