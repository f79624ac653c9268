use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{ArithmeticError, BasisPoints, Money, ValidationError};

/// Class of stock a holder owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareClass {
    Common,
    Preferred,
}

/// Contract terms behind a position.
///
/// Convertible instruments (SAFEs and notes) hold no shares until a priced
/// round converts them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Instrument {
    #[default]
    Equity,
    #[serde(rename = "option")]
    StockOption {
        strike: Money,
    },
    Safe {
        investment: Money,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        valuation_cap: Option<Money>,
        #[serde(default)]
        discount_bps: BasisPoints,
    },
    ConvertibleNote {
        principal: Money,
        #[serde(default)]
        accrued_interest: Money,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        valuation_cap: Option<Money>,
        #[serde(default)]
        discount_bps: BasisPoints,
    },
}

/// Conversion economics shared by SAFEs and notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionTerms {
    pub amount: Money,
    pub valuation_cap: Option<Money>,
    pub discount: BasisPoints,
}

impl Instrument {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Equity => "equity",
            Self::StockOption { .. } => "option",
            Self::Safe { .. } => "safe",
            Self::ConvertibleNote { .. } => "convertible_note",
        }
    }

    pub const fn is_convertible(&self) -> bool {
        matches!(self, Self::Safe { .. } | Self::ConvertibleNote { .. })
    }

    /// Amount and price protections that apply when this instrument converts.
    pub fn conversion_terms(&self) -> Result<Option<ConversionTerms>, ArithmeticError> {
        Ok(match self {
            Self::Equity | Self::StockOption { .. } => None,
            Self::Safe {
                investment,
                valuation_cap,
                discount_bps,
            } => Some(ConversionTerms {
                amount: *investment,
                valuation_cap: *valuation_cap,
                discount: *discount_bps,
            }),
            Self::ConvertibleNote {
                principal,
                accrued_interest,
                valuation_cap,
                discount_bps,
            } => Some(ConversionTerms {
                amount: principal.checked_add(*accrued_interest)?,
                valuation_cap: *valuation_cap,
                discount: *discount_bps,
            }),
        })
    }

    fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::Equity => {}
            Self::StockOption { strike } => {
                strike.ensure_non_negative("strike")?;
            }
            Self::Safe {
                investment,
                valuation_cap,
                discount_bps,
            } => {
                investment.ensure_positive("investment")?;
                validate_conversion_protections(*valuation_cap, *discount_bps)?;
            }
            Self::ConvertibleNote {
                principal,
                accrued_interest,
                valuation_cap,
                discount_bps,
            } => {
                principal.ensure_positive("principal")?;
                accrued_interest.ensure_non_negative("accrued_interest")?;
                validate_conversion_protections(*valuation_cap, *discount_bps)?;
            }
        }
        Ok(())
    }
}

fn validate_conversion_protections(
    valuation_cap: Option<Money>,
    discount: BasisPoints,
) -> Result<(), ValidationError> {
    if let Some(cap) = valuation_cap {
        cap.ensure_positive("valuation_cap")?;
    }
    discount.ensure_below("discount_bps", BasisPoints::ONE_HUNDRED_PERCENT)?;
    Ok(())
}

/// One holder's stake at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareholderPosition {
    pub id: String,
    pub name: String,
    pub shares: u64,
    pub share_class: ShareClass,
    /// Historical cost basis per share.
    #[serde(default)]
    pub price_per_share: Money,
    #[serde(default)]
    pub instrument: Instrument,
}

impl ShareholderPosition {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        shares: u64,
        share_class: ShareClass,
        price_per_share: Money,
    ) -> Result<Self, ValidationError> {
        let position = Self {
            id: id.into(),
            name: name.into(),
            shares,
            share_class,
            price_per_share,
            instrument: Instrument::Equity,
        };
        position.validate()?;
        Ok(position)
    }

    pub fn with_instrument(mut self, instrument: Instrument) -> Result<Self, ValidationError> {
        self.instrument = instrument;
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::EmptyId);
        }
        self.price_per_share.ensure_non_negative("price_per_share")?;
        self.instrument.validate()?;
        if self.instrument.is_convertible() && self.shares > 0 {
            return Err(ValidationError::ConvertibleHoldsShares {
                id: self.id.clone(),
                shares: self.shares,
            });
        }
        Ok(())
    }
}

/// Rejects blank or repeated identifiers.
pub(crate) fn ensure_unique_ids<'a>(
    ids: impl IntoIterator<Item = &'a str>,
) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for id in ids {
        if id.trim().is_empty() {
            return Err(ValidationError::EmptyId);
        }
        if !seen.insert(id) {
            return Err(ValidationError::DuplicateId { id: id.to_owned() });
        }
    }
    Ok(())
}
