use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Spacing between vesting period boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VestingFrequency {
    Monthly,
    Quarterly,
    Annually,
}

impl VestingFrequency {
    pub const ALL: [Self; 3] = [Self::Monthly, Self::Quarterly, Self::Annually];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Annually => "annually",
        }
    }

    pub const fn period_months(self) -> u32 {
        match self {
            Self::Monthly => 1,
            Self::Quarterly => 3,
            Self::Annually => 12,
        }
    }
}

impl Display for VestingFrequency {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VestingFrequency {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "monthly" | "1m" => Ok(Self::Monthly),
            "quarterly" | "3m" => Ok(Self::Quarterly),
            "annually" | "yearly" | "12m" => Ok(Self::Annually),
            other => Err(ValidationError::InvalidFrequency {
                value: other.to_owned(),
            }),
        }
    }
}
