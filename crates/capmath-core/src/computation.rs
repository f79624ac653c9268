use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Engine computation that produced an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Computation {
    Dilution,
    Waterfall,
    Vesting,
}

impl Computation {
    pub const ALL: [Self; 3] = [Self::Dilution, Self::Waterfall, Self::Vesting];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dilution => "dilution",
            Self::Waterfall => "waterfall",
            Self::Vesting => "vesting",
        }
    }
}

impl Display for Computation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Computation {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|computation| computation.as_str() == normalized)
            .ok_or(ValidationError::InvalidComputation { value: normalized })
    }
}
