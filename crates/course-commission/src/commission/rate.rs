use serde::{Deserialize, Serialize};

use super::error::CommissionError;

const RATE_TOTAL: i32 = 100;

/// Platform/instructor percentage split. The instructor share is always derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RatePairInput")]
pub struct RatePair {
    platform_rate: u8,
    instructor_rate: u8,
}

impl RatePair {
    pub fn new(platform_rate: i32) -> Result<Self, CommissionError> {
        if !(1..RATE_TOTAL).contains(&platform_rate) {
            return Err(CommissionError::validation(
                "platform_rate",
                format!("must be between 1 and 99, got {platform_rate}"),
            ));
        }

        let platform_rate = platform_rate as u8;
        Ok(Self {
            platform_rate,
            instructor_rate: 100 - platform_rate,
        })
    }

    pub const fn platform_rate(self) -> u8 {
        self.platform_rate
    }

    pub const fn instructor_rate(self) -> u8 {
        self.instructor_rate
    }

    /// Divide an amount in minor currency units. Rounding favours the instructor so the two
    /// shares always add back up to `amount`.
    pub fn split(self, amount: u64) -> AmountSplit {
        let platform = (u128::from(amount) * u128::from(self.platform_rate) / 100) as u64;
        AmountSplit {
            amount,
            platform,
            instructor: amount - platform,
        }
    }
}

impl std::fmt::Display for RatePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.platform_rate, self.instructor_rate)
    }
}

/// Wire form accepted from clients. `instructor_rate` is optional and only checked for
/// consistency.
#[derive(Debug, Deserialize)]
struct RatePairInput {
    platform_rate: i32,
    #[serde(default)]
    instructor_rate: Option<i32>,
}

impl TryFrom<RatePairInput> for RatePair {
    type Error = CommissionError;

    fn try_from(input: RatePairInput) -> Result<Self, Self::Error> {
        let pair = RatePair::new(input.platform_rate)?;
        match input.instructor_rate {
            Some(rate) if rate != i32::from(pair.instructor_rate) => {
                Err(CommissionError::validation(
                    "instructor_rate",
                    format!(
                        "is derived as {} from platform_rate {}, got {rate}",
                        pair.instructor_rate, pair.platform_rate
                    ),
                ))
            }
            _ => Ok(pair),
        }
    }
}

/// Result of applying a [`RatePair`] to a concrete amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountSplit {
    pub amount: u64,
    pub platform: u64,
    pub instructor: u64,
}
