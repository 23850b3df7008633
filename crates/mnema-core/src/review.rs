use serde::{Deserialize, Serialize};

use crate::{MnemaError, MnemaResult};

/// How well a memory was recalled during a review.
///
/// The integer value feeds directly into the scheduling formula as the
/// recall quality, so the discriminants are part of the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDifficulty {
    /// Could not remember at all.
    Forgot = 1,
    /// Struggled but remembered.
    Hard = 2,
    /// Remembered with some thought.
    Good = 3,
    /// Remembered instantly.
    Easy = 4,
}

impl ReviewDifficulty {
    /// The recall quality used by the scheduler.
    pub fn quality(self) -> i32 {
        self as i32
    }

    /// Parses a numeric rating, rejecting anything outside 1..=4.
    pub fn from_rating(rating: i32) -> MnemaResult<Self> {
        match rating {
            1 => Ok(Self::Forgot),
            2 => Ok(Self::Hard),
            3 => Ok(Self::Good),
            4 => Ok(Self::Easy),
            other => Err(MnemaError::InvalidInput(format!(
                "difficulty rating must be 1..=4, got {other}"
            ))),
        }
    }

    /// True when the review counts as a successful recall.
    pub fn is_successful(self) -> bool {
        self.quality() >= 3
    }
}

/// Retention strength buckets derived from the forgetting curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryStrength {
    /// Retention above 0.9 — just learned or just reviewed.
    Fresh,
    /// Retention above 0.7 — well remembered.
    Strong,
    /// Retention above 0.5 — needs reinforcement soon.
    Moderate,
    /// Retention above 0.3 — at risk of forgetting.
    Weak,
    /// Retention at or below 0.3 — likely forgotten.
    Fading,
}

impl MemoryStrength {
    /// Classifies a retention score in `[0, 1]` into a strength bucket.
    pub fn from_retention(score: f64) -> Self {
        if score > 0.9 {
            Self::Fresh
        } else if score > 0.7 {
            Self::Strong
        } else if score > 0.5 {
            Self::Moderate
        } else if score > 0.3 {
            Self::Weak
        } else {
            Self::Fading
        }
    }

    /// The dashboard weight of this bucket, on a 0–100 scale.
    pub fn health_weight(self) -> u32 {
        match self {
            Self::Fresh => 100,
            Self::Strong => 80,
            Self::Moderate => 60,
            Self::Weak => 40,
            Self::Fading => 20,
        }
    }

    /// All buckets, strongest first.
    pub fn all() -> [Self; 5] {
        [
            Self::Fresh,
            Self::Strong,
            Self::Moderate,
            Self::Weak,
            Self::Fading,
        ]
    }
}
