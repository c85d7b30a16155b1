use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Trial categories, each driven by its own staircase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Condition {
    #[serde(rename = "reward.high")]
    RewardHigh,
    #[serde(rename = "reward.low")]
    RewardLow,
    #[serde(rename = "neutral")]
    Neutral,
    #[serde(rename = "loss.low")]
    LossLow,
    #[serde(rename = "loss.high")]
    LossHigh,
}

/// Whether a condition pays out on a hit, charges on a miss, or neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Valence {
    Reward,
    Neutral,
    Loss,
}

impl Condition {
    pub const ALL: [Condition; 5] = [
        Condition::RewardHigh,
        Condition::RewardLow,
        Condition::Neutral,
        Condition::LossLow,
        Condition::LossHigh,
    ];

    /// Key used in order files and persisted records.
    pub fn key(&self) -> &'static str {
        match self {
            Condition::RewardHigh => "reward.high",
            Condition::RewardLow => "reward.low",
            Condition::Neutral => "neutral",
            Condition::LossLow => "loss.low",
            Condition::LossHigh => "loss.high",
        }
    }

    pub fn valence(&self) -> Valence {
        match self {
            Condition::RewardHigh | Condition::RewardLow => Valence::Reward,
            Condition::Neutral => Valence::Neutral,
            Condition::LossLow | Condition::LossHigh => Valence::Loss,
        }
    }

    pub fn is_loss(&self) -> bool {
        self.valence() == Valence::Loss
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown condition key `{0}`")]
pub struct ParseConditionError(pub String);

impl FromStr for Condition {
    type Err = ParseConditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim();
        Condition::ALL
            .into_iter()
            .find(|c| c.key() == key)
            .ok_or_else(|| ParseConditionError(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_parse_back() {
        for c in Condition::ALL {
            assert_eq!(c.key().parse::<Condition>(), Ok(c));
        }
        assert_eq!(" loss.low ".parse::<Condition>(), Ok(Condition::LossLow));
    }

    #[test]
    fn unknown_key_is_rejected() {
        let err = "gain".parse::<Condition>().unwrap_err();
        assert_eq!(err, ParseConditionError("gain".into()));
    }

    #[test]
    fn serde_uses_order_file_keys() {
        let json = serde_json::to_string(&Condition::RewardHigh).unwrap();
        assert_eq!(json, "\"reward.high\"");
        let back: Condition = serde_json::from_str("\"loss.high\"").unwrap();
        assert_eq!(back, Condition::LossHigh);
    }

    #[test]
    fn valence_split() {
        assert!(Condition::LossHigh.is_loss());
        assert!(!Condition::Neutral.is_loss());
        assert_eq!(Condition::RewardLow.valence(), Valence::Reward);
    }
}
