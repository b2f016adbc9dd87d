use crate::utils::error::FlywheelError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    // Positive
    EstimateAccepted,
    AccurateEstimate,
    EfficientScheduling,
    HighSatisfaction,
    // Negative
    EstimateRejected,
    InaccurateEstimate,
    SchedulingConflict,
    LowSatisfaction,
    // Variance
    CostOverrun,
    CostUnderrun,
    ScheduleDelay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Positive,
    Negative,
    Variance,
}

impl SignalType {
    pub const ALL: [SignalType; 11] = [
        SignalType::EstimateAccepted,
        SignalType::AccurateEstimate,
        SignalType::EfficientScheduling,
        SignalType::HighSatisfaction,
        SignalType::EstimateRejected,
        SignalType::InaccurateEstimate,
        SignalType::SchedulingConflict,
        SignalType::LowSatisfaction,
        SignalType::CostOverrun,
        SignalType::CostUnderrun,
        SignalType::ScheduleDelay,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalType::EstimateAccepted => "estimate_accepted",
            SignalType::AccurateEstimate => "accurate_estimate",
            SignalType::EfficientScheduling => "efficient_scheduling",
            SignalType::HighSatisfaction => "high_satisfaction",
            SignalType::EstimateRejected => "estimate_rejected",
            SignalType::InaccurateEstimate => "inaccurate_estimate",
            SignalType::SchedulingConflict => "scheduling_conflict",
            SignalType::LowSatisfaction => "low_satisfaction",
            SignalType::CostOverrun => "cost_overrun",
            SignalType::CostUnderrun => "cost_underrun",
            SignalType::ScheduleDelay => "schedule_delay",
        }
    }

    pub fn polarity(&self) -> Polarity {
        match self {
            SignalType::EstimateAccepted
            | SignalType::AccurateEstimate
            | SignalType::EfficientScheduling
            | SignalType::HighSatisfaction => Polarity::Positive,
            SignalType::EstimateRejected
            | SignalType::InaccurateEstimate
            | SignalType::SchedulingConflict
            | SignalType::LowSatisfaction => Polarity::Negative,
            SignalType::CostOverrun | SignalType::CostUnderrun | SignalType::ScheduleDelay => {
                Polarity::Variance
            }
        }
    }

    pub fn is_negative(&self) -> bool {
        self.polarity() == Polarity::Negative
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalType {
    type Err = FlywheelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SignalType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s.trim())
            .ok_or_else(|| FlywheelError::InvalidSignalType {
                value: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_names() {
        for signal_type in SignalType::ALL {
            assert_eq!(signal_type.as_str().parse::<SignalType>().unwrap(), signal_type);
        }
        assert!("thumbs_up".parse::<SignalType>().is_err());
    }

    #[test]
    fn test_serde_name_matches_as_str() {
        let json = serde_json::to_string(&SignalType::CostOverrun).unwrap();
        assert_eq!(json, "\"cost_overrun\"");
    }

    #[test]
    fn test_polarity() {
        assert!(SignalType::LowSatisfaction.is_negative());
        assert!(!SignalType::CostOverrun.is_negative());
        assert_eq!(SignalType::ScheduleDelay.polarity(), Polarity::Variance);
        assert_eq!(SignalType::HighSatisfaction.polarity(), Polarity::Positive);
    }
}
