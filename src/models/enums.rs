use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    #[serde(
        rename = "buy",
        alias = "BUY",
        alias = "Buy",
        alias = "long",
        alias = "LONG",
        alias = "Long"
    )]
    Buy,
    #[serde(
        rename = "sell",
        alias = "SELL",
        alias = "Sell",
        alias = "short",
        alias = "SHORT",
        alias = "Short"
    )]
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl RiskTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalStatus {
    #[default]
    Active,
    #[serde(alias = "taken")]
    Completed,
    Archived,
}

impl fmt::Display for SignalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalStatus::Active => write!(f, "active"),
            SignalStatus::Completed => write!(f, "completed"),
            SignalStatus::Archived => write!(f, "archived"),
        }
    }
}

impl SignalStatus {
    pub fn from_str_loose(s: &str) -> Option<SignalStatus> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Some(SignalStatus::Active),
            "completed" | "taken" => Some(SignalStatus::Completed),
            "archived" => Some(SignalStatus::Archived),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Win,
    Loss,
    #[serde(alias = "target-hit")]
    TargetHit,
    #[serde(alias = "stop-hit")]
    StopHit,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Win => write!(f, "win"),
            Outcome::Loss => write!(f, "loss"),
            Outcome::TargetHit => write!(f, "target_hit"),
            Outcome::StopHit => write!(f, "stop_hit"),
        }
    }
}

impl Outcome {
    pub fn is_win(self) -> bool {
        matches!(self, Outcome::Win | Outcome::TargetHit)
    }

    pub fn is_loss(self) -> bool {
        matches!(self, Outcome::Loss | Outcome::StopHit)
    }

    pub fn from_str_loose(s: &str) -> Option<Outcome> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "win" => Some(Outcome::Win),
            "loss" => Some(Outcome::Loss),
            "target_hit" => Some(Outcome::TargetHit),
            "stop_hit" => Some(Outcome::StopHit),
            _ => None,
        }
    }
}

/// Where a stored record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalSource {
    Websocket,
    Api,
    Admin,
}

impl fmt::Display for SignalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalSource::Websocket => write!(f, "websocket"),
            SignalSource::Api => write!(f, "api"),
            SignalSource::Admin => write!(f, "admin"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_accepts_direction_aliases() {
        let long: Side = serde_json::from_str("\"long\"").unwrap();
        let short: Side = serde_json::from_str("\"SHORT\"").unwrap();
        assert_eq!(long, Side::Buy);
        assert_eq!(short, Side::Sell);
        assert_eq!(serde_json::to_string(&Side::Buy).unwrap(), "\"buy\"");
    }

    #[test]
    fn taken_maps_to_completed() {
        let s: SignalStatus = serde_json::from_str("\"taken\"").unwrap();
        assert_eq!(s, SignalStatus::Completed);
        assert_eq!(SignalStatus::from_str_loose("TAKEN"), Some(SignalStatus::Completed));
    }

    #[test]
    fn outcome_classification() {
        assert!(Outcome::TargetHit.is_win());
        assert!(Outcome::StopHit.is_loss());
        assert!(!Outcome::Win.is_loss());
        assert_eq!(Outcome::from_str_loose("target-hit"), Some(Outcome::TargetHit));
    }
}
