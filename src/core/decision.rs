//! Validated decoding of the provider's decision payload.
//!
//! The provider returns a loosely typed JSON object. Everything that ends up
//! in a `decisions` row passes through [`DecodedDecision::from_payload`] so
//! that shape mismatches become a [`DecisionError`] instead of a crash.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Trading action recommended by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DecisionAction {
    Buy,
    Sell,
    Hold,
}

impl DecisionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionAction::Buy => "BUY",
            DecisionAction::Sell => "SELL",
            DecisionAction::Hold => "HOLD",
        }
    }
}

impl fmt::Display for DecisionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DecisionAction {
    type Err = DecisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(DecisionAction::Buy),
            "SELL" => Ok(DecisionAction::Sell),
            "HOLD" => Ok(DecisionAction::Hold),
            _ => Err(DecisionError::InvalidAction(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecisionError {
    #[error("decision payload is not a JSON object")]
    NotAnObject,
    #[error("decision payload has no action")]
    MissingAction,
    #[error("decision action '{0}' is not one of BUY, SELL, HOLD")]
    InvalidAction(String),
    #[error("decision payload has no confidence")]
    MissingConfidence,
    #[error("decision confidence {0} is not a number between 0 and 1")]
    InvalidConfidence(String),
    #[error("decision position size {0} is not an integer")]
    InvalidPositionSize(String),
}

/// A decision payload that passed validation, ready to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedDecision {
    pub action: DecisionAction,
    pub confidence: f64,
    pub position_size: Option<i32>,
    /// Serialized `analysis_report` from the provider envelope.
    pub analysis_report: Option<String>,
    /// `raw_decision` serialized as JSON, strings included.
    pub raw_decision: Option<String>,
}

impl DecodedDecision {
    /// Decodes the `decision` object of a provider envelope.
    ///
    /// `action` must be a string naming BUY/SELL/HOLD in any case.
    /// `confidence` may be a number or a numeric string and must lie in `0.0..=1.0`.
    pub fn from_payload(
        decision: &Value,
        analysis_report: Option<&Value>,
    ) -> Result<Self, DecisionError> {
        let fields = decision.as_object().ok_or(DecisionError::NotAnObject)?;

        let action = match fields.get("action") {
            None | Some(Value::Null) => return Err(DecisionError::MissingAction),
            Some(Value::String(s)) => s.parse::<DecisionAction>()?,
            Some(other) => return Err(DecisionError::InvalidAction(other.to_string())),
        };

        let confidence = match fields.get("confidence") {
            None | Some(Value::Null) => return Err(DecisionError::MissingConfidence),
            Some(value) => coerce_confidence(value)?,
        };

        let position_size = match fields.get("position_size") {
            None | Some(Value::Null) => None,
            Some(value) => Some(
                value
                    .as_i64()
                    .and_then(|n| i32::try_from(n).ok())
                    .ok_or_else(|| DecisionError::InvalidPositionSize(value.to_string()))?,
            ),
        };

        let raw_decision = fields
            .get("raw_decision")
            .filter(|raw| !raw.is_null())
            .map(Value::to_string);

        let analysis_report = analysis_report
            .filter(|report| !report.is_null())
            .map(Value::to_string);

        Ok(DecodedDecision {
            action,
            confidence,
            position_size,
            analysis_report,
            raw_decision,
        })
    }
}

fn coerce_confidence(value: &Value) -> Result<f64, DecisionError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(c) if (0.0..=1.0).contains(&c) => Ok(c),
        _ => Err(DecisionError::InvalidConfidence(value.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_complete_payload() {
        let decision = json!({
            "action": "buy",
            "confidence": 0.85,
            "position_size": 100,
            "raw_decision": {"final": "BUY", "reasons": ["momentum"]}
        });
        let report = json!({"market": "bullish"});

        let decoded = DecodedDecision::from_payload(&decision, Some(&report)).unwrap();
        assert_eq!(decoded.action, DecisionAction::Buy);
        assert_eq!(decoded.confidence, 0.85);
        assert_eq!(decoded.position_size, Some(100));
        let raw: Value = serde_json::from_str(decoded.raw_decision.as_deref().unwrap()).unwrap();
        assert_eq!(raw["final"], "BUY");
        let stored: Value =
            serde_json::from_str(decoded.analysis_report.as_deref().unwrap()).unwrap();
        assert_eq!(stored, report);
    }

    #[test]
    fn string_raw_decision_keeps_its_type() {
        let decoded = DecodedDecision::from_payload(
            &json!({"action": "SELL", "confidence": 0.4, "raw_decision": "42"}),
            None,
        )
        .unwrap();
        let raw = decoded.raw_decision.unwrap();
        assert_eq!(raw, "\"42\"");
        assert_eq!(serde_json::from_str::<Value>(&raw).unwrap(), json!("42"));
    }

    #[test]
    fn accepts_numeric_string_confidence() {
        let decoded =
            DecodedDecision::from_payload(&json!({"action": "HOLD", "confidence": "0.5"}), None)
                .unwrap();
        assert_eq!(decoded.action, DecisionAction::Hold);
        assert_eq!(decoded.confidence, 0.5);
        assert_eq!(decoded.analysis_report, None);
        assert_eq!(decoded.raw_decision, None);
    }

    #[test]
    fn rejects_malformed_payloads() {
        assert_eq!(
            DecodedDecision::from_payload(&json!({"confidence": 0.3}), None),
            Err(DecisionError::MissingAction)
        );
        assert_eq!(
            DecodedDecision::from_payload(&json!({"action": "BUY"}), None),
            Err(DecisionError::MissingConfidence)
        );
        assert!(matches!(
            DecodedDecision::from_payload(&json!({"action": "SHORT", "confidence": 0.3}), None),
            Err(DecisionError::InvalidAction(_))
        ));
        assert!(matches!(
            DecodedDecision::from_payload(&json!({"action": 7, "confidence": 0.3}), None),
            Err(DecisionError::InvalidAction(_))
        ));
        assert!(matches!(
            DecodedDecision::from_payload(&json!({"action": "SELL", "confidence": 1.7}), None),
            Err(DecisionError::InvalidConfidence(_))
        ));
        assert_eq!(
            DecodedDecision::from_payload(&json!("BUY"), None),
            Err(DecisionError::NotAnObject)
        );
    }
}
