//! Order messages as published by the ordering front-end.
//!
//! The publisher stringifies the order object and then JSON-encodes that
//! string again, so on the wire a payload looks like
//!
//! ```text
//! "{\"intent\":\"mix\",\"ingredient\":[\"sprite\",\"tea\"]}"
//! ```
//!
//! [`decode_order`] accepts that double-encoded form and, for hand-written
//! test messages, a bare JSON object. Anything else is a
//! [`TranslateError::MalformedPayload`].

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::commands::{translate, SerialCommand};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TranslateError {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

fn malformed(reason: impl Into<String>) -> TranslateError {
    TranslateError::MalformedPayload(reason.into())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Intent {
    Clean,
    Mix,
    Other(String),
}

impl Intent {
    pub fn is_clean(&self) -> bool {
        matches!(self, Intent::Clean)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Intent::Clean => "clean",
            Intent::Mix => "mix",
            Intent::Other(s) => s,
        }
    }
}

impl From<String> for Intent {
    fn from(value: String) -> Self {
        match value.as_str() {
            "clean" => Intent::Clean,
            "mix" => Intent::Mix,
            _ => Intent::Other(value),
        }
    }
}

impl From<Intent> for String {
    fn from(value: Intent) -> Self {
        match value {
            Intent::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderMessage {
    pub intent: Intent,
    #[serde(rename = "ingredient")]
    pub ingredients: Vec<String>,
}

impl OrderMessage {
    pub fn new(intent: Intent, ingredients: Vec<String>) -> Self {
        Self { intent, ingredients }
    }

    pub fn command(&self) -> SerialCommand {
        translate(&self.ingredients)
    }
}

pub fn decode_order(payload: &[u8]) -> Result<OrderMessage, TranslateError> {
    let outer: Value = serde_json::from_slice(payload)
        .map_err(|e| malformed(format!("payload is not JSON: {}", e)))?;

    let object = match outer {
        Value::String(inner) => serde_json::from_str::<Value>(&inner)
            .map_err(|e| malformed(format!("inner document is not JSON: {}", e)))?,
        other => other,
    };

    if !object.is_object() {
        return Err(malformed("expected an order object"));
    }

    serde_json::from_value(object).map_err(|e| malformed(e.to_string()))
}

/// Encodes an order the same way the ordering front-end does (double-encoded).
pub fn encode_order(order: &OrderMessage) -> Result<Vec<u8>, serde_json::Error> {
    let inner = serde_json::to_string(order)?;
    serde_json::to_vec(&inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(inner: &str) -> Vec<u8> {
        serde_json::to_vec(&inner).unwrap()
    }

    #[test]
    fn decodes_double_encoded_order() {
        let payload = wire(r#"{"intent":"mix","ingredient":["sprite","apple","tea"]}"#);
        let order = decode_order(&payload).unwrap();
        assert_eq!(order.intent, Intent::Mix);
        assert_eq!(order.command().as_str(), "c1,s1,o1");
    }

    #[test]
    fn decodes_literal_wire_bytes() {
        let payload = br#""{\"intent\":\"clean\",\"ingredient\":[\"sprite\",\"banana\"]}""#;
        let order = decode_order(payload).unwrap();
        assert!(order.intent.is_clean());
        assert_eq!(order.command().as_str(), "c1");
    }

    #[test]
    fn accepts_bare_object() {
        let order = decode_order(br#"{"intent":"mix","ingredient":[]}"#).unwrap();
        assert!(order.ingredients.is_empty());
        assert!(order.command().is_empty());
    }

    #[test]
    fn unknown_intent_is_preserved() {
        let order = decode_order(br#"{"intent":"refill","ingredient":["tea"]}"#).unwrap();
        assert_eq!(order.intent, Intent::Other("refill".into()));
        assert!(!order.intent.is_clean());
    }

    #[test]
    fn rejects_invalid_json() {
        let err = decode_order(b"{intent: mix").unwrap_err();
        assert!(matches!(err, TranslateError::MalformedPayload(_)));
    }

    #[test]
    fn rejects_invalid_inner_document() {
        let err = decode_order(&wire("not an order")).unwrap_err();
        assert!(matches!(err, TranslateError::MalformedPayload(_)));
    }

    #[test]
    fn rejects_missing_fields() {
        assert!(decode_order(br#"{"intent":"mix"}"#).is_err());
        assert!(decode_order(&wire(r#"{"ingredient":["tea"]}"#)).is_err());
    }

    #[test]
    fn rejects_wrong_shapes() {
        assert!(decode_order(b"[1,2,3]").is_err());
        assert!(decode_order(br#"{"intent":"mix","ingredient":"tea"}"#).is_err());
        assert!(decode_order(&[0xff, 0xfe]).is_err());
        assert!(decode_order(b"").is_err());
    }

    #[test]
    fn encode_matches_front_end_format() {
        let order = OrderMessage::new(Intent::Mix, vec!["sprite".into()]);
        let bytes = encode_order(&order).unwrap();
        assert_eq!(bytes, br#""{\"intent\":\"mix\",\"ingredient\":[\"sprite\"]}""#.to_vec());
        assert_eq!(decode_order(&bytes).unwrap(), order);
    }
}
