//! Conversation identity value object.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ValidationError;

const MIN_DIGITS: usize = 6;
const MAX_DIGITS: usize = 20;

/// Stable external address that owns exactly one conversation.
///
/// For WhatsApp this is the sender's phone number. It is stored as bare
/// digits (no `+`, spaces or dashes) so that `+54 9 11 1234-5678` and
/// `5491112345678` address the same conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    /// Creates an identity from a raw phone-like address.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, ValidationError> {
        let raw = raw.as_ref().trim();
        if raw.is_empty() {
            return Err(ValidationError::empty("identity"));
        }

        let mut digits = String::with_capacity(raw.len());
        for c in raw.chars() {
            match c {
                '0'..='9' => digits.push(c),
                '+' | ' ' | '-' | '(' | ')' | '.' => {}
                other => {
                    return Err(ValidationError::malformed(
                        "identity",
                        format!("unexpected character '{}'", other),
                    ))
                }
            }
        }

        if digits.len() < MIN_DIGITS || digits.len() > MAX_DIGITS {
            return Err(ValidationError::wrong_length(
                "identity",
                MIN_DIGITS,
                MAX_DIGITS,
                digits.len(),
            ));
        }

        Ok(Self(digits))
    }

    /// Returns the normalized digits.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Identity {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Identity {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> Self {
        identity.0
    }
}
