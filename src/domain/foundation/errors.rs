//! Validation errors raised by domain value objects.

use thiserror::Error;

/// A value that cannot become a domain object.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} is empty")]
    Empty { field: &'static str },

    #[error("{field} length must be between {min} and {max}, got {actual}")]
    WrongLength {
        field: &'static str,
        min: usize,
        max: usize,
        actual: usize,
    },

    #[error("{field} is malformed: {reason}")]
    Malformed { field: &'static str, reason: String },

    #[error("Illegal transition from {from} to {to}")]
    IllegalTransition { from: String, to: String },
}

impl ValidationError {
    pub fn empty(field: &'static str) -> Self {
        ValidationError::Empty { field }
    }

    pub fn wrong_length(field: &'static str, min: usize, max: usize, actual: usize) -> Self {
        ValidationError::WrongLength {
            field,
            min,
            max,
            actual,
        }
    }

    pub fn malformed(field: &'static str, reason: impl Into<String>) -> Self {
        ValidationError::Malformed {
            field,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_field() {
        assert_eq!(ValidationError::empty("identity").to_string(), "identity is empty");
        assert_eq!(
            ValidationError::wrong_length("identity", 8, 15, 4).to_string(),
            "identity length must be between 8 and 15, got 4"
        );
        assert_eq!(
            ValidationError::malformed("intent", "unknown label 'PLAY'").to_string(),
            "intent is malformed: unknown label 'PLAY'"
        );
    }

    #[test]
    fn illegal_transition_names_both_modes() {
        let err = ValidationError::IllegalTransition {
            from: "SelectingEvent".to_string(),
            to: "ConfirmingSwitch".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Illegal transition from SelectingEvent to ConfirmingSwitch"
        );
    }
}
