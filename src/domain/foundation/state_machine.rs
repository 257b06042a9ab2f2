//! Legal transitions between modes.

use super::ValidationError;

/// A mode enum that declares which modes may follow it.
///
/// Every mode change goes through [`StateMachine::transition_to`], so an
/// illegal change surfaces as an error instead of a silently inconsistent
/// state.
pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Debug {
    /// Modes reachable in one step.
    fn valid_transitions(&self) -> Vec<Self>;

    fn can_transition_to(&self, target: &Self) -> bool {
        self.valid_transitions().contains(target)
    }

    /// Returns `target` when it may follow `self`.
    fn transition_to(&self, target: Self) -> Result<Self, ValidationError> {
        if self.can_transition_to(&target) {
            Ok(target)
        } else {
            Err(ValidationError::IllegalTransition {
                from: format!("{:?}", self),
                to: format!("{:?}", target),
            })
        }
    }
}
