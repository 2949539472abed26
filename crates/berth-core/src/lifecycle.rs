use crate::model::ContainerState;
use crate::CoreError;

/// Check a requested state change against the container state machine.
///
/// Removing a running container is not a legal transition; forced removal is
/// decided by the caller before consulting this table.
pub fn validate_transition(from: ContainerState, to: ContainerState) -> Result<(), CoreError> {
    let valid = matches!(
        (from, to),
        (
            ContainerState::Created | ContainerState::Stopped,
            ContainerState::Running | ContainerState::Removed
        ) | (ContainerState::Running, ContainerState::Stopped)
    );

    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidState(format!(
            "cannot move container from {from} to {to}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ContainerState::{Created, Removed, Running, Stopped};

    #[test]
    fn valid_transitions() {
        assert!(validate_transition(Created, Running).is_ok());
        assert!(validate_transition(Stopped, Running).is_ok());
        assert!(validate_transition(Running, Stopped).is_ok());
        assert!(validate_transition(Created, Removed).is_ok());
        assert!(validate_transition(Stopped, Removed).is_ok());
    }

    #[test]
    fn invalid_transitions() {
        assert!(validate_transition(Running, Running).is_err());
        assert!(validate_transition(Created, Stopped).is_err());
        assert!(validate_transition(Stopped, Stopped).is_err());
        assert!(validate_transition(Running, Removed).is_err());
        assert!(validate_transition(Running, Created).is_err());
    }

    #[test]
    fn removed_is_terminal() {
        for to in [Created, Running, Stopped, Removed] {
            assert!(matches!(
                validate_transition(Removed, to),
                Err(CoreError::InvalidState(_))
            ));
        }
    }
}
