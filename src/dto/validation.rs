//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::state::game::ANSWERED_SENTINEL;

/// Longest team name accepted at join time.
const MAX_TEAM_NAME_LENGTH: usize = 40;

/// Validates that a team name can serve as a stable identifier inside a game.
///
/// Names are compared verbatim across the whole protocol, so surrounding
/// whitespace and the reserved lock sentinel are rejected up front.
pub fn validate_team_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        let mut err = ValidationError::new("team_name_empty");
        err.message = Some("Team name must not be empty".into());
        return Err(err);
    }

    if name.trim() != name {
        let mut err = ValidationError::new("team_name_whitespace");
        err.message = Some("Team name must not start or end with whitespace".into());
        return Err(err);
    }

    if name.chars().count() > MAX_TEAM_NAME_LENGTH {
        let mut err = ValidationError::new("team_name_length");
        err.message =
            Some(format!("Team name must be at most {MAX_TEAM_NAME_LENGTH} characters").into());
        return Err(err);
    }

    if name == ANSWERED_SENTINEL {
        let mut err = ValidationError::new("team_name_reserved");
        err.message = Some("This team name is reserved".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_team_name_valid() {
        assert!(validate_team_name("Red Pandas").is_ok());
        assert!(validate_team_name("A").is_ok());
        assert!(validate_team_name("équipe-42").is_ok());
    }

    #[test]
    fn test_validate_team_name_rejects_empty_and_whitespace() {
        assert!(validate_team_name("").is_err());
        assert!(validate_team_name("   ").is_err());
        assert!(validate_team_name(" Red").is_err());
        assert!(validate_team_name("Red ").is_err());
    }

    #[test]
    fn test_validate_team_name_rejects_too_long() {
        let long = "x".repeat(MAX_TEAM_NAME_LENGTH + 1);
        assert!(validate_team_name(&long).is_err());
        let edge = "x".repeat(MAX_TEAM_NAME_LENGTH);
        assert!(validate_team_name(&edge).is_ok());
    }

    #[test]
    fn test_validate_team_name_rejects_reserved_sentinel() {
        assert!(validate_team_name(ANSWERED_SENTINEL).is_err());
    }
}
