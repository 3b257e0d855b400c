//! Session states and the events that move between them.

use crate::models::{AuthSession, Profile};
use chrono::Utc;

/// Id of the built-in offline user. Never issued by the auth service.
pub const DEFAULT_USER_ID: &str = "default-user-id";

/// Who the current user is.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Startup has not checked for a stored session yet.
    Uninitialized,
    Anonymous,
    Authenticated(Profile),
    /// Developer fallback: a fixed local user, no backend auth.
    Offline(Profile),
}

impl SessionState {
    pub fn user(&self) -> Option<&Profile> {
        match self {
            SessionState::Authenticated(profile) | SessionState::Offline(profile) => Some(profile),
            SessionState::Uninitialized | SessionState::Anonymous => None,
        }
    }

    pub fn is_offline(&self) -> bool {
        matches!(self, SessionState::Offline(_))
    }

    pub fn describe(&self) -> &'static str {
        match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Anonymous => "signed out",
            SessionState::Authenticated(_) => "signed in",
            SessionState::Offline(_) => "offline (default user)",
        }
    }
}

/// External auth lifecycle events.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    SignedIn(AuthSession),
    SignedOut,
}

/// The offline user: a doctor halfway to a 50-point target.
pub fn default_profile() -> Profile {
    Profile {
        id: DEFAULT_USER_ID.to_string(),
        email: "default@example.com".to_string(),
        full_name: "Default User".to_string(),
        profession: Some("Doctor".to_string()),
        license_number: Some("TEST-12345".to_string()),
        avatar_url: None,
        total_cpd_points: 25,
        required_annual_points: 50,
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_signed_in_states_have_a_user() {
        assert!(SessionState::Uninitialized.user().is_none());
        assert!(SessionState::Anonymous.user().is_none());
        let profile = default_profile();
        assert_eq!(
            SessionState::Offline(profile.clone()).user().map(|p| p.id.as_str()),
            Some(DEFAULT_USER_ID)
        );
        assert!(SessionState::Authenticated(profile).user().is_some());
    }

    #[test]
    fn default_user_is_half_way() {
        assert_eq!(default_profile().progress_percent(), 50);
    }
}
