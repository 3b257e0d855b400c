//! The process-wide auth session.
//!
//! [`Session`] is the only writer of the current-user state. Commands get it
//! passed in and read [`SessionState`] snapshots; nothing else mutates it.

pub mod state;

pub use state::{AuthEvent, DEFAULT_USER_ID, SessionState, default_profile};

use crate::backend::SharedBackend;
use crate::backend::error::BackendError;
use crate::config::Config;
use crate::models::{AuthSession, Profile, ProfileUpdate};
use chrono::Utc;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No user logged in")]
    NotSignedIn,

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Failed to persist session: {0}")]
    Config(#[from] std::io::Error),
}

impl SessionError {
    /// One-line message for the terminal.
    pub fn user_message(&self) -> String {
        match self {
            SessionError::NotSignedIn => {
                "Not signed in. Run `cpd login`, or `cpd offline` for the default user.".to_string()
            }
            SessionError::Backend(e) => e.user_message(),
            SessionError::Config(_) => self.to_string(),
        }
    }
}

pub struct Session {
    backend: SharedBackend,
    config_path: PathBuf,
    state: SessionState,
    auth: Option<AuthSession>,
}

impl Session {
    pub fn new(backend: SharedBackend, config_path: &Path) -> Self {
        Self {
            backend,
            config_path: config_path.to_path_buf(),
            state: SessionState::Uninitialized,
            auth: None,
        }
    }

    pub fn backend(&self) -> &SharedBackend {
        &self.backend
    }

    /// A read-only copy of the current state.
    pub fn snapshot(&self) -> SessionState {
        self.state.clone()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn current_user(&self) -> Result<&Profile, SessionError> {
        self.state.user().ok_or(SessionError::NotSignedIn)
    }

    /// Tokens of a signed-in user.
    pub fn auth_session(&self) -> Option<&AuthSession> {
        self.auth.as_ref()
    }

    /// Restores the stored session, if any. Ends `Anonymous`,
    /// `Authenticated` or `Offline`. A rejected session is discarded; one
    /// that cannot be checked because the backend is unreachable is kept.
    pub async fn initialize(&mut self) -> &SessionState {
        let config = if self.config_path.exists() {
            Config::load_from_file(&self.config_path)
                .map_err(|e| log::warn!("Ignoring unreadable session file: {}", e))
                .ok()
        } else {
            None
        };

        match config {
            Some(Config {
                offline_profile: Some(profile),
                ..
            }) => {
                log::info!("Resuming offline session as {}", profile.full_name);
                self.state = SessionState::Offline(profile);
            }
            Some(Config {
                session: Some(stored),
                ..
            }) => match self.restore(stored).await {
                Ok(session) => self.apply(AuthEvent::SignedIn(session)).await,
                Err(e) if e.is_network() || e.is_config() => {
                    // Keep the stored session for the next run.
                    log::warn!("Could not reach the backend to restore the session: {}", e);
                    self.backend.set_access_token(None);
                    self.state = SessionState::Anonymous;
                }
                Err(e) => {
                    log::warn!("Stored session is no longer valid: {}", e);
                    self.apply(AuthEvent::SignedOut).await;
                }
            },
            _ => self.state = SessionState::Anonymous,
        }
        &self.state
    }

    /// Refreshes an expired token and checks the token still names the same user.
    async fn restore(&self, stored: AuthSession) -> Result<AuthSession, BackendError> {
        let session = if stored.is_expired(Utc::now()) {
            log::debug!("Access token expired, refreshing");
            self.backend.refresh_session(&stored.refresh_token).await?
        } else {
            stored
        };

        self.backend
            .set_access_token(Some(session.access_token.clone()));
        let user = self.backend.current_user().await?;
        if user.id != session.user.id {
            return Err(BackendError::Unexpected(format!(
                "token belongs to {} not {}",
                user.id, session.user.id
            )));
        }
        Ok(session)
    }

    /// Applies an auth event. A failed profile fetch after sign-in is logged
    /// and leaves the session anonymous.
    pub async fn apply(&mut self, event: AuthEvent) {
        match event {
            AuthEvent::SignedIn(session) => {
                self.backend
                    .set_access_token(Some(session.access_token.clone()));
                match self.backend.fetch_profile(&session.user.id).await {
                    Ok(profile) => {
                        log::info!("Signed in as {}", profile.email);
                        if let Err(e) = Config::signed_in(session.clone()).save(&self.config_path) {
                            log::warn!("Could not persist session: {}", e);
                        }
                        self.auth = Some(session);
                        self.state = SessionState::Authenticated(profile);
                    }
                    Err(e) => {
                        log::error!("Profile fetch error: {}", e);
                        self.backend.set_access_token(None);
                        self.auth = None;
                        self.state = SessionState::Anonymous;
                    }
                }
            }
            AuthEvent::SignedOut => {
                self.backend.set_access_token(None);
                if let Err(e) = Config::clear(&self.config_path) {
                    log::warn!("Could not remove session file: {}", e);
                }
                self.auth = None;
                self.state = SessionState::Anonymous;
            }
        }
    }

    /// Signs in with email and password.
    pub async fn sign_in(&mut self, email: &str, password: &str) -> Result<&SessionState, SessionError> {
        let session = self.backend.sign_in(email, password).await?;
        self.apply(AuthEvent::SignedIn(session)).await;
        Ok(&self.state)
    }

    /// Signs out. The offline user is cleared locally; otherwise the server
    /// session is revoked first, and a failed revoke still clears local state.
    pub async fn sign_out(&mut self) {
        if matches!(self.state, SessionState::Authenticated(_)) {
            if let Err(e) = self.backend.sign_out().await {
                log::warn!("Sign out error: {}", e);
            }
        }
        self.apply(AuthEvent::SignedOut).await;
    }

    /// Switches to the built-in offline user until sign-out.
    pub fn use_default_user(&mut self) -> Result<&Profile, SessionError> {
        let profile = default_profile();
        Config::offline(profile.clone()).save(&self.config_path)?;
        self.backend.set_access_token(None);
        self.auth = None;
        self.state = SessionState::Offline(profile);
        self.current_user()
    }

    /// Updates the current user's profile. The offline user is only updated
    /// locally.
    pub async fn update_profile(&mut self, update: &ProfileUpdate) -> Result<&Profile, SessionError> {
        match &mut self.state {
            SessionState::Offline(profile) => {
                profile.apply(update);
                Config::offline(profile.clone()).save(&self.config_path)?;
            }
            SessionState::Authenticated(profile) => {
                self.backend.update_profile(&profile.id, update).await?;
                profile.apply(update);
            }
            SessionState::Uninitialized | SessionState::Anonymous => {
                return Err(SessionError::NotSignedIn);
            }
        }
        self.current_user()
    }

    /// Re-reads the signed-in profile from the backend.
    pub async fn reload_profile(&mut self) -> Result<&Profile, SessionError> {
        if let SessionState::Authenticated(profile) = &mut self.state {
            *profile = self.backend.fetch_profile(&profile.id).await?;
        }
        self.current_user()
    }
}
