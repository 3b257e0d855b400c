use crate::backend::error::BackendError;
use crate::models::{
    AccreditationBody, AuthSession, AuthUser, CompletionUpdate, NewProfile, NewRegistration,
    Profile, ProfileUpdate, UserWebinar, Webinar,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub(crate) mod client;
pub use client::BackendClient;
pub mod error;
pub mod query;

#[cfg(test)]
use mockall::automock;

/// The hosted backend: auth plus the four tables the tracker reads and writes.
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    /// Use this access token for subsequent requests, or the anon key when `None`.
    fn set_access_token(&self, token: Option<String>);

    /// Creates an auth user. Confirmation mail links back to the site's login page.
    /// Sent once; the sign-up flow owns the retries.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<AuthUser, BackendError>;

    /// Exchanges email and password for a session.
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, BackendError>;

    /// Revokes the current session on the server.
    async fn sign_out(&self) -> Result<(), BackendError>;

    /// Returns the user the current access token belongs to.
    async fn current_user(&self) -> Result<AuthUser, BackendError>;

    /// Exchanges a refresh token for a new session.
    async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession, BackendError>;

    /// Minimal read used by the connectivity probe. Never retried.
    async fn ping(&self) -> Result<(), BackendError>;

    async fn fetch_profile(&self, user_id: &str) -> Result<Profile, BackendError>;

    /// Creates or replaces the profile row keyed on `id`. Sent once, like `sign_up`.
    async fn upsert_profile(&self, profile: &NewProfile) -> Result<(), BackendError>;

    async fn update_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> Result<(), BackendError>;

    /// The whole catalog, newest first.
    async fn list_webinars(&self) -> Result<Vec<Webinar>, BackendError>;

    /// Webinars dated at or after `from`, soonest first.
    async fn upcoming_webinars(
        &self,
        from: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Webinar>, BackendError>;

    async fn fetch_webinar(&self, webinar_id: &str) -> Result<Webinar, BackendError>;

    async fn list_user_webinars(&self, user_id: &str) -> Result<Vec<UserWebinar>, BackendError>;

    /// The user's registration for a webinar, if any.
    async fn find_user_webinar(
        &self,
        user_id: &str,
        webinar_id: &str,
    ) -> Result<Option<UserWebinar>, BackendError>;

    async fn fetch_user_webinar(&self, id: &str) -> Result<UserWebinar, BackendError>;

    /// Inserts a registration and returns the stored row.
    async fn insert_registration(
        &self,
        registration: &NewRegistration,
    ) -> Result<UserWebinar, BackendError>;

    async fn record_completion(
        &self,
        user_webinar_id: &str,
        completion: &CompletionUpdate,
    ) -> Result<(), BackendError>;

    /// Completed registrations with their webinars, most recent completion first.
    async fn list_completed(&self, user_id: &str) -> Result<Vec<UserWebinar>, BackendError>;

    /// The accreditation directory ordered by name.
    async fn list_accreditation_bodies(&self) -> Result<Vec<AccreditationBody>, BackendError>;
}

/// The handle shared by the session and every command.
pub type SharedBackend = Arc<dyn Backend>;
