//! Webinar catalog and the register/complete actions.

use crate::backend::Backend;
use crate::backend::error::BackendError;
use crate::certificate::{self, CertificateDetails};
use crate::models::{
    CompletionUpdate, NewRegistration, Profile, ProfileUpdate, UserWebinar, Webinar, WebinarStatus,
};
use crate::session::{Session, SessionError};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("You are already registered for this webinar")]
    AlreadyRegistered,

    #[error("You must register for this webinar before completing it")]
    NotRegistered,

    #[error("This webinar is already completed")]
    AlreadyCompleted,

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl ActionError {
    /// One-line message for the terminal.
    pub fn user_message(&self) -> String {
        match self {
            ActionError::Backend(e) => e.user_message(),
            ActionError::Session(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

/// Status filter for the catalog. `NotRegistered` matches webinars the user
/// has no row for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, strum::Display)]
#[value(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StatusFilter {
    Registered,
    InProgress,
    Completed,
    NotRegistered,
}

impl StatusFilter {
    fn matches(self, status: Option<WebinarStatus>) -> bool {
        match (self, status) {
            (StatusFilter::NotRegistered, None) => true,
            (StatusFilter::Registered, Some(WebinarStatus::Registered)) => true,
            (StatusFilter::InProgress, Some(WebinarStatus::InProgress)) => true,
            (StatusFilter::Completed, Some(WebinarStatus::Completed)) => true,
            _ => false,
        }
    }
}

/// A webinar together with the current user's registration, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct WebinarListing {
    pub webinar: Webinar,
    pub registration: Option<UserWebinar>,
}

impl WebinarListing {
    pub fn status(&self) -> Option<WebinarStatus> {
        self.registration.as_ref().map(|r| r.status)
    }

    pub fn status_label(&self) -> &'static str {
        self.status().map_or("Not registered", WebinarStatus::label)
    }
}

/// Client-side catalog filters. Empty strings filter nothing.
#[derive(Debug, Clone, Default)]
pub struct WebinarFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub status: Option<StatusFilter>,
}

impl WebinarFilter {
    pub fn matches(&self, listing: &WebinarListing) -> bool {
        let webinar = &listing.webinar;
        let search_ok = match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                [&webinar.title, &webinar.description, &webinar.presenter]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&term))
            }
            _ => true,
        };
        let category_ok = match self.category.as_deref() {
            Some(category) if !category.is_empty() => webinar.category == category,
            _ => true,
        };
        let status_ok = self
            .status
            .is_none_or(|status| status.matches(listing.status()));

        search_ok && category_ok && status_ok
    }

    pub fn apply(&self, listings: Vec<WebinarListing>) -> Vec<WebinarListing> {
        listings.into_iter().filter(|l| self.matches(l)).collect()
    }
}

/// Distinct categories in first-seen order.
pub fn categories<'a>(webinars: impl IntoIterator<Item = &'a Webinar>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for webinar in webinars {
        if !seen.contains(&webinar.category) {
            seen.push(webinar.category.clone());
        }
    }
    seen
}

/// All webinars, newest first, each with the user's registration.
pub async fn load_catalog(
    backend: &dyn Backend,
    user_id: &str,
) -> Result<Vec<WebinarListing>, BackendError> {
    let webinars = backend.list_webinars().await?;
    let mut registrations: HashMap<String, UserWebinar> = backend
        .list_user_webinars(user_id)
        .await?
        .into_iter()
        .map(|r| (r.webinar_id.clone(), r))
        .collect();

    Ok(webinars
        .into_iter()
        .map(|webinar| WebinarListing {
            registration: registrations.remove(&webinar.id),
            webinar,
        })
        .collect())
}

pub async fn webinar_detail(
    backend: &dyn Backend,
    user_id: &str,
    webinar_id: &str,
) -> Result<WebinarListing, BackendError> {
    let webinar = backend.fetch_webinar(webinar_id).await?;
    let registration = backend.find_user_webinar(user_id, webinar_id).await?;
    Ok(WebinarListing {
        webinar,
        registration,
    })
}

/// Registers the user for a webinar. An existing registration is rejected
/// without inserting a second row.
pub async fn register_for_webinar(
    backend: &dyn Backend,
    user_id: &str,
    webinar_id: &str,
) -> Result<UserWebinar, ActionError> {
    if backend.find_user_webinar(user_id, webinar_id).await?.is_some() {
        return Err(ActionError::AlreadyRegistered);
    }

    let registration = NewRegistration {
        user_id: user_id.to_string(),
        webinar_id: webinar_id.to_string(),
        status: WebinarStatus::Registered,
    };
    let row = backend.insert_registration(&registration).await?;
    log::info!("Registered {} for webinar {}", user_id, webinar_id);
    Ok(row)
}

/// Result of completing a webinar.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOutcome {
    pub registration: UserWebinar,
    pub certificate_issued: bool,
    /// Why no certificate was attached, when rendering failed.
    pub certificate_error: Option<String>,
    pub points_awarded: i64,
    pub new_total: i64,
    pub progress_percent: u8,
}

fn certificate_for(user: &Profile, webinar: &Webinar, now: DateTime<Utc>) -> CertificateDetails {
    CertificateDetails {
        recipient: user.full_name.clone(),
        title: webinar.title.clone(),
        presenter: webinar.presenter.clone(),
        date: webinar.date,
        duration_minutes: webinar.duration_minutes,
        cpd_points: webinar.cpd_points,
        certificate_id: now.timestamp_millis().to_string(),
    }
}

/// Marks a registered webinar completed, attaches a certificate and awards
/// its points.
///
/// The completion is recorded even when the certificate cannot be rendered;
/// the outcome then carries an empty certificate and the reason.
pub async fn complete_webinar(
    session: &mut Session,
    webinar_id: &str,
    now: DateTime<Utc>,
) -> Result<CompletionOutcome, ActionError> {
    let user = session.current_user()?.clone();
    let backend = session.backend().clone();

    let webinar = backend.fetch_webinar(webinar_id).await?;
    let registration = backend
        .find_user_webinar(&user.id, webinar_id)
        .await?
        .ok_or(ActionError::NotRegistered)?;
    if !registration.status.can_advance_to(WebinarStatus::Completed) {
        return Err(ActionError::AlreadyCompleted);
    }

    let (certificate_url, certificate_error) =
        match certificate::render_data_uri(&certificate_for(&user, &webinar, now)) {
            Ok(uri) => (uri, None),
            Err(e) => {
                log::warn!("Error generating certificate: {}", e);
                (String::new(), Some(e.to_string()))
            }
        };

    let completion = CompletionUpdate {
        status: WebinarStatus::Completed,
        completed_at: now,
        certificate_url,
    };
    backend
        .record_completion(&registration.id, &completion)
        .await?;

    let new_total = user.total_cpd_points + webinar.cpd_points;
    let profile = session
        .update_profile(&ProfileUpdate::points(new_total))
        .await?;
    let progress_percent = profile.progress_percent();

    let registration = backend.fetch_user_webinar(&registration.id).await?;
    log::info!(
        "Completed webinar {}: +{} points, total {}",
        webinar.id,
        webinar.cpd_points,
        new_total
    );

    Ok(CompletionOutcome {
        certificate_issued: certificate_error.is_none(),
        certificate_error,
        registration,
        points_awarded: webinar.cpd_points,
        new_total,
        progress_percent,
    })
}
