//! Earned certificates: listing and export.

use crate::backend::Backend;
use crate::backend::error::BackendError;
use crate::certificate::{self, CertificateError};
use crate::models::{UserWebinar, Webinar, WebinarStatus};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("No completed webinar with id {0}")]
    NotCompleted(String),

    #[error("No certificate was issued for this webinar")]
    NoCertificate,

    #[error(transparent)]
    Certificate(#[from] CertificateError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Failed to write certificate: {0}")]
    Io(#[from] std::io::Error),
}

impl ExportError {
    pub fn user_message(&self) -> String {
        match self {
            ExportError::Backend(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

/// A completed registration with its webinar.
#[derive(Debug, Clone, PartialEq)]
pub struct CertificateEntry {
    pub registration: UserWebinar,
    pub webinar: Webinar,
}

impl CertificateEntry {
    fn from_row(mut row: UserWebinar) -> Option<Self> {
        let webinar = row.webinar.take()?;
        Some(Self {
            registration: row,
            webinar,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct CertificateFilter {
    pub search: Option<String>,
    pub category: Option<String>,
}

impl CertificateFilter {
    pub fn matches(&self, entry: &CertificateEntry) -> bool {
        let search_ok = match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => entry
                .webinar
                .title
                .to_lowercase()
                .contains(&term.to_lowercase()),
            _ => true,
        };
        let category_ok = match self.category.as_deref() {
            Some(category) if !category.is_empty() => entry.webinar.category == category,
            _ => true,
        };
        search_ok && category_ok
    }
}

/// Completed webinars, most recently completed first. Rows whose webinar
/// no longer exists are skipped.
pub async fn load_certificates(
    backend: &dyn Backend,
    user_id: &str,
    filter: &CertificateFilter,
) -> Result<Vec<CertificateEntry>, BackendError> {
    let rows = backend.list_completed(user_id).await?;
    let total = rows.len();
    let entries: Vec<CertificateEntry> = rows
        .into_iter()
        .filter_map(CertificateEntry::from_row)
        .collect();
    if entries.len() < total {
        log::debug!(
            "Skipped {} completed rows without a webinar",
            total - entries.len()
        );
    }
    Ok(entries.into_iter().filter(|e| filter.matches(e)).collect())
}

/// Writes the certificate of one of the user's completed webinars to `out`.
/// Returns the number of bytes written.
pub async fn export_certificate(
    backend: &dyn Backend,
    user_id: &str,
    user_webinar_id: &str,
    out: &Path,
) -> Result<usize, ExportError> {
    let row = match backend.fetch_user_webinar(user_webinar_id).await {
        Ok(row) => row,
        Err(BackendError::NotFound(_)) => {
            return Err(ExportError::NotCompleted(user_webinar_id.to_string()));
        }
        Err(e) => return Err(e.into()),
    };
    if row.user_id != user_id || row.status != WebinarStatus::Completed {
        return Err(ExportError::NotCompleted(user_webinar_id.to_string()));
    }

    let uri = row
        .certificate_url
        .as_deref()
        .filter(|url| !url.is_empty())
        .ok_or(ExportError::NoCertificate)?;
    let pdf = certificate::decode_data_uri(uri)?;

    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(out, &pdf)?;
    Ok(pdf.len())
}
