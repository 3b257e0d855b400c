//! Accreditation body directory.

use crate::backend::Backend;
use crate::models::AccreditationBody;

/// Where the directory came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectorySource {
    Backend,
    /// The table was empty or unreadable.
    Sample,
}

fn body(id: &str, name: &str, slug: &str, description: &str) -> AccreditationBody {
    AccreditationBody {
        id: id.to_string(),
        name: name.to_string(),
        website_url: format!("https://example.com/{slug}"),
        logo_url: None,
        submission_url: format!("https://example.com/{slug}/submit"),
        description: description.to_string(),
    }
}

/// Shown when the backend has no bodies.
pub fn sample_bodies() -> Vec<AccreditationBody> {
    vec![
        body(
            "1",
            "Medical Council",
            "medical-council",
            "The Medical Council is responsible for maintaining the register of medical \
             practitioners and ensuring high standards in medical education, training, and practice.",
        ),
        body(
            "2",
            "Nursing and Midwifery Board",
            "nursing-board",
            "The Nursing and Midwifery Board regulates the practice of nursing and midwifery \
             to protect the public and ensure high standards of care.",
        ),
        body(
            "3",
            "Pharmacy Board",
            "pharmacy-board",
            "The Pharmacy Board is responsible for registering pharmacists and setting standards \
             for pharmacy practice to ensure the safe and effective delivery of pharmacy services.",
        ),
        body(
            "4",
            "Dental Council",
            "dental-council",
            "The Dental Council regulates dental professionals to ensure they meet and maintain \
             professional standards for the protection of the public.",
        ),
    ]
}

/// Case-insensitive match on name or description.
pub fn matches_search(body: &AccreditationBody, search: &str) -> bool {
    let term = search.trim().to_lowercase();
    term.is_empty()
        || body.name.to_lowercase().contains(&term)
        || body.description.to_lowercase().contains(&term)
}

/// The directory ordered by name, filtered by `search`.
pub async fn load_directory(
    backend: &dyn Backend,
    search: Option<&str>,
) -> (DirectorySource, Vec<AccreditationBody>) {
    let (source, bodies) = match backend.list_accreditation_bodies().await {
        Ok(bodies) if !bodies.is_empty() => (DirectorySource::Backend, bodies),
        Ok(_) => (DirectorySource::Sample, sample_bodies()),
        Err(e) if e.is_config() => {
            log::debug!("Backend unusable, showing the sample directory: {}", e);
            (DirectorySource::Sample, sample_bodies())
        }
        Err(e) => {
            log::warn!("Error fetching accreditation bodies: {}", e);
            (DirectorySource::Sample, sample_bodies())
        }
    };

    (source, filter(bodies, search))
}

/// The sample directory, for when no backend is configured.
pub fn sample_directory(search: Option<&str>) -> Vec<AccreditationBody> {
    filter(sample_bodies(), search)
}

fn filter(bodies: Vec<AccreditationBody>, search: Option<&str>) -> Vec<AccreditationBody> {
    let search = search.unwrap_or_default();
    bodies
        .into_iter()
        .filter(|b| matches_search(b, search))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::backend::error::BackendError;

    #[tokio::test]
    async fn empty_table_shows_sample_directory() {
        let mut backend = MockBackend::new();
        backend
            .expect_list_accreditation_bodies()
            .returning(|| Ok(vec![]));

        let (source, bodies) = load_directory(&backend, None).await;
        assert_eq!(source, DirectorySource::Sample);
        assert_eq!(bodies.len(), 4);
        assert_eq!(bodies[0].name, "Medical Council");
    }

    #[tokio::test]
    async fn fetch_error_falls_back_to_sample() {
        let mut backend = MockBackend::new();
        backend.expect_list_accreditation_bodies().returning(|| {
            Err(BackendError::Http {
                status: 500,
                message: String::new(),
            })
        });

        let (source, _) = load_directory(&backend, None).await;
        assert_eq!(source, DirectorySource::Sample);
    }

    #[tokio::test]
    async fn search_covers_description() {
        let mut backend = MockBackend::new();
        backend
            .expect_list_accreditation_bodies()
            .returning(|| Ok(sample_bodies()));

        let (source, bodies) = load_directory(&backend, Some("PHARMACISTS")).await;
        assert_eq!(source, DirectorySource::Backend);
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0].name, "Pharmacy Board");
    }

    #[test]
    fn sample_directory_applies_search() {
        let bodies = sample_directory(Some("dental"));
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0].name, "Dental Council");
        assert_eq!(sample_directory(None).len(), 4);
    }

    #[test]
    fn blank_search_matches_everything() {
        assert!(sample_bodies().iter().all(|b| matches_search(b, "  ")));
    }
}
