//! Progress dashboard.

use crate::backend::Backend;
use crate::backend::error::BackendError;
use crate::consts::cli_consts::cpd::UPCOMING_WEBINARS_LIMIT;
use crate::models::{Profile, UserWebinar, Webinar};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Dashboard {
    pub full_name: String,
    pub total_points: i64,
    pub required_points: i64,
    pub progress_percent: u8,
    pub points_remaining: i64,
    pub completed_count: usize,
    /// Category → points, alphabetical.
    pub points_by_category: BTreeMap<String, i64>,
    /// (`Mon yyyy`, points), oldest month first.
    pub points_by_month: Vec<(String, i64)>,
    pub upcoming: Vec<Webinar>,
}

pub fn points_by_category(completed: &[UserWebinar]) -> BTreeMap<String, i64> {
    let mut totals = BTreeMap::new();
    for webinar in completed.iter().filter_map(|row| row.webinar.as_ref()) {
        *totals.entry(webinar.category.clone()).or_insert(0) += webinar.cpd_points;
    }
    totals
}

/// Points per completion month. Rows without a completion date or webinar
/// are ignored.
pub fn points_by_month(completed: &[UserWebinar]) -> Vec<(String, i64)> {
    let mut totals: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    for row in completed {
        let (Some(completed_at), Some(webinar)) = (row.completed_at, row.webinar.as_ref()) else {
            continue;
        };
        let Some(month) = completed_at.date_naive().with_day(1) else {
            continue;
        };
        *totals.entry(month).or_insert(0) += webinar.cpd_points;
    }
    totals
        .into_iter()
        .map(|(month, points)| (month.format("%b %Y").to_string(), points))
        .collect()
}

/// Builds the dashboard for `user` as of `now`.
pub async fn load_dashboard(
    backend: &dyn Backend,
    user: &Profile,
    now: DateTime<Utc>,
) -> Result<Dashboard, BackendError> {
    let completed = backend.list_completed(&user.id).await?;
    let upcoming = backend
        .upcoming_webinars(now, UPCOMING_WEBINARS_LIMIT)
        .await?;

    Ok(Dashboard {
        full_name: user.full_name.clone(),
        total_points: user.total_cpd_points,
        required_points: user.required_annual_points,
        progress_percent: user.progress_percent(),
        points_remaining: user.points_remaining(),
        completed_count: completed.len(),
        points_by_category: points_by_category(&completed),
        points_by_month: points_by_month(&completed),
        upcoming,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::models::WebinarStatus;
    use crate::session::default_profile;
    use crate::webinars::tests::{registration, webinar};
    use chrono::TimeZone;
    use mockall::predicate::eq;

    fn done(category: &str, points: i64, year: i32, month: u32) -> UserWebinar {
        let mut row = registration("uw", "w", WebinarStatus::Completed);
        row.completed_at = Some(Utc.with_ymd_and_hms(year, month, 15, 10, 0, 0).unwrap());
        row.webinar = Some(webinar("w", "T", category, points));
        row
    }

    #[test]
    fn sums_points_per_category() {
        let rows = vec![
            done("Cardiology", 5, 2024, 1),
            done("Oncology", 3, 2024, 1),
            done("Cardiology", 10, 2024, 2),
        ];
        let totals = points_by_category(&rows);
        assert_eq!(totals["Cardiology"], 15);
        assert_eq!(totals["Oncology"], 3);
    }

    #[test]
    fn months_are_chronological_across_years() {
        let rows = vec![
            done("A", 2, 2024, 1),
            done("A", 5, 2023, 12),
            done("A", 1, 2024, 1),
        ];
        assert_eq!(
            points_by_month(&rows),
            vec![("Dec 2023".to_string(), 5), ("Jan 2024".to_string(), 3)]
        );
    }

    #[tokio::test]
    async fn dashboard_combines_profile_and_history() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let mut backend = MockBackend::new();
        backend
            .expect_list_completed()
            .with(eq("default-user-id"))
            .returning(|_| Ok(vec![done("Cardiology", 10, 2024, 2)]));
        backend
            .expect_upcoming_webinars()
            .with(eq(now), eq(3usize))
            .returning(|_, _| Ok(vec![webinar("w9", "Next", "Oncology", 4)]));

        let dashboard = load_dashboard(&backend, &default_profile(), now).await.unwrap();
        assert_eq!(dashboard.progress_percent, 50);
        assert_eq!(dashboard.points_remaining, 25);
        assert_eq!(dashboard.completed_count, 1);
        assert_eq!(dashboard.upcoming.len(), 1);
        assert_eq!(dashboard.points_by_month, vec![("Feb 2024".to_string(), 10)]);
    }
}
