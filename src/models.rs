//! Typed rows for the backend tables and the payloads written to them.
//!
//! Rows are parsed at the boundary: a missing required column is a decode
//! error, unknown columns are ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a user's relationship with a webinar.
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WebinarStatus {
    Registered,
    InProgress,
    Completed,
}

impl WebinarStatus {
    /// Status only ever moves forward: registered → in_progress → completed.
    pub fn can_advance_to(self, next: WebinarStatus) -> bool {
        next > self
    }

    pub fn label(self) -> &'static str {
        match self {
            WebinarStatus::Registered => "Registered",
            WebinarStatus::InProgress => "In Progress",
            WebinarStatus::Completed => "Completed",
        }
    }
}

/// A row of `profiles`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub email: String,
    pub full_name: String,
    #[serde(default)]
    pub profession: Option<String>,
    #[serde(default)]
    pub license_number: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    pub total_cpd_points: i64,
    pub required_annual_points: i64,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

impl Profile {
    /// Percentage of the annual requirement earned, rounded and capped at 100.
    pub fn progress_percent(&self) -> u8 {
        progress_percent(self.total_cpd_points, self.required_annual_points)
    }

    pub fn points_remaining(&self) -> i64 {
        (self.required_annual_points - self.total_cpd_points).max(0)
    }

    pub fn requirement_met(&self) -> bool {
        self.progress_percent() >= 100
    }

    /// Applies the present fields of an update to this profile.
    pub fn apply(&mut self, update: &ProfileUpdate) {
        if let Some(full_name) = &update.full_name {
            self.full_name = full_name.clone();
        }
        if let Some(profession) = &update.profession {
            self.profession = Some(profession.clone());
        }
        if let Some(license_number) = &update.license_number {
            self.license_number = Some(license_number.clone());
        }
        if let Some(points) = update.required_annual_points {
            self.required_annual_points = points;
        }
        if let Some(points) = update.total_cpd_points {
            self.total_cpd_points = points;
        }
    }
}

/// `min(round(total / required * 100), 100)`; a non-positive requirement is already met.
pub fn progress_percent(total: i64, required: i64) -> u8 {
    if required <= 0 {
        return 100;
    }
    let percent = (total.max(0) as f64 / required as f64 * 100.0).round();
    percent.min(100.0) as u8
}

/// A row of `webinars`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Webinar {
    pub id: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub presenter: String,
    #[serde(with = "timestamp")]
    pub date: DateTime<Utc>,
    pub duration_minutes: i64,
    pub cpd_points: i64,
    #[serde(default)]
    pub accreditation_body: String,
    pub category: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// A row of `user_webinars`, optionally with the joined webinar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserWebinar {
    pub id: String,
    pub user_id: String,
    pub webinar_id: String,
    #[serde(default, with = "timestamp::option")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub certificate_url: Option<String>,
    #[serde(default)]
    pub feedback: Option<String>,
    pub status: WebinarStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webinar: Option<Webinar>,
}

impl UserWebinar {
    /// A completed row can still lack a certificate when rendering failed.
    pub fn has_certificate(&self) -> bool {
        self.certificate_url
            .as_deref()
            .is_some_and(|url| !url.is_empty())
    }
}

/// A row of `accreditation_bodies`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccreditationBody {
    pub id: String,
    pub name: String,
    pub website_url: String,
    #[serde(default)]
    pub logo_url: Option<String>,
    pub submission_url: String,
    #[serde(default)]
    pub description: String,
}

/// Profile row written right after sign-up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewProfile {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub profession: String,
    pub license_number: String,
    pub total_cpd_points: i64,
    pub required_annual_points: i64,
    pub created_at: DateTime<Utc>,
}

/// Partial profile update; absent fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profession: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_annual_points: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_cpd_points: Option<i64>,
}

impl ProfileUpdate {
    pub fn points(total_cpd_points: i64) -> Self {
        Self {
            total_cpd_points: Some(total_cpd_points),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Insert payload for a webinar registration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewRegistration {
    pub user_id: String,
    pub webinar_id: String,
    pub status: WebinarStatus,
}

/// Update payload recording completion of a webinar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionUpdate {
    pub status: WebinarStatus,
    pub completed_at: DateTime<Utc>,
    pub certificate_url: String,
}

/// The user half of an auth session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Tokens issued by the auth service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix seconds; absent when the server only sends `expires_in`.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

impl AuthSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at <= now.timestamp())
    }
}

/// Lenient timestamp parsing: RFC 3339, naive date-times and bare dates are all
/// read as UTC.
pub mod timestamp {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn parse(value: &str) -> Option<DateTime<Utc>> {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
            return Some(parsed.with_timezone(&Utc));
        }
        // Postgres renders timestamptz with a space and a short offset
        if let Ok(parsed) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%#z") {
            return Some(parsed.with_timezone(&Utc));
        }
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
            return Some(parsed.and_utc());
        }
        NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(value) => serializer.serialize_some(&value.to_rfc3339()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) => super::parse(&raw)
                    .map(Some)
                    .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}"))),
                None => Ok(None),
            }
        }
    }
}
