//! Profile editing.

use crate::models::ProfileUpdate;
use crate::validation::is_valid_required_points;

/// Fields the user may change on their profile. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct ProfileEdit {
    pub full_name: Option<String>,
    pub profession: Option<String>,
    pub license_number: Option<String>,
    pub required_points: Option<i64>,
}

impl ProfileEdit {
    /// Validates the edit and turns it into a backend update.
    pub fn into_update(self) -> Result<ProfileUpdate, String> {
        if let Some(name) = &self.full_name {
            if name.trim().is_empty() {
                return Err("Full name cannot be empty".to_string());
            }
        }
        if let Some(points) = self.required_points {
            if !is_valid_required_points(points) {
                return Err("Required annual points must be at least 1".to_string());
            }
        }

        let update = ProfileUpdate {
            full_name: self.full_name.map(|name| name.trim().to_string()),
            profession: self.profession,
            license_number: self.license_number,
            required_annual_points: self.required_points,
            total_cpd_points: None,
        };
        if update.is_empty() {
            return Err("Nothing to update".to_string());
        }
        Ok(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_partial_update() {
        let update = ProfileEdit {
            full_name: Some("  Ada Lovelace ".to_string()),
            required_points: Some(40),
            ..ProfileEdit::default()
        }
        .into_update()
        .unwrap();

        assert_eq!(update.full_name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(update.required_annual_points, Some(40));
        assert!(update.profession.is_none());
        assert!(update.total_cpd_points.is_none());
    }

    #[test]
    fn rejects_zero_requirement() {
        let err = ProfileEdit {
            required_points: Some(0),
            ..ProfileEdit::default()
        }
        .into_update()
        .unwrap_err();
        assert!(err.contains("at least 1"));
    }

    #[test]
    fn rejects_empty_edit() {
        assert_eq!(
            ProfileEdit::default().into_update().unwrap_err(),
            "Nothing to update"
        );
    }

    #[test]
    fn serializes_only_present_fields() {
        let update = ProfileEdit {
            profession: Some("Nurse".to_string()),
            ..ProfileEdit::default()
        }
        .into_update()
        .unwrap();
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            serde_json::json!({ "profession": "Nurse" })
        );
    }
}
