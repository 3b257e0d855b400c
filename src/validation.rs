//! Form input validation.

/// Check that a string looks like an email address: one `@`, a non-empty
/// local part and a dotted domain, no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }

    // Domain needs at least one dot with labels on both sides
    domain.split('.').count() >= 2 && domain.split('.').all(|label| !label.is_empty())
}

/// The annual requirement must be a positive number of points.
pub fn is_valid_required_points(points: i64) -> bool {
    points >= 1
}

/// Sign-up form fields, checked before anything touches the network.
#[derive(Debug, Clone, Copy)]
pub struct SignUpForm<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub confirm_password: &'a str,
    pub full_name: &'a str,
    pub required_points: i64,
}

impl SignUpForm<'_> {
    /// First problem found, as a message for the user.
    pub fn validate(&self) -> Result<(), String> {
        if self.password != self.confirm_password {
            return Err("Passwords do not match".to_string());
        }
        if !is_valid_email(self.email) {
            return Err(format!("Invalid email address: {}", self.email));
        }
        if self.password.is_empty() {
            return Err("Password is required".to_string());
        }
        if self.full_name.trim().is_empty() {
            return Err("Full name is required".to_string());
        }
        if !is_valid_required_points(self.required_points) {
            return Err("Required annual points must be at least 1".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form<'a>(password: &'a str, confirm: &'a str) -> SignUpForm<'a> {
        SignUpForm {
            email: "ada@example.com",
            password,
            confirm_password: confirm,
            full_name: "Ada Lovelace",
            required_points: 50,
        }
    }

    #[test]
    fn valid_email() {
        assert!(is_valid_email("ada@example.com"));
        assert!(is_valid_email("a.b+cpd@mail.example.co.uk"));
    }

    #[test]
    /// An address needs both a local part and a dotted domain.
    fn invalid_email_shapes() {
        assert!(!is_valid_email("ada"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("ada@localhost"));
        assert!(!is_valid_email("ada@example."));
        assert!(!is_valid_email("ada@@example.com"));
    }

    #[test]
    fn whitespace_is_rejected() {
        assert!(!is_valid_email("ada @example.com"));
        assert!(!is_valid_email(" ada@example.com"));
    }

    #[test]
    fn required_points_must_be_positive() {
        assert!(is_valid_required_points(1));
        assert!(!is_valid_required_points(0));
        assert!(!is_valid_required_points(-5));
    }

    #[test]
    fn mismatched_passwords_are_reported_first() {
        let mut form = form("secret1", "secret2");
        form.email = "not-an-email";
        assert_eq!(form.validate().unwrap_err(), "Passwords do not match");
    }

    #[test]
    fn complete_form_passes() {
        assert!(form("secret", "secret").validate().is_ok());
    }

    #[test]
    fn blank_name_fails() {
        let mut form = form("secret", "secret");
        form.full_name = "   ";
        assert_eq!(form.validate().unwrap_err(), "Full name is required");
    }
}
