//! Creating a new account: auth user plus profile row.

use crate::backend::Backend;
use crate::backend::error::BackendError;
use crate::consts::cli_consts::registration;
use crate::models::{AuthUser, NewProfile};
use crate::network::{ErrorHandler, RetryPolicy};
use crate::probe::{self, ConnectionStatus};
use crate::validation::SignUpForm;
use chrono::Utc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("{0}")]
    Validation(String),

    #[error("Cannot connect to server: {0}")]
    Disconnected(String),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Registration failed: no user was created")]
    NoUserCreated,
}

impl RegistrationError {
    /// One-line message for the terminal.
    pub fn user_message(&self) -> String {
        match self {
            RegistrationError::Validation(message) => message.clone(),
            RegistrationError::Disconnected(_) => {
                "Cannot connect to server. Please check your internet connection and try again."
                    .to_string()
            }
            RegistrationError::Backend(e) => e.user_message(),
            RegistrationError::NoUserCreated => self.to_string(),
        }
    }
}

/// Everything the sign-up form collects.
#[derive(Debug, Clone)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub full_name: String,
    pub profession: Option<String>,
    pub license_number: Option<String>,
    pub required_points: i64,
}

impl SignUpRequest {
    fn form(&self) -> SignUpForm<'_> {
        SignUpForm {
            email: &self.email,
            password: &self.password,
            confirm_password: &self.confirm_password,
            full_name: &self.full_name,
            required_points: self.required_points,
        }
    }
}

/// Registers a user with the backend.
///
/// The form is validated before any request; the connectivity probe then
/// gates the flow. Sign-up and the profile upsert are each retried on
/// transient failures. The new account is not signed in: the user confirms
/// their email and logs in.
pub async fn register_user(
    request: &SignUpRequest,
    backend: &dyn Backend,
) -> Result<AuthUser, RegistrationError> {
    request.form().validate().map_err(RegistrationError::Validation)?;

    if let ConnectionStatus::Disconnected(reason) = probe::check_connection(backend).await {
        return Err(RegistrationError::Disconnected(reason));
    }

    let handler = ErrorHandler::new();
    let retryable = |e: &BackendError| handler.should_retry_step(e);

    let user = create_auth_user(
        request,
        backend,
        RetryPolicy::registration_step(registration::SIGNUP_ATTEMPTS),
        &handler,
    )
    .await?;

    if user.id.is_empty() {
        return Err(RegistrationError::NoUserCreated);
    }
    log::info!("Created auth user {}", user.id);

    let profile = NewProfile {
        id: user.id.clone(),
        email: request.email.clone(),
        full_name: request.full_name.clone(),
        profession: request.profession.clone().unwrap_or_default(),
        license_number: request.license_number.clone().unwrap_or_default(),
        total_cpd_points: 0,
        required_annual_points: request.required_points,
        created_at: Utc::now(),
    };
    RetryPolicy::registration_step(registration::PROFILE_ATTEMPTS)
        .run("Profile creation", || backend.upsert_profile(&profile), retryable)
        .await
        .inspect_err(|e| handler.log("Profile creation", e))?;

    Ok(user)
}

/// Creates the auth user. Each attempt is a single request, so `policy`
/// alone decides how often the sign-up endpoint is hit.
async fn create_auth_user(
    request: &SignUpRequest,
    backend: &dyn Backend,
    policy: RetryPolicy,
    handler: &ErrorHandler,
) -> Result<AuthUser, BackendError> {
    policy
        .run(
            "Sign up",
            || backend.sign_up(&request.email, &request.password, &request.full_name),
            |e| handler.should_retry_step(e),
        )
        .await
        .inspect_err(|e| handler.log("Sign up", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendClient, MockBackend};
    use crate::environment::Environment;
    use crate::network::client::tests::dropping_server;
    use mockall::Sequence;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn request() -> SignUpRequest {
        SignUpRequest {
            email: "ada@example.com".to_string(),
            password: "secret".to_string(),
            confirm_password: "secret".to_string(),
            full_name: "Ada Lovelace".to_string(),
            profession: Some("Doctor".to_string()),
            license_number: None,
            required_points: 50,
        }
    }

    fn user() -> AuthUser {
        AuthUser {
            id: "user-1".to_string(),
            email: Some("ada@example.com".to_string()),
        }
    }

    #[tokio::test]
    async fn mismatched_passwords_never_touch_the_network() {
        let mut backend = MockBackend::new();
        backend.expect_ping().never();
        backend.expect_sign_up().never();
        backend.expect_upsert_profile().never();

        let mut request = request();
        request.confirm_password = "different".to_string();
        let err = register_user(&request, &backend).await.unwrap_err();
        assert!(matches!(err, RegistrationError::Validation(_)));
        assert_eq!(err.user_message(), "Passwords do not match");
    }

    #[tokio::test]
    async fn disconnected_backend_blocks_sign_up() {
        let mut backend = MockBackend::new();
        backend
            .expect_ping()
            .times(1)
            .returning(|| Err(BackendError::Timeout(Duration::from_secs(30))));
        backend.expect_sign_up().never();

        let err = register_user(&request(), &backend).await.unwrap_err();
        assert!(matches!(err, RegistrationError::Disconnected(_)));
        assert!(err.user_message().contains("internet connection"));
    }

    #[tokio::test]
    async fn creates_user_and_profile() {
        let mut backend = MockBackend::new();
        backend.expect_ping().returning(|| Ok(()));
        backend
            .expect_sign_up()
            .withf(|email, password, name| {
                email == "ada@example.com" && password == "secret" && name == "Ada Lovelace"
            })
            .times(1)
            .returning(|_, _, _| Ok(user()));
        backend
            .expect_upsert_profile()
            .withf(|profile| {
                profile.id == "user-1"
                    && profile.total_cpd_points == 0
                    && profile.required_annual_points == 50
                    && profile.profession == "Doctor"
                    && profile.license_number.is_empty()
            })
            .times(1)
            .returning(|_| Ok(()));

        let created = register_user(&request(), &backend).await.unwrap();
        assert_eq!(created.id, "user-1");
    }

    #[tokio::test(start_paused = true)]
    async fn transient_sign_up_failures_are_retried() {
        let mut backend = MockBackend::new();
        let mut seq = Sequence::new();
        backend.expect_ping().returning(|| Ok(()));
        backend
            .expect_sign_up()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_, _, _| {
                Err(BackendError::Http {
                    status: 503,
                    message: "unavailable".to_string(),
                })
            });
        backend
            .expect_sign_up()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(user()));
        backend.expect_upsert_profile().returning(|_| Ok(()));

        let start = tokio::time::Instant::now();
        register_user(&request(), &backend).await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_millis(3_000));
    }

    #[tokio::test(start_paused = true)]
    async fn validation_rejections_are_not_retried() {
        let mut backend = MockBackend::new();
        backend.expect_ping().returning(|| Ok(()));
        backend.expect_sign_up().times(1).returning(|_, _, _| {
            Err(BackendError::Http {
                status: 422,
                message: "User already registered".to_string(),
            })
        });
        backend.expect_upsert_profile().never();

        let err = register_user(&request(), &backend).await.unwrap_err();
        assert_eq!(err.user_message(), "User already registered");
    }

    #[tokio::test(start_paused = true)]
    async fn profile_upsert_gives_up_after_three_attempts() {
        let mut backend = MockBackend::new();
        backend.expect_ping().returning(|| Ok(()));
        backend.expect_sign_up().returning(|_, _, _| Ok(user()));
        backend
            .expect_upsert_profile()
            .times(3)
            .returning(|_| Err(BackendError::Timeout(Duration::from_secs(30))));

        let err = register_user(&request(), &backend).await.unwrap_err();
        assert!(matches!(
            err,
            RegistrationError::Backend(BackendError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn empty_user_id_means_no_user() {
        let mut backend = MockBackend::new();
        backend.expect_ping().returning(|| Ok(()));
        backend.expect_sign_up().returning(|_, _, _| {
            Ok(AuthUser {
                id: String::new(),
                email: None,
            })
        });
        backend.expect_upsert_profile().never();

        let err = register_user(&request(), &backend).await.unwrap_err();
        assert!(matches!(err, RegistrationError::NoUserCreated));
    }

    #[tokio::test]
    async fn sign_up_hits_the_endpoint_once_per_attempt() {
        let (addr, connections) = dropping_server().await;
        let client = BackendClient::new(Environment::new(&format!("http://{addr}"), "anon", None))
            .unwrap();

        let err = create_auth_user(
            &request(),
            &client,
            RetryPolicy::new(registration::SIGNUP_ATTEMPTS, Duration::from_millis(5)),
            &ErrorHandler::new(),
        )
        .await
        .unwrap_err();
        assert!(err.is_network());
        assert_eq!(
            connections.load(Ordering::SeqCst),
            registration::SIGNUP_ATTEMPTS as usize
        );
    }
}
