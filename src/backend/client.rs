//! Hosted backend client
//!
//! Talks to the REST data API (`/rest/v1`) and the auth API (`/auth/v1`).
//! Every request goes through the [`NetworkClient`] retry policy except the
//! connectivity ping and the two sign-up writes, which are sent once.

use crate::backend::Backend;
use crate::backend::error::BackendError;
use crate::backend::query::Query;
use crate::environment::Environment;
use crate::models::{
    AccreditationBody, AuthSession, AuthUser, CompletionUpdate, NewProfile, NewRegistration,
    Profile, ProfileUpdate, UserWebinar, Webinar,
};
use crate::network::{Delivery, NetworkClient, Reply, RetryPolicy};
use chrono::{DateTime, Utc};
use reqwest::{Method, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::RwLock;

const PROFILES: &str = "profiles";
const WEBINARS: &str = "webinars";
const USER_WEBINARS: &str = "user_webinars";
const ACCREDITATION_BODIES: &str = "accreditation_bodies";

/// Token grant as returned by the auth service.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: AuthUser,
}

impl TokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> AuthSession {
        let expires_at = self
            .expires_at
            .or_else(|| self.expires_in.map(|secs| now.timestamp() + secs));
        AuthSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

/// Sign-up answers with a bare user when email confirmation is on and with a
/// full session when it is off.
#[derive(Debug, Deserialize)]
struct SignUpResponse {
    #[serde(default)]
    user: Option<AuthUser>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

impl SignUpResponse {
    fn into_user(self) -> Option<AuthUser> {
        self.user.or_else(|| {
            self.id.map(|id| AuthUser {
                id,
                email: self.email,
            })
        })
    }
}

#[derive(Debug)]
pub struct BackendClient {
    network: NetworkClient,
    environment: Environment,
    access_token: RwLock<Option<String>>,
}

impl BackendClient {
    pub fn new(environment: Environment) -> Result<Self, BackendError> {
        Self::with_policy(environment, RetryPolicy::backend_request())
    }

    pub fn with_policy(environment: Environment, policy: RetryPolicy) -> Result<Self, BackendError> {
        Ok(Self {
            network: NetworkClient::new(policy)?,
            environment,
            access_token: RwLock::new(None),
        })
    }

    fn bearer(&self) -> String {
        self.access_token
            .read()
            .ok()
            .and_then(|token| token.clone())
            .unwrap_or_else(|| self.environment.anon_key().to_string())
    }

    fn authorize(&self, builder: RequestBuilder, bearer: &str) -> RequestBuilder {
        builder
            .header("apikey", self.environment.anon_key())
            .bearer_auth(bearer)
    }

    fn handle_response_status(reply: Reply) -> Result<Reply, BackendError> {
        if !reply.is_success() {
            return Err(BackendError::from_reply(reply.status, &reply.body));
        }
        Ok(reply)
    }

    fn decode_response<T: DeserializeOwned>(reply: Reply) -> Result<T, BackendError> {
        let reply = Self::handle_response_status(reply)?;
        serde_json::from_slice(&reply.body).map_err(BackendError::Decode)
    }

    async fn select<T: DeserializeOwned>(&self, query: &Query) -> Result<Vec<T>, BackendError> {
        let url = self.environment.rest_url(query.table());
        let params = query.params();
        let bearer = self.bearer();
        log::debug!("GET {}", query);
        let response = self
            .network
            .send(&format!("select {}", query.table()), |client| {
                self.authorize(client.get(&url), &bearer).query(&params)
            })
            .await?;
        Self::decode_response(response)
    }

    async fn select_one<T: DeserializeOwned>(&self, query: &Query, what: &str) -> Result<T, BackendError> {
        self.select(query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::NotFound(what.to_string()))
    }

    /// Sends a write to a table. `prefer` becomes the `Prefer` header.
    async fn write(
        &self,
        delivery: Delivery,
        method: Method,
        table: &str,
        params: Vec<(String, String)>,
        body: Value,
        prefer: &str,
    ) -> Result<Reply, BackendError> {
        let url = self.environment.rest_url(table);
        let bearer = self.bearer();
        let response = self
            .network
            .deliver(delivery, &format!("{} {}", method, table), |client| {
                self.authorize(client.request(method.clone(), &url), &bearer)
                    .header("Prefer", prefer)
                    .query(&params)
                    .json(&body)
            })
            .await?;
        Self::handle_response_status(response)
    }

    async fn auth_post<T: DeserializeOwned>(
        &self,
        delivery: Delivery,
        endpoint: &str,
        params: &[(&str, &str)],
        body: Value,
    ) -> Result<T, BackendError> {
        let url = self.environment.auth_url(endpoint);
        let bearer = self.bearer();
        let response = self
            .network
            .deliver(delivery, &format!("auth {}", endpoint), |client| {
                self.authorize(client.post(&url), &bearer)
                    .query(params)
                    .json(&body)
            })
            .await?;
        Self::decode_response(response)
    }
}

#[async_trait::async_trait]
impl Backend for BackendClient {
    fn set_access_token(&self, token: Option<String>) {
        if let Ok(mut current) = self.access_token.write() {
            *current = token;
        }
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<AuthUser, BackendError> {
        let redirect = self.environment.email_redirect_url();
        let body = json!({
            "email": email,
            "password": password,
            "data": { "full_name": full_name },
        });
        let response: SignUpResponse = self
            .auth_post(
                Delivery::Once,
                "signup",
                &[("redirect_to", redirect.as_str())],
                body,
            )
            .await?;
        response
            .into_user()
            .ok_or_else(|| BackendError::Unexpected("sign-up returned no user".to_string()))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, BackendError> {
        let body = json!({ "email": email, "password": password });
        let response: TokenResponse = self
            .auth_post(Delivery::Retried, "token", &[("grant_type", "password")], body)
            .await?;
        Ok(response.into_session(Utc::now()))
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        let url = self.environment.auth_url("logout");
        let bearer = self.bearer();
        let response = self
            .network
            .send("auth logout", |client| self.authorize(client.post(&url), &bearer))
            .await?;
        Self::handle_response_status(response)?;
        Ok(())
    }

    async fn current_user(&self) -> Result<AuthUser, BackendError> {
        let url = self.environment.auth_url("user");
        let bearer = self.bearer();
        let response = self
            .network
            .send("auth user", |client| self.authorize(client.get(&url), &bearer))
            .await?;
        Self::decode_response(response)
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession, BackendError> {
        let body = json!({ "refresh_token": refresh_token });
        let response: TokenResponse = self
            .auth_post(
                Delivery::Retried,
                "token",
                &[("grant_type", "refresh_token")],
                body,
            )
            .await?;
        Ok(response.into_session(Utc::now()))
    }

    async fn ping(&self) -> Result<(), BackendError> {
        let query = Query::from(crate::consts::cli_consts::probe::PROBE_TABLE)
            .select("count")
            .limit(1);
        let url = self.environment.rest_url(query.table());
        let params = query.params();
        let bearer = self.bearer();
        let response = self
            .network
            .send_once("connectivity probe", |client| {
                self.authorize(client.get(&url), &bearer).query(&params)
            })
            .await?;
        Self::handle_response_status(response)?;
        Ok(())
    }

    async fn fetch_profile(&self, user_id: &str) -> Result<Profile, BackendError> {
        let query = Query::from(PROFILES).eq("id", user_id);
        self.select_one(&query, "Profile").await
    }

    async fn upsert_profile(&self, profile: &NewProfile) -> Result<(), BackendError> {
        let params = vec![("on_conflict".to_string(), "id".to_string())];
        self.write(
            Delivery::Once,
            Method::POST,
            PROFILES,
            params,
            serde_json::to_value(profile)?,
            "resolution=merge-duplicates,return=minimal",
        )
        .await?;
        Ok(())
    }

    async fn update_profile(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> Result<(), BackendError> {
        let target = Query::from(PROFILES).eq("id", user_id);
        self.write(
            Delivery::Retried,
            Method::PATCH,
            PROFILES,
            target.filter_params(),
            serde_json::to_value(update)?,
            "return=minimal",
        )
        .await?;
        Ok(())
    }

    async fn list_webinars(&self) -> Result<Vec<Webinar>, BackendError> {
        self.select(&Query::from(WEBINARS).order("date", false)).await
    }

    async fn upcoming_webinars(
        &self,
        from: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Webinar>, BackendError> {
        let query = Query::from(WEBINARS)
            .gte("date", from.to_rfc3339())
            .order("date", true)
            .limit(limit);
        self.select(&query).await
    }

    async fn fetch_webinar(&self, webinar_id: &str) -> Result<Webinar, BackendError> {
        self.select_one(&Query::from(WEBINARS).eq("id", webinar_id), "Webinar")
            .await
    }

    async fn list_user_webinars(&self, user_id: &str) -> Result<Vec<UserWebinar>, BackendError> {
        self.select(&Query::from(USER_WEBINARS).eq("user_id", user_id))
            .await
    }

    async fn find_user_webinar(
        &self,
        user_id: &str,
        webinar_id: &str,
    ) -> Result<Option<UserWebinar>, BackendError> {
        let query = Query::from(USER_WEBINARS)
            .eq("user_id", user_id)
            .eq("webinar_id", webinar_id)
            .limit(1);
        Ok(self.select(&query).await?.into_iter().next())
    }

    async fn fetch_user_webinar(&self, id: &str) -> Result<UserWebinar, BackendError> {
        let query = Query::from(USER_WEBINARS)
            .select("*,webinar:webinars(*)")
            .eq("id", id);
        self.select_one(&query, "Registration").await
    }

    async fn insert_registration(
        &self,
        registration: &NewRegistration,
    ) -> Result<UserWebinar, BackendError> {
        let response = self
            .write(
                Delivery::Retried,
                Method::POST,
                USER_WEBINARS,
                vec![("select".to_string(), "*".to_string())],
                serde_json::to_value(registration)?,
                "return=representation",
            )
            .await?;
        let rows: Vec<UserWebinar> = Self::decode_response(response)?;
        rows.into_iter()
            .next()
            .ok_or_else(|| BackendError::Unexpected("insert returned no row".to_string()))
    }

    async fn record_completion(
        &self,
        user_webinar_id: &str,
        completion: &CompletionUpdate,
    ) -> Result<(), BackendError> {
        let target = Query::from(USER_WEBINARS).eq("id", user_webinar_id);
        self.write(
            Delivery::Retried,
            Method::PATCH,
            USER_WEBINARS,
            target.filter_params(),
            serde_json::to_value(completion)?,
            "return=minimal",
        )
        .await?;
        Ok(())
    }

    async fn list_completed(&self, user_id: &str) -> Result<Vec<UserWebinar>, BackendError> {
        let query = Query::from(USER_WEBINARS)
            .select("*,webinar:webinars(*)")
            .eq("user_id", user_id)
            .eq("status", "completed")
            .order("completed_at", false);
        self.select(&query).await
    }

    async fn list_accreditation_bodies(&self) -> Result<Vec<AccreditationBody>, BackendError> {
        self.select(&Query::from(ACCREDITATION_BODIES).order("name", true))
            .await
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::client::tests::{dropping_server, stalling_server};
    use chrono::TimeZone;
    use std::sync::atomic::Ordering;
    use std::time::{Duration, Instant};

    fn unreachable_client() -> BackendClient {
        BackendClient::with_policy(
            Environment::new("http://127.0.0.1:9", "anon", None),
            RetryPolicy::new(1, Duration::from_millis(1)).with_timeout(Duration::from_secs(5)),
        )
        .unwrap()
    }

    #[test]
    fn token_response_computes_expiry() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let response: TokenResponse = serde_json::from_value(json!({
            "access_token": "a",
            "token_type": "bearer",
            "refresh_token": "r",
            "expires_in": 3600,
            "user": { "id": "u1", "email": "a@b.co", "aud": "authenticated" }
        }))
        .unwrap();
        let session = response.into_session(now);
        assert_eq!(session.expires_at, Some(now.timestamp() + 3600));
        assert_eq!(session.user.id, "u1");
    }

    #[test]
    fn sign_up_response_accepts_both_shapes() {
        let bare: SignUpResponse =
            serde_json::from_value(json!({ "id": "u1", "email": "a@b.co" })).unwrap();
        assert_eq!(bare.into_user().unwrap().id, "u1");

        let session: SignUpResponse = serde_json::from_value(json!({
            "access_token": "a",
            "user": { "id": "u2", "email": "c@d.co" }
        }))
        .unwrap();
        assert_eq!(session.into_user().unwrap().id, "u2");

        let empty: SignUpResponse = serde_json::from_value(json!({})).unwrap();
        assert!(empty.into_user().is_none());
    }

    #[test]
    fn bearer_falls_back_to_anon_key() {
        let client = unreachable_client();
        assert_eq!(client.bearer(), "anon");
        client.set_access_token(Some("jwt".to_string()));
        assert_eq!(client.bearer(), "jwt");
        client.set_access_token(None);
        assert_eq!(client.bearer(), "anon");
    }

    #[tokio::test]
    async fn ping_reports_network_failure() {
        let err = unreachable_client().ping().await.unwrap_err();
        assert!(err.is_network());
    }

    #[tokio::test]
    async fn stalled_reply_is_cancelled_by_the_attempt_timeout() {
        let addr = stalling_server().await;
        let client = BackendClient::with_policy(
            Environment::new(&format!("http://{addr}"), "anon", None),
            RetryPolicy::new(1, Duration::from_millis(1)).with_timeout(Duration::from_millis(500)),
        )
        .unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), client.list_webinars())
            .await
            .expect("list should not hang past its attempt timeout");
        let err = result.unwrap_err();
        assert!(err.is_timeout(), "expected timeout, got {err:?}");
    }

    #[tokio::test]
    async fn sign_up_and_profile_upsert_are_sent_once() {
        let (addr, connections) = dropping_server().await;
        let client = BackendClient::with_policy(
            Environment::new(&format!("http://{addr}"), "anon", None),
            RetryPolicy::new(3, Duration::from_millis(5)).with_timeout(Duration::from_secs(5)),
        )
        .unwrap();

        let err = client
            .sign_up("ada@example.com", "secret", "Ada Lovelace")
            .await
            .unwrap_err();
        assert!(err.is_network());
        assert_eq!(connections.load(Ordering::SeqCst), 1);

        let profile = NewProfile {
            id: "user-1".to_string(),
            email: "ada@example.com".to_string(),
            full_name: "Ada Lovelace".to_string(),
            profession: String::new(),
            license_number: String::new(),
            total_cpd_points: 0,
            required_annual_points: 50,
            created_at: Utc::now(),
        };
        client.upsert_profile(&profile).await.unwrap_err();
        assert_eq!(connections.load(Ordering::SeqCst), 2);

        // Reads keep the policy's retries.
        client.list_webinars().await.unwrap_err();
        assert_eq!(connections.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn backend_url_without_scheme_fails_fast() {
        let client = BackendClient::new(Environment::new("abc.backend.co", "anon", None)).unwrap();
        let start = Instant::now();
        let err = client.list_webinars().await.unwrap_err();
        assert!(err.is_config(), "expected config error, got {err:?}");
        assert!(!err.user_message().contains("internet connection"));
        // The first backoff is 300ms; a config error never waits for it.
        assert!(start.elapsed() < Duration::from_millis(300));
    }
}
