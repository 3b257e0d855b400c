use reqwest::Url;
use std::fmt::{Debug, Display, Formatter};

/// Site origin used for the email confirmation redirect when none is configured.
pub const DEFAULT_SITE_URL: &str = "http://localhost:5173";

/// Deployment settings for the hosted backend the CLI talks to.
#[derive(Clone, PartialEq, Eq)]
pub struct Environment {
    backend_url: String,
    anon_key: String,
    site_url: String,
}

impl Environment {
    pub fn new(backend_url: &str, anon_key: &str, site_url: Option<&str>) -> Self {
        Self {
            backend_url: backend_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            site_url: site_url
                .unwrap_or(DEFAULT_SITE_URL)
                .trim_end_matches('/')
                .to_string(),
        }
    }

    /// Returns the backend service URL without a trailing slash.
    pub fn backend_url(&self) -> &str {
        &self.backend_url
    }

    /// Returns the public (anonymous) API key.
    pub fn anon_key(&self) -> &str {
        &self.anon_key
    }

    /// Returns the REST endpoint for a table.
    pub fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.backend_url, table)
    }

    /// Returns an auth endpoint, e.g. `signup` or `token`.
    pub fn auth_url(&self, endpoint: &str) -> String {
        format!(
            "{}/auth/v1/{}",
            self.backend_url,
            endpoint.trim_start_matches('/')
        )
    }

    /// Where the confirmation email sends a freshly signed-up user.
    pub fn email_redirect_url(&self) -> String {
        format!("{}/login", self.site_url)
    }

    /// Checks that the backend URL is an absolute `http(s)` URL.
    pub fn validate(&self) -> Result<(), String> {
        let invalid = || {
            format!(
                "Backend URL `{}` is invalid. Set CPD_BACKEND_URL to a full URL such as https://<project>.backend.co",
                self.backend_url
            )
        };
        let url = Url::parse(&self.backend_url).map_err(|_| invalid())?;
        match url.scheme() {
            "http" | "https" if url.has_host() => Ok(()),
            _ => Err(invalid()),
        }
    }

    /// Whether both values needed to reach the backend are present.
    pub fn is_configured(&self) -> bool {
        !self.backend_url.is_empty() && !self.anon_key.is_empty()
    }
}

impl Display for Environment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.backend_url.is_empty() {
            write!(f, "<unconfigured>")
        } else {
            write!(f, "{}", self.backend_url)
        }
    }
}

// The anon key is public but still kept out of debug logs.
impl Debug for Environment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Environment {{ backend: {}, site: {} }}",
            self, self.site_url
        )
    }
}
