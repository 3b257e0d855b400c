pub mod cli_consts {
    //! Tracker Configuration Constants
    //!
    //! This module contains all configuration constants for the CPD client,
    //! organized by functional area for clarity and maintainability.

    /// User-Agent string with CLI version
    pub const USER_AGENT: &str = concat!("cpd-tracker/", env!("CARGO_PKG_VERSION"));

    // =============================================================================
    // NETWORK CONFIGURATION
    // =============================================================================

    /// Backend request resilience configuration
    pub mod network {
        use std::time::Duration;

        /// Per-attempt timeout for a backend request (milliseconds)
        pub const REQUEST_TIMEOUT_MS: u64 = 30_000;

        /// Maximum number of attempts for a backend request
        pub const MAX_ATTEMPTS: u32 = 3;

        /// Delay before the first retry, doubled after every failed attempt (milliseconds)
        pub const INITIAL_BACKOFF_MS: u64 = 300;

        /// Connect timeout for the underlying HTTP client (seconds)
        pub const CONNECT_TIMEOUT_SECS: u64 = 10;

        pub const fn request_timeout() -> Duration {
            Duration::from_millis(REQUEST_TIMEOUT_MS)
        }

        pub const fn initial_backoff() -> Duration {
            Duration::from_millis(INITIAL_BACKOFF_MS)
        }
    }

    /// Account sign-up configuration
    pub mod registration {
        use std::time::Duration;

        /// Attempts for the auth sign-up call
        pub const SIGNUP_ATTEMPTS: u32 = 3;

        /// Attempts for the profile upsert that follows sign-up
        pub const PROFILE_ATTEMPTS: u32 = 3;

        /// Delay before retrying a failed sign-up step (milliseconds)
        pub const INITIAL_BACKOFF_MS: u64 = 1_000;

        pub const fn initial_backoff() -> Duration {
            Duration::from_millis(INITIAL_BACKOFF_MS)
        }
    }

    /// Connectivity probe configuration
    pub mod probe {
        use std::time::Duration;

        /// Interval between checks when watching the connection (seconds)
        pub const WATCH_INTERVAL_SECS: u64 = 30;

        /// The probe reads a single row count from this table
        pub const PROBE_TABLE: &str = "profiles";

        pub const fn watch_interval() -> Duration {
            Duration::from_secs(WATCH_INTERVAL_SECS)
        }
    }

    // =============================================================================
    // CPD CONFIGURATION
    // =============================================================================

    pub mod cpd {
        /// Annual points target for new accounts when none is given
        pub const DEFAULT_REQUIRED_POINTS: i64 = 50;

        /// Number of upcoming webinars shown on the dashboard
        pub const UPCOMING_WEBINARS_LIMIT: usize = 3;

        /// Footer line printed on every certificate
        pub const CERTIFICATE_ISSUER: &str = "CPD Meducate Now";
    }
}
