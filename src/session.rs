use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Report `is_authenticated` false this long before actual expiry, so a
/// caller treating "authenticated" as "safe to make one more request" does
/// not race an imminent expiry.
pub const AUTH_EXPIRY_BUFFER_MS: i64 = 5 * 60 * 1000;

/// Report `needs_refresh` true this long before actual expiry. Wider than
/// the authentication buffer: a periodic refresher gets a head start while
/// the session is still reported authenticated.
pub const REFRESH_BUFFER_MS: i64 = 10 * 60 * 1000;

/// The session credential set.
///
/// Fully present or fully absent: a store never yields a `Credentials`
/// unless the access token and expiry were persisted together. The refresh
/// and ID tokens are optional because the provider may not issue them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    /// Absolute expiry, epoch milliseconds.
    pub expires_at: i64,
}

impl Credentials {
    /// True iff the access token is still usable at `now` (epoch millis),
    /// with the 5-minute safety buffer applied.
    #[must_use]
    pub fn is_authenticated_at(&self, now_millis: i64) -> bool {
        now_millis < self.expires_at - AUTH_EXPIRY_BUFFER_MS
    }

    /// True iff a background refresh should be attempted at `now`
    /// (epoch millis), with the 10-minute buffer applied.
    #[must_use]
    pub fn needs_refresh_at(&self, now_millis: i64) -> bool {
        now_millis > self.expires_at - REFRESH_BUFFER_MS
    }
}

/// Transient PKCE context for a single authorization attempt.
///
/// Written by `authorization_url`, consumed by `handle_callback`. A single
/// overwritten slot, not a keyed map: starting a second authorization
/// invalidates the first. Correct only because one context can be
/// mid-redirect at a time — callers must serialize authorization attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceContext {
    pub state: String,
    pub code_verifier: String,
}

/// Current wall-clock time as epoch milliseconds.
#[must_use]
pub(crate) fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
