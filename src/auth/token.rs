use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Seconds before `expires_at` at which an access token is already treated as stale.
pub const EXPIRY_SKEW_SECS: i64 = 60;

/// The single persisted credential set.
///
/// Missing fields deserialize as empty/zero so that a damaged record is
/// simply stale (or unrecoverable) rather than unreadable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    /// Absolute expiry, seconds since the epoch.
    #[serde(default)]
    pub expires_at: i64,
}

impl TokenRecord {
    pub fn is_stale_at(&self, now: i64) -> bool {
        self.access_token.is_empty() || now >= self.expires_at.saturating_sub(EXPIRY_SKEW_SECS)
    }

    pub fn is_stale(&self) -> bool {
        self.is_stale_at(now())
    }

    pub fn has_refresh_token(&self) -> bool {
        !self.refresh_token.is_empty()
    }
}

/// Body returned by the token endpoint for both grant types.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: i64,

    /// Filled in by the endpoint client when the response arrives.
    #[serde(skip)]
    pub received_at: i64,
}

impl TokenResponse {
    pub fn stamped(mut self) -> Self {
        self.received_at = now();
        self
    }

    /// Converts the relative lifetime into an absolute record.
    ///
    /// `previous_refresh` is kept when the server did not rotate the refresh token.
    /// A negative lifetime counts as already expired.
    pub fn into_record(self, previous_refresh: Option<&str>) -> TokenRecord {
        let received_at = if self.received_at == 0 {
            now()
        } else {
            self.received_at
        };

        TokenRecord {
            access_token: self.access_token,
            refresh_token: self
                .refresh_token
                .filter(|token| !token.is_empty())
                .or_else(|| previous_refresh.map(str::to_owned))
                .unwrap_or_default(),
            expires_at: received_at.saturating_add(self.expires_in.max(0)),
        }
    }
}

pub fn now() -> i64 {
    Utc::now().timestamp()
}
