//! Stored per-user catalog credentials

use std::fmt;

use cadence_catalog_client::TokenGrant;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Seconds before the stated expiry at which a token is already treated as expired
pub const EXPIRY_LEEWAY_SECS: i64 = 60;

/// Access/refresh token pair for one catalog user
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("user_id", &self.user_id)
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl Token {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_LEEWAY_SECS) >= self.expires_at
    }

    /// Apply a refresh grant; the refresh token is kept unless the grant rotates it
    pub fn refreshed(&self, grant: TokenGrant, now: DateTime<Utc>) -> Self {
        let expires_in = i64::try_from(grant.expires_in).unwrap_or(i64::MAX / 1000);
        Self {
            user_id: self.user_id.clone(),
            access_token: grant.access_token,
            refresh_token: grant
                .refresh_token
                .unwrap_or_else(|| self.refresh_token.clone()),
            expires_at: now + Duration::seconds(expires_in),
        }
    }
}
