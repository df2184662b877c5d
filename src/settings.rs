//! Tunables for the authentication engine.
//!
//! Collected once at startup and passed explicitly to every component that
//! needs them. Nothing here is global.

use std::time::Duration;

use crate::error::AuthError;
use crate::jwt::{ACCESS_TOKEN_DURATION, REFRESH_TOKEN_DURATION};

/// Default blacklist entry lifetime: 12 hours
pub const BLACKLIST_TTL: Duration = Duration::from_secs(12 * 60 * 60);

/// Sessions idle longer than this are reaped: 12 hours
pub const SESSION_IDLE_THRESHOLD: Duration = Duration::from_secs(12 * 60 * 60);

/// Interval between reaper sweeps: 1 hour
pub const REAPER_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Sessions fetched per reaper page.
pub const REAPER_PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    /// How long a revoked token stays on the blacklist
    pub blacklist_ttl: Duration,
    pub idle_threshold: Duration,
    pub reaper_interval: Duration,
    pub reaper_page_size: u32,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            access_ttl: ACCESS_TOKEN_DURATION,
            refresh_ttl: REFRESH_TOKEN_DURATION,
            blacklist_ttl: BLACKLIST_TTL,
            idle_threshold: SESSION_IDLE_THRESHOLD,
            reaper_interval: REAPER_INTERVAL,
            reaper_page_size: REAPER_PAGE_SIZE,
        }
    }
}

impl AuthSettings {
    /// Reject combinations under which a revoked token could verify again.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.access_ttl.is_zero() || self.refresh_ttl.is_zero() {
            return Err(AuthError::configuration("token lifetimes must be non-zero"));
        }

        let longest = self.access_ttl.max(self.refresh_ttl);
        if self.blacklist_ttl < longest {
            return Err(AuthError::configuration(format!(
                "blacklist TTL ({}s) is shorter than the longest token lifetime ({}s)",
                self.blacklist_ttl.as_secs(),
                longest.as_secs()
            )));
        }

        if self.reaper_page_size == 0 {
            return Err(AuthError::configuration("reaper page size must be non-zero"));
        }
        if self.reaper_interval.is_zero() {
            return Err(AuthError::configuration("reaper interval must be non-zero"));
        }

        Ok(())
    }
}
