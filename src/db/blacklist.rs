//! Revocation cache keyed by token fingerprint.
//!
//! Behaves like a key/value cache with per-key TTL: `set_ex` and `get` are the
//! only primitives. Expired keys read as absent; they are overwritten or swept
//! lazily on the next write, so there is no cleanup operation to schedule.
//!
//! An entry stays readable through the second it expires in, the same way a
//! JWT still verifies in its `exp` second. A token revoked at or after issuance
//! with a TTL of at least its lifetime is therefore blacklisted for every second
//! in which its signature check would pass.
//!
//! Keys are namespaced per token class (`blacklist:access:...`,
//! `blacklist:refresh:...`). Values are salted hashes of the exact revoked
//! token: a fingerprint hit alone never counts as revoked.
//!
//! Writes take a connection rather than the pool so they can join the caller's
//! transaction. Rotation and session destruction rely on that to commit the
//! revocation together with the session update.

use sqlx::sqlite::{SqliteConnection, SqlitePool};
use std::time::Duration;

use super::time::{datetime_after, datetime_now};
use crate::digest;
use crate::jwt::TokenClass;

#[derive(Clone)]
pub struct BlacklistStore {
    pool: SqlitePool,
}

/// Cache key for a fingerprint in a class namespace.
pub fn blacklist_key(class: TokenClass, fingerprint: &str) -> String {
    format!("blacklist:{}:{}", class, fingerprint)
}

impl BlacklistStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// `SET key value EX ttl`.
    pub async fn set_ex(
        conn: &mut SqliteConnection,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), sqlx::Error> {
        let now = datetime_now();
        sqlx::query("DELETE FROM blacklist WHERE expires_at < ?")
            .bind(&now)
            .execute(&mut *conn)
            .await?;

        sqlx::query(
            "INSERT INTO blacklist (key, value, expires_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
        )
        .bind(key)
        .bind(value)
        .bind(datetime_after(ttl))
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// `GET key`. Expired keys read as absent.
    pub async fn get(&self, key: &str) -> Result<Option<String>, sqlx::Error> {
        self.get_at(key, &datetime_now()).await
    }

    async fn get_at(&self, key: &str, now: &str) -> Result<Option<String>, sqlx::Error> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM blacklist WHERE key = ? AND expires_at >= ?")
                .bind(key)
                .bind(now)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|r| r.0))
    }

    /// Revoke a token by its fingerprint and verification hash.
    ///
    /// `ttl` must be at least the longest token lifetime, otherwise a revoked
    /// token could outlive its entry (enforced by `AuthSettings::validate`).
    pub async fn revoke(
        conn: &mut SqliteConnection,
        class: TokenClass,
        fingerprint: &str,
        verification_hash: &str,
        ttl: Duration,
    ) -> Result<(), sqlx::Error> {
        Self::set_ex(conn, &blacklist_key(class, fingerprint), verification_hash, ttl).await
    }

    /// Whether this exact token has been revoked.
    ///
    /// Missing fingerprint means not revoked. A present fingerprint only counts
    /// if the stored hash matches the candidate token.
    pub async fn is_revoked(
        &self,
        class: TokenClass,
        fingerprint: &str,
        raw_token: &str,
    ) -> Result<bool, sqlx::Error> {
        match self.get(&blacklist_key(class, fingerprint)).await? {
            Some(hash) => Ok(digest::verify_token(raw_token, &hash)),
            None => Ok(false),
        }
    }
}
