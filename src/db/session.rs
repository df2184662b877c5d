//! Durable sessions binding a user to the current token pair of each class.
//!
//! A session row holds a (fingerprint, verification hash) pair per token class.
//! Both fields of a pair are always written by the same statement, so no reader
//! can observe a half-updated pair.
//!
//! Sessions are only ever removed through [`SessionStore::destroy`], which
//! blacklists both current pairs in the same transaction as the delete.

use sqlx::sqlite::{SqliteConnection, SqlitePool};
use std::time::Duration;
use tracing::{debug, warn};

use super::blacklist::BlacklistStore;
use crate::jwt::TokenClass;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Session {
    pub id: i64,
    pub user_id: i64,
    pub access_fingerprint: String,
    pub access_hash: String,
    pub refresh_fingerprint: String,
    pub refresh_hash: String,
    /// Bumped by every transaction that claims the row
    pub version: i64,
    pub created_at: String,
    /// Last activity marker, used by the reaper
    pub updated_at: String,
}

impl Session {
    /// Current (fingerprint, hash) pair for a token class.
    pub fn token_pair(&self, class: TokenClass) -> (&str, &str) {
        match class {
            TokenClass::Access => (&self.access_fingerprint, &self.access_hash),
            TokenClass::Refresh => (&self.refresh_fingerprint, &self.refresh_hash),
        }
    }
}

#[derive(Clone)]
pub struct SessionStore {
    pool: SqlitePool,
}

impl SessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create an empty session for a user inside the caller's transaction.
    ///
    /// The caller must attach both token pairs before committing.
    pub async fn create(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
    ) -> Result<Session, sqlx::Error> {
        sqlx::query_as(
            "INSERT INTO sessions (user_id) VALUES (?)
             RETURNING id, user_id, access_fingerprint, access_hash, refresh_fingerprint,
                       refresh_hash, version, created_at, updated_at",
        )
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await
    }

    /// Replace the token pair of one class and mark the session active.
    ///
    /// Returns false if the session does not exist.
    pub async fn attach_token_pair(
        &self,
        conn: &mut SqliteConnection,
        session_id: i64,
        class: TokenClass,
        fingerprint: &str,
        verification_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let query = match class {
            TokenClass::Access => {
                "UPDATE sessions SET access_fingerprint = ?, access_hash = ?, updated_at = datetime('now') WHERE id = ?"
            }
            TokenClass::Refresh => {
                "UPDATE sessions SET refresh_fingerprint = ?, refresh_hash = ?, updated_at = datetime('now') WHERE id = ?"
            }
        };

        let result = sqlx::query(query)
            .bind(fingerprint)
            .bind(verification_hash)
            .bind(session_id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Get a session owned by a user.
    pub async fn find_by_user_and_id(
        &self,
        user_id: i64,
        session_id: i64,
    ) -> Result<Option<Session>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, user_id, access_fingerprint, access_hash, refresh_fingerprint,
                    refresh_hash, version, created_at, updated_at
             FROM sessions WHERE id = ? AND user_id = ?",
        )
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Claim a session for modification and return its current state.
    ///
    /// This is a write, so as the first statement of a transaction it takes the
    /// database write lock. A concurrent claim on the same session waits until
    /// this transaction finishes and then reads the committed result.
    pub async fn claim(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
        session_id: i64,
    ) -> Result<Option<Session>, sqlx::Error> {
        sqlx::query_as(
            "UPDATE sessions SET version = version + 1 WHERE id = ? AND user_id = ?
             RETURNING id, user_id, access_fingerprint, access_hash, refresh_fingerprint,
                       refresh_hash, version, created_at, updated_at",
        )
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await
    }

    /// One page of sessions whose last activity is older than `cutoff`, ordered by id.
    pub async fn list_idle_older_than(
        &self,
        cutoff: &str,
        page_size: u32,
        offset: u64,
    ) -> Result<Vec<Session>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, user_id, access_fingerprint, access_hash, refresh_fingerprint,
                    refresh_hash, version, created_at, updated_at
             FROM sessions WHERE updated_at < ? ORDER BY id LIMIT ? OFFSET ?",
        )
        .bind(cutoff)
        .bind(i64::from(page_size))
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
    }

    /// Destroy a session: blacklist both current token pairs, then delete the row,
    /// all in one transaction.
    ///
    /// Returns false if the session did not exist. On error nothing is committed.
    pub async fn destroy(
        &self,
        user_id: i64,
        session_id: i64,
        blacklist_ttl: Duration,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let Some(session) = self.claim(&mut tx, user_id, session_id).await? else {
            debug!(session_id, "Session already gone");
            return Ok(false);
        };

        Self::revoke_and_delete(&mut tx, &session, blacklist_ttl).await?;
        tx.commit().await?;
        Ok(true)
    }

    /// Like [`destroy`](Self::destroy), but only while the session is still idle
    /// since `cutoff`.
    ///
    /// Returns false if the session is gone or was active again after `cutoff`.
    pub async fn destroy_idle(
        &self,
        user_id: i64,
        session_id: i64,
        cutoff: &str,
        blacklist_ttl: Duration,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let claimed: Option<Session> = sqlx::query_as(
            "UPDATE sessions SET version = version + 1
             WHERE id = ? AND user_id = ? AND updated_at < ?
             RETURNING id, user_id, access_fingerprint, access_hash, refresh_fingerprint,
                       refresh_hash, version, created_at, updated_at",
        )
        .bind(session_id)
        .bind(user_id)
        .bind(cutoff)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(session) = claimed else {
            debug!(session_id, "Session gone or active again");
            return Ok(false);
        };

        Self::revoke_and_delete(&mut tx, &session, blacklist_ttl).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn revoke_and_delete(
        conn: &mut SqliteConnection,
        session: &Session,
        blacklist_ttl: Duration,
    ) -> Result<(), sqlx::Error> {
        for class in [TokenClass::Access, TokenClass::Refresh] {
            let (fingerprint, hash) = session.token_pair(class);
            if fingerprint.is_empty() {
                warn!(session_id = session.id, %class, "Session has no token pair to revoke");
                continue;
            }
            BlacklistStore::revoke(&mut *conn, class, fingerprint, hash, blacklist_ttl).await?;
        }

        sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(session.id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Count sessions owned by a user.
    pub async fn count_by_user(&self, user_id: i64) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sessions WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }
}
