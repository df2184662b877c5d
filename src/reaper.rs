//! Scheduled retirement of idle sessions.

use futures::future::join_all;
use tracing::{debug, error, info, warn};

use crate::db::{Database, datetime_before};
use crate::settings::AuthSettings;

/// What one sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Page queries issued, including the final empty one
    pub fetches: u32,
    pub non_empty_pages: u32,
    pub destroyed: u64,
    pub failed: u64,
}

/// Destroy every session idle for longer than the configured threshold.
///
/// The cutoff is fixed when the sweep starts. Pages are read ordered by id;
/// destroyed rows drop out of the result set, so the offset only moves past rows
/// that failed to be destroyed.
pub async fn run_sweep(db: &Database, settings: &AuthSettings) -> Result<SweepReport, sqlx::Error> {
    let sessions = db.sessions();
    let cutoff = datetime_before(settings.idle_threshold);
    let mut report = SweepReport::default();
    let mut offset: u64 = 0;

    info!(cutoff = %cutoff, "Session sweep started");

    loop {
        let page = sessions
            .list_idle_older_than(&cutoff, settings.reaper_page_size, offset)
            .await?;
        report.fetches += 1;
        if page.is_empty() {
            break;
        }
        report.non_empty_pages += 1;

        let results = join_all(page.iter().map(|session| {
            sessions.destroy_idle(session.user_id, session.id, &cutoff, settings.blacklist_ttl)
        }))
        .await;

        for (session, result) in page.iter().zip(results) {
            match result {
                Ok(true) => report.destroyed += 1,
                // Logged out or active again since the page read
                Ok(false) => debug!(session_id = session.id, "Session skipped"),
                Err(e) => {
                    warn!(
                        session_id = session.id,
                        operation = "reap",
                        error = %e,
                        "Failed to destroy idle session"
                    );
                    report.failed += 1;
                    offset += 1;
                }
            }
        }
    }

    info!(
        destroyed = report.destroyed,
        failed = report.failed,
        pages = report.non_empty_pages,
        "Session sweep finished"
    );
    Ok(report)
}

/// Spawn a background task that sweeps once per interval, starting one interval
/// from now. Returns a handle that can be used to abort the task.
pub fn spawn_reaper_scheduler(db: Database, settings: AuthSettings) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let period = settings.reaper_interval;
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

        loop {
            interval.tick().await;
            if let Err(e) = run_sweep(&db, &settings).await {
                error!(error = %e, "Session sweep aborted");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{NewUser, PublicId};
    use crate::jwt::TokenClass;
    use std::time::Duration;

    async fn idle_sessions(db: &Database, count: usize) -> (i64, Vec<i64>) {
        let user_id = db
            .users()
            .create(&NewUser::new(PublicId::Email("idle@example.com".into()), "hash"))
            .await
            .unwrap();

        let mut ids = Vec::new();
        for i in 0..count {
            let mut tx = db.begin().await.unwrap();
            let session = db.sessions().create(&mut tx, user_id).await.unwrap();
            db.sessions()
                .attach_token_pair(&mut tx, session.id, TokenClass::Access, &format!("afp{i}"), "h")
                .await
                .unwrap();
            tx.commit().await.unwrap();
            ids.push(session.id);
        }

        sqlx::query("UPDATE sessions SET updated_at = ?")
            .bind(datetime_before(Duration::from_secs(48 * 3600)))
            .execute(db.pool())
            .await
            .unwrap();
        (user_id, ids)
    }

    #[tokio::test]
    async fn test_sweep_with_nothing_idle() {
        let db = Database::open(":memory:").await.unwrap();
        let report = run_sweep(&db, &AuthSettings::default()).await.unwrap();

        assert_eq!(
            report,
            SweepReport {
                fetches: 1,
                ..SweepReport::default()
            }
        );
    }

    #[tokio::test]
    async fn test_sweep_pages_until_empty() {
        let db = Database::open(":memory:").await.unwrap();
        let (user_id, _) = idle_sessions(&db, 3).await;
        let settings = AuthSettings {
            reaper_page_size: 1,
            ..AuthSettings::default()
        };

        let report = run_sweep(&db, &settings).await.unwrap();

        assert_eq!(report.fetches, 4);
        assert_eq!(report.non_empty_pages, 3);
        assert_eq!(report.destroyed, 3);
        assert_eq!(db.sessions().count_by_user(user_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failing_session_is_skipped_not_retried() {
        let db = Database::open(":memory:").await.unwrap();
        let (user_id, ids) = idle_sessions(&db, 3).await;

        for sql in [
            "CREATE TABLE pinned (id INTEGER PRIMARY KEY)",
            "CREATE TRIGGER pin_session BEFORE DELETE ON sessions
             WHEN old.id IN (SELECT id FROM pinned)
             BEGIN SELECT RAISE(ABORT, 'pinned'); END",
        ] {
            sqlx::query(sql).execute(db.pool()).await.unwrap();
        }
        sqlx::query("INSERT INTO pinned (id) VALUES (?)")
            .bind(ids[0])
            .execute(db.pool())
            .await
            .unwrap();

        let settings = AuthSettings {
            reaper_page_size: 1,
            ..AuthSettings::default()
        };
        let report = run_sweep(&db, &settings).await.unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.destroyed, 2);
        assert_eq!(db.sessions().count_by_user(user_id).await.unwrap(), 1);
    }
}
