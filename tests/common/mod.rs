#![allow(dead_code)]

use sessiongate::ServerConfig;
use sessiongate::db::{Database, NewUser, PublicId};
use sessiongate::engine::AuthEngine;
use sessiongate::settings::AuthSettings;
use std::path::PathBuf;

pub const ACCESS_SECRET: &[u8] = b"integration-access-secret-0123456789";
pub const REFRESH_SECRET: &[u8] = b"integration-refresh-secret-0123456789";

/// File-backed database that is removed on drop.
///
/// Used where several connections write concurrently.
pub struct TempDatabase {
    pub db: Database,
    path: PathBuf,
}

impl TempDatabase {
    pub async fn new() -> Self {
        let path = std::env::temp_dir().join(format!("sessiongate-{}.db", uuid::Uuid::new_v4()));
        let db = Database::open(path.to_str().expect("temp path is UTF-8"))
            .await
            .expect("Failed to open temp database");
        Self { db, path }
    }
}

impl Drop for TempDatabase {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm", "-journal"] {
            let mut path = self.path.clone().into_os_string();
            path.push(suffix);
            let _ = std::fs::remove_file(path);
        }
    }
}

pub async fn memory_db() -> Database {
    Database::open(":memory:")
        .await
        .expect("Failed to open test database")
}

pub fn engine(db: Database, settings: AuthSettings) -> AuthEngine {
    AuthEngine::new(db, ACCESS_SECRET, REFRESH_SECRET, settings).expect("Failed to build engine")
}

pub async fn create_user(db: &Database, email: &str) -> i64 {
    db.users()
        .create(&NewUser::new(PublicId::Email(email.into()), "unused-hash"))
        .await
        .expect("Failed to create user")
}

/// Insert a user with a fixed id.
pub async fn create_user_with_id(db: &Database, id: i64) {
    sqlx::query("INSERT INTO users (id, email, password_hash) VALUES (?, ?, 'unused-hash')")
        .bind(id)
        .bind(format!("user{}@example.com", id))
        .execute(db.pool())
        .await
        .expect("Failed to insert user");
}

pub fn server_config(db: Database) -> ServerConfig {
    ServerConfig {
        db,
        access_secret: ACCESS_SECRET.to_vec(),
        refresh_secret: REFRESH_SECRET.to_vec(),
        settings: AuthSettings::default(),
        trust_forwarded_for: true,
    }
}
