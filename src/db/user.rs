use sqlx::sqlite::SqlitePool;
use validator::ValidateEmail;

use crate::password::{self, PasswordError};

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

/// Public identifier a user signs in with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicId {
    Email(String),
    Phone(String),
}

impl PublicId {
    /// Classify a raw identifier as an email address or a phone number.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.validate_email() {
            return Some(PublicId::Email(raw.to_string()));
        }

        // Phone numbers must carry their country code. Stored in E.164 form.
        let number = phonenumber::parse(None, raw).ok()?;
        if !phonenumber::is_valid(&number) {
            return None;
        }
        Some(PublicId::Phone(
            number.format().mode(phonenumber::Mode::E164).to_string(),
        ))
    }

    pub fn as_str(&self) -> &str {
        match self {
            PublicId::Email(s) | PublicId::Phone(s) => s,
        }
    }
}

/// A user about to be inserted. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub public_id: PublicId,
    pub password_hash: String,
}

impl NewUser {
    pub fn new(public_id: PublicId, password_hash: impl Into<String>) -> Self {
        Self {
            public_id,
            password_hash: password_hash.into(),
        }
    }

    /// Hash a plaintext password and build the insert record.
    pub fn with_password(public_id: PublicId, password: &str) -> Result<Self, PasswordError> {
        Ok(Self::new(public_id, password::hash_password(password)?))
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password_hash: String,
    pub created_at: String,
}

impl User {
    /// Identifier shown back to the user: phone if set, otherwise email.
    pub fn public_id(&self) -> &str {
        self.phone
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or_default()
    }

    /// Check a plaintext password against the stored hash.
    pub fn verify_password(&self, password: &str) -> Result<bool, PasswordError> {
        password::verify_password(password, &self.password_hash)
    }
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a user. Returns the user ID.
    pub async fn create(&self, user: &NewUser) -> Result<i64, sqlx::Error> {
        let (email, phone) = match &user.public_id {
            PublicId::Email(email) => (Some(email.as_str()), None),
            PublicId::Phone(phone) => (None, Some(phone.as_str())),
        };

        let result =
            sqlx::query("INSERT INTO users (email, phone, password_hash) VALUES (?, ?, ?)")
                .bind(email)
                .bind(phone)
                .bind(&user.password_hash)
                .execute(&self.pool)
                .await?;
        Ok(result.last_insert_rowid())
    }

    /// Get a user by email or phone.
    pub async fn get_by_public_id(&self, id: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, email, phone, password_hash, created_at FROM users WHERE email = ? OR phone = ?",
        )
        .bind(id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Get a user by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as("SELECT id, email, phone, password_hash, created_at FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }
}
