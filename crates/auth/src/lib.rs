use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use circleup_config::AuthConfig;
use cuid2::CuidConstructor;
use once_cell::sync::Lazy;
use rand::RngCore;
use serde::Serialize;
use sqlx::{Row, SqlitePool, Transaction};
use thiserror::Error;
use tracing::info;

static CUID: Lazy<CuidConstructor> = Lazy::new(CuidConstructor::new);

/// Issues and validates bearer sessions backed by the shared database.
///
/// Access tokens are short-lived; clients renew them silently with the
/// long-lived refresh token. Both are opaque random strings.
#[derive(Clone)]
pub struct Authenticator {
    pool: SqlitePool,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("user already exists")]
    UserExists,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("password hashing failed: {0}")]
    PasswordHash(#[from] argon2::password_hash::Error),
    #[error("session not found")]
    SessionNotFound,
    #[error("session expired")]
    SessionExpired,
    #[error("invalid session token")]
    InvalidSession,
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    #[serde(skip_serializing)]
    pub id: i64,
    pub public_id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub city: Option<String>,
    pub interests: Vec<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub refresh_token: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

/// Profile fields accepted at registration time.
#[derive(Debug, Clone, Default)]
pub struct NewProfile {
    pub display_name: Option<String>,
    pub city: Option<String>,
    pub interests: Vec<String>,
}

/// Mutable profile fields. Everything else (email, public id) is fixed after
/// registration.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub city: Option<String>,
    pub interests: Option<Vec<String>>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

impl Authenticator {
    pub fn new(pool: SqlitePool, config: AuthConfig) -> Self {
        Self {
            pool,
            access_ttl: Duration::seconds(config.access_ttl_seconds as i64),
            refresh_ttl: Duration::seconds(config.refresh_ttl_seconds as i64),
        }
    }

    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    pub async fn register_with_password(
        &self,
        email: &str,
        password: &str,
        profile: NewProfile,
    ) -> Result<User, AuthError> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query("SELECT id FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&mut *tx)
            .await?;

        if existing.is_some() {
            return Err(AuthError::UserExists);
        }

        let password_hash = self.hash_password(password)?;
        let user = self.insert_user(&mut tx, email, profile).await?;

        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO user_identities (user_id, provider, provider_uid, secret, created_at) VALUES (?, 'password', ?, ?, ?)",
        )
        .bind(user.id)
        .bind(email)
        .bind(password_hash)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(user = %user.public_id, "registered user");
        Ok(user)
    }

    pub async fn login_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, AuthError> {
        let identity = sqlx::query(
            "SELECT user_id, secret FROM user_identities WHERE provider = 'password' AND provider_uid = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = identity else {
            return Err(AuthError::InvalidCredentials);
        };

        let secret: String = row.try_get("secret")?;
        let stored_hash = PasswordHash::new(&secret)?;
        Argon2::default()
            .verify_password(password.as_bytes(), &stored_hash)
            .map_err(|_| AuthError::InvalidCredentials)?;

        let user_id: i64 = row.try_get("user_id")?;
        self.issue_session(user_id).await
    }

    /// Validate an access token from the Authorization header.
    pub async fn authenticate_token(&self, token: &str) -> Result<(User, AuthSession), AuthError> {
        let row = sqlx::query(
            "SELECT user_id, refresh_token, expires_at, refresh_expires_at FROM sessions WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Err(AuthError::SessionNotFound);
        };

        let user_id: i64 = row.try_get("user_id")?;
        let expires_at = parse_instant(&row.try_get::<String, _>("expires_at")?)?;
        let refresh_expires_at = parse_instant(&row.try_get::<String, _>("refresh_expires_at")?)?;

        if expires_at <= Utc::now() {
            return Err(AuthError::SessionExpired);
        }

        let user = self.fetch_user(user_id).await?;
        let session = AuthSession {
            token: token.to_owned(),
            refresh_token: row.try_get("refresh_token")?,
            user_id,
            expires_at,
            refresh_expires_at,
        };

        Ok((user, session))
    }

    /// Exchange a refresh token for a new access token. The refresh token
    /// itself stays valid until its own expiry.
    pub async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession, AuthError> {
        let row = sqlx::query(
            "SELECT id, user_id, refresh_expires_at FROM sessions WHERE refresh_token = ?",
        )
        .bind(refresh_token)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Err(AuthError::SessionNotFound);
        };

        let session_id: i64 = row.try_get("id")?;
        let user_id: i64 = row.try_get("user_id")?;
        let refresh_expires_at =
            parse_instant(&row.try_get::<String, _>("refresh_expires_at")?)?;

        if refresh_expires_at <= Utc::now() {
            sqlx::query("DELETE FROM sessions WHERE id = ?")
                .bind(session_id)
                .execute(&self.pool)
                .await?;
            return Err(AuthError::SessionExpired);
        }

        let token = generate_token();
        let expires_at = Utc::now() + self.access_ttl;

        sqlx::query("UPDATE sessions SET token = ?, expires_at = ? WHERE id = ?")
            .bind(&token)
            .bind(expires_at.to_rfc3339())
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        Ok(AuthSession {
            token,
            refresh_token: refresh_token.to_owned(),
            user_id,
            expires_at,
            refresh_expires_at,
        })
    }

    /// Drop the session identified by its refresh token.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        sqlx::query("DELETE FROM sessions WHERE refresh_token = ?")
            .bind(refresh_token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn user_profile(&self, user_id: i64) -> Result<User, AuthError> {
        self.fetch_user(user_id).await
    }

    pub async fn update_profile(
        &self,
        user_id: i64,
        update: ProfileUpdate,
    ) -> Result<User, AuthError> {
        let mut user = self.fetch_user(user_id).await?;

        if let Some(display_name) = update.display_name {
            user.display_name = Some(display_name);
        }
        if let Some(city) = update.city {
            user.city = Some(city);
        }
        if let Some(interests) = update.interests {
            user.interests = interests;
        }
        if let Some(lat) = update.lat {
            user.lat = Some(lat);
        }
        if let Some(lng) = update.lng {
            user.lng = Some(lng);
        }

        let interests_json =
            serde_json::to_string(&user.interests).unwrap_or_else(|_| "[]".to_string());

        sqlx::query(
            "UPDATE users SET display_name = ?, city = ?, interests = ?, lat = ?, lng = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&user.display_name)
        .bind(&user.city)
        .bind(&interests_json)
        .bind(user.lat)
        .bind(user.lng)
        .bind(Utc::now().to_rfc3339())
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(user)
    }

    async fn insert_user(
        &self,
        tx: &mut Transaction<'_, sqlx::Sqlite>,
        email: &str,
        profile: NewProfile,
    ) -> Result<User, AuthError> {
        let now = Utc::now().to_rfc3339();
        let public_id = CUID.create_id();
        let interests_json =
            serde_json::to_string(&profile.interests).unwrap_or_else(|_| "[]".to_string());

        let id = sqlx::query(
            "INSERT INTO users (public_id, email, display_name, city, interests, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&public_id)
        .bind(email)
        .bind(&profile.display_name)
        .bind(&profile.city)
        .bind(&interests_json)
        .bind(&now)
        .bind(&now)
        .execute(&mut **tx)
        .await?
        .last_insert_rowid();

        Ok(User {
            id,
            public_id,
            email: email.to_owned(),
            display_name: profile.display_name,
            city: profile.city,
            interests: profile.interests,
            lat: None,
            lng: None,
        })
    }

    async fn fetch_user(&self, id: i64) -> Result<User, AuthError> {
        let row = sqlx::query(
            "SELECT public_id, email, display_name, city, interests, lat, lng FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        let interests_json: String = row.try_get("interests")?;
        let interests = serde_json::from_str(&interests_json).unwrap_or_default();

        Ok(User {
            id,
            public_id: row.try_get("public_id")?,
            email: row.try_get("email")?,
            display_name: row.try_get("display_name")?,
            city: row.try_get("city")?,
            interests,
            lat: row.try_get("lat")?,
            lng: row.try_get("lng")?,
        })
    }

    async fn issue_session(&self, user_id: i64) -> Result<AuthSession, AuthError> {
        let token = generate_token();
        let refresh_token = generate_token();
        let now = Utc::now();
        let expires_at = now + self.access_ttl;
        let refresh_expires_at = now + self.refresh_ttl;

        sqlx::query(
            "INSERT INTO sessions (user_id, token, refresh_token, expires_at, refresh_expires_at, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(&token)
        .bind(&refresh_token)
        .bind(expires_at.to_rfc3339())
        .bind(refresh_expires_at.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(AuthSession {
            token,
            refresh_token,
            user_id,
            expires_at,
            refresh_expires_at,
        })
    }

    fn hash_password(&self, password: &str) -> Result<String, argon2::password_hash::Error> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
        Ok(hash.to_string())
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn parse_instant(value: &str) -> Result<DateTime<Utc>, AuthError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| AuthError::InvalidSession)
}
