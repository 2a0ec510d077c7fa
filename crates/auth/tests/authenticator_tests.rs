use std::str::FromStr;

use chrono::Utc;
use circleup_auth::{AuthError, Authenticator, NewProfile, ProfileUpdate};
use circleup_config::AuthConfig;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Row, SqlitePool,
};
use tempfile::TempDir;

type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

struct TestContext {
    pool: SqlitePool,
    authenticator: Authenticator,
    _temp_dir: TempDir,
}

impl TestContext {
    async fn new(config: AuthConfig) -> TestResult<Self> {
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("auth.sqlite");
        let db_url = format!("sqlite://{}", db_path.display());

        let options = SqliteConnectOptions::from_str(&db_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        MIGRATOR.run(&pool).await?;

        let authenticator = Authenticator::new(pool.clone(), config);

        Ok(Self {
            pool,
            authenticator,
            _temp_dir: temp_dir,
        })
    }

    async fn new_default() -> TestResult<Self> {
        Self::new(AuthConfig::default()).await
    }

    fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }
}

fn profile(display_name: &str) -> NewProfile {
    NewProfile {
        display_name: Some(display_name.to_string()),
        city: Some("Berlin".to_string()),
        interests: vec!["hiking".to_string(), "chess".to_string()],
    }
}

#[tokio::test]
async fn register_persists_user_and_password_identity() -> TestResult {
    let ctx = TestContext::new_default().await?;

    let user = ctx
        .authenticator()
        .register_with_password("alice@example.com", "s3cret", profile("Alice"))
        .await?;

    assert_eq!(user.email, "alice@example.com");
    assert_eq!(user.interests, vec!["hiking", "chess"]);

    let identity =
        sqlx::query("SELECT provider, provider_uid FROM user_identities WHERE user_id = ?")
            .bind(user.id)
            .fetch_one(ctx.pool())
            .await?;
    assert_eq!(identity.try_get::<String, _>("provider")?, "password");
    assert_eq!(
        identity.try_get::<String, _>("provider_uid")?,
        "alice@example.com"
    );

    Ok(())
}

#[tokio::test]
async fn register_rejects_duplicate_email() -> TestResult {
    let ctx = TestContext::new_default().await?;

    ctx.authenticator()
        .register_with_password("alice@example.com", "s3cret", profile("Alice"))
        .await?;

    let err = ctx
        .authenticator()
        .register_with_password("alice@example.com", "other", profile("Imposter"))
        .await
        .expect_err("duplicate registration should fail");
    assert!(matches!(err, AuthError::UserExists));

    Ok(())
}

#[tokio::test]
async fn login_issues_access_and_refresh_tokens() -> TestResult {
    let ctx = TestContext::new_default().await?;

    ctx.authenticator()
        .register_with_password("alice@example.com", "s3cret", profile("Alice"))
        .await?;

    let session = ctx
        .authenticator()
        .login_with_password("alice@example.com", "s3cret")
        .await?;

    assert_ne!(session.token, session.refresh_token);
    assert!(session.expires_at > Utc::now());
    assert!(session.refresh_expires_at > session.expires_at);

    let (user, authed) = ctx.authenticator().authenticate_token(&session.token).await?;
    assert_eq!(user.email, "alice@example.com");
    assert_eq!(authed.user_id, session.user_id);

    Ok(())
}

#[tokio::test]
async fn login_rejects_wrong_password() -> TestResult {
    let ctx = TestContext::new_default().await?;

    ctx.authenticator()
        .register_with_password("alice@example.com", "s3cret", profile("Alice"))
        .await?;

    let err = ctx
        .authenticator()
        .login_with_password("alice@example.com", "wrong")
        .await
        .expect_err("wrong password should fail");
    assert!(matches!(err, AuthError::InvalidCredentials));

    Ok(())
}

#[tokio::test]
async fn authenticate_rejects_expired_access_token() -> TestResult {
    let config = AuthConfig {
        access_ttl_seconds: 0,
        ..AuthConfig::default()
    };
    let ctx = TestContext::new(config).await?;

    ctx.authenticator()
        .register_with_password("alice@example.com", "s3cret", profile("Alice"))
        .await?;
    let session = ctx
        .authenticator()
        .login_with_password("alice@example.com", "s3cret")
        .await?;

    let err = ctx
        .authenticator()
        .authenticate_token(&session.token)
        .await
        .expect_err("expired token should fail");
    assert!(matches!(err, AuthError::SessionExpired));

    Ok(())
}

#[tokio::test]
async fn refresh_rotates_the_access_token() -> TestResult {
    let ctx = TestContext::new_default().await?;

    ctx.authenticator()
        .register_with_password("alice@example.com", "s3cret", profile("Alice"))
        .await?;
    let session = ctx
        .authenticator()
        .login_with_password("alice@example.com", "s3cret")
        .await?;

    let refreshed = ctx
        .authenticator()
        .refresh_session(&session.refresh_token)
        .await?;

    assert_ne!(refreshed.token, session.token);
    assert_eq!(refreshed.refresh_token, session.refresh_token);

    // The old access token no longer resolves to a session.
    let err = ctx
        .authenticator()
        .authenticate_token(&session.token)
        .await
        .expect_err("replaced token should be gone");
    assert!(matches!(err, AuthError::SessionNotFound));

    ctx.authenticator().authenticate_token(&refreshed.token).await?;

    Ok(())
}

#[tokio::test]
async fn logout_invalidates_the_refresh_token() -> TestResult {
    let ctx = TestContext::new_default().await?;

    ctx.authenticator()
        .register_with_password("alice@example.com", "s3cret", profile("Alice"))
        .await?;
    let session = ctx
        .authenticator()
        .login_with_password("alice@example.com", "s3cret")
        .await?;

    ctx.authenticator().logout(&session.refresh_token).await?;

    let err = ctx
        .authenticator()
        .refresh_session(&session.refresh_token)
        .await
        .expect_err("refresh after logout should fail");
    assert!(matches!(err, AuthError::SessionNotFound));

    Ok(())
}

#[tokio::test]
async fn update_profile_touches_only_allowed_fields() -> TestResult {
    let ctx = TestContext::new_default().await?;

    let user = ctx
        .authenticator()
        .register_with_password("alice@example.com", "s3cret", profile("Alice"))
        .await?;

    let updated = ctx
        .authenticator()
        .update_profile(
            user.id,
            ProfileUpdate {
                city: Some("Munich".to_string()),
                interests: Some(vec!["climbing".to_string()]),
                lat: Some(48.137),
                lng: Some(11.575),
                ..ProfileUpdate::default()
            },
        )
        .await?;

    assert_eq!(updated.email, "alice@example.com");
    assert_eq!(updated.display_name.as_deref(), Some("Alice"));
    assert_eq!(updated.city.as_deref(), Some("Munich"));
    assert_eq!(updated.interests, vec!["climbing"]);
    assert_eq!(updated.lat, Some(48.137));

    Ok(())
}
