use std::str::FromStr;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use circleup_auth::Authenticator;
use circleup_backend_api::{build_router, AppState};
use circleup_config::AuthConfig;
use circleup_realtime::{InMemoryRoomBus, Room, RoomBus};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use tempfile::TempDir;
use tower::ServiceExt;

type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

struct TestContext {
    _temp_dir: TempDir,
    pool: SqlitePool,
    rooms: Arc<InMemoryRoomBus>,
    state: AppState,
}

impl TestContext {
    async fn new() -> TestResult<Self> {
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("backend_api.sqlite");
        let db_url = format!("sqlite://{}", db_path.display());

        let options = SqliteConnectOptions::from_str(&db_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        MIGRATOR.run(&pool).await?;

        let authenticator = Authenticator::new(pool.clone(), AuthConfig::default());
        let rooms = Arc::new(InMemoryRoomBus::new());
        let state = AppState::new(pool.clone(), authenticator, rooms.clone());

        Ok(Self {
            _temp_dir: temp_dir,
            pool,
            rooms,
            state,
        })
    }

    fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn send(
        &self,
        method: &str,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResult<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.router().oneshot(request).await?;
        let status = response.status();
        let bytes = response.into_body().collect().await?.to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };

        Ok((status, value))
    }

    async fn register_and_login(&self, name: &str) -> TestResult<(String, String)> {
        let (status, body) = self
            .send(
                "POST",
                "/api/v1/users/register",
                None,
                Some(json!({
                    "email": format!("{name}@example.com"),
                    "password": "correct horse",
                    "display_name": name,
                    "city": "Berlin",
                    "interests": ["hiking"],
                })),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED, "register {name}: {body}");
        let public_id = body["user"]["public_id"]
            .as_str()
            .expect("public id")
            .to_string();

        let (status, body) = self
            .send(
                "POST",
                "/api/v1/users/login",
                None,
                Some(json!({
                    "email": format!("{name}@example.com"),
                    "password": "correct horse",
                })),
            )
            .await?;
        assert_eq!(status, StatusCode::OK, "login {name}: {body}");
        let token = body["token"].as_str().expect("token").to_string();

        Ok((token, public_id))
    }

    async fn create_group(
        &self,
        token: &str,
        name: &str,
        privacy: &str,
    ) -> TestResult<String> {
        let (status, body) = self
            .send(
                "POST",
                "/api/v1/groups",
                Some(token),
                Some(json!({
                    "name": name,
                    "privacy": privacy,
                    "tags": ["hiking"],
                })),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED, "create group: {body}");
        Ok(body["group"]["id"].as_str().expect("group id").to_string())
    }
}

#[tokio::test]
async fn healthcheck_is_public() -> TestResult {
    let ctx = TestContext::new().await?;
    let (status, body) = ctx.send("GET", "/api/v1/healthcheck", None, None).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    Ok(())
}

#[tokio::test]
async fn registration_conflicts_and_auth_statuses() -> TestResult {
    let ctx = TestContext::new().await?;
    ctx.register_and_login("alice").await?;

    // Duplicate email registers as a conflict.
    let (status, _) = ctx
        .send(
            "POST",
            "/api/v1/users/register",
            None,
            Some(json!({ "email": "alice@example.com", "password": "long enough" })),
        )
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    // Short password is a validation error.
    let (status, _) = ctx
        .send(
            "POST",
            "/api/v1/users/register",
            None,
            Some(json!({ "email": "bob@example.com", "password": "short" })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Wrong password is unauthenticated.
    let (status, _) = ctx
        .send(
            "POST",
            "/api/v1/users/login",
            None,
            Some(json!({ "email": "alice@example.com", "password": "wrong password" })),
        )
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Protected routes demand a bearer token.
    let (status, _) = ctx.send("GET", "/api/v1/users/me", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = ctx
        .send("GET", "/api/v1/users/me", Some("bogus-token"), None)
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn refresh_cookie_renews_the_access_token() -> TestResult {
    let ctx = TestContext::new().await?;
    ctx.register_and_login("alice").await?;

    // Log in directly to get at the set-cookie header.
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/users/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "email": "alice@example.com", "password": "correct horse" }).to_string(),
        ))?;
    let response = ctx.router().oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("set-cookie header")
        .to_str()?
        .to_string();
    assert!(cookie.starts_with("refresh_token="));
    assert!(cookie.contains("HttpOnly"));
    let cookie_pair = cookie.split(';').next().expect("cookie pair").to_string();

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/users/refresh")
        .header(header::COOKIE, &cookie_pair)
        .body(Body::empty())?;
    let response = ctx.router().oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await?.to_bytes();
    let body: Value = serde_json::from_slice(&bytes)?;
    let new_token = body["token"].as_str().expect("refreshed token");

    let (status, me) = ctx.send("GET", "/api/v1/users/me", Some(new_token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["user"]["email"], "alice@example.com");

    // Refreshing without the cookie is unauthenticated.
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/users/refresh")
        .body(Body::empty())?;
    let response = ctx.router().oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn private_group_join_approval_flow() -> TestResult {
    let ctx = TestContext::new().await?;
    let (alice_token, _) = ctx.register_and_login("alice").await?;
    let (bob_token, bob_pid) = ctx.register_and_login("bob").await?;

    let group_id = ctx.create_group(&alice_token, "Quiet Club", "private").await?;

    // Bob's join only queues a request.
    let (status, body) = ctx
        .send(
            "POST",
            &format!("/api/v1/groups/{group_id}/join"),
            Some(&bob_token),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "join request submitted");

    let (_, body) = ctx
        .send(
            "GET",
            &format!("/api/v1/groups/{group_id}"),
            Some(&alice_token),
            None,
        )
        .await?;
    assert_eq!(body["group"]["members"].as_array().map(Vec::len), Some(1));
    assert_eq!(
        body["group"]["join_requests"][0]["user"]["id"],
        bob_pid.as_str()
    );

    // Bob cannot approve himself.
    let (status, _) = ctx
        .send(
            "POST",
            &format!("/api/v1/groups/{group_id}/approve/{bob_pid}"),
            Some(&bob_token),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Alice approves; Bob is now a member and the queue is empty.
    let (status, body) = ctx
        .send(
            "POST",
            &format!("/api/v1/groups/{group_id}/approve/{bob_pid}"),
            Some(&alice_token),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["member"]["role"], "member");

    let (_, body) = ctx
        .send(
            "GET",
            &format!("/api/v1/groups/{group_id}"),
            Some(&alice_token),
            None,
        )
        .await?;
    assert_eq!(body["group"]["members"].as_array().map(Vec::len), Some(2));
    assert_eq!(
        body["group"]["join_requests"].as_array().map(Vec::len),
        Some(0)
    );

    // Joining again now conflicts.
    let (status, _) = ctx
        .send(
            "POST",
            &format!("/api/v1/groups/{group_id}/join"),
            Some(&bob_token),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    // The audit log stays admin-only.
    let (status, _) = ctx
        .send(
            "GET",
            &format!("/api/v1/groups/{group_id}/audit"),
            Some(&bob_token),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = ctx
        .send(
            "GET",
            &format!("/api/v1/groups/{group_id}/audit"),
            Some(&alice_token),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    let actions: Vec<&str> = body["audit_log"]
        .as_array()
        .expect("audit array")
        .iter()
        .filter_map(|entry| entry["action"].as_str())
        .collect();
    assert_eq!(actions, vec!["request_join", "approve_join"]);

    Ok(())
}

#[tokio::test]
async fn public_groups_admit_on_join() -> TestResult {
    let ctx = TestContext::new().await?;
    let (alice_token, _) = ctx.register_and_login("alice").await?;
    let (bob_token, _) = ctx.register_and_login("bob").await?;

    let group_id = ctx.create_group(&alice_token, "Hikers", "public").await?;

    let (status, body) = ctx
        .send(
            "POST",
            &format!("/api/v1/groups/{group_id}/join"),
            Some(&bob_token),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "joined group");

    Ok(())
}

#[tokio::test]
async fn rank_rules_apply_over_http() -> TestResult {
    let ctx = TestContext::new().await?;
    let (alice_token, alice_pid) = ctx.register_and_login("alice").await?;
    let (bob_token, bob_pid) = ctx.register_and_login("bob").await?;

    let group_id = ctx.create_group(&alice_token, "Hikers", "public").await?;
    ctx.send(
        "POST",
        &format!("/api/v1/groups/{group_id}/join"),
        Some(&bob_token),
        None,
    )
    .await?;

    // Owner promotes Bob to admin.
    let (status, body) = ctx
        .send(
            "POST",
            &format!("/api/v1/groups/{group_id}/promote/{bob_pid}"),
            Some(&alice_token),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["member"]["role"], "admin");

    // The admin cannot kick the owner.
    let (status, body) = ctx
        .send(
            "POST",
            &format!("/api/v1/groups/{group_id}/kick/{alice_pid}"),
            Some(&bob_token),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].as_str().unwrap_or("").contains("kick_member"));

    // The owner kicks the admin.
    let (status, _) = ctx
        .send(
            "POST",
            &format!("/api/v1/groups/{group_id}/kick/{bob_pid}"),
            Some(&alice_token),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::OK);

    // Kicking an ex-member is a 404.
    let (status, _) = ctx
        .send(
            "POST",
            &format!("/api/v1/groups/{group_id}/kick/{bob_pid}"),
            Some(&alice_token),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn invite_codes_round_trip_over_http() -> TestResult {
    let ctx = TestContext::new().await?;
    let (alice_token, _) = ctx.register_and_login("alice").await?;
    let (bob_token, _) = ctx.register_and_login("bob").await?;

    let group_id = ctx.create_group(&alice_token, "Quiet Club", "private").await?;

    // Non-members cannot mint invites.
    let (status, _) = ctx
        .send(
            "POST",
            &format!("/api/v1/groups/{group_id}/invite"),
            Some(&bob_token),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = ctx
        .send(
            "POST",
            &format!("/api/v1/groups/{group_id}/invite"),
            Some(&alice_token),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    let code = body["invite_code"].as_str().expect("invite code");
    assert_eq!(code.len(), 12);

    let (status, body) = ctx
        .send(
            "POST",
            "/api/v1/groups/join/code",
            Some(&bob_token),
            Some(json!({ "code": code })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["group_id"], group_id.as_str());

    let (status, _) = ctx
        .send(
            "POST",
            "/api/v1/groups/join/code",
            Some(&bob_token),
            Some(json!({ "code": "ffffffffffff" })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn private_message_fans_out_to_both_subscribers() -> TestResult {
    let ctx = TestContext::new().await?;
    let (alice_token, _) = ctx.register_and_login("alice").await?;
    let (_bob_token, bob_pid) = ctx.register_and_login("bob").await?;
    let (carol_token, _) = ctx.register_and_login("carol").await?;

    let (status, body) = ctx
        .send(
            "POST",
            &format!("/api/v1/chats/private/{bob_pid}"),
            Some(&alice_token),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    let conversation_id = body["conversation_id"].as_str().expect("id").to_string();

    // Both ends subscribe to the conversation room before the send.
    let room = Room::private(&conversation_id);
    let mut alice_rx = ctx.rooms.subscribe(&room).await;
    let mut bob_rx = ctx.rooms.subscribe(&room).await;

    let (status, body) = ctx
        .send(
            "POST",
            &format!("/api/v1/chats/private/{conversation_id}/message"),
            Some(&alice_token),
            Some(json!({ "content": "first contact" })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    let message_id = body["message"]["id"].as_str().expect("message id");

    for rx in [&mut alice_rx, &mut bob_rx] {
        let event = rx.try_recv().expect("event delivered");
        assert_eq!(event.event, "newPrivateMessage");
        assert_eq!(event.payload["id"], message_id);
        assert_eq!(event.payload["content"], "first contact");
        assert!(rx.try_recv().is_err(), "exactly one event per subscriber");
    }

    // Outsiders cannot write into the conversation.
    let (status, _) = ctx
        .send(
            "POST",
            &format!("/api/v1/chats/private/{conversation_id}/message"),
            Some(&carol_token),
            Some(json!({ "content": "intruding" })),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn group_message_requires_membership_and_fans_out() -> TestResult {
    let ctx = TestContext::new().await?;
    let (alice_token, _) = ctx.register_and_login("alice").await?;
    let (bob_token, _) = ctx.register_and_login("bob").await?;

    let group_id = ctx.create_group(&alice_token, "Hikers", "public").await?;

    let room = Room::group(&group_id);
    let mut rx = ctx.rooms.subscribe(&room).await;

    let (status, _) = ctx
        .send(
            "POST",
            &format!("/api/v1/chats/group/{group_id}/message"),
            Some(&bob_token),
            Some(json!({ "content": "can I come" })),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = ctx
        .send(
            "POST",
            &format!("/api/v1/chats/group/{group_id}/message"),
            Some(&alice_token),
            Some(json!({ "content": "meet at nine" })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"]["group_id"], group_id.as_str());

    let event = rx.try_recv().expect("group event");
    assert_eq!(event.event, "newGroupMessage");
    assert_eq!(event.payload["content"], "meet at nine");

    Ok(())
}

#[tokio::test]
async fn message_history_pages_with_the_before_cursor() -> TestResult {
    let ctx = TestContext::new().await?;
    let (alice_token, _) = ctx.register_and_login("alice").await?;
    let (_bob_token, bob_pid) = ctx.register_and_login("bob").await?;

    let (_, body) = ctx
        .send(
            "POST",
            &format!("/api/v1/chats/private/{bob_pid}"),
            Some(&alice_token),
            None,
        )
        .await?;
    let conversation_id = body["conversation_id"].as_str().expect("id").to_string();

    for i in 0..6 {
        let (status, _) = ctx
            .send(
                "POST",
                &format!("/api/v1/chats/private/{conversation_id}/message"),
                Some(&alice_token),
                Some(json!({ "content": format!("message {i}") })),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = ctx
        .send(
            "GET",
            &format!("/api/v1/chats/private/{conversation_id}/messages?limit=4"),
            Some(&alice_token),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    let first_page = body["messages"].as_array().expect("messages").clone();
    assert_eq!(first_page.len(), 4);
    assert_eq!(first_page[0]["content"], "message 5");

    let oldest = first_page[3]["created_at"].as_str().expect("cursor");
    let encoded = oldest.replace('+', "%2B");
    let (status, body) = ctx
        .send(
            "GET",
            &format!(
                "/api/v1/chats/private/{conversation_id}/messages?limit=4&before={encoded}"
            ),
            Some(&alice_token),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    let second_page = body["messages"].as_array().expect("messages");
    assert_eq!(second_page.len(), 2);
    assert_eq!(second_page[0]["content"], "message 1");
    assert_eq!(second_page[1]["content"], "message 0");

    let (status, _) = ctx
        .send(
            "GET",
            &format!("/api/v1/chats/private/{conversation_id}/messages?before=not-a-date"),
            Some(&alice_token),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn discovery_routes_respond_for_authenticated_users() -> TestResult {
    let ctx = TestContext::new().await?;
    let (alice_token, _) = ctx.register_and_login("alice").await?;
    let (bob_token, _) = ctx.register_and_login("bob").await?;

    ctx.create_group(&bob_token, "Trail Runners", "public").await?;

    let (status, body) = ctx
        .send(
            "GET",
            "/api/v1/recommendations/groups",
            Some(&alice_token),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["groups"][0]["name"], "Trail Runners");

    let (status, body) = ctx
        .send(
            "GET",
            "/api/v1/recommendations/users",
            Some(&alice_token),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["users"][0]["display_name"], "bob");

    let (status, body) = ctx
        .send(
            "GET",
            "/api/v1/search/groups?q=trail",
            Some(&alice_token),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["total"], 1);

    let (status, _) = ctx.send("GET", "/api/v1/search/groups", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn missing_entities_are_not_found() -> TestResult {
    let ctx = TestContext::new().await?;
    let (token, _) = ctx.register_and_login("alice").await?;

    let (status, _) = ctx
        .send("GET", "/api/v1/groups/no-such-group", Some(&token), None)
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = ctx
        .send(
            "GET",
            "/api/v1/chats/private/no-such-conversation/messages",
            Some(&token),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = ctx
        .send(
            "POST",
            "/api/v1/chats/private/no-such-user",
            Some(&token),
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let _ = ctx.pool();
    Ok(())
}
