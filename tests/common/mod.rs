#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use warden::app::lifecycle::ProposalStore;
use warden::app::locks::UserLocks;
use warden::infra::{db::Db, gateway::GatewaySink};
use warden::AppState;

pub const TEST_GATEWAY_TOKEN: &str = "test-gateway-token-12345";
pub const COMMUNITY: &str = "guild-100";
pub const MOD_ID: &str = "mod-1";
pub const MEMBER_ID: &str = "member-1";

/// Headers describing a moderator with manage-community permission.
pub fn mod_headers() -> Vec<(&'static str, &'static str)> {
    vec![
        ("x-gateway-token", TEST_GATEWAY_TOKEN),
        ("x-actor-id", MOD_ID),
        ("x-actor-can-manage", "true"),
    ]
}

/// Headers describing a plain member with no staff standing.
pub fn member_headers() -> Vec<(&'static str, &'static str)> {
    vec![
        ("x-gateway-token", TEST_GATEWAY_TOKEN),
        ("x-actor-id", MEMBER_ID),
    ]
}

pub struct TestApp {
    router: Router,
    pub state: AppState,
}

pub struct TestResponse {
    pub status: StatusCode,
    body_bytes: bytes::Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body_bytes).unwrap_or(Value::Null)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body_bytes).into_owned()
    }

    pub fn error_message(&self) -> String {
        self.json()["error"].as_str().unwrap_or("").to_string()
    }
}

impl TestApp {
    /// Fresh app backed by an isolated in-memory store. One per test.
    pub async fn spawn() -> Self {
        let db = Db::open_in_memory().await.expect("in-memory db failed");
        let gateway = GatewaySink::new(None).expect("gateway sink failed");

        let state = AppState {
            db,
            gateway,
            locks: UserLocks::new(),
            proposals: ProposalStore::new(),
            gateway_token: Some(TEST_GATEWAY_TOKEN.to_owned()),
            confirm_ttl_seconds: 30,
            appeal_cooldown_days: 7,
            page_size: 10,
        };

        let router = warden::http::router(state.clone());
        TestApp { router, state }
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("host", "localhost");

        for &(key, value) in headers {
            builder = builder.header(key, value);
        }

        let request = if let Some(body) = body {
            builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap()
        } else {
            builder.body(Body::empty()).unwrap()
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot failed");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("failed to collect body")
            .to_bytes();

        TestResponse { status, body_bytes }
    }

    pub async fn get(&self, path: &str, headers: &[(&str, &str)]) -> TestResponse {
        self.request(Method::GET, path, None, headers).await
    }

    pub async fn post_json(
        &self,
        path: &str,
        body: Value,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        self.request(Method::POST, path, Some(body), headers).await
    }

    pub async fn patch_json(
        &self,
        path: &str,
        body: Value,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        self.request(Method::PATCH, path, Some(body), headers).await
    }

    pub async fn put_json(
        &self,
        path: &str,
        body: Value,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        self.request(Method::PUT, path, Some(body), headers).await
    }

    pub async fn delete_json(
        &self,
        path: &str,
        body: Value,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        self.request(Method::DELETE, path, Some(body), headers)
            .await
    }

    pub async fn delete(&self, path: &str, headers: &[(&str, &str)]) -> TestResponse {
        self.request(Method::DELETE, path, None, headers).await
    }

    // ------------------------------------------------------------------
    // Test data helpers
    // ------------------------------------------------------------------

    /// Run the full propose + confirm flow for a user. Returns the entry.
    pub async fn blacklist_user(&self, user_id: &str, category: &str) -> Value {
        self.blacklist_user_with(user_id, category, "test reason", None)
            .await
    }

    pub async fn blacklist_user_with(
        &self,
        user_id: &str,
        category: &str,
        reason: &str,
        duration: Option<&str>,
    ) -> Value {
        let mut body = json!({
            "user_id": user_id,
            "reason": reason,
            "category": category,
        });
        if let Some(duration) = duration {
            body["duration"] = json!(duration);
        }

        let proposed = self
            .post_json(
                &format!("/communities/{COMMUNITY}/blacklists/propose"),
                body,
                &mod_headers(),
            )
            .await;
        assert_eq!(proposed.status, StatusCode::OK, "{}", proposed.text());
        let token = proposed.json()["token"].as_str().unwrap().to_owned();

        let confirmed = self
            .post_json(
                &format!("/communities/{COMMUNITY}/blacklists/confirm/{token}"),
                json!({ "roles": ["role-a", "role-b"], "nickname": "Old Nick" }),
                &mod_headers(),
            )
            .await;
        assert_eq!(confirmed.status, StatusCode::OK, "{}", confirmed.text());
        confirmed.json()
    }

    /// Force an entry's expiry into the past so a sweep will pick it up.
    pub async fn force_expire(&self, user_id: &str) {
        let past = time::OffsetDateTime::now_utc() - time::Duration::hours(1);
        sqlx::query(
            "UPDATE blacklists SET expires_at = ? \
             WHERE community_id = ? AND user_id = ?",
        )
        .bind(past)
        .bind(COMMUNITY)
        .bind(user_id)
        .execute(self.state.db.pool())
        .await
        .expect("force expire failed");
    }

    /// Backdate a denied appeal so the cooldown window has elapsed.
    pub async fn backdate_denied_appeal(&self, user_id: &str, days: i64) {
        let past = time::OffsetDateTime::now_utc() - time::Duration::days(days);
        sqlx::query(
            "UPDATE appeals SET denied_at = ? \
             WHERE community_id = ? AND user_id = ? AND status = 'denied'",
        )
        .bind(past)
        .bind(COMMUNITY)
        .bind(user_id)
        .execute(self.state.db.pool())
        .await
        .expect("backdate appeal failed");
    }
}
