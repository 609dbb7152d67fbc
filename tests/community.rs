mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{member_headers, mod_headers, TestApp, COMMUNITY, TEST_GATEWAY_TOKEN};

// ---------------------------------------------------------------------------
// Gateway auth and permission ladder
// ---------------------------------------------------------------------------

#[tokio::test]
async fn requests_without_gateway_token_are_rejected() {
    let app = TestApp::spawn().await;

    let missing = app
        .get(&format!("/communities/{COMMUNITY}/blacklists"), &[])
        .await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);

    let wrong = app
        .get(
            &format!("/communities/{COMMUNITY}/blacklists"),
            &[("x-gateway-token", "nope"), ("x-actor-id", "mod-1")],
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn plain_members_cannot_use_staff_commands() {
    let app = TestApp::spawn().await;

    let resp = app
        .post_json(
            &format!("/communities/{COMMUNITY}/blacklists/propose"),
            json!({ "user_id": "u", "reason": "r", "category": "Scam" }),
            &member_headers(),
        )
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn configured_staff_role_grants_access() {
    let app = TestApp::spawn().await;

    let staff_headers = vec![
        ("x-gateway-token", TEST_GATEWAY_TOKEN),
        ("x-actor-id", "helper-1"),
        ("x-actor-roles", "role-staff,role-misc"),
    ];

    // No staff role configured yet.
    let before = app
        .get(
            &format!("/communities/{COMMUNITY}/blacklists"),
            &staff_headers,
        )
        .await;
    assert_eq!(before.status, StatusCode::FORBIDDEN);

    app.put_json(
        &format!("/communities/{COMMUNITY}/settings/staff-role"),
        json!({ "role_id": "role-staff" }),
        &mod_headers(),
    )
    .await;

    let after = app
        .get(
            &format!("/communities/{COMMUNITY}/blacklists"),
            &staff_headers,
        )
        .await;
    assert_eq!(after.status, StatusCode::OK);
}

#[tokio::test]
async fn outranking_the_agent_grants_access() {
    let app = TestApp::spawn().await;

    let headers = vec![
        ("x-gateway-token", TEST_GATEWAY_TOKEN),
        ("x-actor-id", "senior-1"),
        ("x-actor-outranks-agent", "true"),
    ];
    let resp = app
        .get(&format!("/communities/{COMMUNITY}/blacklists"), &headers)
        .await;
    assert_eq!(resp.status, StatusCode::OK);
}

#[tokio::test]
async fn settings_require_manage_permission() {
    let app = TestApp::spawn().await;

    let resp = app
        .put_json(
            &format!("/communities/{COMMUNITY}/settings/log-channel"),
            json!({ "channel_id": "chan-1" }),
            &member_headers(),
        )
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[tokio::test]
async fn log_channel_mirrors_case_activity() {
    let app = TestApp::spawn().await;

    app.put_json(
        &format!("/communities/{COMMUNITY}/settings/log-channel"),
        json!({ "channel_id": "chan-log" }),
        &mod_headers(),
    )
    .await;

    let created = app.blacklist_user("user-1", "Scam").await;
    let log = created["effects"]
        .as_array()
        .unwrap()
        .iter()
        .find(|e| e["kind"] == "log_event")
        .expect("log event missing");
    assert_eq!(log["channel_id"], "chan-log");
    assert!(log["body"].as_str().unwrap().contains("user-1"));
}

#[tokio::test]
async fn negative_threshold_is_rejected() {
    let app = TestApp::spawn().await;
    let resp = app
        .put_json(
            &format!("/communities/{COMMUNITY}/settings/strike-threshold"),
            json!({ "threshold": -1 }),
            &mod_headers(),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

#[tokio::test]
async fn builtin_categories_are_seeded() {
    let app = TestApp::spawn().await;

    let resp = app
        .get(
            &format!("/communities/{COMMUNITY}/categories"),
            &mod_headers(),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let names: Vec<String> = resp.json()["categories"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap().to_owned())
        .collect();
    for builtin in [
        "Appealable",
        "Non-Appealable",
        "Temporary",
        "Scam",
        "Harassment",
        "Raid",
        "NSFW",
        "Escalation",
    ] {
        assert!(names.iter().any(|n| n == builtin), "missing {builtin}");
    }
}

#[tokio::test]
async fn custom_categories_are_per_community() {
    let app = TestApp::spawn().await;

    let added = app
        .post_json(
            &format!("/communities/{COMMUNITY}/categories"),
            json!({ "name": "Botting", "color": "#123456" }),
            &mod_headers(),
        )
        .await;
    assert_eq!(added.status, StatusCode::OK);
    assert_eq!(added.json()["name"], "Botting");
    assert_eq!(added.json()["is_default"], false);

    let duplicate = app
        .post_json(
            &format!("/communities/{COMMUNITY}/categories"),
            json!({ "name": "Botting" }),
            &mod_headers(),
        )
        .await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);

    // Another community does not see it and cannot blacklist under it.
    let other = app
        .post_json(
            "/communities/guild-200/blacklists/propose",
            json!({ "user_id": "u", "reason": "r", "category": "Botting" }),
            &mod_headers(),
        )
        .await;
    assert_eq!(other.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn builtin_categories_cannot_be_removed() {
    let app = TestApp::spawn().await;

    let resp = app
        .delete(
            &format!("/communities/{COMMUNITY}/categories/Scam"),
            &mod_headers(),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "built-in categories cannot be removed");
}

#[tokio::test]
async fn removing_a_category_leaves_existing_entries_intact() {
    let app = TestApp::spawn().await;

    app.post_json(
        &format!("/communities/{COMMUNITY}/categories"),
        json!({ "name": "Botting" }),
        &mod_headers(),
    )
    .await;
    app.blacklist_user("user-1", "Botting").await;

    let removed = app
        .delete(
            &format!("/communities/{COMMUNITY}/categories/Botting"),
            &mod_headers(),
        )
        .await;
    assert_eq!(removed.status, StatusCode::OK);

    // Entry keeps the literal category string.
    let info = app
        .get(
            &format!("/communities/{COMMUNITY}/blacklists/user-1"),
            &mod_headers(),
        )
        .await;
    assert_eq!(info.json()["entry"]["category"], "Botting");

    let missing = app
        .delete(
            &format!("/communities/{COMMUNITY}/categories/Botting"),
            &mod_headers(),
        )
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_store_status() {
    let app = TestApp::spawn().await;
    let resp = app.get("/health", &[]).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["status"], "ok");
}
