mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{member_headers, mod_headers, TestApp, COMMUNITY};

async fn set_threshold(app: &TestApp, threshold: i64) {
    let resp = app
        .put_json(
            &format!("/communities/{COMMUNITY}/settings/strike-threshold"),
            json!({ "threshold": threshold }),
            &mod_headers(),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
}

async fn strike(app: &TestApp, user_id: &str) -> common::TestResponse {
    app.post_json(
        &format!("/communities/{COMMUNITY}/strikes"),
        json!({ "user_id": user_id, "reason": "spamming" }),
        &mod_headers(),
    )
    .await
}

#[tokio::test]
async fn strike_notifies_the_member_and_counts_up() {
    let app = TestApp::spawn().await;

    let first = strike(&app, "user-1").await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.json()["count"], 1);
    assert!(first.json()["escalated"].is_null());

    let dm = &first.json()["effects"][0];
    assert_eq!(dm["kind"], "direct_message");
    assert!(dm["body"].as_str().unwrap().contains("Total strikes: 1"));

    let second = strike(&app, "user-1").await;
    assert_eq!(second.json()["count"], 2);
}

#[tokio::test]
async fn threshold_escalates_exactly_once() {
    let app = TestApp::spawn().await;
    set_threshold(&app, 3).await;

    assert!(strike(&app, "user-1").await.json()["escalated"].is_null());
    assert!(strike(&app, "user-1").await.json()["escalated"].is_null());

    let third = strike(&app, "user-1").await;
    let escalated = &third.json()["escalated"];
    assert_eq!(escalated["category"], "Escalation");
    assert_eq!(escalated["accepted_by"], "system");
    assert!(escalated["reason"]
        .as_str()
        .unwrap()
        .contains("3 strikes >= threshold 3"));

    // The blacklist add intents ride along with the strike effects.
    let kinds: Vec<String> = third.json()["effects"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["kind"].as_str().unwrap().to_owned())
        .collect();
    assert!(kinds.iter().any(|k| k == "apply_sentinel_role"));

    // A fourth strike over threshold does not stack a second case.
    let fourth = strike(&app, "user-1").await;
    assert_eq!(fourth.status, StatusCode::OK);
    assert_eq!(fourth.json()["count"], 4);
    assert!(fourth.json()["escalated"].is_null());

    // Triggering strikes got back-linked to the escalation case.
    let case_id = escalated["case_id"].as_str().unwrap();
    let listed = app
        .get(
            &format!("/communities/{COMMUNITY}/users/user-1/strikes"),
            &mod_headers(),
        )
        .await;
    let linked = listed.json()["strikes"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|s| s["case_id"] == case_id)
        .count();
    assert_eq!(linked, 3);
}

#[tokio::test]
async fn zero_threshold_disables_escalation() {
    let app = TestApp::spawn().await;
    // Default threshold is 0; pile on strikes freely.
    for _ in 0..5 {
        assert!(strike(&app, "user-1").await.json()["escalated"].is_null());
    }

    let check = app
        .get(
            &format!("/communities/{COMMUNITY}/blacklists/user-1/check"),
            &member_headers(),
        )
        .await;
    assert_eq!(check.json()["blacklisted"], false);
}

#[tokio::test]
async fn strikes_are_removable_and_scoped() {
    let app = TestApp::spawn().await;
    let added = strike(&app, "user-1").await;
    let strike_id = added.json()["strike"]["id"].as_i64().unwrap();

    // Wrong community cannot remove it.
    let wrong = app
        .delete(
            &format!("/communities/guild-200/strikes/{strike_id}"),
            &mod_headers(),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::NOT_FOUND);

    let removed = app
        .delete(
            &format!("/communities/{COMMUNITY}/strikes/{strike_id}"),
            &mod_headers(),
        )
        .await;
    assert_eq!(removed.status, StatusCode::OK);

    let listed = app
        .get(
            &format!("/communities/{COMMUNITY}/users/user-1/strikes"),
            &mod_headers(),
        )
        .await;
    assert_eq!(listed.json()["strikes"].as_array().unwrap().len(), 0);
}
