mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{mod_headers, TestApp, COMMUNITY, TEST_GATEWAY_TOKEN};

fn user_headers(user_id: &'static str) -> Vec<(&'static str, &'static str)> {
    vec![
        ("x-gateway-token", TEST_GATEWAY_TOKEN),
        ("x-actor-id", user_id),
    ]
}

async fn submit(app: &TestApp, user_id: &'static str, reason: &str) -> common::TestResponse {
    app.post_json(
        &format!("/communities/{COMMUNITY}/appeals"),
        json!({ "reason": reason }),
        &user_headers(user_id),
    )
    .await
}

#[tokio::test]
async fn appeal_requires_an_active_blacklist() {
    let app = TestApp::spawn().await;
    let resp = submit(&app, "user-1", "please").await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.error_message(), "you are not blacklisted");
}

#[tokio::test]
async fn non_appealable_entries_cannot_be_appealed() {
    let app = TestApp::spawn().await;
    app.blacklist_user("user-1", "Non-Appealable").await;

    let resp = submit(&app, "user-1", "please").await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        resp.error_message(),
        "this blacklist is non-appealable and cannot be appealed"
    );
}

#[tokio::test]
async fn one_pending_appeal_at_a_time() {
    let app = TestApp::spawn().await;
    app.blacklist_user("user-1", "Scam").await;

    let first = submit(&app, "user-1", "I have reformed").await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.json()["appeal"]["status"], "pending");

    let second = submit(&app, "user-1", "trying again").await;
    assert_eq!(second.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn accept_lifts_the_blacklist() {
    let app = TestApp::spawn().await;
    app.blacklist_user("user-1", "Scam").await;

    let submitted = submit(&app, "user-1", "I have reformed").await;
    let appeal_id = submitted.json()["appeal"]["id"].as_i64().unwrap();

    let accepted = app
        .post_json(
            &format!("/communities/{COMMUNITY}/appeals/{appeal_id}/accept"),
            json!({ "reason": "convincing evidence" }),
            &mod_headers(),
        )
        .await;
    assert_eq!(accepted.status, StatusCode::OK);
    assert_eq!(accepted.json()["appeal"]["status"], "accepted");

    // The removal path ran: snapshot restoration intents are present.
    let kinds: Vec<String> = accepted.json()["effects"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["kind"].as_str().unwrap().to_owned())
        .collect();
    assert!(kinds.iter().any(|k| k == "restore_roles"));
    assert!(kinds.iter().any(|k| k == "restore_nickname"));

    let check = app
        .get(
            &format!("/communities/{COMMUNITY}/blacklists/user-1/check"),
            &user_headers("user-1"),
        )
        .await;
    assert_eq!(check.json()["blacklisted"], false);
}

#[tokio::test]
async fn resolved_appeals_cannot_be_decided_twice() {
    let app = TestApp::spawn().await;
    app.blacklist_user("user-1", "Scam").await;

    let submitted = submit(&app, "user-1", "I have reformed").await;
    let appeal_id = submitted.json()["appeal"]["id"].as_i64().unwrap();

    let denied = app
        .post_json(
            &format!("/communities/{COMMUNITY}/appeals/{appeal_id}/deny"),
            json!({ "reason": "unconvincing" }),
            &mod_headers(),
        )
        .await;
    assert_eq!(denied.status, StatusCode::OK);
    assert_eq!(denied.json()["appeal"]["status"], "denied");

    let again = app
        .post_json(
            &format!("/communities/{COMMUNITY}/appeals/{appeal_id}/accept"),
            json!({ "reason": "changed my mind" }),
            &mod_headers(),
        )
        .await;
    assert_eq!(again.status, StatusCode::CONFLICT);

    let missing = app
        .post_json(
            &format!("/communities/{COMMUNITY}/appeals/9999/deny"),
            json!({ "reason": "r" }),
            &mod_headers(),
        )
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn concurrent_resolutions_settle_on_exactly_one() {
    let app = TestApp::spawn().await;
    app.blacklist_user("user-1", "Scam").await;

    let submitted = submit(&app, "user-1", "I have reformed").await;
    let appeal_id = submitted.json()["appeal"]["id"].as_i64().unwrap();

    let accept_path = format!("/communities/{COMMUNITY}/appeals/{appeal_id}/accept");
    let deny_path = format!("/communities/{COMMUNITY}/appeals/{appeal_id}/deny");
    let accept_headers = mod_headers();
    let deny_headers = mod_headers();
    let (accepted, denied) = tokio::join!(
        app.post_json(
            &accept_path,
            json!({ "reason": "convincing" }),
            &accept_headers,
        ),
        app.post_json(
            &deny_path,
            json!({ "reason": "unconvincing" }),
            &deny_headers,
        ),
    );

    let statuses = [accepted.status, denied.status];
    assert_eq!(
        statuses.iter().filter(|s| **s == StatusCode::OK).count(),
        1,
        "accept={} deny={}",
        accepted.status,
        denied.status
    );
    assert!(statuses.contains(&StatusCode::CONFLICT));

    let row: (String,) =
        sqlx::query_as("SELECT status FROM appeals WHERE id = ?")
            .bind(appeal_id)
            .fetch_one(app.state.db.pool())
            .await
            .unwrap();
    let winner = if accepted.status == StatusCode::OK {
        "accepted"
    } else {
        "denied"
    };
    assert_eq!(row.0, winner);
}

#[tokio::test]
async fn denial_starts_the_resubmission_cooldown() {
    let app = TestApp::spawn().await;
    app.blacklist_user("user-1", "Scam").await;

    let submitted = submit(&app, "user-1", "first try").await;
    let appeal_id = submitted.json()["appeal"]["id"].as_i64().unwrap();
    app.post_json(
        &format!("/communities/{COMMUNITY}/appeals/{appeal_id}/deny"),
        json!({ "reason": "no" }),
        &mod_headers(),
    )
    .await;

    let too_soon = submit(&app, "user-1", "second try").await;
    assert_eq!(too_soon.status, StatusCode::CONFLICT);
    assert!(too_soon
        .error_message()
        .contains("you can appeal again in"));

    // Once the window has elapsed the appeal goes through.
    app.backdate_denied_appeal("user-1", 8).await;
    let retry = submit(&app, "user-1", "second try").await;
    assert_eq!(retry.status, StatusCode::OK);
}

#[tokio::test]
async fn accept_tolerates_an_already_removed_entry() {
    let app = TestApp::spawn().await;
    app.blacklist_user("user-1", "Scam").await;

    let submitted = submit(&app, "user-1", "please").await;
    let appeal_id = submitted.json()["appeal"]["id"].as_i64().unwrap();

    // The blacklist is lifted manually while the appeal is pending.
    app.delete_json(
        &format!("/communities/{COMMUNITY}/blacklists/user-1"),
        json!({ "reason": "handled out of band" }),
        &mod_headers(),
    )
    .await;

    let accepted = app
        .post_json(
            &format!("/communities/{COMMUNITY}/appeals/{appeal_id}/accept"),
            json!({ "reason": "moot but resolved" }),
            &mod_headers(),
        )
        .await;
    assert_eq!(accepted.status, StatusCode::OK);
    assert_eq!(accepted.json()["appeal"]["status"], "accepted");
}
