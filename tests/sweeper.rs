mod common;

use axum::http::StatusCode;
use serde_json::json;

use warden::app::lifecycle::LifecycleEngine;
use warden::jobs::expiry_sweeper;

use common::{member_headers, mod_headers, TestApp, COMMUNITY};

fn engine(app: &TestApp) -> LifecycleEngine {
    LifecycleEngine::new(
        app.state.db.clone(),
        app.state.locks.clone(),
        app.state.proposals.clone(),
        app.state.confirm_ttl_seconds,
    )
}

#[tokio::test]
async fn sweep_lifts_expired_entries_once() {
    let app = TestApp::spawn().await;

    let created = app
        .blacklist_user_with("user-1", "Temporary", "cool off", Some("1h"))
        .await;
    let case_id = created["entry"]["case_id"].as_str().unwrap().to_owned();
    app.blacklist_user("user-2", "Scam").await;

    // Nothing is due yet.
    let lifted = expiry_sweeper::sweep_once(&app.state.db, &engine(&app), None)
        .await
        .unwrap();
    assert_eq!(lifted, 0);

    app.force_expire("user-1").await;
    let lifted = expiry_sweeper::sweep_once(&app.state.db, &engine(&app), None)
        .await
        .unwrap();
    assert_eq!(lifted, 1);

    // Second pass is a no-op.
    let lifted = expiry_sweeper::sweep_once(&app.state.db, &engine(&app), None)
        .await
        .unwrap();
    assert_eq!(lifted, 0);

    let check = app
        .get(
            &format!("/communities/{COMMUNITY}/blacklists/user-1/check"),
            &member_headers(),
        )
        .await;
    assert_eq!(check.json()["blacklisted"], false);

    // The permanent entry is untouched.
    let check = app
        .get(
            &format!("/communities/{COMMUNITY}/blacklists/user-2/check"),
            &member_headers(),
        )
        .await;
    assert_eq!(check.json()["blacklisted"], true);

    // Removal is audited under the system identity.
    let history = app
        .get(
            &format!("/communities/{COMMUNITY}/cases/{case_id}/history"),
            &mod_headers(),
        )
        .await;
    assert_eq!(history.status, StatusCode::OK);
    let records = history.json()["records"].as_array().unwrap().to_owned();
    let removal = records.last().unwrap();
    assert_eq!(removal["action"], "removed");
    assert_eq!(removal["moderator_id"], "system");
    assert_eq!(removal["note"], "temporary blacklist expired");
}

#[tokio::test]
async fn expired_user_can_be_blacklisted_again() {
    let app = TestApp::spawn().await;

    app.blacklist_user_with("user-1", "Temporary", "first", Some("1m"))
        .await;
    app.force_expire("user-1").await;
    expiry_sweeper::sweep_once(&app.state.db, &engine(&app), None)
        .await
        .unwrap();

    let again = app
        .post_json(
            &format!("/communities/{COMMUNITY}/blacklists/propose"),
            json!({ "user_id": "user-1", "reason": "relapsed", "category": "Scam" }),
            &mod_headers(),
        )
        .await;
    assert_eq!(again.status, StatusCode::OK);
}
