use axum::{routing::delete, routing::get, routing::patch, routing::post, routing::put, Router};

use crate::http::handlers;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn blacklists() -> Router<AppState> {
    Router::new()
        .route(
            "/communities/:community_id/blacklists/propose",
            post(handlers::propose_blacklist),
        )
        .route(
            "/communities/:community_id/blacklists/confirm/:token",
            post(handlers::confirm_blacklist),
        )
        .route(
            "/communities/:community_id/blacklists/cancel/:token",
            post(handlers::cancel_blacklist),
        )
        .route(
            "/communities/:community_id/blacklists/:user_id",
            delete(handlers::remove_blacklist),
        )
        .route(
            "/communities/:community_id/blacklists/:user_id",
            patch(handlers::edit_blacklist),
        )
        .route(
            "/communities/:community_id/blacklists/:user_id",
            get(handlers::get_blacklist),
        )
        .route(
            "/communities/:community_id/blacklists/:user_id/check",
            get(handlers::check_blacklist),
        )
        .route(
            "/communities/:community_id/blacklists",
            get(handlers::list_blacklists),
        )
        .route(
            "/communities/:community_id/blacklists/search",
            get(handlers::search_blacklists),
        )
        .route(
            "/communities/:community_id/cases/:case_id/history",
            get(handlers::case_history),
        )
        .route("/communities/:community_id/stats", get(handlers::stats))
        .route(
            "/communities/:community_id/export",
            get(handlers::export_blacklists),
        )
}

pub fn appeals() -> Router<AppState> {
    Router::new()
        .route(
            "/communities/:community_id/appeals",
            post(handlers::submit_appeal),
        )
        .route(
            "/communities/:community_id/appeals/:appeal_id/accept",
            post(handlers::accept_appeal),
        )
        .route(
            "/communities/:community_id/appeals/:appeal_id/deny",
            post(handlers::deny_appeal),
        )
}

pub fn categories() -> Router<AppState> {
    Router::new()
        .route(
            "/communities/:community_id/categories",
            get(handlers::list_categories),
        )
        .route(
            "/communities/:community_id/categories",
            post(handlers::add_category),
        )
        .route(
            "/communities/:community_id/categories/:name",
            delete(handlers::remove_category),
        )
}

pub fn settings() -> Router<AppState> {
    Router::new()
        .route(
            "/communities/:community_id/settings/log-channel",
            put(handlers::set_log_channel),
        )
        .route(
            "/communities/:community_id/settings/staff-role",
            put(handlers::set_staff_role),
        )
        .route(
            "/communities/:community_id/settings/strike-threshold",
            put(handlers::set_strike_threshold),
        )
}

pub fn strikes() -> Router<AppState> {
    Router::new()
        .route(
            "/communities/:community_id/strikes",
            post(handlers::add_strike),
        )
        .route(
            "/communities/:community_id/strikes/:strike_id",
            delete(handlers::remove_strike),
        )
        .route(
            "/communities/:community_id/users/:user_id/strikes",
            get(handlers::list_strikes),
        )
}
