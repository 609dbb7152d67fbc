use axum::Router;

use crate::AppState;

mod auth;
mod error;
mod handlers;
mod routes;

pub use auth::{Actor, GatewayToken};
pub use error::AppError;

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health())
        .merge(routes::blacklists())
        .merge(routes::appeals())
        .merge(routes::categories())
        .merge(routes::settings())
        .merge(routes::strikes())
        .with_state(state)
}
