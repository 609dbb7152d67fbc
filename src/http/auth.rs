use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderName;

use crate::http::AppError;
use crate::AppState;

const GATEWAY_TOKEN_HEADER: HeaderName = HeaderName::from_static("x-gateway-token");
const ACTOR_ID_HEADER: HeaderName = HeaderName::from_static("x-actor-id");
const ACTOR_ROLES_HEADER: HeaderName = HeaderName::from_static("x-actor-roles");
const ACTOR_CAN_MANAGE_HEADER: HeaderName = HeaderName::from_static("x-actor-can-manage");
const ACTOR_OUTRANKS_HEADER: HeaderName = HeaderName::from_static("x-actor-outranks-agent");

/// Proof that the request came from the trusted platform gateway.
#[derive(Debug, Clone)]
pub struct GatewayToken;

/// The member on whose behalf the gateway is acting, as attested by the
/// gateway: their id, their role ids, and the two authorization facts the
/// engine cannot derive itself (manage-community permission and whether
/// they outrank the agent's own role).
#[derive(Debug, Clone)]
pub struct Actor {
    pub actor_id: String,
    pub role_ids: Vec<String>,
    pub can_manage: bool,
    pub outranks_agent: bool,
}

impl Actor {
    pub fn has_role(&self, role_id: &str) -> bool {
        self.role_ids.iter().any(|id| id == role_id)
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for GatewayToken {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let expected = state
            .gateway_token
            .as_ref()
            .ok_or_else(|| AppError::forbidden("gateway token not configured"))?;

        let provided = parts
            .headers
            .get(GATEWAY_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("missing gateway token"))?;

        if provided != expected {
            return Err(AppError::unauthorized("invalid gateway token"));
        }

        Ok(GatewayToken)
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Actor context is only trusted behind the gateway token.
        GatewayToken::from_request_parts(parts, state).await?;

        let actor_id = parts
            .headers
            .get(ACTOR_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| AppError::unauthorized("missing x-actor-id header"))?
            .to_owned();

        let role_ids = parts
            .headers
            .get(ACTOR_ROLES_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Actor {
            actor_id,
            role_ids,
            can_manage: header_flag(parts, &ACTOR_CAN_MANAGE_HEADER),
            outranks_agent: header_flag(parts, &ACTOR_OUTRANKS_HEADER),
        })
    }
}

fn header_flag(parts: &Parts, name: &HeaderName) -> bool {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.eq_ignore_ascii_case("true") || value == "1")
        .unwrap_or(false)
}
