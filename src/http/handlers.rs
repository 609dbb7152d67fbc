use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::appeals::AppealService;
use crate::app::blacklist::BlacklistService;
use crate::app::categories::CategoryService;
use crate::app::export;
use crate::app::lifecycle::{AddRequest, LifecycleEngine, RemovalKind};
use crate::app::settings::SettingsService;
use crate::app::strikes::StrikeService;
use crate::domain::appeal::Appeal;
use crate::domain::blacklist::{BlacklistEntry, BlacklistStats, HistoryRecord};
use crate::domain::category::Category;
use crate::domain::effect::{MemberSnapshot, SideEffect};
use crate::domain::strike::Strike;
use crate::http::{Actor, AppError, GatewayToken};
use crate::AppState;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.db.ping().await.is_ok() {
        "ok"
    } else {
        "degraded"
    };
    Json(HealthResponse { status })
}

fn engine(state: &AppState) -> LifecycleEngine {
    LifecycleEngine::new(
        state.db.clone(),
        state.locks.clone(),
        state.proposals.clone(),
        state.confirm_ttl_seconds,
    )
}

/// Staff authorization ladder, in the order the original surface checks
/// it: manage-community permission, the configured staff role, or
/// outranking the moderation agent itself.
async fn require_staff(
    state: &AppState,
    community_id: &str,
    actor: &Actor,
) -> Result<(), AppError> {
    if actor.can_manage || actor.outranks_agent {
        return Ok(());
    }
    let settings = SettingsService::new(state.db.clone())
        .get(community_id)
        .await?;
    if let Some(staff_role) = settings.staff_role {
        if actor.has_role(&staff_role) {
            return Ok(());
        }
    }
    Err(AppError::forbidden(
        "you do not have permission to use this command",
    ))
}

fn require_manage(actor: &Actor) -> Result<(), AppError> {
    if actor.can_manage {
        Ok(())
    } else {
        Err(AppError::forbidden(
            "only community managers can change settings",
        ))
    }
}

// ---------------------------------------------------------------------------
// Blacklist lifecycle
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct ProposeRequest {
    pub user_id: String,
    pub reason: String,
    pub category: String,
    pub requested_by: Option<String>,
    pub duration: Option<String>,
    pub evidence: Option<String>,
}

#[derive(Serialize)]
pub struct ProposeResponse {
    pub token: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

pub async fn propose_blacklist(
    State(state): State<AppState>,
    Path(community_id): Path<String>,
    actor: Actor,
    Json(payload): Json<ProposeRequest>,
) -> Result<Json<ProposeResponse>, AppError> {
    require_staff(&state, &community_id, &actor).await?;

    let ticket = engine(&state)
        .propose_add(AddRequest {
            community_id,
            user_id: payload.user_id,
            invoker_id: actor.actor_id,
            reason: payload.reason,
            category: payload.category,
            requested_by: payload.requested_by,
            duration: payload.duration,
            evidence: payload.evidence,
        })
        .await?;

    Ok(Json(ProposeResponse {
        token: ticket.token,
        expires_at: ticket.expires_at,
    }))
}

#[derive(Deserialize)]
pub struct ConfirmRequest {
    /// Role/nickname snapshot the gateway captured immediately before
    /// stripping the member.
    pub roles: Vec<String>,
    pub nickname: Option<String>,
}

#[derive(Serialize)]
pub struct EntryResponse {
    pub entry: BlacklistEntry,
    pub effects: Vec<SideEffect>,
}

pub async fn confirm_blacklist(
    State(state): State<AppState>,
    Path((community_id, token)): Path<(String, Uuid)>,
    actor: Actor,
    Json(payload): Json<ConfirmRequest>,
) -> Result<Json<EntryResponse>, AppError> {
    require_staff(&state, &community_id, &actor).await?;

    let (entry, effects) = engine(&state)
        .confirm_add(
            token,
            &actor.actor_id,
            MemberSnapshot {
                roles: payload.roles,
                nickname: payload.nickname,
            },
        )
        .await?;

    Ok(Json(EntryResponse { entry, effects }))
}

#[derive(Serialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}

pub async fn cancel_blacklist(
    State(state): State<AppState>,
    Path((community_id, token)): Path<(String, Uuid)>,
    actor: Actor,
) -> Result<Json<CancelResponse>, AppError> {
    require_staff(&state, &community_id, &actor).await?;
    engine(&state).cancel_add(token, &actor.actor_id).await?;
    Ok(Json(CancelResponse { cancelled: true }))
}

#[derive(Deserialize)]
pub struct RemoveRequest {
    pub reason: String,
}

pub async fn remove_blacklist(
    State(state): State<AppState>,
    Path((community_id, user_id)): Path<(String, String)>,
    actor: Actor,
    Json(payload): Json<RemoveRequest>,
) -> Result<Json<EntryResponse>, AppError> {
    require_staff(&state, &community_id, &actor).await?;

    let (entry, effects) = engine(&state)
        .remove(
            &community_id,
            &user_id,
            &actor.actor_id,
            &payload.reason,
            RemovalKind::Manual,
        )
        .await?
        .ok_or_else(|| AppError::not_found("no blacklist entry for that user"))?;

    Ok(Json(EntryResponse { entry, effects }))
}

#[derive(Deserialize)]
pub struct EditRequest {
    pub reason: Option<String>,
    pub category: Option<String>,
}

pub async fn edit_blacklist(
    State(state): State<AppState>,
    Path((community_id, user_id)): Path<(String, String)>,
    actor: Actor,
    Json(payload): Json<EditRequest>,
) -> Result<Json<EntryResponse>, AppError> {
    require_staff(&state, &community_id, &actor).await?;

    let (entry, effects) = engine(&state)
        .edit(
            &community_id,
            &user_id,
            &actor.actor_id,
            payload.reason.as_deref(),
            payload.category.as_deref(),
        )
        .await?;

    Ok(Json(EntryResponse { entry, effects }))
}

#[derive(Serialize)]
pub struct InfoResponse {
    pub entry: BlacklistEntry,
    pub strikes: i64,
}

pub async fn get_blacklist(
    State(state): State<AppState>,
    Path((community_id, user_id)): Path<(String, String)>,
    actor: Actor,
) -> Result<Json<InfoResponse>, AppError> {
    require_staff(&state, &community_id, &actor).await?;

    let entry = BlacklistService::new(state.db.clone())
        .find_one(&community_id, &user_id)
        .await?
        .ok_or_else(|| AppError::not_found("user is not blacklisted"))?;
    let strikes = StrikeService::new(state.db.clone())
        .count(&community_id, &user_id)
        .await?;

    Ok(Json(InfoResponse { entry, strikes }))
}

#[derive(Serialize)]
pub struct CheckResponse {
    pub blacklisted: bool,
}

/// Open to any member.
pub async fn check_blacklist(
    State(state): State<AppState>,
    Path((community_id, user_id)): Path<(String, String)>,
    _gateway: GatewayToken,
) -> Result<Json<CheckResponse>, AppError> {
    let entry = BlacklistService::new(state.db.clone())
        .find_one(&community_id, &user_id)
        .await?;
    Ok(Json(CheckResponse {
        blacklisted: entry.is_some(),
    }))
}

#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
}

#[derive(Serialize)]
pub struct ListResponse {
    pub entries: Vec<BlacklistEntry>,
    pub page: i64,
    pub total: i64,
}

pub async fn list_blacklists(
    State(state): State<AppState>,
    Path(community_id): Path<String>,
    actor: Actor,
    Query(query): Query<PageQuery>,
) -> Result<Json<ListResponse>, AppError> {
    require_staff(&state, &community_id, &actor).await?;

    let page = query.page.unwrap_or(0).max(0);
    let store = BlacklistService::new(state.db.clone());
    let entries = store.list(&community_id, page, state.page_size).await?;
    let total = store.count(&community_id).await?;

    Ok(Json(ListResponse {
        entries,
        page,
        total,
    }))
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub entries: Vec<BlacklistEntry>,
}

pub async fn search_blacklists(
    State(state): State<AppState>,
    Path(community_id): Path<String>,
    actor: Actor,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, AppError> {
    require_staff(&state, &community_id, &actor).await?;

    if query.q.trim().is_empty() {
        return Err(AppError::bad_request("search keyword is required"));
    }
    let entries = BlacklistService::new(state.db.clone())
        .search(&community_id, query.q.trim())
        .await?;

    Ok(Json(SearchResponse { entries }))
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub records: Vec<HistoryRecord>,
}

pub async fn case_history(
    State(state): State<AppState>,
    Path((community_id, case_id)): Path<(String, String)>,
    actor: Actor,
) -> Result<Json<HistoryResponse>, AppError> {
    require_staff(&state, &community_id, &actor).await?;

    let records = BlacklistService::new(state.db.clone())
        .history(&case_id)
        .await?;
    // History is keyed by case alone; refuse to leak other communities'.
    if records.is_empty() || records.iter().any(|r| r.community_id != community_id) {
        return Err(AppError::not_found("no history for that case"));
    }

    Ok(Json(HistoryResponse { records }))
}

pub async fn stats(
    State(state): State<AppState>,
    Path(community_id): Path<String>,
    actor: Actor,
) -> Result<Json<BlacklistStats>, AppError> {
    require_staff(&state, &community_id, &actor).await?;

    let stats = BlacklistService::new(state.db.clone())
        .stats(&community_id)
        .await?;
    Ok(Json(stats))
}

#[derive(Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
}

pub async fn export_blacklists(
    State(state): State<AppState>,
    Path(community_id): Path<String>,
    actor: Actor,
    Query(query): Query<ExportQuery>,
) -> Result<impl IntoResponse, AppError> {
    require_staff(&state, &community_id, &actor).await?;

    let entries = BlacklistService::new(state.db.clone())
        .list_all(&community_id)
        .await?;

    match query.format.as_deref().unwrap_or("txt") {
        "txt" => Ok((
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            export::export_txt(&community_id, &entries),
        )),
        "csv" => Ok((
            [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
            export::export_csv(&entries),
        )),
        other => Err(AppError::bad_request(format!(
            "unsupported export format: {other} (use txt or csv)"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Appeals
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct AppealRequest {
    pub reason: String,
}

#[derive(Serialize)]
pub struct AppealResponse {
    pub appeal: Appeal,
    pub effects: Vec<SideEffect>,
}

/// Open to any member; the appeal is always filed for the actor itself.
pub async fn submit_appeal(
    State(state): State<AppState>,
    Path(community_id): Path<String>,
    actor: Actor,
    Json(payload): Json<AppealRequest>,
) -> Result<Json<AppealResponse>, AppError> {
    let (appeal, effects) = AppealService::new(state.db.clone(), state.appeal_cooldown_days)
        .submit(&community_id, &actor.actor_id, &payload.reason)
        .await?;

    Ok(Json(AppealResponse { appeal, effects }))
}

#[derive(Deserialize)]
pub struct AppealDecisionRequest {
    pub reason: String,
}

pub async fn accept_appeal(
    State(state): State<AppState>,
    Path((community_id, appeal_id)): Path<(String, i64)>,
    actor: Actor,
    Json(payload): Json<AppealDecisionRequest>,
) -> Result<Json<AppealResponse>, AppError> {
    require_staff(&state, &community_id, &actor).await?;

    let (appeal, effects) = AppealService::new(state.db.clone(), state.appeal_cooldown_days)
        .accept(
            &engine(&state),
            &community_id,
            appeal_id,
            &actor.actor_id,
            &payload.reason,
        )
        .await?;

    Ok(Json(AppealResponse { appeal, effects }))
}

pub async fn deny_appeal(
    State(state): State<AppState>,
    Path((community_id, appeal_id)): Path<(String, i64)>,
    actor: Actor,
    Json(payload): Json<AppealDecisionRequest>,
) -> Result<Json<AppealResponse>, AppError> {
    require_staff(&state, &community_id, &actor).await?;

    let (appeal, effects) = AppealService::new(state.db.clone(), state.appeal_cooldown_days)
        .deny(&community_id, appeal_id, &actor.actor_id, &payload.reason)
        .await?;

    Ok(Json(AppealResponse { appeal, effects }))
}

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct CategoriesResponse {
    pub categories: Vec<Category>,
}

pub async fn list_categories(
    State(state): State<AppState>,
    Path(community_id): Path<String>,
    actor: Actor,
) -> Result<Json<CategoriesResponse>, AppError> {
    require_staff(&state, &community_id, &actor).await?;

    let categories = CategoryService::new(state.db.clone())
        .list(&community_id)
        .await?;
    Ok(Json(CategoriesResponse { categories }))
}

#[derive(Deserialize)]
pub struct AddCategoryRequest {
    pub name: String,
    pub color: Option<String>,
}

pub async fn add_category(
    State(state): State<AppState>,
    Path(community_id): Path<String>,
    actor: Actor,
    Json(payload): Json<AddCategoryRequest>,
) -> Result<Json<Category>, AppError> {
    require_staff(&state, &community_id, &actor).await?;

    let category = CategoryService::new(state.db.clone())
        .add(&community_id, &payload.name, payload.color.as_deref())
        .await?;
    Ok(Json(category))
}

#[derive(Serialize)]
pub struct RemovedResponse {
    pub removed: bool,
}

pub async fn remove_category(
    State(state): State<AppState>,
    Path((community_id, name)): Path<(String, String)>,
    actor: Actor,
) -> Result<Json<RemovedResponse>, AppError> {
    require_staff(&state, &community_id, &actor).await?;

    CategoryService::new(state.db.clone())
        .remove(&community_id, &name)
        .await?;
    Ok(Json(RemovedResponse { removed: true }))
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct SetChannelRequest {
    pub channel_id: String,
}

#[derive(Serialize)]
pub struct UpdatedResponse {
    pub updated: bool,
}

pub async fn set_log_channel(
    State(state): State<AppState>,
    Path(community_id): Path<String>,
    actor: Actor,
    Json(payload): Json<SetChannelRequest>,
) -> Result<Json<UpdatedResponse>, AppError> {
    require_manage(&actor)?;

    SettingsService::new(state.db.clone())
        .set_log_channel(&community_id, &payload.channel_id)
        .await?;
    Ok(Json(UpdatedResponse { updated: true }))
}

#[derive(Deserialize)]
pub struct SetRoleRequest {
    pub role_id: String,
}

pub async fn set_staff_role(
    State(state): State<AppState>,
    Path(community_id): Path<String>,
    actor: Actor,
    Json(payload): Json<SetRoleRequest>,
) -> Result<Json<UpdatedResponse>, AppError> {
    require_manage(&actor)?;

    SettingsService::new(state.db.clone())
        .set_staff_role(&community_id, &payload.role_id)
        .await?;
    Ok(Json(UpdatedResponse { updated: true }))
}

#[derive(Deserialize)]
pub struct SetThresholdRequest {
    pub threshold: i64,
}

pub async fn set_strike_threshold(
    State(state): State<AppState>,
    Path(community_id): Path<String>,
    actor: Actor,
    Json(payload): Json<SetThresholdRequest>,
) -> Result<Json<UpdatedResponse>, AppError> {
    require_manage(&actor)?;

    if payload.threshold < 0 {
        return Err(AppError::bad_request("threshold must be 0 or greater"));
    }
    SettingsService::new(state.db.clone())
        .set_strike_threshold(&community_id, payload.threshold)
        .await?;
    Ok(Json(UpdatedResponse { updated: true }))
}

// ---------------------------------------------------------------------------
// Strikes
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct AddStrikeRequest {
    pub user_id: String,
    pub reason: String,
}

#[derive(Serialize)]
pub struct StrikeResponse {
    pub strike: Strike,
    pub count: i64,
    pub escalated: Option<BlacklistEntry>,
    pub effects: Vec<SideEffect>,
}

pub async fn add_strike(
    State(state): State<AppState>,
    Path(community_id): Path<String>,
    actor: Actor,
    Json(payload): Json<AddStrikeRequest>,
) -> Result<Json<StrikeResponse>, AppError> {
    require_staff(&state, &community_id, &actor).await?;

    let outcome = StrikeService::new(state.db.clone())
        .add(
            &engine(&state),
            &community_id,
            &payload.user_id,
            &payload.reason,
            &actor.actor_id,
        )
        .await?;

    Ok(Json(StrikeResponse {
        strike: outcome.strike,
        count: outcome.count,
        escalated: outcome.escalated,
        effects: outcome.effects,
    }))
}

pub async fn remove_strike(
    State(state): State<AppState>,
    Path((community_id, strike_id)): Path<(String, i64)>,
    actor: Actor,
) -> Result<Json<RemovedResponse>, AppError> {
    require_staff(&state, &community_id, &actor).await?;

    StrikeService::new(state.db.clone())
        .remove(&community_id, strike_id)
        .await?;
    Ok(Json(RemovedResponse { removed: true }))
}

#[derive(Serialize)]
pub struct StrikesResponse {
    pub strikes: Vec<Strike>,
}

pub async fn list_strikes(
    State(state): State<AppState>,
    Path((community_id, user_id)): Path<(String, String)>,
    actor: Actor,
) -> Result<Json<StrikesResponse>, AppError> {
    require_staff(&state, &community_id, &actor).await?;

    let strikes = StrikeService::new(state.db.clone())
        .list(&community_id, &user_id)
        .await?;
    Ok(Json(StrikesResponse { strikes }))
}
