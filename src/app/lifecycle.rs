use std::collections::HashMap;
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::app::blacklist::{BlacklistService, NewEntry};
use crate::app::categories::CategoryService;
use crate::app::error::{EngineError, EngineResult};
use crate::app::locks::UserLocks;
use crate::app::settings::SettingsService;
use crate::domain::blacklist::BlacklistEntry;
use crate::domain::effect::{MemberSnapshot, SideEffect, SENTINEL_PREFIX};
use crate::infra::db::Db;

/// Actor id recorded for escalation and expiry, where no human moderator
/// drove the action.
pub const SYSTEM_ACTOR: &str = "system";

/// Why an entry is being removed. All three reasons share one removal
/// path; only the outgoing notifications differ.
#[derive(Debug, Clone, Copy)]
pub enum RemovalKind {
    Manual,
    AppealAccepted { appeal_id: i64 },
    Expired,
}

/// A proposed add awaiting explicit confirmation from its invoker.
/// Nothing has been written to the store yet and no lock is held; the
/// preconditions are re-validated when confirmation arrives.
#[derive(Debug, Clone)]
pub struct Proposal {
    pub community_id: String,
    pub user_id: String,
    pub invoker_id: String,
    pub reason: String,
    pub category: String,
    pub requested_by: Option<String>,
    pub duration: Option<Duration>,
    pub evidence: Option<String>,
    pub expires_at: OffsetDateTime,
}

/// In-process store of pending add proposals, expired lazily.
#[derive(Clone, Default)]
pub struct ProposalStore {
    inner: Arc<Mutex<HashMap<Uuid, Proposal>>>,
}

impl ProposalStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn insert(&self, proposal: Proposal) -> Uuid {
        let token = Uuid::new_v4();
        let mut map = self.inner.lock().await;
        let now = OffsetDateTime::now_utc();
        map.retain(|_, p| p.expires_at > now);
        map.insert(token, proposal);
        token
    }

    /// Remove and return the proposal if it is live and owned by the
    /// invoker. A timed-out token behaves exactly like an unknown one.
    async fn claim(&self, token: Uuid, invoker_id: &str) -> EngineResult<Proposal> {
        let mut map = self.inner.lock().await;
        let now = OffsetDateTime::now_utc();
        map.retain(|_, p| p.expires_at > now);

        match map.get(&token) {
            None => Err(EngineError::not_found("proposal not found or expired")),
            Some(p) if p.invoker_id != invoker_id => Err(EngineError::validation(
                "only the proposing moderator can act on this proposal",
            )),
            Some(_) => Ok(map.remove(&token).unwrap_or_else(|| unreachable!())),
        }
    }
}

/// Request for a two-step blacklist add.
#[derive(Debug, Clone)]
pub struct AddRequest {
    pub community_id: String,
    pub user_id: String,
    pub invoker_id: String,
    pub reason: String,
    pub category: String,
    pub requested_by: Option<String>,
    pub duration: Option<String>,
    pub evidence: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProposalTicket {
    pub token: Uuid,
    pub expires_at: OffsetDateTime,
}

/// The orchestrator: validates preconditions, mutates the case store
/// under the per-user lock, and emits the ordered side-effect intents the
/// gateway must carry out. Holds no durable state of its own.
#[derive(Clone)]
pub struct LifecycleEngine {
    store: BlacklistService,
    categories: CategoryService,
    settings: SettingsService,
    locks: UserLocks,
    proposals: ProposalStore,
    confirm_ttl: Duration,
}

impl LifecycleEngine {
    pub fn new(db: Db, locks: UserLocks, proposals: ProposalStore, confirm_ttl_seconds: u64) -> Self {
        Self {
            store: BlacklistService::new(db.clone()),
            categories: CategoryService::new(db.clone()),
            settings: SettingsService::new(db),
            locks,
            proposals,
            confirm_ttl: Duration::seconds(confirm_ttl_seconds as i64),
        }
    }

    pub fn store(&self) -> &BlacklistService {
        &self.store
    }

    /// Step one of Add: validate and park a proposal. No store mutation,
    /// no lock; the window is bounded by the confirmation TTL.
    pub async fn propose_add(&self, req: AddRequest) -> EngineResult<ProposalTicket> {
        let reason = req.reason.trim();
        if reason.is_empty() {
            return Err(EngineError::validation("reason is required"));
        }

        let duration = match req.duration.as_deref() {
            None => None,
            Some(raw) => {
                let d = parse_duration(raw).ok_or_else(|| {
                    EngineError::validation("invalid duration format, use 1d, 12h, or 30m")
                })?;
                if OffsetDateTime::now_utc().checked_add(d).is_none() {
                    return Err(EngineError::validation("duration too large"));
                }
                Some(d)
            }
        };

        if !self
            .categories
            .exists(&req.community_id, &req.category)
            .await?
        {
            return Err(EngineError::validation(format!(
                "unknown category: {}",
                req.category
            )));
        }

        if self
            .store
            .find_one(&req.community_id, &req.user_id)
            .await?
            .is_some()
        {
            return Err(EngineError::conflict("user is already blacklisted"));
        }

        let expires_at = OffsetDateTime::now_utc() + self.confirm_ttl;
        let token = self
            .proposals
            .insert(Proposal {
                community_id: req.community_id,
                user_id: req.user_id,
                invoker_id: req.invoker_id,
                reason: reason.to_owned(),
                category: req.category,
                requested_by: req.requested_by,
                duration,
                evidence: req.evidence,
                expires_at,
            })
            .await;

        Ok(ProposalTicket { token, expires_at })
    }

    /// Step two: the original invoker confirms within the window, handing
    /// over the snapshot the gateway captured just before stripping the
    /// member. Preconditions are re-checked under the lock because the
    /// proposal may have gone stale.
    pub async fn confirm_add(
        &self,
        token: Uuid,
        invoker_id: &str,
        snapshot: MemberSnapshot,
    ) -> EngineResult<(BlacklistEntry, Vec<SideEffect>)> {
        let proposal = self.proposals.claim(token, invoker_id).await?;

        let _guard = self
            .locks
            .acquire(&proposal.community_id, &proposal.user_id)
            .await;

        if !self
            .categories
            .exists(&proposal.community_id, &proposal.category)
            .await?
        {
            return Err(EngineError::validation(format!(
                "unknown category: {}",
                proposal.category
            )));
        }
        if self
            .store
            .find_one(&proposal.community_id, &proposal.user_id)
            .await?
            .is_some()
        {
            return Err(EngineError::conflict("user is already blacklisted"));
        }

        // Clock may have moved since propose, so re-check the addition.
        let expires_at = match proposal.duration {
            None => None,
            Some(d) => Some(
                OffsetDateTime::now_utc()
                    .checked_add(d)
                    .ok_or_else(|| EngineError::validation("duration too large"))?,
            ),
        };

        let entry = self
            .store
            .create(NewEntry {
                community_id: proposal.community_id.clone(),
                user_id: proposal.user_id.clone(),
                reason: proposal.reason.clone(),
                category: proposal.category.clone(),
                requested_by: proposal.requested_by.clone(),
                accepted_by: invoker_id.to_owned(),
                roles: snapshot.roles,
                nickname: snapshot.nickname,
                evidence: proposal.evidence.clone(),
                expires_at,
            })
            .await?;

        let effects = self.add_effects(&entry).await?;
        Ok((entry, effects))
    }

    /// Explicit cancellation; equivalent to letting the window lapse.
    pub async fn cancel_add(&self, token: Uuid, invoker_id: &str) -> EngineResult<()> {
        self.proposals.claim(token, invoker_id).await?;
        Ok(())
    }

    /// Escalation entry point: bypasses the confirmation gate (no human
    /// to confirm) and records the system identity. There is no gateway
    /// snapshot to store, so an empty one is recorded.
    pub async fn system_add(
        &self,
        community_id: &str,
        user_id: &str,
        reason: String,
        category: String,
    ) -> EngineResult<(BlacklistEntry, Vec<SideEffect>)> {
        let _guard = self.locks.acquire(community_id, user_id).await;

        if self.store.find_one(community_id, user_id).await?.is_some() {
            return Err(EngineError::conflict("user is already blacklisted"));
        }

        let entry = self
            .store
            .create(NewEntry {
                community_id: community_id.to_owned(),
                user_id: user_id.to_owned(),
                reason,
                category,
                requested_by: None,
                accepted_by: SYSTEM_ACTOR.to_owned(),
                roles: Vec::new(),
                nickname: None,
                evidence: None,
                expires_at: None,
            })
            .await?;

        let effects = self.add_effects(&entry).await?;
        Ok((entry, effects))
    }

    /// Single removal path shared by manual removal, appeal acceptance,
    /// and expiry. Returns `None` when the entry was already gone, which
    /// concurrent sweeps and appeal acceptance treat as a no-op.
    pub async fn remove(
        &self,
        community_id: &str,
        user_id: &str,
        moderator_id: &str,
        reason: &str,
        kind: RemovalKind,
    ) -> EngineResult<Option<(BlacklistEntry, Vec<SideEffect>)>> {
        if reason.trim().is_empty() {
            return Err(EngineError::validation("reason is required"));
        }

        let _guard = self.locks.acquire(community_id, user_id).await;

        let Some(entry) = self
            .store
            .delete(community_id, user_id, moderator_id, reason)
            .await?
        else {
            return Ok(None);
        };

        let mut effects = vec![
            SideEffect::RestoreRoles {
                user_id: user_id.to_owned(),
                roles: entry.roles.clone(),
            },
            SideEffect::RestoreNickname {
                user_id: user_id.to_owned(),
                nickname: entry.nickname.clone(),
            },
            SideEffect::DirectMessage {
                user_id: user_id.to_owned(),
                body: match kind {
                    RemovalKind::Manual => {
                        format!("Your blacklist has been lifted.\nReason: {reason}")
                    }
                    RemovalKind::AppealAccepted { .. } => {
                        format!("Your blacklist appeal has been accepted.\nReason: {reason}")
                    }
                    RemovalKind::Expired => {
                        "Your temporary blacklist has expired and been automatically lifted."
                            .to_owned()
                    }
                },
            },
        ];
        if let Some(channel_id) = self.log_channel(community_id).await? {
            effects.push(SideEffect::LogEvent {
                community_id: community_id.to_owned(),
                channel_id,
                body: match kind {
                    RemovalKind::Manual => format!(
                        "Blacklist removed for {user_id} by {moderator_id}: {reason} \
                         (original reason: {})",
                        entry.reason
                    ),
                    RemovalKind::AppealAccepted { appeal_id } => format!(
                        "Blacklist removed for {user_id} via appeal #{appeal_id}: {reason}"
                    ),
                    RemovalKind::Expired => format!(
                        "Temporary blacklist expired for {user_id} (original reason: {})",
                        entry.reason
                    ),
                },
            });
        }

        Ok(Some((entry, effects)))
    }

    /// Edit reason and/or category in place. Roles, nickname, and expiry
    /// are never editable.
    pub async fn edit(
        &self,
        community_id: &str,
        user_id: &str,
        moderator_id: &str,
        reason: Option<&str>,
        category: Option<&str>,
    ) -> EngineResult<(BlacklistEntry, Vec<SideEffect>)> {
        if reason.is_none() && category.is_none() {
            return Err(EngineError::validation(
                "supply a new reason, a new category, or both",
            ));
        }
        if let Some(r) = reason {
            if r.trim().is_empty() {
                return Err(EngineError::validation("reason must not be empty"));
            }
        }
        if let Some(c) = category {
            // Same policy as add: edits may only target a category that
            // currently exists.
            if !self.categories.exists(community_id, c).await? {
                return Err(EngineError::validation(format!("unknown category: {c}")));
            }
        }

        let _guard = self.locks.acquire(community_id, user_id).await;

        let entry = self
            .store
            .update(community_id, user_id, moderator_id, reason, category)
            .await?;

        let mut effects = Vec::new();
        if let Some(channel_id) = self.log_channel(community_id).await? {
            effects.push(SideEffect::LogEvent {
                community_id: community_id.to_owned(),
                channel_id,
                body: format!(
                    "Blacklist entry {} edited by {moderator_id}: reason \"{}\", category {}",
                    entry.case_id, entry.reason, entry.category
                ),
            });
        }

        Ok((entry, effects))
    }

    async fn add_effects(&self, entry: &BlacklistEntry) -> EngineResult<Vec<SideEffect>> {
        let mut dm = format!(
            "You have been blacklisted.\nReason: {}\nCategory: {}",
            entry.reason, entry.category
        );
        if let Some(expires_at) = entry.expires_at {
            dm.push_str(&format!("\nExpires: {}", format_ts(expires_at)));
        }

        let summary = format!(
            "Case {}: {} blacklisted by {} ({}){}",
            entry.case_id,
            entry.user_id,
            entry.accepted_by,
            entry.category,
            entry
                .expires_at
                .map(|ts| format!(", expires {}", format_ts(ts)))
                .unwrap_or_default()
        );

        let mut effects = vec![
            SideEffect::ApplySentinelRole {
                user_id: entry.user_id.clone(),
            },
            SideEffect::RenameWithPrefix {
                user_id: entry.user_id.clone(),
                prefix: SENTINEL_PREFIX.to_owned(),
            },
            SideEffect::DirectMessage {
                user_id: entry.user_id.clone(),
                body: dm,
            },
            SideEffect::PostSummary {
                community_id: entry.community_id.clone(),
                body: summary.clone(),
            },
        ];
        if let Some(channel_id) = self.log_channel(&entry.community_id).await? {
            effects.push(SideEffect::LogEvent {
                community_id: entry.community_id.clone(),
                channel_id,
                body: summary,
            });
        }
        Ok(effects)
    }

    async fn log_channel(&self, community_id: &str) -> EngineResult<Option<String>> {
        Ok(self.settings.get(community_id).await?.log_channel)
    }
}

/// Accepts `<n>d`, `<n>h`, or `<n>m` with a positive n; anything else is
/// rejected.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    if !raw.is_ascii() {
        return None;
    }
    let (digits, unit) = raw.split_at(raw.len().checked_sub(1)?);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value: i64 = digits.parse().ok()?;
    if value <= 0 {
        return None;
    }
    let seconds = match unit {
        "d" => value.checked_mul(86_400)?,
        "h" => value.checked_mul(3_600)?,
        "m" => value.checked_mul(60)?,
        _ => return None,
    };
    Some(Duration::seconds(seconds))
}

pub(crate) fn format_ts(ts: OffsetDateTime) -> String {
    ts.format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| ts.to_string())
}
