pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;
pub mod jobs;

use crate::app::lifecycle::ProposalStore;
use crate::app::locks::UserLocks;
use crate::infra::{db::Db, gateway::GatewaySink};

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub gateway: GatewaySink,
    pub locks: UserLocks,
    pub proposals: ProposalStore,
    pub gateway_token: Option<String>,
    pub confirm_ttl_seconds: u64,
    pub appeal_cooldown_days: i64,
    pub page_size: i64,
}
