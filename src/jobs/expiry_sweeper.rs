use std::time::Duration;

use anyhow::Result;
use time::OffsetDateTime;
use tracing::{error, info};

use crate::app::blacklist::BlacklistService;
use crate::app::lifecycle::{LifecycleEngine, RemovalKind, SYSTEM_ACTOR};
use crate::infra::db::Db;
use crate::infra::gateway::GatewaySink;

/// Background loop lifting temporary blacklists whose expiry has passed.
pub async fn run(db: Db, engine: LifecycleEngine, gateway: GatewaySink, interval_seconds: u64) {
    info!(interval_seconds, "expiry sweeper started");
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_seconds));
    loop {
        ticker.tick().await;
        match sweep_once(&db, &engine, Some(&gateway)).await {
            Ok(0) => {}
            Ok(lifted) => info!(lifted, "expiry sweep lifted blacklists"),
            Err(err) => error!(error = ?err, "expiry sweep failed"),
        }
    }
}

/// One sweep pass. A failure on one entry is logged and does not stop
/// the rest of the batch; the entry is retried on the next pass.
pub async fn sweep_once(
    db: &Db,
    engine: &LifecycleEngine,
    gateway: Option<&GatewaySink>,
) -> Result<u64> {
    let expired = BlacklistService::new(db.clone())
        .get_expired(OffsetDateTime::now_utc())
        .await?;

    let mut lifted = 0u64;
    for entry in expired {
        match engine
            .remove(
                &entry.community_id,
                &entry.user_id,
                SYSTEM_ACTOR,
                "temporary blacklist expired",
                RemovalKind::Expired,
            )
            .await
        {
            Ok(Some((removed, effects))) => {
                lifted += 1;
                info!(
                    case_id = %removed.case_id,
                    community_id = %removed.community_id,
                    user_id = %removed.user_id,
                    "expired blacklist lifted"
                );
                if let Some(gateway) = gateway {
                    gateway.deliver(&removed.community_id, &effects).await;
                }
            }
            // Removed concurrently between the query and the lock.
            Ok(None) => {}
            Err(err) => {
                error!(
                    error = ?err,
                    case_id = %entry.case_id,
                    user_id = %entry.user_id,
                    "failed to lift expired blacklist"
                );
            }
        }
    }

    Ok(lifted)
}
