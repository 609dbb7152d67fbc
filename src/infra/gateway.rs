use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::effect::SideEffect;

/// Delivery channel for side effects that originate in background work
/// (the expiry sweeper has no HTTP caller to hand its intents to).
/// Interactive commands return their intents in the response instead.
///
/// Delivery is best-effort: a failed post is logged and swallowed, never
/// surfaced as an error, because the store mutation it describes has
/// already committed.
#[derive(Clone)]
pub struct GatewaySink {
    client: reqwest::Client,
    webhook_url: Option<String>,
}

#[derive(Serialize)]
struct EffectBatch<'a> {
    community_id: &'a str,
    effects: &'a [SideEffect],
}

impl GatewaySink {
    pub fn new(webhook_url: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            webhook_url,
        })
    }

    pub async fn deliver(&self, community_id: &str, effects: &[SideEffect]) {
        if effects.is_empty() {
            return;
        }
        let Some(url) = &self.webhook_url else {
            info!(
                community_id = %community_id,
                count = effects.len(),
                "no gateway webhook configured, dropping background effects"
            );
            return;
        };

        let batch = EffectBatch {
            community_id,
            effects,
        };
        match self.client.post(url).json(&batch).send().await {
            Ok(resp) if resp.status().is_success() => {}
            Ok(resp) => {
                warn!(status = %resp.status(), "gateway webhook rejected effect batch");
            }
            Err(err) => {
                warn!(error = ?err, "failed to deliver effect batch to gateway");
            }
        }
    }
}
