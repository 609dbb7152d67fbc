use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-(community, user) exclusive locks. The store does not serialize
/// check-then-mutate sequences itself, so every such sequence (confirmed
/// add, remove, edit, escalation, sweep) takes this lock before the
/// precondition read and holds it until the mutation commits. Different
/// keys proceed independently.
#[derive(Clone, Default)]
pub struct UserLocks {
    inner: Arc<Mutex<HashMap<(String, String), Arc<Mutex<()>>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, community_id: &str, user_id: &str) -> OwnedMutexGuard<()> {
        let slot = {
            let mut map = self.inner.lock().await;
            map.entry((community_id.to_owned(), user_id.to_owned()))
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        slot.lock_owned().await
    }
}
