//! Scoped change subscriptions over filtered table reads.
//!
//! Consumers use these purely as a refresh hint: a revision bump means
//! "re-derive now", it never carries the data itself. The subscription is
//! a handle; dropping it tears the background task down deterministically.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use reqwest::Method;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::supabase::SupabaseClient;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

pub struct TableWatcher {
    supabase: Arc<SupabaseClient>,
    poll_interval: Duration,
}

impl TableWatcher {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self {
            supabase,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(supabase: Arc<SupabaseClient>, poll_interval: Duration) -> Self {
        Self {
            supabase,
            poll_interval,
        }
    }

    /// Subscribe to changes on `table` rows matching an equality `filter`
    /// (e.g. `doctor_id=eq.<id>`). The returned handle owns the polling
    /// task; it is aborted when the handle is dropped.
    pub fn subscribe(&self, table: &str, filter: &str, auth_token: &str) -> ChangeSubscription {
        let (tx, rx) = watch::channel(0u64);
        let supabase = Arc::clone(&self.supabase);
        let path = format!("/rest/v1/{}?{}", table, filter);
        let token = auth_token.to_string();
        let interval = self.poll_interval;

        let task = tokio::spawn(async move {
            let mut last_fingerprint: Option<u64> = None;
            let mut revision = 0u64;
            let mut ticker = tokio::time::interval(interval);

            loop {
                ticker.tick().await;

                match snapshot_fingerprint(&supabase, &path, &token).await {
                    Ok(fingerprint) => {
                        if last_fingerprint.is_some() && last_fingerprint != Some(fingerprint) {
                            revision += 1;
                            debug!("Change detected on {} (revision {})", path, revision);
                            if tx.send(revision).is_err() {
                                break;
                            }
                        }
                        last_fingerprint = Some(fingerprint);
                    }
                    Err(e) => {
                        // A refresh hint is best-effort; keep polling.
                        warn!("Change poll failed for {}: {}", path, e);
                    }
                }
            }
        });

        ChangeSubscription { changes: rx, task }
    }
}

async fn snapshot_fingerprint(
    supabase: &SupabaseClient,
    path: &str,
    auth_token: &str,
) -> Result<u64> {
    let rows: Vec<Value> = supabase
        .request(Method::GET, path, Some(auth_token), None)
        .await?;

    let mut hasher = DefaultHasher::new();
    for row in &rows {
        row.to_string().hash(&mut hasher);
    }
    Ok(hasher.finish())
}

/// Handle to a live change subscription.
pub struct ChangeSubscription {
    changes: watch::Receiver<u64>,
    task: JoinHandle<()>,
}

impl ChangeSubscription {
    /// Receiver of the revision counter; changed values mean "re-derive".
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.changes.clone()
    }

    /// Wait until the watched rows change, or the timeout elapses.
    /// Returns true when a change was observed.
    pub async fn changed_within(&mut self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.changes.changed())
            .await
            .map(|r| r.is_ok())
            .unwrap_or(false)
    }
}

impl Drop for ChangeSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
