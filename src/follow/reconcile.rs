//! Recompute follow counters from the edge set.
//!
//! Counters are a cache of edge cardinalities. Between two runs a counter
//! read may be stale.
//!
//! A pass is not atomic with concurrent follows. An edge already seen by
//! [`EdgeStore::counts`] whose counter update lands after
//! [`UserDirectory::set_counters`] is counted twice; an edge written after
//! `counts` whose counter update lands before `set_counters` is lost. Either
//! way the counter is one off until the next pass rewrites it.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{Result, ServerError};
use crate::follow::EdgeStore;
use crate::id::ObjectId;
use crate::user::UserDirectory;

const BATCH_SIZE: u64 = 100;

/// Outcome of a full pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    pub scanned: u64,
    pub repaired: u64,
}

#[derive(Clone)]
pub struct Reconciler {
    users: Arc<dyn UserDirectory>,
    edges: Arc<dyn EdgeStore>,
}

impl Reconciler {
    pub fn new(users: Arc<dyn UserDirectory>, edges: Arc<dyn EdgeStore>) -> Self {
        Self { users, edges }
    }

    /// Rewrite both counters of `id` if they differ from the edge set.
    /// Returns `true` when a repair was written.
    pub async fn reconcile_user(&self, id: &ObjectId) -> Result<bool> {
        let Some(user) = self.users.get_by_id(id).await? else {
            return Ok(false);
        };

        let (followers, following) = self.edges.counts(id).await?;
        let (followers, following) = (to_counter(followers)?, to_counter(following)?);

        if user.followers_count == followers && user.following_count == following {
            return Ok(false);
        }

        tracing::warn!(
            user_id = %id,
            stored_followers = user.followers_count,
            stored_following = user.following_count,
            followers,
            following,
            "follow counters drifted, repairing"
        );
        self.users.set_counters(id, followers, following).await?;
        metrics::counter!("follow_counter_repairs_total").increment(1);

        Ok(true)
    }

    /// Walk every user once.
    pub async fn run(&self) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();
        let mut skip = 0;

        loop {
            let ids = self.users.ids(skip, BATCH_SIZE).await?;
            for id in &ids {
                report.scanned += 1;
                if self.reconcile_user(id).await? {
                    report.repaired += 1;
                }
            }

            if (ids.len() as u64) < BATCH_SIZE {
                break;
            }
            skip += BATCH_SIZE;
        }

        tracing::info!(scanned = report.scanned, repaired = report.repaired, "follow counters reconciled");
        Ok(report)
    }

    /// Run forever, one pass every `interval`.
    pub async fn every(self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        // first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if let Err(err) = self.run().await {
                tracing::error!(error = %err, "follow counter reconciliation failed");
            }
        }
    }
}

fn to_counter(count: u64) -> Result<i64> {
    i64::try_from(count).map_err(|err| ServerError::internal("edge count overflow", err))
}
