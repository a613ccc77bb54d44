use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::plans_constants::PlanFamilyConfig;
use super::plans_model::{BootstrapOutcome, PlanDocument, PlanRecord};
use crate::errors::Result;
use crate::tokens::{SessionToken, TokenHash};

/// Persistence for one plan family.
///
/// Writes are single-row atomic replaces. There is no cross-request locking:
/// concurrent upserts for one hash resolve as last writer wins.
#[async_trait]
pub trait PlanRepositoryTrait: Send + Sync {
    fn family(&self) -> &PlanFamilyConfig;

    /// Passive existence check. Does not refresh `last_seen_at`.
    fn find(&self, token_hash: &TokenHash) -> Result<Option<PlanRecord>>;

    /// Session read: refreshes `last_seen_at` and returns the record.
    async fn touch(&self, token_hash: &TokenHash) -> Result<Option<PlanRecord>>;

    /// Create-or-replace. `retain_prev` only has an effect in families that keep
    /// a previous version; other families always clear the slot.
    async fn upsert(
        &self,
        token_hash: &TokenHash,
        plan: &PlanDocument,
        retain_prev: bool,
    ) -> Result<PlanRecord>;

    /// Deletes every record last seen strictly before `cutoff`.
    async fn delete_seen_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}

#[async_trait]
pub trait PlanSessionServiceTrait: Send + Sync {
    fn family(&self) -> &PlanFamilyConfig;

    async fn bootstrap(
        &self,
        body_token: Option<&str>,
        cookie_token: Option<&str>,
    ) -> Result<BootstrapOutcome>;

    async fn load(&self, token: &SessionToken) -> Result<PlanRecord>;

    async fn replace(&self, token: &SessionToken, plan: PlanDocument) -> Result<PlanRecord>;

    async fn merge_fields(
        &self,
        token: &SessionToken,
        fields: Map<String, Value>,
    ) -> Result<PlanRecord>;

    async fn reset(&self, token: Option<&SessionToken>) -> Result<BootstrapOutcome>;

    async fn prune_expired(&self) -> Result<usize>;
}
