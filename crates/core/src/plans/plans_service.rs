use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info};
use serde_json::{Map, Value};

use super::plans_constants::{PlanFamily, PlanFamilyConfig};
use super::plans_model::{BootstrapOutcome, PlanDocument, PlanRecord};
use super::plans_traits::{PlanRepositoryTrait, PlanSessionServiceTrait};
use super::validation::validate_plan_value;
use crate::errors::{Error, Result};
use crate::tokens::SessionToken;

/// Session protocol for one plan family: bootstrap, read, write, reset, prune.
pub struct PlanSessionService {
    repository: Arc<dyn PlanRepositoryTrait>,
}

impl PlanSessionService {
    pub fn new(repository: Arc<dyn PlanRepositoryTrait>) -> Self {
        Self { repository }
    }

    fn label(&self) -> &'static str {
        match self.repository.family().family {
            PlanFamily::Main => "main",
            PlanFamily::Review => "review",
        }
    }

    async fn mint(&self) -> Result<BootstrapOutcome> {
        let token = SessionToken::generate()?;
        let hash = token.hash();
        let record = self
            .repository
            .upsert(&hash, &PlanDocument::blank(), false)
            .await?;
        info!("[Plans:{}] Minted session {}", self.label(), hash.short());
        Ok(self.outcome(token, record, true))
    }

    fn outcome(&self, token: SessionToken, record: PlanRecord, is_new: bool) -> BootstrapOutcome {
        let prev_plan = if self.repository.family().retains_previous {
            record.prev_plan
        } else {
            None
        };
        BootstrapOutcome {
            token,
            plan: record.plan,
            prev_plan,
            updated_at: record.updated_at,
            is_new,
        }
    }

    fn existing(&self, token: &SessionToken) -> Result<PlanRecord> {
        self.repository
            .find(&token.hash())?
            .ok_or_else(|| Error::unauthorized("Unknown or expired session"))
    }
}

#[async_trait]
impl PlanSessionServiceTrait for PlanSessionService {
    fn family(&self) -> &PlanFamilyConfig {
        self.repository.family()
    }

    /// Always leaves the caller with a usable session. The body token wins over the
    /// cookie so an explicit cross-device link beats a stale local cookie;
    /// malformed tokens count as absent.
    async fn bootstrap(
        &self,
        body_token: Option<&str>,
        cookie_token: Option<&str>,
    ) -> Result<BootstrapOutcome> {
        let body = body_token.and_then(SessionToken::parse);
        let adopted = body.is_some();
        let resolved = body.or_else(|| cookie_token.and_then(SessionToken::parse));

        if let Some(token) = resolved {
            let hash = token.hash();
            if let Some(record) = self.repository.touch(&hash).await? {
                debug!(
                    "[Plans:{}] Resumed session {} (from {})",
                    self.label(),
                    hash.short(),
                    if adopted { "body" } else { "cookie" }
                );
                return Ok(self.outcome(token, record, false));
            }
            debug!(
                "[Plans:{}] Session {} not found, minting a new one",
                self.label(),
                hash.short()
            );
        }

        self.mint().await
    }

    async fn load(&self, token: &SessionToken) -> Result<PlanRecord> {
        self.repository
            .touch(&token.hash())
            .await?
            .ok_or_else(|| Error::unauthorized("Unknown or expired session"))
    }

    /// Full-document replacement; rotates the previous-version slot where the
    /// family keeps one.
    async fn replace(&self, token: &SessionToken, plan: PlanDocument) -> Result<PlanRecord> {
        let existing = self.existing(token)?;
        let record = self
            .repository
            .upsert(&existing.token_hash, &plan, true)
            .await?;
        debug!(
            "[Plans:{}] Replaced plan for {}",
            self.label(),
            record.token_hash.short()
        );
        Ok(record)
    }

    /// Shallow top-level merge. The merged document is validated as a whole and
    /// never rotates the previous-version slot.
    async fn merge_fields(
        &self,
        token: &SessionToken,
        fields: Map<String, Value>,
    ) -> Result<PlanRecord> {
        let existing = self.existing(token)?;
        let mut merged = existing.plan.as_map().clone();
        merged.extend(fields);
        let plan = validate_plan_value(Value::Object(merged))?;
        self.repository
            .upsert(&existing.token_hash, &plan, false)
            .await
    }

    async fn reset(&self, token: Option<&SessionToken>) -> Result<BootstrapOutcome> {
        if !self.family().allows_reset {
            return Err(Error::unsupported(format!(
                "reset is not available for the {} family",
                self.label()
            )));
        }

        if let Some(token) = token {
            let hash = token.hash();
            if self.repository.find(&hash)?.is_some() {
                let record = self
                    .repository
                    .upsert(&hash, &PlanDocument::blank(), false)
                    .await?;
                info!("[Plans:{}] Reset session {}", self.label(), hash.short());
                return Ok(self.outcome(token.clone(), record, false));
            }
        }

        self.mint().await
    }

    async fn prune_expired(&self) -> Result<usize> {
        let cutoff = Utc::now() - self.family().retention();
        let deleted = self.repository.delete_seen_before(cutoff).await?;
        if deleted > 0 {
            info!(
                "[Plans:{}] Pruned {} session(s) idle since before {}",
                self.label(),
                deleted,
                cutoff
            );
        }
        Ok(deleted)
    }
}
