//! Rules a device follows after bootstrapping, to merge the server document with
//! its local cache. Whole-document last-writer-wins; no field-level merging.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::plans_model::{BootstrapOutcome, PlanDocument};

/// What a device holds locally between sessions.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalPlanCache {
    /// Token the cache was last synced under, if any.
    pub token: Option<String>,
    pub plan: PlanDocument,
    /// Server `updated_at` the local copy was based on.
    pub base_updated_at: Option<DateTime<Utc>>,
    /// Local edits not yet acknowledged by the server.
    pub dirty: bool,
}

/// The bootstrap result as seen by the device.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerPlanSnapshot {
    pub token: String,
    pub plan: PlanDocument,
    pub updated_at: DateTime<Utc>,
}

impl From<&BootstrapOutcome> for ServerPlanSnapshot {
    fn from(outcome: &BootstrapOutcome) -> Self {
        Self {
            token: outcome.token.as_str().to_string(),
            plan: outcome.plan.clone(),
            updated_at: outcome.updated_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileAction {
    /// Replace the local cache with the server document.
    AdoptServer,
    /// Upload the local document as a full replacement.
    PushLocal,
    /// Nothing to do.
    InSync,
    /// Local edits lost the race; adopt the server document.
    ServerWins,
}

pub fn reconcile(local: Option<&LocalPlanCache>, server: &ServerPlanSnapshot) -> ReconcileAction {
    let Some(local) = local else {
        return ReconcileAction::AdoptServer;
    };

    if local.token.as_deref() != Some(server.token.as_str()) {
        // A fresh blank session replacing an expired one gets reseeded; a linked
        // token that already carries data is adopted.
        if server.plan.is_blank() && !local.plan.is_blank() {
            return ReconcileAction::PushLocal;
        }
        return ReconcileAction::AdoptServer;
    }

    if !local.dirty {
        if local.plan == server.plan {
            return ReconcileAction::InSync;
        }
        return ReconcileAction::AdoptServer;
    }

    if local.base_updated_at == Some(server.updated_at) {
        ReconcileAction::PushLocal
    } else {
        ReconcileAction::ServerWins
    }
}
