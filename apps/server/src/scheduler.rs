//! Background retention sweeps, one loop per plan family.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use pocketplan_core::plans::PlanSessionServiceTrait;

/// One sweep. Failures are logged and reported as zero deletions; the next tick
/// retries.
pub async fn prune_once(service: &dyn PlanSessionServiceTrait) -> usize {
    let table = service.family().table_name;
    match service.prune_expired().await {
        Ok(deleted) => {
            tracing::debug!("[Scheduler] Sweep of {} removed {} session(s)", table, deleted);
            deleted
        }
        Err(e) => {
            tracing::warn!("[Scheduler] Sweep of {} failed: {}", table, e);
            0
        }
    }
}

/// Sweeps immediately, then every `interval`, until the task is aborted.
pub fn spawn_retention_pruner(
    service: Arc<dyn PlanSessionServiceTrait>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            prune_once(service.as_ref()).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pocketplan_core::plans::{PlanFamilyConfig, PlanSessionService};
    use pocketplan_storage_sqlite::Database;
    use tempfile::TempDir;

    fn service(db: &Database, family: PlanFamilyConfig) -> Arc<dyn PlanSessionServiceTrait> {
        let repo = db.plan_repository(family).expect("repo");
        Arc::new(PlanSessionService::new(Arc::new(repo)))
    }

    #[tokio::test]
    async fn sweep_keeps_live_sessions() {
        let dir = TempDir::new().expect("tempdir");
        let db = Database::open(&dir.path().to_string_lossy()).expect("db");
        let review = service(&db, PlanFamilyConfig::review());

        let fresh = review.bootstrap(None, None).await.expect("bootstrap");
        assert_eq!(prune_once(review.as_ref()).await, 0);
        assert!(review.load(&fresh.token).await.is_ok());
    }

    #[tokio::test]
    async fn pruner_task_runs_until_aborted() {
        let dir = TempDir::new().expect("tempdir");
        let db = Database::open(&dir.path().to_string_lossy()).expect("db");
        let handle = spawn_retention_pruner(
            service(&db, PlanFamilyConfig::main()),
            Duration::from_millis(20),
        );

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!handle.is_finished());
        handle.abort();
        assert!(handle.await.expect_err("aborted").is_cancelled());
    }
}
