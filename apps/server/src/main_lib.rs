use std::sync::Arc;

use anyhow::Context;

use pocketplan_core::plans::{PlanFamilyConfig, PlanSessionService, PlanSessionServiceTrait};
use pocketplan_device_link::{LinkDiscovery, LinkDiscoveryConfig};
use pocketplan_storage_sqlite::Database;

use crate::config::ServerConfig;

/// Shared state handed to every handler.
pub struct AppState {
    pub main_plans: Arc<dyn PlanSessionServiceTrait>,
    pub review_plans: Arc<dyn PlanSessionServiceTrait>,
    pub link_discovery: Arc<LinkDiscovery>,
    pub config: ServerConfig,
}

impl AppState {
    pub fn secure_cookies(&self) -> bool {
        self.config.secure_cookies()
    }

    /// Every family service, for background jobs that sweep all of them.
    pub fn plan_services(&self) -> Vec<Arc<dyn PlanSessionServiceTrait>> {
        vec![self.main_plans.clone(), self.review_plans.clone()]
    }
}

fn plan_service(
    database: &Database,
    family: PlanFamilyConfig,
) -> anyhow::Result<Arc<dyn PlanSessionServiceTrait>> {
    let table = family.table_name;
    let repository = database
        .plan_repository(family)
        .with_context(|| format!("failed to open plan repository for {}", table))?;
    Ok(Arc::new(PlanSessionService::new(Arc::new(repository))))
}

/// Wires services over an already opened database.
pub fn build_state(config: ServerConfig, database: &Database) -> anyhow::Result<Arc<AppState>> {
    let link_discovery = LinkDiscovery::new(LinkDiscoveryConfig {
        public_url: config.public_url.clone(),
        production: config.environment.is_production(),
        port: config.listen_addr.port(),
        ..LinkDiscoveryConfig::default()
    })
    .context("failed to build link discovery client")?;

    Ok(Arc::new(AppState {
        main_plans: plan_service(database, PlanFamilyConfig::main())?,
        review_plans: plan_service(database, PlanFamilyConfig::review())?,
        link_discovery: Arc::new(link_discovery),
        config,
    }))
}
