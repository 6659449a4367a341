//! Service wiring for the API process.

use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;

use pengadaan_auth::{AccountStore, InMemoryAccountStore};
use pengadaan_infra::{PostgresPermissionStore, ensure_schema};
use pengadaan_permissions::{
    AuthorizationGate, InMemoryPermissionStore, PermissionStore, PermissionWorkflow,
};
use pengadaan_records::{InMemoryProcurementStore, ProcurementService};

use crate::AppConfig;

/// Everything the route handlers need, wired once at startup.
pub struct AppServices {
    pub accounts: Arc<dyn AccountStore>,
    pub procurements: ProcurementService,
    pub workflow: PermissionWorkflow,
}

/// Build services according to configuration.
///
/// Accounts and records are in-memory; the permission ledger switches to
/// Postgres when a database URL is configured.
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let accounts: Arc<InMemoryAccountStore> = Arc::new(InMemoryAccountStore::new());
    let records: Arc<InMemoryProcurementStore> = Arc::new(InMemoryProcurementStore::new());

    let ledger: Arc<dyn PermissionStore> = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(8)
                .connect(url)
                .await?;
            ensure_schema(&pool).await?;
            tracing::info!("permission ledger backed by postgres");
            Arc::new(PostgresPermissionStore::new(pool))
        }
        None => Arc::new(InMemoryPermissionStore::new()),
    };

    let gate = AuthorizationGate::new(ledger.clone());
    let workflow = PermissionWorkflow::new(accounts.clone(), records.clone(), ledger);
    let procurements = ProcurementService::new(records, gate);

    Ok(AppServices {
        accounts,
        procurements,
        workflow,
    })
}

/// Run the expiry sweep on an interval until the process exits.
///
/// Failures are logged and the loop keeps going; nothing else in the system
/// actively demotes stale grants, so this task must survive bad ticks.
pub fn spawn_expiry_sweeper(services: Arc<AppServices>, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match services.workflow.cleanup_expired().await {
                Ok(0) => {}
                Ok(count) => tracing::info!(count, "expiry sweep demoted stale grants"),
                Err(err) => tracing::warn!(error = %err, "expiry sweep failed"),
            }
        }
    });
}
