//! Application context - dependency injection container

use std::sync::Arc;

use calsync_common::crypto::CredentialVault;
use calsync_core::{
    AuthorizationStates, BatchSync, BatchSyncConfig, CredentialResolver, IntegrationService,
    ProviderRegistry, PushService, SyncOrchestrator, SyncQueue, WebhookConfig, WebhookService,
};
use calsync_domain::{CalSyncError, Config, Result};
use calsync_infra::scheduling::SchedulerJobs;
use calsync_infra::{
    DbManager, DefaultProviderRegistry, KeyManager, SqliteEventRepository,
    SqliteIntegrationRepository, SqliteLedgerRepository, SyncQueueWorker, SyncQueueWorkerConfig,
    SyncScheduler, SyncSchedulerConfig,
};
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::utils::health::{ComponentHealth, HealthStatus};

/// Holds every service the HTTP handlers and background jobs use.
pub struct AppContext {
    pub config: Config,
    pub db: Arc<DbManager>,
    pub orchestrator: Arc<SyncOrchestrator>,
    pub batch: Arc<BatchSync>,
    pub webhooks: Arc<WebhookService>,
    pub integrations: Arc<IntegrationService>,
    pub push: Arc<PushService>,
    pub authorization_states: Arc<AuthorizationStates>,

    queue_worker: Mutex<SyncQueueWorker>,
    scheduler: Mutex<SyncScheduler>,
}

impl AppContext {
    /// Open the database, resolve the vault secret and build the HTTP
    /// adapters from `config`.
    pub fn from_config(config: Config) -> Result<Self> {
        let vault = KeyManager::default().build_vault(&config.vault)?;

        let db = DbManager::new(&config.database.path, config.database.pool_size)?;
        db.run_migrations()?;

        let providers = DefaultProviderRegistry::from_config(&config.providers)?;
        Ok(Self::with_services(config, Arc::new(db), Arc::new(vault), Arc::new(providers)))
    }

    /// Wire the services over an existing database, vault and provider set.
    pub fn with_services(
        config: Config,
        db: Arc<DbManager>,
        vault: Arc<CredentialVault>,
        providers: Arc<dyn ProviderRegistry>,
    ) -> Self {
        let integration_repo = Arc::new(SqliteIntegrationRepository::new(Arc::clone(&db)));
        let event_repo = Arc::new(SqliteEventRepository::new(Arc::clone(&db)));
        let ledger_repo = Arc::new(SqliteLedgerRepository::new(Arc::clone(&db)));

        let credentials = Arc::new(CredentialResolver::new(
            Arc::clone(&vault),
            integration_repo.clone(),
            config.sync.token_refresh_skew(),
        ));

        let orchestrator = Arc::new(SyncOrchestrator::new(
            integration_repo.clone(),
            event_repo.clone(),
            ledger_repo.clone(),
            Arc::clone(&providers),
            Arc::clone(&credentials),
        ));

        let batch = Arc::new(BatchSync::new(
            Arc::clone(&orchestrator),
            BatchSyncConfig {
                max_concurrent_passes: config.sync.max_concurrent_passes,
                pass_timeout: config.sync.pass_timeout(),
            },
        ));

        let queue_worker = SyncQueueWorker::new(
            Arc::clone(&orchestrator),
            SyncQueueWorkerConfig::from_sync_config(&config.sync),
        );
        let queue: Arc<dyn SyncQueue> = Arc::new(queue_worker.handle());

        let webhooks = Arc::new(WebhookService::new(
            integration_repo.clone(),
            Arc::clone(&providers),
            Arc::clone(&credentials),
            queue,
            WebhookConfig {
                callback_url: config.server.webhook_callback_url(),
                ttl: config.sync.webhook_ttl(),
                renew_before: config.sync.webhook_renew_before(),
            },
        ));

        let authorization_states =
            Arc::new(AuthorizationStates::new(config.sync.authorization_state_ttl()));
        let integrations = Arc::new(IntegrationService::new(
            integration_repo.clone(),
            Arc::clone(&vault),
            Arc::clone(&authorization_states),
        ));

        let push = Arc::new(PushService::new(
            integration_repo,
            event_repo,
            ledger_repo,
            providers,
            credentials,
        ));

        let scheduler = SyncScheduler::new(
            SyncSchedulerConfig::from_sync_config(&config.sync),
            SchedulerJobs {
                batch: Arc::clone(&batch),
                webhooks: Arc::clone(&webhooks),
                authorization_states: Arc::clone(&authorization_states),
            },
        );

        Self {
            config,
            db,
            orchestrator,
            batch,
            webhooks,
            integrations,
            push,
            authorization_states,
            queue_worker: Mutex::new(queue_worker),
            scheduler: Mutex::new(scheduler),
        }
    }

    /// Start the queue worker, then the cron scheduler.
    pub async fn start_background(&self) -> Result<()> {
        self.queue_worker.lock().await.start().map_err(CalSyncError::from)?;
        if let Err(err) = self.scheduler.lock().await.start().await {
            error!(error = %err, "failed to start sync scheduler");
            return Err(err.into());
        }
        info!("background services started");
        Ok(())
    }

    /// Stop the scheduler first so no new batch starts, then drain the
    /// queue worker. Failures are logged; shutdown always continues.
    pub async fn shutdown(&self) {
        {
            let mut scheduler = self.scheduler.lock().await;
            if scheduler.is_running() {
                if let Err(err) = scheduler.stop().await {
                    error!(error = %err, "sync scheduler did not stop cleanly");
                }
            }
        }

        let mut worker = self.queue_worker.lock().await;
        if worker.is_running() {
            if let Err(err) = worker.stop().await {
                error!(error = %err, "sync queue worker did not stop cleanly");
            }
        }
        info!("background services stopped");
    }

    /// Check the database and report the background components.
    pub async fn health_check(&self) -> HealthStatus {
        let db = Arc::clone(&self.db);
        let database = match tokio::task::spawn_blocking(move || db.health_check()).await {
            Ok(Ok(())) => ComponentHealth::healthy("database"),
            Ok(Err(err)) => ComponentHealth::unhealthy("database", err.to_string()),
            Err(err) => ComponentHealth::unhealthy("database", err.to_string()),
        }
        .required();

        let worker = if self.queue_worker.lock().await.is_running() {
            ComponentHealth::healthy("sync_queue")
        } else {
            ComponentHealth::unhealthy("sync_queue", "not running")
        };
        let scheduler = if self.scheduler.lock().await.is_running() {
            ComponentHealth::healthy("scheduler")
        } else {
            ComponentHealth::unhealthy("scheduler", "not running")
        };

        HealthStatus::new(Utc::now())
            .add_component(database)
            .add_component(worker)
            .add_component(scheduler)
            .evaluate()
    }
}
