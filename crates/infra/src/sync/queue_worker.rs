//! Queue worker running sync passes requested by webhooks and the API.
//!
//! Requests travel over a bounded channel. `enqueue` never waits: a full or
//! closed queue is reported to the caller immediately. Every request runs in
//! its own task bounded by the pass timeout, and its outcome is logged
//! rather than returned.

use std::sync::Arc;
use std::time::Duration;

use calsync_core::{SyncOrchestrator, SyncQueue};
use calsync_domain::{CalSyncError, Result, SyncConfig, SyncOptions, SyncRequest, SyncRun};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::scheduling::{SchedulerError, SchedulerResult};

/// Configuration for the queue worker.
#[derive(Debug, Clone)]
pub struct SyncQueueWorkerConfig {
    /// Requests buffered before `enqueue` starts failing
    pub capacity: usize,
    /// Timeout applied to each pass
    pub pass_timeout: Duration,
    /// How long `stop` lets running passes finish before aborting them
    pub drain_timeout: Duration,
    /// Join timeout when stopping
    pub join_timeout: Duration,
}

impl Default for SyncQueueWorkerConfig {
    fn default() -> Self {
        Self::from_sync_config(&SyncConfig::default())
    }
}

impl SyncQueueWorkerConfig {
    pub fn from_sync_config(sync: &SyncConfig) -> Self {
        Self {
            capacity: sync.queue_capacity.max(1),
            pass_timeout: sync.pass_timeout(),
            drain_timeout: Duration::from_secs(10),
            join_timeout: Duration::from_secs(15),
        }
    }
}

/// Cloneable sending side of the queue.
#[derive(Debug, Clone)]
pub struct SyncQueueHandle {
    sender: mpsc::Sender<SyncRequest>,
}

impl SyncQueue for SyncQueueHandle {
    fn enqueue(&self, request: SyncRequest) -> Result<()> {
        self.sender.try_send(request).map_err(|err| match err {
            TrySendError::Full(request) => CalSyncError::Internal(format!(
                "sync queue is full; dropped request for integration {}",
                request.integration_id
            )),
            TrySendError::Closed(request) => CalSyncError::Internal(format!(
                "sync queue is closed; dropped request for integration {}",
                request.integration_id
            )),
        })
    }
}

/// Consumer side of the queue with explicit lifecycle management.
pub struct SyncQueueWorker {
    orchestrator: Arc<SyncOrchestrator>,
    config: SyncQueueWorkerConfig,
    handle: SyncQueueHandle,
    receiver: Option<mpsc::Receiver<SyncRequest>>,
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl SyncQueueWorker {
    pub fn new(orchestrator: Arc<SyncOrchestrator>, config: SyncQueueWorkerConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.capacity.max(1));
        Self {
            orchestrator,
            config,
            handle: SyncQueueHandle { sender },
            receiver: Some(receiver),
            cancellation: CancellationToken::new(),
            task_handle: None,
        }
    }

    /// Sending side to hand to webhook and API code.
    pub fn handle(&self) -> SyncQueueHandle {
        self.handle.clone()
    }

    /// Start consuming the queue.
    ///
    /// The receiver is consumed by the first start, so a stopped worker
    /// cannot be started again.
    #[instrument(skip(self))]
    pub fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }
        let Some(receiver) = self.receiver.take() else {
            return Err(SchedulerError::AlreadyRunning);
        };

        self.cancellation = CancellationToken::new();
        let orchestrator = Arc::clone(&self.orchestrator);
        let config = self.config.clone();
        let cancel = self.cancellation.clone();

        self.task_handle = Some(tokio::spawn(async move {
            Self::process_loop(orchestrator, receiver, config, cancel).await;
        }));

        info!(capacity = self.config.capacity, "sync queue worker started");
        Ok(())
    }

    /// Stop consuming, let running passes drain and wait for the loop.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        let Some(handle) = self.task_handle.take() else {
            return Err(SchedulerError::NotRunning);
        };

        self.cancellation.cancel();

        let join_timeout = self.config.join_timeout;
        tokio::time::timeout(join_timeout, handle)
            .await
            .map_err(|source| SchedulerError::Timeout { duration: join_timeout, source })??;

        info!("sync queue worker stopped");
        Ok(())
    }

    /// Returns true while the consumer loop is alive.
    pub fn is_running(&self) -> bool {
        self.task_handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    async fn process_loop(
        orchestrator: Arc<SyncOrchestrator>,
        mut receiver: mpsc::Receiver<SyncRequest>,
        config: SyncQueueWorkerConfig,
        cancel: CancellationToken,
    ) {
        let mut passes = JoinSet::new();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("sync queue worker cancelled");
                    break;
                }
                Some(joined) = passes.join_next(), if !passes.is_empty() => {
                    if let Err(err) = joined {
                        error!(error = %err, "sync pass task panicked");
                    }
                }
                request = receiver.recv() => {
                    let Some(request) = request else {
                        debug!("sync queue closed");
                        break;
                    };
                    let orchestrator = Arc::clone(&orchestrator);
                    let pass_timeout = config.pass_timeout;
                    passes.spawn(async move {
                        Self::run_request(&orchestrator, request, pass_timeout).await;
                    });
                }
            }
        }

        receiver.close();
        let drain_timeout = config.drain_timeout;
        let drained = tokio::time::timeout(drain_timeout, async {
            while passes.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(
                running = passes.len(),
                timeout_secs = drain_timeout.as_secs(),
                "aborting sync passes still running at shutdown"
            );
            passes.shutdown().await;
        }
    }

    async fn run_request(
        orchestrator: &SyncOrchestrator,
        request: SyncRequest,
        pass_timeout: Duration,
    ) {
        let SyncRequest { integration_id, trigger } = request;
        let result = orchestrator
            .run_sync_bounded(&integration_id, SyncOptions::default(), pass_timeout)
            .await;

        match result {
            Ok(SyncRun::Completed(report)) => info!(
                %integration_id,
                %trigger,
                applied = report.applied_count(),
                conflicts = report.conflict_count(),
                "queued sync pass completed"
            ),
            Ok(SyncRun::Coalesced) => {
                debug!(%integration_id, %trigger, "queued sync coalesced into running pass")
            }
            Err(err) => error!(%integration_id, %trigger, error = %err, "queued sync pass failed"),
        }
    }
}
