//! Application wiring
//!
//! Builds the queue, store, services, router and worker pool from a
//! `SitegenConfig` and runs them until a shutdown signal arrives.

use crate::api::{create_router, AppState};
use crate::config::{QueueConfig, QueueKind, SitegenConfig, StoreConfig, StoreKind};
use crate::error::ApiError;
use crate::provider::{BackendFactory, GenerationBackend};
use crate::queue::{MemoryWorkQueue, SledWorkQueue, WorkQueue};
use crate::status::{StatusMode, StatusService};
use crate::store::{BlobStore, FilesystemBlobStore, MemoryBlobStore};
use crate::submission::SubmissionService;
use crate::worker::{Worker, WorkerPool};
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

/// Which halves of the pipeline a process hosts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// HTTP API only
    Serve,
    /// Worker pool only
    Work,
    /// HTTP API and worker pool in one process
    All,
}

impl RunMode {
    fn serves(self) -> bool {
        matches!(self, RunMode::Serve | RunMode::All)
    }

    fn works(self) -> bool {
        matches!(self, RunMode::Work | RunMode::All)
    }
}

pub fn build_queue(config: &QueueConfig) -> Result<Arc<dyn WorkQueue>, ApiError> {
    Ok(match config.kind {
        QueueKind::Memory => Arc::new(MemoryWorkQueue::new(config.settings())),
        QueueKind::Sled => Arc::new(SledWorkQueue::open(&config.path, config.settings())?),
    })
}

pub fn build_store(config: &StoreConfig) -> Result<Arc<dyn BlobStore>, ApiError> {
    Ok(match config.kind {
        StoreKind::Memory => Arc::new(MemoryBlobStore::new()),
        StoreKind::Filesystem => Arc::new(FilesystemBlobStore::new(&config.root)?),
    })
}

pub struct App {
    config: SitegenConfig,
    queue: Arc<dyn WorkQueue>,
    store: Arc<dyn BlobStore>,
}

impl App {
    pub fn from_config(config: SitegenConfig) -> Result<Self, ApiError> {
        let queue = build_queue(&config.queue)?;
        let store = build_store(&config.store)?;
        Ok(Self::with_components(config, queue, store))
    }

    /// Wire around an existing queue and store.
    pub fn with_components(
        config: SitegenConfig,
        queue: Arc<dyn WorkQueue>,
        store: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            config,
            queue,
            store,
        }
    }

    pub fn config(&self) -> &SitegenConfig {
        &self.config
    }

    pub fn queue(&self) -> &Arc<dyn WorkQueue> {
        &self.queue
    }

    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    pub fn submission_service(&self) -> SubmissionService {
        SubmissionService::new(self.queue.clone())
            .with_guest_session(self.config.submission.guest_session_id.clone())
    }

    pub fn status_service(&self) -> StatusService {
        let service = StatusService::new(self.store.clone());
        match self.config.status.mode {
            StatusMode::Inline => service,
            StatusMode::Url => service.with_url_mode(self.config.public_base_url()),
        }
    }

    pub fn router(&self) -> Router {
        create_router(AppState {
            submission: Arc::new(self.submission_service()),
            status: Arc::new(self.status_service()),
            store: self.store.clone(),
        })
    }

    pub fn worker(&self, backend: Arc<dyn GenerationBackend>) -> Worker {
        Worker::new(
            self.queue.clone(),
            self.store.clone(),
            backend,
            self.config.worker.backend_timeout(),
        )
    }

    pub fn worker_pool(&self, backend: Arc<dyn GenerationBackend>) -> WorkerPool {
        WorkerPool::new(
            Arc::new(self.worker(backend)),
            self.config.worker.pool_config(),
        )
    }

    /// Serve the API on `listener` until `shutdown` resolves.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<(), ApiError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!(addr = ?listener.local_addr().ok(), "HTTP API listening");
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }

    /// Run `mode` with the configured backend until `shutdown` resolves.
    pub async fn run<F>(&self, mode: RunMode, shutdown: F) -> Result<(), ApiError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let backend = if mode.works() {
            Some(BackendFactory::create_backend(&self.config.backend)?)
        } else {
            None
        };
        self.run_with_backend(mode, backend, shutdown).await
    }

    /// Run `mode`, using `backend` for the worker pool when one is hosted.
    pub async fn run_with_backend<F>(
        &self,
        mode: RunMode,
        backend: Option<Arc<dyn GenerationBackend>>,
        shutdown: F,
    ) -> Result<(), ApiError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if mode != RunMode::All && self.config.queue.kind == QueueKind::Memory {
            warn!(
                mode = ?mode,
                "Memory queue is not shared between processes; jobs will not cross this process"
            );
        }

        let listener = if mode.serves() {
            Some(TcpListener::bind(self.config.bind_addr()?).await?)
        } else {
            None
        };

        let pool = match (mode.works(), backend) {
            (true, Some(backend)) => {
                info!(
                    backend = backend.backend_name(),
                    model = backend.model_name(),
                    queue = self.queue.queue_name(),
                    concurrency = self.config.worker.concurrency,
                    "Starting worker pool"
                );
                let pool = self.worker_pool(backend);
                pool.start();
                Some(pool)
            }
            (true, None) => {
                return Err(ApiError::ConfigError(
                    "Worker mode requires a generation backend".to_string(),
                ))
            }
            (false, _) => None,
        };

        let served = match listener {
            Some(listener) => self.serve(listener, shutdown).await,
            None => {
                shutdown.await;
                Ok(())
            }
        };

        if let Some(pool) = pool {
            pool.stop().await;
            let stats = pool.stats();
            info!(
                received = stats.received,
                committed = stats.committed,
                abandoned = stats.abandoned,
                "Worker pool stopped"
            );
        }

        served
    }
}

/// Resolve on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
