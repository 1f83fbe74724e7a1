//! Process wiring: cache, refresher, scheduler and HTTP listener.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use calmerge_feeds::FeedFetcher;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::http::{self, AppState};
use crate::refresh::Refresher;
use crate::scheduler::{CycleOutcome, Scheduler, SharedSchedulerState, new_scheduler_state};
use crate::signals::{ReloadSignal, ShutdownSignal};

/// A configured aggregator, ready to refresh and serve.
pub struct Aggregator {
    config: ServerConfig,
    store: Arc<CacheStore>,
    state: SharedSchedulerState,
    refresher: Arc<Refresher>,
}

impl Aggregator {
    /// Validates `config` and builds the refresh pipeline around `fetcher`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] if the configuration is invalid.
    pub fn new(config: ServerConfig, fetcher: Arc<dyn FeedFetcher>) -> ServerResult<Self> {
        config.validate()?;

        let store = Arc::new(CacheStore::new());
        let state = new_scheduler_state();
        let mut refresher = Refresher::new(
            config.sources.clone(),
            fetcher,
            config.merge.clone(),
            store.clone(),
            state.clone(),
        );
        if let Some(limit) = config.max_concurrent_fetches {
            refresher = refresher.with_fetch_limit(limit);
        }

        Ok(Self {
            config,
            store,
            state,
            refresher: Arc::new(refresher),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    pub fn state(&self) -> SharedSchedulerState {
        self.state.clone()
    }

    /// Builds the HTTP router with request tracing.
    pub fn router(&self) -> Router {
        let state = AppState {
            store: self.store.clone(),
            scheduler: self.state.clone(),
            retry_after_secs: self.config.retry_after_secs,
        };
        http::router(state, &self.config.path).layer(TraceLayer::new_for_http())
    }

    /// Runs a single refresh cycle in the foreground.
    pub async fn run_once(&self) -> CycleOutcome {
        self.refresher.run_cycle().await
    }

    /// Serves requests on `listener` until `shutdown` fires.
    ///
    /// The scheduler starts immediately, so the first cycle overlaps with the
    /// listener accepting connections. Every `reload` request triggers an
    /// extra cycle. On shutdown the scheduler task is aborted; a cycle in
    /// flight is dropped before it can touch the cache.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: ShutdownSignal,
        mut reload: ReloadSignal,
    ) -> ServerResult<()> {
        let scheduler = Scheduler::with_state(self.config.scheduler.clone(), self.state.clone());
        let handle = scheduler.handle();

        let refresher = self.refresher.clone();
        let scheduler_task = tokio::spawn(scheduler.run(move || {
            let refresher = refresher.clone();
            async move { refresher.run_cycle().await }
        }));

        let reload_task = tokio::spawn({
            let handle = handle.clone();
            async move {
                while reload.next().await {
                    if handle.refresh_now().await.is_err() {
                        break;
                    }
                }
                debug!("Reload forwarding stopped");
            }
        });

        let router = self.router();
        info!(
            addr = %listener.local_addr()?,
            path = %self.config.path,
            sources = self.config.sources.len(),
            "Serving merged calendar"
        );

        let served = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown.wait())
            .await;

        info!("Shutting down");
        if handle.stop().await.is_err() {
            debug!("Scheduler already stopped");
        }
        scheduler_task.abort();
        reload_task.abort();

        if let Err(e) = &served {
            warn!(error = %e, "HTTP server exited with error");
        }
        served.map_err(ServerError::from)
    }
}

/// Binds the HTTP listener.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the address is unavailable.
pub async fn bind(addr: SocketAddr) -> ServerResult<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })
}
