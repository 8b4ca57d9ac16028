//! Upward-facing API of the sync pipeline.
//!
//! A [`Session`] owns the client, read cache and state store, and allows a
//! single resolve, plan or apply run at a time.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tracing::debug;

use crate::{
    Res,
    apply::{ApplyExecutor, ApplyProgressFn, ApplyReport},
    config,
    error::SyncError,
    management::{ReadCache, StateManager, TokenManager, cache_dir, token_path},
    planner::{PlanOptions, PlanProgressFn, Planner},
    resolver::{AmbiguityResolver, ResolveOutcome, Resolver},
    spotify::{ClientConfig, SpotifyClient, TransportObserver},
    types::{Item, LibraryTotals, OperationLogEntry, Plan},
};

/// Clears the in-flight flag when a run ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct Session {
    client: SpotifyClient,
    cache: Arc<ReadCache>,
    store: StateManager,
    planner: Planner,
    in_flight: AtomicBool,
}

impl Session {
    pub fn new(client: SpotifyClient, cache: Arc<ReadCache>, store: StateManager) -> Self {
        let planner = Planner::new(client.clone(), Arc::clone(&cache));
        Self {
            client,
            cache,
            store,
            planner,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Session over the data directory: stored token, cache mirror and state
    /// blob, with endpoints from the environment.
    pub async fn from_env() -> Res<Self> {
        let data_dir = config::data_dir();
        let client_config = ClientConfig::from_env();
        let tokens = TokenManager::load(
            token_path(&data_dir),
            client_config.token_url.clone(),
            client_config.client_id.clone(),
        )
        .await?;

        let client = SpotifyClient::new(client_config, Arc::new(tokens))?;
        let cache = Arc::new(ReadCache::persistent(cache_dir(&data_dir)));
        Ok(Self::new(client, cache, StateManager::in_dir(&data_dir)))
    }

    pub fn client(&self) -> &SpotifyClient {
        &self.client
    }

    pub fn store(&self) -> &StateManager {
        &self.store
    }

    fn begin(&self) -> Res<InFlight<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| InFlight(&self.in_flight))
            .map_err(|_| SyncError::Busy)
    }

    pub async fn resolve_artists(
        &self,
        items: &[Item],
        ambiguity: Option<&dyn AmbiguityResolver>,
        observer: &dyn TransportObserver,
    ) -> Res<ResolveOutcome> {
        let _guard = self.begin()?;
        Resolver::new(self.client.clone(), self.store.clone())
            .with_cache(Arc::clone(&self.cache))
            .resolve_artists(items, ambiguity, observer)
            .await
    }

    pub async fn build_plan(
        &self,
        options: &PlanOptions,
        on_progress: PlanProgressFn<'_>,
        observer: &dyn TransportObserver,
    ) -> Res<Plan> {
        let _guard = self.begin()?;
        self.planner.build_plan(options, on_progress, observer).await
    }

    /// Applies `plan`. The read cache is purged afterwards, successful or not,
    /// since the library has changed.
    pub async fn run_plan(
        &self,
        plan: Option<&Plan>,
        on_progress: ApplyProgressFn<'_>,
    ) -> Res<ApplyReport> {
        let _guard = self.begin()?;
        let result = ApplyExecutor::new(self.client.clone())
            .with_store(self.store.clone())
            .run_plan(plan, on_progress)
            .await;
        if plan.is_some() {
            debug!("purging read cache after apply");
            self.cache.clear().await;
        }
        result
    }

    pub fn totals(&self) -> Option<LibraryTotals> {
        self.planner.totals()
    }

    pub fn following_snapshot(&self) -> Vec<String> {
        self.planner.following_snapshot()
    }

    /// Drops the remembered decision for `name`.
    pub async fn forget(&self, name: &str) -> Res<bool> {
        Resolver::new(self.client.clone(), self.store.clone())
            .forget(name)
            .await
    }

    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    /// Destroys the token and purges the read cache.
    pub async fn logout(&self) {
        self.client.tokens().logout().await;
        self.cache.clear().await;
    }

    /// Operation log, most recent last.
    pub async fn history(&self) -> Res<Vec<OperationLogEntry>> {
        Ok(self.store.load().await?.operation_log)
    }
}
