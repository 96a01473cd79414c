//! Load controller
//!
//! Drives each observed [`AssetRequest`] through
//! `Idle -> Loading -> (Transforming) -> Ready | Error`:
//! - Loading starts when the viewport scheduler admits the request
//! - Retryable fetch failures are retried with exponential backoff
//! - Transforms run on the shared [`TransformPool`] when one is available
//! - Terminal failures resolve to the fallback locator when one is set

use crate::cache::{AssetCache, CacheKey, Resolved};
use crate::handle::{AssetHandle, Outcome, Shared};
use std::sync::Arc;
use tokio::time::Instant;
use vmp_core::{
    AssetFetcher, AssetId, AssetRequest, AssetState, LoadConfig, NetworkError, PipelineConfig, Rect,
};
use vmp_transform::{TransformOptions, TransformPool};
use vmp_viewport::{Admission, BoundsProvider, Registration, ViewportScheduler};

/// Everything a pipeline task needs, shared by every request of a controller
pub(crate) struct Pipeline {
    fetcher: Arc<dyn AssetFetcher>,
    pool: Option<Arc<TransformPool>>,
    cache: AssetCache,
    config: LoadConfig,
    default_quality: u8,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("pool", &self.pool)
            .field("config", &self.config)
            .field("default_quality", &self.default_quality)
            .finish_non_exhaustive()
    }
}

impl Clone for Pipeline {
    fn clone(&self) -> Self {
        Self {
            fetcher: Arc::clone(&self.fetcher),
            pool: self.pool.clone(),
            cache: self.cache.clone(),
            config: self.config,
            default_quality: self.default_quality,
        }
    }
}

impl Pipeline {
    async fn admit_then_resolve(
        self: Arc<Self>,
        request: AssetRequest,
        shared: Arc<Shared>,
        registration: Registration,
        admission: Admission,
    ) {
        let admitted = admission.admitted().await;
        drop(registration);
        let Some(reason) = admitted else {
            tracing::debug!(asset = %shared.id, "Registration replaced before admission");
            return;
        };
        tracing::debug!(asset = %shared.id, ?reason, "Asset admitted");

        if shared.transition(AssetState::loading()) {
            self.resolve(request, shared, Instant::now()).await;
        }
    }

    /// Run from Loading to a terminal phase
    #[tracing::instrument(skip_all, fields(asset = %shared.id, locator = %request.source_locator))]
    pub(crate) async fn resolve(self: Arc<Self>, request: AssetRequest, shared: Arc<Shared>, started: Instant) {
        let key = CacheKey::for_request(&request, self.default_quality);
        if let Some(hit) = self.cache.get(&key).await {
            if let Some(outcome) = self.outcome_from_cache(&request, hit) {
                tracing::debug!("Resolved from cache");
                shared.finish(outcome, started);
                return;
            }
        }

        let raw = match self.fetch_with_retry(&request.source_locator).await {
            Ok(raw) => raw,
            Err(e) => {
                shared.finish(Self::failure(&request, &e.to_string()), started);
                return;
            }
        };

        let Some(pool) = self.pool_for(&request) else {
            self.cache.insert(key, Resolved::Source).await;
            shared.finish(Outcome::ready(request.source_locator.as_str()), started);
            return;
        };

        if !shared.transition(AssetState::transforming()) {
            return;
        }
        let options = TransformOptions::fit(
            request.target_dimensions,
            request.quality_hint.unwrap_or(self.default_quality),
        );
        // The handle owns the blob before the next await, so a cancel landing
        // in the cache insert still releases it.
        match pool.transform(raw, options).await {
            Ok(blob) => {
                let locator = blob.locator().to_string();
                let bytes = pool.blobs().resolve(&locator);
                if !shared.adopt(blob) {
                    return;
                }
                if let Some(bytes) = bytes {
                    self.cache.insert(key, Resolved::Transformed(bytes)).await;
                }
                shared.finish(Outcome::Ready { locator, blob: None }, started);
            }
            Err(e) if request.transform_required => {
                shared.finish(Self::failure(&request, &format!("transform failed: {e}")), started);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Transform failed, using original asset");
                shared.finish(Outcome::ready(request.source_locator.as_str()), started);
            }
        }
    }

    async fn fetch_with_retry(&self, locator: &str) -> Result<Vec<u8>, NetworkError> {
        let mut retry = 0;
        loop {
            match self.fetcher.fetch(locator).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if e.is_retryable() && retry < self.config.max_retries => {
                    retry += 1;
                    let delay = self.config.backoff_delay(retry);
                    tracing::warn!(
                        error = %e,
                        retry,
                        max_retries = self.config.max_retries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Fetch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Pool to use for this request, if it wants a transform and one can run
    fn pool_for(&self, request: &AssetRequest) -> Option<&Arc<TransformPool>> {
        if !request.wants_transform() {
            return None;
        }
        let pool = self.pool.as_ref().filter(|pool| pool.is_available());
        if pool.is_none() {
            tracing::debug!("Transform pool unavailable, using original asset");
        }
        pool
    }

    fn outcome_from_cache(&self, request: &AssetRequest, hit: Resolved) -> Option<Outcome> {
        match hit {
            Resolved::Source => Some(Outcome::ready(request.source_locator.as_str())),
            Resolved::Transformed(bytes) => {
                let blob = self.pool.as_ref()?.blobs().register(bytes.to_vec());
                Some(Outcome::Ready {
                    locator: blob.locator().to_string(),
                    blob: Some(blob),
                })
            }
        }
    }

    fn failure(request: &AssetRequest, message: &str) -> Outcome {
        match &request.fallback_locator {
            Some(fallback) => {
                tracing::warn!(error = %message, %fallback, "Load failed, using fallback");
                Outcome::ready(fallback.as_str())
            }
            None => {
                tracing::error!(error = %message, "Load failed");
                Outcome::Failed(message.to_string())
            }
        }
    }
}

/// Orchestrates asset requests from admission to a displayable locator
#[derive(Debug, Clone)]
pub struct LoadController {
    pipeline: Pipeline,
    scheduler: ViewportScheduler,
}

impl LoadController {
    /// Create a controller without background transforms
    #[must_use]
    pub fn new(fetcher: Arc<dyn AssetFetcher>, scheduler: ViewportScheduler, config: LoadConfig) -> Self {
        Self {
            pipeline: Pipeline {
                fetcher,
                pool: None,
                cache: AssetCache::new(config.cache_capacity),
                config,
                default_quality: vmp_core::TransformConfig::default().default_quality,
            },
            scheduler,
        }
    }

    /// Build the scheduler, pool and controller from one configuration.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn from_config(fetcher: Arc<dyn AssetFetcher>, config: &PipelineConfig) -> Self {
        let scheduler = ViewportScheduler::new(config.viewport);
        let pool = Arc::new(TransformPool::new(config.transform));
        Self::new(fetcher, scheduler, config.loader)
            .with_pool(pool)
            .with_default_quality(config.transform.default_quality)
    }

    /// Run transforms on `pool`
    #[must_use]
    pub fn with_pool(mut self, pool: Arc<TransformPool>) -> Self {
        self.pipeline.pool = Some(pool);
        self
    }

    /// Quality used when a transformed request has no quality hint
    #[must_use]
    pub fn with_default_quality(mut self, quality: u8) -> Self {
        self.pipeline.default_quality = quality;
        self
    }

    #[inline]
    #[must_use]
    pub fn scheduler(&self) -> &ViewportScheduler {
        &self.scheduler
    }

    #[inline]
    #[must_use]
    pub fn pool(&self) -> Option<&Arc<TransformPool>> {
        self.pipeline.pool.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &LoadConfig {
        &self.pipeline.config
    }

    /// Start observing a request placed at `bounds`.
    ///
    /// Requests admitted during registration (immediate priority, or
    /// already within the lookahead area) are Loading when this returns.
    /// Must be called from within a Tokio runtime.
    pub fn observe(&self, request: AssetRequest, bounds: Arc<dyn BoundsProvider>) -> AssetHandle {
        let id = AssetId::new();
        let blobs = self.pipeline.pool.as_ref().map(|pool| pool.blobs().clone());
        let shared = Arc::new(Shared::new(id, blobs));
        let pipeline = Arc::new(self.pipeline.clone());

        let (registration, mut admission) = self.scheduler.register(id, bounds, request.priority);

        let task = if let Some(reason) = admission.try_admitted() {
            drop(registration);
            tracing::debug!(asset = %id, ?reason, "Asset admitted on registration");
            shared.transition(AssetState::loading());
            tokio::spawn(Arc::clone(&pipeline).resolve(request.clone(), Arc::clone(&shared), Instant::now()))
        } else {
            tokio::spawn(Arc::clone(&pipeline).admit_then_resolve(
                request.clone(),
                Arc::clone(&shared),
                registration,
                admission,
            ))
        };

        AssetHandle::new(shared, pipeline, request, task)
    }

    /// Move the viewport; returns the ids admitted by the move
    pub fn set_viewport(&self, viewport: Rect) -> Vec<AssetId> {
        self.scheduler.set_viewport(viewport)
    }

    /// Hover hint for a hover-priority request
    pub fn notify_hover(&self, id: AssetId) -> bool {
        self.scheduler.notify_hover(id)
    }

    /// Entries in the resolved-asset cache
    pub async fn cached_entries(&self) -> u64 {
        self.pipeline.cache.run_pending_tasks().await;
        self.pipeline.cache.entry_count()
    }

    /// Forget every cached resolution
    pub fn clear_cache(&self) {
        self.pipeline.cache.invalidate_all();
    }
}
