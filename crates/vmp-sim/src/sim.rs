//! Simulation runs
//!
//! Each run wires the pipeline components to the filesystem capabilities and
//! drives them the way a listing page would: placeholders laid out in a
//! column, a viewport scrolling down one screen at a time, a batch of
//! selected files dispatched to a destination.

use crate::fs::{FsFetcher, FsUploader};
use anyhow::Context;
use futures::StreamExt;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use vmp_core::{
    AssetId, AssetRequest, AssetState, BatchSnapshot, FileHandle, Phase, PipelineConfig, Rect,
    UploadConfig, ValidationError,
};
use vmp_loader::{AssetHandle, LoadController};
use vmp_transform::{PoolStats, TransformOptions, TransformPool};
use vmp_upload::UploadCoordinator;
use vmp_viewport::FixedBounds;

/// Vertical gap between placeholders
const TILE_GAP: f64 = 20.0;

/// Layout and request parameters of a load run
#[derive(Debug, Clone)]
pub struct LoadPlan {
    /// Directory holding the assets; locators are file names inside it
    pub dir: PathBuf,
    /// Visible area; scrolled down by its own height each step
    pub viewport: Rect,
    /// Placeholder size as `(width, height)`
    pub tile: (f64, f64),
    /// Requested output size, if any
    pub target: Option<(u32, u32)>,
    /// Quality hint for transformed requests
    pub quality: Option<u8>,
    /// Fail instead of falling back to the source when a transform fails
    pub require_transform: bool,
}

impl LoadPlan {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            viewport: Rect::new(0.0, 0.0, 1280.0, 800.0),
            tile: (300.0, 200.0),
            target: None,
            quality: None,
            require_transform: false,
        }
    }

    #[must_use]
    pub fn with_viewport(mut self, viewport: Rect) -> Self {
        self.viewport = viewport;
        self
    }

    #[must_use]
    pub fn with_target(mut self, width: u32, height: u32) -> Self {
        self.target = Some((width, height));
        self
    }

    #[must_use]
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = Some(quality);
        self
    }

    fn request(&self, name: &str) -> AssetRequest {
        let mut request = AssetRequest::new(name);
        if let Some((width, height)) = self.target {
            request = request.with_target_dimensions(width, height);
        }
        if let Some(quality) = self.quality {
            request = request.with_quality(quality);
        }
        if self.require_transform {
            request = request.require_transform();
        }
        request
    }

    fn bounds(&self, index: usize) -> Rect {
        let (width, height) = self.tile;
        #[allow(clippy::cast_precision_loss)]
        let y = index as f64 * (height + TILE_GAP);
        Rect::new(0.0, y, width, height)
    }
}

/// Final state of one asset in a load run
#[derive(Debug, Clone, Serialize)]
pub struct LoadOutcome {
    pub name: String,
    /// Scroll step during which the asset was admitted (0 = initial screen)
    pub admitted_at_step: Option<usize>,
    pub state: AssetState,
}

/// Summary of a load run
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub outcomes: Vec<LoadOutcome>,
    /// Viewport positions visited, including the initial one
    pub scroll_steps: usize,
    pub cached_entries: u64,
    pub pool: Option<PoolStats>,
}

impl LoadReport {
    /// Assets that ended in the given phase
    #[must_use]
    pub fn count(&self, phase: Phase) -> usize {
        self.outcomes.iter().filter(|o| o.state.phase == phase).count()
    }
}

/// Regular files directly inside `dir`, sorted by name
///
/// # Errors
/// Fails if the directory cannot be listed.
pub async fn list_assets(dir: &Path) -> anyhow::Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("cannot list {}", dir.display()))?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Wait until the handle settles, logging every state it passes through
async fn settle(name: &str, handle: &AssetHandle) -> AssetState {
    let mut states = handle.subscribe();
    while let Some(state) = states.next().await {
        tracing::debug!(asset = %handle.id(), name, phase = ?state.phase, "State changed");
        if state.phase.is_terminal() {
            match state.phase {
                Phase::Ready => tracing::info!(
                    name,
                    locator = state.resolved_locator.as_deref().unwrap_or_default(),
                    elapsed_ms = state.elapsed_ms,
                    "Asset ready"
                ),
                _ => tracing::warn!(
                    name,
                    error = state.error_message.as_deref().unwrap_or_default(),
                    "Asset failed"
                ),
            }
            return state;
        }
    }
    handle.state()
}

/// Lay every asset of `plan.dir` out in one column and scroll through it.
///
/// # Errors
/// Fails if the asset directory cannot be listed.
pub async fn run_load(plan: &LoadPlan, config: &PipelineConfig) -> anyhow::Result<LoadReport> {
    let names = list_assets(&plan.dir).await?;
    let controller = LoadController::from_config(Arc::new(FsFetcher::new(&plan.dir)), config);
    controller.set_viewport(plan.viewport);

    let handles: Vec<AssetHandle> = names
        .iter()
        .enumerate()
        .map(|(index, name)| controller.observe(plan.request(name), Arc::new(FixedBounds(plan.bounds(index)))))
        .collect();
    tracing::info!(assets = handles.len(), "Placeholders registered");

    let mut admitted_at: Vec<Option<usize>> = vec![None; handles.len()];
    let mut started: HashSet<AssetId> = handles
        .iter()
        .filter(|h| h.state().phase != Phase::Idle)
        .map(AssetHandle::id)
        .collect();

    let content_bottom = plan.bounds(handles.len()).y;
    let mut viewport = plan.viewport;
    let mut step = 0;
    loop {
        for (index, handle) in handles.iter().enumerate() {
            if admitted_at[index].is_none() && started.contains(&handle.id()) {
                admitted_at[index] = Some(step);
                settle(&names[index], handle).await;
            }
        }
        if viewport.bottom() >= content_bottom || admitted_at.iter().all(Option::is_some) {
            break;
        }
        step += 1;
        viewport.y += viewport.height;
        let admitted = controller.set_viewport(viewport);
        tracing::info!(step, y = viewport.y, admitted = admitted.len(), "Scrolled");
        started.extend(admitted);
    }

    let mut outcomes = Vec::with_capacity(handles.len());
    for (index, handle) in handles.iter().enumerate() {
        let state = if admitted_at[index].is_some() {
            settle(&names[index], handle).await
        } else {
            handle.state()
        };
        outcomes.push(LoadOutcome {
            name: names[index].clone(),
            admitted_at_step: admitted_at[index],
            state,
        });
    }

    Ok(LoadReport {
        outcomes,
        scroll_steps: step + 1,
        cached_entries: controller.cached_entries().await,
        pool: controller.pool().map(|pool| pool.stats()),
    })
}

/// Summary of an upload run
#[derive(Debug, Clone)]
pub struct UploadReport {
    pub snapshot: BatchSnapshot,
    pub rejected: Vec<ValidationError>,
}

/// Validate `files` into one batch and copy it to `dest`.
///
/// # Errors
/// Fails if a file cannot be inspected or `dest` cannot be created.
pub async fn run_upload(
    files: &[PathBuf],
    dest: &Path,
    config: &UploadConfig,
    chunk_delay: Option<Duration>,
) -> anyhow::Result<UploadReport> {
    tokio::fs::create_dir_all(dest)
        .await
        .with_context(|| format!("cannot create {}", dest.display()))?;

    let mut handles = Vec::with_capacity(files.len());
    for path in files {
        let metadata = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("cannot inspect {}", path.display()))?;
        handles.push(FileHandle::from_path(path, metadata.len()));
    }

    let mut uploader = FsUploader::new(dest);
    if let Some(delay) = chunk_delay {
        uploader = uploader.with_chunk_delay(delay);
    }
    let coordinator = UploadCoordinator::new(Arc::new(uploader), config.clone());
    let enqueued = coordinator.enqueue(handles);
    let batch = enqueued.batch;

    let mut progress = batch.subscribe();
    let watcher = tokio::spawn(async move {
        let mut last = -1.0f32;
        while let Some(snapshot) = progress.next().await {
            if (snapshot.aggregate_percent - last).abs() >= 10.0 || snapshot.batch_complete {
                last = snapshot.aggregate_percent;
                tracing::info!(percent = snapshot.aggregate_percent, complete = snapshot.batch_complete, "Batch progress");
            }
        }
    });

    let snapshot = coordinator.dispatch(&batch).await.unwrap_or_else(|| batch.snapshot());
    watcher.abort();

    Ok(UploadReport {
        snapshot,
        rejected: enqueued.rejected,
    })
}

/// Run one transform over `input` through a pool, writing JPEG to `output`.
///
/// Returns the size of the written file.
///
/// # Errors
/// Fails on unreadable input, an unusable image or options, or an
/// unwritable output.
pub async fn run_transform(
    input: &Path,
    output: &Path,
    options: TransformOptions,
    config: &PipelineConfig,
) -> anyhow::Result<usize> {
    let bytes = tokio::fs::read(input)
        .await
        .with_context(|| format!("cannot read {}", input.display()))?;
    let pool = TransformPool::new(config.transform);
    let result = pool.transform_bytes(bytes, options).await;
    pool.shutdown();
    let encoded = result.with_context(|| format!("cannot transform {}", input.display()))?;
    tokio::fs::write(output, &encoded)
        .await
        .with_context(|| format!("cannot write {}", output.display()))?;
    tracing::info!(
        input = %input.display(),
        output = %output.display(),
        op = ?options.op,
        bytes = encoded.len(),
        "Image written"
    );
    Ok(encoded.len())
}

/// Grow or crop `input` onto a canvas of `height` pixels
///
/// # Errors
/// Same as [`run_transform`].
pub async fn run_canvas(
    input: &Path,
    output: &Path,
    height: u32,
    quality: u8,
    config: &PipelineConfig,
) -> anyhow::Result<usize> {
    run_transform(input, output, TransformOptions::extend_canvas(height, quality), config).await
}
