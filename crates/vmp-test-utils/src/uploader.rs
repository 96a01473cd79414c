//! Scripted [`FileUploader`]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use vmp_core::{FileHandle, FileUploader, ProgressSink, UploadError};

/// Uploader reporting a fixed sequence of progress steps.
///
/// Failing files report the first step and then fail. Files marked with
/// [`ScriptedUploader::fail_once`] fail on their first attempt only.
/// With [`ScriptedUploader::retaining_sinks`] every progress sink outlives
/// its upload, like a transport holding on to a callback.
#[derive(Debug)]
pub struct ScriptedUploader {
    steps: Vec<f32>,
    step_delay: Option<Duration>,
    failing: Mutex<HashSet<String>>,
    fail_once: Mutex<HashSet<String>>,
    started: Mutex<Vec<String>>,
    attempts: Mutex<HashMap<String, usize>>,
    running: AtomicUsize,
    peak: AtomicUsize,
    retain_sinks: bool,
    retained: Mutex<Vec<ProgressSink>>,
}

impl Default for ScriptedUploader {
    fn default() -> Self {
        Self {
            steps: vec![25.0, 50.0, 75.0, 100.0],
            step_delay: None,
            failing: Mutex::default(),
            fail_once: Mutex::default(),
            started: Mutex::default(),
            attempts: Mutex::default(),
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            retain_sinks: false,
            retained: Mutex::default(),
        }
    }
}

impl ScriptedUploader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_steps(mut self, steps: Vec<f32>) -> Self {
        self.steps = steps;
        self
    }

    /// Sleep (on the Tokio clock) before each progress step
    #[must_use]
    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = Some(delay);
        self
    }

    /// Always fail uploads of `name`
    #[must_use]
    pub fn failing(self, name: &str) -> Self {
        self.failing.lock().insert(name.to_string());
        self
    }

    /// Fail the first upload of `name`, succeed afterwards
    #[must_use]
    pub fn fail_once(self, name: &str) -> Self {
        self.fail_once.lock().insert(name.to_string());
        self
    }

    /// Keep every progress sink after its upload returns
    #[must_use]
    pub fn retaining_sinks(mut self) -> Self {
        self.retain_sinks = true;
        self
    }

    /// Stop failing `name`
    pub fn heal(&self, name: &str) {
        self.failing.lock().remove(name);
    }

    /// File names in the order their uploads started
    #[must_use]
    pub fn started(&self) -> Vec<String> {
        self.started.lock().clone()
    }

    #[must_use]
    pub fn attempts(&self, name: &str) -> usize {
        self.attempts.lock().get(name).copied().unwrap_or(0)
    }

    /// Most uploads ever in flight at once
    #[must_use]
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn should_fail(&self, name: &str) -> bool {
        self.failing.lock().contains(name) || self.fail_once.lock().remove(name)
    }
}

#[async_trait]
impl FileUploader for ScriptedUploader {
    async fn upload(&self, file: &FileHandle, progress: ProgressSink) -> Result<(), UploadError> {
        self.started.lock().push(file.name.clone());
        *self.attempts.lock().entry(file.name.clone()).or_default() += 1;
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let fail = self.should_fail(&file.name);
        let mut result = Ok(());
        for (i, step) in self.steps.iter().enumerate() {
            if let Some(delay) = self.step_delay {
                tokio::time::sleep(delay).await;
            }
            if fail && i > 0 {
                result = Err(UploadError::Rejected {
                    reason: format!("{} refused by server", file.name),
                });
                break;
            }
            progress.report(*step);
        }

        self.running.fetch_sub(1, Ordering::SeqCst);
        if self.retain_sinks {
            self.retained.lock().push(progress);
        }
        result
    }
}
