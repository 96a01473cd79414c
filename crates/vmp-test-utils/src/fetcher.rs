//! Scripted [`AssetFetcher`]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use vmp_core::{AssetFetcher, NetworkError};

/// Fetcher answering from a script.
///
/// Each locator has an optional queue of one-shot failures followed by a
/// permanent answer. Unknown locators answer `NotFound`.
#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    assets: Mutex<HashMap<String, Result<Vec<u8>, NetworkError>>>,
    failures: Mutex<HashMap<String, VecDeque<NetworkError>>>,
    calls: Mutex<HashMap<String, usize>>,
    delay: Option<Duration>,
}

impl ScriptedFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `bytes` for `locator`
    #[must_use]
    pub fn with_asset(self, locator: &str, bytes: Vec<u8>) -> Self {
        self.assets.lock().insert(locator.to_string(), Ok(bytes));
        self
    }

    /// Fail the next `times` fetches of `locator` with `error`
    #[must_use]
    pub fn with_failures(self, locator: &str, times: usize, error: &NetworkError) -> Self {
        self.failures
            .lock()
            .entry(locator.to_string())
            .or_default()
            .extend(std::iter::repeat(error.clone()).take(times));
        self
    }

    /// Fail every fetch of `locator` with `error`
    #[must_use]
    pub fn with_permanent_failure(self, locator: &str, error: &NetworkError) -> Self {
        self.assets
            .lock()
            .insert(locator.to_string(), Err(error.clone()));
        self
    }

    /// Sleep (on the Tokio clock) before answering
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fetches attempted for `locator`
    #[must_use]
    pub fn calls(&self, locator: &str) -> usize {
        self.calls.lock().get(locator).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }
}

#[async_trait]
impl AssetFetcher for ScriptedFetcher {
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>, NetworkError> {
        *self.calls.lock().entry(locator.to_string()).or_default() += 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self
            .failures
            .lock()
            .get_mut(locator)
            .and_then(VecDeque::pop_front)
        {
            return Err(error);
        }
        self.assets
            .lock()
            .get(locator)
            .cloned()
            .unwrap_or_else(|| {
                Err(NetworkError::NotFound {
                    locator: locator.to_string(),
                })
            })
    }
}
