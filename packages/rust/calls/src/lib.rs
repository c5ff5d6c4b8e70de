//! Client for the call-recording API: domain search and transcript retrieval.
//!
//! This crate provides:
//! - [`executor`]: authenticated, concurrency-limited requests with retry/backoff
//! - [`CallsClient`]: the public entry point, with
//!   [`search_by_domain`](CallsClient::search_by_domain) and
//!   [`assemble_transcript`](CallsClient::assemble_transcript)

pub mod executor;
mod search;
mod transcript;
mod wire;

use std::sync::Arc;

use pocsync_shared::{CallsClientConfig, Result};

pub use executor::{RequestExecutor, SleepFuture, Sleeper, TokioSleeper};
pub use search::SEARCH_PATH;
pub use transcript::TRANSCRIPT_PATH;

/// Calls API client. Cheap to clone; clones share one concurrency gate.
#[derive(Clone)]
pub struct CallsClient {
    executor: RequestExecutor,
}

impl CallsClient {
    /// Build a client from resolved configuration.
    ///
    /// Missing credentials do not fail here; every request fails with
    /// `NotConfigured` instead.
    pub fn new(config: &CallsClientConfig) -> Result<Self> {
        Ok(Self {
            executor: RequestExecutor::new(config)?,
        })
    }

    /// Replace the backoff sleeper (tests use a recording one).
    pub fn with_sleeper(self, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            executor: self.executor.with_sleeper(sleeper),
        }
    }

    /// The underlying request executor.
    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }
}
