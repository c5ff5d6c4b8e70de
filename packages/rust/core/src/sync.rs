//! Search and transcript sync between the calls API and local storage.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

use pocsync_calls::CallsClient;
use pocsync_shared::{PocsyncError, Result, SearchFilter};
use pocsync_storage::{Storage, UpsertOutcome};

/// Outcome of a domain search sync.
#[derive(Debug, Clone, Serialize)]
pub struct SyncCallsResult {
    pub domain: String,
    /// Calls returned by the search.
    pub found: usize,
    pub inserted: usize,
    pub updated: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptSyncResult {
    pub external_call_id: String,
    /// Number of `[Speaker ..]` lines stored.
    pub lines: usize,
    /// Empty when the call has no transcript upstream.
    pub text: String,
}

/// A transcript that could not be fetched or stored.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptFailure {
    pub external_call_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TranscriptBatchResult {
    pub fetched: Vec<TranscriptSyncResult>,
    /// Sorted by call id.
    pub failed: Vec<TranscriptFailure>,
}

/// Progress callback for sync workflows.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each search result is stored.
    fn call_stored(&self, external_call_id: &str, current: usize, total: usize);
    /// Called as each transcript fetch finishes, successfully or not.
    fn transcript_finished(&self, external_call_id: &str, ok: bool, current: usize, total: usize);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn call_stored(&self, _external_call_id: &str, _current: usize, _total: usize) {}
    fn transcript_finished(&self, _id: &str, _ok: bool, _current: usize, _total: usize) {}
}

/// Search the calls API for a domain and upsert every result.
#[instrument(skip_all, fields(domain = %filter.domain))]
pub async fn sync_calls(
    client: &CallsClient,
    storage: &Storage,
    filter: &SearchFilter,
    progress: &dyn ProgressReporter,
) -> Result<SyncCallsResult> {
    let start = Instant::now();

    progress.phase("Searching calls");
    let calls = client.search(filter).await?;
    let total = calls.len();

    progress.phase("Storing calls");
    let (mut inserted, mut updated) = (0, 0);
    for (i, call) in calls.iter().enumerate() {
        match storage.upsert_call(&filter.domain, call).await? {
            UpsertOutcome::Inserted => inserted += 1,
            UpsertOutcome::Updated => updated += 1,
        }
        progress.call_stored(&call.external_call_id, i + 1, total);
    }

    let result = SyncCallsResult {
        domain: filter.domain.clone(),
        found: total,
        inserted,
        updated,
        elapsed: start.elapsed(),
    };
    info!(found = total, inserted, updated, "call search synced");
    Ok(result)
}

/// Fetch and store the transcript of one locally known call.
#[instrument(skip(client, storage))]
pub async fn sync_transcript(
    client: &CallsClient,
    storage: &Storage,
    external_call_id: &str,
) -> Result<TranscriptSyncResult> {
    if storage.get_call(external_call_id).await?.is_none() {
        return Err(PocsyncError::not_found(format!("call {external_call_id}")));
    }

    let result = fetch_transcript(client.clone(), external_call_id.to_string()).await?;
    storage
        .set_transcript(&result.external_call_id, &result.text)
        .await?;
    Ok(result)
}

/// Fetch transcripts for every selected call of a domain that has none yet.
///
/// Fetches run concurrently, bounded by the client's in-flight gate. A
/// failed call is recorded and the rest of the batch continues.
#[instrument(skip(client, storage, progress))]
pub async fn sync_selected_transcripts(
    client: &CallsClient,
    storage: &Storage,
    domain: &str,
    progress: &dyn ProgressReporter,
) -> Result<TranscriptBatchResult> {
    let pending = storage.list_selected_without_transcript(domain).await?;
    let total = pending.len();
    let mut batch = TranscriptBatchResult::default();
    if total == 0 {
        info!("no selected calls awaiting a transcript");
        return Ok(batch);
    }

    progress.phase("Fetching transcripts");
    let mut tasks = JoinSet::new();
    let mut task_calls = HashMap::new();
    for stored in pending {
        let id = stored.call.external_call_id;
        let handle = tasks.spawn(fetch_transcript(client.clone(), id.clone()));
        task_calls.insert(handle.id(), id);
    }

    let mut done = 0;
    while let Some(joined) = tasks.join_next_with_id().await {
        done += 1;
        let (id, outcome) = match joined {
            Ok((task_id, outcome)) => (task_calls.remove(&task_id).unwrap_or_default(), outcome),
            Err(e) => {
                let id = task_calls.remove(&e.id()).unwrap_or_default();
                let error = PocsyncError::Network(format!("transcript task aborted: {e}"));
                (id, Err(error))
            }
        };

        let stored = match outcome {
            Ok(result) => storage
                .set_transcript(&result.external_call_id, &result.text)
                .await
                .map(|()| result),
            Err(e) => Err(e),
        };

        match stored {
            Ok(result) => {
                progress.transcript_finished(&id, true, done, total);
                batch.fetched.push(result);
            }
            Err(e) => {
                warn!(call_id = %id, error = %e, "transcript sync failed");
                progress.transcript_finished(&id, false, done, total);
                batch.failed.push(TranscriptFailure {
                    external_call_id: id,
                    error: e.to_string(),
                });
            }
        }
    }

    batch
        .fetched
        .sort_by(|a, b| a.external_call_id.cmp(&b.external_call_id));
    batch
        .failed
        .sort_by(|a, b| a.external_call_id.cmp(&b.external_call_id));
    info!(
        fetched = batch.fetched.len(),
        failed = batch.failed.len(),
        "transcript batch finished"
    );
    Ok(batch)
}

async fn fetch_transcript(
    client: CallsClient,
    external_call_id: String,
) -> Result<TranscriptSyncResult> {
    let text = client.assemble_transcript(&external_call_id).await?;
    let lines = if text.is_empty() { 0 } else { text.lines().count() };
    Ok(TranscriptSyncResult {
        external_call_id,
        lines,
        text,
    })
}
