//! Sync workflows for pocsync.
//!
//! Ties the calls API client to local storage: domain search into the
//! `calls` table, and transcript retrieval for calls selected for analysis.

pub mod sync;

pub use sync::{
    ProgressReporter, SilentProgress, SyncCallsResult, TranscriptBatchResult,
    TranscriptFailure, TranscriptSyncResult, sync_calls, sync_selected_transcripts,
    sync_transcript,
};
