//! libSQL storage layer for calls found by domain search.
//!
//! The [`Storage`] struct wraps a local libSQL database holding call metadata,
//! fetched transcripts, and the per-call analysis selection flag. Calls are
//! keyed by the upstream call id, so repeated searches update rows in place.
//!
//! **Access rules:**
//! - CLI sync commands: read-write via [`Storage::open`]
//! - Listing and reporting: read-only via [`Storage::open_readonly`]

mod migrations;

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database, params};
use serde::Serialize;
use uuid::Uuid;

use pocsync_shared::{CallRecord, PocsyncError, Result};

/// Columns selected for [`StoredCall`], in `row_to_stored_call` order.
const CALL_COLUMNS: &str = "id, account_domain, external_call_id, title, started_at, \
     duration_seconds, participant_emails, url, transcript_text, transcript_fetched_at, \
     selected_for_analysis, created_at, updated_at";

/// Domain filter on `?1`. Emails are stored lowercased, as is the domain.
const DOMAIN_MATCH: &str = "account_domain = ?1 OR instr(participant_emails, ?1) > 0";

/// A persisted call with its local state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredCall {
    /// Local row id (UUID v7).
    pub id: String,
    /// Domain of the search that first found the call.
    pub account_domain: String,
    #[serde(flatten)]
    pub call: CallRecord,
    pub transcript_text: Option<String>,
    pub transcript_fetched_at: Option<DateTime<Utc>>,
    pub selected_for_analysis: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Whether an upsert created a row or refreshed an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PocsyncError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| PocsyncError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| PocsyncError::Storage(e.to_string()))?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PocsyncError::not_found(format!(
                "database {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| PocsyncError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| PocsyncError::Storage(e.to_string()))?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        PocsyncError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(PocsyncError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Call operations
    // -----------------------------------------------------------------------

    /// Insert a call, or refresh its metadata if the upstream id is known.
    ///
    /// Transcript, selection flag, and the first-seen account domain are kept
    /// on update.
    pub async fn upsert_call(&self, domain: &str, call: &CallRecord) -> Result<UpsertOutcome> {
        self.check_writable()?;

        let existed = self.get_call(&call.external_call_id).await?.is_some();
        let now = timestamp(&Utc::now());
        let emails = serde_json::to_string(&call.participant_emails)
            .map_err(|e| PocsyncError::Storage(format!("encode participant emails: {e}")))?;
        let started_at = call.started_at.as_ref().map(timestamp);

        self.conn
            .execute(
                "INSERT INTO calls (id, account_domain, external_call_id, title, started_at,
                                    duration_seconds, participant_emails, url, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(external_call_id) DO UPDATE SET
                   title = excluded.title,
                   started_at = excluded.started_at,
                   duration_seconds = excluded.duration_seconds,
                   participant_emails = excluded.participant_emails,
                   url = excluded.url,
                   updated_at = excluded.updated_at",
                params![
                    Uuid::now_v7().to_string(),
                    domain,
                    call.external_call_id.as_str(),
                    call.title.as_str(),
                    started_at,
                    call.duration_seconds,
                    emails,
                    call.url.as_deref(),
                    now.as_str(),
                    now.as_str(),
                ],
            )
            .await
            .map_err(|e| PocsyncError::Storage(e.to_string()))?;

        Ok(if existed {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Inserted
        })
    }

    /// Get a call by its upstream id.
    pub async fn get_call(&self, external_call_id: &str) -> Result<Option<StoredCall>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {CALL_COLUMNS} FROM calls WHERE external_call_id = ?1"),
                params![external_call_id],
            )
            .await
            .map_err(|e| PocsyncError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_stored_call(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(PocsyncError::Storage(e.to_string())),
        }
    }

    /// List calls for a domain, newest first; calls without a start time last.
    ///
    /// A call belongs to a domain when it was first stored for it or when any
    /// participant email contains it, so a call first found under `acme.com`
    /// also lists under `eu.acme.com` if an `eu.acme.com` address took part.
    pub async fn list_calls(&self, domain: &str) -> Result<Vec<StoredCall>> {
        self.query_calls(
            &format!(
                "SELECT {CALL_COLUMNS} FROM calls WHERE {DOMAIN_MATCH}
                 ORDER BY started_at IS NULL, started_at DESC"
            ),
            domain,
        )
        .await
    }

    /// Selected calls for a domain that still have no transcript.
    pub async fn list_selected_without_transcript(&self, domain: &str) -> Result<Vec<StoredCall>> {
        self.query_calls(
            &format!(
                "SELECT {CALL_COLUMNS} FROM calls
                 WHERE ({DOMAIN_MATCH}) AND selected_for_analysis = 1
                   AND transcript_fetched_at IS NULL
                 ORDER BY started_at IS NULL, started_at DESC"
            ),
            domain,
        )
        .await
    }

    async fn query_calls(&self, sql: &str, domain: &str) -> Result<Vec<StoredCall>> {
        let mut rows = self
            .conn
            .query(sql, params![domain])
            .await
            .map_err(|e| PocsyncError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| PocsyncError::Storage(e.to_string()))?
        {
            results.push(row_to_stored_call(&row)?);
        }
        Ok(results)
    }

    /// Store a fetched transcript (possibly empty) and its fetch time.
    pub async fn set_transcript(&self, external_call_id: &str, text: &str) -> Result<()> {
        self.check_writable()?;
        let now = timestamp(&Utc::now());
        let changed = self
            .conn
            .execute(
                "UPDATE calls SET transcript_text = ?1, transcript_fetched_at = ?2, updated_at = ?2
                 WHERE external_call_id = ?3",
                params![text, now.as_str(), external_call_id],
            )
            .await
            .map_err(|e| PocsyncError::Storage(e.to_string()))?;

        if changed == 0 {
            return Err(PocsyncError::not_found(format!("call {external_call_id}")));
        }
        Ok(())
    }

    /// Mark or unmark a call for analysis.
    pub async fn set_selected(&self, external_call_id: &str, selected: bool) -> Result<()> {
        self.check_writable()?;
        let now = timestamp(&Utc::now());
        let changed = self
            .conn
            .execute(
                "UPDATE calls SET selected_for_analysis = ?1, updated_at = ?2
                 WHERE external_call_id = ?3",
                params![i64::from(selected), now.as_str(), external_call_id],
            )
            .await
            .map_err(|e| PocsyncError::Storage(e.to_string()))?;

        if changed == 0 {
            return Err(PocsyncError::not_found(format!("call {external_call_id}")));
        }
        Ok(())
    }
}

/// Fixed-width UTC timestamp, so text ordering matches time ordering.
fn timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PocsyncError::Storage(format!("invalid date: {e}")))
}

/// Convert a database row to a [`StoredCall`].
fn row_to_stored_call(row: &libsql::Row) -> Result<StoredCall> {
    let text = |idx: i32| -> Result<String> {
        row.get::<String>(idx)
            .map_err(|e| PocsyncError::Storage(e.to_string()))
    };

    let emails: Vec<String> = serde_json::from_str(&text(6)?)
        .map_err(|e| PocsyncError::Storage(format!("invalid participant emails: {e}")))?;

    Ok(StoredCall {
        id: text(0)?,
        account_domain: text(1)?,
        call: CallRecord {
            external_call_id: text(2)?,
            title: text(3)?,
            started_at: row
                .get::<String>(4)
                .ok()
                .map(|s| parse_timestamp(&s))
                .transpose()?,
            duration_seconds: row.get::<i64>(5).unwrap_or(0),
            participant_emails: emails,
            url: row.get::<String>(7).ok(),
        },
        transcript_text: row.get::<String>(8).ok(),
        transcript_fetched_at: row
            .get::<String>(9)
            .ok()
            .map(|s| parse_timestamp(&s))
            .transpose()?,
        selected_for_analysis: row.get::<i64>(10).unwrap_or(0) != 0,
        created_at: parse_timestamp(&text(11)?)?,
        updated_at: parse_timestamp(&text(12)?)?,
    })
}
