//! Call-search domain types shared by the client, storage, and CLI.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PocsyncError, Result};

/// Lower bound used when a search does not name one.
pub const DEFAULT_SEARCH_FROM: &str = "2020-01-01T00:00:00Z";

// ---------------------------------------------------------------------------
// SearchFilter
// ---------------------------------------------------------------------------

/// Input to a call search. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchFilter {
    /// Lower-cased, trimmed account domain (e.g. `acme.com`).
    pub domain: String,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl SearchFilter {
    /// Build a filter, defaulting `from` to 2020-01-01 and `to` to now.
    pub fn new(
        domain: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Self> {
        let domain = domain.trim().to_lowercase();
        if domain.is_empty() {
            return Err(PocsyncError::validation("account domain must not be empty"));
        }

        let from = match from {
            Some(from) => from,
            None => DateTime::parse_from_rfc3339(DEFAULT_SEARCH_FROM)
                .map_err(|e| PocsyncError::validation(e.to_string()))?
                .with_timezone(&Utc),
        };
        let to = to.unwrap_or_else(Utc::now);

        if from > to {
            return Err(PocsyncError::validation(format!(
                "search range is empty: {} is after {}",
                format_api_time(&from),
                format_api_time(&to)
            )));
        }

        Ok(Self { domain, from, to })
    }

    /// `fromDateTime` as the API expects it (`%Y-%m-%dT%H:%M:%SZ`).
    pub fn from_param(&self) -> String {
        format_api_time(&self.from)
    }

    /// `toDateTime` as the API expects it.
    pub fn to_param(&self) -> String {
        format_api_time(&self.to)
    }

    /// Whether any of the (already lower-cased) emails belongs to the domain.
    pub fn matches_any(&self, emails: &[String]) -> bool {
        emails.iter().any(|email| email.contains(&self.domain))
    }
}

fn format_api_time(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Parse a search bound given as `YYYY-MM-DD` (midnight UTC) or RFC 3339.
pub fn parse_search_bound(value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| PocsyncError::validation(format!("invalid date '{value}'")))?;
        return Ok(Utc.from_utc_datetime(&midnight));
    }

    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| {
            PocsyncError::validation(format!(
                "invalid date '{value}': expected YYYY-MM-DD or RFC 3339 ({e})"
            ))
        })
}

// ---------------------------------------------------------------------------
// CallRecord
// ---------------------------------------------------------------------------

/// One call that matched a domain search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRecord {
    /// Upstream call identifier; the upsert key.
    pub external_call_id: String,
    pub title: String,
    /// `None` when the upstream start time is missing or unparseable.
    pub started_at: Option<DateTime<Utc>>,
    pub duration_seconds: i64,
    /// Lower-cased participant emails, upstream order.
    pub participant_emails: Vec<String>,
    /// Upstream web link to the call, if provided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

// ---------------------------------------------------------------------------
// TranscriptLine
// ---------------------------------------------------------------------------

/// One spoken sentence attributed to a speaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptLine {
    pub speaker_id: String,
    pub text: String,
}

impl std::fmt::Display for TranscriptLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[Speaker {}]: {}", self.speaker_id, self.text)
    }
}

/// Join transcript lines into the stored transcript text.
pub fn render_transcript(lines: &[TranscriptLine]) -> String {
    lines
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_defaults_and_normalizes_domain() {
        let filter = SearchFilter::new("  Acme.COM ", None, None).expect("filter");
        assert_eq!(filter.domain, "acme.com");
        assert_eq!(filter.from_param(), "2020-01-01T00:00:00Z");
        assert!(filter.to <= Utc::now());
    }

    #[test]
    fn filter_rejects_empty_domain_and_inverted_range() {
        assert!(SearchFilter::new("   ", None, None).is_err());

        let from = parse_search_bound("2024-06-01").unwrap();
        let to = parse_search_bound("2024-01-01").unwrap();
        let err = SearchFilter::new("acme.com", Some(from), Some(to)).unwrap_err();
        assert!(err.to_string().contains("search range is empty"));
    }

    #[test]
    fn filter_matches_substring() {
        let filter = SearchFilter::new("acme.com", None, None).unwrap();
        assert!(filter.matches_any(&["bob@eu.acme.com".into()]));
        assert!(!filter.matches_any(&["bob@example.org".into()]));
        assert!(!filter.matches_any(&[]));
    }

    #[test]
    fn parse_bounds() {
        let day = parse_search_bound("2024-03-05").unwrap();
        assert_eq!(day.to_rfc3339(), "2024-03-05T00:00:00+00:00");

        let ts = parse_search_bound("2024-03-05T10:30:00-02:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-03-05T12:30:00+00:00");

        assert!(parse_search_bound("March 5th").is_err());
    }

    #[test]
    fn transcript_rendering() {
        let lines = vec![
            TranscriptLine {
                speaker_id: "A".into(),
                text: "Hello".into(),
            },
            TranscriptLine {
                speaker_id: "B".into(),
                text: "World".into(),
            },
        ];
        assert_eq!(
            render_transcript(&lines),
            "[Speaker A]: Hello\n[Speaker B]: World"
        );
        assert_eq!(render_transcript(&[]), "");
    }
}
