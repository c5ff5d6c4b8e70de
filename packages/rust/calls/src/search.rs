//! Cursor-driven call search filtered by participant email domain.

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::json;
use tracing::{debug, info, instrument};

use pocsync_shared::{CallRecord, Result, SearchFilter};

use crate::CallsClient;
use crate::wire::{Call, CallsPage};

/// Search endpoint, relative to the base URL.
pub const SEARCH_PATH: &str = "/calls/extensive";

impl CallsClient {
    /// Find every call with a participant email containing `domain`.
    ///
    /// `from` defaults to 2020-01-01, `to` to now.
    pub async fn search_by_domain(
        &self,
        domain: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<CallRecord>> {
        let filter = SearchFilter::new(domain, from, to)?;
        self.search(&filter).await
    }

    /// Page through the search endpoint and collect matching calls.
    ///
    /// Pages are fetched one at a time, each carrying the previous cursor.
    /// Stops when the cursor runs out or when the match count reaches the
    /// upstream `totalRecords`. That total counts every call in range, not
    /// only matches, so the second condition can end the search early.
    #[instrument(skip_all, fields(domain = %filter.domain))]
    pub async fn search(&self, filter: &SearchFilter) -> Result<Vec<CallRecord>> {
        let mut matches: Vec<CallRecord> = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let mut body = json!({
                "filter": {
                    "fromDateTime": filter.from_param(),
                    "toDateTime": filter.to_param(),
                },
                "contentSelector": {
                    "exposedFields": {
                        "parties": true,
                    },
                },
            });
            if let Some(cursor) = &cursor {
                body["cursor"] = json!(cursor);
            }

            let page: CallsPage = self
                .executor()
                .execute(Method::POST, SEARCH_PATH, Some(&body))
                .await?;
            pages += 1;

            let before = matches.len();
            matches.extend(page.calls.into_iter().filter_map(|call| to_record(call, filter)));

            cursor = page.records.cursor.filter(|c| !c.is_empty());
            let total = page.records.total_records;

            debug!(
                page = pages,
                matched = matches.len() - before,
                total_records = total,
                has_cursor = cursor.is_some(),
                "search page processed"
            );

            if cursor.is_none() || matches.len() as u64 >= total {
                break;
            }
        }

        info!(
            matches = matches.len(),
            pages,
            "call search completed"
        );
        Ok(matches)
    }
}

/// Build a record when any participant email matches the filter's domain.
fn to_record(call: Call, filter: &SearchFilter) -> Option<CallRecord> {
    let emails: Vec<String> = call
        .parties
        .into_iter()
        .filter_map(|party| party.email_address)
        .filter(|email| !email.is_empty())
        .map(|email| email.to_lowercase())
        .collect();

    if !filter.matches_any(&emails) {
        return None;
    }

    let meta = call.meta_data;
    Some(CallRecord {
        external_call_id: meta.id,
        title: meta.title.unwrap_or_default(),
        started_at: meta
            .started
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|ts| ts.with_timezone(&Utc)),
        duration_seconds: meta.duration.unwrap_or(0),
        participant_emails: emails,
        url: meta.url.filter(|u| !u.is_empty()),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::Value;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    use super::*;
    use crate::test_support::test_client;

    fn call(id: &str, emails: &[&str]) -> Value {
        let parties: Vec<Value> = emails
            .iter()
            .map(|e| json!({"emailAddress": e, "name": "someone"}))
            .collect();
        json!({
            "metaData": {
                "id": id,
                "title": format!("Call {id}"),
                "started": "2024-05-01T15:00:00-07:00",
                "duration": 1800,
                "url": format!("https://app.example.com/call?id={id}"),
            },
            "parties": parties,
        })
    }

    #[tokio::test]
    async fn two_pages_stop_at_total_records() {
        let server = MockServer::start().await;

        // Page 2 is keyed on the cursor from page 1; mounted first so it wins.
        Mock::given(method("POST"))
            .and(path(SEARCH_PATH))
            .and(body_partial_json(json!({"cursor": "page-2"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "records": {"totalRecords": 3, "cursor": "page-3"},
                "calls": [call("c4", &["Dana@ACME.com"])],
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path(SEARCH_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "records": {"totalRecords": 3, "cursor": "page-2"},
                "calls": [
                    call("c1", &["alice@acme.com", "rep@vendor.io"]),
                    call("c2", &["rep@vendor.io"]),
                    call("c3", &["bob@eu.acme.com"]),
                ],
            })))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;

        let (client, _) = test_client(&server.uri());
        let records = client
            .search_by_domain("acme.com", None, None)
            .await
            .expect("search");

        let ids: Vec<&str> = records.iter().map(|r| r.external_call_id.as_str()).collect();
        assert_eq!(ids, ["c1", "c3", "c4"]);
        assert_eq!(records[2].participant_emails, ["dana@acme.com"]);
        assert_eq!(records[0].duration_seconds, 1800);
        assert_eq!(
            records[0].started_at.unwrap().to_rfc3339(),
            "2024-05-01T22:00:00+00:00"
        );
        assert_eq!(
            records[0].url.as_deref(),
            Some("https://app.example.com/call?id=c1")
        );
    }

    #[tokio::test]
    async fn request_carries_date_range_and_party_flag() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SEARCH_PATH))
            .and(body_partial_json(json!({
                "filter": {
                    "fromDateTime": "2024-01-01T00:00:00Z",
                    "toDateTime": "2024-02-01T00:00:00Z",
                },
                "contentSelector": {"exposedFields": {"parties": true}},
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "records": {"totalRecords": 0},
                "calls": [],
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (client, _) = test_client(&server.uri());
        let from = pocsync_shared::parse_search_bound("2024-01-01").unwrap();
        let to = pocsync_shared::parse_search_bound("2024-02-01").unwrap();
        let records = client
            .search_by_domain("acme.com", Some(from), Some(to))
            .await
            .expect("search");
        assert!(records.is_empty());

        let requests: Vec<Request> = server.received_requests().await.unwrap();
        let sent: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert!(sent.get("cursor").is_none());
    }

    #[tokio::test]
    async fn empty_cursor_ends_search() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "records": {"totalRecords": 50, "cursor": ""},
                "calls": [call("c1", &["a@acme.com"]), call("c2", &[])],
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (client, _) = test_client(&server.uri());
        let records = client
            .search_by_domain("acme.com", None, None)
            .await
            .expect("search");
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn total_records_can_end_search_before_cursor_runs_out() {
        // totalRecords counts all calls in range. Once the match count
        // reaches it, later pages are never requested even if they would
        // have matched.
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "records": {"totalRecords": 2, "cursor": "more"},
                "calls": [call("c1", &["a@acme.com"]), call("c2", &["b@acme.com"])],
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (client, _) = test_client(&server.uri());
        let records = client
            .search_by_domain("acme.com", None, None)
            .await
            .expect("search");
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn upstream_errors_propagate() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
            .expect(1)
            .mount(&server)
            .await;

        let (client, _) = test_client(&server.uri());
        let err = client
            .search_by_domain("acme.com", None, None)
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 401);
    }

    #[test]
    fn parties_without_email_are_ignored() {
        let filter = SearchFilter::new("acme.com", None, None).unwrap();
        let call: Call = serde_json::from_value(json!({
            "metaData": {"id": "c9", "started": "not a date"},
            "parties": [{"name": "dial-in"}, {"emailAddress": ""}, {"emailAddress": "X@Acme.com"}],
        }))
        .unwrap();

        let record = to_record(call, &filter).expect("matches");
        assert_eq!(record.participant_emails, ["x@acme.com"]);
        assert_eq!(record.title, "");
        assert!(record.started_at.is_none());
        assert_eq!(record.duration_seconds, 0);
        assert!(record.url.is_none());
    }
}
