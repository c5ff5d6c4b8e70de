//! Transcript retrieval and flattening.

use reqwest::Method;
use serde_json::json;
use tracing::{info, instrument, warn};

use pocsync_shared::{Result, TranscriptLine, render_transcript};

use crate::CallsClient;
use crate::wire::TranscriptResponse;

/// Transcript endpoint, relative to the base URL.
pub const TRANSCRIPT_PATH: &str = "/calls/transcript";

impl CallsClient {
    /// Fetch a call's transcript as ordered speaker lines.
    ///
    /// Blank sentences are dropped. A call without a transcript yields an
    /// empty list.
    #[instrument(skip(self))]
    pub async fn transcript_lines(&self, call_id: &str) -> Result<Vec<TranscriptLine>> {
        let body = json!({
            "filter": {
                "callIds": [call_id],
            },
        });

        let response: TranscriptResponse = self
            .executor()
            .execute(Method::POST, TRANSCRIPT_PATH, Some(&body))
            .await?;

        if response.call_transcripts.is_empty() {
            warn!("no transcript available for call");
            return Ok(Vec::new());
        }

        let mut lines = Vec::new();
        for entry in &response.call_transcripts {
            for segment in &entry.transcript {
                let speaker_id = segment.speaker_label();
                for sentence in &segment.sentences {
                    let text = sentence.text.trim();
                    if !text.is_empty() {
                        lines.push(TranscriptLine {
                            speaker_id: speaker_id.clone(),
                            text: text.to_string(),
                        });
                    }
                }
            }
        }

        Ok(lines)
    }

    /// Fetch a call's transcript as `[Speaker <id>]: <text>` lines joined by
    /// newlines. Empty when the call has no transcript.
    pub async fn assemble_transcript(&self, call_id: &str) -> Result<String> {
        let lines = self.transcript_lines(call_id).await?;
        let text = render_transcript(&lines);
        info!(call_id, lines = lines.len(), chars = text.len(), "transcript assembled");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::test_support::test_client;

    #[tokio::test]
    async fn flattens_segments_in_order_and_drops_blank_sentences() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TRANSCRIPT_PATH))
            .and(body_json(json!({"filter": {"callIds": ["call-1"]}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "callTranscripts": [{
                    "callId": "call-1",
                    "transcript": [
                        {"speakerId": "A", "sentences": [
                            {"start": 0, "end": 900, "text": "Hello"},
                            {"start": 900, "end": 1000, "text": ""},
                        ]},
                        {"speakerId": "B", "sentences": [
                            {"start": 1000, "end": 1800, "text": "World"},
                        ]},
                    ],
                }],
            })))
            .expect(2)
            .mount(&server)
            .await;

        let (client, _) = test_client(&server.uri());
        let text = client.assemble_transcript("call-1").await.expect("transcript");
        assert_eq!(text, "[Speaker A]: Hello\n[Speaker B]: World");

        // Same upstream data, same text.
        let again = client.assemble_transcript("call-1").await.expect("transcript");
        assert_eq!(again, text);
    }

    #[tokio::test]
    async fn missing_transcript_is_empty_not_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TRANSCRIPT_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "requestId": "r1",
                "callTranscripts": [],
            })))
            .mount(&server)
            .await;

        let (client, _) = test_client(&server.uri());
        assert_eq!(client.assemble_transcript("call-2").await.unwrap(), "");
        assert!(client.transcript_lines("call-2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sentences_are_trimmed_and_missing_speaker_is_unknown() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "callTranscripts": [
                    {"transcript": [{"sentences": [{"text": "  padded  "}, {"text": "   "}]}]},
                    {"transcript": [{"speakerId": 42, "sentences": [{"text": "second entry"}]}]},
                ],
            })))
            .mount(&server)
            .await;

        let (client, _) = test_client(&server.uri());
        let lines = client.transcript_lines("call-3").await.unwrap();
        assert_eq!(
            lines,
            vec![
                TranscriptLine {
                    speaker_id: "Unknown".into(),
                    text: "padded".into(),
                },
                TranscriptLine {
                    speaker_id: "42".into(),
                    text: "second entry".into(),
                },
            ]
        );
    }
}
