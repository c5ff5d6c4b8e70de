//! Response payloads of the calls API, limited to the fields we read.
//!
//! The API omits or nulls fields freely, so every collection and scalar here
//! tolerates both.

use serde::{Deserialize, Deserializer};

/// Deserialize `null` as the type's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// POST /calls/extensive
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CallsPage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub calls: Vec<Call>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub records: Records,
}

/// Pagination block.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Records {
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_records: u64,
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Call {
    #[serde(default, deserialize_with = "null_as_default")]
    pub meta_data: CallMetaData,
    #[serde(default, deserialize_with = "null_as_default")]
    pub parties: Vec<Party>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CallMetaData {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub started: Option<String>,
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Party {
    #[serde(default)]
    pub email_address: Option<String>,
}

// ---------------------------------------------------------------------------
// POST /calls/transcript
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TranscriptResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub call_transcripts: Vec<CallTranscript>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CallTranscript {
    #[serde(default, deserialize_with = "null_as_default")]
    pub transcript: Vec<SpeakerSegment>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SpeakerSegment {
    /// String in practice; numbers are accepted too.
    #[serde(default)]
    pub speaker_id: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sentences: Vec<Sentence>,
}

impl SpeakerSegment {
    /// Speaker label, `Unknown` when absent.
    pub fn speaker_label(&self) -> String {
        match &self.speaker_id {
            Some(serde_json::Value::String(id)) => id.clone(),
            Some(serde_json::Value::Number(id)) => id.to_string(),
            _ => "Unknown".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Sentence {
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nulls_and_missing_fields_default() {
        let page: CallsPage = serde_json::from_str(
            r#"{"calls": [{"metaData": null, "parties": null}], "records": {"cursor": null}}"#,
        )
        .unwrap();
        assert_eq!(page.calls.len(), 1);
        assert!(page.calls[0].parties.is_empty());
        assert_eq!(page.records.total_records, 0);
        assert!(page.records.cursor.is_none());

        let empty: CallsPage = serde_json::from_str("{}").unwrap();
        assert!(empty.calls.is_empty());
    }

    #[test]
    fn speaker_labels() {
        let segments: Vec<SpeakerSegment> = serde_json::from_str(
            r#"[{"speakerId": "123"}, {"speakerId": 456}, {"speakerId": null}, {}]"#,
        )
        .unwrap();
        let labels: Vec<String> = segments.iter().map(SpeakerSegment::speaker_label).collect();
        assert_eq!(labels, ["123", "456", "Unknown", "Unknown"]);
    }
}
