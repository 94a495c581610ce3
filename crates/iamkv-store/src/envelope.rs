use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::percent;

pub const POLICY_VERSION: &str = "2012-10-17";

/// Condition key whose value carries the chunk.
pub const PAYLOAD_KEY: &str = "aws:userid";

/// Condition key whose value carries the [`RecordMarker`] (primary tier only).
pub const MARKER_KEY: &str = "aws:PrincipalTag/iamkv-record";

/// Length and checksum of a whole record, stored next to its primary chunk.
///
/// A reader compares the marker with what it reassembled: a matching length
/// means the record is complete, a matching CRC means the tiers were written
/// by the same `set`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordMarker {
    pub total_len: usize,
    pub crc: u32,
}

impl RecordMarker {
    pub fn for_value(value: &str) -> Self {
        Self {
            total_len: value.len(),
            crc: crc32fast::hash(value.as_bytes()),
        }
    }

    /// Whether `value` has the length and checksum this marker records.
    pub fn matches(&self, value: &str) -> bool {
        value.len() == self.total_len && crc32fast::hash(value.as_bytes()) == self.crc
    }
}

impl std::fmt::Display for RecordMarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{:08x}", self.total_len, self.crc)
    }
}

impl std::str::FromStr for RecordMarker {
    type Err = StoreError;

    fn from_str(s: &str) -> StoreResult<Self> {
        let malformed = || StoreError::Envelope(format!("malformed record marker: {s:?}"));
        let (len, crc) = s.split_once(':').ok_or_else(malformed)?;
        Ok(Self {
            total_len: len.parse().map_err(|_| malformed())?,
            crc: u32::from_str_radix(crc, 16).map_err(|_| malformed())?,
        })
    }
}

/// Policy-shaped document wrapping one chunk.
///
/// Only the condition map carries data. The remaining fields are boilerplate
/// that lets the backing service accept the document as a policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Envelope {
    pub version: String,
    pub statement: Vec<Statement>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    pub effect: String,
    pub action: String,
    pub resource: String,
    pub condition: Condition,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "StringLike")]
    pub string_like: BTreeMap<String, String>,
}

/// Chunk extracted from a stored document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedChunk {
    pub payload: String,
    /// Present on primary chunks written by this crate; absent on secondary
    /// chunks and on records written before markers existed.
    pub marker: Option<RecordMarker>,
}

impl Envelope {
    /// Wrap a chunk, optionally tagging it with the record marker.
    pub fn wrap(chunk: &str, marker: Option<RecordMarker>) -> Self {
        let mut string_like = BTreeMap::new();
        string_like.insert(PAYLOAD_KEY.to_string(), chunk.to_string());
        if let Some(marker) = marker {
            string_like.insert(MARKER_KEY.to_string(), marker.to_string());
        }
        Self {
            version: POLICY_VERSION.into(),
            statement: vec![Statement {
                effect: "Allow".into(),
                action: "NONE:*".into(),
                resource: "*".into(),
                condition: Condition { string_like },
            }],
        }
    }

    /// Serialize to compact JSON, the form written to the backing service.
    pub fn encode(&self) -> StoreResult<String> {
        serde_json::to_string(self).map_err(|e| StoreError::Envelope(e.to_string()))
    }

    /// Parse a document exactly as the backing service returned it.
    pub fn decode(raw: &str) -> StoreResult<Self> {
        let json = percent::decode(raw)?;
        serde_json::from_str(&json).map_err(|e| StoreError::Envelope(e.to_string()))
    }

    /// Pull the chunk and marker out of the first statement.
    pub fn into_chunk(mut self) -> StoreResult<DecodedChunk> {
        if self.statement.is_empty() {
            return Err(StoreError::Envelope("document has no statements".into()));
        }
        let mut fields = self.statement.swap_remove(0).condition.string_like;
        let payload = fields
            .remove(PAYLOAD_KEY)
            .ok_or_else(|| StoreError::Envelope(format!("document lacks {PAYLOAD_KEY}")))?;
        let marker = fields.get(MARKER_KEY).map(|m| m.parse()).transpose()?;
        Ok(DecodedChunk { payload, marker })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_shape_matches_policy_grammar() {
        let doc = Envelope::wrap("cats-are-cool", None).encode().unwrap();
        assert_eq!(
            doc,
            r#"{"Version":"2012-10-17","Statement":[{"Effect":"Allow","Action":"NONE:*","Resource":"*","Condition":{"StringLike":{"aws:userid":"cats-are-cool"}}}]}"#
        );
    }

    #[test]
    fn chunk_survives_service_encoding() {
        let marker = RecordMarker::for_value("a \"quoted\" value");
        let doc = Envelope::wrap("a \"quoted\" value", Some(marker))
            .encode()
            .unwrap();
        let chunk = Envelope::decode(&percent::encode(&doc))
            .unwrap()
            .into_chunk()
            .unwrap();
        assert_eq!(chunk.payload, "a \"quoted\" value");
        assert_eq!(chunk.marker, Some(marker));
    }

    #[test]
    fn plain_json_also_decodes() {
        let doc = Envelope::wrap("plain", None).encode().unwrap();
        let chunk = Envelope::decode(&doc).unwrap().into_chunk().unwrap();
        assert_eq!(chunk.payload, "plain");
        assert!(chunk.marker.is_none());
    }

    #[test]
    fn boilerplate_round_trips() {
        let original = Envelope::wrap("x", None);
        let decoded = Envelope::decode(&original.encode().unwrap()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn wrong_shape_is_rejected() {
        assert!(Envelope::decode(r#"{"Version":"2012-10-17"}"#).is_err());
        assert!(Envelope::decode("not json").is_err());

        let empty = Envelope {
            version: POLICY_VERSION.into(),
            statement: vec![],
        };
        assert!(empty.into_chunk().is_err());
    }

    #[test]
    fn missing_payload_key_is_rejected() {
        let mut env = Envelope::wrap("x", None);
        env.statement[0].condition.string_like.clear();
        assert!(matches!(env.into_chunk(), Err(StoreError::Envelope(_))));
    }

    #[test]
    fn marker_text_form() {
        let marker = RecordMarker {
            total_len: 3000,
            crc: 0xdead_beef,
        };
        assert_eq!(marker.to_string(), "3000:deadbeef");
        assert_eq!("3000:deadbeef".parse::<RecordMarker>().unwrap(), marker);
        assert!("3000".parse::<RecordMarker>().is_err());
        assert!("x:deadbeef".parse::<RecordMarker>().is_err());
    }

    #[test]
    fn marker_detects_mismatch() {
        let marker = RecordMarker::for_value("hello");
        assert!(marker.matches("hello"));
        assert!(!marker.matches("hellp"));
        assert!(!marker.matches("hello!"));
    }
}
