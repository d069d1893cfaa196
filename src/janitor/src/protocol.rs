//! Protocol descriptors and per-commit checksum records.
//!
//! Every commit may be accompanied by a checksum record (a small JSON file)
//! whose `protocol` field declares the reader/writer versions and feature
//! names required to interpret that commit. The protection gate compares
//! those descriptors against the local client's capability set.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Declared requirements for reading and writing a table version.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Protocol {
    pub min_reader_version: i32,
    pub min_writer_version: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reader_features: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub writer_features: Vec<String>,
}

impl Protocol {
    pub fn new(min_reader_version: i32, min_writer_version: i32) -> Self {
        Self {
            min_reader_version,
            min_writer_version,
            reader_features: Vec::new(),
            writer_features: Vec::new(),
        }
    }

    pub fn with_writer_features<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.writer_features = features.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_reader_features<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reader_features = features.into_iter().map(Into::into).collect();
        self
    }
}

/// Per-commit checksum record. Only the protocol field matters to cleanup;
/// the size and file counts ride along for operators.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecksumRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_size_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_files: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Protocol>,
}

/// The local client's protocol support, evaluated against [`Protocol`]
/// descriptors found in checksum records.
#[derive(Clone, Debug)]
pub struct ClientCapabilities {
    pub max_reader_version: i32,
    pub max_writer_version: i32,
    pub reader_features: HashSet<String>,
    pub writer_features: HashSet<String>,
}

impl Default for ClientCapabilities {
    fn default() -> Self {
        Self {
            max_reader_version: 3,
            max_writer_version: 7,
            reader_features: HashSet::new(),
            writer_features: HashSet::new(),
        }
    }
}

impl ClientCapabilities {
    pub fn with_reader_features<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reader_features = features.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_writer_features<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.writer_features = features.into_iter().map(Into::into).collect();
        self
    }

    /// Can this client read versions governed by `protocol`?
    pub fn supported_for_read(&self, protocol: &Protocol) -> bool {
        protocol.min_reader_version <= self.max_reader_version
            && protocol
                .reader_features
                .iter()
                .all(|f| self.reader_features.contains(f))
    }

    /// Can this client write versions governed by `protocol`? Writing
    /// implies reading.
    pub fn supported_for_write(&self, protocol: &Protocol) -> bool {
        self.supported_for_read(protocol)
            && protocol.min_writer_version <= self.max_writer_version
            && protocol
                .writer_features
                .iter()
                .all(|f| self.writer_features.contains(f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_gating() {
        let caps = ClientCapabilities {
            max_reader_version: 2,
            max_writer_version: 5,
            ..Default::default()
        };
        assert!(caps.supported_for_read(&Protocol::new(1, 2)));
        assert!(!caps.supported_for_read(&Protocol::new(3, 7)));
        assert!(caps.supported_for_write(&Protocol::new(2, 5)));
        assert!(!caps.supported_for_write(&Protocol::new(2, 6)));
    }

    #[test]
    fn feature_gating() {
        let caps = ClientCapabilities::default()
            .with_reader_features(["deletionVectors"])
            .with_writer_features(["deletionVectors", "appendOnly"]);

        let supported = Protocol::new(3, 7)
            .with_reader_features(["deletionVectors"])
            .with_writer_features(["appendOnly"]);
        assert!(caps.supported_for_read(&supported));
        assert!(caps.supported_for_write(&supported));

        let unsupported = Protocol::new(3, 7).with_writer_features(["columnMapping"]);
        assert!(caps.supported_for_read(&unsupported));
        assert!(!caps.supported_for_write(&unsupported));
    }

    #[test]
    fn checksum_record_round_trips_camel_case() {
        let json = r#"{"tableSizeBytes":10,"numFiles":2,"protocol":{
            "minReaderVersion":3,"minWriterVersion":7,
            "writerFeatures":["rowTracking"]}}"#;
        let record: ChecksumRecord = serde_json::from_str(json).unwrap();
        let protocol = record.protocol.unwrap();
        assert_eq!(protocol.min_reader_version, 3);
        assert_eq!(protocol.writer_features, vec!["rowTracking".to_string()]);
        assert!(protocol.reader_features.is_empty());
    }

    #[test]
    fn checksum_record_without_protocol() {
        let record: ChecksumRecord = serde_json::from_str(r#"{"numFiles":5}"#).unwrap();
        assert!(record.protocol.is_none());
    }
}
