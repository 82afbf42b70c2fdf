//! Snapshot container for the value store.
//!
//! A snapshot is MessagePack (via `rmp_serde`) wrapped in gzip and then in
//! standard base64, so the persisted artifact is plain text. Records are
//! written in recency order together with their usage counters.

use std::{collections::BTreeMap, io::Read};

use base64::{Engine, engine::general_purpose::STANDARD};
use flate2::{Compression, read::GzDecoder, write::GzEncoder};
use serde::{Deserialize, Serialize};

use crate::{
    error::CodecError,
    types::{ActionSet, EncodedSnapshot, StateKey},
};

/// Current container format version.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SnapshotFile {
    pub version: u32,
    pub actions: Vec<String>,
    pub records: Vec<FileRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct FileRecord {
    pub key: StateKey,
    pub usage: u64,
    pub last_touch: u64,
    pub values: BTreeMap<String, f64>,
}

/// One row copied out of the live store.
#[derive(Debug, Clone)]
pub(crate) struct RowRecord {
    pub key: StateKey,
    pub usage: u64,
    pub last_touch: u64,
    pub values: Box<[f64]>,
}

/// Point-in-time copy of a value store, detached from the live table.
///
/// Taken on the decision path by [`super::ValueStore::snapshot_records`] and
/// handed to the persistence worker, which does the expensive encoding.
#[derive(Debug, Clone)]
pub struct SnapshotRecords {
    actions: ActionSet,
    records: Vec<RowRecord>,
}

impl SnapshotRecords {
    pub(crate) fn new(actions: ActionSet, records: Vec<RowRecord>) -> Self {
        Self { actions, records }
    }

    /// Number of rows in the copy.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Encode the copy into its persisted text form.
    pub fn encode(&self) -> Result<EncodedSnapshot, CodecError> {
        let mut records: Vec<FileRecord> = self
            .records
            .iter()
            .map(|row| FileRecord {
                key: row.key.clone(),
                usage: row.usage,
                last_touch: row.last_touch,
                values: self
                    .actions
                    .actions()
                    .filter_map(|action| {
                        let value = *row.values.get(action.index())?;
                        Some((self.actions.token(action).to_string(), value))
                    })
                    .collect(),
            })
            .collect();
        records.sort_by_key(|record| record.last_touch);

        let file = SnapshotFile {
            version: SNAPSHOT_VERSION,
            actions: self.actions.tokens().to_vec(),
            records,
        };
        encode_container(&file)
    }
}

pub(crate) fn encode_container(file: &SnapshotFile) -> Result<EncodedSnapshot, CodecError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    rmp_serde::encode::write(&mut encoder, file)?;
    let compressed = encoder.finish().map_err(CodecError::Compress)?;
    Ok(EncodedSnapshot::from(STANDARD.encode(compressed)))
}

pub(crate) fn decode_container(snapshot: &EncodedSnapshot) -> Result<SnapshotFile, CodecError> {
    let compressed = STANDARD.decode(snapshot.as_str().trim())?;
    let mut packed = Vec::with_capacity(compressed.len() * 4);
    GzDecoder::new(compressed.as_slice())
        .read_to_end(&mut packed)
        .map_err(CodecError::Decompress)?;

    let file: SnapshotFile = rmp_serde::from_slice(&packed)?;
    if file.version != SNAPSHOT_VERSION {
        return Err(CodecError::UnsupportedVersion {
            found: file.version,
            expected: SNAPSHOT_VERSION,
        });
    }
    Ok(file)
}

/// Summary of a snapshot without loading it into a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotSummary {
    pub version: u32,
    pub actions: Vec<String>,
    pub records: usize,
}

/// Read the header information of an encoded snapshot.
pub fn summarize(snapshot: &EncodedSnapshot) -> Result<SnapshotSummary, CodecError> {
    let file = decode_container(snapshot)?;
    Ok(SnapshotSummary {
        version: file.version,
        actions: file.actions,
        records: file.records.len(),
    })
}
