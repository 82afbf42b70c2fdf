//! Error types for the squaro-agent crate

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the squaro-agent crate
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("invalid action set: {reason}")]
    InvalidActionSet { reason: String },

    #[error("unknown action token '{token}' (expected one of: {expected})")]
    UnknownAction { token: String, expected: String },

    #[error("snapshot storage at {path:?} is unavailable: {source}")]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write snapshot to {path:?}: {message}")]
    StorageWriteFailure { path: PathBuf, message: String },

}

/// Failures while encoding or decoding state keys and snapshot containers.
///
/// Codec failures are scoped to a single record wherever possible; the store
/// never treats one of these as fatal for the entries around it.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CodecError {
    #[error("empty state key")]
    Empty,

    #[error("payload is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("failed to compress payload: {0}")]
    Compress(#[source] std::io::Error),

    #[error("payload is truncated or not a valid compressed stream: {0}")]
    Decompress(#[source] std::io::Error),

    #[error("failed to serialize state: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("state contains a non-finite number")]
    NonFiniteState,

    #[error("decoded state is malformed: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("failed to encode snapshot container: {0}")]
    ContainerEncode(#[from] rmp_serde::encode::Error),

    #[error("snapshot container is corrupt: {0}")]
    ContainerDecode(#[from] rmp_serde::decode::Error),

    #[error("unsupported snapshot version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("value for action '{action}' is not finite")]
    NonFiniteValue { action: String },
}

/// Convenience type alias for Results using the crate's Error type
pub type Result<T> = std::result::Result<T, Error>;
