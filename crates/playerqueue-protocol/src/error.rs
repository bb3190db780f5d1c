//! Error types for the protocol layer.
//!
//! Every variant here is a *protocol* fault: the frame is dropped and the
//! connection stays open. Transport failures live in the transport crate.

use crate::Op;

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// The frame is not a valid envelope: malformed JSON, missing `op`,
    /// or `op` is not an integer.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// The envelope carried an operation code outside the known set.
    #[error("unknown op {0}")]
    UnknownOp(i64),

    /// A known operation arrived in the wrong direction, e.g. a client
    /// sending `StartGame`.
    #[error("op {0} is not valid in this direction")]
    UnexpectedOp(Op),

    /// The envelope was fine but its payload does not match the shape
    /// required by its operation.
    #[error("invalid {op} payload: {source}")]
    Payload {
        op: Op,
        #[source]
        source: serde_json::Error,
    },

    /// A value violates a protocol rule after successful decoding.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
