use thiserror::Error;

pub type Result<T> = std::result::Result<T, StreamError>;

/// Every failure the protocol can surface. None are recovered internally:
/// each one aborts the current operation and propagates to the caller.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("cipher initialization failed: {0}")]
    Init(String),

    #[error("protocol violation: {0}")]
    Protocol(&'static str),

    #[error("malformed stream: {0}")]
    Format(String),

    #[error("invalid session header: expected {expected} bytes, got {actual}")]
    InvalidHeader { expected: usize, actual: usize },

    /// MAC verification failed: corruption, tampering, wrong key, or an
    /// out-of-order record. Deliberately indistinguishable.
    #[error("record authentication failed: corrupted data, wrong key, or out-of-order record")]
    Auth,

    #[error("stream truncated: source ended after {records} records without a final record")]
    Truncated { records: u64 },

    #[error("chunk too large: {len} bytes (maximum {max})")]
    ChunkTooLarge { len: usize, max: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
