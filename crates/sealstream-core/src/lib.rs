//! sealstream-core: chunked authenticated streaming encryption
//!
//! Architecture: secretstream-style framing over XChaCha20-Poly1305
//!
//! Wire layout:
//! ```text
//! [16 bytes: session header (random nonce prefix)]
//! [record 1][record 2]...[record n]
//!
//! record = AEAD_seal( tag_byte || plaintext )   nonce = prefix || counter_be64
//! tag_byte: 0x00 = continue, 0x01 = final (exactly one final, always last)
//! overhead per record: 1 tag byte + 16-byte Poly1305 tag = 17 bytes
//! ```
//!
//! The chunk counter lives in the nonce, so records only authenticate at the
//! position they were sealed at — replayed or reordered records fail. The
//! continue/final tag rides inside the AEAD envelope, so decryption is
//! self-terminating and a missing final record is detectable as truncation.
//!
//! Record boundaries are implicit: both sides split at [`CHUNK_SIZE`], which
//! is not encoded on the wire and must match between producer and consumer.

pub mod codec;
pub mod error;
pub mod key;
pub mod stream;

// Convenience re-exports for the most common operations
pub use codec::{decrypt_stream, encrypt_stream, DecryptSummary, EncryptSummary};
pub use error::{Result, StreamError};
pub use key::StreamKey;
pub use stream::{ChunkTag, Decryptor, Encryptor};

/// Size of a stream key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of the public session header (the random nonce prefix)
pub const HEADER_SIZE: usize = 16;

/// Size of an XChaCha20-Poly1305 nonce (192-bit): prefix || counter
pub const NONCE_SIZE: usize = 24;

/// Size of a Poly1305 authentication tag
pub const TAG_SIZE: usize = 16;

/// Fixed per-record overhead: chunk tag byte + Poly1305 tag
pub const RECORD_OVERHEAD: usize = 1 + TAG_SIZE;

/// Plaintext bytes per record. Shared by both directions and not encoded in
/// the wire format — changing it breaks compatibility with existing streams.
pub const CHUNK_SIZE: usize = 64 * 1024;
