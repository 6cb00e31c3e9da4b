//! Stream driver: chunked encryption/decryption over `Read`/`Write`
//!
//! Both directions run in O(CHUNK_SIZE) memory regardless of input size.
//! The encrypt side buffers one chunk ahead of the one it seals: when the
//! look-ahead read yields zero bytes, the held chunk is the terminal one and
//! is sealed with the final tag. This keeps the terminal record correct for
//! empty sources (one empty final record) and for sources whose length is an
//! exact multiple of the chunk size (the last full chunk itself is final, no
//! trailing empty record).
//!
//! Decryption is not transactional: plaintext already written to the sink
//! before a later record fails authentication stays written. Callers needing
//! atomicity should write to a temporary path and rename.

use std::io::{self, Read, Write};

use tracing::debug;

use crate::error::{Result, StreamError};
use crate::key::StreamKey;
use crate::stream::{Decryptor, Encryptor};
use crate::{CHUNK_SIZE, HEADER_SIZE, RECORD_OVERHEAD};

/// Outcome of one encryption pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncryptSummary {
    /// Ciphertext records written (always ≥ 1; the last one is final).
    pub records: u64,
    /// Plaintext bytes consumed from the source.
    pub plaintext_bytes: u64,
    /// Total bytes written to the sink, header included.
    pub ciphertext_bytes: u64,
}

/// Outcome of one decryption pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecryptSummary {
    /// Ciphertext records opened.
    pub records: u64,
    /// Plaintext bytes written to the sink.
    pub plaintext_bytes: u64,
}

/// Fill `buf` as far as the source allows. A short count means end of
/// source, never a transient condition.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Encrypt `reader` to `writer` under `key`: session header first, then one
/// sealed record per chunk, the last record tagged final.
pub fn encrypt_stream<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    key: &StreamKey,
) -> Result<EncryptSummary> {
    let mut encryptor = Encryptor::new(key.clone());
    let header = encryptor.start()?;
    writer.write_all(&header)?;

    let mut summary = EncryptSummary {
        ciphertext_bytes: HEADER_SIZE as u64,
        ..Default::default()
    };

    let mut held = vec![0u8; CHUNK_SIZE];
    let mut ahead = vec![0u8; CHUNK_SIZE];
    let mut held_len = read_full(reader, &mut held)?;

    if held_len == 0 {
        // Empty source: exactly one empty final record.
        let record = encryptor.seal_empty()?;
        writer.write_all(&record)?;
        writer.flush()?;
        summary.records = 1;
        summary.ciphertext_bytes += record.len() as u64;
        debug!(records = 1, "encrypted empty stream");
        return Ok(summary);
    }

    loop {
        let ahead_len = read_full(reader, &mut ahead)?;
        let last = ahead_len == 0;

        let record = encryptor.seal_chunk(&held[..held_len], last)?;
        writer.write_all(&record)?;
        summary.records += 1;
        summary.plaintext_bytes += held_len as u64;
        summary.ciphertext_bytes += record.len() as u64;

        if last {
            break;
        }
        std::mem::swap(&mut held, &mut ahead);
        held_len = ahead_len;
    }

    writer.flush()?;
    debug!(
        records = summary.records,
        plaintext_bytes = summary.plaintext_bytes,
        ciphertext_bytes = summary.ciphertext_bytes,
        "encrypt stream complete"
    );
    Ok(summary)
}

/// Decrypt `reader` to `writer` under `key`. Stops after the final record;
/// fails with [`StreamError::Truncated`] if the source ends before one.
pub fn decrypt_stream<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    key: &StreamKey,
) -> Result<DecryptSummary> {
    let mut header = [0u8; HEADER_SIZE];
    let header_len = read_full(reader, &mut header)?;
    if header_len < HEADER_SIZE {
        return Err(StreamError::Format(format!(
            "stream too short for session header: {header_len} bytes (expected {HEADER_SIZE})"
        )));
    }

    let mut decryptor = Decryptor::new(key.clone());
    decryptor.start(&header)?;

    let mut summary = DecryptSummary::default();
    let mut buf = vec![0u8; CHUNK_SIZE + RECORD_OVERHEAD];

    loop {
        let n = read_full(reader, &mut buf)?;
        if n == 0 {
            return Err(StreamError::Truncated {
                records: summary.records,
            });
        }

        let (plaintext, tag) = decryptor.open_chunk(&buf[..n])?;
        writer.write_all(&plaintext)?;
        summary.records += 1;
        summary.plaintext_bytes += plaintext.len() as u64;

        if tag.is_final() {
            break;
        }
    }

    writer.flush()?;
    debug!(
        records = summary.records,
        plaintext_bytes = summary.plaintext_bytes,
        "decrypt stream complete"
    );
    Ok(summary)
}
