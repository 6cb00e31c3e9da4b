//! Encrypt/decrypt session state machines
//!
//! Both sides walk `Created → Started → Streaming → Finalized` and must
//! process records strictly in the order they were sealed: the chunk counter
//! is part of the nonce, so a record opened at the wrong position fails
//! authentication rather than decrypting garbage.
//!
//! The continue/final tag is a single byte prepended to the plaintext before
//! sealing. It travels inside the AEAD envelope, so the receiver learns it
//! only after a record has authenticated.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;

use crate::error::{Result, StreamError};
use crate::key::StreamKey;
use crate::{CHUNK_SIZE, HEADER_SIZE, NONCE_SIZE, RECORD_OVERHEAD};

/// Marker carried inside every authenticated record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkTag {
    /// More records follow.
    Continue,
    /// Last record of the stream. Exactly one per stream.
    Final,
}

impl ChunkTag {
    const CONTINUE_BYTE: u8 = 0x00;
    const FINAL_BYTE: u8 = 0x01;

    fn to_byte(self) -> u8 {
        match self {
            ChunkTag::Continue => Self::CONTINUE_BYTE,
            ChunkTag::Final => Self::FINAL_BYTE,
        }
    }

    fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            Self::CONTINUE_BYTE => Ok(ChunkTag::Continue),
            Self::FINAL_BYTE => Ok(ChunkTag::Final),
            other => Err(StreamError::Format(format!(
                "unknown chunk tag byte: {other:#04x}"
            ))),
        }
    }

    pub fn is_final(self) -> bool {
        matches!(self, ChunkTag::Final)
    }
}

/// Evolving cryptographic state of one session. Owned exclusively by one
/// [`Encryptor`] or [`Decryptor`]; never cloned, shared, or rewound.
struct SessionState {
    cipher: XChaCha20Poly1305,
    nonce_prefix: [u8; HEADER_SIZE],
    counter: u64,
}

impl SessionState {
    fn new(key: &StreamKey, nonce_prefix: [u8; HEADER_SIZE]) -> Result<Self> {
        let cipher = XChaCha20Poly1305::new_from_slice(key.as_bytes())
            .map_err(|e| StreamError::Init(format!("bad key length: {e}")))?;
        Ok(Self {
            cipher,
            nonce_prefix,
            counter: 0,
        })
    }

    /// Nonce for the next record: prefix || big-endian chunk counter.
    fn next_nonce(&mut self) -> Result<[u8; NONCE_SIZE]> {
        let mut nonce = [0u8; NONCE_SIZE];
        nonce[..HEADER_SIZE].copy_from_slice(&self.nonce_prefix);
        nonce[HEADER_SIZE..].copy_from_slice(&self.counter.to_be_bytes());
        self.counter = self
            .counter
            .checked_add(1)
            .ok_or(StreamError::Protocol("chunk counter exhausted"))?;
        Ok(nonce)
    }
}

/// Sender side of one encryption session.
pub struct Encryptor {
    key: StreamKey,
    state: Option<SessionState>,
    finalized: bool,
}

impl Encryptor {
    pub fn new(key: StreamKey) -> Self {
        Self {
            key,
            state: None,
            finalized: false,
        }
    }

    /// Initialize the session and return its public header. The header must
    /// reach the receiver verbatim, ahead of any record.
    pub fn start(&mut self) -> Result<[u8; HEADER_SIZE]> {
        if self.state.is_some() {
            return Err(StreamError::Protocol("encrypt session already started"));
        }

        let mut nonce_prefix = [0u8; HEADER_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_prefix);

        self.state = Some(SessionState::new(&self.key, nonce_prefix)?);
        Ok(nonce_prefix)
    }

    /// Seal one chunk into a ciphertext record of
    /// `plaintext.len() + RECORD_OVERHEAD` bytes. `last` marks the record as
    /// the terminal one; no further chunks are accepted after it.
    pub fn seal_chunk(&mut self, plaintext: &[u8], last: bool) -> Result<Vec<u8>> {
        if plaintext.len() > CHUNK_SIZE {
            return Err(StreamError::ChunkTooLarge {
                len: plaintext.len(),
                max: CHUNK_SIZE,
            });
        }
        if self.finalized {
            return Err(StreamError::Protocol("final chunk already sealed"));
        }
        let state = self
            .state
            .as_mut()
            .ok_or(StreamError::Protocol("seal_chunk called before start"))?;

        let tag = if last {
            ChunkTag::Final
        } else {
            ChunkTag::Continue
        };

        let nonce = state.next_nonce()?;
        let mut framed = Vec::with_capacity(plaintext.len() + 1);
        framed.push(tag.to_byte());
        framed.extend_from_slice(plaintext);

        let record = state
            .cipher
            .encrypt(XNonce::from_slice(&nonce), framed.as_slice())
            .map_err(|_| StreamError::Init("AEAD seal failed".to_string()))?;

        if last {
            self.finalized = true;
        }
        Ok(record)
    }

    /// Terminate the session with a zero-length final record. Needed when
    /// the source was empty, or when the last data-bearing chunk exactly
    /// filled the chunk boundary and nothing remains.
    pub fn seal_empty(&mut self) -> Result<Vec<u8>> {
        self.seal_chunk(&[], true)
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }
}

/// Receiver side of one decryption session.
pub struct Decryptor {
    key: StreamKey,
    state: Option<SessionState>,
    finalized: bool,
}

impl Decryptor {
    pub fn new(key: StreamKey) -> Self {
        Self {
            key,
            state: None,
            finalized: false,
        }
    }

    /// Initialize the session from the sender's header. A wrong key is not
    /// detectable here; it surfaces as [`StreamError::Auth`] on the first
    /// record.
    pub fn start(&mut self, header: &[u8]) -> Result<()> {
        if self.state.is_some() {
            return Err(StreamError::Protocol("decrypt session already started"));
        }

        let nonce_prefix: [u8; HEADER_SIZE] =
            header
                .try_into()
                .map_err(|_| StreamError::InvalidHeader {
                    expected: HEADER_SIZE,
                    actual: header.len(),
                })?;

        self.state = Some(SessionState::new(&self.key, nonce_prefix)?);
        Ok(())
    }

    /// Open one ciphertext record, returning the plaintext and the tag found
    /// inside it. A [`ChunkTag::Final`] tag finalizes the session.
    pub fn open_chunk(&mut self, record: &[u8]) -> Result<(Vec<u8>, ChunkTag)> {
        if self.finalized {
            return Err(StreamError::Protocol("record after final chunk"));
        }
        let state = self
            .state
            .as_mut()
            .ok_or(StreamError::Protocol("open_chunk called before start"))?;

        // Anything shorter cannot carry the tag byte and a valid MAC.
        if record.len() < RECORD_OVERHEAD {
            return Err(StreamError::Auth);
        }

        let nonce = state.next_nonce()?;
        let mut framed = state
            .cipher
            .decrypt(XNonce::from_slice(&nonce), record)
            .map_err(|_| StreamError::Auth)?;

        let tag = ChunkTag::from_byte(framed[0])?;
        let plaintext = framed.split_off(1);

        if tag.is_final() {
            self.finalized = true;
        }
        Ok((plaintext, tag))
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_pair() -> (Encryptor, Decryptor) {
        let key = StreamKey::generate();
        (Encryptor::new(key.clone()), Decryptor::new(key))
    }

    #[test]
    fn test_single_record_roundtrip() {
        let (mut enc, mut dec) = session_pair();
        let header = enc.start().unwrap();
        let record = enc.seal_chunk(b"hello streaming world!", true).unwrap();
        assert_eq!(record.len(), b"hello streaming world!".len() + RECORD_OVERHEAD);

        dec.start(&header).unwrap();
        let (plaintext, tag) = dec.open_chunk(&record).unwrap();
        assert_eq!(plaintext, b"hello streaming world!");
        assert_eq!(tag, ChunkTag::Final);
        assert!(dec.is_finalized());
    }

    #[test]
    fn test_multi_record_tags() {
        let (mut enc, mut dec) = session_pair();
        let header = enc.start().unwrap();
        let r1 = enc.seal_chunk(b"first", false).unwrap();
        let r2 = enc.seal_chunk(b"second", false).unwrap();
        let r3 = enc.seal_chunk(b"third", true).unwrap();

        dec.start(&header).unwrap();
        assert_eq!(dec.open_chunk(&r1).unwrap(), (b"first".to_vec(), ChunkTag::Continue));
        assert_eq!(dec.open_chunk(&r2).unwrap(), (b"second".to_vec(), ChunkTag::Continue));
        assert_eq!(dec.open_chunk(&r3).unwrap(), (b"third".to_vec(), ChunkTag::Final));
    }

    #[test]
    fn test_empty_final_record() {
        let (mut enc, mut dec) = session_pair();
        let header = enc.start().unwrap();
        let record = enc.seal_empty().unwrap();
        assert_eq!(record.len(), RECORD_OVERHEAD);

        dec.start(&header).unwrap();
        let (plaintext, tag) = dec.open_chunk(&record).unwrap();
        assert!(plaintext.is_empty());
        assert!(tag.is_final());
    }

    #[test]
    fn test_seal_before_start() {
        let (mut enc, _) = session_pair();
        let result = enc.seal_chunk(b"data", false);
        assert!(matches!(result, Err(StreamError::Protocol(_))));
    }

    #[test]
    fn test_double_start() {
        let (mut enc, _) = session_pair();
        enc.start().unwrap();
        assert!(matches!(enc.start(), Err(StreamError::Protocol(_))));
    }

    #[test]
    fn test_seal_after_final() {
        let (mut enc, _) = session_pair();
        enc.start().unwrap();
        enc.seal_chunk(b"last", true).unwrap();
        assert!(enc.is_finalized());
        let result = enc.seal_chunk(b"more", false);
        assert!(matches!(result, Err(StreamError::Protocol(_))));
    }

    #[test]
    fn test_open_before_start() {
        let (_, mut dec) = session_pair();
        let result = dec.open_chunk(&[0u8; 64]);
        assert!(matches!(result, Err(StreamError::Protocol(_))));
    }

    #[test]
    fn test_open_after_final() {
        let (mut enc, mut dec) = session_pair();
        let header = enc.start().unwrap();
        let r1 = enc.seal_chunk(b"only", true).unwrap();
        dec.start(&header).unwrap();
        dec.open_chunk(&r1).unwrap();
        assert!(matches!(
            dec.open_chunk(&r1),
            Err(StreamError::Protocol(_))
        ));
    }

    #[test]
    fn test_chunk_too_large() {
        let (mut enc, _) = session_pair();
        enc.start().unwrap();
        let oversized = vec![0u8; CHUNK_SIZE + 1];
        assert!(matches!(
            enc.seal_chunk(&oversized, false),
            Err(StreamError::ChunkTooLarge { .. })
        ));
    }

    #[test]
    fn test_invalid_header_length() {
        let (_, mut dec) = session_pair();
        let result = dec.start(&[0u8; HEADER_SIZE - 1]);
        assert!(matches!(
            result,
            Err(StreamError::InvalidHeader {
                expected: HEADER_SIZE,
                actual: 15,
            })
        ));
    }

    #[test]
    fn test_tampered_record_fails_auth() {
        let (mut enc, mut dec) = session_pair();
        let header = enc.start().unwrap();
        let mut record = enc.seal_chunk(b"secret data", true).unwrap();
        record[3] ^= 0xFF;

        dec.start(&header).unwrap();
        assert!(matches!(dec.open_chunk(&record), Err(StreamError::Auth)));
    }

    #[test]
    fn test_every_byte_position_is_authenticated() {
        let (mut enc, _) = session_pair();
        let header = enc.start().unwrap();
        let record = enc.seal_chunk(b"tamper me", true).unwrap();
        let key_copy = StreamKey::from_bytes(*enc.key.as_bytes());

        for i in 0..record.len() {
            let mut corrupted = record.clone();
            corrupted[i] ^= 0x01;

            let mut dec = Decryptor::new(key_copy.clone());
            dec.start(&header).unwrap();
            assert!(
                matches!(dec.open_chunk(&corrupted), Err(StreamError::Auth)),
                "flipping byte {i} must fail authentication"
            );
        }
    }

    #[test]
    fn test_wrong_key_fails_auth() {
        let mut enc = Encryptor::new(StreamKey::generate());
        let header = enc.start().unwrap();
        let record = enc.seal_chunk(b"secret", true).unwrap();

        let mut dec = Decryptor::new(StreamKey::generate());
        dec.start(&header).unwrap();
        assert!(matches!(dec.open_chunk(&record), Err(StreamError::Auth)));
    }

    #[test]
    fn test_reordered_records_fail_auth() {
        let (mut enc, mut dec) = session_pair();
        let header = enc.start().unwrap();
        let _r1 = enc.seal_chunk(b"first", false).unwrap();
        let r2 = enc.seal_chunk(b"second", true).unwrap();

        dec.start(&header).unwrap();
        // r2 presented at position 0: nonce mismatch, must not authenticate
        assert!(matches!(dec.open_chunk(&r2), Err(StreamError::Auth)));
    }

    #[test]
    fn test_replayed_record_fails_auth() {
        let (mut enc, mut dec) = session_pair();
        let header = enc.start().unwrap();
        let r1 = enc.seal_chunk(b"first", false).unwrap();
        let _r2 = enc.seal_chunk(b"second", true).unwrap();

        dec.start(&header).unwrap();
        dec.open_chunk(&r1).unwrap();
        assert!(matches!(dec.open_chunk(&r1), Err(StreamError::Auth)));
    }

    #[test]
    fn test_record_shorter_than_overhead() {
        let (mut enc, mut dec) = session_pair();
        let header = enc.start().unwrap();
        dec.start(&header).unwrap();
        assert!(matches!(
            dec.open_chunk(&[0u8; RECORD_OVERHEAD - 1]),
            Err(StreamError::Auth)
        ));
    }

    #[test]
    fn test_headers_are_unique_per_session() {
        let key = StreamKey::generate();
        let mut enc1 = Encryptor::new(key.clone());
        let mut enc2 = Encryptor::new(key);
        let h1 = enc1.start().unwrap();
        let h2 = enc2.start().unwrap();
        assert_ne!(h1, h2, "session headers must be random");
    }
}
