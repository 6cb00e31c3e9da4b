//! Stream key: generation, hex transport, zeroization on drop

use rand::RngCore;
use zeroize::Zeroize;

use crate::error::{Result, StreamError};
use crate::KEY_SIZE;

/// A 256-bit symmetric stream key. Zeroized on drop.
#[derive(Clone)]
pub struct StreamKey {
    bytes: [u8; KEY_SIZE],
}

impl StreamKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Generate a random 256-bit stream key from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::from_bytes(bytes)
    }

    /// Hex encoding for display and out-of-band transport.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Parse a key from its hex encoding (output of [`StreamKey::to_hex`]).
    pub fn from_hex(s: &str) -> Result<Self> {
        let mut decoded = hex::decode(s.trim())
            .map_err(|e| StreamError::Format(format!("invalid key hex: {e}")))?;

        if decoded.len() != KEY_SIZE {
            decoded.zeroize();
            return Err(StreamError::Format(format!(
                "wrong key length: {} bytes (expected {})",
                s.trim().len() / 2,
                KEY_SIZE
            )));
        }

        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(&decoded);
        decoded.zeroize();

        Ok(Self::from_bytes(bytes))
    }
}

impl Drop for StreamKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for StreamKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_generation() {
        let k1 = StreamKey::generate();
        let k2 = StreamKey::generate();
        assert_ne!(k1.as_bytes(), k2.as_bytes(), "random keys must differ");
    }

    #[test]
    fn test_hex_roundtrip() {
        let key = StreamKey::generate();
        let parsed = StreamKey::from_hex(&key.to_hex()).unwrap();
        assert_eq!(key.as_bytes(), parsed.as_bytes());
    }

    #[test]
    fn test_hex_roundtrip_trims_whitespace() {
        let key = StreamKey::generate();
        let parsed = StreamKey::from_hex(&format!("  {}\n", key.to_hex())).unwrap();
        assert_eq!(key.as_bytes(), parsed.as_bytes());
    }

    #[test]
    fn test_from_hex_wrong_length() {
        let result = StreamKey::from_hex("deadbeef");
        assert!(matches!(result, Err(StreamError::Format(_))));
    }

    #[test]
    fn test_from_hex_invalid_chars() {
        let result = StreamKey::from_hex(&"zz".repeat(KEY_SIZE));
        assert!(matches!(result, Err(StreamError::Format(_))));
    }

    #[test]
    fn test_debug_redacts_key_material() {
        let key = StreamKey::generate();
        let rendered = format!("{key:?}");
        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains(&key.to_hex()));
    }
}
