use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::RngCore;

use crate::error::CryptoError;

/// Domain tag for deriving the collateral key from the configured secret.
const KEY_CONTEXT: &str = "lendlog 2025-01 collateral sealing key v1";

const NONCE_LEN: usize = 24;

/// Authenticated encryption for collateral records.
///
/// The 256-bit key is derived from an operator-supplied secret with BLAKE3
/// in key-derivation mode, so any secret length works. Sealed values are
/// `base64(nonce || ciphertext)` with a fresh random 24-byte nonce each
/// time, which makes them safe to store as JSON strings.
pub struct CollateralSealer {
    key: [u8; 32],
}

impl CollateralSealer {
    /// Derive a sealer from a textual secret. An empty secret is refused.
    pub fn from_secret(secret: &str) -> Result<Self, CryptoError> {
        if secret.is_empty() {
            return Err(CryptoError::EmptySecret);
        }
        Ok(Self {
            key: blake3::derive_key(KEY_CONTEXT, secret.as_bytes()),
        })
    }

    /// Encrypt and encode a plaintext.
    pub fn seal(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher()
            .encrypt(XNonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|_| CryptoError::MalformedPayload("encryption failed".into()))?;

        let mut framed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        framed.extend_from_slice(&nonce);
        framed.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(framed))
    }

    /// Decode and decrypt a value produced by [`CollateralSealer::seal`].
    pub fn open(&self, sealed: &str) -> Result<String, CryptoError> {
        let framed = STANDARD
            .decode(sealed.trim())
            .map_err(|e| CryptoError::MalformedPayload(e.to_string()))?;
        if framed.len() <= NONCE_LEN {
            return Err(CryptoError::MalformedPayload(format!(
                "expected more than {NONCE_LEN} bytes, got {}",
                framed.len()
            )));
        }

        let (nonce, ciphertext) = framed.split_at(NONCE_LEN);
        let plaintext = self
            .cipher()
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::Unauthenticated)?;
        String::from_utf8(plaintext).map_err(|e| CryptoError::MalformedPayload(e.to_string()))
    }

    /// Short, non-reversible key identifier for logs.
    pub fn key_fingerprint(&self) -> String {
        hex::encode(&blake3::hash(&self.key).as_bytes()[..4])
    }

    fn cipher(&self) -> XChaCha20Poly1305 {
        XChaCha20Poly1305::new(Key::from_slice(&self.key))
    }
}

impl std::fmt::Debug for CollateralSealer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CollateralSealer(key:{})", self.key_fingerprint())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_then_open() {
        let sealer = CollateralSealer::from_secret("library-secret").unwrap();
        let sealed = sealer.seal("4111 1111 1111 1111 / 12-27").unwrap();
        assert_ne!(sealed, "4111 1111 1111 1111 / 12-27");
        assert_eq!(sealer.open(&sealed).unwrap(), "4111 1111 1111 1111 / 12-27");
    }

    #[test]
    fn nonces_differ_between_seals() {
        let sealer = CollateralSealer::from_secret("s").unwrap();
        assert_ne!(sealer.seal("same").unwrap(), sealer.seal("same").unwrap());
    }

    #[test]
    fn wrong_secret_cannot_open() {
        let a = CollateralSealer::from_secret("alpha").unwrap();
        let b = CollateralSealer::from_secret("beta").unwrap();
        let sealed = a.seal("payload").unwrap();
        assert_eq!(b.open(&sealed), Err(CryptoError::Unauthenticated));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let sealer = CollateralSealer::from_secret("s").unwrap();
        let mut raw = STANDARD.decode(sealer.seal("payload").unwrap()).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        assert_eq!(
            sealer.open(&STANDARD.encode(raw)),
            Err(CryptoError::Unauthenticated)
        );
    }

    #[test]
    fn short_or_invalid_payloads_are_malformed() {
        let sealer = CollateralSealer::from_secret("s").unwrap();
        assert!(matches!(sealer.open("%%%"), Err(CryptoError::MalformedPayload(_))));
        assert!(matches!(
            sealer.open(&STANDARD.encode([0u8; 8])),
            Err(CryptoError::MalformedPayload(_))
        ));
    }

    #[test]
    fn empty_secret_is_refused() {
        assert_eq!(
            CollateralSealer::from_secret("").unwrap_err(),
            CryptoError::EmptySecret
        );
    }

    #[test]
    fn debug_redacts_key() {
        let sealer = CollateralSealer::from_secret("s").unwrap();
        let shown = format!("{sealer:?}");
        assert!(shown.starts_with("CollateralSealer(key:"));
        assert_eq!(sealer.key_fingerprint().len(), 8);
    }
}
