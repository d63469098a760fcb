//! Authenticated encryption with associated data.
//!
//! Two 256-bit-key algorithms are available, selected by the group's cipher
//! suite: AES-256-GCM and ChaCha20-Poly1305 (RFC 8439). Both use a 12-byte
//! nonce and append a 16-byte authentication tag to the ciphertext.
//!
//! Key, nonce, and ciphertext lengths are validated before the cipher is
//! touched, so malformed input fails with a length error rather than a
//! panic inside the cipher implementation.

use aes_gcm::Aes256Gcm;
use chacha20poly1305::aead::generic_array::GenericArray;
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::ChaCha20Poly1305;

use crate::{CryptoError, Result};

/// Nonce size (96 bits = 12 bytes).
pub const NONCE_SIZE: usize = 12;

/// Key size (256 bits = 32 bytes).
pub const KEY_SIZE: usize = 32;

/// Authentication tag size (128 bits = 16 bytes).
pub const TAG_SIZE: usize = 16;

/// The AEAD algorithm used to protect a payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AeadAlgorithm {
    /// AES-256 in Galois/Counter Mode.
    Aes256Gcm,
    /// ChaCha20 stream cipher with a Poly1305 authenticator.
    ChaCha20Poly1305,
}

fn check_lengths(key: &[u8], nonce: &[u8]) -> Result<()> {
    if key.len() != KEY_SIZE {
        return Err(CryptoError::InvalidKeyLength {
            expected: KEY_SIZE,
            actual: key.len(),
        });
    }
    if nonce.len() != NONCE_SIZE {
        return Err(CryptoError::InvalidNonceLength {
            expected: NONCE_SIZE,
            actual: nonce.len(),
        });
    }
    Ok(())
}

/// Encrypt `plaintext` under `key` and `nonce`.
///
/// # Arguments
///
/// * `algorithm` - Which AEAD to use
/// * `key` - 32-byte key
/// * `nonce` - 12-byte nonce (must never be reused with the same key)
/// * `plaintext` - Data to encrypt
/// * `aad` - Associated data (authenticated, not encrypted)
///
/// # Returns
///
/// Ciphertext with the 16-byte authentication tag appended.
pub fn encrypt(
    algorithm: AeadAlgorithm,
    key: &[u8],
    nonce: &[u8],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>> {
    check_lengths(key, nonce)?;
    let nonce = GenericArray::from_slice(nonce);
    let payload = Payload {
        msg: plaintext,
        aad,
    };
    let invalid_key = |_| CryptoError::InvalidKeyLength {
        expected: KEY_SIZE,
        actual: key.len(),
    };

    let sealed = match algorithm {
        AeadAlgorithm::Aes256Gcm => Aes256Gcm::new_from_slice(key)
            .map_err(invalid_key)?
            .encrypt(nonce, payload),
        AeadAlgorithm::ChaCha20Poly1305 => ChaCha20Poly1305::new_from_slice(key)
            .map_err(invalid_key)?
            .encrypt(nonce, payload),
    };
    // Encryption only fails when the plaintext exceeds the cipher's limit.
    sealed.map_err(|_| CryptoError::InvalidLength("plaintext too long for AEAD".into()))
}

/// Decrypt `ciphertext` (with appended tag) under `key` and `nonce`.
///
/// Fails with [`CryptoError::AeadDecryption`] when the tag does not verify
/// and with a length error when the input is shorter than a tag.
pub fn decrypt(
    algorithm: AeadAlgorithm,
    key: &[u8],
    nonce: &[u8],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>> {
    check_lengths(key, nonce)?;
    if ciphertext.len() < TAG_SIZE {
        return Err(CryptoError::InvalidLength(format!(
            "ciphertext of {} bytes is shorter than the {TAG_SIZE}-byte tag",
            ciphertext.len()
        )));
    }
    let nonce = GenericArray::from_slice(nonce);
    let payload = Payload {
        msg: ciphertext,
        aad,
    };
    let invalid_key = |_| CryptoError::InvalidKeyLength {
        expected: KEY_SIZE,
        actual: key.len(),
    };

    let opened = match algorithm {
        AeadAlgorithm::Aes256Gcm => Aes256Gcm::new_from_slice(key)
            .map_err(invalid_key)?
            .decrypt(nonce, payload),
        AeadAlgorithm::ChaCha20Poly1305 => ChaCha20Poly1305::new_from_slice(key)
            .map_err(invalid_key)?
            .decrypt(nonce, payload),
    };
    opened.map_err(|_| CryptoError::AeadDecryption)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALGORITHMS: [AeadAlgorithm; 2] =
        [AeadAlgorithm::Aes256Gcm, AeadAlgorithm::ChaCha20Poly1305];

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = [0x42u8; KEY_SIZE];
        let nonce = [0x01u8; NONCE_SIZE];
        for alg in ALGORITHMS {
            let ciphertext = encrypt(alg, &key, &nonce, b"Hello, group!", b"aad").expect("encrypt");
            let decrypted = decrypt(alg, &key, &nonce, &ciphertext, b"aad").expect("decrypt");
            assert_eq!(decrypted, b"Hello, group!");
        }
    }

    #[test]
    fn test_ciphertext_has_tag() {
        let key = [0x42u8; KEY_SIZE];
        let nonce = [0x01u8; NONCE_SIZE];
        for alg in ALGORITHMS {
            let ciphertext = encrypt(alg, &key, &nonce, b"test", b"").expect("encrypt");
            assert_eq!(ciphertext.len(), 4 + TAG_SIZE);
        }
    }

    #[test]
    fn test_algorithms_are_not_interchangeable() {
        let key = [0x42u8; KEY_SIZE];
        let nonce = [0x01u8; NONCE_SIZE];
        let ciphertext =
            encrypt(AeadAlgorithm::Aes256Gcm, &key, &nonce, b"test", b"").expect("encrypt");
        assert_eq!(
            decrypt(AeadAlgorithm::ChaCha20Poly1305, &key, &nonce, &ciphertext, b""),
            Err(CryptoError::AeadDecryption)
        );
    }

    #[test]
    fn test_wrong_aad_fails() {
        let key = [0x01u8; KEY_SIZE];
        let nonce = [0x01u8; NONCE_SIZE];
        for alg in ALGORITHMS {
            let ciphertext = encrypt(alg, &key, &nonce, b"test", b"aad1").expect("encrypt");
            assert_eq!(
                decrypt(alg, &key, &nonce, &ciphertext, b"aad2"),
                Err(CryptoError::AeadDecryption)
            );
        }
    }

    #[test]
    fn test_tampered_tag_fails() {
        let key = [0x01u8; KEY_SIZE];
        let nonce = [0x01u8; NONCE_SIZE];
        for alg in ALGORITHMS {
            let mut ciphertext = encrypt(alg, &key, &nonce, b"test", b"").expect("encrypt");
            if let Some(byte) = ciphertext.last_mut() {
                *byte ^= 0x01;
            }
            assert_eq!(
                decrypt(alg, &key, &nonce, &ciphertext, b""),
                Err(CryptoError::AeadDecryption)
            );
        }
    }

    #[test]
    fn test_rejects_bad_lengths() {
        let alg = AeadAlgorithm::Aes256Gcm;
        assert_eq!(
            encrypt(alg, &[0u8; 16], &[0u8; NONCE_SIZE], b"x", b""),
            Err(CryptoError::InvalidKeyLength {
                expected: 32,
                actual: 16
            })
        );
        assert_eq!(
            encrypt(alg, &[0u8; KEY_SIZE], &[0u8; 8], b"x", b""),
            Err(CryptoError::InvalidNonceLength {
                expected: 12,
                actual: 8
            })
        );
        assert!(matches!(
            decrypt(alg, &[0u8; KEY_SIZE], &[0u8; NONCE_SIZE], &[0u8; 15], b""),
            Err(CryptoError::InvalidLength(_))
        ));
    }

    #[test]
    fn test_empty_plaintext() {
        let key = [0x42u8; KEY_SIZE];
        let nonce = [0x01u8; NONCE_SIZE];
        for alg in ALGORITHMS {
            let ciphertext = encrypt(alg, &key, &nonce, b"", b"").expect("encrypt");
            assert_eq!(ciphertext.len(), TAG_SIZE);
            let decrypted = decrypt(alg, &key, &nonce, &ciphertext, b"").expect("decrypt");
            assert!(decrypted.is_empty());
        }
    }
}
