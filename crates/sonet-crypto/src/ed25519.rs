//! Ed25519 signing and verification (RFC 8032).
//!
//! Used for leaf-node and key-package signatures and for signing commits.
//! Private keys travel as the 64-byte keypair encoding (`seed || public`);
//! public keys are 32 bytes and signatures 64 bytes.
//!
//! This module wraps `ed25519-dalek` with length-checked byte APIs.

use ed25519_dalek::Signer;

use crate::{random, CryptoError, Result};

/// Private keypair encoding size (seed followed by public key).
pub const PRIVATE_KEY_SIZE: usize = 64;

/// Public key size.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Signature size.
pub const SIGNATURE_SIZE: usize = 64;

/// An Ed25519 signing key (private key). Zeroized on drop by `ed25519-dalek`.
#[derive(Clone)]
pub struct SigningKey {
    inner: ed25519_dalek::SigningKey,
}

/// An Ed25519 verification key (public key).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifyingKey {
    inner: ed25519_dalek::VerifyingKey,
}

impl SigningKey {
    /// Generate a new random signing key.
    pub fn generate() -> Result<Self> {
        let seed: [u8; 32] = random::random_array()?;
        Ok(Self::from_seed(&seed))
    }

    /// Create a signing key from its 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            inner: ed25519_dalek::SigningKey::from_bytes(seed),
        }
    }

    /// Create a signing key from the 64-byte keypair encoding.
    ///
    /// Fails if the length is wrong or the embedded public half does not
    /// match the seed.
    pub fn from_keypair_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes: &[u8; PRIVATE_KEY_SIZE] =
            bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
                expected: PRIVATE_KEY_SIZE,
                actual: bytes.len(),
            })?;
        let inner = ed25519_dalek::SigningKey::from_keypair_bytes(bytes).map_err(|_| {
            CryptoError::InvalidKeyLength {
                expected: PRIVATE_KEY_SIZE,
                actual: PRIVATE_KEY_SIZE,
            }
        })?;
        Ok(Self { inner })
    }

    /// The 64-byte keypair encoding (`seed || public`).
    pub fn to_keypair_bytes(&self) -> [u8; PRIVATE_KEY_SIZE] {
        self.inner.to_keypair_bytes()
    }

    /// Get the corresponding verifying key.
    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey {
            inner: self.inner.verifying_key(),
        }
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_SIZE] {
        self.inner.sign(message).to_bytes()
    }
}

impl VerifyingKey {
    /// Create a verifying key from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes: &[u8; PUBLIC_KEY_SIZE] =
            bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
                expected: PUBLIC_KEY_SIZE,
                actual: bytes.len(),
            })?;
        let inner = ed25519_dalek::VerifyingKey::from_bytes(bytes)
            .map_err(|_| CryptoError::SignatureVerification)?;
        Ok(Self { inner })
    }

    /// Get the raw bytes of this verifying key.
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.inner.to_bytes()
    }

    /// Verify a signature on a message.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<()> {
        let signature: &[u8; SIGNATURE_SIZE] =
            signature
                .try_into()
                .map_err(|_| CryptoError::InvalidSignatureLength {
                    expected: SIGNATURE_SIZE,
                    actual: signature.len(),
                })?;
        let signature = ed25519_dalek::Signature::from_bytes(signature);
        self.inner
            .verify_strict(message, &signature)
            .map_err(|_| CryptoError::SignatureVerification)
    }
}

/// Sign `message` with a 64-byte private keypair encoding.
pub fn sign(private_key: &[u8], message: &[u8]) -> Result<[u8; SIGNATURE_SIZE]> {
    Ok(SigningKey::from_keypair_bytes(private_key)?.sign(message))
}

/// Verify `signature` over `message` against a 32-byte public key.
pub fn verify(public_key: &[u8], message: &[u8], signature: &[u8]) -> Result<()> {
    VerifyingKey::from_bytes(public_key)?.verify(message, signature)
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("public", &self.verifying_key())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    #[test]
    fn test_sign_verify_roundtrip() {
        let sk = SigningKey::generate().expect("keygen");
        let sig = sk.sign(b"group commit");
        assert!(sk.verifying_key().verify(b"group commit", &sig).is_ok());
    }

    #[test]
    fn test_wrong_message_fails() {
        let sk = SigningKey::generate().expect("keygen");
        let sig = sk.sign(b"correct message");
        assert_eq!(
            sk.verifying_key().verify(b"wrong message", &sig),
            Err(CryptoError::SignatureVerification)
        );
    }

    #[test]
    fn test_wrong_key_fails() {
        let sk1 = SigningKey::generate().expect("keygen");
        let sk2 = SigningKey::generate().expect("keygen");
        let sig = sk1.sign(b"test");
        assert!(sk2.verifying_key().verify(b"test", &sig).is_err());
    }

    #[test]
    fn test_byte_api_with_keypair_encoding() {
        let sk = SigningKey::generate().expect("keygen");
        let private = sk.to_keypair_bytes();
        let public = sk.verifying_key().to_bytes();

        let sig = sign(&private, b"payload").expect("sign");
        assert!(verify(&public, b"payload", &sig).is_ok());
    }

    #[test]
    fn test_byte_api_rejects_bad_lengths() {
        assert_eq!(
            sign(&[0u8; 32], b"m").map(|_| ()),
            Err(CryptoError::InvalidKeyLength {
                expected: 64,
                actual: 32
            })
        );
        let sk = SigningKey::generate().expect("keygen");
        let public = sk.verifying_key().to_bytes();
        assert_eq!(
            verify(&public, b"m", &[0u8; 63]),
            Err(CryptoError::InvalidSignatureLength {
                expected: 64,
                actual: 63
            })
        );
        assert!(matches!(
            verify(&public[..31], b"m", &[0u8; 64]),
            Err(CryptoError::InvalidKeyLength { .. })
        ));
    }

    #[test]
    fn test_mismatched_keypair_bytes_rejected() {
        let sk1 = SigningKey::generate().expect("keygen");
        let sk2 = SigningKey::generate().expect("keygen");
        let mut bytes = sk1.to_keypair_bytes();
        bytes[32..].copy_from_slice(&sk2.verifying_key().to_bytes());
        assert!(SigningKey::from_keypair_bytes(&bytes).is_err());
    }

    #[test]
    fn test_rfc8032_test1() {
        let sk = SigningKey::from_seed(&hex!(
            "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60"
        ));
        assert_eq!(
            sk.verifying_key().to_bytes(),
            hex!("d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a")
        );
        assert_eq!(
            sk.sign(b""),
            hex!(
                "e5564300c360ac729086e2cc806e828a84877f1eb8e5d974d873e065224901555fb8821590a33bacc61e39701cf9b46bd25bf5f0595bbe24655141438e7a100b"
            )
        );
    }
}
