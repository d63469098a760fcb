//! X25519 key agreement (RFC 7748).
//!
//! Key packages carry X25519 init and encryption keys; welcomes are sealed
//! to a joiner's init key with an ephemeral X25519 exchange.

use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

use crate::{random, CryptoError, Result};

/// Size of X25519 private keys, public keys, and shared secrets.
pub const KEY_SIZE: usize = 32;

/// An X25519 static secret key.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct X25519StaticSecret {
    inner: StaticSecret,
}

/// An X25519 public key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct X25519PublicKey {
    bytes: [u8; KEY_SIZE],
}

/// An X25519 shared secret.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct SharedSecret {
    bytes: [u8; KEY_SIZE],
}

impl X25519StaticSecret {
    /// Generate a new random static secret.
    pub fn random() -> Result<Self> {
        let bytes: [u8; KEY_SIZE] = random::random_array()?;
        Ok(Self::from_bytes(bytes))
    }

    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self {
            inner: StaticSecret::from(bytes),
        }
    }

    /// Create from a byte slice, checking the length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
            expected: KEY_SIZE,
            actual: bytes.len(),
        })?;
        Ok(Self::from_bytes(bytes))
    }

    /// Get the raw bytes of this secret.
    pub fn to_bytes(&self) -> [u8; KEY_SIZE] {
        self.inner.to_bytes()
    }

    /// Compute the corresponding public key.
    pub fn public_key(&self) -> X25519PublicKey {
        X25519PublicKey {
            bytes: PublicKey::from(&self.inner).to_bytes(),
        }
    }

    /// Perform Diffie-Hellman key agreement.
    ///
    /// Rejects low-order peer keys that force an all-zero shared secret.
    pub fn diffie_hellman(&self, their_public: &X25519PublicKey) -> Result<SharedSecret> {
        let shared = self.inner.diffie_hellman(&PublicKey::from(their_public.bytes));
        if !shared.was_contributory() {
            return Err(CryptoError::KeyAgreement);
        }
        Ok(SharedSecret {
            bytes: *shared.as_bytes(),
        })
    }
}

impl X25519PublicKey {
    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Create from a byte slice, checking the length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
            expected: KEY_SIZE,
            actual: bytes.len(),
        })?;
        Ok(Self { bytes })
    }

    /// Get the raw bytes.
    pub fn to_bytes(&self) -> [u8; KEY_SIZE] {
        self.bytes
    }

    /// Get the raw bytes as a slice.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl SharedSecret {
    /// Get the raw bytes of the shared secret.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for X25519StaticSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("X25519StaticSecret")
            .field("public", &self.public_key())
            .finish()
    }
}

/// Generate a fresh X25519 key pair.
pub fn generate_keypair() -> Result<(X25519StaticSecret, X25519PublicKey)> {
    let secret = X25519StaticSecret::random()?;
    let public = secret.public_key();
    Ok((secret, public))
}

/// Derive a shared secret from raw 32-byte private and public keys.
pub fn derive_shared_secret(private_key: &[u8], public_key: &[u8]) -> Result<SharedSecret> {
    let secret = X25519StaticSecret::from_slice(private_key)?;
    let public = X25519PublicKey::from_slice(public_key)?;
    secret.diffie_hellman(&public)
}
