//! # sonet-crypto
//!
//! Cryptographic primitives for the Sonet group messaging engine.
//!
//! Every operation here is pure and stateless apart from drawing from the
//! operating system RNG, so all of it is safe to call from any thread.
//! Failures are reported as [`CryptoError`]; nothing succeeds silently on a
//! malformed key, nonce, or signature.
//!
//! ## Modules
//!
//! - [`random`] — OS-backed random byte generation
//! - [`sha256`] — SHA-256, HMAC-SHA-256, HKDF extract/expand
//! - [`aead`] — AES-256-GCM and ChaCha20-Poly1305 (32-byte key, 16-byte tag)
//! - [`ed25519`] — Ed25519 signing and verification (RFC 8032)
//! - [`x25519`] — X25519 key agreement (RFC 7748)
//! - [`seal`] — X25519 + HKDF + AEAD sealing to a recipient public key

pub mod aead;
pub mod ed25519;
pub mod random;
pub mod seal;
pub mod sha256;
pub mod x25519;

/// Error types for cryptographic operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    /// Key has the wrong size for the algorithm.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// Nonce has the wrong size for the algorithm.
    #[error("invalid nonce length: expected {expected}, got {actual}")]
    InvalidNonceLength { expected: usize, actual: usize },

    /// Signature has the wrong size.
    #[error("invalid signature length: expected {expected}, got {actual}")]
    InvalidSignatureLength { expected: usize, actual: usize },

    /// Any other malformed input length (ciphertext, HKDF output, ...).
    #[error("invalid length: {0}")]
    InvalidLength(String),

    /// The operating system RNG failed.
    #[error("random generation failed")]
    RandomGeneration,

    /// AEAD decryption failed (authentication tag mismatch).
    #[error("AEAD decryption failed")]
    AeadDecryption,

    /// Ed25519 signature verification failed.
    #[error("signature verification failed")]
    SignatureVerification,

    /// X25519 produced an all-zero (non-contributory) shared secret.
    #[error("key agreement produced a non-contributory shared secret")]
    KeyAgreement,
}

pub type Result<T> = std::result::Result<T, CryptoError>;
