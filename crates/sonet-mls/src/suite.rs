//! MLS cipher suites.
//!
//! The numeric codes follow the MLS registry. A suite is fixed when the
//! group is created. The engine hashes with SHA-256, signs with Ed25519,
//! and agrees keys with X25519 for every suite; the suite decides which
//! AEAD protects group payloads and welcomes.

use serde::{Deserialize, Serialize};
use sonet_crypto::aead::AeadAlgorithm;

use crate::{MlsError, Result};

/// A versioned bundle of DH curve, AEAD, hash, and signature scheme.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum CipherSuite {
    #[default]
    Mls128DhkemX25519Aes128GcmSha256Ed25519 = 0x0001,
    Mls128DhkemP256Aes128GcmSha256P256 = 0x0002,
    Mls128DhkemX25519ChaCha20Poly1305Sha256Ed25519 = 0x0003,
    Mls256DhkemX448Aes256GcmSha512Ed448 = 0x0004,
    Mls256DhkemP521Aes256GcmSha512P521 = 0x0005,
    Mls256DhkemX448ChaCha20Poly1305Sha512Ed448 = 0x0006,
}

impl CipherSuite {
    /// Every defined suite, in code order.
    pub const ALL: [CipherSuite; 6] = [
        Self::Mls128DhkemX25519Aes128GcmSha256Ed25519,
        Self::Mls128DhkemP256Aes128GcmSha256P256,
        Self::Mls128DhkemX25519ChaCha20Poly1305Sha256Ed25519,
        Self::Mls256DhkemX448Aes256GcmSha512Ed448,
        Self::Mls256DhkemP521Aes256GcmSha512P521,
        Self::Mls256DhkemX448ChaCha20Poly1305Sha512Ed448,
    ];

    /// Wire code.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Parse a wire code.
    pub fn from_code(code: u16) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|suite| suite.code() == code)
            .ok_or_else(|| MlsError::MalformedPayload(format!("unknown cipher suite 0x{code:04x}")))
    }

    /// AEAD used for payloads in groups with this suite.
    ///
    /// Group keys are always 256 bits, so the AES suites run AES-256-GCM.
    pub fn aead(self) -> AeadAlgorithm {
        match self {
            Self::Mls128DhkemX25519ChaCha20Poly1305Sha256Ed25519
            | Self::Mls256DhkemX448ChaCha20Poly1305Sha512Ed448 => AeadAlgorithm::ChaCha20Poly1305,
            _ => AeadAlgorithm::Aes256Gcm,
        }
    }
}
