//! # sonet-mls
//!
//! Simplified Messaging Layer Security (MLS) group engine for Sonet's
//! end-to-end encrypted conversations.
//!
//! The engine keeps every active group in memory, advances a monotonic
//! epoch on each membership or metadata change, re-derives the epoch key
//! material through an HKDF key schedule, and encrypts group payloads
//! under the current epoch secret.
//!
//! ## Modules
//!
//! - [`protocol`] — [`MlsProtocol`]: create/add/remove/update/encrypt/decrypt.
//! - [`governor`] — Group size classification and optimisation.
//! - [`store`] — Group state store with one lock per group.
//! - [`key_schedule`] — Epoch, sender-ratchet, and group secret derivation.
//! - [`tree`] — Array-backed ratchet tree and tree hashing.
//! - [`group`] — Group data model.
//! - [`key_package`] — Member key packages.
//! - [`welcome`] — Invitations carrying sealed group secrets.
//! - [`commit`] — Proposals, commits, and the transcript hash chain.
//! - [`codec`] — Fixed-layout wire encoding for every structure.
//! - [`config`] — Engine configuration (TOML).
//! - [`suite`] — Cipher suites.
//!
//! ## Key Concepts
//!
//! - **Group**: A set of members sharing a symmetric key schedule.
//! - **Epoch**: A version of the group state; incremented on every change.
//! - **KeyPackage**: A member's public key material used for group joins.
//! - **Welcome**: A sealed message allowing a new member to join the group.

pub mod codec;
pub mod commit;
pub mod config;
pub mod governor;
pub mod group;
pub mod key_package;
pub mod key_schedule;
pub mod protocol;
pub mod store;
pub mod suite;
pub mod tree;
pub mod welcome;

pub use commit::{Commit, Proposal};
pub use config::{ConfigError, MlsConfig};
pub use governor::SizeStatus;
pub use group::{Group, GroupContext, GroupId, GroupState, LeafNode, TreeNode};
pub use key_package::{KeyPackage, KeyPackageBundle};
pub use key_schedule::EpochSecrets;
pub use protocol::{GroupSummary, MlsProtocol};
pub use suite::CipherSuite;
pub use welcome::Welcome;

use sonet_crypto::CryptoError;

/// Protocol version carried in key packages and welcomes.
pub const MLS_VERSION: u16 = 0x0001;

/// Size of every secret and hash in the engine.
pub const KEY_SIZE: usize = 32;

/// Nonce prefix length of an encrypted group payload.
pub const NONCE_SIZE: usize = sonet_crypto::aead::NONCE_SIZE;

/// Ed25519 signature length.
pub const SIGNATURE_SIZE: usize = sonet_crypto::ed25519::SIGNATURE_SIZE;

/// Default maximum number of members per group.
pub const MAX_GROUP_MEMBERS: u32 = 500;

/// Error types for MLS operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MlsError {
    /// No group is stored under the identifier (hex-encoded).
    #[error("group not found: {0}")]
    GroupNotFound(String),

    /// Group is at maximum capacity.
    #[error("group is at maximum capacity ({max} members)")]
    GroupFull { max: u32 },

    /// Member index does not refer to an occupied leaf.
    #[error("invalid member index {index} (group has {members} members)")]
    InvalidIndex { index: u32, members: usize },

    /// No key material is held for the requested epoch.
    #[error("no key material for epoch {0}")]
    EpochKeyMissing(u64),

    /// Payload is too short to hold a nonce and tag.
    #[error("invalid ciphertext")]
    InvalidCiphertext,

    /// AEAD tag did not verify.
    #[error("message authentication failed")]
    AuthenticationFailed,

    /// A primitive rejected its input or the RNG failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Wire data could not be decoded.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// Key package signatures did not verify.
    #[error("invalid key package: {0}")]
    InvalidKeyPackage(String),

    /// Commit did not match the group's current epoch.
    #[error("invalid commit: {0}")]
    InvalidCommit(String),
}

/// Convenience result type for MLS operations.
pub type Result<T> = std::result::Result<T, MlsError>;
