//! Group data model.
//!
//! A [`Group`] is the authoritative record for one conversation: its
//! ratchet tree, the current epoch, the [`GroupContext`] authenticated at
//! that epoch, and the epoch's secrets. Protocol operations never edit a
//! stored group in place; they build the next record and replace the old
//! one wholesale.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use sonet_crypto::ed25519;

use crate::key_schedule::EpochSecrets;
use crate::suite::CipherSuite;
use crate::tree::RatchetTree;
use crate::{MlsError, Result, KEY_SIZE, SIGNATURE_SIZE};

/// Raw group identifier.
///
/// Identifiers are arbitrary bytes (including NUL) and are never treated
/// as text.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(Vec<u8>);

impl GroupId {
    /// Wrap raw identifier bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// The raw identifier bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Hex encoding, used in logs and error messages.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Numeric identifier carried in the [`GroupContext`]: the first four
    /// bytes (little-endian) of SHA-256 over the raw identifier.
    pub fn context_id(&self) -> u32 {
        let digest = sonet_crypto::sha256::hash(&self.0);
        u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]])
    }
}

impl Borrow<[u8]> for GroupId {
    fn borrow(&self) -> &[u8] {
        &self.0
    }
}

impl From<&[u8]> for GroupId {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<Vec<u8>> for GroupId {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl<const N: usize> From<&[u8; N]> for GroupId {
    fn from(bytes: &[u8; N]) -> Self {
        Self(bytes.to_vec())
    }
}

impl fmt::Debug for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GroupId({})", self.to_hex())
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Lifecycle of a group. `Active` is terminal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum GroupState {
    #[default]
    Creating = 0x00,
    Active = 0x01,
}

impl GroupState {
    /// Parse a wire tag.
    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0x00 => Ok(Self::Creating),
            0x01 => Ok(Self::Active),
            other => Err(MlsError::MalformedPayload(format!(
                "unknown group state 0x{other:02x}"
            ))),
        }
    }
}

/// A member's public key material. Immutable for the member's tenure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeafNode {
    /// Static X25519 public key.
    pub public_key: [u8; KEY_SIZE],
    /// Ed25519 signature public key.
    pub signature_key: [u8; KEY_SIZE],
    /// X25519 encryption public key.
    pub encryption_key: [u8; KEY_SIZE],
    /// Signature by `signature_key` over the three public keys.
    pub signature: [u8; SIGNATURE_SIZE],
}

impl LeafNode {
    /// The bytes covered by [`LeafNode::signature`].
    pub fn signed_content(&self) -> [u8; 3 * KEY_SIZE] {
        let mut out = [0u8; 3 * KEY_SIZE];
        out[..KEY_SIZE].copy_from_slice(&self.public_key);
        out[KEY_SIZE..2 * KEY_SIZE].copy_from_slice(&self.signature_key);
        out[2 * KEY_SIZE..].copy_from_slice(&self.encryption_key);
        out
    }

    /// Check the self-signature.
    pub fn verify(&self) -> Result<()> {
        ed25519::verify(&self.signature_key, &self.signed_content(), &self.signature)?;
        Ok(())
    }
}

/// One slot of the ratchet tree.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TreeNode {
    /// Present only for occupied member slots.
    pub leaf: Option<LeafNode>,
    /// Hash binding the node to its ancestor.
    pub parent_hash: [u8; KEY_SIZE],
    /// Leaves added below this node since it was last refreshed.
    pub unmerged_leaves: Vec<u32>,
    /// Opaque per-node extensions.
    pub extensions: Vec<u8>,
}

impl TreeNode {
    /// An unoccupied node with a zero parent hash.
    pub fn blank() -> Self {
        Self::default()
    }

    /// A member slot holding `leaf`.
    pub fn with_leaf(leaf: LeafNode) -> Self {
        Self {
            leaf: Some(leaf),
            ..Self::default()
        }
    }

    /// Whether a member occupies this slot.
    pub fn is_occupied(&self) -> bool {
        self.leaf.is_some()
    }
}

/// Authenticated group metadata at one epoch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupContext {
    /// Numeric identifier derived from the raw group id.
    pub group_id: u32,
    pub epoch: u64,
    /// Always equal to the hash recomputed from the current tree.
    pub tree_hash: [u8; KEY_SIZE],
    /// Running hash over every committed transition.
    pub confirmed_transcript_hash: [u8; KEY_SIZE],
    pub extensions: Vec<u8>,
}

/// The full authoritative record of a group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Group {
    pub group_id: GroupId,
    /// Strictly increasing from 0.
    pub epoch: u64,
    pub cipher_suite: CipherSuite,
    pub state: GroupState,
    pub context: GroupContext,
    pub tree: RatchetTree,
    /// Transcript hash after folding in the last confirmation tag.
    pub interim_transcript_hash: [u8; KEY_SIZE],
    pub secrets: EpochSecrets,
}

impl Group {
    /// Number of occupied leaves.
    pub fn member_count(&self) -> usize {
        self.tree.member_count()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_group_id_keeps_nul_bytes() {
        let id = GroupId::from(b"a\0b\0");
        assert_eq!(id.as_bytes(), b"a\0b\0");
        assert_ne!(id, GroupId::from(b"a"));
        assert_eq!(id.to_hex(), "61006200");
    }

    #[test]
    fn test_group_id_lookup_by_slice() {
        let mut map = HashMap::new();
        map.insert(GroupId::from(b"G1"), 1u8);
        assert_eq!(map.get(b"G1".as_slice()), Some(&1));
        assert_eq!(map.get(b"G2".as_slice()), None);
    }

    #[test]
    fn test_context_id_is_stable() {
        let id = GroupId::from(b"G1");
        assert_eq!(id.context_id(), GroupId::from(b"G1").context_id());
        assert_ne!(id.context_id(), GroupId::from(b"G2").context_id());
        // Identifiers shorter than four bytes are fine.
        let _ = GroupId::from(b"").context_id();
    }

    #[test]
    fn test_group_state_tags() {
        assert_eq!(GroupState::from_tag(0).expect("tag"), GroupState::Creating);
        assert_eq!(GroupState::from_tag(1).expect("tag"), GroupState::Active);
        assert!(GroupState::from_tag(2).is_err());
    }

    #[test]
    fn test_leaf_signature_verification() {
        let sk = ed25519::SigningKey::generate().expect("keygen");
        let mut leaf = LeafNode {
            public_key: [1; 32],
            signature_key: sk.verifying_key().to_bytes(),
            encryption_key: [3; 32],
            signature: [0; 64],
        };
        leaf.signature = sk.sign(&leaf.signed_content());
        assert!(leaf.verify().is_ok());

        leaf.encryption_key[0] ^= 1;
        assert!(leaf.verify().is_err());
    }
}
