//! Fixed-layout wire encoding.
//!
//! Every structure is the in-order concatenation of its fields:
//!
//! - integers are fixed width, little-endian
//! - fixed-size keys, hashes, and signatures are written raw
//! - variable-length byte strings carry a `u32` length prefix
//! - sequences carry a `u32` element count
//! - optional values and enum variants carry a one-byte tag
//!
//! Decoding checks the remaining input before every read, bounds every
//! length prefix and element count by the bytes actually available, and
//! rejects trailing data. All failures are [`MlsError::MalformedPayload`].
//!
//! ## Layouts
//!
//! ```text
//! LeafNode     = public_key[32] signature_key[32] encryption_key[32] signature[64]
//! TreeNode     = has_leaf:u8 [LeafNode] parent_hash[32] unmerged:u32*{u32} extensions:bytes
//! GroupContext = group_id:u32 epoch:u64 tree_hash[32] confirmed_transcript_hash[32] extensions:bytes
//! Group        = id:bytes epoch:u64 suite:u16 state:u8 GroupContext nodes:u32*{TreeNode}
//!                interim_transcript_hash[32] group_secret[32] epoch_secret[32] sender_ratchet_key[32]
//! KeyPackage   = version:u16 suite:u16 init_key[32] LeafNode extensions:bytes signature[64]
//! Welcome      = version:u16 suite:u16 group_id:bytes epoch:u64 tree_hash[32]
//!                confirmed_transcript_hash[32] interim_transcript_hash[32] extensions:bytes
//!                key_packages:u32*{KeyPackage} encrypted_group_secrets:bytes
//! Commit       = proposals_hash[32] path:bytes signature[64] confirmation_tag[32]
//! Proposal     = 0x01 LeafNode | 0x03 index:u32 | 0x07 extensions:bytes
//! ```

use zeroize::Zeroizing;

use crate::commit::{Commit, Proposal};
use crate::group::{Group, GroupContext, GroupId, GroupState, LeafNode, TreeNode};
use crate::key_package::KeyPackage;
use crate::key_schedule::EpochSecrets;
use crate::suite::CipherSuite;
use crate::tree::RatchetTree;
use crate::welcome::Welcome;
use crate::{MlsError, Result, KEY_SIZE, SIGNATURE_SIZE};

const LEAF_NODE_SIZE: usize = 3 * KEY_SIZE + SIGNATURE_SIZE;
const MIN_TREE_NODE_SIZE: usize = 1 + KEY_SIZE + 4 + 4;
const MIN_KEY_PACKAGE_SIZE: usize = 2 + 2 + KEY_SIZE + LEAF_NODE_SIZE + 4 + SIGNATURE_SIZE;

const PROPOSAL_ADD: u8 = 0x01;
const PROPOSAL_REMOVE: u8 = 0x03;
const PROPOSAL_GROUP_CONTEXT_EXTENSIONS: u8 = 0x07;

fn malformed(msg: impl Into<String>) -> MlsError {
    MlsError::MalformedPayload(msg.into())
}

/// Append-only output buffer.
#[derive(Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn put_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Write bytes with no length prefix.
    pub fn put_fixed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Write a `u32` length prefix followed by the bytes.
    ///
    /// Fields longer than `u32::MAX` bytes cannot be represented.
    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.put_u32(bytes.len() as u32);
        self.buf.extend_from_slice(bytes);
    }

    /// Write a `u32` element count followed by each element.
    pub fn put_seq<T: Encode>(&mut self, items: &[T]) {
        self.put_u32(items.len() as u32);
        for item in items {
            item.encode(self);
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Bounds-checked cursor over encoded input.
#[derive(Debug)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Consume exactly `n` bytes.
    pub fn take(&mut self, n: usize, field: &str) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(malformed(format!(
                "truncated {field}: need {n} bytes, have {}",
                self.remaining()
            )));
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn u8(&mut self, field: &str) -> Result<u8> {
        Ok(self.take(1, field)?[0])
    }

    pub fn u16(&mut self, field: &str) -> Result<u16> {
        Ok(u16::from_le_bytes(self.fixed::<2>(field)?))
    }

    pub fn u32(&mut self, field: &str) -> Result<u32> {
        Ok(u32::from_le_bytes(self.fixed::<4>(field)?))
    }

    pub fn u64(&mut self, field: &str) -> Result<u64> {
        Ok(u64::from_le_bytes(self.fixed::<8>(field)?))
    }

    /// Read a fixed-size array.
    pub fn fixed<const N: usize>(&mut self, field: &str) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, field)?);
        Ok(out)
    }

    /// Read a `u32`-prefixed byte string.
    pub fn bytes(&mut self, field: &str) -> Result<Vec<u8>> {
        let len = self.u32(field)? as usize;
        Ok(self.take(len, field)?.to_vec())
    }

    /// Read a `u32` element count, rejecting counts that could not fit in
    /// the remaining input at `min_item_size` bytes per element.
    pub fn count(&mut self, field: &str, min_item_size: usize) -> Result<usize> {
        let count = self.u32(field)? as usize;
        if count.saturating_mul(min_item_size) > self.remaining() {
            return Err(malformed(format!(
                "{field} count {count} exceeds remaining input ({} bytes)",
                self.remaining()
            )));
        }
        Ok(count)
    }

    /// Read a counted sequence.
    pub fn seq<T: Decode>(&mut self, field: &str, min_item_size: usize) -> Result<Vec<T>> {
        let count = self.count(field, min_item_size)?;
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(T::decode(self)?);
        }
        Ok(items)
    }

    /// Fail unless every byte has been consumed.
    pub fn finish(&self) -> Result<()> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(malformed(format!("{n} trailing bytes"))),
        }
    }
}

/// Types with a wire encoding.
pub trait Encode {
    fn encode(&self, w: &mut Writer);

    fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        self.encode(&mut w);
        w.into_bytes()
    }
}

/// Types that can be decoded from their wire encoding.
pub trait Decode: Sized {
    fn decode(r: &mut Reader<'_>) -> Result<Self>;

    /// Decode a complete buffer. Trailing bytes are an error.
    fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data);
        let value = Self::decode(&mut r)?;
        r.finish()?;
        Ok(value)
    }
}

impl Encode for u32 {
    fn encode(&self, w: &mut Writer) {
        w.put_u32(*self);
    }
}

impl Decode for u32 {
    fn decode(r: &mut Reader<'_>) -> Result<Self> {
        r.u32("u32")
    }
}

impl Encode for LeafNode {
    fn encode(&self, w: &mut Writer) {
        w.put_fixed(&self.public_key);
        w.put_fixed(&self.signature_key);
        w.put_fixed(&self.encryption_key);
        w.put_fixed(&self.signature);
    }
}

impl Decode for LeafNode {
    fn decode(r: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            public_key: r.fixed("leaf public_key")?,
            signature_key: r.fixed("leaf signature_key")?,
            encryption_key: r.fixed("leaf encryption_key")?,
            signature: r.fixed("leaf signature")?,
        })
    }
}

impl Encode for TreeNode {
    fn encode(&self, w: &mut Writer) {
        match &self.leaf {
            Some(leaf) => {
                w.put_u8(1);
                leaf.encode(w);
            }
            None => w.put_u8(0),
        }
        w.put_fixed(&self.parent_hash);
        w.put_seq(&self.unmerged_leaves);
        w.put_bytes(&self.extensions);
    }
}

impl Decode for TreeNode {
    fn decode(r: &mut Reader<'_>) -> Result<Self> {
        let leaf = match r.u8("leaf tag")? {
            0 => None,
            1 => Some(LeafNode::decode(r)?),
            tag => return Err(malformed(format!("unknown leaf tag 0x{tag:02x}"))),
        };
        Ok(Self {
            leaf,
            parent_hash: r.fixed("parent_hash")?,
            unmerged_leaves: r.seq("unmerged_leaves", 4)?,
            extensions: r.bytes("node extensions")?,
        })
    }
}

impl Encode for GroupContext {
    fn encode(&self, w: &mut Writer) {
        w.put_u32(self.group_id);
        w.put_u64(self.epoch);
        w.put_fixed(&self.tree_hash);
        w.put_fixed(&self.confirmed_transcript_hash);
        w.put_bytes(&self.extensions);
    }
}

impl Decode for GroupContext {
    fn decode(r: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            group_id: r.u32("context group_id")?,
            epoch: r.u64("context epoch")?,
            tree_hash: r.fixed("tree_hash")?,
            confirmed_transcript_hash: r.fixed("confirmed_transcript_hash")?,
            extensions: r.bytes("context extensions")?,
        })
    }
}

impl Encode for Group {
    fn encode(&self, w: &mut Writer) {
        w.put_bytes(self.group_id.as_bytes());
        w.put_u64(self.epoch);
        w.put_u16(self.cipher_suite.code());
        w.put_u8(self.state as u8);
        self.context.encode(w);
        w.put_seq(self.tree.nodes());
        w.put_fixed(&self.interim_transcript_hash);
        w.put_fixed(self.secrets.group_secret());
        w.put_fixed(self.secrets.epoch_secret());
        w.put_fixed(self.secrets.sender_ratchet_key());
    }
}

impl Decode for Group {
    fn decode(r: &mut Reader<'_>) -> Result<Self> {
        let group_id = GroupId::from(r.bytes("group_id")?);
        let epoch = r.u64("epoch")?;
        let cipher_suite = CipherSuite::from_code(r.u16("cipher_suite")?)?;
        let state = GroupState::from_tag(r.u8("state")?)?;
        let context = GroupContext::decode(r)?;
        if context.epoch != epoch {
            return Err(malformed(format!(
                "context epoch {} does not match group epoch {epoch}",
                context.epoch
            )));
        }
        if context.group_id != group_id.context_id() {
            return Err(malformed("context group_id does not match group id"));
        }
        let tree = RatchetTree::from_nodes(r.seq("tree nodes", MIN_TREE_NODE_SIZE)?);
        let interim_transcript_hash = r.fixed("interim_transcript_hash")?;
        let group_secret = Zeroizing::new(r.fixed::<KEY_SIZE>("group_secret")?);
        let epoch_secret = Zeroizing::new(r.fixed::<KEY_SIZE>("epoch_secret")?);
        let sender_ratchet_key = Zeroizing::new(r.fixed::<KEY_SIZE>("sender_ratchet_key")?);
        Ok(Self {
            group_id,
            epoch,
            cipher_suite,
            state,
            context,
            tree,
            interim_transcript_hash,
            secrets: EpochSecrets::from_parts(*group_secret, *epoch_secret, *sender_ratchet_key),
        })
    }
}

impl Encode for KeyPackage {
    fn encode(&self, w: &mut Writer) {
        w.put_u16(self.version);
        w.put_u16(self.cipher_suite.code());
        w.put_fixed(&self.init_key);
        self.leaf_node.encode(w);
        w.put_bytes(&self.extensions);
        w.put_fixed(&self.signature);
    }
}

impl Decode for KeyPackage {
    fn decode(r: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            version: r.u16("key package version")?,
            cipher_suite: CipherSuite::from_code(r.u16("key package cipher_suite")?)?,
            init_key: r.fixed("init_key")?,
            leaf_node: LeafNode::decode(r)?,
            extensions: r.bytes("key package extensions")?,
            signature: r.fixed("key package signature")?,
        })
    }
}

impl Encode for Welcome {
    fn encode(&self, w: &mut Writer) {
        w.put_u16(self.version);
        w.put_u16(self.cipher_suite.code());
        w.put_bytes(self.group_id.as_bytes());
        w.put_u64(self.epoch);
        w.put_fixed(&self.tree_hash);
        w.put_fixed(&self.confirmed_transcript_hash);
        w.put_fixed(&self.interim_transcript_hash);
        w.put_bytes(&self.extensions);
        w.put_seq(&self.key_packages);
        w.put_bytes(&self.encrypted_group_secrets);
    }
}

impl Decode for Welcome {
    fn decode(r: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            version: r.u16("welcome version")?,
            cipher_suite: CipherSuite::from_code(r.u16("welcome cipher_suite")?)?,
            group_id: GroupId::from(r.bytes("welcome group_id")?),
            epoch: r.u64("welcome epoch")?,
            tree_hash: r.fixed("welcome tree_hash")?,
            confirmed_transcript_hash: r.fixed("welcome confirmed_transcript_hash")?,
            interim_transcript_hash: r.fixed("welcome interim_transcript_hash")?,
            extensions: r.bytes("welcome extensions")?,
            key_packages: r.seq("welcome key_packages", MIN_KEY_PACKAGE_SIZE)?,
            encrypted_group_secrets: r.bytes("encrypted_group_secrets")?,
        })
    }
}

impl Encode for Commit {
    fn encode(&self, w: &mut Writer) {
        w.put_fixed(&self.proposals_hash);
        w.put_bytes(&self.path);
        w.put_fixed(&self.signature);
        w.put_fixed(&self.confirmation_tag);
    }
}

impl Decode for Commit {
    fn decode(r: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            proposals_hash: r.fixed("proposals_hash")?,
            path: r.bytes("path")?,
            signature: r.fixed("commit signature")?,
            confirmation_tag: r.fixed("confirmation_tag")?,
        })
    }
}

impl Encode for Proposal {
    fn encode(&self, w: &mut Writer) {
        match self {
            Proposal::Add(leaf) => {
                w.put_u8(PROPOSAL_ADD);
                leaf.encode(w);
            }
            Proposal::Remove(index) => {
                w.put_u8(PROPOSAL_REMOVE);
                w.put_u32(*index);
            }
            Proposal::GroupContextExtensions(ext) => {
                w.put_u8(PROPOSAL_GROUP_CONTEXT_EXTENSIONS);
                w.put_bytes(ext);
            }
        }
    }
}

impl Decode for Proposal {
    fn decode(r: &mut Reader<'_>) -> Result<Self> {
        match r.u8("proposal type")? {
            PROPOSAL_ADD => Ok(Proposal::Add(LeafNode::decode(r)?)),
            PROPOSAL_REMOVE => Ok(Proposal::Remove(r.u32("remove index")?)),
            PROPOSAL_GROUP_CONTEXT_EXTENSIONS => Ok(Proposal::GroupContextExtensions(
                r.bytes("proposal extensions")?,
            )),
            tag => Err(malformed(format!("unknown proposal type 0x{tag:02x}"))),
        }
    }
}

/// Encode a group record, secrets included.
pub fn serialize_group(group: &Group) -> Vec<u8> {
    group.to_bytes()
}

pub fn deserialize_group(data: &[u8]) -> Result<Group> {
    Group::from_bytes(data)
}

pub fn serialize_key_package(key_package: &KeyPackage) -> Vec<u8> {
    key_package.to_bytes()
}

pub fn deserialize_key_package(data: &[u8]) -> Result<KeyPackage> {
    KeyPackage::from_bytes(data)
}

pub fn serialize_welcome(welcome: &Welcome) -> Vec<u8> {
    welcome.to_bytes()
}

pub fn deserialize_welcome(data: &[u8]) -> Result<Welcome> {
    Welcome::from_bytes(data)
}

pub fn serialize_commit(commit: &Commit) -> Vec<u8> {
    commit.to_bytes()
}

pub fn deserialize_commit(data: &[u8]) -> Result<Commit> {
    Commit::from_bytes(data)
}
