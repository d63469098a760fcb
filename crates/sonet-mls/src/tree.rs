//! Array-backed ratchet tree.
//!
//! The tree is a flat sequence of [`TreeNode`]s. A new group starts with a
//! single blank root; each admitted member is appended as an occupied
//! node. Members are addressed by *member index*: the position of a leaf
//! among the occupied nodes, in tree order. Blank routing nodes are never
//! addressed by callers.
//!
//! ## Tree hash
//!
//! [`TreeHashMode::Positional`] binds every node to its position:
//!
//! ```text
//! leaf_hash(node)  = SHA-256(0x00 || encode(node))
//! inner_hash(l, r) = SHA-256(0x01 || l || r)
//! ```
//!
//! combined level by level, duplicating the last hash of an odd level.
//! [`TreeHashMode::Xor`] XORs per-node digests together. It is
//! order-independent, so two arrangements of the same nodes collide; it
//! exists for parity with older deployments.

use serde::{Deserialize, Serialize};
use sonet_crypto::sha256;

use crate::codec::Encode;
use crate::group::{LeafNode, TreeNode};
use crate::{MlsError, Result, KEY_SIZE};

const LEAF_PREFIX: u8 = 0x00;
const INNER_PREFIX: u8 = 0x01;

/// How per-node digests are combined into the tree hash.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeHashMode {
    #[default]
    Positional,
    Xor,
}

/// The member tree of a group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RatchetTree {
    nodes: Vec<TreeNode>,
}

impl Default for RatchetTree {
    fn default() -> Self {
        Self::new()
    }
}

impl RatchetTree {
    /// A tree holding one blank root.
    pub fn new() -> Self {
        Self {
            nodes: vec![TreeNode::blank()],
        }
    }

    /// Rebuild a tree from decoded nodes.
    pub fn from_nodes(nodes: Vec<TreeNode>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Total number of nodes, occupied or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of nodes holding a leaf.
    pub fn member_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_occupied()).count()
    }

    /// Iterate over the occupied leaves in member-index order.
    pub fn leaves(&self) -> impl Iterator<Item = &LeafNode> {
        self.nodes.iter().filter_map(|n| n.leaf.as_ref())
    }

    /// Append a member. Returns its member index.
    pub fn insert_leaf(&mut self, leaf: LeafNode) -> u32 {
        let index = self.member_count() as u32;
        self.nodes.push(TreeNode::with_leaf(leaf));
        index
    }

    /// Position of the node holding member `member_index`.
    fn node_position(&self, member_index: u32) -> Option<usize> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_occupied())
            .nth(member_index as usize)
            .map(|(pos, _)| pos)
    }

    /// Remove member `member_index`, returning its leaf.
    pub fn remove_leaf(&mut self, member_index: u32) -> Result<LeafNode> {
        let pos = self
            .node_position(member_index)
            .ok_or(MlsError::InvalidIndex {
                index: member_index,
                members: self.member_count(),
            })?;
        let node = self.nodes.remove(pos);
        node.leaf.ok_or(MlsError::InvalidIndex {
            index: member_index,
            members: self.member_count(),
        })
    }

    /// Compute the aggregate hash of the tree. An empty tree hashes to zeros.
    pub fn compute_tree_hash(&self, mode: TreeHashMode) -> [u8; KEY_SIZE] {
        match mode {
            TreeHashMode::Positional => self.positional_hash(),
            TreeHashMode::Xor => self.xor_hash(),
        }
    }

    fn positional_hash(&self) -> [u8; KEY_SIZE] {
        if self.nodes.is_empty() {
            return [0u8; KEY_SIZE];
        }

        let mut level: Vec<[u8; KEY_SIZE]> = self
            .nodes
            .iter()
            .map(|n| sha256::hash_parts(&[&[LEAF_PREFIX], &n.to_bytes()]))
            .collect();

        while level.len() > 1 {
            level = level
                .chunks(2)
                .map(|pair| {
                    let left = &pair[0];
                    let right = pair.get(1).unwrap_or(left);
                    sha256::hash_parts(&[&[INNER_PREFIX], left, right])
                })
                .collect();
        }

        level[0]
    }

    fn xor_hash(&self) -> [u8; KEY_SIZE] {
        let mut acc = [0u8; KEY_SIZE];
        for node in &self.nodes {
            let digest = xor_node_digest(node);
            for (a, d) in acc.iter_mut().zip(digest.iter()) {
                *a ^= d;
            }
        }
        acc
    }
}

/// Per-node digest for the XOR combination: the leaf's three public keys
/// (when present), then parent hash, unmerged markers, and extensions.
fn xor_node_digest(node: &TreeNode) -> [u8; KEY_SIZE] {
    let mut data = Vec::with_capacity(4 * KEY_SIZE + node.unmerged_leaves.len() * 4);
    if let Some(leaf) = &node.leaf {
        data.extend_from_slice(&leaf.public_key);
        data.extend_from_slice(&leaf.signature_key);
        data.extend_from_slice(&leaf.encryption_key);
    }
    data.extend_from_slice(&node.parent_hash);
    for marker in &node.unmerged_leaves {
        data.extend_from_slice(&marker.to_le_bytes());
    }
    data.extend_from_slice(&node.extensions);
    sha256::hash(&data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(tag: u8) -> LeafNode {
        LeafNode {
            public_key: [tag; 32],
            signature_key: [tag.wrapping_add(1); 32],
            encryption_key: [tag.wrapping_add(2); 32],
            signature: [tag; 64],
        }
    }

    #[test]
    fn test_new_tree_has_blank_root() {
        let tree = RatchetTree::new();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.member_count(), 0);
        assert!(tree.nodes()[0].leaf.is_none());
        assert_eq!(tree.nodes()[0].parent_hash, [0u8; 32]);
    }

    #[test]
    fn test_insert_returns_member_index() {
        let mut tree = RatchetTree::new();
        assert_eq!(tree.insert_leaf(leaf(1)), 0);
        assert_eq!(tree.insert_leaf(leaf(2)), 1);
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.member_count(), 2);
    }

    #[test]
    fn test_remove_by_member_index_skips_blank_nodes() {
        let mut tree = RatchetTree::new();
        tree.insert_leaf(leaf(1));
        tree.insert_leaf(leaf(2));
        tree.insert_leaf(leaf(3));

        let removed = tree.remove_leaf(1).expect("remove");
        assert_eq!(removed, leaf(2));
        let remaining: Vec<_> = tree.leaves().cloned().collect();
        assert_eq!(remaining, vec![leaf(1), leaf(3)]);
        // Blank root survives removals.
        assert!(tree.nodes()[0].leaf.is_none());
    }

    #[test]
    fn test_remove_out_of_range() {
        let mut tree = RatchetTree::new();
        tree.insert_leaf(leaf(1));
        tree.remove_leaf(0).expect("remove");
        assert_eq!(
            tree.remove_leaf(0),
            Err(MlsError::InvalidIndex {
                index: 0,
                members: 0
            })
        );
    }

    #[test]
    fn test_tree_hash_tracks_contents() {
        let mut tree = RatchetTree::new();
        let h0 = tree.compute_tree_hash(TreeHashMode::Positional);
        tree.insert_leaf(leaf(1));
        let h1 = tree.compute_tree_hash(TreeHashMode::Positional);
        assert_ne!(h0, h1);
        assert_eq!(h1, tree.compute_tree_hash(TreeHashMode::Positional));
    }

    #[test]
    fn test_positional_hash_binds_order() {
        let mut a = RatchetTree::new();
        a.insert_leaf(leaf(1));
        a.insert_leaf(leaf(2));
        let mut b = RatchetTree::new();
        b.insert_leaf(leaf(2));
        b.insert_leaf(leaf(1));

        assert_ne!(
            a.compute_tree_hash(TreeHashMode::Positional),
            b.compute_tree_hash(TreeHashMode::Positional)
        );
        // The XOR combination cannot tell them apart.
        assert_eq!(
            a.compute_tree_hash(TreeHashMode::Xor),
            b.compute_tree_hash(TreeHashMode::Xor)
        );
    }

    #[test]
    fn test_single_node_positional_hash() {
        let tree = RatchetTree::new();
        let expected = sha256::hash_parts(&[&[0x00], &tree.nodes()[0].to_bytes()]);
        assert_eq!(tree.compute_tree_hash(TreeHashMode::Positional), expected);
    }

    #[test]
    fn test_empty_tree_hashes_to_zero() {
        let tree = RatchetTree::from_nodes(Vec::new());
        assert_eq!(tree.compute_tree_hash(TreeHashMode::Positional), [0u8; 32]);
        assert_eq!(tree.compute_tree_hash(TreeHashMode::Xor), [0u8; 32]);
    }
}
