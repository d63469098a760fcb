//! Proposals, commits, and the transcript hash chain.
//!
//! Every epoch transition is described by one [`Proposal`]. Applying it
//! folds the proposal into the group's transcript:
//!
//! ```text
//! proposals_hash            = SHA-256(encode(proposal))
//! confirmed_transcript_hash = SHA-256(interim_prev || proposals_hash)
//! confirmation_tag          = HMAC(confirmation_key, confirmed_transcript_hash)
//! interim_transcript_hash   = SHA-256(confirmed_transcript_hash || confirmation_tag)
//! ```
//!
//! The confirmation key belongs to the epoch being entered, so only holders
//! of the new epoch secret can produce or check the tag.

use sonet_crypto::ed25519::{SigningKey, VerifyingKey};
use sonet_crypto::sha256;

use crate::codec::Encode;
use crate::group::LeafNode;
use crate::{MlsError, Result, KEY_SIZE, SIGNATURE_SIZE};

/// A single requested change to a group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Proposal {
    /// Admit a member.
    Add(LeafNode),
    /// Remove the member at this member index.
    Remove(u32),
    /// Replace the group context extensions.
    GroupContextExtensions(Vec<u8>),
}

impl Proposal {
    /// Short name used in log events.
    pub fn kind(&self) -> &'static str {
        match self {
            Proposal::Add(_) => "add",
            Proposal::Remove(_) => "remove",
            Proposal::GroupContextExtensions(_) => "group_context_extensions",
        }
    }
}

/// A signed record of one epoch transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Commit {
    pub proposals_hash: [u8; KEY_SIZE],
    /// Tree hash after the transition.
    pub path: Vec<u8>,
    /// Ed25519 signature over [`Commit::signed_content`].
    pub signature: [u8; SIGNATURE_SIZE],
    pub confirmation_tag: [u8; KEY_SIZE],
}

impl Commit {
    /// Build and sign a commit.
    pub fn new(
        proposals_hash: [u8; KEY_SIZE],
        path: Vec<u8>,
        confirmation_tag: [u8; KEY_SIZE],
        signer: &SigningKey,
    ) -> Self {
        let mut commit = Self {
            proposals_hash,
            path,
            signature: [0u8; SIGNATURE_SIZE],
            confirmation_tag,
        };
        commit.signature = signer.sign(&commit.signed_content());
        commit
    }

    /// `proposals_hash || path || confirmation_tag`
    pub fn signed_content(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 * KEY_SIZE + self.path.len());
        out.extend_from_slice(&self.proposals_hash);
        out.extend_from_slice(&self.path);
        out.extend_from_slice(&self.confirmation_tag);
        out
    }

    pub fn verify_signature(&self, committer: &VerifyingKey) -> Result<()> {
        committer
            .verify(&self.signed_content(), &self.signature)
            .map_err(|_| MlsError::InvalidCommit("signature does not verify".into()))
    }
}

/// Transcript values produced by applying one proposal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranscriptUpdate {
    pub proposals_hash: [u8; KEY_SIZE],
    pub confirmed_transcript_hash: [u8; KEY_SIZE],
    pub confirmation_tag: [u8; KEY_SIZE],
    pub interim_transcript_hash: [u8; KEY_SIZE],
}

/// Fold `proposal` into the transcript that ended at `interim_prev`.
pub fn advance_transcript(
    interim_prev: &[u8; KEY_SIZE],
    proposal: &Proposal,
    confirmation_key: &[u8],
) -> Result<TranscriptUpdate> {
    let proposals_hash = sha256::hash(&proposal.to_bytes());
    let confirmed_transcript_hash = sha256::hash_parts(&[interim_prev, &proposals_hash]);
    let confirmation_tag = confirmation_tag(confirmation_key, &confirmed_transcript_hash)?;
    let interim_transcript_hash =
        sha256::hash_parts(&[&confirmed_transcript_hash, &confirmation_tag]);
    Ok(TranscriptUpdate {
        proposals_hash,
        confirmed_transcript_hash,
        confirmation_tag,
        interim_transcript_hash,
    })
}

/// HMAC over the confirmed transcript hash.
pub fn confirmation_tag(
    confirmation_key: &[u8],
    confirmed_transcript_hash: &[u8; KEY_SIZE],
) -> Result<[u8; KEY_SIZE]> {
    Ok(sha256::hmac(confirmation_key, confirmed_transcript_hash)?)
}
