//! Protocol operations over the group state store.
//!
//! Every state-changing operation has the same shape:
//!
//! 1. look up and lock the group
//! 2. validate the request against the current record
//! 3. build the next record on a copy: tree, context, tree hash
//! 4. bump the epoch and run the key schedule
//! 5. fold the change into the transcript
//! 6. replace the stored record and return its encoding
//!
//! A failure at any step leaves the stored record untouched.

use serde::{Deserialize, Serialize};
use sonet_crypto::aead::{self, AeadAlgorithm, NONCE_SIZE, TAG_SIZE};
use sonet_crypto::ed25519::{SigningKey, VerifyingKey};
use sonet_crypto::{random, sha256};
use zeroize::Zeroizing;

use crate::codec::serialize_group;
use crate::commit::{self, advance_transcript, Commit, Proposal, TranscriptUpdate};
use crate::config::{ConfigError, MlsConfig};
use crate::governor::{classify, SizeStatus};
use crate::group::{Group, GroupContext, GroupId, GroupState};
use crate::key_package::KeyPackage;
use crate::key_schedule::{self, EpochSecrets};
use crate::store::GroupStore;
use crate::suite::CipherSuite;
use crate::tree::RatchetTree;
use crate::welcome::{self, Welcome};
use crate::{MlsError, Result, KEY_SIZE};

/// Serializable overview of one group, free of secret material.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSummary {
    /// Hex-encoded group identifier.
    pub group_id: String,
    pub epoch: u64,
    pub cipher_suite: CipherSuite,
    pub state: GroupState,
    pub member_count: usize,
    pub size_status: SizeStatus,
    /// Hex-encoded tree hash.
    pub tree_hash: String,
}

/// Result of applying one proposal to a group.
struct Applied {
    encoded: Vec<u8>,
    tree_hash: [u8; KEY_SIZE],
    transcript: TranscriptUpdate,
}

/// The group messaging engine.
///
/// Safe to share across threads; operations on one group are serialized,
/// operations on different groups are not.
#[derive(Default)]
pub struct MlsProtocol {
    pub(crate) config: MlsConfig,
    pub(crate) store: GroupStore,
}

impl MlsProtocol {
    /// Build an engine after checking `config` with [`MlsConfig::validate`].
    pub fn new(config: MlsConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            store: GroupStore::new(),
        })
    }

    pub fn config(&self) -> &MlsConfig {
        &self.config
    }

    /// Create a group at epoch 0 with a single blank root and fresh
    /// secrets, and return its encoding.
    ///
    /// Creating a group under an identifier that is already in use replaces
    /// the existing group.
    pub fn create_group(
        &self,
        group_id: &[u8],
        cipher_suite: CipherSuite,
        extensions: &[u8],
    ) -> Result<Vec<u8>> {
        let group_id = GroupId::from(group_id);
        let tree = RatchetTree::new();
        let mut group = Group {
            context: GroupContext {
                group_id: group_id.context_id(),
                epoch: 0,
                tree_hash: tree.compute_tree_hash(self.config.tree_hash),
                confirmed_transcript_hash: [0u8; KEY_SIZE],
                extensions: extensions.to_vec(),
            },
            group_id,
            epoch: 0,
            cipher_suite,
            state: GroupState::Creating,
            tree,
            interim_transcript_hash: [0u8; KEY_SIZE],
            secrets: EpochSecrets::generate(self.config.key_schedule)?,
        };
        group.state = GroupState::Active;

        let encoded = serialize_group(&group);
        if self.store.contains(group.group_id.as_bytes()) {
            tracing::warn!(group_id = %group.group_id, "replacing existing MLS group");
        }
        tracing::info!(
            group_id = %group.group_id,
            cipher_suite = ?cipher_suite,
            "created MLS group"
        );
        self.store.insert(group);
        Ok(encoded)
    }

    /// Admit the member described by `key_package`.
    ///
    /// Fails with [`MlsError::GroupFull`] when the group already holds the
    /// configured maximum number of members.
    pub fn add_member(&self, group_id: &[u8], key_package: &KeyPackage) -> Result<Vec<u8>> {
        if self.config.verify_key_packages {
            key_package.verify()?;
        }
        let proposal = Proposal::Add(key_package.leaf_node.clone());
        Ok(self.transition(group_id, &proposal, Some(key_package))?.encoded)
    }

    /// Remove the member at `member_index` (position among occupied
    /// leaves, in tree order).
    pub fn remove_member(&self, group_id: &[u8], member_index: u32) -> Result<Vec<u8>> {
        Ok(self
            .transition(group_id, &Proposal::Remove(member_index), None)?
            .encoded)
    }

    /// Replace the group context extensions.
    pub fn update_group(&self, group_id: &[u8], extensions: &[u8]) -> Result<Vec<u8>> {
        let proposal = Proposal::GroupContextExtensions(extensions.to_vec());
        Ok(self.transition(group_id, &proposal, None)?.encoded)
    }

    /// Apply `proposal` and return a commit signed by `committer`.
    pub fn commit(
        &self,
        group_id: &[u8],
        proposal: Proposal,
        committer: &SigningKey,
    ) -> Result<Commit> {
        if let (Proposal::Add(leaf), true) = (&proposal, self.config.verify_key_packages) {
            leaf.verify()
                .map_err(|_| MlsError::InvalidKeyPackage("leaf signature does not verify".into()))?;
        }
        let applied = self.transition(group_id, &proposal, None)?;
        Ok(Commit::new(
            applied.transcript.proposals_hash,
            applied.tree_hash.to_vec(),
            applied.transcript.confirmation_tag,
            committer,
        ))
    }

    /// Check that `commit` produced the group's current epoch.
    pub fn verify_commit(
        &self,
        group_id: &[u8],
        commit: &Commit,
        committer: &VerifyingKey,
    ) -> Result<()> {
        commit.verify_signature(committer)?;
        self.store.read(group_id, |group| {
            if !sha256::ct_eq(&commit.path, &group.context.tree_hash) {
                return Err(MlsError::InvalidCommit("path does not match tree hash".into()));
            }
            let confirmation_key = Zeroizing::new(group.secrets.confirmation_key()?);
            let expected = commit::confirmation_tag(
                &confirmation_key[..],
                &group.context.confirmed_transcript_hash,
            )?;
            if !sha256::ct_eq(&expected, &commit.confirmation_tag) {
                return Err(MlsError::InvalidCommit("confirmation tag mismatch".into()));
            }
            let interim = sha256::hash_parts(&[
                &group.context.confirmed_transcript_hash,
                &commit.confirmation_tag,
            ]);
            if interim != group.interim_transcript_hash {
                return Err(MlsError::InvalidCommit("transcript does not match".into()));
            }
            Ok(())
        })?
    }

    /// Encrypt under the current epoch secret.
    ///
    /// Returns `nonce || ciphertext || tag`.
    pub fn encrypt_message(
        &self,
        group_id: &[u8],
        plaintext: &[u8],
        associated_data: &[u8],
    ) -> Result<Vec<u8>> {
        let (algorithm, key) = self.store.read(group_id, |group| {
            (
                group.cipher_suite.aead(),
                Zeroizing::new(*group.secrets.epoch_secret()),
            )
        })?;
        let nonce: [u8; NONCE_SIZE] = random::random_array()?;
        let ciphertext = aead::encrypt(algorithm, &key[..], &nonce, plaintext, associated_data)?;

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decrypt a payload produced by [`MlsProtocol::encrypt_message`] in
    /// the current epoch.
    pub fn decrypt_message(
        &self,
        group_id: &[u8],
        payload: &[u8],
        associated_data: &[u8],
    ) -> Result<Vec<u8>> {
        let (algorithm, key) = self.store.read(group_id, |group| {
            (
                group.cipher_suite.aead(),
                Zeroizing::new(*group.secrets.epoch_secret()),
            )
        })?;
        open_payload(algorithm, &key, payload, associated_data)
    }

    /// Decrypt a payload from an earlier epoch whose secret is still
    /// retained (see `epoch_secret_retention`).
    pub fn decrypt_message_at_epoch(
        &self,
        group_id: &[u8],
        epoch: u64,
        payload: &[u8],
        associated_data: &[u8],
    ) -> Result<Vec<u8>> {
        let (algorithm, key) = self.store.with_entry(group_id, |entry| {
            let key = entry
                .epoch_secret(epoch)
                .ok_or(MlsError::EpochKeyMissing(epoch))?;
            Ok((entry.group().cipher_suite.aead(), Zeroizing::new(*key)))
        })?;
        open_payload(algorithm, &key, payload, associated_data)
    }

    /// Expand the stored group secret into an epoch secret.
    ///
    /// Under the static key schedule this is the current epoch secret.
    /// Under the chained schedule it is the secret the next transition
    /// will install.
    pub fn derive_epoch_keys(&self, group_id: &[u8]) -> Result<Zeroizing<[u8; KEY_SIZE]>> {
        self.store.read(group_id, |group| {
            key_schedule::derive_epoch_secret(group.secrets.group_secret()).map(Zeroizing::new)
        })?
    }

    /// Expand the current epoch secret into the sender ratchet key.
    pub fn derive_sender_ratchet_key(&self, group_id: &[u8]) -> Result<Zeroizing<[u8; KEY_SIZE]>> {
        self.store.read(group_id, |group| {
            key_schedule::derive_sender_ratchet_key(group.secrets.epoch_secret())
                .map(Zeroizing::new)
        })?
    }

    /// Expand the current epoch secret into a group secret.
    pub fn derive_group_secret(&self, group_id: &[u8]) -> Result<Zeroizing<[u8; KEY_SIZE]>> {
        self.store.read(group_id, |group| {
            key_schedule::derive_group_secret(group.secrets.epoch_secret()).map(Zeroizing::new)
        })?
    }

    /// Build a welcome for `joiner` at the group's current epoch.
    ///
    /// Call after the joiner has been added, so the welcome carries the
    /// epoch that includes them.
    pub fn create_welcome(&self, group_id: &[u8], joiner: &KeyPackage) -> Result<Welcome> {
        self.store.read(group_id, |group| welcome::build(group, joiner))?
    }

    /// A copy of the current group record.
    pub fn group(&self, group_id: &[u8]) -> Result<Group> {
        self.store.read(group_id, Group::clone)
    }

    /// Identifiers of every stored group, sorted.
    pub fn group_ids(&self) -> Vec<GroupId> {
        self.store.ids()
    }

    pub fn group_summary(&self, group_id: &[u8]) -> Result<GroupSummary> {
        self.store.read(group_id, |group| {
            let member_count = group.member_count();
            GroupSummary {
                group_id: group.group_id.to_hex(),
                epoch: group.epoch,
                cipher_suite: group.cipher_suite,
                state: group.state,
                member_count,
                size_status: classify(
                    member_count,
                    &self.config.size_thresholds,
                    self.config.max_group_members,
                ),
                tree_hash: hex::encode(group.context.tree_hash),
            }
        })
    }

    /// Apply `proposal` to the stored group under its lock.
    fn transition(
        &self,
        group_id: &[u8],
        proposal: &Proposal,
        key_package: Option<&KeyPackage>,
    ) -> Result<Applied> {
        self.store.with_entry(group_id, |entry| {
            let (next, transcript) = self.next_group(entry.group(), proposal, key_package)?;
            let applied = Applied {
                encoded: serialize_group(&next),
                tree_hash: next.context.tree_hash,
                transcript,
            };
            tracing::debug!(
                group_id = %next.group_id,
                epoch = next.epoch,
                members = next.member_count(),
                proposal = proposal.kind(),
                "advanced MLS group epoch"
            );
            entry.replace(next, self.config.epoch_secret_retention);
            Ok(applied)
        })
    }

    /// Build the record that follows `current` once `proposal` is applied.
    fn next_group(
        &self,
        current: &Group,
        proposal: &Proposal,
        key_package: Option<&KeyPackage>,
    ) -> Result<(Group, TranscriptUpdate)> {
        let mut next = current.clone();

        match proposal {
            Proposal::Add(leaf) => {
                let max = self.config.max_group_members;
                if current.member_count() >= max as usize {
                    tracing::warn!(
                        group_id = %current.group_id,
                        max,
                        "rejected member: group is full"
                    );
                    return Err(MlsError::GroupFull { max });
                }
                if let (Some(kp), true) = (key_package, self.config.verify_key_packages) {
                    if kp.cipher_suite != current.cipher_suite {
                        return Err(MlsError::InvalidKeyPackage(format!(
                            "cipher suite {:?} does not match group",
                            kp.cipher_suite
                        )));
                    }
                }
                next.tree.insert_leaf(leaf.clone());

                let members = next.member_count();
                let status = classify(members, &self.config.size_thresholds, max);
                if status == SizeStatus::Warning {
                    tracing::warn!(
                        group_id = %current.group_id,
                        members,
                        max,
                        "MLS group is approaching its member limit"
                    );
                }
            }
            Proposal::Remove(index) => {
                next.tree.remove_leaf(*index)?;
            }
            Proposal::GroupContextExtensions(extensions) => {
                next.context.extensions = extensions.clone();
            }
        }

        next.context.tree_hash = next.tree.compute_tree_hash(self.config.tree_hash);
        next.epoch = current.epoch + 1;
        next.context.epoch = next.epoch;
        next.secrets = current.secrets.next_epoch(self.config.key_schedule)?;

        let confirmation_key = Zeroizing::new(next.secrets.confirmation_key()?);
        let transcript = advance_transcript(
            &current.interim_transcript_hash,
            proposal,
            &confirmation_key[..],
        )?;
        next.context.confirmed_transcript_hash = transcript.confirmed_transcript_hash;
        next.interim_transcript_hash = transcript.interim_transcript_hash;

        Ok((next, transcript))
    }
}

/// Split `nonce || ciphertext || tag` and decrypt it.
///
/// Payloads too short to hold a nonce and tag still run one AEAD
/// decryption over a dummy buffer, so both failure paths cost the same.
fn open_payload(
    algorithm: AeadAlgorithm,
    key: &[u8; KEY_SIZE],
    payload: &[u8],
    associated_data: &[u8],
) -> Result<Vec<u8>> {
    if payload.len() < NONCE_SIZE + TAG_SIZE {
        let dummy = [0u8; NONCE_SIZE + TAG_SIZE];
        let _ = aead::decrypt(
            algorithm,
            key,
            &dummy[..NONCE_SIZE],
            &dummy[NONCE_SIZE..],
            associated_data,
        );
        return Err(MlsError::InvalidCiphertext);
    }
    let (nonce, ciphertext) = payload.split_at(NONCE_SIZE);
    aead::decrypt(algorithm, key, nonce, ciphertext, associated_data)
        .map_err(|_| MlsError::AuthenticationFailed)
}
