//! Epoch key schedule.
//!
//! Every epoch holds three 32-byte secrets derived with HKDF-SHA-256
//! (label and context are concatenated into the HKDF info):
//!
//! ```text
//! epoch_secret       = Expand(group_secret, "epoch",   "group")
//! sender_ratchet_key = Expand(epoch_secret, "sender",  "ratchet")
//! confirmation_key   = Expand(epoch_secret, "confirm", "key")
//! ```
//!
//! Under [`KeySchedulePolicy::Chained`] the stored group secret is always
//! the successor of the current epoch (`Expand(epoch_secret, "group",
//! "secret")`), from creation onwards. The next epoch secret is expanded from
//! it, so every transition yields a new epoch secret and a past epoch's
//! secrets cannot be recomputed from the current state.
//! [`KeySchedulePolicy::Static`] keeps the creation-time group secret for
//! the life of the group.

use std::fmt;

use serde::{Deserialize, Serialize};
use sonet_crypto::{random, sha256};
use tracing::trace;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{Result, KEY_SIZE};

/// HKDF label and context for the epoch secret.
pub const EPOCH_LABEL: &[u8] = b"epoch";
pub const EPOCH_CONTEXT: &[u8] = b"group";

/// HKDF label and context for the sender ratchet key.
pub const SENDER_LABEL: &[u8] = b"sender";
pub const SENDER_CONTEXT: &[u8] = b"ratchet";

/// HKDF label and context for the chained group secret.
pub const GROUP_LABEL: &[u8] = b"group";
pub const GROUP_CONTEXT: &[u8] = b"secret";

/// HKDF label and context for the commit confirmation key.
pub const CONFIRM_LABEL: &[u8] = b"confirm";
pub const CONFIRM_CONTEXT: &[u8] = b"key";

/// How the group secret evolves across epochs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySchedulePolicy {
    /// The group secret is re-derived from the epoch secret on every
    /// transition.
    #[default]
    Chained,
    /// The group secret is fixed at creation.
    Static,
}

/// Derive the epoch secret from a group secret.
pub fn derive_epoch_secret(group_secret: &[u8]) -> Result<[u8; KEY_SIZE]> {
    Ok(sha256::hkdf_expand_key(group_secret, EPOCH_LABEL, EPOCH_CONTEXT)?)
}

/// Derive the sender ratchet key from an epoch secret.
pub fn derive_sender_ratchet_key(epoch_secret: &[u8]) -> Result<[u8; KEY_SIZE]> {
    Ok(sha256::hkdf_expand_key(epoch_secret, SENDER_LABEL, SENDER_CONTEXT)?)
}

/// Derive the next group secret from an epoch secret.
pub fn derive_group_secret(epoch_secret: &[u8]) -> Result<[u8; KEY_SIZE]> {
    Ok(sha256::hkdf_expand_key(epoch_secret, GROUP_LABEL, GROUP_CONTEXT)?)
}

/// Derive the key that authenticates commits made in an epoch.
pub fn derive_confirmation_key(epoch_secret: &[u8]) -> Result<[u8; KEY_SIZE]> {
    Ok(sha256::hkdf_expand_key(epoch_secret, CONFIRM_LABEL, CONFIRM_CONTEXT)?)
}

/// The secrets of one epoch. Wiped from memory when dropped.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct EpochSecrets {
    group_secret: [u8; KEY_SIZE],
    epoch_secret: [u8; KEY_SIZE],
    sender_ratchet_key: [u8; KEY_SIZE],
}

impl EpochSecrets {
    /// Fresh secrets for a new group: a random group secret and the
    /// secrets derived from it.
    ///
    /// Under the chained policy the stored group secret is advanced past the
    /// creation epoch so the first transition already rotates the key.
    pub fn generate(policy: KeySchedulePolicy) -> Result<Self> {
        let mut secrets = Self::from_group_secret(random::random_array::<KEY_SIZE>()?)?;
        if policy == KeySchedulePolicy::Chained {
            secrets.group_secret = derive_group_secret(&secrets.epoch_secret)?;
        }
        Ok(secrets)
    }

    /// Derive the epoch and sender secrets from a known group secret.
    pub fn from_group_secret(group_secret: [u8; KEY_SIZE]) -> Result<Self> {
        let epoch_secret = derive_epoch_secret(&group_secret)?;
        let sender_ratchet_key = derive_sender_ratchet_key(&epoch_secret)?;
        Ok(Self {
            group_secret,
            epoch_secret,
            sender_ratchet_key,
        })
    }

    /// Rebuild from stored parts without re-deriving anything.
    pub fn from_parts(
        group_secret: [u8; KEY_SIZE],
        epoch_secret: [u8; KEY_SIZE],
        sender_ratchet_key: [u8; KEY_SIZE],
    ) -> Self {
        Self {
            group_secret,
            epoch_secret,
            sender_ratchet_key,
        }
    }

    /// Secrets for the following epoch.
    pub fn next_epoch(&self, policy: KeySchedulePolicy) -> Result<Self> {
        let epoch_secret = derive_epoch_secret(&self.group_secret)?;
        let (group_secret, sender_ratchet_key) = match policy {
            KeySchedulePolicy::Chained => (
                derive_group_secret(&epoch_secret)?,
                derive_sender_ratchet_key(&epoch_secret)?,
            ),
            KeySchedulePolicy::Static => (self.group_secret, self.sender_ratchet_key),
        };
        trace!(?policy, "derived next epoch secrets");
        Ok(Self {
            group_secret,
            epoch_secret,
            sender_ratchet_key,
        })
    }

    /// Re-derive the sender ratchet key from the current epoch secret.
    pub fn refresh_sender_ratchet_key(&mut self) -> Result<()> {
        self.sender_ratchet_key = derive_sender_ratchet_key(&self.epoch_secret)?;
        trace!("refreshed sender ratchet key");
        Ok(())
    }

    pub fn group_secret(&self) -> &[u8; KEY_SIZE] {
        &self.group_secret
    }

    pub fn epoch_secret(&self) -> &[u8; KEY_SIZE] {
        &self.epoch_secret
    }

    pub fn sender_ratchet_key(&self) -> &[u8; KEY_SIZE] {
        &self.sender_ratchet_key
    }

    /// Key for commit confirmation tags in this epoch.
    pub fn confirmation_key(&self) -> Result<[u8; KEY_SIZE]> {
        derive_confirmation_key(&self.epoch_secret)
    }
}

impl fmt::Debug for EpochSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EpochSecrets")
            .field("group_secret", &"[REDACTED]")
            .field("epoch_secret", &"[REDACTED]")
            .field("sender_ratchet_key", &"[REDACTED]")
            .finish()
    }
}
