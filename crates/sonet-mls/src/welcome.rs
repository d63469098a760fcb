//! Invitations for newly admitted members.
//!
//! A [`Welcome`] carries the public state of one group epoch in the clear
//! and the epoch's secrets sealed to the joiner's key package init key.
//! The clear header is the associated data of the seal, so any change to it
//! makes the secrets unopenable.

use sonet_crypto::seal;
use sonet_crypto::x25519::{X25519PublicKey, X25519StaticSecret};
use tracing::debug;
use zeroize::Zeroizing;

use crate::codec::Writer;
use crate::group::{Group, GroupId};
use crate::key_package::KeyPackage;
use crate::key_schedule::EpochSecrets;
use crate::suite::CipherSuite;
use crate::{MlsError, Result, KEY_SIZE, MLS_VERSION};

const SECRETS_SIZE: usize = 3 * KEY_SIZE;

/// Invitation binding a joiner to one group epoch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Welcome {
    pub version: u16,
    pub cipher_suite: CipherSuite,
    pub group_id: GroupId,
    pub epoch: u64,
    pub tree_hash: [u8; KEY_SIZE],
    pub confirmed_transcript_hash: [u8; KEY_SIZE],
    pub interim_transcript_hash: [u8; KEY_SIZE],
    pub extensions: Vec<u8>,
    /// Key packages of the members this welcome is addressed to.
    pub key_packages: Vec<KeyPackage>,
    /// `group_secret || epoch_secret || sender_ratchet_key`, sealed.
    pub encrypted_group_secrets: Vec<u8>,
}

impl Welcome {
    /// Encoding of every field except the sealed secrets.
    pub fn header_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.put_u16(self.version);
        w.put_u16(self.cipher_suite.code());
        w.put_bytes(self.group_id.as_bytes());
        w.put_u64(self.epoch);
        w.put_fixed(&self.tree_hash);
        w.put_fixed(&self.confirmed_transcript_hash);
        w.put_fixed(&self.interim_transcript_hash);
        w.put_bytes(&self.extensions);
        w.put_seq(&self.key_packages);
        w.into_bytes()
    }

    /// Recover the epoch secrets with the joiner's init secret.
    ///
    /// Any tampering with the header or the sealed bytes, or the wrong
    /// init secret, fails with [`MlsError::AuthenticationFailed`].
    pub fn open(&self, init_secret: &X25519StaticSecret) -> Result<EpochSecrets> {
        let plaintext = Zeroizing::new(
            seal::open(
                self.cipher_suite.aead(),
                init_secret,
                &self.encrypted_group_secrets,
                &self.header_bytes(),
            )
            .map_err(|_| MlsError::AuthenticationFailed)?,
        );
        if plaintext.len() != SECRETS_SIZE {
            return Err(MlsError::MalformedPayload(format!(
                "group secrets are {} bytes, expected {SECRETS_SIZE}",
                plaintext.len()
            )));
        }

        let mut parts = Zeroizing::new([[0u8; KEY_SIZE]; 3]);
        for (part, chunk) in parts.iter_mut().zip(plaintext.chunks_exact(KEY_SIZE)) {
            part.copy_from_slice(chunk);
        }
        Ok(EpochSecrets::from_parts(parts[0], parts[1], parts[2]))
    }
}

/// Build a welcome for `joiner` at the group's current epoch.
pub(crate) fn build(group: &Group, joiner: &KeyPackage) -> Result<Welcome> {
    let mut welcome = Welcome {
        version: MLS_VERSION,
        cipher_suite: group.cipher_suite,
        group_id: group.group_id.clone(),
        epoch: group.epoch,
        tree_hash: group.context.tree_hash,
        confirmed_transcript_hash: group.context.confirmed_transcript_hash,
        interim_transcript_hash: group.interim_transcript_hash,
        extensions: group.context.extensions.clone(),
        key_packages: vec![joiner.clone()],
        encrypted_group_secrets: Vec::new(),
    };

    let mut secrets = Zeroizing::new([0u8; SECRETS_SIZE]);
    secrets[..KEY_SIZE].copy_from_slice(group.secrets.group_secret());
    secrets[KEY_SIZE..2 * KEY_SIZE].copy_from_slice(group.secrets.epoch_secret());
    secrets[2 * KEY_SIZE..].copy_from_slice(group.secrets.sender_ratchet_key());

    welcome.encrypted_group_secrets = seal::seal(
        group.cipher_suite.aead(),
        &X25519PublicKey::from_bytes(joiner.init_key),
        &secrets[..],
        &welcome.header_bytes(),
    )?;

    debug!(
        group_id = %group.group_id,
        epoch = group.epoch,
        joiner = %hex::encode(joiner.hash_ref()),
        "built welcome"
    );
    Ok(welcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Decode, Encode};
    use crate::group::{GroupContext, GroupState};
    use crate::key_package::KeyPackageBundle;
    use crate::tree::RatchetTree;

    fn group() -> Group {
        let group_id = GroupId::from(b"welcome-test");
        Group {
            context: GroupContext {
                group_id: group_id.context_id(),
                epoch: 2,
                tree_hash: [1; 32],
                confirmed_transcript_hash: [2; 32],
                extensions: b"topic".to_vec(),
            },
            group_id,
            epoch: 2,
            cipher_suite: CipherSuite::default(),
            state: GroupState::Active,
            tree: RatchetTree::new(),
            interim_transcript_hash: [3; 32],
            secrets: EpochSecrets::generate(Default::default()).expect("secrets"),
        }
    }

    #[test]
    fn test_welcome_opens_to_group_secrets() {
        let group = group();
        let joiner = KeyPackageBundle::generate(group.cipher_suite, b"").expect("bundle");
        let welcome = build(&group, &joiner.key_package).expect("build");

        assert_eq!(welcome.epoch, 2);
        assert_eq!(welcome.extensions, b"topic");
        let secrets = welcome.open(&joiner.init_secret).expect("open");
        assert_eq!(secrets, group.secrets);
    }

    #[test]
    fn test_welcome_survives_encoding() {
        let group = group();
        let joiner = KeyPackageBundle::generate(group.cipher_suite, b"").expect("bundle");
        let welcome = build(&group, &joiner.key_package).expect("build");
        let decoded = Welcome::from_bytes(&welcome.to_bytes()).expect("decode");
        assert_eq!(decoded, welcome);
        assert!(decoded.open(&joiner.init_secret).is_ok());
    }

    #[test]
    fn test_tampered_header_fails_authentication() {
        let group = group();
        let joiner = KeyPackageBundle::generate(group.cipher_suite, b"").expect("bundle");
        let mut welcome = build(&group, &joiner.key_package).expect("build");
        welcome.epoch += 1;
        assert_eq!(
            welcome.open(&joiner.init_secret),
            Err(MlsError::AuthenticationFailed)
        );
    }

    #[test]
    fn test_wrong_init_secret_fails_authentication() {
        let group = group();
        let joiner = KeyPackageBundle::generate(group.cipher_suite, b"").expect("bundle");
        let stranger = KeyPackageBundle::generate(group.cipher_suite, b"").expect("bundle");
        let welcome = build(&group, &joiner.key_package).expect("build");
        assert_eq!(
            welcome.open(&stranger.init_secret),
            Err(MlsError::AuthenticationFailed)
        );
    }
}
