//! Member key packages.
//!
//! A [`KeyPackage`] is what a prospective member publishes so others can
//! add them: an X25519 init key for receiving a welcome, the [`LeafNode`]
//! that will sit in the ratchet tree, and an Ed25519 signature over both.
//! The matching private halves stay in a [`KeyPackageBundle`].

use std::fmt;

use sonet_crypto::ed25519::{self, SigningKey};
use sonet_crypto::sha256;
use sonet_crypto::x25519::X25519StaticSecret;

use crate::codec::{Encode, Writer};
use crate::group::LeafNode;
use crate::suite::CipherSuite;
use crate::{MlsError, Result, KEY_SIZE, MLS_VERSION, SIGNATURE_SIZE};

/// A prospective member's signed offer to join.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyPackage {
    pub version: u16,
    pub cipher_suite: CipherSuite,
    /// X25519 key welcomes are sealed to.
    pub init_key: [u8; KEY_SIZE],
    pub leaf_node: LeafNode,
    pub extensions: Vec<u8>,
    /// Signature by `leaf_node.signature_key` over [`KeyPackage::signed_content`].
    pub signature: [u8; SIGNATURE_SIZE],
}

impl KeyPackage {
    /// Encoding of every field except the signature.
    pub fn signed_content(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.put_u16(self.version);
        w.put_u16(self.cipher_suite.code());
        w.put_fixed(&self.init_key);
        self.leaf_node.encode(&mut w);
        w.put_bytes(&self.extensions);
        w.into_bytes()
    }

    /// Check the leaf self-signature and the package signature.
    pub fn verify(&self) -> Result<()> {
        self.leaf_node
            .verify()
            .map_err(|_| MlsError::InvalidKeyPackage("leaf signature does not verify".into()))?;
        ed25519::verify(
            &self.leaf_node.signature_key,
            &self.signed_content(),
            &self.signature,
        )
        .map_err(|_| MlsError::InvalidKeyPackage("package signature does not verify".into()))
    }

    /// SHA-256 of the full encoding.
    pub fn hash_ref(&self) -> [u8; KEY_SIZE] {
        sha256::hash(&self.to_bytes())
    }
}

/// A key package together with its private keys.
#[derive(Clone)]
pub struct KeyPackageBundle {
    pub key_package: KeyPackage,
    /// Opens welcomes sealed to `key_package.init_key`.
    pub init_secret: X25519StaticSecret,
    pub leaf_secret: X25519StaticSecret,
    pub encryption_secret: X25519StaticSecret,
    pub signing_key: SigningKey,
}

impl KeyPackageBundle {
    /// Generate fresh keys and a signed key package.
    pub fn generate(cipher_suite: CipherSuite, extensions: &[u8]) -> Result<Self> {
        let init_secret = X25519StaticSecret::random()?;
        let leaf_secret = X25519StaticSecret::random()?;
        let encryption_secret = X25519StaticSecret::random()?;
        let signing_key = SigningKey::generate()?;

        let mut leaf_node = LeafNode {
            public_key: leaf_secret.public_key().to_bytes(),
            signature_key: signing_key.verifying_key().to_bytes(),
            encryption_key: encryption_secret.public_key().to_bytes(),
            signature: [0u8; SIGNATURE_SIZE],
        };
        leaf_node.signature = signing_key.sign(&leaf_node.signed_content());

        let mut key_package = KeyPackage {
            version: MLS_VERSION,
            cipher_suite,
            init_key: init_secret.public_key().to_bytes(),
            leaf_node,
            extensions: extensions.to_vec(),
            signature: [0u8; SIGNATURE_SIZE],
        };
        key_package.signature = signing_key.sign(&key_package.signed_content());

        Ok(Self {
            key_package,
            init_secret,
            leaf_secret,
            encryption_secret,
            signing_key,
        })
    }
}

impl fmt::Debug for KeyPackageBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPackageBundle")
            .field("key_package", &self.key_package)
            .field("private_keys", &"[REDACTED]")
            .finish()
    }
}
