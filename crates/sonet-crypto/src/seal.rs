//! Public-key sealing: X25519 + HKDF-SHA-256 + AEAD.
//!
//! Used to hand group secrets to a joining member inside a welcome.
//!
//! ## Algorithm
//!
//! ```text
//! Seal(recipient_pk, plaintext, aad):
//!   1. (eph_sk, eph_pk) = X25519.generate()
//!   2. shared = X25519(eph_sk, recipient_pk)
//!   3. prk = HKDF-Extract(salt = eph_pk || recipient_pk, ikm = shared)
//!   4. key = HKDF-Expand(prk, "seal" || "key", 32)
//!   5. nonce = random(12)
//!   6. return eph_pk || nonce || AEAD.Encrypt(key, nonce, plaintext, aad)
//! ```

use zeroize::Zeroizing;

use crate::aead::{self, AeadAlgorithm, NONCE_SIZE, TAG_SIZE};
use crate::sha256;
use crate::x25519::{X25519PublicKey, X25519StaticSecret, KEY_SIZE};
use crate::{random, CryptoError, Result};

/// Bytes added to the plaintext by [`seal`].
pub const OVERHEAD: usize = KEY_SIZE + NONCE_SIZE + TAG_SIZE;

fn derive_key(
    shared: &[u8; KEY_SIZE],
    eph_pk: &[u8; KEY_SIZE],
    recipient_pk: &[u8; KEY_SIZE],
) -> Result<Zeroizing<[u8; 32]>> {
    let mut salt = [0u8; 2 * KEY_SIZE];
    salt[..KEY_SIZE].copy_from_slice(eph_pk);
    salt[KEY_SIZE..].copy_from_slice(recipient_pk);
    let prk = Zeroizing::new(sha256::hkdf_extract(&salt, shared));
    Ok(Zeroizing::new(sha256::hkdf_expand_key(
        &prk[..],
        b"seal",
        b"key",
    )?))
}

/// Seal `plaintext` to `recipient_pk`.
///
/// # Returns
///
/// `eph_pk || nonce || ciphertext || tag`.
pub fn seal(
    algorithm: AeadAlgorithm,
    recipient_pk: &X25519PublicKey,
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>> {
    let eph_sk = X25519StaticSecret::random()?;
    let eph_pk = eph_sk.public_key();
    let shared = eph_sk.diffie_hellman(recipient_pk)?;
    let key = derive_key(shared.as_bytes(), eph_pk.as_bytes(), recipient_pk.as_bytes())?;
    let nonce: [u8; NONCE_SIZE] = random::random_array()?;

    let ciphertext = aead::encrypt(algorithm, &key[..], &nonce, plaintext, aad)?;

    let mut out = Vec::with_capacity(KEY_SIZE + NONCE_SIZE + ciphertext.len());
    out.extend_from_slice(eph_pk.as_bytes());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Open a payload produced by [`seal`] with the recipient's secret key.
pub fn open(
    algorithm: AeadAlgorithm,
    recipient_sk: &X25519StaticSecret,
    sealed: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>> {
    if sealed.len() < OVERHEAD {
        return Err(CryptoError::InvalidLength(format!(
            "sealed payload of {} bytes is shorter than {OVERHEAD}",
            sealed.len()
        )));
    }
    let (eph_pk, rest) = sealed.split_at(KEY_SIZE);
    let (nonce, ciphertext) = rest.split_at(NONCE_SIZE);

    let eph_pk = X25519PublicKey::from_slice(eph_pk)?;
    let recipient_pk = recipient_sk.public_key();
    let shared = recipient_sk.diffie_hellman(&eph_pk)?;
    let key = derive_key(shared.as_bytes(), eph_pk.as_bytes(), recipient_pk.as_bytes())?;

    aead::decrypt(algorithm, &key[..], nonce, ciphertext, aad)
}
