//! SHA-256 based hashing and key derivation.
//!
//! ## Functions
//!
//! - [`hash`] — SHA-256 digest
//! - [`hmac`] — HMAC-SHA-256
//! - [`hkdf_extract`] / [`hkdf_expand`] — HKDF (RFC 5869) over SHA-256
//! - [`ct_eq`] — constant-time byte comparison for tags and MACs
//!
//! [`hkdf_expand`] takes the info string as two parts, a label and a
//! context, which are concatenated (`label || context`) before expansion.

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::{CryptoError, Result};

/// SHA-256 output size in bytes.
pub const HASH_SIZE: usize = 32;

/// Largest output HKDF-SHA-256 can expand to (255 blocks).
pub const MAX_HKDF_OUTPUT: usize = 255 * HASH_SIZE;

type HmacSha256 = Hmac<Sha256>;

/// Compute the SHA-256 digest of `data`.
pub fn hash(data: &[u8]) -> [u8; HASH_SIZE] {
    let digest = Sha256::digest(data);
    let mut out = [0u8; HASH_SIZE];
    out.copy_from_slice(&digest);
    out
}

/// Compute SHA-256 over several fields without concatenating them first.
pub fn hash_parts(parts: &[&[u8]]) -> [u8; HASH_SIZE] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    let mut out = [0u8; HASH_SIZE];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Compute HMAC-SHA-256 of `data` under `key`.
///
/// HMAC accepts keys of any length, so this only fails if the underlying
/// implementation rejects the key outright.
pub fn hmac(key: &[u8], data: &[u8]) -> Result<[u8; HASH_SIZE]> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|_| CryptoError::InvalidLength("HMAC key rejected".into()))?;
    mac.update(data);
    let mut out = [0u8; HASH_SIZE];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

/// HKDF-Extract: derive a pseudorandom key from `salt` and input keying material.
pub fn hkdf_extract(salt: &[u8], ikm: &[u8]) -> [u8; HASH_SIZE] {
    let (prk, _) = Hkdf::<Sha256>::extract(Some(salt), ikm);
    let mut out = [0u8; HASH_SIZE];
    out.copy_from_slice(&prk);
    out
}

/// HKDF-Expand: produce `length` bytes from a pseudorandom key.
///
/// The info parameter is `label || context`. The PRK must be at least one
/// hash length (32 bytes) and `length` at most [`MAX_HKDF_OUTPUT`].
///
/// # Arguments
///
/// * `prk` - Pseudorandom key, typically a 32-byte group or epoch secret
/// * `label` - Domain separation label (e.g. `b"epoch"`)
/// * `context` - Context string (e.g. `b"group"`)
/// * `length` - Number of output bytes
pub fn hkdf_expand(prk: &[u8], label: &[u8], context: &[u8], length: usize) -> Result<Vec<u8>> {
    let hk = Hkdf::<Sha256>::from_prk(prk).map_err(|_| CryptoError::InvalidKeyLength {
        expected: HASH_SIZE,
        actual: prk.len(),
    })?;
    let mut okm = vec![0u8; length];
    hk.expand_multi_info(&[label, context], &mut okm)
        .map_err(|_| {
            CryptoError::InvalidLength(format!(
                "HKDF output of {length} bytes exceeds {MAX_HKDF_OUTPUT}"
            ))
        })?;
    Ok(okm)
}

/// HKDF-Expand into a 32-byte array.
pub fn hkdf_expand_key(prk: &[u8], label: &[u8], context: &[u8]) -> Result<[u8; HASH_SIZE]> {
    let okm = hkdf_expand(prk, label, context, HASH_SIZE)?;
    let mut out = [0u8; HASH_SIZE];
    out.copy_from_slice(&okm);
    Ok(out)
}

/// Compare two byte strings in constant time (with respect to their contents).
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
