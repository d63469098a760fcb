//! Random byte generation from the operating system CSPRNG.
//!
//! Randomness only enters the protocol at group creation, nonce
//! generation, and key generation. A failing RNG is surfaced as
//! [`CryptoError::RandomGeneration`] instead of falling back to anything
//! weaker.

use rand::rngs::OsRng;
use rand::RngCore;

use crate::{CryptoError, Result};

/// Fill `buf` with random bytes.
pub fn fill(buf: &mut [u8]) -> Result<()> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|_| CryptoError::RandomGeneration)
}

/// Generate `n` random bytes.
pub fn random_bytes(n: usize) -> Result<Vec<u8>> {
    let mut out = vec![0u8; n];
    fill(&mut out)?;
    Ok(out)
}

/// Generate a fixed-size random array.
pub fn random_array<const N: usize>() -> Result<[u8; N]> {
    let mut out = [0u8; N];
    fill(&mut out)?;
    Ok(out)
}
