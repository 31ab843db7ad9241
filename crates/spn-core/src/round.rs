//! Round primitives: key mixing, substitution, and bit permutation.
//!
//! Each primitive is independently invertible; the pipeline in
//! [`crate::cipher`] composes them. All of them mutate the state in place.

use crate::block::{to_bits, to_nibbles};
use crate::error::CipherError;
use crate::table::{PBox, SBox};

/// XORs a round key into the state nibble by nibble.
///
/// Applying the same key twice restores the state. Fails with
/// [`CipherError::InvalidLength`] if the key arity differs from the state
/// arity.
pub fn add_round_key(state: &mut [u8], key: &[u8]) -> Result<(), CipherError> {
    if state.len() != key.len() {
        return Err(CipherError::InvalidLength);
    }
    for (nibble, k) in state.iter_mut().zip(key.iter()) {
        *nibble ^= k;
    }
    Ok(())
}

/// Substitutes every nibble through the S-box, position-preserving.
pub fn substitute(state: &mut [u8], sbox: &SBox) {
    for nibble in state.iter_mut() {
        *nibble = sbox.lookup(*nibble);
    }
}

/// Substitutes every nibble through the inverse S-box.
pub fn inv_substitute(state: &mut [u8], sbox: &SBox) {
    for nibble in state.iter_mut() {
        *nibble = sbox.lookup_inv(*nibble);
    }
}

/// Relocates every bit of the state: source bit `i` moves to destination
/// `pbox[i]`.
///
/// Fails with [`CipherError::InvalidLength`] if the table does not cover
/// exactly the state's bit width.
pub fn permute(state: &mut [u8], pbox: &PBox) -> Result<(), CipherError> {
    if pbox.len() != state.len() * 4 {
        return Err(CipherError::InvalidLength);
    }
    let bits = to_bits(state);
    let mut relocated = vec![0u8; bits.len()];
    for (index, bit) in bits.iter().enumerate() {
        relocated[pbox.lookup(index)] = *bit;
    }
    state.copy_from_slice(&to_nibbles(&relocated)?);
    Ok(())
}

/// Relocates every bit of the state through the inverse permutation,
/// undoing [`permute`].
pub fn inv_permute(state: &mut [u8], pbox: &PBox) -> Result<(), CipherError> {
    if pbox.len() != state.len() * 4 {
        return Err(CipherError::InvalidLength);
    }
    let bits = to_bits(state);
    let mut relocated = vec![0u8; bits.len()];
    for (index, bit) in bits.iter().enumerate() {
        relocated[pbox.lookup_inv(index)] = *bit;
    }
    state.copy_from_slice(&to_nibbles(&relocated)?);
    Ok(())
}
