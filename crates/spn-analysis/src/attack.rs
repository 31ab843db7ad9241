//! Chosen-plaintext key recovery against the four-round SPN.
//!
//! The attacker knows the S-box and P-box, can ask the oracle to encrypt
//! arbitrary plaintexts, and wants the five round keys. Working from the
//! last round key inwards, each key is guessed in partial-subkey pieces:
//! a high-probability differential trail predicts the state difference in
//! front of a substitution layer, and the key-bit guesses that make many
//! ciphertext pairs decrypt back to that difference are kept as
//! candidates.

use std::collections::HashMap;

use rand::Rng;
use spn_core::{Cipher, CipherError, CipherParams, PBox, SBox};

use crate::trail::{Trail, TrailCatalog};
use crate::word;

/// Round keys the four-round SPN consumes.
const ROUND_KEYS: usize = 5;

/// Tunables for the key recovery.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AttackConfig {
    /// Scales the chosen-plaintext budget per trail: a trail of
    /// probability `p` gets `round(plaintext_budget / p)` pairs.
    pub plaintext_budget: f64,
    /// Candidate values kept per partial subkey.
    pub candidate_options: usize,
    /// Random plaintexts used to confirm a full key guess against the
    /// oracle.
    pub confirmation_samples: usize,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            plaintext_budget: 30.0,
            candidate_options: 3,
            confirmation_samples: 5,
        }
    }
}

/// Recovers the round keys of `oracle` using chosen plaintexts.
///
/// The oracle must be an SPN-topology cipher; its tables are treated as
/// public and only its round keys as secret. Returns `None` when no
/// candidate combination survives confirmation. A returned key set is
/// confirmed against the oracle but may differ from the original keys
/// when the S-box admits equivalent key sets.
pub fn recover_round_keys<R: Rng>(
    oracle: &Cipher,
    catalog: &TrailCatalog,
    config: &AttackConfig,
    rng: &mut R,
) -> Result<Option<[u16; ROUND_KEYS]>, CipherError> {
    let pbox = match oracle.pbox() {
        Some(pbox) => pbox,
        None => return Err(CipherError::InvalidLength),
    };
    if oracle.params().width() != word::STATE_NIBBLES
        || oracle.params().round_key_count() != ROUND_KEYS
    {
        return Err(CipherError::InvalidLength);
    }
    let ctx = AttackContext {
        oracle,
        sbox: oracle.sbox(),
        pbox,
    };

    let covering: Vec<Vec<Trail>> = (0..4)
        .map(|depth| covering_trails(catalog.for_rounds(depth)))
        .collect();

    let mut keys = [0u16; ROUND_KEYS];
    for k5 in ctx.break_round_key(3, &covering[3], keys, config, rng)? {
        keys[4] = k5;
        for k4 in ctx.break_round_key(2, &covering[2], keys, config, rng)? {
            keys[3] = k4;
            for k3 in ctx.break_round_key(1, &covering[1], keys, config, rng)? {
                keys[2] = k3;
                for k2 in ctx.break_round_key(0, &covering[0], keys, config, rng)? {
                    keys[1] = k2;
                    keys[0] = ctx.recover_first_key(&keys, rng)?;
                    if ctx.confirm(&keys, config.confirmation_samples, rng)? {
                        return Ok(Some(keys));
                    }
                }
            }
        }
    }
    Ok(None)
}

/// Picks trails whose final active S-boxes together cover all four
/// positions, preferring the best-ranked trail that still breaks new key
/// bits.
fn covering_trails(trails: &[Trail]) -> Vec<Trail> {
    let mut useful = Vec::new();
    let mut used = [false; word::STATE_NIBBLES];
    while used.iter().any(|covered| !covered) {
        let hit = trails.iter().find(|trail| {
            (0..word::STATE_NIBBLES)
                .any(|i| word::nibble(trail.output_xor, i) != 0 && !used[i])
        });
        match hit {
            Some(trail) => {
                for i in 0..word::STATE_NIBBLES {
                    if word::nibble(trail.output_xor, i) != 0 {
                        used[i] = true;
                    }
                }
                useful.push(*trail);
            }
            None => break,
        }
    }
    useful
}

/// Merges partial-subkey candidate lists into full round key candidates,
/// ordered by the sum of the partial candidates' ranks so that likelier
/// combinations come first.
fn combine_partial_subkeys(partials: &[Vec<u16>]) -> Vec<u16> {
    let mut combined: Vec<(usize, u16)> = Vec::new();
    for values in partials {
        if combined.is_empty() {
            combined = values
                .iter()
                .enumerate()
                .map(|(rank, &value)| (rank, value))
                .collect();
        } else {
            let mut next = Vec::with_capacity(combined.len() * values.len());
            for &(rank, key) in &combined {
                for (extra, &value) in values.iter().enumerate() {
                    next.push((rank + extra, key | value));
                }
            }
            combined = next;
        }
    }
    combined.sort_unstable();
    combined.into_iter().map(|(_, key)| key).collect()
}

struct AttackContext<'a> {
    oracle: &'a Cipher,
    sbox: &'a SBox,
    pbox: &'a PBox,
}

impl AttackContext<'_> {
    fn encrypt_word(&self, word: u16) -> Result<u16, CipherError> {
        Ok(word::from_block(
            &self.oracle.encrypt(&word::to_block(word))?,
        ))
    }

    /// Bits of the guessed round key that can influence the trail's active
    /// S-boxes during partial decryption. For depths that peel through a
    /// permutation layer the active positions map through the P-box first.
    fn breaking_key_bits(&self, depth: usize, output_xor: u16) -> u16 {
        let mut mask = 0u16;
        for position in 0..word::STATE_NIBBLES {
            if word::nibble(output_xor, position) != 0 {
                mask = word::set_nibble(mask, position, 0xf);
            }
        }
        if depth < 3 {
            mask = word::permute(mask, self.pbox);
        }
        mask
    }

    /// Decrypts a ciphertext pair down to the state in front of round
    /// `depth + 1`'s substitution layer and returns the difference there.
    fn partial_decrypt_difference(
        &self,
        depth: usize,
        mut c1: u16,
        mut c2: u16,
        keys: &[u16; ROUND_KEYS],
    ) -> u16 {
        for index in (depth + 1..ROUND_KEYS).rev() {
            c1 ^= keys[index];
            c2 ^= keys[index];
            if index < ROUND_KEYS - 1 {
                c1 = word::inv_permute(c1, self.pbox);
                c2 = word::inv_permute(c2, self.pbox);
            }
            c1 = word::inv_substitute(c1, self.sbox);
            c2 = word::inv_substitute(c2, self.sbox);
        }
        c1 ^ c2
    }

    /// Counts, over every value of the breaking key bits, how often the
    /// partially decrypted pair shows the trail's expected difference.
    fn tally_key_guesses(
        &self,
        depth: usize,
        c1: u16,
        c2: u16,
        output_xor: u16,
        breaking: u16,
        keys: &[u16; ROUND_KEYS],
        counts: &mut HashMap<u16, u32>,
    ) {
        let positions: Vec<usize> = (0..word::STATE_BITS)
            .filter(|&bit| breaking >> bit & 1 == 1)
            .collect();
        let mut working = *keys;
        for selector in 0u32..(1 << positions.len()) {
            let mut guess = 0u16;
            for (bit, &position) in positions.iter().enumerate() {
                if selector >> bit & 1 == 1 {
                    guess |= 1 << position;
                }
            }
            working[depth + 1] = guess;
            if self.partial_decrypt_difference(depth, c1, c2, &working) == output_xor {
                *counts.entry(guess).or_insert(0) += 1;
            }
        }
    }

    /// Estimates the breaking key bits for one trail from chosen-plaintext
    /// pairs, most frequently confirmed guesses first.
    fn break_key_bits<R: Rng>(
        &self,
        depth: usize,
        trail: &Trail,
        breaking: u16,
        keys: &[u16; ROUND_KEYS],
        config: &AttackConfig,
        rng: &mut R,
    ) -> Result<Vec<u16>, CipherError> {
        let mut counts = HashMap::new();
        let pairs = (config.plaintext_budget / trail.probability).round() as usize;
        for _ in 0..pairs {
            let p1: u16 = rng.gen();
            let p2 = p1 ^ trail.input_xor;
            let c1 = self.encrypt_word(p1)?;
            let c2 = self.encrypt_word(p2)?;
            self.tally_key_guesses(depth, c1, c2, trail.output_xor, breaking, keys, &mut counts);
        }
        let mut ranked: Vec<(u16, u32)> = counts.into_iter().collect();
        ranked.sort_unstable_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        Ok(ranked
            .into_iter()
            .take(config.candidate_options)
            .map(|(guess, _)| guess)
            .collect())
    }

    /// Produces full candidates for the round key at `depth + 1` by
    /// breaking partial subkeys trail by trail and combining them.
    fn break_round_key<R: Rng>(
        &self,
        depth: usize,
        trails: &[Trail],
        keys: [u16; ROUND_KEYS],
        config: &AttackConfig,
        rng: &mut R,
    ) -> Result<Vec<u16>, CipherError> {
        let mut total_broken = 0u16;
        let mut partials: Vec<Vec<u16>> = Vec::new();
        for trail in trails {
            let breaking = self.breaking_key_bits(depth, trail.output_xor);
            let mut candidates =
                self.break_key_bits(depth, trail, breaking, &keys, config, rng)?;
            // Bits an earlier trail already pinned down are masked off so
            // the partial values can be ORed together later.
            for candidate in candidates.iter_mut() {
                *candidate &= !total_broken;
            }
            let mut unique = Vec::with_capacity(candidates.len());
            for candidate in candidates {
                if !unique.contains(&candidate) {
                    unique.push(candidate);
                }
            }
            total_broken |= breaking;
            partials.push(unique);
        }
        Ok(combine_partial_subkeys(&partials))
    }

    /// With keys 2..=5 fixed, the first round key falls out directly:
    /// peel an encryption back to the initial key mix and XOR with the
    /// plaintext.
    fn recover_first_key<R: Rng>(
        &self,
        keys: &[u16; ROUND_KEYS],
        rng: &mut R,
    ) -> Result<u16, CipherError> {
        let plaintext: u16 = rng.gen();
        let mut state = self.encrypt_word(plaintext)?;
        state ^= keys[4];
        state = word::inv_substitute(state, self.sbox);
        for index in (1..=3).rev() {
            state ^= keys[index];
            state = word::inv_permute(state, self.pbox);
            state = word::inv_substitute(state, self.sbox);
        }
        Ok(plaintext ^ state)
    }

    /// Checks a full key guess by comparing encryptions against the
    /// oracle on fresh random plaintexts.
    fn confirm<R: Rng>(
        &self,
        keys: &[u16; ROUND_KEYS],
        samples: usize,
        rng: &mut R,
    ) -> Result<bool, CipherError> {
        let candidate = Cipher::new(
            CipherParams::spn(),
            self.sbox.clone(),
            Some(self.pbox.clone()),
            keys.iter().map(|&key| word::to_block(key)).collect(),
        )?;
        for _ in 0..samples {
            let plaintext = word::to_block(rng.gen());
            if candidate.encrypt(&plaintext)? != self.oracle.encrypt(&plaintext)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
