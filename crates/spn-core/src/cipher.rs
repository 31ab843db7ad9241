//! The multi-round cipher pipeline.
//!
//! The toy cipher and the full SPN share one schedule definition: a list of
//! stages expanded from [`CipherParams`]. Encryption walks the schedule
//! forward; decryption walks it backward applying the inverse primitive at
//! every step, so the two directions cannot drift apart.

use crate::block::Block;
use crate::error::CipherError;
use crate::round;
use crate::table::{PBox, SBox};

/// Shape of a cipher topology: block width in nibbles, number of full
/// rounds, and whether rounds carry the bit permutation layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CipherParams {
    width: usize,
    rounds: usize,
    with_permutation: bool,
}

impl CipherParams {
    /// The 4-bit toy cipher: a single nibble, one substitution round framed
    /// by two round keys, no permutation layer.
    pub fn toy() -> Self {
        Self {
            width: 1,
            rounds: 1,
            with_permutation: false,
        }
    }

    /// The 16-bit SPN: four nibbles, four rounds with a bit permutation in
    /// every round but the last, five round keys.
    pub fn spn() -> Self {
        Self {
            width: 4,
            rounds: 4,
            with_permutation: true,
        }
    }

    /// Block arity in nibbles.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of full key-mix/substitute rounds.
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// Round keys the topology consumes: one per round plus the final
    /// whitening key.
    pub fn round_key_count(&self) -> usize {
        self.rounds + 1
    }

    /// Expands the topology into its ordered stage schedule.
    fn stages(&self) -> Vec<Stage> {
        let mut stages = Vec::new();
        for round in 0..self.rounds {
            stages.push(Stage::AddRoundKey(round));
            stages.push(Stage::Substitute);
            if self.with_permutation && round + 1 < self.rounds {
                stages.push(Stage::Permute);
            }
        }
        stages.push(Stage::AddRoundKey(self.rounds));
        stages
    }
}

/// One primitive application within the schedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    AddRoundKey(usize),
    Substitute,
    Permute,
}

#[derive(Clone, Copy)]
pub(crate) enum Direction {
    Encrypt,
    Decrypt,
}

/// A fully validated cipher instance: topology, tables, and round keys.
///
/// Construction checks every length up front, so a constructed cipher can
/// only fail on a block whose arity does not match its width. The engine
/// never returns a partially transformed block.
#[derive(Clone, Debug)]
pub struct Cipher {
    params: CipherParams,
    stages: Vec<Stage>,
    sbox: SBox,
    pbox: Option<PBox>,
    round_keys: Vec<Block>,
}

impl Cipher {
    /// Builds a cipher from validated tables and round keys.
    ///
    /// Fails with [`CipherError::InvalidLength`] if the key count is not
    /// `rounds + 1`, any key's arity differs from the block width, or the
    /// permutation table is missing, extraneous, or does not cover the
    /// block's bits.
    pub fn new(
        params: CipherParams,
        sbox: SBox,
        pbox: Option<PBox>,
        round_keys: Vec<Block>,
    ) -> Result<Self, CipherError> {
        if round_keys.len() != params.round_key_count() {
            return Err(CipherError::InvalidLength);
        }
        if round_keys.iter().any(|key| key.len() != params.width) {
            return Err(CipherError::InvalidLength);
        }
        match (&pbox, params.with_permutation) {
            (Some(pbox), true) if pbox.len() == params.width * 4 => {}
            (None, false) => {}
            _ => return Err(CipherError::InvalidLength),
        }
        Ok(Self {
            stages: params.stages(),
            params,
            sbox,
            pbox,
            round_keys,
        })
    }

    /// Topology of this instance.
    pub fn params(&self) -> &CipherParams {
        &self.params
    }

    /// The substitution table.
    pub fn sbox(&self) -> &SBox {
        &self.sbox
    }

    /// The permutation table, when the topology carries one.
    pub fn pbox(&self) -> Option<&PBox> {
        self.pbox.as_ref()
    }

    /// Encrypts a block.
    pub fn encrypt(&self, block: &[u8]) -> Result<Block, CipherError> {
        self.run(block, Direction::Encrypt, |_| {})
    }

    /// Decrypts a block; the exact inverse of [`Cipher::encrypt`].
    pub fn decrypt(&self, block: &[u8]) -> Result<Block, CipherError> {
        self.run(block, Direction::Decrypt, |_| {})
    }

    /// Walks the stage schedule over a copy of `block`, calling `observe`
    /// on the initial state and after every stage.
    pub(crate) fn run<F: FnMut(&[u8])>(
        &self,
        block: &[u8],
        direction: Direction,
        mut observe: F,
    ) -> Result<Block, CipherError> {
        if block.len() != self.params.width {
            return Err(CipherError::InvalidLength);
        }
        let mut state = block.to_vec();
        observe(&state);
        let stages: Box<dyn Iterator<Item = &Stage>> = match direction {
            Direction::Encrypt => Box::new(self.stages.iter()),
            Direction::Decrypt => Box::new(self.stages.iter().rev()),
        };
        for stage in stages {
            self.apply(*stage, direction, &mut state)?;
            observe(&state);
        }
        Ok(state)
    }

    fn apply(
        &self,
        stage: Stage,
        direction: Direction,
        state: &mut [u8],
    ) -> Result<(), CipherError> {
        match (stage, direction) {
            (Stage::AddRoundKey(index), _) => {
                round::add_round_key(state, &self.round_keys[index])
            }
            (Stage::Substitute, Direction::Encrypt) => {
                round::substitute(state, &self.sbox);
                Ok(())
            }
            (Stage::Substitute, Direction::Decrypt) => {
                round::inv_substitute(state, &self.sbox);
                Ok(())
            }
            (Stage::Permute, Direction::Encrypt) => match &self.pbox {
                Some(pbox) => round::permute(state, pbox),
                None => Err(CipherError::InvalidLength),
            },
            (Stage::Permute, Direction::Decrypt) => match &self.pbox {
                Some(pbox) => round::inv_permute(state, pbox),
                None => Err(CipherError::InvalidLength),
            },
        }
    }
}
