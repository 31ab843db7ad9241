//! Step tracing: the cipher pipeline with every intermediate state
//! recorded for rendering.

use crate::block::Block;
use crate::cipher::{Cipher, Direction};
use crate::error::CipherError;

/// Ordered record of a traced cipher run.
///
/// `steps` starts with the initial state and holds one snapshot per
/// primitive application; the last snapshot equals `output`. The toy
/// cipher produces 4 snapshots, the SPN 13, in both directions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Trace {
    /// The block the untraced pipeline returns for the same inputs.
    pub output: Block,
    /// Every intermediate state, initial state first.
    pub steps: Vec<Block>,
}

impl Cipher {
    /// Encrypts a block, recording the state after every primitive.
    pub fn encrypt_traced(&self, block: &[u8]) -> Result<Trace, CipherError> {
        self.run_traced(block, Direction::Encrypt)
    }

    /// Decrypts a block, recording the state after every primitive.
    pub fn decrypt_traced(&self, block: &[u8]) -> Result<Trace, CipherError> {
        self.run_traced(block, Direction::Decrypt)
    }

    fn run_traced(&self, block: &[u8], direction: Direction) -> Result<Trace, CipherError> {
        let mut steps = Vec::new();
        let output = self.run(block, direction, |state| steps.push(state.to_vec()))?;
        Ok(Trace { output, steps })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::CipherParams;
    use crate::table::{PBox, SBox};

    const TUTORIAL_SBOX: [u8; 16] = [
        0xe, 0x4, 0xd, 0x1, 0x2, 0xf, 0xb, 0x8, 0x3, 0xa, 0x6, 0xc, 0x5, 0x9, 0x0, 0x7,
    ];
    const TUTORIAL_PBOX: [usize; 16] = [
        0x0, 0x4, 0x8, 0xc, 0x1, 0x5, 0x9, 0xd, 0x2, 0x6, 0xa, 0xe, 0x3, 0x7, 0xb, 0xf,
    ];

    fn tutorial_spn() -> Cipher {
        let keys = [
            [0x1, 0xa, 0x6, 0xd],
            [0x2, 0xa, 0xc, 0x2],
            [0x4, 0x5, 0x2, 0xf],
            [0x6, 0xf, 0xf, 0x1],
            [0xb, 0x5, 0x2, 0x0],
        ];
        Cipher::new(
            CipherParams::spn(),
            SBox::new(&TUTORIAL_SBOX).unwrap(),
            Some(PBox::new(&TUTORIAL_PBOX, 16).unwrap()),
            keys.iter().map(|key| key.to_vec()).collect(),
        )
        .unwrap()
    }

    #[test]
    fn toy_trace_has_four_snapshots() {
        let cipher = Cipher::new(
            CipherParams::toy(),
            SBox::identity(),
            None,
            vec![vec![0x3], vec![0x1]],
        )
        .unwrap();
        let trace = cipher.encrypt_traced(&[0x5]).unwrap();
        assert_eq!(
            trace.steps,
            vec![vec![0x5], vec![0x6], vec![0x6], vec![0x7]]
        );
        assert_eq!(trace.output, vec![0x7]);

        let back = cipher.decrypt_traced(&[0x7]).unwrap();
        assert_eq!(back.steps.len(), 4);
        assert_eq!(back.output, vec![0x5]);
    }

    #[test]
    fn spn_trace_has_thirteen_snapshots() {
        let cipher = tutorial_spn();
        let trace = cipher.encrypt_traced(&[0x1, 0x2, 0x3, 0x4]).unwrap();
        assert_eq!(trace.steps.len(), 13);
        assert_eq!(trace.steps[0], vec![0x1, 0x2, 0x3, 0x4]);
        // Spot-check the states the diagram highlights.
        assert_eq!(trace.steps[1], vec![0x0, 0x8, 0x5, 0x9]);
        assert_eq!(trace.steps[2], vec![0xe, 0x3, 0xf, 0xa]);
        assert_eq!(trace.steps[3], vec![0xb, 0xa, 0xf, 0x6]);
        assert_eq!(trace.steps[12], vec![0x3, 0xf, 0xd, 0x6]);
        assert_eq!(trace.output, vec![0x3, 0xf, 0xd, 0x6]);

        let back = cipher.decrypt_traced(&[0x3, 0xf, 0xd, 0x6]).unwrap();
        assert_eq!(back.steps.len(), 13);
        assert_eq!(back.output, vec![0x1, 0x2, 0x3, 0x4]);
    }

    #[test]
    fn decryption_trace_mirrors_encryption_trace() {
        let cipher = tutorial_spn();
        let forward = cipher.encrypt_traced(&[0x1, 0x2, 0x3, 0x4]).unwrap();
        let backward = cipher.decrypt_traced(&forward.output).unwrap();
        let mut reversed = forward.steps.clone();
        reversed.reverse();
        assert_eq!(backward.steps, reversed);
    }

    #[test]
    fn tracing_does_not_change_the_output() {
        let cipher = tutorial_spn();
        for word in [0x0000u16, 0x1234, 0xa5a5, 0xffff] {
            let block: Block = (0..4).map(|i| ((word >> (12 - 4 * i)) & 0xf) as u8).collect();
            let traced = cipher.encrypt_traced(&block).unwrap();
            assert_eq!(traced.output, cipher.encrypt(&block).unwrap());
            assert_eq!(traced.steps.last(), Some(&traced.output));
        }
    }
}
