//! Difference distribution table of an S-box.

use std::fmt;

use serde::{Deserialize, Serialize};
use spn_core::SBox;

/// Nibble difference values.
const DIFFS: usize = 16;

/// Counts, for every input difference, how often each output difference
/// occurs across all input pairs of the S-box.
///
/// Every row sums to 16. Large entries are what the trail search exploits:
/// they mark input/output difference pairs the S-box propagates with high
/// probability.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifferenceDistributionTable {
    counts: [[u8; DIFFS]; DIFFS],
}

impl DifferenceDistributionTable {
    /// Tabulates the differences of `sbox`.
    pub fn new(sbox: &SBox) -> Self {
        let mut counts = [[0u8; DIFFS]; DIFFS];
        for input_xor in 0..DIFFS as u8 {
            for x in 0..DIFFS as u8 {
                let output_xor = sbox.lookup(x) ^ sbox.lookup(x ^ input_xor);
                counts[input_xor as usize][output_xor as usize] += 1;
            }
        }
        Self { counts }
    }

    /// Number of input pairs with the given input and output difference.
    pub fn count(&self, input_xor: u8, output_xor: u8) -> u8 {
        self.counts[(input_xor & 0xf) as usize][(output_xor & 0xf) as usize]
    }

    /// The most frequent output difference for `input_xor` and its count.
    ///
    /// Ties resolve to the smallest output difference.
    pub fn best_output(&self, input_xor: u8) -> (u8, u8) {
        let row = &self.counts[(input_xor & 0xf) as usize];
        let mut best = (0u8, 0u8);
        for (output_xor, &count) in row.iter().enumerate() {
            if count > best.1 {
                best = (output_xor as u8, count);
            }
        }
        best
    }
}

impl fmt::Display for DifferenceDistributionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let border =
            "+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+";
        writeln!(f, "{border}")?;
        writeln!(
            f,
            "|   | 0 | 1 | 2 | 3 | 4 | 5 | 6 | 7 | 8 | 9 | a | b | c | d | e | f |"
        )?;
        writeln!(f, "{border}")?;
        for (input_xor, row) in self.counts.iter().enumerate() {
            write!(f, "| {input_xor:x} |")?;
            for &count in row {
                if count > 9 {
                    write!(f, " {count}|")?;
                } else {
                    write!(f, " {count} |")?;
                }
            }
            writeln!(f)?;
            writeln!(f, "{border}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TUTORIAL_SBOX: [u8; 16] = [
        0xe, 0x4, 0xd, 0x1, 0x2, 0xf, 0xb, 0x8, 0x3, 0xa, 0x6, 0xc, 0x5, 0x9, 0x0, 0x7,
    ];

    #[test]
    fn rows_sum_to_sixteen() {
        let ddt = DifferenceDistributionTable::new(&SBox::new(&TUTORIAL_SBOX).unwrap());
        for input_xor in 0..16u8 {
            let sum: u32 = (0..16u8).map(|o| u32::from(ddt.count(input_xor, o))).sum();
            assert_eq!(sum, 16);
        }
    }

    #[test]
    fn matches_known_tutorial_entries() {
        let ddt = DifferenceDistributionTable::new(&SBox::new(&TUTORIAL_SBOX).unwrap());
        // Row 4: [0,0,0,2,0,0,6,0,0,2,0,4,2,0,0,0].
        assert_eq!(ddt.count(0x4, 0x6), 6);
        assert_eq!(ddt.count(0x4, 0xb), 4);
        assert_eq!(ddt.count(0x4, 0x0), 0);
        // Row b peaks at output 2 with count 8.
        assert_eq!(ddt.count(0xb, 0x2), 8);
        assert_eq!(ddt.best_output(0xb), (0x2, 8));
        assert_eq!(ddt.best_output(0x4), (0x6, 6));
        assert_eq!(ddt.best_output(0xf), (0x4, 6));
    }

    #[test]
    fn identity_sbox_propagates_differences_unchanged() {
        let ddt = DifferenceDistributionTable::new(&SBox::identity());
        for diff in 0..16u8 {
            assert_eq!(ddt.count(diff, diff), 16);
            assert_eq!(ddt.best_output(diff), (diff, 16));
        }
    }

    #[test]
    fn zero_difference_is_certain() {
        let ddt = DifferenceDistributionTable::new(&SBox::new(&TUTORIAL_SBOX).unwrap());
        assert_eq!(ddt.count(0, 0), 16);
        for output_xor in 1..16u8 {
            assert_eq!(ddt.count(0, output_xor), 0);
        }
    }

    #[test]
    fn display_renders_the_grid() {
        let ddt = DifferenceDistributionTable::new(&SBox::new(&TUTORIAL_SBOX).unwrap());
        let rendered = format!("{ddt}");
        assert!(rendered.contains("| 0 | 16|"));
        assert!(rendered.contains("|   | 0 | 1 | 2 |"));
    }
}
