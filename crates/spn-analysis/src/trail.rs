//! Greedy differential trail search.

use serde::{Deserialize, Serialize};
use spn_core::PBox;

use crate::ddt::DifferenceDistributionTable;
use crate::word;

/// Partial-round depths the key recovery works through: trails are needed
/// after 0, 1, 2, and 3 rounds of propagation.
const CATALOG_DEPTHS: usize = 4;

/// A differential trail: an input difference, the difference it is
/// expected to propagate to, and how likely that propagation is.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trail {
    /// Plaintext-side difference.
    pub input_xor: u16,
    /// Expected difference after the trail's rounds.
    pub output_xor: u16,
    /// Product of the per-S-box propagation probabilities.
    pub probability: f64,
    /// Ranking score: the probability, quartered for trails ending in
    /// three active S-boxes and zeroed for trails activating all four,
    /// since those force guessing too many key bits at once.
    pub preference: f64,
}

/// Greedily propagates one input difference through `rounds` rounds.
///
/// At every active S-box the most frequent output difference is taken and
/// the probability scaled by its distribution count; key mixing never
/// changes a difference and the permutation only relocates its bits.
pub fn propagate(
    input_xor: u16,
    ddt: &DifferenceDistributionTable,
    pbox: &PBox,
    rounds: usize,
) -> Trail {
    let mut probability = 1.0;
    let mut current = input_xor;
    for _ in 0..rounds {
        for position in 0..word::STATE_NIBBLES {
            let diff = word::nibble(current, position);
            if diff != 0 {
                let (output_xor, count) = ddt.best_output(diff);
                probability *= f64::from(count) / 16.0;
                current = word::set_nibble(current, position, output_xor);
            }
        }
        current = word::permute(current, pbox);
    }

    let active = (0..word::STATE_NIBBLES)
        .filter(|&position| word::nibble(current, position) != 0)
        .count();
    let preference = match active {
        3 => probability / 4.0,
        4 => 0.0,
        _ => probability,
    };

    Trail {
        input_xor,
        output_xor: current,
        probability,
        preference,
    }
}

/// Finds a trail for every nonzero input difference, most preferred first.
pub fn find_trails(
    ddt: &DifferenceDistributionTable,
    pbox: &PBox,
    rounds: usize,
) -> Vec<Trail> {
    let mut trails: Vec<Trail> = (1..=u16::MAX)
        .map(|input_xor| propagate(input_xor, ddt, pbox, rounds))
        .collect();
    trails.sort_by(|a, b| {
        b.preference
            .total_cmp(&a.preference)
            .then(b.probability.total_cmp(&a.probability))
            .then(b.input_xor.cmp(&a.input_xor))
    });
    trails
}

/// Sorted trails for every partial-round depth the key recovery needs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrailCatalog {
    by_rounds: Vec<Vec<Trail>>,
}

impl TrailCatalog {
    /// Searches trails for depths 0 through 3.
    pub fn build(ddt: &DifferenceDistributionTable, pbox: &PBox) -> Self {
        Self {
            by_rounds: (0..CATALOG_DEPTHS)
                .map(|rounds| find_trails(ddt, pbox, rounds))
                .collect(),
        }
    }

    /// Trails propagated through `rounds` rounds (0..=3), best first.
    pub fn for_rounds(&self, rounds: usize) -> &[Trail] {
        &self.by_rounds[rounds]
    }

    /// Serializes the catalog with `bincode`.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserializes a catalog with `bincode`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spn_core::SBox;

    const TUTORIAL_SBOX: [u8; 16] = [
        0xe, 0x4, 0xd, 0x1, 0x2, 0xf, 0xb, 0x8, 0x3, 0xa, 0x6, 0xc, 0x5, 0x9, 0x0, 0x7,
    ];
    const TUTORIAL_PBOX: [usize; 16] = [
        0x0, 0x4, 0x8, 0xc, 0x1, 0x5, 0x9, 0xd, 0x2, 0x6, 0xa, 0xe, 0x3, 0x7, 0xb, 0xf,
    ];

    fn tutorial_tables() -> (DifferenceDistributionTable, PBox) {
        let ddt = DifferenceDistributionTable::new(&SBox::new(&TUTORIAL_SBOX).unwrap());
        let pbox = PBox::new(&TUTORIAL_PBOX, 16).unwrap();
        (ddt, pbox)
    }

    #[test]
    fn propagates_the_tutorial_trail() {
        let (ddt, pbox) = tutorial_tables();
        let one = propagate(0x0b00, &ddt, &pbox, 1);
        assert_eq!(one.output_xor, 0x0040);
        assert!((one.probability - 0.5).abs() < 1e-12);

        let two = propagate(0x0b00, &ddt, &pbox, 2);
        assert_eq!(two.output_xor, 0x0220);
        assert!((two.probability - 0.1875).abs() < 1e-12);

        let three = propagate(0x0b00, &ddt, &pbox, 3);
        assert_eq!(three.output_xor, 0x0606);
        assert!((three.probability - 0.0263671875).abs() < 1e-12);
    }

    #[test]
    fn zero_rounds_keeps_the_input_difference() {
        let (ddt, pbox) = tutorial_tables();
        let trail = propagate(0x00f0, &ddt, &pbox, 0);
        assert_eq!(trail.output_xor, 0x00f0);
        assert!((trail.probability - 1.0).abs() < 1e-12);
    }

    #[test]
    fn four_active_final_sboxes_disqualify_a_trail() {
        let (ddt, pbox) = tutorial_tables();
        let trail = propagate(0x1111, &ddt, &pbox, 1);
        assert_eq!(trail.output_xor, 0xf0f0);
        assert_eq!(trail.preference, 0.0);
        assert!(trail.probability > 0.0);
    }

    #[test]
    fn best_three_round_trail_leads_the_list() {
        let (ddt, pbox) = tutorial_tables();
        let trails = find_trails(&ddt, &pbox, 3);
        assert_eq!(trails.len(), 0xffff);
        let best = trails[0];
        assert_eq!(best.input_xor, 0xb0b0);
        assert_eq!(best.output_xor, 0x0808);
        assert!((best.probability - 0.03515625).abs() < 1e-12);
        for pair in trails.windows(2) {
            assert!(pair[0].preference >= pair[1].preference);
        }
    }

    #[test]
    fn catalog_serialization_round_trips() {
        let (ddt, pbox) = tutorial_tables();
        let catalog = TrailCatalog::build(&ddt, &pbox);
        let bytes = catalog.to_bytes().unwrap();
        let decoded = TrailCatalog::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, catalog);
        assert_eq!(decoded.for_rounds(3).len(), 0xffff);
    }
}
