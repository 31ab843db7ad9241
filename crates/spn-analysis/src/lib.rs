//! Differential cryptanalysis toolkit for the toy SPN cipher.
//!
//! Implements the chosen-plaintext attack the cipher's tutorial walks
//! through: tabulating the S-box difference distribution, searching greedy
//! differential trails through the permutation layer, and recovering the
//! five round keys of a four-round SPN from an encryption oracle.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod attack;
mod ddt;
mod trail;
mod word;

pub use crate::attack::{recover_round_keys, AttackConfig};
pub use crate::ddt::DifferenceDistributionTable;
pub use crate::trail::{find_trails, Trail, TrailCatalog};
pub use crate::word::{from_block, to_block};
