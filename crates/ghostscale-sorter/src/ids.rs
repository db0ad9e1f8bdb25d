//! Request identifier generation.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const REQUEST_ID_LEN: usize = 32;

/// Source of opaque request identifiers.
///
/// Identifiers are 32 uppercase ASCII letters drawn from a seedable RNG so
/// tests can pin the sequence.
#[derive(Debug)]
pub struct RequestIds {
    rng: StdRng,
}

impl RequestIds {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn next_id(&mut self) -> String {
        (0..REQUEST_ID_LEN)
            .map(|_| char::from(self.rng.random_range(b'A'..=b'Z')))
            .collect()
    }
}
