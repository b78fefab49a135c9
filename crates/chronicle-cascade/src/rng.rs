//! Deterministic random source for the cascade engine.
//!
//! The engine itself only ever sees a [`RandomFn`](crate::engine::RandomFn)
//! closure -- it has no opinion on what backs it. This module supplies the
//! production backing: a PCG stream seeded once from a master seed, so a
//! run is reproducible end to end from that single number (T-8).

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

use crate::engine::RandomFn;

/// Build a `RandomFn` drawing uniform `[0,1)` floats from a PCG stream
/// seeded with `seed`. Two engines built from the same seed draw the
/// same sequence of values forever, independent of wall-clock time or
/// thread scheduling.
pub fn seeded_random_fn(seed: u64) -> RandomFn {
    let mut rng = Pcg64Mcg::seed_from_u64(seed);
    Box::new(move || {
        let bits = rng.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    })
}
