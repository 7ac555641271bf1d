//! Seeded random sources.

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::error::AdjustError;

/// Builds a seeded RNG, failing loudly when no seed is given.
pub fn make_rng(seed: Option<u64>, context: &str) -> Result<StdRng, AdjustError> {
    require_seed(seed, context).map(StdRng::seed_from_u64)
}

/// Returns the seed, or [`AdjustError::MissingSeed`] naming `context`.
pub fn require_seed(seed: Option<u64>, context: &str) -> Result<u64, AdjustError> {
    seed.ok_or_else(|| AdjustError::MissingSeed {
        context: context.to_string(),
    })
}

/// RNG for one unit of parallel work, derived from a base seed.
pub fn stream_rng(seed: u64, stream: u64) -> StdRng {
    StdRng::seed_from_u64(stream_seed(seed, stream))
}

/// Derives an independent stream seed for a unit of parallel work, so that
/// results do not depend on how work is scheduled across threads.
pub fn stream_seed(seed: u64, stream: u64) -> u64 {
    // splitmix64 finaliser
    let mut z = seed ^ stream.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn missing_seed_fails() {
        let err = make_rng(None, "rotation sampling").unwrap_err();
        assert_eq!(
            err,
            AdjustError::MissingSeed {
                context: "rotation sampling".to_string()
            }
        );
    }

    #[test]
    fn same_seed_same_stream() {
        let a: u64 = make_rng(Some(5), "t").unwrap().random();
        let b: u64 = make_rng(Some(5), "t").unwrap().random();
        assert_eq!(a, b);
    }

    #[test]
    fn streams_differ() {
        assert_ne!(stream_seed(1, 0), stream_seed(1, 1));
        assert_eq!(stream_seed(1, 7), stream_seed(1, 7));
    }
}
