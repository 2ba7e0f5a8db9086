//! Prime search recorded in the prover state once per round.

use pentagon_proto::HolyPrime;
use rand::Rng;

/// Candidates are drawn from this range before searching upward.
const CANDIDATE_RANGE: std::ops::Range<u64> = 1_000_000..10_000_000;

pub fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }
    let mut d = 3u64;
    while d.saturating_mul(d) <= n {
        if n % d == 0 {
            return false;
        }
        d += 2;
    }
    true
}

/// Walk upward from `candidate` to the first prime, counting the numbers
/// tried along the way.
pub fn search_from(candidate: u64) -> HolyPrime {
    let mut n = candidate;
    let mut attempt = 1u32;
    while !is_prime(n) {
        n += 1;
        attempt += 1;
    }
    HolyPrime {
        attempt,
        candidate_prime: candidate,
        holy_prime: n,
    }
}

/// Search from a random candidate.
pub fn search(rng: &mut impl Rng) -> HolyPrime {
    search_from(rng.gen_range(CANDIDATE_RANGE))
}
