//! N-gram generation and fingerprinting over canonical token streams.
//!
//! The fingerprint is the index key for the whole retrieval system, so its
//! construction is part of the public contract and must never change silently:
//!
//! 1. each token is hashed with `xxh3_64_with_seed(token_bytes, seed)`;
//! 2. the per-token hashes are folded left-to-right with
//!    `h = h * base + t_i` in wrapping u64 arithmetic, where
//!    `base = 1_000_003 ^ splitmix64(seed)`;
//! 3. the result is reinterpreted as a two's-complement `i64`.
//!
//! The polynomial fold makes the hash sensitive to both element identity and
//! position: equal ordered sequences always collide, permuted ones almost
//! never do. Stability across processes follows from xxh3 being fully
//! deterministic for a fixed seed. Changing the seed, the base prime, or the
//! fold invalidates every stored fingerprint.

use std::slice::Windows;

use xxhash_rust::xxh3::xxh3_64_with_seed;

/// Seed used by every deployment that wants index files to be interchangeable.
pub const DEFAULT_FINGERPRINT_SEED: u64 = 0x6B65_726E; // "kern"

/// Base prime for the polynomial fold, perturbed by the seed so distinct
/// seeds produce unrelated fingerprint families.
const POLY_BASE: u64 = 1_000_003;

/// Every contiguous window of `n` tokens, sliding by one position.
///
/// Produces exactly `len - n + 1` windows; shorter inputs (or `n == 0`)
/// produce none, which is not an error.
pub fn ngrams<T: AsRef<str>>(tokens: &[T], n: usize) -> Windows<'_, T> {
    if n == 0 || n > tokens.len() {
        // An empty iterator with the right type: windows over no tokens.
        return tokens[..0].windows(1);
    }
    tokens.windows(n)
}

/// Order-sensitive fingerprint of one n-gram. See the crate docs for the
/// exact construction.
pub fn fingerprint<S: AsRef<str>>(gram: &[S], seed: u64) -> i64 {
    let base = POLY_BASE ^ splitmix64(seed);
    let mut h = 0u64;
    for token in gram {
        let th = xxh3_64_with_seed(token.as_ref().as_bytes(), seed);
        h = h.wrapping_mul(base).wrapping_add(th);
    }
    h as i64
}

/// The n-gram's tokens concatenated with no separator. Diagnostics and the
/// CSV mirror only; correctness never depends on this form.
pub fn gram_text<S: AsRef<str>>(gram: &[S]) -> String {
    gram.iter().map(|t| t.as_ref()).collect()
}

/// splitmix64 finalizer, used to derive the fold base from the seed.
fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
