//! Deterministic choice helpers over an explicit RNG.
//!
//! The engine never owns an RNG; the driver seeds a `ChaCha8Rng` and threads
//! it through every operation that makes a random choice, so identical seeds
//! replay identical layouts.

use rand_chacha::rand_core::RngCore;

pub fn pick_index(rng: &mut impl RngCore, len: usize) -> usize {
    debug_assert!(len > 0);
    rng.next_u32() as usize % len
}

pub fn pick<'a, T>(rng: &mut impl RngCore, items: &'a [T]) -> Option<&'a T> {
    if items.is_empty() {
        return None;
    }
    Some(&items[pick_index(rng, items.len())])
}

/// Fisher-Yates shuffle into a fresh vector, leaving the input untouched.
pub fn shuffled<T: Clone>(rng: &mut impl RngCore, items: &[T]) -> Vec<T> {
    let mut out = items.to_vec();
    for i in (1..out.len()).rev() {
        let j = pick_index(rng, i + 1);
        out.swap(i, j);
    }
    out
}
