//! Rank arithmetic and consolidation bucket sizing.
//!
//! A node's rank is its current number of children. Ranks are bounded
//! logarithmically in the heap size: linking only ever combines two trees
//! of equal rank, so a tree of rank `r` holds at least `F(r+2)` nodes when
//! cuts are deferred (the Fibonacci minimum-size property) and exactly
//! `2^r` nodes when they are not. Either way `r` fits comfortably in a
//! `u8`, which saves 7 bytes per node over `usize` on 64-bit targets.

/// Type alias for node rank.
///
/// `u8` supports ranks up to 255; the largest rank reachable on real
/// hardware is below 100 even under the looser golden-ratio bound.
pub type Rank = u8;

/// Increment a rank, panicking on the impossible overflow.
///
/// # Panics
///
/// Panics if `rank == u8::MAX`. Reaching that would require a heap far
/// larger than addressable memory, so a panic here indicates a linking
/// bug rather than a capacity limit.
#[inline]
pub fn checked_increment(rank: Rank) -> Rank {
    rank.checked_add(1)
        .expect("rank overflow: ranks are logarithmic in heap size")
}

/// Decrement a rank, returning 0 if already at 0.
///
/// Cuts remove one child at a time, so rank 0 is only ever decremented
/// through a bug; saturating keeps the structure diagnosable instead of
/// wrapping.
#[inline]
pub fn saturating_decrement(rank: Rank) -> Rank {
    rank.saturating_sub(1)
}

/// The golden ratio, base of the rank bound in cut mode.
const PHI: f64 = 1.618033988749895;

/// Number of slots the consolidation bucket needs for a heap of `len`
/// items.
///
/// The maximum rank of any tree is `⌈log_φ(len)⌉` when every linked
/// subtree satisfies the Fibonacci minimum-size property, and strictly
/// less (`⌊log₂(len)⌋`) for the purely binomial shapes produced in
/// heapify mode. The returned capacity is twice `⌈log_φ(len)⌉ + 1`,
/// which covers both regimes with margin to spare; consolidation must
/// never index past it.
#[inline]
pub fn bucket_capacity(len: usize) -> usize {
    debug_assert!(len > 1, "a 0- or 1-item heap never consolidates");
    let bound = ((len as f64).ln() / PHI.ln()).ceil() as usize + 1;
    2 * bound
}
