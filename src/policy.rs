//! Meld and key-decrease strategies.
//!
//! The heap engine takes one value of each enum at construction time and
//! never changes them. The four combinations are the four classical
//! structures:
//!
//! | meld            | decrease                     | variant             |
//! |-----------------|------------------------------|---------------------|
//! | [`Eager`]       | [`HeapifyUp`]                | regular binomial    |
//! | [`Lazy`]        | [`HeapifyUp`]                | lazy binomial       |
//! | [`Lazy`]        | [`CascadingCut`]             | Fibonacci           |
//! | [`Eager`]       | [`CascadingCut`]             | binomial with cuts  |
//!
//! [`Eager`]: MeldPolicy::Eager
//! [`Lazy`]: MeldPolicy::Lazy
//! [`HeapifyUp`]: DecreasePolicy::HeapifyUp
//! [`CascadingCut`]: DecreasePolicy::CascadingCut

/// How a meld combines two root lists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MeldPolicy {
    /// Splice the root lists and stop. Consolidation is deferred to the
    /// next minimum deletion.
    Lazy,
    /// Splice, then immediately consolidate so that at most one root of
    /// each rank remains. This is the binomial-heap discipline: every
    /// insert behaves like a binary-counter increment.
    Eager,
}

/// How a key decrease restores heap order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DecreasePolicy {
    /// Cut the violating node out of its parent's child list, promote it
    /// to a root, and cascade cuts through marked ancestors. O(1)
    /// amortized per decrease.
    CascadingCut,
    /// Swap item payloads upward until heap order is restored. The tree
    /// shape never changes and no node is ever marked. O(log n) per
    /// decrease.
    HeapifyUp,
}

/// The conventional name for a policy combination, as used by the
/// experiment drivers when labelling result tables.
pub fn variant_name(meld: MeldPolicy, decrease: DecreasePolicy) -> &'static str {
    match (meld, decrease) {
        (MeldPolicy::Eager, DecreasePolicy::HeapifyUp) => "Regular Binomial",
        (MeldPolicy::Lazy, DecreasePolicy::HeapifyUp) => "Lazy Binomial",
        (MeldPolicy::Lazy, DecreasePolicy::CascadingCut) => "Fibonacci",
        (MeldPolicy::Eager, DecreasePolicy::CascadingCut) => "Binomial with Cuts",
    }
}
