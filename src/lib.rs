//! Four amortized priority-queue variants from one forest engine.
//!
//! This crate implements a priority queue over positive integer keys as a
//! forest of heap-ordered, rank-bounded trees with two independently
//! selectable strategies, fixed per instance at construction:
//!
//! - **Meld**: lazy (splice the root lists, defer linking) or eager
//!   (splice, then immediately consolidate equal-rank trees).
//! - **Key decrease**: cascading cuts (detach the violating node, mark
//!   and cascade through ancestors) or heapify-up (swap payloads toward
//!   the root in place).
//!
//! The four combinations are the regular binomial heap, the lazy binomial
//! heap, the Fibonacci heap, and the binomial heap with cuts. All share
//! one engine, so their structural behavior can be compared directly
//! through the built-in counters (links, cuts, payload swaps).
//!
//! # Example
//!
//! ```rust
//! use hybrid_heap::HybridHeap;
//!
//! let mut heap = HybridHeap::fibonacci();
//! let item = heap.insert(5, "item");
//! heap.insert(3, "other");
//! heap.decrease_key(item, 4);
//! assert_eq!(heap.peek(), Some((1, &"item")));
//! assert_eq!(heap.delete_min(), Some((1, "item")));
//! ```
//!
//! # Operation costs
//!
//! | operation | lazy meld | eager meld |
//! |---|---|---|
//! | `insert` | O(1) | O(log n) amortized |
//! | `find_min` | O(1) | O(1) |
//! | `delete_min` | O(log n) amortized | O(log n) amortized |
//! | `decrease_key` | O(1) amortized (cuts) / O(log n) (heapify) | same |
//! | `meld` | O(1) | O(log n) amortized |

pub mod heap;
pub mod policy;
pub mod rank;
pub mod stats;

pub use heap::{HybridHeap, ItemRef};
pub use policy::{DecreasePolicy, MeldPolicy};
pub use stats::HeapStats;
