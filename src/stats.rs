//! Instrumentation snapshots.
//!
//! The heap keeps its counters as plain fields; [`HeapStats`] is the
//! point-in-time copy handed to experiment drivers, which diff snapshots
//! around an operation to attribute structural work to it.

use std::fmt;

/// A copy of every counter the heap maintains.
///
/// `total_links`, `total_cuts` and `total_heapify_cost` are lifetime
/// totals and never decrease; `len`, `num_trees` and `num_marked_nodes`
/// describe the current structure.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeapStats {
    /// Items currently in the heap.
    pub len: usize,
    /// Trees currently on the root list.
    pub num_trees: usize,
    /// Non-root nodes currently marked (always 0 in heapify mode).
    pub num_marked_nodes: usize,
    /// Lifetime count of equal-rank link operations.
    pub total_links: u64,
    /// Lifetime count of cut operations (cut mode only).
    pub total_cuts: u64,
    /// Lifetime count of payload swaps (heapify mode only).
    pub total_heapify_cost: u64,
}

impl HeapStats {
    /// Total structural work performed so far. Drivers diff this around
    /// an operation to measure its cost.
    pub fn structural_work(&self) -> u64 {
        self.total_links + self.total_cuts + self.total_heapify_cost
    }
}

impl fmt::Display for HeapStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "size={} trees={} marked={} links={} cuts={} heapify={}",
            self.len,
            self.num_trees,
            self.num_marked_nodes,
            self.total_links,
            self.total_cuts,
            self.total_heapify_cost,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_work_sums_the_lifetime_counters() {
        let stats = HeapStats {
            len: 4,
            num_trees: 2,
            num_marked_nodes: 1,
            total_links: 10,
            total_cuts: 3,
            total_heapify_cost: 7,
        };
        assert_eq!(stats.structural_work(), 20);
    }

    #[test]
    fn display_mentions_every_counter() {
        let stats = HeapStats {
            len: 1,
            num_trees: 1,
            num_marked_nodes: 0,
            total_links: 2,
            total_cuts: 3,
            total_heapify_cost: 4,
        };
        let rendered = stats.to_string();
        for field in ["size=1", "trees=1", "marked=0", "links=2", "cuts=3", "heapify=4"] {
            assert!(rendered.contains(field), "missing {field} in {rendered}");
        }
    }
}
