//! The forest engine behind all four heap variants.
//!
//! The structure is a forest of heap-ordered, rank-bounded trees. Roots
//! are linked in a circular doubly linked list; so is every child list.
//! The heap tracks the minimum item, the lexical head and tail of the
//! root cycle (the cycle itself is unordered; head and tail exist so two
//! cycles can be spliced in O(1)), and a set of instrumentation counters.
//!
//! Every mutating operation reduces to absorbing a detached sub-forest
//! (a freshly inserted singleton, a cut-out node, the promoted children
//! of a deleted minimum, or another heap's entire root list), optionally
//! followed by a consolidation pass. Which operations consolidate and
//! how key decreases restore heap order are fixed per instance by the
//! two [`policy`](crate::policy) enums.
//!
//! Items and nodes are separate heap allocations that point at each
//! other: heapify-mode decreases swap the item pointers of two nodes, so
//! a handle has to follow the item rather than a tree position.

use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;

use smallvec::{smallvec, SmallVec};

use crate::policy::{variant_name, DecreasePolicy, MeldPolicy};
use crate::rank::{self, Rank};
use crate::stats::HeapStats;

/// Key value used by [`HybridHeap::delete`] to force an item below every
/// live key. Insertion requires positive keys and a legal decrease never
/// drives a key negative, so this is unreachable through the public API.
const SENTINEL_KEY: i64 = i64::MIN;

/// Inline capacity of the consolidation bucket. Covers every heap below
/// 2³² items without touching the allocator (see `rank::bucket_capacity`).
const BUCKET_INLINE: usize = 96;

/// Handle to an item in a [`HybridHeap`].
///
/// Handles are small `Copy` values compared by identity, which is the
/// only meaningful identity here: duplicate keys are legal and
/// distinguishable only by handle.
///
/// A handle is valid from the `insert` that produced it until the item
/// is removed by `delete_min` or `delete`. It is tied to the heap that
/// produced it (or, after a meld, to the heap that absorbed that heap).
/// Using a stale handle, or a handle with a different heap, is undefined
/// behavior.
pub struct ItemRef<T> {
    item: NonNull<Item<T>>,
}

impl<T> Clone for ItemRef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ItemRef<T> {}

impl<T> PartialEq for ItemRef<T> {
    fn eq(&self, other: &Self) -> bool {
        self.item == other.item
    }
}

impl<T> Eq for ItemRef<T> {}

impl<T> fmt::Debug for ItemRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ItemRef").field(&self.item.as_ptr()).finish()
    }
}

/// The user-visible half of an element: key, payload, and the node that
/// currently holds it.
struct Item<T> {
    key: i64,
    payload: T,
    node: NonNull<Node<T>>,
}

/// The tree-structural half of an element.
///
/// `next` and `prev` are always valid: a node outside any larger cycle
/// points at itself. `child` is one representative of the child cycle;
/// position within a cycle is never significant. `rank` equals the
/// number of nodes currently in the child cycle.
struct Node<T> {
    item: NonNull<Item<T>>,
    parent: Option<NonNull<Node<T>>>,
    child: Option<NonNull<Node<T>>>,
    next: NonNull<Node<T>>,
    prev: NonNull<Node<T>>,
    rank: Rank,
    marked: bool,
}

/// A detached, non-empty sub-forest about to be spliced into a heap.
///
/// `size` is 0 when the items are already counted by the absorbing heap
/// (promoted children, cut singletons); only a true transfer of items
/// (insert, public meld) carries a non-zero size.
struct Forest<T> {
    head: NonNull<Node<T>>,
    tail: NonNull<Node<T>>,
    min: Option<NonNull<Item<T>>>,
    size: usize,
    num_trees: usize,
}

/// A priority queue over positive `i64` keys with selectable meld and
/// key-decrease strategies.
///
/// The two policies are fixed at construction and select one of four
/// classical structures; see [`crate::policy`]. All variants share this
/// engine and differ only in when consolidation runs and how decreases
/// propagate.
///
/// # Example
///
/// ```
/// use hybrid_heap::HybridHeap;
///
/// let mut heap = HybridHeap::fibonacci();
/// let item = heap.insert(5, "five");
/// heap.insert(3, "three");
/// heap.decrease_key(item, 4);
/// assert_eq!(heap.peek(), Some((1, &"five")));
/// ```
pub struct HybridHeap<T> {
    meld_policy: MeldPolicy,
    decrease_policy: DecreasePolicy,
    min: Option<NonNull<Item<T>>>,
    head: Option<NonNull<Node<T>>>,
    tail: Option<NonNull<Node<T>>>,
    len: usize,
    num_trees: usize,
    num_marked: usize,
    total_links: u64,
    total_cuts: u64,
    total_heapify_cost: u64,
    _marker: PhantomData<Box<Node<T>>>,
}

impl<T> HybridHeap<T> {
    /// Creates an empty heap with the given strategies.
    pub fn with_policies(meld: MeldPolicy, decrease: DecreasePolicy) -> Self {
        Self {
            meld_policy: meld,
            decrease_policy: decrease,
            min: None,
            head: None,
            tail: None,
            len: 0,
            num_trees: 0,
            num_marked: 0,
            total_links: 0,
            total_cuts: 0,
            total_heapify_cost: 0,
            _marker: PhantomData,
        }
    }

    /// Regular binomial heap: eager melds, heapify-up decreases.
    pub fn binomial() -> Self {
        Self::with_policies(MeldPolicy::Eager, DecreasePolicy::HeapifyUp)
    }

    /// Lazy binomial heap: lazy melds, heapify-up decreases.
    pub fn lazy_binomial() -> Self {
        Self::with_policies(MeldPolicy::Lazy, DecreasePolicy::HeapifyUp)
    }

    /// Fibonacci heap: lazy melds, cascading-cut decreases.
    pub fn fibonacci() -> Self {
        Self::with_policies(MeldPolicy::Lazy, DecreasePolicy::CascadingCut)
    }

    /// Binomial heap with cuts: eager melds, cascading-cut decreases.
    pub fn binomial_with_cuts() -> Self {
        Self::with_policies(MeldPolicy::Eager, DecreasePolicy::CascadingCut)
    }

    /// Inserts a new item and returns its handle.
    ///
    /// O(1) amortized under lazy melds; under eager melds the insert
    /// behaves like a binary-counter increment and consolidates.
    ///
    /// The key must be positive.
    pub fn insert(&mut self, key: i64, payload: T) -> ItemRef<T> {
        debug_assert!(key > 0, "insert requires a positive key");
        let item = unsafe {
            NonNull::new_unchecked(Box::into_raw(Box::new(Item {
                key,
                payload,
                node: NonNull::dangling(),
            })))
        };
        let node = unsafe {
            NonNull::new_unchecked(Box::into_raw(Box::new(Node {
                item,
                parent: None,
                child: None,
                next: NonNull::dangling(),
                prev: NonNull::dangling(),
                rank: 0,
                marked: false,
            })))
        };
        unsafe {
            (*item.as_ptr()).node = node;
            (*node.as_ptr()).next = node;
            (*node.as_ptr()).prev = node;
        }
        self.absorb(Forest {
            head: node,
            tail: node,
            min: Some(item),
            size: 1,
            num_trees: 1,
        });
        ItemRef { item }
    }

    /// Returns a handle to the current minimum item, if any. O(1).
    pub fn find_min(&self) -> Option<ItemRef<T>> {
        self.min.map(|item| ItemRef { item })
    }

    /// Returns the minimum key and a reference to its payload. O(1).
    pub fn peek(&self) -> Option<(i64, &T)> {
        self.min.map(|item| unsafe {
            let item = item.as_ptr();
            ((*item).key, &(*item).payload)
        })
    }

    /// Current key of a live item.
    pub fn key(&self, item: ItemRef<T>) -> i64 {
        unsafe { (*item.item.as_ptr()).key }
    }

    /// Payload of a live item.
    pub fn payload(&self, item: ItemRef<T>) -> &T {
        unsafe { &(*item.item.as_ptr()).payload }
    }

    /// Removes the minimum item and returns its key and payload.
    ///
    /// Returns `None` on an empty heap; that is a defined no-op, never
    /// an error. O(log n) amortized; a single call can cost O(n) when it
    /// pays down deferred melds.
    pub fn delete_min(&mut self) -> Option<(i64, T)> {
        self.head?;
        let min_item = self.min?;
        let min_node = unsafe { (*min_item.as_ptr()).node };

        if self.len == 1 {
            self.head = None;
            self.tail = None;
            self.min = None;
            self.len = 0;
            self.num_trees = 0;
            return Some(unsafe { release(min_node) });
        }

        unsafe {
            if self.num_trees == 1 {
                self.head = None;
                self.tail = None;
            } else {
                let prev = (*min_node.as_ptr()).prev;
                let next = (*min_node.as_ptr()).next;
                (*prev.as_ptr()).next = next;
                (*next.as_ptr()).prev = prev;
                if self.head == Some(min_node) {
                    self.head = Some(next);
                }
                if self.tail == Some(min_node) {
                    self.tail = Some(prev);
                }
            }
        }

        self.len -= 1;
        self.num_trees -= 1;
        self.min = None;

        if let Some(child) = unsafe { (*min_node.as_ptr()).child } {
            unsafe {
                let mut current = child;
                loop {
                    let c = current.as_ptr();
                    (*c).parent = None;
                    if (*c).marked {
                        (*c).marked = false;
                        self.num_marked -= 1;
                    }
                    current = (*c).next;
                    if current == child {
                        break;
                    }
                }
                let child_tail = (*child.as_ptr()).prev;
                let promoted = (*min_node.as_ptr()).rank as usize;
                self.absorb(Forest {
                    head: child,
                    tail: child_tail,
                    min: None,
                    size: 0,
                    num_trees: promoted,
                });
            }
        }

        // Unlike ordinary melds, deletion always consolidates; leaving
        // the promoted children unlinked would erode the rank bound.
        self.consolidate();
        self.rescan_min();

        Some(unsafe { release(min_node) })
    }

    /// Decreases the key of a live item by `diff`.
    ///
    /// Requires `0 <= diff <= key(item)`; this is the caller's contract
    /// and is only checked in debug builds. O(1) amortized in cut mode,
    /// O(log n) in heapify mode.
    pub fn decrease_key(&mut self, item: ItemRef<T>, diff: i64) {
        debug_assert!(diff >= 0, "decrease_key requires a non-negative diff");
        let item = item.item;
        unsafe {
            debug_assert!(
                diff <= (*item.as_ptr()).key,
                "decrease_key diff must not exceed the current key"
            );
            (*item.as_ptr()).key -= diff;
        }
        self.update_min(item);
        self.restore_order(item);
    }

    /// Removes an arbitrary live item, returning its key and payload.
    ///
    /// Internally the item's key is driven below every other key through
    /// the same propagation as `decrease_key`, then the minimum is
    /// deleted. O(log n) amortized.
    pub fn delete(&mut self, item: ItemRef<T>) -> (i64, T) {
        let key = self.key(item);
        self.decrease_to_sentinel(item.item);
        match self.delete_min() {
            Some((_, payload)) => (key, payload),
            None => unreachable!("delete on a live handle implies a non-empty heap"),
        }
    }

    /// Absorbs `other`'s entire forest into this heap, leaving `other`
    /// consumed.
    ///
    /// Both heaps must have been constructed with the same policies
    /// (debug-asserted). O(1) under lazy melds; eager melds consolidate.
    pub fn meld(&mut self, mut other: Self) {
        debug_assert!(
            self.meld_policy == other.meld_policy
                && self.decrease_policy == other.decrease_policy,
            "melded heaps must share policies"
        );
        let (Some(head), Some(tail)) = (other.head.take(), other.tail.take()) else {
            return;
        };
        self.num_marked += other.num_marked;
        self.total_links += other.total_links;
        self.total_cuts += other.total_cuts;
        self.total_heapify_cost += other.total_heapify_cost;
        let forest = Forest {
            head,
            tail,
            min: other.min.take(),
            size: other.len,
            num_trees: other.num_trees,
        };
        other.len = 0;
        other.num_trees = 0;
        other.num_marked = 0;
        self.absorb(forest);
    }

    /// Number of items currently in the heap. O(1).
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when no items are present. O(1).
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of trees on the root list. O(1).
    pub fn num_trees(&self) -> usize {
        self.num_trees
    }

    /// Number of currently marked nodes. Always 0 in heapify mode. O(1).
    pub fn num_marked_nodes(&self) -> usize {
        self.num_marked
    }

    /// Lifetime count of equal-rank links. O(1).
    pub fn total_links(&self) -> u64 {
        self.total_links
    }

    /// Lifetime count of cuts. O(1).
    pub fn total_cuts(&self) -> u64 {
        self.total_cuts
    }

    /// Lifetime count of heapify payload swaps. O(1).
    pub fn total_heapify_cost(&self) -> u64 {
        self.total_heapify_cost
    }

    /// The meld strategy this heap was constructed with.
    pub fn meld_policy(&self) -> MeldPolicy {
        self.meld_policy
    }

    /// The key-decrease strategy this heap was constructed with.
    pub fn decrease_policy(&self) -> DecreasePolicy {
        self.decrease_policy
    }

    /// Conventional name of this policy combination.
    pub fn variant_name(&self) -> &'static str {
        variant_name(self.meld_policy, self.decrease_policy)
    }

    /// Snapshot of every counter, for driver-side aggregation. O(1).
    pub fn stats(&self) -> HeapStats {
        HeapStats {
            len: self.len,
            num_trees: self.num_trees,
            num_marked_nodes: self.num_marked,
            total_links: self.total_links,
            total_cuts: self.total_cuts,
            total_heapify_cost: self.total_heapify_cost,
        }
    }

    /// Walks the entire structure and checks every invariant: cycle
    /// integrity, parent back-references, per-node rank versus child
    /// count, heap order on every edge, root and mark discipline, and
    /// all bookkeeping counters. O(n); intended for tests and debugging.
    pub fn verify_structure(&self) -> bool {
        if self.len == 0 {
            return self.head.is_none()
                && self.tail.is_none()
                && self.min.is_none()
                && self.num_trees == 0
                && self.num_marked == 0;
        }
        let (Some(head), Some(tail), Some(min)) = (self.head, self.tail, self.min) else {
            return false;
        };
        unsafe {
            if (*head.as_ptr()).prev != tail || (*tail.as_ptr()).next != head {
                return false;
            }
            let mut nodes = 0usize;
            let mut marked = 0usize;
            let mut min_key = i64::MAX;
            let mut roots = 0usize;
            let mut saw_tail = false;
            let mut current = head;
            loop {
                let c = current.as_ptr();
                if (*c).parent.is_some() || (*c).marked {
                    return false;
                }
                if (*(*c).next.as_ptr()).prev != current {
                    return false;
                }
                if !self.verify_tree(current, &mut nodes, &mut marked, &mut min_key) {
                    return false;
                }
                saw_tail |= current == tail;
                roots += 1;
                if roots > self.num_trees {
                    return false;
                }
                current = (*c).next;
                if current == head {
                    break;
                }
            }
            roots == self.num_trees
                && saw_tail
                && nodes == self.len
                && marked == self.num_marked
                && (*min.as_ptr()).key == min_key
        }
    }

    /// Checks one tree rooted at `node`, accumulating node, mark and
    /// minimum-key tallies.
    unsafe fn verify_tree(
        &self,
        node: NonNull<Node<T>>,
        nodes: &mut usize,
        marked: &mut usize,
        min_key: &mut i64,
    ) -> bool {
        let n = node.as_ptr();
        *nodes += 1;
        if (*n).marked {
            *marked += 1;
        }
        let item = (*n).item;
        if (*item.as_ptr()).node != node {
            return false;
        }
        let key = (*item.as_ptr()).key;
        if key < *min_key {
            *min_key = key;
        }
        let mut children = 0usize;
        if let Some(first) = (*n).child {
            let mut current = first;
            loop {
                let c = current.as_ptr();
                if (*c).parent != Some(node) {
                    return false;
                }
                if (*(*c).item.as_ptr()).key < key {
                    return false;
                }
                if (*(*c).next.as_ptr()).prev != current {
                    return false;
                }
                if !self.verify_tree(current, nodes, marked, min_key) {
                    return false;
                }
                children += 1;
                if children > (*n).rank as usize {
                    return false;
                }
                current = (*c).next;
                if current == first {
                    break;
                }
            }
        }
        children == (*n).rank as usize
    }

    /// Splices a detached forest into the root list.
    ///
    /// An empty heap adopts the forest outright. Otherwise the two
    /// cycles are cross-linked in O(1), the minimum is updated to the
    /// strictly smaller side, and eager melds consolidate immediately.
    fn absorb(&mut self, forest: Forest<T>) {
        let (head, tail) = match (self.head, self.tail) {
            (Some(head), Some(tail)) => (head, tail),
            _ => {
                self.head = Some(forest.head);
                self.tail = Some(forest.tail);
                self.min = forest.min;
                self.len += forest.size;
                self.num_trees = forest.num_trees;
                return;
            }
        };
        unsafe {
            (*tail.as_ptr()).next = forest.head;
            (*forest.tail.as_ptr()).next = head;
            (*head.as_ptr()).prev = forest.tail;
            (*forest.head.as_ptr()).prev = tail;
        }
        self.tail = Some(forest.tail);
        self.len += forest.size;
        self.num_trees += forest.num_trees;

        if let Some(incoming) = forest.min {
            self.update_min(incoming);
        }

        if self.meld_policy == MeldPolicy::Eager {
            self.consolidate();
        }
    }

    /// Points `min` at `item` if its key is strictly smaller than the
    /// current minimum. Ties keep the existing reference.
    fn update_min(&mut self, item: NonNull<Item<T>>) {
        let better = match self.min {
            Some(current) => unsafe {
                (*item.as_ptr()).key < (*current.as_ptr()).key
            },
            None => true,
        };
        if better {
            self.min = Some(item);
        }
    }

    /// Successive linking: reduces the root list to at most one tree per
    /// rank, then rebuilds head, tail, tree count and minimum from the
    /// surviving roots.
    ///
    /// A 0- or 1-item heap never needs this and returns immediately.
    /// Amortized O(log n) per operation; an individual pass is O(n).
    fn consolidate(&mut self) {
        if self.len <= 1 {
            return;
        }
        let Some(head) = self.head else { return };

        let mut roots = Vec::with_capacity(self.num_trees);
        unsafe {
            collect_cycle(head, &mut roots);
        }

        let mut bucket: SmallVec<[Option<NonNull<Node<T>>>; BUCKET_INLINE]> =
            smallvec![None; rank::bucket_capacity(self.len)];

        for root in roots {
            unsafe {
                (*root.as_ptr()).parent = None;
                (*root.as_ptr()).next = root;
                (*root.as_ptr()).prev = root;
            }
            let mut tree = root;
            loop {
                let slot = unsafe { (*tree.as_ptr()).rank } as usize;
                match bucket[slot].take() {
                    // The link result's rank strictly exceeds the slot
                    // just vacated, so keep probing upward.
                    Some(existing) => tree = self.link(tree, existing),
                    None => {
                        bucket[slot] = Some(tree);
                        break;
                    }
                }
            }
        }

        self.head = None;
        self.tail = None;
        self.min = None;
        self.num_trees = 0;
        for tree in bucket.into_iter().flatten() {
            self.num_trees += 1;
            unsafe {
                match (self.head, self.tail) {
                    (Some(h), Some(t)) => {
                        (*tree.as_ptr()).next = h;
                        (*tree.as_ptr()).prev = t;
                        (*t.as_ptr()).next = tree;
                        (*h.as_ptr()).prev = tree;
                        self.tail = Some(tree);
                    }
                    _ => {
                        (*tree.as_ptr()).next = tree;
                        (*tree.as_ptr()).prev = tree;
                        self.head = Some(tree);
                        self.tail = Some(tree);
                    }
                }
                self.update_min((*tree.as_ptr()).item);
            }
        }
    }

    /// Links two equal-rank trees, returning the winner.
    ///
    /// The smaller key becomes the parent; on a tie `x` stays fixed.
    /// Touches nothing but child/sibling/parent links, the winner's
    /// rank, and the link counter.
    fn link(&mut self, x: NonNull<Node<T>>, y: NonNull<Node<T>>) -> NonNull<Node<T>> {
        unsafe {
            debug_assert_eq!(
                (*x.as_ptr()).rank,
                (*y.as_ptr()).rank,
                "link requires equal ranks"
            );
            let (winner, loser) = if (*(*x.as_ptr()).item.as_ptr()).key
                > (*(*y.as_ptr()).item.as_ptr()).key
            {
                (y, x)
            } else {
                (x, y)
            };
            match (*winner.as_ptr()).child {
                Some(child) => {
                    let after = (*child.as_ptr()).next;
                    (*loser.as_ptr()).next = after;
                    (*loser.as_ptr()).prev = child;
                    (*after.as_ptr()).prev = loser;
                    (*child.as_ptr()).next = loser;
                }
                None => {
                    (*loser.as_ptr()).next = loser;
                    (*loser.as_ptr()).prev = loser;
                }
            }
            (*winner.as_ptr()).child = Some(loser);
            (*loser.as_ptr()).parent = Some(winner);
            (*winner.as_ptr()).rank = rank::checked_increment((*winner.as_ptr()).rank);
            self.total_links += 1;
            winner
        }
    }

    /// Recomputes `min` with one walk of the root cycle.
    fn rescan_min(&mut self) {
        self.min = None;
        let Some(head) = self.head else { return };
        unsafe {
            let mut current = head;
            loop {
                self.update_min((*current.as_ptr()).item);
                current = (*current.as_ptr()).next;
                if current == head {
                    break;
                }
            }
        }
    }

    /// Re-establishes heap order around an item whose key just dropped,
    /// using whichever strategy this heap was constructed with.
    fn restore_order(&mut self, item: NonNull<Item<T>>) {
        let node = unsafe { (*item.as_ptr()).node };
        match self.decrease_policy {
            DecreasePolicy::CascadingCut => unsafe {
                if let Some(parent) = (*node.as_ptr()).parent {
                    if (*item.as_ptr()).key < (*(*parent.as_ptr()).item.as_ptr()).key {
                        self.cascading_cut(node, parent);
                    }
                }
            },
            DecreasePolicy::HeapifyUp => self.heapify_up(node),
        }
    }

    /// Cuts `node` from `parent`, then walks upward: a root stops the
    /// cascade, an unmarked ancestor is marked and stops it, a marked
    /// ancestor is itself cut and the walk continues.
    fn cascading_cut(&mut self, node: NonNull<Node<T>>, parent: NonNull<Node<T>>) {
        self.cut(node, parent);
        unsafe {
            if let Some(grandparent) = (*parent.as_ptr()).parent {
                if !(*parent.as_ptr()).marked {
                    (*parent.as_ptr()).marked = true;
                    self.num_marked += 1;
                } else {
                    self.cascading_cut(parent, grandparent);
                }
            }
        }
    }

    /// Detaches `node` from `parent`'s child cycle and re-absorbs it as
    /// a fresh root. Clears the node's mark.
    fn cut(&mut self, node: NonNull<Node<T>>, parent: NonNull<Node<T>>) {
        self.total_cuts += 1;
        unsafe {
            let n = node.as_ptr();
            let p = parent.as_ptr();
            (*n).parent = None;
            if (*n).marked {
                (*n).marked = false;
                self.num_marked -= 1;
            }
            (*p).rank = rank::saturating_decrement((*p).rank);
            if (*n).next == node {
                (*p).child = None;
            } else {
                (*p).child = Some((*n).next);
                let prev = (*n).prev;
                let next = (*n).next;
                (*prev.as_ptr()).next = next;
                (*next.as_ptr()).prev = prev;
            }
            (*n).next = node;
            (*n).prev = node;
            let item = (*n).item;
            self.absorb(Forest {
                head: node,
                tail: node,
                min: Some(item),
                size: 0,
                num_trees: 1,
            });
        }
    }

    /// Swaps item payloads upward until heap order is restored, then
    /// re-checks the walk's final position against the minimum.
    ///
    /// Structural links never move; only the item pointers of the nodes
    /// along the path do.
    fn heapify_up(&mut self, start: NonNull<Node<T>>) {
        let mut node = start;
        unsafe {
            while let Some(parent) = (*node.as_ptr()).parent {
                let key = (*(*node.as_ptr()).item.as_ptr()).key;
                let parent_key = (*(*parent.as_ptr()).item.as_ptr()).key;
                if key >= parent_key {
                    break;
                }
                self.swap_with_parent(node, parent);
                node = parent;
            }
            self.update_min((*node.as_ptr()).item);
        }
    }

    /// Exchanges the items held by `child` and `parent`, fixing both
    /// back-references. The minimum pointer follows items, so it needs
    /// no adjustment here.
    fn swap_with_parent(&mut self, child: NonNull<Node<T>>, parent: NonNull<Node<T>>) {
        self.total_heapify_cost += 1;
        unsafe {
            let child_item = (*child.as_ptr()).item;
            let parent_item = (*parent.as_ptr()).item;
            (*child.as_ptr()).item = parent_item;
            (*parent.as_ptr()).item = child_item;
            (*parent_item.as_ptr()).node = child;
            (*child_item.as_ptr()).node = parent;
        }
    }

    /// Drives an item's key below every live key and propagates exactly
    /// like a decrease. Only `delete` uses this; the sentinel is not
    /// reachable through the public decrease contract.
    fn decrease_to_sentinel(&mut self, item: NonNull<Item<T>>) {
        unsafe {
            (*item.as_ptr()).key = SENTINEL_KEY;
        }
        self.min = Some(item);
        self.restore_order(item);
    }
}

impl<T> Drop for HybridHeap<T> {
    fn drop(&mut self) {
        let Some(head) = self.head.take() else { return };
        let mut stack = Vec::new();
        unsafe {
            collect_cycle(head, &mut stack);
            while let Some(node) = stack.pop() {
                if let Some(child) = (*node.as_ptr()).child {
                    collect_cycle(child, &mut stack);
                }
                let _ = release(node);
            }
        }
    }
}

/// Pushes every node of a sibling cycle, starting at `start`.
unsafe fn collect_cycle<T>(start: NonNull<Node<T>>, out: &mut Vec<NonNull<Node<T>>>) {
    let mut current = start;
    loop {
        out.push(current);
        current = (*current.as_ptr()).next;
        if current == start {
            break;
        }
    }
}

/// Frees a detached node and its item, returning the item's contents.
unsafe fn release<T>(node: NonNull<Node<T>>) -> (i64, T) {
    let node = Box::from_raw(node.as_ptr());
    let item = Box::from_raw(node.item.as_ptr());
    (item.key, item.payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn presets() -> [(&'static str, fn() -> HybridHeap<i32>); 4] {
        [
            ("Regular Binomial", HybridHeap::binomial),
            ("Lazy Binomial", HybridHeap::lazy_binomial),
            ("Fibonacci", HybridHeap::fibonacci),
            ("Binomial with Cuts", HybridHeap::binomial_with_cuts),
        ]
    }

    fn drain_keys(heap: &mut HybridHeap<i32>) -> Vec<i64> {
        let mut keys = Vec::new();
        while let Some((key, _)) = heap.delete_min() {
            keys.push(key);
        }
        keys
    }

    #[test]
    fn empty_heap_is_inert() {
        for (name, make) in presets() {
            let mut heap = make();
            assert!(heap.is_empty(), "{name}");
            assert_eq!(heap.len(), 0);
            assert_eq!(heap.find_min(), None);
            assert_eq!(heap.peek(), None);
            assert_eq!(heap.delete_min(), None);
            assert!(heap.verify_structure(), "{name}");
        }
    }

    #[test]
    fn singleton_returns_to_exact_empty_state() {
        for (name, make) in presets() {
            let mut heap = make();
            let item = heap.insert(7, 0);
            assert_eq!(heap.find_min(), Some(item));
            assert_eq!(heap.num_trees(), 1);
            assert_eq!(heap.delete_min(), Some((7, 0)));
            assert!(heap.is_empty(), "{name}");
            assert_eq!(heap.num_trees(), 0);
            assert_eq!(heap.find_min(), None);
            assert!(heap.verify_structure(), "{name}");
        }
    }

    #[test]
    fn extraction_is_sorted_in_every_mode() {
        for (name, make) in presets() {
            let mut heap = make();
            for key in [10, 5, 20, 3, 15] {
                heap.insert(key, 0);
            }
            assert_eq!(heap.peek().map(|(k, _)| k), Some(3));
            assert_eq!(drain_keys(&mut heap), vec![3, 5, 10, 15, 20], "{name}");
        }
    }

    #[test]
    fn duplicate_keys_all_come_out() {
        for (name, make) in presets() {
            let mut heap = make();
            for key in [4, 4, 2, 4, 2] {
                heap.insert(key, 0);
            }
            assert_eq!(drain_keys(&mut heap), vec![2, 2, 4, 4, 4], "{name}");
        }
    }

    #[test]
    fn eager_insert_matches_binary_counter() {
        let mut heap = HybridHeap::binomial();
        for key in 1..=8 {
            heap.insert(key, 0);
        }
        // A binomial forest of 8 items is a single B3 tree; every item
        // beyond the surviving roots cost one link.
        assert_eq!(heap.num_trees(), 1);
        assert_eq!(heap.total_links(), 7);
        assert!(heap.verify_structure());

        let mut heap = HybridHeap::binomial();
        for key in 1..=6 {
            heap.insert(key, 0);
        }
        assert_eq!(heap.num_trees(), 2);
        assert_eq!(heap.total_links(), 4);
        assert!(heap.verify_structure());
    }

    #[test]
    fn lazy_insert_defers_all_linking() {
        let mut heap = HybridHeap::fibonacci();
        for key in 1..=8 {
            heap.insert(key, 0);
        }
        assert_eq!(heap.num_trees(), 8);
        assert_eq!(heap.total_links(), 0);

        assert_eq!(heap.delete_min(), Some((1, 0)));
        // 7 promoted-or-remaining roots consolidate into 3 trees.
        assert_eq!(heap.num_trees(), 3);
        assert_eq!(heap.total_links(), 4);
        assert!(heap.verify_structure());
    }

    /// Builds the deterministic rank-3 tree 10{20, 30{40}, 50{60, 70{80}}}
    /// used by the decrease tests, returning handles keyed by value.
    /// Only lazy-meld heaps produce this exact shape; eager melds link
    /// during the inserts.
    fn build_rank3_tree(mut heap: HybridHeap<i32>) -> (HybridHeap<i32>, Vec<ItemRef<i32>>) {
        let mut handles = Vec::new();
        heap.insert(1, 0);
        for key in [10, 20, 30, 40, 50, 60, 70, 80] {
            handles.push(heap.insert(key, key as i32));
        }
        assert_eq!(heap.delete_min(), Some((1, 0)));
        assert_eq!(heap.num_trees(), 1);
        assert_eq!(heap.total_links(), 7);
        assert!(heap.verify_structure());
        (heap, handles)
    }

    #[test]
    fn cascading_cut_clears_marks_and_counts_cuts() {
        let (mut heap, handles) = build_rank3_tree(HybridHeap::fibonacci());
        let h60 = handles[5];
        let h70 = handles[6];
        let h80 = handles[7];

        // 80 leaves 70: plain cut, 70 becomes marked.
        heap.decrease_key(h80, 79);
        assert_eq!(heap.total_cuts(), 1);
        assert_eq!(heap.num_marked_nodes(), 1);
        assert_eq!(heap.num_trees(), 2);
        assert_eq!(heap.peek().map(|(k, _)| k), Some(1));

        // 60 leaves 50: plain cut, 50 becomes marked.
        heap.decrease_key(h60, 59);
        assert_eq!(heap.total_cuts(), 2);
        assert_eq!(heap.num_marked_nodes(), 2);
        assert_eq!(heap.num_trees(), 3);

        // 70 leaves 50: 70's own mark clears, and 50 was already marked
        // so it cascades off the tree as well.
        heap.decrease_key(h70, 69);
        assert_eq!(heap.total_cuts(), 4);
        assert_eq!(heap.num_marked_nodes(), 0);
        assert_eq!(heap.num_trees(), 5);
        assert_eq!(heap.total_heapify_cost(), 0);
        assert!(heap.verify_structure());

        assert_eq!(drain_keys(&mut heap), vec![1, 1, 1, 10, 20, 30, 40, 50]);
    }

    #[test]
    fn heapify_up_swaps_items_in_place() {
        let (mut heap, handles) = build_rank3_tree(HybridHeap::lazy_binomial());
        let h80 = handles[7];

        heap.decrease_key(h80, 75);
        // 5 bubbles past 70, 50 and 10; the tree shape is untouched.
        assert_eq!(heap.total_heapify_cost(), 3);
        assert_eq!(heap.total_cuts(), 0);
        assert_eq!(heap.num_marked_nodes(), 0);
        assert_eq!(heap.num_trees(), 1);
        assert_eq!(heap.key(h80), 5);
        assert_eq!(heap.peek(), Some((5, &80)));
        assert!(heap.verify_structure());

        assert_eq!(drain_keys(&mut heap), vec![5, 10, 20, 30, 40, 50, 60, 70]);
    }

    #[test]
    fn decrease_without_violation_leaves_structure_alone() {
        let lazy_presets: [(&str, fn() -> HybridHeap<i32>); 2] = [
            ("Lazy Binomial", HybridHeap::lazy_binomial),
            ("Fibonacci", HybridHeap::fibonacci),
        ];
        for (name, make) in lazy_presets {
            let (mut heap, handles) = build_rank3_tree(make());
            let h40 = handles[3];
            heap.decrease_key(h40, 5);
            assert_eq!(heap.key(h40), 35);
            assert_eq!(heap.total_cuts(), 0, "{name}");
            assert_eq!(heap.total_heapify_cost(), 0, "{name}");
            assert!(heap.verify_structure(), "{name}");
        }
    }

    #[test]
    fn decrease_to_new_minimum_updates_min() {
        for (name, make) in presets() {
            let mut heap = make();
            let a = heap.insert(10, 0);
            heap.insert(4, 0);
            heap.decrease_key(a, 7);
            assert_eq!(heap.peek().map(|(k, _)| k), Some(3), "{name}");
            assert_eq!(heap.find_min(), Some(a));
            assert!(heap.verify_structure(), "{name}");
        }
    }

    #[test]
    fn delete_removes_an_arbitrary_item() {
        for (name, make) in presets() {
            let mut heap = make();
            let handles: Vec<_> = (1..=10).map(|key| heap.insert(key, key as i32)).collect();
            assert_eq!(heap.delete(handles[3]), (4, 4), "{name}");
            assert_eq!(heap.len(), 9);
            assert!(heap.verify_structure(), "{name}");
            assert_eq!(drain_keys(&mut heap), vec![1, 2, 3, 5, 6, 7, 8, 9, 10], "{name}");
        }
    }

    #[test]
    fn delete_of_the_minimum_behaves_like_delete_min() {
        for (_, make) in presets() {
            let mut heap = make();
            let handles: Vec<_> = (1..=5).map(|key| heap.insert(key, 0)).collect();
            assert_eq!(heap.delete(handles[0]).0, 1);
            assert_eq!(drain_keys(&mut heap), vec![2, 3, 4, 5]);
        }
    }

    #[test]
    fn delete_of_the_last_item_empties_the_heap() {
        for (_, make) in presets() {
            let mut heap = make();
            let only = heap.insert(9, 3);
            assert_eq!(heap.delete(only), (9, 3));
            assert!(heap.is_empty());
            assert!(heap.verify_structure());
        }
    }

    #[test]
    fn meld_combines_items_and_counters() {
        for (name, make) in presets() {
            let mut left = make();
            for key in 1..=5 {
                left.insert(key, 0);
            }
            let mut right = make();
            for key in 11..=15 {
                right.insert(key, 0);
            }
            let work_before = left.stats().structural_work() + right.stats().structural_work();
            left.meld(right);
            assert_eq!(left.len(), 10, "{name}");
            assert!(left.stats().structural_work() >= work_before, "{name}");
            assert!(left.verify_structure(), "{name}");
            assert_eq!(
                drain_keys(&mut left),
                vec![1, 2, 3, 4, 5, 11, 12, 13, 14, 15],
                "{name}"
            );
        }
    }

    #[test]
    fn meld_with_empty_is_a_no_op_in_both_directions() {
        for (_, make) in presets() {
            let mut heap = make();
            heap.insert(2, 0);
            heap.insert(6, 0);
            heap.meld(make());
            assert_eq!(heap.len(), 2);

            let mut empty = make();
            let mut full = make();
            full.insert(1, 0);
            empty.meld(full);
            assert_eq!(empty.len(), 1);
            assert_eq!(empty.peek().map(|(k, _)| k), Some(1));
            assert!(empty.verify_structure());
        }
    }

    #[test]
    fn eager_meld_with_equal_keys_keeps_min_on_a_root() {
        let mut left = HybridHeap::binomial();
        left.insert(5, 1);
        let mut right = HybridHeap::binomial();
        right.insert(5, 2);
        left.meld(right);
        // The two equal-keyed roots were linked; min must reference the
        // surviving root, not the tree it was linked beneath.
        assert_eq!(left.num_trees(), 1);
        assert!(left.verify_structure());
        assert_eq!(left.delete_min().map(|(k, _)| k), Some(5));
        assert_eq!(left.delete_min().map(|(k, _)| k), Some(5));
        assert_eq!(left.delete_min(), None);
    }

    #[test]
    fn handles_survive_melds() {
        for (_, make) in presets() {
            let mut left = make();
            let kept = left.insert(50, 7);
            let mut right = make();
            right.insert(40, 0);
            left.meld(right);
            left.decrease_key(kept, 49);
            assert_eq!(left.peek(), Some((1, &7)));
        }
    }

    #[test]
    fn insert_after_delete_min_reuses_the_structure() {
        for (_, make) in presets() {
            let mut heap = make();
            for key in [8, 3, 9] {
                heap.insert(key, 0);
            }
            assert_eq!(heap.delete_min().map(|(k, _)| k), Some(3));
            heap.insert(2, 0);
            assert_eq!(heap.peek().map(|(k, _)| k), Some(2));
            assert_eq!(drain_keys(&mut heap), vec![2, 8, 9]);
        }
    }

    #[test]
    fn stats_snapshot_matches_accessors() {
        let (heap, _) = build_rank3_tree(HybridHeap::fibonacci());
        let stats = heap.stats();
        assert_eq!(stats.len, heap.len());
        assert_eq!(stats.num_trees, heap.num_trees());
        assert_eq!(stats.num_marked_nodes, heap.num_marked_nodes());
        assert_eq!(stats.total_links, heap.total_links());
        assert_eq!(stats.total_cuts, heap.total_cuts());
        assert_eq!(stats.total_heapify_cost, heap.total_heapify_cost());
        assert_eq!(heap.variant_name(), "Fibonacci");
    }

    #[test]
    fn mixed_workload_preserves_invariants_in_every_mode() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        for (name, make) in presets() {
            let mut rng = StdRng::seed_from_u64(0x5eed);
            let mut heap = make();
            let mut live: Vec<ItemRef<i32>> = Vec::new();

            for round in 0..500 {
                match rng.random_range(0..4u8) {
                    0 | 1 => {
                        let key = rng.random_range(1..10_000);
                        live.push(heap.insert(key, round));
                    }
                    2 => {
                        if let Some((key, _)) = heap.delete_min() {
                            let gone = heap
                                .find_min()
                                .map_or(true, |still| heap.key(still) >= key);
                            assert!(gone, "{name}: min went backwards");
                            // Forget every handle; with duplicate keys we
                            // cannot tell which one was just removed.
                            live.clear();
                        }
                    }
                    _ => {
                        if !live.is_empty() {
                            let target = live[rng.random_range(0..live.len())];
                            let key = heap.key(target);
                            heap.decrease_key(target, rng.random_range(0..=key.min(100)));
                        }
                    }
                }
                if round % 50 == 0 {
                    assert!(heap.verify_structure(), "{name} at round {round}");
                }
            }
            assert!(heap.verify_structure(), "{name}");
            let keys = drain_keys(&mut heap);
            assert!(keys.windows(2).all(|w| w[0] <= w[1]), "{name}");
        }
    }

    #[test]
    fn drop_frees_a_populated_heap() {
        for (_, make) in presets() {
            let mut heap = make();
            for key in 1..=100 {
                heap.insert(key, 0);
            }
            heap.delete_min();
            // Dropping here must walk and free the remaining forest.
        }
    }
}
