//! Sum tree for prioritized sampling.
//!
//! The tree is stored in a flat array of length `2 * capacity - 1`:
//!
//! ```text
//! Tree index:
//!      0         -> total priority
//!     / \
//!   1     2
//!  / \   / \
//! 3   4 5   6    -> priorities of stored items
//! ```
//!
//! Indices `[0, capacity - 1)` are internal nodes holding the sum of their
//! children, indices `[capacity - 1, 2 * capacity - 1)` are leaves.
use crate::PerError;
use anyhow::Result;
use segment_tree::{ops::MinIgnoreNaN, SegmentPoint};

/// A leaf resolved by [`PriorityTree::get_leaf`].
#[derive(Debug, PartialEq)]
pub struct Leaf<'a, T> {
    /// Index of the leaf in the tree array.
    pub index: usize,

    /// Priority stored at the leaf.
    pub priority: f64,

    /// Item stored in the slot of the leaf.
    pub data: &'a T,
}

/// Fixed-capacity sum tree holding one item per leaf.
///
/// Items are written in a circular manner: once `capacity` items have been
/// added, the next one overwrites the oldest slot.
#[derive(Debug)]
pub struct PriorityTree<T> {
    capacity: usize,

    /// Internal nodes followed by leaves.
    tree: Vec<f64>,

    /// Items, `data[i]` belongs to the leaf `i + capacity - 1`.
    data: Vec<Option<T>>,

    /// Slot written by the next call of [`PriorityTree::add`].
    data_pointer: usize,

    /// Number of slots holding an item.
    len: usize,

    /// Minimum over nonzero leaf priorities, `f64::MAX` for empty leaves.
    min_tree: SegmentPoint<f64, MinIgnoreNaN>,
}

impl<T> PriorityTree<T> {
    /// Creates an empty tree with `capacity` leaves.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(PerError::InvalidCapacity.into());
        }

        Ok(Self {
            capacity,
            tree: vec![0f64; 2 * capacity - 1],
            data: (0..capacity).map(|_| None).collect(),
            data_pointer: 0,
            len: 0,
            min_tree: SegmentPoint::build(vec![f64::MAX; capacity], MinIgnoreNaN),
        })
    }

    /// Returns the number of leaves.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of slots holding an item.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no item has been added.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the sum of all leaf priorities, stored at the root.
    pub fn total_priority(&self) -> f64 {
        self.tree[0]
    }

    /// Returns the minimum nonzero leaf priority, `None` if all leaves are zero.
    pub fn min_priority(&self) -> Option<f64> {
        let min = self.min_tree.query(0, self.capacity);
        if min == f64::MAX {
            None
        } else {
            Some(min)
        }
    }

    /// Returns the priority at the given leaf.
    pub fn priority(&self, leaf_index: usize) -> Option<f64> {
        if self.is_leaf(leaf_index) {
            Some(self.tree[leaf_index])
        } else {
            None
        }
    }

    /// Returns the priorities of all leaves, in slot order.
    pub fn leaf_priorities(&self) -> &[f64] {
        &self.tree[self.capacity - 1..]
    }

    /// Returns the item in the given slot.
    pub fn data(&self, data_index: usize) -> Option<&T> {
        self.data.get(data_index).and_then(|d| d.as_ref())
    }

    /// Returns the leaf index of a slot.
    #[inline]
    pub fn leaf_index_of(&self, data_index: usize) -> usize {
        data_index + self.capacity - 1
    }

    /// Returns the slot of a leaf index.
    #[inline]
    pub fn data_index_of(&self, leaf_index: usize) -> usize {
        leaf_index + 1 - self.capacity
    }

    /// Returns `true` if `ix` points to a leaf.
    #[inline]
    pub fn is_leaf(&self, ix: usize) -> bool {
        ix >= self.capacity - 1 && ix < self.tree.len()
    }

    /// Writes `data` with `priority` into the current slot and advances the slot.
    ///
    /// Returns the leaf index written.
    pub fn add(&mut self, priority: f64, data: T) -> Result<usize> {
        check_priority(priority)?;

        let leaf_index = self.leaf_index_of(self.data_pointer);
        self.data[self.data_pointer] = Some(data);
        self.update(leaf_index, priority)?;

        self.data_pointer += 1;
        if self.data_pointer == self.capacity {
            self.data_pointer = 0;
        }
        if self.len < self.capacity {
            self.len += 1;
        }

        Ok(leaf_index)
    }

    /// Sets the priority of a leaf and propagates the change up to the root.
    pub fn update(&mut self, leaf_index: usize, priority: f64) -> Result<()> {
        if !self.is_leaf(leaf_index) {
            return Err(PerError::InvalidIndex(leaf_index).into());
        }
        check_priority(priority)?;

        let min_value = if priority > 0.0 { priority } else { f64::MAX };
        self.min_tree
            .modify(self.data_index_of(leaf_index), min_value);

        let change = priority - self.tree[leaf_index];
        self.tree[leaf_index] = priority;
        self.propagate(leaf_index, change);

        Ok(())
    }

    fn propagate(&mut self, mut ix: usize, change: f64) {
        while ix != 0 {
            ix = (ix - 1) / 2;
            self.tree[ix] += change;
        }
    }

    /// Finds the leaf whose prefix-sum range contains `value`.
    ///
    /// At each internal node with left-child sum `L`, the search goes left if
    /// `value <= L` and goes right with `value - L` otherwise, so a value equal to
    /// the sum of a left subtree resolves into that subtree. A subtree with zero
    /// mass is never entered while its sibling has mass.
    ///
    /// `value` is expected in `[0, total)` and is clamped into `[0, total]`.
    pub fn get_leaf(&self, value: f64) -> Result<Leaf<'_, T>> {
        let total = self.total_priority();
        if !(total > 0.0) {
            return Err(PerError::InvalidState("total priority is zero".to_string()).into());
        }

        let mut v = if value.is_nan() {
            0.0
        } else {
            value.max(0.0).min(total)
        };
        let mut ix = 0;

        loop {
            let left = 2 * ix + 1;
            if left >= self.tree.len() {
                break;
            }
            let right = left + 1;
            let (l, r) = (self.tree[left], self.tree[right]);

            if (v <= l && l > 0.0) || r <= 0.0 {
                ix = left;
            } else {
                v -= l;
                ix = right;
            }
        }

        let data = self.data[self.data_index_of(ix)].as_ref().ok_or_else(|| {
            PerError::InvalidState(format!("leaf {} resolved to an empty slot", ix))
        })?;

        Ok(Leaf {
            index: ix,
            priority: self.tree[ix],
            data,
        })
    }
}

fn check_priority(priority: f64) -> Result<(), PerError> {
    if priority.is_finite() && priority >= 0.0 {
        Ok(())
    } else {
        Err(PerError::InvalidState(format!(
            "priority must be finite and non-negative, got {}",
            priority
        )))
    }
}
