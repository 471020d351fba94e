//! # trievec-rs
//!
//! A persistent bit-partitioned vector trie with transient batch construction.
//!
//! [`TrieVector`] is an ordered sequence with O(log_W n) indexed access,
//! append and removal-from-end. Every persistent operation returns a new
//! vector that shares all untouched subtrees with the original, so old
//! versions stay valid and cheap to keep. [`TransientVector`] is the
//! companion builder: it owns exclusive mutation rights over its node graph,
//! mutates in place, and freezes back into a shareable [`TrieVector`].
//!
//! ## Example
//!
//! ```rust
//! use trievec_rs::TrieVector;
//!
//! let v: TrieVector<u64> = (0..6).collect();
//! let w = v.push(6);
//!
//! assert_eq!(v.len(), 6);
//! assert_eq!(w.len(), 7);
//! assert_eq!(w.get(6), Some(&6));
//! // `v` is untouched by the push.
//! assert_eq!(v.get(6), None);
//! ```
//!
//! Batch construction goes through the transient builder (this is also what
//! `FromIterator` does internally):
//!
//! ```rust
//! use trievec_rs::TransientVector;
//!
//! let mut builder = TransientVector::<u64>::new();
//! for i in 0..1000 {
//!     builder.push(i);
//! }
//! let v = builder.freeze();
//! assert_eq!(v.get(999), Some(&999));
//! ```

#![forbid(unsafe_code)]

use std::rc::Rc;

// =============================================================================
// Errors
// =============================================================================

/// Typed failures for the fallible vector operations.
///
/// All operations are pure, deterministic computations: a failing operation
/// returns an error without having mutated anything visible to other vectors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Read at an index outside `[0, len)`.
    #[error("index {index} out of range for vector of length {len}")]
    OutOfRange { index: usize, len: usize },

    /// Pop on an empty vector.
    #[error("pop on an empty vector")]
    Underflow,

    /// Slice or splice bounds outside the vector, or `end < start` after a
    /// negative `end` has been resolved against the length.
    #[error("invalid range {start}..{end} for vector of length {len}")]
    InvalidRange { start: usize, end: isize, len: usize },
}

// =============================================================================
// Node
// =============================================================================
//
// Fixed fan-out tree node. A branch holds up to `W` shared child handles, a
// leaf holds up to `W` element values. The tree is left-filled and
// right-ragged: along the rightmost branch, slots below the element count are
// occupied and slots at or beyond it are empty.
//
// Nodes have no identity beyond their slots. A node reached through a shared
// handle is never mutated; clone-on-write (`Rc::make_mut`) shallow-copies it
// first, which is what makes path copying and transient in-place mutation two
// faces of the same descent.

#[derive(Clone)]
enum Node<T, const W: usize> {
    Branch([Option<Rc<Node<T, W>>>; W]),
    Leaf([Option<T>; W]),
}

impl<T, const W: usize> Node<T, W> {
    /// Bits of an index consumed per tree level.
    const BITS: usize = {
        assert!(
            W.is_power_of_two() && W >= 2,
            "fan-out W must be a power of two of at least 2"
        );
        W.trailing_zeros() as usize
    };

    /// Mask selecting the slot index within one level.
    const MASK: usize = W - 1;

    fn new_branch() -> Self {
        Node::Branch(std::array::from_fn(|_| None))
    }

    fn new_leaf() -> Self {
        Node::Leaf(std::array::from_fn(|_| None))
    }

    /// A fresh root one level taller, with `child` as its sole slot-0 entry.
    fn new_branch_with(child: Rc<Self>) -> Self {
        let mut children: [Option<Rc<Self>>; W] = std::array::from_fn(|_| None);
        children[0] = Some(child);
        Node::Branch(children)
    }

    #[inline]
    fn children(&self) -> &[Option<Rc<Self>>; W] {
        match self {
            Node::Branch(children) => children,
            Node::Leaf(_) => unreachable!("leaf node addressed as a branch"),
        }
    }

    #[inline]
    fn children_mut(&mut self) -> &mut [Option<Rc<Self>>; W] {
        match self {
            Node::Branch(children) => children,
            Node::Leaf(_) => unreachable!("leaf node addressed as a branch"),
        }
    }

    #[inline]
    fn values(&self) -> &[Option<T>; W] {
        match self {
            Node::Leaf(values) => values,
            Node::Branch(_) => unreachable!("branch node addressed as a leaf"),
        }
    }

    #[inline]
    fn values_mut(&mut self) -> &mut [Option<T>; W] {
        match self {
            Node::Leaf(values) => values,
            Node::Branch(_) => unreachable!("branch node addressed as a leaf"),
        }
    }

    // =========================================================================
    // Index decomposition
    // =========================================================================

    /// Per-level `(level, slot)` pairs for `index`, root first.
    ///
    /// Successive `BITS`-wide groups of `index` are extracted most
    /// significant first, down to but not including the leaf's own slot
    /// (`index & MASK`), which callers resolve against the terminal leaf.
    /// Lookup, append and pop all drive their descents off this one routine.
    #[inline]
    fn slot_path(index: usize, depth: usize) -> impl Iterator<Item = (usize, usize)> {
        (1..=depth)
            .rev()
            .map(move |level| (level, (index >> (level * Self::BITS)) & Self::MASK))
    }

    /// Tree depth required to address `len` elements: 0 while everything
    /// fits in a single leaf, growing by one each time `len` exceeds
    /// `W^(depth + 1)`.
    #[inline]
    fn depth_for(len: usize) -> usize {
        if len <= W {
            return 0;
        }
        let bits_needed = (usize::BITS - (len - 1).leading_zeros()) as usize;
        (bits_needed - 1) / Self::BITS
    }

    /// True when `n` is `W^k` for some `k >= 1`. These are exactly the
    /// counts at which the root grows (before an append) or sheds a level
    /// (after a pop back down to `n`).
    #[inline]
    fn is_fanout_power(n: usize) -> bool {
        n >= W && n.is_power_of_two() && (n.trailing_zeros() as usize) % Self::BITS == 0
    }

    /// Leftmost child of a root that is about to shed a level.
    fn first_child(&self) -> Rc<Self> {
        Rc::clone(
            self.children()[0]
                .as_ref()
                .expect("shrinking root must keep its leftmost child"),
        )
    }
}

impl<T: Clone, const W: usize> Node<T, W> {
    /// Write `value` at `index` along the path of a (possibly freshly
    /// grown) root, cloning shared nodes and allocating missing ones.
    ///
    /// Three cases per descended slot, in order:
    /// 1. The slot is empty: allocate a fresh node there (branch extension).
    /// 2. The slot holds a shared node: shallow-copy it before writing
    ///    (path copying).
    /// 3. The slot holds a uniquely owned node: mutate it in place.
    ///
    /// Cases 2 and 3 are both `Rc::make_mut`, so a persistent caller (which
    /// starts from a shared root handle) path-copies while a transient
    /// caller (whose handles are unique after the first pass) mutates in
    /// place, through the same code.
    fn push_tail(root: &mut Rc<Self>, index: usize, depth: usize, value: T) {
        let mut node = Rc::make_mut(root);
        for (level, slot) in Self::slot_path(index, depth) {
            let child = node.children_mut()[slot].get_or_insert_with(|| {
                Rc::new(if level == 1 {
                    Self::new_leaf()
                } else {
                    Self::new_branch()
                })
            });
            node = Rc::make_mut(child);
        }
        node.values_mut()[index & Self::MASK] = Some(value);
    }

    /// Remove and return the value at `index`, the current last element.
    ///
    /// When the removed slot is slot 0 of its leaf, the whole leaf is
    /// discarded from its parent instead of being cleared slot by slot.
    /// Root shedding at fan-out powers is the caller's job.
    fn pop_tail(root: &mut Rc<Self>, index: usize, depth: usize) -> T {
        let mut node = Rc::make_mut(root);
        for (level, slot) in Self::slot_path(index, depth) {
            if level == 1 && index & Self::MASK == 0 {
                let leaf = node.children_mut()[slot]
                    .take()
                    .expect("pop path slot below len must be occupied");
                return match Rc::try_unwrap(leaf) {
                    Ok(mut leaf) => leaf.values_mut()[0]
                        .take()
                        .expect("popped slot must hold a value"),
                    Err(leaf) => leaf.values()[0]
                        .clone()
                        .expect("popped slot must hold a value"),
                };
            }
            let child = node.children_mut()[slot]
                .as_mut()
                .expect("pop path slot below len must be occupied");
            node = Rc::make_mut(child);
        }
        node.values_mut()[index & Self::MASK]
            .take()
            .expect("popped slot must hold a value")
    }
}

// =============================================================================
// TrieVector
// =============================================================================

/// A persistent indexed sequence backed by a bit-partitioned trie of fan-out
/// `W` (a power of two, 32 by default).
///
/// Indexed access, [`push`](TrieVector::push) and [`pop`](TrieVector::pop)
/// are O(log_W n). Mutating operations take `&self` and return a new vector;
/// unchanged subtrees are shared between versions, never copied. [`Clone`]
/// is an O(1) snapshot.
///
/// The fan-out is a compile-time parameter, so vectors built under different
/// fan-outs are distinct types and cannot be mixed. The crate is
/// single-threaded: nodes are `Rc`-shared.
pub struct TrieVector<T, const W: usize = 32> {
    root: Rc<Node<T, W>>,
    len: usize,
}

impl<T, const W: usize> TrieVector<T, W> {
    /// An empty vector.
    pub fn new() -> Self {
        Self {
            root: Rc::new(Node::new_leaf()),
            len: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Tree depth: 0 while the whole vector fits in a single leaf.
    #[inline]
    pub fn depth(&self) -> usize {
        Node::<T, W>::depth_for(self.len)
    }

    /// The element at `index`, or [`Error::OutOfRange`].
    pub fn at(&self, index: usize) -> Result<&T, Error> {
        if index >= self.len {
            return Err(Error::OutOfRange {
                index,
                len: self.len,
            });
        }
        let value = self.leaf_for(index).values()[index & Node::<T, W>::MASK]
            .as_ref()
            .expect("slot below len must hold a value");
        Ok(value)
    }

    /// The element at `index`, or `None` when out of range.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.at(index).ok()
    }

    /// The last element, or `None` on an empty vector.
    #[inline]
    pub fn last(&self) -> Option<&T> {
        self.get(self.len.checked_sub(1)?)
    }

    /// A forward iterator over the whole vector.
    ///
    /// The iterator keeps hold of the leaf it is currently reading and only
    /// walks the tree again when it crosses a leaf boundary, so a full
    /// traversal costs O(n) rather than O(n log n).
    pub fn iter(&self) -> Iter<'_, T, W> {
        self.slice_iter(0, self.len)
    }

    /// Calls `f(value, index)` for every element in order.
    pub fn for_each<F: FnMut(&T, usize)>(&self, mut f: F) {
        for (index, value) in self.iter().enumerate() {
            f(value, index);
        }
    }

    /// Calls `f(value, index)` for every element of `[start, end)`.
    ///
    /// `end` follows the same convention as [`slice`](TrieVector::slice):
    /// half-open, with a negative `end` resolved as `len + end`.
    pub fn for_each_in<F: FnMut(&T, usize)>(
        &self,
        start: usize,
        end: isize,
        mut f: F,
    ) -> Result<(), Error> {
        let (start, end) = self.checked_range(start, end)?;
        for (offset, value) in self.slice_iter(start, end).enumerate() {
            f(value, start + offset);
        }
        Ok(())
    }

    /// Left fold over the elements, seeded with `init`.
    pub fn fold<S, F: FnMut(S, &T) -> S>(&self, init: S, f: F) -> S {
        self.iter().fold(init, f)
    }

    /// Derives a transient builder sharing this vector's nodes.
    ///
    /// The builder mutates in place only where it holds the sole handle; any
    /// path still shared with this vector (or its clones) is copied on first
    /// write, so published vectors can never observe builder mutation.
    pub fn transient(&self) -> TransientVector<T, W> {
        TransientVector {
            root: Rc::clone(&self.root),
            len: self.len,
        }
    }

    /// Walks to the leaf covering `index`. `index` must be below `len`.
    fn leaf_for(&self, index: usize) -> &Node<T, W> {
        let mut node: &Node<T, W> = &self.root;
        for (_, slot) in Node::<T, W>::slot_path(index, self.depth()) {
            node = node.children()[slot]
                .as_deref()
                .expect("path slot below len must be occupied");
        }
        node
    }

    fn slice_iter(&self, front: usize, back: usize) -> Iter<'_, T, W> {
        debug_assert!(front <= back && back <= self.len);
        Iter {
            vec: self,
            front,
            back,
            leaf: None,
        }
    }

    /// Resolves `[start, end)` against the length, wrapping a negative `end`
    /// as `len + end`.
    fn checked_range(&self, start: usize, end: isize) -> Result<(usize, usize), Error> {
        let len = self.len;
        let resolved = if end < 0 { len as isize + end } else { end };
        if start > len || resolved < start as isize || resolved > len as isize {
            return Err(Error::InvalidRange { start, end, len });
        }
        Ok((start, resolved as usize))
    }
}

impl<T: Clone, const W: usize> TrieVector<T, W> {
    /// Appends one element, returning the new vector.
    ///
    /// The original is untouched; every subtree off the append path is
    /// shared between the two versions. When `len` is an exact power of `W`
    /// the root grows one level first, the old root becoming slot 0 of the
    /// new one.
    pub fn push(&self, value: T) -> Self {
        let index = self.len;
        let mut root = if Node::<T, W>::is_fanout_power(index) {
            Rc::new(Node::new_branch_with(Rc::clone(&self.root)))
        } else {
            Rc::clone(&self.root)
        };
        Node::push_tail(&mut root, index, Node::<T, W>::depth_for(index + 1), value);
        Self {
            root,
            len: index + 1,
        }
    }

    /// Removes the last element, returning the shortened vector, or
    /// [`Error::Underflow`] on an empty one.
    ///
    /// When the new length drops to an exact power of `W` the root sheds a
    /// level, collapsing to its leftmost child (down to a bare leaf when the
    /// vector fits in one again).
    pub fn pop(&self) -> Result<Self, Error> {
        if self.len == 0 {
            return Err(Error::Underflow);
        }
        let index = self.len - 1;
        let mut root = Rc::clone(&self.root);
        let _ = Node::pop_tail(&mut root, index, Node::<T, W>::depth_for(self.len));
        if Node::<T, W>::is_fanout_power(index) {
            root = root.first_child();
        }
        Ok(Self { root, len: index })
    }

    /// Concatenates every element of every vector in `others` onto a copy of
    /// this vector, in order.
    pub fn concat<'a, I>(&self, others: I) -> Self
    where
        T: 'a,
        I: IntoIterator<Item = &'a Self>,
    {
        let mut out = self.transient();
        for other in others {
            for value in other.iter() {
                out.push(value.clone());
            }
        }
        out.freeze()
    }

    /// Rebuilds a new vector from `[0, start)`, then `values` in order, then
    /// `[start, len)`. A full O(n) rebuild; no structural sharing is
    /// attempted. `start` must be in `[0, len]`.
    pub fn splice<I>(&self, start: usize, values: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = T>,
    {
        if start > self.len {
            return Err(Error::InvalidRange {
                start,
                end: self.len as isize,
                len: self.len,
            });
        }
        let mut out = TransientVector::new();
        for value in self.slice_iter(0, start) {
            out.push(value.clone());
        }
        for value in values {
            out.push(value);
        }
        for value in self.slice_iter(start, self.len) {
            out.push(value.clone());
        }
        Ok(out.freeze())
    }

    /// A new vector over the half-open range `[start, end)`.
    ///
    /// A negative `end` resolves as `len + end`. The whole-vector snapshot
    /// is [`Clone`], which is O(1).
    pub fn slice(&self, start: usize, end: isize) -> Result<Self, Error> {
        let (start, end) = self.checked_range(start, end)?;
        Ok(self.slice_iter(start, end).cloned().collect())
    }

    /// Left fold seeded by the first element; `None` on an empty vector.
    pub fn reduce<F: FnMut(T, &T) -> T>(&self, f: F) -> Option<T> {
        let mut iter = self.iter();
        let first = iter.next()?.clone();
        Some(iter.fold(first, f))
    }

    /// Exports the elements to a plain `Vec`.
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}

impl<T, const W: usize> Default for TrieVector<T, W> {
    fn default() -> Self {
        Self::new()
    }
}

/// O(1) snapshot: the clone shares the entire node graph.
impl<T, const W: usize> Clone for TrieVector<T, W> {
    fn clone(&self) -> Self {
        Self {
            root: Rc::clone(&self.root),
            len: self.len,
        }
    }
}

impl<T: std::fmt::Debug, const W: usize> std::fmt::Debug for TrieVector<T, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: PartialEq, const W: usize> PartialEq for TrieVector<T, W> {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}

impl<T: Eq, const W: usize> Eq for TrieVector<T, W> {}

impl<T, const W: usize> std::ops::Index<usize> for TrieVector<T, W> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        match self.at(index) {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }
}

impl<T: Clone, const W: usize> FromIterator<T> for TrieVector<T, W> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut out = TransientVector::new();
        for value in iter {
            out.push(value);
        }
        out.freeze()
    }
}

impl<T: Clone, const W: usize> From<&[T]> for TrieVector<T, W> {
    fn from(values: &[T]) -> Self {
        values.iter().cloned().collect()
    }
}

impl<'a, T, const W: usize> IntoIterator for &'a TrieVector<T, W> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T, W>;

    fn into_iter(self) -> Iter<'a, T, W> {
        self.iter()
    }
}

// =============================================================================
// TransientVector
// =============================================================================

/// Exclusive-ownership builder for batch construction.
///
/// A transient mutates its node graph in place instead of path-copying on
/// every operation, which makes building a vector of n elements O(n) overall.
/// It is deliberately not `Clone`: exactly one handle owns the mutation
/// rights, and [`freeze`](TransientVector::freeze) consumes that handle to
/// publish an immutable [`TrieVector`].
///
/// A transient derived from a live vector via
/// [`TrieVector::transient`] copies any still-shared path on first write, so
/// holding both is always safe.
pub struct TransientVector<T, const W: usize = 32> {
    root: Rc<Node<T, W>>,
    len: usize,
}

impl<T, const W: usize> TransientVector<T, W> {
    /// An empty builder.
    pub fn new() -> Self {
        Self {
            root: Rc::new(Node::new_leaf()),
            len: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Publishes the built vector, consuming the builder.
    pub fn freeze(self) -> TrieVector<T, W> {
        TrieVector {
            root: self.root,
            len: self.len,
        }
    }
}

impl<T: Clone, const W: usize> TransientVector<T, W> {
    /// Appends one element in place.
    pub fn push(&mut self, value: T) {
        let index = self.len;
        if Node::<T, W>::is_fanout_power(index) {
            self.root = Rc::new(Node::new_branch_with(Rc::clone(&self.root)));
        }
        Node::push_tail(
            &mut self.root,
            index,
            Node::<T, W>::depth_for(index + 1),
            value,
        );
        self.len = index + 1;
    }

    /// Removes and returns the last element, or `None` when empty.
    pub fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let index = self.len - 1;
        let value = Node::pop_tail(&mut self.root, index, Node::<T, W>::depth_for(self.len));
        if Node::<T, W>::is_fanout_power(index) {
            self.root = self.root.first_child();
        }
        self.len = index;
        Some(value)
    }
}

impl<T, const W: usize> Default for TransientVector<T, W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone, const W: usize> Extend<T> for TransientVector<T, W> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.push(value);
        }
    }
}

// =============================================================================
// Iteration
// =============================================================================

/// Forward iterator over a [`TrieVector`].
///
/// Holds the leaf it is currently reading and re-walks the tree only when
/// crossing a leaf boundary.
pub struct Iter<'a, T, const W: usize = 32> {
    vec: &'a TrieVector<T, W>,
    front: usize,
    back: usize,
    leaf: Option<&'a Node<T, W>>,
}

impl<'a, T, const W: usize> Iterator for Iter<'a, T, W> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        if self.front >= self.back {
            return None;
        }
        if self.leaf.is_none() || self.front & Node::<T, W>::MASK == 0 {
            self.leaf = Some(self.vec.leaf_for(self.front));
        }
        let leaf = self.leaf.expect("leaf fetched above");
        let value = leaf.values()[self.front & Node::<T, W>::MASK]
            .as_ref()
            .expect("slot below len must hold a value");
        self.front += 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.back - self.front;
        (remaining, Some(remaining))
    }
}

impl<T, const W: usize> ExactSizeIterator for Iter<'_, T, W> {}

impl<T, const W: usize> std::iter::FusedIterator for Iter<'_, T, W> {}

// =============================================================================
// Tests
// =============================================================================


#[cfg(test)]
mod proptests;
