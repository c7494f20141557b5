//! The symbolic relation interface the synthesis algorithms are written against.
//!
//! A [`RelationEngine`] manages a universe made of *spaces*. A space is the
//! index space of one alphabet, laid out as a mixed-radix product of per-axis
//! cell counts (axis 0 varies fastest). A relation is a set of tuples over
//! some of the declared spaces; a relation that does not mention a space is a
//! cylinder over it.
//!
//! Two implementations are provided:
//!
//! - [`ExplicitEngine`][crate::explicit::ExplicitEngine]: dense bitsets,
//!   simple and obviously correct, for small alphabets and tests;
//! - [`BddEngine`][crate::symbolic::BddEngine]: binary decision diagrams, for
//!   production-scale grids.
//!
//! Algorithms only use the trait, so both engines produce the same sets.

use std::fmt::{Debug, Display, Formatter};

/// Handle of a space declared in a [`RelationEngine`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct SpaceId(pub(crate) usize);

impl SpaceId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl Display for SpaceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "S{}", self.0)
    }
}

/// Number of cells in a space with the given per-axis counts.
pub fn space_size(axis_cells: &[u64]) -> u64 {
    axis_cells.iter().product()
}

/// Mixed-radix decoding of a cell index into per-axis coordinates.
pub fn decode(axis_cells: &[u64], mut index: u64) -> Vec<u64> {
    let mut coords = Vec::with_capacity(axis_cells.len());
    for &n in axis_cells {
        coords.push(index % n);
        index /= n;
    }
    coords
}

/// Mixed-radix encoding of per-axis coordinates into a cell index.
pub fn encode(axis_cells: &[u64], coords: &[u64]) -> u64 {
    debug_assert_eq!(axis_cells.len(), coords.len());
    let mut index = 0;
    let mut stride = 1;
    for (&n, &c) in axis_cells.iter().zip(coords) {
        debug_assert!(c < n, "Coordinate {} out of range {}", c, n);
        index += c * stride;
        stride *= n;
    }
    index
}

/// Set-like operations over tuples of cell indices.
///
/// Methods take `&self`; engines that need mutable bookkeeping use interior
/// mutability. Only declaring spaces requires `&mut self`.
pub trait RelationEngine {
    type Relation: Clone + Debug;

    /// Declare a new space with the given number of cells per axis.
    fn add_space(&mut self, axis_cells: &[u64]) -> SpaceId;

    /// Per-axis cell counts of a declared space.
    fn axis_cells(&self, space: SpaceId) -> &[u64];

    fn empty(&self) -> Self::Relation;

    /// All tuples over `spaces` (every valid cell of each space).
    fn universe(&self, spaces: &[SpaceId]) -> Self::Relation;

    /// Cells of `space` whose coordinates lie in `lower[i]..=upper[i]` on
    /// every axis `i`.
    fn cell_box(&self, space: SpaceId, lower: &[u64], upper: &[u64]) -> Self::Relation;

    fn union(&self, a: &Self::Relation, b: &Self::Relation) -> Self::Relation;
    fn intersect(&self, a: &Self::Relation, b: &Self::Relation) -> Self::Relation;
    /// Tuples of `a` that are not in `b`.
    fn difference(&self, a: &Self::Relation, b: &Self::Relation) -> Self::Relation;

    /// Existentially project `spaces` out of `a`.
    fn exists(&self, a: &Self::Relation, spaces: &[SpaceId]) -> Self::Relation;

    /// Re-label the `from` component of `a` as `to`.
    ///
    /// Both spaces must share the same layout and `a` must not mention `to`.
    fn rename(&self, a: &Self::Relation, from: SpaceId, to: SpaceId) -> Self::Relation;

    /// Fix the `space` component of `a` to `index` and drop it.
    fn restrict(&self, a: &Self::Relation, space: SpaceId, index: u64) -> Self::Relation;

    /// Set equality.
    fn equal(&self, a: &Self::Relation, b: &Self::Relation) -> bool;

    fn is_empty(&self, a: &Self::Relation) -> bool;

    /// Number of tuples of `a` over `spaces`.
    ///
    /// `a` must not mention spaces outside of `spaces`.
    fn count(&self, a: &Self::Relation, spaces: &[SpaceId]) -> u64;

    /// Indices of `space` that occur in `a`, in ascending order.
    fn cells(&self, a: &Self::Relation, space: SpaceId) -> Vec<u64>;

    /// A single cell of `space`.
    fn cell(&self, space: SpaceId, index: u64) -> Self::Relation {
        let coords = decode(self.axis_cells(space), index);
        self.cell_box(space, &coords, &coords)
    }

    /// `universe(spaces) \ a`
    fn complement(&self, a: &Self::Relation, spaces: &[SpaceId]) -> Self::Relation {
        self.difference(&self.universe(spaces), a)
    }

    /// Whether every tuple of `a` is in `b`.
    fn is_subset(&self, a: &Self::Relation, b: &Self::Relation) -> bool {
        self.is_empty(&self.difference(a, b))
    }

    /// Whether `a` contains the tuple given as `(space, index)` components.
    ///
    /// Spaces of `a` not listed in `point` are existentially quantified.
    fn contains(&self, a: &Self::Relation, point: &[(SpaceId, u64)]) -> bool {
        let mut r = a.clone();
        for &(space, index) in point {
            r = self.restrict(&r, space, index);
        }
        !self.is_empty(&r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_radix_axis0_fastest() {
        let cells = [3, 4];
        assert_eq!(encode(&cells, &[0, 0]), 0);
        assert_eq!(encode(&cells, &[1, 0]), 1);
        assert_eq!(encode(&cells, &[0, 1]), 3);
        assert_eq!(encode(&cells, &[2, 3]), 11);
        for i in 0..space_size(&cells) {
            assert_eq!(encode(&cells, &decode(&cells, i)), i);
        }
    }
}
