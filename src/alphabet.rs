//! Finite alphabets of grid cells bound to a relation space.

use log::debug;
use rayon::prelude::*;

use crate::error::Result;
use crate::grid::UniformGrid;
use crate::relation::{RelationEngine, SpaceId};

/// Slack added to half-cell margins in [`SymbolicAlphabet::inner_box`] and
/// [`SymbolicAlphabet::outer_box`].
pub const MARGIN_EPSILON: f64 = 1e-10;

/// A uniform grid whose cell indices form one space of a relation engine.
#[derive(Debug, Clone)]
pub struct SymbolicAlphabet {
    grid: UniformGrid,
    space: SpaceId,
}

impl SymbolicAlphabet {
    /// Declare a new space for `grid` in `engine`.
    pub fn new<E: RelationEngine>(engine: &mut E, grid: UniformGrid) -> Self {
        let space = engine.add_space(grid.cells_per_axis());
        debug!("Alphabet {} over {} cells {:?}", space, grid.cell_count(), grid.cells_per_axis());
        Self { grid, space }
    }

    /// Same grid, fresh space. Used for the post-state copy of a state alphabet.
    pub fn duplicate<E: RelationEngine>(&self, engine: &mut E) -> Self {
        Self::new(engine, self.grid.clone())
    }

    pub fn grid(&self) -> &UniformGrid {
        &self.grid
    }

    pub fn space(&self) -> SpaceId {
        self.space
    }

    pub fn dim(&self) -> usize {
        self.grid.dim()
    }

    pub fn eta(&self) -> &[f64] {
        self.grid.eta()
    }

    pub fn cell_count(&self) -> u64 {
        self.grid.cell_count()
    }

    pub fn point_of(&self, index: u64) -> Vec<f64> {
        self.grid.point_of(index)
    }

    pub fn cell_index_of(&self, point: &[f64]) -> Result<u64> {
        self.grid.cell_index_of(point)
    }

    pub fn universe<E: RelationEngine>(&self, engine: &E) -> E::Relation {
        engine.universe(&[self.space])
    }

    pub fn cell<E: RelationEngine>(&self, engine: &E, index: u64) -> E::Relation {
        engine.cell(self.space, index)
    }

    /// The single cell containing `point`.
    pub fn point_relation<E: RelationEngine>(&self, engine: &E, point: &[f64]) -> Result<E::Relation> {
        Ok(self.cell(engine, self.cell_index_of(point)?))
    }

    /// All cells whose centre satisfies `predicate`.
    ///
    /// The predicate is evaluated on every cell in parallel; matches are then
    /// merged into one relation.
    pub fn indices_satisfying<E, P>(&self, engine: &E, predicate: P) -> E::Relation
    where
        E: RelationEngine,
        P: Fn(&[f64]) -> bool + Sync,
    {
        let grid = &self.grid;
        let matching: Vec<u64> = (0..grid.cell_count())
            .into_par_iter()
            .filter(|&index| predicate(&grid.point_of(index)))
            .collect();
        debug!(
            "{} of {} cells of {} satisfy the predicate",
            matching.len(),
            grid.cell_count(),
            self.space
        );

        let mut res = engine.empty();
        for index in matching {
            res = engine.union(&res, &self.cell(engine, index));
        }
        res
    }

    /// Predicate for cells lying entirely inside the box `[lo, hi]`.
    pub fn inner_box(&self, lo: &[f64], hi: &[f64]) -> impl Fn(&[f64]) -> bool + Sync {
        let margin: Vec<f64> = self.eta().iter().map(|h| h / 2.0 + MARGIN_EPSILON).collect();
        let (lo, hi) = (lo.to_vec(), hi.to_vec());
        move |x: &[f64]| (0..x.len()).all(|i| lo[i] + margin[i] <= x[i] && x[i] <= hi[i] - margin[i])
    }

    /// Predicate for cells overlapping the box `[lo, hi]`.
    pub fn outer_box(&self, lo: &[f64], hi: &[f64]) -> impl Fn(&[f64]) -> bool + Sync {
        let margin: Vec<f64> = self.eta().iter().map(|h| h / 2.0 + MARGIN_EPSILON).collect();
        let (lo, hi) = (lo.to_vec(), hi.to_vec());
        move |x: &[f64]| (0..x.len()).all(|i| lo[i] - margin[i] <= x[i] && x[i] <= hi[i] + margin[i])
    }

    /// Number of cells of this alphabet occurring in `relation`.
    pub fn size_of<E: RelationEngine>(&self, engine: &E, relation: &E::Relation) -> u64 {
        self.cells_of(engine, relation).len() as u64
    }

    pub fn cells_of<E: RelationEngine>(&self, engine: &E, relation: &E::Relation) -> Vec<u64> {
        engine.cells(relation, self.space)
    }

    /// Centres of the cells of this alphabet occurring in `relation`.
    pub fn points_of<E: RelationEngine>(&self, engine: &E, relation: &E::Relation) -> Vec<Vec<f64>> {
        self.cells_of(engine, relation)
            .into_iter()
            .map(|index| self.point_of(index))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::explicit::ExplicitEngine;
    use crate::symbolic::BddEngine;

    fn alphabet<E: RelationEngine>(engine: &mut E) -> SymbolicAlphabet {
        let grid = UniformGrid::new(vec![0.0, 0.0], vec![4.0, 2.0], vec![1.0, 0.5]).unwrap();
        SymbolicAlphabet::new(engine, grid)
    }

    fn check_margins<E: RelationEngine>(mut engine: E) {
        let a = alphabet(&mut engine);

        // Box [0.9, 3.1] x [0.4, 1.6] fully contains cells x in {1, 2}, y in {1, 2}.
        let inner = a.indices_satisfying(&engine, a.inner_box(&[0.9, 0.4], &[3.1, 1.6]));
        assert_eq!(a.size_of(&engine, &inner), 4);
        for p in a.points_of(&engine, &inner) {
            assert!((1.5..=2.5).contains(&p[0]), "{:?}", p);
            assert!((0.75..=1.25).contains(&p[1]), "{:?}", p);
        }

        // A cell that fits the box exactly is not strictly inside it.
        let exact = a.indices_satisfying(&engine, a.inner_box(&[1.0, 0.5], &[3.0, 1.5]));
        assert!(engine.is_empty(&exact));

        // Outer approximation also takes the boundary-touching cells.
        let outer = a.indices_satisfying(&engine, a.outer_box(&[1.0, 0.5], &[3.0, 1.5]));
        assert_eq!(a.size_of(&engine, &outer), 4 * 4);
        assert!(engine.is_subset(&inner, &outer));
    }

    #[test]
    fn test_margins_explicit() {
        check_margins(ExplicitEngine::new());
    }

    #[test]
    fn test_margins_bdd() {
        check_margins(BddEngine::default());
    }

    #[test]
    fn test_point_relation() {
        let mut engine = ExplicitEngine::new();
        let a = alphabet(&mut engine);
        let r = a.point_relation(&engine, &[2.2, 0.1]).unwrap();
        assert_eq!(a.cells_of(&engine, &r), vec![2]);
        assert!(a.point_relation(&engine, &[9.0, 0.0]).is_err());
        assert_eq!(a.size_of(&engine, &a.universe(&engine)), 32);
    }
}
