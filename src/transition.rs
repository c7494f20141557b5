//! Abstract transition relations and their construction from growth bounds.

use log::{debug, info};
use rayon::prelude::*;

use crate::alphabet::SymbolicAlphabet;
use crate::dynamics::Dynamics;
use crate::error::{Error, Result};
use crate::grid::UniformGrid;
use crate::relation::{RelationEngine, SpaceId};

/// A relation over `(pre, input, post)` triples.
///
/// A `(pre, input)` pair without any successor is not in the relation.
#[derive(Debug, Clone)]
pub struct TransitionRelation<R> {
    relation: R,
    pre: SpaceId,
    input: SpaceId,
    post: SpaceId,
    transitions: u64,
}

impl<R: Clone> TransitionRelation<R> {
    pub fn new<E>(engine: &E, relation: R, pre: SpaceId, input: SpaceId, post: SpaceId) -> Self
    where
        E: RelationEngine<Relation = R>,
    {
        let transitions = engine.count(&relation, &[pre, input, post]);
        Self {
            relation,
            pre,
            input,
            post,
            transitions,
        }
    }

    /// Relation made of the given `(pre, input, post)` index triples.
    pub fn from_triples<E>(
        engine: &E,
        pre: SpaceId,
        input: SpaceId,
        post: SpaceId,
        triples: impl IntoIterator<Item = (u64, u64, u64)>,
    ) -> Self
    where
        E: RelationEngine<Relation = R>,
    {
        let mut relation = engine.empty();
        for (x, u, y) in triples {
            let pair = engine.intersect(&engine.cell(pre, x), &engine.cell(input, u));
            let triple = engine.intersect(&pair, &engine.cell(post, y));
            relation = engine.union(&relation, &triple);
        }
        Self::new(engine, relation, pre, input, post)
    }

    pub fn relation(&self) -> &R {
        &self.relation
    }

    pub fn pre(&self) -> SpaceId {
        self.pre
    }

    pub fn input(&self) -> SpaceId {
        self.input
    }

    pub fn post(&self) -> SpaceId {
        self.post
    }

    /// Number of `(pre, input, post)` triples.
    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    /// Keep only the transitions leaving `safe` (a set of pre states).
    pub fn restrict_to_safe<E>(&self, engine: &E, safe: &R) -> Self
    where
        E: RelationEngine<Relation = R>,
    {
        let safe = engine.exists(safe, &[self.input, self.post]);
        let relation = engine.intersect(&self.relation, &safe);
        Self::new(engine, relation, self.pre, self.input, self.post)
    }
}

/// Successor box of one `(pre, input)` pair, as inclusive post coordinates.
#[derive(Debug)]
struct Successors {
    pre: u64,
    input: u64,
    first: Vec<u64>,
    last: Vec<u64>,
}

/// Builds the abstraction of a sampled system on uniform grids.
///
/// For each pre cell and input symbol the cell centre is advanced one period,
/// the half-cell radius is advanced by the growth bound and inflated by the
/// measurement error, and every post cell overlapping the resulting rectangle
/// becomes a successor. A pair whose rectangle leaves the post domain or hits
/// an avoided cell gets no successor at all; avoided pre cells are skipped.
pub struct GrowthBoundTransitionBuilder<'a, D: ?Sized> {
    pre: &'a SymbolicAlphabet,
    input: &'a SymbolicAlphabet,
    post: &'a SymbolicAlphabet,
    dynamics: &'a D,
    measurement_error: Vec<f64>,
    avoid: Option<Box<dyn Fn(&[f64]) -> bool + Sync + 'a>>,
    chunk_size: usize,
}

impl<'a, D: Dynamics + ?Sized> GrowthBoundTransitionBuilder<'a, D> {
    pub fn new(
        pre: &'a SymbolicAlphabet,
        input: &'a SymbolicAlphabet,
        post: &'a SymbolicAlphabet,
        dynamics: &'a D,
    ) -> Self {
        Self {
            pre,
            input,
            post,
            dynamics,
            measurement_error: vec![0.0; post.dim()],
            avoid: None,
            chunk_size: 1024,
        }
    }

    /// Component-wise bound added to every successor radius.
    pub fn with_measurement_error(mut self, z: Vec<f64>) -> Self {
        self.measurement_error = z;
        self
    }

    /// Cells whose centre satisfies `avoid` are never left nor entered.
    pub fn with_avoid(mut self, avoid: impl Fn(&[f64]) -> bool + Sync + 'a) -> Self {
        self.avoid = Some(Box::new(avoid));
        self
    }

    /// Number of pre cells handed to one worker at a time.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    fn check_dimensions(&self) -> Result<()> {
        let checks = [
            (self.dynamics.state_dim(), self.pre.dim()),
            (self.dynamics.state_dim(), self.post.dim()),
            (self.dynamics.input_dim(), self.input.dim()),
            (self.post.dim(), self.measurement_error.len()),
        ];
        for (expected, found) in checks {
            if expected != found {
                return Err(Error::DimensionMismatch { expected, found });
            }
        }
        Ok(())
    }

    fn avoided_cells(&self, alphabet: &SymbolicAlphabet) -> Vec<bool> {
        match &self.avoid {
            None => Vec::new(),
            Some(avoid) => (0..alphabet.cell_count())
                .into_par_iter()
                .map(|index| avoid(&alphabet.point_of(index)))
                .collect(),
        }
    }

    /// Successor box of `(x, u)`, or `None` when the pair loses.
    fn successors(&self, x: &[f64], u: &[f64]) -> Result<Option<(Vec<u64>, Vec<u64>)>> {
        let mut r: Vec<f64> = self.pre.eta().iter().map(|h| h / 2.0).collect();
        self.dynamics.advance_growth_bound(&mut r, x, u);
        let mut y = x.to_vec();
        self.dynamics.advance(&mut y, u);

        for (ri, zi) in r.iter_mut().zip(&self.measurement_error) {
            *ri += zi;
        }
        if y.iter().chain(&r).any(|v| !v.is_finite()) {
            return Err(Error::NonFiniteState {
                state: x.to_vec(),
                input: u.to_vec(),
            });
        }

        let lo: Vec<f64> = y.iter().zip(&r).map(|(c, r)| c - r).collect();
        let hi: Vec<f64> = y.iter().zip(&r).map(|(c, r)| c + r).collect();
        Ok(self.post.grid().covering_cells(&lo, &hi))
    }

    fn chunk_successors(
        &self,
        chunk: &[u64],
        inputs: &[Vec<f64>],
        pre_avoided: &[bool],
        post_avoided: &[bool],
    ) -> Result<Vec<Successors>> {
        let mut res = Vec::new();
        for &pre in chunk {
            if pre_avoided.get(pre as usize).copied().unwrap_or(false) {
                continue;
            }
            let x = self.pre.point_of(pre);
            for (input, u) in inputs.iter().enumerate() {
                let Some((first, last)) = self.successors(&x, u)? else {
                    continue;
                };
                if !post_avoided.is_empty()
                    && box_cells(self.post.grid(), &first, &last).any(|index| post_avoided[index as usize])
                {
                    continue;
                }
                res.push(Successors {
                    pre,
                    input: input as u64,
                    first,
                    last,
                });
            }
        }
        Ok(res)
    }

    pub fn build<E: RelationEngine>(&self, engine: &E) -> Result<TransitionRelation<E::Relation>> {
        self.check_dimensions()?;

        let inputs: Vec<Vec<f64>> = (0..self.input.cell_count()).map(|u| self.input.point_of(u)).collect();
        let pre_avoided = self.avoided_cells(self.pre);
        let post_avoided = self.avoided_cells(self.post);
        let cells: Vec<u64> = (0..self.pre.cell_count()).collect();
        info!(
            "Computing transitions for {} cells x {} inputs",
            cells.len(),
            inputs.len()
        );

        let chunks: Vec<Vec<Successors>> = cells
            .par_chunks(self.chunk_size)
            .map(|chunk| self.chunk_successors(chunk, &inputs, &pre_avoided, &post_avoided))
            .collect::<Result<_>>()?;

        let (pre, input, post) = (self.pre.space(), self.input.space(), self.post.space());
        let mut relation = engine.empty();
        let mut transitions = 0u64;
        let total = chunks.len();
        for (i, chunk) in chunks.into_iter().enumerate() {
            let pairs = chunk.len();
            for s in chunk {
                let pair = engine.intersect(&engine.cell(pre, s.pre), &engine.cell(input, s.input));
                let triples = engine.intersect(&pair, &engine.cell_box(post, &s.first, &s.last));
                relation = engine.union(&relation, &triples);
                transitions += s.first.iter().zip(&s.last).map(|(a, b)| b - a + 1).product::<u64>();
            }
            debug!("Chunk {}/{}: {} pairs with successors", i + 1, total, pairs);
        }

        info!("Number of transitions: {}", transitions);
        Ok(TransitionRelation {
            relation,
            pre,
            input,
            post,
            transitions,
        })
    }
}

/// Indices of the cells in the inclusive coordinate box `[first, last]`.
fn box_cells<'g>(grid: &'g UniformGrid, first: &[u64], last: &[u64]) -> impl Iterator<Item = u64> + 'g {
    let first = first.to_vec();
    let last = last.to_vec();
    let mut coords = Some(first.clone());
    std::iter::from_fn(move || {
        let current = coords.take()?;
        let index = grid.index_of(&current);
        let mut next = current;
        for axis in 0..next.len() {
            if next[axis] < last[axis] {
                next[axis] += 1;
                coords = Some(next);
                return Some(index);
            }
            next[axis] = first[axis];
        }
        Some(index)
    })
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::explicit::ExplicitEngine;
    use crate::symbolic::BddEngine;

    /// `x' = x + u` on a line, with a growth bound that shrinks the radius.
    struct Shift;

    impl Dynamics for Shift {
        fn state_dim(&self) -> usize {
            1
        }
        fn input_dim(&self) -> usize {
            1
        }
        fn advance(&self, x: &mut [f64], u: &[f64]) {
            x[0] += u[0];
        }
        fn advance_growth_bound(&self, r: &mut [f64], _x: &[f64], _u: &[f64]) {
            r[0] *= 0.4;
        }
    }

    struct Blowup;

    impl Dynamics for Blowup {
        fn state_dim(&self) -> usize {
            1
        }
        fn input_dim(&self) -> usize {
            1
        }
        fn advance(&self, x: &mut [f64], _u: &[f64]) {
            x[0] = f64::NAN;
        }
        fn advance_growth_bound(&self, _r: &mut [f64], _x: &[f64], _u: &[f64]) {}
    }

    fn alphabets<E: RelationEngine>(engine: &mut E) -> (SymbolicAlphabet, SymbolicAlphabet, SymbolicAlphabet) {
        let states = UniformGrid::new(vec![0.0], vec![10.0], vec![1.0]).unwrap();
        let inputs = UniformGrid::new(vec![-2.0], vec![2.0], vec![2.0]).unwrap();
        let pre = SymbolicAlphabet::new(engine, states);
        let input = SymbolicAlphabet::new(engine, inputs);
        let post = pre.duplicate(engine);
        (pre, input, post)
    }

    fn check_shift<E: RelationEngine>(mut engine: E) {
        let (pre, input, post) = alphabets(&mut engine);
        let t = GrowthBoundTransitionBuilder::new(&pre, &input, &post, &Shift)
            .with_chunk_size(3)
            .build(&engine)
            .unwrap();

        // Every cell but the two boundary moves has a unique successor.
        assert_eq!(t.transitions(), 18);
        assert!(engine.contains(t.relation(), &[(pre.space(), 4), (input.space(), 1), (post.space(), 5)]));
        assert!(engine.contains(t.relation(), &[(pre.space(), 4), (input.space(), 0), (post.space(), 3)]));
        // Leaving the domain loses the pair.
        assert!(!engine.contains(t.relation(), &[(pre.space(), 9), (input.space(), 1)]));
        assert!(!engine.contains(t.relation(), &[(pre.space(), 0), (input.space(), 0)]));
    }

    #[test]
    fn test_shift_explicit() {
        check_shift(ExplicitEngine::new());
    }

    #[test]
    fn test_shift_bdd() {
        check_shift(BddEngine::default());
    }

    #[test]
    fn test_measurement_error_widens_successors() {
        let mut engine = ExplicitEngine::new();
        let (pre, input, post) = alphabets(&mut engine);
        let t = GrowthBoundTransitionBuilder::new(&pre, &input, &post, &Shift)
            .with_measurement_error(vec![0.5])
            .build(&engine)
            .unwrap();
        // Radius 0.2 + 0.5 around 5.5 covers cells 4, 5 and 6.
        let succ = engine.restrict(&engine.restrict(t.relation(), pre.space(), 4), input.space(), 1);
        assert_eq!(post.cells_of(&engine, &succ), vec![4, 5, 6]);
    }

    #[test]
    fn test_avoid() {
        let mut engine = ExplicitEngine::new();
        let (pre, input, post) = alphabets(&mut engine);
        let t = GrowthBoundTransitionBuilder::new(&pre, &input, &post, &Shift)
            .with_avoid(|x: &[f64]| (4.0..5.0).contains(&x[0]))
            .build(&engine)
            .unwrap();
        // Cell 4 has no outgoing pairs, and nothing enters it.
        assert!(!engine.contains(t.relation(), &[(pre.space(), 4)]));
        assert!(!engine.contains(t.relation(), &[(post.space(), 4)]));
        assert!(engine.contains(t.relation(), &[(pre.space(), 5), (input.space(), 1)]));
        assert!(!engine.contains(t.relation(), &[(pre.space(), 5), (input.space(), 0)]));
    }

    #[test]
    fn test_non_finite() {
        let mut engine = ExplicitEngine::new();
        let (pre, input, post) = alphabets(&mut engine);
        let res = GrowthBoundTransitionBuilder::new(&pre, &input, &post, &Blowup).build(&engine);
        assert!(matches!(res, Err(Error::NonFiniteState { .. })));
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut engine = ExplicitEngine::new();
        let (pre, input, post) = alphabets(&mut engine);
        let res = GrowthBoundTransitionBuilder::new(&pre, &input, &post, &Shift)
            .with_measurement_error(vec![0.1, 0.1])
            .build(&engine);
        assert!(matches!(res, Err(Error::DimensionMismatch { expected: 1, found: 2 })));
    }

    #[test]
    fn test_from_triples_and_safe_mask() {
        let mut engine = ExplicitEngine::new();
        let (pre, input, post) = alphabets(&mut engine);
        let t = TransitionRelation::from_triples(
            &engine,
            pre.space(),
            input.space(),
            post.space(),
            [(0, 0, 1), (1, 0, 2), (1, 1, 0)],
        );
        assert_eq!(t.transitions(), 3);
        let safe = t.restrict_to_safe(&engine, &pre.cell(&engine, 1));
        assert_eq!(safe.transitions(), 2);
        assert_eq!(pre.cells_of(&engine, &engine.exists(safe.relation(), &[input.space(), post.space()])), vec![1]);
    }

    #[test]
    fn test_box_cells() {
        let grid = UniformGrid::new(vec![0.0, 0.0], vec![3.0, 3.0], vec![1.0, 1.0]).unwrap();
        let cells: Vec<u64> = box_cells(&grid, &[1, 0], &[2, 1]).collect();
        assert_eq!(cells, vec![1, 2, 4, 5]);
    }
}
