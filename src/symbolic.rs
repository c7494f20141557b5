//! Relation engine backed by a shared [`Bdd`] manager.
//!
//! Every axis of a space gets a block of `max(1, ⌈log2 n⌉)` boolean variables
//! that spell the axis coordinate in binary, most significant bit first.
//! Blocks are allocated in declaration order, so the variables of one space
//! are contiguous.
//!
//! Codes `>= n` on an axis do not stand for any cell. Every relation handed
//! out by the engine is kept inside the valid codes of *all* declared spaces,
//! which makes cylinders over unmentioned spaces behave exactly like in the
//! explicit engine and lets set equality be reference equality. Spaces must
//! therefore be declared before relations over them are built.

use std::collections::HashMap;

use log::debug;

use crate::bdd::Bdd;
use crate::reference::Ref;
use crate::relation::{decode, encode, RelationEngine, SpaceId};

#[derive(Debug)]
struct SpaceLayout {
    axis_cells: Vec<u64>,
    /// Variables of each axis, most significant bit first.
    axis_vars: Vec<Vec<u32>>,
    /// All variables of the space, ascending.
    vars: Vec<u32>,
    /// Valid codes of this space.
    valid: Ref,
}

#[derive(Debug)]
pub struct BddEngine {
    bdd: Bdd,
    spaces: Vec<SpaceLayout>,
    /// Valid codes of every declared space.
    valid: Ref,
}

impl Default for BddEngine {
    fn default() -> Self {
        BddEngine::new(18)
    }
}

/// Number of variables needed to encode `n` cells.
pub fn bits_for(n: u64) -> usize {
    if n <= 1 {
        1
    } else {
        (64 - (n - 1).leading_zeros()) as usize
    }
}

impl BddEngine {
    /// Create an engine whose computed table has `2^cache_bits` slots.
    pub fn new(cache_bits: usize) -> Self {
        Self {
            bdd: Bdd::new(cache_bits),
            spaces: Vec::new(),
            valid: Ref::ONE,
        }
    }

    pub fn bdd(&self) -> &Bdd {
        &self.bdd
    }

    /// Number of nodes in the diagram of `a`.
    pub fn node_count(&self, a: &Ref) -> usize {
        self.bdd.size(*a)
    }

    fn layout(&self, space: SpaceId) -> &SpaceLayout {
        &self.spaces[space.0]
    }

    /// Variables of `spaces`, ascending.
    fn vars_of(&self, spaces: &[SpaceId]) -> Vec<u32> {
        let mut vars: Vec<u32> = spaces.iter().flat_map(|&s| self.layout(s).vars.iter().copied()).collect();
        vars.sort_unstable();
        vars.dedup();
        vars
    }

    fn valid_of(&self, spaces: &[SpaceId]) -> Ref {
        self.bdd.apply_and_many(spaces.iter().map(|&s| self.layout(s).valid))
    }

    /// Variables of every declared space not in `spaces`, ascending.
    fn vars_outside(&self, spaces: &[SpaceId]) -> Vec<u32> {
        let inside = self.vars_of(spaces);
        (1..=self.bdd.num_vars()).filter(|v| inside.binary_search(v).is_err()).collect()
    }

    fn collect_codes(&self, f: Ref, vars: &[u32], code: u64, out: &mut Vec<u64>) {
        if f == Ref::ZERO {
            return;
        }
        let Some((&v, rest)) = vars.split_first() else {
            out.push(code);
            return;
        };
        let (f0, f1) = if self.bdd.variable(f) == v {
            self.bdd.cofactors(f, v)
        } else {
            (f, f)
        };
        self.collect_codes(f0, rest, code << 1, out);
        self.collect_codes(f1, rest, (code << 1) | 1, out);
    }
}

impl RelationEngine for BddEngine {
    type Relation = Ref;

    fn add_space(&mut self, axis_cells: &[u64]) -> SpaceId {
        assert!(axis_cells.iter().all(|&n| n > 0), "Empty axis in {:?}", axis_cells);

        let mut axis_vars = Vec::with_capacity(axis_cells.len());
        let mut valid = Ref::ONE;
        for &n in axis_cells {
            let vars = self.bdd.new_vars(bits_for(n));
            let range = self.bdd.mk_range(&vars, 0, n - 1);
            valid = self.bdd.apply_and(valid, range);
            axis_vars.push(vars);
        }
        let vars: Vec<u32> = axis_vars.iter().flatten().copied().collect();
        debug!(
            "Declared space S{} with cells {:?} over {} variables",
            self.spaces.len(),
            axis_cells,
            vars.len()
        );

        self.valid = self.bdd.apply_and(self.valid, valid);
        self.spaces.push(SpaceLayout {
            axis_cells: axis_cells.to_vec(),
            axis_vars,
            vars,
            valid,
        });
        SpaceId(self.spaces.len() - 1)
    }

    fn axis_cells(&self, space: SpaceId) -> &[u64] {
        &self.layout(space).axis_cells
    }

    fn empty(&self) -> Ref {
        Ref::ZERO
    }

    fn universe(&self, _spaces: &[SpaceId]) -> Ref {
        self.valid
    }

    fn cell_box(&self, space: SpaceId, lower: &[u64], upper: &[u64]) -> Ref {
        let layout = self.layout(space);
        assert_eq!(lower.len(), layout.axis_cells.len(), "Box arity mismatch");
        assert_eq!(upper.len(), layout.axis_cells.len(), "Box arity mismatch");

        let ranges = layout
            .axis_vars
            .iter()
            .zip(lower.iter().zip(upper))
            .map(|(vars, (&lo, &hi))| self.bdd.mk_range(vars, lo, hi));
        let b = self.bdd.apply_and_many(ranges);
        self.bdd.apply_and(b, self.valid)
    }

    fn union(&self, a: &Ref, b: &Ref) -> Ref {
        self.bdd.apply_or(*a, *b)
    }

    fn intersect(&self, a: &Ref, b: &Ref) -> Ref {
        self.bdd.apply_and(*a, *b)
    }

    fn difference(&self, a: &Ref, b: &Ref) -> Ref {
        self.bdd.apply_diff(*a, *b)
    }

    fn complement(&self, a: &Ref, _spaces: &[SpaceId]) -> Ref {
        self.bdd.apply_and(self.bdd.apply_not(*a), self.valid)
    }

    fn exists(&self, a: &Ref, spaces: &[SpaceId]) -> Ref {
        let projected = self.bdd.exists(*a, &self.vars_of(spaces));
        self.bdd.apply_and(projected, self.valid_of(spaces))
    }

    fn rename(&self, a: &Ref, from: SpaceId, to: SpaceId) -> Ref {
        let (src, dst) = (self.layout(from), self.layout(to));
        assert_eq!(
            src.axis_cells, dst.axis_cells,
            "Cannot rename {} to {}: layouts differ",
            from, to
        );
        if from == to {
            return *a;
        }

        // Drop the validity constraint on `to` before its variables get reused.
        let free = self.bdd.exists(*a, &dst.vars);
        let map: HashMap<u32, u32> = src.vars.iter().copied().zip(dst.vars.iter().copied()).collect();
        let renamed = self.bdd.rename(free, &map);
        self.bdd.apply_and(renamed, src.valid)
    }

    fn restrict(&self, a: &Ref, space: SpaceId, index: u64) -> Ref {
        let layout = self.layout(space);
        let coords = decode(&layout.axis_cells, index);
        let mut values = HashMap::new();
        for (vars, &c) in layout.axis_vars.iter().zip(&coords) {
            for (bit, &v) in vars.iter().rev().enumerate() {
                values.insert(v, (c >> bit) & 1 == 1);
            }
        }
        let r = self.bdd.restrict(*a, &values);
        self.bdd.apply_and(r, layout.valid)
    }

    fn equal(&self, a: &Ref, b: &Ref) -> bool {
        a == b
    }

    fn is_empty(&self, a: &Ref) -> bool {
        self.bdd.is_zero(*a)
    }

    fn count(&self, a: &Ref, spaces: &[SpaceId]) -> u64 {
        let outside = self.vars_outside(spaces);
        let projected = self.bdd.exists(*a, &outside);
        let count = self.bdd.sat_count(projected, self.bdd.num_vars()) >> outside.len();
        u64::try_from(count).unwrap_or(u64::MAX)
    }

    fn cells(&self, a: &Ref, space: SpaceId) -> Vec<u64> {
        let layout = self.layout(space);
        let projected = self.bdd.exists(*a, &self.vars_outside(&[space]));

        let mut codes = Vec::new();
        self.collect_codes(projected, &layout.vars, 0, &mut codes);

        let mut cells: Vec<u64> = codes
            .into_iter()
            .filter_map(|code| {
                // Split the concatenated code back into per-axis coordinates,
                // the last axis holding the lowest bits.
                let mut rest = code;
                let mut coords = vec![0; layout.axis_cells.len()];
                for (axis, vars) in layout.axis_vars.iter().enumerate().rev() {
                    coords[axis] = rest & ((1u64 << vars.len()) - 1);
                    rest >>= vars.len();
                }
                let valid = coords.iter().zip(&layout.axis_cells).all(|(&c, &n)| c < n);
                valid.then(|| encode(&layout.axis_cells, &coords))
            })
            .collect();
        cells.sort_unstable();
        cells
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_bits_for() {
        assert_eq!(bits_for(1), 1);
        assert_eq!(bits_for(2), 1);
        assert_eq!(bits_for(3), 2);
        assert_eq!(bits_for(4), 2);
        assert_eq!(bits_for(5), 3);
        assert_eq!(bits_for(1024), 10);
    }

    #[test]
    fn test_box_and_cells() {
        let mut engine = BddEngine::default();
        let s = engine.add_space(&[3, 5]);
        let b = engine.cell_box(s, &[1, 1], &[2, 2]);
        // (1,1)=4 (2,1)=5 (1,2)=7 (2,2)=8
        assert_eq!(engine.cells(&b, s), vec![4, 5, 7, 8]);
        assert_eq!(engine.count(&b, &[s]), 4);
        assert_eq!(engine.count(&engine.universe(&[s]), &[s]), 15);
        // Upper bounds past the grid are clipped to valid codes.
        let clipped = engine.cell_box(s, &[2, 3], &[7, 7]);
        assert_eq!(engine.cells(&clipped, s), vec![11, 14]);
    }

    #[test]
    fn test_cylinder_counts_only_valid_codes() {
        let mut engine = BddEngine::default();
        let x = engine.add_space(&[3]);
        let u = engine.add_space(&[3]);
        let a = engine.cell(x, 2);
        assert_eq!(engine.count(&a, &[x, u]), 3);
        assert_eq!(engine.cells(&a, u), vec![0, 1, 2]);
        let c = engine.complement(&a, &[x]);
        assert_eq!(engine.cells(&c, x), vec![0, 1]);
        // Negation must not pick up the unused code 3 of the 2-bit block.
        assert_eq!(engine.count(&c, &[x, u]), 6);
        assert!(engine.equal(&engine.complement(&engine.empty(), &[x]), &engine.universe(&[x, u])));
    }

    #[test]
    fn test_rename_and_restrict() {
        let mut engine = BddEngine::default();
        let x = engine.add_space(&[5]);
        let u = engine.add_space(&[2]);
        let y = engine.add_space(&[5]);

        let pair = engine.intersect(&engine.cell(x, 3), &engine.cell(u, 1));
        let moved = engine.rename(&pair, x, y);
        assert_eq!(engine.cells(&moved, y), vec![3]);
        assert_eq!(engine.cells(&moved, x), vec![0, 1, 2, 3, 4]);
        assert!(engine.equal(&moved, &engine.intersect(&engine.cell(y, 3), &engine.cell(u, 1))));

        assert!(engine.contains(&pair, &[(x, 3), (u, 1)]));
        assert!(!engine.contains(&pair, &[(x, 3), (u, 0)]));
        let inputs = engine.restrict(&pair, x, 3);
        assert_eq!(engine.cells(&inputs, u), vec![1]);
    }
}
