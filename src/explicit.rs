//! Explicit relation engine backed by dense bit sets.
//!
//! A relation stores its *support* (the sorted list of spaces it mentions)
//! and one bit per tuple of the support's product space. Tuples are numbered
//! mixed-radix with the first space of the support varying fastest. Spaces
//! outside the support are unconstrained.
//!
//! Operations between relations over different supports lift both operands to
//! the union of the supports, which costs the size of that product space.
//! The common shapes in synthesis (same support, or one support contained in
//! the other, or disjoint supports) have direct paths.

use crate::bitset::BitSet;
use crate::relation::{space_size, RelationEngine, SpaceId};

#[derive(Debug, Clone)]
pub struct ExplicitRelation {
    support: Vec<SpaceId>,
    bits: BitSet,
}

impl ExplicitRelation {
    /// Spaces this relation mentions, sorted.
    pub fn support(&self) -> &[SpaceId] {
        &self.support
    }
}

#[derive(Debug, Default)]
pub struct ExplicitEngine {
    spaces: Vec<Vec<u64>>,
}

impl ExplicitEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn space_cells(&self, space: SpaceId) -> u64 {
        space_size(&self.spaces[space.0])
    }

    fn product_size(&self, support: &[SpaceId]) -> usize {
        support
            .iter()
            .try_fold(1usize, |acc, &s| acc.checked_mul(self.space_cells(s) as usize))
            .expect("Explicit relation is too large to enumerate")
    }

    /// Per-space components of a tuple number.
    fn split(&self, support: &[SpaceId], mut index: usize) -> Vec<u64> {
        support
            .iter()
            .map(|&s| {
                let n = self.space_cells(s) as usize;
                let part = index % n;
                index /= n;
                part as u64
            })
            .collect()
    }

    fn join(&self, support: &[SpaceId], parts: &[u64]) -> usize {
        let mut index = 0usize;
        let mut stride = 1usize;
        for (&s, &part) in support.iter().zip(parts) {
            index += part as usize * stride;
            stride *= self.space_cells(s) as usize;
        }
        index
    }

    /// Tuple number in `to` of the tuple `parts` over `from` (`to ⊆ from`).
    fn project(&self, from: &[SpaceId], parts: &[u64], to: &[SpaceId]) -> usize {
        let projected: Vec<u64> = to
            .iter()
            .map(|s| {
                let pos = from.binary_search(s).expect("Space is not in the support");
                parts[pos]
            })
            .collect();
        self.join(to, &projected)
    }

    /// Bits of `a` as a cylinder over the larger `support`.
    fn lift(&self, a: &ExplicitRelation, support: &[SpaceId]) -> BitSet {
        if a.support == support {
            return a.bits.clone();
        }
        let size = self.product_size(support);
        let mut bits = BitSet::new(size);
        for index in 0..size {
            let parts = self.split(support, index);
            if a.bits.contains(self.project(support, &parts, &a.support)) {
                bits.insert(index);
            }
        }
        bits
    }

    /// Tuples of `a` whose projection on `b`'s support is (or is not) in `b`.
    fn filter(&self, a: &ExplicitRelation, b: &ExplicitRelation, keep: bool) -> ExplicitRelation {
        let mut bits = BitSet::new(a.bits.capacity());
        for index in a.bits.iter() {
            let parts = self.split(&a.support, index);
            if b.bits.contains(self.project(&a.support, &parts, &b.support)) == keep {
                bits.insert(index);
            }
        }
        ExplicitRelation {
            support: a.support.clone(),
            bits,
        }
    }

    /// Cartesian product of relations over disjoint supports.
    fn product(&self, a: &ExplicitRelation, b: &ExplicitRelation) -> ExplicitRelation {
        let support = merge(&a.support, &b.support);
        let mut bits = BitSet::new(self.product_size(&support));
        for ia in a.bits.iter() {
            let pa = self.split(&a.support, ia);
            for ib in b.bits.iter() {
                let pb = self.split(&b.support, ib);
                let parts: Vec<u64> = support
                    .iter()
                    .map(|s| match a.support.binary_search(s) {
                        Ok(pos) => pa[pos],
                        Err(_) => pb[b.support.binary_search(s).expect("Space is in neither support")],
                    })
                    .collect();
                bits.insert(self.join(&support, &parts));
            }
        }
        ExplicitRelation { support, bits }
    }

    /// Re-index `a` onto a new support derived from its own.
    fn remap(
        &self,
        a: &ExplicitRelation,
        support: Vec<SpaceId>,
        keep: impl Fn(&[u64]) -> bool,
        parts_of: impl Fn(&[u64]) -> Vec<u64>,
    ) -> ExplicitRelation {
        let mut bits = BitSet::new(self.product_size(&support));
        for index in a.bits.iter() {
            let parts = self.split(&a.support, index);
            if keep(&parts) {
                bits.insert(self.join(&support, &parts_of(&parts)));
            }
        }
        ExplicitRelation { support, bits }
    }

    fn binary(
        &self,
        a: &ExplicitRelation,
        b: &ExplicitRelation,
        op: impl Fn(&mut BitSet, &BitSet),
    ) -> ExplicitRelation {
        let support = merge(&a.support, &b.support);
        let mut bits = self.lift(a, &support);
        op(&mut bits, &self.lift(b, &support));
        ExplicitRelation { support, bits }
    }
}

fn merge(a: &[SpaceId], b: &[SpaceId]) -> Vec<SpaceId> {
    let mut support: Vec<SpaceId> = a.iter().chain(b).copied().collect();
    support.sort();
    support.dedup();
    support
}

fn is_subset(a: &[SpaceId], b: &[SpaceId]) -> bool {
    a.iter().all(|s| b.binary_search(s).is_ok())
}

fn is_disjoint(a: &[SpaceId], b: &[SpaceId]) -> bool {
    a.iter().all(|s| b.binary_search(s).is_err())
}

impl RelationEngine for ExplicitEngine {
    type Relation = ExplicitRelation;

    fn add_space(&mut self, axis_cells: &[u64]) -> SpaceId {
        assert!(axis_cells.iter().all(|&n| n > 0), "Empty axis in {:?}", axis_cells);
        self.spaces.push(axis_cells.to_vec());
        SpaceId(self.spaces.len() - 1)
    }

    fn axis_cells(&self, space: SpaceId) -> &[u64] {
        &self.spaces[space.0]
    }

    fn empty(&self) -> ExplicitRelation {
        ExplicitRelation {
            support: Vec::new(),
            bits: BitSet::new(1),
        }
    }

    fn universe(&self, spaces: &[SpaceId]) -> ExplicitRelation {
        let support = merge(spaces, &[]);
        ExplicitRelation {
            bits: BitSet::full(self.product_size(&support)),
            support,
        }
    }

    fn cell_box(&self, space: SpaceId, lower: &[u64], upper: &[u64]) -> ExplicitRelation {
        let cells = &self.spaces[space.0];
        assert_eq!(lower.len(), cells.len(), "Box arity mismatch");
        assert_eq!(upper.len(), cells.len(), "Box arity mismatch");

        let support = vec![space];
        let mut bits = BitSet::new(self.product_size(&support));
        let empty = lower.iter().zip(upper).zip(cells).any(|((&lo, &hi), &n)| lo > hi || lo >= n);
        if !empty {
            let upper: Vec<u64> = upper.iter().zip(cells).map(|(&hi, &n)| hi.min(n - 1)).collect();
            // Odometer over the box, axis 0 fastest.
            let mut coords = lower.to_vec();
            'outer: loop {
                bits.insert(crate::relation::encode(cells, &coords) as usize);
                for axis in 0..coords.len() {
                    if coords[axis] < upper[axis] {
                        coords[axis] += 1;
                        continue 'outer;
                    }
                    coords[axis] = lower[axis];
                }
                break;
            }
        }
        ExplicitRelation { support, bits }
    }

    fn union(&self, a: &ExplicitRelation, b: &ExplicitRelation) -> ExplicitRelation {
        if a.support == b.support {
            let mut bits = a.bits.clone();
            bits.union_with(&b.bits);
            return ExplicitRelation {
                support: a.support.clone(),
                bits,
            };
        }
        if b.bits.is_empty() && is_subset(&b.support, &a.support) {
            return a.clone();
        }
        if a.bits.is_empty() && is_subset(&a.support, &b.support) {
            return b.clone();
        }
        self.binary(a, b, |x, y| x.union_with(y))
    }

    fn intersect(&self, a: &ExplicitRelation, b: &ExplicitRelation) -> ExplicitRelation {
        if a.support == b.support {
            let mut bits = a.bits.clone();
            bits.intersect_with(&b.bits);
            return ExplicitRelation {
                support: a.support.clone(),
                bits,
            };
        }
        if is_subset(&b.support, &a.support) {
            return self.filter(a, b, true);
        }
        if is_subset(&a.support, &b.support) {
            return self.filter(b, a, true);
        }
        if is_disjoint(&a.support, &b.support) {
            return self.product(a, b);
        }
        self.binary(a, b, |x, y| x.intersect_with(y))
    }

    fn difference(&self, a: &ExplicitRelation, b: &ExplicitRelation) -> ExplicitRelation {
        if a.support == b.support {
            let mut bits = a.bits.clone();
            bits.difference_with(&b.bits);
            return ExplicitRelation {
                support: a.support.clone(),
                bits,
            };
        }
        if is_subset(&b.support, &a.support) {
            return self.filter(a, b, false);
        }
        self.binary(a, b, |x, y| x.difference_with(y))
    }

    fn exists(&self, a: &ExplicitRelation, spaces: &[SpaceId]) -> ExplicitRelation {
        let support: Vec<SpaceId> = a.support.iter().filter(|s| !spaces.contains(s)).copied().collect();
        if support.len() == a.support.len() {
            return a.clone();
        }
        self.remap(a, support.clone(), |_| true, |parts| {
            support
                .iter()
                .map(|s| parts[a.support.binary_search(s).expect("Space is not in the support")])
                .collect()
        })
    }

    fn rename(&self, a: &ExplicitRelation, from: SpaceId, to: SpaceId) -> ExplicitRelation {
        assert_eq!(
            self.spaces[from.0], self.spaces[to.0],
            "Cannot rename {} to {}: layouts differ",
            from, to
        );
        if from == to || a.support.binary_search(&from).is_err() {
            return a.clone();
        }
        assert!(a.support.binary_search(&to).is_err(), "Relation already mentions {}", to);

        let renamed: Vec<SpaceId> = a.support.iter().map(|&s| if s == from { to } else { s }).collect();
        let support = merge(&renamed, &[]);
        self.remap(a, support.clone(), |_| true, |parts| {
            support
                .iter()
                .map(|s| parts[renamed.iter().position(|r| r == s).expect("Space is not in the support")])
                .collect()
        })
    }

    fn restrict(&self, a: &ExplicitRelation, space: SpaceId, index: u64) -> ExplicitRelation {
        let Ok(pos) = a.support.binary_search(&space) else {
            return a.clone();
        };
        let support: Vec<SpaceId> = a.support.iter().filter(|&&s| s != space).copied().collect();
        self.remap(
            a,
            support,
            |parts| parts[pos] == index,
            |parts| {
                parts
                    .iter()
                    .enumerate()
                    .filter(|&(i, _)| i != pos)
                    .map(|(_, &p)| p)
                    .collect()
            },
        )
    }

    fn equal(&self, a: &ExplicitRelation, b: &ExplicitRelation) -> bool {
        if a.support == b.support {
            return a.bits == b.bits;
        }
        let support = merge(&a.support, &b.support);
        self.lift(a, &support) == self.lift(b, &support)
    }

    fn is_empty(&self, a: &ExplicitRelation) -> bool {
        a.bits.is_empty()
    }

    fn count(&self, a: &ExplicitRelation, spaces: &[SpaceId]) -> u64 {
        assert!(
            is_subset(&a.support, &merge(spaces, &[])),
            "Relation mentions spaces outside {:?}",
            spaces
        );
        let free: u64 = merge(spaces, &[])
            .iter()
            .filter(|s| a.support.binary_search(s).is_err())
            .map(|&s| self.space_cells(s))
            .product();
        a.bits.len() as u64 * free
    }

    fn cells(&self, a: &ExplicitRelation, space: SpaceId) -> Vec<u64> {
        let others: Vec<SpaceId> = a.support.iter().filter(|&&s| s != space).copied().collect();
        let projected = self.exists(a, &others);
        if projected.support.is_empty() {
            return if projected.bits.is_empty() {
                Vec::new()
            } else {
                (0..self.space_cells(space)).collect()
            };
        }
        projected.bits.iter().map(|i| i as u64).collect()
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn setup() -> (ExplicitEngine, SpaceId, SpaceId, SpaceId) {
        let mut engine = ExplicitEngine::new();
        let x = engine.add_space(&[4]);
        let u = engine.add_space(&[2]);
        let y = engine.add_space(&[4]);
        (engine, x, u, y)
    }

    #[test]
    fn test_box_and_cells() {
        let mut engine = ExplicitEngine::new();
        let s = engine.add_space(&[3, 4]);
        let b = engine.cell_box(s, &[1, 1], &[2, 2]);
        // (1,1)=4 (2,1)=5 (1,2)=7 (2,2)=8
        assert_eq!(engine.cells(&b, s), vec![4, 5, 7, 8]);
        assert_eq!(engine.count(&b, &[s]), 4);
        assert!(engine.is_empty(&engine.cell_box(s, &[2, 0], &[1, 3])));
    }

    #[test]
    fn test_cylinder_semantics() {
        let (engine, x, u, _) = setup();
        let a = engine.cell(x, 1);
        let pair = engine.intersect(&a, &engine.cell(u, 0));
        assert_eq!(engine.count(&pair, &[x, u]), 1);
        assert_eq!(engine.count(&a, &[x, u]), 2);
        assert!(engine.is_subset(&pair, &a));
        assert!(!engine.is_subset(&a, &pair));

        let back = engine.union(&pair, &engine.intersect(&a, &engine.cell(u, 1)));
        assert!(engine.equal(&back, &a));
    }

    #[test]
    fn test_exists_and_restrict() {
        let (engine, x, u, y) = setup();
        let t = [(0, 0, 1), (0, 1, 2), (3, 1, 3)]
            .iter()
            .map(|&(a, b, c)| {
                let p = engine.intersect(&engine.cell(x, a), &engine.cell(u, b));
                engine.intersect(&p, &engine.cell(y, c))
            })
            .fold(engine.empty(), |acc, r| engine.union(&acc, &r));

        assert_eq!(engine.count(&t, &[x, u, y]), 3);
        assert_eq!(engine.cells(&t, x), vec![0, 3]);
        assert_eq!(engine.cells(&t, y), vec![1, 2, 3]);

        let from0 = engine.restrict(&t, x, 0);
        assert_eq!(engine.cells(&from0, u), vec![0, 1]);
        assert!(engine.contains(&t, &[(x, 3), (u, 1), (y, 3)]));
        assert!(!engine.contains(&t, &[(x, 3), (u, 0)]));

        let dom = engine.exists(&t, &[y]);
        assert_eq!(engine.count(&dom, &[x, u]), 3);
    }

    #[test]
    fn test_rename() {
        let (engine, x, u, y) = setup();
        let a = engine.intersect(&engine.cell(x, 2), &engine.cell(u, 1));
        let b = engine.rename(&a, x, y);
        assert_eq!(b.support(), &[u, y]);
        assert_eq!(engine.cells(&b, y), vec![2]);
        assert_eq!(engine.cells(&b, u), vec![1]);
    }

    #[test]
    fn test_complement_within_universe() {
        let (engine, x, _, _) = setup();
        let a = engine.cell_box(x, &[1], &[2]);
        let c = engine.complement(&a, &[x]);
        assert_eq!(engine.cells(&c, x), vec![0, 3]);
        assert!(engine.equal(&engine.union(&a, &c), &engine.universe(&[x])));
        assert!(engine.is_empty(&engine.intersect(&a, &c)));
    }
}
