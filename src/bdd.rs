//! Reduced ordered BDD manager with complement edges.
//!
//! All operations go through [`Bdd`]. Nodes are hash-consed in a unique table,
//! so for a fixed variable order every function has exactly one [`Ref`] and
//! set equality of relations is plain reference equality.
//!
//! Variables are 1-indexed and ordered by their index: variable 1 is closest
//! to the root. The terminal reports the variable [`Bdd::TERMINAL_VAR`], which
//! sorts after every real variable.
//!
//! Canonicity with complement edges is kept by never storing a complemented
//! high edge: `mk_node` pushes the complement up to the incoming reference.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Debug;

use log::debug;
use num_bigint::BigUint;

use crate::cache::{Cache, OpKey};
use crate::reference::Ref;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
struct Node {
    variable: u32,
    low: Ref,
    high: Ref,
}

pub struct Bdd {
    nodes: RefCell<Vec<Node>>,
    unique: RefCell<HashMap<Node, u32>>,
    cache: RefCell<Cache<OpKey, Ref>>,
    num_vars: Cell<u32>,
}

impl Bdd {
    pub const TERMINAL_VAR: u32 = u32::MAX;

    /// Create a manager whose computed table has `2^cache_bits` slots.
    pub fn new(cache_bits: usize) -> Self {
        let terminal = Node {
            variable: Self::TERMINAL_VAR,
            low: Ref::ONE,
            high: Ref::ONE,
        };
        Self {
            nodes: RefCell::new(vec![terminal]),
            unique: RefCell::new(HashMap::new()),
            cache: RefCell::new(Cache::new(cache_bits)),
            num_vars: Cell::new(0),
        }
    }
}

impl Default for Bdd {
    fn default() -> Self {
        Bdd::new(18)
    }
}

impl Debug for Bdd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cache = self.cache.borrow();
        f.debug_struct("Bdd")
            .field("num_vars", &self.num_vars.get())
            .field("nodes", &self.num_nodes())
            .field("cache_hits", &cache.hits())
            .field("cache_misses", &cache.misses())
            .finish()
    }
}

impl Bdd {
    pub fn zero(&self) -> Ref {
        Ref::ZERO
    }
    pub fn one(&self) -> Ref {
        Ref::ONE
    }
    pub fn is_zero(&self, f: Ref) -> bool {
        f == Ref::ZERO
    }
    pub fn is_one(&self, f: Ref) -> bool {
        f == Ref::ONE
    }

    /// Number of variables allocated so far.
    pub fn num_vars(&self) -> u32 {
        self.num_vars.get()
    }

    /// Allocate `count` fresh variables and return their indices.
    pub fn new_vars(&self, count: usize) -> Vec<u32> {
        let first = self.num_vars.get() + 1;
        let vars: Vec<u32> = (first..first + count as u32).collect();
        self.num_vars.set(self.num_vars.get() + count as u32);
        vars
    }

    /// Total number of nodes in the manager, terminal included.
    pub fn num_nodes(&self) -> usize {
        self.nodes.borrow().len()
    }

    /// Top variable of `f`, or [`Bdd::TERMINAL_VAR`] for constants.
    pub fn variable(&self, f: Ref) -> u32 {
        self.nodes.borrow()[f.index() as usize].variable
    }

    /// Shannon cofactors `(f|v=0, f|v=1)` with respect to a variable at or
    /// above the top of `f`.
    pub fn cofactors(&self, f: Ref, v: u32) -> (Ref, Ref) {
        let node = self.nodes.borrow()[f.index() as usize];
        if node.variable != v {
            debug_assert!(v < node.variable, "Variable {} is below the top of {}", v, f);
            return (f, f);
        }
        if f.is_negated() {
            (-node.low, -node.high)
        } else {
            (node.low, node.high)
        }
    }

    pub fn mk_node(&self, v: u32, low: Ref, high: Ref) -> Ref {
        assert!(v != 0 && v != Self::TERMINAL_VAR, "Invalid variable {}", v);

        if low == high {
            return low;
        }
        if high.is_negated() {
            return -self.mk_node(v, -low, -high);
        }

        let node = Node {
            variable: v,
            low,
            high,
        };
        if let Some(&index) = self.unique.borrow().get(&node) {
            return Ref::positive(index);
        }

        let mut nodes = self.nodes.borrow_mut();
        let index = nodes.len() as u32;
        nodes.push(node);
        self.unique.borrow_mut().insert(node, index);
        Ref::positive(index)
    }

    pub fn mk_var(&self, v: u32) -> Ref {
        self.mk_node(v, Ref::ZERO, Ref::ONE)
    }

    /// If-then-else: `(f ∧ g) ∨ (¬f ∧ h)`.
    pub fn apply_ite(&self, f: Ref, g: Ref, h: Ref) -> Ref {
        // Terminal cases
        if f == Ref::ONE {
            return g;
        }
        if f == Ref::ZERO {
            return h;
        }

        // ite(F,F,H) => ite(F,1,H), ite(F,~F,H) => ite(F,0,H), and symmetric for H
        let g = if g == f {
            Ref::ONE
        } else if g == -f {
            Ref::ZERO
        } else {
            g
        };
        let h = if h == f {
            Ref::ZERO
        } else if h == -f {
            Ref::ONE
        } else {
            h
        };

        if g == h {
            return g;
        }
        if g == Ref::ONE && h == Ref::ZERO {
            return f;
        }
        if g == Ref::ZERO && h == Ref::ONE {
            return -f;
        }

        // Keep F and G regular so that equivalent calls share one cache entry:
        //   ite(~F,G,H) => ite(F,H,G)
        //   ite(F,~G,H) => ~ite(F,G,~H)
        let (mut f, mut g, mut h) = (f, g, h);
        if f.is_negated() {
            f = -f;
            std::mem::swap(&mut g, &mut h);
        }
        let negate = g.is_negated();
        if negate {
            g = -g;
            h = -h;
        }

        let key = OpKey::Ite(f, g, h);
        if let Some(res) = self.cache.borrow().get(&key) {
            return if negate { -res } else { res };
        }

        let m = self
            .variable(f)
            .min(self.variable(g))
            .min(self.variable(h));

        let (f0, f1) = self.cofactors(f, m);
        let (g0, g1) = self.cofactors(g, m);
        let (h0, h1) = self.cofactors(h, m);

        let t = self.apply_ite(f1, g1, h1);
        let e = self.apply_ite(f0, g0, h0);
        let res = self.mk_node(m, e, t);
        self.cache.borrow_mut().insert(key, res);

        if negate {
            -res
        } else {
            res
        }
    }

    pub fn apply_not(&self, f: Ref) -> Ref {
        -f
    }

    pub fn apply_and(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, v, Ref::ZERO)
    }

    pub fn apply_or(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, Ref::ONE, v)
    }

    /// `u ∧ ¬v`
    pub fn apply_diff(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(v, Ref::ZERO, u)
    }

    pub fn apply_and_many(&self, nodes: impl IntoIterator<Item = Ref>) -> Ref {
        let mut res = Ref::ONE;
        for node in nodes {
            res = self.apply_and(res, node);
            if res == Ref::ZERO {
                break;
            }
        }
        res
    }

    /// Existential quantification of `vars` (sorted ascending) out of `f`.
    pub fn exists(&self, f: Ref, vars: &[u32]) -> Ref {
        debug_assert!(vars.windows(2).all(|w| w[0] < w[1]), "vars must be sorted");
        let mut cache = HashMap::new();
        self.exists_(f, vars, &mut cache)
    }

    fn exists_(&self, f: Ref, vars: &[u32], cache: &mut HashMap<Ref, Ref>) -> Ref {
        if f.is_terminal() {
            return f;
        }

        let v = self.variable(f);
        let vars = &vars[vars.partition_point(|&x| x < v)..];
        if vars.is_empty() {
            return f;
        }

        if let Some(&res) = cache.get(&f) {
            return res;
        }

        let (f0, f1) = self.cofactors(f, v);
        let e = self.exists_(f0, vars, cache);
        let res = if vars[0] == v && e == Ref::ONE {
            // ∃v. f = f0 ∨ f1, which is already true.
            Ref::ONE
        } else {
            let t = self.exists_(f1, vars, cache);
            if vars[0] == v {
                self.apply_or(e, t)
            } else {
                self.mk_node(v, e, t)
            }
        };
        cache.insert(f, res);
        res
    }

    /// Cofactor of `f` with respect to a partial assignment.
    pub fn restrict(&self, f: Ref, values: &HashMap<u32, bool>) -> Ref {
        let mut cache = HashMap::new();
        self.restrict_(f, values, &mut cache)
    }

    fn restrict_(&self, f: Ref, values: &HashMap<u32, bool>, cache: &mut HashMap<Ref, Ref>) -> Ref {
        if f.is_terminal() || values.is_empty() {
            return f;
        }
        if let Some(&res) = cache.get(&f) {
            return res;
        }

        let v = self.variable(f);
        let (f0, f1) = self.cofactors(f, v);
        let res = match values.get(&v) {
            Some(true) => self.restrict_(f1, values, cache),
            Some(false) => self.restrict_(f0, values, cache),
            None => {
                let low = self.restrict_(f0, values, cache);
                let high = self.restrict_(f1, values, cache);
                self.mk_node(v, low, high)
            }
        };
        cache.insert(f, res);
        res
    }

    /// Substitute variables according to `map`; unmapped variables stay.
    ///
    /// The result is rebuilt with `ite`, so the map does not need to preserve
    /// the variable order.
    pub fn rename(&self, f: Ref, map: &HashMap<u32, u32>) -> Ref {
        let mut cache = HashMap::new();
        self.rename_(f, map, &mut cache)
    }

    fn rename_(&self, f: Ref, map: &HashMap<u32, u32>, cache: &mut HashMap<Ref, Ref>) -> Ref {
        if f.is_terminal() {
            return f;
        }
        if let Some(&res) = cache.get(&f) {
            return res;
        }

        let v = self.variable(f);
        let (f0, f1) = self.cofactors(f, v);
        let e = self.rename_(f0, map, cache);
        let t = self.rename_(f1, map, cache);
        let target = map.get(&v).copied().unwrap_or(v);
        let res = self.apply_ite(self.mk_var(target), t, e);
        cache.insert(f, res);
        res
    }

    /// Unsigned comparison `lo <= x <= hi`, where `x` is the binary number
    /// spelled by `vars` (most significant bit first, ascending indices).
    pub fn mk_range(&self, vars: &[u32], lo: u64, hi: u64) -> Ref {
        debug!("mk_range(vars = {:?}, lo = {}, hi = {})", vars, lo, hi);
        if lo > hi {
            return Ref::ZERO;
        }
        let ge = self.mk_ge(vars, lo);
        let le = self.mk_le(vars, hi);
        self.apply_and(ge, le)
    }

    fn exceeds_width(vars: &[u32], c: u64) -> bool {
        vars.len() < 64 && (c >> vars.len()) != 0
    }

    fn mk_le(&self, vars: &[u32], c: u64) -> Ref {
        if Self::exceeds_width(vars, c) {
            return Ref::ONE;
        }
        let mut f = Ref::ONE;
        for (bit, &v) in vars.iter().rev().enumerate() {
            f = if (c >> bit) & 1 == 1 {
                self.mk_node(v, Ref::ONE, f)
            } else {
                self.mk_node(v, f, Ref::ZERO)
            };
        }
        f
    }

    fn mk_ge(&self, vars: &[u32], c: u64) -> Ref {
        if Self::exceeds_width(vars, c) {
            return Ref::ZERO;
        }
        let mut f = Ref::ONE;
        for (bit, &v) in vars.iter().rev().enumerate() {
            f = if (c >> bit) & 1 == 1 {
                self.mk_node(v, Ref::ZERO, f)
            } else {
                self.mk_node(v, f, Ref::ONE)
            };
        }
        f
    }

    /// Number of satisfying assignments over variables `1..=num_vars`.
    pub fn sat_count(&self, f: Ref, num_vars: u32) -> BigUint {
        let max = BigUint::from(1u32) << num_vars as usize;
        let mut cache = HashMap::new();
        self.sat_count_(f, &max, &mut cache)
    }

    fn sat_count_(&self, f: Ref, max: &BigUint, cache: &mut HashMap<u32, BigUint>) -> BigUint {
        if f == Ref::ZERO {
            return BigUint::ZERO;
        }
        if f == Ref::ONE {
            return max.clone();
        }

        let index = f.index();
        let count = match cache.get(&index) {
            Some(count) => count.clone(),
            None => {
                let node = self.nodes.borrow()[index as usize];
                let count_low = self.sat_count_(node.low, max, cache);
                let count_high = self.sat_count_(node.high, max, cache);
                let count: BigUint = (count_low + count_high) >> 1;
                cache.insert(index, count.clone());
                count
            }
        };

        if f.is_negated() {
            max - count
        } else {
            count
        }
    }

    /// Indices of all nodes reachable from `roots`, terminal included.
    pub fn descendants(&self, roots: impl IntoIterator<Item = Ref>) -> HashSet<u32> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from_iter(roots);

        while let Some(f) = queue.pop_front() {
            if visited.insert(f.index()) && !f.is_terminal() {
                let node = self.nodes.borrow()[f.index() as usize];
                queue.push_back(node.low);
                queue.push_back(node.high);
            }
        }

        visited
    }

    /// Number of nodes in the diagram of `f`, terminal included.
    pub fn size(&self, f: Ref) -> usize {
        self.descendants([f]).len()
    }

    pub fn to_bracket_string(&self, f: Ref) -> String {
        if f == Ref::ZERO {
            return "(0)".to_string();
        }
        if f == Ref::ONE {
            return "(1)".to_string();
        }
        let v = self.variable(f);
        let (low, high) = self.cofactors(f, v);
        format!(
            "{}:(x{}, {}, {})",
            f,
            v,
            self.to_bracket_string(high),
            self.to_bracket_string(low)
        )
    }
}
