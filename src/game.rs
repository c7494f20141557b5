//! Fixed-point game solvers over an abstract transition relation.
//!
//! All solvers iterate sets of `(state, input)` pairs until two consecutive
//! iterates are equal. While iterating, a controller is grown by adding only
//! the pairs of states that have no witness input yet, so every input a state
//! gets was found in the iteration that first made the state winning.

use log::{debug, info};

use crate::enf_pre::EnfPre;
use crate::error::{Error, Result};
use crate::relation::{space_size, RelationEngine};
use crate::transition::TransitionRelation;

/// Result of a safety, reachability or reach-and-stay game.
#[derive(Debug, Clone)]
pub struct Synthesis<R> {
    /// Winning states.
    pub winning: R,
    /// Admissible `(state, input)` pairs.
    pub controller: R,
    /// Number of iterations that changed an iterate.
    pub iterations: usize,
}

impl<R> Synthesis<R> {
    /// Fail with [`Error::EmptyWinningRegion`] if no state is winning.
    pub fn nonempty<E>(self, engine: &E) -> Result<Self>
    where
        E: RelationEngine<Relation = R>,
    {
        if engine.is_empty(&self.winning) {
            return Err(Error::EmptyWinningRegion);
        }
        Ok(self)
    }
}

/// Result of a recurrence game: one controller per target.
///
/// Controller `i` drives the system from the winning region to target `i`
/// while staying in the winning region.
#[derive(Debug, Clone)]
pub struct Recurrence<R> {
    pub winning: R,
    pub controllers: Vec<R>,
    /// Number of outer iterations that changed the winning region.
    pub iterations: usize,
}

pub struct GameSolver<'a, E: RelationEngine> {
    engine: &'a E,
    enf_pre: EnfPre<'a, E>,
    safe: Option<E::Relation>,
    /// All `(state, input)` pairs.
    pairs: E::Relation,
    max_iterations: usize,
}

impl<'a, E: RelationEngine> GameSolver<'a, E> {
    pub fn new(engine: &'a E, transitions: &TransitionRelation<E::Relation>) -> Self {
        let cells = space_size(engine.axis_cells(transitions.pre())) as usize;
        let pairs = engine.universe(&[transitions.pre(), transitions.input()]);
        Self {
            engine,
            enf_pre: EnfPre::new(engine, transitions.clone()),
            safe: None,
            pairs,
            max_iterations: cells.saturating_add(2),
        }
    }

    /// Remove every transition leaving a state outside `safe` and restrict
    /// all targets to `safe`.
    pub fn with_safe_states(self, safe: E::Relation) -> Self {
        let restricted = self.enf_pre.transitions().restrict_to_safe(self.engine, &safe);
        info!(
            "Safe mask keeps {} of {} transitions",
            restricted.transitions(),
            self.enf_pre.transitions().transitions()
        );
        Self {
            enf_pre: EnfPre::new(self.engine, restricted),
            safe: Some(safe),
            ..self
        }
    }

    pub fn enf_pre(&self) -> &EnfPre<'a, E> {
        &self.enf_pre
    }

    fn transitions(&self) -> &TransitionRelation<E::Relation> {
        self.enf_pre.transitions()
    }

    /// `(state, input)` pairs of the states in `states`, within the safe mask.
    fn target_pairs(&self, states: &E::Relation) -> E::Relation {
        let states = self.engine.exists(states, &[self.transitions().input()]);
        let pairs = self.engine.intersect(&states, &self.pairs);
        match &self.safe {
            Some(safe) => self.engine.intersect(&pairs, safe),
            None => pairs,
        }
    }

    fn states_of(&self, pairs: &E::Relation) -> E::Relation {
        self.engine.exists(pairs, &[self.transitions().input()])
    }

    fn check_bound(&self, iterations: usize, what: &str) {
        assert!(
            iterations <= self.max_iterations,
            "{} did not converge within {} iterations",
            what,
            self.max_iterations
        );
    }

    /// `μX. seed ∪ enfPre(X)` with witness-preserving controller accumulation.
    fn reach_from(&self, seed: &E::Relation, what: &str) -> (E::Relation, E::Relation, usize) {
        let engine = self.engine;
        let mut x = engine.empty();
        let mut controller = engine.empty();
        let mut iterations = 0;

        loop {
            let next = engine.union(&self.enf_pre.apply(&x), seed);
            if engine.equal(&next, &x) {
                break;
            }
            iterations += 1;
            self.check_bound(iterations, what);

            let known = self.states_of(&controller);
            let fresh = engine.difference(&next, &known);
            controller = engine.union(&controller, &fresh);
            x = next;
            debug!(
                "{} iteration {}: {} pairs",
                what,
                iterations,
                engine.count(&x, &[self.transitions().pre(), self.transitions().input()])
            );
        }

        (x, controller, iterations)
    }

    /// `νY. (enfPre(Y) ∩ target) ∪ exit`, starting from all pairs.
    fn invariant(&self, target: &E::Relation, exit: &E::Relation, what: &str) -> (E::Relation, usize) {
        let engine = self.engine;
        let mut y = self.pairs.clone();
        let mut iterations = 0;

        loop {
            let next = engine.union(&engine.intersect(&self.enf_pre.apply(&y), target), exit);
            if engine.equal(&next, &y) {
                break;
            }
            iterations += 1;
            self.check_bound(iterations, what);
            y = next;
            debug!(
                "{} iteration {}: {} pairs",
                what,
                iterations,
                engine.count(&y, &[self.transitions().pre(), self.transitions().input()])
            );
        }

        (y, iterations)
    }

    /// Largest set of pairs keeping the play inside `safe` forever.
    pub fn safety(&self, safe: &E::Relation) -> Synthesis<E::Relation> {
        let safe = self.target_pairs(safe);
        let (x, iterations) = self.invariant(&safe, &self.engine.empty(), "safety");
        info!("Safety converged after {} iterations", iterations);
        Synthesis {
            winning: self.states_of(&x),
            controller: x,
            iterations,
        }
    }

    /// Reach `target` while respecting the safe mask.
    pub fn reach(&self, target: &E::Relation) -> Synthesis<E::Relation> {
        let seed = self.target_pairs(target);
        let (x, controller, iterations) = self.reach_from(&seed, "reach");
        info!("Reach converged after {} iterations", iterations);
        Synthesis {
            winning: self.states_of(&x),
            controller,
            iterations,
        }
    }

    /// Eventually reach `target` and stay there forever.
    ///
    /// Nested fixed point `μX. νY. (enfPre(Y) ∩ target) ∪ enfPre(X)`: the
    /// inner loop is rerun for every outer iterate, so a play may pass through
    /// the target and leave it finitely often before settling. The controller
    /// keeps the first witness of every state, as in [`GameSolver::reach`].
    pub fn reach_and_stay(&self, target: &E::Relation) -> Synthesis<E::Relation> {
        let engine = self.engine;
        let target = self.target_pairs(target);

        let mut x = engine.empty();
        let mut controller = engine.empty();
        let mut iterations = 0;
        let mut outer = 0;

        loop {
            let exit = self.enf_pre.apply(&x);
            let (next, inner) = self.invariant(&target, &exit, "stay");
            iterations += inner;
            if engine.equal(&next, &x) {
                break;
            }
            outer += 1;
            iterations += 1;
            self.check_bound(outer, "reach-and-stay");

            let known = self.states_of(&controller);
            let fresh = engine.difference(&next, &known);
            controller = engine.union(&controller, &fresh);
            x = next;
            debug!(
                "reach-and-stay outer iteration {}: {} states",
                outer,
                engine.count(&self.states_of(&x), &[self.transitions().pre()])
            );
        }

        info!("Reach-and-stay converged after {} outer iterations", outer);
        Synthesis {
            winning: self.states_of(&x),
            controller,
            iterations,
        }
    }

    /// Visit every target infinitely often.
    ///
    /// Outer greatest fixed point over the winning states `Z`; for each
    /// target an inner least fixed point reaches `target ∩ enfPre(Z)`.
    /// The next `Z` intersects the states of the inner results, not their
    /// `(state, input)` pairs, so differing witness inputs do not drop a state.
    /// Controllers are rebuilt from scratch on every outer iteration.
    pub fn recurrence(&self, targets: &[E::Relation]) -> Recurrence<E::Relation> {
        let engine = self.engine;
        let pre = self.transitions().pre();
        let targets: Vec<E::Relation> = targets.iter().map(|t| self.target_pairs(t)).collect();

        let mut z = engine.universe(&[pre]);
        let mut controllers = vec![engine.empty(); targets.len()];
        let mut iterations = 0;

        loop {
            let pre_z = self.enf_pre.apply(&z);
            let mut next = engine.universe(&[pre]);
            for (i, target) in targets.iter().enumerate() {
                let seed = engine.intersect(target, &pre_z);
                let (y, controller, inner) = self.reach_from(&seed, "recurrence");
                debug!("Target {} reached after {} iterations", i, inner);
                controllers[i] = controller;
                next = engine.intersect(&next, &self.states_of(&y));
            }

            if engine.equal(&next, &z) {
                break;
            }
            iterations += 1;
            self.check_bound(iterations, "recurrence");
            z = next;
            debug!("recurrence outer iteration {}: {} states", iterations, engine.count(&z, &[pre]));
        }

        info!("Recurrence converged after {} outer iterations", iterations);
        Recurrence {
            winning: z,
            controllers,
            iterations,
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::explicit::ExplicitEngine;
    use crate::relation::SpaceId;
    use crate::symbolic::BddEngine;

    struct Setup<E: RelationEngine> {
        engine: E,
        x: SpaceId,
        u: SpaceId,
        y: SpaceId,
    }

    fn setup<E: RelationEngine>(mut engine: E, states: u64, inputs: u64) -> Setup<E> {
        let x = engine.add_space(&[states]);
        let u = engine.add_space(&[inputs]);
        let y = engine.add_space(&[states]);
        Setup { engine, x, u, y }
    }

    fn check_safety<E: RelationEngine>(engine: E) {
        let s = setup(engine, 5, 2);
        let e = &s.engine;
        // 0 <-> 1 under u0; 1 -u1-> 2 -> 3 -> 4 (dead end); 2 -u1-> 0.
        let t = TransitionRelation::from_triples(
            e,
            s.x,
            s.u,
            s.y,
            [(0, 0, 1), (1, 0, 0), (1, 1, 2), (2, 0, 3), (2, 1, 0), (3, 0, 4)],
        );
        let solver = GameSolver::new(e, &t);
        let safe = e.complement(&e.cell(s.x, 4), &[s.x]);
        let res = solver.safety(&safe);

        assert_eq!(e.cells(&res.winning, s.x), vec![0, 1, 2]);
        assert!(e.contains(&res.controller, &[(s.x, 2), (s.u, 1)]));
        assert!(!e.contains(&res.controller, &[(s.x, 2), (s.u, 0)]));
        assert!(e.contains(&res.controller, &[(s.x, 1), (s.u, 1)]));
        assert!(res.nonempty(e).is_ok());
    }

    #[test]
    fn test_safety_explicit() {
        check_safety(ExplicitEngine::new());
    }

    #[test]
    fn test_safety_bdd() {
        check_safety(BddEngine::default());
    }

    fn check_reach_keeps_first_witness<E: RelationEngine>(engine: E) {
        let s = setup(engine, 4, 2);
        let e = &s.engine;
        // 0 -u0-> 3 directly, 0 -u1-> 1 -> 2 -> 3.
        let t = TransitionRelation::from_triples(e, s.x, s.u, s.y, [(0, 0, 3), (0, 1, 1), (1, 0, 2), (2, 0, 3)]);
        let res = GameSolver::new(e, &t).reach(&e.cell(s.x, 3));

        assert_eq!(e.cells(&res.winning, s.x), vec![0, 1, 2, 3]);
        assert!(e.contains(&res.controller, &[(s.x, 0), (s.u, 0)]));
        // u1 becomes enforceable for 0 later, after 0 already has a witness.
        assert!(!e.contains(&res.controller, &[(s.x, 0), (s.u, 1)]));
        assert_eq!(res.iterations, 4);
    }

    #[test]
    fn test_reach_keeps_first_witness_explicit() {
        check_reach_keeps_first_witness(ExplicitEngine::new());
    }

    #[test]
    fn test_reach_keeps_first_witness_bdd() {
        check_reach_keeps_first_witness(BddEngine::default());
    }

    fn check_reach_and_stay<E: RelationEngine>(engine: E) {
        let s = setup(engine, 4, 1);
        let e = &s.engine;
        // 0 -> 1 -> 2 <-> 3 and target {1, 2, 3}, which 1, 2 and 3 never leave.
        let t = TransitionRelation::from_triples(e, s.x, s.u, s.y, [(0, 0, 1), (1, 0, 2), (2, 0, 3), (3, 0, 2)]);
        let target = e.cell_box(s.x, &[1], &[3]);
        let res = GameSolver::new(e, &t).reach_and_stay(&target);
        assert_eq!(e.cells(&res.winning, s.x), vec![0, 1, 2, 3]);

        // Leaving the target for good is not allowed.
        let t = TransitionRelation::from_triples(e, s.x, s.u, s.y, [(0, 0, 1), (1, 0, 2), (2, 0, 3), (3, 0, 0)]);
        let res = GameSolver::new(e, &t).reach_and_stay(&target);
        assert!(e.is_empty(&res.winning));
        assert!(matches!(res.nonempty(e), Err(Error::EmptyWinningRegion)));

        // 0 may leave the target once, through 1, before settling in 2.
        let t = TransitionRelation::from_triples(e, s.x, s.u, s.y, [(0, 0, 0), (0, 0, 1), (1, 0, 2), (2, 0, 2)]);
        let target = e.union(&e.cell(s.x, 0), &e.cell(s.x, 2));
        let res = GameSolver::new(e, &t).reach_and_stay(&target);
        assert_eq!(e.cells(&res.winning, s.x), vec![0, 1, 2]);
    }

    #[test]
    fn test_reach_and_stay_explicit() {
        check_reach_and_stay(ExplicitEngine::new());
    }

    #[test]
    fn test_reach_and_stay_bdd() {
        check_reach_and_stay(BddEngine::default());
    }

    #[test]
    fn test_safe_mask_blocks_shortcut() {
        let s = setup(ExplicitEngine::new(), 4, 2);
        let e = &s.engine;
        // 0 -u0-> 1 -> 3 (through unsafe 1), 0 -u1-> 2 -> 3.
        let t = TransitionRelation::from_triples(e, s.x, s.u, s.y, [(0, 0, 1), (0, 1, 2), (1, 0, 3), (2, 0, 3)]);
        let safe = e.complement(&e.cell(s.x, 1), &[s.x]);
        let res = GameSolver::new(e, &t).with_safe_states(safe).reach(&e.cell(s.x, 3));

        assert_eq!(e.cells(&res.winning, s.x), vec![0, 2, 3]);
        assert!(e.contains(&res.controller, &[(s.x, 0), (s.u, 1)]));
        assert!(!e.contains(&res.controller, &[(s.x, 0), (s.u, 0)]));
    }
}
