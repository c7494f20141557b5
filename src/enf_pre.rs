//! The enforceable predecessor operator.

use crate::relation::RelationEngine;
use crate::transition::TransitionRelation;

/// `enfPre(target)`: the `(state, input)` pairs that have at least one
/// successor and all of whose successors lie in `target`.
pub struct EnfPre<'a, E: RelationEngine> {
    engine: &'a E,
    transitions: TransitionRelation<E::Relation>,
    /// Pairs with at least one successor.
    domain: E::Relation,
}

impl<'a, E: RelationEngine> EnfPre<'a, E> {
    pub fn new(engine: &'a E, transitions: TransitionRelation<E::Relation>) -> Self {
        assert_eq!(
            engine.axis_cells(transitions.pre()),
            engine.axis_cells(transitions.post()),
            "Pre and post spaces must share a layout"
        );
        let domain = engine.exists(transitions.relation(), &[transitions.post()]);
        Self {
            engine,
            transitions,
            domain,
        }
    }

    pub fn engine(&self) -> &'a E {
        self.engine
    }

    pub fn transitions(&self) -> &TransitionRelation<E::Relation> {
        &self.transitions
    }

    /// Pairs over `(pre, input)` with at least one successor.
    pub fn domain(&self) -> &E::Relation {
        &self.domain
    }

    /// `target` may mention inputs; they are projected away first.
    pub fn apply(&self, target: &E::Relation) -> E::Relation {
        let engine = self.engine;
        let t = &self.transitions;

        let states = engine.exists(target, &[t.input()]);
        let next = engine.rename(&states, t.pre(), t.post());
        let escaping = engine.difference(t.relation(), &next);
        let losing = engine.exists(&escaping, &[t.post()]);
        engine.difference(&self.domain, &losing)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::explicit::ExplicitEngine;
    use crate::relation::SpaceId;
    use crate::symbolic::BddEngine;

    fn system<E: RelationEngine>(engine: &mut E) -> (SpaceId, SpaceId, TransitionRelation<E::Relation>) {
        let x = engine.add_space(&[4]);
        let u = engine.add_space(&[2]);
        let y = engine.add_space(&[4]);
        // 0 -u0-> {1}, 0 -u1-> {1, 2}, 1 -u0-> {3}, 2 -u0-> {2}, 3 has no moves.
        let t = TransitionRelation::from_triples(engine, x, u, y, [(0, 0, 1), (0, 1, 1), (0, 1, 2), (1, 0, 3), (2, 0, 2)]);
        (x, u, t)
    }

    fn check_enf_pre<E: RelationEngine>(mut engine: E) {
        let (x, u, t) = system(&mut engine);
        let op = EnfPre::new(&engine, t);

        let target = engine.union(&engine.cell(x, 1), &engine.cell(x, 3));
        let pre = op.apply(&target);
        assert!(engine.contains(&pre, &[(x, 0), (u, 0)]));
        assert!(!engine.contains(&pre, &[(x, 0), (u, 1)]));
        assert!(engine.contains(&pre, &[(x, 1), (u, 0)]));
        assert_eq!(engine.count(&pre, &[x, u]), 2);

        // State 3 has no successors, so it never appears, even vacuously.
        let all = op.apply(&engine.universe(&[x]));
        assert!(!engine.contains(&all, &[(x, 3)]));
        assert!(engine.equal(&all, op.domain()));

        // Monotone in the target.
        let smaller = engine.cell(x, 1);
        assert!(engine.is_subset(&op.apply(&smaller), &pre));
        assert!(engine.is_empty(&op.apply(&engine.empty())));

        // Inputs in the target are ignored.
        let with_input = engine.intersect(&target, &engine.cell(u, 1));
        assert!(engine.equal(&op.apply(&with_input), &pre));
    }

    #[test]
    fn test_enf_pre_explicit() {
        check_enf_pre(ExplicitEngine::new());
    }

    #[test]
    fn test_enf_pre_bdd() {
        check_enf_pre(BddEngine::default());
    }
}
