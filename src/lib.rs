//! # symbolic-control: abstraction-based controller synthesis
//!
//! **`symbolic-control`** turns a sampled continuous system into a finite
//! transition system on a uniform grid and synthesizes a maximal controller
//! for safety, reachability, reach-and-stay and recurrence objectives.
//!
//! ## How it works
//!
//! 1. Quantize the state and input domains with [`UniformGrid`][crate::grid::UniformGrid]s
//!    and bind each to a space of a relation engine as a
//!    [`SymbolicAlphabet`][crate::alphabet::SymbolicAlphabet].
//! 2. Build the abstract transition relation with a
//!    [`GrowthBoundTransitionBuilder`][crate::transition::GrowthBoundTransitionBuilder]:
//!    every cell centre is advanced one sampling period, and the half-cell radius
//!    is advanced by a growth bound, which over-approximates the reachable set.
//! 3. Solve a game with the [`GameSolver`][crate::game::GameSolver]. All
//!    games iterate the enforceable predecessor [`EnfPre`][crate::enf_pre::EnfPre]
//!    to a fixed point.
//! 4. Wrap the result in a [`Controller`][crate::controller::Controller] to
//!    query admissible inputs at a point, or save it to a text file.
//!
//! Sets and relations go through the [`RelationEngine`][crate::relation::RelationEngine]
//! trait. [`ExplicitEngine`][crate::explicit::ExplicitEngine] stores them as
//! bit sets, [`BddEngine`][crate::symbolic::BddEngine] as binary decision
//! diagrams built with the [`Bdd`][crate::bdd::Bdd] manager. Both compute the
//! same sets.
//!
//! ## Basic Usage
//!
//! ```rust
//! use symbolic_control::explicit::ExplicitEngine;
//! use symbolic_control::game::GameSolver;
//! use symbolic_control::relation::RelationEngine;
//! use symbolic_control::transition::TransitionRelation;
//!
//! let mut engine = ExplicitEngine::new();
//! let x = engine.add_space(&[3]);
//! let u = engine.add_space(&[1]);
//! let y = engine.add_space(&[3]);
//!
//! // 0 -> 1 -> 2 -> 2
//! let t = TransitionRelation::from_triples(&engine, x, u, y, [(0, 0, 1), (1, 0, 2), (2, 0, 2)]);
//! let res = GameSolver::new(&engine, &t).reach(&engine.cell(x, 2));
//!
//! assert_eq!(engine.cells(&res.winning, x), vec![0, 1, 2]);
//! assert_eq!(res.iterations, 3);
//! ```

pub mod alphabet;
pub mod bdd;
pub mod bitset;
pub mod cache;
pub mod controller;
pub mod dynamics;
pub mod enf_pre;
pub mod error;
pub mod explicit;
pub mod game;
pub mod grid;
pub mod models;
pub mod reference;
pub mod relation;
pub mod symbolic;
pub mod transition;
