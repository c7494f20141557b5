//! Synthesized controllers, their queries and their text format.
//!
//! The text format is line oriented. Lines starting with `c` are comments.
//! The state grid and the input grid come first, each as a `grid` line
//! followed by `lower`, `eta` and `cells` lines; then a `pairs` count and one
//! `pair <state> <input>` line per admissible pair:
//!
//! ```text
//! c symbolic controller
//! grid state 1
//! lower 0
//! eta 1
//! cells 10
//! grid input 1
//! lower -2
//! eta 2
//! cells 2
//! pairs 2
//! pair 3 1
//! pair 4 1
//! ```

use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use log::{debug, info};

use crate::alphabet::SymbolicAlphabet;
use crate::error::{Error, Result};
use crate::grid::UniformGrid;
use crate::relation::RelationEngine;

/// Admissible `(state, input)` pairs together with the grids they index.
#[derive(Debug, Clone)]
pub struct Controller<R> {
    states: SymbolicAlphabet,
    inputs: SymbolicAlphabet,
    relation: R,
}

impl<R: Clone> Controller<R> {
    pub fn new(states: SymbolicAlphabet, inputs: SymbolicAlphabet, relation: R) -> Self {
        Self {
            states,
            inputs,
            relation,
        }
    }

    pub fn states(&self) -> &SymbolicAlphabet {
        &self.states
    }

    pub fn inputs(&self) -> &SymbolicAlphabet {
        &self.inputs
    }

    pub fn relation(&self) -> &R {
        &self.relation
    }

    /// States with at least one admissible input.
    pub fn domain<E>(&self, engine: &E) -> R
    where
        E: RelationEngine<Relation = R>,
    {
        engine.exists(&self.relation, &[self.inputs.space()])
    }

    pub fn domain_size<E>(&self, engine: &E) -> u64
    where
        E: RelationEngine<Relation = R>,
    {
        self.states.size_of(engine, &self.domain(engine))
    }

    /// Admissible inputs (as cell centres) at the state containing `point`.
    ///
    /// Empty if the point is in the domain of the grid but not winning.
    pub fn restriction<E>(&self, engine: &E, point: &[f64]) -> Result<Vec<Vec<f64>>>
    where
        E: RelationEngine<Relation = R>,
    {
        let state = self.states.cell_index_of(point)?;
        let inputs = engine.restrict(&self.relation, self.states.space(), state);
        Ok(self.inputs.points_of(engine, &inputs))
    }

    /// All `(state, input)` index pairs, ordered by state then input.
    pub fn pairs<E>(&self, engine: &E) -> Vec<(u64, u64)>
    where
        E: RelationEngine<Relation = R>,
    {
        let mut pairs = Vec::new();
        for state in self.states.cells_of(engine, &self.domain(engine)) {
            let inputs = engine.restrict(&self.relation, self.states.space(), state);
            for input in self.inputs.cells_of(engine, &inputs) {
                pairs.push((state, input));
            }
        }
        pairs
    }

    pub fn to_text<E>(&self, engine: &E) -> String
    where
        E: RelationEngine<Relation = R>,
    {
        let mut output = String::new();
        writeln!(output, "c symbolic controller").unwrap();
        write_grid(&mut output, "state", self.states.grid());
        write_grid(&mut output, "input", self.inputs.grid());
        let pairs = self.pairs(engine);
        writeln!(output, "pairs {}", pairs.len()).unwrap();
        for (state, input) in pairs {
            writeln!(output, "pair {} {}", state, input).unwrap();
        }
        output
    }

    pub fn write_to<E, W>(&self, engine: &E, mut w: W) -> Result<()>
    where
        E: RelationEngine<Relation = R>,
        W: Write,
    {
        w.write_all(self.to_text(engine).as_bytes())?;
        Ok(())
    }

    pub fn save<E, P>(&self, engine: &E, path: P) -> Result<()>
    where
        E: RelationEngine<Relation = R>,
        P: AsRef<Path>,
    {
        fs::write(path.as_ref(), self.to_text(engine))?;
        info!("Controller written to {}", path.as_ref().display());
        Ok(())
    }

    /// Parse a controller, declaring fresh state and input spaces in `engine`.
    pub fn read_from<E, B>(engine: &mut E, r: B) -> Result<Self>
    where
        E: RelationEngine<Relation = R>,
        B: BufRead,
    {
        let mut lines = Lines::new(r);

        let state_grid = read_grid(&mut lines, "state")?;
        let input_grid = read_grid(&mut lines, "input")?;
        let states = SymbolicAlphabet::new(engine, state_grid);
        let inputs = SymbolicAlphabet::new(engine, input_grid);

        let (line, fields) = lines.expect("pairs")?;
        let count: u64 = parse_field(line, &fields, 1)?;

        let mut relation = engine.empty();
        for _ in 0..count {
            let (line, fields) = lines.expect("pair")?;
            let state: u64 = parse_field(line, &fields, 1)?;
            let input: u64 = parse_field(line, &fields, 2)?;
            if state >= states.cell_count() || input >= inputs.cell_count() {
                return Err(Error::Parse {
                    line,
                    message: format!("pair ({}, {}) is outside the grids", state, input),
                });
            }
            let pair = engine.intersect(&states.cell(engine, state), &inputs.cell(engine, input));
            relation = engine.union(&relation, &pair);
        }
        debug!("Read controller with {} pairs", count);

        Ok(Self::new(states, inputs, relation))
    }

    pub fn load<E, P>(engine: &mut E, path: P) -> Result<Self>
    where
        E: RelationEngine<Relation = R>,
        P: AsRef<Path>,
    {
        Self::read_from(engine, BufReader::new(File::open(path)?))
    }
}

fn write_grid(output: &mut String, name: &str, grid: &UniformGrid) {
    let join = |values: Vec<String>| values.join(" ");
    writeln!(output, "grid {} {}", name, grid.dim()).unwrap();
    writeln!(output, "lower {}", join(grid.lower().iter().map(|v| v.to_string()).collect())).unwrap();
    writeln!(output, "eta {}", join(grid.eta().iter().map(|v| v.to_string()).collect())).unwrap();
    writeln!(output, "cells {}", join(grid.cells_per_axis().iter().map(|v| v.to_string()).collect())).unwrap();
}

fn read_grid<B: BufRead>(lines: &mut Lines<B>, name: &str) -> Result<UniformGrid> {
    let (line, fields) = lines.expect("grid")?;
    if fields.get(1).map(String::as_str) != Some(name) {
        return Err(Error::Parse {
            line,
            message: format!("expected the {} grid", name),
        });
    }
    let dim: usize = parse_field(line, &fields, 2)?;

    let mut vector = |key: &str| -> Result<Vec<f64>> {
        let (line, fields) = lines.expect(key)?;
        if fields.len() != dim + 1 {
            return Err(Error::Parse {
                line,
                message: format!("expected {} values after '{}'", dim, key),
            });
        }
        (1..=dim).map(|i| parse_field(line, &fields, i)).collect()
    };
    let lower = vector("lower")?;
    let eta = vector("eta")?;
    let cells = vector("cells")?;

    let upper = (0..dim).map(|i| lower[i] + cells[i] * eta[i]).collect();
    UniformGrid::new(lower, upper, eta)
}

fn parse_field<T: std::str::FromStr>(line: usize, fields: &[String], i: usize) -> Result<T> {
    let field = fields.get(i).ok_or_else(|| Error::Parse {
        line,
        message: format!("missing field {}", i),
    })?;
    field.parse().map_err(|_| Error::Parse {
        line,
        message: format!("invalid value '{}'", field),
    })
}

/// Non-comment lines split into fields, with 1-based line numbers.
struct Lines<B> {
    inner: std::io::Lines<B>,
    number: usize,
}

impl<B: BufRead> Lines<B> {
    fn new(r: B) -> Self {
        Self {
            inner: r.lines(),
            number: 0,
        }
    }

    fn next_fields(&mut self) -> Result<Option<(usize, Vec<String>)>> {
        for line in self.inner.by_ref() {
            let line = line?;
            self.number += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed == "c" || trimmed.starts_with("c ") {
                continue;
            }
            return Ok(Some((self.number, trimmed.split_whitespace().map(String::from).collect())));
        }
        Ok(None)
    }

    /// Next line, which must start with `key`.
    fn expect(&mut self, key: &str) -> Result<(usize, Vec<String>)> {
        match self.next_fields()? {
            Some((line, fields)) if fields[0] == key => Ok((line, fields)),
            Some((line, fields)) => Err(Error::Parse {
                line,
                message: format!("expected '{}', found '{}'", key, fields[0]),
            }),
            None => Err(Error::Parse {
                line: self.number,
                message: format!("unexpected end of input, expected '{}'", key),
            }),
        }
    }
}

/// Read one point per line, coordinates separated by whitespace.
///
/// Blank lines and lines starting with `#` are skipped.
pub fn read_points<B: BufRead>(r: B) -> Result<Vec<Vec<f64>>> {
    let mut points = Vec::new();
    for (i, line) in r.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let point = trimmed
            .split_whitespace()
            .map(|v| {
                v.parse::<f64>().map_err(|_| Error::Parse {
                    line: i + 1,
                    message: format!("invalid coordinate '{}'", v),
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        points.push(point);
    }
    Ok(points)
}

/// All cells of `alphabet` except those containing one of `points`.
pub fn safe_mask<E: RelationEngine>(
    engine: &E,
    alphabet: &SymbolicAlphabet,
    points: &[Vec<f64>],
) -> Result<E::Relation> {
    let mut unsafe_cells = engine.empty();
    for point in points {
        unsafe_cells = engine.union(&unsafe_cells, &alphabet.point_relation(engine, point)?);
    }
    debug!(
        "{} points mark {} unsafe cells",
        points.len(),
        alphabet.size_of(engine, &unsafe_cells)
    );
    Ok(engine.complement(&unsafe_cells, &[alphabet.space()]))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use test_log::test;

    use super::*;
    use crate::explicit::ExplicitEngine;
    use crate::symbolic::BddEngine;

    fn controller<E: RelationEngine>(engine: &mut E) -> Controller<E::Relation> {
        let states = SymbolicAlphabet::new(engine, UniformGrid::new(vec![0.0], vec![10.0], vec![1.0]).unwrap());
        let inputs = SymbolicAlphabet::new(engine, UniformGrid::new(vec![-2.0], vec![2.0], vec![2.0]).unwrap());
        let mut relation = engine.empty();
        for (x, u) in [(3, 1), (4, 0), (4, 1)] {
            let pair = engine.intersect(&states.cell(engine, x), &inputs.cell(engine, u));
            relation = engine.union(&relation, &pair);
        }
        Controller::new(states, inputs, relation)
    }

    fn check_restriction<E: RelationEngine>(mut engine: E) {
        let c = controller(&mut engine);
        assert_eq!(c.domain_size(&engine), 2);
        assert_eq!(c.restriction(&engine, &[3.2]).unwrap(), vec![vec![1.0]]);
        assert_eq!(c.restriction(&engine, &[4.9]).unwrap(), vec![vec![-1.0], vec![1.0]]);
        assert!(c.restriction(&engine, &[7.0]).unwrap().is_empty());
        assert!(matches!(c.restriction(&engine, &[12.0]), Err(Error::OutOfDomain { .. })));
        assert!(matches!(
            c.restriction(&engine, &[1.0, 1.0]),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_restriction_explicit() {
        check_restriction(ExplicitEngine::new());
    }

    #[test]
    fn test_restriction_bdd() {
        check_restriction(BddEngine::default());
    }

    #[test]
    fn test_text_format() {
        let mut engine = BddEngine::default();
        let c = controller(&mut engine);
        let text = c.to_text(&engine);
        assert!(text.contains("grid state 1\nlower 0\neta 1\ncells 10\n"));
        assert!(text.ends_with("pairs 3\npair 3 1\npair 4 0\npair 4 1\n"));

        let mut other = ExplicitEngine::new();
        let loaded = Controller::read_from(&mut other, Cursor::new(text)).unwrap();
        assert_eq!(loaded.pairs(&other), vec![(3, 1), (4, 0), (4, 1)]);
        assert_eq!(loaded.states().grid(), c.states().grid());
        assert_eq!(loaded.inputs().grid(), c.inputs().grid());
    }

    #[test]
    fn test_parse_errors() {
        let mut engine = ExplicitEngine::new();
        let text = "grid state 1\nlower 0\neta 1\ncells 10\ngrid input 1\nlower 0\neta 1\ncells 2\npairs 1\npair 3 7\n";
        let err = Controller::read_from(&mut engine, Cursor::new(text)).unwrap_err();
        assert!(matches!(err, Error::Parse { line: 10, .. }), "{}", err);

        let err = Controller::read_from(&mut engine, Cursor::new("grid input 1\n")).unwrap_err();
        assert!(matches!(err, Error::Parse { line: 1, .. }), "{}", err);

        let err = Controller::read_from(&mut engine, Cursor::new("c empty\n")).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }), "{}", err);
    }

    #[test]
    fn test_points_and_mask() {
        let input = "# unsafe points\n1.5 0.2\n\n  3.0   0.9 \n";
        let points = read_points(Cursor::new(input)).unwrap();
        assert_eq!(points, vec![vec![1.5, 0.2], vec![3.0, 0.9]]);
        assert!(read_points(Cursor::new("1.0 x\n")).is_err());

        let mut engine = ExplicitEngine::new();
        let grid = UniformGrid::new(vec![0.0, 0.0], vec![4.0, 1.0], vec![1.0, 0.5]).unwrap();
        let a = SymbolicAlphabet::new(&mut engine, grid);
        let safe = safe_mask(&engine, &a, &points).unwrap();
        // (1.5, 0.2) is cell (1, 0) = 1 and (3.0, 0.9) is cell (3, 1) = 7.
        assert_eq!(a.size_of(&engine, &safe), 6);
        assert_eq!(a.cells_of(&engine, &safe), vec![0, 2, 3, 4, 5, 6]);
    }
}
