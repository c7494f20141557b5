//! Uniform quantization of a hyper-rectangle.
//!
//! Axis `i` of the domain `[lower[i], upper[i])` is split into cells of width
//! `eta[i]`. Cell `j` spans `[lower + j*eta, lower + (j+1)*eta]` and is
//! represented by its centre. Cells are numbered mixed-radix with axis 0
//! varying fastest.

use log::debug;

use crate::error::{Error, Result};
use crate::relation::{decode, encode};

/// Tolerance, in cells, on the number of cells per axis.
pub const GRID_EPSILON: f64 = 1e-6;

/// What to do when `(upper - lower) / eta` is not a whole number of cells.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum GridPolicy {
    /// Round to the nearest whole number of cells (at least one).
    #[default]
    Round,
    /// Reject the grid with [`Error::InvalidGrid`].
    Strict,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UniformGrid {
    lower: Vec<f64>,
    eta: Vec<f64>,
    cells: Vec<u64>,
}

impl UniformGrid {
    pub fn new(lower: Vec<f64>, upper: Vec<f64>, eta: Vec<f64>) -> Result<Self> {
        Self::with_policy(lower, upper, eta, GridPolicy::default())
    }

    pub fn with_policy(lower: Vec<f64>, upper: Vec<f64>, eta: Vec<f64>, policy: GridPolicy) -> Result<Self> {
        if upper.len() != lower.len() {
            return Err(Error::DimensionMismatch {
                expected: lower.len(),
                found: upper.len(),
            });
        }
        if eta.len() != lower.len() {
            return Err(Error::DimensionMismatch {
                expected: lower.len(),
                found: eta.len(),
            });
        }
        if lower.is_empty() {
            return Err(Error::InvalidGrid("grid must have at least one axis".to_string()));
        }

        let mut cells = Vec::with_capacity(lower.len());
        for axis in 0..lower.len() {
            let (lb, ub, h) = (lower[axis], upper[axis], eta[axis]);
            if !(lb.is_finite() && ub.is_finite() && h.is_finite()) {
                return Err(Error::InvalidGrid(format!("axis {} has non-finite parameters", axis)));
            }
            if lb >= ub {
                return Err(Error::InvalidGrid(format!(
                    "axis {}: lower bound {} is not below upper bound {}",
                    axis, lb, ub
                )));
            }
            if h <= 0.0 {
                return Err(Error::InvalidGrid(format!("axis {}: eta {} must be positive", axis, h)));
            }

            let exact = (ub - lb) / h;
            let n = exact.round().max(1.0);
            if (exact - n).abs() > GRID_EPSILON {
                match policy {
                    GridPolicy::Strict => {
                        return Err(Error::InvalidGrid(format!(
                            "axis {}: [{}, {}] is not a whole number of cells of width {} ({})",
                            axis, lb, ub, h, exact
                        )));
                    }
                    GridPolicy::Round => {
                        debug!("Axis {}: rounding {} cells to {}", axis, exact, n);
                    }
                }
            }
            cells.push(n as u64);
        }

        Ok(Self { lower, eta, cells })
    }

    pub fn dim(&self) -> usize {
        self.lower.len()
    }

    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    /// Upper edge of the last cell on every axis.
    pub fn upper(&self) -> Vec<f64> {
        (0..self.dim()).map(|i| self.upper_at(i)).collect()
    }

    fn upper_at(&self, axis: usize) -> f64 {
        self.lower[axis] + self.cells[axis] as f64 * self.eta[axis]
    }

    pub fn eta(&self) -> &[f64] {
        &self.eta
    }

    pub fn cells_per_axis(&self) -> &[u64] {
        &self.cells
    }

    pub fn cell_count(&self) -> u64 {
        self.cells.iter().product()
    }

    pub fn coords_of(&self, index: u64) -> Vec<u64> {
        decode(&self.cells, index)
    }

    pub fn index_of(&self, coords: &[u64]) -> u64 {
        encode(&self.cells, coords)
    }

    fn check_arity(&self, found: usize) -> Result<()> {
        if found != self.dim() {
            return Err(Error::DimensionMismatch {
                expected: self.dim(),
                found,
            });
        }
        Ok(())
    }

    /// Centre of the cell `index`.
    pub fn point_of(&self, index: u64) -> Vec<f64> {
        self.coords_of(index)
            .iter()
            .enumerate()
            .map(|(i, &j)| self.lower[i] + (j as f64 + 0.5) * self.eta[i])
            .collect()
    }

    /// Index of the cell containing `point`.
    ///
    /// Points up to half a cell outside the domain snap to the boundary cell.
    pub fn cell_index_of(&self, point: &[f64]) -> Result<u64> {
        self.check_arity(point.len())?;
        let mut coords = Vec::with_capacity(self.dim());
        for (axis, &p) in point.iter().enumerate() {
            let n = self.cells[axis];
            let t = (p - self.lower[axis]) / self.eta[axis];
            if !(-0.5..=n as f64 + 0.5).contains(&t) {
                return Err(Error::OutOfDomain {
                    axis,
                    value: p,
                    lower: self.lower[axis],
                    upper: self.upper_at(axis),
                });
            }
            coords.push((t.floor().max(0.0) as u64).min(n - 1));
        }
        Ok(self.index_of(&coords))
    }

    /// Closed rectangle `(lo, hi)` of the cell `index`.
    pub fn cell_bounds(&self, index: u64) -> (Vec<f64>, Vec<f64>) {
        let centre = self.point_of(index);
        let lo = centre.iter().zip(&self.eta).map(|(c, h)| c - h / 2.0).collect();
        let hi = centre.iter().zip(&self.eta).map(|(c, h)| c + h / 2.0).collect();
        (lo, hi)
    }

    /// Inclusive per-axis coordinate ranges of the cells overlapping the
    /// closed rectangle `[lo, hi]`, or `None` if the rectangle is not inside
    /// the domain.
    ///
    /// Cells that only touch the rectangle on a face are included.
    pub fn covering_cells(&self, lo: &[f64], hi: &[f64]) -> Option<(Vec<u64>, Vec<u64>)> {
        debug_assert_eq!(lo.len(), self.dim());
        debug_assert_eq!(hi.len(), self.dim());

        let mut first = Vec::with_capacity(self.dim());
        let mut last = Vec::with_capacity(self.dim());
        for axis in 0..self.dim() {
            let (a, b) = (lo[axis], hi[axis]);
            if a > b || a < self.lower[axis] || b > self.upper_at(axis) {
                return None;
            }
            let n = self.cells[axis] as f64;
            let h = self.eta[axis];
            let from = ((a - self.lower[axis]) / h - 1.0).ceil().clamp(0.0, n - 1.0);
            let to = ((b - self.lower[axis]) / h).floor().clamp(0.0, n - 1.0);
            first.push(from as u64);
            last.push(to as u64);
        }
        Some((first, last))
    }
}
