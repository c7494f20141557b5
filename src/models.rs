//! Built-in benchmark systems.
//!
//! Each model carries its sampling period and the state/input grids it is
//! usually synthesized on. `divider` refines the state grid by that factor.

use std::f64::consts::PI;

use crate::dynamics::{runge_kutta4, Dynamics};
use crate::error::Result;
use crate::grid::UniformGrid;

/// Boost DC-DC converter with two switching modes (`u = 1` or `u = 2`).
#[derive(Debug, Clone, Copy, Default)]
pub struct Dcdc;

impl Dcdc {
    pub const TAU: f64 = 0.5;
    const XC: f64 = 70.0;
    const XL: f64 = 3.0;
    const RC: f64 = 0.005;
    const RL: f64 = 0.05;
    const RO: f64 = 1.0;
    const VS: f64 = 1.0;

    pub fn state_grid(divider: u32) -> Result<UniformGrid> {
        let eta = 20.0 / 4e3 / divider.max(1) as f64;
        UniformGrid::new(vec![0.649, 4.949], vec![1.65, 5.95], vec![eta, eta])
    }

    pub fn input_grid() -> Result<UniformGrid> {
        UniformGrid::new(vec![0.5], vec![2.5], vec![1.0])
    }

    fn switched(u: &[f64]) -> bool {
        (u[0] - 1.0).abs() < 0.5
    }
}

impl Dynamics for Dcdc {
    fn state_dim(&self) -> usize {
        2
    }
    fn input_dim(&self) -> usize {
        1
    }

    fn advance(&self, x: &mut [f64], u: &[f64]) {
        let (xc, xl, rc, rl, ro, vs) = (Self::XC, Self::XL, Self::RC, Self::RL, Self::RO, Self::VS);
        let rhs = |dx: &mut [f64], x: &[f64], u: &[f64]| {
            if Self::switched(u) {
                dx[0] = -rl / xl * x[0] + vs / xl;
                dx[1] = -1.0 / (xc * (ro + rc)) * x[1];
            } else {
                dx[0] = -(1.0 / xl) * (rl + ro * rc / (ro + rc)) * x[0] - (1.0 / xl) * ro / (5.0 * (ro + rc)) * x[1]
                    + vs / xl;
                dx[1] = (1.0 / xc) * 5.0 * ro / (ro + rc) * x[0] - (1.0 / xc) * (1.0 / (ro + rc)) * x[1];
            }
        };
        runge_kutta4(rhs, x, u, Self::TAU, 5);
    }

    fn advance_growth_bound(&self, r: &mut [f64], _x: &[f64], u: &[f64]) {
        let (xc, xl, rc, rl, ro) = (Self::XC, Self::XL, Self::RC, Self::RL, Self::RO);
        let rhs = |dr: &mut [f64], r: &[f64], u: &[f64]| {
            if Self::switched(u) {
                dr[0] = -rl / xl * r[0];
                dr[1] = -1.0 / (xc * (ro + rc)) * r[1];
            } else {
                dr[0] = -(1.0 / xl) * (rl + ro * rc / (ro + rc)) * r[0] + (1.0 / xl) * ro / (5.0 * (ro + rc)) * r[1];
                dr[1] = 5.0 * (1.0 / xc) * ro / (ro + rc) * r[0] - (1.0 / xc) * (1.0 / (ro + rc)) * r[1];
            }
        };
        runge_kutta4(rhs, r, u, Self::TAU, 5);
    }
}

/// DC motor: angular velocity and armature current driven by a voltage.
#[derive(Debug, Clone, Copy, Default)]
pub struct DcMotor;

impl DcMotor {
    pub const TAU: f64 = 0.05;
    const R: f64 = 500.0e-3;
    const L: f64 = 1500.0e-6;
    const J: f64 = 250.0e-6;
    const B: f64 = 100.0e-6;
    const K: f64 = 50.0e-3;

    pub fn state_grid(divider: u32) -> Result<UniformGrid> {
        let eta = 0.5 / divider.max(1) as f64;
        UniformGrid::new(vec![-1.0, -10.0], vec![30.0, 10.0], vec![eta, eta])
    }

    pub fn input_grid() -> Result<UniformGrid> {
        UniformGrid::new(vec![-10.0], vec![10.0], vec![0.01])
    }
}

impl Dynamics for DcMotor {
    fn state_dim(&self) -> usize {
        2
    }
    fn input_dim(&self) -> usize {
        1
    }

    fn advance(&self, x: &mut [f64], u: &[f64]) {
        let (r, l, j, b, k) = (Self::R, Self::L, Self::J, Self::B, Self::K);
        let rhs = |dx: &mut [f64], x: &[f64], u: &[f64]| {
            dx[0] = -b / j * x[0] + k / j * x[1];
            dx[1] = -k / l * x[0] - r / l * x[1] + 1.0 / l * u[0];
        };
        runge_kutta4(rhs, x, u, Self::TAU, 10);
    }

    fn advance_growth_bound(&self, r: &mut [f64], _x: &[f64], u: &[f64]) {
        let (res, l, j, b, k) = (Self::R, Self::L, Self::J, Self::B, Self::K);
        let rhs = |dr: &mut [f64], r: &[f64], _u: &[f64]| {
            dr[0] = -b / j * r[0] + k / j * r[1];
            dr[1] = k / l * r[0] - res / l * r[1];
        };
        runge_kutta4(rhs, r, u, Self::TAU, 10);
    }
}

/// Kinematic single-track vehicle: position, heading; inputs are speed and
/// steering angle.
#[derive(Debug, Clone, Copy, Default)]
pub struct Vehicle;

impl Vehicle {
    pub const TAU: f64 = 0.3;

    pub fn state_grid(divider: u32) -> Result<UniformGrid> {
        let eta = 0.2 / divider.max(1) as f64;
        UniformGrid::new(vec![-0.1, -0.1, -3.5 - 0.1], vec![10.1, 10.1, 3.5 + 0.1], vec![eta; 3])
    }

    pub fn input_grid() -> Result<UniformGrid> {
        UniformGrid::new(vec![-1.15, -1.15], vec![1.25, 1.25], vec![0.3, 0.3])
    }

    /// Obstacles as `[x_lo, x_hi, y_lo, y_hi]`.
    pub const OBSTACLES: [[f64; 4]; 15] = [
        [1.0, 1.2, 0.0, 9.0],
        [2.2, 2.4, 0.0, 5.0],
        [2.2, 2.4, 6.0, 10.0],
        [3.4, 3.6, 0.0, 9.0],
        [4.6, 4.8, 1.0, 10.0],
        [5.8, 6.0, 0.0, 6.0],
        [5.8, 6.0, 7.0, 10.0],
        [7.0, 7.2, 1.0, 10.0],
        [8.2, 8.4, 0.0, 8.5],
        [8.4, 9.3, 8.3, 8.5],
        [9.3, 10.0, 7.1, 7.3],
        [8.4, 9.3, 5.9, 6.1],
        [9.3, 10.0, 4.7, 4.9],
        [8.4, 9.3, 3.5, 3.7],
        [9.3, 10.0, 2.3, 2.5],
    ];
}

impl Dynamics for Vehicle {
    fn state_dim(&self) -> usize {
        3
    }
    fn input_dim(&self) -> usize {
        2
    }

    fn advance(&self, x: &mut [f64], u: &[f64]) {
        let rhs = |dx: &mut [f64], x: &[f64], u: &[f64]| {
            let alpha = (u[1].tan() / 2.0).atan();
            dx[0] = u[0] * (alpha + x[2]).cos() / alpha.cos();
            dx[1] = u[0] * (alpha + x[2]).sin() / alpha.cos();
            dx[2] = u[0] * u[1].tan();
        };
        runge_kutta4(rhs, x, u, Self::TAU, 10);
    }

    fn advance_growth_bound(&self, r: &mut [f64], _x: &[f64], u: &[f64]) {
        let c = u[0].abs() * (u[1].tan() * u[1].tan() / 4.0 + 1.0).sqrt();
        r[0] += c * r[2] * Self::TAU;
        r[1] += c * r[2] * Self::TAU;
    }
}

/// Longitudinal dynamics of a landing aircraft: velocity, flight path angle
/// and altitude; inputs are thrust and angle of attack.
#[derive(Debug, Clone, Copy, Default)]
pub struct Aircraft;

impl Aircraft {
    pub const TAU: f64 = 0.25;

    /// Measurement error bound on the state.
    pub const MEASUREMENT_ERROR: [f64; 3] = [0.0125, 0.0025 / 180.0 * PI, 0.05];

    pub fn state_grid(divider: u32) -> Result<UniformGrid> {
        let d = divider.max(1) as f64;
        UniformGrid::new(
            vec![58.0, -3.0 * PI / 180.0, 0.0],
            vec![83.0, 0.0, 56.0],
            vec![25.0 / 362.0 / d, 3.0 * PI / 180.0 / 66.0 / d, 56.0 / 334.0 / d],
        )
    }

    pub fn input_grid() -> Result<UniformGrid> {
        let step = 8.0 / 9.0 * PI / 180.0;
        UniformGrid::new(
            vec![-16000.0, -step / 2.0],
            vec![48000.0, 8.0 * PI / 180.0 + step / 2.0],
            vec![32000.0, step],
        )
    }
}

impl Dynamics for Aircraft {
    fn state_dim(&self) -> usize {
        3
    }
    fn input_dim(&self) -> usize {
        2
    }

    fn advance(&self, x: &mut [f64], u: &[f64]) {
        let rhs = |dx: &mut [f64], x: &[f64], u: &[f64]| {
            let mg = 60000.0 * 9.81;
            let mi = 1.0 / 60000.0;
            let c = 1.25 + 4.2 * u[1];
            dx[0] = mi * (u[0] * u[1].cos() - (2.7 + 3.08 * c * c) * x[0] * x[0] - mg * x[1].sin());
            dx[1] = (1.0 / (60000.0 * x[0])) * (u[0] * u[1].sin() + 68.6 * c * x[0] * x[0] - mg * x[1].cos());
            dx[2] = x[0] * x[1].sin();
        };
        runge_kutta4(rhs, x, u, Self::TAU, 5);
    }

    fn advance_growth_bound(&self, r: &mut [f64], _x: &[f64], u: &[f64]) {
        let rhs = |dr: &mut [f64], r: &[f64], u: &[f64]| {
            let c = 1.25 + 4.2 * u[1];
            let l = [
                [-0.00191867 * (2.7 + 3.08 * c * c), 9.81],
                [0.002933 + 0.004802 * u[1], 0.003623],
                [0.07483, 83.22],
            ];
            // Input disturbances.
            let w = [0.108, 0.002, 0.0];
            for i in 0..3 {
                dr[i] = l[i][0] * r[0] + l[i][1] * r[1] + w[i];
            }
        };
        runge_kutta4(rhs, r, u, Self::TAU, 5);
    }
}

/// Look up a built-in model: `dcdc`, `dcm`, `vehicle` or `aircraft`.
pub fn by_name(name: &str) -> Option<Box<dyn Dynamics>> {
    match name {
        "dcdc" => Some(Box::new(Dcdc)),
        "dcm" => Some(Box::new(DcMotor)),
        "vehicle" => Some(Box::new(Vehicle)),
        "aircraft" => Some(Box::new(Aircraft)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_by_name() {
        for (name, n, m) in [("dcdc", 2, 1), ("dcm", 2, 1), ("vehicle", 3, 2), ("aircraft", 3, 2)] {
            let model = by_name(name).unwrap();
            assert_eq!(model.state_dim(), n, "{}", name);
            assert_eq!(model.input_dim(), m, "{}", name);
        }
        assert!(by_name("pendulum").is_none());
    }

    #[test]
    fn test_grids() {
        assert_eq!(Dcdc::state_grid(1).unwrap().cells_per_axis(), &[200, 200]);
        assert_eq!(Dcdc::input_grid().unwrap().point_of(0), vec![1.0]);
        assert_eq!(Dcdc::input_grid().unwrap().point_of(1), vec![2.0]);
        assert_eq!(Vehicle::state_grid(1).unwrap().cells_per_axis(), &[51, 51, 36]);
        assert_eq!(Vehicle::input_grid().unwrap().cells_per_axis(), &[8, 8]);
        assert_eq!(Aircraft::input_grid().unwrap().cells_per_axis(), &[2, 10]);
    }

    #[test]
    fn test_vehicle_straight_line() {
        let mut x = [1.0, 1.0, 0.0];
        Vehicle.advance(&mut x, &[1.0, 0.0]);
        assert!((x[0] - 1.3).abs() < 1e-9);
        assert!((x[1] - 1.0).abs() < 1e-9);

        let mut r = [0.1, 0.1, 0.1];
        Vehicle.advance_growth_bound(&mut r, &x, &[1.0, 0.0]);
        assert!((r[0] - 0.13).abs() < 1e-9);
        assert_eq!(r[2], 0.1);
    }

    #[test]
    fn test_dcdc_growth_bound_contracts_in_mode_one() {
        let mut r = [0.0025, 0.0025];
        Dcdc.advance_growth_bound(&mut r, &[1.0, 5.0], &[1.0]);
        assert!(r[0] < 0.0025 && r[0] > 0.0);
        assert!(r[1] < 0.0025 && r[1] > 0.0);
    }
}
