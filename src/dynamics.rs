//! Sampled dynamics supplied to the transition builder.

/// One sampling period of a continuous system and its growth bound.
///
/// Both maps must be deterministic. `advance_growth_bound` must be a sound
/// over-approximation of how far trajectories starting within `r` of `x`
/// can drift from the nominal one under input `u`; the builder trusts it.
pub trait Dynamics: Sync {
    fn state_dim(&self) -> usize;
    fn input_dim(&self) -> usize;

    /// Replace `x` by the nominal successor under input `u`.
    fn advance(&self, x: &mut [f64], u: &[f64]);

    /// Replace the radius `r` around `x` by its bound after one period.
    fn advance_growth_bound(&self, r: &mut [f64], x: &[f64], u: &[f64]);
}

/// Integrate `dx/dt = rhs(x, u)` over `tau` with `steps` classical RK4 steps.
///
/// `rhs(dx, x, u)` writes the derivative at `x` into `dx`.
pub fn runge_kutta4<F>(rhs: F, x: &mut [f64], u: &[f64], tau: f64, steps: usize)
where
    F: Fn(&mut [f64], &[f64], &[f64]),
{
    let n = x.len();
    let h = tau / steps as f64;
    let mut k = [vec![0.0; n], vec![0.0; n], vec![0.0; n], vec![0.0; n]];
    let mut tmp = vec![0.0; n];

    for _ in 0..steps {
        rhs(&mut k[0], x, u);
        for i in 0..n {
            tmp[i] = x[i] + h / 2.0 * k[0][i];
        }
        rhs(&mut k[1], &tmp, u);
        for i in 0..n {
            tmp[i] = x[i] + h / 2.0 * k[1][i];
        }
        rhs(&mut k[2], &tmp, u);
        for i in 0..n {
            tmp[i] = x[i] + h * k[2][i];
        }
        rhs(&mut k[3], &tmp, u);
        for i in 0..n {
            x[i] += h / 6.0 * (k[0][i] + 2.0 * k[1][i] + 2.0 * k[2][i] + k[3][i]);
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_exponential_decay() {
        let mut x = [1.0];
        runge_kutta4(|dx, x, _| dx[0] = -x[0], &mut x, &[], 1.0, 10);
        assert!((x[0] - (-1.0f64).exp()).abs() < 1e-6, "x = {}", x[0]);
    }

    #[test]
    fn test_input_is_forwarded() {
        let mut x = [0.0, 0.0];
        runge_kutta4(
            |dx, _, u| {
                dx[0] = u[0];
                dx[1] = u[1];
            },
            &mut x,
            &[2.0, -1.0],
            0.5,
            3,
        );
        assert!((x[0] - 1.0).abs() < 1e-12);
        assert!((x[1] + 0.5).abs() < 1e-12);
    }
}
