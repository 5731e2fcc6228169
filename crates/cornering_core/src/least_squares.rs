//! Box-constrained Levenberg–Marquardt with a Huber loss on the squared
//! residual norm.
//!
//! Minimises `0.5 * rho(|f(x)|^2)` subject to `lower <= x <= upper`, with
//! `rho(s) = s` for `s <= 1` and `2 sqrt(s) - 1` beyond. Jacobians come from
//! forward-mode dual numbers. The robust loss is folded in by reweighting
//! (`g = rho' J^T f`, `H = rho' J^T J`), and steps are projected onto the box.

use crate::autodiff::{self, Dual};
use crate::traits::ResidualSystem;
use anyhow::{anyhow, bail, Context, Result};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::trace;

const MIN_DIAGONAL: f64 = 1e-6;
const MAX_DIAGONAL: f64 = 1e32;
const MIN_TRUST_RADIUS: f64 = 1e-32;
const MAX_TRUST_RADIUS: f64 = 1e16;
const MIN_RELATIVE_DECREASE: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeastSquaresOptions {
    pub max_iterations: usize,
    /// Stop when `|cost change| <= function_tolerance * cost`.
    pub function_tolerance: f64,
    /// Stop when the projected gradient step has max-norm below this.
    pub gradient_tolerance: f64,
    /// Stop when `|dx| <= parameter_tolerance * (|x| + parameter_tolerance)`.
    pub parameter_tolerance: f64,
    pub initial_trust_radius: f64,
}

impl Default for LeastSquaresOptions {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            function_tolerance: 1e-8,
            gradient_tolerance: 1e-8,
            parameter_tolerance: 1e-8,
            initial_trust_radius: 1e4,
        }
    }
}

/// Why a least-squares run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    /// A function, gradient, parameter or trust-radius tolerance was met.
    Converged,
    /// The iteration cap was hit first.
    NoConvergence,
    /// The residuals or Jacobian stopped being finite.
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeastSquaresSummary {
    pub termination: Termination,
    pub iterations: usize,
    pub initial_cost: f64,
    pub final_cost: f64,
}

/// Huber loss with unit scale, evaluated on the squared norm `s`.
/// Returns `(rho(s), rho'(s))`.
#[inline]
pub fn huber(s: f64) -> (f64, f64) {
    if s <= 1.0 {
        (s, 1.0)
    } else {
        let r = s.sqrt();
        (2.0 * r - 1.0, 1.0 / r)
    }
}

fn project(x: &mut DVector<f64>, lower: &[f64], upper: &[f64]) {
    for (i, value) in x.iter_mut().enumerate() {
        *value = value.max(lower[i]).min(upper[i]);
    }
}

fn evaluate<S>(system: &S, x: &DVector<f64>) -> Result<DVector<f64>>
where
    S: ResidualSystem<f64>,
{
    let mut out = vec![0.0; system.dimension()];
    system.residuals(x.as_slice(), &mut out);
    if let Some(i) = out.iter().position(|v| !v.is_finite()) {
        bail!("Residual {} is not finite ({}).", i, out[i]);
    }
    Ok(DVector::from_vec(out))
}

fn evaluate_jacobian<S>(system: &S, x: &DVector<f64>) -> Result<DMatrix<f64>>
where
    S: ResidualSystem<Dual>,
{
    let jac = autodiff::jacobian(system, x.as_slice());
    if jac.iter().any(|v| !v.is_finite()) {
        bail!("Jacobian has non-finite entries.");
    }
    Ok(jac)
}

/// Solves `(H + D / radius) step = -g` with `D = clamp(diag(H))`.
fn damped_step(hessian: &DMatrix<f64>, gradient: &DVector<f64>, radius: f64) -> Result<DVector<f64>> {
    let mut lhs = hessian.clone();
    for i in 0..lhs.nrows() {
        let d = hessian[(i, i)].clamp(MIN_DIAGONAL, MAX_DIAGONAL);
        lhs[(i, i)] += d / radius;
    }
    let step = lhs
        .lu()
        .solve(&(-gradient))
        .ok_or_else(|| anyhow!("Damped normal equations are singular."))?;
    if step.iter().any(|v| !v.is_finite()) {
        bail!("Damped step is not finite.");
    }
    Ok(step)
}

struct Iterate {
    x: DVector<f64>,
    residuals: DVector<f64>,
    cost: f64,
    weight: f64,
}

impl Iterate {
    fn at<S: ResidualSystem<f64>>(system: &S, x: DVector<f64>) -> Result<Self> {
        let residuals = evaluate(system, &x)?;
        let (rho, weight) = huber(residuals.norm_squared());
        Ok(Self {
            x,
            residuals,
            cost: 0.5 * rho,
            weight,
        })
    }
}

/// Minimises the robust cost of `system` inside `[lower, upper]`, starting
/// from `x` and writing the final iterate back into it.
///
/// Never fails: numerical breakdown is reported as [`Termination::Failure`].
pub fn solve_bounded<S>(
    system: &S,
    x: &mut [f64],
    lower: &[f64],
    upper: &[f64],
    options: &LeastSquaresOptions,
) -> LeastSquaresSummary
where
    S: ResidualSystem<f64> + ResidualSystem<Dual>,
{
    let mut start = DVector::from_column_slice(x);
    project(&mut start, lower, upper);

    let mut current = match Iterate::at(system, start.clone()) {
        Ok(iterate) => iterate,
        Err(err) => {
            trace!(error = %err, "initial point rejected");
            x.copy_from_slice(start.as_slice());
            return LeastSquaresSummary {
                termination: Termination::Failure,
                iterations: 0,
                initial_cost: f64::NAN,
                final_cost: f64::NAN,
            };
        }
    };
    let initial_cost = current.cost;

    let (termination, iterations) = match minimize(system, &mut current, lower, upper, options) {
        Ok(outcome) => outcome,
        Err((err, iterations)) => {
            trace!(error = %err, iterations, "least squares broke down");
            (Termination::Failure, iterations)
        }
    };

    x.copy_from_slice(current.x.as_slice());
    LeastSquaresSummary {
        termination,
        iterations,
        initial_cost,
        final_cost: current.cost,
    }
}

fn minimize<S>(
    system: &S,
    current: &mut Iterate,
    lower: &[f64],
    upper: &[f64],
    options: &LeastSquaresOptions,
) -> std::result::Result<(Termination, usize), (anyhow::Error, usize)>
where
    S: ResidualSystem<f64> + ResidualSystem<Dual>,
{
    let mut radius = options.initial_trust_radius;
    let mut decrease_factor = 2.0;
    let mut iterations = 0usize;
    let mut model = None;

    loop {
        let (gradient, hessian) = match model.take() {
            Some(cached) => cached,
            None => {
                let jac = evaluate_jacobian(system, &current.x)
                    .context("Jacobian evaluation failed.")
                    .map_err(|err| (err, iterations))?;
                let gradient = jac.tr_mul(&current.residuals) * current.weight;
                let hessian = jac.tr_mul(&jac) * current.weight;
                (gradient, hessian)
            }
        };

        let mut probe = &current.x - &gradient;
        project(&mut probe, lower, upper);
        if (&current.x - &probe).amax() <= options.gradient_tolerance {
            return Ok((Termination::Converged, iterations));
        }

        if iterations >= options.max_iterations {
            return Ok((Termination::NoConvergence, iterations));
        }
        iterations += 1;

        let step = match damped_step(&hessian, &gradient, radius) {
            Ok(step) => step,
            Err(err) => {
                trace!(error = %err, radius, "step rejected");
                radius /= decrease_factor;
                decrease_factor *= 2.0;
                if radius < MIN_TRUST_RADIUS {
                    return Ok((Termination::Converged, iterations));
                }
                model = Some((gradient, hessian));
                continue;
            }
        };

        let mut candidate_x = &current.x + &step;
        project(&mut candidate_x, lower, upper);
        let applied = &candidate_x - &current.x;

        let x_norm = current.x.norm();
        if applied.norm() <= options.parameter_tolerance * (x_norm + options.parameter_tolerance) {
            return Ok((Termination::Converged, iterations));
        }

        let model_decrease = -(gradient.dot(&applied) + 0.5 * applied.dot(&(&hessian * &applied)));
        let candidate = Iterate::at(system, candidate_x);

        let accepted = match candidate {
            Ok(candidate) => {
                let cost_change = current.cost - candidate.cost;
                if cost_change.abs() <= options.function_tolerance * current.cost {
                    return Ok((Termination::Converged, iterations));
                }
                let ratio = if model_decrease > 0.0 {
                    cost_change / model_decrease
                } else {
                    f64::NEG_INFINITY
                };
                trace!(iterations, cost = candidate.cost, ratio, radius, "trial step");
                if ratio > MIN_RELATIVE_DECREASE {
                    let shrink = (1.0 - (2.0 * ratio - 1.0).powi(3)).max(1.0 / 3.0);
                    radius = (radius / shrink).min(MAX_TRUST_RADIUS);
                    decrease_factor = 2.0;
                    *current = candidate;
                    true
                } else {
                    false
                }
            }
            Err(err) => {
                trace!(error = %err, "trial point not finite");
                false
            }
        };

        if !accepted {
            radius /= decrease_factor;
            decrease_factor *= 2.0;
            if radius < MIN_TRUST_RADIUS {
                return Ok((Termination::Converged, iterations));
            }
            model = Some((gradient, hessian));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::Scalar;

    struct Rosenbrock;

    impl<T: Scalar> ResidualSystem<T> for Rosenbrock {
        fn dimension(&self) -> usize {
            2
        }

        fn residuals(&self, x: &[T], out: &mut [T]) {
            out[0] = T::lit(10.0) * (x[1] - x[0] * x[0]);
            out[1] = T::one() - x[0];
        }
    }

    /// `f(x) = x - target`, one unknown.
    struct Offset(f64);

    impl<T: Scalar> ResidualSystem<T> for Offset {
        fn dimension(&self) -> usize {
            1
        }

        fn residuals(&self, x: &[T], out: &mut [T]) {
            out[0] = x[0] - T::lit(self.0);
        }
    }

    struct LogOf;

    impl<T: Scalar> ResidualSystem<T> for LogOf {
        fn dimension(&self) -> usize {
            1
        }

        fn residuals(&self, x: &[T], out: &mut [T]) {
            out[0] = x[0].ln();
        }
    }

    const FREE: [f64; 2] = [f64::NEG_INFINITY, f64::NEG_INFINITY];
    const FREE_UPPER: [f64; 2] = [f64::INFINITY, f64::INFINITY];

    #[test]
    fn huber_is_quadratic_inside_and_linear_outside() {
        assert_eq!(huber(0.25), (0.25, 1.0));
        let (rho, d) = huber(4.0);
        assert_eq!(rho, 3.0);
        assert_eq!(d, 0.5);
    }

    #[test]
    fn unconstrained_rosenbrock_reaches_minimum() {
        let mut x = [-1.2, 1.0];
        let summary = solve_bounded(&Rosenbrock, &mut x, &FREE, &FREE_UPPER, &LeastSquaresOptions::default());
        assert_eq!(summary.termination, Termination::Converged);
        assert!((x[0] - 1.0).abs() < 1e-5, "{x:?}");
        assert!((x[1] - 1.0).abs() < 1e-5, "{x:?}");
        assert!(summary.final_cost < 1e-10);
        assert!(summary.initial_cost > summary.final_cost);
    }

    #[test]
    fn bounded_solution_stops_on_the_active_bound() {
        let mut x = [0.2];
        let summary = solve_bounded(&Offset(2.0), &mut x, &[0.0], &[1.0], &LeastSquaresOptions::default());
        assert_eq!(summary.termination, Termination::Converged);
        assert!((x[0] - 1.0).abs() < 1e-9, "{x:?}");
        assert!((summary.final_cost - 0.5).abs() < 1e-9);
    }

    #[test]
    fn initial_guess_is_projected_into_the_box() {
        let mut x = [5.0];
        solve_bounded(&Offset(0.5), &mut x, &[0.0], &[1.0], &LeastSquaresOptions::default());
        assert!((x[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn large_residuals_use_the_linear_branch() {
        let mut x = [0.0];
        let options = LeastSquaresOptions {
            max_iterations: 1,
            ..LeastSquaresOptions::default()
        };
        let summary = solve_bounded(&Offset(10.0), &mut x, &FREE[..1], &FREE_UPPER[..1], &options);
        assert!((summary.initial_cost - 9.5).abs() < 1e-12);
    }

    #[test]
    fn non_finite_start_is_a_failure() {
        let mut x = [-1.0];
        let summary = solve_bounded(&LogOf, &mut x, &FREE[..1], &FREE_UPPER[..1], &LeastSquaresOptions::default());
        assert_eq!(summary.termination, Termination::Failure);
        assert_eq!(summary.iterations, 0);
    }

    #[test]
    fn iteration_cap_reports_no_convergence() {
        let mut x = [-1.2, 1.0];
        let options = LeastSquaresOptions {
            max_iterations: 2,
            ..LeastSquaresOptions::default()
        };
        let summary = solve_bounded(&Rosenbrock, &mut x, &FREE, &FREE_UPPER, &options);
        assert_eq!(summary.termination, Termination::NoConvergence);
        assert_eq!(summary.iterations, 2);
    }
}
