//! Steady-state cornering equilibrium for one steering input.
//!
//! Unknowns, in order: front/rear slip angle, front/rear slip ratio,
//! resultant speed `V`, longitudinal speed `V_x`, lateral speed `V_y`.
//! The seven residuals balance longitudinal force, lateral force and yaw
//! moment, pin the front tire to free rolling, tie both slip angles to the
//! body kinematics and close the velocity triangle. Each is scaled to a
//! comparable magnitude before the least-squares solve.

use crate::autodiff;
use crate::candidate::{AxleState, Candidate, EquilibriumState, Guess, SolverDiagnostics};
use crate::least_squares::{self, LeastSquaresOptions, Termination};
use crate::settings::{Bounds, OptimizerSettings, SolverSettings, EQUATION_COUNT};
use crate::tire::{
    combined_aligning_moment, combined_lateral_force, combined_longitudinal_force, TireParameters,
};
use crate::traits::{ResidualSystem, Scalar};
use crate::vehicle::{AxleLoads, VehicleParameters};
use nalgebra::DMatrix;
use tracing::{debug, instrument};

const FORCE_SCALE: f64 = 1.0 / 1000.0;
const FREE_ROLLING_SCALE: f64 = 1.0 / 10.0;
const KINEMATIC_SCALE: f64 = 100.0;
const VELOCITY_SCALE: f64 = 1.0 / 100.0;
/// Keeps the slip-angle kinematics finite at `V_x = 0`.
const VX_REGULARIZATION: f64 = 1e-6;

/// Residual system of a vehicle turning at fixed steering angle `delta`.
#[derive(Debug, Clone, Copy)]
pub struct CorneringResiduals<'a> {
    vehicle: &'a VehicleParameters,
    loads: AxleLoads,
    delta: f64,
}

impl<'a> CorneringResiduals<'a> {
    pub fn new(vehicle: &'a VehicleParameters, delta: f64) -> Self {
        Self {
            vehicle,
            loads: vehicle.axle_loads(),
            delta,
        }
    }

    /// Residuals at `guess` as plain floats.
    pub fn evaluate(&self, guess: &Guess) -> [f64; EQUATION_COUNT] {
        let mut out = [0.0; EQUATION_COUNT];
        ResidualSystem::<f64>::residuals(self, &guess.to_array(), &mut out);
        out
    }
}

struct AxleForces<T> {
    fx: T,
    fy: T,
    mz: T,
}

fn axle_forces<T: Scalar>(tire: &TireParameters, fz: f64, alpha: T, kappa: T, gamma: f64) -> AxleForces<T> {
    let (fz, gamma) = (T::lit(fz), T::lit(gamma));
    AxleForces {
        fx: combined_longitudinal_force(tire, fz, alpha, kappa, gamma),
        fy: combined_lateral_force(tire, fz, alpha, kappa, gamma),
        mz: combined_aligning_moment(tire, fz, alpha, kappa, gamma),
    }
}

impl<'a, T: Scalar> ResidualSystem<T> for CorneringResiduals<'a> {
    fn dimension(&self) -> usize {
        EQUATION_COUNT
    }

    fn residuals(&self, x: &[T], out: &mut [T]) {
        let veh = self.vehicle;
        let [alpha_f, alpha_r, kappa_f, kappa_r, v, vx, vy] = [x[0], x[1], x[2], x[3], x[4], x[5], x[6]];

        let a = T::lit(veh.cg_to_front);
        let b = T::lit(veh.cg_to_rear);
        let m = T::lit(veh.mass);
        let delta = T::lit(self.delta);
        let (sin_d, cos_d) = (delta.sin(), delta.cos());

        let r = v / T::lit(veh.turn_radius);
        let drag = veh.drag_force(vx);
        let rolling = T::lit(veh.rolling_resistance_force());

        let front = axle_forces(&veh.front_tire, self.loads.front, alpha_f, kappa_f, veh.camber);
        let rear = axle_forces(&veh.rear_tire, self.loads.rear, alpha_r, kappa_r, veh.camber);

        let front_lateral = front.fx * sin_d + front.fy * cos_d;
        let vx_safe = vx + T::lit(VX_REGULARIZATION);

        out[0] = (front.fx * cos_d - front.fy * sin_d + rear.fx - drag + m * vy * r)
            * T::lit(FORCE_SCALE);
        out[1] = (front_lateral + rear.fy - m * vx * r) * T::lit(FORCE_SCALE);
        out[2] = (a * front_lateral - b * rear.fy + front.mz + rear.mz) * T::lit(FORCE_SCALE);
        out[3] = (front.fx - rolling) * T::lit(FREE_ROLLING_SCALE);
        out[4] = (alpha_f - (delta - ((vy + a * r) / vx_safe).atan())) * T::lit(KINEMATIC_SCALE);
        out[5] = (alpha_r + ((vy - b * r) / vx_safe).atan()) * T::lit(KINEMATIC_SCALE);
        out[6] = (v * v - vx * vx - vy * vy) * T::lit(VELOCITY_SCALE);
    }
}

/// Solves candidates against one immutable vehicle and settings triple.
///
/// Shared by reference across solver threads; every solve is independent.
#[derive(Debug, Clone)]
pub struct EquilibriumSolver<'a> {
    vehicle: &'a VehicleParameters,
    settings: &'a SolverSettings,
    lower: [f64; EQUATION_COUNT],
    upper: [f64; EQUATION_COUNT],
}

impl<'a> EquilibriumSolver<'a> {
    pub fn new(
        vehicle: &'a VehicleParameters,
        settings: &'a SolverSettings,
        optimizer: &OptimizerSettings,
    ) -> Self {
        let bounds: [Bounds; EQUATION_COUNT] = optimizer.variable_bounds();
        Self {
            vehicle,
            settings,
            lower: bounds.map(|b| b.min),
            upper: bounds.map(|b| b.max),
        }
    }

    /// Runs the bounded robust least-squares solve for `candidate` and
    /// returns it converged or failed.
    ///
    /// The final iterate replaces the candidate's guesses either way, so a
    /// later respawn starts from where this solve ended.
    #[instrument(level = "trace", skip_all, fields(delta = candidate.delta()))]
    pub fn solve(&self, candidate: Candidate) -> Candidate {
        let mut candidate = candidate.respawn();
        let system = CorneringResiduals::new(self.vehicle, candidate.delta());
        let options = LeastSquaresOptions {
            max_iterations: self.settings.max_iterations,
            ..LeastSquaresOptions::default()
        };

        let mut x = candidate.guess().to_array();
        let summary = least_squares::solve_bounded(
            &system,
            &mut x,
            &self.lower,
            &self.upper,
            &options,
        );
        let solved = Guess::from_array(x);
        candidate.set_guess(solved);

        let residuals = system.evaluate(&solved);
        let diagnostics = SolverDiagnostics {
            termination: summary.termination,
            iterations: summary.iterations,
            initial_cost: summary.initial_cost,
            final_cost: summary.final_cost,
        };

        let verified = summary.termination == Termination::Converged
            && within_tolerances(&residuals, &self.settings.tolerances);
        debug!(
            termination = ?summary.termination,
            iterations = summary.iterations,
            final_cost = summary.final_cost,
            verified,
            "equilibrium solve finished"
        );

        let state = verified.then(|| self.derive_state(&solved));
        candidate.finish(residuals, diagnostics, state)
    }

    fn derive_state(&self, solved: &Guess) -> EquilibriumState {
        let veh = self.vehicle;
        let loads = veh.axle_loads();
        let axle = |tire: &TireParameters, fz: f64, alpha: f64, kappa: f64| {
            let forces = axle_forces(tire, fz, alpha, kappa, veh.camber);
            AxleState {
                slip_angle: alpha,
                slip_ratio: kappa,
                normal_load: fz,
                longitudinal_force: forces.fx,
                lateral_force: forces.fy,
                aligning_moment: forces.mz,
            }
        };

        let v = solved.velocity;
        EquilibriumState {
            velocity: v,
            velocity_x: solved.velocity_x,
            velocity_y: solved.velocity_y,
            yaw_rate: v / veh.turn_radius,
            sideslip: solved.velocity_y.atan2(solved.velocity_x),
            lateral_acceleration: v * v / veh.turn_radius,
            drag_force: veh.drag_force(solved.velocity_x),
            rolling_resistance_force: veh.rolling_resistance_force(),
            front: axle(&veh.front_tire, loads.front, solved.alpha_front, solved.kappa_front),
            rear: axle(&veh.rear_tire, loads.rear, solved.alpha_rear, solved.kappa_rear),
        }
    }
}

/// `true` when every `|residual_i| <= tolerance_i`.
pub fn within_tolerances(residuals: &[f64; EQUATION_COUNT], tolerances: &[f64; EQUATION_COUNT]) -> bool {
    residuals
        .iter()
        .zip(tolerances)
        .all(|(r, tol)| r.abs() <= *tol)
}

/// Exact Jacobian of the residuals at `guess`, row per residual.
pub fn residual_jacobian(vehicle: &VehicleParameters, delta: f64, guess: &Guess) -> DMatrix<f64> {
    autodiff::jacobian(&CorneringResiduals::new(vehicle, delta), &guess.to_array())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::SolveStatus;

    fn kinematic_guess(vehicle: &VehicleParameters, delta: f64, v: f64, vy: f64) -> Guess {
        let vx = (v * v - vy * vy).sqrt();
        let r = v / vehicle.turn_radius;
        Guess {
            alpha_front: delta - ((vy + vehicle.cg_to_front * r) / (vx + VX_REGULARIZATION)).atan(),
            alpha_rear: -((vy - vehicle.cg_to_rear * r) / (vx + VX_REGULARIZATION)).atan(),
            kappa_front: 0.0,
            kappa_rear: 0.0,
            velocity: v,
            velocity_x: vx,
            velocity_y: vy,
        }
    }

    #[test]
    fn kinematic_residuals_vanish_for_consistent_state() {
        let vehicle = VehicleParameters::default();
        let guess = kinematic_guess(&vehicle, 0.05, 18.0, 0.4);
        let res = CorneringResiduals::new(&vehicle, 0.05).evaluate(&guess);
        assert!(res[4].abs() < 1e-10, "{res:?}");
        assert!(res[5].abs() < 1e-10, "{res:?}");
        assert!(res[6].abs() < 1e-10, "{res:?}");
        assert!(res.iter().all(|r| r.is_finite()));
    }

    #[test]
    fn straight_line_coast_balances_lateral_equations() {
        let vehicle = VehicleParameters {
            turn_radius: 1e12,
            ..VehicleParameters::default()
        };
        let guess = kinematic_guess(&vehicle, 0.0, 10.0, 0.0);
        let res = CorneringResiduals::new(&vehicle, 0.0).evaluate(&guess);
        assert!(res[1].abs() < 1e-6, "{res:?}");
        assert!(res[2].abs() < 1e-3, "{res:?}");
        // Front free rolling: Fx_F = 0 against rolling resistance.
        let expected = -vehicle.rolling_resistance_force() * FREE_ROLLING_SCALE;
        assert!((res[3] - expected).abs() < 1e-9, "{res:?}");
    }

    #[test]
    fn jacobian_matches_finite_differences() {
        let vehicle = VehicleParameters::default();
        let mut guess = kinematic_guess(&vehicle, 0.06, 15.0, 0.2);
        guess.kappa_front = 0.01;
        guess.kappa_rear = 0.02;
        let jac = residual_jacobian(&vehicle, 0.06, &guess);
        let system = CorneringResiduals::new(&vehicle, 0.06);

        let h = 1e-7;
        let base = guess.to_array();
        for j in 0..EQUATION_COUNT {
            let mut plus = base;
            let mut minus = base;
            plus[j] += h;
            minus[j] -= h;
            let fp = system.evaluate(&Guess::from_array(plus));
            let fm = system.evaluate(&Guess::from_array(minus));
            for i in 0..EQUATION_COUNT {
                let fd = (fp[i] - fm[i]) / (2.0 * h);
                let exact = jac[(i, j)];
                assert!(
                    (exact - fd).abs() <= 1e-4 * exact.abs().max(1.0),
                    "d r{i} / d x{j}: dual {exact} vs fd {fd}"
                );
            }
        }
    }

    #[test]
    fn converged_solves_satisfy_tolerances_and_failures_score_zero() {
        let vehicle = VehicleParameters::default();
        let settings = SolverSettings::default();
        let optimizer = OptimizerSettings::default();
        let solver = EquilibriumSolver::new(&vehicle, &settings, &optimizer);

        let mut converged = 0;
        for step in 0..8 {
            let delta = 0.03 + 0.01 * f64::from(step);
            let guess = Guess {
                velocity: 10.0,
                velocity_x: 10.0,
                ..Guess::default()
            };
            let solved = solver.solve(Candidate::new(delta, guess));
            assert_ne!(solved.status(), SolveStatus::Pending);
            assert!(solved.diagnostics().is_some());
            if solved.converged() {
                converged += 1;
                assert!(within_tolerances(solved.residuals(), &settings.tolerances));
                let state = solved.state().expect("converged state");
                assert_eq!(solved.fitness(), state.velocity);
                assert!(solved.fitness() > 0.0);
                assert!((state.lateral_acceleration - state.velocity.powi(2) / 50.0).abs() < 1e-9);
            } else {
                assert_eq!(solved.fitness(), 0.0);
                assert!(solved.state().is_none());
            }
        }
        assert!(converged >= 2, "only {converged} of 8 steering angles converged");
    }

    #[test]
    fn moderate_steering_converges_above_fifteen_metres_per_second() {
        let vehicle = VehicleParameters::default();
        let settings = SolverSettings::default();
        let optimizer = OptimizerSettings::default();
        let solver = EquilibriumSolver::new(&vehicle, &settings, &optimizer);

        for delta in [0.069, 0.079, 0.089] {
            let guess = Guess {
                velocity: 10.0,
                velocity_x: 10.0,
                ..Guess::default()
            };
            let solved = solver.solve(Candidate::new(delta, guess));
            assert_eq!(solved.status(), SolveStatus::Converged, "delta {delta}: {:?}", solved.diagnostics());
            assert_eq!(
                solved.diagnostics().map(|d| d.termination),
                Some(Termination::Converged)
            );
            assert!(within_tolerances(solved.residuals(), &settings.tolerances));

            let state = solved.state().expect("converged state");
            assert!(state.velocity > 15.0, "delta {delta}: V = {}", state.velocity);
            assert_eq!(solved.fitness(), state.velocity);
            assert!((state.yaw_rate - state.velocity / vehicle.turn_radius).abs() < 1e-12);
            let loads = vehicle.axle_loads();
            assert_eq!(state.front.normal_load, loads.front);
            assert_eq!(state.rear.normal_load, loads.rear);
        }
    }

    #[test]
    fn unreachable_tolerances_never_converge() {
        let vehicle = VehicleParameters::default();
        let settings = SolverSettings {
            max_iterations: 5,
            tolerances: [1e-30; EQUATION_COUNT],
        };
        let optimizer = OptimizerSettings::default();
        let solver = EquilibriumSolver::new(&vehicle, &settings, &optimizer);
        let guess = Guess {
            velocity: 15.0,
            velocity_x: 15.0,
            ..Guess::default()
        };
        let solved = solver.solve(Candidate::new(0.05, guess));
        assert_eq!(solved.status(), SolveStatus::Failed);
        assert_eq!(solved.fitness(), 0.0);
    }

    #[test]
    fn final_iterate_stays_inside_bounds() {
        let vehicle = VehicleParameters::default();
        let settings = SolverSettings::default();
        let optimizer = OptimizerSettings::default();
        let solver = EquilibriumSolver::new(&vehicle, &settings, &optimizer);
        let guess = Guess {
            alpha_front: 1.0,
            kappa_rear: -3.0,
            velocity: 150.0,
            velocity_x: 10.0,
            velocity_y: 0.0,
            ..Guess::default()
        };
        let solved = solver.solve(Candidate::new(0.1, guess));
        let x = solved.guess().to_array();
        for (value, bounds) in x.iter().zip(optimizer.variable_bounds()) {
            assert!(bounds.contains(*value), "{value} outside {bounds:?}");
        }
    }
}
