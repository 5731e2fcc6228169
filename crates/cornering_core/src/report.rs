//! Plain-text summary of an optimization run.

use crate::candidate::Candidate;
use crate::optimizer::{OptimizationResult, RunStatus};
use crate::settings::{Bounds, OptimizerSettings, SolverSettings};
use crate::vehicle::VehicleParameters;
use std::fmt;

pub const NO_SOLUTION_MESSAGE: &str = "The solver failed to find solutions for the given turn radius. \
Please try increasing the maximum number of iterations allowed or changing the vehicle parameters.";

/// Borrowed view of a run and its configuration, rendered through `Display`.
pub struct Summary<'a> {
    pub result: &'a OptimizationResult,
    pub vehicle: &'a VehicleParameters,
    pub solver: &'a SolverSettings,
    pub optimizer: &'a OptimizerSettings,
}

pub fn summary(
    result: &OptimizationResult,
    vehicle: &VehicleParameters,
    solver: &SolverSettings,
    optimizer: &OptimizerSettings,
) -> String {
    Summary {
        result,
        vehicle,
        solver,
        optimizer,
    }
    .to_string()
}

fn heading(f: &mut fmt::Formatter<'_>, title: &str) -> fmt::Result {
    writeln!(f, "{title}")?;
    writeln!(f, "{}", "=".repeat(title.len()))
}

fn rule(f: &mut fmt::Formatter<'_>, width: usize) -> fmt::Result {
    writeln!(f, "{}\n", "=".repeat(width))
}

fn range_deg(bounds: Bounds) -> String {
    format!("[{} , {}]", bounds.min.to_degrees(), bounds.max.to_degrees())
}

fn range(bounds: Bounds) -> String {
    format!("[{} , {}]", bounds.min, bounds.max)
}

impl Summary<'_> {
    fn best(&self, f: &mut fmt::Formatter<'_>, best: &Candidate) -> fmt::Result {
        writeln!(f, "======================")?;
        writeln!(f, "FINAL OPTIMIZED RESULT")?;
        writeln!(f, "======================")?;
        if self.result.status == RunStatus::Cancelled {
            writeln!(f, "(run cancelled; best candidate so far)")?;
        }
        let Some(state) = best.state() else {
            return writeln!(f, "Best candidate carries no equilibrium state.\n");
        };
        writeln!(f, "Max Velocity: {} m/s", best.fitness())?;
        writeln!(f, "Max Vx: {} m/s", state.velocity_x)?;
        writeln!(f, "Max Vy: {} m/s", state.velocity_y)?;
        writeln!(f, "Yaw Velocity: {} degrees/s", state.yaw_rate.to_degrees())?;
        writeln!(f, "Sideslip: {} degrees", state.sideslip.to_degrees())?;
        writeln!(f, "Max acc: {} m/s^2\n", state.lateral_acceleration)?;

        writeln!(f, "Optimized Delta: {} degrees", best.delta().to_degrees())?;
        writeln!(f, "Optimized Front Lateral Tire Force: {} N", state.front.lateral_force)?;
        writeln!(f, "Optimized Rear Lateral Tire Force: {} N", state.rear.lateral_force)?;
        writeln!(f, "Optimized Front Longitudinal Tire Force: {} N", state.front.longitudinal_force)?;
        writeln!(f, "Optimized Rear Longitudinal Tire Force: {} N", state.rear.longitudinal_force)?;
        writeln!(f, "Front Aligning Moment: {} Nm", state.front.aligning_moment)?;
        writeln!(f, "Rear Aligning Moment: {} Nm", state.rear.aligning_moment)?;
        writeln!(f, "Drag Force: {} N", state.drag_force)?;
        writeln!(f, "Rolling Resistance Force: {} N\n", state.rolling_resistance_force)?;

        writeln!(f, "Load Distribution on the front tire: {} N", state.front.normal_load)?;
        writeln!(f, "Load Distribution on the rear tire: {} N\n", state.rear.normal_load)?;

        writeln!(f, "Front Slip Angle: {} degree", state.front.slip_angle.to_degrees())?;
        writeln!(f, "Rear Slip Angle: {} degree", state.rear.slip_angle.to_degrees())?;
        writeln!(f, "Front Slip Ratio: {} [-]", state.front.slip_ratio)?;
        writeln!(f, "Rear Slip Ratio: {} [-]\n", state.rear.slip_ratio)?;
        rule(f, 24)
    }

    fn configuration(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.vehicle;
        heading(f, "Car Parameters:")?;
        writeln!(f, "Turn Radius: {} m", v.turn_radius)?;
        writeln!(f, "CG to Front Axle: {} m", v.cg_to_front)?;
        writeln!(f, "CG to Rear Axle: {} m", v.cg_to_rear)?;
        writeln!(f, "Vehicle Mass: {} kg", v.mass)?;
        writeln!(f, "Camber: {} degrees", v.camber.to_degrees())?;
        writeln!(f, "Drag Coefficient: {}", v.drag_coefficient)?;
        writeln!(f, "Frontal Area: {} m^2", v.frontal_area)?;
        writeln!(f, "Front Tire: {}", v.front_tire.name)?;
        writeln!(f, "Rear Tire: {}", v.rear_tire.name)?;
        rule(f, 15)?;

        heading(f, "Solver Parameters:")?;
        writeln!(f, "Max Iterations: {}", self.solver.max_iterations)?;
        rule(f, 18)?;

        let o = self.optimizer;
        heading(f, "Optimization Parameters:")?;
        writeln!(f, "Generations: {}", o.generations)?;
        writeln!(f, "Population Size: {}", o.population_size)?;
        writeln!(f, "Delta Range: {} degrees\n", range_deg(o.delta))?;
        writeln!(f, "Alpha_f Range: {} degrees", range_deg(o.alpha_front))?;
        writeln!(f, "Alpha_r Range: {} degrees", range_deg(o.alpha_rear))?;
        writeln!(f, "Kappa_f Range: {} [-]", range(o.kappa_front))?;
        writeln!(f, "Kappa_r Range: {} [-]", range(o.kappa_rear))?;
        rule(f, 24)
    }

    fn quality(&self, f: &mut fmt::Formatter<'_>, best: &Candidate) -> fmt::Result {
        writeln!(f)?;
        heading(f, "SOLVER QUALITY")?;
        if let Some(diag) = best.diagnostics() {
            writeln!(f, "Number of Iterations: {}", diag.iterations)?;
            writeln!(f, "Final Cost: {}\n", diag.final_cost)?;
        }
        writeln!(f, "Residuals:")?;
        for (i, r) in best.residuals().iter().enumerate() {
            writeln!(f, "r[{i}] = {r}")?;
        }
        writeln!(f, "Seed: {}", self.result.seed)?;
        writeln!(f, "Equilibrium Solves: {}", self.result.evaluations)?;
        rule(f, 15)
    }
}

impl fmt::Display for Summary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let best = match (&self.result.best, self.result.status) {
            (_, RunStatus::NoSolution) | (None, _) => return writeln!(f, "{NO_SOLUTION_MESSAGE}\n"),
            (Some(best), _) => best,
        };
        self.best(f, best)?;
        self.configuration(f)?;
        self.quality(f, best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::{AxleState, EquilibriumState, Guess, SolverDiagnostics};
    use crate::least_squares::Termination;

    fn converged_result() -> OptimizationResult {
        let axle = AxleState {
            slip_angle: -0.05,
            slip_ratio: 0.01,
            normal_load: 9000.0,
            longitudinal_force: 120.0,
            lateral_force: 4500.0,
            aligning_moment: -30.0,
        };
        let state = EquilibriumState {
            velocity: 21.5,
            velocity_x: 21.4,
            velocity_y: -1.2,
            yaw_rate: 0.43,
            sideslip: -0.056,
            lateral_acceleration: 9.2,
            drag_force: 90.6,
            rolling_resistance_force: -9.0,
            front: axle,
            rear: axle,
        };
        let diagnostics = SolverDiagnostics {
            termination: Termination::Converged,
            iterations: 12,
            initial_cost: 3.0,
            final_cost: 1e-14,
        };
        let best = Candidate::new(0.05, Guess::default()).finish([1e-9; 7], diagnostics, Some(state));
        OptimizationResult {
            status: RunStatus::Completed,
            best: Some(best),
            seed: 42,
            evaluations: 3,
            generations_completed: 1,
        }
    }

    #[test]
    fn converged_summary_lists_results_and_settings() {
        let text = summary(
            &converged_result(),
            &VehicleParameters::default(),
            &SolverSettings::default(),
            &OptimizerSettings::default(),
        );
        assert!(text.starts_with("======================\nFINAL OPTIMIZED RESULT\n"));
        assert!(text.contains("Max Velocity: 21.5 m/s"));
        assert!(text.contains("Turn Radius: 50 m"));
        assert!(text.contains("Max Iterations: 100"));
        assert!(text.contains("Number of Iterations: 12"));
        assert!(text.contains("Population Size: 1"));
        assert_eq!(text.matches("r[").count(), 7);
        assert!(text.contains("r[6] = 0.000000001"));
        assert!(!text.contains(NO_SOLUTION_MESSAGE));
    }

    #[test]
    fn empty_run_reports_no_solution() {
        let result = OptimizationResult {
            status: RunStatus::NoSolution,
            best: None,
            seed: 1,
            evaluations: 1000,
            generations_completed: 0,
        };
        let text = summary(
            &result,
            &VehicleParameters::default(),
            &SolverSettings::default(),
            &OptimizerSettings::default(),
        );
        assert_eq!(text, format!("{NO_SOLUTION_MESSAGE}\n\n"));
    }
}
