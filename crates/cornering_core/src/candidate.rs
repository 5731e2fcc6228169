//! Population members and the equilibrium state a solve attaches to them.

use crate::least_squares::Termination;
use crate::settings::EQUATION_COUNT;
use serde::{Deserialize, Serialize};

/// Initial values for the seven equilibrium unknowns.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Guess {
    pub alpha_front: f64,
    pub alpha_rear: f64,
    pub kappa_front: f64,
    pub kappa_rear: f64,
    pub velocity: f64,
    pub velocity_x: f64,
    pub velocity_y: f64,
}

impl Guess {
    pub fn to_array(&self) -> [f64; EQUATION_COUNT] {
        [
            self.alpha_front,
            self.alpha_rear,
            self.kappa_front,
            self.kappa_rear,
            self.velocity,
            self.velocity_x,
            self.velocity_y,
        ]
    }

    pub fn from_array(x: [f64; EQUATION_COUNT]) -> Self {
        let [alpha_front, alpha_rear, kappa_front, kappa_rear, velocity, velocity_x, velocity_y] = x;
        Self {
            alpha_front,
            alpha_rear,
            kappa_front,
            kappa_rear,
            velocity,
            velocity_x,
            velocity_y,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveStatus {
    Pending,
    Converged,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverDiagnostics {
    pub termination: Termination,
    pub iterations: usize,
    pub initial_cost: f64,
    pub final_cost: f64,
}

/// Tire quantities of one axle at equilibrium.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxleState {
    pub slip_angle: f64,
    pub slip_ratio: f64,
    pub normal_load: f64,
    pub longitudinal_force: f64,
    pub lateral_force: f64,
    pub aligning_moment: f64,
}

/// Derived quantities of a converged steady-state turn.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquilibriumState {
    pub velocity: f64,
    pub velocity_x: f64,
    pub velocity_y: f64,
    /// [rad/s]
    pub yaw_rate: f64,
    /// Body sideslip `atan2(V_y, V_x)` [rad].
    pub sideslip: f64,
    /// [m/s²]
    pub lateral_acceleration: f64,
    pub drag_force: f64,
    pub rolling_resistance_force: f64,
    pub front: AxleState,
    pub rear: AxleState,
}

/// One steering input and everything its equilibrium solve produced.
///
/// A candidate starts [`SolveStatus::Pending`]; solving consumes it and hands
/// it back converged or failed. Fitness is the equilibrium speed when
/// converged and `0` otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    delta: f64,
    guess: Guess,
    status: SolveStatus,
    fitness: f64,
    residuals: [f64; EQUATION_COUNT],
    diagnostics: Option<SolverDiagnostics>,
    state: Option<EquilibriumState>,
}

impl Candidate {
    pub fn new(delta: f64, guess: Guess) -> Self {
        Self {
            delta,
            guess,
            status: SolveStatus::Pending,
            fitness: 0.0,
            residuals: [0.0; EQUATION_COUNT],
            diagnostics: None,
            state: None,
        }
    }

    /// Fresh pending copy keeping the steering angle and (warm-started)
    /// guesses.
    pub fn respawn(&self) -> Self {
        Self::new(self.delta, self.guess)
    }

    /// Steering angle [rad].
    pub fn delta(&self) -> f64 {
        self.delta
    }

    pub fn guess(&self) -> &Guess {
        &self.guess
    }

    pub fn status(&self) -> SolveStatus {
        self.status
    }

    pub fn converged(&self) -> bool {
        self.status == SolveStatus::Converged
    }

    pub fn fitness(&self) -> f64 {
        self.fitness
    }

    /// Residuals re-evaluated at the final iterate.
    pub fn residuals(&self) -> &[f64; EQUATION_COUNT] {
        &self.residuals
    }

    pub fn diagnostics(&self) -> Option<&SolverDiagnostics> {
        self.diagnostics.as_ref()
    }

    pub fn state(&self) -> Option<&EquilibriumState> {
        self.state.as_ref()
    }

    pub(crate) fn set_guess(&mut self, guess: Guess) {
        self.guess = guess;
    }

    pub(crate) fn finish(
        mut self,
        residuals: [f64; EQUATION_COUNT],
        diagnostics: SolverDiagnostics,
        state: Option<EquilibriumState>,
    ) -> Self {
        self.residuals = residuals;
        self.diagnostics = Some(diagnostics);
        match state {
            Some(state) => {
                self.status = SolveStatus::Converged;
                self.fitness = state.velocity;
                self.state = Some(state);
            }
            None => {
                self.status = SolveStatus::Failed;
                self.fitness = 0.0;
                self.state = None;
            }
        }
        self
    }
}

/// Orders candidates best first; NaN-free because fitness is a converged
/// speed or zero.
pub fn sort_by_fitness(population: &mut [Candidate]) {
    population.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));
}
