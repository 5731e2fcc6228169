pub mod autodiff;
pub mod candidate;
pub mod equilibrium;
pub mod error;
pub mod least_squares;
/// The `cornering_core` crate finds the highest steady-state cornering speed
/// of a single-track vehicle model on a constant-radius turn.
/// Tire and equilibrium code is generic over a scalar type, so the same
/// functions run on `f64` and on Dual numbers for exact Jacobians.
///
/// Key components:
/// - **Tire**: Pacejka Magic Formula 5.2, pure and combined slip, plus characteristic curves.
/// - **Equilibrium**: seven-equation force/moment/kinematic balance solved by a bounded Huber-loss Levenberg–Marquardt.
/// - **Optimizer**: seeded genetic search over steering angle, optionally parallel, with a background worker.
/// - **Report**: plain-text summary of a run.
pub mod optimizer;
pub mod report;
pub mod settings;
pub mod tire;
pub mod traits;
pub mod vehicle;

pub use candidate::{Candidate, EquilibriumState, Guess};
pub use error::ConfigError;
pub use optimizer::{GeneticOptimizer, OptimizationResult, RunOptions, RunStatus};
pub use settings::{Bounds, OptimizerSettings, SolverSettings};
pub use tire::TireParameters;
pub use vehicle::VehicleParameters;
