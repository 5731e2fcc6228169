//! Genetic search over steering inputs for the fastest steady-state turn.
//!
//! Each individual is a steering angle plus solver guesses; its fitness is
//! the equilibrium speed its solve converges to. The run seeds a population
//! by rejection sampling, then breeds it for a fixed number of generations
//! with elitism, directed mutation of the leaders and tournament crossover.

pub mod operators;
pub mod progress;
pub mod worker;

use crate::candidate::{sort_by_fitness, Candidate};
use crate::equilibrium::EquilibriumSolver;
use crate::error::ConfigError;
use crate::settings::{OptimizerSettings, SolverSettings};
use crate::vehicle::VehicleParameters;
use progress::{ProgressReporter, ProgressTracker};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Solve attempts per initial-population slot before the run gives up.
pub const MAX_SEED_ATTEMPTS: usize = 1000;
/// Consecutive rejected children after which a generation is topped up
/// with survivors of the previous one.
pub const MAX_REJECTED_CHILDREN: usize = 1000;
/// Speed guess [m/s] before any individual has converged.
pub const INITIAL_VELOCITY_GUESS: f64 = 30.0;
/// Leaders whose clones are mutated each generation.
const MUTATION_PARENTS: usize = 5;

/// Cooperative stop flag shared between a run and its owner.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    /// Fixes the random stream for replay; drawn at random when `None`.
    pub seed: Option<u64>,
    /// Solve offspring batches on the rayon pool.
    pub parallel: bool,
    #[serde(skip)]
    pub cancel: CancellationToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Completed,
    /// No initial individual converged within the retry budget.
    NoSolution,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub status: RunStatus,
    pub best: Option<Candidate>,
    /// Seed the run's RNG was built from.
    pub seed: u64,
    /// Equilibrium solves performed.
    pub evaluations: usize,
    pub generations_completed: usize,
}

impl OptimizationResult {
    pub fn no_solution(&self) -> bool {
        self.status == RunStatus::NoSolution
    }
}

enum SlotOutcome {
    Converged(Candidate),
    Exhausted,
    Cancelled,
}

/// Validated, immutable configuration of one optimization run.
#[derive(Debug, Clone)]
pub struct GeneticOptimizer {
    vehicle: VehicleParameters,
    solver: SolverSettings,
    settings: OptimizerSettings,
}

struct RunState<'r> {
    rng: StdRng,
    seed: u64,
    options: &'r RunOptions,
    reporter: &'r ProgressReporter<'r>,
    tracker: ProgressTracker,
    evaluations: usize,
    generations_completed: usize,
}

impl RunState<'_> {
    fn cancelled(&self) -> bool {
        self.options.cancel.is_cancelled()
    }

    fn accept(&mut self) {
        self.tracker.advance(self.reporter);
    }

    fn conclude(mut self, status: RunStatus, best: Option<Candidate>) -> OptimizationResult {
        self.tracker.finish(self.reporter);
        info!(
            ?status,
            seed = self.seed,
            evaluations = self.evaluations,
            generations = self.generations_completed,
            best_velocity = ?best.as_ref().map(Candidate::fitness),
            "optimization finished"
        );
        OptimizationResult {
            status,
            best,
            seed: self.seed,
            evaluations: self.evaluations,
            generations_completed: self.generations_completed,
        }
    }
}

impl GeneticOptimizer {
    pub fn new(
        vehicle: VehicleParameters,
        solver: SolverSettings,
        settings: OptimizerSettings,
    ) -> Result<Self, ConfigError> {
        vehicle.validate()?;
        solver.validate()?;
        settings.validate()?;
        Ok(Self {
            vehicle,
            solver,
            settings,
        })
    }

    pub fn vehicle(&self) -> &VehicleParameters {
        &self.vehicle
    }

    pub fn solver_settings(&self) -> &SolverSettings {
        &self.solver
    }

    pub fn settings(&self) -> &OptimizerSettings {
        &self.settings
    }

    pub fn run(&self, options: &RunOptions) -> OptimizationResult {
        self.run_with_progress(options, &ProgressReporter::new())
    }

    #[instrument(skip_all, name = "genetic_optimizer")]
    pub fn run_with_progress(
        &self,
        options: &RunOptions,
        reporter: &ProgressReporter<'_>,
    ) -> OptimizationResult {
        let seed = options.seed.unwrap_or_else(rand::random);
        let pop_size = self.settings.population_size;
        let generations = self.settings.generations;
        info!(seed, pop_size, generations, parallel = options.parallel, "starting optimization");

        let solver = EquilibriumSolver::new(&self.vehicle, &self.solver, &self.settings);
        let mut run = RunState {
            rng: StdRng::seed_from_u64(seed),
            seed,
            options,
            reporter,
            tracker: ProgressTracker::new(generations, pop_size),
            evaluations: 0,
            generations_completed: 0,
        };

        // --- Initial population ---
        let mut population = Vec::with_capacity(pop_size);
        let mut velocity_guess = INITIAL_VELOCITY_GUESS;
        for slot in 0..pop_size {
            match self.seed_slot(&solver, &mut run, velocity_guess) {
                SlotOutcome::Converged(candidate) => {
                    velocity_guess = velocity_guess.max(candidate.fitness());
                    population.push(candidate);
                    run.accept();
                }
                SlotOutcome::Exhausted => {
                    warn!(slot, attempts = MAX_SEED_ATTEMPTS, "no converged individual for slot");
                    return run.conclude(RunStatus::NoSolution, None);
                }
                SlotOutcome::Cancelled => {
                    sort_by_fitness(&mut population);
                    return run.conclude(RunStatus::Cancelled, population.into_iter().next());
                }
            }
        }
        debug!(velocity_guess, "initial population seeded");

        // --- Generations ---
        for generation in 0..generations {
            sort_by_fitness(&mut population);
            match self.breed(&solver, &mut run, &population) {
                Some(next) => population = next,
                None => return run.conclude(RunStatus::Cancelled, population.into_iter().next()),
            }
            run.generations_completed += 1;
            debug!(
                generation,
                best = population.iter().map(Candidate::fitness).fold(0.0, f64::max),
                "generation complete"
            );
        }

        sort_by_fitness(&mut population);
        run.conclude(RunStatus::Completed, population.into_iter().next())
    }

    fn seed_slot(&self, solver: &EquilibriumSolver<'_>, run: &mut RunState<'_>, velocity_guess: f64) -> SlotOutcome {
        for _ in 0..MAX_SEED_ATTEMPTS {
            if run.cancelled() {
                return SlotOutcome::Cancelled;
            }
            let candidate = operators::sample(&mut run.rng, &self.settings, velocity_guess);
            let solved = solver.solve(candidate);
            run.evaluations += 1;
            if solved.converged() {
                return SlotOutcome::Converged(solved);
            }
        }
        SlotOutcome::Exhausted
    }

    /// Produces the next generation from a population sorted best first,
    /// or `None` if the run was cancelled midway.
    fn breed(
        &self,
        solver: &EquilibriumSolver<'_>,
        run: &mut RunState<'_>,
        population: &[Candidate],
    ) -> Option<Vec<Candidate>> {
        if run.cancelled() {
            return None;
        }
        let pop_size = self.settings.population_size;
        let mut next = Vec::with_capacity(pop_size);

        let elite_count = pop_size / 20;
        for elite in population.iter().take(elite_count) {
            next.push(elite.clone());
            run.accept();
        }

        let leaders = population.len().min(MUTATION_PARENTS);
        let mutants: Vec<Candidate> = (0..pop_size / 20)
            .map(|i| operators::mutate(&mut run.rng, &population[i % leaders], &self.settings))
            .collect();
        for solved in self.solve_batch(solver, mutants, run.options.parallel) {
            run.evaluations += 1;
            if solved.converged() {
                next.push(solved);
                run.accept();
            }
        }

        let mut rejected_streak = 0usize;
        while next.len() < pop_size {
            if run.cancelled() {
                return None;
            }
            let children: Vec<Candidate> = (0..pop_size - next.len())
                .map(|_| {
                    let first = operators::tournament(&mut run.rng, population);
                    let second = operators::tournament(&mut run.rng, population);
                    operators::crossover(&mut run.rng, &population[first], &population[second], &self.settings)
                })
                .collect();

            for child in self.solve_batch(solver, children, run.options.parallel) {
                run.evaluations += 1;
                if child.fitness() > 0.0 {
                    next.push(child);
                    run.accept();
                    rejected_streak = 0;
                } else {
                    rejected_streak += 1;
                }
            }

            if rejected_streak >= MAX_REJECTED_CHILDREN {
                let missing = pop_size - next.len();
                warn!(missing, rejected_streak, "crossover stalled, carrying survivors over");
                for survivor in population.iter().take(missing) {
                    next.push(survivor.clone());
                    run.accept();
                }
            }
        }
        Some(next)
    }

    fn solve_batch(&self, solver: &EquilibriumSolver<'_>, batch: Vec<Candidate>, parallel: bool) -> Vec<Candidate> {
        if parallel {
            batch.into_par_iter().map(|c| solver.solve(c)).collect()
        } else {
            batch.into_iter().map(|c| solver.solve(c)).collect()
        }
    }
}
