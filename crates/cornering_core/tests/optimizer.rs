use cornering_core::equilibrium::within_tolerances;
use cornering_core::optimizer::worker::{self, OptimizerEvent};
use cornering_core::report;
use cornering_core::settings::EQUATION_COUNT;
use cornering_core::{
    GeneticOptimizer, OptimizationResult, OptimizerSettings, RunOptions, RunStatus, SolverSettings,
    VehicleParameters,
};

fn run(solver: SolverSettings, settings: OptimizerSettings, options: &RunOptions) -> OptimizationResult {
    GeneticOptimizer::new(VehicleParameters::default(), solver, settings)
        .expect("valid configuration")
        .run(options)
}

fn seeded(seed: u64, parallel: bool) -> RunOptions {
    RunOptions {
        seed: Some(seed),
        parallel,
        ..RunOptions::default()
    }
}

fn unreachable_solver() -> SolverSettings {
    SolverSettings {
        max_iterations: 2,
        tolerances: [1e-30; EQUATION_COUNT],
    }
}

fn twenty_by_three() -> OptimizerSettings {
    OptimizerSettings {
        population_size: 20,
        generations: 3,
        ..OptimizerSettings::default()
    }
}

#[test]
fn default_vehicle_reaches_known_cornering_speed() {
    let solver = SolverSettings::default();
    let result = run(solver, twenty_by_three(), &seeded(0, false));
    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.generations_completed, 3);

    let best = result.best.as_ref().expect("best candidate");
    assert!(best.converged());
    assert!((best.fitness() - 25.876).abs() < 0.02, "best speed {}", best.fitness());
    assert!(within_tolerances(best.residuals(), &solver.tolerances));

    let state = best.state().expect("converged state");
    assert!(state.lateral_acceleration > 0.0);
    assert!(state.front.normal_load > 0.0 && state.rear.normal_load > 0.0);

    let text = report::summary(&result, &VehicleParameters::default(), &solver, &twenty_by_three());
    assert!(text.contains("FINAL OPTIMIZED RESULT"));
    assert!(!text.contains(report::NO_SOLUTION_MESSAGE));
}

#[test]
fn impossible_tolerances_leave_no_solution() {
    let result = run(unreachable_solver(), OptimizerSettings::default(), &seeded(3, false));
    assert_eq!(result.status, RunStatus::NoSolution);
    assert!(result.best.is_none());

    let text = report::summary(
        &result,
        &VehicleParameters::default(),
        &unreachable_solver(),
        &OptimizerSettings::default(),
    );
    assert!(text.starts_with(report::NO_SOLUTION_MESSAGE));
}

#[test]
fn same_seed_replays_the_same_run() {
    let settings = OptimizerSettings {
        population_size: 4,
        generations: 2,
        ..OptimizerSettings::default()
    };
    let first = run(SolverSettings::default(), settings, &seeded(2024, false));
    let second = run(SolverSettings::default(), settings, &seeded(2024, false));
    assert_eq!(first.status, RunStatus::Completed);
    assert_eq!(first, second);
}

#[test]
fn parallel_batches_match_serial_run() {
    let serial = run(SolverSettings::default(), twenty_by_three(), &seeded(0, false));
    let parallel = run(SolverSettings::default(), twenty_by_three(), &seeded(0, true));
    assert_eq!(serial.status, RunStatus::Completed);
    assert_eq!(parallel.status, RunStatus::Completed);
    assert_eq!(serial, parallel);
    let best = parallel.best.as_ref().expect("best candidate");
    assert!(best.fitness() > 0.0);
}

#[test]
fn worker_reports_progress_and_finishes() {
    let handle = worker::spawn(
        VehicleParameters::default(),
        SolverSettings::default(),
        OptimizerSettings {
            population_size: 3,
            ..OptimizerSettings::default()
        },
        seeded(11, false),
    )
    .expect("spawn worker");

    let mut progress = Vec::new();
    let result = loop {
        match handle.recv().expect("worker ended without a result") {
            OptimizerEvent::Progress(p) => progress.push(p),
            OptimizerEvent::Finished(result) => break result,
        }
    };
    assert_eq!(result.status, RunStatus::Completed);
    assert!(progress.windows(2).all(|w| w[0] < w[1]), "{progress:?}");
    assert_eq!(progress.last(), Some(&100));
}

#[test]
fn result_serializes_with_its_status() {
    let result = run(unreachable_solver(), OptimizerSettings::default(), &seeded(1, false));
    let json = serde_json::to_value(&result).expect("serialize result");
    assert_eq!(json["status"], "NoSolution");
    assert_eq!(json["seed"], 1);
    assert!(json["best"].is_null());
}
