//! Sampling, selection, crossover and mutation.
//!
//! Every operator draws from the caller's RNG so a seeded run replays
//! exactly regardless of how solves are scheduled afterwards.

use crate::candidate::{Candidate, Guess};
use crate::settings::{Bounds, OptimizerSettings};
use rand::Rng;
use std::f64::consts::TAU;

pub const TOURNAMENT_SIZE: usize = 3;
/// BLX-alpha expansion of the parents' steering interval.
pub const CROSSOVER_EXPANSION: f64 = 1.5;
pub const MUTATION_RATE: f64 = 0.25;
pub const SIGMA_DELTA: f64 = 0.01;
pub const SIGMA_SLIP_ANGLE: f64 = 0.05;
pub const SIGMA_SLIP_RATIO: f64 = 0.2;

/// Uniform draw from the closed interval; degenerate intervals return `min`.
pub fn uniform<R: Rng>(rng: &mut R, min: f64, max: f64) -> f64 {
    if min < max {
        rng.random_range(min..=max)
    } else {
        min
    }
}

fn uniform_in<R: Rng>(rng: &mut R, bounds: Bounds) -> f64 {
    uniform(rng, bounds.min, bounds.max)
}

/// Zero-mean normal draw via the Box–Muller transform.
pub fn gaussian<R: Rng>(rng: &mut R, sigma: f64) -> f64 {
    // 1 - U keeps u1 in (0, 1] so ln stays finite.
    let u1 = 1.0 - rng.random::<f64>();
    let u2 = rng.random::<f64>();
    sigma * (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
}

/// Random individual for the initial population.
///
/// Slip guesses come from their own axle's bounds; the speed guess is the
/// best speed seen so far with its components drawn below it.
pub fn sample<R: Rng>(rng: &mut R, settings: &OptimizerSettings, velocity_guess: f64) -> Candidate {
    let delta = uniform_in(rng, settings.delta);
    let guess = Guess {
        alpha_front: uniform_in(rng, settings.alpha_front),
        alpha_rear: uniform_in(rng, settings.alpha_rear),
        kappa_front: uniform_in(rng, settings.kappa_front),
        kappa_rear: uniform_in(rng, settings.kappa_rear),
        velocity: velocity_guess,
        velocity_x: uniform(rng, 0.0, velocity_guess),
        velocity_y: uniform(rng, 0.0, 0.1 * velocity_guess),
    };
    Candidate::new(delta, guess)
}

/// Index of the fittest of `TOURNAMENT_SIZE` draws with replacement.
pub fn tournament<R: Rng>(rng: &mut R, population: &[Candidate]) -> usize {
    let mut winner = rng.random_range(0..population.len());
    for _ in 1..TOURNAMENT_SIZE {
        let challenger = rng.random_range(0..population.len());
        if population[challenger].fitness() > population[winner].fitness() {
            winner = challenger;
        }
    }
    winner
}

/// Blends two parents into one pending child.
pub fn crossover<R: Rng>(
    rng: &mut R,
    first: &Candidate,
    second: &Candidate,
    settings: &OptimizerSettings,
) -> Candidate {
    let (d1, d2) = (first.delta(), second.delta());
    let spread = (d1 - d2).abs() * CROSSOVER_EXPANSION;
    let delta = settings
        .delta
        .clamp(uniform(rng, d1.min(d2) - spread, d1.max(d2) + spread));

    let (g1, g2) = (first.guess(), second.guess());
    let mut pick = |a: f64, b: f64| if rng.random::<bool>() { a } else { b };
    let alpha_front = pick(g1.alpha_front, g2.alpha_front);
    let alpha_rear = pick(g1.alpha_rear, g2.alpha_rear);
    let kappa_front = pick(g1.kappa_front, g2.kappa_front);
    let kappa_rear = pick(g1.kappa_rear, g2.kappa_rear);

    let velocity = g1.velocity.max(g2.velocity);
    Candidate::new(
        delta,
        Guess {
            alpha_front,
            alpha_rear,
            kappa_front,
            kappa_rear,
            velocity,
            velocity_x: 0.8 * velocity,
            velocity_y: 0.5 * velocity,
        },
    )
}

/// Pending copy of `parent` with each gene perturbed at `MUTATION_RATE`.
pub fn mutate<R: Rng>(rng: &mut R, parent: &Candidate, settings: &OptimizerSettings) -> Candidate {
    let mut perturb = |value: f64, sigma: f64, bounds: Bounds| {
        if rng.random::<f64>() < MUTATION_RATE {
            bounds.clamp(value + gaussian(rng, sigma))
        } else {
            value
        }
    };

    let guess = parent.guess();
    let delta = perturb(parent.delta(), SIGMA_DELTA, settings.delta);
    let mutated = Guess {
        alpha_front: perturb(guess.alpha_front, SIGMA_SLIP_ANGLE, settings.alpha_front),
        alpha_rear: perturb(guess.alpha_rear, SIGMA_SLIP_ANGLE, settings.alpha_rear),
        kappa_front: perturb(guess.kappa_front, SIGMA_SLIP_RATIO, settings.kappa_front),
        kappa_rear: perturb(guess.kappa_rear, SIGMA_SLIP_RATIO, settings.kappa_rear),
        ..*guess
    };
    Candidate::new(delta, mutated)
}
