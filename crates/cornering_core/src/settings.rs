use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Number of equilibrium unknowns and residuals.
pub const EQUATION_COUNT: usize = 7;

/// Closed interval `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Symmetric interval `[-half_width, half_width]`.
    pub const fn symmetric(half_width: f64) -> Self {
        Self::new(-half_width, half_width)
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn validate(&self, field: &'static str) -> Result<(), ConfigError> {
        if !(self.min.is_finite() && self.max.is_finite()) || self.min > self.max {
            return Err(ConfigError::InvalidBounds {
                field,
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    /// Iteration cap for each equilibrium solve.
    pub max_iterations: usize,
    /// Per-residual acceptance tolerance, index-aligned with the residuals.
    pub tolerances: [f64; EQUATION_COUNT],
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerances: [1e-6; EQUATION_COUNT],
        }
    }
}

impl SolverSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iterations == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_iterations",
                reason: "must be greater than zero".to_string(),
            });
        }
        for (index, &value) in self.tolerances.iter().enumerate() {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidTolerance { index, value });
            }
        }
        Ok(())
    }
}

/// Genetic search configuration and the box every candidate lives in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerSettings {
    pub generations: usize,
    pub population_size: usize,
    /// Steering angle [rad].
    pub delta: Bounds,
    /// Front slip angle [rad].
    pub alpha_front: Bounds,
    /// Rear slip angle [rad].
    pub alpha_rear: Bounds,
    pub kappa_front: Bounds,
    pub kappa_rear: Bounds,
    /// Resultant speed [m/s].
    pub velocity: Bounds,
    pub velocity_x: Bounds,
    pub velocity_y: Bounds,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            generations: 1,
            population_size: 1,
            delta: Bounds::symmetric(0.3),
            alpha_front: Bounds::symmetric(0.27),
            alpha_rear: Bounds::symmetric(0.27),
            kappa_front: Bounds::symmetric(0.1),
            kappa_rear: Bounds::symmetric(0.1),
            velocity: Bounds::new(0.0, 100.0),
            velocity_x: Bounds::new(0.0, 100.0),
            velocity_y: Bounds::symmetric(50.0),
        }
    }
}

impl OptimizerSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "population_size",
                reason: "must be greater than zero".to_string(),
            });
        }
        self.delta.validate("delta")?;
        self.alpha_front.validate("alpha_front")?;
        self.alpha_rear.validate("alpha_rear")?;
        self.kappa_front.validate("kappa_front")?;
        self.kappa_rear.validate("kappa_rear")?;
        self.velocity.validate("velocity")?;
        self.velocity_x.validate("velocity_x")?;
        self.velocity_y.validate("velocity_y")
    }

    /// Box constraints in guess order
    /// (`alpha_F, alpha_R, kappa_F, kappa_R, V, V_x, V_y`).
    pub fn variable_bounds(&self) -> [Bounds; EQUATION_COUNT] {
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
}
