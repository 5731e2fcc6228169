//! Tire characteristic curves for plotting collaborators.
//!
//! Sweeps are index-based so the end point is hit exactly instead of
//! drifting with accumulated floating-point steps.

use super::magic_formula::{pure_aligning_moment, pure_lateral_force, pure_longitudinal_force};
use super::params::TireParameters;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Operating point a curve is sampled at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TireLoadCase {
    /// Vertical load [N].
    pub normal_force: f64,
    /// Inclination angle [rad].
    pub inclination: f64,
}

/// Inclusive range `[start, end]` visited in increments of `step`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sweep {
    pub start: f64,
    pub end: f64,
    pub step: f64,
}

impl Sweep {
    /// Slip ratio sweep `[-0.5, 0.5]` in steps of `0.005`.
    pub fn slip_ratio() -> Self {
        Self {
            start: -0.5,
            end: 0.5,
            step: 0.005,
        }
    }

    /// Slip angle sweep in degrees, `[-15, 15]` in steps of `0.01`.
    pub fn slip_angle_deg() -> Self {
        Self {
            start: -15.0,
            end: 15.0,
            step: 0.01,
        }
    }

    fn samples(&self) -> Result<impl Iterator<Item = f64>, ConfigError> {
        if !(self.step.is_finite() && self.step > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "sweep.step",
                reason: format!("must be positive, got {}", self.step),
            });
        }
        if !(self.start.is_finite() && self.end.is_finite()) || self.start > self.end {
            return Err(ConfigError::InvalidBounds {
                field: "sweep",
                min: self.start,
                max: self.end,
            });
        }
        let count = ((self.end - self.start) / self.step + 1e-9).floor() as usize + 1;
        let (start, step) = (self.start, self.step);
        Ok((0..count).map(move |i| start + step * i as f64))
    }
}

/// One sample of a characteristic curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    /// Slip ratio [-] or slip angle [deg], in the unit of the sweep.
    pub slip: f64,
    /// Force [N] or moment [Nm].
    pub value: f64,
}

/// Pure longitudinal force against slip ratio.
pub fn longitudinal_force_curve(
    tire: &TireParameters,
    load: TireLoadCase,
    sweep: Sweep,
) -> Result<Vec<CurvePoint>, ConfigError> {
    Ok(sweep
        .samples()?
        .map(|kappa| CurvePoint {
            slip: kappa,
            value: pure_longitudinal_force(tire, load.normal_force, kappa, load.inclination),
        })
        .collect())
}

/// Pure lateral force against slip angle given in degrees.
pub fn lateral_force_curve(
    tire: &TireParameters,
    load: TireLoadCase,
    sweep: Sweep,
) -> Result<Vec<CurvePoint>, ConfigError> {
    Ok(sweep
        .samples()?
        .map(|deg| CurvePoint {
            slip: deg,
            value: pure_lateral_force(tire, load.normal_force, deg.to_radians(), load.inclination),
        })
        .collect())
}

/// Pure self-aligning moment against slip angle given in degrees.
pub fn aligning_moment_curve(
    tire: &TireParameters,
    load: TireLoadCase,
    sweep: Sweep,
) -> Result<Vec<CurvePoint>, ConfigError> {
    Ok(sweep
        .samples()?
        .map(|deg| CurvePoint {
            slip: deg,
            value: pure_aligning_moment(tire, load.normal_force, deg.to_radians(), load.inclination),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load() -> TireLoadCase {
        TireLoadCase {
            normal_force: 4000.0,
            inclination: 0.0,
        }
    }

    #[test]
    fn default_sweeps_hit_both_end_points() {
        let tire = TireParameters::default_front();
        let fx = longitudinal_force_curve(&tire, load(), Sweep::slip_ratio()).expect("fx curve");
        assert_eq!(fx.len(), 201);
        assert_eq!(fx[0].slip, -0.5);
        assert!((fx[200].slip - 0.5).abs() < 1e-12);

        let fy = lateral_force_curve(&tire, load(), Sweep::slip_angle_deg()).expect("fy curve");
        assert_eq!(fy.len(), 3001);
        assert!(fy[1500].slip.abs() < 1e-9);
        assert!(fy[1500].value.abs() < 1e-6);
    }

    #[test]
    fn lateral_curve_is_odd_without_camber() {
        let tire = TireParameters::default_front();
        let sweep = Sweep {
            start: -10.0,
            end: 10.0,
            step: 0.5,
        };
        let fy = lateral_force_curve(&tire, load(), sweep).expect("fy curve");
        let n = fy.len();
        for i in 0..n / 2 {
            let (lo, hi) = (fy[i].value, fy[n - 1 - i].value);
            assert!((lo + hi).abs() < 1e-6 * hi.abs().max(1.0), "at {}", fy[i].slip);
        }
    }

    #[test]
    fn aligning_moment_curve_is_finite() {
        let tire = TireParameters::default_rear();
        let mz = aligning_moment_curve(&tire, load(), Sweep::slip_angle_deg()).expect("mz curve");
        assert!(mz.iter().all(|p| p.value.is_finite()));
    }

    #[test]
    fn rejects_non_positive_step() {
        let tire = TireParameters::default_front();
        let sweep = Sweep {
            start: 0.0,
            end: 1.0,
            step: 0.0,
        };
        let err = longitudinal_force_curve(&tire, load(), sweep).expect_err("zero step");
        assert!(format!("{err}").contains("sweep.step"));
    }
}
