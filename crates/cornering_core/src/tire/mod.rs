//! Pacejka Magic Formula 5.2 tire model.

pub mod curves;
pub mod magic_formula;
pub mod params;

pub use magic_formula::{
    combined_aligning_moment, combined_lateral_force, combined_longitudinal_force,
    pure_aligning_moment, pure_lateral_force, pure_longitudinal_force,
};
pub use params::TireParameters;
