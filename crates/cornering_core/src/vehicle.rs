use crate::error::ConfigError;
use crate::tire::TireParameters;
use crate::traits::Scalar;
use serde::{Deserialize, Serialize};

/// Gravitational acceleration [m/s²].
pub const GRAVITY: f64 = 9.81;
/// Air density [kg/m³].
pub const AIR_DENSITY: f64 = 1.225;

/// Fixed physical description of the vehicle on its turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleParameters {
    /// Turn radius `R` [m].
    pub turn_radius: f64,
    /// CG to front axle `a` [m].
    pub cg_to_front: f64,
    /// CG to rear axle `b` [m].
    pub cg_to_rear: f64,
    /// Mass `m` [kg].
    pub mass: f64,
    /// Wheel inclination `gamma_w` [rad], shared by both axles.
    pub camber: f64,
    /// Drag coefficient `Cd`.
    pub drag_coefficient: f64,
    /// Frontal area `Af` [m²].
    pub frontal_area: f64,
    /// Front rolling-resistance coefficient `f_r_F`.
    pub rolling_resistance: f64,
    pub front_tire: TireParameters,
    pub rear_tire: TireParameters,
}

impl Default for VehicleParameters {
    fn default() -> Self {
        Self {
            turn_radius: 50.0,
            cg_to_front: 1.2,
            cg_to_rear: 1.6,
            mass: 1600.0,
            camber: 0.0,
            drag_coefficient: 0.32,
            frontal_area: 1.0,
            rolling_resistance: 0.001,
            front_tire: TireParameters::default_front(),
            rear_tire: TireParameters::default_rear(),
        }
    }
}

/// Static axle loads from the longitudinal CG position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxleLoads {
    pub front: f64,
    pub rear: f64,
}

impl VehicleParameters {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::positive("turn_radius", self.turn_radius)?;
        ConfigError::positive("cg_to_front", self.cg_to_front)?;
        ConfigError::positive("cg_to_rear", self.cg_to_rear)?;
        ConfigError::positive("mass", self.mass)?;
        ConfigError::finite("camber", self.camber)?;
        ConfigError::positive("drag_coefficient", self.drag_coefficient)?;
        ConfigError::positive("frontal_area", self.frontal_area)?;
        ConfigError::non_negative("rolling_resistance", self.rolling_resistance)?;
        self.front_tire.validate()?;
        self.rear_tire.validate()
    }

    pub fn wheelbase(&self) -> f64 {
        self.cg_to_front + self.cg_to_rear
    }

    pub fn axle_loads(&self) -> AxleLoads {
        let weight = self.mass * GRAVITY;
        AxleLoads {
            front: weight * self.cg_to_rear / self.wheelbase(),
            rear: weight * self.cg_to_front / self.wheelbase(),
        }
    }

    /// Aerodynamic drag at longitudinal speed `vx`.
    pub fn drag_force<T: Scalar>(&self, vx: T) -> T {
        T::lit(0.5 * AIR_DENSITY * self.drag_coefficient * self.frontal_area) * vx * vx
    }

    /// Front rolling-resistance force, negative (opposing motion).
    pub fn rolling_resistance_force(&self) -> f64 {
        -self.rolling_resistance * self.axle_loads().front
    }
}
