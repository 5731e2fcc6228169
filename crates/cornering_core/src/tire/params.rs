//! Magic Formula 5.2 coefficient sets.
//!
//! Coefficient names follow Pacejka, *Tire and Vehicle Dynamics* (2nd ed.),
//! lower-cased: `p_Cx1` becomes `p_cx1`, `lambda_Fz0` becomes `lambda_fz0`.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// A named, immutable set of Magic Formula 5.2 coefficients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TireParameters {
    pub name: String,

    // Longitudinal (x)
    pub p_cx1: f64,
    pub p_dx1: f64,
    pub p_dx2: f64,
    pub p_dx3: f64,
    pub p_ex1: f64,
    pub p_ex2: f64,
    pub p_ex3: f64,
    pub p_ex4: f64,
    pub p_kx1: f64,
    pub p_kx2: f64,
    pub p_kx3: f64,
    pub p_hx1: f64,
    pub p_hx2: f64,
    pub p_vx1: f64,
    pub p_vx2: f64,
    pub r_bx1: f64,
    pub r_bx2: f64,
    pub r_cx1: f64,
    pub r_ex1: f64,
    pub r_ex2: f64,
    pub r_hx1: f64,

    // Lateral (y)
    pub p_cy1: f64,
    pub p_dy1: f64,
    pub p_dy2: f64,
    pub p_dy3: f64,
    pub p_ey1: f64,
    pub p_ey2: f64,
    pub p_ey3: f64,
    pub p_ey4: f64,
    pub p_ky1: f64,
    pub p_ky2: f64,
    pub p_ky3: f64,
    pub p_hy1: f64,
    pub p_hy2: f64,
    pub p_hy3: f64,
    pub p_vy1: f64,
    pub p_vy2: f64,
    pub p_vy3: f64,
    pub p_vy4: f64,
    pub r_by1: f64,
    pub r_by2: f64,
    pub r_by3: f64,
    pub r_cy1: f64,
    pub r_ey1: f64,
    pub r_ey2: f64,
    pub r_hy1: f64,
    pub r_hy2: f64,
    pub r_vy1: f64,
    pub r_vy2: f64,
    pub r_vy3: f64,
    pub r_vy4: f64,
    pub r_vy5: f64,
    pub r_vy6: f64,

    // Aligning moment (z)
    pub q_bz1: f64,
    pub q_bz2: f64,
    pub q_bz3: f64,
    pub q_bz4: f64,
    pub q_bz5: f64,
    pub q_bz9: f64,
    pub q_bz10: f64,
    pub q_cz1: f64,
    pub q_dz1: f64,
    pub q_dz2: f64,
    pub q_dz3: f64,
    pub q_dz4: f64,
    pub q_dz6: f64,
    pub q_dz7: f64,
    pub q_dz8: f64,
    pub q_dz9: f64,
    pub q_ez1: f64,
    pub q_ez2: f64,
    pub q_ez3: f64,
    pub q_ez4: f64,
    pub q_ez5: f64,
    pub q_hz1: f64,
    pub q_hz2: f64,
    pub q_hz3: f64,
    pub q_hz4: f64,
    pub s_sz1: f64,
    pub s_sz2: f64,
    pub s_sz3: f64,
    pub s_sz4: f64,

    // Scaling factors, longitudinal
    pub lambda_gamma_x: f64,
    pub lambda_cx: f64,
    pub lambda_mux: f64,
    pub lambda_ex: f64,
    pub lambda_kx: f64,
    pub lambda_hx: f64,
    pub lambda_vx: f64,
    pub lambda_x_alpha: f64,

    // Scaling factors, lateral
    pub lambda_muy: f64,
    pub lambda_ky: f64,
    pub lambda_gamma_y: f64,
    pub lambda_cy: f64,
    pub lambda_ey: f64,
    pub lambda_hy: f64,
    pub lambda_vy: f64,
    pub lambda_vy_kappa: f64,
    pub lambda_y_kappa: f64,

    // Scaling factors, aligning moment
    pub lambda_gamma_z: f64,
    pub lambda_t: f64,
    pub lambda_r: f64,

    // General
    pub lambda_fz0: f64,
    /// Nominal (rated) load [N].
    pub f_z0: f64,
    pub lambda_s: f64,

    /// Unloaded tire radius [m].
    pub r_0: f64,
}

impl TireParameters {
    /// Reference front tire.
    pub fn default_front() -> Self {
        Self {
            name: "Default Front Tire".to_string(),
            ..Self::reference()
        }
    }

    /// Reference rear tire: the front set with more lateral grip and stiffness.
    pub fn default_rear() -> Self {
        Self {
            name: "Default Rear Tire".to_string(),
            lambda_muy: 1.6,
            lambda_ky: 2.75,
            ..Self::reference()
        }
    }

    /// Checks the coefficients every formula divides by.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("f_z0", self.f_z0),
            ("lambda_fz0", self.lambda_fz0),
            ("r_0", self.r_0),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidTire {
                    tire: self.name.clone(),
                    field,
                    reason: format!("must be positive, got {value}"),
                });
            }
        }
        for (field, value) in [("lambda_muy", self.lambda_muy), ("p_ky2", self.p_ky2)] {
            if !value.is_finite() || value == 0.0 {
                return Err(ConfigError::InvalidTire {
                    tire: self.name.clone(),
                    field,
                    reason: format!("must be non-zero, got {value}"),
                });
            }
        }
        Ok(())
    }

    fn reference() -> Self {
        Self {
            name: String::new(),

            p_cx1: 1.622,
            p_dx1: 1.275,
            p_dx2: -0.1237,
            p_dx3: 0.0,
            p_ex1: -0.1048,
            p_ex2: 0.7129,
            p_ex3: 0.3907,
            p_ex4: 0.0,
            p_kx1: 23.755,
            p_kx2: 2.195,
            p_kx3: 0.3222,
            p_hx1: 0.0,
            p_hx2: 0.0,
            p_vx1: 0.0,
            p_vx2: 0.0,
            r_bx1: 19.278,
            r_bx2: -14.019,
            r_cx1: 0.9819,
            r_ex1: 0.0,
            r_ex2: 0.0,
            r_hx1: 0.0,

            p_cy1: 1.4872,
            p_dy1: 1.0488,
            p_dy2: -0.23,
            p_dy3: 0.8878,
            p_ey1: -0.8996,
            p_ey2: -0.5536,
            p_ey3: 0.0,
            p_ey4: -5.2807,
            p_ky1: 16.859,
            p_ky2: 1.9348,
            p_ky3: 0.1695,
            p_hy1: 0.0,
            p_hy2: 0.0,
            p_hy3: 0.0041,
            p_vy1: 0.0,
            p_vy2: 0.0,
            p_vy3: 0.5365,
            p_vy4: 0.4555,
            r_by1: 6.9875,
            r_by2: 7.2,
            r_by3: 0.0,
            r_cy1: 1.0074,
            r_ey1: 0.0,
            r_ey2: 0.0,
            r_hy1: 0.0,
            r_hy2: 0.0,
            r_vy1: 0.0,
            r_vy2: 0.0,
            r_vy3: 0.0,
            r_vy4: 0.0,
            r_vy5: 0.0,
            r_vy6: 0.0,

            q_bz1: 8.6458,
            q_bz2: -1.0905,
            q_bz3: -2.8235,
            q_bz4: 0.0,
            q_bz5: 0.4723,
            q_bz9: 9.4811,
            q_bz10: 0.0,
            q_cz1: 1.1479,
            q_dz1: 0.1232,
            q_dz2: -0.0086,
            q_dz3: 0.0,
            q_dz4: -0.2289,
            q_dz6: 0.0,
            q_dz7: 0.0,
            q_dz8: 0.2597,
            q_dz9: 0.0279,
            q_ez1: -3.2802,
            q_ez2: -0.7523,
            q_ez3: 0.0,
            q_ez4: 0.0,
            q_ez5: -3.9464,
            q_hz1: 0.0,
            q_hz2: 0.0,
            q_hz3: 0.0329,
            q_hz4: 0.0465,
            s_sz1: 0.0,
            s_sz2: 0.0458,
            s_sz3: -0.9372,
            s_sz4: 0.504,

            lambda_gamma_x: 1.0,
            lambda_cx: 1.0,
            lambda_mux: 1.4,
            lambda_ex: 1.0,
            lambda_kx: 1.0,
            lambda_hx: 1.0,
            lambda_vx: 1.0,
            lambda_x_alpha: 1.0,

            lambda_muy: 1.45,
            lambda_ky: 2.0,
            lambda_gamma_y: 1.0,
            lambda_cy: 1.0,
            lambda_ey: 1.0,
            lambda_hy: 1.0,
            lambda_vy: 1.0,
            lambda_vy_kappa: 1.0,
            lambda_y_kappa: 1.0,

            lambda_gamma_z: 1.0,
            lambda_t: 1.0,
            lambda_r: 1.0,

            lambda_fz0: 1.0,
            f_z0: 5782.0,
            lambda_s: 1.0,

            r_0: 0.3160,
        }
    }
}

impl Default for TireParameters {
    fn default() -> Self {
        Self::default_front()
    }
}
