//! Magic Formula 5.2 force and moment equations.
//!
//! Every function is generic over [`Scalar`] so the equilibrium residuals can
//! run them on `f64` and on [`crate::autodiff::Dual`] alike. Angles are in
//! radians, loads in newtons, moments in newton-metres.
//!
//! Reference: H. B. Pacejka, *Tire and Vehicle Dynamics*, 2nd ed., ch. 4.

use super::params::TireParameters;
use crate::traits::{sgn, Scalar};
use std::f64::consts::FRAC_2_PI;

/// Below this magnitude a combined-slip normalisation denominator is treated
/// as zero and the pure-slip value passes through unscaled.
const COMBINED_DENOMINATOR_EPS: f64 = 1e-10;

/// Scaled nominal load `F'_z0` and normalised load increment `df_z`.
#[inline]
fn load_terms<T: Scalar>(p: &TireParameters, fz: T) -> (T, T) {
    let fz0_prime = T::lit(p.lambda_fz0) * T::lit(p.f_z0);
    (fz0_prime, (fz - fz0_prime) / fz0_prime)
}

/// `B x - E (B x - atan(B x))`, the argument shared by every MF sine/cosine.
#[inline]
fn curvature_arg<T: Scalar>(b: T, e: T, x: T) -> T {
    let bx = b * x;
    bx - e * (bx - bx.atan())
}

#[inline]
fn longitudinal_stiffness<T: Scalar>(p: &TireParameters, fz: T, dfz: T) -> T {
    fz * (T::lit(p.p_kx1) + T::lit(p.p_kx2) * dfz)
        * (T::lit(p.p_kx3) * dfz).exp()
        * T::lit(p.lambda_kx)
}

#[inline]
fn cornering_stiffness<T: Scalar>(p: &TireParameters, fz: T, fz0_prime: T, gamma_y: T) -> T {
    T::lit(p.p_ky1)
        * fz0_prime
        * (T::lit(2.0) * (fz / (T::lit(p.p_ky2) * fz0_prime)).atan()).sin()
        * (T::one() - T::lit(p.p_ky3) * gamma_y.abs())
        * T::lit(p.lambda_ky)
}

#[inline]
fn lateral_friction<T: Scalar>(p: &TireParameters, dfz: T, gamma_y: T) -> T {
    (T::lit(p.p_dy1) + T::lit(p.p_dy2) * dfz)
        * (T::one() - T::lit(p.p_dy3) * gamma_y * gamma_y)
        * T::lit(p.lambda_muy)
}

/// Pure-slip longitudinal force `F_x0(kappa)`.
pub fn pure_longitudinal_force<T: Scalar>(p: &TireParameters, fz: T, kappa: T, gamma: T) -> T {
    let (_, dfz) = load_terms(p, fz);
    let gamma_x = gamma * T::lit(p.lambda_gamma_x);

    let c_x = T::lit(p.p_cx1) * T::lit(p.lambda_cx);
    let mu_x = (T::lit(p.p_dx1) + T::lit(p.p_dx2) * dfz)
        * (T::one() - T::lit(p.p_dx3) * gamma_x * gamma_x)
        * T::lit(p.lambda_mux);
    let d_x = mu_x * fz;
    let k_x = longitudinal_stiffness(p, fz, dfz);
    let b_x = k_x / (c_x * d_x);

    let s_hx = (T::lit(p.p_hx1) + T::lit(p.p_hx2) * dfz) * T::lit(p.lambda_hx);
    let kappa_x = kappa + s_hx;
    let e_x = (T::lit(p.p_ex1) + T::lit(p.p_ex2) * dfz + T::lit(p.p_ex3) * dfz * dfz)
        * (T::one() - T::lit(p.p_ex4) * sgn(kappa_x))
        * T::lit(p.lambda_ex);
    let s_vx = fz
        * (T::lit(p.p_vx1) + T::lit(p.p_vx2) * dfz)
        * T::lit(p.lambda_vx)
        * T::lit(p.lambda_mux);

    d_x * (c_x * curvature_arg(b_x, e_x, kappa_x).atan()).sin() + s_vx
}

/// Pure-slip lateral force `F_y0(alpha)`.
pub fn pure_lateral_force<T: Scalar>(p: &TireParameters, fz: T, alpha: T, gamma: T) -> T {
    let (fz0_prime, dfz) = load_terms(p, fz);
    let gamma_y = gamma * T::lit(p.lambda_gamma_y);

    let c_y = T::lit(p.p_cy1) * T::lit(p.lambda_cy);
    let d_y = lateral_friction(p, dfz, gamma_y) * fz;
    let k_y = cornering_stiffness(p, fz, fz0_prime, gamma_y);
    let b_y = k_y / (c_y * d_y);

    let s_hy = (T::lit(p.p_hy1) + T::lit(p.p_hy2) * dfz) * T::lit(p.lambda_hy)
        + T::lit(p.p_hy3) * gamma_y;
    let alpha_y = alpha + s_hy;
    let e_y = (T::lit(p.p_ey1) + T::lit(p.p_ey2) * dfz)
        * (T::one() - (T::lit(p.p_ey3) + T::lit(p.p_ey4) * gamma_y) * sgn(alpha_y))
        * T::lit(p.lambda_ey);
    let s_vy = fz
        * ((T::lit(p.p_vy1) + T::lit(p.p_vy2) * dfz) * T::lit(p.lambda_vy)
            + (T::lit(p.p_vy3) + T::lit(p.p_vy4) * dfz) * gamma_y)
        * T::lit(p.lambda_muy);

    d_y * (c_y * curvature_arg(b_y, e_y, alpha_y).atan()).sin() + s_vy
}

/// Pure-slip self-aligning moment `M_z0(alpha)`: pneumatic trail times the
/// pure lateral force plus the residual moment.
pub fn pure_aligning_moment<T: Scalar>(p: &TireParameters, fz: T, alpha: T, gamma: T) -> T {
    let (fz0_prime, dfz) = load_terms(p, fz);
    let gamma_y = gamma * T::lit(p.lambda_gamma_y);

    let c_y = T::lit(p.p_cy1) * T::lit(p.lambda_cy);
    let d_y = lateral_friction(p, dfz, gamma_y) * fz;
    let k_y = cornering_stiffness(p, fz, fz0_prime, gamma_y);
    let b_y = k_y / (c_y * d_y);
    let s_hy = (T::lit(p.p_hy1) + T::lit(p.p_hy2) * dfz) * T::lit(p.lambda_hy)
        + T::lit(p.p_hy3) * gamma_y;
    let alpha_y = alpha + s_hy;
    let e_y = (T::lit(p.p_ey1) + T::lit(p.p_ey2) * dfz)
        * (T::one() - (T::lit(p.p_ey3) + T::lit(p.p_ey4) * gamma_y) * sgn(alpha_y))
        * T::lit(p.lambda_ey);
    let s_vy = fz
        * ((T::lit(p.p_vy1) + T::lit(p.p_vy2) * dfz) * T::lit(p.lambda_vy)
            + (T::lit(p.p_vy3) + T::lit(p.p_vy4) * dfz) * gamma_y)
        * T::lit(p.lambda_muy);
    let f_y0 = d_y * (c_y * curvature_arg(b_y, e_y, alpha_y).atan()).sin() + s_vy;

    let s_hf = s_hy + s_vy / k_y;
    let gamma_z = gamma * T::lit(p.lambda_gamma_z);
    let trail = TrailTerms::new(p, fz, dfz, gamma_z, alpha);
    let t = trail.d_t
        * (trail.c_t * curvature_arg(trail.b_t, trail.e_t, trail.alpha_t).atan()).cos()
        * alpha.cos();

    let b_r = T::lit(p.q_bz9) * T::lit(p.lambda_ky) / T::lit(p.lambda_muy)
        + T::lit(p.q_bz10) * b_y * c_y;
    let d_r = residual_moment_peak(p, fz, dfz, gamma_z);
    let alpha_r = alpha + s_hf;
    let m_zr = d_r * (b_r * alpha_r).atan().cos() * alpha.cos();

    -t * f_y0 + m_zr
}

/// Combined-slip longitudinal force: `F_x0` weighted by the slip-angle
/// interaction function `G_xa`.
pub fn combined_longitudinal_force<T: Scalar>(
    p: &TireParameters,
    fz: T,
    alpha: T,
    kappa: T,
    gamma: T,
) -> T {
    let f_x0 = pure_longitudinal_force(p, fz, kappa, gamma);
    let (_, dfz) = load_terms(p, fz);

    let s_hxa = T::lit(p.r_hx1);
    let alpha_s = alpha + s_hxa;
    let b_xa = T::lit(p.r_bx1) * (T::lit(p.r_bx2) * kappa).atan().cos() * T::lit(p.lambda_x_alpha);
    let c_xa = T::lit(p.r_cx1);
    let e_xa = T::lit(p.r_ex1) + T::lit(p.r_ex2) * dfz;

    let denom = (c_xa * curvature_arg(b_xa, e_xa, s_hxa).atan()).cos();
    let d_xa = if denom.abs() > T::lit(COMBINED_DENOMINATOR_EPS) {
        f_x0 / denom
    } else {
        f_x0
    };

    d_xa * (c_xa * curvature_arg(b_xa, e_xa, alpha_s).atan()).cos()
}

/// Combined-slip lateral force: `F_y0` weighted by `G_yk` plus the
/// slip-ratio induced side force `S_Vyk`.
pub fn combined_lateral_force<T: Scalar>(
    p: &TireParameters,
    fz: T,
    alpha: T,
    kappa: T,
    gamma: T,
) -> T {
    let f_y0 = pure_lateral_force(p, fz, alpha, gamma);
    let (_, dfz) = load_terms(p, fz);
    let gamma_y = gamma * T::lit(p.lambda_gamma_y);
    let mu_y = lateral_friction(p, dfz, gamma_y);

    let s_hyk = T::lit(p.r_hy1) + T::lit(p.r_hy2) * dfz;
    let kappa_s = kappa + s_hyk;
    let b_yk = T::lit(p.r_by1)
        * (T::lit(p.r_by2) * (alpha - T::lit(p.r_by3))).atan().cos()
        * T::lit(p.lambda_y_kappa);
    let c_yk = T::lit(p.r_cy1);
    let e_yk = T::lit(p.r_ey1) + T::lit(p.r_ey2) * dfz;
    let s_vyk = induced_side_force(p, fz, dfz, mu_y, gamma_y, alpha, kappa);

    let denom = (c_yk * curvature_arg(b_yk, e_yk, s_hyk).atan()).cos();
    let d_yk = if denom.abs() > T::lit(COMBINED_DENOMINATOR_EPS) {
        f_y0 / denom
    } else {
        f_y0
    };

    d_yk * (c_yk * curvature_arg(b_yk, e_yk, kappa_s).atan()).cos() + s_vyk
}

/// Combined-slip self-aligning moment. Trail and residual moment are taken
/// at the equivalent slip angles, and the longitudinal force contributes
/// through the lever arm `s`.
pub fn combined_aligning_moment<T: Scalar>(
    p: &TireParameters,
    fz: T,
    alpha: T,
    kappa: T,
    gamma: T,
) -> T {
    let (fz0_prime, dfz) = load_terms(p, fz);
    let gamma_y = gamma * T::lit(p.lambda_gamma_y);

    let c_y = T::lit(p.p_cy1) * T::lit(p.lambda_cy);
    let mu_y = lateral_friction(p, dfz, gamma_y);
    let d_y = mu_y * fz;
    let k_y = cornering_stiffness(p, fz, fz0_prime, gamma_y);
    let b_y = k_y / (c_y * d_y);
    let s_hy = (T::lit(p.p_hy1) + T::lit(p.p_hy2) * dfz) * T::lit(p.lambda_hy)
        + T::lit(p.p_hy3) * gamma_y;
    let s_vy = fz
        * ((T::lit(p.p_vy1) + T::lit(p.p_vy2) * dfz) * T::lit(p.lambda_vy)
            + (T::lit(p.p_vy3) + T::lit(p.p_vy4) * dfz) * gamma_y)
        * T::lit(p.lambda_muy);

    let s_hf = s_hy + s_vy / k_y;
    let gamma_z = gamma * T::lit(p.lambda_gamma_z);
    let trail = TrailTerms::new(p, fz, dfz, gamma_z, alpha);
    let b_r = T::lit(p.q_bz9) * T::lit(p.lambda_ky) / T::lit(p.lambda_muy)
        + T::lit(p.q_bz10) * b_y * c_y;
    let d_r = residual_moment_peak(p, fz, dfz, gamma_z);
    let alpha_r = alpha + s_hf;

    let k_x = longitudinal_stiffness(p, fz, dfz);
    let stiffness_ratio = k_x / k_y;
    let kappa_term = stiffness_ratio * stiffness_ratio * kappa * kappa;
    let equivalent = |angle: T| {
        let tan = angle.tan();
        (tan * tan + kappa_term).sqrt().atan() * sgn(angle)
    };
    let alpha_t_eq = equivalent(trail.alpha_t);
    let alpha_r_eq = equivalent(alpha_r);

    let s_vyk = induced_side_force(p, fz, dfz, mu_y, gamma_y, alpha, kappa);
    let f_y = combined_lateral_force(p, fz, alpha, kappa, gamma);
    let f_y_prime = f_y - s_vyk;

    let s = (T::lit(p.s_sz1)
        + T::lit(p.s_sz2) * (f_y / T::lit(p.f_z0))
        + (T::lit(p.s_sz3) + T::lit(p.s_sz4) * dfz) * gamma)
        * T::lit(p.r_0)
        * T::lit(p.lambda_s);

    let t = trail.d_t
        * (trail.c_t * curvature_arg(trail.b_t, trail.e_t, alpha_t_eq).atan()).cos()
        * alpha.cos();
    let m_zr = d_r * (b_r * alpha_r_eq).atan().cos() * alpha.cos();
    let f_x = combined_longitudinal_force(p, fz, alpha, kappa, gamma);

    -t * f_y_prime + m_zr + s * f_x
}

/// Slip-ratio induced side force `S_Vyk`.
fn induced_side_force<T: Scalar>(
    p: &TireParameters,
    fz: T,
    dfz: T,
    mu_y: T,
    gamma_y: T,
    alpha: T,
    kappa: T,
) -> T {
    let d_vyk = mu_y
        * fz
        * (T::lit(p.r_vy1) + T::lit(p.r_vy2) * dfz + T::lit(p.r_vy3) * gamma_y)
        * (T::lit(p.r_vy4) * alpha).atan().cos();
    d_vyk * (T::lit(p.r_vy5) * (T::lit(p.r_vy6) * kappa).atan()).sin() * T::lit(p.lambda_vy_kappa)
}

fn residual_moment_peak<T: Scalar>(p: &TireParameters, fz: T, dfz: T, gamma_z: T) -> T {
    fz * ((T::lit(p.q_dz6) + T::lit(p.q_dz7) * dfz) * T::lit(p.lambda_r)
        + (T::lit(p.q_dz8) + T::lit(p.q_dz9) * dfz) * gamma_z)
        * T::lit(p.r_0)
        * T::lit(p.lambda_muy)
}

/// Pneumatic trail coefficients shared by the pure and combined moments.
struct TrailTerms<T> {
    alpha_t: T,
    b_t: T,
    c_t: T,
    d_t: T,
    e_t: T,
}

impl<T: Scalar> TrailTerms<T> {
    fn new(p: &TireParameters, fz: T, dfz: T, gamma_z: T, alpha: T) -> Self {
        let s_ht = T::lit(p.q_hz1)
            + T::lit(p.q_hz2) * dfz
            + (T::lit(p.q_hz3) + T::lit(p.q_hz4) * dfz) * gamma_z;
        let alpha_t = alpha + s_ht;
        let b_t = (T::lit(p.q_bz1) + T::lit(p.q_bz2) * dfz + T::lit(p.q_bz3) * dfz * dfz)
            * (T::one() + T::lit(p.q_bz4) * gamma_z + T::lit(p.q_bz5) * gamma_z.abs())
            * T::lit(p.lambda_ky)
            / T::lit(p.lambda_muy);
        let c_t = T::lit(p.q_cz1);
        let e_factor = T::one()
            + (T::lit(p.q_ez4) + T::lit(p.q_ez5) * gamma_z)
                * T::lit(FRAC_2_PI)
                * (b_t * c_t * alpha_t).atan();
        let e_t = (T::lit(p.q_ez1) + T::lit(p.q_ez2) * dfz + T::lit(p.q_ez3) * dfz * dfz)
            * T::one().min(e_factor);
        // Scaled by the unscaled nominal load F_z0.
        let d_t = fz
            * (T::lit(p.q_dz1) + T::lit(p.q_dz2) * dfz)
            * (T::one() + T::lit(p.q_dz3) * gamma_z + T::lit(p.q_dz4) * gamma_z * gamma_z)
            * (T::lit(p.r_0) / T::lit(p.f_z0))
            * T::lit(p.lambda_t);
        Self {
            alpha_t,
            b_t,
            c_t,
            d_t,
            e_t,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autodiff::Dual;

    const FZ: f64 = 4000.0;

    fn front() -> TireParameters {
        TireParameters::default_front()
    }

    #[test]
    fn pure_forces_vanish_without_slip_or_camber() {
        let p = front();
        assert!(pure_longitudinal_force(&p, FZ, 0.0, 0.0).abs() < 1e-9);
        assert!(pure_lateral_force(&p, FZ, 0.0, 0.0).abs() < 1e-9);
    }

    #[test]
    fn combined_matches_pure_at_zero_slip_ratio() {
        for p in [TireParameters::default_front(), TireParameters::default_rear()] {
            for alpha in [-0.2, -0.05, 0.0, 0.03, 0.15] {
                let pure = pure_lateral_force(&p, FZ, alpha, 0.0);
                let combined = combined_lateral_force(&p, FZ, alpha, 0.0, 0.0);
                assert!(
                    (pure - combined).abs() <= 1e-9 * pure.abs().max(1.0),
                    "{}: alpha={alpha} pure={pure} combined={combined}",
                    p.name
                );
            }
        }
    }

    #[test]
    fn combined_longitudinal_matches_pure_at_zero_slip_angle() {
        let p = front();
        for kappa in [-0.08, 0.0, 0.02, 0.1] {
            let pure = pure_longitudinal_force(&p, FZ, kappa, 0.0);
            let combined = combined_longitudinal_force(&p, FZ, 0.0, kappa, 0.0);
            assert!((pure - combined).abs() <= 1e-9 * pure.abs().max(1.0));
        }
    }

    #[test]
    fn lateral_force_opposes_slip_angle_sign_symmetry() {
        let p = front();
        let left = pure_lateral_force(&p, FZ, 0.05, 0.0);
        let right = pure_lateral_force(&p, FZ, -0.05, 0.0);
        assert!(left > 0.0);
        assert!(right < 0.0);
        assert!(left.abs() < p.lambda_muy * 1.2 * FZ);
    }

    #[test]
    fn rear_tire_generates_more_lateral_force() {
        let front = TireParameters::default_front();
        let rear = TireParameters::default_rear();
        let alpha = 0.1;
        assert!(pure_lateral_force(&rear, FZ, alpha, 0.0) > pure_lateral_force(&front, FZ, alpha, 0.0));
    }

    #[test]
    fn aligning_moment_is_finite_over_slip_range() {
        let p = front();
        for i in -20..=20 {
            let alpha = f64::from(i) * 0.01;
            let pure = pure_aligning_moment(&p, FZ, alpha, 0.0);
            let combined = combined_aligning_moment(&p, FZ, alpha, 0.03, 0.01);
            assert!(pure.is_finite(), "pure Mz at alpha={alpha}");
            assert!(combined.is_finite(), "combined Mz at alpha={alpha}");
        }
    }

    #[test]
    fn dual_derivatives_match_central_differences() {
        let p = front();
        let h = 1e-6;
        let (alpha, kappa, gamma) = (0.04, 0.02, 0.01);

        let fy_alpha = combined_lateral_force(
            &p,
            Dual::constant(FZ),
            Dual::new(alpha, 1.0),
            Dual::constant(kappa),
            Dual::constant(gamma),
        );
        let fd = (combined_lateral_force(&p, FZ, alpha + h, kappa, gamma)
            - combined_lateral_force(&p, FZ, alpha - h, kappa, gamma))
            / (2.0 * h);
        assert!((fy_alpha.eps - fd).abs() <= 1e-4 * fd.abs().max(1.0));

        let fx_kappa = combined_longitudinal_force(
            &p,
            Dual::constant(FZ),
            Dual::constant(alpha),
            Dual::new(kappa, 1.0),
            Dual::constant(gamma),
        );
        let fd = (combined_longitudinal_force(&p, FZ, alpha, kappa + h, gamma)
            - combined_longitudinal_force(&p, FZ, alpha, kappa - h, gamma))
            / (2.0 * h);
        assert!((fx_kappa.eps - fd).abs() <= 1e-4 * fd.abs().max(1.0));

        let mz_alpha = combined_aligning_moment(
            &p,
            Dual::constant(FZ),
            Dual::new(alpha, 1.0),
            Dual::constant(kappa),
            Dual::constant(gamma),
        );
        let fd = (combined_aligning_moment(&p, FZ, alpha + h, kappa, gamma)
            - combined_aligning_moment(&p, FZ, alpha - h, kappa, gamma))
            / (2.0 * h);
        assert!((mz_alpha.eps - fd).abs() <= 1e-4 * fd.abs().max(1.0));
        assert_eq!(mz_alpha.val, combined_aligning_moment(&p, FZ, alpha, kappa, gamma));
    }
}
