use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// A trait for types that can be used as scalars in the tire and equilibrium equations.
/// Must support basic arithmetic, trigonometry, debug printing, and conversion from f64.
pub trait Scalar: Float + FromPrimitive + Debug + 'static {
    /// Lifts a model coefficient into the scalar type.
    ///
    /// Every finite `f64` is representable by the implementors we use, so the
    /// `NaN` fallback only surfaces for exotic scalar types.
    #[inline]
    fn lit(value: f64) -> Self {
        Self::from_f64(value).unwrap_or_else(Self::nan)
    }
}

impl<T: Float + FromPrimitive + Debug + 'static> Scalar for T {}

/// Sign function returning exactly zero at zero.
///
/// `Float::signum` maps `+0.0` to `1.0`, which the Magic Formula curvature
/// terms must not see.
#[inline]
pub fn sgn<T: Scalar>(x: T) -> T {
    if x > T::zero() {
        T::one()
    } else if x < T::zero() {
        -T::one()
    } else {
        T::zero()
    }
}

/// A square nonlinear system `F(x) = 0` evaluated over any scalar type.
pub trait ResidualSystem<T: Scalar> {
    /// Returns the number of unknowns (and residuals).
    fn dimension(&self) -> usize;

    /// Evaluates the residual vector.
    /// x: current iterate
    /// out: buffer to write F(x) into
    fn residuals(&self, x: &[T], out: &mut [T]);
}
