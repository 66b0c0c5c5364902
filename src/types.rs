use serde::{Deserialize, Serialize};

use crate::constants::TIE_EPSILON;

/// First and second raw moments `(E[X], E[X²])` of a final-score distribution.
///
/// Mixtures are formed by averaging both components with branch weights; the
/// variance of a mixture is only recoverable from second moments, not from
/// the branch variances.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Moments {
    pub ev: f64,
    pub ev2: f64,
}

impl Moments {
    pub const ZERO: Moments = Moments { ev: 0.0, ev2: 0.0 };

    /// Point mass at `x`.
    #[inline]
    pub fn point(x: f64) -> Self {
        Self { ev: x, ev2: x * x }
    }

    /// Variance, clamped at zero against cancellation when `ev2 ≈ ev²`.
    #[inline]
    pub fn variance(&self) -> f64 {
        (self.ev2 - self.ev * self.ev).max(0.0)
    }

    #[inline]
    pub fn sd(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Moments of `X + c`.
    #[inline]
    pub fn shift(&self, c: f64) -> Self {
        Self {
            ev: self.ev + c,
            ev2: self.ev2 + 2.0 * c * self.ev + c * c,
        }
    }

    /// Probability-weighted mixture of `(weight, moments)` branches.
    pub fn mixture(branches: impl IntoIterator<Item = (f64, Moments)>) -> Self {
        let mut acc = Moments::ZERO;
        for (w, m) in branches {
            acc.ev += w * m.ev;
            acc.ev2 += w * m.ev2;
        }
        acc
    }
}

/// Solver tuning shared by both events.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// EV differences smaller than this are ties, broken by SD then by action order.
    pub tie_epsilon: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tie_epsilon: TIE_EPSILON,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_has_zero_sd() {
        let m = Moments::point(-7.0);
        assert_eq!(m.ev, -7.0);
        assert_eq!(m.ev2, 49.0);
        assert_eq!(m.sd(), 0.0);
    }

    #[test]
    fn test_negative_variance_is_clamped() {
        let m = Moments {
            ev: 3.0,
            ev2: 9.0 - 1e-13,
        };
        assert_eq!(m.variance(), 0.0);
        assert_eq!(m.sd(), 0.0);
    }

    #[test]
    fn test_mixture_of_two_points() {
        let m = Moments::mixture([(0.5, Moments::point(0.0)), (0.5, Moments::point(2.0))]);
        assert!((m.ev - 1.0).abs() < 1e-12);
        assert!((m.sd() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_shift_preserves_sd() {
        let m = Moments::mixture([(0.25, Moments::point(1.0)), (0.75, Moments::point(5.0))]);
        let s = m.shift(10.0);
        assert!((s.ev - (m.ev + 10.0)).abs() < 1e-12);
        assert!((s.sd() - m.sd()).abs() < 1e-9);
    }
}
