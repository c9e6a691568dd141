//! Time intervals and step-divisibility rules.
//!
//! Two divisibility rules are used:
//!
//! - **Configured step sizes** (PDE step vs. ODE sub-step) must have an
//!   exactly integral binary ratio. `1e-3 / 1e-5` evaluates to exactly
//!   `100.0` and is accepted; `1.5e-4 / 1e-5` evaluates to
//!   `14.999999999999998` and is refused.
//! - **Spans derived from time arithmetic** (`stop - start`, or
//!   `t_end - t_start` inside a run) accumulate rounding, so they are
//!   accepted when within a relative [`SPAN_TOLERANCE`] of an integer.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Relative tolerance used when counting steps in a derived time span.
pub const SPAN_TOLERANCE: f64 = 1e-9;

/// One orchestrator phase: advance from `start` to `stop` in `step` increments.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeInterval {
    /// Start time.
    pub start: f64,
    /// Stop time. Must be strictly greater than `start`.
    pub stop: f64,
    /// PDE step size. Must be positive.
    pub step: f64,
}

impl TimeInterval {
    /// Construct and validate an interval.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidInterval`] if any value is non-finite, if
    /// `stop <= start` or `step <= 0`; [`ConfigError::IntervalNotDivisible`]
    /// if `stop - start` is not an integer multiple of `step`.
    pub fn new(start: f64, stop: f64, step: f64) -> Result<Self, ConfigError> {
        let interval = Self { start, stop, step };
        interval.validate()?;
        Ok(interval)
    }

    /// Check the interval invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let finite = self.start.is_finite() && self.stop.is_finite() && self.step.is_finite();
        if !finite || self.stop <= self.start || self.step <= 0.0 {
            return Err(ConfigError::InvalidInterval {
                start: self.start,
                stop: self.stop,
                step: self.step,
            });
        }
        span_divisions(self.stop - self.start, self.step).map(|_| ())
    }

    /// Number of PDE steps in the interval.
    pub fn step_count(&self) -> Result<u64, ConfigError> {
        self.validate()?;
        span_divisions(self.stop - self.start, self.step)
    }

    /// Time at the beginning of step `k` (`k == step_count` yields `stop`).
    ///
    /// Computed as `start + k * step` rather than by accumulation, so the
    /// clock does not drift over long runs.
    pub fn time_at(&self, k: u64, step_count: u64) -> f64 {
        if k >= step_count {
            self.stop
        } else {
            self.start + k as f64 * self.step
        }
    }

    /// Number of ODE sub-steps per PDE step, using the exact rule.
    ///
    /// # Errors
    ///
    /// [`ConfigError::SubStepNotDivisible`] if `step / dt_sub` is not an
    /// exact integer, or [`ConfigError::InvalidParameter`] if `dt_sub` is not
    /// finite and positive.
    pub fn sub_steps(&self, dt_sub: f64) -> Result<u64, ConfigError> {
        exact_divisions(self.step, dt_sub)
    }
}

/// Number of `dt_sub` sub-steps in a configured step size, exact rule.
///
/// The floating-point quotient `step / dt_sub` must be an integer. Some
/// decimal multiples fail this: `1e-2 / 1e-5` evaluates to
/// `999.9999999999999` and `1e-3 / 1e-6` to `1000.0000000000001`, so both
/// are refused. Power-of-two ratios and `1e-3 / 1e-5` are exact.
pub fn exact_divisions(step: f64, dt_sub: f64) -> Result<u64, ConfigError> {
    if !(dt_sub.is_finite() && dt_sub > 0.0) {
        return Err(ConfigError::InvalidParameter {
            name: "ode_step".into(),
            value: dt_sub,
        });
    }
    if !(step.is_finite() && step > 0.0) {
        return Err(ConfigError::InvalidParameter {
            name: "pde_step".into(),
            value: step,
        });
    }
    let ratio = step / dt_sub;
    if ratio < 1.0 || ratio.fract() != 0.0 || ratio > u64::MAX as f64 {
        return Err(ConfigError::SubStepNotDivisible {
            pde_step: step,
            ode_step: dt_sub,
        });
    }
    Ok(ratio as u64)
}

/// Number of `step` increments in a derived time span, tolerant rule.
pub fn span_divisions(span: f64, step: f64) -> Result<u64, ConfigError> {
    let ratio = span / step;
    let n = ratio.round();
    if !ratio.is_finite() || n < 1.0 || (ratio - n).abs() > SPAN_TOLERANCE * n {
        return Err(ConfigError::IntervalNotDivisible { length: span, step });
    }
    Ok(n as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn original_problem_intervals_are_valid() {
        let on = TimeInterval::new(0.0, 0.2, 0.001).unwrap();
        assert_eq!(on.step_count().unwrap(), 200);
        let off = TimeInterval::new(0.2, 0.7, 0.001).unwrap();
        assert_eq!(off.step_count().unwrap(), 500);
        assert_eq!(off.sub_steps(0.00001).unwrap(), 100);
    }

    #[test]
    fn rejects_reversed_and_degenerate_intervals() {
        assert!(matches!(
            TimeInterval::new(1.0, 0.5, 0.1),
            Err(ConfigError::InvalidInterval { .. })
        ));
        assert!(matches!(
            TimeInterval::new(0.0, 0.0, 0.1),
            Err(ConfigError::InvalidInterval { .. })
        ));
        assert!(matches!(
            TimeInterval::new(0.0, 1.0, 0.0),
            Err(ConfigError::InvalidInterval { .. })
        ));
        assert!(matches!(
            TimeInterval::new(0.0, f64::NAN, 0.1),
            Err(ConfigError::InvalidInterval { .. })
        ));
    }

    #[test]
    fn rejects_non_integer_step_count() {
        assert!(matches!(
            TimeInterval::new(0.0, 1.0, 0.3),
            Err(ConfigError::IntervalNotDivisible { .. })
        ));
    }

    #[test]
    fn sub_step_ratio_must_be_exact() {
        let interval = TimeInterval::new(0.0, 0.0015, 0.00015).unwrap();
        assert!(matches!(
            interval.sub_steps(0.00001),
            Err(ConfigError::SubStepNotDivisible { .. })
        ));
        assert!(matches!(
            interval.sub_steps(0.0),
            Err(ConfigError::InvalidParameter { .. })
        ));
        // dt_sub larger than the step cannot divide it.
        assert!(interval.sub_steps(0.001).is_err());
    }

    #[test]
    fn exact_rule_follows_the_binary_quotient() {
        assert_eq!(exact_divisions(1e-3, 1e-5).unwrap(), 100);
        // Decimal integer multiples whose quotient rounds off an integer.
        for (step, dt_sub) in [(1e-2, 1e-5), (1e-3, 1e-6)] {
            assert!(matches!(
                exact_divisions(step, dt_sub),
                Err(ConfigError::SubStepNotDivisible { .. })
            ));
        }
    }

    #[test]
    fn time_at_lands_on_stop() {
        let interval = TimeInterval::new(0.2, 0.7, 0.001).unwrap();
        let n = interval.step_count().unwrap();
        assert_eq!(interval.time_at(n, n), 0.7);
        assert_eq!(interval.time_at(0, n), 0.2);
    }

    proptest! {
        #[test]
        fn integer_multiples_are_divisible(n in 1u64..10_000, k in -12i32..0) {
            let step = 2f64.powi(k);
            let interval = TimeInterval::new(0.0, n as f64 * step, step).unwrap();
            prop_assert_eq!(interval.step_count().unwrap(), n);
        }

        #[test]
        fn power_of_two_ratios_are_exact(a in -20i32..-1, d in 0i32..10) {
            let dt_sub = 2f64.powi(a - d);
            let step = 2f64.powi(a);
            prop_assert_eq!(exact_divisions(step, dt_sub).unwrap(), 1u64 << d);
        }
    }
}
