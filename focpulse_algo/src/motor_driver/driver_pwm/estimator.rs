// Phase current estimation from the rotor frame reference.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use crate::math_integer::filters::lpf::FilterLPF;
use crate::math_integer::transforms::{inverse_clarke, FrameAngles, PhaseCurrents, RotatingFrame};

/// Predicts phase currents by low-pass filtering `Id`/`Iq` and rotating them back to `abc`.
///
/// Used by topologies that cannot measure every phase in every period.
pub struct CurrentEstimator {
    lpf_d: FilterLPF,
    lpf_q: FilterLPF,
    estimate: PhaseCurrents,
}

impl CurrentEstimator {
    pub const fn new(lpf_const: i32) -> Self {
        CurrentEstimator {
            lpf_d: FilterLPF::new(0, lpf_const),
            lpf_q: FilterLPF::new(0, lpf_const),
            estimate: PhaseCurrents { a: 0, b: 0, c: 0 },
        }
    }

    /// Updates the estimate with a new rotor frame current and electrical angle (degrees)
    pub fn tick(&mut self, idq: RotatingFrame, theta_elec: i32) -> PhaseCurrents {
        let filtered = RotatingFrame {
            d: self.lpf_d.tick(idq.d),
            q: self.lpf_q.tick(idq.q),
        };
        let alpha_beta = FrameAngles::compute(theta_elec).inverse_park(filtered);
        self.estimate = inverse_clarke(alpha_beta);
        self.estimate
    }

    /// Latest estimate
    #[inline(always)]
    pub fn estimate(&self) -> PhaseCurrents {
        self.estimate
    }

    /// Filtered rotor frame current
    pub fn filtered(&self) -> RotatingFrame {
        RotatingFrame {
            d: self.lpf_d.get_output(),
            q: self.lpf_q.get_output(),
        }
    }

    /// Zeroes both filters and the estimate
    pub fn reset(&mut self) {
        self.lpf_d.reset();
        self.lpf_q.reset();
        self.estimate = PhaseCurrents::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math_integer::filters::lpf::LPF_BYPASS;
    use crate::math_integer::transforms::ThreePhase;

    #[test]
    fn estimate_is_balanced() {
        let mut estimator = CurrentEstimator::new(4096);
        for step in 0..720 {
            let abc = estimator.tick(RotatingFrame { d: 300, q: -1200 }, step * 7);
            assert_eq!(abc.sum(), 0, "step {}", step);
        }
    }

    #[test]
    fn converges_to_the_measured_currents() {
        let measured = ThreePhase {
            a: 1000,
            b: -300,
            c: -700,
        };
        for theta in (0..360).step_by(15) {
            let idq = FrameAngles::compute(theta).park(measured);
            let mut estimator = CurrentEstimator::new(4096);
            let mut abc = PhaseCurrents::default();
            for _ in 0..400 {
                abc = estimator.tick(idq, theta);
            }
            assert_eq!(estimator.filtered(), idq);
            assert!((abc.a as i32 - measured.a as i32).abs() <= 6, "theta {} {:?}", theta, abc);
            assert!((abc.b as i32 - measured.b as i32).abs() <= 6, "theta {} {:?}", theta, abc);
            assert!((abc.c as i32 - measured.c as i32).abs() <= 6, "theta {} {:?}", theta, abc);
        }
    }

    #[test]
    fn reset_clears_the_estimate() {
        let mut estimator = CurrentEstimator::new(LPF_BYPASS);
        let abc = estimator.tick(RotatingFrame { d: 500, q: 0 }, 0);
        assert_eq!(abc.a, 500);
        estimator.reset();
        assert_eq!(estimator.estimate(), PhaseCurrents::default());
        assert_eq!(estimator.filtered(), RotatingFrame::default());
    }
}
