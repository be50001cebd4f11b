// Implements the reference frame transforms used by the current feedback loop:
// Clarke (abc -> alpha/beta), Park (abc -> d/q) and their inverses.

// Key Features:
// - Frame types for three-phase, stationary and rotating quantities
// - FrameAngles caches the six sin/cos values of one electrical angle
// - Park/inverse-Park use the cache instead of repeated table lookups
// - Inverse Clarke derives the third phase so that a + b + c == 0 by construction

// Detailed Operation:
// FrameAngles::compute(theta) evaluates sin/cos at theta+90, theta+210 and theta+330 once per
// control cycle. The 90 degree offset turns the sine projections into cosine projections, so
// Park reads d = 2/3 * (a*cos(t) + b*cos(t-120) + c*cos(t+120)). The 2/3 factor and the table
// amplitude are folded into a single division by 768 (= 512 * 3 / 2). The cache is a plain
// value: each motor owns its own copy and no state is shared between drives.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use super::trigonometry::{cos_deg, sin_deg, SINE_AMPLITUDE};

/// Divisor folding the Park 2/3 scale and the sine table amplitude: 512 * 3 / 2.
pub const PARK_DIVISOR: i32 = SINE_AMPLITUDE as i32 * 3 / 2;

/// Numerator and denominator of the 1/sqrt(3) approximation used by Clarke (250 / 433).
const INV_SQRT3_NUM: i32 = 250;
const INV_SQRT3_DEN: i32 = 433;

/// sqrt(3) in Q15 format (0xDDB4 = 56756 ~ 1.7320 * 32768).
pub const SQRT3_FACTOR: i32 = 0xDDB4;

/// Three-phase quantities (currents or voltages) of one inverter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ThreePhase {
    pub a: i16,
    pub b: i16,
    pub c: i16,
}

/// Phase currents; only two phases are independent, the third is derived.
pub type PhaseCurrents = ThreePhase;

impl ThreePhase {
    /// Builds a balanced set from two phases, deriving `c = -(a + b)`.
    #[inline(always)]
    pub const fn from_ab(a: i16, b: i16) -> Self {
        Self {
            a,
            b,
            c: saturate(-(a as i32 + b as i32)),
        }
    }

    /// Sum of the three phases, zero for any set produced by this crate (barring saturation).
    #[inline(always)]
    pub const fn sum(&self) -> i32 {
        self.a as i32 + self.b as i32 + self.c as i32
    }
}

/// Values in the stationary two-axis reference frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StationaryFrame {
    pub alpha: i16,
    pub beta: i16,
}

/// Values in the rotor (d/q) reference frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RotatingFrame {
    pub d: i16,
    pub q: i16,
}

/// Clamps an intermediate result back into `i16`.
#[inline(always)]
pub const fn saturate(value: i32) -> i16 {
    if value > i16::MAX as i32 {
        i16::MAX
    } else if value < i16::MIN as i32 {
        i16::MIN
    } else {
        value as i16
    }
}

/// Cached sin/cos triplet of one electrical angle, shifted by 90 degrees.
///
/// `sin000`/`cos000` are taken at `theta + 90`, `sin120`/`cos120` at `theta + 210` and
/// `sin240`/`cos240` at `theta + 330`, all with amplitude 512.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameAngles {
    pub sin000: i16,
    pub cos000: i16,
    pub sin120: i16,
    pub cos120: i16,
    pub sin240: i16,
    pub cos240: i16,
}

impl FrameAngles {
    /// Evaluates the six projections for an electrical angle in degrees.
    pub const fn compute(theta_elec: i32) -> Self {
        // Keep the offsets away from overflow on extreme inputs
        let theta = super::trigonometry::limit_theta(theta_elec) as i32 + 90;
        Self {
            sin000: sin_deg(theta),
            cos000: cos_deg(theta),
            sin120: sin_deg(theta + 120),
            cos120: cos_deg(theta + 120),
            sin240: sin_deg(theta + 240),
            cos240: cos_deg(theta + 240),
        }
    }

    /// Projects three-phase quantities onto the rotating frame.
    ///
    /// ### Arguments
    /// * `abc` - Phase quantities.
    ///
    /// ### Returns
    /// * `{d, q}` in the same units as the input, saturated to `i16`.
    #[inline(always)]
    pub const fn park(&self, abc: ThreePhase) -> RotatingFrame {
        let (a, b, c) = (abc.a as i32, abc.b as i32, abc.c as i32);

        let d = self.sin000 as i32 * a + self.sin240 as i32 * b + self.sin120 as i32 * c;
        let q = self.cos000 as i32 * a + self.cos240 as i32 * b + self.cos120 as i32 * c;

        RotatingFrame {
            d: saturate(d / PARK_DIVISOR),
            q: saturate(q / PARK_DIVISOR),
        }
    }

    /// Rotates rotor frame values back into the stationary frame.
    ///
    /// ### Arguments
    /// * `dq` - Rotor frame values.
    ///
    /// ### Returns
    /// * `{alpha, beta}` in the same units as the input, saturated to `i16`.
    #[inline(always)]
    pub const fn inverse_park(&self, dq: RotatingFrame) -> StationaryFrame {
        let (d, q) = (dq.d as i32, dq.q as i32);
        let (sin, cos) = (self.sin000 as i32, self.cos000 as i32);

        // sin000 = cos(theta) and cos000 = -sin(theta)
        let alpha = d * sin + q * cos;
        let beta = q * sin - d * cos;

        StationaryFrame {
            alpha: saturate(alpha / SINE_AMPLITUDE as i32),
            beta: saturate(beta / SINE_AMPLITUDE as i32),
        }
    }
}

/// Clarke transform of three-phase quantities.
///
/// `alpha = a*2/3 - (b + c)/3`, `beta = (b - c) * 250/433` with 250/433 ~ 1/sqrt(3).
#[inline(always)]
pub const fn clarke(abc: ThreePhase) -> StationaryFrame {
    let (a, b, c) = (abc.a as i32, abc.b as i32, abc.c as i32);

    let alpha = (a * 2 / 3) - ((b + c) / 3);
    let beta = (b - c) * INV_SQRT3_NUM / INV_SQRT3_DEN;

    StationaryFrame {
        alpha: saturate(alpha),
        beta: saturate(beta),
    }
}

/// Inverse Clarke transform, deriving phase C so the result is balanced.
///
/// `a = alpha`, `b = (-alpha + sqrt(3) * beta) / 2`, `c = -(a + b)`.
#[inline(always)]
pub const fn inverse_clarke(ab: StationaryFrame) -> ThreePhase {
    let alpha = ab.alpha as i32;
    let beta_sqrt3 = (ab.beta as i32 * SQRT3_FACTOR) >> 15;

    let a = saturate(alpha);
    let b = saturate((-alpha + beta_sqrt3) / 2);
    ThreePhase::from_ab(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: ThreePhase = ThreePhase {
        a: 100,
        b: -50,
        c: -50,
    };

    #[test]
    fn frame_angles_cache_shifted_projections() {
        let angles = FrameAngles::compute(0);
        assert_eq!(angles.sin000, 512); // cos(0)
        assert_eq!(angles.cos000, 0); // -sin(0)
        assert_eq!(angles.sin120, -256); // sin(210)
        assert_eq!(angles.sin240, -256); // sin(330)

        assert_eq!(FrameAngles::compute(-30), FrameAngles::compute(330));
        assert_eq!(FrameAngles::compute(i32::MIN), FrameAngles::compute(i32::MIN.rem_euclid(360)));
    }

    #[test]
    fn park_aligned_with_phase_a() {
        let dq = FrameAngles::compute(0).park(SAMPLE);
        assert_eq!(dq, RotatingFrame { d: 100, q: 0 });

        let dq = FrameAngles::compute(90).park(SAMPLE);
        assert_eq!(dq, RotatingFrame { d: 0, q: -100 });
    }

    #[test]
    fn clarke_of_balanced_set() {
        // Truncating divisions: 66 + 33
        assert_eq!(clarke(SAMPLE), StationaryFrame { alpha: 99, beta: 0 });
        let ab = clarke(ThreePhase {
            a: 1000,
            b: -300,
            c: -700,
        });
        assert_eq!(ab, StationaryFrame { alpha: 999, beta: 230 });
    }

    #[test]
    fn park_round_trip_matches_clarke() {
        for (abc, tolerance) in [
            (SAMPLE, 2),
            (
                ThreePhase {
                    a: 1000,
                    b: -300,
                    c: -700,
                },
                4,
            ),
        ] {
            let expected = clarke(abc);
            for theta in -360..360 {
                let angles = FrameAngles::compute(theta);
                let ab = angles.inverse_park(angles.park(abc));
                assert!(
                    (ab.alpha as i32 - expected.alpha as i32).abs() <= tolerance,
                    "theta {}: {:?} vs {:?}",
                    theta,
                    ab,
                    expected
                );
                assert!(
                    (ab.beta as i32 - expected.beta as i32).abs() <= tolerance,
                    "theta {}: {:?} vs {:?}",
                    theta,
                    ab,
                    expected
                );
            }
        }
    }

    #[test]
    fn inverse_clarke_is_balanced() {
        for alpha in (-30000..30000).step_by(997) {
            for beta in (-18000..18000).step_by(1009) {
                let abc = inverse_clarke(StationaryFrame {
                    alpha: alpha as i16,
                    beta: beta as i16,
                });
                assert_eq!(abc.sum(), 0, "alpha {} beta {}", alpha, beta);
            }
        }
        let abc = inverse_clarke(clarke(SAMPLE));
        assert_eq!(abc.sum(), 0);
        for (got, want) in [(abc.a, SAMPLE.a), (abc.b, SAMPLE.b), (abc.c, SAMPLE.c)] {
            assert!((got as i32 - want as i32).abs() <= 1, "{:?}", abc);
        }
    }

    #[test]
    fn saturation_instead_of_wrap() {
        assert_eq!(saturate(40000), i16::MAX);
        assert_eq!(saturate(-40000), i16::MIN);
        let abc = ThreePhase::from_ab(i16::MAX, i16::MAX);
        assert_eq!(abc.c, i16::MIN);
    }
}
