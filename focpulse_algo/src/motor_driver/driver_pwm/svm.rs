// Implements the space vector modulation engine: stationary frame voltage to timer compare counts.

// Key Features:
// - Sector detection from the three auxiliary projections X, Y and Z
// - Per-sector phase timings centred on a quarter period
// - Dead-time compensation driven by the sign of the measured phase currents
// - Saturation of every count into [0, period / 2]

// Detailed Operation:
// alpha is scaled by period * sqrt(3) * 2 and beta by -period * 2, which gives
// X = Ubeta, Y = (Ubeta + Ualpha) / 2 and Z = (Ubeta - Ualpha) / 2. The signs of X, Y and Z
// select one of six sectors. Each sector has its own pair of timing formulas, all of them
// starting from period / 4 (50 % duty) and offset by the projections divided by 2^18 or 2^17.
// Products are carried in i64 since a full-scale alpha times the scaled period exceeds i32.
// The engine is pure: it owns no state and can run for several motors in parallel.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use crate::math_integer::transforms::{PhaseCurrents, StationaryFrame};
use crate::motor_driver::{DutyCycles, Sector};

/// Divisor applied to the half sum of two projections
const HALF_SHIFT: u32 = 18;
/// Divisor applied to a single projection
const FULL_SHIFT: u32 = 17;

#[inline(always)]
const fn scale_half(value: i64) -> i64 {
    value / (1 << HALF_SHIFT)
}

#[inline(always)]
const fn scale_full(value: i64) -> i64 {
    value / (1 << FULL_SHIFT)
}

#[inline(always)]
fn clamp_count(value: i64, limit: u16) -> u16 {
    value.clamp(0, limit as i64) as u16
}

/// Selects the sector from the signs of the projections
#[inline(always)]
const fn select_sector(x: i64, y: i64, z: i64) -> Sector {
    if y < 0 {
        if z < 0 {
            Sector::S5
        } else if x <= 0 {
            Sector::S4
        } else {
            Sector::S3
        }
    } else if z >= 0 {
        Sector::S2
    } else if x <= 0 {
        Sector::S6
    } else {
        Sector::S1
    }
}

/// Converts a stationary frame voltage into compare counts.
///
/// ### Arguments
/// * `period` - Full PWM period in timer counts.
/// * `t_sqrt3` - `period * 0xDDB4 / 16384`, see [`crate::motor_driver::PwmConfig::t_sqrt3`].
/// * `v` - Voltage reference, full scale = 32767.
///
/// ### Returns
/// * Duty cycles with `low <= mid <= high`, every count within `[0, period / 2]`.
///   The zero vector gives `period / 4` on every phase in sector S2.
pub fn compute_duty_cycles(period: u16, t_sqrt3: i32, v: StationaryFrame) -> DutyCycles {
    let u_alpha = v.alpha as i64 * t_sqrt3 as i64;
    let u_beta = -(v.beta as i64 * period as i64) * 2;

    let x = u_beta;
    let y = (u_beta + u_alpha) / 2;
    let z = (u_beta - u_alpha) / 2;

    let quarter = (period / 4) as i64;
    let sector = select_sector(x, y, z);

    let (a, b, c) = match sector {
        Sector::S1 | Sector::S4 => {
            let a = quarter + scale_half(x - z);
            let b = a + scale_full(z);
            (a, b, b - scale_full(x))
        }
        Sector::S2 | Sector::S5 => {
            let a = quarter + scale_half(y - z);
            (a, a + scale_full(z), a - scale_full(y))
        }
        Sector::S3 | Sector::S6 => {
            let a = quarter + scale_half(y - x);
            let c = a - scale_full(y);
            (a, c + scale_full(x), c)
        }
    };

    let (low, mid, high) = match sector {
        Sector::S1 => (c, b, a),
        Sector::S2 => (c, a, b),
        Sector::S3 => (a, c, b),
        Sector::S4 => (a, b, c),
        Sector::S5 => (b, a, c),
        Sector::S6 => (b, c, a),
    };

    let limit = period / 2;
    DutyCycles {
        sector,
        low: clamp_count(low, limit),
        mid: clamp_count(mid, limit),
        high: clamp_count(high, limit),
        a: clamp_count(a, limit),
        b: clamp_count(b, limit),
        c: clamp_count(c, limit),
    }
}

/// Shifts each phase by `comp` counts against the voltage lost during the dead time.
///
/// A phase with a positive current gains `comp` counts, any other phase loses them.
/// Results stay within `[0, period / 2]`; the ordered timings are left untouched.
pub fn compensate_dead_time(duty: &mut DutyCycles, currents: &PhaseCurrents, comp: u16, period: u16) {
    let limit = period / 2;
    let shift = |count: u16, current: i16| -> u16 {
        let comp = comp as i64;
        let count = count as i64;
        if current > 0 {
            clamp_count(count + comp, limit)
        } else {
            clamp_count(count - comp, limit)
        }
    };
    duty.a = shift(duty.a, currents.a);
    duty.b = shift(duty.b, currents.b);
    duty.c = shift(duty.c, currents.c);
}
