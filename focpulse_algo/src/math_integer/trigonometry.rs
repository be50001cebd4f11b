// Implements integer trigonometry over electrical angles expressed in whole degrees.

// Key Features:
// - Quarter-wave sine lookup (91 points over 0..=90 degrees, amplitude 512)
// - Low resolution quarter-wave table (amplitude 100) for open-loop modulation
// - Angle normalization into [0, 360)
// - Table based arcsine and quadrant-aware arctangent without floating point

// Detailed Operation:
// Every function first folds the angle into [0, 360) and then into the first quadrant
// using sin(x) = sin(180 - x) and sin(x) = -sin(x - 180). Inverse functions search the
// same table so that sin/cos and arctan2 stay consistent with each other bit for bit.
// Execution time is bounded: lookups are O(1) and searches take at most 7 steps.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

/// Sine of 0..=90 degrees scaled to [`SINE_AMPLITUDE`].
const SINE_QUARTER_WAVE: [i16; 91] = [
    0, 9, 18, 27, 36, 45, 54, 62, 71, 80, 89, 98, 106, 115, 124, 133, 141, 150, 158, 167, 175,
    183, 192, 200, 208, 216, 224, 232, 240, 248, 256, 264, 271, 279, 286, 294, 301, 308, 315, 322,
    329, 336, 343, 349, 356, 362, 368, 374, 380, 386, 392, 398, 403, 409, 414, 419, 424, 429, 434,
    439, 443, 448, 452, 456, 460, 464, 468, 471, 475, 478, 481, 484, 487, 490, 492, 495, 497, 499,
    501, 503, 504, 506, 507, 508, 509, 510, 511, 511, 512, 512, 512,
];

/// Sine of 0..=90 degrees scaled to [`SINE_LOW_RES_AMPLITUDE`] (percent of full modulation).
const SINE_QUARTER_WAVE_LOW_RES: [i16; 91] = [
    0, 1, 3, 5, 6, 8, 10, 12, 13, 15, 17, 19, 20, 22, 24, 25, 27, 29, 30, 32, 34, 35, 37, 39, 40,
    42, 43, 45, 46, 48, 49, 51, 52, 54, 55, 57, 58, 60, 61, 62, 64, 65, 66, 68, 69, 70, 71, 73,
    74, 75, 76, 77, 78, 79, 80, 81, 82, 83, 84, 85, 86, 87, 88, 89, 89, 90, 91, 92, 92, 93, 93,
    94, 95, 95, 96, 96, 97, 97, 97, 98, 98, 98, 99, 99, 99, 99, 99, 99, 99, 99, 100,
];

/// Full-scale value returned by [`sin_deg`] and [`cos_deg`].
pub const SINE_AMPLITUDE: i16 = 512;

/// Full-scale value returned by [`sin_low_res`].
pub const SINE_LOW_RES_AMPLITUDE: i16 = 100;

/// Input of [`asin_deg`] that maps to 90 degrees.
pub const ASIN_FULL_SCALE: u8 = 128;

/// Reduces any signed angle in degrees into the range `[0, 360)`.
///
/// ### Arguments
/// * `theta` - Electrical angle in degrees, any sign and any number of turns.
///
/// ### Returns
/// * The equivalent angle in `[0, 360)`.
#[inline(always)]
pub const fn limit_theta(theta: i32) -> u16 {
    theta.rem_euclid(360) as u16
}

/// Looks an angle up in a quarter-wave table using the four quadrant symmetries.
#[inline(always)]
const fn quarter_wave_lookup(table: &[i16; 91], theta: i32) -> i16 {
    let theta = limit_theta(theta) as usize;

    if theta <= 90 {
        table[theta] // First quadrant: direct
    } else if theta <= 180 {
        table[180 - theta] // Second quadrant: mirrored
    } else if theta <= 270 {
        -table[theta - 180] // Third quadrant: negated
    } else {
        -table[360 - theta] // Fourth quadrant: negated mirror
    }
}

/// Computes `sin(theta)` from the quarter-wave table.
///
/// ### Arguments
/// * `theta` - Electrical angle in degrees, normalized internally.
///
/// ### Returns
/// * Sine in the range `[-512, 512]`.
#[inline(always)]
pub const fn sin_deg(theta: i32) -> i16 {
    quarter_wave_lookup(&SINE_QUARTER_WAVE, theta)
}

/// Computes `cos(theta)` as `sin(theta + 90)`.
///
/// ### Arguments
/// * `theta` - Electrical angle in degrees, normalized internally.
///
/// ### Returns
/// * Cosine in the range `[-512, 512]`.
#[inline(always)]
pub const fn cos_deg(theta: i32) -> i16 {
    // Normalize first so that the +90 offset cannot overflow
    sin_deg(limit_theta(theta) as i32 + 90)
}

/// Computes a coarse `sin(theta)` in percent, used for open-loop space vector modulation.
#[inline(always)]
pub const fn sin_low_res(theta: i32) -> i16 {
    quarter_wave_lookup(&SINE_QUARTER_WAVE_LOW_RES, theta)
}

/// Computes `arcsin(value / 128)` in degrees.
///
/// ### Arguments
/// * `value` - Sine value in the range `[0, 128]`; larger values saturate.
///
/// ### Returns
/// * Angle in degrees `[0, 90]`, the smallest table angle whose sine reaches `value`.
pub const fn asin_deg(value: u8) -> u8 {
    if value >= ASIN_FULL_SCALE {
        return 90;
    }
    // Rescale 0..128 onto the 0..512 table amplitude
    let target = (value as i16) * (SINE_AMPLITUDE / ASIN_FULL_SCALE as i16);

    let mut lo: usize = 0;
    let mut hi: usize = 90;
    while lo < hi {
        let mid = (lo + hi) / 2;
        if SINE_QUARTER_WAVE[mid] >= target {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    lo as u8
}

/// Sign of `sin(theta) * x - cos(theta) * y` for a first quadrant angle, as a signed distance.
#[inline(always)]
const fn tangent_error(theta: usize, x: i64, y: i64) -> i64 {
    SINE_QUARTER_WAVE[theta] as i64 * x - SINE_QUARTER_WAVE[90 - theta] as i64 * y
}

/// Computes the four-quadrant arctangent of `y / x` in degrees.
///
/// ### Arguments
/// * `y` - Ordinate (e.g. beta component).
/// * `x` - Abscissa (e.g. alpha component).
///
/// ### Returns
/// * Angle in degrees within `[0, 360)`; `arctan2(0, 0)` returns 0.
///
/// ### Notes
/// * The first-quadrant angle is found by a binary search on the sine table comparing
///   cross products, so no division or floating point is involved.
/// * The result is rounded to the table angle with the smallest cross-product error.
pub const fn arctan2(y: i32, x: i32) -> u16 {
    if x == 0 && y == 0 {
        return 0;
    }
    let ax = (x as i64).abs();
    let ay = (y as i64).abs();

    // Smallest angle whose tangent reaches ay / ax
    let mut lo: usize = 0;
    let mut hi: usize = 90;
    while lo < hi {
        let mid = (lo + hi) / 2;
        if tangent_error(mid, ax, ay) >= 0 {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    let mut theta = lo as i32;
    if lo > 0 && -tangent_error(lo - 1, ax, ay) < tangent_error(lo, ax, ay) {
        theta -= 1;
    }

    let angle = if x >= 0 && y >= 0 {
        theta
    } else if x < 0 && y >= 0 {
        180 - theta
    } else if x < 0 {
        180 + theta
    } else {
        360 - theta
    };
    limit_theta(angle)
}
