// Single-pole low-pass filter on a 15-bit fixed-point accumulator.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

/// Number of fractional bits kept in the accumulator.
const ACC_SHIFT: u32 = 15;

/// Filter constant meaning "no filtering" (output follows the input in one tick).
pub const LPF_BYPASS: i32 = 1 << ACC_SHIFT;

/// Accumulator based first order low-pass filter.
///
/// `acc += (input - acc >> 15) * t`, `output = acc >> 15`, where `t / 32768` is the
/// per-tick smoothing factor.
pub struct FilterLPF {
    t: i32,      // Filter constant (1..=32768 = 0.0..1.0)
    acc: i32,    // Stores scaled filtered value
    output: i16,
}

impl FilterLPF {
    /// Constructor to initialize the filter with a default output and constant
    pub const fn new(input_default: i16, t: i32) -> FilterLPF {
        FilterLPF {
            t,
            acc: (input_default as i32) << ACC_SHIFT,
            output: input_default,
        }
    }

    /// Math call
    #[inline(always)]
    pub fn tick(&mut self, input: i16) -> i16 {
        let prev = self.acc >> ACC_SHIFT;

        // The product alone can exceed i32 on a full-scale step, the sum cannot
        let step = (input as i64 - prev as i64) * self.t as i64;
        self.acc = (self.acc as i64 + step).clamp(i32::MIN as i64, i32::MAX as i64) as i32;

        self.output = (self.acc >> ACC_SHIFT) as i16;
        self.output
    }

    /// Function to retrieve the output value
    #[inline(always)]
    pub fn get_output(&self) -> i16 {
        self.output
    }

    /// Function to change the filter constant
    pub fn set_t(&mut self, t: i32) {
        self.t = t;
    }

    /// Zeroes the accumulator and the output
    pub fn reset(&mut self) {
        self.acc = 0;
        self.output = 0;
    }
}
