// Recording topology for unit tests.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use crate::math_integer::transforms::PhaseCurrents;
use crate::motor_driver::{CalibrationOffsets, CurrentSense, DeadlineMissed, DutyCycles};

#[derive(Default)]
pub struct MockSense {
    pub pwm_on: bool,
    pub pwm_on_calls: usize,
    pub pwm_off_calls: usize,
    pub low_sides_calls: usize,
    pub calibrations: usize,
    pub offsets: CalibrationOffsets,
    pub threshold: u16,
    pub over_current: bool,
    pub miss_deadline: bool,
    pub loaded: Option<DutyCycles>,
    pub measured: PhaseCurrents,
    pub last_estimate: Option<PhaseCurrents>,
}

impl CurrentSense for MockSense {
    fn get_phase_currents(&mut self, estimated: &PhaseCurrents) -> PhaseCurrents {
        self.last_estimate = Some(*estimated);
        self.measured
    }

    fn switch_on_pwm(&mut self) {
        self.pwm_on = true;
        self.pwm_on_calls += 1;
    }

    fn switch_off_pwm(&mut self) {
        self.pwm_on = false;
        self.pwm_off_calls += 1;
    }

    fn turn_on_low_sides(&mut self) {
        self.low_sides_calls += 1;
    }

    fn set_sampling_point(&mut self, duty: &DutyCycles) -> Result<(), DeadlineMissed> {
        if self.miss_deadline {
            return Err(DeadlineMissed);
        }
        self.loaded = Some(*duty);
        Ok(())
    }

    fn is_over_current_detected(&mut self) -> bool {
        core::mem::take(&mut self.over_current)
    }

    fn calibrate_current_reading(&mut self) {
        self.calibrations += 1;
        self.offsets = CalibrationOffsets::MIDSCALE;
    }

    fn set_offset_calibration(&mut self, offsets: CalibrationOffsets) {
        self.offsets = offsets;
    }

    fn offset_calibration(&self) -> CalibrationOffsets {
        self.offsets
    }

    fn set_over_current_threshold(&mut self, threshold: u16) {
        self.threshold = threshold;
    }
}
