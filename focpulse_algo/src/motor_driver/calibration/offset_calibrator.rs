// Sequences the zero-current offset measurement of the current sensing topology.

// Key Features:
// - Switches PWM off and waits a configurable number of system ticks
// - Runs the topology's offset measurement once the waiting time elapsed
// - Reports completion so the caller knows when PWM may be enabled again

// Detailed Operation:
// Start disables the outputs and arms the wait counter. Each Exec step decrements it and
// the measurement runs on the step that reaches zero. With a zero wait the measurement runs
// directly from Start. Exec outside of a sequence reports completion and does nothing.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use crate::motor_driver::CurrentSense;

/// Request passed to [`OffsetCalibrator::run`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalibrationAction {
    /// Begin a new measurement
    Start,
    /// Advance the running measurement by one system tick
    Exec,
}

/// Progress of the offset measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalibrationState {
    Idle,                // No measurement pending
    Waiting(u16),        // Ticks left before sampling
}

pub struct OffsetCalibrator {
    wait_ticks: u16,
    state: CalibrationState,
}

impl OffsetCalibrator {
    pub const fn new(wait_ticks: u16) -> Self {
        OffsetCalibrator {
            wait_ticks,
            state: CalibrationState::Idle,
        }
    }

    #[inline(always)]
    pub fn state(&self) -> CalibrationState {
        self.state
    }

    /// Dispatches an action, returns true once the offsets are measured
    pub fn run<S: CurrentSense>(&mut self, action: CalibrationAction, sense: &mut S) -> bool {
        match action {
            CalibrationAction::Start => self.start(sense),
            CalibrationAction::Exec => self.step(sense),
        }
    }

    /// Switches PWM off and arms the wait counter
    pub fn start<S: CurrentSense>(&mut self, sense: &mut S) -> bool {
        sense.switch_off_pwm();
        if self.wait_ticks == 0 {
            self.execute(sense);
            true
        } else {
            self.state = CalibrationState::Waiting(self.wait_ticks);
            false
        }
    }

    /// Advances the wait counter by one tick
    pub fn step<S: CurrentSense>(&mut self, sense: &mut S) -> bool {
        match self.state {
            CalibrationState::Waiting(ticks) if ticks > 1 => {
                self.state = CalibrationState::Waiting(ticks - 1);
                false
            }
            CalibrationState::Waiting(_) => {
                self.execute(sense);
                true
            }
            CalibrationState::Idle => true,
        }
    }

    fn execute<S: CurrentSense>(&mut self, sense: &mut S) {
        sense.calibrate_current_reading();
        let offsets = sense.offset_calibration();
        debug!(
            "current offsets A:{} B:{} C:{}",
            offsets.phase_a, offsets.phase_b, offsets.phase_c
        );
        self.state = CalibrationState::Idle;
    }
}
