// Capability set every current sensing topology provides to the PWM & current feedback handle.

// Key Features:
// - Phase current acquisition and sampling point scheduling
// - PWM output switching and low-side bootstrap charging
// - Offset calibration and over-current threshold handling
// - Optional RL identification hooks with default implementations

// Detailed Operation:
// A topology (three shunt, ICS, single shunt...) owns the timer and ADC peripherals. The
// generic DriverPWM handle calls it after computing duty cycles and whenever the scheduler
// asks for a PWM state change. The topology is bound at construction, so every call is
// statically dispatched and no slot can be left unset.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use super::fault::DeadlineMissed;
use super::DutyCycles;
use crate::math_integer::transforms::PhaseCurrents;

/// Zero-current ADC readings of each phase, left aligned (0..=65535)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationOffsets {
    pub phase_a: i32,
    pub phase_b: i32,
    pub phase_c: i32,
}

impl CalibrationOffsets {
    /// Offsets of an ideal amplifier centred on half scale
    pub const MIDSCALE: CalibrationOffsets = CalibrationOffsets {
        phase_a: 0x8000,
        phase_b: 0x8000,
        phase_c: 0x8000,
    };
}

pub trait CurrentSense {
    /// Reads the phase currents of the last PWM period.
    ///
    /// `estimated` carries the model prediction for topologies that cannot measure
    /// every period (single shunt in a low modulation window).
    fn get_phase_currents(&mut self, estimated: &PhaseCurrents) -> PhaseCurrents;

    /// Enables the PWM outputs
    fn switch_on_pwm(&mut self);

    /// Disables the PWM outputs
    fn switch_off_pwm(&mut self);

    /// Turns the low-side switches on to charge the bootstrap capacitors
    fn turn_on_low_sides(&mut self);

    /// Writes the compare registers and schedules the next ADC trigger.
    ///
    /// Fails when the timer update event already passed. On `Err(DeadlineMissed)` nothing is
    /// written: the previously loaded compare counts and ADC trigger stay in effect.
    fn set_sampling_point(&mut self, duty: &DutyCycles) -> Result<(), DeadlineMissed>;

    /// Polls and clears the hardware over-current flag
    fn is_over_current_detected(&mut self) -> bool;

    /// Measures the zero-current offsets with PWM switched off
    fn calibrate_current_reading(&mut self);

    /// Loads previously measured offsets
    fn set_offset_calibration(&mut self, offsets: CalibrationOffsets);

    /// Offsets currently in use
    fn offset_calibration(&self) -> CalibrationOffsets;

    /// Sets the over-current comparator reference
    fn set_over_current_threshold(&mut self, threshold: u16);

    fn rl_detection_mode_enable(&mut self) {}

    fn rl_detection_mode_disable(&mut self) {}

    /// Applies a fixed duty to phase A during RL identification
    fn rl_detection_mode_set_duty(&mut self, _duty: u16) -> Result<(), DeadlineMissed> {
        Err(DeadlineMissed)
    }
}
