// Implements the PWM & current feedback side of the motor driver: types shared between the
// space vector engine, the current sensing topologies and the calibration sequencer.

// Key Features:
// - Defines the six SVM sectors and the duty cycle set handed to the timer
// - Defines the driver status used by the motor controller
// - Re-exports the dispatch handle, configuration, faults and the topology trait

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

pub mod calibration;
pub mod config;
pub mod current_sense;
pub mod driver_pwm;
pub mod fault;

pub use calibration::{CalibrationAction, CalibrationState, OffsetCalibrator};
pub use config::{ConfigError, PwmConfig};
pub use current_sense::{CalibrationOffsets, CurrentSense};
pub use driver_pwm::DriverPWM;
pub use fault::{DeadlineMissed, Fault, FaultFlags, FaultLatch};

/// Motor driver status as seen by the scheduling layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriverStatus {
    /// Offset calibration in progress, PWM outputs are off
    Calibrating,
    /// PWM outputs are on, duty cycles are accepted
    Ready,
    /// Emergency stop, nothing is applied until the next calibration
    Error,
}

/// One of the six 60 degree regions of the voltage vector plane
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Sector {
    S1 = 0,
    /// Selected for the zero vector
    #[default]
    S2 = 1,
    S3 = 2,
    S4 = 3,
    S5 = 4,
    S6 = 5,
}

impl Sector {
    /// Zero based sector index (0..=5)
    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Sector from a zero based index
    pub const fn from_index(index: usize) -> Option<Sector> {
        match index {
            0 => Some(Sector::S1),
            1 => Some(Sector::S2),
            2 => Some(Sector::S3),
            3 => Some(Sector::S4),
            4 => Some(Sector::S5),
            5 => Some(Sector::S6),
            _ => None,
        }
    }
}

/// Inverter phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    A,
    B,
    C,
}

/// Timer compare counts of one PWM period.
///
/// All counts lie in `[0, period / 2]`, `period / 4` being 50 % duty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DutyCycles {
    /// Sector the voltage vector falls in
    pub sector: Sector,
    /// Smallest of the three timings
    pub low: u16,
    /// Middle timing
    pub mid: u16,
    /// Largest timing
    pub high: u16,
    /// Compare count of phase A
    pub a: u16,
    /// Compare count of phase B
    pub b: u16,
    /// Compare count of phase C
    pub c: u16,
}

impl DutyCycles {
    /// 50 % on every phase (zero voltage vector)
    pub const fn centered(period: u16) -> Self {
        let quarter = period / 4;
        DutyCycles {
            sector: Sector::S2,
            low: quarter,
            mid: quarter,
            high: quarter,
            a: quarter,
            b: quarter,
            c: quarter,
        }
    }

    /// Compare counts in phase order
    #[inline(always)]
    pub const fn channels(&self) -> [u16; 3] {
        [self.a, self.b, self.c]
    }

    /// Compare count of a single phase
    #[inline(always)]
    pub const fn channel(&self, phase: Phase) -> u16 {
        match phase {
            Phase::A => self.a,
            Phase::B => self.b,
            Phase::C => self.c,
        }
    }
}
