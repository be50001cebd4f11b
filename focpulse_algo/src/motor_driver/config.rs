// Immutable configuration of one PWM & current feedback instance.

// Key Features:
// - Period, repetition counter and dead-time compensation settings
// - Low-pass constant of the current estimator and offset calibration delay
// - Over-current threshold and three-shunt sampling margins
// - Validation performed once when the dispatch handle is built

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use thiserror::Error;

use crate::math_integer::{filters::lpf::LPF_BYPASS, transforms::SQRT3_FACTOR};

/// Rejected configuration values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    #[error("PWM period must be at least 4 timer counts, got {0}")]
    PeriodTooShort(u16),
    #[error("low-pass constant must be within 1..=32768, got {0}")]
    FilterConstant(i32),
    #[error("dead-time compensation of {0} counts exceeds half a period")]
    CompensationTooLarge(u16),
    #[error("sampling margin of {0} counts exceeds half a period")]
    SamplingWindow(u16),
}

/// Configuration constants supplied at drive initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PwmConfig {
    /// Timer counts of a full centre-aligned PWM period (compare range is `0..=period/2`)
    pub period: u16,
    /// PWM periods between two control updates, programmed into the timer by the topology
    pub repetition_counter: u8,
    /// Enables dead-time compensation in the duty cycle engine
    pub dead_time_compensation: bool,
    /// Counts added to or removed from a phase depending on its current sign
    pub dead_time_comp_cnt: u16,
    /// Low-pass constant of the current estimator (`t / 32768` per tick)
    pub lpf_iqd_const: i32,
    /// System ticks to wait after switching PWM off before sampling offsets
    pub off_calibr_wait_ticks: u16,
    /// Over-current protection reference (0 = 0 V, 0xFFFF = DAC reference)
    pub over_current_threshold: u16,
    /// Counts needed after a switching edge before the ADC can sample
    pub t_after: u16,
    /// Counts needed by the ADC before a switching edge
    pub t_before: u16,
}

impl PwmConfig {
    /// Default parameters for a given period
    pub const fn new(period: u16) -> Self {
        PwmConfig {
            period,
            repetition_counter: 1,
            dead_time_compensation: false,
            dead_time_comp_cnt: 0,
            lpf_iqd_const: 4096,
            off_calibr_wait_ticks: 0,
            over_current_threshold: u16::MAX,
            t_after: 0,
            t_before: 0,
        }
    }

    pub const fn with_repetition_counter(self, repetition_counter: u8) -> Self {
        PwmConfig {
            repetition_counter,
            ..self
        }
    }

    /// Enables dead-time compensation with the given amount of counts
    pub const fn with_dead_time_compensation(self, dead_time_comp_cnt: u16) -> Self {
        PwmConfig {
            dead_time_compensation: true,
            dead_time_comp_cnt,
            ..self
        }
    }

    pub const fn with_lpf_const(self, lpf_iqd_const: i32) -> Self {
        PwmConfig {
            lpf_iqd_const,
            ..self
        }
    }

    pub const fn with_calibration_wait(self, off_calibr_wait_ticks: u16) -> Self {
        PwmConfig {
            off_calibr_wait_ticks,
            ..self
        }
    }

    pub const fn with_over_current_threshold(self, over_current_threshold: u16) -> Self {
        PwmConfig {
            over_current_threshold,
            ..self
        }
    }

    pub const fn with_sampling_margins(self, t_after: u16, t_before: u16) -> Self {
        PwmConfig {
            t_after,
            t_before,
            ..self
        }
    }

    /// Largest compare count (100 % duty)
    #[inline(always)]
    pub const fn half_period(&self) -> u16 {
        self.period / 2
    }

    /// `period * sqrt(3) * 2` in fixed point: `period * 0xDDB4 / 16384`
    #[inline(always)]
    pub const fn t_sqrt3(&self) -> i32 {
        ((self.period as i64 * SQRT3_FACTOR as i64) / 16384) as i32
    }

    /// Checks every constant against the ranges the engine relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.period < 4 {
            return Err(ConfigError::PeriodTooShort(self.period));
        }
        if self.lpf_iqd_const < 1 || self.lpf_iqd_const > LPF_BYPASS {
            return Err(ConfigError::FilterConstant(self.lpf_iqd_const));
        }
        if self.dead_time_comp_cnt > self.half_period() {
            return Err(ConfigError::CompensationTooLarge(self.dead_time_comp_cnt));
        }
        let margin = self.t_after.max(self.t_before);
        if margin >= self.half_period() {
            return Err(ConfigError::SamplingWindow(margin));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PwmConfig::new(1000);
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.half_period(), 500);
        assert_eq!(config.t_sqrt3(), 3464);
        assert!(!config.dead_time_compensation);
    }

    #[test]
    fn builders_set_fields() {
        let config = PwmConfig::new(8400)
            .with_dead_time_compensation(12)
            .with_calibration_wait(64)
            .with_sampling_margins(90, 40)
            .with_repetition_counter(3);
        assert!(config.dead_time_compensation);
        assert_eq!(config.dead_time_comp_cnt, 12);
        assert_eq!(config.off_calibr_wait_ticks, 64);
        assert_eq!((config.t_after, config.t_before), (90, 40));
        assert_eq!(config.repetition_counter, 3);
        assert_eq!(config.t_sqrt3(), 29098);
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert_eq!(
            PwmConfig::new(2).validate(),
            Err(ConfigError::PeriodTooShort(2))
        );
        assert_eq!(
            PwmConfig::new(1000).with_lpf_const(0).validate(),
            Err(ConfigError::FilterConstant(0))
        );
        assert_eq!(
            PwmConfig::new(1000).with_lpf_const(40000).validate(),
            Err(ConfigError::FilterConstant(40000))
        );
        assert_eq!(
            PwmConfig::new(1000)
                .with_dead_time_compensation(501)
                .validate(),
            Err(ConfigError::CompensationTooLarge(501))
        );
        assert_eq!(
            PwmConfig::new(1000).with_sampling_margins(10, 500).validate(),
            Err(ConfigError::SamplingWindow(500))
        );
    }

    #[test]
    fn t_sqrt3_does_not_overflow_for_full_range_period() {
        assert_eq!(PwmConfig::new(u16::MAX).t_sqrt3(), 227_020);
    }
}
