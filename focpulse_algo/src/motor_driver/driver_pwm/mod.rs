// Implements the PWM & current feedback handle of one inverter.

// Key Features:
// - Generic over the current sensing topology, bound once at construction
// - Space vector modulation with optional dead-time compensation
// - Phase current acquisition and estimation for topologies that need a prediction
// - Offset calibration sequencing, PWM switching and protection hooks

// Detailed Operation:
// set_phase_voltage turns an alpha/beta voltage into compare counts, compensates the dead
// time with the sign of the latest measured or estimated currents and hands the result to
// the topology.
// The counts are kept only once the topology confirms they were loaded in time; a missed
// deadline leaves the previous counts in place and is reported to the caller.
// Every other operation is a thin forward to the topology plus the bookkeeping of the
// mode flags. Several handles can run side by side, they share no state.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

pub mod estimator;
pub mod sel_current;
pub mod svm;

#[cfg(test)]
pub(crate) mod mock;

use estimator::CurrentEstimator;

use crate::math_integer::transforms::{PhaseCurrents, RotatingFrame, StationaryFrame};

use super::{
    CalibrationAction, CalibrationOffsets, CalibrationState, ConfigError, CurrentSense,
    DeadlineMissed, DutyCycles, OffsetCalibrator, PwmConfig, Sector,
};

pub struct DriverPWM<S: CurrentSense> {
    config: PwmConfig,
    t_sqrt3: i32,

    /// Counts accepted by the topology in the last update
    duty: DutyCycles,
    /// Latest measured or estimated phase currents
    currents: PhaseCurrents,
    estimator: CurrentEstimator,
    calibrator: OffsetCalibrator,

    align_flag: bool,
    dpwm_mode: bool,
    low_sides_on: bool,

    sense: S,
}

impl<S: CurrentSense> DriverPWM<S> {
    /// Validates `config` and binds the topology
    pub fn new(config: PwmConfig, sense: S) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(DriverPWM {
            config,
            t_sqrt3: config.t_sqrt3(),
            duty: DutyCycles::centered(config.period),
            currents: PhaseCurrents::default(),
            estimator: CurrentEstimator::new(config.lpf_iqd_const),
            calibrator: OffsetCalibrator::new(config.off_calibr_wait_ticks),
            align_flag: false,
            dpwm_mode: false,
            low_sides_on: false,
            sense,
        })
    }

    #[inline(always)]
    pub fn config(&self) -> &PwmConfig {
        &self.config
    }

    /// PWM periods between two calls of `set_phase_voltage`
    #[inline(always)]
    pub fn repetition_counter(&self) -> u8 {
        self.config.repetition_counter
    }

    /// Resets the current estimation and forgets the last measured or estimated currents
    pub fn clear(&mut self) {
        self.estimator.reset();
        self.currents = PhaseCurrents::default();
    }

    /// Computes and loads the duty cycles for a stationary frame voltage.
    ///
    /// ### Returns
    /// * `Err(DeadlineMissed)` when the topology loaded the counts too late,
    ///   the previously accepted counts are kept.
    pub fn set_phase_voltage(&mut self, v: StationaryFrame) -> Result<(), DeadlineMissed> {
        let mut duty = svm::compute_duty_cycles(self.config.period, self.t_sqrt3, v);
        if self.config.dead_time_compensation {
            svm::compensate_dead_time(
                &mut duty,
                &self.currents,
                self.config.dead_time_comp_cnt,
                self.config.period,
            );
        }
        self.sense.set_sampling_point(&duty)?;
        self.duty = duty;
        Ok(())
    }

    #[inline(always)]
    pub fn duty_cycles(&self) -> &DutyCycles {
        &self.duty
    }

    #[inline(always)]
    pub fn sector(&self) -> Sector {
        self.duty.sector
    }

    /// Reads the phase currents from the topology
    pub fn get_phase_currents(&mut self) -> PhaseCurrents {
        let estimate = self.estimator.estimate();
        self.currents = self.sense.get_phase_currents(&estimate);
        self.currents
    }

    /// Latest measured or estimated currents, used by dead-time compensation
    #[inline(always)]
    pub fn phase_currents(&self) -> PhaseCurrents {
        self.currents
    }

    /// Updates the current estimate from the rotor frame current and electrical angle (degrees)
    pub fn estimate_currents(&mut self, idq: RotatingFrame, theta_elec: i32) -> PhaseCurrents {
        self.currents = self.estimator.tick(idq, theta_elec);
        self.currents
    }

    #[inline(always)]
    pub fn estimated_currents(&self) -> PhaseCurrents {
        self.estimator.estimate()
    }

    pub fn switch_on_pwm(&mut self) {
        self.low_sides_on = false;
        self.sense.switch_on_pwm();
    }

    pub fn switch_off_pwm(&mut self) {
        self.low_sides_on = false;
        self.sense.switch_off_pwm();
    }

    /// Charges the bootstrap capacitors through the low-side switches
    pub fn turn_on_low_sides(&mut self) {
        self.low_sides_on = true;
        self.sense.turn_on_low_sides();
    }

    #[inline(always)]
    pub fn low_sides_on(&self) -> bool {
        self.low_sides_on
    }

    /// Runs the offset calibration sequencer, returns true once the offsets are measured
    pub fn current_reading_calibration(&mut self, action: CalibrationAction) -> bool {
        if action == CalibrationAction::Start {
            self.low_sides_on = false;
        }
        self.calibrator.run(action, &mut self.sense)
    }

    #[inline(always)]
    pub fn calibration_state(&self) -> CalibrationState {
        self.calibrator.state()
    }

    pub fn set_offset_calibration(&mut self, offsets: CalibrationOffsets) {
        self.sense.set_offset_calibration(offsets);
    }

    pub fn offset_calibration(&self) -> CalibrationOffsets {
        self.sense.offset_calibration()
    }

    /// Polls the hardware over-current flag
    pub fn is_over_current_detected(&mut self) -> bool {
        self.sense.is_over_current_detected()
    }

    pub fn set_over_current_threshold(&mut self, threshold: u16) {
        self.sense.set_over_current_threshold(threshold);
    }

    pub fn rl_detection_mode_enable(&mut self) {
        self.sense.rl_detection_mode_enable();
    }

    pub fn rl_detection_mode_disable(&mut self) {
        self.sense.rl_detection_mode_disable();
    }

    /// Applies a fixed duty during RL identification
    pub fn rl_detection_mode_set_duty(&mut self, duty: u16) -> Result<(), DeadlineMissed> {
        self.sense.rl_detection_mode_set_duty(duty)
    }

    pub fn set_align_flag(&mut self, flag: bool) {
        self.align_flag = flag;
    }

    #[inline(always)]
    pub fn align_flag(&self) -> bool {
        self.align_flag
    }

    pub fn dpwm_mode_enable(&mut self) {
        self.dpwm_mode = true;
    }

    pub fn dpwm_mode_disable(&mut self) {
        self.dpwm_mode = false;
    }

    #[inline(always)]
    pub fn dpwm_mode(&self) -> bool {
        self.dpwm_mode
    }

    #[inline(always)]
    pub fn sense(&self) -> &S {
        &self.sense
    }

    #[inline(always)]
    pub fn sense_mut(&mut self) -> &mut S {
        &mut self.sense
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockSense;
    use super::*;

    fn driver(config: PwmConfig) -> DriverPWM<MockSense> {
        DriverPWM::new(config, MockSense::default()).unwrap()
    }

    #[test]
    fn rejects_invalid_configuration() {
        let result = DriverPWM::new(PwmConfig::new(0), MockSense::default());
        assert!(matches!(result, Err(ConfigError::PeriodTooShort(0))));
    }

    #[test]
    fn zero_vector_loads_half_duty() {
        let mut pwm = driver(PwmConfig::new(1000));
        pwm.set_phase_voltage(StationaryFrame::default()).unwrap();
        let loaded = pwm.sense().loaded.unwrap();
        assert_eq!(loaded.channels(), [250; 3]);
        assert_eq!(pwm.duty_cycles(), &loaded);
        assert_eq!(pwm.sector(), Sector::S2);
    }

    #[test]
    fn missed_deadline_keeps_previous_counts() {
        let mut pwm = driver(PwmConfig::new(1000));
        pwm.set_phase_voltage(StationaryFrame { alpha: 16000, beta: 0 }).unwrap();
        let accepted = *pwm.duty_cycles();

        pwm.sense_mut().miss_deadline = true;
        let result = pwm.set_phase_voltage(StationaryFrame { alpha: -16000, beta: 0 });
        assert_eq!(result, Err(DeadlineMissed));
        assert_eq!(pwm.duty_cycles(), &accepted);
    }

    #[test]
    fn dead_time_uses_last_measured_currents() {
        let mut pwm = driver(PwmConfig::new(1000).with_dead_time_compensation(10));
        pwm.sense_mut().measured = PhaseCurrents {
            a: 100,
            b: -50,
            c: -50,
        };
        pwm.get_phase_currents();
        pwm.set_phase_voltage(StationaryFrame { alpha: 16000, beta: 0 }).unwrap();
        assert_eq!(pwm.duty_cycles().channels(), [365, 134, 134]);

        let mut plain = driver(PwmConfig::new(1000));
        plain.set_phase_voltage(StationaryFrame { alpha: 16000, beta: 0 }).unwrap();
        assert_eq!(plain.duty_cycles().channels(), [355, 144, 144]);
    }

    #[test]
    fn estimate_is_handed_to_the_topology() {
        let mut pwm = driver(PwmConfig::new(1000).with_lpf_const(32768));
        let estimate = pwm.estimate_currents(RotatingFrame { d: 500, q: 0 }, 0);
        assert_eq!(estimate.a, 500);
        assert_eq!(estimate.sum(), 0);

        pwm.get_phase_currents();
        assert_eq!(pwm.sense().last_estimate, Some(estimate));

        pwm.clear();
        assert_eq!(pwm.estimated_currents(), PhaseCurrents::default());
    }

    #[test]
    fn dead_time_follows_the_latest_estimate() {
        let mut pwm = driver(
            PwmConfig::new(1000)
                .with_lpf_const(32768)
                .with_dead_time_compensation(10),
        );
        // Current along -alpha: phase A negative, B and C positive
        let estimate = pwm.estimate_currents(RotatingFrame { d: -500, q: 0 }, 0);
        assert_eq!(pwm.phase_currents(), estimate);
        assert!(estimate.a < 0 && estimate.b > 0 && estimate.c > 0);

        pwm.set_phase_voltage(StationaryFrame { alpha: 16000, beta: 0 }).unwrap();
        assert_eq!(pwm.duty_cycles().channels(), [345, 154, 154]);
    }

    #[test]
    fn clear_drops_stale_currents_from_dead_time() {
        let mut pwm = driver(
            PwmConfig::new(1000)
                .with_lpf_const(32768)
                .with_dead_time_compensation(10),
        );
        pwm.estimate_currents(RotatingFrame { d: -500, q: 0 }, 0);
        assert_ne!(pwm.phase_currents(), PhaseCurrents::default());

        pwm.clear();
        assert_eq!(pwm.phase_currents(), PhaseCurrents::default());
        assert_eq!(pwm.estimated_currents(), PhaseCurrents::default());

        // Zero currents count as negative: every phase loses the same compensation
        pwm.set_phase_voltage(StationaryFrame::default()).unwrap();
        assert_eq!(pwm.duty_cycles().channels(), [240; 3]);
    }

    #[test]
    fn calibration_switches_pwm_off() {
        let mut pwm = driver(PwmConfig::new(1000).with_calibration_wait(2));
        pwm.turn_on_low_sides();
        assert!(pwm.low_sides_on());

        assert!(!pwm.current_reading_calibration(CalibrationAction::Start));
        assert!(!pwm.low_sides_on());
        assert!(!pwm.sense().pwm_on);
        assert_eq!(pwm.calibration_state(), CalibrationState::Waiting(2));

        assert!(!pwm.current_reading_calibration(CalibrationAction::Exec));
        assert!(pwm.current_reading_calibration(CalibrationAction::Exec));
        assert_eq!(pwm.offset_calibration(), CalibrationOffsets::MIDSCALE);
    }

    #[test]
    fn flags_and_forwarders() {
        let mut pwm = driver(PwmConfig::new(1000).with_repetition_counter(2));
        assert_eq!(pwm.repetition_counter(), 2);
        pwm.set_align_flag(true);
        assert!(pwm.align_flag());
        pwm.dpwm_mode_enable();
        assert!(pwm.dpwm_mode());
        pwm.dpwm_mode_disable();
        assert!(!pwm.dpwm_mode());

        pwm.set_over_current_threshold(0x8000);
        assert_eq!(pwm.sense().threshold, 0x8000);

        pwm.sense_mut().over_current = true;
        assert!(pwm.is_over_current_detected());
        assert!(!pwm.is_over_current_detected());

        pwm.rl_detection_mode_enable();
        assert_eq!(pwm.rl_detection_mode_set_duty(100), Err(DeadlineMissed));

        let offsets = CalibrationOffsets {
            phase_a: 1,
            phase_b: 2,
            phase_c: 3,
        };
        pwm.set_offset_calibration(offsets);
        assert_eq!(pwm.offset_calibration(), offsets);

        pwm.turn_on_low_sides();
        pwm.switch_on_pwm();
        assert!(!pwm.low_sides_on());
        assert_eq!(pwm.sense().low_sides_calls, 1);
    }
}
