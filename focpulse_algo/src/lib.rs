// PWM generation & current feedback core of a field oriented motor drive.

// Key Features:
// - Integer rotation math: sine tables, Clarke/Park and their inverses
// - Space vector modulation with dead-time compensation
// - Phase current acquisition through a pluggable sensing topology
// - Offset calibration, over-current break-in and fault latching
// - Entry points sized for the PWM update, ADC and system tick interrupts

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[macro_use]
mod fmt;

pub mod math_integer;
pub mod motor_driver;
pub mod telemetry;

use math_integer::transforms::{PhaseCurrents, RotatingFrame, StationaryFrame};
use motor_driver::{
    CalibrationAction, ConfigError, CurrentSense, DriverPWM, DriverStatus, Fault, FaultFlags,
    FaultLatch, PwmConfig,
};

pub use telemetry::{snapshot, Telemetry};

/// Drives one inverter: owns the PWM & current feedback handle and tracks its status.
pub struct MotorController<S: CurrentSense> {
    driver: DriverPWM<S>,         // PWM & current feedback of the inverter
    driver_status: DriverStatus,  // Current status (Calibrating, Ready, or Error)
    faults: FaultLatch,           // Faults raised since the last take_faults()
}

impl<S: CurrentSense> MotorController<S> {
    /// Create a new MotorController instance and start the offset calibration.
    ///
    /// # Arguments
    /// * `config` - PWM and current feedback constants
    /// * `sense` - Current sensing topology of the inverter
    pub fn new(config: PwmConfig, sense: S) -> Result<Self, ConfigError> {
        let mut driver = DriverPWM::new(config, sense)?;
        driver.set_over_current_threshold(config.over_current_threshold);
        debug!(
            "PWM period {} counts, control update every {} periods",
            config.period,
            driver.repetition_counter()
        );

        let mut controller = Self {
            driver,
            driver_status: DriverStatus::Calibrating,
            faults: FaultLatch::new(),
        };
        controller.recalibrate();
        Ok(controller)
    }

    /// PWM update interrupt: applies a stationary frame voltage.
    ///
    /// A missed update deadline latches [`Fault::FocDuration`]; the previous duty cycles stay
    /// loaded and the next call proceeds normally.
    pub fn tick_control(&mut self, voltage: StationaryFrame) -> Result<(), Fault> {
        if self.driver_status != DriverStatus::Ready {
            return Err(Fault::Stopped);
        }
        self.driver.set_phase_voltage(voltage).map_err(|missed| {
            let fault = Fault::from(missed);
            self.faults.record(fault);
            warn!("PWM update deadline missed, FOC duration fault latched");
            fault
        })
    }

    /// ADC interrupt: reads the phase currents of the last period.
    #[inline(always)]
    pub fn tick_current(&mut self) -> PhaseCurrents {
        self.driver.get_phase_currents()
    }

    /// ADC interrupt, estimation path: predicts the phase currents from `Id`/`Iq`.
    #[inline(always)]
    pub fn tick_estimate(&mut self, idq: RotatingFrame, theta_elec: i32) -> PhaseCurrents {
        self.driver.estimate_currents(idq, theta_elec)
    }

    /// System tick: advances the calibration and polls the over-current flag.
    pub fn tick_system(&mut self) -> DriverStatus {
        if self.driver_status == DriverStatus::Calibrating
            && self.driver.current_reading_calibration(CalibrationAction::Exec)
        {
            self.finish_calibration();
        }
        if self.driver_status != DriverStatus::Error && self.driver.is_over_current_detected() {
            self.break_in();
        }
        self.driver_status
    }

    /// Emergency stop: PWM off, fault latched, no duty cycles accepted until recalibration.
    pub fn break_in(&mut self) {
        self.driver.switch_off_pwm();
        self.faults.record(Fault::OverCurrent);
        self.driver_status = DriverStatus::Error;
        error!("Over-current break-in, PWM switched off");
    }

    /// Restarts the offset calibration; PWM is switched back on once it completes.
    pub fn recalibrate(&mut self) {
        self.driver.clear();
        self.driver_status = DriverStatus::Calibrating;
        info!(
            "Current offset calibration started, {} ticks to wait",
            self.driver.config().off_calibr_wait_ticks
        );
        if self.driver.current_reading_calibration(CalibrationAction::Start) {
            self.finish_calibration();
        }
    }

    fn finish_calibration(&mut self) {
        self.driver_status = DriverStatus::Ready;
        self.driver.switch_on_pwm();
        info!("Current offset calibration complete, PWM enabled");
    }

    /// Drains the fault latch.
    pub fn take_faults(&self) -> FaultFlags {
        self.faults.take()
    }

    #[inline(always)]
    pub fn status(&self) -> DriverStatus {
        self.driver_status
    }

    #[inline(always)]
    pub fn is_ready(&self) -> bool {
        matches!(self.driver_status, DriverStatus::Ready)
    }

    #[inline(always)]
    pub fn driver(&self) -> &DriverPWM<S> {
        &self.driver
    }

    /// Access to the handle for mode flags, RL identification and offsets.
    #[inline(always)]
    pub fn driver_mut(&mut self) -> &mut DriverPWM<S> {
        &mut self.driver
    }

    pub fn telemetry(&self) -> Telemetry {
        Telemetry {
            status: self.driver_status,
            duty: *self.driver.duty_cycles(),
            currents: self.driver.phase_currents(),
            estimated: self.driver.estimated_currents(),
            faults: self.faults.pending(),
        }
    }
}
