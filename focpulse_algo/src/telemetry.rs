// Consistent snapshot of one motor controller for the telemetry and diagnostics path.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use core::cell::RefCell;

use critical_section::Mutex;

use crate::math_integer::transforms::PhaseCurrents;
use crate::motor_driver::{CurrentSense, DriverStatus, DutyCycles, FaultFlags};
use crate::MotorController;

/// Copy of the controller state, taken in one piece
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Telemetry {
    pub status: DriverStatus,
    pub duty: DutyCycles,
    pub currents: PhaseCurrents,
    pub estimated: PhaseCurrents,
    /// Faults latched and not yet taken
    pub faults: FaultFlags,
}

/// Reads the telemetry of a controller shared with interrupt handlers.
///
/// Returns `None` while the slot is still empty or borrowed by the interrupted context.
pub fn snapshot<S: CurrentSense>(
    shared: &Mutex<RefCell<Option<MotorController<S>>>>,
) -> Option<Telemetry> {
    critical_section::with(|cs| {
        let slot = shared.borrow(cs).try_borrow().ok()?;
        slot.as_ref().map(MotorController::telemetry)
    })
}
