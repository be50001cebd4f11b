// Fault reporting of the PWM & current feedback instance.

// Key Features:
// - DeadlineMissed is returned when a duty cycle update lands after the timer update event
// - Fault is the error type of the controller entry points
// - FaultLatch accumulates fault bits from interrupt context without locking

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use core::sync::atomic::{AtomicU16, Ordering};

use thiserror::Error;

/// Latched bit of a FOC duration violation
pub const FOC_DURATION: u16 = 0x0001;
/// Latched bit of a hardware over-current (break-in) event
pub const BREAK_IN: u16 = 0x0040;

/// The timer update event elapsed before new duty cycles were loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[error("PWM update deadline missed")]
pub struct DeadlineMissed;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Fault {
    /// FOC computation took longer than one PWM update period
    #[error("FOC duration exceeded the PWM period")]
    FocDuration,
    /// Hardware over-current comparator tripped
    #[error("over-current detected")]
    OverCurrent,
    /// The driver is not in the Ready state
    #[error("driver is stopped")]
    Stopped,
}

impl Fault {
    /// Latch bit recorded for this fault, zero when it is not latched
    pub const fn bit(self) -> u16 {
        match self {
            Fault::FocDuration => FOC_DURATION,
            Fault::OverCurrent => BREAK_IN,
            Fault::Stopped => 0,
        }
    }
}

impl From<DeadlineMissed> for Fault {
    fn from(_: DeadlineMissed) -> Self {
        Fault::FocDuration
    }
}

/// Snapshot of latched fault bits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FaultFlags(u16);

impl FaultFlags {
    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, fault: Fault) -> bool {
        let bit = fault.bit();
        bit != 0 && self.0 & bit == bit
    }
}

/// Fault bits shared between the control interrupt and the system tick
pub struct FaultLatch {
    bits: AtomicU16,
}

impl FaultLatch {
    pub const fn new() -> Self {
        FaultLatch {
            bits: AtomicU16::new(0),
        }
    }

    /// Sets the bit of `fault`, previous bits stay latched
    #[inline(always)]
    pub fn record(&self, fault: Fault) {
        self.bits.fetch_or(fault.bit(), Ordering::Relaxed);
    }

    /// Latched bits without clearing them
    pub fn pending(&self) -> FaultFlags {
        FaultFlags(self.bits.load(Ordering::Relaxed))
    }

    /// Latched bits, clearing the latch
    pub fn take(&self) -> FaultFlags {
        FaultFlags(self.bits.swap(0, Ordering::Relaxed))
    }
}

impl Default for FaultLatch {
    fn default() -> Self {
        Self::new()
    }
}
