// Building blocks shared by the three-shunt and ICS current sensing topologies.

// Key Features:
// - Selects the two phases measurable in each SVM sector
// - Places the ADC trigger inside the widest low-side conduction window
// - Rebuilds the three phase currents from two conversions and calibrated offsets
// - Averages zero-current conversions during offset calibration

// Detailed Operation:
// With three low-side shunts the phase with the largest compare count has the shortest
// low-side conduction time, so it is the one left out: its current is derived as the negated
// sum of the other two. The trigger is placed at the centre of the period when every
// low side conducts long enough. Otherwise it goes just before the last rising edge when
// the gap to the middle phase is wide, or after it on the falling edge when it is not.
// ICS sensors measure phases A and B at any time and need neither selection nor scheduling.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use crate::math_integer::transforms::{saturate, PhaseCurrents, ThreePhase};
use crate::motor_driver::{CalibrationOffsets, DutyCycles, Phase, Sector};

/// Counter direction at the moment the ADC is triggered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TriggerEdge {
    /// Counting up
    Rising,
    /// Counting down
    Falling,
}

/// ADC trigger scheduled for the next period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SamplingPoint {
    /// Compare value of the trigger channel
    pub count: u16,
    pub edge: TriggerEdge,
    /// Sector that decides which phases are converted
    pub sector: Sector,
}

/// Phases converted by a three-shunt topology in the given sector
pub const fn measured_phases(sector: Sector) -> (Phase, Phase) {
    match sector {
        Sector::S1 | Sector::S6 => (Phase::B, Phase::C),
        Sector::S2 | Sector::S3 => (Phase::A, Phase::C),
        Sector::S4 | Sector::S5 => (Phase::A, Phase::B),
    }
}

/// Chooses the ADC trigger for three low-side shunts.
///
/// ### Arguments
/// * `duty` - Duty cycles about to be loaded.
/// * `half_period` - Counter peak value.
/// * `t_after` - Counts needed after an edge before the signal is settled.
/// * `t_before` - Counts the ADC needs before an edge.
pub fn sampling_point(duty: &DutyCycles, half_period: u16, t_after: u16, t_before: u16) -> SamplingPoint {
    let half = half_period as i32;
    let high = duty.high as i32;
    let mid = duty.mid as i32;
    let off_window = half - high;

    if off_window > t_after as i32 {
        // Every low side conducts long enough, sample phases A and B at the centre
        return SamplingPoint {
            count: (half - 1).max(0) as u16,
            edge: TriggerEdge::Rising,
            sector: Sector::S5,
        };
    }

    if high - mid > off_window * 2 {
        SamplingPoint {
            count: (high - t_before as i32).max(0) as u16,
            edge: TriggerEdge::Rising,
            sector: duty.sector,
        }
    } else {
        let count = high + t_after as i32;
        if count >= half {
            SamplingPoint {
                count: (2 * half - count - 1).max(0) as u16,
                edge: TriggerEdge::Falling,
                sector: duty.sector,
            }
        } else {
            SamplingPoint {
                count: count as u16,
                edge: TriggerEdge::Rising,
                sector: duty.sector,
            }
        }
    }
}

#[inline(always)]
const fn offset_of(offsets: &CalibrationOffsets, phase: Phase) -> i32 {
    match phase {
        Phase::A => offsets.phase_a,
        Phase::B => offsets.phase_b,
        Phase::C => offsets.phase_c,
    }
}

/// Assigns two currents to their phases and derives the third one
const fn complete(phases: (Phase, Phase), first: i16, second: i16) -> PhaseCurrents {
    let derived = saturate(-(first as i32 + second as i32));
    match phases {
        (Phase::A, Phase::B) => ThreePhase {
            a: first,
            b: second,
            c: derived,
        },
        (Phase::A, Phase::C) => ThreePhase {
            a: first,
            b: derived,
            c: second,
        },
        _ => ThreePhase {
            a: derived,
            b: first,
            c: second,
        },
    }
}

/// Currents of a three-shunt topology from the two conversions of `sector`.
///
/// Inverting shunt amplifiers: `I = offset - raw`.
pub const fn reconstruct_three_shunt(
    sector: Sector,
    raw: [u16; 2],
    offsets: &CalibrationOffsets,
) -> PhaseCurrents {
    let phases = measured_phases(sector);
    let first = saturate(offset_of(offsets, phases.0).saturating_sub(raw[0] as i32));
    let second = saturate(offset_of(offsets, phases.1).saturating_sub(raw[1] as i32));
    complete(phases, first, second)
}

/// Currents of an ICS topology from the conversions of phases A and B.
///
/// Non-inverting sensors: `I = raw - offset`.
pub const fn reconstruct_ics(raw: [u16; 2], offsets: &CalibrationOffsets) -> PhaseCurrents {
    let a = saturate((raw[0] as i32).saturating_sub(offsets.phase_a));
    let b = saturate((raw[1] as i32).saturating_sub(offsets.phase_b));
    complete((Phase::A, Phase::B), a, b)
}

/// Averages `N` zero-current conversions of every phase
pub struct OffsetAccumulator<const N: usize> {
    sums: [u64; 3],
    samples: usize,
}

impl<const N: usize> OffsetAccumulator<N> {
    pub const fn new() -> Self {
        OffsetAccumulator {
            sums: [0; 3],
            samples: 0,
        }
    }

    /// Adds one conversion per phase, returns true once `N` samples were collected.
    /// Samples beyond `N` are ignored.
    pub fn add(&mut self, raw: [u16; 3]) -> bool {
        if self.samples < N {
            for (sum, value) in self.sums.iter_mut().zip(raw) {
                *sum += value as u64;
            }
            self.samples += 1;
        }
        self.is_complete()
    }

    pub fn is_complete(&self) -> bool {
        self.samples >= N
    }

    /// Averages of the samples collected so far, none before the first sample
    pub fn offsets(&self) -> Option<CalibrationOffsets> {
        if self.samples == 0 {
            return None;
        }
        let n = self.samples as u64;
        Some(CalibrationOffsets {
            phase_a: (self.sums[0] / n) as i32,
            phase_b: (self.sums[1] / n) as i32,
            phase_c: (self.sums[2] / n) as i32,
        })
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl<const N: usize> Default for OffsetAccumulator<N> {
    fn default() -> Self {
        Self::new()
    }
}
