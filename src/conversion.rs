// Copyright (c) 2022 Lucian Carata <luc@rez.how>
//
// This file is part of the sensor-gas-mics4514 crate, and is dually
// licensed under Apache License Version 2.0 or the BSD 3-clause License.
//
// For full licensing details, consult the LICENSE file in the root directory
// of the crate.
//

//! Conversion from raw channel readings to gas concentrations.
//!
//! The MiCS-4514 reports, for each of its two metal-oxide elements, a value
//! that grows as the element resistance falls, plus a reference value taken
//! from the heater supply. `power - channel` tracks the element resistance;
//! dividing it by the same difference measured in clean air gives the
//! resistance ratio Rs/R0 the transfer functions below are defined on.
//!
//! Each transfer function saturates to zero on the clean-air side of its
//! threshold, is linear in the ratio beyond it, and is clamped into the range
//! the sensor is characterised for. NaN inputs are passed through unchanged.

/// Minutes the heater needs after power-on before the sensor output is
/// stable enough to capture a clean-air baseline.
pub const WARM_UP_MINUTES: u32 = 3;

/// One burst read of the three 16-bit data registers.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct RawSample {
    pub ox: u16,
    pub red: u16,
    pub power: u16,
}

impl RawSample {
    /// Decodes the 6-byte block starting at the oxidizing-channel high
    /// register. Every value is transmitted high byte first.
    pub fn from_be_bytes(rx_bytes: [u8; 6]) -> Self {
        RawSample {
            ox: u16::from_be_bytes([rx_bytes[0], rx_bytes[1]]),
            red: u16::from_be_bytes([rx_bytes[2], rx_bytes[3]]),
            power: u16::from_be_bytes([rx_bytes[4], rx_bytes[5]]),
        }
    }

    fn ox_delta(&self) -> i32 {
        i32::from(self.power) - i32::from(self.ox)
    }

    fn red_delta(&self) -> i32 {
        i32::from(self.power) - i32::from(self.red)
    }
}

/// Clean-air reference of both elements. Components are signed and may be
/// negative if the sample was taken in unusual conditions; they are stored
/// as measured.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Baseline {
    pub r0_ox: i32,
    pub r0_red: i32,
}

impl Baseline {
    pub fn from_sample(sample: &RawSample) -> Self {
        Baseline { r0_ox: sample.ox_delta(), r0_red: sample.red_delta() }
    }
}

/// Resistance ratios Rs/R0 of the reducing and oxidizing elements.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct RatioPair {
    pub reducing: f32,
    pub oxidizing: f32,
}

/// Calibration context shared by every driver reading the same sensor.
///
/// Starts uncalibrated. A baseline is installed by
/// [`MICS4514Driver::calibrate`](crate::MICS4514Driver::calibrate) (or
/// restored with [`Calibration::with_baseline`]) and is overwritten by every
/// later calibration. The context does no locking: callers sharing it
/// between threads must serialize access themselves.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct Calibration {
    baseline: Option<Baseline>,
}

impl Calibration {
    pub const fn new() -> Self {
        Calibration { baseline: None }
    }

    pub const fn with_baseline(baseline: Baseline) -> Self {
        Calibration { baseline: Some(baseline) }
    }

    pub fn baseline(&self) -> Option<Baseline> {
        self.baseline
    }

    pub fn is_calibrated(&self) -> bool {
        self.baseline.is_some()
    }

    /// Replaces the baseline with the one derived from `sample`.
    pub fn update(&mut self, sample: &RawSample) -> Baseline {
        let baseline = Baseline::from_sample(sample);
        self.baseline = Some(baseline);
        baseline
    }

    /// Resistance ratios of `sample` against the current baseline.
    ///
    /// Returns `None` when no baseline is set, or when a baseline component
    /// is zero and the ratio would be undefined.
    pub fn ratios(&self, sample: &RawSample) -> Option<RatioPair> {
        let baseline = self.baseline?;
        if baseline.r0_ox == 0 || baseline.r0_red == 0 {
            return None;
        }
        Some(RatioPair {
            reducing: sample.red_delta() as f32 / baseline.r0_red as f32,
            oxidizing: sample.ox_delta() as f32 / baseline.r0_ox as f32,
        })
    }
}

/// Linear segment of a transfer function, clamped to `[floor, ceiling]`
/// with everything under `floor` reported as zero.
fn clamp_estimate(estimate: f32, floor: f32, ceiling: f32) -> f32 {
    if estimate < floor {
        0.0
    } else if estimate > ceiling {
        ceiling
    } else {
        estimate
    }
}

const CO_THRESHOLD: f32 = 0.425;
const CO_SLOPE: f32 = 0.000405;

/// Carbon monoxide (ppm) from the reducing ratio, range 1..=1000.
pub fn carbon_monoxide(reducing: f32) -> f32 {
    if reducing > CO_THRESHOLD {
        return 0.0;
    }
    clamp_estimate((CO_THRESHOLD - reducing) / CO_SLOPE, 1.0, 1000.0)
}

const CH4_THRESHOLD: f32 = 0.786;
const CH4_SLOPE: f32 = 0.000023;

/// Methane (ppm) from the reducing ratio, range 1000..=25000. Anything the
/// linear segment puts under 1000 ppm is reported as zero.
pub fn methane(reducing: f32) -> f32 {
    if reducing > CH4_THRESHOLD {
        return 0.0;
    }
    clamp_estimate((CH4_THRESHOLD - reducing) / CH4_SLOPE, 1000.0, 25000.0)
}

const C2H5OH_THRESHOLD: f32 = 0.306;
const C2H5OH_SLOPE: f32 = 0.00057;

/// Ethanol (ppm) from the reducing ratio, range 10..=500.
pub fn ethanol(reducing: f32) -> f32 {
    if reducing > C2H5OH_THRESHOLD {
        return 0.0;
    }
    clamp_estimate((C2H5OH_THRESHOLD - reducing) / C2H5OH_SLOPE, 10.0, 500.0)
}

const H2_THRESHOLD: f32 = 0.279;
const H2_SLOPE: f32 = 0.00026;

/// Hydrogen (ppm) from the reducing ratio, range 1..=1000.
pub fn hydrogen(reducing: f32) -> f32 {
    if reducing > H2_THRESHOLD {
        return 0.0;
    }
    clamp_estimate((H2_THRESHOLD - reducing) / H2_SLOPE, 1.0, 1000.0)
}

const NH3_THRESHOLD: f32 = 0.8;
const NH3_SLOPE: f32 = 0.0015;

/// Ammonia (ppm) from the reducing ratio, range 1..=500.
pub fn ammonia(reducing: f32) -> f32 {
    if reducing > NH3_THRESHOLD {
        return 0.0;
    }
    clamp_estimate((NH3_THRESHOLD - reducing) / NH3_SLOPE, 1.0, 500.0)
}

const NO2_THRESHOLD: f32 = 1.1;
const NO2_OFFSET: f32 = 0.045;
const NO2_SLOPE: f32 = 6.13;

/// Nitrogen dioxide (ppm) from the oxidizing ratio, range 0.1..=10.
///
/// The oxidizing element gains resistance in NO2, so unlike the reducing
/// gases the concentration grows with the ratio.
pub fn nitrogen_dioxide(oxidizing: f32) -> f32 {
    if oxidizing < NO2_THRESHOLD {
        return 0.0;
    }
    clamp_estimate((oxidizing - NO2_OFFSET) / NO2_SLOPE, 0.1, 10.0)
}
