// Copyright (c) 2022 Lucian Carata <luc@rez.how>
//
// This file is part of the sensor-gas-mics4514 crate, and is dually
// licensed under Apache License Version 2.0 or the BSD 3-clause License.
//
// For full licensing details, consult the LICENSE file in the root directory
// of the crate.
//

use core::fmt;

use crate::conversion::{self, RatioPair};

/// Gas kinds known to the MiCS-4514 register protocol, with their historic
/// integer codes.
///
/// Only six of them have a transfer function: carbon monoxide, methane,
/// ethanol, hydrogen and ammonia are estimated from the reducing element,
/// nitrogen dioxide from the oxidizing element. Propane, iso-butane,
/// hydrogen sulfide and nitric oxide are listed so that callers using the
/// integer codes can name them, but asking the driver for them fails with
/// [`Error::UnsupportedGas`](crate::Error::UnsupportedGas).
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
pub enum Gas {
    CarbonMonoxide = 0x01,
    Methane = 0x02,
    Ethanol = 0x03,
    Propane = 0x04,
    IsoButane = 0x05,
    Hydrogen = 0x06,
    HydrogenSulfide = 0x07,
    Ammonia = 0x08,
    NitricOxide = 0x09,
    NitrogenDioxide = 0x0A,
}

/// Integer code that does not name any gas.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct UnknownGasCode(pub u8);

impl Gas {
    /// The six gases the driver can estimate, in snapshot order.
    pub const SUPPORTED: [Gas; 6] = [
        Gas::CarbonMonoxide,
        Gas::Methane,
        Gas::Ethanol,
        Gas::Hydrogen,
        Gas::Ammonia,
        Gas::NitrogenDioxide,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn is_supported(self) -> bool {
        self.transfer().is_some()
    }

    /// Transfer function of this gas and the element it reads, or `None`
    /// when the gas has no transfer function.
    pub(crate) fn transfer(self) -> Option<Transfer> {
        let transfer = match self {
            Gas::CarbonMonoxide => Transfer {
                channel: Channel::Reducing,
                convert: conversion::carbon_monoxide,
            },
            Gas::Methane => Transfer {
                channel: Channel::Reducing,
                convert: conversion::methane,
            },
            Gas::Ethanol => Transfer {
                channel: Channel::Reducing,
                convert: conversion::ethanol,
            },
            Gas::Hydrogen => Transfer {
                channel: Channel::Reducing,
                convert: conversion::hydrogen,
            },
            Gas::Ammonia => Transfer {
                channel: Channel::Reducing,
                convert: conversion::ammonia,
            },
            Gas::NitrogenDioxide => Transfer {
                channel: Channel::Oxidizing,
                convert: conversion::nitrogen_dioxide,
            },
            Gas::Propane
            | Gas::IsoButane
            | Gas::HydrogenSulfide
            | Gas::NitricOxide => return None,
        };
        Some(transfer)
    }

    pub(crate) fn estimate(self, ratios: RatioPair) -> Option<f32> {
        self.transfer().map(|transfer| transfer.apply(ratios))
    }
}

#[derive(Clone, Copy)]
pub(crate) enum Channel {
    Reducing,
    Oxidizing,
}

#[derive(Clone, Copy)]
pub(crate) struct Transfer {
    channel: Channel,
    convert: fn(f32) -> f32,
}

impl Transfer {
    pub(crate) fn apply(self, ratios: RatioPair) -> f32 {
        match self.channel {
            Channel::Reducing => (self.convert)(ratios.reducing),
            Channel::Oxidizing => (self.convert)(ratios.oxidizing),
        }
    }
}

impl TryFrom<u8> for Gas {
    type Error = UnknownGasCode;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0x01 => Ok(Gas::CarbonMonoxide),
            0x02 => Ok(Gas::Methane),
            0x03 => Ok(Gas::Ethanol),
            0x04 => Ok(Gas::Propane),
            0x05 => Ok(Gas::IsoButane),
            0x06 => Ok(Gas::Hydrogen),
            0x07 => Ok(Gas::HydrogenSulfide),
            0x08 => Ok(Gas::Ammonia),
            0x09 => Ok(Gas::NitricOxide),
            0x0A => Ok(Gas::NitrogenDioxide),
            other => Err(UnknownGasCode(other)),
        }
    }
}

impl fmt::Display for Gas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let formula = match self {
            Gas::CarbonMonoxide => "CO",
            Gas::Methane => "CH4",
            Gas::Ethanol => "C2H5OH",
            Gas::Propane => "C3H8",
            Gas::IsoButane => "C4H10",
            Gas::Hydrogen => "H2",
            Gas::HydrogenSulfide => "H2S",
            Gas::Ammonia => "NH3",
            Gas::NitricOxide => "NO",
            Gas::NitrogenDioxide => "NO2",
        };
        f.write_str(formula)
    }
}

/// Latest estimated concentrations, in ppm.
///
/// All computed fields start at zero. The `Option` fields belong to gases
/// the sensor reports no conversion for and always read `None`.
#[derive(Debug, PartialEq, Clone, Copy, Default)]
pub struct Concentrations {
    pub carbon_monoxide: f32,
    pub methane: f32,
    pub ethanol: f32,
    pub hydrogen: f32,
    pub ammonia: f32,
    pub nitrogen_dioxide: f32,
    pub propane: Option<f32>,
    pub iso_butane: Option<f32>,
    pub hydrogen_sulfide: Option<f32>,
    pub nitric_oxide: Option<f32>,
}

impl Concentrations {
    /// Evaluates all six transfer functions against one ratio pair.
    pub(crate) fn from_ratios(ratios: RatioPair) -> Self {
        let mut concentrations = Concentrations::default();
        for gas in Gas::SUPPORTED {
            if let Some(value) = gas.estimate(ratios) {
                concentrations.set(gas, value);
            }
        }
        concentrations
    }

    pub fn get(&self, gas: Gas) -> Option<f32> {
        match gas {
            Gas::CarbonMonoxide => Some(self.carbon_monoxide),
            Gas::Methane => Some(self.methane),
            Gas::Ethanol => Some(self.ethanol),
            Gas::Hydrogen => Some(self.hydrogen),
            Gas::Ammonia => Some(self.ammonia),
            Gas::NitrogenDioxide => Some(self.nitrogen_dioxide),
            Gas::Propane => self.propane,
            Gas::IsoButane => self.iso_butane,
            Gas::HydrogenSulfide => self.hydrogen_sulfide,
            Gas::NitricOxide => self.nitric_oxide,
        }
    }

    /// Stores `value` for a supported gas. Unsupported gases are left alone.
    pub(crate) fn set(&mut self, gas: Gas, value: f32) {
        match gas {
            Gas::CarbonMonoxide => self.carbon_monoxide = value,
            Gas::Methane => self.methane = value,
            Gas::Ethanol => self.ethanol = value,
            Gas::Hydrogen => self.hydrogen = value,
            Gas::Ammonia => self.ammonia = value,
            Gas::NitrogenDioxide => self.nitrogen_dioxide = value,
            Gas::Propane
            | Gas::IsoButane
            | Gas::HydrogenSulfide
            | Gas::NitricOxide => {}
        }
    }
}
