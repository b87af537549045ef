// Copyright (c) 2022 Lucian Carata <luc@rez.how>
//
// This file is part of the sensor-gas-mics4514 crate, and is dually
// licensed under Apache License Version 2.0 or the BSD 3-clause License.
//
// For full licensing details, consult the LICENSE file in the root directory
// of the crate.
//
#![cfg_attr(not(test), no_std)]

//! This is a rust [`embedded-hal`](https://github.com/rust-embedded/embedded-hal)
//! driver for the SGX Sensortech MiCS-4514 metal-oxide gas sensor, as found on
//! I2C breakout boards that expose the raw sensor channels through a small
//! register map.
//!
//! By depending on embedded-hal, this driver is platform-agnostic and can be
//! used with any physical device implementing the embedded-hal 1.0 I2C trait.
//!
//! The MiCS-4514 carries two metal-oxide elements: a reducing one (RED),
//! sensitive to CO, CH4, C2H5OH, H2 and NH3, and an oxidizing one (OX),
//! sensitive to NO2. The driver reads both channels together with a heater
//! reference value, normalizes them against a clean-air baseline and converts
//! the resulting resistance ratios into estimated concentrations (ppm).
//!
//! Values derived from the datasheet curves are orientative: the estimates
//! assume a single target gas in otherwise clean air.
//!
//! ## Calibration
//!
//! Concentrations are only meaningful relative to a baseline captured in
//! clean air once the heater has stabilized, at least
//! [`WARM_UP_MINUTES`] after power-on. The driver does not track time; it is
//! up to the caller to wait before calling
//! [`calibrate`](MICS4514Driver::calibrate). The baseline lives in a
//! [`Calibration`] context owned by the caller, so that several driver
//! instances talking to the same sensor can share it.
//!
//! ## Usage:
//!
//! Import this crate and an `embedded_hal` implementation, then instantiate
//! the driver; For example, assuming you have connected a MiCS-4514 breakout
//! to a linux machine and it is detected as an i2c device:
//!
//! ```ignore
//! use linux_embedded_hal::I2cdev;
//!
//! use sensor_gas_mics4514::{MICS4514Driver, I2CAddr, Calibration, Gas};
//!
//! fn main() {
//!     let i2c_dev = I2cdev::new("/dev/i2c-1").unwrap();
//!     let mut mics = MICS4514Driver::new(i2c_dev, I2CAddr::MICS_0);
//!     let mut calibration = Calibration::new();
//!
//!     mics.wake_up().unwrap();
//!     // ... wait for the heater to warm up, in clean air ...
//!     mics.calibrate(&mut calibration).unwrap();
//!
//!     if let Ok(co) = mics.read_gas(Gas::CarbonMonoxide, &calibration) {
//!         println!("CO: {co} ppm");
//!     }
//!     if mics.read_all(&calibration).is_ok() {
//!         let c = mics.concentrations();
//!         println!("NO2: {} ppm, NH3: {} ppm", c.nitrogen_dioxide, c.ammonia);
//!     }
//! }
//! ```

#[macro_use]
mod logging;

pub mod conversion;
pub mod gas;

use core::fmt;

use embedded_hal::i2c::I2c;

pub use conversion::{Baseline, Calibration, RatioPair, RawSample, WARM_UP_MINUTES};
pub use gas::{Concentrations, Gas, UnknownGasCode};

/// Register map of the MiCS-4514 breakout.
mod register {
    pub const OX_HIGH: u8 = 0x04;
    /// OX, RED and power values are read as one block of three big-endian
    /// 16-bit words starting at `OX_HIGH`.
    pub const DATA_LEN: usize = 6;
    pub const POWER_MODE: u8 = 0x0A;

    pub const SLEEP_MODE: u8 = 0x00;
    pub const WAKE_UP_MODE: u8 = 0x01;
}

/// I2C addresses for the MiCS-4514 breakout are selected with two solder
/// jumpers (A0, A1). Boards ship configured for 0x75.
#[allow(non_camel_case_types)]
#[repr(u8)]
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum I2CAddr {
    /// A0 = 0, A1 = 0 (factory setting)
    #[default]
    MICS_0 = 0x75,
    /// A0 = 1, A1 = 0
    MICS_1 = 0x76,
    /// A0 = 0, A1 = 1
    MICS_2 = 0x77,
    /// A0 = 1, A1 = 1
    MICS_3 = 0x78,
}

/// Heater state, as reported by the power-mode register.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PowerMode {
    Sleep,
    Awake,
}

#[derive(Debug)]
pub struct MICS4514Driver<I2C> {
    i2c: I2C,
    address: u8,
    concentrations: Concentrations,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error<E> {
    /// Error on the I2C bus
    I2c(E),
    /// No usable clean-air baseline: the sensor was never calibrated, or the
    /// baseline has a zero component
    Uncalibrated,
    /// The gas has no transfer function for this sensor
    UnsupportedGas(Gas),
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::I2c(e) => write!(f, "I2C bus error: {:?}", e),
            Error::Uncalibrated => f.write_str("sensor has no clean-air baseline"),
            Error::UnsupportedGas(gas) => write!(f, "no conversion available for {}", gas),
        }
    }
}

impl<I2C, E> MICS4514Driver<I2C>
where
    I2C: I2c<Error = E>,
{
    pub fn new(i2c: I2C, address: I2CAddr) -> Self {
        MICS4514Driver {
            i2c,
            address: address as u8,
            concentrations: Concentrations::default(),
        }
    }

    /// Gives back the bus, dropping the driver.
    pub fn release(self) -> I2C {
        self.i2c
    }

    /// Last concentrations stored by [`read_gas`](Self::read_gas) or
    /// [`read_all`](Self::read_all).
    pub fn concentrations(&self) -> &Concentrations {
        &self.concentrations
    }

    fn read_registers(&mut self, reg: u8, rx_bytes: &mut [u8]) -> Result<(), Error<E>> {
        self.i2c
            .write_read(self.address, &[reg], rx_bytes)
            .map_err(Error::I2c)
    }

    fn read_register(&mut self, reg: u8) -> Result<u8, Error<E>> {
        let mut rx_byte = [0; 1];
        self.read_registers(reg, &mut rx_byte)?;
        Ok(rx_byte[0])
    }

    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), Error<E>> {
        self.i2c
            .write(self.address, &[reg, value])
            .map_err(Error::I2c)
    }

    /// Turns the heater on. The sensor needs [`WARM_UP_MINUTES`] afterwards
    /// before readings settle.
    pub fn wake_up(&mut self) -> Result<(), Error<E>> {
        self.write_register(register::POWER_MODE, register::WAKE_UP_MODE)
    }

    /// Turns the heater off.
    pub fn sleep(&mut self) -> Result<(), Error<E>> {
        self.write_register(register::POWER_MODE, register::SLEEP_MODE)
    }

    /// Reads the heater state. `0x00` is sleep; any other register value,
    /// not only `0x01`, is reported as awake.
    pub fn power_mode(&mut self) -> Result<PowerMode, Error<E>> {
        match self.read_register(register::POWER_MODE)? {
            register::SLEEP_MODE => Ok(PowerMode::Sleep),
            _ => Ok(PowerMode::Awake),
        }
    }

    /// Reads the OX, RED and power channels in a single bus transaction.
    pub fn acquire(&mut self) -> Result<RawSample, Error<E>> {
        let mut rx_bytes = [0; register::DATA_LEN];
        self.read_registers(register::OX_HIGH, &mut rx_bytes)?;
        let sample = RawSample::from_be_bytes(rx_bytes);
        log_trace!("mics4514 sample: ox={} red={} power={}",
                   sample.ox, sample.red, sample.power);
        Ok(sample)
    }

    /// Captures a new clean-air baseline into `calibration`, replacing any
    /// previous one.
    ///
    /// Must only be called with the sensor in clean air, at least
    /// [`WARM_UP_MINUTES`] after [`wake_up`](Self::wake_up). Neither
    /// condition is checked. On bus failure `calibration` is left untouched.
    pub fn calibrate(&mut self, calibration: &mut Calibration) -> Result<Baseline, Error<E>> {
        let sample = self.acquire()?;
        let baseline = calibration.update(&sample);
        log_debug!("mics4514 baseline: r0_ox={} r0_red={}",
                   baseline.r0_ox, baseline.r0_red);
        Ok(baseline)
    }

    /// Acquires one sample and turns it into resistance ratios.
    pub fn read_ratios(&mut self, calibration: &Calibration) -> Result<RatioPair, Error<E>> {
        let sample = self.acquire()?;
        calibration.ratios(&sample).ok_or(Error::Uncalibrated)
    }

    /// Estimates the concentration of a single gas, stores it and returns it.
    ///
    /// Unsupported gases are rejected before touching the bus. On any error
    /// the stored concentrations are left unchanged.
    pub fn read_gas(&mut self, gas: Gas, calibration: &Calibration) -> Result<f32, Error<E>> {
        let transfer = gas.transfer().ok_or(Error::UnsupportedGas(gas))?;
        let ratios = self.read_ratios(calibration)?;
        let value = transfer.apply(ratios);
        self.concentrations.set(gas, value);
        Ok(value)
    }

    /// Estimates all six supported gases from one sample.
    ///
    /// The stored concentrations are replaced as a whole, so they always come
    /// from the same sample; on any error they are left unchanged.
    pub fn read_all(&mut self, calibration: &Calibration) -> Result<&Concentrations, Error<E>> {
        let ratios = self.read_ratios(calibration)?;
        self.concentrations = Concentrations::from_ratios(ratios);
        Ok(&self.concentrations)
    }
}

#[cfg(test)]
mod tests {
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1 as hal;
    use float_cmp::approx_eq;

    use self::hal::i2c::{Mock as I2cMock, Transaction};
    use super::*;

    const MICS_I2C_ADDR: I2CAddr = I2CAddr::MICS_0;

    fn gen_sample_buf(ox: u16, red: u16, power: u16) -> Vec<u8> {
        let mut buf = Vec::with_capacity(register::DATA_LEN);
        buf.extend_from_slice(&ox.to_be_bytes());
        buf.extend_from_slice(&red.to_be_bytes());
        buf.extend_from_slice(&power.to_be_bytes());
        buf
    }

    fn gen_sample_expectation(ox: u16, red: u16, power: u16) -> Transaction {
        Transaction::write_read(MICS_I2C_ADDR as u8,
                                vec![register::OX_HIGH],
                                gen_sample_buf(ox, red, power))
    }

    fn gen_failed_sample_expectation() -> Transaction {
        Transaction::write_read(MICS_I2C_ADDR as u8,
                                vec![register::OX_HIGH],
                                vec![0; register::DATA_LEN])
            .with_error(ErrorKind::Other)
    }

    fn calibrated() -> Calibration {
        // ox=500, red=600, power=1000
        Calibration::with_baseline(Baseline { r0_ox: 500, r0_red: 400 })
    }

    #[test]
    fn test_mics_power_mode() {
        let i2c_expectations = [
            Transaction::write(MICS_I2C_ADDR as u8, vec![register::POWER_MODE, 0x01]),
            Transaction::write_read(MICS_I2C_ADDR as u8, vec![register::POWER_MODE], vec![0x01]),
            Transaction::write(MICS_I2C_ADDR as u8, vec![register::POWER_MODE, 0x00]),
            Transaction::write_read(MICS_I2C_ADDR as u8, vec![register::POWER_MODE], vec![0x00]),
            Transaction::write_read(MICS_I2C_ADDR as u8, vec![register::POWER_MODE], vec![0x02]),
        ];
        let i2c_mock = I2cMock::new(&i2c_expectations);
        let mut mics = MICS4514Driver::new(i2c_mock, MICS_I2C_ADDR);

        assert_eq!(mics.wake_up(), Ok(()));
        assert_eq!(mics.power_mode(), Ok(PowerMode::Awake));
        assert_eq!(mics.sleep(), Ok(()));
        assert_eq!(mics.power_mode(), Ok(PowerMode::Sleep));
        // undocumented non-zero values read as awake
        assert_eq!(mics.power_mode(), Ok(PowerMode::Awake));

        mics.release().done();
    }

    #[test]
    fn test_mics_acquire() {
        let i2c_expectations = [gen_sample_expectation(0x1234, 0xABCD, 0x0FFF)];
        let i2c_mock = I2cMock::new(&i2c_expectations);
        let mut mics = MICS4514Driver::new(i2c_mock, I2CAddr::default());

        assert_eq!(mics.acquire(),
                   Ok(RawSample { ox: 0x1234, red: 0xABCD, power: 0x0FFF }));

        mics.release().done();
    }

    #[test]
    fn test_mics_alternate_address() {
        let i2c_expectations = [
            Transaction::write(I2CAddr::MICS_3 as u8, vec![register::POWER_MODE, 0x01]),
        ];
        let i2c_mock = I2cMock::new(&i2c_expectations);
        let mut mics = MICS4514Driver::new(i2c_mock, I2CAddr::MICS_3);

        assert_eq!(mics.wake_up(), Ok(()));

        mics.release().done();
    }

    #[test]
    fn test_mics_calibrate() {
        let i2c_expectations = [gen_sample_expectation(500, 600, 1000)];
        let i2c_mock = I2cMock::new(&i2c_expectations);
        let mut mics = MICS4514Driver::new(i2c_mock, MICS_I2C_ADDR);
        let mut calibration = Calibration::new();

        let baseline = mics.calibrate(&mut calibration);
        assert_eq!(baseline, Ok(Baseline { r0_ox: 500, r0_red: 400 }));
        assert_eq!(calibration.baseline(), Some(Baseline { r0_ox: 500, r0_red: 400 }));

        mics.release().done();
    }

    #[test]
    fn test_mics_calibrate_bus_error() {
        let i2c_expectations = [gen_failed_sample_expectation()];
        let i2c_mock = I2cMock::new(&i2c_expectations);
        let mut mics = MICS4514Driver::new(i2c_mock, MICS_I2C_ADDR);
        let mut calibration = calibrated();

        assert_eq!(mics.calibrate(&mut calibration), Err(Error::I2c(ErrorKind::Other)));
        assert_eq!(calibration, calibrated());

        mics.release().done();
    }

    #[test]
    fn test_mics_read_gas() {
        let i2c_expectations = [
            gen_sample_expectation(0, 920, 1000),
            gen_sample_expectation(0, 920, 1000),
        ];
        let i2c_mock = I2cMock::new(&i2c_expectations);
        let mut mics = MICS4514Driver::new(i2c_mock, MICS_I2C_ADDR);
        let calibration = calibrated();

        // reducing ratio 80 / 400 = 0.2
        let co = mics.read_gas(Gas::CarbonMonoxide, &calibration).unwrap();
        assert!(approx_eq!(f32, co, 0.225 / 0.000405, epsilon = 0.01));
        assert_eq!(mics.concentrations().carbon_monoxide, co);
        assert_eq!(mics.concentrations().ammonia, 0.0);

        // oxidizing ratio 1000 / 500 = 2.0
        let no2 = mics.read_gas(Gas::NitrogenDioxide, &calibration).unwrap();
        assert!(approx_eq!(f32, no2, 1.955 / 6.13, epsilon = 0.001));
        assert_eq!(mics.concentrations().nitrogen_dioxide, no2);
        assert_eq!(mics.concentrations().carbon_monoxide, co);

        mics.release().done();
    }

    #[test]
    fn test_mics_read_gas_each_supported_kind() {
        let i2c_expectations: Vec<Transaction> = Gas::SUPPORTED
            .iter()
            .map(|_| gen_sample_expectation(0, 920, 1000))
            .collect();
        let i2c_mock = I2cMock::new(&i2c_expectations);
        let mut mics = MICS4514Driver::new(i2c_mock, MICS_I2C_ADDR);
        let calibration = calibrated();

        // reducing ratio 80 / 400 = 0.2, oxidizing ratio 1000 / 500 = 2.0;
        // every gas lands on a distinct value for this sample
        let red: f32 = 0.2;
        let ox: f32 = 2.0;
        let expected = [
            (Gas::CarbonMonoxide, conversion::carbon_monoxide(red)),
            (Gas::Methane, conversion::methane(red)),
            (Gas::Ethanol, conversion::ethanol(red)),
            (Gas::Hydrogen, conversion::hydrogen(red)),
            (Gas::Ammonia, conversion::ammonia(red)),
            (Gas::NitrogenDioxide, conversion::nitrogen_dioxide(ox)),
        ];

        for (gas, value) in expected {
            assert_eq!(mics.read_gas(gas, &calibration), Ok(value), "{}", gas);
            assert_eq!(mics.concentrations().get(gas), Some(value), "{}", gas);
        }

        // each read updated exactly its own field
        let c = mics.concentrations();
        assert_eq!(c.carbon_monoxide, expected[0].1);
        assert_eq!(c.methane, expected[1].1);
        assert_eq!(c.ethanol, expected[2].1);
        assert_eq!(c.hydrogen, expected[3].1);
        assert_eq!(c.ammonia, expected[4].1);
        assert_eq!(c.nitrogen_dioxide, expected[5].1);

        mics.release().done();
    }

    #[test]
    fn test_mics_read_unsupported_gas() {
        let i2c_expectations: [Transaction; 0] = [];
        let i2c_mock = I2cMock::new(&i2c_expectations);
        let mut mics = MICS4514Driver::new(i2c_mock, MICS_I2C_ADDR);
        let calibration = calibrated();

        for gas in [Gas::Propane, Gas::IsoButane, Gas::HydrogenSulfide, Gas::NitricOxide] {
            assert_eq!(mics.read_gas(gas, &calibration), Err(Error::UnsupportedGas(gas)));
        }
        assert_eq!(*mics.concentrations(), Concentrations::default());

        mics.release().done();
    }

    #[test]
    fn test_mics_read_uncalibrated() {
        let i2c_expectations = [
            gen_sample_expectation(0, 920, 1000),
            gen_sample_expectation(0, 920, 1000),
        ];
        let i2c_mock = I2cMock::new(&i2c_expectations);
        let mut mics = MICS4514Driver::new(i2c_mock, MICS_I2C_ADDR);
        let calibration = Calibration::new();

        assert_eq!(mics.read_gas(Gas::Methane, &calibration), Err(Error::Uncalibrated));
        assert_eq!(mics.read_all(&calibration), Err(Error::Uncalibrated));
        assert_eq!(*mics.concentrations(), Concentrations::default());

        mics.release().done();
    }

    #[test]
    fn test_mics_read_all() {
        let i2c_expectations = [gen_sample_expectation(0, 920, 1000)];
        let i2c_mock = I2cMock::new(&i2c_expectations);
        let mut mics = MICS4514Driver::new(i2c_mock, MICS_I2C_ADDR);
        let calibration = calibrated();

        // reducing ratio 80 / 400 = 0.2, oxidizing ratio 1000 / 500 = 2.0
        let red: f32 = 0.2;
        let ox: f32 = 2.0;
        let expected = Concentrations {
            carbon_monoxide: (0.425 - red) / 0.000405,
            methane: 25000.0,
            ethanol: (0.306 - red) / 0.00057,
            hydrogen: (0.279 - red) / 0.00026,
            ammonia: (0.8 - red) / 0.0015,
            nitrogen_dioxide: (ox - 0.045) / 6.13,
            propane: None,
            iso_butane: None,
            hydrogen_sulfide: None,
            nitric_oxide: None,
        };

        assert_eq!(mics.read_all(&calibration).copied(), Ok(expected));
        assert_eq!(*mics.concentrations(), expected);

        mics.release().done();
    }

    #[test]
    fn test_mics_read_all_bus_error_keeps_snapshot() {
        let i2c_expectations = [
            gen_sample_expectation(0, 920, 1000),
            gen_failed_sample_expectation(),
            gen_failed_sample_expectation(),
        ];
        let i2c_mock = I2cMock::new(&i2c_expectations);
        let mut mics = MICS4514Driver::new(i2c_mock, MICS_I2C_ADDR);
        let calibration = calibrated();

        let before = *mics.read_all(&calibration).unwrap();
        assert_eq!(mics.read_all(&calibration).copied(), Err(Error::I2c(ErrorKind::Other)));
        assert_eq!(*mics.concentrations(), before);
        assert_eq!(mics.read_gas(Gas::Hydrogen, &calibration), Err(Error::I2c(ErrorKind::Other)));
        assert_eq!(*mics.concentrations(), before);

        mics.release().done();
    }

    #[test]
    fn test_mics_calibrate_then_read() {
        let i2c_expectations = [
            gen_sample_expectation(500, 600, 1000),
            gen_sample_expectation(500, 600, 1000),
        ];
        let i2c_mock = I2cMock::new(&i2c_expectations);
        let mut mics = MICS4514Driver::new(i2c_mock, MICS_I2C_ADDR);
        let mut calibration = Calibration::new();

        mics.calibrate(&mut calibration).unwrap();
        // clean air reads back as ratio 1.0 on both channels: nothing detected
        mics.read_all(&calibration).unwrap();
        assert_eq!(*mics.concentrations(), Concentrations::default());

        mics.release().done();
    }

    #[test]
    fn test_error_display() {
        let err: Error<ErrorKind> = Error::UnsupportedGas(Gas::Propane);
        assert_eq!(format!("{}", err), "no conversion available for C3H8");
        let err: Error<ErrorKind> = Error::Uncalibrated;
        assert_eq!(format!("{}", err), "sensor has no clean-air baseline");
    }
}
