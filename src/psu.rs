//! Instrument model for a TTi PL320-class bench power supply.

use std::io::{Read, Write};

use crate::{
    error::{Error, Result},
    prologix::Prologix,
};

/// Suffix on current readings coming back from the supply.
const CURRENT_SUFFIX: &str = "mA";

/// Driver for one PL320 supply behind a [`Prologix`] controller.
///
/// For its methods, "set" means to command a value and "read" means to get
/// a measured value. Setpoints are written through: the cached value is
/// updated the moment the command goes out, without waiting for the device
/// to acknowledge. The measured draw is cached from the last successful
/// read.
///
/// All quantities are integers in the device's native milli-units.
pub struct Pl320<S: Read + Write> {
    pub(crate) link: Prologix<S>,
    voltage_mv: u32,
    current_limit_ma: u32,
    current_draw_ma: u32,
}

impl<S: Read + Write> Pl320<S> {
    /// Create a driver over an already-bootstrapped controller link.
    ///
    /// All cached values start at zero; nothing is read from the device.
    pub fn new(link: Prologix<S>) -> Self {
        Self {
            link,
            voltage_mv: 0,
            current_limit_ma: 0,
            current_draw_ma: 0,
        }
    }

    /// Set the output voltage. Value supplied in millivolts.
    pub fn set_voltage_mv(&mut self, mv: u32) -> Result<()> {
        self.link.send(&format!("X{mv}mV"))?;
        self.voltage_mv = mv;
        Ok(())
    }

    /// Last commanded output voltage, in millivolts.
    pub fn voltage_mv(&self) -> u32 {
        self.voltage_mv
    }

    /// Set the output current limit. Value supplied in milliamps.
    pub fn set_current_limit_ma(&mut self, ma: u32) -> Result<()> {
        self.link.send(&format!("X{ma}mA"))?;
        self.current_limit_ma = ma;
        Ok(())
    }

    /// Last commanded current limit, in milliamps.
    pub fn current_limit_ma(&self) -> u32 {
        self.current_limit_ma
    }

    /// Query the measured current draw. Value returned in milliamps.
    ///
    /// Exactly one `<n>mA` response line is required. Anything else leaves
    /// the cached value untouched and surfaces a recoverable error, so a
    /// flaky read never masquerades as a measurement.
    pub fn read_current_draw_ma(&mut self) -> Result<u32> {
        const QUERY: &str = "XI?";
        let lines = self.link.send_receive(QUERY)?;
        if lines.len() != 1 {
            return Err(Error::AmbiguousResponse {
                command: QUERY.into(),
                lines,
            });
        }
        let line = &lines[0];
        let ma = line
            .strip_suffix(CURRENT_SUFFIX)
            .and_then(|digits| digits.parse::<u32>().ok())
            .ok_or_else(|| Error::MalformedResponse {
                command: QUERY.into(),
                response: line.clone(),
            })?;
        self.current_draw_ma = ma;
        Ok(ma)
    }

    /// Measured current draw from the last successful read, in milliamps.
    pub fn current_draw_ma(&self) -> u32 {
        self.current_draw_ma
    }
}
