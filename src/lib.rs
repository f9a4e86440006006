//! This crate bridges a TTi PL320 series bench power supply onto an MQTT
//! broker, with the supply attached through a Prologix GPIB-USB controller
//! on a serial port.
//!
//! The controllable quantities (voltage setpoint, current limit) and the
//! measured current draw are mirrored onto `kit/pl320/...` topics, and
//! inbound `set_*` messages are applied to the instrument. See [`topics`]
//! for the full map.
//!
//! The serial port used for controller comms should be configured like so:
//! * Baud rate: 9600
//! * Read timeout: 1 second (this bounds every exchange with the supply)
//!
//! The GPIB bus may be shared with other controllers, so the instrument's
//! address is re-selected before every command; address state left behind
//! by unrelated traffic cannot misroute a command.

pub mod bridge;
pub mod error;
pub mod prologix;
pub mod psu;
pub mod topics;

#[cfg(test)]
mod mock_serial;
