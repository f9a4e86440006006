//! Command/response framing over a Prologix GPIB-USB controller.

use std::io::{self, Read, Write};

use tracing::trace;

use crate::error::{Error, Result};

/// Identity line the controller must report during bootstrap.
pub const CONTROLLER_IDENT: &str = "Prologix GPIB-USB Controller version 6.107";

/// GPIB read timeout configured on the controller, in milliseconds.
const READ_TMO_MS: u16 = 200;

const EOL: &str = "\n";

/// Framing layer for an instrument behind a Prologix controller.
///
/// Works over any [`io::Read`] + [`io::Write`] byte stream; production code
/// hands it a [`serialport`] port opened with a bounded read timeout, which
/// in turn bounds how long any single exchange can block.
///
/// The GPIB bus behind the controller may be shared, so the target address
/// is re-selected before every command rather than cached in the controller.
#[derive(Debug)]
pub struct Prologix<S: Read + Write> {
    pub(crate) port: S,
    /// GPIB address the instrument answers on.
    addr: u8,
}

impl<S: Read + Write> Prologix<S> {
    /// Put the controller into a known state and verify its identity.
    ///
    /// Issues the bootstrap sequence (controller mode, interface clear, GPIB
    /// read timeout, version query) and checks the version response: at
    /// least two lines, the first being [`CONTROLLER_IDENT`]. Anything else
    /// is a fatal startup condition.
    pub fn open(port: S, addr: u8) -> Result<Self> {
        let mut link = Self { port, addr };
        link.raw_write("++mode 1")?;
        link.raw_write("++ifc")?;
        link.raw_write(&format!("++read_tmo_ms {READ_TMO_MS}"))?;
        link.raw_write("++ver")?;
        let lines = link.raw_read()?;
        if lines.len() < 2 {
            return Err(Error::TruncatedBootstrap(lines.len()));
        }
        if lines[0] != CONTROLLER_IDENT {
            return Err(Error::IdentityMismatch {
                expected: CONTROLLER_IDENT,
                got: lines[0].clone(),
            });
        }
        Ok(link)
    }

    /// Route `cmd` to the addressed instrument without reading a response.
    pub fn send(&mut self, cmd: &str) -> Result<()> {
        self.raw_write(&format!("++addr {}", self.addr))?;
        self.raw_write(cmd)
    }

    /// Route `cmd` to the addressed instrument and collect its response.
    ///
    /// Returns every buffered response line, right-trimmed of line-ending
    /// whitespace. May legitimately return no lines; callers decide what a
    /// usable response looks like.
    pub fn send_receive(&mut self, cmd: &str) -> Result<Vec<String>> {
        self.send(cmd)?;
        self.raw_read()
    }

    fn raw_write(&mut self, cmd: &str) -> Result<()> {
        trace!(cmd, "tx");
        self.port.write_all(cmd.as_bytes())?;
        self.port.write_all(EOL.as_bytes())?;
        self.port.flush()?;
        Ok(())
    }

    /// Ask the controller to forward buffered instrument output, then drain
    /// the port until it times out.
    fn raw_read(&mut self) -> Result<Vec<String>> {
        self.raw_write("++read")?;

        let mut raw = Vec::new();
        let mut chunk = [0u8; 64];
        loop {
            match self.port.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => raw.extend_from_slice(&chunk[..n]),
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
                    ) =>
                {
                    break;
                }
                Err(e) => return Err(Error::Serial(e)),
            }
        }

        let text = String::from_utf8_lossy(&raw);
        let lines: Vec<String> = text.lines().map(|l| l.trim_end().to_string()).collect();
        trace!(?lines, "rx");
        Ok(lines)
    }
}
