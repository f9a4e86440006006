//! We use this mocking module in unit tests to emulate a serial port.

use std::io;

/// Our mock type used to emulate a serial port.
///
/// Reads return [`io::ErrorKind::TimedOut`] once the scripted data runs
/// out, matching what a real port does when the instrument stays quiet.
#[derive(Debug)]
pub struct MockSerial {
    /// Buffer to store data written to the mock serial port
    write_buffer: Vec<u8>,
    /// Buffer containing pre-configured response data to be read
    read_buffer: Vec<u8>,
    /// Current position in the read buffer
    read_position: usize,
    /// Flag to simulate write errors
    should_error_on_write: bool,
    /// Flag to simulate read errors
    should_error_on_read: bool,
}

impl MockSerial {
    /// Create a new MockSerial instance with empty buffers
    pub fn new() -> Self {
        Self {
            write_buffer: Vec::new(),
            read_buffer: Vec::new(),
            read_position: 0,
            should_error_on_write: false,
            should_error_on_read: false,
        }
    }

    /// Set the data that will be returned when read() is called
    pub fn set_read_data(&mut self, data: &[u8]) {
        self.read_buffer.clear();
        self.read_position = 0;
        self.read_buffer.extend_from_slice(data);
    }

    /// Get a reference to the data that was written to this mock serial port
    pub fn written_data(&self) -> &[u8] {
        &self.write_buffer
    }

    /// Clear the write buffer
    pub fn clear_written_data(&mut self) {
        self.write_buffer.clear();
    }

    /// Configure whether write operations should fail with an error
    pub fn set_write_error(&mut self, should_error: bool) {
        self.should_error_on_write = should_error;
    }

    /// Configure whether read operations should fail with an error
    pub fn set_read_error(&mut self, should_error: bool) {
        self.should_error_on_read = should_error;
    }
}

impl io::Write for MockSerial {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.should_error_on_write {
            return Err(io::Error::other("simulated write failure"));
        }
        self.write_buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.should_error_on_write {
            return Err(io::Error::other("simulated write failure"));
        }
        Ok(())
    }
}

impl io::Read for MockSerial {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.should_error_on_read {
            return Err(io::Error::other("simulated read failure"));
        }

        if self.read_position >= self.read_buffer.len() {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "no scripted data left",
            ));
        }

        let available = self.read_buffer.len() - self.read_position;
        let n = buf.len().min(available);
        buf[..n].copy_from_slice(&self.read_buffer[self.read_position..self.read_position + n]);
        self.read_position += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn write_captures_data() {
        let mut mock = MockSerial::new();
        mock.write_all(b"Hello, ").unwrap();
        mock.write_all(b"World!").unwrap();
        assert_eq!(mock.written_data(), b"Hello, World!");
    }

    #[test]
    fn read_returns_scripted_data() {
        let mut mock = MockSerial::new();
        mock.set_read_data(b"Response data");

        let mut buffer = [0u8; 20];
        let n = mock.read(&mut buffer).unwrap();
        assert_eq!(&buffer[..n], b"Response data");
    }

    #[test]
    fn read_honors_small_buffers() {
        let mut mock = MockSerial::new();
        mock.set_read_data(b"Hello World");

        let mut buffer = [0u8; 5];
        assert_eq!(mock.read(&mut buffer).unwrap(), 5);
        assert_eq!(&buffer, b"Hello");
        assert_eq!(mock.read(&mut buffer).unwrap(), 5);
        assert_eq!(&buffer, b" Worl");
    }

    #[test]
    fn read_times_out_when_data_exhausted() {
        let mut mock = MockSerial::new();
        mock.set_read_data(b"Hi");

        let mut buffer = [0u8; 10];
        assert!(mock.read(&mut buffer).is_ok());
        let err = mock.read(&mut buffer).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn read_times_out_with_no_data() {
        let mut mock = MockSerial::new();
        let mut buffer = [0u8; 10];
        let err = mock.read(&mut buffer).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn set_read_data_replaces_previous_script() {
        let mut mock = MockSerial::new();
        mock.set_read_data(b"first");
        mock.set_read_data(b"second");

        let mut buffer = [0u8; 10];
        let n = mock.read(&mut buffer).unwrap();
        assert_eq!(&buffer[..n], b"second");
    }

    #[test]
    fn error_flags_simulate_failures() {
        let mut mock = MockSerial::new();
        mock.set_write_error(true);
        assert!(mock.write(b"test").is_err());
        assert!(mock.flush().is_err());
        assert!(mock.written_data().is_empty());

        mock.set_write_error(false);
        assert!(mock.write(b"test").is_ok());

        mock.set_read_data(b"data");
        mock.set_read_error(true);
        let mut buffer = [0u8; 10];
        assert!(mock.read(&mut buffer).is_err());
    }
}
