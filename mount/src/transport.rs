//! Byte transports carrying the wire protocol.
//!
//! The driver only needs a duplex byte channel with a bounded read. The real
//! mount sits behind a serial port (USB adapter or the hand controller in PC
//! direct mode); tests use [`MockMount`](crate::mock::MockMount).

use std::io;
use std::time::Duration;

/// Exclusive duplex byte channel to the motor controller.
pub trait Transport: Send {
    /// Write all bytes and flush.
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Read bytes up to and including `terminator`.
    ///
    /// Returns an error of kind [`io::ErrorKind::TimedOut`] when no terminator
    /// arrives within `timeout`.
    fn read_until(&mut self, terminator: u8, timeout: Duration) -> io::Result<Vec<u8>>;

    /// Discard any unread input.
    fn clear_input(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(feature = "serial")]
pub use serial::{SerialTransport, DEFAULT_BAUD};

#[cfg(feature = "serial")]
mod serial {
    use std::io::{self, Read, Write};
    use std::time::{Duration, Instant};

    use serialport::{ClearBuffer, SerialPort};
    use tracing::{debug, trace};

    use super::Transport;

    /// Default baud rate of the motor controllers.
    ///
    /// Some newer boards (EQ6-R, AZ-GTi over USB) run at 115200.
    pub const DEFAULT_BAUD: u32 = 9600;

    /// Serial port transport (8N1, no flow control).
    pub struct SerialTransport {
        port: Box<dyn SerialPort>,
    }

    impl SerialTransport {
        /// Open a serial port, e.g. `/dev/ttyUSB0` or `COM3`.
        pub fn open(path: &str, baud: u32) -> io::Result<Self> {
            let port = serialport::new(path, baud)
                .timeout(Duration::from_millis(100))
                .open()
                .map_err(io::Error::from)?;
            debug!("Opened {} at {} baud", path, baud);
            Ok(Self { port })
        }
    }

    impl Transport for SerialTransport {
        fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
            self.port.write_all(bytes)?;
            self.port.flush()
        }

        fn read_until(&mut self, terminator: u8, timeout: Duration) -> io::Result<Vec<u8>> {
            let start = Instant::now();
            let mut buf = [0u8; 1];
            let mut bytes = Vec::new();

            loop {
                if start.elapsed() > timeout {
                    return Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("no terminator after {} bytes", bytes.len()),
                    ));
                }
                match self.port.read(&mut buf) {
                    Ok(0) => continue,
                    Ok(_) => {
                        bytes.push(buf[0]);
                        if buf[0] == terminator {
                            trace!("serial recv {} bytes", bytes.len());
                            return Ok(bytes);
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::TimedOut => continue,
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                    Err(e) => return Err(e),
                }
            }
        }

        fn clear_input(&mut self) -> io::Result<()> {
            self.port.clear(ClearBuffer::Input).map_err(io::Error::from)
        }
    }
}
