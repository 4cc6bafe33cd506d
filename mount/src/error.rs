//! Error taxonomy for mount communication and control.
//!
//! Errors fall into four behavioural classes:
//!
//! - **Protocol** violations (malformed or truncated replies) are surfaced and never retried.
//! - **Rejected** commands (the controller answered `!`) abort only the operation that sent them.
//! - **Invalid parameters** are caught before any I/O is attempted.
//! - **Disconnect** class failures (I/O errors and read timeouts) are fatal to the session.
//!   Use [`MountError::is_disconnect`] to classify them.

use thiserror::Error;

use crate::protocol::{AxisId, Command};

/// Errors that can occur while talking to or driving the mount.
#[derive(Error, Debug)]
pub enum MountError {
    /// Low-level I/O error on the transport.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No complete reply within the read timeout.
    #[error("Timeout waiting for {0}")]
    Timeout(String),

    /// Reply did not match the wire format.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Controller answered `!` to a command.
    ///
    /// Known codes:
    /// - 0: Unknown command
    /// - 1: Command length error
    /// - 2: Motor not stopped
    /// - 3: Invalid character
    /// - 4: Not initialized
    /// - 5: Driver sleeping
    /// - 7: PEC training is running
    /// - 8: No valid PEC data
    #[error("Command {command:?} on axis {axis} rejected: {}", rejection_message(*.code))]
    CommandRejected {
        /// Command that was rejected
        command: Command,
        /// Axis the command was addressed to
        axis: AxisId,
        /// Error code following the `!`, when the controller sent one
        code: Option<u8>,
    },

    /// Parameter out of range or an illegal state transition.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Operation needs an open connection.
    #[error("Mount is not connected")]
    NotConnected,

    /// Handshake reported a mount type this driver does not drive.
    #[error("Unsupported mount type code 0x{0:02X}")]
    UnsupportedMount(u8),

    /// An abort request was observed before the next command went out.
    #[error("Operation aborted")]
    Aborted,
}

/// Result type for mount operations.
pub type MountResult<T> = Result<T, MountError>;

impl MountError {
    /// True for transport failures that end the session.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, MountError::Io(_) | MountError::Timeout(_))
    }
}

fn rejection_message(code: Option<u8>) -> String {
    match code {
        None => "no error code".to_string(),
        Some(0) => "Unknown command".to_string(),
        Some(1) => "Command length error".to_string(),
        Some(2) => "Motor not stopped".to_string(),
        Some(3) => "Invalid character".to_string(),
        Some(4) => "Not initialized".to_string(),
        Some(5) => "Driver sleeping".to_string(),
        Some(7) => "PEC training is running".to_string(),
        Some(8) => "No valid PEC data".to_string(),
        Some(other) => format!("Unknown error ({other})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnect_classification() {
        let io = MountError::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone"));
        assert!(io.is_disconnect());
        assert!(MountError::Timeout("reply".into()).is_disconnect());
        assert!(!MountError::Protocol("bad".into()).is_disconnect());
        assert!(!MountError::InvalidParameter("rate".into()).is_disconnect());
    }

    #[test]
    fn test_rejection_display() {
        let err = MountError::CommandRejected {
            command: Command::StartMotion,
            axis: AxisId::Dec,
            code: Some(2),
        };
        let text = err.to_string();
        assert!(text.contains("Motor not stopped"), "{text}");
        assert!(text.contains("DEC"), "{text}");
    }
}
