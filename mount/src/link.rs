//! Request/reply dispatch over a [`Transport`].
//!
//! The link owns the transport exclusively. Every [`dispatch`](Link::dispatch)
//! writes one frame and reads exactly one reply before returning, so at most one
//! command is ever in flight. It also carries the [`Clock`] used for every wait
//! and cache decision made on behalf of the mount.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace};

use crate::clock::Clock;
use crate::error::{MountError, MountResult};
use crate::protocol::{AxisId, Command, Frame, Reply, TERMINATOR};
use crate::transport::Transport;

/// Cross-thread abort request, observed before the next command is written.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    flag: Arc<AtomicBool>,
}

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request an abort. Safe to call from any thread.
    pub fn request(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Clear a pending request, returning whether one was pending.
    pub fn take(&self) -> bool {
        self.flag.swap(false, Ordering::SeqCst)
    }
}

/// Exclusive command channel to the motor controller.
pub struct Link {
    transport: Box<dyn Transport>,
    clock: Box<dyn Clock>,
    read_timeout: Duration,
    abort: AbortHandle,
}

impl Link {
    pub fn new(
        transport: Box<dyn Transport>,
        clock: Box<dyn Clock>,
        read_timeout: Duration,
        abort: AbortHandle,
    ) -> Self {
        Self {
            transport,
            clock,
            read_timeout,
            abort,
        }
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn set_read_timeout(&mut self, timeout: Duration) {
        self.read_timeout = timeout;
    }

    pub fn abort_handle(&self) -> &AbortHandle {
        &self.abort
    }

    /// Send one frame and decode its reply.
    ///
    /// # Errors
    ///
    /// - [`MountError::Aborted`] if an abort was requested; nothing is written.
    /// - [`MountError::CommandRejected`] if the controller answered `!`.
    /// - [`MountError::Timeout`] / [`MountError::Io`] on transport failure.
    /// - [`MountError::Protocol`] on a malformed reply.
    pub fn dispatch(&mut self, frame: &Frame) -> MountResult<Vec<u8>> {
        if self.abort.is_requested() {
            return Err(MountError::Aborted);
        }
        self.exchange(frame)
    }

    fn exchange(&mut self, frame: &Frame) -> MountResult<Vec<u8>> {
        let bytes = frame.encode()?;
        trace!("send {:?}", String::from_utf8_lossy(&bytes));
        self.transport.write(&bytes)?;

        let raw = match self.transport.read_until(TERMINATOR, self.read_timeout) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                return Err(MountError::Timeout(format!(
                    "reply to {:?} on {}",
                    frame.command, frame.axis
                )))
            }
            Err(e) => return Err(e.into()),
        };
        trace!("recv {:?}", String::from_utf8_lossy(&raw));

        match Reply::decode(&raw)? {
            Reply::Ok(payload) => Ok(payload),
            Reply::Rejected(code) => {
                debug!(
                    "{:?} on {} rejected with code {:?}",
                    frame.command, frame.axis, code
                );
                Err(MountError::CommandRejected {
                    command: frame.command,
                    axis: frame.axis,
                    code,
                })
            }
        }
    }

    /// Send a command without an argument.
    pub fn command(&mut self, command: Command, axis: AxisId) -> MountResult<Vec<u8>> {
        self.dispatch(&Frame::new(command, axis))
    }

    /// Send a command with an argument.
    pub fn command_with(
        &mut self,
        command: Command,
        axis: AxisId,
        argument: u32,
    ) -> MountResult<Vec<u8>> {
        self.dispatch(&Frame::with_argument(command, axis, argument))
    }

    /// Send a query whose reply is a little-endian hex number.
    pub fn query_value(&mut self, command: Command, axis: AxisId) -> MountResult<u32> {
        let payload = self.command(command, axis)?;
        Reply::Ok(payload).value()
    }

    /// Write a raw, pre-formatted frame and return the raw reply (REPL use).
    pub fn raw(&mut self, text: &str) -> MountResult<String> {
        let mut bytes = text.as_bytes().to_vec();
        if bytes.last() != Some(&TERMINATOR) {
            bytes.push(TERMINATOR);
        }
        self.transport.clear_input()?;
        self.transport.write(&bytes)?;
        let raw = self
            .transport
            .read_until(TERMINATOR, self.read_timeout)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::TimedOut => MountError::Timeout(format!("reply to {text:?}")),
                _ => MountError::Io(e),
            })?;
        Ok(String::from_utf8_lossy(&raw).trim_end().to_string())
    }
}
