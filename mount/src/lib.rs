//! Skywatcher equatorial mount driver.
//!
//! This crate drives Skywatcher-protocol motor controllers (EQ6, HEQ5, EQ8 and
//! relatives) over a serial link. It covers the whole path from the ASCII wire
//! protocol up to closed-loop goto and automatic homing.
//!
//! # Modules
//!
//! - [`protocol`] - command frames, replies and typed axis status
//! - [`link`] - one-in-flight request/reply dispatch with abort
//! - [`axis`] - per-axis motion control, rates and backlash
//! - [`coords`] - encoder steps to hour angle and declination
//! - [`goto`] - pier side selection and iterative goto
//! - [`autohome`] - six-phase homing against the index sensors
//! - [`driver`] - the [`MountDriver`] facade
//! - [`mock`] - simulated controller for tests and dry runs
//!
//! # Features
//!
//! - `serial` - [`SerialTransport`] over the `serialport` crate, and the
//!   `mount_tool` binary

pub mod astro;
pub mod autohome;
pub mod axis;
pub mod clock;
pub mod config;
pub mod coords;
pub mod driver;
pub mod error;
pub mod goto;
pub mod link;
pub mod mock;
pub mod protocol;
pub mod transport;

pub use astro::{HorizontalCoords, ObserverPosition};
pub use autohome::{AutohomeProgress, AutohomeState};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::MountConfig;
pub use coords::{Hemisphere, MountGeometry, PierSide, SkyPosition};
pub use driver::{
    Alignment, MountDriver, MountInfo, MountModel, MountSnapshot, MountState, SafetyBoundary,
    TrackRate,
};
pub use error::{MountError, MountResult};
pub use goto::GotoParams;
pub use link::AbortHandle;
pub use protocol::AxisId;
pub use transport::Transport;

#[cfg(feature = "serial")]
pub use transport::{SerialTransport, DEFAULT_BAUD};
