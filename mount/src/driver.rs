//! Mount driver facade.
//!
//! [`MountDriver`] owns the link and both axis controllers for one session and
//! exposes the mount-level operations: connect, goto, sync, tracking, manual
//! motion, park, autohome and abort. An external scheduler calls
//! [`tick`](MountDriver::tick) once per tick period; each tick reads both
//! encoders, advances whatever operation is in progress and publishes a
//! [`MountSnapshot`].
//!
//! # Failures
//!
//! Disconnect-class errors (I/O, read timeout) end the session: the driver makes
//! a best-effort instant stop of both axes, drops the link and returns the
//! error. All other errors abort only the operation that raised them.
//!
//! # Example
//!
//! ```
//! use eqmount::mock::{MockMount, MockSpec};
//! use eqmount::{ManualClock, MountConfig, MountDriver, TrackRate};
//!
//! let clock = ManualClock::new(chrono::Utc::now());
//! let mount = MockMount::new(MockSpec::default(), clock.clone());
//! let mut driver = MountDriver::new(MountConfig::default());
//! driver.connect(Box::new(mount), Box::new(clock.clone()))?;
//!
//! driver.goto(5.5, 22.0)?;
//! while driver.tick()?.goto.is_some() {
//!     clock.advance(driver.config().tick_period());
//! }
//! driver.start_tracking(TrackRate::Sidereal)?;
//! # Ok::<(), eqmount::MountError>(())
//! ```

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator};
use tracing::{debug, info, warn};

use crate::astro::{
    equatorial_to_horizontal, julian_date, local_sidereal_time, HorizontalCoords,
    ObserverPosition,
};
use crate::autohome::{AutohomeProgress, AutohomeSequencer, AutohomeState};
use crate::axis::{AxisController, AxisParams, SIDEREAL_RATE_ARCSEC};
use crate::clock::Clock;
use crate::config::{MountConfig, DEFAULT_ENCODER_ZERO};
use crate::coords::{range_24, range_ha, Hemisphere, MountGeometry, PierSide, SkyPosition};
use crate::error::{MountError, MountResult};
use crate::goto::{GotoParams, GotoPlanner, GotoProgress};
use crate::link::{AbortHandle, Link};
use crate::protocol::{AxisId, Command, Feature};
use crate::transport::Transport;

/// Known mount models by the type code in the motor board version reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, Serialize, Deserialize)]
pub enum MountModel {
    #[strum(serialize = "EQ6")]
    Eq6,
    #[strum(serialize = "HEQ5")]
    Heq5,
    #[strum(serialize = "EQ5")]
    Eq5,
    #[strum(serialize = "EQ3")]
    Eq3,
    #[strum(serialize = "EQ8")]
    Eq8,
    #[strum(serialize = "AZ-EQ6")]
    AzEq6,
    #[strum(serialize = "AZ-EQ5")]
    AzEq5,
    #[strum(serialize = "Star Adventurer")]
    StarAdventurer,
    #[strum(serialize = "Star Adventurer GTi")]
    StarAdventurerGti,
    #[strum(serialize = "EQ8-R Pro")]
    Eq8rPro,
    #[strum(serialize = "AZ-EQ6 Pro")]
    AzEq6Pro,
    #[strum(serialize = "EQ6-R Pro")]
    Eq6rPro,
    #[strum(serialize = "EQM-35 Pro")]
    Eq5Pro,
    #[strum(serialize = "Wave 150i")]
    Wave150i,
    #[strum(serialize = "AZ-GTi (EQ mode)")]
    AzGti,
}

impl MountModel {
    pub fn code(self) -> u8 {
        match self {
            MountModel::Eq6 => 0x00,
            MountModel::Heq5 => 0x01,
            MountModel::Eq5 => 0x02,
            MountModel::Eq3 => 0x03,
            MountModel::Eq8 => 0x04,
            MountModel::AzEq6 => 0x05,
            MountModel::AzEq5 => 0x06,
            MountModel::StarAdventurer => 0x0A,
            MountModel::StarAdventurerGti => 0x0C,
            MountModel::Eq8rPro => 0x20,
            MountModel::AzEq6Pro => 0x22,
            MountModel::Eq6rPro => 0x23,
            MountModel::Eq5Pro => 0x31,
            MountModel::Wave150i => 0x45,
            MountModel::AzGti => 0xA5,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        MountModel::iter().find(|m| m.code() == code)
    }

    /// Type codes of every known model.
    pub fn supported_codes() -> Vec<u8> {
        MountModel::iter().map(MountModel::code).collect()
    }
}

/// Tracking rate presets.
#[derive(Debug, Clone, Copy, PartialEq, Display, Serialize, Deserialize)]
pub enum TrackRate {
    Sidereal,
    Lunar,
    Solar,
    /// RA and DEC rates in sidereal multiples
    Custom { ra: f64, dec: f64 },
}

impl TrackRate {
    /// RA and DEC rates in multiples of the sidereal rate, northern sense.
    pub fn multiples(&self) -> (f64, f64) {
        match *self {
            TrackRate::Sidereal => (1.0, 0.0),
            TrackRate::Lunar => (14.685 / SIDEREAL_RATE_ARCSEC, 0.0),
            TrackRate::Solar => (15.0 / SIDEREAL_RATE_ARCSEC, 0.0),
            TrackRate::Custom { ra, dec } => (ra, dec),
        }
    }
}

/// High-level driver state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum MountState {
    Disconnected,
    Idle,
    Tracking,
    /// Manual motion on at least one axis
    Slewing,
    Goto,
    Homing,
    Parking,
    Parked,
}

impl MountState {
    pub fn is_moving(self) -> bool {
        matches!(
            self,
            MountState::Tracking
                | MountState::Slewing
                | MountState::Goto
                | MountState::Homing
                | MountState::Parking
        )
    }
}

/// Pointing model that corrects raw mount coordinates.
///
/// RA in hours, Dec in degrees.
pub trait Alignment: Send {
    /// Sky coordinates for a raw mount position, or `None` if the model
    /// cannot correct it.
    fn correct(
        &self,
        ra: f64,
        dec: f64,
        julian_date: f64,
        observer: &ObserverPosition,
    ) -> Option<(f64, f64)>;

    /// Record that the mount at `(telescope_ra, telescope_dec)` was pointing at
    /// `(target_ra, target_dec)`.
    fn record_sync(
        &mut self,
        target_ra: f64,
        target_dec: f64,
        telescope_ra: f64,
        telescope_dec: f64,
        lst: f64,
        julian_date: f64,
    );

    /// Raw mount coordinates for a sky position. Models that cannot invert
    /// their correction return `None` and the target is used as is.
    fn to_telescope(
        &self,
        _ra: f64,
        _dec: f64,
        _julian_date: f64,
        _observer: &ObserverPosition,
    ) -> Option<(f64, f64)> {
        None
    }
}

/// Horizon limits checked on every tick while the mount moves.
pub trait SafetyBoundary: Send {
    fn is_within_limits(&self, azimuth_deg: f64, altitude_deg: f64) -> bool;
}

/// Mount identity and calibration read during connect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MountInfo {
    pub mount_code: u8,
    pub model: Option<MountModel>,
    pub firmware_version: u32,
    pub ra_steps_per_rev: u32,
    pub dec_steps_per_rev: u32,
    pub ra_timer_freq: u32,
    pub dec_timer_freq: u32,
    pub ra_high_speed_ratio: u32,
    pub dec_high_speed_ratio: u32,
    pub geometry: MountGeometry,
}

/// Published state after each tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MountSnapshot {
    pub state: MountState,
    pub ra_encoder: i64,
    pub dec_encoder: i64,
    /// Position from the encoders alone
    pub raw: SkyPosition,
    /// Position after alignment or sync correction, hours
    pub ra: f64,
    /// Position after alignment or sync correction, degrees
    pub dec: f64,
    pub hour_angle: f64,
    pub pier_side: PierSide,
    pub horizontal: HorizontalCoords,
    pub lst: f64,
    pub julian_date: f64,
    pub tracking: Option<TrackRate>,
    pub goto: Option<GotoParams>,
    pub autohome: AutohomeState,
}

struct Session {
    link: Link,
    ra: AxisController,
    dec: AxisController,
    planner: GotoPlanner,
    info: MountInfo,
}

impl Session {
    fn split(&mut self, axis: AxisId) -> (&mut Link, &mut AxisController) {
        match axis {
            AxisId::Ra => (&mut self.link, &mut self.ra),
            AxisId::Dec => (&mut self.link, &mut self.dec),
        }
    }

    fn geometry(&self) -> &MountGeometry {
        self.planner.geometry()
    }

    fn instant_stop_both(&mut self) -> MountResult<()> {
        self.ra.instant_stop(&mut self.link)?;
        self.dec.instant_stop(&mut self.link)
    }

    fn stop_both(&mut self) -> MountResult<()> {
        self.ra.stop_and_wait(&mut self.link)?;
        self.dec.stop_and_wait(&mut self.link)
    }

    fn any_running(&mut self) -> MountResult<bool> {
        Ok(self.ra.read_status(&mut self.link)?.running
            || self.dec.read_status(&mut self.link)?.running)
    }

    /// Run both axes at a tracking rate. A DEC rate below the minimum stops DEC.
    fn apply_tracking(&mut self, rate: TrackRate, config: &MountConfig) -> MountResult<()> {
        let (mut ra_rate, dec_rate) = rate.multiples();
        if config.hemisphere() == Hemisphere::South {
            ra_rate = -ra_rate;
        }
        debug!("Tracking {rate}: RA {ra_rate:.5}x, DEC {dec_rate:.5}x");

        self.ra.set_rate(&mut self.link, ra_rate)?;
        if !self.ra.is_running(&mut self.link)? {
            self.ra.start(&mut self.link)?;
        }
        if dec_rate.abs() < config.rates.min_rate {
            self.dec.stop(&mut self.link)?;
        } else {
            self.dec.set_rate(&mut self.link, dec_rate)?;
            if !self.dec.is_running(&mut self.link)? {
                self.dec.start(&mut self.link)?;
            }
        }
        Ok(())
    }
}

/// Equatorial mount driver.
pub struct MountDriver {
    config: MountConfig,
    abort: AbortHandle,
    session: Option<Session>,
    state: MountState,
    tracking: Option<TrackRate>,
    goto: Option<GotoParams>,
    /// Tracking to restore once the goto finishes
    resume_tracking: Option<TrackRate>,
    autohome: AutohomeSequencer,
    /// RA (hours) and Dec (degrees) added to raw positions without alignment
    sync_offset: (f64, f64),
    alignment: Option<Box<dyn Alignment>>,
    boundary: Option<Box<dyn SafetyBoundary>>,
    snapshot: Option<MountSnapshot>,
}

impl MountDriver {
    pub fn new(config: MountConfig) -> Self {
        let autohome = AutohomeSequencer::new(config.autohome.clone(), config.goto.clone());
        Self {
            config,
            abort: AbortHandle::new(),
            session: None,
            state: MountState::Disconnected,
            tracking: None,
            goto: None,
            resume_tracking: None,
            autohome,
            sync_offset: (0.0, 0.0),
            alignment: None,
            boundary: None,
            snapshot: None,
        }
    }

    pub fn config(&self) -> &MountConfig {
        &self.config
    }

    pub fn state(&self) -> MountState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    pub fn info(&self) -> Option<&MountInfo> {
        self.session.as_ref().map(|s| &s.info)
    }

    /// Snapshot from the most recent tick.
    pub fn snapshot(&self) -> Option<&MountSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn tracking(&self) -> Option<TrackRate> {
        self.tracking
    }

    pub fn goto_params(&self) -> Option<&GotoParams> {
        self.goto.as_ref()
    }

    pub fn autohome_state(&self) -> AutohomeState {
        self.autohome.state()
    }

    pub fn sync_offset(&self) -> (f64, f64) {
        self.sync_offset
    }

    /// Handle for requesting an abort from another thread.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    pub fn set_alignment(&mut self, alignment: Option<Box<dyn Alignment>>) {
        self.alignment = alignment;
    }

    pub fn set_safety_boundary(&mut self, boundary: Option<Box<dyn SafetyBoundary>>) {
        self.boundary = boundary;
    }

    fn session(&mut self) -> MountResult<&mut Session> {
        self.session.as_mut().ok_or(MountError::NotConnected)
    }

    /// Route an operation result through session-level error handling.
    fn checked<T>(&mut self, result: MountResult<T>) -> MountResult<T> {
        match result {
            Err(MountError::Aborted) => match self.service_abort() {
                Ok(()) => Err(MountError::Aborted),
                Err(e) => self.checked(Err(e)),
            },
            Err(e) if e.is_disconnect() => {
                self.tear_down(&e);
                Err(e)
            }
            other => other,
        }
    }

    fn tear_down(&mut self, reason: &MountError) {
        warn!("Dropping mount connection: {reason}");
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.instant_stop_both() {
                debug!("Stop during teardown failed: {e}");
            }
        }
        self.clear_operations();
        self.state = MountState::Disconnected;
    }

    fn clear_operations(&mut self) {
        self.goto = None;
        self.resume_tracking = None;
        self.tracking = None;
        self.autohome.reset();
    }

    fn ensure_movable(&self) -> MountResult<()> {
        match self.state {
            MountState::Parked | MountState::Parking => Err(MountError::InvalidParameter(
                "mount is parked".to_string(),
            )),
            MountState::Homing => Err(MountError::InvalidParameter(
                "autohome in progress".to_string(),
            )),
            _ => Ok(()),
        }
    }

    // ==================== Connection ====================

    /// Open a session: handshake, read calibration, establish zero references.
    ///
    /// Fails with [`MountError::UnsupportedMount`] if the reported type code is
    /// not in `supported_mounts`.
    pub fn connect(
        &mut self,
        transport: Box<dyn Transport>,
        clock: Box<dyn Clock>,
    ) -> MountResult<&MountInfo> {
        if self.session.is_some() {
            self.disconnect();
        }
        self.abort.take();
        let mut link = Link::new(
            transport,
            clock,
            self.config.read_timeout(),
            self.abort.clone(),
        );

        let version = link.query_value(Command::InquireMotorBoardVersion, AxisId::Ra)?;
        link.query_value(Command::InquireMotorBoardVersion, AxisId::Dec)?;
        let mount_code = (version & 0xFF) as u8;
        if !self.config.supported_mounts.contains(&mount_code) {
            warn!("Mount type 0x{mount_code:02X} is not supported");
            return Err(MountError::UnsupportedMount(mount_code));
        }

        let ra_params = AxisParams::inquire(&mut link, AxisId::Ra)?;
        let dec_params = AxisParams::inquire(&mut link, AxisId::Dec)?;
        let mut ra = AxisController::new(AxisId::Ra, ra_params, &self.config);
        let mut dec = AxisController::new(AxisId::Dec, dec_params, &self.config);

        let ra_zero = zero_reference(&mut link, &mut ra, 0)?;
        let dec_zero = zero_reference(&mut link, &mut dec, i64::from(dec_params.steps_per_rev / 4))?;

        let geometry = MountGeometry {
            ra_zero,
            dec_zero,
            ra_total: ra_params.steps_per_rev,
            dec_total: dec_params.steps_per_rev,
            hemisphere: self.config.hemisphere(),
        };
        let model = MountModel::from_code(mount_code);
        let info = MountInfo {
            mount_code,
            model,
            firmware_version: version >> 8,
            ra_steps_per_rev: ra_params.steps_per_rev,
            dec_steps_per_rev: dec_params.steps_per_rev,
            ra_timer_freq: ra_params.timer_freq,
            dec_timer_freq: dec_params.timer_freq,
            ra_high_speed_ratio: ra_params.high_speed_ratio,
            dec_high_speed_ratio: dec_params.high_speed_ratio,
            geometry,
        };
        info!(
            "Connected to {} (type 0x{:02X}, firmware {:04X}), {} steps/rev",
            model.map(|m| m.to_string()).unwrap_or_default(),
            mount_code,
            info.firmware_version,
            info.ra_steps_per_rev
        );

        self.clear_operations();
        self.state = MountState::Idle;
        let session = self.session.insert(Session {
            link,
            ra,
            dec,
            planner: GotoPlanner::new(self.config.goto.clone(), geometry),
            info,
        });
        Ok(&session.info)
    }

    /// Stop both axes and close the session.
    pub fn disconnect(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.stop_both() {
                warn!("Failed to stop axes on disconnect: {e}");
            }
            info!("Disconnected");
        }
        self.clear_operations();
        self.state = MountState::Disconnected;
        self.snapshot = None;
    }

    // ==================== Tick ====================

    /// Poll the hardware once and advance any operation in progress.
    pub fn tick(&mut self) -> MountResult<MountSnapshot> {
        let result = self.tick_inner();
        self.checked(result)
    }

    fn tick_inner(&mut self) -> MountResult<MountSnapshot> {
        if self.abort.is_requested() {
            self.service_abort()?;
        }
        let config = self.config.clone();
        let session = self.session.as_mut().ok_or(MountError::NotConnected)?;

        let jd = julian_date(session.link.clock().utc());
        let lst = local_sidereal_time(jd, config.observer.longitude_deg);
        let ra_encoder = session.ra.read_encoder(&mut session.link)?;
        let dec_encoder = session.dec.read_encoder(&mut session.link)?;
        let raw = session.geometry().sky_position(ra_encoder, dec_encoder, lst);

        if let Some(params) = self.goto.as_mut() {
            let progress = match session.planner.tick(
                params,
                &mut session.link,
                &mut session.ra,
                &mut session.dec,
                lst,
            ) {
                Ok(progress) => progress,
                Err(e) if e.is_disconnect() || matches!(e, MountError::Aborted) => return Err(e),
                Err(e) => {
                    warn!("Goto abandoned: {e}");
                    let resume = self.resume_tracking.take();
                    self.recover_motion(resume)?;
                    return Err(e);
                }
            };
            if let GotoProgress::Completed { .. } = progress {
                self.goto = None;
                self.state = MountState::Idle;
                if let Some(rate) = self.resume_tracking.take() {
                    session.apply_tracking(rate, &config)?;
                    self.tracking = Some(rate);
                    self.state = MountState::Tracking;
                }
            }
        }

        if self.state == MountState::Parking && !session.any_running()? {
            info!("Parked");
            self.state = MountState::Parked;
        }

        if self.autohome.state() != AutohomeState::Idle {
            match self.autohome.tick(&mut session.link, &mut session.ra, &mut session.dec) {
                Ok(AutohomeProgress::Completed) => {
                    let home = &config.autohome;
                    let mut geometry = *session.geometry();
                    geometry.ra_zero = i64::from(home.home_encoder_ra);
                    geometry.dec_zero =
                        i64::from(home.home_encoder_dec) - i64::from(geometry.dec_total / 4);
                    session.planner = GotoPlanner::new(config.goto.clone(), geometry);
                    session.info.geometry = geometry;
                    self.state = MountState::Idle;
                }
                Ok(AutohomeProgress::Failed(_)) | Ok(AutohomeProgress::Idle) => {
                    if self.state == MountState::Homing {
                        self.state = MountState::Idle;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    self.autohome.reset();
                    self.state = MountState::Idle;
                    if !e.is_disconnect() {
                        session.instant_stop_both()?;
                    }
                    return Err(e);
                }
            }
        }

        let (ra, dec) = self.corrected(raw.ra, raw.dec, jd);
        let hour_angle = range_ha(lst - ra);
        let horizontal =
            equatorial_to_horizontal(hour_angle, dec, config.observer.latitude_deg);

        let outside_limits = self.boundary.as_ref().is_some_and(|boundary| {
            !boundary.is_within_limits(horizontal.azimuth_deg, horizontal.altitude_deg)
        });
        if outside_limits && self.state.is_moving() {
            warn!(
                "Position az {:.2} alt {:.2} outside safety limits, aborting",
                horizontal.azimuth_deg, horizontal.altitude_deg
            );
            self.abort.request();
            self.service_abort()?;
        }

        let snapshot = MountSnapshot {
            state: self.state,
            ra_encoder,
            dec_encoder,
            raw,
            ra,
            dec,
            hour_angle,
            pier_side: raw.pier_side,
            horizontal,
            lst,
            julian_date: jd,
            tracking: self.tracking,
            goto: self.goto.clone(),
            autohome: self.autohome.state(),
        };
        self.snapshot = Some(snapshot.clone());
        Ok(snapshot)
    }

    /// Apply the alignment model, or the sync offset without one.
    fn corrected(&self, ra: f64, dec: f64, jd: f64) -> (f64, f64) {
        if let Some(alignment) = &self.alignment {
            if let Some(corrected) = alignment.correct(ra, dec, jd, &self.config.observer) {
                return corrected;
            }
        }
        (range_24(ra + self.sync_offset.0), dec + self.sync_offset.1)
    }

    /// Inverse of [`corrected`](Self::corrected) for goto targets.
    fn to_mount_frame(&self, ra: f64, dec: f64, jd: f64) -> (f64, f64) {
        if let Some(alignment) = &self.alignment {
            if let Some(raw) = alignment.to_telescope(ra, dec, jd, &self.config.observer) {
                return raw;
            }
            return (ra, dec);
        }
        (range_24(ra - self.sync_offset.0), dec - self.sync_offset.1)
    }

    /// Stop both axes after a failed operation, then resume `resume` tracking.
    fn recover_motion(&mut self, resume: Option<TrackRate>) -> MountResult<()> {
        self.goto = None;
        self.resume_tracking = None;
        self.tracking = None;
        self.state = MountState::Idle;
        let config = self.config.clone();
        let session = self.session()?;
        session.instant_stop_both()?;
        if let Some(rate) = resume {
            session.apply_tracking(rate, &config)?;
            info!("Tracking at {rate} rate resumed");
            self.tracking = Some(rate);
            self.state = MountState::Tracking;
        }
        Ok(())
    }

    // ==================== Abort ====================

    /// Stop both axes immediately and discard any goto, park or autohome.
    pub fn abort(&mut self) -> MountResult<()> {
        self.abort.request();
        let result = self.service_abort();
        self.checked(result)
    }

    fn service_abort(&mut self) -> MountResult<()> {
        self.abort.take();
        self.clear_operations();
        if let Some(session) = self.session.as_mut() {
            session.instant_stop_both()?;
            if self.state != MountState::Parked {
                self.state = MountState::Idle;
            }
            info!("Abort: both axes stopped");
        }
        Ok(())
    }

    // ==================== Goto / sync ====================

    /// Slew to a sky position (RA hours, Dec degrees).
    pub fn goto(&mut self, ra: f64, dec: f64) -> MountResult<()> {
        let result = self.goto_inner(ra, dec);
        self.checked(result)
    }

    fn goto_inner(&mut self, ra: f64, dec: f64) -> MountResult<()> {
        validate_position(ra, dec)?;
        self.ensure_movable()?;
        let observer = self.config.observer;
        let jd = julian_date(self.session()?.link.clock().utc());
        let lst = local_sidereal_time(jd, observer.longitude_deg);
        let (mount_ra, mount_dec) = self.to_mount_frame(ra, dec, jd);

        let resume = self.tracking.or(self.resume_tracking);
        let session = self.session()?;
        let started = session.planner.start(
            &mut session.link,
            &mut session.ra,
            &mut session.dec,
            mount_ra,
            mount_dec,
            lst,
        );
        match started {
            Ok(params) => {
                self.goto = Some(params);
                self.tracking = None;
                self.resume_tracking = resume;
                self.state = MountState::Goto;
                Ok(())
            }
            Err(e) if e.is_disconnect() || matches!(e, MountError::Aborted) => Err(e),
            Err(e) => {
                warn!("Goto not started: {e}");
                self.recover_motion(resume)?;
                Err(e)
            }
        }
    }

    /// Declare that the mount currently points at `(ra, dec)`.
    pub fn sync(&mut self, ra: f64, dec: f64) -> MountResult<()> {
        let result = self.sync_inner(ra, dec);
        self.checked(result)
    }

    fn sync_inner(&mut self, ra: f64, dec: f64) -> MountResult<()> {
        validate_position(ra, dec)?;
        if self.goto.is_some() || self.state == MountState::Homing {
            return Err(MountError::InvalidParameter(
                "cannot sync while slewing".to_string(),
            ));
        }
        let longitude = self.config.observer.longitude_deg;
        let session = self.session()?;
        let jd = julian_date(session.link.clock().utc());
        let lst = local_sidereal_time(jd, longitude);
        let ra_encoder = session.ra.read_encoder(&mut session.link)?;
        let dec_encoder = session.dec.read_encoder(&mut session.link)?;
        let raw = session.geometry().sky_position(ra_encoder, dec_encoder, lst);

        if let Some(alignment) = self.alignment.as_mut() {
            alignment.record_sync(ra, dec, raw.ra, raw.dec, lst, jd);
        } else {
            self.sync_offset = (range_ha(ra - raw.ra), dec - raw.dec);
        }
        info!(
            "Synced RA {:.4}h Dec {:.4} (mount RA {:.4}h Dec {:.4})",
            ra, dec, raw.ra, raw.dec
        );
        Ok(())
    }

    pub fn clear_sync(&mut self) {
        self.sync_offset = (0.0, 0.0);
    }

    // ==================== Tracking / manual motion ====================

    pub fn start_tracking(&mut self, rate: TrackRate) -> MountResult<()> {
        let result = self.start_tracking_inner(rate);
        self.checked(result)
    }

    fn start_tracking_inner(&mut self, rate: TrackRate) -> MountResult<()> {
        self.ensure_movable()?;
        if self.goto.is_some() {
            self.resume_tracking = Some(rate);
            return Ok(());
        }
        let config = self.config.clone();
        self.session()?.apply_tracking(rate, &config)?;
        info!("Tracking at {rate} rate");
        self.tracking = Some(rate);
        self.state = MountState::Tracking;
        Ok(())
    }

    pub fn stop_tracking(&mut self) -> MountResult<()> {
        let result = self.stop_tracking_inner();
        self.checked(result)
    }

    fn stop_tracking_inner(&mut self) -> MountResult<()> {
        self.resume_tracking = None;
        if self.tracking.take().is_none() {
            return Ok(());
        }
        self.session()?.stop_both()?;
        if self.state == MountState::Tracking {
            self.state = MountState::Idle;
        }
        Ok(())
    }

    /// Move one axis continuously at `rate` sidereal multiples (sign selects
    /// direction). Cancels any goto in progress.
    pub fn move_axis(&mut self, axis: AxisId, rate: f64) -> MountResult<()> {
        let result = self.move_axis_inner(axis, rate);
        self.checked(result)
    }

    fn move_axis_inner(&mut self, axis: AxisId, rate: f64) -> MountResult<()> {
        self.ensure_movable()?;
        let session = self.session.as_mut().ok_or(MountError::NotConnected)?;
        session.split(axis).1.rate_to_period(rate)?;

        let mut resume = None;
        if self.goto.is_some() {
            session.stop_both()?;
            info!("Goto cancelled by manual motion");
            self.goto = None;
            resume = self.resume_tracking.take();
            self.state = MountState::Idle;
        }

        let (link, controller) = session.split(axis);
        controller.set_rate(link, rate)?;
        if !controller.is_running(link)? {
            controller.start(link)?;
        }
        if resume.is_some() {
            self.tracking = resume;
        }
        self.state = MountState::Slewing;
        Ok(())
    }

    /// Stop manual motion on one axis; tracking resumes if it was active.
    pub fn stop_axis(&mut self, axis: AxisId) -> MountResult<()> {
        let result = self.stop_axis_inner(axis);
        self.checked(result)
    }

    fn stop_axis_inner(&mut self, axis: AxisId) -> MountResult<()> {
        let config = self.config.clone();
        let tracking = self.tracking;
        let slewing = self.state == MountState::Slewing;
        let session = self.session()?;
        let (link, controller) = session.split(axis);
        controller.stop_and_wait(link)?;

        if let Some(rate) = tracking {
            session.apply_tracking(rate, &config)?;
            self.state = MountState::Tracking;
        } else if slewing && !session.any_running()? {
            self.state = MountState::Idle;
        }
        Ok(())
    }

    // ==================== Park ====================

    /// Slew both axes to the configured park encoders.
    pub fn park(&mut self) -> MountResult<()> {
        let result = self.park_inner();
        self.checked(result)
    }

    fn park_inner(&mut self) -> MountResult<()> {
        match self.state {
            MountState::Parked | MountState::Parking => return Ok(()),
            MountState::Homing => {
                return Err(MountError::InvalidParameter(
                    "autohome in progress".to_string(),
                ))
            }
            _ => {}
        }
        self.clear_operations();
        let park = self.config.park;
        let goto = self.config.goto.clone();
        let session = self.session()?;
        session.stop_both()?;
        let ra_encoder = session.ra.read_encoder(&mut session.link)?;
        let dec_encoder = session.dec.read_encoder(&mut session.link)?;
        info!(
            "Parking at encoders 0x{:06X} / 0x{:06X}",
            park.ra_encoder, park.dec_encoder
        );
        session
            .ra
            .slew_to(&mut session.link, i64::from(park.ra_encoder) - ra_encoder, &goto)?;
        session
            .dec
            .slew_to(&mut session.link, i64::from(park.dec_encoder) - dec_encoder, &goto)?;
        self.state = MountState::Parking;
        Ok(())
    }

    pub fn unpark(&mut self) -> MountResult<()> {
        self.session()?;
        match self.state {
            MountState::Parked => {
                info!("Unparked");
                self.state = MountState::Idle;
                Ok(())
            }
            MountState::Parking => Err(MountError::InvalidParameter(
                "park still in progress".to_string(),
            )),
            _ => Ok(()),
        }
    }

    // ==================== Autohome ====================

    /// Request automatic homing. Must be called twice within the confirmation
    /// timeout; the second call starts the sequence.
    pub fn autohome(&mut self) -> MountResult<AutohomeState> {
        self.session()?;
        if matches!(self.state, MountState::Parked | MountState::Parking) {
            return Err(MountError::InvalidParameter("mount is parked".to_string()));
        }
        let state = self.autohome.request();
        if self.autohome.is_active() && self.state != MountState::Homing {
            self.goto = None;
            self.tracking = None;
            self.resume_tracking = None;
            self.state = MountState::Homing;
        }
        Ok(state)
    }

    // ==================== Low level ====================

    /// Overwrite an axis encoder register. The axis must be stopped.
    pub fn set_axis_position(&mut self, axis: AxisId, value: u32) -> MountResult<()> {
        let result = (|| {
            let (link, controller) = self.session()?.split(axis);
            if controller.read_status(link)?.running {
                return Err(MountError::InvalidParameter(format!(
                    "{axis} must be stopped to set its position"
                )));
            }
            controller.set_encoder(link, value)
        })();
        self.checked(result)
    }

    pub fn set_aux_encoders(&mut self, enabled: bool) -> MountResult<()> {
        let feature = if enabled {
            Feature::AuxEncoderOn
        } else {
            Feature::AuxEncoderOff
        };
        let result = (|| {
            let session = self.session()?;
            session.ra.set_feature(&mut session.link, feature)?;
            session.dec.set_feature(&mut session.link, feature)
        })();
        self.checked(result)
    }

    pub fn read_home_index(&mut self, axis: AxisId) -> MountResult<u32> {
        let result = (|| {
            let (link, controller) = self.session()?.split(axis);
            controller.read_home_index(link)
        })();
        self.checked(result)
    }

    /// Send a pre-formatted frame and return the raw reply text.
    pub fn raw_command(&mut self, text: &str) -> MountResult<String> {
        let result = (|| self.session()?.link.raw(text))();
        self.checked(result)
    }
}

/// Zero reference for an axis, initializing the motor if needed.
///
/// An uninitialized axis is assumed to be at its home position; `home_offset`
/// is the distance of home above the zero reference.
fn zero_reference(link: &mut Link, axis: &mut AxisController, home_offset: i64) -> MountResult<i64> {
    let status = axis.read_status(link)?;
    if status.initialized {
        return Ok(i64::from(DEFAULT_ENCODER_ZERO));
    }
    let encoder = axis.read_encoder(link)?;
    axis.initialize(link)?;
    debug!("{} initialized at encoder 0x{encoder:06X}", axis.axis());
    Ok(encoder - home_offset)
}

fn validate_position(ra: f64, dec: f64) -> MountResult<()> {
    if !(0.0..24.0).contains(&ra) || !(-90.0..=90.0).contains(&dec) {
        return Err(MountError::InvalidParameter(format!(
            "position RA {ra}h Dec {dec} out of range"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_model_codes_unique() {
        let codes = MountModel::supported_codes();
        for (i, a) in codes.iter().enumerate() {
            assert!(!codes[i + 1..].contains(a), "duplicate code {a:#04X}");
        }
        assert_eq!(MountModel::from_code(0x23), Some(MountModel::Eq6rPro));
        assert_eq!(MountModel::from_code(0x7F), None);
        assert_eq!(MountModel::AzEq6.to_string(), "AZ-EQ6");
    }

    #[test]
    fn test_track_rates() {
        assert_eq!(TrackRate::Sidereal.multiples(), (1.0, 0.0));
        let (lunar, _) = TrackRate::Lunar.multiples();
        assert!(lunar < 1.0 && lunar > 0.95);
        let (solar, _) = TrackRate::Solar.multiples();
        assert_relative_eq!(solar, 0.99727, epsilon = 1e-5);
    }

    #[test]
    fn test_validate_position() {
        assert!(validate_position(0.0, -90.0).is_ok());
        assert!(validate_position(23.99, 90.0).is_ok());
        assert!(validate_position(24.0, 0.0).is_err());
        assert!(validate_position(-0.1, 0.0).is_err());
        assert!(validate_position(1.0, 90.5).is_err());
    }

    #[test]
    fn test_not_connected() {
        let mut driver = MountDriver::new(MountConfig::default());
        assert!(matches!(driver.tick(), Err(MountError::NotConnected)));
        assert!(matches!(driver.goto(1.0, 2.0), Err(MountError::NotConnected)));
        assert_eq!(driver.state(), MountState::Disconnected);
    }
}
