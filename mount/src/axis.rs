//! Per-axis motor control.
//!
//! An [`AxisController`] owns the cached state of one axis (status, step
//! period, goto target, brake point) and turns high-level requests into
//! command sequences on a shared [`Link`]:
//!
//! - **Mode changes**: [`set_motion`](AxisController::set_motion) stops the axis
//!   and waits for it to halt before changing mode, speed or direction.
//! - **Rates**: [`set_rate`](AxisController::set_rate) converts a multiple of
//!   the sidereal rate into a step period.
//! - **Relative moves**: [`slew_to`](AxisController::slew_to) issues a goto with
//!   a brake point sized to the move.
//! - **Backlash**: [`start`](AxisController::start) inserts a short low-speed
//!   excursion when the direction reverses, then restores the configured move.
//!
//! The controller never infers status locally: the cached [`AxisStatus`] changes
//! only when a command is sent or the hardware is polled.

use std::time::Duration;

use tracing::{debug, trace};

use crate::config::{BacklashConfig, GotoConfig, MountConfig, RateConfig};
use crate::error::{MountError, MountResult};
use crate::link::Link;
use crate::protocol::{
    AxisId, AxisStatus, Command, Direction, Feature, MotionMode, SlewMode, SpeedMode, MAX_U24,
};

/// Length of a sidereal day in seconds.
pub const SIDEREAL_DAY_SECONDS: f64 = 86_164.098_903_691;

/// Sidereal rate in arcseconds per second.
pub const SIDEREAL_RATE_ARCSEC: f64 = 1_296_000.0 / SIDEREAL_DAY_SECONDS;

/// Calibration constants of one axis, queried at connect time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisParams {
    /// Encoder steps per full revolution
    pub steps_per_rev: u32,
    /// Step timer frequency in Hz
    pub timer_freq: u32,
    /// Steps per timer tick in high speed mode
    pub high_speed_ratio: u32,
}

impl AxisParams {
    /// Query the calibration constants of `axis`.
    pub fn inquire(link: &mut Link, axis: AxisId) -> MountResult<Self> {
        let steps_per_rev = link.query_value(Command::InquireGridPerRevolution, axis)?;
        let timer_freq = link.query_value(Command::InquireTimerInterruptFreq, axis)?;
        let high_speed_ratio = link.query_value(Command::InquireHighSpeedRatio, axis)?;
        if steps_per_rev == 0 || timer_freq == 0 {
            return Err(MountError::Protocol(format!(
                "{axis} reported steps/rev {steps_per_rev}, timer {timer_freq}"
            )));
        }
        Ok(Self {
            steps_per_rev,
            timer_freq,
            high_speed_ratio: high_speed_ratio.max(1),
        })
    }
}

/// Settings of the most recent move, restored after a backlash excursion.
#[derive(Debug, Clone, Copy)]
struct MoveRegisters {
    mode: MotionMode,
    period: u32,
    target: u32,
    brake: u32,
}

/// State machine and command sequencing for one axis.
#[derive(Debug)]
pub struct AxisController {
    axis: AxisId,
    params: AxisParams,
    rates: RateConfig,
    backlash: BacklashConfig,
    status_cache: Duration,
    stop_poll_interval: Duration,
    stop_poll_limit: u32,

    status: AxisStatus,
    status_read_at: Option<Duration>,
    registers: MoveRegisters,
    last_run_direction: Option<Direction>,
    encoder: i64,
}

impl AxisController {
    pub fn new(axis: AxisId, params: AxisParams, config: &MountConfig) -> Self {
        Self {
            axis,
            params,
            rates: config.rates.clone(),
            backlash: config.backlash(axis),
            status_cache: config.status_cache(),
            stop_poll_interval: config.stop_poll_interval(),
            stop_poll_limit: config.stop_poll_limit,
            status: AxisStatus::default(),
            status_read_at: None,
            registers: MoveRegisters {
                mode: AxisStatus::default().mode,
                period: 0,
                target: 0,
                brake: 0,
            },
            last_run_direction: None,
            encoder: 0,
        }
    }

    pub fn axis(&self) -> AxisId {
        self.axis
    }

    pub fn params(&self) -> &AxisParams {
        &self.params
    }

    pub fn steps_per_rev(&self) -> u32 {
        self.params.steps_per_rev
    }

    /// Last status seen, without any I/O.
    pub fn status(&self) -> &AxisStatus {
        &self.status
    }

    /// Last encoder value read, without any I/O.
    pub fn encoder(&self) -> i64 {
        self.encoder
    }

    pub fn set_backlash(&mut self, backlash: BacklashConfig) {
        self.backlash = backlash;
    }

    // ==================== Status ====================

    /// Query the hardware status, bypassing the cache.
    pub fn read_status(&mut self, link: &mut Link) -> MountResult<AxisStatus> {
        let payload = link.command(Command::GetAxisStatus, self.axis)?;
        self.status = AxisStatus::from_payload(&payload)?;
        self.status_read_at = Some(link.clock().elapsed());
        trace!("{} status {:?}", self.axis, self.status);
        Ok(self.status)
    }

    /// Return the cached status if it is fresh enough, otherwise query it.
    pub fn check_status(&mut self, link: &mut Link) -> MountResult<AxisStatus> {
        let now = link.clock().elapsed();
        match self.status_read_at {
            Some(at) if now.saturating_sub(at) <= self.status_cache => Ok(self.status),
            _ => self.read_status(link),
        }
    }

    pub fn is_running(&mut self, link: &mut Link) -> MountResult<bool> {
        Ok(self.check_status(link)?.running)
    }

    // ==================== Registers ====================

    pub fn read_encoder(&mut self, link: &mut Link) -> MountResult<i64> {
        let value = link.query_value(Command::GetAxisPosition, self.axis)?;
        self.encoder = i64::from(value);
        Ok(self.encoder)
    }

    /// Overwrite the encoder register.
    pub fn set_encoder(&mut self, link: &mut Link, value: u32) -> MountResult<()> {
        check_u24("encoder", value)?;
        link.command_with(Command::SetAxisPosition, self.axis, value)?;
        self.encoder = i64::from(value);
        Ok(())
    }

    /// Energise the motor.
    pub fn initialize(&mut self, link: &mut Link) -> MountResult<()> {
        link.command(Command::Initialize, self.axis)?;
        self.status_read_at = None;
        Ok(())
    }

    pub fn set_period(&mut self, link: &mut Link, period: u32) -> MountResult<()> {
        check_u24("step period", period)?;
        link.command_with(Command::SetStepPeriod, self.axis, period)?;
        self.registers.period = period;
        Ok(())
    }

    fn set_target(&mut self, link: &mut Link, steps: u32) -> MountResult<()> {
        check_u24("goto target", steps)?;
        link.command_with(Command::SetGotoTargetIncrement, self.axis, steps)?;
        self.registers.target = steps;
        Ok(())
    }

    fn set_brake(&mut self, link: &mut Link, steps: u32) -> MountResult<()> {
        check_u24("brake point", steps)?;
        link.command_with(Command::SetBreakPointIncrement, self.axis, steps)?;
        self.registers.brake = steps;
        Ok(())
    }

    pub fn set_feature(&mut self, link: &mut Link, feature: Feature) -> MountResult<()> {
        link.command_with(Command::SetFeature, self.axis, feature.code())?;
        Ok(())
    }

    pub fn get_feature(&mut self, link: &mut Link, feature: Feature) -> MountResult<u32> {
        let payload = link.command_with(Command::GetFeature, self.axis, feature.code())?;
        crate::protocol::decode_hex(&payload)
    }

    /// Latched home index value.
    pub fn read_home_index(&mut self, link: &mut Link) -> MountResult<u32> {
        self.get_feature(link, Feature::GetHomeIndex)
    }

    // ==================== Motion ====================

    /// Configure mode, direction and speed.
    ///
    /// If the axis is running and any of them differ, the axis is stopped and
    /// the call blocks until the hardware reports it halted. A running axis
    /// already in `mode` is left alone, since the controller refuses `G` while
    /// moving.
    pub fn set_motion(&mut self, link: &mut Link, mode: MotionMode) -> MountResult<()> {
        let status = self.check_status(link)?;
        if status.running {
            if !status.mode.differs_from(&mode) {
                return Ok(());
            }
            debug!(
                "{} mode change {:?} -> {:?} while running, stopping first",
                self.axis, status.mode, mode
            );
            self.stop_and_wait(link)?;
        }
        link.command_with(
            Command::SetMotionMode,
            self.axis,
            u32::from(mode.to_byte()),
        )?;
        self.status.mode = mode;
        self.registers.mode = mode;
        Ok(())
    }

    /// Step period and speed mode for a rate in sidereal multiples.
    pub fn rate_to_period(&self, rate: f64) -> MountResult<(u32, SpeedMode)> {
        let magnitude = rate.abs();
        if !(self.rates.min_rate..=self.rates.max_rate).contains(&magnitude) {
            return Err(MountError::InvalidParameter(format!(
                "{} rate {rate}x outside [{}, {}]",
                self.axis, self.rates.min_rate, self.rates.max_rate
            )));
        }

        let steps_per_second =
            magnitude * f64::from(self.params.steps_per_rev) / SIDEREAL_DAY_SECONDS;
        let high = magnitude > self.rates.low_speed_limit && self.params.high_speed_ratio > 1;
        let (ticks, speed) = if high {
            (
                f64::from(self.params.timer_freq) * f64::from(self.params.high_speed_ratio),
                SpeedMode::High,
            )
        } else {
            (f64::from(self.params.timer_freq), SpeedMode::Low)
        };

        let period = (ticks / steps_per_second).round();
        if period < 1.0 || period > f64::from(MAX_U24) {
            return Err(MountError::InvalidParameter(format!(
                "{} rate {rate}x needs step period {period}",
                self.axis
            )));
        }
        Ok((period as u32, speed))
    }

    /// Set a continuous slew rate in multiples of sidereal; the sign selects
    /// the direction.
    ///
    /// Does not start the axis. Rejected without any I/O if the rate is out of
    /// range, or if the axis is running a goto or a high speed slew.
    pub fn set_rate(&mut self, link: &mut Link, rate: f64) -> MountResult<()> {
        let (period, speed_mode) = self.rate_to_period(rate)?;
        let status = self.check_status(link)?;
        if status.running
            && (status.mode.slew_mode == SlewMode::Goto || status.mode.speed_mode == SpeedMode::High)
        {
            return Err(MountError::InvalidParameter(format!(
                "{} cannot change rate while running {} at {} speed",
                self.axis, status.mode.slew_mode, status.mode.speed_mode
            )));
        }

        let mode = MotionMode::new(SlewMode::Slew, Direction::from_sign(rate), speed_mode);
        self.set_motion(link, mode)?;
        self.set_period(link, period)?;
        debug!("{} rate {rate}x -> period {period} ({speed_mode})", self.axis);
        Ok(())
    }

    /// Start motion with the configured registers.
    ///
    /// When backlash compensation is enabled and the direction differs from the
    /// previous run, a low-speed excursion of the configured size is run first
    /// and the move registers are restored before the real start.
    pub fn start(&mut self, link: &mut Link) -> MountResult<()> {
        let direction = self.registers.mode.direction;
        let reversing = self
            .last_run_direction
            .is_some_and(|last| last != direction);

        if self.backlash.enabled && self.backlash.steps > 0 && reversing {
            self.take_up_backlash(link, direction)?;
        }

        link.command(Command::StartMotion, self.axis)?;
        self.status.running = true;
        self.last_run_direction = Some(direction);
        Ok(())
    }

    fn take_up_backlash(&mut self, link: &mut Link, direction: Direction) -> MountResult<()> {
        let saved = self.registers;
        debug!(
            "{} direction reversal, taking up {} steps of backlash",
            self.axis, self.backlash.steps
        );

        let mode = MotionMode::new(SlewMode::Goto, direction, SpeedMode::Low);
        self.set_motion(link, mode)?;
        self.set_period(link, self.rates.backlash_period)?;
        self.set_target(link, self.backlash.steps)?;
        self.set_brake(link, 0)?;
        link.command(Command::StartMotion, self.axis)?;
        self.status.running = true;
        self.wait_until_stopped(link)?;

        self.set_motion(link, saved.mode)?;
        self.set_period(link, saved.period)?;
        if saved.mode.slew_mode == SlewMode::Goto {
            self.set_target(link, saved.target)?;
            self.set_brake(link, saved.brake)?;
        }
        Ok(())
    }

    /// Relative goto of `delta` steps.
    ///
    /// Moves longer than the low speed margin run in high speed mode and brake
    /// at least that margin before the target, so the final approach is always
    /// made at low speed.
    pub fn slew_to(&mut self, link: &mut Link, delta: i64, goto: &GotoConfig) -> MountResult<()> {
        if delta == 0 {
            return Ok(());
        }
        let direction = if delta > 0 {
            Direction::Forward
        } else {
            Direction::Backward
        };
        let magnitude = u32::try_from(delta.unsigned_abs())
            .ok()
            .filter(|m| *m <= MAX_U24)
            .ok_or_else(|| {
                MountError::InvalidParameter(format!("{} move of {delta} steps", self.axis))
            })?;

        let high = magnitude > goto.low_speed_margin && self.params.high_speed_ratio > 1;
        let speed = if high { SpeedMode::High } else { SpeedMode::Low };
        let brake = brake_steps(magnitude, speed, goto);

        if self.check_status(link)?.running {
            self.stop_and_wait(link)?;
        }
        debug!(
            "{} slew {delta} steps at {speed} speed, brake {brake}",
            self.axis
        );
        self.set_motion(link, MotionMode::new(SlewMode::Goto, direction, speed))?;
        self.set_period(link, goto.goto_period)?;
        self.set_target(link, magnitude)?;
        self.set_brake(link, brake)?;
        self.start(link)
    }

    /// Decelerate to a stop without waiting.
    pub fn stop(&mut self, link: &mut Link) -> MountResult<()> {
        link.command(Command::NotInstantAxisStop, self.axis)?;
        self.status_read_at = None;
        Ok(())
    }

    /// Stop immediately.
    pub fn instant_stop(&mut self, link: &mut Link) -> MountResult<()> {
        link.command(Command::InstantAxisStop, self.axis)?;
        self.status_read_at = None;
        Ok(())
    }

    /// Decelerate to a stop and block until the hardware reports it halted.
    pub fn stop_and_wait(&mut self, link: &mut Link) -> MountResult<()> {
        self.stop(link)?;
        self.wait_until_stopped(link)
    }

    /// Poll status until the axis is not running.
    pub fn wait_until_stopped(&mut self, link: &mut Link) -> MountResult<()> {
        for _ in 0..self.stop_poll_limit {
            if !self.read_status(link)?.running {
                return Ok(());
            }
            link.clock().sleep(self.stop_poll_interval);
        }
        Err(MountError::Timeout(format!(
            "{} still running after {} polls",
            self.axis, self.stop_poll_limit
        )))
    }
}

/// Brake point for a move of `magnitude` steps.
pub fn brake_steps(magnitude: u32, speed: SpeedMode, goto: &GotoConfig) -> u32 {
    let fraction = (f64::from(magnitude) * goto.brake_fraction).round() as u32;
    match speed {
        SpeedMode::High => fraction.max(goto.low_speed_margin).min(magnitude),
        SpeedMode::Low => fraction.min(goto.max_low_speed_brake),
    }
}

fn check_u24(what: &str, value: u32) -> MountResult<()> {
    if value > MAX_U24 {
        return Err(MountError::InvalidParameter(format!(
            "{what} {value} exceeds 24 bits"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::link::AbortHandle;
    use crate::mock::{MockMount, MockSpec};
    use crate::protocol::Frame;
    use chrono::{TimeZone, Utc};

    fn setup(spec: MockSpec) -> (Link, MockMount, AxisController, MountConfig) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 20, 22, 0, 0).unwrap());
        let mock = MockMount::new(spec, clock.clone());
        let config = MountConfig::default();
        let mut link = Link::new(
            Box::new(mock.clone()),
            Box::new(clock),
            config.read_timeout(),
            AbortHandle::new(),
        );
        let params = AxisParams::inquire(&mut link, AxisId::Ra).unwrap();
        let mut axis = AxisController::new(AxisId::Ra, params, &config);
        axis.initialize(&mut link).unwrap();
        mock.clear_log();
        (link, mock, axis, config)
    }

    fn commands(frames: &[Frame]) -> Vec<Command> {
        frames.iter().map(|f| f.command).collect()
    }

    #[test]
    fn test_inquire_params() {
        let (_link, _mock, axis, _config) = setup(MockSpec::default());
        assert_eq!(axis.params(), &MockSpec::default().axis_params());
    }

    #[test]
    fn test_rate_to_period_sidereal() {
        let (_link, _mock, axis, _config) = setup(MockSpec::default());
        let params = MockSpec::default().axis_params();
        let (period, speed) = axis.rate_to_period(1.0).unwrap();
        let expected = f64::from(params.timer_freq) * SIDEREAL_DAY_SECONDS
            / f64::from(params.steps_per_rev);
        assert_eq!(period, expected.round() as u32);
        assert_eq!(speed, SpeedMode::Low);

        let (_, speed) = axis.rate_to_period(-400.0).unwrap();
        assert_eq!(speed, SpeedMode::High);
    }

    #[test]
    fn test_rate_out_of_range_rejected_without_io() {
        let (mut link, mock, mut axis, _config) = setup(MockSpec::default());
        for rate in [0.0, 0.01, -0.049, 801.0, -1000.0] {
            assert!(matches!(
                axis.set_rate(&mut link, rate),
                Err(MountError::InvalidParameter(_))
            ));
        }
        assert!(mock.frames().is_empty());
    }

    #[test]
    fn test_rate_change_rejected_during_goto() {
        let (mut link, mock, mut axis, config) = setup(MockSpec::default());
        axis.slew_to(&mut link, 500_000, &config.goto).unwrap();
        mock.clear_log();

        let err = axis.set_rate(&mut link, 2.0).unwrap_err();
        assert!(matches!(err, MountError::InvalidParameter(_)));
        assert!(!commands(&mock.frames()).contains(&Command::SetStepPeriod));
        assert!(mock.axis_status(AxisId::Ra).running);
    }

    #[test]
    fn test_set_motion_stops_before_mode_change() {
        let (mut link, mock, mut axis, _config) = setup(MockSpec::default());
        axis.set_rate(&mut link, 1.0).unwrap();
        axis.start(&mut link).unwrap();
        mock.clear_log();

        // Same slew mode and speed, opposite direction.
        axis.set_rate(&mut link, -1.0).unwrap();
        let sent = commands(&mock.frames());
        let stop = sent
            .iter()
            .position(|c| *c == Command::NotInstantAxisStop)
            .expect("stop frame");
        let mode = sent
            .iter()
            .position(|c| *c == Command::SetMotionMode)
            .expect("mode frame");
        assert!(stop < mode, "{sent:?}");
        assert!(!mock.axis_status(AxisId::Ra).running);
    }

    #[test]
    fn test_rate_change_while_running_only_sets_period() {
        let (mut link, mock, mut axis, _config) = setup(MockSpec::default());
        axis.set_rate(&mut link, 1.0).unwrap();
        axis.start(&mut link).unwrap();
        mock.clear_log();

        axis.set_rate(&mut link, 1.5).unwrap();
        assert_eq!(commands(&mock.frames()), vec![Command::SetStepPeriod]);
        let status = mock.axis_status(AxisId::Ra);
        assert!(status.running);
        assert_eq!(status.mode.direction, Direction::Forward);
    }

    #[test]
    fn test_set_motion_idle_sends_no_stop() {
        let (mut link, mock, mut axis, _config) = setup(MockSpec::default());
        axis.set_rate(&mut link, 1.0).unwrap();
        assert!(!commands(&mock.frames()).contains(&Command::NotInstantAxisStop));
    }

    #[test]
    fn test_slew_to_uses_high_speed_for_long_moves() {
        let (mut link, mock, mut axis, config) = setup(MockSpec::default());
        axis.slew_to(&mut link, -1_000_000, &config.goto).unwrap();
        let frames = mock.frames();

        let mode = frames
            .iter()
            .find(|f| f.command == Command::SetMotionMode)
            .and_then(|f| f.argument)
            .unwrap();
        let mode = MotionMode::from_byte(mode as u8).unwrap();
        assert_eq!(mode.slew_mode, SlewMode::Goto);
        assert_eq!(mode.speed_mode, SpeedMode::High);
        assert_eq!(mode.direction, Direction::Backward);

        let brake = frames
            .iter()
            .find(|f| f.command == Command::SetBreakPointIncrement)
            .and_then(|f| f.argument)
            .unwrap();
        assert!(brake >= config.goto.low_speed_margin);
        assert_eq!(commands(&frames).last(), Some(&Command::StartMotion));
    }

    #[test]
    fn test_slew_to_short_move_is_low_speed() {
        let (mut link, mock, mut axis, config) = setup(MockSpec::default());
        axis.slew_to(&mut link, 1_500, &config.goto).unwrap();
        let frames = mock.frames();
        let mode = frames
            .iter()
            .find(|f| f.command == Command::SetMotionMode)
            .and_then(|f| f.argument)
            .unwrap();
        assert_eq!(
            MotionMode::from_byte(mode as u8).unwrap().speed_mode,
            SpeedMode::Low
        );
        let target = frames
            .iter()
            .find(|f| f.command == Command::SetGotoTargetIncrement)
            .and_then(|f| f.argument);
        assert_eq!(target, Some(1_500));
    }

    #[test]
    fn test_brake_steps() {
        let goto = GotoConfig::default();
        assert_eq!(brake_steps(1_000, SpeedMode::Low, &goto), 100);
        assert_eq!(brake_steps(10_000, SpeedMode::Low, &goto), 200);
        assert_eq!(brake_steps(50_000, SpeedMode::High, &goto), 20_000);
        assert_eq!(brake_steps(1_000_000, SpeedMode::High, &goto), 100_000);
    }

    #[test]
    fn test_backlash_excursion_on_reversal() {
        let (mut link, mock, mut axis, config) = setup(MockSpec::default());
        axis.set_backlash(BacklashConfig {
            steps: 800,
            enabled: true,
        });

        axis.slew_to(&mut link, 5_000, &config.goto).unwrap();
        axis.wait_until_stopped(&mut link).unwrap();
        mock.clear_log();

        axis.slew_to(&mut link, -5_000, &config.goto).unwrap();
        let frames = mock.frames();
        let targets: Vec<u32> = frames
            .iter()
            .filter(|f| f.command == Command::SetGotoTargetIncrement)
            .filter_map(|f| f.argument)
            .collect();
        // main target, backlash excursion, restored main target
        assert_eq!(targets, vec![5_000, 800, 5_000]);

        let starts: Vec<usize> = frames
            .iter()
            .enumerate()
            .filter(|(_, f)| f.command == Command::StartMotion)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(starts.len(), 2);

        let periods: Vec<u32> = frames
            .iter()
            .filter(|f| f.command == Command::SetStepPeriod)
            .filter_map(|f| f.argument)
            .collect();
        assert_eq!(
            periods,
            vec![
                config.goto.goto_period,
                config.rates.backlash_period,
                config.goto.goto_period
            ]
        );
    }

    #[test]
    fn test_no_backlash_when_direction_unchanged() {
        let (mut link, mock, mut axis, config) = setup(MockSpec::default());
        axis.set_backlash(BacklashConfig {
            steps: 800,
            enabled: true,
        });
        axis.slew_to(&mut link, 5_000, &config.goto).unwrap();
        axis.wait_until_stopped(&mut link).unwrap();
        mock.clear_log();

        axis.slew_to(&mut link, 3_000, &config.goto).unwrap();
        let starts = mock
            .frames()
            .iter()
            .filter(|f| f.command == Command::StartMotion)
            .count();
        assert_eq!(starts, 1);
    }

    #[test]
    fn test_stop_and_wait_polls_until_halted() {
        let (mut link, mock, mut axis, config) = setup(MockSpec::default());
        axis.slew_to(&mut link, 2_000_000, &config.goto).unwrap();
        axis.stop_and_wait(&mut link).unwrap();
        assert!(!mock.axis_status(AxisId::Ra).running);
        assert!(!axis.status().running);
    }

    #[test]
    fn test_status_cache() {
        let (mut link, mock, mut axis, _config) = setup(MockSpec::default());
        axis.read_status(&mut link).unwrap();
        mock.clear_log();

        axis.check_status(&mut link).unwrap();
        assert!(mock.frames().is_empty());

        link.clock().sleep(Duration::from_millis(600));
        axis.check_status(&mut link).unwrap();
        assert_eq!(commands(&mock.frames()), vec![Command::GetAxisStatus]);
    }
}
