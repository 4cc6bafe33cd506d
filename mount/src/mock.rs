//! Simulated motor controller.
//!
//! [`MockMount`] implements [`Transport`] by decoding each frame and answering
//! from a small time-based motion model of both axes. Time comes from a shared
//! [`Clock`], so with a [`ManualClock`](crate::clock::ManualClock) a test
//! controls exactly how far the axes move between commands.
//!
//! Model details:
//! - Axes move at `timer_freq / period` steps per second (times the high speed
//!   ratio in high speed mode) and stop instantly on `K` or `L`.
//! - Goto moves fall short of their target by `goto_shortfall` of the distance.
//! - Each axis has a home index sensor at a fixed physical position. While
//!   armed it reads `0x000000` above the sensor and `0xFFFFFF` below it; the
//!   first crossing latches the encoder reading at the sensor.
//! - Every decoded frame is logged for sequencing assertions.
//! - Commands can be made to fail with a chosen `!` code to exercise error
//!   paths.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::axis::AxisParams;
use crate::clock::Clock;
use crate::protocol::{
    encode_u24, AxisId, AxisStatus, Command, Feature, Frame, MotionMode, Reply, SlewMode,
    SpeedMode, MAX_U24,
};
use crate::transport::Transport;

const NOT_STOPPED: u8 = 2;
const NOT_INITIALIZED: u8 = 4;

/// Static description of the simulated mount.
#[derive(Debug, Clone, PartialEq)]
pub struct MockSpec {
    pub mount_code: u8,
    pub firmware_version: u16,
    pub steps_per_rev: u32,
    pub timer_freq: u32,
    pub high_speed_ratio: u32,
    /// Whether the motors report initialized at power-on
    pub initialized: bool,
    /// Encoder readings at power-on, RA then DEC
    pub start_encoder: [u32; 2],
    /// Physical position of the home index sensor, RA then DEC
    pub home_position: [Option<u32>; 2],
    /// Fraction of each goto distance left untravelled
    pub goto_shortfall: f64,
    pub feature_bits: u32,
}

impl Default for MockSpec {
    /// An EQ6-class mount with a fast step timer, so that moves complete
    /// within a few simulated ticks.
    fn default() -> Self {
        let steps_per_rev = 9_024_000;
        Self {
            mount_code: 0x00,
            firmware_version: 0x0312,
            steps_per_rev,
            timer_freq: 16_000_000,
            high_speed_ratio: 64,
            initialized: false,
            start_encoder: [0x800000, 0x800000 + steps_per_rev / 4],
            home_position: [Some(0x800000), Some(0x800000 + steps_per_rev / 4)],
            goto_shortfall: 0.0,
            feature_bits: 0x000003,
        }
    }
}

impl MockSpec {
    pub fn axis_params(&self) -> AxisParams {
        AxisParams {
            steps_per_rev: self.steps_per_rev,
            timer_freq: self.timer_freq,
            high_speed_ratio: self.high_speed_ratio,
        }
    }
}

#[derive(Debug)]
struct MockAxis {
    /// Physical position in steps
    position: f64,
    /// Encoder reading minus physical position
    encoder_offset: f64,
    initialized: bool,
    running: bool,
    mode: MotionMode,
    period: u32,
    target: u32,
    brake: u32,
    remaining: f64,
    home: Option<f64>,
    index_latch: Option<u32>,
    aux_encoder: bool,
}

impl MockAxis {
    fn new(start: u32, home: Option<u32>, initialized: bool) -> Self {
        Self {
            position: f64::from(start),
            encoder_offset: 0.0,
            initialized,
            running: false,
            mode: AxisStatus::default().mode,
            period: 0,
            target: 0,
            brake: 0,
            remaining: 0.0,
            home: home.map(f64::from),
            index_latch: None,
            aux_encoder: true,
        }
    }

    fn encoder(&self) -> f64 {
        self.position + self.encoder_offset
    }

    fn encoder_word(&self) -> u32 {
        (self.encoder().round() as i64 & i64::from(MAX_U24)) as u32
    }

    fn steps_per_second(&self, spec: &MockSpec) -> f64 {
        if self.period == 0 {
            return 0.0;
        }
        let ratio = match self.mode.speed_mode {
            SpeedMode::High => f64::from(spec.high_speed_ratio),
            SpeedMode::Low => 1.0,
        };
        f64::from(spec.timer_freq) * ratio / f64::from(self.period)
    }

    fn advance(&mut self, dt: f64, spec: &MockSpec) {
        if !self.running || dt <= 0.0 {
            return;
        }
        let travel = self.steps_per_second(spec) * dt;
        let sign = self.mode.direction.sign() as f64;
        let moved = match self.mode.slew_mode {
            SlewMode::Slew => travel,
            SlewMode::Goto => {
                let moved = travel.min(self.remaining);
                self.remaining -= moved;
                if self.remaining <= 0.0 {
                    self.running = false;
                }
                moved
            }
        };
        let next = self.position + sign * moved;
        self.latch_crossing(next);
        self.position = next;
    }

    fn latch_crossing(&mut self, next: f64) {
        let Some(home) = self.home else {
            return;
        };
        if self.index_latch.is_none() && next != self.position {
            let crossed = (self.position - home) * (next - home) <= 0.0;
            if crossed {
                let reading = (home + self.encoder_offset).round() as i64;
                self.index_latch = Some((reading & i64::from(MAX_U24)) as u32);
            }
        }
    }

    fn index_value(&self) -> u32 {
        match (self.index_latch, self.home) {
            (Some(latch), _) => latch,
            (None, Some(home)) if self.position > home => 0x000000,
            _ => 0xFFFFFF,
        }
    }

    fn status(&self) -> AxisStatus {
        AxisStatus {
            initialized: self.initialized,
            running: self.running,
            blocked: false,
            mode: self.mode,
        }
    }
}

#[derive(Debug)]
struct MockState {
    spec: MockSpec,
    axes: [MockAxis; 2],
    last_update: Duration,
    pending: VecDeque<Vec<u8>>,
    frames: Vec<Frame>,
    /// Commands answered with `!code` regardless of state
    rejections: Vec<(Command, u8)>,
    unplugged: bool,
    silent: bool,
}

impl MockState {
    fn axis_mut(&mut self, axis: AxisId) -> &mut MockAxis {
        &mut self.axes[index(axis)]
    }

    fn update(&mut self, now: Duration) {
        let dt = now.saturating_sub(self.last_update).as_secs_f64();
        self.last_update = now;
        let spec = &self.spec;
        for axis in self.axes.iter_mut() {
            axis.advance(dt, spec);
        }
    }

    fn handle(&mut self, frame: &Frame) -> Reply {
        let spec = self.spec.clone();
        let arg = frame.argument.unwrap_or(0);
        let ok = |value: u32| Reply::Ok(encode_u24(value).to_vec());
        let done = Reply::Ok(Vec::new());

        if let Some((_, code)) = self.rejections.iter().find(|(c, _)| *c == frame.command) {
            return Reply::Rejected(Some(*code));
        }
        let axis = self.axis_mut(frame.axis);

        match frame.command {
            Command::Initialize => {
                axis.initialized = true;
                done
            }
            Command::InquireMotorBoardVersion => {
                ok((u32::from(spec.firmware_version) << 8) | u32::from(spec.mount_code))
            }
            Command::InquireGridPerRevolution => ok(spec.steps_per_rev),
            Command::InquireTimerInterruptFreq => ok(spec.timer_freq),
            Command::InquireHighSpeedRatio => ok(spec.high_speed_ratio),
            Command::InstantAxisStop | Command::NotInstantAxisStop => {
                axis.running = false;
                axis.remaining = 0.0;
                done
            }
            Command::SetAxisPosition => {
                if axis.running {
                    return Reply::Rejected(Some(NOT_STOPPED));
                }
                axis.encoder_offset = f64::from(arg) - axis.position;
                done
            }
            Command::GetAxisPosition => ok(axis.encoder_word()),
            Command::GetAxisStatus => Reply::Ok(axis.status().to_payload().to_vec()),
            Command::SetMotionMode => {
                if axis.running {
                    return Reply::Rejected(Some(NOT_STOPPED));
                }
                match MotionMode::from_byte(arg as u8) {
                    Ok(mode) => {
                        axis.mode = mode;
                        done
                    }
                    Err(_) => Reply::Rejected(Some(3)),
                }
            }
            Command::SetGotoTargetIncrement => {
                if axis.running {
                    return Reply::Rejected(Some(NOT_STOPPED));
                }
                axis.target = arg;
                done
            }
            Command::SetBreakPointIncrement => {
                axis.brake = arg;
                done
            }
            Command::SetStepPeriod => {
                axis.period = arg;
                done
            }
            Command::StartMotion => {
                if !axis.initialized {
                    return Reply::Rejected(Some(NOT_INITIALIZED));
                }
                if !axis.running {
                    match axis.mode.slew_mode {
                        SlewMode::Goto => {
                            axis.remaining = f64::from(axis.target) * (1.0 - spec.goto_shortfall);
                            axis.running = axis.remaining > 0.0;
                        }
                        SlewMode::Slew => axis.running = true,
                    }
                }
                done
            }
            Command::GetStepPeriod => ok(axis.period),
            Command::SetFeature => match Feature::from_code(arg) {
                Some(Feature::ResetHomeIndex) => {
                    axis.index_latch = None;
                    done
                }
                Some(Feature::AuxEncoderOn) => {
                    axis.aux_encoder = true;
                    done
                }
                Some(Feature::AuxEncoderOff) => {
                    axis.aux_encoder = false;
                    done
                }
                _ => Reply::Rejected(Some(0)),
            },
            Command::GetFeature => match Feature::from_code(arg) {
                Some(Feature::GetHomeIndex) => ok(axis.index_value()),
                Some(Feature::GetFeatures) => ok(spec.feature_bits),
                _ => Reply::Rejected(Some(0)),
            },
        }
    }
}

fn index(axis: AxisId) -> usize {
    match axis {
        AxisId::Ra => 0,
        AxisId::Dec => 1,
    }
}

/// Simulated mount. Clones share the same hardware state.
#[derive(Clone)]
pub struct MockMount {
    state: Arc<Mutex<MockState>>,
    clock: Arc<dyn Clock + Sync>,
}

impl std::fmt::Debug for MockMount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockMount")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl MockMount {
    pub fn new(spec: MockSpec, clock: impl Clock + Sync + 'static) -> Self {
        let axes = [
            MockAxis::new(spec.start_encoder[0], spec.home_position[0], spec.initialized),
            MockAxis::new(spec.start_encoder[1], spec.home_position[1], spec.initialized),
        ];
        let last_update = clock.elapsed();
        Self {
            state: Arc::new(Mutex::new(MockState {
                spec,
                axes,
                last_update,
                pending: VecDeque::new(),
                frames: Vec::new(),
                rejections: Vec::new(),
                unplugged: false,
                silent: false,
            })),
            clock: Arc::new(clock),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn updated(&self) -> MutexGuard<'_, MockState> {
        let now = self.clock.elapsed();
        let mut state = self.lock();
        state.update(now);
        state
    }

    /// Frames received since the last [`clear_log`](Self::clear_log).
    pub fn frames(&self) -> Vec<Frame> {
        self.lock().frames.clone()
    }

    pub fn clear_log(&self) {
        self.lock().frames.clear();
    }

    pub fn axis_status(&self, axis: AxisId) -> AxisStatus {
        self.updated().axes[index(axis)].status()
    }

    /// Current encoder reading, unrounded.
    pub fn encoder(&self, axis: AxisId) -> f64 {
        self.updated().axes[index(axis)].encoder()
    }

    /// Current physical position, unaffected by encoder overwrites.
    pub fn physical_position(&self, axis: AxisId) -> f64 {
        self.updated().axes[index(axis)].position
    }

    /// Move an axis by hand (clutch released), without crossing detection.
    pub fn set_physical_position(&self, axis: AxisId, position: f64) {
        self.updated().axis_mut(axis).position = position;
    }

    pub fn aux_encoder_enabled(&self, axis: AxisId) -> bool {
        self.lock().axes[index(axis)].aux_encoder
    }

    pub fn set_goto_shortfall(&self, fraction: f64) {
        self.lock().spec.goto_shortfall = fraction;
    }

    /// Answer every later `command` frame with `!code`.
    pub fn reject(&self, command: Command, code: u8) {
        self.lock().rejections.push((command, code));
    }

    pub fn clear_rejections(&self) {
        self.lock().rejections.clear();
    }

    /// Make every subsequent write fail as if the cable was pulled.
    pub fn unplug(&self) {
        self.lock().unplugged = true;
    }

    /// Accept frames but never reply.
    pub fn set_silent(&self, silent: bool) {
        self.lock().silent = silent;
    }
}

impl Transport for MockMount {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut state = self.updated();
        if state.unplugged {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "mock mount unplugged",
            ));
        }
        let reply = match Frame::decode(bytes) {
            Ok(frame) => {
                state.frames.push(frame.clone());
                state.handle(&frame)
            }
            Err(_) => Reply::Rejected(Some(1)),
        };
        if !state.silent {
            state.pending.push_back(reply.encode());
        }
        Ok(())
    }

    fn read_until(&mut self, _terminator: u8, timeout: Duration) -> io::Result<Vec<u8>> {
        let reply = self.lock().pending.pop_front();
        match reply {
            Some(reply) => Ok(reply),
            None => {
                self.clock.sleep(timeout);
                Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "no reply from mock mount",
                ))
            }
        }
    }

    fn clear_input(&mut self) -> io::Result<()> {
        self.lock().pending.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::protocol::Direction;
    use chrono::{TimeZone, Utc};

    fn mock(spec: MockSpec) -> (MockMount, ManualClock) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        (MockMount::new(spec, clock.clone()), clock)
    }

    fn send(mount: &mut MockMount, frame: Frame) -> Reply {
        mount.write(&frame.encode().unwrap()).unwrap();
        let raw = mount
            .read_until(b'\r', Duration::from_millis(100))
            .unwrap();
        Reply::decode(&raw).unwrap()
    }

    #[test]
    fn test_start_requires_initialize() {
        let (mut mount, _clock) = mock(MockSpec::default());
        let reply = send(&mut mount, Frame::new(Command::StartMotion, AxisId::Ra));
        assert_eq!(reply, Reply::Rejected(Some(NOT_INITIALIZED)));

        send(&mut mount, Frame::new(Command::Initialize, AxisId::Ra));
        let reply = send(&mut mount, Frame::new(Command::StartMotion, AxisId::Ra));
        assert_eq!(reply, Reply::Ok(Vec::new()));
    }

    #[test]
    fn test_goto_completes_with_shortfall() {
        let spec = MockSpec {
            initialized: true,
            goto_shortfall: 0.01,
            ..MockSpec::default()
        };
        let (mut mount, clock) = mock(spec);
        let mode = MotionMode::new(SlewMode::Goto, Direction::Forward, SpeedMode::Low);
        send(
            &mut mount,
            Frame::with_argument(Command::SetMotionMode, AxisId::Dec, u32::from(mode.to_byte())),
        );
        send(&mut mount, Frame::with_argument(Command::SetStepPeriod, AxisId::Dec, 18));
        send(
            &mut mount,
            Frame::with_argument(Command::SetGotoTargetIncrement, AxisId::Dec, 10_000),
        );
        let start = mount.encoder(AxisId::Dec);
        send(&mut mount, Frame::new(Command::StartMotion, AxisId::Dec));
        assert!(mount.axis_status(AxisId::Dec).running);

        clock.advance(Duration::from_secs(1));
        assert!(!mount.axis_status(AxisId::Dec).running);
        assert!((mount.encoder(AxisId::Dec) - start - 9_900.0).abs() < 1e-6);
    }

    #[test]
    fn test_mode_change_while_running_rejected() {
        let spec = MockSpec {
            initialized: true,
            ..MockSpec::default()
        };
        let (mut mount, _clock) = mock(spec);
        send(&mut mount, Frame::with_argument(Command::SetStepPeriod, AxisId::Ra, 1000));
        send(&mut mount, Frame::new(Command::StartMotion, AxisId::Ra));
        let reply = send(
            &mut mount,
            Frame::with_argument(Command::SetMotionMode, AxisId::Ra, 0x11),
        );
        assert_eq!(reply, Reply::Rejected(Some(NOT_STOPPED)));
    }

    #[test]
    fn test_home_index_latches_on_crossing() {
        let spec = MockSpec {
            initialized: true,
            ..MockSpec::default()
        };
        let (mut mount, clock) = mock(spec);
        let home = f64::from(0x800000u32);
        mount.set_physical_position(AxisId::Ra, home + 5_000.0);

        let index = Frame::with_argument(Command::GetFeature, AxisId::Ra, Feature::GetHomeIndex.code());
        assert_eq!(send(&mut mount, index.clone()).value().unwrap(), 0x000000);

        let backward = MotionMode::new(SlewMode::Slew, Direction::Backward, SpeedMode::Low);
        send(
            &mut mount,
            Frame::with_argument(Command::SetMotionMode, AxisId::Ra, u32::from(backward.to_byte())),
        );
        send(&mut mount, Frame::with_argument(Command::SetStepPeriod, AxisId::Ra, 1600));
        send(&mut mount, Frame::new(Command::StartMotion, AxisId::Ra));
        clock.advance(Duration::from_secs(1));
        send(&mut mount, Frame::new(Command::InstantAxisStop, AxisId::Ra));

        assert_eq!(send(&mut mount, index.clone()).value().unwrap(), 0x800000);

        send(
            &mut mount,
            Frame::with_argument(Command::SetFeature, AxisId::Ra, Feature::ResetHomeIndex.code()),
        );
        assert_eq!(send(&mut mount, index).value().unwrap(), 0xFFFFFF);
    }

    #[test]
    fn test_injected_rejection() {
        let (mut mount, _clock) = mock(MockSpec::default());
        mount.reject(Command::SetGotoTargetIncrement, 3);
        let reply = send(
            &mut mount,
            Frame::with_argument(Command::SetGotoTargetIncrement, AxisId::Dec, 100),
        );
        assert_eq!(reply, Reply::Rejected(Some(3)));
        assert_eq!(mount.frames().len(), 1);

        mount.clear_rejections();
        let reply = send(
            &mut mount,
            Frame::with_argument(Command::SetGotoTargetIncrement, AxisId::Dec, 100),
        );
        assert_eq!(reply, Reply::Ok(Vec::new()));
    }

    #[test]
    fn test_unplugged_write_fails() {
        let (mut mount, _clock) = mock(MockSpec::default());
        mount.unplug();
        let bytes = Frame::new(Command::GetAxisStatus, AxisId::Ra).encode().unwrap();
        assert_eq!(
            mount.write(&bytes).unwrap_err().kind(),
            io::ErrorKind::BrokenPipe
        );
    }
}
