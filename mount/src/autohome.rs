//! Automatic homing against the home index sensors.
//!
//! The sequence runs one step per tick and only advances once both axes have
//! stopped:
//!
//! ```text
//! Idle -> Confirm -> Phase1 -> Phase2 -> Phase3 -> Phase4 -> Phase5 -> Phase6 -> Idle
//! ```
//!
//! | Phase | Action |
//! |-------|--------|
//! | 1 | Aux encoders off, reset index, read side of home, slew clear of home |
//! | 2 | Slew back any axis whose index changed during phase 1 |
//! | 3 | Reset index, search toward home at the fast rate, settle, stop |
//! | 4 | Reset index, search back across home at the slow rate, latch position |
//! | 5 | Retreat past the latched position |
//! | 6 | Approach the latched position, write the home encoder constants |
//!
//! An unarmed index register reads `0x000000` when the axis is on the positive
//! side of home and `0xFFFFFF` on the negative side. Once the sensor is crossed
//! it holds the encoder value at the crossing.

use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::axis::AxisController;
use crate::config::{AutohomeConfig, GotoConfig};
use crate::coords::degrees_to_steps;
use crate::error::{MountError, MountResult};
use crate::link::Link;
use crate::protocol::{AxisId, Direction, Feature};

/// Index register value on the positive side of home.
pub const INDEX_POSITIVE_SIDE: u32 = 0x000000;

/// Index register value on the negative side of home.
pub const INDEX_NEGATIVE_SIDE: u32 = 0xFFFFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum AutohomeState {
    Idle,
    /// Waiting for the second request.
    Confirm,
    Phase1,
    Phase2,
    Phase3,
    Phase4,
    Phase5,
    Phase6,
}

/// Outcome of one autohome tick.
#[derive(Debug, Clone, PartialEq)]
pub enum AutohomeProgress {
    Idle,
    AwaitingConfirmation { ticks_left: u32 },
    Running(AutohomeState),
    /// Both encoders now read the home constants.
    Completed,
    /// Homing gave up; both axes were stopped.
    Failed(String),
}

/// Why a phase step did not complete.
#[derive(Debug, Error)]
enum HomingError {
    /// The sensors or axes did not behave as homing expects.
    #[error("{0}")]
    Failed(String),
    #[error(transparent)]
    Mount(#[from] MountError),
}

type StepResult<T> = Result<T, HomingError>;

/// Per-axis search bookkeeping.
#[derive(Debug, Clone, Default)]
struct AxisSearch {
    /// Index value read right after the last reset
    baseline: u32,
    /// Direction that leads toward home
    toward_home: Option<Direction>,
    /// Index flipped during the current search
    flipped: bool,
    settle_left: u32,
    /// Encoder position latched by the calibration pass
    home_encoder: Option<u32>,
    /// Direction of the calibration pass
    approach: Option<Direction>,
}

/// Six-phase homing state machine.
#[derive(Debug, Clone)]
pub struct AutohomeSequencer {
    config: AutohomeConfig,
    goto: GotoConfig,
    state: AutohomeState,
    /// Ticks spent in the current state
    ticks: u32,
    entered: bool,
    search: [AxisSearch; 2],
}

impl AutohomeSequencer {
    pub fn new(config: AutohomeConfig, goto: GotoConfig) -> Self {
        Self {
            config,
            goto,
            state: AutohomeState::Idle,
            ticks: 0,
            entered: false,
            search: Default::default(),
        }
    }

    pub fn state(&self) -> AutohomeState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.state, AutohomeState::Idle | AutohomeState::Confirm)
    }

    /// Request homing. The first call arms the confirmation gate; a second
    /// call within the timeout starts phase 1 on the next tick.
    pub fn request(&mut self) -> AutohomeState {
        match self.state {
            AutohomeState::Idle => {
                info!(
                    "Autohome requested, confirm within {} ticks",
                    self.config.confirm_timeout_ticks
                );
                self.enter(AutohomeState::Confirm);
            }
            AutohomeState::Confirm => {
                info!("Autohome confirmed");
                self.search = Default::default();
                self.enter(AutohomeState::Phase1);
            }
            state => debug!("Autohome already running ({state})"),
        }
        self.state
    }

    /// Return to idle without touching the hardware.
    pub fn reset(&mut self) {
        if self.state != AutohomeState::Idle {
            info!("Autohome reset from {}", self.state);
        }
        self.enter(AutohomeState::Idle);
        self.search = Default::default();
    }

    fn enter(&mut self, state: AutohomeState) {
        self.state = state;
        self.ticks = 0;
        self.entered = false;
    }

    fn slot(axis: AxisId) -> usize {
        match axis {
            AxisId::Ra => 0,
            AxisId::Dec => 1,
        }
    }

    /// Run one step of the sequence.
    ///
    /// Unexpected hardware conditions stop both axes and return to idle with
    /// [`AutohomeProgress::Failed`]. Errors from the mount itself, including
    /// rejected commands and parameters, propagate unchanged and leave the
    /// state for the caller to reset.
    pub fn tick(
        &mut self,
        link: &mut Link,
        ra_axis: &mut AxisController,
        dec_axis: &mut AxisController,
    ) -> MountResult<AutohomeProgress> {
        match self.state {
            AutohomeState::Idle => return Ok(AutohomeProgress::Idle),
            AutohomeState::Confirm => {
                self.ticks += 1;
                if self.ticks > self.config.confirm_timeout_ticks {
                    info!("Autohome not confirmed, cancelled");
                    self.enter(AutohomeState::Idle);
                    return Ok(AutohomeProgress::Idle);
                }
                return Ok(AutohomeProgress::AwaitingConfirmation {
                    ticks_left: self.config.confirm_timeout_ticks - self.ticks,
                });
            }
            _ => {}
        }

        match self.step(link, ra_axis, dec_axis) {
            Ok(progress) => Ok(progress),
            Err(HomingError::Failed(reason)) => {
                warn!("Autohome failed in {}: {reason}", self.state);
                ra_axis.instant_stop(link)?;
                dec_axis.instant_stop(link)?;
                self.reset();
                Ok(AutohomeProgress::Failed(reason))
            }
            Err(HomingError::Mount(e)) => Err(e),
        }
    }

    fn step(
        &mut self,
        link: &mut Link,
        ra_axis: &mut AxisController,
        dec_axis: &mut AxisController,
    ) -> StepResult<AutohomeProgress> {
        if !self.entered {
            self.entered = true;
            info!("Autohome {}", self.state);
            for axis in [&mut *ra_axis, &mut *dec_axis] {
                self.begin_phase(link, axis)?;
            }
            return Ok(AutohomeProgress::Running(self.state));
        }

        self.ticks += 1;
        let searching = matches!(self.state, AutohomeState::Phase3 | AutohomeState::Phase4);
        if searching && self.ticks > self.config.search_limit_ticks {
            return Err(HomingError::Failed(format!(
                "index not found within {} ticks",
                self.config.search_limit_ticks
            )));
        }

        let mut done = true;
        for axis in [&mut *ra_axis, &mut *dec_axis] {
            done &= self.poll_phase(link, axis)?;
        }
        if !done {
            return Ok(AutohomeProgress::Running(self.state));
        }

        let next = match self.state {
            AutohomeState::Phase1 => AutohomeState::Phase2,
            AutohomeState::Phase2 => AutohomeState::Phase3,
            AutohomeState::Phase3 => AutohomeState::Phase4,
            AutohomeState::Phase4 => AutohomeState::Phase5,
            AutohomeState::Phase5 => AutohomeState::Phase6,
            _ => {
                for axis in [&mut *ra_axis, &mut *dec_axis] {
                    self.write_home_encoder(link, axis)?;
                }
                info!("Autohome complete");
                self.reset();
                return Ok(AutohomeProgress::Completed);
            }
        };
        self.enter(next);
        self.entered = true;
        info!("Autohome {}", self.state);
        for axis in [&mut *ra_axis, &mut *dec_axis] {
            self.begin_phase(link, axis)?;
        }
        Ok(AutohomeProgress::Running(self.state))
    }

    fn begin_phase(&mut self, link: &mut Link, axis: &mut AxisController) -> StepResult<()> {
        let total = axis.steps_per_rev();
        let id = axis.axis();
        match self.state {
            AutohomeState::Phase1 => {
                axis.set_feature(link, Feature::AuxEncoderOff)?;
                let baseline = reset_index(link, axis)?;
                let toward_home = match baseline {
                    INDEX_POSITIVE_SIDE => Direction::Backward,
                    INDEX_NEGATIVE_SIDE => Direction::Forward,
                    other => {
                        return Err(HomingError::Failed(format!(
                            "{id} index reads 0x{other:06X} right after reset"
                        )))
                    }
                };
                let search = &mut self.search[Self::slot(id)];
                search.baseline = baseline;
                search.toward_home = Some(toward_home);
                let away = toward_home.reversed().sign() * degrees_to_steps(self.config.clearance_deg, total);
                debug!("{id} index reads 0x{baseline:06X}, home is {toward_home}, clearing {away} steps");
                axis.slew_to(link, away, &self.goto)?;
                Ok(())
            }
            AutohomeState::Phase2 => {
                let index = axis.read_home_index(link)?;
                let search = &mut self.search[Self::slot(id)];
                if index == search.baseline {
                    return Ok(());
                }
                let Some(toward_home) = search.toward_home else {
                    return Err(HomingError::Failed(format!("{id} side unknown")));
                };
                // Crossed home while clearing it: the side was misread.
                search.toward_home = Some(toward_home.reversed());
                let back = toward_home.sign() * degrees_to_steps(self.config.clearance_deg, total);
                debug!("{id} index changed while clearing, slewing back {back} steps");
                axis.slew_to(link, back, &self.goto)?;
                Ok(())
            }
            AutohomeState::Phase3 => {
                let baseline = reset_index(link, axis)?;
                let search = &mut self.search[Self::slot(id)];
                let Some(toward_home) = search.toward_home else {
                    return Err(HomingError::Failed(format!("{id} side unknown")));
                };
                search.baseline = baseline;
                search.flipped = false;
                search.settle_left = self.config.settle_ticks;
                let rate = toward_home.sign() as f64 * self.config.fast_rate;
                axis.set_rate(link, rate)?;
                axis.start(link)?;
                Ok(())
            }
            AutohomeState::Phase4 => {
                let baseline = reset_index(link, axis)?;
                let search = &mut self.search[Self::slot(id)];
                let Some(toward_home) = search.toward_home else {
                    return Err(HomingError::Failed(format!("{id} side unknown")));
                };
                let approach = toward_home.reversed();
                search.baseline = baseline;
                search.flipped = false;
                search.approach = Some(approach);
                let rate = approach.sign() as f64 * self.config.slow_rate;
                axis.set_rate(link, rate)?;
                axis.start(link)?;
                Ok(())
            }
            AutohomeState::Phase5 => {
                let (home, approach) = self.latched(id)?;
                let retreat = approach.reversed().sign() * degrees_to_steps(self.config.retreat_deg, total);
                let current = axis.read_encoder(link)?;
                axis.slew_to(link, i64::from(home) + retreat - current, &self.goto)?;
                Ok(())
            }
            AutohomeState::Phase6 => {
                let (home, _) = self.latched(id)?;
                let current = axis.read_encoder(link)?;
                axis.slew_to(link, i64::from(home) - current, &self.goto)?;
                Ok(())
            }
            AutohomeState::Idle | AutohomeState::Confirm => Ok(()),
        }
    }

    /// Returns true once this axis has finished the current phase.
    fn poll_phase(&mut self, link: &mut Link, axis: &mut AxisController) -> StepResult<bool> {
        let id = axis.axis();
        let status = axis.read_status(link)?;
        if status.blocked {
            return Err(HomingError::Failed(format!("{id} axis blocked")));
        }

        match self.state {
            AutohomeState::Phase3 => {
                let search = &self.search[Self::slot(id)];
                if search.flipped && !status.running {
                    return Ok(true);
                }
                self.expect_running(id, status.running)?;
                let index = axis.read_home_index(link)?;
                let search = &mut self.search[Self::slot(id)];
                if !search.flipped && index != search.baseline {
                    debug!("{id} index flipped at 0x{index:06X}, settling");
                    search.flipped = true;
                } else if search.flipped {
                    if search.settle_left > 0 {
                        search.settle_left -= 1;
                    } else {
                        axis.stop_and_wait(link)?;
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            AutohomeState::Phase4 => {
                if self.search[Self::slot(id)].home_encoder.is_some() {
                    return Ok(!status.running);
                }
                self.expect_running(id, status.running)?;
                let index = axis.read_home_index(link)?;
                let search = &mut self.search[Self::slot(id)];
                if index != search.baseline {
                    axis.instant_stop(link)?;
                    info!("{id} home index at encoder 0x{index:06X}");
                    search.flipped = true;
                    search.home_encoder = Some(index);
                }
                Ok(false)
            }
            _ => Ok(!status.running),
        }
    }

    fn expect_running(&self, axis: AxisId, running: bool) -> StepResult<()> {
        if running {
            Ok(())
        } else {
            Err(HomingError::Failed(format!(
                "{axis} stopped before its index flipped"
            )))
        }
    }

    fn latched(&self, axis: AxisId) -> StepResult<(u32, Direction)> {
        let search = &self.search[Self::slot(axis)];
        match (search.home_encoder, search.approach) {
            (Some(home), Some(approach)) => Ok((home, approach)),
            _ => Err(HomingError::Failed(format!(
                "{axis} home index was never latched"
            ))),
        }
    }

    fn write_home_encoder(&self, link: &mut Link, axis: &mut AxisController) -> MountResult<()> {
        let value = match axis.axis() {
            AxisId::Ra => self.config.home_encoder_ra,
            AxisId::Dec => self.config.home_encoder_dec,
        };
        axis.set_encoder(link, value)?;
        axis.set_feature(link, Feature::AuxEncoderOn)?;
        Ok(())
    }
}

/// Reset the index latch and return the side-of-home reading.
fn reset_index(link: &mut Link, axis: &mut AxisController) -> MountResult<u32> {
    axis.set_feature(link, Feature::ResetHomeIndex)?;
    axis.read_home_index(link)
}
