//! Closed-loop goto.
//!
//! A goto is planned once and then corrected: the first slew is computed open
//! loop, and on each tick after both axes stop the remaining error is measured
//! from the encoders. Errors beyond the tolerance get a fresh, small relative
//! slew, up to `max_iterations` corrections. The pier side chosen for the first
//! slew is kept for every correction.
//!
//! Targets are computed for the sidereal time one lead interval ahead, which is
//! when the next tick will measure the result. An RA axis that is parked after
//! a slew therefore lands on the target at the moment it is checked.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::axis::AxisController;
use crate::config::GotoConfig;
use crate::coords::{range_ha, steps_to_arcsec, MountGeometry, PierSide};
use crate::error::MountResult;
use crate::link::Link;

/// Encoder targets for one sky position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisTargets {
    pub pier_side: PierSide,
    pub ra_encoder: i64,
    pub dec_encoder: i64,
}

/// State of one goto, from request to completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GotoParams {
    /// Requested position in the mount frame, hours and degrees
    pub target_ra: f64,
    pub target_dec: f64,
    /// Position at the last measurement
    pub current_ra: f64,
    pub current_dec: f64,
    pub target_encoder_ra: i64,
    pub target_encoder_dec: i64,
    pub current_encoder_ra: i64,
    pub current_encoder_dec: i64,
    /// Corrective slews issued after the first
    pub iteration_count: u32,
    pub pier_side: PierSide,
    pub force_counterweight_up: bool,
    pub check_limits: bool,
    pub completed: bool,
    /// Whether the final measurement was within tolerance
    pub within_tolerance: bool,
}

/// Outcome of one goto tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GotoProgress {
    /// At least one axis is still moving.
    Slewing,
    /// A corrective slew was issued.
    Correcting { iteration: u32 },
    /// Finished; `within_tolerance` is false if the iteration ceiling was hit.
    Completed { within_tolerance: bool },
}

/// Computes encoder targets and drives the iterative correction.
#[derive(Debug, Clone)]
pub struct GotoPlanner {
    config: GotoConfig,
    geometry: MountGeometry,
}

impl GotoPlanner {
    pub fn new(config: GotoConfig, geometry: MountGeometry) -> Self {
        Self { config, geometry }
    }

    pub fn geometry(&self) -> &MountGeometry {
        &self.geometry
    }

    pub fn config(&self) -> &GotoConfig {
        &self.config
    }

    /// Lead time in sidereal hours.
    fn lead_hours(&self) -> f64 {
        self.config.lead_time_ms as f64 / 3_600_000.0 * crate::axis::SIDEREAL_RATE_ARCSEC / 15.0
    }

    /// Pier side for a target at hour angle `lst - ra`.
    ///
    /// Targets east of the meridian use the west side, which keeps the
    /// counterweight below the axis. Southern mounts need no special case here
    /// because the encoder conversion mirrors both axes.
    pub fn choose_pier_side(&self, ra: f64, lst: f64, force_counterweight_up: bool) -> PierSide {
        let hour_angle = range_ha(lst - ra);
        let side = if hour_angle < 0.0 {
            PierSide::West
        } else {
            PierSide::East
        };
        if force_counterweight_up {
            side.flipped()
        } else {
            side
        }
    }

    /// Largest RA offset from the zero reference allowed for
    /// counterweight-up targets.
    pub fn ra_limit_steps(&self) -> i64 {
        let total = i64::from(self.geometry.ra_total);
        total / 4 + total / 24
    }

    pub fn within_ra_limits(&self, ra_encoder: i64) -> bool {
        self.geometry.ra_offset(ra_encoder).abs() <= self.ra_limit_steps()
    }

    /// Encoder targets for `(ra, dec)` at sidereal time `lst`.
    pub fn plan(
        &self,
        ra: f64,
        dec: f64,
        lst: f64,
        force_counterweight_up: bool,
        check_limits: bool,
    ) -> AxisTargets {
        let pier_side = self.choose_pier_side(ra, lst, force_counterweight_up);
        let targets = self.targets_on(ra, dec, lst, pier_side);

        if force_counterweight_up && check_limits && !self.within_ra_limits(targets.ra_encoder) {
            let flipped = self.targets_on(ra, dec, lst, pier_side.flipped());
            debug!(
                "RA target {} outside cable-wrap window, using {} pier",
                targets.ra_encoder, flipped.pier_side
            );
            return flipped;
        }
        targets
    }

    pub fn targets_on(&self, ra: f64, dec: f64, lst: f64, pier_side: PierSide) -> AxisTargets {
        let (ra_encoder, dec_encoder) = self.geometry.encoders_for(ra, dec, lst, pier_side);
        AxisTargets {
            pier_side,
            ra_encoder,
            dec_encoder,
        }
    }

    /// True if both axes are within tolerance of the targets.
    pub fn within_tolerance(&self, targets: &AxisTargets, ra_encoder: i64, dec_encoder: i64) -> bool {
        let ra_error = steps_to_arcsec(targets.ra_encoder - ra_encoder, self.geometry.ra_total);
        let dec_error = steps_to_arcsec(targets.dec_encoder - dec_encoder, self.geometry.dec_total);
        ra_error.abs() <= self.config.ra_tolerance_arcsec
            && dec_error.abs() <= self.config.dec_tolerance_arcsec
    }

    /// Stop both axes and issue the first slew toward `(ra, dec)`.
    pub fn start(
        &self,
        link: &mut Link,
        ra_axis: &mut AxisController,
        dec_axis: &mut AxisController,
        ra: f64,
        dec: f64,
        lst: f64,
    ) -> MountResult<GotoParams> {
        ra_axis.stop_and_wait(link)?;
        dec_axis.stop_and_wait(link)?;

        let ra_encoder = ra_axis.read_encoder(link)?;
        let dec_encoder = dec_axis.read_encoder(link)?;
        let current = self.geometry.sky_position(ra_encoder, dec_encoder, lst);

        let targets = self.plan(
            ra,
            dec,
            lst + self.lead_hours(),
            self.config.force_counterweight_up,
            self.config.check_limits,
        );
        info!(
            "Goto RA {:.4}h Dec {:.4} on {} pier, encoders {} / {}",
            ra, dec, targets.pier_side, targets.ra_encoder, targets.dec_encoder
        );

        ra_axis.slew_to(link, targets.ra_encoder - ra_encoder, &self.config)?;
        dec_axis.slew_to(link, targets.dec_encoder - dec_encoder, &self.config)?;

        Ok(GotoParams {
            target_ra: ra,
            target_dec: dec,
            current_ra: current.ra,
            current_dec: current.dec,
            target_encoder_ra: targets.ra_encoder,
            target_encoder_dec: targets.dec_encoder,
            current_encoder_ra: ra_encoder,
            current_encoder_dec: dec_encoder,
            iteration_count: 0,
            pier_side: targets.pier_side,
            force_counterweight_up: self.config.force_counterweight_up,
            check_limits: self.config.check_limits,
            completed: false,
            within_tolerance: false,
        })
    }

    /// Advance a goto by one tick.
    ///
    /// Does nothing while either axis runs. Once both are stopped the error is
    /// measured against the target for the current sidereal time.
    pub fn tick(
        &self,
        params: &mut GotoParams,
        link: &mut Link,
        ra_axis: &mut AxisController,
        dec_axis: &mut AxisController,
        lst: f64,
    ) -> MountResult<GotoProgress> {
        if params.completed {
            return Ok(GotoProgress::Completed {
                within_tolerance: params.within_tolerance,
            });
        }
        if ra_axis.read_status(link)?.running || dec_axis.read_status(link)?.running {
            return Ok(GotoProgress::Slewing);
        }

        let ra_encoder = ra_axis.read_encoder(link)?;
        let dec_encoder = dec_axis.read_encoder(link)?;
        let current = self.geometry.sky_position(ra_encoder, dec_encoder, lst);
        params.current_encoder_ra = ra_encoder;
        params.current_encoder_dec = dec_encoder;
        params.current_ra = current.ra;
        params.current_dec = current.dec;

        let now = self.targets_on(params.target_ra, params.target_dec, lst, params.pier_side);
        if self.within_tolerance(&now, ra_encoder, dec_encoder) {
            info!(
                "Goto complete after {} corrections",
                params.iteration_count
            );
            params.completed = true;
            params.within_tolerance = true;
            return Ok(GotoProgress::Completed {
                within_tolerance: true,
            });
        }

        if params.iteration_count >= self.config.max_iterations {
            warn!(
                "Goto stopped after {} corrections, error RA {:.1}\" Dec {:.1}\"",
                params.iteration_count,
                steps_to_arcsec(now.ra_encoder - ra_encoder, self.geometry.ra_total),
                steps_to_arcsec(now.dec_encoder - dec_encoder, self.geometry.dec_total),
            );
            params.completed = true;
            return Ok(GotoProgress::Completed {
                within_tolerance: false,
            });
        }

        let next = self.targets_on(
            params.target_ra,
            params.target_dec,
            lst + self.lead_hours(),
            params.pier_side,
        );
        params.iteration_count += 1;
        params.target_encoder_ra = next.ra_encoder;
        params.target_encoder_dec = next.dec_encoder;
        debug!(
            "Goto correction {}: RA {} steps, Dec {} steps",
            params.iteration_count,
            next.ra_encoder - ra_encoder,
            next.dec_encoder - dec_encoder
        );
        ra_axis.slew_to(link, next.ra_encoder - ra_encoder, &self.config)?;
        dec_axis.slew_to(link, next.dec_encoder - dec_encoder, &self.config)?;
        Ok(GotoProgress::Correcting {
            iteration: params.iteration_count,
        })
    }
}
