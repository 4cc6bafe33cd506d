//! Shared rig for driver tests against the simulated mount.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use eqmount::coords::range_ha;
use eqmount::mock::{MockMount, MockSpec};
use eqmount::{ManualClock, MountConfig, MountDriver, MountSnapshot};

/// Fixed session start so sidereal time is reproducible.
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 20, 22, 0, 0).unwrap()
}

pub struct Rig {
    pub driver: MountDriver,
    pub mount: MockMount,
    pub clock: ManualClock,
}

impl Rig {
    pub fn connect(config: MountConfig, spec: MockSpec) -> Self {
        let clock = ManualClock::new(start_time());
        let mount = MockMount::new(spec, clock.clone());
        let mut driver = MountDriver::new(config);
        driver
            .connect(Box::new(mount.clone()), Box::new(clock.clone()))
            .expect("connect to mock mount");
        Self {
            driver,
            mount,
            clock,
        }
    }

    pub fn north() -> Self {
        Self::connect(MountConfig::default(), MockSpec::default())
    }

    pub fn south() -> Self {
        let mut config = MountConfig::default();
        config.observer.latitude_deg = -35.3;
        config.observer.longitude_deg = 149.1;
        Self::connect(config, MockSpec::default())
    }

    /// Advance one tick period and poll the driver.
    pub fn tick(&mut self) -> MountSnapshot {
        self.clock.advance(self.driver.config().tick_period());
        self.driver.tick().expect("tick")
    }

    /// Tick until the goto finishes. Returns the final snapshot, the number of
    /// ticks taken and the highest correction count observed.
    pub fn run_goto(&mut self, limit: u32) -> (MountSnapshot, u32, u32) {
        let mut corrections = 0;
        for ticks in 1..=limit {
            let snapshot = self.tick();
            if let Some(params) = self.driver.goto_params() {
                corrections = corrections.max(params.iteration_count);
            }
            if snapshot.goto.is_none() {
                return (snapshot, ticks, corrections);
            }
        }
        panic!("goto did not finish within {limit} ticks");
    }

    /// Sidereal time of the next tick.
    pub fn current_lst(&mut self) -> f64 {
        self.driver.tick().expect("tick").lst
    }
}

/// Hour difference folded into [-12, 12).
pub fn hours_apart(a: f64, b: f64) -> f64 {
    range_ha(a - b).abs()
}
