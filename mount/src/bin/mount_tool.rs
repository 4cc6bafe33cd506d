//! Command line tool for Skywatcher equatorial mounts.
//!
//! Subcommands:
//! - `info`: Handshake and print model, firmware and axis calibration
//! - `status`: Print the current position once
//! - `goto`: Slew to RA/Dec and wait for the goto to finish
//! - `sync`: Declare the current pointing
//! - `track`: Start tracking at a preset rate
//! - `park` / `unpark`
//! - `home`: Run the autohome sequence
//! - `repl`: Raw frame REPL (e.g. `:f1`, `:j2`)
//!
//! `--simulate` replaces the serial port with the built-in mock mount.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use eqmount::mock::{MockMount, MockSpec};
use eqmount::{
    AutohomeState, MountConfig, MountDriver, MountSnapshot, SerialTransport, SystemClock,
    TrackRate, DEFAULT_BAUD,
};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::info;

/// Ticks allowed for a goto or park before giving up
const MAX_WAIT_TICKS: u32 = 600;

/// Skywatcher mount control tool
#[derive(Parser, Debug)]
#[command(name = "mount_tool")]
#[command(about = "Control a Skywatcher-protocol equatorial mount")]
#[command(version)]
struct Args {
    /// Serial port of the mount
    #[arg(long, global = true, default_value = "/dev/ttyUSB0")]
    port: String,

    /// Baud rate
    #[arg(long, global = true, default_value_t = DEFAULT_BAUD)]
    baud: u32,

    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Observer latitude in degrees (overrides the config file)
    #[arg(long, global = true, allow_negative_numbers = true)]
    latitude: Option<f64>,

    /// Observer longitude in degrees, east positive (overrides the config file)
    #[arg(long, global = true, allow_negative_numbers = true)]
    longitude: Option<f64>,

    /// Use the simulated mount instead of the serial port
    #[arg(long, global = true)]
    simulate: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RateArg {
    Sidereal,
    Lunar,
    Solar,
}

impl From<RateArg> for TrackRate {
    fn from(rate: RateArg) -> Self {
        match rate {
            RateArg::Sidereal => TrackRate::Sidereal,
            RateArg::Lunar => TrackRate::Lunar,
            RateArg::Solar => TrackRate::Solar,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print mount model, firmware and calibration
    Info,

    /// Print the current position
    Status,

    /// Slew to a sky position
    Goto {
        /// Right ascension in hours
        #[arg(long)]
        ra: f64,

        /// Declination in degrees
        #[arg(long, allow_negative_numbers = true)]
        dec: f64,

        /// Start sidereal tracking once the goto finishes
        #[arg(long)]
        track: bool,
    },

    /// Declare the current pointing
    Sync {
        /// Right ascension in hours
        #[arg(long)]
        ra: f64,

        /// Declination in degrees
        #[arg(long, allow_negative_numbers = true)]
        dec: f64,
    },

    /// Start tracking
    Track {
        #[arg(long, value_enum, default_value = "sidereal")]
        rate: RateArg,

        /// Seconds to keep tracking before stopping (0 = leave running)
        #[arg(long, default_value = "0")]
        seconds: u64,
    },

    /// Slew to the park position
    Park,

    /// Release a parked mount
    Unpark,

    /// Find the home index sensors and zero the encoders
    Home,

    /// Interactive raw frame REPL
    Repl,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let mut driver = MountDriver::new(config);
    connect(&mut driver, &args)?;

    let result = match args.command {
        Command::Info => cmd_info(&driver),
        Command::Status => cmd_status(&mut driver),
        Command::Goto { ra, dec, track } => cmd_goto(&mut driver, ra, dec, track),
        Command::Sync { ra, dec } => cmd_sync(&mut driver, ra, dec),
        Command::Track { rate, seconds } => cmd_track(&mut driver, rate.into(), seconds),
        Command::Park => cmd_park(&mut driver),
        Command::Unpark => {
            driver.unpark()?;
            println!("Unparked");
            Ok(())
        }
        Command::Home => cmd_home(&mut driver),
        Command::Repl => cmd_repl(&mut driver),
    };

    driver.disconnect();
    result
}

fn load_config(args: &Args) -> Result<MountConfig> {
    let mut config = match &args.config {
        Some(path) => MountConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => MountConfig::default(),
    };
    if let Some(latitude) = args.latitude {
        config.observer.latitude_deg = latitude;
    }
    if let Some(longitude) = args.longitude {
        config.observer.longitude_deg = longitude;
    }
    Ok(config)
}

fn connect(driver: &mut MountDriver, args: &Args) -> Result<()> {
    if args.simulate {
        let mount = MockMount::new(MockSpec::default(), SystemClock::new());
        driver.connect(Box::new(mount), Box::new(SystemClock::new()))?;
        info!("Connected to simulated mount");
        return Ok(());
    }
    let transport = SerialTransport::open(&args.port, args.baud)
        .with_context(|| format!("Failed to open {}", args.port))?;
    driver.connect(Box::new(transport), Box::new(SystemClock::new()))?;
    Ok(())
}

fn print_snapshot(snapshot: &MountSnapshot) {
    println!(
        "{:<9} RA {:>8.4}h  Dec {:>+8.4}  HA {:>+7.3}h  pier {}  az {:>7.2}  alt {:>+6.2}  enc 0x{:06X}/0x{:06X}",
        snapshot.state.to_string(),
        snapshot.ra,
        snapshot.dec,
        snapshot.hour_angle,
        snapshot.pier_side,
        snapshot.horizontal.azimuth_deg,
        snapshot.horizontal.altitude_deg,
        snapshot.ra_encoder,
        snapshot.dec_encoder,
    );
}

fn cmd_info(driver: &MountDriver) -> Result<()> {
    let Some(info) = driver.info() else {
        bail!("Not connected");
    };
    let model = info
        .model
        .map(|m| m.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    println!("Model:          {model} (type 0x{:02X})", info.mount_code);
    println!("Firmware:       {:04X}", info.firmware_version);
    println!("Hemisphere:     {}", info.geometry.hemisphere);
    println!();
    println!("{:<6} {:>12} {:>12} {:>8} {:>10}", "Axis", "steps/rev", "timer Hz", "ratio", "zero");
    println!(
        "{:<6} {:>12} {:>12} {:>8} {:>#10X}",
        "RA", info.ra_steps_per_rev, info.ra_timer_freq, info.ra_high_speed_ratio, info.geometry.ra_zero
    );
    println!(
        "{:<6} {:>12} {:>12} {:>8} {:>#10X}",
        "DEC", info.dec_steps_per_rev, info.dec_timer_freq, info.dec_high_speed_ratio, info.geometry.dec_zero
    );
    Ok(())
}

fn cmd_status(driver: &mut MountDriver) -> Result<()> {
    let snapshot = driver.tick()?;
    print_snapshot(&snapshot);
    println!("LST {:.4}h  JD {:.5}", snapshot.lst, snapshot.julian_date);
    Ok(())
}

/// Tick at the configured period until `done` returns true.
fn tick_until(
    driver: &mut MountDriver,
    mut done: impl FnMut(&MountSnapshot) -> bool,
) -> Result<MountSnapshot> {
    let period = driver.config().tick_period();
    for _ in 0..MAX_WAIT_TICKS {
        let snapshot = driver.tick()?;
        print_snapshot(&snapshot);
        if done(&snapshot) {
            return Ok(snapshot);
        }
        std::thread::sleep(period);
    }
    driver.abort()?;
    bail!("Gave up after {MAX_WAIT_TICKS} ticks")
}

fn cmd_goto(driver: &mut MountDriver, ra: f64, dec: f64, track: bool) -> Result<()> {
    if track {
        driver.start_tracking(TrackRate::Sidereal)?;
    }
    driver.goto(ra, dec)?;
    let snapshot = tick_until(driver, |s| s.goto.is_none())?;
    println!(
        "Goto finished at RA {:.4}h Dec {:+.4} ({})",
        snapshot.ra, snapshot.dec, snapshot.state
    );
    Ok(())
}

fn cmd_sync(driver: &mut MountDriver, ra: f64, dec: f64) -> Result<()> {
    driver.sync(ra, dec)?;
    let (dra, ddec) = driver.sync_offset();
    println!("Sync offset RA {:+.4}h Dec {:+.4}", dra, ddec);
    Ok(())
}

fn cmd_track(driver: &mut MountDriver, rate: TrackRate, seconds: u64) -> Result<()> {
    driver.start_tracking(rate)?;
    println!("Tracking at {rate} rate");
    if seconds == 0 {
        return Ok(());
    }
    let period = driver.config().tick_period();
    let ticks = (Duration::from_secs(seconds).as_millis() / period.as_millis().max(1)) as u32;
    for _ in 0..ticks {
        print_snapshot(&driver.tick()?);
        std::thread::sleep(period);
    }
    driver.stop_tracking()?;
    Ok(())
}

fn cmd_park(driver: &mut MountDriver) -> Result<()> {
    driver.park()?;
    tick_until(driver, |s| s.state == eqmount::MountState::Parked)?;
    println!("Parked");
    Ok(())
}

fn cmd_home(driver: &mut MountDriver) -> Result<()> {
    driver.autohome()?;
    let state = driver.autohome()?;
    if state == AutohomeState::Idle || state == AutohomeState::Confirm {
        bail!("Autohome did not start ({state})");
    }
    tick_until(driver, |s| s.autohome == AutohomeState::Idle)?;
    println!("Home found, encoders zeroed");
    Ok(())
}

fn cmd_repl(driver: &mut MountDriver) -> Result<()> {
    println!("Skywatcher REPL - enter frames like :e1 or :j2, 'quit' to exit");
    println!();

    let mut rl = DefaultEditor::new()?;
    loop {
        match rl.readline("> ") {
            Ok(line) => {
                let cmd = line.trim();
                if cmd.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(&line);

                if cmd.eq_ignore_ascii_case("quit") || cmd.eq_ignore_ascii_case("exit") {
                    println!("Bye!");
                    break;
                }
                if cmd.eq_ignore_ascii_case("status") {
                    match driver.tick() {
                        Ok(snapshot) => print_snapshot(&snapshot),
                        Err(e) => println!("Error: {e}"),
                    }
                    continue;
                }
                if cmd.eq_ignore_ascii_case("abort") {
                    match driver.abort() {
                        Ok(()) => println!("Stopped"),
                        Err(e) => println!("Error: {e}"),
                    }
                    continue;
                }

                match driver.raw_command(cmd) {
                    Ok(reply) => println!("{reply}"),
                    Err(e) => {
                        println!("Error: {e}");
                        if !driver.is_connected() {
                            break;
                        }
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                break;
            }
            Err(ReadlineError::Eof) => {
                break;
            }
            Err(err) => {
                println!("Error: {err}");
                break;
            }
        }
    }

    Ok(())
}
