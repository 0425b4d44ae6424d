mod simulation;

#[cfg(feature = "ui")]
mod ui;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;

use simulation::{Airport, FlatEarthHost, HostServices, ReloadOutcome, SimClock, Weekday, DEFAULT_LOD};

#[derive(Parser)]
#[command(name = "ground_traffic")]
#[command(about = "Scripted airport ground traffic, headless or with a Bevy viewer")]
struct Cli {
    /// Scenery package directory containing groundtraffic.txt
    package: PathBuf,

    /// Run with the Bevy game engine UI
    #[arg(long)]
    ui: bool,

    /// Number of simulation ticks to run in headless mode
    #[arg(long, default_value = "1000")]
    ticks: u32,

    /// Time delta per tick in seconds
    #[arg(long, default_value = "0.1")]
    delta: f32,

    /// Simulated day of the week (any unambiguous prefix)
    #[arg(long, default_value = "monday", value_parser = parse_weekday)]
    weekday: Weekday,

    /// Simulated local time at start, HH:MM
    #[arg(long, default_value = "12:00", value_parser = parse_time)]
    time: (u32, u32),

    /// World detail divisor for the draw distance
    #[arg(long, default_value_t = DEFAULT_LOD)]
    lod: f32,
}

fn parse_weekday(s: &str) -> Result<Weekday, String> {
    Weekday::from_prefix(s).ok_or_else(|| format!("unknown day \"{}\"", s))
}

fn parse_time(s: &str) -> Result<(u32, u32), String> {
    let (hour, minute) = s
        .split_once(':')
        .ok_or_else(|| format!("expected HH:MM, got \"{}\"", s))?;
    let hour: u32 = hour.parse().map_err(|_| format!("bad hour in \"{}\"", s))?;
    let minute: u32 = minute.parse().map_err(|_| format!("bad minute in \"{}\"", s))?;
    if hour > 23 || minute > 59 {
        return Err(format!("time \"{}\" out of range", s));
    }
    Ok((hour, minute))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.delta <= 0.0 {
        bail!("--delta must be positive");
    }
    let clock = SimClock::new(cli.weekday, cli.time.0, cli.time.1);

    if cli.ui {
        run_with_ui(&cli, clock)
    } else {
        env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or("warn,ground_traffic=info"),
        )
        .init();
        run_headless(&cli.package, cli.lod, cli.ticks, cli.delta, clock)
    }
}

#[cfg(feature = "ui")]
fn run_with_ui(cli: &Cli, clock: SimClock) -> Result<()> {
    let (airport, host) = load(&cli.package, cli.lod)?;
    ui::run(airport, host, clock);
    Ok(())
}

#[cfg(not(feature = "ui"))]
fn run_with_ui(_cli: &Cli, _clock: SimClock) -> Result<()> {
    bail!("UI feature is not enabled. Rebuild with --features ui");
}

/// Load a scenery package and centre a flat-earth host on its tower
fn load(package: &Path, lod: f32) -> Result<(Airport, FlatEarthHost)> {
    let mut airport = Airport::new();
    airport.lod = lod;
    if let ReloadOutcome::Failed(err) = airport.reload(package) {
        return Err(err).with_context(|| format!("Can't load {}", package.display()));
    }
    let host = FlatEarthHost::new(airport.tower);
    Ok((airport, host))
}

/// Run the simulation in headless mode (no graphics)
fn run_headless(package: &Path, lod: f32, ticks: u32, delta: f32, mut clock: SimClock) -> Result<()> {
    let (mut airport, mut host) = load(package, lod)?;
    let viewer = host.world_to_local(&airport.tower);

    println!("Running ground traffic in headless mode...");
    println!("Ticks: {}, Delta: {}s", ticks, delta);

    // Calculate how many ticks equal 1 second of simulation time
    let ticks_per_second = (1.0 / delta).ceil() as u32;
    println!("Running {} ticks per second (simulated time)", ticks_per_second);
    println!();

    println!("Initial state:");
    airport.print_summary(&clock);
    println!();

    let mut tick = 0;
    while tick < ticks {
        let ticks_to_run = ticks_per_second.min(ticks - tick);
        for _ in 0..ticks_to_run {
            tick += 1;
            clock.advance(delta);
            airport.frame(&mut host, &clock, &viewer, delta);
        }

        println!("--- After tick {} ({:.1}s simulated time) ---", tick, tick as f32 * delta);
        airport.print_summary(&clock);
        airport.draw_map();
        println!();
    }

    println!("=== Final State ===");
    airport.print_summary(&clock);
    airport.draw_map();
    Ok(())
}
