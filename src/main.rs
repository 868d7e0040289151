#![warn(clippy::unwrap_used)]
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use color_eyre::eyre::{self, bail};
use heliosim::{
    config::SimConfig,
    registry::SystemSpec,
    sim::{PhysicsMode, Simulation},
};
use ron::ser::PrettyConfig;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Run the orbital engine headless and print body snapshots as RON.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// System description (TOML). Defaults to the built-in solar system.
    #[arg(long)]
    system: Option<PathBuf>,
    /// Simulation settings (TOML).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Number of frames to simulate.
    #[arg(long, default_value_t = 600)]
    frames: u64,
    /// Wall-clock seconds per frame.
    #[arg(long, default_value_t = 1.0 / 60.0)]
    dt: f64,
    /// Print a snapshot every N frames (0 prints only the final one).
    #[arg(long, default_value_t = 0)]
    every: u64,
    #[arg(long)]
    time_scale: Option<f64>,
    #[arg(long, value_enum)]
    mode: Option<Mode>,
    /// Gravity intensity in [0, 2].
    #[arg(long)]
    strength: Option<f64>,
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    Keplerian,
    Newtonian,
}

impl From<Mode> for PhysicsMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Keplerian => PhysicsMode::Keplerian,
            Mode::Newtonian => PhysicsMode::Newtonian,
        }
    }
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    if !(args.dt.is_finite() && args.dt >= 0.0) {
        bail!("--dt must be a non-negative number of seconds, got {}", args.dt);
    }

    let mut config = match &args.config {
        Some(path) => SimConfig::load(path)?,
        None => SimConfig::default(),
    };
    if let Some(time_scale) = args.time_scale {
        config.clock.time_scale = time_scale;
    }
    if let Some(mode) = args.mode {
        config.clock.mode = mode.into();
    }
    if let Some(strength) = args.strength {
        config.gravity.strength = strength;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    let spec = match &args.system {
        Some(path) => SystemSpec::load(path)?,
        None => SystemSpec::solar()?,
    };
    let mut sim = Simulation::from_spec(&spec, &config)?;

    for _ in 0..args.frames {
        sim.tick(args.dt);
        if args.every > 0 && sim.frame() % args.every == 0 {
            print_snapshot(&sim)?;
        }
    }
    if args.every == 0 || sim.frame() == 0 || sim.frame() % args.every != 0 {
        print_snapshot(&sim)?;
    }
    info!(frames = sim.frame(), elapsed = %sim.elapsed(), "done");
    Ok(())
}

fn print_snapshot(sim: &Simulation) -> eyre::Result<()> {
    let s = ron::ser::to_string_pretty(&sim.snapshot(), PrettyConfig::default())?;
    println!("{s}");
    Ok(())
}
