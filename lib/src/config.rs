//! Tuning constants and startup settings.
//!
//! The gravity constants are tuned for the scene's unit system
//! (scene units, `kg × 10⁻²⁴`, seconds of scaled time) and are not SI.

use std::{fs, path::Path};

use color_eyre::eyre::{self, bail, WrapErr};
use serde::{Deserialize, Serialize};

use crate::{registry::DEFAULT_MASS, sim::PhysicsMode};

/// Multiplier applied to the scaled frame time before integrating.
pub const TIME_MULTIPLIER: f64 = 100.0;

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GravityConfig {
    /// Rescaled gravitational constant `G'`.
    pub constant: f64,
    /// `K` in `scaled_dt = delta_time × time_scale × K`.
    pub time_multiplier: f64,
    /// Initial tangential speed is
    /// `orbital_speed × distance × velocity_scale`. With the default of
    /// `1 / K` a body leaves Keplerian mode at its Keplerian angular rate.
    pub velocity_scale: f64,
    /// Pairs closer than this (squared distance) exert no force.
    pub min_distance_sq: f64,
    /// Mass used for bodies without one.
    pub default_mass: f64,
    /// Initial gravitational strength, clamped to `[0, 2]`.
    pub strength: f64,
}

impl GravityConfig {
    /// Reject values that would let a step produce NaN or infinity.
    pub fn validate(&self) -> eyre::Result<()> {
        for (name, value) in [
            ("constant", self.constant),
            ("time_multiplier", self.time_multiplier),
            ("velocity_scale", self.velocity_scale),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                bail!("gravity.{name} must be finite and non-negative, got {value}.");
            }
        }
        if !(self.min_distance_sq.is_finite() && self.min_distance_sq > 0.0) {
            bail!(
                "gravity.min_distance_sq must be positive, got {}.",
                self.min_distance_sq
            );
        }
        if !(self.default_mass.is_finite() && self.default_mass > 0.0) {
            bail!(
                "gravity.default_mass must be positive, got {}.",
                self.default_mass
            );
        }
        Ok(())
    }
}

impl Default for GravityConfig {
    fn default() -> Self {
        Self {
            constant: 6.674e-11,
            time_multiplier: TIME_MULTIPLIER,
            velocity_scale: 1.0 / TIME_MULTIPLIER,
            min_distance_sq: 1e-6,
            default_mass: DEFAULT_MASS,
            strength: 1.0,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    pub time_scale: f64,
    pub mode: PhysicsMode,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            time_scale: 1.0,
            mode: PhysicsMode::Keplerian,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DwarfConfig {
    /// Bound of the random height offset given to dwarf planets.
    pub max_height: f64,
}

impl Default for DwarfConfig {
    fn default() -> Self {
        Self { max_height: 2.0 }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub gravity: GravityConfig,
    pub clock: ClockConfig,
    pub dwarf: DwarfConfig,
    /// Seed for dwarf heights and Keplerian re-seeding. Random if unset.
    pub seed: Option<u64>,
}

impl SimConfig {
    pub fn from_toml(s: &str) -> eyre::Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.gravity.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let s = fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&s).wrap_err_with(|| format!("Failed to parse {}", path.display()))
    }
}

#[test]
fn omitted_fields_default() {
    let config = SimConfig::from_toml(
        r#"
        seed = 12

        [gravity]
        strength = 1.5

        [clock]
        mode = "newtonian"
        "#,
    )
    .unwrap();

    assert_eq!(config.seed, Some(12));
    assert!((config.gravity.strength - 1.5).abs() < f64::EPSILON);
    assert_eq!(config.gravity.constant, GravityConfig::default().constant);
    assert_eq!(config.clock.mode, PhysicsMode::Newtonian);
    assert!((config.clock.time_scale - 1.0).abs() < f64::EPSILON);
    assert_eq!(config.dwarf, DwarfConfig::default());

    assert_eq!(SimConfig::from_toml("").unwrap(), SimConfig::default());
}

#[test]
fn rejects_degenerate_gravity_values() {
    for bad in [
        "min_distance_sq = 0.0",
        "min_distance_sq = -1.0",
        "default_mass = 0.0",
        "default_mass = nan",
        "constant = -6.674e-11",
        "constant = inf",
        "time_multiplier = nan",
        "velocity_scale = -0.01",
    ] {
        let err = SimConfig::from_toml(&format!("[gravity]\n{bad}\n"));
        assert!(err.is_err(), "accepted `{bad}`");
    }
    assert!(GravityConfig::default().validate().is_ok());
}
