//! Static reference data used to build a [`SolarSystem`].

use std::{fs, path::Path};

use color_eyre::eyre::{self, WrapErr};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    bodies::{BodyId, BodyKind, CelestialBody, SolarSystem},
    kepler::orbits::{Orbit, Rotation},
};

/// Mass of Earth (`kg × 10⁻²⁴`).
pub const EARTH_MASS: f64 = 5.97;

/// Mass used for any body whose mass is unknown.
pub const DEFAULT_MASS: f64 = EARTH_MASS / 10.0;

const SOLAR_SYSTEM: &str = include_str!("solar.toml");

/// Known masses (`kg × 10⁻²⁴`) by body id.
const MASSES: &[(&str, f64)] = &[
    ("sol", 1_989_000.0),
    ("mercury", 0.330),
    ("venus", 4.87),
    ("terra", EARTH_MASS),
    ("luna", 0.073),
    ("mars", 0.642),
    ("phobos", 1.07e-8),
    ("deimos", 1.48e-9),
    ("ceres", 0.000_939),
    ("jupiter", 1898.0),
    ("io", 0.0893),
    ("europa", 0.048),
    ("ganymede", 0.148),
    ("callisto", 0.108),
    ("saturn", 568.0),
    ("titan", 0.135),
    ("uranus", 86.8),
    ("titania", 0.0035),
    ("neptune", 102.0),
    ("triton", 0.0214),
    ("pluto", 0.0130),
    ("charon", 0.001_59),
    ("eris", 0.0166),
];

pub fn known_mass(id: &str) -> Option<f64> {
    MASSES.iter().find(|(name, _)| *name == id).map(|(_, m)| *m)
}

/// Initial data for one body, as supplied by scene setup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BodySpec {
    pub id: String,
    /// Defaults to a planet at the top level and a moon among
    /// satellites.
    #[serde(default)]
    pub kind: Option<BodyKind>,
    /// Semi-major axis around the parent (or the origin).
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub eccentricity: f64,
    #[serde(default)]
    pub orbital_speed: f64,
    #[serde(default)]
    pub rotation_speed: f64,
    #[serde(default)]
    pub mass: Option<f64>,
    #[serde(default)]
    pub satellites: Vec<BodySpec>,
}

impl BodySpec {
    pub fn new(id: impl Into<String>, distance: f64, eccentricity: f64, orbital_speed: f64) -> Self {
        Self {
            id: id.into(),
            kind: None,
            distance,
            eccentricity,
            orbital_speed,
            rotation_speed: 0.0,
            mass: None,
            satellites: Vec::new(),
        }
    }
}

/// A full system description.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemSpec {
    pub bodies: Vec<BodySpec>,
}

impl SystemSpec {
    /// The built-in solar system.
    pub fn solar() -> eyre::Result<Self> {
        Self::from_toml(SOLAR_SYSTEM).wrap_err("Built-in solar system is malformed.")
    }

    pub fn from_toml(s: &str) -> eyre::Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let s = fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read system file {}", path.display()))?;
        Self::from_toml(&s).wrap_err_with(|| format!("Failed to parse {}", path.display()))
    }

    pub fn find(&self, id: &str) -> Option<&BodySpec> {
        fn walk<'a>(specs: &'a [BodySpec], id: &str) -> Option<&'a BodySpec> {
            specs
                .iter()
                .find_map(|s| if s.id == id { Some(s) } else { walk(&s.satellites, id) })
        }
        walk(&self.bodies, id)
    }

    /// Build the system. Every orbit starts at angle 0; dwarf planets
    /// receive a fixed random height in `[-max_height, max_height]`.
    pub fn build(&self, rng: &mut impl Rng, max_height: f64) -> eyre::Result<SolarSystem> {
        let mut system = SolarSystem::new();
        for spec in &self.bodies {
            add(&mut system, None, spec, rng, max_height)?;
        }
        debug!(bodies = system.len(), "built solar system");
        Ok(system)
    }
}

fn add(
    system: &mut SolarSystem,
    parent: Option<BodyId>,
    spec: &BodySpec,
    rng: &mut impl Rng,
    max_height: f64,
) -> eyre::Result<()> {
    let kind = spec.kind.unwrap_or(if parent.is_some() {
        BodyKind::Moon
    } else {
        BodyKind::Planet
    });

    let mut body = CelestialBody::new(spec.id.as_str(), kind)
        .with_rotation(Rotation::new(spec.rotation_speed));
    match spec.mass.or_else(|| known_mass(&spec.id)) {
        Some(mass) => body = body.with_mass(mass),
        None => warn!(
            id = %spec.id,
            fallback = DEFAULT_MASS,
            "no mass known for body, gravity will use the fallback"
        ),
    }
    if kind != BodyKind::Star {
        let height = if kind == BodyKind::DwarfPlanet && max_height > 0.0 {
            rng.gen_range(-max_height..=max_height)
        } else {
            0.0
        };
        body = body.with_orbit(
            Orbit::new(spec.distance, spec.eccentricity, spec.orbital_speed).with_height(height),
        );
    }

    let id = match parent {
        Some(parent) => system.insert_satellite(parent, body),
        None => system.insert(body),
    }
    .wrap_err_with(|| format!("Invalid body `{}`", spec.id))?;

    for satellite in &spec.satellites {
        add(system, Some(id), satellite, rng, max_height)?;
    }
    Ok(())
}

#[cfg(test)]
use rand::{rngs::StdRng, SeedableRng};

#[test]
fn builtin_system_builds() {
    let spec = SystemSpec::solar().unwrap();
    let system = spec.build(&mut StdRng::seed_from_u64(7), 2.0).unwrap();

    let sol = system.star().unwrap();
    assert_eq!(&*system[sol].id, "sol");
    assert!(system[sol].orbit.is_none());

    let terra = system.lookup("terra").unwrap();
    let luna = system.by_name("luna").unwrap();
    assert_eq!(luna.kind, BodyKind::Moon);
    assert_eq!(luna.parent, Some(terra));
    assert_eq!(luna.mass, Some(0.073));

    let pluto = system.by_name("pluto").unwrap();
    assert_eq!(pluto.kind, BodyKind::DwarfPlanet);
    let height = pluto.orbit.unwrap().height;
    assert!((-2.0..=2.0).contains(&height));
    assert!(system.by_name("jupiter").unwrap().orbit.unwrap().height.abs() < f64::EPSILON);
}

#[test]
fn missing_mass_is_left_for_fallback() {
    let spec = SystemSpec::from_toml(
        r#"
        [[bodies]]
        id = "vulcan"
        distance = 12.0
        orbital_speed = 0.2
        "#,
    )
    .unwrap();
    let system = spec.build(&mut StdRng::seed_from_u64(0), 0.0).unwrap();
    let vulcan = system.by_name("vulcan").unwrap();
    assert_eq!(vulcan.mass, None);
    assert!((vulcan.mass_or(DEFAULT_MASS) - 0.597).abs() < 1e-12);
}

#[test]
fn rejects_bad_registry_data() {
    let bad_ecc = SystemSpec {
        bodies: vec![BodySpec::new("comet", 50.0, 1.2, 0.01)],
    };
    assert!(bad_ecc.build(&mut StdRng::seed_from_u64(0), 0.0).is_err());

    let duplicate = SystemSpec {
        bodies: vec![
            BodySpec::new("terra", 20.0, 0.0, 0.01),
            BodySpec::new("terra", 30.0, 0.0, 0.01),
        ],
    };
    assert!(duplicate.build(&mut StdRng::seed_from_u64(0), 0.0).is_err());

    let mut terra = BodySpec::new("terra", 20.0, 0.0, 0.01);
    terra.satellites.push(BodySpec::new("luna", 3.0, 0.0, -0.1));
    let negative = SystemSpec {
        bodies: vec![terra],
    };
    assert!(negative.build(&mut StdRng::seed_from_u64(0), 0.0).is_err());
}

#[test]
fn find_searches_satellites() {
    let spec = SystemSpec::solar().unwrap();
    assert_eq!(spec.find("titan").map(|s| s.distance), Some(14.0));
    assert!(spec.find("vulcan").is_none());
}
