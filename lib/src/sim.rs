//! The simulation clock and physics-mode controller.

use std::{fmt, sync::Arc};

use color_eyre::eyre;
use nalgebra::Vector3;
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::{
    bodies::{BodyKind, CelestialBody, SolarSystem},
    config::SimConfig,
    gravity::GravityIntegrator,
    kepler::orbits::advance_primaries,
    registry::SystemSpec,
    satellites,
    time::SimTime,
};

/// Which evaluator owns body positions.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PhysicsMode {
    /// Closed-form orbits; moons revolve around their parent.
    #[default]
    Keplerian,
    /// Pairwise gravitation over every body.
    Newtonian,
}

impl fmt::Display for PhysicsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keplerian => write!(f, "keplerian"),
            Self::Newtonian => write!(f, "newtonian"),
        }
    }
}

/// What the renderer needs to place one mesh.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BodySnapshot {
    pub id: Arc<str>,
    pub kind: BodyKind,
    pub parent: Option<Arc<str>>,
    pub position: Vector3<f64>,
    pub rotation: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SystemSnapshot {
    pub frame: u64,
    /// Elapsed simulated time (seconds).
    pub elapsed: f64,
    pub mode: PhysicsMode,
    pub bodies: Vec<BodySnapshot>,
}

/// Owns the system, the gravity state and the clock. Every mutation
/// goes through `&mut self`, one tick at a time.
pub struct Simulation {
    system: SolarSystem,
    gravity: GravityIntegrator,
    mode: PhysicsMode,
    time_scale: f64,
    paused_scale: Option<f64>,
    elapsed: SimTime,
    frame: u64,
    rng: StdRng,
}

impl Simulation {
    /// Build the system described by `spec`. Positions are evaluated
    /// immediately so the first snapshot is meaningful.
    pub fn from_spec(spec: &SystemSpec, config: &SimConfig) -> eyre::Result<Self> {
        config.gravity.validate()?;
        let mut rng = rng(config);
        let system = spec.build(&mut rng, config.dwarf.max_height)?;
        Ok(Self::with_rng(system, config, rng))
    }

    fn with_rng(system: SolarSystem, config: &SimConfig, rng: StdRng) -> Self {
        let mut sim = Self {
            system,
            gravity: GravityIntegrator::new(config.gravity),
            mode: PhysicsMode::Keplerian,
            time_scale: 1.0,
            paused_scale: None,
            elapsed: SimTime::ZERO,
            frame: 0,
            rng,
        };
        sim.set_time_scale(config.clock.time_scale);
        advance_primaries(&mut sim.system, 0.0);
        satellites::propagate(&mut sim.system, 0.0);
        sim.set_physics_mode(config.clock.mode);
        info!(
            bodies = sim.system.len(),
            mode = %sim.mode,
            time_scale = sim.time_scale,
            "simulation ready"
        );
        sim
    }

    /// Advance by one frame of `delta_time` wall-clock seconds. The delta
    /// is not clamped.
    pub fn tick(&mut self, delta_time: f64) {
        let scaled_delta = delta_time * self.time_scale;
        match self.mode {
            PhysicsMode::Keplerian => {
                advance_primaries(&mut self.system, scaled_delta);
                satellites::propagate(&mut self.system, scaled_delta);
            }
            PhysicsMode::Newtonian => {
                self.gravity
                    .step(&mut self.system, delta_time, self.time_scale);
            }
        }
        for (_, body) in self.system.iter_mut() {
            body.rotation.advance(scaled_delta);
        }
        self.elapsed = self.elapsed.advanced(scaled_delta);
        self.frame += 1;
        trace!(frame = self.frame, delta_time, scaled_delta, "tick");
    }

    pub fn time_scale(&self) -> f64 {
        self.time_scale
    }

    /// Set the global time scale. `0` pauses, `2` runs twice as fast.
    /// Negative or non-finite values are treated as `0`.
    pub fn set_time_scale(&mut self, value: f64) {
        self.paused_scale = None;
        self.time_scale = if value.is_finite() && value >= 0.0 {
            value
        } else {
            warn!(value, "rejecting invalid time scale, pausing instead");
            0.0
        };
    }

    pub fn pause(&mut self) {
        if self.paused_scale.is_none() {
            self.paused_scale = Some(self.time_scale);
            self.time_scale = 0.0;
        }
    }

    pub fn resume(&mut self) {
        if let Some(scale) = self.paused_scale.take() {
            self.time_scale = scale;
        }
    }

    #[allow(clippy::float_cmp)]
    pub fn is_paused(&self) -> bool {
        self.time_scale == 0.0
    }

    pub fn physics_mode(&self) -> PhysicsMode {
        self.mode
    }

    /// Switch physics mode. Entering Newtonian mode captures the current
    /// positions and tangential velocities; returning to Keplerian mode
    /// re-seeds every orbit at a random angle.
    pub fn set_physics_mode(&mut self, mode: PhysicsMode) {
        if mode == self.mode {
            return;
        }
        match mode {
            PhysicsMode::Newtonian => {
                self.gravity.initialize(&mut self.system);
                self.gravity.set_enabled(true);
            }
            PhysicsMode::Keplerian => {
                self.gravity
                    .reset_to_keplerian(&mut self.system, &mut self.rng);
                self.gravity.set_enabled(false);
            }
        }
        debug!(from = %self.mode, to = %mode, "physics mode changed");
        self.mode = mode;
    }

    pub fn gravitational_strength(&self) -> f64 {
        self.gravity.strength()
    }

    /// Set the gravity intensity dial, clamped to `[0, 2]`.
    pub fn set_gravitational_strength(&mut self, strength: f64) {
        self.gravity.set_strength(strength);
    }

    pub fn system(&self) -> &SolarSystem {
        &self.system
    }

    pub fn body(&self, name: &str) -> Option<&CelestialBody> {
        self.system.by_name(name)
    }

    pub fn gravity(&self) -> &GravityIntegrator {
        &self.gravity
    }

    pub fn elapsed(&self) -> SimTime {
        self.elapsed
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn snapshot(&self) -> SystemSnapshot {
        let bodies = self
            .system
            .iter()
            .map(|(_, body)| BodySnapshot {
                id: body.id.clone(),
                kind: body.kind,
                parent: body.parent.map(|p| self.system[p].id.clone()),
                position: body.position,
                rotation: body.rotation.angle,
            })
            .collect();
        SystemSnapshot {
            frame: self.frame,
            elapsed: self.elapsed.as_seconds(),
            mode: self.mode,
            bodies,
        }
    }
}

fn rng(config: &SimConfig) -> StdRng {
    config
        .seed
        .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64)
}

#[cfg(test)]
use crate::registry::BodySpec;

#[cfg(test)]
fn seeded() -> SimConfig {
    SimConfig {
        seed: Some(42),
        ..SimConfig::default()
    }
}

#[test]
fn terra_advances_one_tick() {
    let spec = SystemSpec {
        bodies: vec![BodySpec::new("terra", 20.0, 0.0, 0.01)],
    };
    let mut sim = Simulation::from_spec(&spec, &seeded()).unwrap();
    sim.set_time_scale(1.0);
    sim.tick(1.0);

    let terra = sim.body("terra").unwrap();
    let orbit = terra.orbit.unwrap();
    assert!((orbit.angle - 0.01).abs() < 1e-12);
    let expected = Vector3::new(20.0 * 0.01f64.cos(), 0.0, 20.0 * 0.01f64.sin());
    assert!((terra.position - expected).norm() < 1e-12);
    assert_eq!(sim.frame(), 1);
    assert!((sim.elapsed().as_seconds() - 1.0).abs() < 1e-9);
}

#[test]
fn angles_stay_wrapped_through_many_ticks() {
    let mut sim = Simulation::from_spec(&SystemSpec::solar().unwrap(), &seeded()).unwrap();
    sim.set_time_scale(2.0);
    for dt in [0.016, 0.5, 3.0, 120.0, 10_000.0] {
        sim.tick(dt);
        for (_, body) in sim.system().iter() {
            if let Some(orbit) = body.orbit {
                assert!((0.0..std::f64::consts::TAU).contains(&orbit.angle));
            }
        }
    }
}

#[test]
fn moons_orbit_parents_in_keplerian_mode() {
    let mut sim = Simulation::from_spec(&SystemSpec::solar().unwrap(), &seeded()).unwrap();
    for _ in 0..100 {
        sim.tick(0.25);
    }
    let system = sim.system();
    for (_, body) in system.iter() {
        let (Some(parent), Some(orbit)) = (body.parent, body.orbit) else {
            continue;
        };
        let rel = body.position - system[parent].position;
        assert!((rel.norm() - orbit.radius()).abs() < 1e-9, "{}", body.id);
    }
}

#[test]
fn zero_time_scale_freezes_everything() {
    let mut sim = Simulation::from_spec(&SystemSpec::solar().unwrap(), &seeded()).unwrap();
    sim.tick(1.0);
    let before = sim.snapshot();
    sim.pause();
    assert!(sim.is_paused());
    sim.tick(5.0);
    let after = sim.snapshot();
    assert_eq!(before.bodies, after.bodies);

    sim.resume();
    assert!((sim.time_scale() - 1.0).abs() < f64::EPSILON);
    sim.set_time_scale(-3.0);
    assert!(sim.is_paused());
}

#[test]
fn mode_round_trip_keeps_bodies_on_their_orbits() {
    let mut sim = Simulation::from_spec(&SystemSpec::solar().unwrap(), &seeded()).unwrap();
    sim.tick(1.0);
    sim.set_physics_mode(PhysicsMode::Newtonian);
    assert!(sim.gravity().is_enabled());
    sim.tick(0.016);
    sim.set_physics_mode(PhysicsMode::Keplerian);
    assert!(!sim.gravity().is_enabled());

    let system = sim.system();
    for (id, body) in system.iter() {
        let Some(orbit) = body.orbit else {
            continue;
        };
        let rel = body.position - system.reference_centre(id);
        let radius = Vector3::new(rel.x, 0.0, rel.z).norm();
        assert!((radius - orbit.semi_major_axis).abs() < 1e-9, "{}", body.id);
        assert!(radius >= orbit.periapsis_radius() - 1e-9);
        assert!(radius <= orbit.apoapsis_radius() + 1e-9);
    }
}

#[test]
fn newtonian_mode_moves_bodies_and_keeps_star_fixed() {
    let config = SimConfig {
        clock: crate::config::ClockConfig {
            mode: PhysicsMode::Newtonian,
            ..Default::default()
        },
        ..seeded()
    };
    let mut sim = Simulation::from_spec(&SystemSpec::solar().unwrap(), &config).unwrap();
    assert_eq!(sim.physics_mode(), PhysicsMode::Newtonian);
    let start = sim.body("terra").unwrap().position;
    let terra_angle = sim.body("terra").unwrap().orbit.unwrap().angle;
    for _ in 0..10 {
        sim.tick(0.016);
    }
    let terra = sim.body("terra").unwrap();
    assert!((terra.position - start).norm() > 0.0);
    assert!(terra.position.iter().all(|v| v.is_finite()));
    // the orbit angle belongs to the Keplerian evaluator and is untouched
    assert!((terra.orbit.unwrap().angle - terra_angle).abs() < f64::EPSILON);
    assert_eq!(sim.body("sol").unwrap().position, Vector3::zeros());
    assert!(sim.body("sol").unwrap().rotation.angle > 0.0);
}

#[test]
fn same_mode_request_keeps_state() {
    let mut sim = Simulation::from_spec(&SystemSpec::solar().unwrap(), &seeded()).unwrap();
    sim.tick(3.0);
    let before = sim.snapshot();
    sim.set_physics_mode(PhysicsMode::Keplerian);
    assert_eq!(before, sim.snapshot());
}

#[test]
fn strength_is_forwarded_and_clamped() {
    let mut sim = Simulation::from_spec(&SystemSpec::solar().unwrap(), &seeded()).unwrap();
    sim.set_gravitational_strength(3.0);
    assert!((sim.gravitational_strength() - 2.0).abs() < f64::EPSILON);
}

#[test]
fn snapshot_names_parents() {
    let sim = Simulation::from_spec(&SystemSpec::solar().unwrap(), &seeded()).unwrap();
    let snapshot = sim.snapshot();
    let io = snapshot.bodies.iter().find(|b| &*b.id == "io").unwrap();
    assert_eq!(io.parent.as_deref(), Some("jupiter"));
    assert_eq!(io.kind, BodyKind::Moon);
    assert_eq!(snapshot.mode, PhysicsMode::Keplerian);
    assert_eq!(snapshot.bodies.len(), sim.system().len());
}

#[test]
fn rejects_degenerate_gravity_config() {
    let config = SimConfig {
        gravity: crate::config::GravityConfig {
            min_distance_sq: 0.0,
            ..Default::default()
        },
        ..seeded()
    };
    assert!(Simulation::from_spec(&SystemSpec::solar().unwrap(), &config).is_err());
}
