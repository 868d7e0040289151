//! Pairwise Newtonian gravitation integrated with semi-implicit Euler.
//!
//! Every tracked body, moons included, is a full participant. The star
//! is held at its position and never receives a reaction.

use std::{collections::HashMap, f64::consts};

use itertools::Itertools;
use nalgebra::Vector3;
use rand::Rng;
use tracing::{debug, error, trace};

use crate::{
    bodies::{BodyId, CelestialBody, SolarSystem},
    config::GravityConfig,
};

/// Integrator-owned state of one body.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct NewtonState {
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
}

#[derive(Clone, Debug)]
pub struct GravityIntegrator {
    config: GravityConfig,
    enabled: bool,
    strength: f64,
    states: HashMap<BodyId, NewtonState>,
}

impl GravityIntegrator {
    pub fn new(config: GravityConfig) -> Self {
        let mut gravity = Self {
            config,
            enabled: false,
            strength: 1.0,
            states: HashMap::new(),
        };
        gravity.set_strength(config.strength);
        gravity
    }

    pub fn config(&self) -> &GravityConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Toggle whether [`Self::step`] does any work. Accumulated state is
    /// kept either way.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn strength(&self) -> f64 {
        self.strength
    }

    /// Set the gravity intensity dial, clamped to `[0, 2]`. This scales
    /// the velocity update, not the force.
    pub fn set_strength(&mut self, strength: f64) {
        self.strength = if strength.is_nan() {
            0.0
        } else {
            strength.clamp(0.0, 2.0)
        };
    }

    pub fn state(&self, id: BodyId) -> Option<&NewtonState> {
        self.states.get(&id)
    }

    /// Capture every body's current world position and give each orbiting
    /// body a tangential starting velocity.
    pub fn initialize(&mut self, system: &mut SolarSystem) {
        self.states.clear();
        for id in system.ids() {
            let centre = system.reference_centre(id);
            let body = &mut system[id];
            let velocity = if body.is_star() {
                Vector3::zeros()
            } else {
                self.tangential_velocity(body, centre)
            };
            body.velocity = velocity;
            self.states.insert(
                id,
                NewtonState {
                    position: body.position,
                    velocity,
                },
            );
        }
        debug!(bodies = self.states.len(), "gravity state initialized");
    }

    /// Snap every non-star body back onto a circle of its registry
    /// distance at a freshly chosen random angle. Parents are placed
    /// before their satellites, so moons land around the new parent
    /// position. The previous orbit angle is not restored.
    pub fn reset_to_keplerian(&mut self, system: &mut SolarSystem, rng: &mut impl Rng) {
        self.states.clear();
        for id in system.ids() {
            let centre = system.reference_centre(id);
            let body = &mut system[id];
            if !body.is_star() {
                if let Some(orbit) = body.orbit.as_mut() {
                    let angle = rng.gen_range(0.0..consts::TAU);
                    orbit.angle = angle;
                    body.position = centre
                        + Vector3::new(
                            orbit.semi_major_axis * libm::cos(angle),
                            orbit.height,
                            orbit.semi_major_axis * libm::sin(angle),
                        );
                }
            }
            let velocity = if body.is_star() {
                Vector3::zeros()
            } else {
                self.tangential_velocity(body, centre)
            };
            body.velocity = velocity;
            self.states.insert(
                id,
                NewtonState {
                    position: body.position,
                    velocity,
                },
            );
        }
        debug!(bodies = self.states.len(), "gravity state re-seeded on Keplerian orbits");
    }

    /// Velocity tangent to the line from `centre` in the XZ plane, in the
    /// direction of increasing orbit angle.
    fn tangential_velocity(&self, body: &CelestialBody, centre: Vector3<f64>) -> Vector3<f64> {
        let Some(orbit) = &body.orbit else {
            return Vector3::zeros();
        };
        let radial = body.position - centre;
        let planar = Vector3::new(radial.x, 0.0, radial.z);
        let Some(direction) = planar.try_normalize(f64::EPSILON) else {
            return Vector3::zeros();
        };
        let speed = orbit.angular_speed * orbit.semi_major_axis * self.config.velocity_scale;
        Vector3::new(-direction.z, 0.0, direction.x) * speed
    }

    /// Advance the system by one frame. Does nothing while disabled.
    pub fn step(&mut self, system: &mut SolarSystem, delta_time: f64, time_scale: f64) {
        if !self.enabled {
            return;
        }

        if let Some(missing) = system.ids().find(|id| !self.states.contains_key(id)) {
            error!(
                body = %system[missing].id,
                "gravity stepped without state for a body, skipping step"
            );
            if cfg!(debug_assertions) {
                panic!("gravity stepped without state for `{}`", system[missing].id);
            }
            return;
        }

        let scaled_dt = delta_time * time_scale * self.config.time_multiplier;
        let ids = system.ids().collect_vec();
        let masses = ids
            .iter()
            .map(|&id| system[id].mass_or(self.config.default_mass))
            .collect_vec();
        let positions = ids
            .iter()
            .map(|id| self.states[id].position)
            .collect_vec();

        let mut forces = vec![Vector3::zeros(); ids.len()];
        for (i, j) in (0..ids.len()).tuple_combinations() {
            if let Some(force) = pair_force(
                positions[i],
                masses[i],
                positions[j],
                masses[j],
                self.config.constant,
                self.config.min_distance_sq,
            ) {
                forces[i] += force;
                forces[j] -= force;
            }
        }

        for (k, &id) in ids.iter().enumerate() {
            let body = &mut system[id];
            if body.is_star() {
                continue;
            }
            let Some(state) = self.states.get_mut(&id) else {
                continue;
            };
            state.velocity += forces[k] / masses[k] * scaled_dt * self.strength;
            state.position += state.velocity * scaled_dt;
            body.position = state.position;
            body.velocity = state.velocity;
        }
        trace!(scaled_dt, bodies = ids.len(), "gravity step");
    }
}

/// Gravitational force exerted on body `i` by body `j`. Body `j`
/// receives the exact negation. Returns `None` when the bodies are closer
/// than `sqrt(min_distance_sq)`.
pub fn pair_force(
    pos_i: Vector3<f64>,
    mass_i: f64,
    pos_j: Vector3<f64>,
    mass_j: f64,
    constant: f64,
    min_distance_sq: f64,
) -> Option<Vector3<f64>> {
    let displacement = pos_j - pos_i;
    let distance_sq = displacement.norm_squared();
    if distance_sq.is_nan() || distance_sq < min_distance_sq {
        return None;
    }
    let magnitude = constant * (mass_i * mass_j) / distance_sq;
    Some(displacement / libm::sqrt(distance_sq) * magnitude)
}

#[cfg(test)]
use crate::{bodies::BodyKind, kepler::orbits::Orbit};

#[cfg(test)]
fn two_bodies(separation: f64) -> (SolarSystem, BodyId, BodyId) {
    let mut system = SolarSystem::new();
    let a = system
        .insert(CelestialBody::new("a", BodyKind::Planet).with_mass(10.0))
        .unwrap();
    let b = system
        .insert(
            CelestialBody::new("b", BodyKind::Planet)
                .with_mass(20.0)
                .with_position(Vector3::new(separation, 0.0, 0.0)),
        )
        .unwrap();
    (system, a, b)
}

#[test]
fn pair_forces_are_opposite() {
    let pi = Vector3::new(1.0, 2.0, -3.0);
    let pj = Vector3::new(-4.0, 0.5, 7.0);
    let on_i = pair_force(pi, 3.0, pj, 11.0, 2.5, 1e-6).unwrap();
    let on_j = pair_force(pj, 11.0, pi, 3.0, 2.5, 1e-6).unwrap();
    assert_eq!(on_i, -on_j);
    // i is pulled toward j
    assert!(on_i.dot(&(pj - pi)) > 0.0);
}

#[test]
fn lighter_body_accelerates_more() {
    let (mut system, a, b) = two_bodies(10.0);
    let mut gravity = GravityIntegrator::new(GravityConfig::default());
    gravity.initialize(&mut system);
    assert_eq!(system[a].velocity, Vector3::zeros());
    gravity.set_enabled(true);
    gravity.step(&mut system, 1.0, 1.0);

    let va = system[a].velocity;
    let vb = system[b].velocity;
    assert!(va.norm() > vb.norm());
    assert!(vb.norm() > 0.0);
    assert!(va.x > 0.0, "{va:?}");
    assert!(vb.x < 0.0, "{vb:?}");
    assert!((va.norm() / vb.norm() - 2.0).abs() < 1e-9);
}

#[test]
fn coincident_bodies_stay_finite() {
    let (mut system, a, b) = two_bodies(0.0);
    let mut gravity = GravityIntegrator::new(GravityConfig::default());
    gravity.initialize(&mut system);
    gravity.set_enabled(true);
    gravity.step(&mut system, 1.0, 1.0);
    for id in [a, b] {
        let body = &system[id];
        assert!(body.velocity.iter().all(|v| v.is_finite()));
        assert!(body.position.iter().all(|v| v.is_finite()));
    }
}

#[test]
fn disabled_integrator_does_nothing() {
    let (mut system, a, _) = two_bodies(10.0);
    let mut gravity = GravityIntegrator::new(GravityConfig::default());
    gravity.initialize(&mut system);
    gravity.step(&mut system, 1.0, 1.0);
    assert_eq!(system[a].velocity, Vector3::zeros());
    assert_eq!(system[a].position, Vector3::zeros());

    gravity.set_enabled(true);
    gravity.set_enabled(false);
    assert!(gravity.state(a).is_some());
}

#[test]
fn strength_is_clamped_and_scales_velocity() {
    let mut gravity = GravityIntegrator::new(GravityConfig::default());
    gravity.set_strength(5.0);
    assert!((gravity.strength() - 2.0).abs() < f64::EPSILON);
    gravity.set_strength(-1.0);
    assert!(gravity.strength().abs() < f64::EPSILON);

    let (mut system, a, _) = two_bodies(10.0);
    gravity.initialize(&mut system);
    gravity.set_enabled(true);
    gravity.step(&mut system, 1.0, 1.0);
    assert_eq!(system[a].velocity, Vector3::zeros());

    let (mut doubled, a2, _) = two_bodies(10.0);
    let (mut single, a1, _) = two_bodies(10.0);
    for (system, strength) in [(&mut doubled, 2.0), (&mut single, 1.0)] {
        let mut gravity = GravityIntegrator::new(GravityConfig::default());
        gravity.set_strength(strength);
        gravity.initialize(system);
        gravity.set_enabled(true);
        gravity.step(system, 1.0, 1.0);
    }
    assert!((doubled[a2].velocity.x / single[a1].velocity.x - 2.0).abs() < 1e-9);
}

#[test]
fn star_is_held_fixed() {
    let mut system = SolarSystem::new();
    let sol = system
        .insert(CelestialBody::new("sol", BodyKind::Star).with_mass(1000.0))
        .unwrap();
    let terra = system
        .insert(
            CelestialBody::new("terra", BodyKind::Planet)
                .with_mass(1.0)
                .with_orbit(Orbit::new(20.0, 0.0, 0.01))
                .with_position(Vector3::new(20.0, 0.0, 0.0)),
        )
        .unwrap();
    let mut gravity = GravityIntegrator::new(GravityConfig::default());
    gravity.initialize(&mut system);

    let v = system[terra].velocity;
    assert!(v.x.abs() < 1e-12);
    assert!((v.z - 0.01 * 20.0 / 100.0).abs() < 1e-12);

    gravity.set_enabled(true);
    for _ in 0..10 {
        gravity.step(&mut system, 0.016, 1.0);
    }
    assert_eq!(system[sol].position, Vector3::zeros());
    assert_eq!(system[sol].velocity, Vector3::zeros());
    assert!(system[terra].position.z > 0.0);
}

#[test]
fn reset_places_bodies_on_registry_distance() {
    use rand::{rngs::StdRng, SeedableRng};

    let mut system = SolarSystem::new();
    system
        .insert(CelestialBody::new("sol", BodyKind::Star))
        .unwrap();
    let terra = system
        .insert(
            CelestialBody::new("terra", BodyKind::Planet)
                .with_orbit(Orbit::new(20.0, 0.0, 0.01))
                .with_position(Vector3::new(500.0, 3.0, -40.0)),
        )
        .unwrap();
    let luna = system
        .insert_satellite(
            terra,
            CelestialBody::new("luna", BodyKind::Moon).with_orbit(Orbit::new(3.0, 0.05, 0.1)),
        )
        .unwrap();

    let mut gravity = GravityIntegrator::new(GravityConfig::default());
    gravity.reset_to_keplerian(&mut system, &mut StdRng::seed_from_u64(3));

    let p = system[terra].position;
    assert!((p.norm() - 20.0).abs() < 1e-9);
    let rel = system[luna].position - p;
    assert!((rel.norm() - 3.0).abs() < 1e-9);

    let orbit = system[terra].orbit.unwrap();
    assert!((p.x - 20.0 * orbit.angle.cos()).abs() < 1e-9);
    assert_eq!(gravity.state(terra).unwrap().position, p);
    assert!(system[terra].velocity.dot(&p).abs() < 1e-12);
}

#[test]
#[cfg_attr(debug_assertions, should_panic(expected = "without state"))]
fn stepping_uninitialized_state_is_a_fault() {
    let (mut system, a, _) = two_bodies(10.0);
    let mut gravity = GravityIntegrator::new(GravityConfig::default());
    gravity.set_enabled(true);
    gravity.step(&mut system, 1.0, 1.0);
    assert_eq!(system[a].position, Vector3::zeros());
}

#[test]
fn nan_strength_from_config_is_zeroed() {
    let gravity = GravityIntegrator::new(GravityConfig {
        strength: f64::NAN,
        ..GravityConfig::default()
    });
    assert!(gravity.strength().abs() < f64::EPSILON);
}

#[test]
fn unknown_mass_steps_with_fallback() {
    use crate::registry::DEFAULT_MASS;

    let orbiter = |name: &str| {
        CelestialBody::new(name, BodyKind::Planet)
            .with_orbit(Orbit::new(12.0, 0.0, 0.2))
            .with_position(Vector3::new(12.0, 0.0, 0.0))
    };
    let mut unknown = SolarSystem::new();
    unknown
        .insert(CelestialBody::new("sol", BodyKind::Star).with_mass(1000.0))
        .unwrap();
    let vulcan = unknown.insert(orbiter("vulcan")).unwrap();
    let mut known = SolarSystem::new();
    known
        .insert(CelestialBody::new("sol", BodyKind::Star).with_mass(1000.0))
        .unwrap();
    let twin = known
        .insert(orbiter("twin").with_mass(DEFAULT_MASS))
        .unwrap();
    assert_eq!(unknown[vulcan].mass, None);

    for system in [&mut unknown, &mut known] {
        let mut gravity = GravityIntegrator::new(GravityConfig::default());
        gravity.initialize(system);
        gravity.set_enabled(true);
        gravity.step(system, 1.0, 1.0);
    }

    let body = &unknown[vulcan];
    assert!(body.position.iter().all(|v| v.is_finite()));
    assert!(body.velocity.iter().all(|v| v.is_finite()));
    assert_eq!(body.velocity, known[twin].velocity);
    assert_eq!(body.position, known[twin].position);
}
