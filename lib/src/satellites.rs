//! Orbits of bodies around a parent body.

use nalgebra::Vector3;

use crate::{bodies::SolarSystem, kepler::orbits::Orbit};

/// World position of a body on `orbit` around a parent at `parent`.
pub fn world_position(parent: Vector3<f64>, orbit: &Orbit) -> Vector3<f64> {
    parent + orbit.offset()
}

/// Advance every body that has a parent and place it around the parent's
/// current world position. Parents precede their satellites in the
/// registry, so nested satellites see already-updated parents.
pub fn propagate(system: &mut SolarSystem, scaled_delta: f64) {
    for id in system.ids() {
        let Some(parent) = system[id].parent else {
            continue;
        };
        let centre = system[parent].position;
        let body = &mut system[id];
        if let Some(orbit) = body.orbit.as_mut() {
            orbit.advance(scaled_delta);
            body.position = world_position(centre, orbit);
        }
    }
}

#[cfg(test)]
use crate::{
    bodies::{BodyKind, CelestialBody},
    kepler::orbits::advance_primaries,
};

#[test]
fn moons_follow_their_parent() {
    let mut system = SolarSystem::new();
    let terra = system
        .insert(
            CelestialBody::new("terra", BodyKind::Planet).with_orbit(Orbit::new(20.0, 0.0, 0.01)),
        )
        .unwrap();
    let luna = system
        .insert_satellite(
            terra,
            CelestialBody::new("luna", BodyKind::Moon).with_orbit(Orbit::new(3.0, 0.0, 0.1)),
        )
        .unwrap();
    let probe = system
        .insert_satellite(
            luna,
            CelestialBody::new("probe", BodyKind::Moon).with_orbit(Orbit::new(0.5, 0.0, 1.0)),
        )
        .unwrap();

    for _ in 0..50 {
        advance_primaries(&mut system, 0.7);
        propagate(&mut system, 0.7);

        let t = system[terra].position;
        let l = system[luna].position;
        let p = system[probe].position;
        assert!(((l - t).norm() - 3.0).abs() < 1e-9);
        assert!(((p - l).norm() - 0.5).abs() < 1e-9);
    }

    let orbit = system[luna].orbit.unwrap();
    assert!((orbit.angle - (0.1f64 * 35.0) % std::f64::consts::TAU).abs() < 1e-9);
}

#[test]
fn elliptical_moon_radius_tracks_anomaly() {
    let orbit = Orbit::new(4.0, 0.5, 0.0).with_angle(std::f64::consts::PI);
    let parent = Vector3::new(10.0, 1.0, -5.0);
    let p = world_position(parent, &orbit);
    assert!(((p - parent).norm() - 6.0).abs() < 1e-9);
}
