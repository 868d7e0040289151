//! Keplerian orbits.
//!
//! The orbit angle is the true anomaly measured from periapsis with the
//! focus at the origin of the reference frame. It advances linearly with
//! a fixed angular speed; Kepler's equation is never solved, so a body
//! does not slow down towards apoapsis. The visual calibration of the
//! built-in system depends on this.

use std::f64::consts;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::bodies::SolarSystem;

/// A simplified Keplerian orbit.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Orbit {
    /// Semi-major axis (scene units). Equal to the radius for a
    /// circular orbit.
    pub semi_major_axis: f64,
    /// Eccentricity (dimensionless), in `[0, 1)`.
    pub eccentricity: f64,
    /// True anomaly (radians), kept in `[0, 2π)`.
    pub angle: f64,
    /// Advance of the true anomaly per unit of scaled time (`rad/s`).
    pub angular_speed: f64,
    /// Fixed offset along the y axis, chosen once when the body is built.
    pub height: f64,
}

impl Orbit {
    pub fn new(semi_major_axis: f64, eccentricity: f64, angular_speed: f64) -> Self {
        Self {
            semi_major_axis,
            eccentricity,
            angle: 0.0,
            angular_speed,
            height: 0.0,
        }
    }

    #[must_use]
    pub fn with_angle(mut self, angle: f64) -> Self {
        self.angle = wrap_angle(angle);
        self
    }

    #[must_use]
    pub fn with_height(mut self, height: f64) -> Self {
        self.height = height;
        self
    }

    #[allow(clippy::float_cmp)]
    pub fn is_circular(&self) -> bool {
        self.eccentricity == 0.0
    }

    pub fn periapsis_radius(&self) -> f64 {
        self.semi_major_axis * (1.0 - self.eccentricity)
    }

    pub fn apoapsis_radius(&self) -> f64 {
        self.semi_major_axis * (1.0 + self.eccentricity)
    }

    /// Distance from the focus at the given true anomaly.
    pub fn radius_at(&self, angle: f64) -> f64 {
        if self.is_circular() {
            self.semi_major_axis
        } else {
            let e = self.eccentricity;
            self.semi_major_axis * (1.0 - e * e) / (1.0 + e * libm::cos(angle))
        }
    }

    /// Distance from the focus at the current true anomaly.
    pub fn radius(&self) -> f64 {
        self.radius_at(self.angle)
    }

    /// Advance the true anomaly by `scaled_delta` seconds of scaled
    /// time.
    pub fn advance(&mut self, scaled_delta: f64) {
        self.angle = wrap_angle(self.angle + self.angular_speed * scaled_delta);
    }

    /// Position relative to the focus at the current true anomaly.
    pub fn offset(&self) -> Vector3<f64> {
        let r = self.radius();
        Vector3::new(
            r * libm::cos(self.angle),
            self.height,
            r * libm::sin(self.angle),
        )
    }
}

/// Spin about the body's own axis.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    /// Accumulated spin angle (radians). Not wrapped.
    pub angle: f64,
    /// Spin per unit of scaled time (`rad/s`).
    pub angular_speed: f64,
}

impl Rotation {
    pub fn new(angular_speed: f64) -> Self {
        Self {
            angle: 0.0,
            angular_speed,
        }
    }

    pub fn advance(&mut self, scaled_delta: f64) {
        self.angle += self.angular_speed * scaled_delta;
    }
}

/// Wrap an angle into `[0, 2π)`.
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(consts::TAU);
    // rem_euclid can round up to exactly 2π for tiny negative inputs
    if wrapped >= consts::TAU {
        0.0
    } else {
        wrapped
    }
}

/// Advance every body that orbits the origin directly and write its
/// position. Stars and satellites are left alone; satellites are handled
/// by [`crate::satellites::propagate`] once their parents have moved.
pub fn advance_primaries(system: &mut SolarSystem, scaled_delta: f64) {
    for id in system.ids() {
        let body = &mut system[id];
        if body.is_star() || body.parent.is_some() {
            continue;
        }
        if let Some(orbit) = body.orbit.as_mut() {
            orbit.advance(scaled_delta);
            body.position = orbit.offset();
        }
    }
}

#[cfg(test)]
fn assert_close(a: f64, b: f64) {
    assert!((a - b).abs() < 1e-9, "{a} != {b}");
}

#[test]
fn angle_stays_wrapped() {
    for e in [0.0, 0.3, 0.9] {
        let mut orbit = Orbit::new(10.0, e, 0.7);
        for dt in [0.0, 0.016, 1.0, 9.0, 123.456, 1e6] {
            orbit.advance(dt);
            assert!((0.0..consts::TAU).contains(&orbit.angle), "{orbit:?}");
        }
    }
    assert_close(wrap_angle(consts::TAU), 0.0);
    assert_close(wrap_angle(consts::TAU + 0.5), 0.5);
}

#[test]
fn circular_orbit_keeps_radius() {
    let mut orbit = Orbit::new(10.0, 0.0, 1.0);
    for delta in [0.1, 0.5, 1.0, 2.5, 3.0, 100.0] {
        orbit.advance(delta);
        let p = orbit.offset();
        assert_close(p.x * p.x + p.z * p.z, 100.0);
        assert_close(p.y, 0.0);
    }
}

#[test]
fn elliptical_orbit_apsides() {
    let orbit = Orbit::new(40.0, 0.25, 0.0);
    assert_close(orbit.radius_at(0.0), 40.0 * 0.75);
    assert_close(orbit.radius_at(consts::PI), 40.0 * 1.25);
    assert_close(orbit.radius_at(0.0), orbit.periapsis_radius());
    assert_close(orbit.radius_at(consts::PI), orbit.apoapsis_radius());

    let p = orbit.with_angle(consts::PI).offset();
    assert_close(p.x, -50.0);
    assert!(p.z.abs() < 1e-9);
}

#[test]
fn angle_advances_linearly() {
    let mut orbit = Orbit::new(20.0, 0.5, 0.01);
    orbit.advance(1.0);
    assert_close(orbit.angle, 0.01);
    orbit.advance(1.0);
    assert_close(orbit.angle, 0.02);
}

#[test]
fn rotation_accumulates_unbounded() {
    let mut rotation = Rotation::new(2.0);
    rotation.advance(5.0);
    assert_close(rotation.angle, 10.0);
}
