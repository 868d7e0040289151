//! Definitions of simulated celestial bodies.

use std::{
    collections::HashMap,
    fmt,
    ops::{Index, IndexMut},
    sync::Arc,
};

use color_eyre::eyre::{self, bail, OptionExt};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::{
    arena::{Arena, IdLike, Ids},
    kepler::orbits::{Orbit, Rotation},
};

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct BodyId(usize);

impl IdLike for BodyId {
    fn from_raw(index: usize) -> Self {
        Self(index)
    }

    fn into_raw(self) -> usize {
        self.0
    }
}

impl fmt::Debug for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BodyId({})", self.0)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BodyKind {
    Star,
    #[default]
    Planet,
    Moon,
    DwarfPlanet,
}

/// A celestial body.
#[derive(Clone, Debug, PartialEq)]
pub struct CelestialBody {
    /// Unique key, e.g. `terra` or `io`.
    pub id: Arc<str>,
    pub kind: BodyKind,
    /// Mass (`kg × 10⁻²⁴`), if known.
    pub mass: Option<f64>,
    /// Orbit around the parent, or around the origin if there is none.
    pub orbit: Option<Orbit>,
    pub rotation: Rotation,
    /// World position.
    pub position: Vector3<f64>,
    /// Only meaningful while gravity drives the system.
    pub velocity: Vector3<f64>,
    /// The body this one orbits, if any.
    pub parent: Option<BodyId>,
    /// Bodies orbiting this body.
    pub satellites: Vec<BodyId>,
}

impl CelestialBody {
    pub fn new(id: impl Into<Arc<str>>, kind: BodyKind) -> Self {
        Self {
            id: id.into(),
            kind,
            mass: None,
            orbit: None,
            rotation: Rotation::default(),
            position: Vector3::zeros(),
            velocity: Vector3::zeros(),
            parent: None,
            satellites: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_mass(mut self, mass: f64) -> Self {
        self.mass = Some(mass);
        self
    }

    #[must_use]
    pub fn with_orbit(mut self, orbit: Orbit) -> Self {
        self.orbit = Some(orbit);
        self
    }

    #[must_use]
    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    #[must_use]
    pub fn with_position(mut self, position: Vector3<f64>) -> Self {
        self.position = position;
        self
    }

    pub fn is_star(&self) -> bool {
        self.kind == BodyKind::Star
    }

    pub fn mass_or(&self, fallback: f64) -> f64 {
        self.mass.unwrap_or(fallback)
    }
}

/// The registry of every tracked body, with parents always stored
/// before their satellites.
#[derive(Clone, Debug, Default)]
pub struct SolarSystem {
    bodies: Arena<BodyId, CelestialBody>,
    names: HashMap<Arc<str>, BodyId>,
}

impl SolarSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a body orbiting the origin.
    pub fn insert(&mut self, body: CelestialBody) -> eyre::Result<BodyId> {
        self.insert_inner(body, None)
    }

    /// Add a body orbiting `parent`.
    pub fn insert_satellite(
        &mut self,
        parent: BodyId,
        body: CelestialBody,
    ) -> eyre::Result<BodyId> {
        self.bodies
            .get(parent)
            .ok_or_eyre("Parent body is not registered.")?;
        self.insert_inner(body, Some(parent))
    }

    fn insert_inner(
        &mut self,
        mut body: CelestialBody,
        parent: Option<BodyId>,
    ) -> eyre::Result<BodyId> {
        if self.names.contains_key(&body.id) {
            bail!("Duplicate body id `{}`.", body.id);
        }
        if body.is_star() {
            if let Some((_, star)) = self.bodies.iter().find(|(_, b)| b.is_star()) {
                bail!(
                    "Cannot add star `{}`: `{}` is already the system's star.",
                    body.id,
                    star.id
                );
            }
            if parent.is_some() {
                bail!("Star `{}` cannot orbit another body.", body.id);
            }
        }
        if let Some(mass) = body.mass {
            if !(mass.is_finite() && mass > 0.0) {
                bail!("Body `{}` has invalid mass {mass}.", body.id);
            }
        }
        if let Some(orbit) = &body.orbit {
            if !(0.0..1.0).contains(&orbit.eccentricity) {
                bail!(
                    "Body `{}` has eccentricity {} outside [0, 1).",
                    body.id,
                    orbit.eccentricity
                );
            }
            if !(orbit.semi_major_axis.is_finite() && orbit.semi_major_axis >= 0.0) {
                bail!(
                    "Body `{}` has invalid distance {}.",
                    body.id,
                    orbit.semi_major_axis
                );
            }
            if !(orbit.angular_speed.is_finite() && orbit.angular_speed >= 0.0) {
                bail!(
                    "Body `{}` has invalid orbital speed {}.",
                    body.id,
                    orbit.angular_speed
                );
            }
        }
        if !body.rotation.angular_speed.is_finite() {
            bail!("Body `{}` has a non-finite rotation speed.", body.id);
        }

        body.parent = parent;
        let name = body.id.clone();
        let id = self.bodies.push(body);
        self.names.insert(name, id);
        if let Some(parent) = parent {
            self.bodies[parent].satellites.push(id);
        }
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn get(&self, id: BodyId) -> Option<&CelestialBody> {
        self.bodies.get(id)
    }

    pub fn lookup(&self, name: &str) -> Option<BodyId> {
        self.names.get(name).copied()
    }

    pub fn by_name(&self, name: &str) -> Option<&CelestialBody> {
        self.lookup(name).and_then(|id| self.bodies.get(id))
    }

    pub fn ids(&self) -> Ids<BodyId> {
        self.bodies.ids()
    }

    pub fn iter(&self) -> impl Iterator<Item = (BodyId, &CelestialBody)> {
        self.bodies.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (BodyId, &mut CelestialBody)> {
        self.bodies.iter_mut()
    }

    pub fn star(&self) -> Option<BodyId> {
        self.bodies.iter().find(|(_, b)| b.is_star()).map(|(id, _)| id)
    }

    /// The point `id` orbits: its parent's world position, or the origin.
    pub fn reference_centre(&self, id: BodyId) -> Vector3<f64> {
        self.bodies[id]
            .parent
            .map_or_else(Vector3::zeros, |parent| self.bodies[parent].position)
    }
}

impl Index<BodyId> for SolarSystem {
    type Output = CelestialBody;

    fn index(&self, index: BodyId) -> &Self::Output {
        &self.bodies[index]
    }
}

impl IndexMut<BodyId> for SolarSystem {
    fn index_mut(&mut self, index: BodyId) -> &mut Self::Output {
        &mut self.bodies[index]
    }
}

#[test]
fn satellites_link_to_parents() {
    let mut system = SolarSystem::new();
    let sol = system
        .insert(CelestialBody::new("sol", BodyKind::Star))
        .unwrap();
    let terra = system
        .insert(
            CelestialBody::new("terra", BodyKind::Planet)
                .with_orbit(Orbit::new(20.0, 0.0, 0.01))
                .with_position(Vector3::new(20.0, 0.0, 0.0)),
        )
        .unwrap();
    let luna = system
        .insert_satellite(
            terra,
            CelestialBody::new("luna", BodyKind::Moon).with_orbit(Orbit::new(3.0, 0.05, 0.1)),
        )
        .unwrap();

    assert_eq!(system.star(), Some(sol));
    assert_eq!(system[luna].parent, Some(terra));
    assert_eq!(system[terra].satellites, vec![luna]);
    assert_eq!(system.lookup("luna"), Some(luna));
    assert_eq!(system.reference_centre(luna), Vector3::new(20.0, 0.0, 0.0));
    assert_eq!(system.reference_centre(terra), Vector3::zeros());
}

#[test]
fn rejects_invalid_bodies() {
    let mut system = SolarSystem::new();
    system
        .insert(CelestialBody::new("sol", BodyKind::Star))
        .unwrap();
    assert!(system
        .insert(CelestialBody::new("sol", BodyKind::Planet))
        .is_err());
    assert!(system
        .insert(CelestialBody::new("vega", BodyKind::Star))
        .is_err());
    assert!(system
        .insert(CelestialBody::new("x", BodyKind::Planet).with_orbit(Orbit::new(5.0, 1.0, 0.1)))
        .is_err());
    assert!(system
        .insert(CelestialBody::new("y", BodyKind::Planet).with_mass(0.0))
        .is_err());
    assert!(system
        .insert_satellite(
            BodyId::from_raw(42),
            CelestialBody::new("z", BodyKind::Moon)
        )
        .is_err());
    assert_eq!(system.len(), 1);
}
