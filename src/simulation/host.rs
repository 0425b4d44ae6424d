//! Services the simulation needs from the host simulator
//!
//! The engine never talks to a renderer directly. Everything it needs from the
//! outside world goes through [`HostServices`]: coordinate transforms, terrain
//! probes, externally published values and object loading.

use std::collections::HashMap;

use super::types::{GeoLocation, Point};

/// Metres per degree of latitude on a spherical earth
const METRES_PER_DEGREE: f64 = 6_371_000.0 * std::f64::consts::PI / 180.0;

/// Opaque handle to a drawable object loaded by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectHandle(pub u32);

pub trait HostServices {
    /// Convert a geodetic location to renderer-local coordinates.
    /// An unknown altitude is treated as zero.
    fn world_to_local(&self, location: &GeoLocation) -> Point;

    /// Convert renderer-local coordinates back to a geodetic location
    fn local_to_world(&self, point: &Point) -> GeoLocation;

    /// Terrain height (local `y`) under the given local x/z, if the probe hits
    fn probe_terrain(&mut self, x: f32, z: f32) -> Option<f32>;

    /// Current value of an externally published numeric value
    fn dataref_value(&self, name: &str, index: Option<usize>) -> Option<f32>;

    /// Resolve a visual object name to a drawable handle
    fn load_object(&mut self, name: &str) -> Option<ObjectHandle>;
}

/// A self-contained host with an equirectangular projection about a
/// reference point and flat terrain.
///
/// Used by the headless runner, the Bevy viewer and the tests.
#[derive(Debug, Clone)]
pub struct FlatEarthHost {
    pub origin: GeoLocation,
    pub ground_height: f32,
    /// Values readable by `when`/`and` clauses, keyed by (name, index)
    pub datarefs: HashMap<(String, Option<usize>), f32>,
    /// Object names that fail to load
    pub missing_objects: Vec<String>,
    /// Number of terrain probes served
    pub probe_count: usize,
    objects: HashMap<String, ObjectHandle>,
}

impl FlatEarthHost {
    pub fn new(origin: GeoLocation) -> Self {
        Self {
            origin,
            ground_height: 0.0,
            datarefs: HashMap::new(),
            missing_objects: Vec::new(),
            probe_count: 0,
            objects: HashMap::new(),
        }
    }

    pub fn set_dataref(&mut self, name: &str, index: Option<usize>, value: f32) {
        self.datarefs.insert((name.to_string(), index), value);
    }

    /// Move the projection origin, as when the host shifts its local frame
    pub fn shift_origin(&mut self, origin: GeoLocation) {
        self.origin = origin;
    }

    fn metres_per_degree_lon(&self) -> f64 {
        METRES_PER_DEGREE * self.origin.lat.to_radians().cos()
    }
}

impl HostServices for FlatEarthHost {
    fn world_to_local(&self, location: &GeoLocation) -> Point {
        let east = (location.lon - self.origin.lon) * self.metres_per_degree_lon();
        let north = (location.lat - self.origin.lat) * METRES_PER_DEGREE;
        Point::new(
            east as f32,
            location.alt.unwrap_or(0.0) as f32,
            -north as f32,
        )
    }

    fn local_to_world(&self, point: &Point) -> GeoLocation {
        GeoLocation {
            lat: self.origin.lat + (-point.z as f64) / METRES_PER_DEGREE,
            lon: self.origin.lon + point.x as f64 / self.metres_per_degree_lon(),
            alt: Some(point.y as f64),
        }
    }

    fn probe_terrain(&mut self, _x: f32, _z: f32) -> Option<f32> {
        self.probe_count += 1;
        Some(self.ground_height)
    }

    fn dataref_value(&self, name: &str, index: Option<usize>) -> Option<f32> {
        self.datarefs.get(&(name.to_string(), index)).copied()
    }

    fn load_object(&mut self, name: &str) -> Option<ObjectHandle> {
        if self.missing_objects.iter().any(|missing| missing == name) {
            return None;
        }
        let next = self.objects.len() as u32;
        Some(*self
            .objects
            .entry(name.to_string())
            .or_insert(ObjectHandle(next)))
    }
}
