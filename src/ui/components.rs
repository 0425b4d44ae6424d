//! UI components and resources for linking Bevy entities to simulation state

use bevy::prelude::*;
use std::collections::HashMap;

use crate::simulation::{Airport, FlatEarthHost, Point, RouteId, RoutePose, SimClock};

/// Resource wrapping the airport together with the host it runs against
#[derive(Resource)]
pub struct AirportResource {
    pub airport: Airport,
    pub host: FlatEarthHost,
    pub clock: SimClock,
    /// Where the airport thinks the viewer is, in local coordinates
    pub viewer: Point,
}

/// Poses returned by the most recent simulation frame, nearest first
#[derive(Resource, Default)]
pub struct VisiblePoses(pub Vec<RoutePose>);

/// Marker component for ground plane
#[derive(Component)]
pub struct Ground;

/// Marker component for the main camera
#[derive(Component)]
pub struct MainCamera;

/// Resource to control camera movement settings
#[derive(Resource)]
pub struct CameraSettings {
    pub movement_speed: f32,
    pub zoom_speed: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            movement_speed: 150.0,
            zoom_speed: 200.0,
        }
    }
}

/// Links a Bevy entity to a simulated vehicle
#[derive(Component)]
pub struct VehicleLink(pub RouteId);

/// Resource to track Bevy entities mapped to simulated vehicles
#[derive(Resource, Default)]
pub struct EntityMappings {
    pub vehicles: HashMap<RouteId, Entity>,
}

/// Convert a simulation point to a Bevy translation. Both use x east, y up
/// and z south.
pub fn to_vec3(p: &Point) -> Vec3 {
    Vec3::new(p.x, p.y, p.z)
}
