//! Systems for syncing Bevy entities with simulation state

use bevy::math::Isometry3d;
use bevy::prelude::*;

use super::components::{to_vec3, AirportResource, EntityMappings, VehicleLink, VisiblePoses};
use crate::simulation::AirportState;

/// Cuboid size [m] used for every vehicle: width, height, length
const VEHICLE_SIZE: (f32, f32, f32) = (2.0, 1.5, 4.0);

/// System to run one simulation frame
pub fn tick_simulation(time: Res<Time>, mut sim: ResMut<AirportResource>, mut poses: ResMut<VisiblePoses>) {
    let delta = time.delta_secs();
    let AirportResource {
        airport,
        host,
        clock,
        viewer,
    } = &mut *sim;
    clock.advance(delta);
    poses.0 = airport.frame(host, clock, viewer, delta);
}

fn vehicle_transform(position: Vec3, heading: f32) -> Transform {
    // Heading is clockwise from north (-z); Bevy's y rotation is anticlockwise
    Transform::from_translation(position + Vec3::Y * VEHICLE_SIZE.1 / 2.0)
        .with_rotation(Quat::from_rotation_y(-heading.to_radians()))
}

/// System to sync vehicle visuals from the latest poses
pub fn sync_vehicles(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    sim: Res<AirportResource>,
    poses: Res<VisiblePoses>,
    mut mappings: ResMut<EntityMappings>,
    mut vehicle_query: Query<(Entity, &VehicleLink, &mut Transform)>,
) {
    for (entity, link, mut transform) in vehicle_query.iter_mut() {
        match poses.0.iter().find(|pose| pose.route == link.0) {
            Some(pose) => *transform = vehicle_transform(to_vec3(&pose.position), pose.heading),
            None => {
                // Out of range, deactivated or reloaded away
                commands.entity(entity).despawn();
                mappings.vehicles.remove(&link.0);
            }
        }
    }

    for pose in &poses.0 {
        if mappings.vehicles.contains_key(&pose.route) {
            continue;
        }
        let [r, g, b] = sim
            .airport
            .route(pose.route)
            .map(|route| route.colour)
            .unwrap_or([0.8, 0.8, 0.8]);
        let (width, height, length) = VEHICLE_SIZE;
        let entity = commands
            .spawn((
                VehicleLink(pose.route),
                Mesh3d(meshes.add(Cuboid::new(width, height, length))),
                MeshMaterial3d(materials.add(Color::srgb(r, g, b))),
                vehicle_transform(to_vec3(&pose.position), pose.heading),
            ))
            .id();
        mappings.vehicles.insert(pose.route, entity);
    }
}

/// System to draw every path and its waypoints with gizmos
pub fn draw_paths(sim: Res<AirportResource>, mut gizmos: Gizmos) {
    let airport = &sim.airport;
    if airport.state != AirportState::Active {
        return;
    }
    for path in &airport.paths {
        let colour = Color::srgb(0.9, 0.9, 0.2);
        for (_, from, to) in path.segments() {
            let start = to_vec3(&path.nodes[from].p) + Vec3::Y * 0.1;
            let end = to_vec3(&path.nodes[to].p) + Vec3::Y * 0.1;
            gizmos.line(start, end, colour);
        }
        for node in &path.nodes {
            let waypoint = if node.has_commands() {
                Color::srgb(1.0, 0.4, 0.2)
            } else {
                Color::srgb(1.0, 1.0, 1.0)
            };
            gizmos.sphere(Isometry3d::from_translation(to_vec3(&node.p)), 1.0, waypoint);
        }
    }
}
