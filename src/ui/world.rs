//! World setup systems for camera, lighting, and ground

use bevy::prelude::*;

use super::components::{to_vec3, AirportResource, Ground, MainCamera};

/// Height [m] of the camera above the tower at startup
const CAMERA_HEIGHT: f32 = 600.0;

/// System to setup the world environment (ground, lighting, camera)
pub fn setup_world(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    sim: Res<AirportResource>,
) {
    let tower = to_vec3(&sim.viewer);

    // Top-down view with north at the top of the screen
    commands.spawn((
        MainCamera,
        Camera3d::default(),
        Transform::from_translation(tower + Vec3::Y * CAMERA_HEIGHT).looking_at(tower, Vec3::NEG_Z),
    ));

    commands.spawn((
        DirectionalLight {
            illuminance: 10000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(4.0, 8.0, 4.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    // Ground plane sized to the draw range
    commands.spawn((
        Ground,
        Mesh3d(meshes.add(Plane3d::default().mesh().size(8000.0, 8000.0))),
        MeshMaterial3d(materials.add(Color::srgb(0.3, 0.5, 0.3))),
        Transform::from_translation(Vec3::new(tower.x, tower.y - 0.05, tower.z)),
    ));
}
