//! Input handling systems

use bevy::prelude::*;

use super::components::{CameraSettings, MainCamera};

/// Handle basic keyboard input
pub fn handle_input(keyboard: Res<ButtonInput<KeyCode>>, mut exit: MessageWriter<AppExit>) {
    if keyboard.just_pressed(KeyCode::Escape) {
        exit.write(AppExit::Success);
    }
}

/// Pan with W/A/S/D and zoom with Z/X
pub fn handle_camera_movement(
    keyboard: Res<ButtonInput<KeyCode>>,
    time: Res<Time>,
    settings: Res<CameraSettings>,
    mut camera: Query<&mut Transform, With<MainCamera>>,
) {
    let Ok(mut transform) = camera.single_mut() else {
        return;
    };
    let dt = time.delta_secs();

    let mut pan = Vec3::ZERO;
    if keyboard.pressed(KeyCode::KeyW) {
        pan.z -= 1.0;
    }
    if keyboard.pressed(KeyCode::KeyS) {
        pan.z += 1.0;
    }
    if keyboard.pressed(KeyCode::KeyA) {
        pan.x -= 1.0;
    }
    if keyboard.pressed(KeyCode::KeyD) {
        pan.x += 1.0;
    }
    transform.translation += pan.normalize_or_zero() * settings.movement_speed * dt;

    let mut zoom = 0.0;
    if keyboard.pressed(KeyCode::KeyZ) {
        zoom -= 1.0;
    }
    if keyboard.pressed(KeyCode::KeyX) {
        zoom += 1.0;
    }
    transform.translation.y = (transform.translation.y + zoom * settings.zoom_speed * dt).max(20.0);
}
