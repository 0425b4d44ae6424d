//! UI module that visualizes the simulation state using Bevy
//!
//! This module is purely for visualization. All simulation logic is in the
//! `simulation` module; the viewer plays the host simulator, feeding the
//! airport a clock and a viewer position and drawing the poses it returns.

mod components;
mod input;
mod sync;
mod world;

use bevy::log::LogPlugin;
use bevy::prelude::*;

use crate::simulation::{Airport, FlatEarthHost, HostServices, SimClock};

pub use components::{AirportResource, EntityMappings, VisiblePoses};

use components::CameraSettings;
use input::{handle_camera_movement, handle_input};
use sync::{draw_paths, sync_vehicles, tick_simulation};
use world::setup_world;

/// Plugin to register all UI systems
pub struct GroundTrafficUIPlugin;

impl Plugin for GroundTrafficUIPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<EntityMappings>()
            .init_resource::<VisiblePoses>()
            .init_resource::<CameraSettings>()
            .add_systems(Startup, setup_world)
            .add_systems(FixedUpdate, tick_simulation)
            .add_systems(
                Update,
                (
                    sync_vehicles,
                    draw_paths,
                    handle_input,
                    handle_camera_movement,
                ),
            );
    }
}

/// Open a window and run the airport until the user quits
pub fn run(airport: Airport, host: FlatEarthHost, clock: SimClock) {
    println!("Starting Ground Traffic viewer...");
    println!();
    println!("Camera Controls:");
    println!("  W/A/S/D     - Move camera");
    println!("  Z/X         - Zoom in/out");
    println!("  ESC         - Exit");
    println!();

    let viewer = host.world_to_local(&airport.tower);
    let title = format!("Ground Traffic - {}", airport.icao);

    App::new()
        .add_plugins(
            DefaultPlugins
                .set(LogPlugin {
                    filter: "warn,ground_traffic=info".to_string(),
                    level: bevy::log::Level::DEBUG,
                    ..default()
                })
                .set(WindowPlugin {
                    primary_window: Some(Window {
                        title,
                        resolution: (1280, 720).into(),
                        ..default()
                    }),
                    ..default()
                }),
        )
        .insert_resource(AirportResource {
            airport,
            host,
            clock,
            viewer,
        })
        .add_plugins(GroundTrafficUIPlugin)
        .run();
}
