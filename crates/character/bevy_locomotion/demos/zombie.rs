//! Keyboard-driven zombie: W/S or Up/Down to walk, Shift to run, A/Left and Right arrow
//! to turn, D to dance.
//!
//! Run from the workspace root so `fixtures/` resolves:
//! `cargo run -p bevy_locomotion --example zombie`

use bevy::prelude::*;
use bevy_locomotion::{CharacterMesh, LocomotionEvent, LocomotionPlugin};
use locomotion_core::{ControllerConfig, ControllerEvent};

fn main() {
    let config = ControllerConfig::from_path("fixtures/characters/zombie/config.json")
        .map(|mut cfg| {
            cfg.asset_root = "fixtures/characters/zombie".into();
            cfg
        })
        .unwrap_or_else(|e| {
            eprintln!("falling back to default config: {e}");
            ControllerConfig::default()
        });

    App::new()
        .add_plugins(DefaultPlugins)
        .add_plugins(LocomotionPlugin::new(config))
        .add_systems(Startup, setup)
        .add_systems(Update, (dress_meshes, log_state_changes))
        .run();
}

fn setup(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    commands.spawn(DirectionalLightBundle {
        directional_light: DirectionalLight {
            illuminance: 10_000.0,
            shadows_enabled: true,
            ..default()
        },
        transform: Transform::from_xyz(-10.0, 10.0, 10.0).looking_at(Vec3::ZERO, Vec3::Y),
        ..default()
    });
    commands.spawn(PbrBundle {
        mesh: meshes.add(Plane3d::default().mesh().size(100.0, 100.0)),
        material: materials.add(Color::srgb(0.25, 0.25, 0.25)),
        ..default()
    });
    commands.spawn(Camera3dBundle {
        transform: Transform::from_xyz(25.0, 10.0, 25.0).looking_at(Vec3::ZERO, Vec3::Y),
        ..default()
    });
}

/// The descriptors carry no geometry; give each mesh entity a placeholder capsule.
fn dress_meshes(
    mut commands: Commands,
    added: Query<(Entity, &CharacterMesh), Added<CharacterMesh>>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    for (i, (entity, _)) in added.iter().enumerate() {
        commands.entity(entity).insert((
            meshes.add(Capsule3d::new(2.0, 8.0)),
            materials.add(Color::srgb(0.4, 0.6, 0.3)),
            Transform::from_xyz(0.0, 6.0 + i as f32 * 0.5, 0.0),
        ));
    }
}

fn log_state_changes(mut events: EventReader<LocomotionEvent>) {
    for LocomotionEvent(event) in events.read() {
        if let ControllerEvent::StateChanged { from, to } = event {
            info!("state {from:?} -> {to}");
        }
    }
}
