use bevy::prelude::*;
use bevy_implicit_curve::{
    CurveConfig, ImplicitCurve, ImplicitCurvePlugin, plugin::CurveSource, types::Point,
};

fn main() {
    App::new()
        .add_plugins((DefaultPlugins, ImplicitCurvePlugin::default()))
        .add_systems(Startup, setup)
        .run();
}

fn setup(mut commands: Commands, mut materials: ResMut<Assets<ColorMaterial>>) {
    bevy::log::info!("Cubic Example");

    commands.spawn(Camera2d);

    // y^2 = x^3 - x: an oval plus an open branch
    let curve = match ImplicitCurve::new(
        |p: Point| p.y * p.y - p.x * p.x * p.x + p.x,
        (-2.0, 2.0),
        (-2.0, 2.0),
        CurveConfig::default().with_resolution(200, 200),
    ) {
        Ok(curve) => curve,
        Err(err) => {
            error!("invalid curve: {err}");
            return;
        }
    };

    commands.spawn((
        CurveSource::new(curve),
        MeshMaterial2d(materials.add(Color::srgb(1., 0., 0.))),
        Transform::from_scale(Vec3::splat(120.)),
    ));
}
