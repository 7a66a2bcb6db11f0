use std::sync::Arc;

use bevy::{
    asset::RenderAssetUsages,
    mesh::{Indices, PrimitiveTopology},
    prelude::*,
    tasks::{AsyncComputeTaskPool, Task, block_on, futures_lite::future},
};

use crate::{curve::ImplicitCurve, mesh::LineMesh};

/// System sets for the implicit curve pipeline.
///
/// Use these to order your own systems relative to curve extraction:
///
/// ```rust,ignore
/// // Inspect the line data after extraction but before it's uploaded:
/// app.add_systems(Update, measure_curve.after(ImplicitCurveSet::Generate)
///                                      .before(ImplicitCurveSet::Upload));
/// ```
///
/// ```text
/// ImplicitCurveSet::Spawn  →  [async compute]  →  ImplicitCurveSet::Generate  →  [your systems]  →  ImplicitCurveSet::Upload
/// ```
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImplicitCurveSet {
    /// Spawns an async compute task for each queued curve.
    Spawn,
    /// Polls async tasks and inserts [`LineMesh`] on completion.
    Generate,
    /// Uploads [`LineMesh`] data into a Bevy [`Mesh2d`] and removes [`QueuedCurve`].
    Upload,
}

/// The curve an entity draws.
///
/// The curve is wrapped in an [`Arc`] so the async extraction task can hold it without cloning
/// the function.
#[derive(Component, Clone)]
#[require(Transform)]
pub struct CurveSource(pub Arc<ImplicitCurve>);

impl CurveSource {
    pub fn new(curve: ImplicitCurve) -> Self {
        Self(Arc::new(curve))
    }
}

/// Marker component added to [`CurveSource`] entities that are waiting to be processed.
///
/// Removed automatically once the curve's mesh has been uploaded.
#[derive(Component)]
pub struct QueuedCurve;

/// Holds the in-flight async compute task for a [`CurveSource`].
#[derive(Component)]
pub struct ComputeTask(Task<LineMesh>);

/// Runtime configuration for the plugin.
///
/// Inserted as a resource by [`ImplicitCurvePlugin`]. Modify it at any time to change behaviour.
#[derive(Resource)]
pub struct CurvePluginConfig {
    /// Maximum number of extraction tasks spawned per frame. Default: `4`.
    pub max_tasks_per_frame: usize,
}

impl Default for CurvePluginConfig {
    fn default() -> Self {
        Self {
            max_tasks_per_frame: 4,
        }
    }
}

/// Bevy plugin that extracts implicit curves and draws them as line meshes.
///
/// When the `auto_queue` feature is enabled, any [`CurveSource`] added to the world is
/// processed automatically on Bevy's `AsyncComputeTaskPool`:
///
/// ```text
/// CurveSource added
///   → QueuedCurve inserted          (on_curve_add)
///   → ComputeTask spawned           (ImplicitCurveSet::Spawn)
///   → [async extraction runs]
///   → LineMesh inserted             (ImplicitCurveSet::Generate, once task completes)
///   → Mesh2d inserted               (ImplicitCurveSet::Upload)
///   → QueuedCurve removed
/// ```
///
/// Extraction failures are logged and produce an empty mesh; they never stop the app.
pub struct ImplicitCurvePlugin {
    /// Initial value for [`CurvePluginConfig::max_tasks_per_frame`].
    pub max_tasks_per_frame: usize,
}

impl Default for ImplicitCurvePlugin {
    fn default() -> Self {
        Self {
            max_tasks_per_frame: CurvePluginConfig::default().max_tasks_per_frame,
        }
    }
}

impl Plugin for ImplicitCurvePlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(CurvePluginConfig {
            max_tasks_per_frame: self.max_tasks_per_frame,
        });

        #[cfg(feature = "auto_queue")]
        app.configure_sets(
            Update,
            (
                ImplicitCurveSet::Spawn,
                ImplicitCurveSet::Generate,
                ImplicitCurveSet::Upload,
            )
                .chain(),
        )
        .add_systems(
            Update,
            (
                on_curve_add.before(ImplicitCurveSet::Spawn),
                spawn_curve_tasks.in_set(ImplicitCurveSet::Spawn),
                poll_curve_tasks.in_set(ImplicitCurveSet::Generate),
                upload_curve.in_set(ImplicitCurveSet::Upload),
            ),
        );
    }
}

/// Inserts [`QueuedCurve`] on every newly added or changed [`CurveSource`].
///
/// A curve changed while its extraction is in flight drops the stale task (and any finished but
/// not yet uploaded [`LineMesh`]) so the new curve is extracted from scratch.
pub fn on_curve_add(mut commands: Commands, query: Query<Entity, Changed<CurveSource>>) {
    for entity in query.iter() {
        commands
            .entity(entity)
            .remove::<(ComputeTask, LineMesh)>()
            .insert(QueuedCurve);
    }
}

/// Spawns extraction tasks for [`QueuedCurve`]s, up to
/// [`CurvePluginConfig::max_tasks_per_frame`] per frame.
pub fn spawn_curve_tasks(
    mut commands: Commands,
    config: Res<CurvePluginConfig>,
    query: Query<(Entity, &CurveSource), (With<QueuedCurve>, Without<ComputeTask>, Without<LineMesh>)>,
) {
    let task_pool = AsyncComputeTaskPool::get();

    for (entity, source) in query.iter().take(config.max_tasks_per_frame) {
        let curve = Arc::clone(&source.0);
        let task = task_pool.spawn(async move { extract_line_mesh(&curve) });
        commands.entity(entity).insert(ComputeTask(task));
    }
}

/// Polls in-flight [`ComputeTask`]s each frame and inserts [`LineMesh`] on completion.
pub fn poll_curve_tasks(mut commands: Commands, mut query: Query<(Entity, &mut ComputeTask)>) {
    for (entity, mut compute_task) in query.iter_mut() {
        if let Some(line_mesh) = block_on(future::poll_once(&mut compute_task.0)) {
            commands
                .entity(entity)
                .insert(line_mesh)
                .remove::<ComputeTask>();
        }
    }
}

/// Uploads a [`LineMesh`] into a Bevy [`Mesh2d`], then removes [`LineMesh`] and [`QueuedCurve`].
pub fn upload_curve(
    mut commands: Commands,
    query: Query<(Entity, &LineMesh), With<QueuedCurve>>,
    mut meshes: ResMut<Assets<Mesh>>,
) {
    for (entity, line_mesh) in query.iter() {
        commands
            .entity(entity)
            .insert(Mesh2d(meshes.add(to_bevy_mesh(line_mesh))))
            .remove::<(QueuedCurve, LineMesh)>();
    }
}

/// Runs the extraction, logging instead of failing.
fn extract_line_mesh(curve: &ImplicitCurve) -> LineMesh {
    match curve.line_mesh() {
        Ok(mesh) => mesh,
        Err(err) => {
            warn!("implicit curve extraction failed: {err}");
            LineMesh::new_empty()
        }
    }
}

/// Converts line-list data into a Bevy mesh.
pub fn to_bevy_mesh(line_mesh: &LineMesh) -> Mesh {
    let mut bevy_mesh = Mesh::new(PrimitiveTopology::LineList, RenderAssetUsages::RENDER_WORLD);
    bevy_mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, line_mesh.positions.clone());
    bevy_mesh.insert_indices(Indices::U32(line_mesh.indices.clone()));
    bevy_mesh
}

#[cfg(test)]
mod tests {
    use bevy::ecs::system::RunSystemOnce;

    use super::*;
    use crate::{curve::CurveConfig, types::Point};

    fn source() -> CurveSource {
        CurveSource::new(
            ImplicitCurve::new(|p: Point| p.x, (-1., 1.), (-1., 1.), CurveConfig::default())
                .unwrap(),
        )
    }

    #[test]
    fn new_curve_is_queued() {
        let mut world = World::new();
        let entity = world.spawn(source()).id();

        world.run_system_once(on_curve_add).unwrap();

        assert!(world.entity(entity).contains::<QueuedCurve>());
    }

    #[test]
    fn curve_changed_mid_extraction_is_requeued() {
        let mut world = World::new();
        let entity = world
            .spawn((source(), QueuedCurve, LineMesh::new_empty()))
            .id();

        world.run_system_once(on_curve_add).unwrap();

        let entity = world.entity(entity);
        assert!(entity.contains::<QueuedCurve>());
        assert!(!entity.contains::<LineMesh>());
    }

    #[test]
    fn line_list_mesh_keeps_buffers() {
        let curve = ImplicitCurve::new(
            |p: Point| p.x,
            (-1., 1.),
            (-1., 1.),
            CurveConfig::default().with_resolution(2, 2),
        )
        .unwrap();
        let line_mesh = curve.line_mesh().unwrap();
        let mesh = to_bevy_mesh(&line_mesh);

        assert_eq!(mesh.primitive_topology(), PrimitiveTopology::LineList);
        assert_eq!(mesh.count_vertices(), line_mesh.positions.len());
        assert_eq!(mesh.indices().map(|i| i.len()), Some(line_mesh.indices.len()));
    }
}
