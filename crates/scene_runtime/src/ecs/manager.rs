//! ECS manager
//!
//! Owns the entity registry, drives dependency-ordered initialization
//! and the per-frame update passes, and rebuilds the spatial index
//! from current transforms every frame so proximity queries are never
//! stale.

use std::collections::HashMap;

use crate::scene::{ObjectId, Scene};
use crate::spatial::{QuadTree, QuadTreeConfig, Rect};
use crate::workers::WorkerPool;

use super::component::{ComponentCtx, ComponentKind};
use super::entity::Entity;
use super::registry::ComponentRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitMark {
    Visiting,
    Visited,
}

/// Coordinator for entities, components and spatial queries
pub struct EcsManager {
    registry: ComponentRegistry,
    entities: HashMap<ObjectId, Entity>,
    quadtree: QuadTree,
    world_bounds: Rect,
    spatial_config: QuadTreeConfig,
    workers: Option<WorkerPool>,
}

impl EcsManager {
    /// Create a manager indexing the given world bounds
    pub fn new(world_bounds: Rect, spatial_config: QuadTreeConfig) -> Self {
        Self {
            registry: ComponentRegistry::with_builtins(),
            entities: HashMap::new(),
            quadtree: QuadTree::new(world_bounds, spatial_config),
            world_bounds,
            spatial_config,
            workers: None,
        }
    }

    /// Component kind registry
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Component kind registry, mutable
    pub fn registry_mut(&mut self) -> &mut ComponentRegistry {
        &mut self.registry
    }

    /// Create (or return the existing) entity for a scene object
    pub fn create_entity(&mut self, id: ObjectId) -> &mut Entity {
        self.entities.entry(id).or_insert_with(|| Entity::new(id))
    }

    /// Look up the entity for an object
    pub fn get_entity(&self, id: ObjectId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Look up the entity for an object, mutably
    pub fn get_entity_mut(&mut self, id: ObjectId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Attach a component to an object's entity, creating the entity
    /// on first use and resolving component dependencies
    pub fn add_component(
        &mut self,
        id: ObjectId,
        component: Box<dyn super::component::Component>,
    ) {
        let entity = self.entities.entry(id).or_insert_with(|| Entity::new(id));
        entity.add_component(&mut self.registry, component);
    }

    /// Detach all components and drop the entity; no-op if unknown
    pub fn remove_entity(&mut self, id: ObjectId) {
        if let Some(mut entity) = self.entities.remove(&id) {
            entity.detach_all();
        }
    }

    /// Number of registered entities
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Scene-wide initialization in dependency order.
    ///
    /// A depth-first traversal over each entity's component dependency
    /// graph produces a global order; `awake` runs for every enabled
    /// component in that order, then a second full pass runs `start`,
    /// so all awakes complete before any start. A component revisited
    /// while still on the traversal stack is a circular dependency:
    /// it is logged and its branch skipped, and initialization
    /// continues for the rest of the graph.
    pub fn initialize_entities(&mut self, scene: &mut Scene) {
        let mut order: Vec<(ObjectId, ComponentKind)> = Vec::new();
        let mut marks: HashMap<(ObjectId, ComponentKind), VisitMark> = HashMap::new();

        for (&id, entity) in &self.entities {
            for kind in entity.component_kinds() {
                Self::visit(entity, id, kind, &mut marks, &mut order);
            }
        }

        for &(id, kind) in &order {
            let Some(entity) = self.entities.get_mut(&id) else {
                continue;
            };
            let Some(object) = scene.get_mut(id) else {
                continue;
            };
            if let Some(component) = entity.get_component_mut(kind) {
                if component.is_enabled() {
                    component.awake(&mut ComponentCtx { object });
                }
            }
        }

        for &(id, kind) in &order {
            let Some(entity) = self.entities.get_mut(&id) else {
                continue;
            };
            let Some(object) = scene.get_mut(id) else {
                continue;
            };
            if let Some(component) = entity.get_component_mut(kind) {
                if component.is_enabled() {
                    component.start(&mut ComponentCtx { object });
                }
            }
        }

        self.rebuild_spatial_index(scene);
    }

    fn visit(
        entity: &Entity,
        id: ObjectId,
        kind: ComponentKind,
        marks: &mut HashMap<(ObjectId, ComponentKind), VisitMark>,
        order: &mut Vec<(ObjectId, ComponentKind)>,
    ) {
        match marks.get(&(id, kind)) {
            Some(VisitMark::Visited) => return,
            Some(VisitMark::Visiting) => {
                log::warn!("circular component dependency involving {kind} on {id:?}; skipping branch");
                return;
            }
            None => {}
        }

        marks.insert((id, kind), VisitMark::Visiting);

        if let Some(component) = entity.get_component(kind) {
            for dep in component.dependencies() {
                if entity.has_component(dep.kind) {
                    Self::visit(entity, id, dep.kind, marks, order);
                }
            }
        }

        marks.insert((id, kind), VisitMark::Visited);
        order.push((id, kind));
    }

    /// Per-frame component update, then an unconditional spatial
    /// rebuild so next frame's queries see fresh transforms.
    pub fn update_entities(&mut self, scene: &mut Scene, dt: f32) {
        for (&id, entity) in &mut self.entities {
            if let Some(object) = scene.get_mut(id) {
                entity.update_components(&mut ComponentCtx { object }, dt);
            }
        }
        for (&id, entity) in &mut self.entities {
            if let Some(object) = scene.get_mut(id) {
                entity.late_update_components(&mut ComponentCtx { object }, dt);
            }
        }
        self.rebuild_spatial_index(scene);
    }

    /// Rebuild the quadtree from every live scene object's transform.
    ///
    /// All objects are indexed, not just those with components, so
    /// script-driven movers participate in proximity queries too.
    pub fn rebuild_spatial_index(&mut self, scene: &Scene) {
        self.quadtree = QuadTree::new(self.world_bounds, self.spatial_config);
        for (id, object) in scene.iter() {
            let half = object.bounds / 2.0;
            self.quadtree.insert(Rect::new(
                object.transform.position.x - half,
                object.transform.position.z - half,
                object.bounds,
                object.bounds,
                id.to_raw(),
            ));
        }
    }

    /// Objects whose bounds intersect the rectangle with minimum
    /// corner (x, z) and extents (w, h)
    pub fn query_area(&self, x: f32, z: f32, w: f32, h: f32) -> Vec<ObjectId> {
        let mut found = Vec::new();
        self.quadtree
            .query(&Rect::new(x, z, w, h, 0), &mut found);
        found.iter().map(|r| ObjectId::from_raw(r.id)).collect()
    }

    /// Objects whose position lies within Euclidean distance `r` of
    /// (x, z): a broad bounding-box query narrowed by the exact
    /// distance test, so the result is exact rather than approximate.
    pub fn query_radius(&self, scene: &Scene, x: f32, z: f32, r: f32) -> Vec<ObjectId> {
        self.query_area(x - r, z - r, r * 2.0, r * 2.0)
            .into_iter()
            .filter(|&id| {
                scene.get(id).is_some_and(|object| {
                    let dx = object.transform.position.x - x;
                    let dz = object.transform.position.z - z;
                    dx * dx + dz * dz <= r * r
                })
            })
            .collect()
    }

    /// Install the worker pool used while in play mode
    pub fn set_worker_pool(&mut self, pool: WorkerPool) {
        self.workers = Some(pool);
    }

    /// Access the worker pool, if running
    pub fn workers_mut(&mut self) -> Option<&mut WorkerPool> {
        self.workers.as_mut()
    }

    /// Terminate and clear any outstanding workers (play-mode exit)
    pub fn terminate_all_workers(&mut self) {
        if let Some(mut pool) = self.workers.take() {
            log::info!("terminating worker pool ({} tasks outstanding)", pool.pending());
            pool.terminate();
        }
    }
}
