//! Entity: a scene object's component set
//!
//! Components are stored in insertion order and keyed by kind; at most
//! one component of a kind lives on an entity at a time.

use super::component::{AttachedComponent, Component, ComponentCtx, ComponentKind};
use super::registry::ComponentRegistry;
use crate::scene::ObjectId;

/// Addressable game object wrapping a component set
pub struct Entity {
    id: ObjectId,
    components: Vec<AttachedComponent>,
}

impl Entity {
    /// Create an entity for the scene object `id`
    pub fn new(id: ObjectId) -> Self {
        Self {
            id,
            components: Vec::new(),
        }
    }

    /// Owning scene object id
    pub fn id(&self) -> ObjectId {
        self.id
    }

    fn index_of(&self, kind: ComponentKind) -> Option<usize> {
        self.components.iter().position(|c| c.kind() == kind)
    }

    /// Attach a component, resolving its declared dependencies first.
    ///
    /// Each dependency kind is auto-registered if unknown and
    /// recursively attached if the entity lacks an instance. Attaching
    /// a kind the entity already has is a no-op.
    pub fn add_component(
        &mut self,
        registry: &mut ComponentRegistry,
        component: Box<dyn Component>,
    ) -> &mut AttachedComponent {
        let mut resolving = Vec::new();
        self.add_component_guarded(registry, component, &mut resolving)
    }

    fn add_component_guarded(
        &mut self,
        registry: &mut ComponentRegistry,
        component: Box<dyn Component>,
        resolving: &mut Vec<ComponentKind>,
    ) -> &mut AttachedComponent {
        let kind = component.kind();
        if let Some(index) = self.index_of(kind) {
            log::debug!("entity {:?} already has component {kind}", self.id);
            return &mut self.components[index];
        }

        resolving.push(kind);
        for dep in component.dependencies() {
            registry.auto_register(dep.kind, dep.ctor);
            if resolving.contains(&dep.kind) {
                // Attach-time cycle: the dependent still attaches, the
                // ordering is settled later during initialization.
                log::warn!("circular dependency between {kind} and {} on {:?}", dep.kind, self.id);
                continue;
            }
            if !self.has_component(dep.kind) {
                let instance = registry
                    .create(dep.kind)
                    .unwrap_or_else(|| (dep.ctor)());
                self.add_component_guarded(registry, instance, resolving);
            }
        }
        resolving.pop();

        self.components
            .push(AttachedComponent::attach(self.id, component));
        self.components
            .last_mut()
            .expect("component just pushed")
    }

    /// Attach a registered kind by tag
    pub fn add_component_kind(
        &mut self,
        registry: &mut ComponentRegistry,
        kind: ComponentKind,
    ) -> Option<&mut AttachedComponent> {
        if self.has_component(kind) {
            return self.get_component_mut(kind);
        }
        let component = registry.create(kind)?;
        Some(self.add_component(registry, component))
    }

    /// Look up a component by kind
    pub fn get_component(&self, kind: ComponentKind) -> Option<&AttachedComponent> {
        self.components.iter().find(|c| c.kind() == kind)
    }

    /// Look up a component by kind, mutably
    pub fn get_component_mut(&mut self, kind: ComponentKind) -> Option<&mut AttachedComponent> {
        self.components.iter_mut().find(|c| c.kind() == kind)
    }

    /// Whether a component of `kind` is attached
    pub fn has_component(&self, kind: ComponentKind) -> bool {
        self.index_of(kind).is_some()
    }

    /// Detach and drop the component of `kind`; no-op if absent
    pub fn remove_component(&mut self, kind: ComponentKind) {
        if let Some(index) = self.index_of(kind) {
            let mut removed = self.components.remove(index);
            removed.detach();
        }
    }

    /// Kinds attached to this entity, in insertion order
    pub fn component_kinds(&self) -> Vec<ComponentKind> {
        self.components.iter().map(AttachedComponent::kind).collect()
    }

    /// Number of attached components
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Awake then start every enabled component, in insertion order.
    ///
    /// This is the entity-local variant; scene-wide initialization goes
    /// through the manager, which orders awake calls by dependency.
    pub fn initialize_components(&mut self, ctx: &mut ComponentCtx<'_>) {
        for component in &mut self.components {
            if component.is_enabled() {
                component.awake(ctx);
            }
        }
        for component in &mut self.components {
            if component.is_enabled() {
                component.start(ctx);
            }
        }
    }

    /// Per-frame update pass over enabled components
    pub fn update_components(&mut self, ctx: &mut ComponentCtx<'_>, dt: f32) {
        for component in &mut self.components {
            component.update(ctx, dt);
        }
    }

    /// Per-frame late-update pass over enabled components
    pub fn late_update_components(&mut self, ctx: &mut ComponentCtx<'_>, dt: f32) {
        for component in &mut self.components {
            component.late_update(ctx, dt);
        }
    }

    /// Detach every component (entity removal path)
    pub fn detach_all(&mut self) {
        for component in &mut self.components {
            component.detach();
        }
        self.components.clear();
    }
}
