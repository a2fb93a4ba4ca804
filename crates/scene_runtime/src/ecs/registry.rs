//! Component kind registry
//!
//! Maps interned kind tags to constructor functions. Registration is
//! idempotent; a missing kind referenced as a dependency is registered
//! automatically with a warning rather than treated as an error.

use std::collections::HashMap;

use super::component::{Component, ComponentCtor, ComponentKind};

/// Kind-tag to constructor table
#[derive(Default)]
pub struct ComponentRegistry {
    ctors: HashMap<ComponentKind, ComponentCtor>,
}

impl ComponentRegistry {
    /// Create a registry preloaded with the builtin component kinds
    pub fn with_builtins() -> Self {
        let mut registry = Self::default();
        registry.register(ComponentKind::TRANSFORM, || {
            Box::new(super::components::TransformComponent::default())
        });
        registry.register(ComponentKind::RENDER, || {
            Box::new(super::components::RenderComponent::default())
        });
        registry.register(ComponentKind::PHYSICS, || {
            Box::new(super::components::PhysicsComponent::default())
        });
        registry
    }

    /// Register a kind; repeated registration of the same kind is a no-op
    pub fn register(&mut self, kind: ComponentKind, ctor: ComponentCtor) {
        if self.ctors.contains_key(&kind) {
            log::debug!("component kind {kind} already registered");
            return;
        }
        self.ctors.insert(kind, ctor);
    }

    /// Register a dependency kind that was never registered explicitly
    pub fn auto_register(&mut self, kind: ComponentKind, ctor: ComponentCtor) {
        if !self.ctors.contains_key(&kind) {
            log::warn!("auto-registering unregistered component kind {kind}");
            self.ctors.insert(kind, ctor);
        }
    }

    /// Whether a kind is known
    pub fn is_registered(&self, kind: ComponentKind) -> bool {
        self.ctors.contains_key(&kind)
    }

    /// Construct a fresh component of `kind`
    pub fn create(&self, kind: ComponentKind) -> Option<Box<dyn Component>> {
        self.ctors.get(&kind).map(|ctor| ctor())
    }

    /// Number of registered kinds
    pub fn len(&self) -> usize {
        self.ctors.len()
    }

    /// Whether no kinds are registered
    pub fn is_empty(&self) -> bool {
        self.ctors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::TransformComponent;

    #[test]
    fn registration_is_idempotent() {
        let mut registry = ComponentRegistry::default();
        registry.register(ComponentKind::TRANSFORM, || {
            Box::new(TransformComponent::default())
        });
        registry.register(ComponentKind::TRANSFORM, || {
            Box::new(TransformComponent::default())
        });
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn builtins_are_preloaded() {
        let registry = ComponentRegistry::with_builtins();
        assert!(registry.is_registered(ComponentKind::TRANSFORM));
        assert!(registry.is_registered(ComponentKind::RENDER));
        assert!(registry.is_registered(ComponentKind::PHYSICS));

        let c = registry.create(ComponentKind::PHYSICS).unwrap();
        assert_eq!(c.kind(), ComponentKind::PHYSICS);
    }

    #[test]
    fn create_unknown_kind_returns_none() {
        let registry = ComponentRegistry::default();
        assert!(registry.create(ComponentKind("Nope")).is_none());
    }
}
