//! Entity-Component runtime
//!
//! Typed property-bag components attached to entities, with declared
//! dependencies between kinds, dependency-ordered initialization and
//! per-frame updates driven by the manager.

pub mod component;
pub mod components;
pub mod entity;
pub mod manager;
pub mod registry;

pub use component::{
    AttachedComponent, Component, ComponentCtx, ComponentKind, ComponentSpec, ComponentState,
};
pub use entity::Entity;
pub use manager::EcsManager;
pub use registry::ComponentRegistry;
