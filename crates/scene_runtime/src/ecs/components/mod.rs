//! Builtin component implementations

mod physics;
mod render;
mod transform;

pub use physics::PhysicsComponent;
pub use render::RenderComponent;
pub use transform::TransformComponent;
