//! Toy physics component
//!
//! Velocity integration with constant gravity and a ground plane at
//! y = 0. This is deliberately a placeholder, not a solver: it exists
//! so scripted objects can fall and bounce believably in the editor.

use crate::ecs::component::{Component, ComponentCtx, ComponentKind, ComponentSpec};
use nalgebra::Vector3;
use serde_json::{json, Value};

/// Placeholder rigid-body motion
#[derive(Debug)]
pub struct PhysicsComponent {
    /// Current velocity
    pub velocity: Vector3<f32>,
    /// Downward acceleration applied every update
    pub gravity: f32,
    /// Velocity kept after hitting the ground plane
    pub restitution: f32,
    /// Whether gravity applies
    pub use_gravity: bool,
}

impl Default for PhysicsComponent {
    fn default() -> Self {
        Self {
            velocity: Vector3::zeros(),
            gravity: -9.81,
            restitution: 0.4,
            use_gravity: true,
        }
    }
}

impl Component for PhysicsComponent {
    fn kind(&self) -> ComponentKind {
        ComponentKind::PHYSICS
    }

    fn dependencies(&self) -> Vec<ComponentSpec> {
        vec![ComponentSpec::new(ComponentKind::TRANSFORM, || {
            Box::new(super::TransformComponent::default())
        })]
    }

    fn update(&mut self, ctx: &mut ComponentCtx<'_>, dt: f32) {
        if self.use_gravity {
            self.velocity.y += self.gravity * dt;
        }
        ctx.object.transform.position += self.velocity * dt;

        let pos = &mut ctx.object.transform.position;
        if pos.y < 0.0 {
            pos.y = 0.0;
            if self.velocity.y < 0.0 {
                self.velocity.y = -self.velocity.y * self.restitution;
                // Kill tiny residual bounces.
                if self.velocity.y.abs() < 0.05 {
                    self.velocity.y = 0.0;
                }
            }
        }
    }

    fn properties(&self) -> serde_json::Map<String, Value> {
        let mut map = serde_json::Map::new();
        map.insert(
            "velocity".to_string(),
            json!([self.velocity.x, self.velocity.y, self.velocity.z]),
        );
        map.insert("gravity".to_string(), json!(self.gravity));
        map.insert("restitution".to_string(), json!(self.restitution));
        map.insert("use_gravity".to_string(), json!(self.use_gravity));
        map
    }

    fn set_property(&mut self, key: &str, value: Value) {
        match key {
            "velocity" => {
                if let Some(v) = value.as_array() {
                    if v.len() == 3 {
                        let f = |i: usize| v[i].as_f64().unwrap_or(0.0) as f32;
                        self.velocity = Vector3::new(f(0), f(1), f(2));
                    }
                }
            }
            "gravity" => {
                if let Some(v) = value.as_f64() {
                    self.gravity = v as f32;
                }
            }
            "restitution" => {
                if let Some(v) = value.as_f64() {
                    self.restitution = v.clamp(0.0, 1.0) as f32;
                }
            }
            "use_gravity" => {
                if let Some(v) = value.as_bool() {
                    self.use_gravity = v;
                }
            }
            _ => {}
        }
    }
}
