//! Transform component
//!
//! Anchors the entity to its scene object's transform and exposes the
//! transform fields through the property bag. Most other components
//! declare a dependency on this kind.

use crate::ecs::component::{Component, ComponentCtx, ComponentKind};
use serde_json::{json, Value};

/// Bridge between an entity and its object's world transform
#[derive(Debug, Default)]
pub struct TransformComponent {
    /// Local offset applied once during `awake`
    pub offset: nalgebra::Vector3<f32>,
}

impl Component for TransformComponent {
    fn kind(&self) -> ComponentKind {
        ComponentKind::TRANSFORM
    }

    fn awake(&mut self, ctx: &mut ComponentCtx<'_>) {
        ctx.object.transform.position += self.offset;
    }

    fn properties(&self) -> serde_json::Map<String, Value> {
        let mut map = serde_json::Map::new();
        map.insert(
            "offset".to_string(),
            json!([self.offset.x, self.offset.y, self.offset.z]),
        );
        map
    }

    fn set_property(&mut self, key: &str, value: Value) {
        if key == "offset" {
            if let Some(v) = value.as_array() {
                if v.len() == 3 {
                    let f = |i: usize| v[i].as_f64().unwrap_or(0.0) as f32;
                    self.offset = nalgebra::Vector3::new(f(0), f(1), f(2));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{GameObject, Scene};

    #[test]
    fn offset_applied_on_awake() {
        let mut scene = Scene::new();
        let id = scene.add_object(GameObject::new("o").at(1.0, 0.0, 0.0));
        let obj = scene.get_mut(id).unwrap();

        let mut c = TransformComponent::default();
        c.set_property("offset", serde_json::json!([0.0, 2.0, 0.0]));
        c.awake(&mut ComponentCtx { object: &mut *obj });

        assert_eq!(obj.transform.position.y, 2.0);
        assert_eq!(obj.transform.position.x, 1.0);
    }
}
