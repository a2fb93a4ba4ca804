//! Render component
//!
//! Visibility flag for the renderer collaborator. The actual draw path
//! lives outside this runtime; this component only mirrors its enabled
//! visibility state onto the scene object each frame.

use crate::ecs::component::{Component, ComponentCtx, ComponentKind, ComponentSpec};
use serde_json::{json, Value};

/// Marks an entity as drawable and tracks its visibility
#[derive(Debug)]
pub struct RenderComponent {
    /// Whether the object should be drawn
    pub visible: bool,
    /// Opacity hint for the renderer, 0..1
    pub opacity: f32,
}

impl Default for RenderComponent {
    fn default() -> Self {
        Self {
            visible: true,
            opacity: 1.0,
        }
    }
}

impl Component for RenderComponent {
    fn kind(&self) -> ComponentKind {
        ComponentKind::RENDER
    }

    fn dependencies(&self) -> Vec<ComponentSpec> {
        vec![ComponentSpec::new(ComponentKind::TRANSFORM, || {
            Box::new(super::TransformComponent::default())
        })]
    }

    fn update(&mut self, ctx: &mut ComponentCtx<'_>, _dt: f32) {
        ctx.object.visible = self.visible;
    }

    fn on_disable(&mut self) {
        self.visible = false;
    }

    fn on_enable(&mut self) {
        self.visible = true;
    }

    fn properties(&self) -> serde_json::Map<String, Value> {
        let mut map = serde_json::Map::new();
        map.insert("visible".to_string(), json!(self.visible));
        map.insert("opacity".to_string(), json!(self.opacity));
        map
    }

    fn set_property(&mut self, key: &str, value: Value) {
        match key {
            "visible" => {
                if let Some(v) = value.as_bool() {
                    self.visible = v;
                }
            }
            "opacity" => {
                if let Some(v) = value.as_f64() {
                    self.opacity = v.clamp(0.0, 1.0) as f32;
                }
            }
            _ => {}
        }
    }
}
