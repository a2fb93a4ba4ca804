//! Scene object and transform types

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Generational handle to a scene object
    ///
    /// Stale handles fail the arena's generation check, so indices may
    /// hold ids to deleted objects without pinning their lifetime.
    pub struct ObjectId;
}

impl ObjectId {
    /// Stable integer form of this id, for script-facing APIs and the
    /// spatial index payload
    pub fn to_raw(self) -> u64 {
        slotmap::Key::data(&self).as_ffi()
    }

    /// Rebuild an id from its integer form
    pub fn from_raw(raw: u64) -> Self {
        slotmap::KeyData::from_ffi(raw).into()
    }
}

/// Position, rotation and scale of a scene object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transform {
    /// World-space position
    pub position: Vector3<f32>,
    /// Euler rotation in radians
    pub rotation: Vector3<f32>,
    /// Per-axis scale
    pub scale: Vector3<f32>,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            rotation: Vector3::zeros(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Create a transform at the given position
    pub fn at(x: f32, y: f32, z: f32) -> Self {
        Self {
            position: Vector3::new(x, y, z),
            ..Self::default()
        }
    }

    /// 2D Euclidean distance to another transform on the XZ plane
    pub fn distance_xz(&self, other: &Transform) -> f32 {
        let dx = self.position.x - other.position.x;
        let dz = self.position.z - other.position.z;
        (dx * dx + dz * dz).sqrt()
    }
}

/// An addressable scene object: a transform plus the editor-facing data
/// the runtime reads and writes back (script source, persisted script
/// properties).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameObject {
    /// Display name shown in the editor hierarchy
    pub name: String,

    /// World transform
    pub transform: Transform,

    /// XZ extent used when building the spatial index
    pub bounds: f32,

    /// Raw script source attached to this object, if any
    pub script: Option<String>,

    /// Script property bag persisted across instance teardown
    #[serde(default)]
    pub script_properties: serde_json::Map<String, serde_json::Value>,

    /// Whether the object is drawn (mirrored by the render component)
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_visible() -> bool {
    true
}

impl GameObject {
    /// Create an object with a default transform
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::default(),
            bounds: 1.0,
            script: None,
            script_properties: serde_json::Map::new(),
            visible: true,
        }
    }

    /// Builder-style position setter
    pub fn at(mut self, x: f32, y: f32, z: f32) -> Self {
        self.transform = Transform::at(x, y, z);
        self
    }

    /// Builder-style script source setter
    pub fn with_script(mut self, source: impl Into<String>) -> Self {
        self.script = Some(source.into());
        self
    }
}
