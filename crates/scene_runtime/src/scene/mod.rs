//! Scene object registry and serialization
//!
//! The scene owns every `GameObject` in a generational arena. The
//! editor collaborator creates and deletes objects here; the runtime
//! reads transforms and script sources and writes script properties
//! back between frames.

mod object;

pub use object::{GameObject, ObjectId, Transform};

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use thiserror::Error;

/// Errors raised by scene save/load
#[derive(Debug, Error)]
pub enum SceneError {
    /// Scene document could not be parsed
    #[error("failed to parse scene document: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Registry of all scene objects
#[derive(Debug, Default)]
pub struct Scene {
    objects: SlotMap<ObjectId, GameObject>,
}

/// On-disk form of a single object
#[derive(Debug, Serialize, Deserialize)]
struct ObjectData {
    name: String,
    transform: Transform,
    bounds: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    script: Option<String>,
    #[serde(default)]
    script_properties: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    visible: bool,
}

/// On-disk form of a whole scene
#[derive(Debug, Serialize, Deserialize)]
struct SceneData {
    objects: Vec<ObjectData>,
}

impl Scene {
    /// Create an empty scene
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object, returning its handle
    pub fn add_object(&mut self, object: GameObject) -> ObjectId {
        self.objects.insert(object)
    }

    /// Remove an object; returns it if the handle was live
    pub fn remove_object(&mut self, id: ObjectId) -> Option<GameObject> {
        self.objects.remove(id)
    }

    /// Look up an object
    pub fn get(&self, id: ObjectId) -> Option<&GameObject> {
        self.objects.get(id)
    }

    /// Look up an object mutably
    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut GameObject> {
        self.objects.get_mut(id)
    }

    /// Generation-checked liveness test
    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(id)
    }

    /// Number of live objects
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the scene holds no objects
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Iterate over all live objects
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &GameObject)> {
        self.objects.iter()
    }

    /// Iterate mutably over all live objects
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ObjectId, &mut GameObject)> {
        self.objects.iter_mut()
    }

    /// Ids of all live objects, in arena order
    pub fn ids(&self) -> Vec<ObjectId> {
        self.objects.keys().collect()
    }

    /// Serialize the scene to a JSON document
    pub fn save_scene(&self) -> Result<String, SceneError> {
        let data = SceneData {
            objects: self
                .objects
                .values()
                .map(|o| ObjectData {
                    name: o.name.clone(),
                    transform: o.transform.clone(),
                    bounds: o.bounds,
                    script: o.script.clone(),
                    script_properties: o.script_properties.clone(),
                    visible: o.visible,
                })
                .collect(),
        };
        Ok(serde_json::to_string_pretty(&data)?)
    }

    /// Replace the scene contents from a JSON document
    pub fn load_scene(&mut self, json: &str) -> Result<Vec<ObjectId>, SceneError> {
        let data: SceneData = serde_json::from_str(json)?;
        self.objects.clear();
        let ids = data
            .objects
            .into_iter()
            .map(|o| {
                self.objects.insert(GameObject {
                    name: o.name,
                    transform: o.transform,
                    bounds: o.bounds,
                    script: o.script,
                    script_properties: o.script_properties,
                    visible: o.visible,
                })
            })
            .collect();
        Ok(ids)
    }
}
