//! Runtime façade
//!
//! Owns the scene, the component runtime and the script system, and
//! sequences them through the edit/play mode switch. One `tick` is one
//! frame: components update first (they move objects and refresh the
//! spatial index), then scripts run against the freshly indexed world.

use crate::config::RuntimeConfig;
use crate::ecs::EcsManager;
use crate::scene::{ObjectId, Scene, SceneError};
use crate::scripting::{ScriptSystem, ScriptValidation};
use crate::spatial::Rect;
use crate::workers::WorkerPool;

/// Whether the runtime is simulating or idle for editing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Objects are edited; nothing simulates
    Edit,
    /// Components and scripts run every tick
    Play,
}

/// The complete headless runtime behind the editor
pub struct Runtime {
    config: RuntimeConfig,
    scene: Scene,
    ecs: EcsManager,
    scripts: ScriptSystem,
    mode: Mode,
    frame: u64,
}

impl Runtime {
    /// Build a runtime from configuration, with an empty scene
    pub fn new(config: RuntimeConfig) -> Self {
        let world = Rect::new(
            config.world.x,
            config.world.z,
            config.world.width,
            config.world.depth,
            0,
        );
        Self {
            scene: Scene::new(),
            ecs: EcsManager::new(world, config.spatial.into()),
            scripts: ScriptSystem::new(config.game_loop.into()),
            config,
            mode: Mode::Edit,
            frame: 0,
        }
    }

    /// Current mode
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Whether the runtime is in play mode
    pub fn is_playing(&self) -> bool {
        self.mode == Mode::Play
    }

    /// Frames ticked since entering play mode
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Scene access
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Mutable scene access for the editing collaborator
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    /// Component runtime access
    pub fn ecs(&self) -> &EcsManager {
        &self.ecs
    }

    /// Mutable component runtime access
    pub fn ecs_mut(&mut self) -> &mut EcsManager {
        &mut self.ecs
    }

    /// Script system access
    pub fn scripts(&self) -> &ScriptSystem {
        &self.scripts
    }

    /// Mutable script system access
    pub fn scripts_mut(&mut self) -> &mut ScriptSystem {
        &mut self.scripts
    }

    /// Start simulating: initialize components in dependency order and
    /// spin up the worker pool. A no-op when already playing.
    pub fn enter_play(&mut self) {
        if self.is_playing() {
            return;
        }
        log::info!(
            "entering play mode with {} objects",
            self.scene.len()
        );
        self.frame = 0;
        self.ecs.initialize_entities(&mut self.scene);
        self.ecs
            .set_worker_pool(WorkerPool::new(self.config.workers.threads));
        self.mode = Mode::Play;
    }

    /// Stop simulating: tear down script instances (running their
    /// `on_destroy` hooks, persisting property bags) and join the
    /// worker pool. A no-op when already editing.
    pub fn exit_play(&mut self) {
        if !self.is_playing() {
            return;
        }
        log::info!("exiting play mode after {} frames", self.frame);
        self.scripts.exit_play(&mut self.scene);
        self.ecs.terminate_all_workers();
        self.mode = Mode::Edit;
    }

    /// Advance one frame; does nothing outside play mode
    pub fn tick(&mut self, dt: f32) {
        if !self.is_playing() {
            return;
        }
        self.ecs.update_entities(&mut self.scene, dt);
        self.scripts
            .update_scripts(&mut self.scene, self.ecs.workers_mut(), dt);
        self.frame += 1;
    }

    /// Delete an object everywhere: scene, component runtime and the
    /// script indices
    pub fn remove_object(&mut self, id: ObjectId) {
        self.ecs.remove_entity(id);
        self.scripts.mark_for_cleanup(id);
        self.scene.remove_object(id);
    }

    /// Enable or disable one object's script instance
    pub fn set_script_enabled(&mut self, id: ObjectId, enabled: bool) {
        self.scripts.set_script_enabled(&mut self.scene, id, enabled);
    }

    /// Recompile one object's script from its current source
    pub fn hot_reload_script(&mut self, id: ObjectId) -> bool {
        self.scripts.hot_reload_script(&self.scene, id)
    }

    /// Compile-check script source without touching any object
    pub fn validate_script(&self, source: &str) -> ScriptValidation {
        self.scripts.validate_script(source)
    }

    /// Serialize the scene to a JSON document
    pub fn save_scene(&self) -> Result<String, SceneError> {
        self.scene.save_scene()
    }

    /// Replace the scene from a JSON document; only valid in edit mode
    pub fn load_scene(&mut self, json: &str) -> Result<Vec<ObjectId>, SceneError> {
        self.exit_play();
        self.scene.load_scene(json)
    }

    /// Exact-radius query over the spatial index
    pub fn query_radius(&self, x: f32, z: f32, radius: f32) -> Vec<ObjectId> {
        self.ecs.query_radius(&self.scene, x, z, radius)
    }

    /// Live objects in a tag group
    pub fn objects_with_tag(&mut self, tag: &str) -> Vec<ObjectId> {
        self.scripts.objects_with_tag(&self.scene, tag)
    }

    /// Live objects whose script compiled under `name`
    pub fn objects_with_script(&mut self, name: &str) -> Vec<ObjectId> {
        self.scripts.objects_with_script(&self.scene, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::GameObject;

    fn runtime() -> Runtime {
        Runtime::new(RuntimeConfig::default())
    }

    #[test]
    fn tick_is_inert_in_edit_mode() {
        let mut runtime = runtime();
        let id = runtime.scene_mut().add_object(
            GameObject::new("mover")
                .with_script("// Mover\nfn update(ctx, dt) { ctx.x = ctx.x + dt; }"),
        );
        runtime.tick(1.0);
        assert_eq!(runtime.scene().get(id).unwrap().transform.position.x, 0.0);
        assert_eq!(runtime.frame(), 0);
    }

    #[test]
    fn play_ticks_move_scripted_objects() {
        let mut runtime = runtime();
        let id = runtime.scene_mut().add_object(
            GameObject::new("mover")
                .with_script("// Mover\nfn update(ctx, dt) { ctx.x = ctx.x + dt * 2.0; }"),
        );
        runtime.enter_play();
        for _ in 0..10 {
            runtime.tick(0.1);
        }
        let x = runtime.scene().get(id).unwrap().transform.position.x;
        assert!((x - 2.0).abs() < 1e-4);
        assert_eq!(runtime.frame(), 10);
    }

    #[test]
    fn exit_play_persists_script_properties() {
        let mut runtime = runtime();
        let id = runtime.scene_mut().add_object(GameObject::new("keeper").with_script(
            "// Keeper\nfn update(ctx, dt) { ctx.set_prop(\"ran\", 1); }\nfn on_destroy(ctx) { ctx.set_prop(\"bye\", 1); }",
        ));
        runtime.enter_play();
        runtime.tick(0.016);
        runtime.exit_play();

        let props = &runtime.scene().get(id).unwrap().script_properties;
        assert_eq!(props["ran"], serde_json::json!(1));
        assert_eq!(props["bye"], serde_json::json!(1));
        assert!(!runtime.is_playing());
    }

    #[test]
    fn edit_mode_hot_reload_still_runs_awake_and_start_in_play() {
        let mut runtime = runtime();
        let id = runtime.scene_mut().add_object(GameObject::new("npc").with_script(
            "// Npc\nfn awake(ctx) { ctx.set_prop(\"awoke\", 1); }\nfn start(ctx) { ctx.set_prop(\"started\", 1); }",
        ));

        // The editor save path: reload while editing, then press play.
        assert!(runtime.hot_reload_script(id));
        runtime.enter_play();
        runtime.tick(0.016);

        let props = &runtime.scene().get(id).unwrap().script_properties;
        assert_eq!(props["awoke"], serde_json::json!(1));
        assert_eq!(props["started"], serde_json::json!(1));
    }

    #[test]
    fn spatial_queries_track_scripted_motion() {
        let mut runtime = runtime();
        let runner = runtime.scene_mut().add_object(
            GameObject::new("runner")
                .at(0.0, 0.0, 0.0)
                .with_script("// Runner\nfn update(ctx, dt) { ctx.x = ctx.x + 10.0; }"),
        );
        let anchor = runtime
            .scene_mut()
            .add_object(GameObject::new("anchor").at(0.0, 0.0, 0.0));

        runtime.enter_play();
        let near_origin = runtime.query_radius(0.0, 0.0, 2.0);
        assert!(near_origin.contains(&runner));

        // Scripts move the runner after the component pass rebuilds the
        // index, so the next tick's rebuild picks the motion up.
        runtime.tick(0.016);
        runtime.tick(0.016);
        let near_origin = runtime.query_radius(0.0, 0.0, 2.0);
        assert!(!near_origin.contains(&runner));
        assert!(near_origin.contains(&anchor));
    }

    #[test]
    fn removed_object_disappears_from_every_subsystem() {
        let mut runtime = runtime();
        let id = runtime
            .scene_mut()
            .add_object(GameObject::new("doomed").at(1.0, 0.0, 1.0));
        runtime.enter_play();
        runtime.scripts_mut().add_tag(id, "enemy");
        runtime.remove_object(id);
        runtime.tick(0.016);

        assert!(!runtime.scene.contains(id));
        assert!(runtime
            .scripts
            .objects_with_tag(&runtime.scene, "enemy")
            .is_empty());
        assert!(runtime.query_radius(1.0, 1.0, 5.0).is_empty());
    }

    #[test]
    fn entering_play_twice_is_harmless() {
        let mut runtime = runtime();
        runtime.enter_play();
        runtime.tick(0.016);
        runtime.enter_play();
        assert_eq!(runtime.frame(), 1);
    }
}
