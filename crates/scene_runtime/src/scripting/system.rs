//! Script system
//!
//! Owns the engine, one script slot per scripted object, the tween and
//! timer pools, the event bus and the tag indices. The per-frame order
//! is fixed: game loop pacing, tweens, timers, then the per-object
//! script pass (event delivery, lifecycle hooks, behaviors, coroutine
//! resumes, write-back, command application).
//!
//! Failure is isolated per object: a script that does not compile
//! parks its slot as failed until the source changes; a runtime error
//! in a hook tears down only that object's instance, which is rebuilt
//! from persisted properties on the next frame.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use nalgebra::Vector3;
use rhai::{Dynamic, Engine, Map};

use super::api::{register_api, ScriptCommand, ScriptContext, ScriptFrame};
use super::behavior::{create_behavior, BehaviorCtx};
use super::coroutine::{Coroutine, CoroutineStatus};
use super::events::{Event, EventBus};
use super::game_loop::{GameLoop, LoopSettings};
use super::instance::{json_to_map, map_to_json, ScriptError, ScriptInstance};
use super::timer::Timer;
use super::tween::Tween;
use crate::scene::{ObjectId, Scene, Transform};
use crate::workers::{WorkerError, WorkerPool};

/// Result of checking a script without instantiating it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptValidation {
    /// Whether the source compiled
    pub valid: bool,
    /// Compiler message when it did not
    pub error: Option<String>,
}

/// State of one object's script slot.
///
/// Absence from the slot map means pending: the instance is created
/// lazily on the next script pass.
enum ScriptSlot {
    /// Compile failed; only a source change (hot reload) retries
    Failed,
    /// Compiled and running
    Live(ScriptInstance),
}

/// Per-object script execution and everything scripts schedule
pub struct ScriptSystem {
    engine: Engine,
    slots: HashMap<ObjectId, ScriptSlot>,
    tags: HashMap<String, Vec<ObjectId>>,
    by_script: HashMap<String, Vec<ObjectId>>,
    pending_cleanup: Vec<ObjectId>,
    tweens: Vec<Tween>,
    timers: Vec<Timer>,
    game_loop: GameLoop,
    bus: EventBus,
}

impl ScriptSystem {
    /// Create a system with a freshly provisioned engine.
    ///
    /// The engine carries hard execution limits; together with the
    /// command-queue API surface this is the sandbox: scripts cannot
    /// spin forever, recurse unboundedly, or reach anything that was
    /// not explicitly registered.
    pub fn new(settings: LoopSettings) -> Self {
        let mut engine = Engine::new();
        engine.set_max_operations(500_000);
        engine.set_max_call_levels(64);
        engine.set_max_expr_depths(64, 64);
        engine.on_print(|message| log::info!("script print: {message}"));
        engine.on_debug(|message, _, pos| log::debug!("script debug at {pos}: {message}"));
        register_api(&mut engine);

        Self {
            engine,
            slots: HashMap::new(),
            tags: HashMap::new(),
            by_script: HashMap::new(),
            pending_cleanup: Vec::new(),
            tweens: Vec::new(),
            timers: Vec::new(),
            game_loop: GameLoop::new(settings),
            bus: EventBus::new(),
        }
    }

    /// Compile-check a script without creating an instance
    pub fn validate_script(&self, source: &str) -> ScriptValidation {
        match self.engine.compile(source) {
            Ok(_) => ScriptValidation {
                valid: true,
                error: None,
            },
            Err(error) => ScriptValidation {
                valid: false,
                error: Some(error.to_string()),
            },
        }
    }

    /// Whether the object currently has a compiled, running instance
    pub fn has_live_instance(&self, id: ObjectId) -> bool {
        matches!(self.slots.get(&id), Some(ScriptSlot::Live(_)))
    }

    /// Whether the object's script is parked after a compile failure
    pub fn is_failed(&self, id: ObjectId) -> bool {
        matches!(self.slots.get(&id), Some(ScriptSlot::Failed))
    }

    /// Host access to the pacing loop, for registering frame callbacks
    pub fn game_loop_mut(&mut self) -> &mut GameLoop {
        &mut self.game_loop
    }

    /// Add a host-created tween
    pub fn add_tween(&mut self, tween: Tween) {
        self.tweens.push(tween);
    }

    /// Add a host-created timer
    pub fn add_timer(&mut self, timer: Timer) {
        self.timers.push(timer);
    }

    /// Queue an event from host code
    pub fn emit(&mut self, event: impl Into<String>, data: Dynamic) {
        self.bus.emit(event, data);
    }

    /// Add `id` to a tag group (idempotent)
    pub fn add_tag(&mut self, id: ObjectId, tag: &str) {
        let group = self.tags.entry(tag.to_string()).or_default();
        if !group.contains(&id) {
            group.push(id);
        }
    }

    /// Remove `id` from a tag group
    pub fn remove_tag(&mut self, id: ObjectId, tag: &str) {
        if let Some(group) = self.tags.get_mut(tag) {
            group.retain(|&member| member != id);
        }
    }

    /// Queue an id for eager removal from the tag and script indices
    pub fn mark_for_cleanup(&mut self, id: ObjectId) {
        self.pending_cleanup.push(id);
    }

    /// Live objects in a tag group; dead ids are swept first so stale
    /// handles can never leak out of a query
    pub fn objects_with_tag(&mut self, scene: &Scene, tag: &str) -> Vec<ObjectId> {
        self.cleanup(scene);
        self.tags.get(tag).cloned().unwrap_or_default()
    }

    /// Live objects whose script compiled under `name`
    pub fn objects_with_script(&mut self, scene: &Scene, name: &str) -> Vec<ObjectId> {
        self.cleanup(scene);
        self.by_script.get(name).cloned().unwrap_or_default()
    }

    /// Drop marked and generation-dead ids from both indices
    pub fn cleanup(&mut self, scene: &Scene) {
        for id in self.pending_cleanup.drain(..) {
            for group in self.tags.values_mut() {
                group.retain(|&member| member != id);
            }
            for group in self.by_script.values_mut() {
                group.retain(|&member| member != id);
            }
            self.slots.remove(&id);
        }
        for group in self.tags.values_mut() {
            group.retain(|&member| scene.contains(member));
        }
        for group in self.by_script.values_mut() {
            group.retain(|&member| scene.contains(member));
        }
        self.tags.retain(|_, group| !group.is_empty());
        self.by_script.retain(|_, group| !group.is_empty());
    }

    /// Enable or disable an object's running script instance.
    ///
    /// Firing edge only: the matching `on_enable`/`on_disable` hook
    /// runs when the flag actually changes. Disabled instances keep
    /// their state but skip every per-frame pass.
    pub fn set_script_enabled(&mut self, scene: &mut Scene, id: ObjectId, enabled: bool) {
        match self.slots.remove(&id) {
            Some(ScriptSlot::Live(mut instance)) => {
                if instance.enabled != enabled {
                    instance.enabled = enabled;
                    let (hook, defined) = if enabled {
                        ("on_enable", instance.hooks().on_enable)
                    } else {
                        ("on_disable", instance.hooks().on_disable)
                    };
                    if defined && scene.contains(id) {
                        let (positions, tag_snapshot) = self.world_snapshots(scene);
                        let shared =
                            self.make_frame(scene, id, &mut instance, &positions, &tag_snapshot);
                        let ctx = ScriptContext::new(Rc::clone(&shared));
                        if let Err(error) = instance.call(&self.engine, hook, (ctx,)) {
                            log::error!("{hook} for '{}' failed: {error}", instance.name());
                        }
                        let commands = {
                            let mut frame = shared.borrow_mut();
                            if let Some(object) = scene.get_mut(id) {
                                object.transform.position = frame.position;
                                object.transform.rotation = frame.rotation;
                                object.transform.scale = frame.scale;
                            }
                            instance.properties = std::mem::take(&mut frame.properties);
                            std::mem::take(&mut frame.commands)
                        };
                        if let Some(object) = scene.get_mut(id) {
                            object.script_properties = map_to_json(&instance.properties);
                        }
                        self.apply_commands(scene, &mut None, &mut instance, id, commands);
                    }
                }
                self.slots.insert(id, ScriptSlot::Live(instance));
            }
            Some(other) => {
                self.slots.insert(id, other);
            }
            None => {}
        }
    }

    /// Recompile an object's script from its current source.
    ///
    /// The old instance (if any) is discarded; its working property
    /// bag carries over to the replacement. The new instance is
    /// unstarted, so `awake`/`start` re-run on its next script pass —
    /// the first play frame, when the reload happened while editing.
    /// Returns whether the new source compiled.
    pub fn hot_reload_script(&mut self, scene: &Scene, id: ObjectId) -> bool {
        let Some(source) = scene.get(id).and_then(|o| o.script.clone()) else {
            return false;
        };

        let mut carried: Option<Map> = None;
        if let Some(ScriptSlot::Live(instance)) = self.slots.remove(&id) {
            carried = Some(instance.properties.clone());
            self.unindex_script(id, instance.name());
        }

        match ScriptInstance::compile(&self.engine, &source) {
            Ok(mut instance) => {
                instance.properties = carried.unwrap_or_else(|| {
                    scene
                        .get(id)
                        .map(|o| json_to_map(&o.script_properties))
                        .unwrap_or_default()
                });
                self.by_script
                    .entry(instance.name().to_string())
                    .or_default()
                    .push(id);
                self.slots.insert(id, ScriptSlot::Live(instance));
                true
            }
            Err(error) => {
                log::error!("hot reload of script on {id:?} failed: {error}");
                self.slots.insert(id, ScriptSlot::Failed);
                false
            }
        }
    }

    /// Tear down all play-mode script state, invoking `on_destroy`
    /// hooks and flushing property bags back to their objects
    pub fn exit_play(&mut self, scene: &mut Scene) {
        let (positions, tag_snapshot) = self.world_snapshots(scene);
        let ids: Vec<ObjectId> = self.slots.keys().copied().collect();
        for id in ids {
            let Some(slot) = self.slots.remove(&id) else {
                continue;
            };
            let ScriptSlot::Live(mut instance) = slot else {
                continue;
            };
            if instance.hooks().on_destroy && scene.contains(id) {
                let shared = self.make_frame(scene, id, &mut instance, &positions, &tag_snapshot);
                let ctx = ScriptContext::new(Rc::clone(&shared));
                if let Err(error) = instance.call(&self.engine, "on_destroy", (ctx,)) {
                    log::error!("on_destroy for '{}' failed: {error}", instance.name());
                }
                instance.properties = std::mem::take(&mut shared.borrow_mut().properties);
            }
            if let Some(object) = scene.get_mut(id) {
                object.script_properties = map_to_json(&instance.properties);
            }
        }
        self.slots.clear();
        self.tweens.clear();
        self.timers.clear();
        self.tags.clear();
        self.by_script.clear();
        self.pending_cleanup.clear();
        self.bus = EventBus::new();
    }

    /// Advance one frame of script execution
    pub fn update_scripts(
        &mut self,
        scene: &mut Scene,
        mut workers: Option<&mut WorkerPool>,
        dt: f32,
    ) {
        // Events published last frame are the ones delivered now;
        // everything emitted below waits for the next pass.
        let delivered = self.bus.drain();

        let fixed_steps = self.game_loop.advance(dt);

        let mut fired_events: Vec<String> = Vec::new();
        for tween in &mut self.tweens {
            if tween.update(scene, dt) {
                if let Some(event) = tween.completion_event.clone() {
                    fired_events.push(event);
                }
            }
        }
        self.tweens.retain(|tween| !tween.is_completed());

        for timer in &mut self.timers {
            let fired = timer.update(dt);
            if fired > 0 {
                if let Some(event) = timer.fire_event.clone() {
                    fired_events.extend(std::iter::repeat(event).take(fired as usize));
                }
            }
        }
        self.timers.retain(|timer| !timer.is_completed());

        for event in fired_events {
            self.bus.emit(event, Dynamic::UNIT);
        }

        self.cleanup(scene);

        let (positions, tag_snapshot) = self.world_snapshots(scene);

        for id in scene.ids() {
            let Some(source) = scene.get(id).and_then(|o| o.script.clone()) else {
                // Script removed in the editor: drop any instance.
                if let Some(ScriptSlot::Live(instance)) = self.slots.remove(&id) {
                    self.unindex_script(id, instance.name());
                }
                continue;
            };

            if self.is_failed(id) {
                continue;
            }

            if !self.has_live_instance(id) {
                match ScriptInstance::compile(&self.engine, &source) {
                    Ok(mut instance) => {
                        if let Some(object) = scene.get(id) {
                            instance.properties = json_to_map(&object.script_properties);
                        }
                        self.by_script
                            .entry(instance.name().to_string())
                            .or_default()
                            .push(id);
                        self.slots.insert(id, ScriptSlot::Live(instance));
                    }
                    Err(error) => {
                        log::error!("script on object {id:?} failed to compile: {error}");
                        self.slots.insert(id, ScriptSlot::Failed);
                        continue;
                    }
                }
            }

            let Some(ScriptSlot::Live(mut instance)) = self.slots.remove(&id) else {
                continue;
            };

            if !instance.enabled {
                self.slots.insert(id, ScriptSlot::Live(instance));
                continue;
            }

            let result = self.run_instance(
                scene,
                &mut workers,
                &mut instance,
                id,
                &positions,
                &tag_snapshot,
                &delivered,
                dt,
                fixed_steps,
            );

            match result {
                Ok(()) => {
                    self.slots.insert(id, ScriptSlot::Live(instance));
                }
                Err(error) => {
                    // Fail only this object: discard the instance and
                    // leave the slot pending so the next frame rebuilds
                    // it from the persisted property bag.
                    log::error!(
                        "script '{}' on object {id:?} raised: {error}; instance reset",
                        instance.name()
                    );
                    self.unindex_script(id, instance.name());
                }
            }
        }
    }

    /// Read-only position and tag views handed to every frame, so
    /// queries like `query_radius` and `objects_with_tag` work from
    /// any hook
    #[allow(clippy::type_complexity)]
    fn world_snapshots(
        &self,
        scene: &Scene,
    ) -> (
        Rc<HashMap<u64, Vector3<f32>>>,
        Rc<HashMap<String, Vec<u64>>>,
    ) {
        let positions = Rc::new(
            scene
                .iter()
                .map(|(id, object)| (id.to_raw(), object.transform.position))
                .collect(),
        );
        let tags = Rc::new(
            self.tags
                .iter()
                .map(|(tag, ids)| {
                    (
                        tag.clone(),
                        ids.iter().map(|id| id.to_raw()).collect::<Vec<u64>>(),
                    )
                })
                .collect(),
        );
        (positions, tags)
    }

    fn unindex_script(&mut self, id: ObjectId, name: &str) {
        if let Some(group) = self.by_script.get_mut(name) {
            group.retain(|&member| member != id);
            if group.is_empty() {
                self.by_script.remove(name);
            }
        }
    }

    fn make_frame(
        &self,
        scene: &Scene,
        id: ObjectId,
        instance: &mut ScriptInstance,
        positions: &Rc<HashMap<u64, Vector3<f32>>>,
        tag_snapshot: &Rc<HashMap<String, Vec<u64>>>,
    ) -> Rc<RefCell<ScriptFrame>> {
        let (name, transform) = scene
            .get(id)
            .map(|o| (o.name.clone(), o.transform.clone()))
            .unwrap_or_else(|| (String::new(), Transform::default()));
        Rc::new(RefCell::new(ScriptFrame {
            object_id: id.to_raw(),
            object_name: name,
            position: transform.position,
            rotation: transform.rotation,
            scale: transform.scale,
            properties: std::mem::take(&mut instance.properties),
            commands: Vec::new(),
            tags: Rc::clone(tag_snapshot),
            positions: Rc::clone(positions),
            next_coroutine_id: instance.next_coroutine_id,
            next_task_ref: instance.next_task_ref,
        }))
    }

    #[allow(clippy::too_many_lines)]
    fn run_instance(
        &mut self,
        scene: &mut Scene,
        workers: &mut Option<&mut WorkerPool>,
        instance: &mut ScriptInstance,
        id: ObjectId,
        positions: &Rc<HashMap<u64, Vector3<f32>>>,
        tag_snapshot: &Rc<HashMap<String, Vec<u64>>>,
        delivered: &[Event],
        dt: f32,
        fixed_steps: u32,
    ) -> Result<(), ScriptError> {
        let shared = self.make_frame(scene, id, instance, positions, tag_snapshot);
        let ctx = ScriptContext::new(Rc::clone(&shared));
        let hooks = instance.hooks();
        let dt_f = f64::from(dt);
        let fixed_dt = f64::from(self.game_loop.fixed_time_step());

        let mut failure: Option<ScriptError> = None;

        if hooks.on_event && failure.is_none() {
            for event in delivered {
                if !instance.subscriptions.contains(&event.name) {
                    continue;
                }
                if let Err(error) = instance.call(
                    &self.engine,
                    "on_event",
                    (ctx.clone(), event.name.clone(), event.data.clone()),
                ) {
                    failure = Some(error);
                    break;
                }
            }
        }

        if !instance.started && failure.is_none() {
            if hooks.awake {
                if let Err(error) = instance.call(&self.engine, "awake", (ctx.clone(),)) {
                    failure = Some(error);
                }
            }
            if hooks.start && failure.is_none() {
                if let Err(error) = instance.call(&self.engine, "start", (ctx.clone(),)) {
                    failure = Some(error);
                }
            }
            instance.started = true;
        }

        if hooks.fixed_update && failure.is_none() {
            for _ in 0..fixed_steps {
                if let Err(error) = instance.call(&self.engine, "fixed_update", (ctx.clone(), fixed_dt)) {
                    failure = Some(error);
                    break;
                }
            }
        }

        if hooks.update && failure.is_none() {
            if let Err(error) = instance.call(&self.engine, "update", (ctx.clone(), dt_f)) {
                failure = Some(error);
            }
        }

        if failure.is_none() && !instance.behaviors.is_empty() {
            let mut frame = shared.borrow_mut();
            let mut transform = Transform {
                position: frame.position,
                rotation: frame.rotation,
                scale: frame.scale,
            };
            {
                let mut behavior_ctx = BehaviorCtx {
                    transform: &mut transform,
                    positions,
                };
                for behavior in &mut instance.behaviors {
                    behavior.update(&mut behavior_ctx, dt);
                }
            }
            frame.position = transform.position;
            frame.rotation = transform.rotation;
            frame.scale = transform.scale;
        }

        if hooks.late_update && failure.is_none() {
            if let Err(error) = instance.call(&self.engine, "late_update", (ctx.clone(), dt_f)) {
                failure = Some(error);
            }
        }

        if failure.is_none() {
            self.resume_coroutines(workers, instance, &shared, &ctx, dt_f);
        }

        // Write-back happens even on failure so edits made before the
        // error survive the instance teardown.
        let (commands, properties) = {
            let mut frame = shared.borrow_mut();
            if let Some(object) = scene.get_mut(id) {
                object.transform.position = frame.position;
                object.transform.rotation = frame.rotation;
                object.transform.scale = frame.scale;
            }
            instance.next_coroutine_id = frame.next_coroutine_id;
            instance.next_task_ref = frame.next_task_ref;
            (
                std::mem::take(&mut frame.commands),
                std::mem::take(&mut frame.properties),
            )
        };
        if let Some(object) = scene.get_mut(id) {
            object.script_properties = map_to_json(&properties);
        }
        instance.properties = properties;

        if let Some(error) = failure {
            return Err(error);
        }

        self.apply_commands(scene, workers, instance, id, commands);
        Ok(())
    }

    fn resume_coroutines(
        &self,
        workers: &mut Option<&mut WorkerPool>,
        instance: &mut ScriptInstance,
        shared: &Rc<RefCell<ScriptFrame>>,
        ctx: &ScriptContext,
        dt_f: f64,
    ) {
        instance
            .coroutines
            .retain(|coroutine| coroutine.status != CoroutineStatus::Done);

        for index in 0..instance.coroutines.len() {
            // `stop_coroutine` cancels immediately: anything stopped by
            // a hook this frame, or by an earlier coroutine in this
            // pass, is never resumed again.
            apply_queued_stops(shared, instance);
            if instance.coroutines[index].status == CoroutineStatus::Done {
                continue;
            }

            if let CoroutineStatus::Waiting(task_ref) = instance.coroutines[index].status {
                let Some(handle) = instance.task_refs.get(&task_ref).copied() else {
                    // No task was ever submitted under this reference.
                    settle_error(&mut instance.coroutines[index], "no such background task");
                    continue;
                };
                let Some(pool) = workers.as_deref_mut() else {
                    settle_error(&mut instance.coroutines[index], "worker pool unavailable");
                    instance.task_refs.remove(&task_ref);
                    continue;
                };
                match pool.take(handle) {
                    Some(result) => {
                        settle(&mut instance.coroutines[index], result);
                        instance.task_refs.remove(&task_ref);
                    }
                    None => continue, // still pending, stay suspended
                }
            }

            if instance.coroutines[index].status != CoroutineStatus::Running {
                continue;
            }
            if let Err(error) = instance.resume_coroutine(&self.engine, index, (ctx.clone(), dt_f)) {
                // A failing coroutine dies alone; the instance and its
                // other coroutines keep running.
                log::error!("coroutine on '{}' raised: {error}", instance.name());
                instance.coroutines[index].status = CoroutineStatus::Done;
            }
        }
    }

    fn apply_commands(
        &mut self,
        scene: &mut Scene,
        workers: &mut Option<&mut WorkerPool>,
        instance: &mut ScriptInstance,
        id: ObjectId,
        commands: Vec<ScriptCommand>,
    ) {
        for command in commands {
            match command {
                ScriptCommand::StartCoroutine { id: co_id, function } => {
                    instance.coroutines.push(Coroutine::new(co_id, function));
                }
                ScriptCommand::StopCoroutine { id: co_id } => {
                    for coroutine in &mut instance.coroutines {
                        if coroutine.id == co_id {
                            coroutine.status = CoroutineStatus::Done;
                        }
                    }
                }
                ScriptCommand::AddTag(tag) => self.add_tag(id, &tag),
                ScriptCommand::RemoveTag(tag) => self.remove_tag(id, &tag),
                ScriptCommand::StartTween {
                    targets,
                    duration,
                    easing,
                    completion_event,
                } => {
                    if let Some(mut tween) = Tween::new(scene, id, &targets, duration, easing) {
                        if let Some(event) = completion_event {
                            tween = tween.with_completion_event(event);
                        }
                        self.tweens.push(tween);
                    }
                }
                ScriptCommand::StartTimer {
                    delay,
                    repeat,
                    event,
                } => {
                    self.timers.push(Timer::new(delay, repeat).with_fire_event(event));
                }
                ScriptCommand::AttachBehavior { name, params } => {
                    match create_behavior(&name, &params) {
                        Some(behavior) => {
                            instance.behaviors.retain(|b| b.name() != behavior.name());
                            instance.behaviors.push(behavior);
                        }
                        None => log::warn!("unknown behavior '{name}' requested by script"),
                    }
                }
                ScriptCommand::DetachBehavior(name) => {
                    instance.behaviors.retain(|b| b.name() != name);
                }
                ScriptCommand::Subscribe(event) => {
                    instance.subscriptions.insert(event);
                }
                ScriptCommand::Unsubscribe(event) => {
                    instance.subscriptions.remove(&event);
                }
                ScriptCommand::Emit { event, data } => {
                    self.bus.emit(event, data);
                }
                ScriptCommand::RunTask {
                    task_ref,
                    task,
                    data,
                } => {
                    if let Some(pool) = workers.as_deref_mut() {
                        let payload = rhai::serde::from_dynamic::<serde_json::Value>(&data)
                            .unwrap_or(serde_json::Value::Null);
                        let handle = pool.submit(&task, payload);
                        instance.task_refs.insert(task_ref, handle);
                    } else {
                        log::warn!("task '{task}' requested but no worker pool is running");
                    }
                }
            }
        }
    }
}

fn apply_queued_stops(shared: &Rc<RefCell<ScriptFrame>>, instance: &mut ScriptInstance) {
    let frame = shared.borrow();
    for command in &frame.commands {
        if let ScriptCommand::StopCoroutine { id } = command {
            for coroutine in &mut instance.coroutines {
                if coroutine.id == *id {
                    coroutine.status = CoroutineStatus::Done;
                }
            }
        }
    }
}

fn settle(coroutine: &mut Coroutine, result: Result<serde_json::Value, WorkerError>) {
    if let Some(mut state) = coroutine.state.write_lock::<Map>() {
        match result {
            Ok(value) => {
                let dynamic = rhai::serde::to_dynamic(&value).unwrap_or(Dynamic::UNIT);
                state.insert("task_result".into(), dynamic);
                state.remove("task_error");
            }
            Err(error) => {
                state.insert("task_error".into(), error.to_string().into());
                state.remove("task_result");
            }
        }
    }
    coroutine.status = CoroutineStatus::Running;
}

fn settle_error(coroutine: &mut Coroutine, message: &str) {
    if let Some(mut state) = coroutine.state.write_lock::<Map>() {
        state.insert("task_error".into(), message.into());
        state.remove("task_result");
    }
    coroutine.status = CoroutineStatus::Running;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::GameObject;

    fn system() -> ScriptSystem {
        ScriptSystem::new(LoopSettings::default())
    }

    fn scripted(scene: &mut Scene, name: &str, source: &str) -> ObjectId {
        scene.add_object(GameObject::new(name).with_script(source))
    }

    fn prop_i64(scene: &Scene, id: ObjectId, key: &str) -> Option<i64> {
        scene.get(id)?.script_properties.get(key)?.as_i64()
    }

    #[test]
    fn lifecycle_hooks_run_in_order() {
        let mut scene = Scene::new();
        let id = scripted(
            &mut scene,
            "probe",
            r#"// Probe
fn awake(ctx) { ctx.set_prop("trace", "a"); }
fn start(ctx) { ctx.set_prop("trace", ctx.get_prop("trace") + "s"); }
fn update(ctx, dt) { ctx.set_prop("trace", ctx.get_prop("trace") + "u"); }
fn late_update(ctx, dt) { ctx.set_prop("trace", ctx.get_prop("trace") + "l"); }
"#,
        );
        let mut system = system();
        system.update_scripts(&mut scene, None, 0.016);
        system.update_scripts(&mut scene, None, 0.016);

        let trace = scene.get(id).unwrap().script_properties["trace"]
            .as_str()
            .unwrap()
            .to_string();
        assert_eq!(trace, "asulul");
    }

    #[test]
    fn runtime_error_resets_only_the_failing_object() {
        let mut scene = Scene::new();
        let bad = scripted(&mut scene, "bad", "// Bad\nfn update(ctx, dt) { throw \"boom\"; }");
        let good = scripted(
            &mut scene,
            "good",
            r#"// Good
fn update(ctx, dt) {
    let n = ctx.get_prop("n");
    if n == () { n = 0; }
    ctx.set_prop("n", n + 1);
}
"#,
        );
        let mut system = system();
        system.update_scripts(&mut scene, None, 0.016);
        assert!(!system.has_live_instance(bad));
        assert!(system.has_live_instance(good));
        assert_eq!(prop_i64(&scene, good, "n"), Some(1));

        // The bad object is rebuilt and fails again; the good one keeps
        // counting.
        system.update_scripts(&mut scene, None, 0.016);
        assert_eq!(prop_i64(&scene, good, "n"), Some(2));
    }

    #[test]
    fn compile_failure_parks_the_slot_until_reload() {
        let mut scene = Scene::new();
        let id = scripted(&mut scene, "broken", "fn update(ctx, dt) {");
        let mut system = system();

        system.update_scripts(&mut scene, None, 0.016);
        assert!(system.is_failed(id));
        system.update_scripts(&mut scene, None, 0.016);
        assert!(system.is_failed(id));

        scene.get_mut(id).unwrap().script =
            Some("// Fixed\nfn update(ctx, dt) { ctx.set_prop(\"ok\", 1); }".to_string());
        assert!(system.hot_reload_script(&scene, id));
        system.update_scripts(&mut scene, None, 0.016);
        assert_eq!(prop_i64(&scene, id, "ok"), Some(1));
    }

    #[test]
    fn hot_reload_carries_the_property_bag() {
        let mut scene = Scene::new();
        let id = scripted(
            &mut scene,
            "counter",
            r#"// Counter
fn update(ctx, dt) {
    let n = ctx.get_prop("n");
    if n == () { n = 0; }
    ctx.set_prop("n", n + 1);
}
"#,
        );
        let mut system = system();
        system.update_scripts(&mut scene, None, 0.016);
        system.update_scripts(&mut scene, None, 0.016);
        assert_eq!(prop_i64(&scene, id, "n"), Some(2));

        scene.get_mut(id).unwrap().script = Some(
            "// Counter v2\nfn update(ctx, dt) { ctx.set_prop(\"n\", ctx.get_prop(\"n\") + 10); }"
                .to_string(),
        );
        assert!(system.hot_reload_script(&scene, id));
        system.update_scripts(&mut scene, None, 0.016);
        assert_eq!(prop_i64(&scene, id, "n"), Some(12));
    }

    #[test]
    fn tag_queries_never_return_deleted_objects() {
        let mut scene = Scene::new();
        let keep = scene.add_object(GameObject::new("keep"));
        let doomed = scene.add_object(GameObject::new("doomed"));
        let mut system = system();
        system.add_tag(keep, "enemy");
        system.add_tag(doomed, "enemy");

        scene.remove_object(doomed);
        let found = system.objects_with_tag(&scene, "enemy");
        assert_eq!(found, vec![keep]);
    }

    #[test]
    fn script_added_tags_resolve_through_queries() {
        let mut scene = Scene::new();
        let id = scripted(
            &mut scene,
            "tagger",
            "// Tagger\nfn start(ctx) { ctx.add_tag(\"enemy\"); }",
        );
        let mut system = system();
        system.update_scripts(&mut scene, None, 0.016);
        assert_eq!(system.objects_with_tag(&scene, "enemy"), vec![id]);
        assert_eq!(system.objects_with_script(&scene, "Tagger"), vec![id]);
    }

    #[test]
    fn coroutine_counts_then_finishes() {
        let mut scene = Scene::new();
        let id = scripted(
            &mut scene,
            "counter",
            r#"// CoCounter
fn start(ctx) { ctx.start_coroutine("count_up"); }
fn count_up(ctx, dt) {
    let n = this.n;
    if n == () { n = 0; }
    this.n = n + 1;
    ctx.set_prop("count", this.n);
    this.n < 3
}
"#,
        );
        let mut system = system();
        for _ in 0..6 {
            system.update_scripts(&mut scene, None, 0.016);
        }
        assert_eq!(prop_i64(&scene, id, "count"), Some(3));
    }

    #[test]
    fn stopped_coroutine_does_not_resume() {
        let mut scene = Scene::new();
        let id = scripted(
            &mut scene,
            "stopper",
            r#"// Stopper
fn start(ctx) { ctx.set_prop("co", ctx.start_coroutine("tick")); }
fn update(ctx, dt) {
    if ctx.get_prop("ticks") == 2 {
        ctx.stop_coroutine(ctx.get_prop("co"));
    }
}
fn tick(ctx, dt) {
    let t = ctx.get_prop("ticks");
    if t == () { t = 0; }
    ctx.set_prop("ticks", t + 1);
    true
}
"#,
        );
        let mut system = system();
        for _ in 0..8 {
            system.update_scripts(&mut scene, None, 0.016);
        }
        // The stop issued from `update` cancels before the coroutine
        // pass of the same frame; no further tick is recorded.
        assert_eq!(prop_i64(&scene, id, "ticks"), Some(2));
    }

    #[test]
    fn coroutine_awaits_a_background_task() {
        let mut scene = Scene::new();
        let id = scripted(
            &mut scene,
            "terraformer",
            r#"// Terraformer
fn start(ctx) { ctx.start_coroutine("generate"); }
fn generate(ctx, dt) {
    if this.task == () {
        this.task = ctx.run_task("generateTerrain", #{ width: 4, depth: 4, seed: 7 });
        return this.task;
    }
    if this.task_error != () {
        ctx.set_prop("failed", 1);
        return false;
    }
    ctx.set_prop("done", 1);
    false
}
"#,
        );
        let mut system = system();
        let mut pool = WorkerPool::new(1);
        for _ in 0..200 {
            system.update_scripts(&mut scene, Some(&mut pool), 0.016);
            if prop_i64(&scene, id, "done").is_some() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        assert_eq!(prop_i64(&scene, id, "done"), Some(1));
        assert_eq!(prop_i64(&scene, id, "failed"), None);
    }

    #[test]
    fn awaiting_an_unknown_task_surfaces_the_error() {
        let mut scene = Scene::new();
        let id = scripted(
            &mut scene,
            "hopeful",
            r#"// Hopeful
fn start(ctx) { ctx.start_coroutine("wish"); }
fn wish(ctx, dt) {
    if this.task == () {
        this.task = ctx.run_task("noSuchTask", #{});
        return this.task;
    }
    if this.task_error != () { ctx.set_prop("failed", 1); }
    false
}
"#,
        );
        let mut system = system();
        let mut pool = WorkerPool::new(1);
        for _ in 0..200 {
            system.update_scripts(&mut scene, Some(&mut pool), 0.016);
            if prop_i64(&scene, id, "failed").is_some() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        assert_eq!(prop_i64(&scene, id, "failed"), Some(1));
    }

    #[test]
    fn events_are_delivered_on_the_next_frame() {
        let mut scene = Scene::new();
        let listener = scripted(
            &mut scene,
            "listener",
            r#"// Listener
fn start(ctx) { ctx.subscribe("ping"); }
fn on_event(ctx, name, data) { ctx.set_prop("heard", data); }
"#,
        );
        let _speaker = scripted(
            &mut scene,
            "speaker",
            r#"// Speaker
fn update(ctx, dt) {
    if ctx.get_prop("sent") == () {
        ctx.emit("ping", 99);
        ctx.set_prop("sent", 1);
    }
}
"#,
        );
        let mut system = system();
        system.update_scripts(&mut scene, None, 0.016);
        assert_eq!(prop_i64(&scene, listener, "heard"), None);
        system.update_scripts(&mut scene, None, 0.016);
        assert_eq!(prop_i64(&scene, listener, "heard"), Some(99));
    }

    #[test]
    fn script_tween_moves_the_object_and_fires_its_event() {
        let mut scene = Scene::new();
        let id = scripted(
            &mut scene,
            "riser",
            r#"// Riser
fn start(ctx) {
    ctx.subscribe("rise_done");
    ctx.tween("y", 10.0, 1.0, "linear", "rise_done");
}
fn on_event(ctx, name, data) { ctx.set_prop("landed", 1); }
"#,
        );
        let mut system = system();
        system.update_scripts(&mut scene, None, 0.5); // start queues the tween
        system.update_scripts(&mut scene, None, 0.5);
        system.update_scripts(&mut scene, None, 0.5); // tween completes here
        system.update_scripts(&mut scene, None, 0.5); // event delivered

        assert_eq!(scene.get(id).unwrap().transform.position.y, 10.0);
        assert_eq!(prop_i64(&scene, id, "landed"), Some(1));
    }

    #[test]
    fn behaviors_run_between_update_and_late_update() {
        let mut scene = Scene::new();
        let id = scripted(
            &mut scene,
            "spinner",
            r#"// Spinner
fn start(ctx) { ctx.attach_behavior("rotator", #{ speed: 2.0 }); }
"#,
        );
        let mut system = system();
        system.update_scripts(&mut scene, None, 0.016); // attach applied after pass
        system.update_scripts(&mut scene, None, 0.5);
        let rotation = scene.get(id).unwrap().transform.rotation.y;
        assert!((rotation - 1.0).abs() < 1e-5);
    }

    #[test]
    fn disabled_instances_skip_updates_and_fire_edge_hooks() {
        let mut scene = Scene::new();
        let id = scripted(
            &mut scene,
            "toggle",
            r#"// Toggle
fn update(ctx, dt) {
    let n = ctx.get_prop("n");
    if n == () { n = 0; }
    ctx.set_prop("n", n + 1);
}
fn on_disable(ctx) { ctx.set_prop("paused", 1); }
fn on_enable(ctx) { ctx.set_prop("paused", 0); }
"#,
        );
        let mut system = system();
        system.update_scripts(&mut scene, None, 0.016);
        assert_eq!(prop_i64(&scene, id, "n"), Some(1));

        system.set_script_enabled(&mut scene, id, false);
        assert_eq!(prop_i64(&scene, id, "paused"), Some(1));
        system.update_scripts(&mut scene, None, 0.016);
        system.update_scripts(&mut scene, None, 0.016);
        assert_eq!(prop_i64(&scene, id, "n"), Some(1));

        // Re-disabling is a no-op; the hook only fires on the edge.
        system.set_script_enabled(&mut scene, id, false);

        system.set_script_enabled(&mut scene, id, true);
        assert_eq!(prop_i64(&scene, id, "paused"), Some(0));
        system.update_scripts(&mut scene, None, 0.016);
        assert_eq!(prop_i64(&scene, id, "n"), Some(2));
    }

    #[test]
    fn disable_and_destroy_hooks_see_the_world() {
        let mut scene = Scene::new();
        let other = scene.add_object(GameObject::new("other").at(1.0, 0.0, 0.0));
        let id = scripted(
            &mut scene,
            "watcher",
            r#"// Watcher
fn on_disable(ctx) {
    ctx.set_prop("tagged", ctx.objects_with_tag("enemy").len());
    ctx.set_prop("near", ctx.query_radius(0.0, 0.0, 5.0).len());
}
fn on_destroy(ctx) {
    ctx.set_prop("near_at_exit", ctx.query_radius(0.0, 0.0, 5.0).len());
}
"#,
        );
        let mut system = system();
        system.add_tag(other, "enemy");
        system.update_scripts(&mut scene, None, 0.016);

        system.set_script_enabled(&mut scene, id, false);
        assert_eq!(prop_i64(&scene, id, "tagged"), Some(1));
        assert_eq!(prop_i64(&scene, id, "near"), Some(1));

        system.set_script_enabled(&mut scene, id, true);
        system.exit_play(&mut scene);
        assert_eq!(prop_i64(&scene, id, "near_at_exit"), Some(1));
    }

    #[test]
    fn validate_reports_errors_without_creating_instances() {
        let system = system();
        assert!(system.validate_script("fn update(ctx, dt) {}").valid);
        let report = system.validate_script("fn update(ctx {");
        assert!(!report.valid);
        assert!(report.error.is_some());
    }

    #[test]
    fn exit_play_runs_on_destroy_and_persists_properties() {
        let mut scene = Scene::new();
        let id = scripted(
            &mut scene,
            "farewell",
            r#"// Farewell
fn update(ctx, dt) { ctx.set_prop("alive", 1); }
fn on_destroy(ctx) { ctx.set_prop("destroyed", 1); }
"#,
        );
        let mut system = system();
        system.update_scripts(&mut scene, None, 0.016);
        system.exit_play(&mut scene);

        assert_eq!(prop_i64(&scene, id, "destroyed"), Some(1));
        assert!(!system.has_live_instance(id));
    }
}
