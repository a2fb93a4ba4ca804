//! Script-facing API surface
//!
//! Each script call receives a `ScriptContext` handle over a per-frame
//! `ScriptFrame`: a mutable snapshot of the object's own transform and
//! property bag, read-only snapshots of the rest of the scene, and a
//! command queue. Anything that touches engine state beyond the
//! object itself (coroutines, tweens, timers, tags, events, tasks) is
//! queued as a `ScriptCommand` and applied by the script system after
//! the call returns, so a misbehaving script can only ever corrupt its
//! own frame. This queue is also the sandbox boundary: scripts hold no
//! handles to the scene, the filesystem or the network, only to what
//! is registered here.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use nalgebra::Vector3;
use rand::Rng;
use rhai::{Array, Dynamic, Engine, Map};

use super::tween::{Easing, TweenProp};

/// Deferred effect queued by a script call
pub enum ScriptCommand {
    /// Begin stepping `function` as a coroutine
    StartCoroutine {
        /// Handle already returned to the script
        id: u64,
        /// Script function name
        function: String,
    },
    /// Cancel a running coroutine
    StopCoroutine {
        /// Handle from `start_coroutine`
        id: u64,
    },
    /// Add the object to a tag group
    AddTag(String),
    /// Remove the object from a tag group
    RemoveTag(String),
    /// Animate this object's transform
    StartTween {
        /// Property targets, script order preserved
        targets: Vec<(TweenProp, f32)>,
        /// Seconds from start to end
        duration: f32,
        /// Curve to sample
        easing: Easing,
        /// Event emitted when the tween completes
        completion_event: Option<String>,
    },
    /// Schedule an event after a delay
    StartTimer {
        /// Seconds before firing
        delay: f32,
        /// Re-arm after each firing
        repeat: bool,
        /// Event pushed on each firing
        event: String,
    },
    /// Attach a library behavior to this object
    AttachBehavior {
        /// Behavior name
        name: String,
        /// Behavior parameters
        params: Map,
    },
    /// Remove an attached behavior by name
    DetachBehavior(String),
    /// Receive events published under this name
    Subscribe(String),
    /// Stop receiving events published under this name
    Unsubscribe(String),
    /// Publish an event for delivery next frame
    Emit {
        /// Event name
        event: String,
        /// Arbitrary payload
        data: Dynamic,
    },
    /// Submit a background task
    RunTask {
        /// Script-side reference a coroutine can suspend on
        task_ref: u64,
        /// Task name
        task: String,
        /// JSON-compatible payload
        data: Dynamic,
    },
}

/// Mutable per-call view of one object plus frame-wide snapshots
pub struct ScriptFrame {
    /// Raw id of the object being scripted
    pub object_id: u64,
    /// Display name, for log prefixes
    pub object_name: String,
    /// Own position, written back after the call
    pub position: Vector3<f32>,
    /// Own Euler rotation
    pub rotation: Vector3<f32>,
    /// Own scale
    pub scale: Vector3<f32>,
    /// Property bag, persisted across instance teardown
    pub properties: Map,
    /// Commands queued during this call
    pub commands: Vec<ScriptCommand>,
    /// Tag index snapshot taken at the start of the frame
    pub tags: Rc<HashMap<String, Vec<u64>>>,
    /// Position of every live object at the start of the frame
    pub positions: Rc<HashMap<u64, Vector3<f32>>>,
    /// Allocator for coroutine handles
    pub next_coroutine_id: u64,
    /// Allocator for background-task references
    pub next_task_ref: u64,
}

/// Cloneable handle passed to every script call
#[derive(Clone)]
pub struct ScriptContext {
    frame: Rc<RefCell<ScriptFrame>>,
}

impl ScriptContext {
    /// Wrap a frame for one object's script pass
    pub fn new(frame: Rc<RefCell<ScriptFrame>>) -> Self {
        Self { frame }
    }

    fn queue(&self, command: ScriptCommand) {
        self.frame.borrow_mut().commands.push(command);
    }

    fn id(&mut self) -> i64 {
        self.frame.borrow().object_id as i64
    }

    fn name(&mut self) -> String {
        self.frame.borrow().object_name.clone()
    }

    fn log(&mut self, message: &str) {
        let frame = self.frame.borrow();
        log::info!("[{}#{}] {message}", frame.object_name, frame.object_id);
    }

    fn get_prop(&mut self, key: &str) -> Dynamic {
        self.frame
            .borrow()
            .properties
            .get(key)
            .cloned()
            .unwrap_or(Dynamic::UNIT)
    }

    fn set_prop(&mut self, key: &str, value: Dynamic) {
        self.frame.borrow_mut().properties.insert(key.into(), value);
    }

    fn has_prop(&mut self, key: &str) -> bool {
        self.frame.borrow().properties.contains_key(key)
    }

    fn add_tag(&mut self, tag: &str) {
        self.queue(ScriptCommand::AddTag(tag.to_string()));
    }

    fn remove_tag(&mut self, tag: &str) {
        self.queue(ScriptCommand::RemoveTag(tag.to_string()));
    }

    fn objects_with_tag(&mut self, tag: &str) -> Array {
        let frame = self.frame.borrow();
        frame
            .tags
            .get(tag)
            .map(|ids| ids.iter().map(|&id| Dynamic::from(id as i64)).collect())
            .unwrap_or_default()
    }

    /// Exact-radius query against the frame's position snapshot,
    /// excluding the calling object
    fn query_radius(&mut self, x: f64, z: f64, radius: f64) -> Array {
        let frame = self.frame.borrow();
        let r2 = (radius * radius) as f32;
        frame
            .positions
            .iter()
            .filter(|&(&id, p)| {
                let dx = p.x - x as f32;
                let dz = p.z - z as f32;
                id != frame.object_id && dx * dx + dz * dz <= r2
            })
            .map(|(&id, _)| Dynamic::from(id as i64))
            .collect()
    }

    fn position_of(&mut self, id: i64) -> Array {
        let frame = self.frame.borrow();
        frame
            .positions
            .get(&(id as u64))
            .map(|p| {
                vec![
                    Dynamic::from(f64::from(p.x)),
                    Dynamic::from(f64::from(p.y)),
                    Dynamic::from(f64::from(p.z)),
                ]
            })
            .unwrap_or_default()
    }

    fn is_alive(&mut self, id: i64) -> bool {
        self.frame.borrow().positions.contains_key(&(id as u64))
    }

    fn distance_to(&mut self, id: i64) -> f64 {
        let frame = self.frame.borrow();
        frame
            .positions
            .get(&(id as u64))
            .map_or(f64::INFINITY, |p| {
                let dx = p.x - frame.position.x;
                let dz = p.z - frame.position.z;
                f64::from((dx * dx + dz * dz).sqrt())
            })
    }

    fn start_coroutine(&mut self, function: &str) -> i64 {
        let mut frame = self.frame.borrow_mut();
        let id = frame.next_coroutine_id;
        frame.next_coroutine_id += 1;
        frame.commands.push(ScriptCommand::StartCoroutine {
            id,
            function: function.to_string(),
        });
        id as i64
    }

    fn stop_coroutine(&mut self, id: i64) {
        self.queue(ScriptCommand::StopCoroutine { id: id as u64 });
    }

    fn tween_full(&mut self, prop: &str, to: f64, duration: f64, easing: &str, event: Option<String>) {
        let Some(prop) = TweenProp::from_name(prop) else {
            log::warn!("tween: unknown property '{prop}'");
            return;
        };
        self.queue(ScriptCommand::StartTween {
            targets: vec![(prop, to as f32)],
            duration: duration as f32,
            easing: Easing::from_name(easing),
            completion_event: event,
        });
    }

    fn after(&mut self, delay: f64, event: &str) {
        self.queue(ScriptCommand::StartTimer {
            delay: delay as f32,
            repeat: false,
            event: event.to_string(),
        });
    }

    fn every(&mut self, interval: f64, event: &str) {
        self.queue(ScriptCommand::StartTimer {
            delay: interval as f32,
            repeat: true,
            event: event.to_string(),
        });
    }

    fn attach_behavior(&mut self, name: &str, params: Map) {
        self.queue(ScriptCommand::AttachBehavior {
            name: name.to_string(),
            params,
        });
    }

    fn detach_behavior(&mut self, name: &str) {
        self.queue(ScriptCommand::DetachBehavior(name.to_string()));
    }

    fn subscribe(&mut self, event: &str) {
        self.queue(ScriptCommand::Subscribe(event.to_string()));
    }

    fn unsubscribe(&mut self, event: &str) {
        self.queue(ScriptCommand::Unsubscribe(event.to_string()));
    }

    fn emit(&mut self, event: &str, data: Dynamic) {
        self.queue(ScriptCommand::Emit {
            event: event.to_string(),
            data,
        });
    }

    fn run_task(&mut self, task: &str, data: Map) -> i64 {
        let mut frame = self.frame.borrow_mut();
        let task_ref = frame.next_task_ref;
        frame.next_task_ref += 1;
        frame.commands.push(ScriptCommand::RunTask {
            task_ref,
            task: task.to_string(),
            data: Dynamic::from_map(data),
        });
        task_ref as i64
    }
}

macro_rules! axis_accessors {
    ($engine:expr, $( $name:literal => $field:ident . $axis:ident ),+ $(,)?) => {
        $(
            $engine.register_get_set(
                $name,
                |ctx: &mut ScriptContext| f64::from(ctx.frame.borrow().$field.$axis),
                |ctx: &mut ScriptContext, value: f64| {
                    ctx.frame.borrow_mut().$field.$axis = value as f32;
                },
            );
        )+
    };
}

/// Register the context type, its methods and the free utility
/// functions on a script engine
pub fn register_api(engine: &mut Engine) {
    engine.register_type_with_name::<ScriptContext>("Ctx");

    axis_accessors!(engine,
        "x" => position.x,
        "y" => position.y,
        "z" => position.z,
        "rot_x" => rotation.x,
        "rot_y" => rotation.y,
        "rot_z" => rotation.z,
        "scale_x" => scale.x,
        "scale_y" => scale.y,
        "scale_z" => scale.z,
    );

    engine.register_fn("id", ScriptContext::id);
    engine.register_fn("name", ScriptContext::name);
    engine.register_fn("log", ScriptContext::log);
    engine.register_fn("get_prop", ScriptContext::get_prop);
    engine.register_fn("set_prop", ScriptContext::set_prop);
    engine.register_fn("has_prop", ScriptContext::has_prop);
    engine.register_fn("add_tag", ScriptContext::add_tag);
    engine.register_fn("remove_tag", ScriptContext::remove_tag);
    engine.register_fn("objects_with_tag", ScriptContext::objects_with_tag);
    engine.register_fn("query_radius", ScriptContext::query_radius);
    engine.register_fn("position_of", ScriptContext::position_of);
    engine.register_fn("is_alive", ScriptContext::is_alive);
    engine.register_fn("distance_to", ScriptContext::distance_to);
    engine.register_fn("start_coroutine", ScriptContext::start_coroutine);
    engine.register_fn("stop_coroutine", ScriptContext::stop_coroutine);
    engine.register_fn("after", ScriptContext::after);
    engine.register_fn("every", ScriptContext::every);
    engine.register_fn("attach_behavior", ScriptContext::attach_behavior);
    engine.register_fn("detach_behavior", ScriptContext::detach_behavior);
    engine.register_fn("subscribe", ScriptContext::subscribe);
    engine.register_fn("unsubscribe", ScriptContext::unsubscribe);
    engine.register_fn("emit", ScriptContext::emit);
    engine.register_fn("run_task", ScriptContext::run_task);

    engine.register_fn("attach_behavior", |ctx: &mut ScriptContext, name: &str| {
        ctx.attach_behavior(name, Map::new());
    });
    engine.register_fn("emit", |ctx: &mut ScriptContext, event: &str| {
        ctx.emit(event, Dynamic::UNIT);
    });
    engine.register_fn(
        "tween",
        |ctx: &mut ScriptContext, prop: &str, to: f64, duration: f64| {
            ctx.tween_full(prop, to, duration, "linear", None);
        },
    );
    engine.register_fn(
        "tween",
        |ctx: &mut ScriptContext, prop: &str, to: f64, duration: f64, easing: &str| {
            ctx.tween_full(prop, to, duration, easing, None);
        },
    );
    engine.register_fn(
        "tween",
        |ctx: &mut ScriptContext, prop: &str, to: f64, duration: f64, easing: &str, event: &str| {
            ctx.tween_full(prop, to, duration, easing, Some(event.to_string()));
        },
    );

    engine.register_fn("lerp", |a: f64, b: f64, t: f64| a + (b - a) * t);
    engine.register_fn("clamp", |v: f64, lo: f64, hi: f64| v.clamp(lo, hi));
    engine.register_fn("distance", |x1: f64, z1: f64, x2: f64, z2: f64| {
        ((x2 - x1).powi(2) + (z2 - z1).powi(2)).sqrt()
    });
    engine.register_fn("rand_range", |min: f64, max: f64| {
        if min >= max {
            min
        } else {
            rand::thread_rng().gen_range(min..max)
        }
    });
    engine.register_fn("ease", |curve: &str, t: f64| {
        f64::from(Easing::from_name(curve).sample(t as f32))
    });
}
