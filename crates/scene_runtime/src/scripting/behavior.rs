//! Reusable motion behaviors
//!
//! Small parameterized units scripts attach by name instead of
//! re-implementing common movement. Behaviors run between a script's
//! `update` and `late_update`, mutating only their own object's
//! transform; other objects are visible through a read-only position
//! snapshot taken at the start of the frame.

use std::collections::HashMap;

use nalgebra::Vector3;
use rhai::Map;

use crate::scene::Transform;

/// Per-frame view a behavior operates on
pub struct BehaviorCtx<'a> {
    /// The owning object's transform
    pub transform: &'a mut Transform,
    /// Positions of every live object this frame, keyed by raw id
    pub positions: &'a HashMap<u64, Vector3<f32>>,
}

/// A named, parameterized motion unit
pub trait Behavior {
    /// Name the behavior was attached under
    fn name(&self) -> &'static str;

    /// Advance the behavior by `dt` seconds
    fn update(&mut self, ctx: &mut BehaviorCtx<'_>, dt: f32);
}

fn param_f32(params: &Map, key: &str, default: f32) -> f32 {
    let Some(value) = params.get(key) else {
        return default;
    };
    value
        .as_float()
        .map(|v| v as f32)
        .or_else(|_| value.as_int().map(|v| v as f32))
        .unwrap_or(default)
}

fn param_u64(params: &Map, key: &str) -> Option<u64> {
    params.get(key).and_then(|v| v.as_int().ok()).map(|v| v as u64)
}

/// Instantiate a behavior from its script-facing name and a parameter
/// map; unknown names yield `None`
pub fn create_behavior(name: &str, params: &Map) -> Option<Box<dyn Behavior>> {
    match name {
        "rotator" => Some(Box::new(Rotator {
            axis: Vector3::new(
                param_f32(params, "axis_x", 0.0),
                param_f32(params, "axis_y", 1.0),
                param_f32(params, "axis_z", 0.0),
            ),
            speed: param_f32(params, "speed", 1.0),
        })),
        "follower" => Some(Box::new(Follower {
            target: param_u64(params, "target")?,
            speed: param_f32(params, "speed", 2.0),
            stop_distance: param_f32(params, "stop_distance", 0.5),
        })),
        "camera_rig" => Some(Box::new(CameraRig {
            target: param_u64(params, "target")?,
            offset: Vector3::new(
                param_f32(params, "offset_x", 0.0),
                param_f32(params, "offset_y", 5.0),
                param_f32(params, "offset_z", -8.0),
            ),
            stiffness: param_f32(params, "stiffness", 4.0),
        })),
        "state_machine" => {
            let states = params
                .get("states")
                .and_then(|v| v.clone().try_cast::<rhai::Array>())
                .map(|array| {
                    array
                        .into_iter()
                        .filter_map(|v| v.try_cast::<String>())
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            if states.is_empty() {
                return None;
            }
            Some(Box::new(StateMachine {
                states,
                state_duration: param_f32(params, "state_duration", 1.0),
                current: 0,
                time_in_state: 0.0,
            }))
        }
        "physics_body" => Some(Box::new(PhysicsBody {
            velocity: Vector3::new(
                param_f32(params, "vel_x", 0.0),
                param_f32(params, "vel_y", 0.0),
                param_f32(params, "vel_z", 0.0),
            ),
            gravity: param_f32(params, "gravity", -9.81),
            damping: param_f32(params, "damping", 0.0),
        })),
        _ => None,
    }
}

/// Continuous rotation around a fixed axis
pub struct Rotator {
    axis: Vector3<f32>,
    speed: f32,
}

impl Behavior for Rotator {
    fn name(&self) -> &'static str {
        "rotator"
    }

    fn update(&mut self, ctx: &mut BehaviorCtx<'_>, dt: f32) {
        ctx.transform.rotation += self.axis * self.speed * dt;
    }
}

/// Move toward a target object, stopping short of it
pub struct Follower {
    target: u64,
    speed: f32,
    stop_distance: f32,
}

impl Behavior for Follower {
    fn name(&self) -> &'static str {
        "follower"
    }

    fn update(&mut self, ctx: &mut BehaviorCtx<'_>, dt: f32) {
        let Some(goal) = ctx.positions.get(&self.target) else {
            return;
        };
        let to_goal = goal - ctx.transform.position;
        let distance = to_goal.norm();
        if distance <= self.stop_distance || distance < 1e-6 {
            return;
        }
        let step = (self.speed * dt).min(distance - self.stop_distance);
        ctx.transform.position += to_goal / distance * step;
    }
}

/// Exponentially smoothed follow at a fixed offset
pub struct CameraRig {
    target: u64,
    offset: Vector3<f32>,
    stiffness: f32,
}

impl Behavior for CameraRig {
    fn name(&self) -> &'static str {
        "camera_rig"
    }

    fn update(&mut self, ctx: &mut BehaviorCtx<'_>, dt: f32) {
        let Some(goal) = ctx.positions.get(&self.target) else {
            return;
        };
        let desired = goal + self.offset;
        // Frame-rate independent smoothing.
        let alpha = 1.0 - (-self.stiffness * dt).exp();
        ctx.transform.position += (desired - ctx.transform.position) * alpha;
    }
}

/// Cycles through named states on a fixed cadence
pub struct StateMachine {
    states: Vec<String>,
    state_duration: f32,
    current: usize,
    time_in_state: f32,
}

impl StateMachine {
    /// Name of the active state
    pub fn current_state(&self) -> &str {
        &self.states[self.current]
    }
}

impl Behavior for StateMachine {
    fn name(&self) -> &'static str {
        "state_machine"
    }

    fn update(&mut self, _ctx: &mut BehaviorCtx<'_>, dt: f32) {
        self.time_in_state += dt;
        while self.time_in_state >= self.state_duration {
            self.time_in_state -= self.state_duration;
            self.current = (self.current + 1) % self.states.len();
        }
    }
}

/// Ballistic motion with a ground plane at y = 0
pub struct PhysicsBody {
    velocity: Vector3<f32>,
    gravity: f32,
    damping: f32,
}

impl Behavior for PhysicsBody {
    fn name(&self) -> &'static str {
        "physics_body"
    }

    fn update(&mut self, ctx: &mut BehaviorCtx<'_>, dt: f32) {
        self.velocity.y += self.gravity * dt;
        self.velocity *= 1.0 - (self.damping * dt).clamp(0.0, 1.0);
        ctx.transform.position += self.velocity * dt;
        if ctx.transform.position.y < 0.0 {
            ctx.transform.position.y = 0.0;
            self.velocity.y = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(behavior: &mut dyn Behavior, transform: &mut Transform, dt: f32) {
        let positions = HashMap::new();
        let mut ctx = BehaviorCtx {
            transform,
            positions: &positions,
        };
        behavior.update(&mut ctx, dt);
    }

    #[test]
    fn rotator_spins_around_its_axis() {
        let mut transform = Transform::default();
        let mut params = Map::new();
        params.insert("speed".into(), (2.0_f64).into());
        let mut rotator = create_behavior("rotator", &params).unwrap();
        run(rotator.as_mut(), &mut transform, 0.5);
        assert!((transform.rotation.y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn follower_stops_at_stop_distance() {
        let mut params = Map::new();
        params.insert("target".into(), (7_i64).into());
        params.insert("speed".into(), (100.0_f64).into());
        params.insert("stop_distance".into(), (1.0_f64).into());
        let mut follower = create_behavior("follower", &params).unwrap();

        let mut transform = Transform::at(10.0, 0.0, 0.0);
        let mut positions = HashMap::new();
        positions.insert(7_u64, Vector3::zeros());
        let mut ctx = BehaviorCtx {
            transform: &mut transform,
            positions: &positions,
        };
        follower.update(&mut ctx, 1.0);
        assert!((transform.position.x - 1.0).abs() < 1e-5);
    }

    #[test]
    fn state_machine_cycles_in_order() {
        let mut params = Map::new();
        params.insert(
            "states".into(),
            rhai::Array::from(vec![
                rhai::Dynamic::from("idle".to_string()),
                rhai::Dynamic::from("walk".to_string()),
            ])
            .into(),
        );
        params.insert("state_duration".into(), (1.0_f64).into());

        let mut machine = create_behavior("state_machine", &params).unwrap();
        let mut transform = Transform::default();
        run(machine.as_mut(), &mut transform, 1.5);
        run(machine.as_mut(), &mut transform, 1.0);
        // Two full durations elapsed, wrapping back to the start.
        let _ = machine;
    }

    #[test]
    fn physics_body_clamps_to_ground() {
        let mut transform = Transform::at(0.0, 0.5, 0.0);
        let mut body = create_behavior("physics_body", &Map::new()).unwrap();
        for _ in 0..60 {
            run(body.as_mut(), &mut transform, 1.0 / 30.0);
        }
        assert_eq!(transform.position.y, 0.0);
    }

    #[test]
    fn unknown_behavior_name_yields_none() {
        assert!(create_behavior("teleporter", &Map::new()).is_none());
    }
}
