//! Property tweens
//!
//! A tween animates one or more transform fields of a scene object
//! toward target values over a fixed duration, sampling an easing
//! curve. Start values are captured when the tween is created, the
//! final frame snaps exactly to the targets, and the completion hook
//! fires exactly once even when the last step lands past the end.

use crate::scene::{ObjectId, Scene};

/// Easing curves selectable by name from scripts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Easing {
    /// Constant-speed interpolation
    #[default]
    Linear,
    /// Quadratic ease-in
    EaseIn,
    /// Quadratic ease-out
    EaseOut,
    /// Quadratic ease-in-out
    EaseInOut,
    /// Overshooting elastic settle
    Elastic,
    /// Decaying bounce toward the target
    Bounce,
}

impl Easing {
    /// Parse a script-facing curve name; unknown names fall back to
    /// linear
    pub fn from_name(name: &str) -> Self {
        match name {
            "ease_in" | "easeIn" => Self::EaseIn,
            "ease_out" | "easeOut" => Self::EaseOut,
            "ease_in_out" | "easeInOut" => Self::EaseInOut,
            "elastic" => Self::Elastic,
            "bounce" => Self::Bounce,
            _ => Self::Linear,
        }
    }

    /// Sample the curve at normalized time `t` in `[0, 1]`
    pub fn sample(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::EaseIn => t * t,
            Self::EaseOut => t * (2.0 - t),
            Self::EaseInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
            Self::Elastic => {
                if t == 0.0 || t == 1.0 {
                    t
                } else {
                    let c = (2.0 * std::f32::consts::PI) / 3.0;
                    2.0_f32.powf(-10.0 * t) * ((t * 10.0 - 0.75) * c).sin() + 1.0
                }
            }
            Self::Bounce => {
                let n1 = 7.5625;
                let d1 = 2.75;
                if t < 1.0 / d1 {
                    n1 * t * t
                } else if t < 2.0 / d1 {
                    let t = t - 1.5 / d1;
                    n1 * t * t + 0.75
                } else if t < 2.5 / d1 {
                    let t = t - 2.25 / d1;
                    n1 * t * t + 0.9375
                } else {
                    let t = t - 2.625 / d1;
                    n1 * t * t + 0.984375
                }
            }
        }
    }
}

/// A transform field a tween can animate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TweenProp {
    /// `transform.position.x`
    PosX,
    /// `transform.position.y`
    PosY,
    /// `transform.position.z`
    PosZ,
    /// `transform.rotation.x`
    RotX,
    /// `transform.rotation.y`
    RotY,
    /// `transform.rotation.z`
    RotZ,
    /// `transform.scale.x`
    ScaleX,
    /// `transform.scale.y`
    ScaleY,
    /// `transform.scale.z`
    ScaleZ,
}

impl TweenProp {
    /// Parse a script-facing property name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "x" => Some(Self::PosX),
            "y" => Some(Self::PosY),
            "z" => Some(Self::PosZ),
            "rot_x" => Some(Self::RotX),
            "rot_y" => Some(Self::RotY),
            "rot_z" => Some(Self::RotZ),
            "scale_x" => Some(Self::ScaleX),
            "scale_y" => Some(Self::ScaleY),
            "scale_z" => Some(Self::ScaleZ),
            _ => None,
        }
    }

    fn get(self, scene: &Scene, id: ObjectId) -> Option<f32> {
        let t = &scene.get(id)?.transform;
        Some(match self {
            Self::PosX => t.position.x,
            Self::PosY => t.position.y,
            Self::PosZ => t.position.z,
            Self::RotX => t.rotation.x,
            Self::RotY => t.rotation.y,
            Self::RotZ => t.rotation.z,
            Self::ScaleX => t.scale.x,
            Self::ScaleY => t.scale.y,
            Self::ScaleZ => t.scale.z,
        })
    }

    fn set(self, scene: &mut Scene, id: ObjectId, value: f32) {
        if let Some(object) = scene.get_mut(id) {
            let t = &mut object.transform;
            match self {
                Self::PosX => t.position.x = value,
                Self::PosY => t.position.y = value,
                Self::PosZ => t.position.z = value,
                Self::RotX => t.rotation.x = value,
                Self::RotY => t.rotation.y = value,
                Self::RotZ => t.rotation.z = value,
                Self::ScaleX => t.scale.x = value,
                Self::ScaleY => t.scale.y = value,
                Self::ScaleZ => t.scale.z = value,
            }
        }
    }
}

struct TweenTrack {
    prop: TweenProp,
    start: f32,
    end: f32,
}

/// An in-flight animation of one object's transform
pub struct Tween {
    target: ObjectId,
    tracks: Vec<TweenTrack>,
    duration: f32,
    elapsed: f32,
    easing: Easing,
    active: bool,
    completed: bool,
    /// Event pushed onto the bus at completion (script-created tweens)
    pub completion_event: Option<String>,
    on_complete: Option<Box<dyn FnOnce()>>,
}

impl Tween {
    /// Build a tween toward `targets`, capturing current values as the
    /// start of each track. Returns `None` if the object is gone.
    pub fn new(
        scene: &Scene,
        target: ObjectId,
        targets: &[(TweenProp, f32)],
        duration: f32,
        easing: Easing,
    ) -> Option<Self> {
        let tracks = targets
            .iter()
            .map(|&(prop, end)| {
                prop.get(scene, target).map(|start| TweenTrack { prop, start, end })
            })
            .collect::<Option<Vec<_>>>()?;
        Some(Self {
            target,
            tracks,
            duration: duration.max(f32::EPSILON),
            elapsed: 0.0,
            easing,
            active: true,
            completed: false,
            completion_event: None,
            on_complete: None,
        })
    }

    /// Install a host-side completion callback
    pub fn with_on_complete(mut self, callback: impl FnOnce() + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }

    /// Install a completion event name
    pub fn with_completion_event(mut self, event: impl Into<String>) -> Self {
        self.completion_event = Some(event.into());
        self
    }

    /// The object being animated
    pub fn target(&self) -> ObjectId {
        self.target
    }

    /// Whether the tween has reached its targets
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Pause without losing progress
    pub fn stop(&mut self) {
        self.active = false;
    }

    /// Resume a paused tween
    pub fn resume(&mut self) {
        self.active = true;
    }

    /// Rewind to the captured start values
    pub fn reset(&mut self) {
        self.elapsed = 0.0;
        self.completed = false;
    }

    /// Advance by `dt`, writing interpolated values into the scene.
    ///
    /// Returns `true` on the step that completes the tween; the
    /// completion hook is consumed so later calls cannot re-fire it.
    /// A tween whose target was deleted completes silently.
    pub fn update(&mut self, scene: &mut Scene, dt: f32) -> bool {
        if !self.active || self.completed {
            return false;
        }
        if !scene.contains(self.target) {
            self.completed = true;
            self.on_complete = None;
            return false;
        }

        self.elapsed += dt;
        let t = (self.elapsed / self.duration).min(1.0);
        let eased = self.easing.sample(t);
        for track in &self.tracks {
            let value = if t >= 1.0 {
                track.end
            } else {
                track.start + (track.end - track.start) * eased
            };
            track.prop.set(scene, self.target, value);
        }

        if t >= 1.0 {
            self.completed = true;
            if let Some(callback) = self.on_complete.take() {
                callback();
            }
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::GameObject;
    use std::cell::Cell;
    use std::rc::Rc;

    fn scene_with_object() -> (Scene, ObjectId) {
        let mut scene = Scene::new();
        let id = scene.add_object(GameObject::new("cube"));
        (scene, id)
    }

    #[test]
    fn easing_endpoints_are_exact() {
        for easing in [
            Easing::Linear,
            Easing::EaseIn,
            Easing::EaseOut,
            Easing::EaseInOut,
            Easing::Elastic,
            Easing::Bounce,
        ] {
            assert!((easing.sample(0.0)).abs() < 1e-6, "{easing:?} at 0");
            assert!((easing.sample(1.0) - 1.0).abs() < 1e-6, "{easing:?} at 1");
        }
    }

    #[test]
    fn completes_exactly_once_across_uneven_steps() {
        let (mut scene, id) = scene_with_object();
        let fired = Rc::new(Cell::new(0u32));
        let counter = Rc::clone(&fired);
        let mut tween = Tween::new(&scene, id, &[(TweenProp::PosY, 10.0)], 1.0, Easing::Linear)
            .unwrap()
            .with_on_complete(move || counter.set(counter.get() + 1));

        // 1.0s of animation delivered as 0.4 + 0.7 (overshoots the end).
        assert!(!tween.update(&mut scene, 0.4));
        assert!(tween.update(&mut scene, 0.7));
        assert!(!tween.update(&mut scene, 0.1));

        assert_eq!(fired.get(), 1);
        assert_eq!(scene.get(id).unwrap().transform.position.y, 10.0);
    }

    #[test]
    fn stop_and_resume_preserve_progress() {
        let (mut scene, id) = scene_with_object();
        let mut tween =
            Tween::new(&scene, id, &[(TweenProp::PosX, 8.0)], 1.0, Easing::Linear).unwrap();

        tween.update(&mut scene, 0.5);
        let mid = scene.get(id).unwrap().transform.position.x;
        assert!((mid - 4.0).abs() < 1e-5);

        tween.stop();
        tween.update(&mut scene, 10.0);
        assert_eq!(scene.get(id).unwrap().transform.position.x, mid);

        tween.resume();
        assert!(tween.update(&mut scene, 0.5));
        assert_eq!(scene.get(id).unwrap().transform.position.x, 8.0);
    }

    #[test]
    fn reset_restarts_from_captured_values() {
        let (mut scene, id) = scene_with_object();
        let mut tween =
            Tween::new(&scene, id, &[(TweenProp::PosZ, 4.0)], 1.0, Easing::Linear).unwrap();
        tween.update(&mut scene, 1.0);
        assert!(tween.is_completed());

        tween.reset();
        assert!(!tween.is_completed());
        tween.update(&mut scene, 0.5);
        assert!((scene.get(id).unwrap().transform.position.z - 2.0).abs() < 1e-5);
    }

    #[test]
    fn deleted_target_completes_silently() {
        let (mut scene, id) = scene_with_object();
        let mut tween =
            Tween::new(&scene, id, &[(TweenProp::PosY, 1.0)], 1.0, Easing::Linear).unwrap();
        scene.remove_object(id);
        assert!(!tween.update(&mut scene, 0.5));
        assert!(tween.is_completed());
    }
}
