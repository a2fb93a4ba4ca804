//! Per-object scripting
//!
//! Every scene object can carry a script with Unity-style lifecycle
//! hooks. Scripts talk to the engine through a registered API over a
//! per-frame context; cross-object effects go through a deferred
//! command queue. The system layers coroutines, tweens, timers, a
//! behavior library and an event bus on top of the hook cycle.

pub mod api;
pub mod behavior;
pub mod coroutine;
pub mod events;
pub mod game_loop;
pub mod instance;
pub mod system;
pub mod timer;
pub mod tween;

pub use api::{ScriptCommand, ScriptContext, ScriptFrame};
pub use behavior::{create_behavior, Behavior, BehaviorCtx};
pub use coroutine::{Coroutine, CoroutineStatus};
pub use events::{Event, EventBus};
pub use game_loop::{GameLoop, LoopSettings};
pub use instance::{ScriptError, ScriptInstance};
pub use system::{ScriptSystem, ScriptValidation};
pub use timer::Timer;
pub use tween::{Easing, Tween, TweenProp};
