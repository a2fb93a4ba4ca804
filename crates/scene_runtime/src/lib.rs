//! # Scene Runtime
//!
//! The headless core of a 3D scene playground: an editable scene of
//! objects that, in play mode, are driven by components, per-object
//! scripts and background workers.
//!
//! ## Features
//!
//! - **Entity-Component Runtime**: typed components with declared
//!   dependencies and dependency-ordered lifecycle
//! - **Per-Object Scripting**: rhai scripts with Unity-style hooks,
//!   cooperative coroutines and a deferred command queue
//! - **Spatial Index**: XZ-plane quadtree rebuilt every frame, with
//!   exact radius queries
//! - **Tweens, Timers and Events**: frame-driven animation and a
//!   deferred event bus
//! - **Background Workers**: CPU-heavy tasks on a thread pool,
//!   awaitable from coroutines
//!
//! ## Quick Start
//!
//! ```rust
//! use scene_runtime::prelude::*;
//!
//! let mut runtime = Runtime::new(RuntimeConfig::default());
//! let id = runtime.scene_mut().add_object(
//!     GameObject::new("spinner")
//!         .with_script("// Spinner\nfn update(ctx, dt) { ctx.rot_y = ctx.rot_y + dt; }"),
//! );
//!
//! runtime.enter_play();
//! for _ in 0..60 {
//!     runtime.tick(1.0 / 60.0);
//! }
//! runtime.exit_play();
//!
//! assert!(runtime.scene().get(id).unwrap().transform.rotation.y > 0.0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod ecs;
pub mod scene;
pub mod scripting;
pub mod spatial;
pub mod workers;

mod runtime;

pub use runtime::{Mode, Runtime};

/// Common imports for runtime users
pub mod prelude {
    pub use crate::{
        config::{Config, RuntimeConfig},
        ecs::{Component, ComponentKind, EcsManager},
        scene::{GameObject, ObjectId, Scene, Transform},
        scripting::{Easing, ScriptSystem, Tween, TweenProp},
        spatial::{QuadTree, QuadTreeConfig, Rect},
        workers::{TaskHandle, WorkerPool},
        Mode, Runtime,
    };
}
