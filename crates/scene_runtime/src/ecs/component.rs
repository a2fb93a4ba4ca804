//! Component trait and lifecycle state
//!
//! Components are typed property-bag behaviors attached to entities.
//! Each kind is identified by an interned tag registered once, and may
//! declare other kinds it depends on; the manager attaches missing
//! dependencies automatically before the dependent component runs.

use crate::scene::{GameObject, ObjectId};

/// Interned component kind tag
///
/// Kinds are unique per entity: attaching a second component of the
/// same kind is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentKind(pub &'static str);

impl ComponentKind {
    /// Builtin transform component kind
    pub const TRANSFORM: ComponentKind = ComponentKind("Transform");
    /// Builtin render component kind
    pub const RENDER: ComponentKind = ComponentKind("Render");
    /// Builtin physics component kind
    pub const PHYSICS: ComponentKind = ComponentKind("Physics");

    /// Kind name, used in logs and serialized data
    pub fn name(self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// Constructor function producing a fresh component of some kind
pub type ComponentCtor = fn() -> Box<dyn Component>;

/// A declared dependency: the required kind plus a constructor so an
/// unregistered kind can be auto-registered on first use.
#[derive(Clone, Copy)]
pub struct ComponentSpec {
    /// Required component kind
    pub kind: ComponentKind,
    /// Constructor used for auto-registration and auto-attach
    pub ctor: ComponentCtor,
}

impl ComponentSpec {
    /// Declare a dependency on `kind` built by `ctor`
    pub fn new(kind: ComponentKind, ctor: ComponentCtor) -> Self {
        Self { kind, ctor }
    }
}

/// Mutable view handed to component lifecycle hooks
pub struct ComponentCtx<'a> {
    /// The owning scene object
    pub object: &'a mut GameObject,
}

/// Behavior and data unit attachable to an entity
///
/// All hooks default to no-ops so components implement only the slice
/// of the lifecycle they care about.
pub trait Component: Send + Sync {
    /// Kind tag of this component
    fn kind(&self) -> ComponentKind;

    /// Kinds that must be present on the same entity
    fn dependencies(&self) -> Vec<ComponentSpec> {
        Vec::new()
    }

    /// Called when the component is stored on an entity
    fn on_attach(&mut self, _owner: ObjectId) {}

    /// Called when the component is removed from its entity
    fn on_detach(&mut self) {}

    /// One-time init, before any `start`
    fn awake(&mut self, _ctx: &mut ComponentCtx<'_>) {}

    /// One-time init, after every component's `awake`
    fn start(&mut self, _ctx: &mut ComponentCtx<'_>) {}

    /// Per-frame update while enabled
    fn update(&mut self, _ctx: &mut ComponentCtx<'_>, _dt: f32) {}

    /// Per-frame update after all `update` calls
    fn late_update(&mut self, _ctx: &mut ComponentCtx<'_>, _dt: f32) {}

    /// Called when the enabled flag flips on
    fn on_enable(&mut self) {}

    /// Called when the enabled flag flips off
    fn on_disable(&mut self) {}

    /// Serializable view of this component's tunable state
    fn properties(&self) -> serde_json::Map<String, serde_json::Value> {
        serde_json::Map::new()
    }

    /// Write one tunable property back; unknown keys are ignored
    fn set_property(&mut self, _key: &str, _value: serde_json::Value) {}
}

/// Lifecycle position of an attached component instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentState {
    /// Constructed but not yet stored on an entity
    Constructed,
    /// Stored on an entity, `on_attach` ran
    Attached,
    /// `awake` ran
    Awake,
    /// `start` ran; updates are live
    Started,
    /// Removed; terminal
    Detached,
}

/// A component instance stored on an entity, with the bookkeeping the
/// entity tracks on its behalf (enabled flag, owner, lifecycle state).
pub struct AttachedComponent {
    owner: ObjectId,
    enabled: bool,
    state: ComponentState,
    component: Box<dyn Component>,
}

impl AttachedComponent {
    /// Attach `component` to the entity owning `owner`
    pub fn attach(owner: ObjectId, mut component: Box<dyn Component>) -> Self {
        component.on_attach(owner);
        Self {
            owner,
            enabled: true,
            state: ComponentState::Attached,
            component,
        }
    }

    /// Kind tag of the wrapped component
    pub fn kind(&self) -> ComponentKind {
        self.component.kind()
    }

    /// Owning object id
    pub fn owner(&self) -> ObjectId {
        self.owner
    }

    /// Current lifecycle state
    pub fn state(&self) -> ComponentState {
        self.state
    }

    /// Whether updates run for this component
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Flip the enabled flag, firing `on_enable`/`on_disable` on change
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled == enabled {
            return;
        }
        self.enabled = enabled;
        if enabled {
            self.component.on_enable();
        } else {
            self.component.on_disable();
        }
    }

    /// Declared dependencies of the wrapped component
    pub fn dependencies(&self) -> Vec<ComponentSpec> {
        self.component.dependencies()
    }

    /// Immutable access to the wrapped component
    pub fn inner(&self) -> &dyn Component {
        self.component.as_ref()
    }

    /// Mutable access to the wrapped component
    pub fn inner_mut(&mut self) -> &mut dyn Component {
        self.component.as_mut()
    }

    /// Run `awake` once; later calls are no-ops
    pub fn awake(&mut self, ctx: &mut ComponentCtx<'_>) {
        if self.state == ComponentState::Attached {
            self.component.awake(ctx);
            self.state = ComponentState::Awake;
        }
    }

    /// Run `start` once, after `awake`
    pub fn start(&mut self, ctx: &mut ComponentCtx<'_>) {
        if self.state == ComponentState::Awake {
            self.component.start(ctx);
            self.state = ComponentState::Started;
        }
    }

    /// Per-frame update; skipped while disabled or detached
    pub fn update(&mut self, ctx: &mut ComponentCtx<'_>, dt: f32) {
        if self.enabled && self.state != ComponentState::Detached {
            self.component.update(ctx, dt);
        }
    }

    /// Per-frame late update; skipped while disabled or detached
    pub fn late_update(&mut self, ctx: &mut ComponentCtx<'_>, dt: f32) {
        if self.enabled && self.state != ComponentState::Detached {
            self.component.late_update(ctx, dt);
        }
    }

    /// Run `on_detach` and enter the terminal state
    pub fn detach(&mut self) {
        if self.state != ComponentState::Detached {
            self.component.on_detach();
            self.state = ComponentState::Detached;
        }
    }
}

impl std::fmt::Debug for AttachedComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachedComponent")
            .field("kind", &self.kind().name())
            .field("owner", &self.owner)
            .field("enabled", &self.enabled)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{GameObject, Scene};

    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct Counter {
        enables: Arc<AtomicU32>,
        disables: Arc<AtomicU32>,
    }

    impl Component for Counter {
        fn kind(&self) -> ComponentKind {
            ComponentKind("Counter")
        }
        fn on_enable(&mut self) {
            self.enables.fetch_add(1, Ordering::SeqCst);
        }
        fn on_disable(&mut self) {
            self.disables.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counter() -> (Box<Counter>, Arc<AtomicU32>, Arc<AtomicU32>) {
        let enables = Arc::new(AtomicU32::new(0));
        let disables = Arc::new(AtomicU32::new(0));
        let c = Box::new(Counter {
            enables: Arc::clone(&enables),
            disables: Arc::clone(&disables),
        });
        (c, enables, disables)
    }

    #[test]
    fn enable_toggle_fires_hooks_once_per_change() {
        let mut scene = Scene::new();
        let id = scene.add_object(GameObject::new("o"));
        let (c, enables, disables) = counter();
        let mut attached = AttachedComponent::attach(id, c);

        attached.set_enabled(true); // already enabled, no hook
        attached.set_enabled(false);
        attached.set_enabled(false); // no change, no hook
        attached.set_enabled(true);

        assert_eq!(enables.load(Ordering::SeqCst), 1);
        assert_eq!(disables.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn lifecycle_transitions_run_once() {
        let mut scene = Scene::new();
        let id = scene.add_object(GameObject::new("o"));
        let obj = scene.get_mut(id).unwrap();
        let mut ctx = ComponentCtx { object: obj };

        let (c, _, _) = counter();
        let mut attached = AttachedComponent::attach(id, c);
        assert_eq!(attached.state(), ComponentState::Attached);

        attached.awake(&mut ctx);
        assert_eq!(attached.state(), ComponentState::Awake);
        attached.awake(&mut ctx); // idempotent
        assert_eq!(attached.state(), ComponentState::Awake);

        attached.start(&mut ctx);
        assert_eq!(attached.state(), ComponentState::Started);

        attached.detach();
        assert_eq!(attached.state(), ComponentState::Detached);
    }
}
