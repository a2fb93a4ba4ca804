//! Compiled script instances
//!
//! One instance wraps one object's compiled script: the AST, a
//! persistent scope, the working property bag and the coroutines,
//! behaviors and subscriptions the script has accumulated. Top-level
//! statements run once at creation; lifecycle hooks are invoked
//! against the cached AST afterwards.

use std::collections::{HashMap, HashSet};

use rhai::{CallFnOptions, Dynamic, Engine, FuncArgs, Map, Scope, AST};
use thiserror::Error;

use super::behavior::Behavior;
use super::coroutine::Coroutine;
use crate::workers::TaskHandle;

/// Failures compiling or running a script
#[derive(Debug, Error)]
pub enum ScriptError {
    /// Source did not compile
    #[error("script compile error: {0}")]
    Compile(String),

    /// A lifecycle hook or coroutine raised at runtime
    #[error("script runtime error: {0}")]
    Runtime(String),
}

/// Which lifecycle hooks the script defines, detected once at compile
/// time so absent hooks cost nothing per frame
#[derive(Debug, Clone, Copy, Default)]
pub struct LifecycleHooks {
    /// `fn awake(ctx)`
    pub awake: bool,
    /// `fn start(ctx)`
    pub start: bool,
    /// `fn update(ctx, dt)`
    pub update: bool,
    /// `fn fixed_update(ctx, dt)`
    pub fixed_update: bool,
    /// `fn late_update(ctx, dt)`
    pub late_update: bool,
    /// `fn on_event(ctx, name, data)`
    pub on_event: bool,
    /// `fn on_enable(ctx)`
    pub on_enable: bool,
    /// `fn on_disable(ctx)`
    pub on_disable: bool,
    /// `fn on_destroy(ctx)`
    pub on_destroy: bool,
}

/// A live script bound to one scene object
pub struct ScriptInstance {
    name: String,
    ast: AST,
    scope: Scope<'static>,
    hooks: LifecycleHooks,

    /// Working property bag, flushed back to the object each frame
    pub properties: Map,
    /// Disabled instances skip every per-frame pass
    pub enabled: bool,
    /// Whether `start` has run
    pub started: bool,
    /// Coroutines scheduled on this instance
    pub coroutines: Vec<Coroutine>,
    /// Behaviors attached by this script
    pub behaviors: Vec<Box<dyn Behavior>>,
    /// Event names this instance receives
    pub subscriptions: HashSet<String>,
    /// Script-side task references mapped to real pool handles
    pub task_refs: HashMap<u64, TaskHandle>,
    /// Allocator state carried between frames
    pub next_coroutine_id: u64,
    /// Allocator state carried between frames
    pub next_task_ref: u64,
}

/// Display name parsed from a leading `// Name` comment line
pub fn script_name(source: &str) -> String {
    source
        .lines()
        .next()
        .and_then(|line| line.trim().strip_prefix("//"))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map_or_else(|| "UnnamedScript".to_string(), ToString::to_string)
}

impl ScriptInstance {
    /// Compile `source` and run its top-level statements once.
    ///
    /// Compile errors and errors thrown by top-level statements both
    /// count as creation failure.
    pub fn compile(engine: &Engine, source: &str) -> Result<Self, ScriptError> {
        let ast = engine
            .compile(source)
            .map_err(|e| ScriptError::Compile(e.to_string()))?;

        let mut hooks = LifecycleHooks::default();
        for function in ast.iter_functions() {
            match function.name {
                "awake" => hooks.awake = true,
                "start" => hooks.start = true,
                "update" => hooks.update = true,
                "fixed_update" => hooks.fixed_update = true,
                "late_update" => hooks.late_update = true,
                "on_event" => hooks.on_event = true,
                "on_enable" => hooks.on_enable = true,
                "on_disable" => hooks.on_disable = true,
                "on_destroy" => hooks.on_destroy = true,
                _ => {}
            }
        }

        let mut scope = Scope::new();
        engine
            .run_ast_with_scope(&mut scope, &ast)
            .map_err(|e| ScriptError::Compile(e.to_string()))?;

        Ok(Self {
            name: script_name(source),
            ast,
            scope,
            hooks,
            properties: Map::new(),
            enabled: true,
            started: false,
            coroutines: Vec::new(),
            behaviors: Vec::new(),
            subscriptions: HashSet::new(),
            task_refs: HashMap::new(),
            next_coroutine_id: 1,
            next_task_ref: 1,
        })
    }

    /// Script display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Which hooks the script defines
    pub fn hooks(&self) -> LifecycleHooks {
        self.hooks
    }

    /// Invoke a lifecycle hook against the cached AST.
    ///
    /// The caller is expected to have checked the hook exists; calling
    /// an undefined function is still tolerated and reported as a
    /// runtime error by the engine.
    pub fn call(
        &mut self,
        engine: &Engine,
        function: &str,
        args: impl FuncArgs,
    ) -> Result<Dynamic, ScriptError> {
        let options = CallFnOptions::new().eval_ast(false);
        engine
            .call_fn_with_options(options, &mut self.scope, &self.ast, function, args)
            .map_err(|e| ScriptError::Runtime(format!("{function}: {e}")))
    }

    /// Resume the coroutine at `index`, binding its state map as
    /// `this`, and fold the return value into its status
    pub fn resume_coroutine(
        &mut self,
        engine: &Engine,
        index: usize,
        args: impl FuncArgs,
    ) -> Result<(), ScriptError> {
        let coroutine = &mut self.coroutines[index];
        let function = coroutine.function.clone();
        let options = CallFnOptions::new()
            .eval_ast(false)
            .bind_this_ptr(&mut coroutine.state);
        let result = engine
            .call_fn_with_options::<Dynamic>(options, &mut self.scope, &self.ast, &function, args)
            .map_err(|e| ScriptError::Runtime(format!("coroutine {function}: {e}")))?;
        coroutine.apply_result(&result);
        Ok(())
    }
}

/// Convert a persisted JSON property bag into script map form
pub fn json_to_map(properties: &serde_json::Map<String, serde_json::Value>) -> Map {
    properties
        .iter()
        .filter_map(|(key, value)| {
            rhai::serde::to_dynamic(value)
                .ok()
                .map(|dynamic| (key.as_str().into(), dynamic))
        })
        .collect()
}

/// Convert a script property bag back to its persisted JSON form.
///
/// Values with no JSON representation (engine handles and the like)
/// are dropped rather than failing the whole bag.
pub fn map_to_json(properties: &Map) -> serde_json::Map<String, serde_json::Value> {
    properties
        .iter()
        .filter_map(|(key, value)| {
            rhai::serde::from_dynamic::<serde_json::Value>(value)
                .ok()
                .map(|json| (key.to_string(), json))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_comes_from_the_leading_comment() {
        assert_eq!(script_name("// Patrol AI\nfn update(ctx, dt) {}"), "Patrol AI");
        assert_eq!(script_name("fn update(ctx, dt) {}"), "UnnamedScript");
        assert_eq!(script_name("//\nfn update(ctx, dt) {}"), "UnnamedScript");
    }

    #[test]
    fn hooks_are_detected_at_compile_time() {
        let engine = Engine::new();
        let instance = ScriptInstance::compile(
            &engine,
            "// T\nfn update(ctx, dt) {}\nfn on_destroy(ctx) {}",
        )
        .unwrap();
        let hooks = instance.hooks();
        assert!(hooks.update);
        assert!(hooks.on_destroy);
        assert!(!hooks.start);
    }

    #[test]
    fn compile_error_is_reported_as_creation_failure() {
        let engine = Engine::new();
        let Err(error) = ScriptInstance::compile(&engine, "fn update(ctx, dt) {") else {
            panic!("unterminated source must not compile");
        };
        assert!(matches!(error, ScriptError::Compile(_)));
    }

    #[test]
    fn top_level_throw_fails_creation() {
        let engine = Engine::new();
        let Err(error) = ScriptInstance::compile(&engine, "throw \"bad setup\";") else {
            panic!("top-level throw must fail creation");
        };
        assert!(matches!(error, ScriptError::Compile(_)));
    }

    #[test]
    fn property_bags_round_trip_through_json() {
        let mut json = serde_json::Map::new();
        json.insert("hp".to_string(), serde_json::json!(12));
        json.insert("label".to_string(), serde_json::json!("guard"));

        let map = json_to_map(&json);
        assert_eq!(map.get("hp").unwrap().as_int().unwrap(), 12);

        let back = map_to_json(&map);
        assert_eq!(back, json);
    }
}
