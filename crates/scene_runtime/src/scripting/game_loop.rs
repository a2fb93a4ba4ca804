//! Frame pacing
//!
//! The game loop splits a variable frame delta into a variable-rate
//! update pass and zero or more fixed-rate sub-steps driven by an
//! accumulator. Sub-steps are capped per frame so a stalled process
//! cannot spiral into an ever-growing debt of simulation time.

use thiserror::Error;

/// Error returned by a registered loop callback
#[derive(Debug, Error)]
#[error("loop callback '{name}' failed: {message}")]
pub struct CallbackError {
    /// Registered callback name
    pub name: String,
    /// What went wrong
    pub message: String,
}

type LoopCallback = Box<dyn FnMut(f32) -> Result<(), String>>;

struct Registered {
    name: String,
    callback: LoopCallback,
}

/// Fixed-timestep configuration
#[derive(Debug, Clone, Copy)]
pub struct LoopSettings {
    /// Seconds simulated per fixed sub-step
    pub fixed_time_step: f32,
    /// Hard cap on fixed sub-steps per frame
    pub max_sub_steps: u32,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            fixed_time_step: 1.0 / 60.0,
            max_sub_steps: 5,
        }
    }
}

/// Accumulator-based update/fixed-update driver
pub struct GameLoop {
    settings: LoopSettings,
    accumulator: f32,
    update_callbacks: Vec<Registered>,
    fixed_callbacks: Vec<Registered>,
    late_callbacks: Vec<Registered>,
}

impl GameLoop {
    /// Create a loop with the given pacing settings
    pub fn new(settings: LoopSettings) -> Self {
        Self {
            settings,
            accumulator: 0.0,
            update_callbacks: Vec::new(),
            fixed_callbacks: Vec::new(),
            late_callbacks: Vec::new(),
        }
    }

    /// Seconds simulated per fixed sub-step
    pub fn fixed_time_step(&self) -> f32 {
        self.settings.fixed_time_step
    }

    /// Register a variable-rate callback, invoked once per frame
    pub fn on_update(
        &mut self,
        name: impl Into<String>,
        callback: impl FnMut(f32) -> Result<(), String> + 'static,
    ) {
        self.update_callbacks.push(Registered {
            name: name.into(),
            callback: Box::new(callback),
        });
    }

    /// Register a fixed-rate callback, invoked once per sub-step
    pub fn on_fixed_update(
        &mut self,
        name: impl Into<String>,
        callback: impl FnMut(f32) -> Result<(), String> + 'static,
    ) {
        self.fixed_callbacks.push(Registered {
            name: name.into(),
            callback: Box::new(callback),
        });
    }

    /// Register a late callback, invoked once per frame after the
    /// update pass and every fixed sub-step
    pub fn on_late_update(
        &mut self,
        name: impl Into<String>,
        callback: impl FnMut(f32) -> Result<(), String> + 'static,
    ) {
        self.late_callbacks.push(Registered {
            name: name.into(),
            callback: Box::new(callback),
        });
    }

    /// Advance the loop by a frame of `dt` seconds.
    ///
    /// Runs the fixed sub-steps first, then the variable update pass,
    /// then the late pass. Returns the number of fixed sub-steps
    /// executed. A failing callback is logged and the rest of the pass
    /// continues.
    pub fn advance(&mut self, dt: f32) -> u32 {
        let step = self.settings.fixed_time_step;
        self.accumulator += dt.max(0.0);

        let mut sub_steps = 0;
        while self.accumulator >= step && sub_steps < self.settings.max_sub_steps {
            self.accumulator -= step;
            sub_steps += 1;
            for registered in &mut self.fixed_callbacks {
                if let Err(message) = (registered.callback)(step) {
                    log::error!("fixed update callback '{}' failed: {message}", registered.name);
                }
            }
        }
        // Drop time the cap refused to simulate, keeping only a partial
        // step of carry-over.
        if self.accumulator > step {
            self.accumulator = step;
        }

        for registered in &mut self.update_callbacks {
            if let Err(message) = (registered.callback)(dt) {
                log::error!("update callback '{}' failed: {message}", registered.name);
            }
        }
        for registered in &mut self.late_callbacks {
            if let Err(message) = (registered.callback)(dt) {
                log::error!("late update callback '{}' failed: {message}", registered.name);
            }
        }
        sub_steps
    }
}

impl Default for GameLoop {
    fn default() -> Self {
        Self::new(LoopSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn counting_loop(settings: LoopSettings) -> (GameLoop, Rc<Cell<u32>>, Rc<Cell<u32>>) {
        let mut game_loop = GameLoop::new(settings);
        let updates = Rc::new(Cell::new(0));
        let fixed = Rc::new(Cell::new(0));
        let u = Rc::clone(&updates);
        let f = Rc::clone(&fixed);
        game_loop.on_update("count", move |_| {
            u.set(u.get() + 1);
            Ok(())
        });
        game_loop.on_fixed_update("count", move |_| {
            f.set(f.get() + 1);
            Ok(())
        });
        (game_loop, updates, fixed)
    }

    #[test]
    fn fixed_steps_follow_the_accumulator() {
        let settings = LoopSettings {
            fixed_time_step: 0.1,
            max_sub_steps: 5,
        };
        let (mut game_loop, updates, fixed) = counting_loop(settings);

        assert_eq!(game_loop.advance(0.05), 0);
        assert_eq!(game_loop.advance(0.05), 1);
        assert_eq!(game_loop.advance(0.25), 2);

        assert_eq!(updates.get(), 3);
        assert_eq!(fixed.get(), 3);
    }

    #[test]
    fn sub_steps_are_capped_on_a_huge_frame() {
        let settings = LoopSettings {
            fixed_time_step: 0.01,
            max_sub_steps: 4,
        };
        let (mut game_loop, _, fixed) = counting_loop(settings);

        // A 1s stall would owe 100 sub-steps; only the cap runs and the
        // excess debt is discarded.
        assert_eq!(game_loop.advance(1.0), 4);
        assert_eq!(fixed.get(), 4);
        assert_eq!(game_loop.advance(0.005), 1);
    }

    #[test]
    fn late_pass_runs_after_update_and_all_sub_steps() {
        let settings = LoopSettings {
            fixed_time_step: 0.1,
            max_sub_steps: 5,
        };
        let mut game_loop = GameLoop::new(settings);
        let trace = Rc::new(std::cell::RefCell::new(String::new()));
        let f = Rc::clone(&trace);
        game_loop.on_fixed_update("t", move |_| {
            f.borrow_mut().push('f');
            Ok(())
        });
        let u = Rc::clone(&trace);
        game_loop.on_update("t", move |_| {
            u.borrow_mut().push('u');
            Ok(())
        });
        let l = Rc::clone(&trace);
        game_loop.on_late_update("t", move |_| {
            l.borrow_mut().push('l');
            Ok(())
        });

        game_loop.advance(0.25);
        assert_eq!(*trace.borrow(), "fful");
    }

    #[test]
    fn failing_callback_does_not_block_others() {
        let mut game_loop = GameLoop::default();
        let ran = Rc::new(Cell::new(false));
        let flag = Rc::clone(&ran);
        game_loop.on_update("boom", |_| Err("bad".to_string()));
        game_loop.on_update("after", move |_| {
            flag.set(true);
            Ok(())
        });
        game_loop.advance(0.016);
        assert!(ran.get());
    }
}
