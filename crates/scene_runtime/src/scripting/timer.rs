//! Timers
//!
//! One-shot and repeating timers ticked by the script system each
//! frame. A timer can invoke a host callback, push an event onto the
//! bus, or both.

/// A scheduled callback or event emission
pub struct Timer {
    delay: f32,
    repeat: bool,
    elapsed: f32,
    completed: bool,
    /// Event pushed onto the bus on each firing (script-created timers)
    pub fire_event: Option<String>,
    callback: Option<Box<dyn FnMut()>>,
}

impl Timer {
    /// Create a timer firing after `delay` seconds; repeating timers
    /// re-arm with the leftover time carried over
    pub fn new(delay: f32, repeat: bool) -> Self {
        Self {
            delay: delay.max(f32::EPSILON),
            repeat,
            elapsed: 0.0,
            completed: false,
            fire_event: None,
            callback: None,
        }
    }

    /// Install a host-side firing callback
    pub fn with_callback(mut self, callback: impl FnMut() + 'static) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }

    /// Install an event name pushed on each firing
    pub fn with_fire_event(mut self, event: impl Into<String>) -> Self {
        self.fire_event = Some(event.into());
        self
    }

    /// Whether a one-shot timer has already fired
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Seconds accumulated toward the next firing
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Advance by `dt`; returns how many times the timer fired this
    /// step (a repeating timer can fire several times on a long frame)
    pub fn update(&mut self, dt: f32) -> u32 {
        if self.completed {
            return 0;
        }
        self.elapsed += dt;
        let mut fired = 0;
        while self.elapsed >= self.delay {
            self.elapsed -= self.delay;
            fired += 1;
            if let Some(callback) = &mut self.callback {
                callback();
            }
            if !self.repeat {
                self.completed = true;
                break;
            }
        }
        fired
    }
}
