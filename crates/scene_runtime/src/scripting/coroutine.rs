//! Cooperative coroutines
//!
//! A coroutine is a named script function re-invoked once per frame
//! with a persistent state map bound as `this`. The function's return
//! value drives scheduling:
//!
//! * `()` or `true` — yield, resume next frame
//! * `false` — finished, pruned on the next scheduling pass
//! * an integer — suspend until the background task it references
//!   settles; the result lands in `this.task_result` (or
//!   `this.task_error`) before the next resume
//!
//! A runtime error inside the function terminates only that coroutine.

use rhai::Dynamic;

/// Scheduling state of one coroutine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoroutineStatus {
    /// Resumed every frame
    Running,
    /// Suspended on a background task, keyed by the script-side task
    /// reference
    Waiting(u64),
    /// Finished; removed on the next pass
    Done,
}

/// One script function being stepped frame by frame
pub struct Coroutine {
    /// Handle returned to the starting script
    pub id: u64,
    /// Script function invoked each resume
    pub function: String,
    /// Persistent state map bound as `this` across resumes
    pub state: Dynamic,
    /// Current scheduling state
    pub status: CoroutineStatus,
}

impl Coroutine {
    /// Create a coroutine with an empty state map
    pub fn new(id: u64, function: impl Into<String>) -> Self {
        Self {
            id,
            function: function.into(),
            state: Dynamic::from_map(rhai::Map::new()),
            status: CoroutineStatus::Running,
        }
    }

    /// Interpret a resume's return value into the next status
    pub fn apply_result(&mut self, value: &Dynamic) {
        if let Ok(task_ref) = value.as_int() {
            self.status = CoroutineStatus::Waiting(task_ref as u64);
        } else if let Ok(keep_running) = value.as_bool() {
            self.status = if keep_running {
                CoroutineStatus::Running
            } else {
                CoroutineStatus::Done
            };
        } else {
            // Unit or anything else: plain yield.
            self.status = CoroutineStatus::Running;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn return_values_map_to_statuses() {
        let mut coroutine = Coroutine::new(1, "patrol");

        coroutine.apply_result(&Dynamic::UNIT);
        assert_eq!(coroutine.status, CoroutineStatus::Running);

        coroutine.apply_result(&Dynamic::from(true));
        assert_eq!(coroutine.status, CoroutineStatus::Running);

        coroutine.apply_result(&Dynamic::from(42_i64));
        assert_eq!(coroutine.status, CoroutineStatus::Waiting(42));

        coroutine.apply_result(&Dynamic::from(false));
        assert_eq!(coroutine.status, CoroutineStatus::Done);
    }
}
