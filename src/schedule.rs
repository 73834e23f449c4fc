//! Frame-driven deferred execution
//!
//! Single-threaded, cooperative: "later" always means a future frame of the
//! update loop, never another thread. Tasks carry a caller-defined tag and
//! come back out of [`Scheduler::tick`] when due; the caller dispatches.
//!
//! Every deferral returns a [`TaskHandle`] so it can be cancelled, and
//! [`Scheduler::replace`] implements the cancel-and-replace discipline:
//! re-scheduling a purpose cancels the pending task of that purpose first,
//! so two overlapping deferrals (say, two snapshot restores) can never both
//! fire.

/// Cancellation handle for a pending deferred task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskHandle(u64);

#[derive(Debug, Clone, Copy)]
enum Due {
    AtTime(f64),
    AtFrame(u64),
}

#[derive(Debug)]
struct Scheduled<T> {
    handle: TaskHandle,
    due: Due,
    tag: T,
}

/// Deferred-task queue driven by the per-frame tick
#[derive(Debug)]
pub struct Scheduler<T> {
    tasks: Vec<Scheduled<T>>,
    next_handle: u64,
    now: f64,
    frame: u64,
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            next_handle: 0,
            now: 0.0,
            frame: 0,
        }
    }

    /// Schedule `tag` to fire once `delay` seconds have elapsed
    pub fn after_secs(&mut self, delay: f32, tag: T) -> TaskHandle {
        let due = Due::AtTime(self.now + delay.max(0.0) as f64);
        self.push(due, tag)
    }

    /// Schedule `tag` to fire after `frames` ticks
    pub fn after_frames(&mut self, frames: u64, tag: T) -> TaskHandle {
        let due = Due::AtFrame(self.frame + frames);
        self.push(due, tag)
    }

    fn push(&mut self, due: Due, tag: T) -> TaskHandle {
        let handle = TaskHandle(self.next_handle);
        self.next_handle += 1;
        self.tasks.push(Scheduled { handle, due, tag });
        handle
    }

    /// Cancel a pending task. Returns false if it already fired or was
    /// already cancelled.
    pub fn cancel(&mut self, handle: TaskHandle) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.handle != handle);
        self.tasks.len() != before
    }

    /// Cancel a pending task and hand its tag back to the caller, so work
    /// carrying a payload can be applied immediately instead of dropped
    pub fn take(&mut self, handle: TaskHandle) -> Option<T> {
        let i = self.tasks.iter().position(|t| t.handle == handle)?;
        Some(self.tasks.remove(i).tag)
    }

    pub fn is_pending(&self, handle: TaskHandle) -> bool {
        self.tasks.iter().any(|t| t.handle == handle)
    }

    /// Cancel-and-replace: cancel whatever `slot` holds, schedule `tag`
    /// after `frames` ticks, and store the new handle back into `slot`.
    pub fn replace(&mut self, slot: &mut Option<TaskHandle>, frames: u64, tag: T) {
        if let Some(handle) = slot.take() {
            self.cancel(handle);
        }
        *slot = Some(self.after_frames(frames, tag));
    }

    /// Time-based cancel-and-replace
    pub fn replace_after_secs(&mut self, slot: &mut Option<TaskHandle>, delay: f32, tag: T) {
        if let Some(handle) = slot.take() {
            self.cancel(handle);
        }
        *slot = Some(self.after_secs(delay, tag));
    }

    /// Advance one frame and return the tags that came due, in the order
    /// they were scheduled.
    pub fn tick(&mut self, dt: f32) -> Vec<T> {
        self.now += dt.max(0.0) as f64;
        self.frame += 1;

        let now = self.now;
        let frame = self.frame;
        let mut fired = Vec::new();
        let mut remaining = Vec::new();
        for task in self.tasks.drain(..) {
            let due = match task.due {
                Due::AtTime(t) => t <= now,
                Due::AtFrame(f) => f <= frame,
            };
            if due {
                fired.push(task.tag);
            } else {
                remaining.push(task);
            }
        }
        self.tasks = remaining;
        fired
    }
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Tag {
        Restore,
        Persist,
    }

    #[test]
    fn test_time_delay_fires_once_elapsed() {
        let mut sched = Scheduler::new();
        sched.after_secs(0.5, Tag::Persist);

        assert!(sched.tick(0.2).is_empty());
        assert!(sched.tick(0.2).is_empty());
        let fired = sched.tick(0.2);
        assert_eq!(fired, vec![Tag::Persist]);
        // Fires exactly once
        assert!(sched.tick(1.0).is_empty());
    }

    #[test]
    fn test_frame_delay() {
        let mut sched = Scheduler::new();
        sched.after_frames(2, Tag::Restore);
        assert!(sched.tick(0.016).is_empty());
        assert_eq!(sched.tick(0.016), vec![Tag::Restore]);
    }

    #[test]
    fn test_cancel_prevents_firing() {
        let mut sched = Scheduler::new();
        let handle = sched.after_frames(1, Tag::Restore);
        assert!(sched.is_pending(handle));
        assert!(sched.cancel(handle));
        assert!(!sched.is_pending(handle));
        assert!(sched.tick(0.016).is_empty());
        // Double cancel is a no-op
        assert!(!sched.cancel(handle));
    }

    #[test]
    fn test_take_returns_tag_and_unschedules() {
        let mut sched = Scheduler::new();
        let handle = sched.after_frames(1, Tag::Restore);
        assert_eq!(sched.take(handle), Some(Tag::Restore));
        assert!(!sched.is_pending(handle));
        assert!(sched.tick(0.016).is_empty());
        assert_eq!(sched.take(handle), None);
    }

    #[test]
    fn test_replace_keeps_single_pending_task() {
        let mut sched = Scheduler::new();
        let mut slot = None;
        sched.replace(&mut slot, 1, Tag::Persist);
        sched.replace(&mut slot, 1, Tag::Persist);
        sched.replace(&mut slot, 1, Tag::Persist);
        // Only the last replacement fires
        assert_eq!(sched.tick(0.016), vec![Tag::Persist]);
        assert!(sched.tick(0.016).is_empty());
    }

    #[test]
    fn test_due_tasks_fire_in_schedule_order() {
        let mut sched = Scheduler::new();
        sched.after_frames(1, Tag::Restore);
        sched.after_frames(1, Tag::Persist);
        assert_eq!(sched.tick(0.016), vec![Tag::Restore, Tag::Persist]);
    }
}
