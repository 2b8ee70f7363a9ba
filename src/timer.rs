// timer.rs — 可取消的定时任务队列（单线程，由主循环驱动）

use std::time::Duration;

/// Identifies one scheduled task. Handles are never reused, so a handle kept
/// after cancellation can't match a later task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

#[derive(Debug)]
struct Scheduled<T> {
    handle: TimerHandle,
    due: Duration,
    task: T,
}

/// Tasks ordered by due time, then by scheduling order.
#[derive(Debug)]
pub struct TimerQueue<T> {
    next_id: u64,
    tasks: Vec<Scheduled<T>>,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            tasks: Vec::new(),
        }
    }

    pub fn schedule(&mut self, due: Duration, task: T) -> TimerHandle {
        let handle = TimerHandle(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.tasks.push(Scheduled { handle, due, task });
        handle
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }

    /// Removes and returns the earliest task due at or before `now`.
    pub fn pop_due(&mut self, now: Duration) -> Option<(TimerHandle, T)> {
        let idx = self
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due <= now)
            .min_by(|(_, a), (_, b)| a.due.cmp(&b.due).then_with(|| a.handle.cmp(&b.handle)))
            .map(|(i, _)| i)?;
        let t = self.tasks.remove(idx);
        Some((t.handle, t.task))
    }
}

#[cfg(test)]
mod tests {
    use super::TimerQueue;
    use std::time::Duration;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn fires_in_due_order() {
        let mut q = TimerQueue::new();
        q.schedule(ms(30), "c");
        q.schedule(ms(10), "a");
        q.schedule(ms(10), "b");

        assert!(q.pop_due(ms(5)).is_none());
        let fired: Vec<_> = std::iter::from_fn(|| q.pop_due(ms(100)).map(|(_, t)| t)).collect();
        assert_eq!(fired, vec!["a", "b", "c"]);
        assert!(q.pop_due(ms(1000)).is_none());
    }

    #[test]
    fn cleared_tasks_never_fire() {
        let mut q = TimerQueue::new();
        q.schedule(ms(10), 1);
        q.schedule(ms(20), 2);
        q.clear();
        assert!(q.pop_due(ms(100)).is_none());
    }

    #[test]
    fn handles_are_not_reused() {
        let mut q = TimerQueue::new();
        let a = q.schedule(ms(1), ());
        q.pop_due(ms(1));
        q.clear();
        let b = q.schedule(ms(1), ());
        assert_ne!(a, b);
        assert_eq!(q.pop_due(ms(1)).map(|(h, _)| h), Some(b));
    }
}
