use crate::error::StoreResult;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

type Callback = Box<dyn FnMut() -> StoreResult<()> + Send>;

/// Shortest interval a repeating task is rescheduled with.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Revocable handle to a scheduled callback.
///
/// Cancelling is permanent: a cancelled one-shot never fires and a cancelled
/// repeating task never fires again. Cloned handles share the flag.
#[derive(Clone)]
pub struct TaskHandle {
    id: u64,
    cancelled: Arc<AtomicBool>,
}

impl TaskHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

struct Task {
    handle: TaskHandle,
    interval: Option<Duration>,
    callback: Callback,
}

struct SchedulerState {
    now: Duration,
    next_id: u64,
    // Keyed by (deadline, id) so equal deadlines fire in scheduling order.
    queue: BTreeMap<(Duration, u64), Task>,
    // Tasks popped off the queue whose callback is on the stack right now.
    running: Vec<TaskHandle>,
}

impl SchedulerState {
    fn push(&mut self, deadline: Duration, task: Task) {
        self.queue.insert((deadline, task.handle.id), task);
    }

    fn pop_due(&mut self, until: Duration) -> Option<(Duration, Task)> {
        let (&(deadline, _), _) = self.queue.first_key_value()?;
        if deadline > until {
            return None;
        }
        self.queue.pop_first().map(|((deadline, _), task)| (deadline, task))
    }
}

/// Cooperative timer queue driven by a virtual clock.
///
/// Nothing runs on its own: the host calls [`Scheduler::advance`] and every
/// task that falls due within the step fires, in deadline order, on the
/// calling thread. Callbacks may schedule further work.
///
/// ```
/// use larder::task::Scheduler;
/// use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
/// use std::time::Duration;
///
/// let scheduler = Scheduler::new();
/// let ticks = Arc::new(AtomicUsize::new(0));
/// let handle = scheduler.schedule_every(Duration::from_secs(3), {
///     let ticks = ticks.clone();
///     move || {
///         ticks.fetch_add(1, Ordering::SeqCst);
///         Ok(())
///     }
/// });
///
/// assert_eq!(scheduler.advance(Duration::from_secs(10)), 3);
/// handle.cancel();
/// assert_eq!(scheduler.advance(Duration::from_secs(10)), 0);
/// assert_eq!(ticks.load(Ordering::SeqCst), 3);
/// ```
#[derive(Clone)]
pub struct Scheduler {
    state: Arc<Mutex<SchedulerState>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SchedulerState {
                now: Duration::ZERO,
                next_id: 0,
                queue: BTreeMap::new(),
                running: Vec::new(),
            })),
        }
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.state.lock().now
    }

    /// Run `callback` once, `delay` from now.
    pub fn schedule<F>(&self, delay: Duration, callback: F) -> TaskHandle
    where
        F: FnMut() -> StoreResult<()> + Send + 'static,
    {
        self.enqueue(delay, None, Box::new(callback))
    }

    /// Run `callback` every `interval`, first after one interval.
    ///
    /// Intervals shorter than [`MIN_INTERVAL`] are raised to it.
    pub fn schedule_every<F>(&self, interval: Duration, callback: F) -> TaskHandle
    where
        F: FnMut() -> StoreResult<()> + Send + 'static,
    {
        let interval = interval.max(MIN_INTERVAL);
        self.enqueue(interval, Some(interval), Box::new(callback))
    }

    fn enqueue(&self, delay: Duration, interval: Option<Duration>, callback: Callback) -> TaskHandle {
        let mut state = self.state.lock();
        let handle = TaskHandle {
            id: state.next_id,
            cancelled: Arc::new(AtomicBool::new(false)),
        };
        state.next_id += 1;
        let deadline = state.now.saturating_add(delay);
        tracing::trace!(task = handle.id, ?deadline, repeating = interval.is_some(), "task scheduled");
        state.push(
            deadline,
            Task {
                handle: handle.clone(),
                interval,
                callback,
            },
        );
        handle
    }

    /// Move the clock forward by `by`, firing every task that falls due.
    ///
    /// Returns how many callbacks ran, including callbacks that found
    /// nothing to do (a store task whose store is gone still counts). A
    /// callback error is logged; it does not stop the step or cancel a
    /// repeating task.
    ///
    /// The clock saturates at `Duration::MAX`; a repeating task whose next
    /// deadline would pass it is retired.
    pub fn advance(&self, by: Duration) -> usize {
        let until = self.now().saturating_add(by);
        let mut fired = 0;

        loop {
            let next = {
                let mut state = self.state.lock();
                let due = state.pop_due(until);
                if let Some((deadline, _)) = &due {
                    state.now = *deadline;
                }
                due
            };
            let Some((deadline, mut task)) = next else {
                break;
            };
            if task.handle.is_cancelled() {
                tracing::trace!(task = task.handle.id, "skipping cancelled task");
                continue;
            }

            tracing::trace!(task = task.handle.id, ?deadline, "task fired");
            self.state.lock().running.push(task.handle.clone());
            let result = (task.callback)();
            self.state.lock().running.retain(|running| running.id != task.handle.id);
            if let Err(err) = result {
                tracing::error!(task = task.handle.id, error = %err, "deferred task failed");
            }
            fired += 1;

            let Some(interval) = task.interval else {
                continue;
            };
            if task.handle.is_cancelled() {
                continue;
            }
            match deadline.checked_add(interval) {
                Some(next) => self.state.lock().push(next, task),
                None => tracing::debug!(task = task.handle.id, "repeating task ran out of clock"),
            }
        }

        self.state.lock().now = until;
        fired
    }

    /// Fire tasks that are already due without moving the clock.
    pub fn run_pending(&self) -> usize {
        self.advance(Duration::ZERO)
    }

    /// Number of queued tasks that have not been cancelled.
    pub fn pending(&self) -> usize {
        self.state
            .lock()
            .queue
            .values()
            .filter(|task| !task.handle.is_cancelled())
            .count()
    }

    /// Cancel and drop every queued task, including one whose callback is
    /// running right now.
    pub fn cancel_all(&self) {
        let (drained, running) = {
            let mut state = self.state.lock();
            (std::mem::take(&mut state.queue), state.running.clone())
        };
        for handle in running.iter().chain(drained.values().map(|task| &task.handle)) {
            handle.cancel();
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("now", &self.now())
            .field("pending", &self.pending())
            .finish()
    }
}
