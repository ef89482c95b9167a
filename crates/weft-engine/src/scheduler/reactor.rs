//! The reactor: single control loop that owns the virtual clock, the
//! timer queue, and the live-context arena.
//!
//! One iteration (`tick`) snapshots the due timers as of the current
//! virtual time, resumes the owning contexts in deadline order, and
//! handles each outcome. Timers armed during the iteration, even ones
//! already due, wait for the next iteration, which bounds per-tick work
//! and keeps a `sleep(0)` loop from starving its siblings. All state
//! transitions happen sequentially on this thread; the core carries no
//! locks.

use crate::api::{Capabilities, TaskCx};
use crate::program::{Outcome, Program, TaskFault};
use crate::scheduler::clock::{VirtualClock, VirtualTime};
use crate::scheduler::context::{Context, Namespace, TaskId, TaskState};
use crate::scheduler::timer::TimerQueue;
use crate::value::Value;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

pub(crate) type Contexts = FxHashMap<TaskId, Context>;

/// Reactor tuning knobs.
#[derive(Debug, Clone)]
pub struct ReactorConfig {
    /// Wall-clock polling resolution of [`Reactor::run`]. Bounds how late
    /// a timer can fire; must be at most the smallest meaningful sleep
    /// delay the workload uses.
    pub granularity: Duration,

    /// Upper bound on live contexts. Task-initiated spawns fail
    /// synchronously once the arena holds this many.
    pub max_tasks: Option<usize>,

    /// Keep polling at idle instead of returning from [`Reactor::run`].
    pub linger: bool,
}

impl Default for ReactorConfig {
    fn default() -> Self {
        Self {
            granularity: Duration::from_millis(50),
            max_tasks: None,
            linger: false,
        }
    }
}

/// Reactor counters.
#[derive(Debug, Copy, Clone, Default, Serialize)]
pub struct ReactorStats {
    /// Total contexts admitted, root included.
    pub tasks_spawned: u64,
    /// Contexts that reached `Completed`.
    pub tasks_completed: u64,
    /// Contexts that reached `Failed`.
    pub tasks_failed: u64,
    /// Wake-ups consumed.
    pub timers_fired: u64,
    /// Loop iterations executed.
    pub ticks: u64,
}

/// Terminal outcome retained after a context is torn down.
#[derive(Debug, Clone)]
pub enum Completion {
    /// The task returned this value.
    Completed(Value),
    /// The task failed with this fault.
    Failed(TaskFault),
}

impl Completion {
    /// The completion value, for successful tasks.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Completion::Completed(value) => Some(value),
            Completion::Failed(_) => None,
        }
    }

    /// The fault, for failed tasks.
    pub fn fault(&self) -> Option<&TaskFault> {
        match self {
            Completion::Completed(_) => None,
            Completion::Failed(fault) => Some(fault),
        }
    }

    /// True if the task failed.
    pub fn is_failure(&self) -> bool {
        matches!(self, Completion::Failed(_))
    }
}

/// Admit a new context into the arena and arm its first wake-up at
/// delay 0. Shared by external spawns and task-initiated ones.
pub(crate) fn admit(
    contexts: &mut Contexts,
    next_task_id: &mut u64,
    timers: &mut TimerQueue,
    now: VirtualTime,
    program: Box<dyn Program>,
    args: Vec<Value>,
    caps: Arc<Capabilities>,
    parent: Option<TaskId>,
    stats: &mut ReactorStats,
) -> TaskId {
    let id = TaskId::from_u64(*next_task_id);
    *next_task_id += 1;
    let context = Context::new(id, program, args, caps, parent);
    tracing::debug!(task = %id, name = context.name(), parent = ?parent, "task admitted");
    timers.schedule(id, 0, now);
    contexts.insert(id, context);
    stats.tasks_spawned += 1;
    id
}

/// The cooperative scheduler: virtual clock, timer queue, live-context
/// arena, and the loop that ties them together.
pub struct Reactor {
    clock: VirtualClock,
    timers: TimerQueue,
    contexts: Contexts,
    /// Terminal outcomes, retained until taken.
    completions: FxHashMap<TaskId, Completion>,
    next_task_id: u64,
    caps: Arc<Capabilities>,
    config: ReactorConfig,
    stats: ReactorStats,
}

impl Reactor {
    /// Build a reactor with the given configuration and capability
    /// bundle. The bundle is built exactly once here and shared with
    /// every context admitted later.
    pub fn new(config: ReactorConfig, caps: Capabilities) -> Self {
        Self {
            clock: VirtualClock::new(),
            timers: TimerQueue::new(),
            contexts: Contexts::default(),
            completions: FxHashMap::default(),
            next_task_id: 1,
            caps: Arc::new(caps),
            config,
            stats: ReactorStats::default(),
        }
    }

    /// Admit a program from outside the loop (the root script, tests).
    /// Its first resume happens on the next `tick`. Not limit-checked;
    /// `max_tasks` governs task-initiated spawns.
    pub fn spawn(&mut self, program: Box<dyn Program>, args: Vec<Value>) -> TaskId {
        admit(
            &mut self.contexts,
            &mut self.next_task_id,
            &mut self.timers,
            self.clock.now(),
            program,
            args,
            Arc::clone(&self.caps),
            None,
            &mut self.stats,
        )
    }

    /// Current virtual time.
    pub fn now(&self) -> VirtualTime {
        self.clock.now()
    }

    /// Advance the virtual clock by `ms`. Test drivers use this instead
    /// of the wall-clock pacing in [`Reactor::run`].
    pub fn advance(&mut self, ms: u64) -> VirtualTime {
        self.clock.advance(ms)
    }

    /// Number of live contexts.
    pub fn live_tasks(&self) -> usize {
        self.contexts.len()
    }

    /// Number of armed timers.
    pub fn armed_timers(&self) -> usize {
        self.timers.armed_count()
    }

    /// True when no context is live and no timer is armed. A permissible
    /// end state.
    pub fn is_idle(&self) -> bool {
        self.contexts.is_empty() && self.timers.is_empty()
    }

    /// Earliest pending wake-up, if any.
    pub fn next_deadline(&mut self) -> Option<VirtualTime> {
        self.timers.next_deadline()
    }

    /// Lifecycle state of a live context, `None` once it is torn down.
    pub fn task_state(&self, id: TaskId) -> Option<TaskState> {
        self.contexts.get(&id).map(Context::state)
    }

    /// Read-only view of a live context's private namespace.
    pub fn namespace(&self, id: TaskId) -> Option<&Namespace> {
        self.contexts.get(&id).map(Context::namespace)
    }

    /// Terminal outcome of a finished task, if still retained.
    pub fn completion(&self, id: TaskId) -> Option<&Completion> {
        self.completions.get(&id)
    }

    /// Remove and return the terminal outcome of a finished task.
    pub fn take_completion(&mut self, id: TaskId) -> Option<Completion> {
        self.completions.remove(&id)
    }

    /// The shared capability table.
    pub fn caps(&self) -> &Arc<Capabilities> {
        &self.caps
    }

    /// Counter snapshot.
    pub fn stats(&self) -> ReactorStats {
        self.stats
    }

    /// One loop iteration: snapshot due timers at the current virtual
    /// time and resume their contexts in deadline order. Returns the
    /// number of contexts resumed.
    pub fn tick(&mut self) -> usize {
        let now = self.clock.now();
        let due = self.timers.expire(now);
        self.stats.timers_fired += due.len() as u64;
        let mut resumed = 0;

        for id in due {
            let Some(mut context) = self.contexts.remove(&id) else {
                // Teardown disarms, so a fired timer always has a live
                // owner; tolerate the impossible rather than crash.
                tracing::warn!(task = %id, "due timer without a live context, dropped");
                continue;
            };
            context.set_state(TaskState::Runnable);
            let caps = Arc::clone(context.caps());

            let outcome = {
                let mut cx = TaskCx {
                    task: id,
                    now,
                    timers: &mut self.timers,
                    contexts: &mut self.contexts,
                    next_task_id: &mut self.next_task_id,
                    caps,
                    max_tasks: self.config.max_tasks,
                    stats: &mut self.stats,
                };
                context.resume(&mut cx)
            };
            resumed += 1;

            match outcome {
                Outcome::Yielded => {
                    context.set_state(TaskState::Suspended);
                    if !self.timers.is_armed(id) {
                        tracing::warn!(
                            task = %id,
                            name = context.name(),
                            "task yielded without arming a timer and will never resume"
                        );
                    }
                    self.contexts.insert(id, context);
                }
                Outcome::Completed(value) => {
                    context.set_state(TaskState::Completed);
                    tracing::debug!(task = %id, name = context.name(), "task completed");
                    self.teardown(id, Completion::Completed(value));
                }
                Outcome::Failed(fault) => {
                    context.set_state(TaskState::Failed);
                    tracing::warn!(
                        task = %id,
                        name = context.name(),
                        kind = %fault.kind,
                        "task failed: {}",
                        fault.message
                    );
                    self.teardown(id, Completion::Failed(fault));
                }
            }
            // A terminal context's record was not re-inserted; dropping
            // it here releases its namespace and program state.
        }

        self.stats.ticks += 1;
        resumed
    }

    /// Remove every trace of a terminal context and retain its outcome.
    fn teardown(&mut self, id: TaskId, completion: Completion) {
        if self.timers.disarm(id) {
            tracing::debug!(task = %id, "disarmed leftover timer at teardown");
        }
        match completion {
            Completion::Completed(_) => self.stats.tasks_completed += 1,
            Completion::Failed(_) => self.stats.tasks_failed += 1,
        }
        self.completions.insert(id, completion);
    }

    /// Drive the loop against the wall clock until idle (or forever,
    /// with `linger`). Each pass sleeps at most the configured
    /// granularity, then advances the virtual clock by the amount slept,
    /// so virtual-time behavior stays deterministic.
    pub fn run(&mut self) {
        let granularity_ms = (self.config.granularity.as_millis() as u64).max(1);
        loop {
            self.tick();

            if self.is_idle() && !self.config.linger {
                tracing::debug!("no live tasks and no timers, reactor stopping");
                break;
            }

            let now = self.clock.now();
            let wait_ms = match self.timers.next_deadline() {
                // Armed during this pass and already due: next tick, now.
                Some(deadline) if deadline <= now => continue,
                Some(deadline) => deadline.saturating_since(now).min(granularity_ms),
                None => granularity_ms,
            };
            std::thread::sleep(Duration::from_millis(wait_ms));
            self.clock.advance(wait_ms);
        }
    }
}

impl Default for Reactor {
    fn default() -> Self {
        Self::new(ReactorConfig::default(), Capabilities::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;

    /// Completes immediately with a constant.
    struct CompleteNow(i64);

    impl Program for CompleteNow {
        fn name(&self) -> &str {
            "complete_now"
        }

        fn resume(&mut self, _ns: &mut Namespace, _cx: &mut TaskCx<'_>, _args: &[Value]) -> Outcome {
            Outcome::Completed(Value::Int(self.0))
        }
    }

    /// Sleeps once for `delay` seconds, then completes with its wake time.
    struct SleepOnce {
        delay: f64,
        slept: bool,
    }

    impl SleepOnce {
        fn new(delay: f64) -> Self {
            Self { delay, slept: false }
        }
    }

    impl Program for SleepOnce {
        fn name(&self) -> &str {
            "sleep_once"
        }

        fn resume(&mut self, _ns: &mut Namespace, cx: &mut TaskCx<'_>, _args: &[Value]) -> Outcome {
            if !self.slept {
                self.slept = true;
                return match cx.sleep(self.delay) {
                    Ok(()) => Outcome::Yielded,
                    Err(err) => Outcome::Failed(err.into()),
                };
            }
            Outcome::Completed(Value::Int(cx.now().as_millis() as i64))
        }
    }

    /// Re-arms a zero-delay sleep `naps` times before completing.
    struct NapLoop {
        naps: u32,
        done: u32,
    }

    impl Program for NapLoop {
        fn name(&self) -> &str {
            "nap_loop"
        }

        fn resume(&mut self, _ns: &mut Namespace, cx: &mut TaskCx<'_>, _args: &[Value]) -> Outcome {
            if self.done < self.naps {
                self.done += 1;
                return match cx.sleep(0.0) {
                    Ok(()) => Outcome::Yielded,
                    Err(err) => Outcome::Failed(err.into()),
                };
            }
            Outcome::Completed(Value::Int(self.done as i64))
        }
    }

    /// Sleeps, then raises.
    struct FailAfterSleep {
        delay: f64,
        slept: bool,
    }

    impl Program for FailAfterSleep {
        fn name(&self) -> &str {
            "fail_after_sleep"
        }

        fn resume(&mut self, _ns: &mut Namespace, cx: &mut TaskCx<'_>, _args: &[Value]) -> Outcome {
            if !self.slept {
                self.slept = true;
                return match cx.sleep(self.delay) {
                    Ok(()) => Outcome::Yielded,
                    Err(err) => Outcome::Failed(err.into()),
                };
            }
            Outcome::Failed(TaskFault::runtime("boom"))
        }
    }

    /// Calls `sleep(-1)`, expects rejection, completes with the message.
    struct BadSleeper;

    impl Program for BadSleeper {
        fn name(&self) -> &str {
            "bad_sleeper"
        }

        fn resume(&mut self, _ns: &mut Namespace, cx: &mut TaskCx<'_>, _args: &[Value]) -> Outcome {
            match cx.sleep(-1.0) {
                Err(ApiError::InvalidDuration(_)) => {
                    // Rejected synchronously; still running, so finish
                    // without ever suspending.
                    Outcome::Completed(Value::str("rejected"))
                }
                Err(other) => Outcome::Failed(other.into()),
                Ok(()) => Outcome::Failed(TaskFault::runtime("negative sleep accepted")),
            }
        }
    }

    /// Spawns one child, yields, then completes with the child's id.
    struct SpawnOne {
        child_value: i64,
        spawned: Option<Result<TaskId, ApiError>>,
    }

    impl SpawnOne {
        fn new(child_value: i64) -> Self {
            Self {
                child_value,
                spawned: None,
            }
        }
    }

    impl Program for SpawnOne {
        fn name(&self) -> &str {
            "spawn_one"
        }

        fn resume(&mut self, _ns: &mut Namespace, cx: &mut TaskCx<'_>, _args: &[Value]) -> Outcome {
            match &self.spawned {
                None => {
                    let result = cx
                        .thread()
                        .spawn(Box::new(CompleteNow(self.child_value)), Vec::new());
                    match result {
                        Ok(id) => {
                            self.spawned = Some(Ok(id));
                            Outcome::Yielded
                        }
                        Err(err) => Outcome::Completed(Value::str(err.to_string())),
                    }
                }
                Some(Ok(id)) => Outcome::Completed(Value::Int(id.as_u64() as i64)),
                Some(Err(_)) => Outcome::Failed(TaskFault::runtime("unreachable")),
            }
        }
    }

    /// Yields without arming anything; parks forever.
    struct Stubborn;

    impl Program for Stubborn {
        fn name(&self) -> &str {
            "stubborn"
        }

        fn resume(&mut self, _ns: &mut Namespace, _cx: &mut TaskCx<'_>, _args: &[Value]) -> Outcome {
            Outcome::Yielded
        }
    }

    #[test]
    fn test_root_runs_on_first_tick() {
        let mut reactor = Reactor::default();
        let id = reactor.spawn(Box::new(CompleteNow(42)), Vec::new());
        assert_eq!(reactor.task_state(id), Some(TaskState::Created));

        assert_eq!(reactor.tick(), 1);
        assert_eq!(reactor.live_tasks(), 0);
        assert!(reactor.is_idle());
        let completion = reactor.take_completion(id).unwrap();
        assert_eq!(completion.value(), Some(&Value::Int(42)));

        let stats = reactor.stats();
        assert_eq!(stats.tasks_spawned, 1);
        assert_eq!(stats.tasks_completed, 1);
        assert_eq!(stats.tasks_failed, 0);
    }

    #[test]
    fn test_sleep_resumes_at_deadline() {
        let mut reactor = Reactor::default();
        let id = reactor.spawn(Box::new(SleepOnce::new(1.0)), Vec::new());

        assert_eq!(reactor.tick(), 1);
        assert_eq!(reactor.task_state(id), Some(TaskState::Suspended));
        assert_eq!(reactor.next_deadline(), Some(VirtualTime::from_millis(1000)));

        reactor.advance(999);
        assert_eq!(reactor.tick(), 0);
        assert_eq!(reactor.task_state(id), Some(TaskState::Suspended));

        reactor.advance(1);
        assert_eq!(reactor.tick(), 1);
        let completion = reactor.take_completion(id).unwrap();
        assert_eq!(completion.value(), Some(&Value::Int(1000)));
        assert!(reactor.is_idle());
    }

    #[test]
    fn test_sleep_zero_resumes_once_per_tick() {
        let mut reactor = Reactor::default();
        let id = reactor.spawn(Box::new(NapLoop { naps: 3, done: 0 }), Vec::new());

        // Each iteration consumes exactly one wake-up; a zero-delay
        // re-arm waits for the next iteration.
        for _ in 0..3 {
            assert_eq!(reactor.tick(), 1);
            assert_eq!(reactor.task_state(id), Some(TaskState::Suspended));
        }
        assert_eq!(reactor.tick(), 1);
        assert!(reactor.is_idle());
        assert_eq!(
            reactor.take_completion(id).unwrap().value(),
            Some(&Value::Int(3))
        );
    }

    #[test]
    fn test_failure_is_contained_to_one_context() {
        let mut reactor = Reactor::default();
        let failing = reactor.spawn(
            Box::new(FailAfterSleep {
                delay: 1.0,
                slept: false,
            }),
            Vec::new(),
        );
        let healthy = reactor.spawn(Box::new(SleepOnce::new(2.0)), Vec::new());

        reactor.tick();
        reactor.advance(1000);
        reactor.tick();

        let fault = reactor.completion(failing).unwrap().fault().unwrap().clone();
        assert_eq!(fault.kind, crate::program::FaultKind::Runtime);
        assert_eq!(fault.message, "boom");
        assert_eq!(reactor.live_tasks(), 1);

        // The sibling still resumes on its own deadline.
        reactor.advance(1000);
        reactor.tick();
        assert_eq!(
            reactor.take_completion(healthy).unwrap().value(),
            Some(&Value::Int(2000))
        );

        // The failed context never comes back.
        reactor.advance(10_000);
        assert_eq!(reactor.tick(), 0);
        assert_eq!(reactor.stats().tasks_failed, 1);
    }

    #[test]
    fn test_invalid_sleep_rejected_without_suspending() {
        let mut reactor = Reactor::default();
        let id = reactor.spawn(Box::new(BadSleeper), Vec::new());

        assert_eq!(reactor.tick(), 1);
        // Completed on the same resume: never suspended, nothing armed.
        assert_eq!(reactor.armed_timers(), 0);
        assert!(reactor.is_idle());
        assert_eq!(
            reactor.take_completion(id).unwrap().value(),
            Some(&Value::str("rejected"))
        );
    }

    #[test]
    fn test_spawned_child_runs_before_resumed_parent() {
        let mut reactor = Reactor::default();
        let parent = reactor.spawn(Box::new(SpawnOne::new(7)), Vec::new());

        assert_eq!(reactor.tick(), 1);
        assert_eq!(reactor.live_tasks(), 2);

        // Same batch, child first (FIFO at the shared deadline), parent
        // resumed right after and completed with the child's id.
        assert_eq!(reactor.tick(), 2);
        assert!(reactor.is_idle());
        let child_id = reactor
            .take_completion(parent)
            .unwrap()
            .value()
            .unwrap()
            .as_int()
            .unwrap();
        let child = TaskId::from_u64(child_id as u64);
        assert_eq!(
            reactor.take_completion(child).unwrap().value(),
            Some(&Value::Int(7))
        );
        assert_eq!(reactor.stats().tasks_spawned, 2);
    }

    #[test]
    fn test_spawn_rejected_at_task_limit() {
        let config = ReactorConfig {
            max_tasks: Some(1),
            ..ReactorConfig::default()
        };
        let mut reactor = Reactor::new(config, Capabilities::default());
        let id = reactor.spawn(Box::new(SpawnOne::new(7)), Vec::new());

        assert_eq!(reactor.tick(), 1);
        // The spawn failed synchronously; the program completed with the
        // error text instead of yielding.
        assert_eq!(reactor.live_tasks(), 0);
        let completion = reactor.take_completion(id).unwrap();
        assert!(completion
            .value()
            .unwrap()
            .as_str()
            .unwrap()
            .contains("task limit reached"));
        assert_eq!(reactor.stats().tasks_spawned, 1);
    }

    #[test]
    fn test_unrecognized_fault_kind_is_still_contained() {
        /// Fails with the defensive catch-all kind.
        struct Weird;

        impl Program for Weird {
            fn resume(
                &mut self,
                _ns: &mut Namespace,
                _cx: &mut TaskCx<'_>,
                _args: &[Value],
            ) -> Outcome {
                Outcome::Failed(TaskFault::unknown("resume status 99"))
            }
        }

        let mut reactor = Reactor::default();
        let weird = reactor.spawn(Box::new(Weird), Vec::new());
        let healthy = reactor.spawn(Box::new(CompleteNow(1)), Vec::new());

        assert_eq!(reactor.tick(), 2);
        assert!(reactor.is_idle());
        assert_eq!(
            reactor.completion(weird).unwrap().fault().unwrap().kind,
            crate::program::FaultKind::Unknown
        );
        assert!(!reactor.completion(healthy).unwrap().is_failure());
    }

    #[test]
    fn test_yield_without_timer_parks_indefinitely() {
        let mut reactor = Reactor::default();
        let id = reactor.spawn(Box::new(Stubborn), Vec::new());

        assert_eq!(reactor.tick(), 1);
        reactor.advance(60_000);
        assert_eq!(reactor.tick(), 0);
        assert_eq!(reactor.task_state(id), Some(TaskState::Suspended));
        assert_eq!(reactor.live_tasks(), 1);
        assert!(!reactor.is_idle());
    }

    #[test]
    fn test_run_drains_to_idle() {
        let config = ReactorConfig {
            granularity: Duration::from_millis(1),
            ..ReactorConfig::default()
        };
        let mut reactor = Reactor::new(config, Capabilities::default());
        let id = reactor.spawn(Box::new(SleepOnce::new(0.005)), Vec::new());

        reactor.run();
        assert!(reactor.is_idle());
        let woke_at = reactor
            .take_completion(id)
            .unwrap()
            .value()
            .unwrap()
            .as_int()
            .unwrap();
        assert!(woke_at >= 5);
    }
}
