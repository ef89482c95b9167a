//! Task identity, lifecycle state, and the per-task execution record.

use crate::api::{Capabilities, TaskCx};
use crate::program::{Outcome, Program};
use crate::value::Value;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

/// Stable integer handle for one execution context.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl TaskId {
    /// The raw id value.
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Build a `TaskId` from a raw id value.
    pub fn from_u64(id: u64) -> Self {
        TaskId(id)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of a context.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TaskState {
    /// Built, not yet started.
    Created,
    /// Due to run; the reactor is about to resume it.
    Runnable,
    /// Currently inside `resume`.
    Running,
    /// Parked until its armed timer fires.
    Suspended,
    /// Returned a value. Final.
    Completed,
    /// Raised an uncaught error. Final.
    Failed,
}

impl TaskState {
    /// True for `Completed` and `Failed`; a terminal context never
    /// resumes again.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }
}

/// A task's private mutable data, isolated from every sibling.
#[derive(Debug, Default)]
pub struct Namespace {
    slots: FxHashMap<String, Value>,
}

impl Namespace {
    /// An empty namespace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a slot.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.slots.get(key)
    }

    /// Write a slot, returning the previous value if any.
    pub fn set(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.slots.insert(key.into(), value)
    }

    /// Remove a slot.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.slots.remove(key)
    }

    /// Whether a slot exists.
    pub fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    /// Number of populated slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when no slot is populated.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// One cooperative task: its program, lifecycle state, private namespace,
/// and a handle on the shared capability table.
///
/// The reactor exclusively owns every `Context` through its live-context
/// arena; nothing else resumes one.
pub struct Context {
    id: TaskId,
    state: TaskState,
    parent: Option<TaskId>,
    program: Box<dyn Program>,
    namespace: Namespace,
    caps: Arc<Capabilities>,
    /// Spawn arguments, handed to the program on its first resume only.
    initial_args: Option<Vec<Value>>,
}

impl Context {
    /// Build a context in the `Created` state. It does not run until the
    /// reactor resumes it.
    pub fn new(
        id: TaskId,
        program: Box<dyn Program>,
        args: Vec<Value>,
        caps: Arc<Capabilities>,
        parent: Option<TaskId>,
    ) -> Self {
        Self {
            id,
            state: TaskState::Created,
            parent,
            program,
            namespace: Namespace::new(),
            caps,
            initial_args: Some(args),
        }
    }

    /// The context's stable id.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TaskState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: TaskState) {
        self.state = state;
    }

    /// The spawning task, if this context was spawned by one. Recorded
    /// for tracing only; there is no join or cancellation relationship.
    pub fn parent(&self) -> Option<TaskId> {
        self.parent
    }

    /// The program's short name, for tracing.
    pub fn name(&self) -> &str {
        self.program.name()
    }

    /// Read-only view of the private namespace.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// The shared capability table handle.
    pub fn caps(&self) -> &Arc<Capabilities> {
        &self.caps
    }

    /// Transfer control into the program until its next suspend point,
    /// return, or error. Reactor-only.
    pub(crate) fn resume(&mut self, cx: &mut TaskCx<'_>) -> Outcome {
        self.state = TaskState::Running;
        let args = self.initial_args.take().unwrap_or_default();
        self.program.resume(&mut self.namespace, cx, &args)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("parent", &self.parent)
            .field("name", &self.program.name())
            .finish_non_exhaustive()
    }
}
