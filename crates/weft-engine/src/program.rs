//! The host-runtime seam: suspendable programs and their resume outcomes.
//!
//! The scheduler never inspects how a program implements suspension. It
//! drives the `Program` trait and branches on the tagged [`Outcome`] that
//! comes back; everything else about the host runtime is opaque.

use crate::api::TaskCx;
use crate::scheduler::Namespace;
use crate::value::Value;
use std::fmt;

/// Classification of a task failure.
///
/// `Syntax` can only be produced by the script loader, before the first
/// resume of the root task; everything a running program reports maps to
/// one of the remaining kinds.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FaultKind {
    /// The script failed to compile.
    Syntax,
    /// An uncaught error was raised while the task ran.
    Runtime,
    /// The host runtime ran out of memory servicing the task.
    OutOfMemory,
    /// An error occurred while formatting another error.
    Handler,
    /// Any failure that matches no known kind. Must never take the
    /// reactor down.
    Unknown,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FaultKind::Syntax => "syntax error",
            FaultKind::Runtime => "runtime error",
            FaultKind::OutOfMemory => "memory allocation error",
            FaultKind::Handler => "error handler error",
            FaultKind::Unknown => "unknown error",
        };
        write!(f, "{}", text)
    }
}

/// A terminal task failure: a classification plus the host's message.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct TaskFault {
    /// What kind of failure this is.
    pub kind: FaultKind,
    /// Operator-facing detail from the host runtime.
    pub message: String,
}

impl TaskFault {
    /// Build a fault with an explicit kind.
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// An uncaught error raised while the task ran.
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Runtime, message)
    }

    /// The host runtime ran out of memory.
    pub fn out_of_memory(message: impl Into<String>) -> Self {
        Self::new(FaultKind::OutOfMemory, message)
    }

    /// An error occurred inside the host's error handling itself.
    pub fn handler(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Handler, message)
    }

    /// A failure the host could not classify.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Unknown, message)
    }
}

/// What a resume produced.
#[derive(Debug)]
pub enum Outcome {
    /// The program voluntarily suspended at a `sleep` or `spawn` call
    /// site. Its next wake-up timer is already armed.
    Yielded,
    /// The program returned; the context is torn down.
    Completed(Value),
    /// The program raised; the context is torn down, siblings unaffected.
    Failed(TaskFault),
}

impl Outcome {
    /// True for `Completed` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Outcome::Yielded)
    }
}

/// A suspendable unit of script work.
///
/// `resume` runs the program from where it last suspended (or from the
/// start, on the first call) until the next voluntary suspend point or
/// until it returns or raises. The private `Namespace` belongs to this
/// task alone; the [`TaskCx`] handle is the only route to the scheduler.
pub trait Program {
    /// Short name for tracing output.
    fn name(&self) -> &str {
        "task"
    }

    /// Run until the next suspend point, return, or error.
    ///
    /// `args` holds the spawn arguments on the first resume and is empty
    /// on every later one.
    fn resume(&mut self, ns: &mut Namespace, cx: &mut TaskCx<'_>, args: &[Value]) -> Outcome;
}
