//! Weft cooperative task engine.
//!
//! Weft multiplexes many logically concurrent, script-driven tasks onto a
//! single execution thread:
//! - **Timer queue**: pending wake-ups ordered by absolute virtual
//!   deadline, FIFO on ties (`scheduler::TimerQueue`)
//! - **Contexts**: suspendable per-task execution records with isolated
//!   namespaces (`scheduler::Context`)
//! - **Reactor**: the loop that advances the virtual clock, expires due
//!   timers, and resumes the owning contexts (`scheduler::Reactor`)
//! - **Task API**: the two scheduler primitives a running task may call,
//!   `sleep` and `thread.spawn` (`api::TaskCx`)
//!
//! The scripting runtime itself is a seam: anything implementing
//! [`Program`] can be scheduled, and anything implementing [`ScriptHost`]
//! can load a root program from a script path.
//!
//! # Example
//!
//! ```rust,ignore
//! use weft_engine::{Capabilities, Reactor, ReactorConfig};
//!
//! let mut reactor = Reactor::new(ReactorConfig::default(), Capabilities::default());
//! reactor.spawn(root_program, Vec::new());
//! reactor.run(); // returns once no task is live and no timer is armed
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod api;
pub mod host;
pub mod program;
pub mod scheduler;
pub mod value;

pub use api::{ApiError, ApiResult, Capabilities, TaskCx, ThreadCx};
pub use host::{LoadError, ScriptHost};
pub use program::{FaultKind, Outcome, Program, TaskFault};
pub use scheduler::{
    Completion, Context, Namespace, Reactor, ReactorConfig, ReactorStats, TaskId, TaskState,
    TimerHandle, TimerQueue, VirtualClock, VirtualTime,
};
pub use value::Value;
