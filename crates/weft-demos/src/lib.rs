//! Demo programs and the manifest script host for the weft CLI.
//!
//! The engine treats the scripting runtime as a seam; this crate fills it
//! with a set of built-in programs and a line-per-task manifest format so
//! the whole load → schedule → run path can be exercised from the
//! command line and from tests.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod console;
mod host;
mod programs;

pub use console::Console;
pub use host::ManifestHost;
pub use programs::{Faulty, Greeter, Nursery, Pinger, Sleeper};
