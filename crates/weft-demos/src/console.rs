//! Output sink for demo programs.
//!
//! CLI runs print straight to stdout; tests capture into a shared buffer
//! and assert on the captured lines. Cloning a `Console` shares the
//! underlying buffer.

use std::cell::RefCell;
use std::rc::Rc;

/// Where demo programs write their observable output.
#[derive(Clone)]
pub enum Console {
    /// Print each line to stdout.
    Stdout,
    /// Capture lines into a shared buffer.
    Buffer(Rc<RefCell<Vec<String>>>),
}

impl Console {
    /// A console that prints to stdout.
    pub fn stdout() -> Self {
        Console::Stdout
    }

    /// A console that captures into a fresh shared buffer.
    pub fn buffer() -> Self {
        Console::Buffer(Rc::new(RefCell::new(Vec::new())))
    }

    /// Emit one line.
    pub fn say(&self, line: impl Into<String>) {
        match self {
            Console::Stdout => println!("{}", line.into()),
            Console::Buffer(buf) => buf.borrow_mut().push(line.into()),
        }
    }

    /// Snapshot of the captured lines. Empty for stdout consoles.
    pub fn lines(&self) -> Vec<String> {
        match self {
            Console::Stdout => Vec::new(),
            Console::Buffer(buf) => buf.borrow().clone(),
        }
    }
}
