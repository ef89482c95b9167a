//! Built-in demo programs.
//!
//! Each one is a small hand-rolled state machine over the engine's resume
//! seam: it remembers where it suspended and picks up from there on the
//! next resume. They exist to exercise the scheduler end-to-end (sleep
//! deadlines, spawn ordering, fault containment) from a manifest file.

use crate::console::Console;
use std::collections::VecDeque;
use weft_engine::{Namespace, Outcome, Program, TaskCx, TaskFault, Value};

/// Prints the shared welcome constant and completes.
pub struct Greeter {
    console: Console,
}

impl Greeter {
    /// Build a greeter writing to `console`.
    pub fn new(console: Console) -> Self {
        Self { console }
    }
}

impl Program for Greeter {
    fn name(&self) -> &str {
        "greeter"
    }

    fn resume(&mut self, _ns: &mut Namespace, cx: &mut TaskCx<'_>, _args: &[Value]) -> Outcome {
        let line = cx.welcome().to_string();
        self.console.say(line);
        Outcome::Completed(Value::Null)
    }
}

/// Sleeps once, announces its label with the wake time, completes with
/// the label.
pub struct Sleeper {
    label: String,
    delay: f64,
    console: Console,
    slept: bool,
}

impl Sleeper {
    /// Build a sleeper that waits `delay` seconds before announcing
    /// `label`.
    pub fn new(label: impl Into<String>, delay: f64, console: Console) -> Self {
        Self {
            label: label.into(),
            delay,
            console,
            slept: false,
        }
    }
}

impl Program for Sleeper {
    fn name(&self) -> &str {
        "sleeper"
    }

    fn resume(&mut self, ns: &mut Namespace, cx: &mut TaskCx<'_>, _args: &[Value]) -> Outcome {
        if !self.slept {
            self.slept = true;
            return match cx.sleep(self.delay) {
                Ok(()) => Outcome::Yielded,
                Err(err) => Outcome::Failed(err.into()),
            };
        }
        ns.set("woke_at", Value::Int(cx.now().as_millis() as i64));
        self.console
            .say(format!("{} @ {}", self.label, cx.now()));
        Outcome::Completed(Value::str(self.label.as_str()))
    }
}

/// Wakes on a fixed period a fixed number of times.
pub struct Pinger {
    label: String,
    period: f64,
    count: u32,
    fired: u32,
    console: Console,
}

impl Pinger {
    /// Build a pinger announcing `label` every `period` seconds, `count`
    /// times.
    pub fn new(label: impl Into<String>, period: f64, count: u32, console: Console) -> Self {
        Self {
            label: label.into(),
            period,
            count,
            fired: 0,
            console,
        }
    }
}

impl Program for Pinger {
    fn name(&self) -> &str {
        "pinger"
    }

    fn resume(&mut self, _ns: &mut Namespace, cx: &mut TaskCx<'_>, _args: &[Value]) -> Outcome {
        if self.fired > 0 {
            self.console
                .say(format!("{} tick {} @ {}", self.label, self.fired, cx.now()));
        }
        if self.fired < self.count {
            self.fired += 1;
            return match cx.sleep(self.period) {
                Ok(()) => Outcome::Yielded,
                Err(err) => Outcome::Failed(err.into()),
            };
        }
        Outcome::Completed(Value::Int(self.fired as i64))
    }
}

/// Spawns its children one per resume (every spawn suspends the nursery
/// at the call site), then completes with the number spawned.
pub struct Nursery {
    children: VecDeque<Box<dyn Program>>,
    spawned: i64,
}

impl Nursery {
    /// Build a nursery over an ordered batch of child programs.
    pub fn new(children: Vec<Box<dyn Program>>) -> Self {
        Self {
            children: children.into(),
            spawned: 0,
        }
    }
}

impl Program for Nursery {
    fn name(&self) -> &str {
        "nursery"
    }

    fn resume(&mut self, _ns: &mut Namespace, cx: &mut TaskCx<'_>, _args: &[Value]) -> Outcome {
        match self.children.pop_front() {
            Some(child) => match cx.thread().spawn(child, Vec::new()) {
                Ok(_) => {
                    self.spawned += 1;
                    Outcome::Yielded
                }
                Err(err) => Outcome::Failed(err.into()),
            },
            None => Outcome::Completed(Value::Int(self.spawned)),
        }
    }
}

/// Optionally sleeps, then fails with a runtime fault. Exists to show
/// that one task's failure leaves its siblings on schedule.
pub struct Faulty {
    message: String,
    delay: f64,
    slept: bool,
}

impl Faulty {
    /// Build a task that raises `message` after `delay` seconds.
    pub fn new(message: impl Into<String>, delay: f64) -> Self {
        Self {
            message: message.into(),
            delay,
            slept: false,
        }
    }
}

impl Program for Faulty {
    fn name(&self) -> &str {
        "faulty"
    }

    fn resume(&mut self, _ns: &mut Namespace, cx: &mut TaskCx<'_>, _args: &[Value]) -> Outcome {
        if self.delay > 0.0 && !self.slept {
            self.slept = true;
            return match cx.sleep(self.delay) {
                Ok(()) => Outcome::Yielded,
                Err(err) => Outcome::Failed(err.into()),
            };
        }
        Outcome::Failed(TaskFault::runtime(self.message.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_engine::Reactor;

    /// Tick and jump to the next deadline until the reactor drains.
    fn drain(reactor: &mut Reactor) {
        for _ in 0..10_000 {
            reactor.tick();
            if reactor.is_idle() {
                return;
            }
            if let Some(deadline) = reactor.next_deadline() {
                let gap = deadline.saturating_since(reactor.now());
                reactor.advance(gap);
            }
        }
        panic!("reactor did not drain");
    }

    #[test]
    fn test_greeter_prints_welcome() {
        let console = Console::buffer();
        let mut reactor = Reactor::default();
        reactor.spawn(Box::new(Greeter::new(console.clone())), Vec::new());
        drain(&mut reactor);
        assert_eq!(console.lines(), vec!["Hello World!"]);
    }

    #[test]
    fn test_nursery_children_wake_in_deadline_order() {
        let console = Console::buffer();
        let mut reactor = Reactor::default();
        let children: Vec<Box<dyn Program>> = vec![
            Box::new(Sleeper::new("B", 2.0, console.clone())),
            Box::new(Sleeper::new("A", 1.0, console.clone())),
        ];
        let root = reactor.spawn(Box::new(Nursery::new(children)), Vec::new());
        drain(&mut reactor);

        // B was spawned first but A's earlier deadline wins.
        assert_eq!(console.lines(), vec!["A @ 1000ms", "B @ 2000ms"]);
        assert_eq!(
            reactor.take_completion(root).unwrap().value(),
            Some(&Value::Int(2))
        );
    }

    #[test]
    fn test_pinger_fires_count_times() {
        let console = Console::buffer();
        let mut reactor = Reactor::default();
        let id = reactor.spawn(
            Box::new(Pinger::new("p", 0.5, 3, console.clone())),
            Vec::new(),
        );
        drain(&mut reactor);

        assert_eq!(
            console.lines(),
            vec!["p tick 1 @ 500ms", "p tick 2 @ 1000ms", "p tick 3 @ 1500ms"]
        );
        assert_eq!(
            reactor.take_completion(id).unwrap().value(),
            Some(&Value::Int(3))
        );
    }

    #[test]
    fn test_faulty_sibling_does_not_disturb_sleeper() {
        let console = Console::buffer();
        let mut reactor = Reactor::default();
        let children: Vec<Box<dyn Program>> = vec![
            Box::new(Faulty::new("boom", 1.0)),
            Box::new(Sleeper::new("ok", 2.0, console.clone())),
        ];
        reactor.spawn(Box::new(Nursery::new(children)), Vec::new());
        drain(&mut reactor);

        assert_eq!(console.lines(), vec!["ok @ 2000ms"]);
        let stats = reactor.stats();
        assert_eq!(stats.tasks_failed, 1);
        // nursery + faulty + sleeper spawned; faulty is the only failure
        assert_eq!(stats.tasks_spawned, 3);
        assert_eq!(stats.tasks_completed, 2);
    }

    #[test]
    fn test_immediate_fault_has_no_sleep_phase() {
        let mut reactor = Reactor::default();
        let id = reactor.spawn(Box::new(Faulty::new("now", 0.0)), Vec::new());
        reactor.tick();
        let completion = reactor.take_completion(id).unwrap();
        assert!(completion.is_failure());
        assert_eq!(completion.fault().unwrap().message, "now");
    }
}
