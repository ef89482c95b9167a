//! Manifest script host.
//!
//! A manifest declares one task per line; the compiled root program is a
//! [`Nursery`] that spawns them in order. Blank lines and `#` comments
//! are ignored. Any malformed line is a syntax error at load time,
//! reported before the reactor ever runs, like any other script compile
//! failure.
//!
//! Line formats:
//!
//! ```text
//! greeter
//! sleeper <seconds> [label]
//! pinger <seconds> <count> [label]
//! faulty <message> [seconds]
//! ```

use crate::console::Console;
use crate::programs::{Faulty, Greeter, Nursery, Pinger, Sleeper};
use std::fs;
use std::path::Path;
use weft_engine::{LoadError, Program, ScriptHost};

/// Loads task manifests built from the demo program set.
pub struct ManifestHost {
    console: Console,
}

impl ManifestHost {
    /// Build a host whose programs write to `console`.
    pub fn new(console: Console) -> Self {
        Self { console }
    }

    fn parse_line(
        &self,
        path: &Path,
        lineno: usize,
        line: &str,
    ) -> Result<Box<dyn Program>, LoadError> {
        let mut words = line.split_whitespace();
        let head = words.next().unwrap_or_default();
        match head {
            "greeter" => Ok(Box::new(Greeter::new(self.console.clone()))),
            "sleeper" => {
                let delay = parse_seconds(path, lineno, words.next())?;
                let label = words.next().unwrap_or("sleeper").to_string();
                Ok(Box::new(Sleeper::new(label, delay, self.console.clone())))
            }
            "pinger" => {
                let period = parse_seconds(path, lineno, words.next())?;
                let count = parse_count(path, lineno, words.next())?;
                let label = words.next().unwrap_or("pinger").to_string();
                Ok(Box::new(Pinger::new(
                    label,
                    period,
                    count,
                    self.console.clone(),
                )))
            }
            "faulty" => {
                let message = match words.next() {
                    Some(word) => word.to_string(),
                    None => {
                        return Err(LoadError::syntax(
                            path,
                            format!("line {}: faulty needs a message", lineno),
                        ))
                    }
                };
                let delay = match words.next() {
                    Some(word) => parse_seconds(path, lineno, Some(word))?,
                    None => 0.0,
                };
                Ok(Box::new(Faulty::new(message, delay)))
            }
            other => Err(LoadError::syntax(
                path,
                format!("line {}: unknown program `{}`", lineno, other),
            )),
        }
    }
}

impl ScriptHost for ManifestHost {
    fn load(&self, path: &Path) -> Result<Box<dyn Program>, LoadError> {
        let text = fs::read_to_string(path).map_err(|source| LoadError::io(path, source))?;

        let mut children: Vec<Box<dyn Program>> = Vec::new();
        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            children.push(self.parse_line(path, index + 1, line)?);
        }
        if children.is_empty() {
            return Err(LoadError::syntax(path, "script declares no tasks"));
        }
        Ok(Box::new(Nursery::new(children)))
    }
}

fn parse_seconds(path: &Path, lineno: usize, word: Option<&str>) -> Result<f64, LoadError> {
    let word = word.ok_or_else(|| {
        LoadError::syntax(path, format!("line {}: missing duration in seconds", lineno))
    })?;
    let seconds: f64 = word.parse().map_err(|_| {
        LoadError::syntax(path, format!("line {}: bad duration `{}`", lineno, word))
    })?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(LoadError::syntax(
            path,
            format!("line {}: duration must be a finite non-negative number", lineno),
        ));
    }
    Ok(seconds)
}

fn parse_count(path: &Path, lineno: usize, word: Option<&str>) -> Result<u32, LoadError> {
    let word = word
        .ok_or_else(|| LoadError::syntax(path, format!("line {}: missing count", lineno)))?;
    word.parse()
        .map_err(|_| LoadError::syntax(path, format!("line {}: bad count `{}`", lineno, word)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use weft_engine::Reactor;

    fn manifest(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

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
    fn test_load_and_run_manifest() {
        let file = manifest(
            "# two sleepers and a greeting\n\
             greeter\n\
             sleeper 1 A\n\
             sleeper 2 B\n",
        );
        let console = Console::buffer();
        let host = ManifestHost::new(console.clone());
        let root = host.load(file.path()).unwrap();

        let mut reactor = Reactor::default();
        reactor.spawn(root, Vec::new());
        drain(&mut reactor);

        assert_eq!(
            console.lines(),
            vec!["Hello World!", "A @ 1000ms", "B @ 2000ms"]
        );
    }

    #[test]
    fn test_unknown_program_is_syntax_error() {
        let file = manifest("frobnicate 1\n");
        let host = ManifestHost::new(Console::buffer());
        let err = host.load(file.path()).err().unwrap();
        match err {
            LoadError::Syntax { message, .. } => {
                assert!(message.contains("unknown program `frobnicate`"));
                assert!(message.contains("line 1"));
            }
            other => panic!("expected syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_duration_is_syntax_error() {
        let file = manifest("greeter\nsleeper soon A\n");
        let host = ManifestHost::new(Console::buffer());
        let err = host.load(file.path()).err().unwrap();
        match err {
            LoadError::Syntax { message, .. } => {
                assert!(message.contains("line 2"));
                assert!(message.contains("bad duration"));
            }
            other => panic!("expected syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_negative_duration_is_syntax_error() {
        let file = manifest("sleeper -1 A\n");
        let host = ManifestHost::new(Console::buffer());
        assert!(host.load(file.path()).is_err());
    }

    #[test]
    fn test_empty_manifest_is_syntax_error() {
        let file = manifest("# nothing but comments\n\n");
        let host = ManifestHost::new(Console::buffer());
        let err = host.load(file.path()).err().unwrap();
        assert!(err.to_string().contains("declares no tasks"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let host = ManifestHost::new(Console::buffer());
        let err = host
            .load(Path::new("/definitely/not/here.weft"))
            .err()
            .unwrap();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}
