//! Script loading seam.
//!
//! The entry script is loaded and compiled exactly once, at startup. A
//! load failure is fatal to the process: it is reported to the operator
//! and the reactor loop is never entered. This is the only failure in the
//! system with process-wide blast radius.

use crate::program::Program;
use std::path::{Path, PathBuf};

/// Why the entry script could not be turned into a runnable program.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The script file could not be read.
    #[error("cannot read script `{path}`: {source}")]
    Io {
        /// Path the loader was asked to read.
        path: PathBuf,
        /// Underlying filesystem error.
        #[source]
        source: std::io::Error,
    },

    /// The script was read but failed to compile.
    #[error("syntax error in `{path}`: {message}")]
    Syntax {
        /// Path of the offending script.
        path: PathBuf,
        /// Host compiler's diagnostic.
        message: String,
    },
}

impl LoadError {
    /// Build an `Io` load error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LoadError::Io {
            path: path.into(),
            source,
        }
    }

    /// Build a `Syntax` load error.
    pub fn syntax(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        LoadError::Syntax {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A host runtime capable of compiling an entry script into a root
/// [`Program`].
pub trait ScriptHost {
    /// Load and compile the script at `path`.
    fn load(&self, path: &Path) -> Result<Box<dyn Program>, LoadError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_names_path_and_message() {
        let err = LoadError::syntax("init.weft", "unknown program `frobnicate`");
        let text = err.to_string();
        assert!(text.contains("init.weft"));
        assert!(text.contains("unknown program"));
    }

    #[test]
    fn test_io_error_wraps_source() {
        let source = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = LoadError::io("missing.weft", source);
        assert!(err.to_string().contains("missing.weft"));
    }
}
