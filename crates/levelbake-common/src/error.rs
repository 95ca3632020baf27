// error.rs — build failure categories and fail-fast checks

use std::backtrace::Backtrace;
use std::fmt;

/// Which kind of invariant a failed check was guarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    /// Caller handed us malformed input.
    Input,
    /// Internal algorithm invariant.
    Logic,
    /// Result we are about to write back is malformed.
    Output,
    /// Persistent level state is inconsistent.
    State,
    /// Unrecoverable; aborts the whole build.
    Vital,
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CheckKind::Input => "input",
            CheckKind::Logic => "logic",
            CheckKind::Output => "output",
            CheckKind::State => "state",
            CheckKind::Vital => "vital",
        };
        f.write_str(s)
    }
}

pub type BuildResult<T> = Result<T, BuildError>;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("{kind} check failed: {msg}")]
    Check { kind: CheckKind, msg: String },
    #[error("vital failure: {msg}\n{backtrace}")]
    Vital { msg: String, backtrace: String },
}

impl BuildError {
    pub fn check(kind: CheckKind, msg: impl Into<String>) -> Self {
        let msg = msg.into();
        if kind == CheckKind::Vital {
            return Self::vital(msg);
        }
        BuildError::Check { kind, msg }
    }

    /// Vital failures carry the call stack of the failure site.
    pub fn vital(msg: impl Into<String>) -> Self {
        BuildError::Vital {
            msg: msg.into(),
            backtrace: Backtrace::force_capture().to_string(),
        }
    }

    pub fn kind(&self) -> CheckKind {
        match self {
            BuildError::Check { kind, .. } => *kind,
            BuildError::Vital { .. } => CheckKind::Vital,
        }
    }

    pub fn is_vital(&self) -> bool {
        self.kind() == CheckKind::Vital
    }
}

/// Return `Err(BuildError)` from the enclosing function when `cond` fails.
///
/// ```ignore
/// check!(Logic, leaf == front || leaf == back, "leaf {} not on portal {}", leaf, p);
/// ```
#[macro_export]
macro_rules! check {
    ($kind:ident, $cond:expr, $($arg:tt)+) => {
        if !($cond) {
            return Err($crate::error::BuildError::check(
                $crate::error::CheckKind::$kind,
                format!($($arg)+),
            ));
        }
    };
}

// ============================================================
// Tests
// ============================================================
