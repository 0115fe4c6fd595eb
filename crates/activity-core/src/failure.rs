use serde::{Deserialize, Serialize};
use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt::Write;

/// Failure descriptor reported to the orchestrator when a task cannot finish
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    /// Representation of the error, e.g. `ParseError("bad header")`
    pub exception: String,
    /// Error chain and backtrace captured when the failure was recorded
    pub stacktrace: String,
    /// Error classification sent as the failure's error field
    pub error_kind: String,
}

#[derive(Serialize)]
struct Cause<'a> {
    exception: &'a str,
    stacktrace: &'a str,
}

impl TaskFailure {
    pub fn new(
        exception: impl Into<String>,
        stacktrace: impl Into<String>,
        error_kind: impl Into<String>,
    ) -> Self {
        TaskFailure {
            exception: exception.into(),
            stacktrace: stacktrace.into(),
            error_kind: error_kind.into(),
        }
    }

    /// Describe an error, classifying it by its concrete type name
    pub fn from_error<E: Error + 'static>(err: &E) -> Self {
        Self::from_dyn_error(short_type_name::<E>(), err)
    }

    /// Describe a type-erased error under an explicit classification
    pub fn from_dyn_error(error_kind: &str, err: &(dyn Error + 'static)) -> Self {
        let exception = format!("{}({:?})", error_kind, err.to_string());

        let mut stacktrace = String::new();
        let _ = writeln!(stacktrace, "{}: {}", error_kind, err);
        let mut source = err.source();
        while let Some(cause) = source {
            let _ = writeln!(stacktrace, "Caused by: {}", cause);
            source = cause.source();
        }
        let _ = write!(stacktrace, "{}", Backtrace::force_capture());

        TaskFailure::new(exception, stacktrace, error_kind)
    }

    /// Cause text sent on the wire: a JSON document carrying the exception
    /// representation and the stack trace
    pub fn cause(&self) -> String {
        let cause = Cause {
            exception: &self.exception,
            stacktrace: &self.stacktrace,
        };
        serde_json::to_string(&cause).unwrap_or_else(|_| self.exception.clone())
    }
}

/// Last path segment of a type name, without generic arguments
fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
