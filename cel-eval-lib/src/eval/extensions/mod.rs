//! Extension function libraries registered on top of the engine's standard functions
//!
//! The set mirrors the list, regex and string helpers commonly added to CEL environments:
//!
//! - **Lists**: `isSorted`, `sum`, `indexOf`, `lastIndexOf`
//! - **Regex**: `matches`, `find`, `findAll`, backed by patterns precompiled at program build
//! - **Strings**: `lowerAscii`, `upperAscii`, `trim`, `replace`, `split`, `join`
//!
//! Indexing (`list[i]`, `map[key]`) is always registered as a checked function so that a
//! missing element is an error rather than `null`.
//!
//! The engine dispatches on function name alone, so a name may be claimed by one library
//! only. `indexOf` and `lastIndexOf` accept both list and string receivers for that reason.

mod indexing;
mod lists;
mod patterns;
mod strings;

pub use indexing::INDEX_FUNCTION;
pub use patterns::RegexCache;

use cel_interpreter::{Context, ExecutionError, Value};
use std::sync::Arc;

/// A library of extension functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Library {
    Lists,
    Regex,
    Strings,
}

impl Library {
    /// Every available library.
    pub const ALL: [Self; 3] = [Self::Lists, Self::Regex, Self::Strings];

    /// Names of the functions the library registers.
    #[must_use]
    pub const fn functions(self) -> &'static [&'static str] {
        match self {
            Self::Lists => &["isSorted", "sum", "indexOf", "lastIndexOf"],
            Self::Regex => &["matches", "find", "findAll"],
            Self::Strings => &["lowerAscii", "upperAscii", "trim", "replace", "split", "join"],
        }
    }

    /// Names of the functions whose pattern argument is a regular expression.
    #[must_use]
    pub const fn regex_functions(self) -> &'static [&'static str] {
        match self {
            Self::Regex => &["matches", "find", "findAll"],
            Self::Lists | Self::Strings => &[],
        }
    }
}

/// Registers the functions of each library on an engine context.
pub fn register(context: &mut Context<'_>, libraries: &[Library], regexes: &Arc<RegexCache>) {
    indexing::register(context);
    for library in libraries {
        match library {
            Library::Lists => lists::register(context),
            Library::Regex => patterns::register(context, regexes),
            Library::Strings => strings::register(context),
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::List(_) => "list",
        Value::Map(_) => "map",
        Value::Function(_, _) => "function",
        Value::Int(_) => "int",
        Value::UInt(_) => "uint",
        Value::Float(_) => "double",
        Value::String(_) => "string",
        Value::Bytes(_) => "bytes",
        Value::Bool(_) => "bool",
        Value::Duration(_) => "google.protobuf.Duration",
        Value::Timestamp(_) => "google.protobuf.Timestamp",
        Value::Null => "null_type",
    }
}

fn list_items<'a>(function: &str, value: &'a Value) -> Result<&'a [Value], ExecutionError> {
    match value {
        Value::List(items) => Ok(items.as_slice()),
        other => Err(ExecutionError::function_error(
            function,
            format!("expected a list receiver, got {}", type_name(other)),
        )),
    }
}

fn string_value(s: impl Into<String>) -> Value {
    Value::String(Arc::new(s.into()))
}
