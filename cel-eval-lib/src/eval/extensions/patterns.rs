use super::string_value;
use cel_interpreter::extractors::{Arguments, This};
use cel_interpreter::{Context, ExecutionError, Value};
use regex::Regex;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

/// Regular expressions compiled while building a program.
///
/// Patterns passed as string literals are compiled once up front, so an invalid literal
/// pattern fails program construction instead of evaluation. Patterns computed at run
/// time are compiled on use.
#[derive(Debug, Default)]
pub struct RegexCache {
    compiled: HashMap<String, Regex>,
}

impl RegexCache {
    /// Compiles `(function, pattern)` pairs, failing on the first invalid pattern.
    pub fn precompile<'a>(patterns: impl IntoIterator<Item = (&'a str, &'a str)>) -> Result<Self, String> {
        let mut compiled = HashMap::new();

        for (function, pattern) in patterns {
            if compiled.contains_key(pattern) {
                continue;
            }

            let regex = Regex::new(pattern)
                .map_err(|e| format!("invalid regular expression '{pattern}' passed to {function}: {e}"))?;
            let _ = compiled.insert(pattern.to_string(), regex);
        }

        Ok(Self { compiled })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }

    fn get(&self, function: &str, pattern: &str) -> Result<Cow<'_, Regex>, ExecutionError> {
        if let Some(regex) = self.compiled.get(pattern) {
            return Ok(Cow::Borrowed(regex));
        }

        Regex::new(pattern)
            .map(Cow::Owned)
            .map_err(|e| ExecutionError::function_error(function, e.to_string()))
    }
}

pub fn register(context: &mut Context<'_>, regexes: &Arc<RegexCache>) {
    let cache = Arc::clone(regexes);
    context.add_function(
        "matches",
        move |This(this): This<Arc<String>>, pattern: Arc<String>| -> Result<Value, ExecutionError> {
            Ok(Value::Bool(cache.get("matches", &pattern)?.is_match(&this)))
        },
    );

    let cache = Arc::clone(regexes);
    context.add_function(
        "find",
        move |This(this): This<Arc<String>>, pattern: Arc<String>| -> Result<Value, ExecutionError> {
            let regex = cache.get("find", &pattern)?;
            Ok(string_value(regex.find(&this).map_or("", |m| m.as_str())))
        },
    );

    let cache = Arc::clone(regexes);
    context.add_function(
        "findAll",
        move |This(this): This<Arc<String>>, Arguments(args): Arguments| -> Result<Value, ExecutionError> {
            let (pattern, limit) = match args.as_slice() {
                [Value::String(pattern)] => (pattern, -1),
                [Value::String(pattern), Value::Int(limit)] => (pattern, *limit),
                _ => {
                    return Err(ExecutionError::function_error(
                        "findAll",
                        "expected a pattern and an optional int limit",
                    ));
                }
            };

            // a negative limit means no limit
            let limit = usize::try_from(limit).unwrap_or(usize::MAX);
            let regex = cache.get("findAll", pattern)?;
            let found = regex.find_iter(&this).take(limit).map(|m| string_value(m.as_str())).collect();
            Ok(Value::List(Arc::new(found)))
        },
    );
}
