use super::environment::EnvOptions;
use super::error::EvalError;
use super::extensions::{self, INDEX_FUNCTION, RegexCache};
use super::panics;
use crate::value::{Bindings, Value};
use cel_interpreter::objects::{Key, Map};
use cel_interpreter::{Context, ExecutionError, Value as CelValue};
use chrono::Utc;
use core::fmt;
use core::panic::AssertUnwindSafe;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

const LOG_TARGET: &str = "      eval";

/// An executable program, reusable across runs.
pub struct Program {
    program: cel_interpreter::Program,
    regexes: Arc<RegexCache>,
    options: EnvOptions,
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program")
            .field("regexes", &self.regexes)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Program {
    pub(super) const fn new(program: cel_interpreter::Program, regexes: Arc<RegexCache>, options: EnvOptions) -> Self {
        Self {
            program,
            regexes,
            options,
        }
    }

    /// Runs the program with the bindings as its activation.
    pub fn run(&self, bindings: &Bindings) -> Result<Value, EvalError> {
        let mut context = Context::default();
        extensions::register(&mut context, &self.options.libraries, &self.regexes);
        for (name, value) in bindings {
            context.add_variable_from_value(name.as_str(), to_engine(value));
        }

        log::trace!(target: LOG_TARGET, "Running program with {} binding(s)", bindings.len());

        let result = panics::catch_quietly(AssertUnwindSafe(|| self.program.execute(&context)))
            .map_err(EvalError::Evaluation)?
            .map_err(evaluation_error)?;

        Ok(from_engine(result, self.options.default_utc_time_zone))
    }
}

/// Engine errors keep the engine's wording, except that indexing failures read as the operator.
fn evaluation_error(error: ExecutionError) -> EvalError {
    match error {
        ExecutionError::FunctionError { function, message } if function == INDEX_FUNCTION => EvalError::Evaluation(message),
        other => EvalError::Evaluation(other.to_string()),
    }
}

fn to_engine(value: &Value) -> CelValue {
    match value {
        Value::Null => CelValue::Null,
        Value::Bool(b) => CelValue::Bool(*b),
        Value::Int(i) => CelValue::Int(*i),
        Value::Uint(u) => CelValue::UInt(*u),
        Value::Float(x) => CelValue::Float(*x),
        Value::String(s) => CelValue::String(Arc::new(s.clone())),
        Value::Bytes(bytes) => CelValue::Bytes(Arc::new(bytes.clone())),
        Value::List(items) => CelValue::List(Arc::new(items.iter().map(to_engine).collect())),
        Value::Map(map) => {
            let fields: HashMap<Arc<String>, CelValue> = map
                .iter()
                .map(|(key, value)| (Arc::new(key.clone()), to_engine(value)))
                .collect();
            CelValue::Map(Map::from(fields))
        }
        Value::Duration(d) => CelValue::Duration(*d),
        Value::Timestamp(ts) => CelValue::Timestamp(*ts),
    }
}

fn from_engine(value: CelValue, utc: bool) -> Value {
    match value {
        CelValue::Null => Value::Null,
        CelValue::Bool(b) => Value::Bool(b),
        CelValue::Int(i) => Value::Int(i),
        CelValue::UInt(u) => Value::Uint(u),
        CelValue::Float(x) => Value::Float(x),
        CelValue::String(s) => Value::String(s.to_string()),
        CelValue::Bytes(bytes) => Value::Bytes(bytes.to_vec()),
        CelValue::List(items) => Value::List(items.iter().map(|item| from_engine(item.clone(), utc)).collect()),
        CelValue::Map(map) => Value::Map(
            map.map
                .iter()
                .map(|(key, value)| (key_text(key), from_engine(value.clone(), utc)))
                .collect::<BTreeMap<_, _>>(),
        ),
        CelValue::Duration(d) => Value::Duration(d),
        CelValue::Timestamp(ts) if utc => Value::Timestamp(ts.with_timezone(&Utc).fixed_offset()),
        CelValue::Timestamp(ts) => Value::Timestamp(ts),
        CelValue::Function(name, _) => Value::String(name.to_string()),
    }
}

fn key_text(key: &Key) -> String {
    match key {
        Key::Int(i) => i.to_string(),
        Key::Uint(u) => u.to_string(),
        Key::Bool(b) => b.to_string(),
        Key::String(s) => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeDelta, TimeZone};

    #[test]
    fn test_engine_conversion_preserves_values() {
        let value = Value::Map(BTreeMap::from([
            ("n".to_string(), Value::Uint(7)),
            ("b".to_string(), Value::Bytes(vec![1, 2])),
            ("l".to_string(), Value::List(vec![Value::Null, Value::Float(0.5)])),
            ("d".to_string(), Value::Duration(TimeDelta::seconds(3))),
        ]));
        assert_eq!(from_engine(to_engine(&value), true), value);
    }

    #[test]
    fn test_non_string_keys_become_text() {
        let mut fields = HashMap::new();
        let _ = fields.insert(Key::Int(1), CelValue::Bool(true));
        let _ = fields.insert(Key::Bool(false), CelValue::Null);
        let map = CelValue::Map(Map { map: Arc::new(fields) });

        let expected = Value::Map(BTreeMap::from([
            ("1".to_string(), Value::Bool(true)),
            ("false".to_string(), Value::Null),
        ]));
        assert_eq!(from_engine(map, true), expected);
    }

    #[test]
    fn test_utc_normalization() {
        let offset = FixedOffset::west_opt(5 * 3600).unwrap();
        let ts = offset.with_ymd_and_hms(2024, 3, 1, 7, 0, 0).unwrap();

        let Value::Timestamp(utc) = from_engine(CelValue::Timestamp(ts), true) else {
            panic!("expected a timestamp");
        };
        assert_eq!(utc.offset().local_minus_utc(), 0);
        assert_eq!(utc, ts);

        let Value::Timestamp(kept) = from_engine(CelValue::Timestamp(ts), false) else {
            panic!("expected a timestamp");
        };
        assert_eq!(kept.offset(), &offset);
    }
}
