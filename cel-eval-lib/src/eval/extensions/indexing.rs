use super::type_name;
use cel_interpreter::objects::Key;
use cel_interpreter::{Context, ExecutionError, Value};
use std::sync::Arc;

/// Name of the checked indexing function that `a[i]` is compiled into.
pub const INDEX_FUNCTION: &str = "__index__";

pub fn register(context: &mut Context<'_>) {
    context.add_function(INDEX_FUNCTION, checked_index);
}

/// `container[index]` with CEL's error semantics for missing elements.
fn checked_index(container: Value, index: Value) -> Result<Value, ExecutionError> {
    match (&container, &index) {
        (Value::List(items), Value::Int(_) | Value::UInt(_)) => {
            let position = match &index {
                Value::Int(i) => usize::try_from(*i).ok(),
                Value::UInt(u) => usize::try_from(*u).ok(),
                _ => None,
            };
            position.and_then(|p| items.get(p)).cloned().ok_or_else(|| {
                ExecutionError::function_error(
                    INDEX_FUNCTION,
                    format!("index '{}' out of range in list size '{}'", key_text(&index), items.len()),
                )
            })
        }
        (Value::Map(map), Value::Int(_) | Value::UInt(_) | Value::Bool(_) | Value::String(_)) => {
            let key = match &index {
                Value::Int(i) => Key::Int(*i),
                Value::UInt(u) => Key::Uint(*u),
                Value::Bool(b) => Key::Bool(*b),
                Value::String(s) => Key::String(Arc::clone(s)),
                _ => return Err(overload_error(&container, &index)),
            };
            map.map
                .get(&key)
                .cloned()
                .ok_or_else(|| ExecutionError::function_error(INDEX_FUNCTION, format!("no such key: {}", key_text(&index))))
        }
        _ => Err(overload_error(&container, &index)),
    }
}

fn key_text(index: &Value) -> String {
    match index {
        Value::Int(i) => i.to_string(),
        Value::UInt(u) => u.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::String(s) => s.to_string(),
        other => type_name(other).to_string(),
    }
}

fn overload_error(container: &Value, index: &Value) -> ExecutionError {
    ExecutionError::function_error(
        INDEX_FUNCTION,
        format!(
            "found no matching overload for '_[_]' applied to '({}, {})'",
            type_name(container),
            type_name(index)
        ),
    )
}
