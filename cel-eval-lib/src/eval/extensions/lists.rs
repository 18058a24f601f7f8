use super::{list_items, type_name};
use cel_interpreter::extractors::This;
use cel_interpreter::{Context, ExecutionError, Value};
use core::cmp::Ordering;

pub fn register(context: &mut Context<'_>) {
    context.add_function("isSorted", is_sorted);
    context.add_function("sum", sum);
    context.add_function("indexOf", index_of);
    context.add_function("lastIndexOf", last_index_of);
}

/// `list.isSorted()`: whether every element is less than or equal to the next one.
fn is_sorted(This(this): This<Value>) -> Result<Value, ExecutionError> {
    let items = list_items("isSorted", &this)?;

    for pair in items.windows(2) {
        match compare(&pair[0], &pair[1]) {
            Some(Ordering::Greater) => return Ok(Value::Bool(false)),
            Some(_) => {}
            None => {
                return Err(ExecutionError::function_error(
                    "isSorted",
                    format!("cannot compare {} and {}", type_name(&pair[0]), type_name(&pair[1])),
                ));
            }
        }
    }

    Ok(Value::Bool(true))
}

/// `list.sum()`: the sum of numeric or duration elements, `0` for an empty list.
fn sum(This(this): This<Value>) -> Result<Value, ExecutionError> {
    let items = list_items("sum", &this)?;
    let mut iter = items.iter();

    let Some(first) = iter.next() else {
        return Ok(Value::Int(0));
    };
    if !matches!(first, Value::Int(_) | Value::UInt(_) | Value::Float(_) | Value::Duration(_)) {
        return Err(ExecutionError::function_error(
            "sum",
            format!("cannot sum elements of type {}", type_name(first)),
        ));
    }

    iter.try_fold(first.clone(), |acc, item| {
        let overflow = || ExecutionError::function_error("sum", "overflow");
        match (acc, item) {
            (Value::Int(a), Value::Int(b)) => a.checked_add(*b).map(Value::Int).ok_or_else(overflow),
            (Value::UInt(a), Value::UInt(b)) => a.checked_add(*b).map(Value::UInt).ok_or_else(overflow),
            (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a + b)),
            (Value::Duration(a), Value::Duration(b)) => a.checked_add(b).map(Value::Duration).ok_or_else(overflow),
            (acc, item) => Err(ExecutionError::function_error(
                "sum",
                format!("cannot add {} and {}", type_name(&acc), type_name(item)),
            )),
        }
    })
}

/// `list.indexOf(x)` or `string.indexOf(substring)`, `-1` when absent.
fn index_of(This(this): This<Value>, needle: Value) -> Result<Value, ExecutionError> {
    match (&this, &needle) {
        (Value::List(items), _) => position("indexOf", items.iter().position(|item| *item == needle)),
        (Value::String(s), Value::String(sub)) => position("indexOf", s.find(sub.as_str()).map(|i| char_index(s, i))),
        _ => Err(receiver_error("indexOf", &this, &needle)),
    }
}

/// `list.lastIndexOf(x)` or `string.lastIndexOf(substring)`, `-1` when absent.
fn last_index_of(This(this): This<Value>, needle: Value) -> Result<Value, ExecutionError> {
    match (&this, &needle) {
        (Value::List(items), _) => position("lastIndexOf", items.iter().rposition(|item| *item == needle)),
        (Value::String(s), Value::String(sub)) => {
            position("lastIndexOf", s.rfind(sub.as_str()).map(|i| char_index(s, i)))
        }
        _ => Err(receiver_error("lastIndexOf", &this, &needle)),
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::UInt(x), Value::UInt(y)) => Some(x.cmp(y)),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bytes(x), Value::Bytes(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Duration(x), Value::Duration(y)) => Some(x.cmp(y)),
        (Value::Timestamp(x), Value::Timestamp(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn position(function: &str, index: Option<usize>) -> Result<Value, ExecutionError> {
    match index {
        Some(i) => i64::try_from(i)
            .map(Value::Int)
            .map_err(|e| ExecutionError::function_error(function, e.to_string())),
        None => Ok(Value::Int(-1)),
    }
}

/// Converts a byte offset into a character index.
fn char_index(s: &str, byte_offset: usize) -> usize {
    s.char_indices().take_while(|(i, _)| *i < byte_offset).count()
}

fn receiver_error(function: &str, this: &Value, needle: &Value) -> ExecutionError {
    ExecutionError::function_error(
        function,
        format!("unsupported receiver {} with argument {}", type_name(this), type_name(needle)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_index() {
        assert_eq!(char_index("héllo", 0), 0);
        assert_eq!(char_index("héllo", 3), 2);
    }

    #[test]
    fn test_compare_requires_matching_types() {
        assert_eq!(compare(&Value::Int(1), &Value::Int(2)), Some(Ordering::Less));
        assert_eq!(compare(&Value::Float(f64::NAN), &Value::Float(1.0)), None);
        assert_eq!(compare(&Value::Int(1), &Value::UInt(1)), None);
    }

    #[test]
    fn test_position() {
        assert!(matches!(position("indexOf", Some(3)), Ok(Value::Int(3))));
        assert!(matches!(position("indexOf", None), Ok(Value::Int(-1))));
    }
}
