use super::{list_items, string_value, type_name};
use cel_interpreter::extractors::{Arguments, This};
use cel_interpreter::{Context, ExecutionError, Value};
use std::sync::Arc;

pub fn register(context: &mut Context<'_>) {
    context.add_function("lowerAscii", lower_ascii);
    context.add_function("upperAscii", upper_ascii);
    context.add_function("trim", trim);
    context.add_function("replace", replace);
    context.add_function("split", split);
    context.add_function("join", join);
}

fn lower_ascii(This(this): This<Arc<String>>) -> Result<Value, ExecutionError> {
    Ok(string_value(this.to_ascii_lowercase()))
}

fn upper_ascii(This(this): This<Arc<String>>) -> Result<Value, ExecutionError> {
    Ok(string_value(this.to_ascii_uppercase()))
}

fn trim(This(this): This<Arc<String>>) -> Result<Value, ExecutionError> {
    Ok(string_value(this.trim()))
}

fn replace(This(this): This<Arc<String>>, from: Arc<String>, to: Arc<String>) -> Result<Value, ExecutionError> {
    Ok(string_value(this.replace(from.as_str(), to.as_str())))
}

/// `string.split(separator)`; an empty separator splits into characters.
fn split(This(this): This<Arc<String>>, separator: Arc<String>) -> Result<Value, ExecutionError> {
    let parts: Vec<Value> = if separator.is_empty() {
        this.chars().map(|c| string_value(c.to_string())).collect()
    } else {
        this.split(separator.as_str()).map(string_value).collect()
    };
    Ok(Value::List(Arc::new(parts)))
}

/// `list.join()` or `list.join(separator)` over a list of strings.
fn join(This(this): This<Value>, Arguments(args): Arguments) -> Result<Value, ExecutionError> {
    let items = list_items("join", &this)?;
    let separator = match args.as_slice() {
        [] => "",
        [Value::String(separator)] => separator.as_str(),
        _ => return Err(ExecutionError::function_error("join", "expected an optional string separator")),
    };

    let parts = items
        .iter()
        .map(|item| match item {
            Value::String(s) => Ok(s.as_str()),
            other => Err(ExecutionError::function_error(
                "join",
                format!("expected a list of strings, found {}", type_name(other)),
            )),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(string_value(parts.join(separator)))
}
