//! Loading of `name=file` variable bindings for the command line

use crate::value::{Bindings, Value, ValueError};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::io;

const LOG_TARGET: &str = " variables";

/// Failure to turn a `--variables` flag into bindings.
#[derive(Debug, thiserror::Error)]
pub enum VariablesError {
    #[error("error reading input file {path}: {source}")]
    FileRead {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("expected <variable-name>=<filename> but got: {entry}")]
    MalformedPair { entry: String },

    #[error("error parsing input file {path}: {message}")]
    Parse { path: Utf8PathBuf, message: String },

    #[error("variable '{name}' is bound more than once")]
    DuplicateVariable { name: String },
}

/// Parses a comma-separated list of `<variable-name>=<filename>` pairs and loads each file.
///
/// An empty flag yields no bindings. Every entry is checked for the `=` separator before
/// any file is read.
pub fn parse_variables_flag(flag: &str) -> Result<Bindings, VariablesError> {
    let mut bindings = Bindings::new();
    if flag.is_empty() {
        return Ok(bindings);
    }

    let pairs = flag.split(',').map(split_pair).collect::<Result<Vec<_>, _>>()?;

    for (name, path) in pairs {
        if bindings.contains_key(name) {
            return Err(VariablesError::DuplicateVariable { name: name.to_string() });
        }

        let value = load_variable_file(Utf8Path::new(path))?;
        log::debug!(target: LOG_TARGET, "Bound '{name}' from {path}");
        let _ = bindings.insert(name.to_string(), value);
    }

    Ok(bindings)
}

fn split_pair(entry: &str) -> Result<(&str, &str), VariablesError> {
    match entry.split_once('=') {
        Some((name, path)) if !name.is_empty() => Ok((name, path)),
        _ => Err(VariablesError::MalformedPair { entry: entry.to_string() }),
    }
}

/// Reads a YAML (or JSON) file whose top level is a mapping.
///
/// An empty document loads as an empty mapping.
pub fn load_variable_file(path: &Utf8Path) -> Result<Value, VariablesError> {
    let text = fs::read_to_string(path).map_err(|source| VariablesError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    let parse_err = |message: String| VariablesError::Parse {
        path: path.to_path_buf(),
        message,
    };

    let doc: serde_yaml::Value = serde_yaml::from_str(&text).map_err(|e| parse_err(e.to_string()))?;
    match Value::try_from(doc).map_err(|e: ValueError| parse_err(e.to_string()))? {
        Value::Null => Ok(Value::Map(Default::default())),
        map @ Value::Map(_) => Ok(map),
        other => Err(parse_err(format!("expected a mapping at the top level, found {}", other.type_name()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> Utf8PathBuf {
        let path = Utf8PathBuf::from_path_buf(dir.path().join(name)).expect("temp path should be UTF-8");
        fs::write(&path, contents).expect("Failed to write variable file");
        path
    }

    #[test]
    fn test_empty_flag_has_no_bindings() {
        assert!(parse_variables_flag("").unwrap().is_empty());
    }

    #[test]
    fn test_missing_separator_is_malformed() {
        let err = parse_variables_flag("onlyname").unwrap_err();
        assert!(matches!(err, VariablesError::MalformedPair { ref entry } if entry == "onlyname"));
        insta::assert_snapshot!(err.to_string(), @"expected <variable-name>=<filename> but got: onlyname");
    }

    #[test]
    fn test_malformed_entry_is_reported_before_files_are_read() {
        // the first file does not exist, but the malformed second entry wins
        let err = parse_variables_flag("a=/does/not/exist.yaml,b").unwrap_err();
        assert!(matches!(err, VariablesError::MalformedPair { ref entry } if entry == "b"));
    }

    #[test]
    fn test_empty_name_is_malformed() {
        let err = parse_variables_flag("=file.yaml").unwrap_err();
        assert!(matches!(err, VariablesError::MalformedPair { .. }));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("missing.yaml");
        let flag = format!("x={}", path.display());

        let err = parse_variables_flag(&flag).unwrap_err();
        assert!(matches!(err, VariablesError::FileRead { .. }));
        assert!(err.to_string().contains("missing.yaml"), "{err}");
    }

    #[test]
    fn test_loads_yaml_and_json_files() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let yaml = write_file(&dir, "object.yaml", "metadata:\n  name: demo\n  replicas: 3\nitems: [a, b]\n");
        let json = write_file(&dir, "params.json", r#"{"limit": 2.5, "enabled": true}"#);

        let bindings = parse_variables_flag(&format!("object={yaml},params={json}")).unwrap();
        assert_eq!(bindings.len(), 2);

        let metadata = BTreeMap::from([
            ("name".to_string(), Value::String("demo".to_string())),
            ("replicas".to_string(), Value::Int(3)),
        ]);
        let object = BTreeMap::from([
            ("metadata".to_string(), Value::Map(metadata)),
            (
                "items".to_string(),
                Value::List(vec![Value::String("a".to_string()), Value::String("b".to_string())]),
            ),
        ]);
        assert_eq!(bindings["object"], Value::Map(object));

        let params = BTreeMap::from([
            ("limit".to_string(), Value::Float(2.5)),
            ("enabled".to_string(), Value::Bool(true)),
        ]);
        assert_eq!(bindings["params"], Value::Map(params));
    }

    #[test]
    fn test_empty_file_is_empty_mapping() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = write_file(&dir, "empty.yaml", "");

        assert_eq!(load_variable_file(&path).unwrap(), Value::Map(BTreeMap::new()));
    }

    #[test]
    fn test_invalid_yaml_is_parse_error() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = write_file(&dir, "broken.yaml", "key: [unterminated\n");

        let err = load_variable_file(&path).unwrap_err();
        assert!(matches!(err, VariablesError::Parse { .. }), "{err}");
    }

    #[test]
    fn test_non_mapping_document_is_parse_error() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = write_file(&dir, "list.yaml", "- 1\n- 2\n");

        let err = load_variable_file(&path).unwrap_err();
        assert!(err.to_string().ends_with("expected a mapping at the top level, found list"), "{err}");
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let a = write_file(&dir, "a.yaml", "v: 1\n");
        let b = write_file(&dir, "b.yaml", "v: 2\n");

        let err = parse_variables_flag(&format!("x={a},x={b}")).unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"variable 'x' is bound more than once");
    }
}
