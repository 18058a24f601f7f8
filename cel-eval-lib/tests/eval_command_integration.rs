//! Integration tests for the `eval` command, driven through `run` like the binary does.

use cel_eval_lib::Host;
use std::fs;
use std::path::Path;

/// Test host that captures output to in-memory buffers.
#[derive(Default)]
struct TestHost {
    output_buf: Vec<u8>,
    error_buf: Vec<u8>,
    exit_code: Option<i32>,
}

impl TestHost {
    fn output_str(&self) -> String {
        String::from_utf8_lossy(&self.output_buf).into_owned()
    }

    fn error_str(&self) -> String {
        String::from_utf8_lossy(&self.error_buf).into_owned()
    }
}

impl Host for TestHost {
    fn output(&mut self) -> impl std::io::Write {
        &mut self.output_buf
    }

    fn error(&mut self) -> impl std::io::Write {
        &mut self.error_buf
    }

    fn exit(&mut self, code: i32) {
        self.exit_code = Some(code);
    }
}

fn write_file(dir: &Path, name: &str, contents: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, contents).expect("Failed to write variable file");
    path.display().to_string()
}

async fn eval(args: &[&str]) -> (TestHost, bool) {
    let mut host = TestHost::default();
    let mut argv = vec!["cel-eval", "eval"];
    argv.extend_from_slice(args);
    let ok = cel_eval_lib::run(&mut host, argv).await.is_ok();
    (host, ok)
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort")]
async fn test_eval_without_variables() {
    let (host, ok) = eval(&["--expr", "1 + 1"]).await;

    assert!(ok);
    assert_eq!(host.output_str(), "2\n");
    assert_eq!(host.exit_code, None);
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort")]
async fn test_eval_with_yaml_and_json_variables() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let object = write_file(dir.path(), "object.yaml", "spec:\n  replicas: 3\n  name: web\n");
    let params = write_file(dir.path(), "params.json", r#"{"maxReplicas": 5}"#);

    let variables = format!("object={object},params={params}");
    let (host, ok) = eval(&[
        "--expr",
        "object.spec.replicas <= params.maxReplicas && object.spec.name.startsWith('w')",
        "--variables",
        &variables,
    ])
    .await;

    assert!(ok, "{}", host.error_str());
    assert_eq!(host.output_str(), "true\n");
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort")]
async fn test_eval_prints_aggregates_in_literal_form() {
    let (host, ok) = eval(&["--expr", "{'b': [1u, 2u], 'a': 'x'.upperAscii()}"]).await;

    assert!(ok, "{}", host.error_str());
    insta::assert_snapshot!(host.output_str().trim_end(), @r#"{"a": "X", "b": [1u, 2u]}"#);
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort")]
async fn test_eval_top_level_string_is_raw() {
    let (host, ok) = eval(&["--expr", "'a,b,c'.split(',').join('-')"]).await;

    assert!(ok, "{}", host.error_str());
    assert_eq!(host.output_str(), "a-b-c\n");
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort")]
async fn test_eval_malformed_variables() {
    let (host, ok) = eval(&["--expr", "1", "--variables", "onlyname"]).await;

    assert!(!ok);
    assert_eq!(host.exit_code, Some(1));
    assert!(host.output_str().is_empty());
    assert!(
        host.error_str().contains("expected <variable-name>=<filename> but got: onlyname"),
        "{}",
        host.error_str()
    );
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort")]
async fn test_eval_missing_variable_file() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let missing = dir.path().join("missing.yaml");
    let variables = format!("x={}", missing.display());

    let (host, ok) = eval(&["--expr", "x", "--variables", &variables]).await;

    assert!(!ok);
    assert_eq!(host.exit_code, Some(1));
    assert!(host.error_str().contains("error reading input file"), "{}", host.error_str());
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort")]
async fn test_eval_compile_error() {
    let (host, ok) = eval(&["--expr", "[1, 'a']"]).await;

    assert!(!ok);
    assert_eq!(host.exit_code, Some(1));
    assert!(
        host.error_str().contains("expected type 'int' but found 'string'"),
        "{}",
        host.error_str()
    );
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort")]
async fn test_eval_runtime_error() {
    let (host, ok) = eval(&["--expr", "1 / 0"]).await;

    assert!(!ok);
    assert_eq!(host.exit_code, Some(1));
    assert!(host.output_str().is_empty());
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort")]
async fn test_eval_truncated_expression() {
    let (host, ok) = eval(&["--expr", "x +"]).await;

    assert!(!ok);
    assert_eq!(host.exit_code, Some(1));
    assert!(host.output_str().is_empty());
    insta::assert_snapshot!(host.error_str().trim_end(), @"ERROR: <input>:1:4: Syntax error: unexpected end of input");
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort")]
async fn test_eval_index_out_of_range() {
    let (host, ok) = eval(&["--expr", "[1, 2][5]"]).await;

    assert!(!ok);
    assert_eq!(host.exit_code, Some(1));
    assert!(host.output_str().is_empty());
    assert!(
        host.error_str().contains("index '5' out of range in list size '2'"),
        "{}",
        host.error_str()
    );
}
