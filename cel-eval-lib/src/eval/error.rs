use core::fmt;

/// Failure at one of the stages of evaluating an expression.
///
/// Messages are passed through from the engine unchanged where the engine produced them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    /// A variable or extension function could not be declared in the environment.
    #[error("{0}")]
    Declaration(String),

    /// The expression failed to parse or check.
    #[error("{0}")]
    Compile(CompileIssues),

    /// The checked expression could not be turned into an executable program.
    #[error("{0}")]
    ProgramBuild(String),

    /// The program failed while running.
    #[error("{0}")]
    Evaluation(String),
}

/// All issues found while compiling one expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileIssues(Vec<String>);

impl CompileIssues {
    #[must_use]
    pub const fn new(issues: Vec<String>) -> Self {
        Self(issues)
    }

    /// Splits a multi-line engine diagnostic into one issue per line.
    #[must_use]
    pub fn from_diagnostic(diagnostic: &str) -> Self {
        let issues: Vec<String> = diagnostic
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .map(ToString::to_string)
            .collect();

        if issues.is_empty() {
            Self(vec![diagnostic.to_string()])
        } else {
            Self(issues)
        }
    }

    #[must_use]
    pub fn issues(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for CompileIssues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("\n"))
    }
}
