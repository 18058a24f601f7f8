use super::checker;
use super::error::{CompileIssues, EvalError};
use super::extensions::{Library, RegexCache};
use super::lexer::{self, Token, TokenKind};
use super::program::Program;
use crate::value::{Bindings, Value};
use super::panics;
use super::rewrite;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

const LOG_TARGET: &str = "      eval";

/// Words that cannot be used as variable names.
const RESERVED_WORDS: [&str; 21] = [
    "false", "in", "null", "true", "as", "break", "const", "continue", "else", "for", "function", "if", "import", "let",
    "loop", "package", "namespace", "return", "var", "void", "while",
];

/// Options that shape an [`Environment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvOptions {
    /// Reject list and map literals whose elements have different static types.
    pub homogeneous_aggregate_literals: bool,

    /// Validate extension function declarations when the environment is built rather
    /// than on first compile.
    pub eagerly_validate_declarations: bool,

    /// Normalize timestamp results to UTC.
    pub default_utc_time_zone: bool,

    /// Extension libraries registered on top of the standard functions.
    pub libraries: Vec<Library>,
}

impl Default for EnvOptions {
    fn default() -> Self {
        Self {
            homogeneous_aggregate_literals: true,
            eagerly_validate_declarations: true,
            default_utc_time_zone: true,
            libraries: Library::ALL.to_vec(),
        }
    }
}

/// A configured expression environment.
///
/// An environment is immutable once built and can be shared between threads. Variables
/// are declared per evaluation with [`Environment::extend`].
#[derive(Debug, Clone)]
pub struct Environment {
    options: EnvOptions,
}

impl Environment {
    pub fn new(options: EnvOptions) -> Result<Self, EvalError> {
        if options.eagerly_validate_declarations {
            validate_libraries(&options.libraries)?;
        }

        log::debug!(target: LOG_TARGET, "Built environment with libraries {:?}", options.libraries);
        Ok(Self { options })
    }

    #[must_use]
    pub const fn options(&self) -> &EnvOptions {
        &self.options
    }

    /// Declares one dynamically typed variable per name.
    pub fn extend<'a, I>(&self, names: I) -> Result<Declarations<'_>, EvalError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut declared = BTreeSet::new();
        for name in names {
            if !is_identifier(name) {
                return Err(EvalError::Declaration(format!("invalid variable name '{name}'")));
            }
            if RESERVED_WORDS.contains(&name) {
                return Err(EvalError::Declaration(format!("variable name '{name}' is a reserved word")));
            }
            let _ = declared.insert(name.to_string());
        }

        Ok(Declarations { env: self, names: declared })
    }

    /// Builds an executable program from a compiled expression.
    ///
    /// Regular expression literals passed to the regex functions are compiled here.
    pub fn program(&self, compiled: Compiled) -> Result<Program, EvalError> {
        let regex_functions: Vec<&str> = self
            .options
            .libraries
            .iter()
            .flat_map(|library| library.regex_functions().iter().copied())
            .collect();

        let regexes = RegexCache::precompile(literal_patterns(&compiled.tokens, &regex_functions))
            .map_err(EvalError::ProgramBuild)?;

        log::trace!(target: LOG_TARGET, "Precompiled {} regular expression(s)", regexes.len());
        Ok(Program::new(compiled.program, Arc::new(regexes), self.options.clone()))
    }

    /// Declares the bindings, compiles the expression, builds the program and runs it.
    pub fn evaluate(&self, expression: &str, bindings: &Bindings) -> Result<Value, EvalError> {
        let declarations = self.extend(bindings.keys().map(String::as_str))?;
        let compiled = declarations.compile(expression)?;
        let program = self.program(compiled)?;
        program.run(bindings)
    }
}

/// An environment extended with variable declarations.
#[derive(Debug)]
pub struct Declarations<'a> {
    env: &'a Environment,
    names: BTreeSet<String>,
}

impl Declarations<'_> {
    /// Parses and checks an expression, reporting every issue found.
    pub fn compile(&self, expression: &str) -> Result<Compiled, EvalError> {
        if !self.env.options.eagerly_validate_declarations {
            validate_libraries(&self.env.options.libraries)?;
        }

        if expression.trim().is_empty() {
            return Err(EvalError::Compile(CompileIssues::new(vec!["expression is empty".to_string()])));
        }

        log::debug!(target: LOG_TARGET, "Compiling expression with {} declared variable(s)", self.names.len());

        let tokens = lexer::tokenize(expression);
        let mut program = panics::catch_quietly(|| cel_interpreter::Program::compile(expression))
            .map_err(|detail| EvalError::Compile(parse_failure(expression, &tokens, &detail)))?
            .map_err(|e| EvalError::Compile(CompileIssues::from_diagnostic(&e.to_string())))?;

        let mut issues = checker::undeclared_references(expression, &tokens, &self.names);
        if self.env.options.homogeneous_aggregate_literals {
            issues.extend(checker::heterogeneous_literals(expression, &tokens));
        }

        if !issues.is_empty() {
            log::debug!(target: LOG_TARGET, "Expression has {} issue(s)", issues.len());
            return Err(EvalError::Compile(CompileIssues::new(issues)));
        }

        // The engine resolves out-of-range indexes to null; route indexing through a checked function.
        if let Some(rewritten) = rewrite::checked_indexing(expression, &tokens) {
            log::trace!(target: LOG_TARGET, "Rewrote indexing as '{rewritten}'");
            program = panics::catch_quietly(|| cel_interpreter::Program::compile(&rewritten))
                .map_err(|detail| EvalError::Compile(parse_failure(expression, &tokens, &detail)))?
                .map_err(|e| EvalError::Compile(CompileIssues::from_diagnostic(&e.to_string())))?;
        }

        Ok(Compiled { program, tokens })
    }
}

/// A parsed and checked expression.
pub struct Compiled {
    program: cel_interpreter::Program,
    tokens: Vec<Token>,
}

impl core::fmt::Debug for Compiled {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Compiled").field("tokens", &self.tokens.len()).finish_non_exhaustive()
    }
}

/// Fails when two libraries register the same function name.
fn validate_libraries(libraries: &[Library]) -> Result<(), EvalError> {
    let mut owners: BTreeMap<&str, Library> = BTreeMap::new();

    for &library in libraries {
        for &function in library.functions() {
            match owners.insert(function, library) {
                Some(previous) if previous != library => {
                    return Err(EvalError::Declaration(format!(
                        "function '{function}' is declared by both the {previous:?} and {library:?} libraries"
                    )));
                }
                _ => {}
            }
        }
    }

    Ok(())
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// Finds `.function('literal'` call sites and yields `(function, pattern)` pairs.
fn literal_patterns<'a>(tokens: &'a [Token], functions: &'a [&str]) -> impl Iterator<Item = (&'a str, &'a str)> {
    tokens.windows(4).filter_map(|w| {
        let function = w[1].ident().filter(|name| functions.contains(name))?;
        match &w[3].kind {
            TokenKind::String(pattern) if w[0].is_punct(".") && w[2].is_punct("(") => Some((function, pattern.as_str())),
            _ => None,
        }
    })
}

/// Reports a parser panic as a syntax error instead of the panic text.
fn parse_failure(source: &str, tokens: &[Token], detail: &str) -> CompileIssues {
    log::debug!(target: LOG_TARGET, "Parser failed: {detail}");

    let issue = if tokens.last().is_none_or(|last| !last.ends_operand()) {
        let (line, col) = lexer::line_col(source, source.trim_end().len());
        format!("ERROR: <input>:{line}:{col}: Syntax error: unexpected end of input")
    } else {
        "ERROR: <input>:1:1: Syntax error: the expression could not be parsed".to_string()
    };

    CompileIssues::new(vec![issue])
}
