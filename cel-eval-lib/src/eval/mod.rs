//! Expression evaluation
//!
//! Evaluation goes through four stages, each with its own failure kind in [`EvalError`]:
//!
//! 1. **Declare**: [`Environment::extend`] declares one dynamically typed variable per binding.
//! 2. **Compile**: [`Declarations::compile`] parses the expression and checks references and
//!    literal types, collecting every issue. Index expressions are then rewritten into a
//!    checked call so that missing elements fail instead of yielding `null`.
//! 3. **Build**: [`Environment::program`] turns the compiled form into a reusable [`Program`],
//!    compiling regular expression literals along the way.
//! 4. **Run**: [`Program::run`] executes against the bindings.
//!
//! [`Environment::evaluate`] chains all four. Engine types never leave this module; values
//! cross the boundary as [`crate::value::Value`].

mod checker;
mod environment;
mod error;
mod extensions;
mod lexer;
mod panics;
mod program;
mod rewrite;

pub use environment::{Compiled, Declarations, EnvOptions, Environment};
pub use error::{CompileIssues, EvalError};
pub use extensions::Library;
pub use program::Program;
