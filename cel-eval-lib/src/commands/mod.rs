//! Command-line interface for cel-eval
//!
//! Two commands share the evaluation façade in [`crate::eval`]:
//!
//! - **eval**: load variables from YAML or JSON files, evaluate one expression and print
//!   the result
//! - **serve**: run the HTTP server from [`crate::server`] until it fails
//!
//! The `run` function parses command-line arguments using clap, sets up logging from the
//! global `--log-level` flag and routes to the command handler. Handlers write through the
//! [`Host`] trait; on failure they print the error, exit with status 1 and return the error.

mod eval;
mod host;
mod logging;
mod run;
mod serve;

pub use eval::{EvalArgs, eval_expression};
pub use host::Host;
pub use logging::{LogLevel, init_logging};
pub use run::run;
pub use serve::{ServeArgs, serve_requests};
