#![doc(hidden)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Core library for cel-eval
//!
//! This library holds all functionality of the cel-eval tool, which evaluates Common
//! Expression Language (CEL) expressions against variables supplied as YAML or JSON,
//! either once from the command line or per request over HTTP.
//!
//! # Module Organization
//!
//! - [`commands`]: Command-line interface and orchestration
//! - [`eval`]: Environment, compilation and execution of expressions
//! - [`server`]: HTTP endpoint for evaluation requests
//! - [`value`]: Dynamically typed values and their text form
//! - [`variables`]: Loading of variable files named on the command line

pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

#[cfg(any(debug_assertions, test))]
pub mod commands;
#[cfg(not(any(debug_assertions, test)))]
mod commands;

#[cfg(any(debug_assertions, test))]
pub mod eval;
#[cfg(not(any(debug_assertions, test)))]
mod eval;

#[cfg(any(debug_assertions, test))]
pub mod server;
#[cfg(not(any(debug_assertions, test)))]
mod server;

#[cfg(any(debug_assertions, test))]
pub mod value;
#[cfg(not(any(debug_assertions, test)))]
mod value;

#[cfg(any(debug_assertions, test))]
pub mod variables;
#[cfg(not(any(debug_assertions, test)))]
mod variables;

pub use crate::commands::{Host, run};
