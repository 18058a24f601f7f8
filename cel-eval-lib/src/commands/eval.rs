use super::Host;
use crate::Result;
use crate::eval::{EnvOptions, Environment};
use crate::value::Value;
use crate::variables::parse_variables_flag;
use clap::Args;
use std::io::Write;

#[derive(Args, Debug)]
pub struct EvalArgs {
    /// Expression to evaluate
    #[arg(long, value_name = "EXPRESSION")]
    pub expr: String,

    /// Comma-separated `<variable-name>=<filename>` pairs; each file holds a YAML or JSON mapping
    #[arg(long, value_name = "NAME=FILE,...", default_value = "")]
    pub variables: String,
}

fn evaluate(args: &EvalArgs) -> Result<Value> {
    let bindings = parse_variables_flag(&args.variables)?;
    let env = Environment::new(EnvOptions::default())?;
    Ok(env.evaluate(&args.expr, &bindings)?)
}

/// Evaluates an expression and prints its text form.
pub fn eval_expression<H: Host>(host: &mut H, args: &EvalArgs) -> Result<()> {
    match evaluate(args) {
        Ok(value) => {
            let _ = writeln!(host.output(), "{}", value.to_text());
            Ok(())
        }
        Err(e) => {
            let _ = writeln!(host.error(), "{e}");
            host.exit(1);
            Err(e)
        }
    }
}
