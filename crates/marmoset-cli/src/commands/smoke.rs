//! Smoke command - exercise every binding operation and time it.

use anyhow::{Result, ensure};
use clap::Args;
use crossbeam_channel::bounded;
use marmoset_core::{
    Context, FrontendContext, Function, Object, PropertyAttributes, Stencil, Value,
};
use std::thread;
use std::time::Instant;
use tracing::info;

use crate::config::Config;

const ADD_SOURCE: &[u8] = b"(() => { return 1 + 2; })();";

/// Executions per iteration for the suites that reuse one context.
const EXECUTIONS: usize = 10;

type Suite = fn(&Config) -> Result<()>;

const SUITES: &[(&str, Suite)] = &[
    ("Context", smoke_context),
    ("Value", smoke_value),
    ("Object", smoke_object),
    ("Evaluate", smoke_evaluate),
    ("EvaluateFunction", smoke_evaluate_function),
    ("CallFunctionName", smoke_call_function_name),
    ("CallFunctionValue", smoke_call_function_value),
    ("CallMethod", smoke_call_method),
    ("ExecuteScript", smoke_execute_script),
    ("ExecuteScriptFromStencil", smoke_execute_stencil),
];

#[derive(Args)]
pub struct SmokeCommand {
    /// Number of iterations per suite (default: from config, else 100)
    #[arg(short = 'n', long = "iterations")]
    pub iterations: Option<usize>,
}

impl SmokeCommand {
    pub fn run(&self, config: &Config) -> Result<()> {
        let iterations = self.iterations.unwrap_or(config.smoke.iterations);
        ensure!(iterations > 0, "number of iterations must be positive");
        info!(iterations, "running smoke suites");

        for (name, suite) in SUITES {
            let start = Instant::now();
            for _ in 0..iterations {
                suite(config)?;
            }
            info!(
                suite = name,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "suite ok"
            );
        }

        Ok(())
    }
}

fn new_context(config: &Config) -> Result<Context> {
    Ok(Context::with_options(config.context.clone())?)
}

fn add<'c>(ctx: &'c Context, args: &[Value<'c>]) -> marmoset_core::Result<Option<Value<'c>>> {
    if args.len() != 2 {
        return Err(marmoset_core::Error::binding("invalid args"));
    }
    Ok(Some(Value::int32(ctx, args[0].to_int32() + args[1].to_int32())))
}

fn check_three(value: &Value<'_>) -> Result<()> {
    ensure!(value.is_int32() && value.to_int32() == 3, "invalid result: {}", value);
    Ok(())
}

fn smoke_context(config: &Config) -> Result<()> {
    new_context(config)?.destroy();
    Ok(())
}

fn smoke_value(config: &Config) -> Result<()> {
    let ctx = new_context(config)?;

    let string = Value::string(&ctx, "string")?;
    ensure!(string.is_string() && string.to_js_string() == "string", "invalid string");
    ensure!(string.to_string() == "string", "invalid string conversion");

    let boolean = Value::boolean(&ctx, true);
    ensure!(boolean.is_boolean() && boolean.to_boolean(), "invalid boolean");
    ensure!(boolean.to_string() == "true", "invalid string conversion");

    let number = Value::number(&ctx, 123.456);
    ensure!(number.is_number() && number.to_number() == 123.456, "invalid number");
    ensure!(number.to_string() == "123.456", "invalid string conversion");

    let int32 = Value::int32(&ctx, 123);
    ensure!(int32.is_int32() && int32.to_int32() == 123, "invalid int32");
    ensure!(int32.to_string() == "123", "invalid string conversion");

    ensure!(Value::null(&ctx).is_null(), "invalid null");
    ensure!(Value::undefined(&ctx).is_undefined(), "invalid undefined");
    Ok(())
}

fn smoke_object(config: &Config) -> Result<()> {
    let ctx = new_context(config)?;
    let object = Object::new(&ctx)?;
    ensure!(!object.has("test"), "invalid plain object");

    let values = [
        Value::string(&ctx, "string")?,
        Value::boolean(&ctx, true),
        Value::number(&ctx, 123.456),
        Value::int32(&ctx, 123),
    ];
    for value in &values {
        object.set("test", value)?;
        ensure!(object.has("test"), "missing property");
        let property = object.get("test")?;
        ensure!(property.is(value), "invalid property value");
        object.delete("test")?;
        ensure!(!object.has("test"), "existing property");
    }

    object.set_element(0, &values[0])?;
    ensure!(object.has_element(0), "missing element");
    ensure!(object.get_element(0)?.is(&values[0]), "invalid element value");
    object.delete_element(0)?;
    ensure!(!object.has_element(0), "existing element");
    Ok(())
}

fn smoke_evaluate(config: &Config) -> Result<()> {
    let ctx = new_context(config)?;
    for _ in 0..EXECUTIONS {
        check_three(&ctx.evaluate(ADD_SOURCE)?)?;
    }
    Ok(())
}

fn smoke_evaluate_function(config: &Config) -> Result<()> {
    let ctx = new_context(config)?;
    let global = ctx.global()?;
    ctx.define_function(&global, "add", add, 2, PropertyAttributes::DEFAULT)?;

    for _ in 0..EXECUTIONS {
        check_three(&ctx.evaluate(b"(() => { return add(1, 2); })()")?)?;
    }
    Ok(())
}

fn smoke_call_function_name(config: &Config) -> Result<()> {
    let ctx = new_context(config)?;
    let global = ctx.global()?;
    ctx.define_function(&global, "add", add, 2, PropertyAttributes::DEFAULT)?;

    for _ in 0..EXECUTIONS {
        let a = Value::int32(&ctx, 1);
        let b = Value::int32(&ctx, 2);
        check_three(&ctx.call_function_name("add", &global, &[&a, &b])?)?;
    }
    Ok(())
}

fn smoke_call_function_value(config: &Config) -> Result<()> {
    let ctx = new_context(config)?;
    let global = ctx.global()?;
    let function = Function::new(&ctx, "add", add)?;

    for _ in 0..EXECUTIONS {
        let a = Value::int32(&ctx, 1);
        let b = Value::int32(&ctx, 2);
        check_three(&ctx.call_function_value(&function, &global, &[&a, &b])?)?;
    }
    Ok(())
}

fn smoke_call_method(config: &Config) -> Result<()> {
    let ctx = new_context(config)?;
    let object = Object::new(&ctx)?;
    let function = Function::new(&ctx, "add", add)?;
    object.set("method", &function)?;

    for _ in 0..EXECUTIONS {
        let a = Value::int32(&ctx, 1);
        let b = Value::int32(&ctx, 2);
        check_three(&object.call("method", &[&a, &b])?)?;
    }
    Ok(())
}

fn smoke_execute_script(config: &Config) -> Result<()> {
    let ctx = new_context(config)?;
    let script = ctx.compile_script("script.js", ADD_SOURCE)?;
    for _ in 0..EXECUTIONS {
        check_three(&ctx.execute_script(&script)?)?;
    }
    script.release();
    Ok(())
}

/// Compile on a frontend thread, execute on an executor thread
fn smoke_execute_stencil(config: &Config) -> Result<()> {
    let (tx, rx) = bounded::<Stencil>(EXECUTIONS + 1);
    let frontend_options = config.frontend.clone();
    let context_options = config.context.clone();

    let frontend = thread::spawn(move || -> Result<()> {
        let frontend = FrontendContext::with_options(frontend_options)?;
        let stencil = frontend.compile_to_stencil("script.js", ADD_SOURCE)?;
        for _ in 0..=EXECUTIONS {
            tx.send(stencil.clone())?;
        }
        Ok(())
    });

    let executor = thread::spawn(move || -> Result<()> {
        let ctx = Context::with_options(context_options)?;
        for stencil in rx {
            check_three(&ctx.execute_stencil(&stencil)?)?;
        }
        Ok(())
    });

    join(frontend)?;
    join(executor)
}

fn join(handle: thread::JoinHandle<Result<()>>) -> Result<()> {
    handle
        .join()
        .map_err(|_| anyhow::anyhow!("smoke thread panicked"))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_suite_passes_once() {
        let config = Config::default();
        for (name, suite) in SUITES {
            suite(&config).unwrap_or_else(|e| panic!("suite {} failed: {}", name, e));
        }
    }

    #[test]
    fn test_smoke_command() {
        let cmd = SmokeCommand {
            iterations: Some(2),
        };
        cmd.run(&Config::default()).unwrap();
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let cmd = SmokeCommand {
            iterations: Some(0),
        };
        assert!(cmd.run(&Config::default()).is_err());
    }
}
