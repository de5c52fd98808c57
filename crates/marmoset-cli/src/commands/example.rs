//! Example command - walk through the main binding operations.
//!
//! Each example runs on its own thread, the way an embedder pins one
//! context to one thread.

use anyhow::{Result, ensure};
use clap::Args;
use crossbeam_channel::bounded;
use marmoset_core::{
    Context, FrontendContext, Function, Object, PropertyAttributes, Stencil, Value,
};
use std::path::PathBuf;
use std::thread;
use tracing::info;

use crate::config::Config;

const DEFAULT_SCRIPT: &str = "(() => { return 'hello from script'; })();";

type Example = fn(&Config, &str) -> Result<()>;

const EXAMPLES: &[(&str, Example)] = &[
    ("contexts", contexts),
    ("objects", objects),
    ("evaluate", evaluate),
    ("execute_script", execute_script),
    ("execute_script_from_stencil", execute_script_from_stencil),
    ("create_global_function", create_global_function),
    ("create_function_object", create_function_object),
    ("create_object_method", create_object_method),
];

#[derive(Args)]
pub struct ExampleCommand {
    /// Script used by the script and stencil examples
    #[arg(long)]
    pub script: Option<PathBuf>,

    /// Run only the named example
    #[arg(long)]
    pub only: Option<String>,
}

impl ExampleCommand {
    pub fn run(&self, config: &Config) -> Result<()> {
        let source = match &self.script {
            Some(path) => std::fs::read_to_string(path)?,
            None => DEFAULT_SCRIPT.to_string(),
        };

        let selected: Vec<_> = EXAMPLES
            .iter()
            .filter(|(name, _)| self.only.as_deref().is_none_or(|only| only == *name))
            .collect();
        ensure!(
            !selected.is_empty(),
            "unknown example: {}",
            self.only.as_deref().unwrap_or_default()
        );

        for (name, example) in selected {
            info!(example = name, "running");
            let config = config.clone();
            let source = source.clone();
            let example = *example;
            thread::spawn(move || example(&config, &source))
                .join()
                .map_err(|_| anyhow::anyhow!("example {} panicked", name))??;
        }
        Ok(())
    }
}

fn contexts(config: &Config, _source: &str) -> Result<()> {
    let ctx = Context::with_options(config.context.clone())?;
    info!(context_ref = ctx.id(), "context created");
    // use the context only on this thread, then destroy it
    ctx.destroy();
    Ok(())
}

fn objects(config: &Config, _source: &str) -> Result<()> {
    let ctx = Context::with_options(config.context.clone())?;

    let global = ctx.global()?;
    let object = Object::new(&ctx)?;

    let value = Value::string(&ctx, "string")?;
    object.set("key1", &value)?;
    let has = object.has("key2");
    let missing = object.get("key3")?;
    object.delete("key4")?;
    global.set("example", &object)?;

    let json = object.to_json()?;
    info!(has_key2 = has, key3 = %missing, json = %json, "object");
    Ok(())
}

fn evaluate(config: &Config, _source: &str) -> Result<()> {
    let ctx = Context::with_options(config.context.clone())?;
    let result = ctx.evaluate(b"(() => { return 'result'; })()")?;
    ensure!(result.is_string(), "unexpected result type");
    info!(result = %result, "evaluate");
    Ok(())
}

fn execute_script(config: &Config, source: &str) -> Result<()> {
    let ctx = Context::with_options(config.context.clone())?;
    let script = ctx.compile_script("script.js", source.as_bytes())?;

    // compile once, run as often as needed
    let first = ctx.execute_script(&script)?;
    let second = ctx.execute_script(&script)?;
    info!(first = %first, second = %second, "execute script");

    script.release();
    Ok(())
}

fn execute_script_from_stencil(config: &Config, source: &str) -> Result<()> {
    let (tx, rx) = bounded::<Stencil>(1);

    // compile on a frontend thread ...
    let frontend_options = config.frontend.clone();
    let code = source.to_string();
    let frontend = thread::spawn(move || -> Result<()> {
        let frontend = FrontendContext::with_options(frontend_options)?;
        let stencil = frontend.compile_to_stencil("script.js", code.as_bytes())?;
        tx.send(stencil)?;
        Ok(())
    });

    // ... and execute from another context on another thread
    let context_options = config.context.clone();
    let executor = thread::spawn(move || -> Result<()> {
        let ctx = Context::with_options(context_options)?;
        let stencil = rx.recv()?;
        for i in 0..10 {
            let value = ctx.execute_stencil(&stencil)?;
            info!(execution = i, result = %value, "execute stencil");
        }
        // last user releases the stencil
        stencil.release();
        Ok(())
    });

    frontend
        .join()
        .map_err(|_| anyhow::anyhow!("frontend thread panicked"))??;
    executor
        .join()
        .map_err(|_| anyhow::anyhow!("executor thread panicked"))?
}

fn create_global_function(config: &Config, _source: &str) -> Result<()> {
    let ctx = Context::with_options(config.context.clone())?;
    let global = ctx.global()?;

    // arguments are borrowed; the returned value is handed to the engine
    ctx.define_function(
        &global,
        "hello",
        |ctx, _args| Ok(Some(Value::string(ctx, "hello world!")?)),
        0,
        PropertyAttributes::DEFAULT,
    )?;

    let result = ctx.evaluate(b"hello()")?;
    info!(result = %result, "global function");
    Ok(())
}

fn create_function_object(config: &Config, _source: &str) -> Result<()> {
    let ctx = Context::with_options(config.context.clone())?;
    let global = ctx.global()?;

    let hello = Function::new(&ctx, "hello", |ctx, args| {
        let name = args.first().map(|arg| arg.to_js_string()).unwrap_or_default();
        Ok(Some(Value::string(ctx, &format!("hello {}!", name))?))
    })?;

    let name = Value::string(&ctx, "world")?;
    let result = hello.call(&global, &[&name])?;
    info!(result = %result, "function object");
    Ok(())
}

fn create_object_method(config: &Config, _source: &str) -> Result<()> {
    let ctx = Context::with_options(config.context.clone())?;
    let global = ctx.global()?;
    let object = ctx.define_object(&global, "greeter", PropertyAttributes::ENUMERATE)?;

    ctx.define_function(
        &object,
        "hello",
        |ctx, _args| Ok(Some(Value::string(ctx, "hello from a method!")?)),
        0,
        PropertyAttributes::READ_ONLY | PropertyAttributes::PERMANENT,
    )?;

    let from_host = object.call("hello", &[])?;
    let from_script = ctx.evaluate(b"greeter.hello()")?;
    ensure!(from_host.is(&from_script), "method results differ");
    info!(result = %from_host, "object method");
    Ok(())
}
