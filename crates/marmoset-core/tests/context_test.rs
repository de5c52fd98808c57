//! Integration tests for context lifecycle and function dispatch

use std::sync::Arc;
use std::thread;

use marmoset_core::{
    Context, ContextOptions, Function, Object, PropertyAttributes, Registry, Value,
};
use serial_test::serial;

fn define_add(ctx: &Context, target: &Object<'_>) {
    ctx.define_function(
        target,
        "add",
        |ctx, args| {
            let sum = args[0].to_int32() + args[1].to_int32();
            Ok(Some(Value::int32(ctx, sum)))
        },
        2,
        PropertyAttributes::DEFAULT,
    )
    .unwrap();
}

/// Test that contexts register in the global registry and leave it on destroy
#[test]
#[serial]
fn test_global_registry_lifecycle() {
    let registry = Registry::global();
    let before = registry.len();

    let first = Context::new().unwrap();
    let second = Context::new().unwrap();
    assert_ne!(first.id(), second.id());
    assert_eq!(registry.len(), before + 2);

    let id = first.id();
    first.destroy();
    assert!(registry.lookup(id).is_none());
    assert_eq!(registry.len(), before + 1);

    drop(second);
    assert_eq!(registry.len(), before);
}

/// Test that a failed construction leaves no registry entry behind
#[test]
fn test_failed_construction_rolls_back() {
    let registry = Arc::new(Registry::new());
    let options = ContextOptions::new()
        .heap_max_bytes(1024 * 1024)
        .gc_max_bytes(8 * 1024 * 1024);

    assert!(Context::with_registry(options, registry.clone()).is_err());
    assert!(registry.is_empty());
}

/// Test that a host function gives the same result through every call style
#[test]
fn test_function_round_trip() {
    let ctx = Context::new().unwrap();
    let global = ctx.global().unwrap();
    define_add(&ctx, &global);

    let a = Value::int32(&ctx, 1);
    let b = Value::int32(&ctx, 2);

    // by name
    let by_name = ctx.call_function_name("add", &global, &[&a, &b]).unwrap();
    assert_eq!(by_name.to_int32(), 3);

    // by value
    let function = global.get("add").unwrap();
    let by_value = ctx.call_function_value(&function, &global, &[&a, &b]).unwrap();
    assert_eq!(by_value.to_int32(), 3);

    // as a method
    let object = ctx
        .define_object(&global, "math", PropertyAttributes::DEFAULT)
        .unwrap();
    define_add(&ctx, &object);
    let as_method = object.call("add", &[&a, &b]).unwrap();
    assert_eq!(as_method.to_int32(), 3);

    // from script
    assert_eq!(ctx.evaluate(b"add(1, 2) + math.add(1, 2)").unwrap().to_int32(), 6);
}

/// Test that a function object can be attached anywhere and keeps dispatching
#[test]
fn test_function_object_as_property() {
    let ctx = Context::new().unwrap();
    let greet = Function::new(&ctx, "greet", |ctx, args| {
        let name = args.first().map(|v| v.to_js_string()).unwrap_or_default();
        Ok(Some(Value::string(ctx, &format!("Hello, {}!", name))?))
    })
    .unwrap();

    let object = Object::new(&ctx).unwrap();
    object.set("greet", &greet).unwrap();
    let global = ctx.global().unwrap();
    global.set("greeter", &object).unwrap();

    let result = ctx.evaluate(b"greeter.greet('marmoset')").unwrap();
    assert_eq!(result.to_js_string(), "Hello, marmoset!");
}

/// Test that contexts on different threads run independently
#[test]
fn test_contexts_on_many_threads() {
    let handles: Vec<_> = (0..4)
        .map(|i| {
            thread::spawn(move || {
                let ctx = Context::new().unwrap();
                let global = ctx.global().unwrap();
                define_add(&ctx, &global);
                let source = format!("let total = 0; for (let j = 0; j < 100; j++) total = add(total, {}); total", i);
                ctx.evaluate(source.as_bytes()).unwrap().to_int32()
            })
        })
        .collect();

    let results: Vec<i32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results, vec![0, 100, 200, 300]);
}

/// Test that values created in one context are rejected by another
#[test]
fn test_cross_context_values_rejected() {
    let ctx = Context::new().unwrap();
    let other = Context::new().unwrap();
    let foreign = other.evaluate(b"(() => 1)").unwrap();
    let receiver = Value::undefined(&ctx);

    let err = ctx.call_function_value(&foreign, &receiver, &[]).unwrap_err();
    assert!(!err.is_js_error());
}

/// Test that the heap ceiling surfaces as an engine error and the context survives
#[test]
fn test_heap_limit() {
    let options = ContextOptions::new().heap_max_bytes(4 * 1024 * 1024);
    let ctx = Context::with_options(options).unwrap();

    let err = ctx
        .evaluate(b"(() => { const chunks = []; while (true) chunks.push(new Array(100000).fill(1)); })()")
        .unwrap_err();
    assert!(err.is_js_error());

    ctx.run_gc();
    assert_eq!(ctx.evaluate(b"1 + 1").unwrap().to_int32(), 2);
}

/// Test that deep recursion hits the native stack limit instead of crashing
#[test]
fn test_stack_limit() {
    let options = ContextOptions::new().native_stack_size(256 * 1024);
    let ctx = Context::with_options(options).unwrap();

    let err = ctx
        .evaluate(b"function f(n) { return f(n + 1) + 1; } f(0)")
        .unwrap_err();
    let js = err.js_error().unwrap();
    assert!(!js.message.is_empty());

    assert_eq!(ctx.evaluate(b"f.length").unwrap().to_int32(), 1);
}
