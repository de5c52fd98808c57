//! Integration tests for error classification

use marmoset_core::{Context, Error, ErrorKind, FrontendContext, PropertyAttributes, Value};

/// Test that an undefined identifier is an engine-diagnosed error
#[test]
fn test_reference_error() {
    let ctx = Context::new().unwrap();
    let err = ctx.evaluate(b"undefinedIdentifier + 1").unwrap_err();

    assert!(matches!(err, Error::Js(_)));
    let js = err.js_error().unwrap();
    assert!(!js.message.is_empty());
    assert_eq!(js.kind, ErrorKind::ReferenceError);
    assert_eq!(js.code, 2);
    assert_eq!(js.filename, marmoset_core::EVALUATE_FILENAME);
    assert_eq!(js.line, 1);
}

/// Test that thrown non-error values still produce an engine error
#[test]
fn test_thrown_primitives() {
    let ctx = Context::new().unwrap();

    let err = ctx.evaluate(b"throw 'plain string'").unwrap_err();
    let js = err.js_error().unwrap();
    assert_eq!(js.message, "plain string");
    assert_eq!(js.kind, ErrorKind::Error);
    assert_eq!(js.code, 8);

    let err = ctx.evaluate(b"throw 42").unwrap_err();
    assert_eq!(err.to_string(), "42");
}

/// Test that user-defined error subclasses keep their message
#[test]
fn test_custom_error_class() {
    let ctx = Context::new().unwrap();
    let err = ctx
        .evaluate(b"class ValidationError extends Error { constructor(m) { super(m); this.name = 'ValidationError'; } }\nthrow new ValidationError('bad input');")
        .unwrap_err();
    let js = err.js_error().unwrap();
    assert_eq!(js.message, "bad input");
    assert_eq!(js.kind, ErrorKind::Error);
    assert_eq!(js.filename, marmoset_core::EVALUATE_FILENAME);
    assert!(js.stack.is_some());
}

/// Test that a host callback error crosses script and comes back intact
#[test]
fn test_host_error_round_trip() {
    let ctx = Context::new().unwrap();
    let global = ctx.global().unwrap();
    ctx.define_function(
        &global,
        "validate",
        |ctx, args| {
            if args.is_empty() || !args[0].is_number() {
                return Err(Error::binding("expected a number"));
            }
            Ok(Some(Value::boolean(ctx, true)))
        },
        1,
        PropertyAttributes::DEFAULT,
    )
    .unwrap();

    assert!(ctx.evaluate(b"validate(1)").unwrap().is_true());

    let err = ctx.evaluate(b"validate('x')").unwrap_err();
    assert_eq!(err.js_error().unwrap().message, "expected a number");
}

/// Test that binding-boundary errors carry only a message
#[test]
fn test_binding_errors_are_message_only() {
    let ctx = Context::new().unwrap();
    let object = ctx.evaluate(b"({})").unwrap().into_object().unwrap();
    let value = Value::int32(&ctx, 1);

    let err = ctx
        .define_property(&object, "bad\0name", &value, PropertyAttributes::DEFAULT)
        .unwrap_err();
    assert!(matches!(err, Error::Binding(_)));
    assert!(err.code().is_none());

    let err = Value::null(&ctx).into_function().unwrap_err();
    assert!(matches!(err, Error::Cast { .. }));
    assert!(!err.is_js_error());
}

/// Test that frontend compile errors carry the operation prefix and diagnostics
#[test]
fn test_frontend_compile_error() {
    let frontend = FrontendContext::new().unwrap();
    let err = frontend.compile_to_stencil("broken.js", b"\n\nlet = ;").unwrap_err();
    let js = err.js_error().unwrap();
    assert_eq!(js.kind, ErrorKind::SyntaxError);
    assert_eq!(js.filename, "broken.js");
    assert_eq!(js.line, 3);
}
