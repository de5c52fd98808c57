//! Integration tests for arrays, maps and sets

use marmoset_core::{Array, Context, Map, Set, Value};

/// Test that size tracks distinct keys
#[test]
fn test_map_size_invariant() {
    let ctx = Context::new().unwrap();
    let map = Map::new(&ctx).unwrap();
    assert_eq!(map.size(), 0);

    for n in 1..=20 {
        let key = Value::string(&ctx, &format!("key-{}", n)).unwrap();
        map.set(&key, &Value::int32(&ctx, n)).unwrap();
        assert_eq!(map.size(), n as usize);
    }

    // overwriting keeps the size
    let key = Value::string(&ctx, "key-1").unwrap();
    map.set(&key, &Value::null(&ctx)).unwrap();
    assert_eq!(map.size(), 20);
    assert!(map.get(&key).unwrap().is_null());
}

/// Test that size tracks distinct members
#[test]
fn test_set_size_invariant() {
    let ctx = Context::new().unwrap();
    let set = Set::new(&ctx).unwrap();
    assert_eq!(set.size(), 0);

    for n in 0..10 {
        set.add(&Value::int32(&ctx, n)).unwrap();
        set.add(&Value::int32(&ctx, n)).unwrap();
    }
    assert_eq!(set.size(), 10);
}

/// Test that collections built on the host are visible to script
#[test]
fn test_collections_in_script() {
    let ctx = Context::new().unwrap();
    let map = Map::new(&ctx).unwrap();
    map.set(&Value::string(&ctx, "a").unwrap(), &Value::int32(&ctx, 1))
        .unwrap();
    let set = Set::new(&ctx).unwrap();
    set.add(&Value::string(&ctx, "x").unwrap()).unwrap();
    let array = Array::new(&ctx, &[&Value::int32(&ctx, 1), &Value::int32(&ctx, 2)]).unwrap();

    let global = ctx.global().unwrap();
    global.set("m", &map).unwrap();
    global.set("s", &set).unwrap();
    global.set("arr", &array).unwrap();

    let result = ctx
        .evaluate(b"[m instanceof Map, m.get('a'), s.has('x'), Array.isArray(arr), arr.length].join()")
        .unwrap();
    assert_eq!(result.to_js_string(), "true,1,true,true,2");
}

/// Test that script-side mutations are visible through the handles
#[test]
fn test_script_mutations_visible() {
    let ctx = Context::new().unwrap();
    let map = Map::new(&ctx).unwrap();
    let global = ctx.global().unwrap();
    global.set("m", &map).unwrap();

    ctx.evaluate(b"m.set('k', 'v'); m.set('k2', 'v2'); m.delete('k2');").unwrap();
    assert_eq!(map.size(), 1);
    assert_eq!(
        map.get(&Value::string(&ctx, "k").unwrap()).unwrap().to_js_string(),
        "v"
    );
}
