//! Broader builtin-method coverage across `Array`/`String`/`Number`/
//! `Function`/`Object`, driven entirely through [`Engine::eval_str`].

use esflow::{Engine, EngineLimits, EvalFlags};

fn run(source: &str) -> esflow::Value {
    let mut engine = Engine::new(EngineLimits::default());
    let flags = EvalFlags { treat_as_global_this: true, ..Default::default() };
    engine.eval_str("test", source, flags).unwrap_or_else(|e| panic!("eval failed: {e}"))
}

#[test]
fn array_map_filter_reduce_chain() {
    let result = run("[1,2,3,4,5].filter(function(n){return n%2==0}).map(function(n){return n*10}).reduce(function(a,b){return a+b}, 0)");
    assert_eq!(result.to_number_primitive(), 60.0);
}

#[test]
fn array_push_grows_length_and_stores_value() {
    let result = run("var a=[1,2]; a.push(3); a.length + ',' + a[2]");
    assert_eq!(result.to_string_primitive().as_str(), "3,3");
}

#[test]
fn array_splice_removes_and_inserts() {
    let result = run("var a=[1,2,3,4]; a.splice(1,2,'x'); a.join('-')");
    assert_eq!(result.to_string_primitive().as_str(), "1-x-4");
}

#[test]
fn string_split_and_slice_and_replace() {
    let result = run("'a,b,c'.split(',').slice(1).join('+')");
    assert_eq!(result.to_string_primitive().as_str(), "b+c");
}

#[test]
fn string_replace_with_capture_group_template() {
    let result = run("'2026-07-27'.replace(/(\\d+)-(\\d+)-(\\d+)/, '$2/$3/$1')");
    assert_eq!(result.to_string_primitive().as_str(), "07/27/2026");
}

#[test]
fn number_to_string_radix_and_fixed() {
    let result = run("(255).toString(16) + ',' + (1.005).toFixed(2)");
    assert_eq!(result.to_string_primitive().as_str(), "ff,1.00");
}

#[test]
fn object_keys_and_has_own_property() {
    let result = run("var o={a:1,b:2}; Object.keys(o).join('') + ',' + o.hasOwnProperty('a') + ',' + o.hasOwnProperty('z')");
    assert_eq!(result.to_string_primitive().as_str(), "ab,true,false");
}

#[test]
fn function_bind_prepends_arguments() {
    let result = run("function add(a,b){return a+b;} var add5 = add.bind(null, 5); add5(37)");
    assert_eq!(result.to_number_primitive(), 42.0);
}

#[test]
fn this_binding_follows_the_call_site() {
    let result = run("var o={x:10, get:function(){return this.x;}}; o.get()");
    assert_eq!(result.to_number_primitive(), 10.0);
}

#[test]
fn math_namespace_constants_and_rounding() {
    let result = run("Math.round(2.5) + ',' + Math.floor(-1.1) + ',' + Math.max(1,9,3)");
    assert_eq!(result.to_string_primitive().as_str(), "3,-2,9");
}

#[test]
fn json_stringify_then_parse_round_trip() {
    let result = run("JSON.parse(JSON.stringify({a:1,b:[1,2,3]})).b[1]");
    assert_eq!(result.to_number_primitive(), 2.0);
}

#[test]
fn typeof_function_is_function_not_object() {
    let result = run("typeof function(){}");
    assert_eq!(result.to_string_primitive().as_str(), "function");
    let result = run("typeof {}");
    assert_eq!(result.to_string_primitive().as_str(), "object");
}

#[test]
fn relational_comparisons_with_nan_are_always_false() {
    let result = run("(NaN <= 5) + ',' + (NaN >= 5) + ',' + (5 <= NaN) + ',' + (5 >= NaN)");
    assert_eq!(result.to_string_primitive().as_str(), "false,false,false,false");
}

#[test]
fn non_method_call_binds_this_to_global_in_sloppy_mode() {
    let result = run("globalThis_marker = 'top'; function f() { return this.globalThis_marker; } f();");
    assert_eq!(result.to_string_primitive().as_str(), "top");
}
