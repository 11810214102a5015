//! End-to-end scenarios: one source string in, one observable result out.
//! Each test exercises a full engine bootstrap, parse, and eval — no access
//! to any internal module.

use esflow::{Engine, EngineLimits, EvalFlags};

fn run(source: &str) -> esflow::Value {
    let mut engine = Engine::new(EngineLimits::default());
    let flags = EvalFlags { treat_as_global_this: true, ..Default::default() };
    engine.eval_str("test", source, flags).unwrap_or_else(|e| panic!("eval failed: {e}"))
}

#[test]
fn arithmetic_and_precedence() {
    assert_eq!(run("1 + 2 * 3").to_number_primitive(), 7.0);
}

#[test]
fn closures_capture_their_own_counter() {
    let result = run("var f = (function(){ var n=0; return function(){ return ++n; } })(); f(); f(); f();");
    assert_eq!(result.to_number_primitive(), 3.0);
}

#[test]
fn exception_flow_with_finally() {
    let result = run("var s=''; try { throw 'x'; } catch(e) { s+=e; } finally { s+='!'; } s");
    assert_eq!(result.to_string_primitive().as_str(), "x!");
}

#[test]
fn regex_capture() {
    let result = run("/a(b+)c/.exec('zabbbbc').toString()");
    assert_eq!(result.to_string_primitive().as_str(), "abbbbc,bbbb");
}

#[test]
fn sort_stability_with_custom_comparator() {
    let result = run("[{k:1,v:'a'},{k:1,v:'b'},{k:0,v:'c'}].sort(function(x,y){return x.k-y.k}).map(function(o){return o.v}).join('')");
    assert_eq!(result.to_string_primitive().as_str(), "cab");
}

#[test]
fn json_round_trip_with_reviver() {
    let result = run(r#"JSON.parse('{"n":"42"}', function(k,v){return k==='n'?parseInt(v,10):v}).n"#);
    assert_eq!(result.to_number_primitive(), 42.0);
}

#[test]
fn uncaught_exception_surfaces_the_thrown_value() {
    let mut engine = Engine::new(EngineLimits::default());
    let flags = EvalFlags { treat_as_global_this: true, ..Default::default() };
    let err = engine.eval_str("test", "throw new TypeError('nope');", flags).unwrap_err();
    match err {
        esflow::Error::Uncaught { value, .. } => {
            assert_eq!(value.to_string_primitive().as_str(), "TypeError: nope");
        }
        other => panic!("expected an uncaught exception, got {other:?}"),
    }
}

#[test]
fn parse_error_does_not_panic() {
    let mut engine = Engine::new(EngineLimits::default());
    let flags = EvalFlags::default();
    let err = engine.eval_str("test", "var = ;", flags).unwrap_err();
    assert!(matches!(err, esflow::Error::Parse(_)));
}

#[test]
fn call_depth_limit_throws_range_error() {
    let mut engine = Engine::new(EngineLimits { max_call_depth: 16, ..EngineLimits::default() });
    let flags = EvalFlags { treat_as_global_this: true, ..Default::default() };
    let err = engine.eval_str("test", "function recurse(n) { return recurse(n + 1); } recurse(0);", flags).unwrap_err();
    assert!(matches!(err, esflow::Error::Uncaught { .. }));
}
