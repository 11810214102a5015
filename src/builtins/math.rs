//! The `Math` namespace object: `floor`/`ceil`/`round`/`abs`/`max`/`min`/
//! `pow`/`sqrt`, plus the `PI`/`E` constants. `Math.random` is deliberately
//! excluded — nondeterminism is unwanted in an embeddable interpreter's
//! test surface (a documented addition beyond what the retrieved
//! `original_source/` slice carries, which doesn't include a `math.c`).

use super::{define_native, define_namespace, define_value};
use crate::context::Context;
use crate::interpreter::EvalResult;
use crate::value::Value;

pub fn install(ctx: &mut Context) {
    let math = define_namespace(ctx, "Math");
    define_value(ctx, math, "PI", Value::Number(std::f64::consts::PI));
    define_value(ctx, math, "E", Value::Number(std::f64::consts::E));
    define_value(ctx, math, "LN2", Value::Number(std::f64::consts::LN_2));
    define_value(ctx, math, "LN10", Value::Number(std::f64::consts::LN_10));
    define_value(ctx, math, "SQRT2", Value::Number(std::f64::consts::SQRT_2));
    define_native(ctx, math, "floor", 1, floor);
    define_native(ctx, math, "ceil", 1, ceil);
    define_native(ctx, math, "round", 1, round);
    define_native(ctx, math, "abs", 1, abs);
    define_native(ctx, math, "max", 2, max);
    define_native(ctx, math, "min", 2, min);
    define_native(ctx, math, "pow", 2, pow);
    define_native(ctx, math, "sqrt", 1, sqrt);
}

fn unary(args: &[Value], f: impl Fn(f64) -> f64) -> Value {
    Value::Number(f(args.first().cloned().unwrap_or(Value::Undefined).to_number_primitive()))
}

fn floor(_ctx: &mut Context, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    Ok(unary(args, f64::floor))
}

fn ceil(_ctx: &mut Context, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    Ok(unary(args, f64::ceil))
}

/// Ties round toward `+Infinity`, matching ES5 §15.8.2.15's
/// `Math.round` (not banker's rounding, and not `f64::round`'s
/// round-half-away-from-zero for negative halves like `-0.5`).
fn round(_ctx: &mut Context, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    Ok(unary(args, |n| (n + 0.5).floor()))
}

fn abs(_ctx: &mut Context, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    Ok(unary(args, f64::abs))
}

fn sqrt(_ctx: &mut Context, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    Ok(unary(args, f64::sqrt))
}

fn max(_ctx: &mut Context, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    let mut result = f64::NEG_INFINITY;
    for value in args {
        let n = value.to_number_primitive();
        if n.is_nan() {
            return Ok(Value::Number(f64::NAN));
        }
        if n > result {
            result = n;
        }
    }
    Ok(Value::Number(result))
}

fn min(_ctx: &mut Context, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    let mut result = f64::INFINITY;
    for value in args {
        let n = value.to_number_primitive();
        if n.is_nan() {
            return Ok(Value::Number(f64::NAN));
        }
        if n < result {
            result = n;
        }
    }
    Ok(Value::Number(result))
}

fn pow(_ctx: &mut Context, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    let base = args.first().cloned().unwrap_or(Value::Undefined).to_number_primitive();
    let exponent = args.get(1).cloned().unwrap_or(Value::Undefined).to_number_primitive();
    Ok(Value::Number(base.powf(exponent)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Limits;

    fn new_context() -> Context {
        let mut ctx = Context::new(Limits::default());
        super::super::install(&mut ctx);
        ctx
    }

    #[test]
    fn round_ties_toward_positive_infinity() {
        let mut ctx = new_context();
        let result = round(&mut ctx, &Value::Undefined, &[Value::Number(-0.5)]).unwrap();
        assert_eq!(result.to_number_primitive(), -0.0);
        let result = round(&mut ctx, &Value::Undefined, &[Value::Number(2.5)]).unwrap();
        assert_eq!(result.to_number_primitive(), 3.0);
    }

    #[test]
    fn max_propagates_nan() {
        let mut ctx = new_context();
        let result = max(&mut ctx, &Value::Undefined, &[Value::Number(1.0), Value::Number(f64::NAN)]).unwrap();
        assert!(result.to_number_primitive().is_nan());
    }
}
