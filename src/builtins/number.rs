//! `Number` constructor and `Number.prototype`, grounded on
//! `original_source/src/object/number.c`: `toString` (with optional radix
//! 2-36), `valueOf`, `toExponential`, and the constructor's `MAX_VALUE`/
//! `MIN_VALUE`/`NaN`/`POSITIVE_INFINITY`/`NEGATIVE_INFINITY` statics.
//! `toFixed` isn't in that file; it's added as an ES5-standard supplement.

use super::{arg, define_constructor, define_native, define_value};
use crate::context::Context;
use crate::estr::EStr;
use crate::interpreter::{to_primitive, type_error, EvalResult};
use crate::object::ObjectKind;
use crate::value::Value;

pub fn install(ctx: &mut Context) {
    let prototype = ctx.prototypes().number;
    define_native(ctx, prototype, "toString", 1, to_string);
    define_native(ctx, prototype, "valueOf", 0, value_of);
    define_native(ctx, prototype, "toExponential", 1, to_exponential);
    define_native(ctx, prototype, "toFixed", 1, to_fixed);

    let ctor = define_constructor(ctx, "Number", 1, constructor, prototype);
    define_value(ctx, ctor, "MAX_VALUE", Value::Number(f64::MAX));
    define_value(ctx, ctor, "MIN_VALUE", Value::Number(f64::MIN_POSITIVE));
    define_value(ctx, ctor, "NaN", Value::Number(f64::NAN));
    define_value(ctx, ctor, "NEGATIVE_INFINITY", Value::Number(f64::NEG_INFINITY));
    define_value(ctx, ctor, "POSITIVE_INFINITY", Value::Number(f64::INFINITY));
}

fn this_number(ctx: &Context, this: &Value) -> EvalResult<f64> {
    match this {
        Value::Number(n) => Ok(*n),
        Value::Int(n) => Ok(*n as f64),
        Value::Object(h) => match &ctx.pool.get(*h).kind {
            ObjectKind::NumberObject(n) => Ok(*n),
            _ => Err(type_error("not a number")),
        },
        _ => Err(type_error("not a number")),
    }
}

fn to_radix_string(mut n: f64, radix: u32) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() };
    }
    let negative = n < 0.0;
    n = n.abs();
    let mut int_part = n.trunc() as u64;
    let mut digits = Vec::new();
    if int_part == 0 {
        digits.push('0');
    }
    while int_part > 0 {
        let digit = (int_part % radix as u64) as u32;
        digits.push(std::char::from_digit(digit, radix).unwrap());
        int_part /= radix as u64;
    }
    digits.reverse();
    let mut out: String = digits.into_iter().collect();

    let mut frac = n.fract();
    if frac > 0.0 {
        out.push('.');
        for _ in 0..20 {
            if frac <= 0.0 {
                break;
            }
            frac *= radix as f64;
            let digit = frac.trunc() as u32;
            out.push(std::char::from_digit(digit, radix).unwrap());
            frac -= digit as f64;
        }
    }
    if negative {
        out.insert(0, '-');
    }
    out
}

fn to_string(ctx: &mut Context, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let n = this_number(ctx, this)?;
    match arg(args, 0) {
        Value::Undefined => Ok(Value::Str(EStr::new(crate::value::format_number(n)))),
        v => {
            let radix = v.to_number_primitive() as i64;
            if !(2..=36).contains(&radix) {
                return Err(crate::interpreter::reference_error("radix must be an integer between 2 and 36"));
            }
            if radix == 10 {
                return Ok(Value::Str(EStr::new(crate::value::format_number(n))));
            }
            Ok(Value::Str(EStr::new(to_radix_string(n, radix as u32))))
        }
    }
}

fn value_of(ctx: &mut Context, this: &Value, _args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Number(this_number(ctx, this)?))
}

fn to_exponential(ctx: &mut Context, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let n = this_number(ctx, this)?;
    let text = match arg(args, 0) {
        Value::Undefined => format!("{:e}", n),
        v => {
            let precision = v.to_number_primitive() as i64;
            if !(0..=48).contains(&precision) {
                return Err(crate::interpreter::reference_error("toExponential() argument must be between 0 and 48"));
            }
            format!("{:.*e}", precision as usize, n)
        }
    };
    Ok(Value::Str(EStr::new(normalize_exponent(&text))))
}

fn to_fixed(ctx: &mut Context, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let n = this_number(ctx, this)?;
    let digits = match arg(args, 0) {
        Value::Undefined => 0,
        v => v.to_number_primitive() as i64,
    };
    if !(0..=100).contains(&digits) {
        return Err(crate::interpreter::reference_error("toFixed() digits argument must be between 0 and 100"));
    }
    Ok(Value::Str(EStr::new(format!("{:.*}", digits as usize, n))))
}

/// Rust's `{:e}` formats `1.5e2` as `1.5e2`; ES5's `toExponential` wants the
/// explicit sign on the exponent (`1.5e+2`).
fn normalize_exponent(s: &str) -> String {
    match s.find('e') {
        Some(idx) if !s[idx + 1..].starts_with('-') => format!("{}e+{}", &s[..idx], &s[idx + 1..]),
        _ => s.to_string(),
    }
}

fn constructor(ctx: &mut Context, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    let n = match arg(args, 0) {
        Value::Undefined => 0.0,
        v => to_primitive(ctx, &v, false)?.to_number_primitive(),
    };
    Ok(Value::Number(n))
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
    fn to_string_with_radix_formats_binary() {
        let mut ctx = new_context();
        let result = to_string(&mut ctx, &Value::Number(10.0), &[Value::Int(2)]).unwrap();
        assert_eq!(result.to_string_primitive().as_str(), "1010");
    }

    #[test]
    fn to_fixed_rounds_to_requested_digits() {
        let mut ctx = new_context();
        let result = to_fixed(&mut ctx, &Value::Number(3.14159), &[Value::Int(2)]).unwrap();
        assert_eq!(result.to_string_primitive().as_str(), "3.14");
    }
}
