//! The handful of free-standing global functions ES3 exposes outside any
//! namespace: `parseInt`, `parseFloat`, `isNaN`, `isFinite`. Grounded on
//! `original_source/src/ecc.c`'s `parseInt`/`parseFloat`/`isNaN`/`isFinite`
//! native registrations, which forward into the lexer's numeric-literal
//! grammar rather than a general-purpose number parser.

use super::{arg, define_native};
use crate::context::Context;
use crate::interpreter::EvalResult;
use crate::value::Value;

pub fn install(ctx: &mut Context) {
    let global = ctx.global_object;
    define_native(ctx, global, "parseInt", 2, parse_int);
    define_native(ctx, global, "parseFloat", 1, parse_float);
    define_native(ctx, global, "isNaN", 1, is_nan);
    define_native(ctx, global, "isFinite", 1, is_finite);
}

fn digit_value(c: char) -> Option<u32> {
    c.to_digit(36)
}

/// ES5 §15.1.2.2: leading whitespace and sign are stripped first; a `0x`/
/// `0X` prefix forces radix 16 regardless of the `radix` argument; the
/// longest valid prefix of digits for the resulting radix is consumed, and
/// anything left over (including "no digits at all") stops the scan rather
/// than failing the whole call.
fn parse_int(_ctx: &mut Context, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    let text = arg(args, 0).to_string_primitive();
    let mut s = text.as_str().trim_start();

    let negative = match s.strip_prefix('-') {
        Some(rest) => {
            s = rest;
            true
        }
        None => {
            s = s.strip_prefix('+').unwrap_or(s);
            false
        }
    };

    let requested_radix = match arg(args, 1) {
        Value::Undefined => 0,
        v => v.to_number_primitive() as i64,
    };

    let mut radix = if requested_radix == 0 { 10 } else { requested_radix };
    if requested_radix == 0 || requested_radix == 16 {
        if let Some(rest) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            s = rest;
            radix = 16;
        }
    }
    if !(2..=36).contains(&radix) {
        return Ok(Value::Number(f64::NAN));
    }

    let mut digits_end = 0;
    for c in s.chars() {
        match digit_value(c) {
            Some(d) if (d as i64) < radix => digits_end += c.len_utf8(),
            _ => break,
        }
    }
    if digits_end == 0 {
        return Ok(Value::Number(f64::NAN));
    }

    let mut result = 0f64;
    for c in s[..digits_end].chars() {
        result = result * radix as f64 + digit_value(c).unwrap() as f64;
    }
    Ok(Value::Number(if negative { -result } else { result }))
}

/// ES5 §15.1.2.3: consumes the longest prefix matching `StrDecimalLiteral`
/// (optional sign, digits, optional fraction, optional exponent, or
/// `Infinity`); anything left over is simply not part of the number.
fn parse_float(_ctx: &mut Context, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    let text = arg(args, 0).to_string_primitive();
    let s = text.as_str().trim_start();

    let (sign, rest) = match s.strip_prefix('-') {
        Some(r) => (-1.0, r),
        None => (1.0, s.strip_prefix('+').unwrap_or(s)),
    };
    if rest.starts_with("Infinity") {
        return Ok(Value::Number(sign * f64::INFINITY));
    }

    let bytes = rest.as_bytes();
    let mut end = 0;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > digits_start {
            end = exp_end;
        }
    }

    let prefix = &rest[..end];
    if prefix.is_empty() || prefix == "." {
        return Ok(Value::Number(f64::NAN));
    }
    match prefix.parse::<f64>() {
        Ok(n) => Ok(Value::Number(sign * n)),
        Err(_) => Ok(Value::Number(f64::NAN)),
    }
}

fn is_nan(_ctx: &mut Context, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Boolean(arg(args, 0).to_number_primitive().is_nan()))
}

fn is_finite(_ctx: &mut Context, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Boolean(arg(args, 0).to_number_primitive().is_finite()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Limits;
    use crate::estr::EStr;

    fn new_context() -> Context {
        let mut ctx = Context::new(Limits::default());
        super::super::install(&mut ctx);
        ctx
    }

    #[test]
    fn parse_int_stops_at_first_invalid_digit() {
        let mut ctx = new_context();
        let result = parse_int(&mut ctx, &Value::Undefined, &[Value::Str(EStr::new("42px")), Value::Undefined]).unwrap();
        assert_eq!(result.to_number_primitive(), 42.0);
    }

    #[test]
    fn parse_int_honors_explicit_radix() {
        let mut ctx = new_context();
        let result = parse_int(&mut ctx, &Value::Undefined, &[Value::Str(EStr::new("ff")), Value::Int(16)]).unwrap();
        assert_eq!(result.to_number_primitive(), 255.0);
    }

    #[test]
    fn parse_int_with_no_leading_digits_is_nan() {
        let mut ctx = new_context();
        let result = parse_int(&mut ctx, &Value::Undefined, &[Value::Str(EStr::new("abc")), Value::Undefined]).unwrap();
        assert!(result.to_number_primitive().is_nan());
    }

    #[test]
    fn parse_float_reads_the_longest_numeric_prefix() {
        let mut ctx = new_context();
        let result = parse_float(&mut ctx, &Value::Undefined, &[Value::Str(EStr::new("3.14abc"))]).unwrap();
        assert_eq!(result.to_number_primitive(), 3.14);
    }

    #[test]
    fn is_nan_and_is_finite_follow_to_number() {
        let mut ctx = new_context();
        let nan_result = is_nan(&mut ctx, &Value::Undefined, &[Value::Str(EStr::new("x"))]).unwrap();
        assert!(matches!(nan_result, Value::Boolean(true)));
        let finite_result = is_finite(&mut ctx, &Value::Undefined, &[Value::Number(1.0)]).unwrap();
        assert!(matches!(finite_result, Value::Boolean(true)));
    }
}
