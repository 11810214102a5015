//! `Boolean` constructor and `Boolean.prototype`. Not present in the
//! retrieved `original_source/` slice — `toString`/`valueOf` and the
//! constructor follow plain ES5 `Boolean.prototype` semantics as a
//! documented supplement.

use super::{arg, define_constructor, define_native};
use crate::context::Context;
use crate::estr::EStr;
use crate::interpreter::type_error;
use crate::interpreter::EvalResult;
use crate::object::ObjectKind;
use crate::value::Value;

pub fn install(ctx: &mut Context) {
    let prototype = ctx.prototypes().boolean;
    define_native(ctx, prototype, "toString", 0, to_string);
    define_native(ctx, prototype, "valueOf", 0, value_of);
    define_constructor(ctx, "Boolean", 1, constructor, prototype);
}

fn this_boolean(ctx: &Context, this: &Value) -> EvalResult<bool> {
    match this {
        Value::Boolean(b) => Ok(*b),
        Value::Object(h) => match &ctx.pool.get(*h).kind {
            ObjectKind::BooleanObject(b) => Ok(*b),
            _ => Err(type_error("not a boolean")),
        },
        _ => Err(type_error("not a boolean")),
    }
}

fn to_string(ctx: &mut Context, this: &Value, _args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Str(EStr::new(if this_boolean(ctx, this)? { "true" } else { "false" })))
}

fn value_of(ctx: &mut Context, this: &Value, _args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Boolean(this_boolean(ctx, this)?))
}

fn constructor(_ctx: &mut Context, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Boolean(arg(args, 0).to_boolean()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Limits;

    #[test]
    fn to_string_reports_true_or_false() {
        let mut ctx = Context::new(Limits::default());
        super::super::install(&mut ctx);
        assert_eq!(to_string(&mut ctx, &Value::Boolean(true), &[]).unwrap().to_string_primitive().as_str(), "true");
        assert_eq!(to_string(&mut ctx, &Value::Boolean(false), &[]).unwrap().to_string_primitive().as_str(), "false");
    }
}
