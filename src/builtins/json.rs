//! The `JSON` namespace object: thin wrappers registering `parse`/
//! `stringify` as native methods, delegating to [`crate::json`] for the
//! actual parse/stringify logic (spec §4.6).

use super::{arg, define_namespace, define_native};
use crate::context::Context;
use crate::interpreter::EvalResult;
use crate::value::Value;

pub fn install(ctx: &mut Context) {
    let json = define_namespace(ctx, "JSON");
    define_native(ctx, json, "parse", 2, parse);
    define_native(ctx, json, "stringify", 3, stringify);
}

fn parse(ctx: &mut Context, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    let text = arg(args, 0).to_string_primitive();
    crate::json::parse(ctx, text.as_str(), arg(args, 1))
}

fn stringify(ctx: &mut Context, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    crate::json::stringify(ctx, arg(args, 0), arg(args, 1), arg(args, 2))
}
