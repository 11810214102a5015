//! `Error` and its five subclasses (`RangeError`/`ReferenceError`/
//! `SyntaxError`/`TypeError`/`URIError`), grounded on spec §7's error-kind
//! table and `object.rs`'s existing `ErrorKind` enum: each carries `name`/
//! `message` and a shared `toString` on `Error.prototype`, one prototype
//! object per kind all chaining up to a common `Error.prototype`.

use super::{define_constructor, define_native};
use crate::context::Context;
use crate::estr::EStr;
use crate::interpreter::{to_object, type_error, EvalResult};
use crate::object::{ErrorKind, ObjectData, ObjectKind, Property, PropertyFlags};
use crate::value::Value;

const KINDS: [(ErrorKind, &str); 6] =
    [(ErrorKind::Error, "Error"), (ErrorKind::RangeError, "RangeError"), (ErrorKind::ReferenceError, "ReferenceError"), (ErrorKind::SyntaxError, "SyntaxError"), (ErrorKind::TypeError, "TypeError"), (ErrorKind::URIError, "URIError")];

pub fn install(ctx: &mut Context) {
    let base_prototype = ctx.prototypes().error;
    define_native(ctx, base_prototype, "toString", 0, to_string);
    let well_known = *ctx.keys.well_known();
    ctx.pool.get_mut(base_prototype).set_own(well_known.name, Property::data(Value::Str(EStr::new("Error")), PropertyFlags::new(PropertyFlags::WRITABLE | PropertyFlags::CONFIGURABLE)));
    ctx.pool.get_mut(base_prototype).set_own(well_known.message, Property::data(Value::Str(EStr::new("")), PropertyFlags::new(PropertyFlags::WRITABLE | PropertyFlags::CONFIGURABLE)));
    define_constructor(ctx, "Error", 1, make_constructor(ErrorKind::Error), base_prototype);

    for &(kind, name) in KINDS.iter().filter(|(k, _)| *k != ErrorKind::Error) {
        let prototype = ctx.pool.alloc(ObjectData::new(ObjectKind::Plain, Some(base_prototype)));
        let name_key = ctx.keys.well_known().name;
        ctx.pool.get_mut(prototype).set_own(name_key, Property::data(Value::Str(EStr::new(name)), PropertyFlags::new(PropertyFlags::WRITABLE | PropertyFlags::CONFIGURABLE)));
        define_constructor(ctx, name, 1, make_constructor(kind), prototype);
    }
}

fn make_constructor(kind: ErrorKind) -> crate::object::NativeFn {
    match kind {
        ErrorKind::Error => constructor_error,
        ErrorKind::RangeError => constructor_range,
        ErrorKind::ReferenceError => constructor_reference,
        ErrorKind::SyntaxError => constructor_syntax,
        ErrorKind::TypeError => constructor_type,
        ErrorKind::URIError => constructor_uri,
    }
}

fn build(ctx: &mut Context, kind: ErrorKind, args: &[Value]) -> EvalResult<Value> {
    let global = ctx.global_object;
    let ctor_key = ctx.keys.intern(kind.name());
    let prototype = match ctx.pool.get(global).get_own(ctor_key).and_then(|p| p.as_value().cloned()) {
        Some(Value::Object(ctor)) => {
            let prototype_key = ctx.keys.well_known().prototype;
            match ctx.pool.get(ctor).get_own(prototype_key).and_then(|p| p.as_value().cloned()) {
                Some(Value::Object(h)) => h,
                _ => ctx.prototypes().error,
            }
        }
        _ => ctx.prototypes().error,
    };
    let handle = ctx.pool.alloc(ObjectData::new(ObjectKind::Error(kind), Some(prototype)));
    if let Some(message) = args.first() {
        if !matches!(message, Value::Undefined) {
            let text = message.to_string_primitive();
            let key = ctx.keys.well_known().message;
            ctx.pool.get_mut(handle).set_own(key, Property::data(Value::Str(text), PropertyFlags::new(PropertyFlags::WRITABLE | PropertyFlags::CONFIGURABLE)));
        }
    }
    Ok(Value::Object(handle))
}

fn constructor_error(ctx: &mut Context, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    build(ctx, ErrorKind::Error, args)
}
fn constructor_range(ctx: &mut Context, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    build(ctx, ErrorKind::RangeError, args)
}
fn constructor_reference(ctx: &mut Context, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    build(ctx, ErrorKind::ReferenceError, args)
}
fn constructor_syntax(ctx: &mut Context, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    build(ctx, ErrorKind::SyntaxError, args)
}
fn constructor_type(ctx: &mut Context, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    build(ctx, ErrorKind::TypeError, args)
}
fn constructor_uri(ctx: &mut Context, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    build(ctx, ErrorKind::URIError, args)
}

fn to_string(ctx: &mut Context, this: &Value, _args: &[Value]) -> EvalResult<Value> {
    let handle = to_object(ctx, this)?;
    if !matches!(ctx.pool.get(handle).kind, ObjectKind::Error(_) | ObjectKind::Plain) {
        return Err(type_error("Error.prototype.toString called on a non-Error value"));
    }
    let name_key = ctx.keys.well_known().name;
    let message_key = ctx.keys.well_known().message;
    let name = crate::interpreter::get_member(ctx, handle, name_key)?.to_string_primitive();
    let message = crate::interpreter::get_member(ctx, handle, message_key)?;
    let message = match message {
        Value::Undefined => String::new(),
        v => v.to_string_primitive().as_str().to_string(),
    };
    if message.is_empty() {
        Ok(Value::Str(name))
    } else {
        Ok(Value::Str(EStr::new(format!("{}: {}", name.as_str(), message))))
    }
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
    fn type_error_to_string_includes_name_and_message() {
        let mut ctx = new_context();
        let error = constructor_type(&mut ctx, &Value::Undefined, &[Value::Str(EStr::new("bad value"))]).unwrap();
        let result = to_string(&mut ctx, &error, &[]).unwrap();
        assert_eq!(result.to_string_primitive().as_str(), "TypeError: bad value");
    }
}
