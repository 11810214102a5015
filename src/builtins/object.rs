//! `Object` constructor and `Object.prototype`, grounded on
//! `original_source/src/object/object.h`'s own descriptor (`toString`
//! spelling per subkind) and general ES5 `Object` semantics for the
//! constructor statics, which aren't in the retrieved `original_source/`
//! slice (only the struct layout is) — these are a documented supplement,
//! not a literal port.

use super::{arg, define_constructor, define_native};
use crate::context::Context;
use crate::interpreter::{to_object, EvalResult};
use crate::object::{ObjectData, ObjectKind, Property, PropertyFlags};
use crate::value::Value;

pub fn install(ctx: &mut Context) {
    let prototype = ctx.prototypes().object;
    define_native(ctx, prototype, "toString", 0, to_string);
    define_native(ctx, prototype, "toLocaleString", 0, to_string);
    define_native(ctx, prototype, "valueOf", 0, value_of);
    define_native(ctx, prototype, "hasOwnProperty", 1, has_own_property);
    define_native(ctx, prototype, "isPrototypeOf", 1, is_prototype_of);
    define_native(ctx, prototype, "propertyIsEnumerable", 1, property_is_enumerable);

    let ctor = define_constructor(ctx, "Object", 1, constructor, prototype);
    define_native(ctx, ctor, "keys", 1, keys);
    define_native(ctx, ctor, "getPrototypeOf", 1, get_prototype_of);
    define_native(ctx, ctor, "create", 2, create);
}

/// The subkind-derived tag in `[object Tag]`, matching `object/object.h`'s
/// `Object(Type)` descriptors (`.text`).
fn kind_tag(kind: &ObjectKind) -> &'static str {
    match kind {
        ObjectKind::Array => "Array",
        ObjectKind::Function(_) | ObjectKind::Native(_) => "Function",
        ObjectKind::StringObject(_) => "String",
        ObjectKind::NumberObject(_) => "Number",
        ObjectKind::BooleanObject(_) => "Boolean",
        ObjectKind::Date(_) => "Date",
        ObjectKind::RegExpObject(..) => "RegExp",
        ObjectKind::Error(_) => "Error",
        ObjectKind::Arguments => "Arguments",
        ObjectKind::Plain => "Object",
    }
}

fn to_string(ctx: &mut Context, this: &Value, _args: &[Value]) -> EvalResult<Value> {
    match this {
        Value::Undefined => Ok(Value::Str(crate::estr::EStr::new("[object Undefined]"))),
        Value::Null => Ok(Value::Str(crate::estr::EStr::new("[object Null]"))),
        _ => {
            let handle = to_object(ctx, this)?;
            let tag = kind_tag(&ctx.pool.get(handle).kind);
            Ok(Value::Str(crate::estr::EStr::new(format!("[object {}]", tag))))
        }
    }
}

fn value_of(ctx: &mut Context, this: &Value, _args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Object(to_object(ctx, this)?))
}

fn has_own_property(ctx: &mut Context, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let handle = to_object(ctx, this)?;
    let name = arg(args, 0).to_string_primitive();
    let found = if let Some(index) = crate::key::KeyPool::as_element_index(name.as_str()) {
        ctx.pool.get(handle).get_element(index).is_some()
    } else {
        let key = ctx.keys.intern(name.as_str());
        ctx.pool.get(handle).get_own(key).is_some()
    };
    Ok(Value::Boolean(found))
}

fn is_prototype_of(ctx: &mut Context, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let Value::Object(candidate) = arg(args, 0) else { return Ok(Value::Boolean(false)) };
    let Value::Object(target) = this else { return Ok(Value::Boolean(false)) };
    let mut current = ctx.pool.get(candidate).prototype();
    while let Some(h) = current {
        if h == *target {
            return Ok(Value::Boolean(true));
        }
        current = ctx.pool.get(h).prototype();
    }
    Ok(Value::Boolean(false))
}

fn property_is_enumerable(ctx: &mut Context, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let handle = to_object(ctx, this)?;
    let name = arg(args, 0).to_string_primitive();
    let enumerable = if let Some(index) = crate::key::KeyPool::as_element_index(name.as_str()) {
        ctx.pool.get(handle).get_element(index).map_or(false, |p| p.flags.enumerable())
    } else {
        let key = ctx.keys.intern(name.as_str());
        ctx.pool.get(handle).get_own(key).map_or(false, |p| p.flags.enumerable())
    };
    Ok(Value::Boolean(enumerable))
}

fn constructor(ctx: &mut Context, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    match arg(args, 0) {
        Value::Undefined | Value::Null => {
            let object_proto = ctx.prototypes().object;
            Ok(Value::Object(ctx.pool.alloc(ObjectData::new(ObjectKind::Plain, Some(object_proto)))))
        }
        v => Ok(Value::Object(to_object(ctx, &v)?)),
    }
}

fn keys(ctx: &mut Context, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    let Value::Object(handle) = arg(args, 0) else {
        return Err(crate::interpreter::type_error("Object.keys called on non-object"));
    };
    let array_proto = ctx.prototypes().array;
    let result = ctx.pool.alloc(ObjectData::new(ObjectKind::Array, Some(array_proto)));
    let len = ctx.pool.get(handle).element_count();
    let mut index = 0u32;
    for i in 0..len {
        if ctx.pool.get(handle).get_element(i as u32).is_some() {
            ctx.pool.get_mut(result).set_element(index, Value::Str(crate::estr::EStr::new(i.to_string())), PropertyFlags::ALL);
            index += 1;
        }
    }
    let entries: Vec<crate::key::Key> = ctx
        .pool
        .get(handle)
        .own_entries()
        .filter(|(_, p)| p.flags.enumerable())
        .map(|(k, _)| k)
        .collect();
    for key in entries {
        let name = ctx.keys.text_of(key).to_string();
        ctx.pool.get_mut(result).set_element(index, Value::Str(crate::estr::EStr::new(name)), PropertyFlags::ALL);
        index += 1;
    }
    Ok(Value::Object(result))
}

fn get_prototype_of(ctx: &mut Context, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    let Value::Object(handle) = arg(args, 0) else {
        return Err(crate::interpreter::type_error("Object.getPrototypeOf called on non-object"));
    };
    Ok(ctx.pool.get(handle).prototype().map_or(Value::Null, Value::Object))
}

fn create(ctx: &mut Context, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    let proto = match arg(args, 0) {
        Value::Object(h) => Some(h),
        Value::Null => None,
        _ => return Err(crate::interpreter::type_error("Object.create prototype must be an object or null")),
    };
    Ok(Value::Object(ctx.pool.alloc(ObjectData::new(ObjectKind::Plain, proto))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Limits;

    fn new_context() -> Context {
        let mut ctx = Context::new(Limits::default());
        super::install(&mut ctx);
        ctx
    }

    #[test]
    fn object_to_string_reports_plain_tag() {
        let mut ctx = new_context();
        let proto = ctx.prototypes().object;
        let handle = ctx.pool.alloc(ObjectData::new(ObjectKind::Plain, Some(proto)));
        let result = to_string(&mut ctx, &Value::Object(handle), &[]).unwrap();
        assert_eq!(result.to_string_primitive().as_str(), "[object Object]");
    }

    #[test]
    fn has_own_property_checks_named_and_indexed_properties() {
        let mut ctx = new_context();
        let proto = ctx.prototypes().object;
        let handle = ctx.pool.alloc(ObjectData::new(ObjectKind::Plain, Some(proto)));
        let key = ctx.keys.intern("x");
        ctx.pool.get_mut(handle).set_own(key, Property::data(Value::Int(1), PropertyFlags::ALL));
        let result = has_own_property(&mut ctx, &Value::Object(handle), &[Value::Str(crate::estr::EStr::new("x"))]).unwrap();
        assert!(matches!(result, Value::Boolean(true)));
        let result = has_own_property(&mut ctx, &Value::Object(handle), &[Value::Str(crate::estr::EStr::new("y"))]).unwrap();
        assert!(matches!(result, Value::Boolean(false)));
    }
}
