//! Global object surface: constructors, prototypes, and native methods.
//!
//! Grounded on `original_source/src/builtin/*.c` and `object/*.c`'s
//! `Function.addToObject`/`Function.addMethod` tables — each submodule owns
//! one type's native method table; [`install`] wires every prototype,
//! constructor, and the free-standing `Math`/`JSON` namespace objects onto
//! the global object, in the same single-bootstrap-pass shape
//! `object/*.c`'s per-type `setup()` functions are called from.
//!
//! Hand-written native-fn tables rather than a declarative macro surface is
//! itself a deliberate choice away from the teacher's `rhai_codegen`
//! (`#[export_module]`) — see DESIGN.md's "Dependency stack" section.

pub mod array;
pub mod boolean;
pub mod date;
pub mod error;
pub mod function;
pub mod global;
pub mod json;
pub mod math;
pub mod number;
pub mod object;
pub mod regexp;
pub mod string;

use crate::context::{Context, Prototypes};
use crate::interpreter::EvalResult;
use crate::object::{NativeFn, NativeFunctionData, ObjectData, ObjectKind, Property, PropertyFlags};
use crate::pool::ObjectHandle;
use crate::value::Value;
use std::rc::Rc;

/// Installs every builtin prototype, constructor, and namespace object,
/// wires `Context::set_prototypes`, and returns the global object handle
/// (already `ctx.global_object`, returned for the caller's convenience).
/// Called exactly once by `engine.rs` during bootstrap.
pub fn install(ctx: &mut Context) -> ObjectHandle {
    let object_proto = ctx.pool.alloc(ObjectData::new(ObjectKind::Plain, None));
    let function_proto = ctx.pool.alloc(ObjectData::new(ObjectKind::Native(Rc::new(NativeFunctionData { name: "", arity: 0, func: no_op })), Some(object_proto)));
    let array_proto = ctx.pool.alloc(ObjectData::new(ObjectKind::Array, Some(object_proto)));
    let string_proto = ctx.pool.alloc(ObjectData::new(ObjectKind::StringObject(crate::estr::EStr::new("")), Some(object_proto)));
    let number_proto = ctx.pool.alloc(ObjectData::new(ObjectKind::NumberObject(0.0), Some(object_proto)));
    let boolean_proto = ctx.pool.alloc(ObjectData::new(ObjectKind::BooleanObject(false), Some(object_proto)));
    let error_proto = ctx.pool.alloc(ObjectData::new(ObjectKind::Plain, Some(object_proto)));
    let regexp_proto = ctx.pool.alloc(ObjectData::new(ObjectKind::Plain, Some(object_proto)));
    let date_proto = ctx.pool.alloc(ObjectData::new(ObjectKind::Plain, Some(object_proto)));

    ctx.set_prototypes(Prototypes {
        object: object_proto,
        function: function_proto,
        array: array_proto,
        string: string_proto,
        number: number_proto,
        boolean: boolean_proto,
        error: error_proto,
        regexp: regexp_proto,
        date: date_proto,
    });

    object::install(ctx);
    function::install(ctx);
    array::install(ctx);
    string::install(ctx);
    number::install(ctx);
    boolean::install(ctx);
    error::install(ctx);
    date::install(ctx);
    regexp::install(ctx);
    math::install(ctx);
    json::install(ctx);
    global::install(ctx);

    let global = ctx.global_object;
    define_value(ctx, global, "NaN", Value::Number(f64::NAN));
    define_value(ctx, global, "Infinity", Value::Number(f64::INFINITY));
    define_value(ctx, global, "undefined", Value::Undefined);
    global
}

fn no_op(_ctx: &mut Context, _this: &Value, _args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Undefined)
}

/// Defines a non-enumerable native method, matching `Function.addToObject`
/// (built-in methods are writable/configurable but never show up in
/// `for...in`).
pub(crate) fn define_native(ctx: &mut Context, target: ObjectHandle, name: &'static str, arity: u32, func: NativeFn) {
    let function_proto = ctx.prototypes().function;
    let data = Rc::new(NativeFunctionData { name, arity, func });
    let handle = ctx.pool.alloc(ObjectData::new(ObjectKind::Native(data), Some(function_proto)));
    let key = ctx.keys.intern(name);
    let flags = PropertyFlags::new(PropertyFlags::WRITABLE | PropertyFlags::CONFIGURABLE);
    ctx.pool.get_mut(target).set_own(key, Property::data(Value::Object(handle), flags));
}

/// Defines a plain non-enumerable data property (a constant, or a
/// constructor's `.prototype` link).
pub(crate) fn define_value(ctx: &mut Context, target: ObjectHandle, name: &str, value: Value) {
    let key = ctx.keys.intern(name);
    ctx.pool.get_mut(target).set_own(key, Property::data(value, PropertyFlags::NONE.with_writable(true).with_configurable(true)));
}

/// Builds a callable native "constructor" object (used both as `new Foo()`
/// and a bare `Foo()` coercion call) wired to `prototype`, registers it on
/// the global object under `name`, and returns its handle so the caller can
/// hang static methods off it.
pub(crate) fn define_constructor(ctx: &mut Context, name: &'static str, arity: u32, func: NativeFn, prototype: ObjectHandle) -> ObjectHandle {
    let function_proto = ctx.prototypes().function;
    let data = Rc::new(NativeFunctionData { name, arity, func });
    let ctor = ctx.pool.alloc(ObjectData::new(ObjectKind::Native(data), Some(function_proto)));
    define_value(ctx, ctor, "prototype", Value::Object(prototype));
    let prototype_key = ctx.keys.well_known().constructor;
    ctx.pool.get_mut(prototype).set_own(prototype_key, Property::data(Value::Object(ctor), PropertyFlags::new(PropertyFlags::WRITABLE | PropertyFlags::CONFIGURABLE)));
    let global = ctx.global_object;
    define_value(ctx, global, name, Value::Object(ctor));
    ctor
}

/// A plain namespace object (`Math`, `JSON`) registered on the global
/// object: never callable, just a bag of native static methods.
pub(crate) fn define_namespace(ctx: &mut Context, name: &str) -> ObjectHandle {
    let object_proto = ctx.prototypes().object;
    let handle = ctx.pool.alloc(ObjectData::new(ObjectKind::Plain, Some(object_proto)));
    let global = ctx.global_object;
    define_value(ctx, global, name, Value::Object(handle));
    handle
}

#[must_use]
pub(crate) fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Undefined)
}
