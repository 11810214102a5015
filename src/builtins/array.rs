//! `Array` constructor and `Array.prototype`. Grounded on
//! `original_source/src/builtin/array.c`'s registration table for
//! `push`/`pop`/`shift`/`unshift`/`slice`/`splice`/`concat`/`join`/`reverse`/
//! `indexOf`/`lastIndexOf`/`sort` (the last delegates to [`crate::sort`]);
//! `forEach`/`map`/`filter`/`reduce`/`some`/`every` aren't in the retrieved
//! source slice and are documented here as a standard-ES5 supplement.

use super::{arg, define_constructor, define_native};
use crate::context::Context;
use crate::interpreter::{call_function_value, to_primitive, type_error, EvalResult};
use crate::object::{ObjectData, ObjectKind, PropertyFlags};
use crate::pool::ObjectHandle;
use crate::value::Value;

pub fn install(ctx: &mut Context) {
    let prototype = ctx.prototypes().array;
    define_native(ctx, prototype, "push", 1, push);
    define_native(ctx, prototype, "pop", 0, pop);
    define_native(ctx, prototype, "shift", 0, shift);
    define_native(ctx, prototype, "unshift", 1, unshift);
    define_native(ctx, prototype, "slice", 2, slice);
    define_native(ctx, prototype, "splice", 2, splice);
    define_native(ctx, prototype, "concat", 1, concat);
    define_native(ctx, prototype, "join", 1, join);
    define_native(ctx, prototype, "reverse", 0, reverse);
    define_native(ctx, prototype, "indexOf", 1, index_of);
    define_native(ctx, prototype, "lastIndexOf", 1, last_index_of);
    define_native(ctx, prototype, "forEach", 1, for_each);
    define_native(ctx, prototype, "map", 1, map);
    define_native(ctx, prototype, "filter", 1, filter);
    define_native(ctx, prototype, "reduce", 1, reduce);
    define_native(ctx, prototype, "some", 1, some);
    define_native(ctx, prototype, "every", 1, every);
    define_native(ctx, prototype, "sort", 1, sort);
    define_native(ctx, prototype, "toString", 0, to_string);
    define_native(ctx, prototype, "toLocaleString", 0, to_string);

    let ctor = define_constructor(ctx, "Array", 1, constructor, prototype);
    define_native(ctx, ctor, "isArray", 1, is_array);
}

fn array_handle(this: &Value) -> EvalResult<ObjectHandle> {
    match this {
        Value::Object(h) => Ok(*h),
        _ => Err(type_error("Array.prototype method called on a non-object value")),
    }
}

fn new_array(ctx: &mut Context) -> ObjectHandle {
    let proto = ctx.prototypes().array;
    ctx.pool.alloc(ObjectData::new(ObjectKind::Array, Some(proto)))
}

fn length_of(ctx: &Context, handle: ObjectHandle) -> u32 {
    ctx.pool.get(handle).element_count() as u32
}

fn at(ctx: &Context, handle: ObjectHandle, index: u32) -> Value {
    ctx.pool.get(handle).get_element(index).and_then(|p| p.as_value().cloned()).unwrap_or(Value::Undefined)
}

/// Clamps a relative start/end argument (may be negative, meaning "from the
/// end") into `[0, length]`, per `Array.prototype.slice`/`splice`'s shared
/// index-normalization rule.
fn clamp_index(value: Value, length: u32) -> u32 {
    if matches!(value, Value::Undefined) {
        return length;
    }
    let n = value.to_number_primitive();
    if n.is_nan() {
        return 0;
    }
    let len = length as f64;
    let relative = if n < 0.0 { (len + n).max(0.0) } else { n.min(len) };
    relative as u32
}

fn constructor(ctx: &mut Context, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    let handle = new_array(ctx);
    if args.len() == 1 {
        if let Value::Int(_) | Value::Number(_) = args[0] {
            let n = args[0].to_number_primitive();
            if n < 0.0 || n.fract() != 0.0 || n > u32::MAX as f64 {
                return Err(crate::interpreter::reference_error("Invalid array length"));
            }
            ctx.pool.get_mut(handle).resize_elements(n as usize);
            return Ok(Value::Object(handle));
        }
    }
    for (i, value) in args.iter().enumerate() {
        ctx.pool.get_mut(handle).set_element(i as u32, value.clone(), PropertyFlags::ALL);
    }
    Ok(Value::Object(handle))
}

fn is_array(ctx: &mut Context, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    let is_array = matches!(arg(args, 0), Value::Object(h) if matches!(ctx.pool.get(h).kind, ObjectKind::Array));
    Ok(Value::Boolean(is_array))
}

fn push(ctx: &mut Context, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let handle = array_handle(this)?;
    for value in args {
        ctx.pool.get_mut(handle).push_element(value.clone());
    }
    Ok(Value::Int(length_of(ctx, handle) as i32))
}

fn pop(ctx: &mut Context, this: &Value, _args: &[Value]) -> EvalResult<Value> {
    let handle = array_handle(this)?;
    let len = length_of(ctx, handle);
    if len == 0 {
        return Ok(Value::Undefined);
    }
    let value = at(ctx, handle, len - 1);
    ctx.pool.get_mut(handle).resize_elements((len - 1) as usize);
    Ok(value)
}

fn shift(ctx: &mut Context, this: &Value, _args: &[Value]) -> EvalResult<Value> {
    let handle = array_handle(this)?;
    let len = length_of(ctx, handle);
    if len == 0 {
        return Ok(Value::Undefined);
    }
    let first = at(ctx, handle, 0);
    for i in 1..len {
        let v = at(ctx, handle, i);
        ctx.pool.get_mut(handle).set_element(i - 1, v, PropertyFlags::ALL);
    }
    ctx.pool.get_mut(handle).resize_elements((len - 1) as usize);
    Ok(first)
}

fn unshift(ctx: &mut Context, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let handle = array_handle(this)?;
    let len = length_of(ctx, handle);
    let shift_by = args.len() as u32;
    ctx.pool.get_mut(handle).resize_elements((len + shift_by) as usize);
    for i in (0..len).rev() {
        let v = at(ctx, handle, i);
        ctx.pool.get_mut(handle).set_element(i + shift_by, v, PropertyFlags::ALL);
    }
    for (i, value) in args.iter().enumerate() {
        ctx.pool.get_mut(handle).set_element(i as u32, value.clone(), PropertyFlags::ALL);
    }
    Ok(Value::Int(length_of(ctx, handle) as i32))
}

fn slice(ctx: &mut Context, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let handle = array_handle(this)?;
    let len = length_of(ctx, handle);
    let start = clamp_index(arg(args, 0), len);
    let end = clamp_index(arg(args, 1), len).max(start);
    let result = new_array(ctx);
    for (out, i) in (start..end).enumerate() {
        let v = at(ctx, handle, i);
        ctx.pool.get_mut(result).set_element(out as u32, v, PropertyFlags::ALL);
    }
    Ok(Value::Object(result))
}

fn splice(ctx: &mut Context, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let handle = array_handle(this)?;
    let len = length_of(ctx, handle);
    let start = clamp_index(arg(args, 0), len);
    let delete_count = match args.get(1) {
        Some(v) => (v.to_number_primitive().max(0.0) as u32).min(len - start),
        None => len - start,
    };
    let items: Vec<Value> = args.get(2..).unwrap_or(&[]).to_vec();

    let removed = new_array(ctx);
    for (out, i) in (start..start + delete_count).enumerate() {
        let v = at(ctx, handle, i);
        ctx.pool.get_mut(removed).set_element(out as u32, v, PropertyFlags::ALL);
    }

    let tail: Vec<Value> = (start + delete_count..len).map(|i| at(ctx, handle, i)).collect();
    let new_len = start + items.len() as u32 + tail.len() as u32;
    ctx.pool.get_mut(handle).resize_elements(new_len as usize);
    for (i, value) in items.iter().enumerate() {
        ctx.pool.get_mut(handle).set_element(start + i as u32, value.clone(), PropertyFlags::ALL);
    }
    for (i, value) in tail.into_iter().enumerate() {
        ctx.pool.get_mut(handle).set_element(start + items.len() as u32 + i as u32, value, PropertyFlags::ALL);
    }
    Ok(Value::Object(removed))
}

fn concat(ctx: &mut Context, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let handle = array_handle(this)?;
    let result = new_array(ctx);
    let mut out = 0u32;
    let mut append_all = |ctx: &mut Context, source: ObjectHandle, out: &mut u32| {
        let len = length_of(ctx, source);
        for i in 0..len {
            let v = at(ctx, source, i);
            ctx.pool.get_mut(result).set_element(*out, v, PropertyFlags::ALL);
            *out += 1;
        }
    };
    append_all(ctx, handle, &mut out);
    for value in args {
        match value {
            Value::Object(h) if matches!(ctx.pool.get(*h).kind, ObjectKind::Array) => append_all(ctx, *h, &mut out),
            other => {
                ctx.pool.get_mut(result).set_element(out, other.clone(), PropertyFlags::ALL);
                out += 1;
            }
        }
    }
    Ok(Value::Object(result))
}

fn join(ctx: &mut Context, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let handle = array_handle(this)?;
    let separator = match arg(args, 0) {
        Value::Undefined => ",".to_string(),
        v => v.to_string_primitive().as_str().to_string(),
    };
    let len = length_of(ctx, handle);
    let mut parts = Vec::with_capacity(len as usize);
    for i in 0..len {
        let v = at(ctx, handle, i);
        let piece = match v {
            Value::Undefined | Value::Null => String::new(),
            other => to_primitive(ctx, &other, true)?.to_string_primitive().as_str().to_string(),
        };
        parts.push(piece);
    }
    Ok(Value::Str(crate::estr::EStr::new(parts.join(&separator))))
}

fn reverse(ctx: &mut Context, this: &Value, _args: &[Value]) -> EvalResult<Value> {
    let handle = array_handle(this)?;
    let len = length_of(ctx, handle);
    for i in 0..len / 2 {
        let a = at(ctx, handle, i);
        let b = at(ctx, handle, len - 1 - i);
        ctx.pool.get_mut(handle).set_element(i, b, PropertyFlags::ALL);
        ctx.pool.get_mut(handle).set_element(len - 1 - i, a, PropertyFlags::ALL);
    }
    Ok(Value::Object(handle))
}

fn index_of(ctx: &mut Context, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let handle = array_handle(this)?;
    let target = arg(args, 0);
    let len = length_of(ctx, handle);
    let start = match args.get(1) {
        Some(v) => clamp_index(v.clone(), len),
        None => 0,
    };
    for i in start..len {
        if crate::value::strict_equals(&at(ctx, handle, i), &target) {
            return Ok(Value::Int(i as i32));
        }
    }
    Ok(Value::Int(-1))
}

fn last_index_of(ctx: &mut Context, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let handle = array_handle(this)?;
    let target = arg(args, 0);
    let len = length_of(ctx, handle);
    for i in (0..len).rev() {
        if crate::value::strict_equals(&at(ctx, handle, i), &target) {
            return Ok(Value::Int(i as i32));
        }
    }
    Ok(Value::Int(-1))
}

fn callback_arg(args: &[Value]) -> EvalResult<ObjectHandle> {
    match arg(args, 0) {
        Value::Object(h) => Ok(h),
        _ => Err(type_error("callback must be a function")),
    }
}

fn for_each(ctx: &mut Context, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let handle = array_handle(this)?;
    let callback = callback_arg(args)?;
    let this_arg = arg(args, 1);
    let len = length_of(ctx, handle);
    for i in 0..len {
        let v = at(ctx, handle, i);
        call_function_value(ctx, callback, this_arg.clone(), &[v, Value::Int(i as i32), Value::Object(handle)])?;
    }
    Ok(Value::Undefined)
}

fn map(ctx: &mut Context, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let handle = array_handle(this)?;
    let callback = callback_arg(args)?;
    let this_arg = arg(args, 1);
    let len = length_of(ctx, handle);
    let result = new_array(ctx);
    for i in 0..len {
        let v = at(ctx, handle, i);
        let mapped = call_function_value(ctx, callback, this_arg.clone(), &[v, Value::Int(i as i32), Value::Object(handle)])?;
        ctx.pool.get_mut(result).set_element(i, mapped, PropertyFlags::ALL);
    }
    Ok(Value::Object(result))
}

fn filter(ctx: &mut Context, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let handle = array_handle(this)?;
    let callback = callback_arg(args)?;
    let this_arg = arg(args, 1);
    let len = length_of(ctx, handle);
    let result = new_array(ctx);
    let mut out = 0u32;
    for i in 0..len {
        let v = at(ctx, handle, i);
        let keep = call_function_value(ctx, callback, this_arg.clone(), &[v.clone(), Value::Int(i as i32), Value::Object(handle)])?;
        if keep.to_boolean() {
            ctx.pool.get_mut(result).set_element(out, v, PropertyFlags::ALL);
            out += 1;
        }
    }
    Ok(Value::Object(result))
}

fn reduce(ctx: &mut Context, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let handle = array_handle(this)?;
    let callback = callback_arg(args)?;
    let len = length_of(ctx, handle);
    let mut index = 0u32;
    let mut accumulator = match args.get(1) {
        Some(v) => v.clone(),
        None => {
            if len == 0 {
                return Err(type_error("Reduce of empty array with no initial value"));
            }
            let first = at(ctx, handle, 0);
            index = 1;
            first
        }
    };
    while index < len {
        let v = at(ctx, handle, index);
        accumulator = call_function_value(ctx, callback, Value::Undefined, &[accumulator, v, Value::Int(index as i32), Value::Object(handle)])?;
        index += 1;
    }
    Ok(accumulator)
}

fn some(ctx: &mut Context, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let handle = array_handle(this)?;
    let callback = callback_arg(args)?;
    let this_arg = arg(args, 1);
    let len = length_of(ctx, handle);
    for i in 0..len {
        let v = at(ctx, handle, i);
        let result = call_function_value(ctx, callback, this_arg.clone(), &[v, Value::Int(i as i32), Value::Object(handle)])?;
        if result.to_boolean() {
            return Ok(Value::Boolean(true));
        }
    }
    Ok(Value::Boolean(false))
}

fn every(ctx: &mut Context, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let handle = array_handle(this)?;
    let callback = callback_arg(args)?;
    let this_arg = arg(args, 1);
    let len = length_of(ctx, handle);
    for i in 0..len {
        let v = at(ctx, handle, i);
        let result = call_function_value(ctx, callback, this_arg.clone(), &[v, Value::Int(i as i32), Value::Object(handle)])?;
        if !result.to_boolean() {
            return Ok(Value::Boolean(false));
        }
    }
    Ok(Value::Boolean(true))
}

fn sort(ctx: &mut Context, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let handle = array_handle(this)?;
    let comparator = match arg(args, 0) {
        Value::Undefined => None,
        Value::Object(h) => Some(h),
        _ => return Err(type_error("Array.prototype.sort comparator must be a function")),
    };
    let len = length_of(ctx, handle);
    crate::sort::sort_in_place(ctx, handle, len, comparator)?;
    Ok(Value::Object(handle))
}

fn to_string(ctx: &mut Context, this: &Value, _args: &[Value]) -> EvalResult<Value> {
    join(ctx, this, &[])
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

    fn array_of(ctx: &mut Context, values: &[i32]) -> Value {
        let handle = new_array(ctx);
        for (i, &v) in values.iter().enumerate() {
            ctx.pool.get_mut(handle).set_element(i as u32, Value::Int(v), PropertyFlags::ALL);
        }
        Value::Object(handle)
    }

    #[test]
    fn push_and_pop_roundtrip() {
        let mut ctx = new_context();
        let arr = array_of(&mut ctx, &[1, 2]);
        let new_len = push(&mut ctx, &arr, &[Value::Int(3)]).unwrap();
        assert_eq!(new_len.to_number_primitive(), 3.0);
        let popped = pop(&mut ctx, &arr, &[]).unwrap();
        assert_eq!(popped.to_number_primitive(), 3.0);
    }

    #[test]
    fn splice_removes_and_inserts() {
        let mut ctx = new_context();
        let arr = array_of(&mut ctx, &[1, 2, 3, 4, 5]);
        let removed = splice(&mut ctx, &arr, &[Value::Int(1), Value::Int(2), Value::Int(9)]).unwrap();
        let Value::Object(removed_handle) = removed else { panic!() };
        assert_eq!(length_of(&ctx, removed_handle), 2);
        let Value::Object(handle) = arr else { panic!() };
        assert_eq!(length_of(&ctx, handle), 4);
        assert_eq!(at(&ctx, handle, 1).to_number_primitive(), 9.0);
    }

    #[test]
    fn join_uses_comma_default_and_skips_nullish() {
        let mut ctx = new_context();
        let handle = new_array(&mut ctx);
        ctx.pool.get_mut(handle).set_element(0, Value::Int(1), PropertyFlags::ALL);
        ctx.pool.get_mut(handle).set_element(1, Value::Undefined, PropertyFlags::ALL);
        ctx.pool.get_mut(handle).set_element(2, Value::Int(3), PropertyFlags::ALL);
        let result = join(&mut ctx, &Value::Object(handle), &[]).unwrap();
        assert_eq!(result.to_string_primitive().as_str(), "1,,3");
    }

    #[test]
    fn index_of_finds_strict_match() {
        let mut ctx = new_context();
        let arr = array_of(&mut ctx, &[1, 2, 3]);
        let found = index_of(&mut ctx, &arr, &[Value::Int(2)]).unwrap();
        assert_eq!(found.to_number_primitive(), 1.0);
        let missing = index_of(&mut ctx, &arr, &[Value::Int(9)]).unwrap();
        assert_eq!(missing.to_number_primitive(), -1.0);
    }
}
