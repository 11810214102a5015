//! `Function.prototype`: `call`, `apply`, `bind`, `toString`. Grounded on
//! `original_source/src/object/function.h`'s descriptor shape; `call.c`/
//! `apply.c`/`bind.c` weren't in the retrieved slice, so these three follow
//! plain ES5 `Function.prototype` semantics instead of a literal port.

use super::{arg, define_native};
use crate::context::Context;
use crate::interpreter::{call_function_value, to_object, type_error, EvalResult};
use crate::object::{BoundData, ObjectData, ObjectKind};
use crate::value::Value;
use std::rc::Rc;

pub fn install(ctx: &mut Context) {
    let prototype = ctx.prototypes().function;
    define_native(ctx, prototype, "call", 1, call);
    define_native(ctx, prototype, "apply", 2, apply);
    define_native(ctx, prototype, "bind", 1, bind);
    define_native(ctx, prototype, "toString", 0, to_string);
}

fn callee_handle(this: &Value) -> EvalResult<crate::pool::ObjectHandle> {
    match this {
        Value::Object(h) => Ok(*h),
        _ => Err(type_error("Function.prototype method called on a non-function value")),
    }
}

fn call(ctx: &mut Context, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let handle = callee_handle(this)?;
    let bound_this = arg(args, 0);
    call_function_value(ctx, handle, bound_this, args.get(1..).unwrap_or(&[]))
}

fn apply(ctx: &mut Context, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let handle = callee_handle(this)?;
    let bound_this = arg(args, 0);
    let spread = match arg(args, 1) {
        Value::Undefined | Value::Null => Vec::new(),
        Value::Object(arr) => {
            let len = ctx.pool.get(arr).element_count();
            (0..len as u32).map(|i| ctx.pool.get(arr).get_element(i).and_then(|p| p.as_value().cloned()).unwrap_or(Value::Undefined)).collect()
        }
        _ => return Err(type_error("Function.prototype.apply argument list must be an array or undefined/null")),
    };
    call_function_value(ctx, handle, bound_this, &spread)
}

/// Returns the ES5 bound-function exotic object (`ObjectKind::Bound`):
/// calling it forwards to `target` with `bound_this` and the at-bind-time
/// arguments prepended to whatever the call site supplies.
fn bind(ctx: &mut Context, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let target = callee_handle(this)?;
    let bound_this = arg(args, 0);
    let preset: Vec<Value> = args.get(1..).unwrap_or(&[]).to_vec();
    let function_proto = ctx.prototypes().function;
    let data = Rc::new(BoundData { target, bound_this, preset });
    Ok(Value::Object(ctx.pool.alloc(ObjectData::new(ObjectKind::Bound(data), Some(function_proto)))))
}

fn to_string(ctx: &mut Context, this: &Value, _args: &[Value]) -> EvalResult<Value> {
    let handle = to_object(ctx, this)?;
    let name = match &ctx.pool.get(handle).kind {
        ObjectKind::Function(f) => f.name.as_ref().map(|n| n.as_str().to_string()).unwrap_or_default(),
        ObjectKind::Native(n) => n.name.to_string(),
        ObjectKind::Bound(_) => "bound".to_string(),
        _ => return Err(type_error("Function.prototype.toString called on a non-function value")),
    };
    Ok(Value::Str(crate::estr::EStr::new(format!("function {}() {{ [native code] }}", name))))
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
    fn bound_function_prepends_preset_arguments() {
        let mut ctx = new_context();
        fn add(_ctx: &mut Context, _this: &Value, args: &[Value]) -> EvalResult<Value> {
            let a = args.first().cloned().unwrap_or(Value::Undefined).to_number_primitive();
            let b = args.get(1).cloned().unwrap_or(Value::Undefined).to_number_primitive();
            Ok(Value::Number(a + b))
        }
        let function_proto = ctx.prototypes().function;
        let native = Rc::new(crate::object::NativeFunctionData { name: "add", arity: 2, func: add });
        let handle = ctx.pool.alloc(ObjectData::new(ObjectKind::Native(native), Some(function_proto)));
        let bound = bind(&mut ctx, &Value::Object(handle), &[Value::Undefined, Value::Int(10)]).unwrap();
        let Value::Object(bound_handle) = bound else { panic!("expected bound function object") };
        let result = call_function_value(&mut ctx, bound_handle, Value::Undefined, &[Value::Int(5)]).unwrap();
        assert_eq!(result.to_number_primitive(), 15.0);
    }
}
