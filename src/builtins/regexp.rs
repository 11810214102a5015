//! `RegExp` constructor and `RegExp.prototype`, grounded on
//! `original_source/src/builtin/regexp.c`'s `exec()`/`test()` shape: `exec`
//! returns an array whose elements are the whole match followed by each
//! capturing group (`undefined` for a group that didn't participate), with
//! `index`/`input` own properties; a global pattern advances `lastIndex`
//! across calls.

use super::{arg, define_constructor, define_native};
use crate::context::Context;
use crate::interpreter::{type_error, EvalResult};
use crate::object::{ObjectData, ObjectKind, Property, PropertyFlags, RegExpFlags};
use crate::pool::ObjectHandle;
use crate::regex::Program;
use crate::value::Value;
use std::rc::Rc;

pub fn install(ctx: &mut Context) {
    let prototype = ctx.prototypes().regexp;
    define_native(ctx, prototype, "exec", 1, exec);
    define_native(ctx, prototype, "test", 1, test);
    define_native(ctx, prototype, "toString", 0, to_string);
    define_constructor(ctx, "RegExp", 2, constructor, prototype);
}

fn parse_flags(text: &str) -> EvalResult<RegExpFlags> {
    let mut flags = RegExpFlags { global: false, ignore_case: false, multiline: false };
    for c in text.chars() {
        match c {
            'g' => flags.global = true,
            'i' => flags.ignore_case = true,
            'm' => flags.multiline = true,
            _ => return Err(crate::interpreter::reference_error(format!("invalid regular expression flag: {c}"))),
        }
    }
    Ok(flags)
}

/// Builds a `RegExp` object from a source pattern and flag string, used both
/// by the constructor and by `string.rs`'s `split`/`replace`/`match` when
/// handed a plain string pattern.
pub(crate) fn make_regexp(ctx: &mut Context, source: &str, flags_text: &str) -> EvalResult<ObjectHandle> {
    let program = Program::compile(source).map_err(|e| crate::interpreter::reference_error(format!("invalid regular expression: {}", e.message)))?;
    let flags = parse_flags(flags_text)?;
    let proto = ctx.prototypes().regexp;
    let handle = ctx.pool.alloc(ObjectData::new(ObjectKind::RegExpObject(Rc::new(program), crate::estr::EStr::new(source), flags), Some(proto)));
    let zero = ctx.keys.well_known().last_index;
    ctx.pool.get_mut(handle).set_own(zero, Property::data(Value::Int(0), PropertyFlags::new(PropertyFlags::WRITABLE)));
    Ok(handle)
}

fn constructor(ctx: &mut Context, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    match arg(args, 0) {
        Value::Object(h) if matches!(&ctx.pool.get(h).kind, ObjectKind::RegExpObject(..)) => {
            let ObjectKind::RegExpObject(_, source, flags) = ctx.pool.get(h).kind.clone() else { unreachable!() };
            let flags_text = flags_text(flags);
            Ok(Value::Object(make_regexp(ctx, source.as_str(), &flags_text)?))
        }
        other => {
            let source = match other {
                Value::Undefined => String::new(),
                v => v.to_string_primitive().as_str().to_string(),
            };
            let flags_text = match arg(args, 1) {
                Value::Undefined => String::new(),
                v => v.to_string_primitive().as_str().to_string(),
            };
            Ok(Value::Object(make_regexp(ctx, &source, &flags_text)?))
        }
    }
}

fn flags_text(flags: RegExpFlags) -> String {
    let mut s = String::new();
    if flags.global {
        s.push('g');
    }
    if flags.ignore_case {
        s.push('i');
    }
    if flags.multiline {
        s.push('m');
    }
    s
}

fn regexp_parts(ctx: &Context, handle: ObjectHandle) -> EvalResult<(Rc<Program>, RegExpFlags)> {
    match &ctx.pool.get(handle).kind {
        ObjectKind::RegExpObject(program, _, flags) => Ok((program.clone(), *flags)),
        _ => Err(type_error("RegExp.prototype method called on a non-RegExp value")),
    }
}

fn last_index(ctx: &mut Context, handle: ObjectHandle) -> usize {
    let key = ctx.keys.well_known().last_index;
    ctx.pool.get(handle).get_own(key).and_then(|p| p.as_value().cloned()).map_or(0, |v| v.to_number_primitive().max(0.0) as usize)
}

fn set_last_index(ctx: &mut Context, handle: ObjectHandle, value: usize) {
    let key = ctx.keys.well_known().last_index;
    ctx.pool.get_mut(handle).set_own(key, Property::data(Value::Int(value as i32), PropertyFlags::new(PropertyFlags::WRITABLE)));
}

/// Runs `exec` against `text`, returning the match array (or `Value::Null`)
/// exactly as `RegExp.prototype.exec` would, including the `lastIndex`
/// side effect for global patterns.
pub(crate) fn exec_on(ctx: &mut Context, handle: ObjectHandle, text: &str) -> EvalResult<Value> {
    let (program, flags) = regexp_parts(ctx, handle)?;
    let start = if flags.global { last_index(ctx, handle) } else { 0 };
    let chars: Vec<char> = text.chars().collect();
    if start > chars.len() {
        if flags.global {
            set_last_index(ctx, handle, 0);
        }
        return Ok(Value::Null);
    }
    match program.exec(text, start, flags.ignore_case, flags.multiline) {
        None => {
            if flags.global {
                set_last_index(ctx, handle, 0);
            }
            Ok(Value::Null)
        }
        Some(m) => {
            if flags.global {
                set_last_index(ctx, handle, m.end.max(m.start + 1));
            }
            let array_proto = ctx.prototypes().array;
            let result = ctx.pool.alloc(ObjectData::new(ObjectKind::Array, Some(array_proto)));
            let whole: String = chars[m.start..m.end].iter().collect();
            ctx.pool.get_mut(result).set_element(0, Value::Str(crate::estr::EStr::new(whole)), PropertyFlags::ALL);
            for (i, group) in m.groups.iter().enumerate() {
                let value = match group {
                    Some((s, e)) => Value::Str(crate::estr::EStr::new(chars[*s..*e].iter().collect::<String>())),
                    None => Value::Undefined,
                };
                ctx.pool.get_mut(result).set_element((i + 1) as u32, value, PropertyFlags::ALL);
            }
            let index_key = ctx.keys.well_known().index;
            ctx.pool.get_mut(result).set_own(index_key, Property::data(Value::Int(m.start as i32), PropertyFlags::ALL));
            let input_key = ctx.keys.intern("input");
            ctx.pool.get_mut(result).set_own(input_key, Property::data(Value::Str(crate::estr::EStr::new(text)), PropertyFlags::ALL));
            Ok(Value::Object(result))
        }
    }
}

fn exec(ctx: &mut Context, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let Value::Object(handle) = this else { return Err(type_error("RegExp.prototype.exec called on a non-object value")) };
    let text = arg(args, 0).to_string_primitive().as_str().to_string();
    exec_on(ctx, *handle, &text)
}

fn test(ctx: &mut Context, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let result = exec(ctx, this, args)?;
    Ok(Value::Boolean(!matches!(result, Value::Null)))
}

fn to_string(ctx: &mut Context, this: &Value, _args: &[Value]) -> EvalResult<Value> {
    let Value::Object(handle) = this else { return Err(type_error("RegExp.prototype.toString called on a non-object value")) };
    let ObjectKind::RegExpObject(_, source, flags) = ctx.pool.get(*handle).kind.clone() else {
        return Err(type_error("RegExp.prototype.toString called on a non-RegExp value"));
    };
    Ok(Value::Str(crate::estr::EStr::new(format!("/{}/{}", source.as_str(), flags_text(flags)))))
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
    fn exec_reports_index_and_groups() {
        let mut ctx = new_context();
        let handle = make_regexp(&mut ctx, r"(\d+)-(\d+)", "").unwrap();
        let result = exec_on(&mut ctx, handle, "room 12-34 ok").unwrap();
        let Value::Object(array) = result else { panic!("expected match array") };
        assert_eq!(at_str(&ctx, array, 0), "12-34");
        assert_eq!(at_str(&ctx, array, 1), "12");
        assert_eq!(at_str(&ctx, array, 2), "34");
    }

    #[test]
    fn global_flag_advances_last_index_across_calls() {
        let mut ctx = new_context();
        let handle = make_regexp(&mut ctx, "a", "g").unwrap();
        let first = exec_on(&mut ctx, handle, "aaa").unwrap();
        assert!(matches!(first, Value::Object(_)));
        let idx_key = ctx.keys.well_known().last_index;
        let last_index = ctx.pool.get(handle).get_own(idx_key).unwrap().as_value().unwrap().to_number_primitive();
        assert_eq!(last_index, 1.0);
    }

    fn at_str(ctx: &Context, handle: ObjectHandle, i: u32) -> String {
        ctx.pool.get(handle).get_element(i).and_then(|p| p.as_value().cloned()).unwrap().to_string_primitive().as_str().to_string()
    }
}
