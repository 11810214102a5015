//! `String` constructor and `String.prototype`. Grounded on
//! `original_source/src/object/string.c` for `charAt`/`charCodeAt`/`concat`/
//! `indexOf`/`lastIndexOf`/`slice`/`substring`/`toString`/`valueOf`/the
//! constructor/`fromCharCode`; `toUpperCase`/`toLowerCase`/`trim`/`split`/
//! `replace`/`match`/`repeat` aren't in that file and are ES5-standard
//! supplements, the regex-aware ones built on `builtins::regexp`.
//!
//! The original indexes strings by UTF-8 byte offset, walking continuation
//! bytes by hand in `positionIndex`/`indexPosition` to land on character
//! boundaries. This port indexes by Rust `char` instead — collecting each
//! operand into `Vec<char>` once per call — since `EStr` makes no promise
//! about the source's byte encoding being externally meaningful, and the
//! character-granularity behavior is what ES5's `String.prototype` actually
//! specifies (`CharAt`/`substring` operate on UTF-16 code units, which this
//! engine's `char`-based model approximates directly rather than replicating
//! either source's byte arithmetic).

use super::{arg, define_constructor, define_native};
use crate::context::Context;
use crate::estr::EStr;
use crate::interpreter::{to_primitive, EvalResult};
use crate::object::{ObjectData, ObjectKind, PropertyFlags};
use crate::value::Value;

pub fn install(ctx: &mut Context) {
    let prototype = ctx.prototypes().string;
    define_native(ctx, prototype, "toString", 0, to_string);
    define_native(ctx, prototype, "valueOf", 0, to_string);
    define_native(ctx, prototype, "charAt", 1, char_at);
    define_native(ctx, prototype, "charCodeAt", 1, char_code_at);
    define_native(ctx, prototype, "concat", 1, concat);
    define_native(ctx, prototype, "indexOf", 1, index_of);
    define_native(ctx, prototype, "lastIndexOf", 1, last_index_of);
    define_native(ctx, prototype, "slice", 2, slice);
    define_native(ctx, prototype, "substring", 2, substring);
    define_native(ctx, prototype, "toUpperCase", 0, to_upper_case);
    define_native(ctx, prototype, "toLowerCase", 0, to_lower_case);
    define_native(ctx, prototype, "trim", 0, trim);
    define_native(ctx, prototype, "repeat", 1, repeat);
    define_native(ctx, prototype, "split", 2, split);
    define_native(ctx, prototype, "replace", 2, replace);
    define_native(ctx, prototype, "match", 1, string_match);

    let ctor = define_constructor(ctx, "String", 1, constructor, prototype);
    define_native(ctx, ctor, "fromCharCode", 1, from_char_code);
}

fn this_text(ctx: &mut Context, this: &Value) -> EvalResult<EStr> {
    match this {
        Value::Str(s) => Ok(s.clone()),
        Value::Object(h) => match &ctx.pool.get(*h).kind {
            ObjectKind::StringObject(s) => Ok(s.clone()),
            _ => Ok(to_primitive(ctx, this, true)?.to_string_primitive()),
        },
        _ => Ok(this.to_string_primitive()),
    }
}

/// Clamps an ES5 relative index argument into `[0, length]` (`slice`'s rule:
/// negative means "from the end").
fn clamp_relative(value: Value, length: usize) -> usize {
    if matches!(value, Value::Undefined) {
        return length;
    }
    let n = value.to_number_primitive();
    if n.is_nan() {
        return 0;
    }
    let len = length as f64;
    (if n < 0.0 { (len + n).max(0.0) } else { n.min(len) }) as usize
}

/// Clamps an ES5 absolute index argument into `[0, length]` (`substring`'s
/// rule: negative and NaN both mean 0, no reflection from the end).
fn clamp_absolute(value: Value, length: usize) -> usize {
    if matches!(value, Value::Undefined) {
        return length;
    }
    let n = value.to_number_primitive();
    if n.is_nan() || n < 0.0 {
        return 0;
    }
    n.min(length as f64) as usize
}

fn to_string(ctx: &mut Context, this: &Value, _args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Str(this_text(ctx, this)?))
}

fn char_at(ctx: &mut Context, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let text = this_text(ctx, this)?;
    let chars: Vec<char> = text.as_str().chars().collect();
    let index = arg(args, 0).to_number_primitive();
    if index < 0.0 || index >= chars.len() as f64 {
        return Ok(Value::Str(EStr::new("")));
    }
    Ok(Value::Str(EStr::new(chars[index as usize].to_string())))
}

fn char_code_at(ctx: &mut Context, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let text = this_text(ctx, this)?;
    let chars: Vec<char> = text.as_str().chars().collect();
    let index = arg(args, 0).to_number_primitive();
    if index < 0.0 || index >= chars.len() as f64 {
        return Ok(Value::Number(f64::NAN));
    }
    Ok(Value::Number(chars[index as usize] as u32 as f64))
}

fn concat(ctx: &mut Context, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let mut out = this_text(ctx, this)?.as_str().to_string();
    for value in args {
        out.push_str(to_primitive(ctx, value, true)?.to_string_primitive().as_str());
    }
    Ok(Value::Str(EStr::new(out)))
}

fn index_of(ctx: &mut Context, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let text = this_text(ctx, this)?;
    let chars: Vec<char> = text.as_str().chars().collect();
    let search = arg(args, 0).to_string_primitive();
    let search_chars: Vec<char> = search.as_str().chars().collect();
    let start = clamp_relative(args.get(1).cloned().unwrap_or(Value::Int(0)), chars.len());
    if search_chars.len() > chars.len() {
        return Ok(Value::Int(-1));
    }
    for i in start..=chars.len() - search_chars.len() {
        if chars[i..i + search_chars.len()] == search_chars[..] {
            return Ok(Value::Int(i as i32));
        }
    }
    Ok(Value::Int(-1))
}

fn last_index_of(ctx: &mut Context, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let text = this_text(ctx, this)?;
    let chars: Vec<char> = text.as_str().chars().collect();
    let search = arg(args, 0).to_string_primitive();
    let search_chars: Vec<char> = search.as_str().chars().collect();
    if search_chars.len() > chars.len() {
        return Ok(Value::Int(-1));
    }
    for i in (0..=chars.len() - search_chars.len()).rev() {
        if chars[i..i + search_chars.len()] == search_chars[..] {
            return Ok(Value::Int(i as i32));
        }
    }
    Ok(Value::Int(-1))
}

fn slice(ctx: &mut Context, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let text = this_text(ctx, this)?;
    let chars: Vec<char> = text.as_str().chars().collect();
    let start = clamp_relative(arg(args, 0), chars.len());
    let end = clamp_relative(arg(args, 1), chars.len()).max(start);
    Ok(Value::Str(EStr::new(chars[start..end].iter().collect::<String>())))
}

fn substring(ctx: &mut Context, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let text = this_text(ctx, this)?;
    let chars: Vec<char> = text.as_str().chars().collect();
    let mut start = clamp_absolute(arg(args, 0), chars.len());
    let mut end = clamp_absolute(arg(args, 1), chars.len());
    if start > end {
        std::mem::swap(&mut start, &mut end);
    }
    Ok(Value::Str(EStr::new(chars[start..end].iter().collect::<String>())))
}

fn to_upper_case(ctx: &mut Context, this: &Value, _args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Str(EStr::new(this_text(ctx, this)?.as_str().to_uppercase())))
}

fn to_lower_case(ctx: &mut Context, this: &Value, _args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Str(EStr::new(this_text(ctx, this)?.as_str().to_lowercase())))
}

fn trim(ctx: &mut Context, this: &Value, _args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Str(EStr::new(this_text(ctx, this)?.as_str().trim())))
}

fn repeat(ctx: &mut Context, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let text = this_text(ctx, this)?;
    let count = arg(args, 0).to_number_primitive();
    if count < 0.0 || !count.is_finite() {
        return Err(crate::interpreter::reference_error("Invalid count value"));
    }
    Ok(Value::Str(EStr::new(text.as_str().repeat(count as usize))))
}

fn constructor(ctx: &mut Context, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    let text = match arg(args, 0) {
        Value::Undefined => EStr::new(""),
        v => to_primitive(ctx, &v, true)?.to_string_primitive(),
    };
    Ok(Value::Str(text))
}

fn from_char_code(_ctx: &mut Context, _this: &Value, args: &[Value]) -> EvalResult<Value> {
    let mut out = String::with_capacity(args.len());
    for value in args {
        let code = value.to_number_primitive() as u32;
        out.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
    }
    Ok(Value::Str(EStr::new(out)))
}

fn split(ctx: &mut Context, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let text = this_text(ctx, this)?;
    let array_proto = ctx.prototypes().array;
    let result = ctx.pool.alloc(ObjectData::new(ObjectKind::Array, Some(array_proto)));
    let pieces: Vec<String> = match arg(args, 0) {
        Value::Undefined => vec![text.as_str().to_string()],
        Value::Object(h) if matches!(&ctx.pool.get(h).kind, ObjectKind::RegExpObject(..)) => split_by_regexp(ctx, h, text.as_str())?,
        v => {
            let sep = v.to_string_primitive();
            if sep.as_str().is_empty() {
                text.as_str().chars().map(|c| c.to_string()).collect()
            } else {
                text.as_str().split(sep.as_str()).map(str::to_string).collect()
            }
        }
    };
    for (i, piece) in pieces.into_iter().enumerate() {
        ctx.pool.get_mut(result).set_element(i as u32, Value::Str(EStr::new(piece)), PropertyFlags::ALL);
    }
    Ok(Value::Object(result))
}

fn split_by_regexp(ctx: &mut Context, handle: crate::pool::ObjectHandle, text: &str) -> EvalResult<Vec<String>> {
    let (program, flags) = match &ctx.pool.get(handle).kind {
        ObjectKind::RegExpObject(program, _, flags) => (program.clone(), *flags),
        _ => unreachable!(),
    };
    let chars: Vec<char> = text.chars().collect();
    let mut pieces = Vec::new();
    let mut cursor = 0usize;
    let mut search_from = 0usize;
    while search_from <= chars.len() {
        match program.exec(text, search_from, flags.ignore_case, flags.multiline) {
            Some(m) => {
                pieces.push(chars[cursor..m.start].iter().collect());
                cursor = m.end;
                search_from = if m.end > m.start { m.end } else { m.end + 1 };
            }
            None => break,
        }
    }
    pieces.push(chars[cursor..].iter().collect());
    Ok(pieces)
}

fn replace(ctx: &mut Context, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let text = this_text(ctx, this)?;
    let replacement_value = arg(args, 1);
    match arg(args, 0) {
        Value::Object(h) if matches!(&ctx.pool.get(h).kind, ObjectKind::RegExpObject(..)) => replace_regexp(ctx, h, text.as_str(), &replacement_value),
        pattern => {
            let pattern = pattern.to_string_primitive();
            match text.as_str().find(pattern.as_str()) {
                None => Ok(Value::Str(text)),
                Some(byte_index) => {
                    let replacement = replacement_text(ctx, &replacement_value, pattern.as_str(), &[])?;
                    let mut out = String::with_capacity(text.as_str().len());
                    out.push_str(&text.as_str()[..byte_index]);
                    out.push_str(&replacement);
                    out.push_str(&text.as_str()[byte_index + pattern.as_str().len()..]);
                    Ok(Value::Str(EStr::new(out)))
                }
            }
        }
    }
}

fn replacement_text(ctx: &mut Context, replacement: &Value, whole_match: &str, groups: &[Option<String>]) -> EvalResult<String> {
    if let Value::Object(h) = replacement {
        if ctx.pool.get(*h).is_callable() {
            let mut call_args = vec![Value::Str(EStr::new(whole_match))];
            call_args.extend(groups.iter().map(|g| match g {
                Some(s) => Value::Str(EStr::new(s.as_str())),
                None => Value::Undefined,
            }));
            let result = crate::interpreter::call_function_value(ctx, *h, Value::Undefined, &call_args)?;
            return Ok(result.to_string_primitive().as_str().to_string());
        }
    }
    let template = replacement.to_string_primitive();
    let mut out = String::new();
    let mut chars = template.as_str().chars().peekable();
    while let Some(c) = chars.next() {
        if c == '$' {
            match chars.peek() {
                Some('$') => {
                    out.push('$');
                    chars.next();
                }
                Some('&') => {
                    out.push_str(whole_match);
                    chars.next();
                }
                Some(d) if d.is_ascii_digit() => {
                    let index = d.to_digit(10).unwrap() as usize;
                    chars.next();
                    if index >= 1 && index <= groups.len() {
                        if let Some(g) = &groups[index - 1] {
                            out.push_str(g);
                        }
                    } else {
                        out.push('$');
                        out.push(*d);
                    }
                }
                _ => out.push('$'),
            }
        } else {
            out.push(c);
        }
    }
    Ok(out)
}

fn replace_regexp(ctx: &mut Context, handle: crate::pool::ObjectHandle, text: &str, replacement: &Value) -> EvalResult<Value> {
    let (program, flags) = match &ctx.pool.get(handle).kind {
        ObjectKind::RegExpObject(program, _, flags) => (program.clone(), *flags),
        _ => unreachable!(),
    };
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::new();
    let mut cursor = 0usize;
    let mut search_from = 0usize;
    loop {
        match program.exec(text, search_from, flags.ignore_case, flags.multiline) {
            None => break,
            Some(m) => {
                out.push_str(&chars[cursor..m.start].iter().collect::<String>());
                let whole: String = chars[m.start..m.end].iter().collect();
                let groups: Vec<Option<String>> = m.groups.iter().map(|g| g.map(|(s, e)| chars[s..e].iter().collect())).collect();
                out.push_str(&replacement_text(ctx, replacement, &whole, &groups)?);
                cursor = m.end;
                search_from = if m.end > m.start { m.end } else { m.end + 1 };
                if !flags.global {
                    break;
                }
                if search_from > chars.len() {
                    break;
                }
            }
        }
    }
    out.push_str(&chars[cursor..].iter().collect::<String>());
    Ok(Value::Str(EStr::new(out)))
}

fn string_match(ctx: &mut Context, this: &Value, args: &[Value]) -> EvalResult<Value> {
    let text = this_text(ctx, this)?;
    let handle = match arg(args, 0) {
        Value::Object(h) if matches!(&ctx.pool.get(h).kind, ObjectKind::RegExpObject(..)) => h,
        other => {
            let pattern = other.to_string_primitive();
            super::regexp::make_regexp(ctx, pattern.as_str(), "")?
        }
    };
    let is_global = matches!(&ctx.pool.get(handle).kind, ObjectKind::RegExpObject(_, _, flags) if flags.global);
    if !is_global {
        return super::regexp::exec_on(ctx, handle, text.as_str());
    }
    let array_proto = ctx.prototypes().array;
    let result = ctx.pool.alloc(ObjectData::new(ObjectKind::Array, Some(array_proto)));
    let mut out = 0u32;
    loop {
        match super::regexp::exec_on(ctx, handle, text.as_str())? {
            Value::Null => break,
            Value::Object(match_array) => {
                let whole = ctx.pool.get(match_array).get_element(0).and_then(|p| p.as_value().cloned()).unwrap_or(Value::Undefined);
                ctx.pool.get_mut(result).set_element(out, whole, PropertyFlags::ALL);
                out += 1;
            }
            _ => break,
        }
    }
    if out == 0 {
        return Ok(Value::Null);
    }
    Ok(Value::Object(result))
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
    fn slice_handles_negative_indices() {
        let mut ctx = new_context();
        let result = slice(&mut ctx, &Value::Str(EStr::new("hello world")), &[Value::Int(-5), Value::Undefined]).unwrap();
        assert_eq!(result.to_string_primitive().as_str(), "world");
    }

    #[test]
    fn substring_swaps_reversed_arguments() {
        let mut ctx = new_context();
        let result = substring(&mut ctx, &Value::Str(EStr::new("hello")), &[Value::Int(4), Value::Int(1)]).unwrap();
        assert_eq!(result.to_string_primitive().as_str(), "ell");
    }

    #[test]
    fn split_on_plain_separator() {
        let mut ctx = new_context();
        let result = split(&mut ctx, &Value::Str(EStr::new("a,b,c")), &[Value::Str(EStr::new(","))]).unwrap();
        let Value::Object(handle) = result else { panic!() };
        assert_eq!(ctx.pool.get(handle).element_count(), 3);
    }

    #[test]
    fn replace_substitutes_first_plain_match() {
        let mut ctx = new_context();
        let result = replace(&mut ctx, &Value::Str(EStr::new("foo bar foo")), &[Value::Str(EStr::new("foo")), Value::Str(EStr::new("baz"))]).unwrap();
        assert_eq!(result.to_string_primitive().as_str(), "baz bar foo");
    }

    #[test]
    fn replace_regexp_global_substitutes_every_match() {
        let mut ctx = new_context();
        let regex = super::super::regexp::make_regexp(&mut ctx, r"\d+", "g").unwrap();
        let result = replace(&mut ctx, &Value::Str(EStr::new("a1 b22 c333")), &[Value::Object(regex), Value::Str(EStr::new("#"))]).unwrap();
        assert_eq!(result.to_string_primitive().as_str(), "a# b# c#");
    }
}
