//! `JSON.parse` / `JSON.stringify`, spec §4.6.
//!
//! Grounded on `original_source/src/builtin/json.c`: a recursive-descent
//! parser (`literal`/`object`/`array`/`string`) and a recursive stringifier
//! (`stringifyValue`) that thread a replacer/reviver function through the
//! walk the same way `engine.rs`'s bootstrap threads a `Context` through
//! everything else.
//!
//! Three departures from the original, all grounded on spec §4.6's own
//! wording rather than invented:
//! - `string()` in the original slices the raw bytes between quotes without
//!   decoding `\n`/`\uXXXX`/etc; spec §4.6 says "strings with JSON escapes",
//!   so [`Parser::parse_string`] actually decodes them (with surrogate-pair
//!   combination for astral code points).
//! - `json()` only accepts `{`/`[` at the top level; spec §8's round-trip
//!   property (`JSON.parse(JSON.stringify(v))` for any `v` including a bare
//!   string/number/boolean/null) requires the full literal grammar at the
//!   top, so [`parse`] allows it.
//! - The reviver's `this` in `walker()` stays bound to the original root
//!   value at every depth rather than updating to each node's immediate
//!   parent; spec §4.6 says "the enclosing object as `this`", which is what
//!   `walk` below does.

use crate::context::Context;
use crate::error::{Position, Unwind};
use crate::estr::EStr;
use crate::interpreter::{call_function_value, EvalResult};
use crate::key::Key;
use crate::object::{ObjectData, ObjectKind, Property, PropertyFlags};
use crate::pool::ObjectHandle;
use crate::value::{self, Value};
use std::iter::Peekable;
use std::str::Chars;

fn syntax_error(message: impl Into<String>) -> Unwind {
    Unwind::Throw(Value::Str(EStr::new(message.into())), Position::NONE)
}

/// `JSON.parse(text, reviver?)`.
pub fn parse(ctx: &mut Context, text: &str, reviver: Value) -> EvalResult<Value> {
    let value = {
        let mut parser = Parser { chars: text.chars().peekable(), ctx };
        let value = parser.parse_value()?;
        parser.skip_ws();
        if let Some(c) = parser.chars.peek() {
            return Err(syntax_error(format!("unexpected '{}'", c)));
        }
        value
    };

    let Value::Object(reviver_handle) = &reviver else { return Ok(value) };
    if !ctx.pool.get(*reviver_handle).is_callable() {
        return Ok(value);
    }
    let reviver_handle = *reviver_handle;

    let object_proto = ctx.prototypes().object;
    let holder = ctx.pool.alloc(ObjectData::new(ObjectKind::Plain, Some(object_proto)));
    let empty_key = ctx.keys.intern("");
    ctx.pool.get_mut(holder).set_own(empty_key, Property::data(value.clone(), PropertyFlags::ALL));
    walk(ctx, reviver_handle, Value::Object(holder), EStr::new(""), value)
}

/// Depth-first revival: a node's children are revived before the node
/// itself, and every call's `this` is `holder` — the object or array that
/// directly owns `value` under `name` (spec §4.6).
fn walk(ctx: &mut Context, reviver: ObjectHandle, holder: Value, name: EStr, value: Value) -> EvalResult<Value> {
    if let Value::Object(handle) = value {
        let is_array = matches!(ctx.pool.get(handle).kind, ObjectKind::Array);
        if is_array {
            let len = ctx.pool.get(handle).element_count();
            for index in 0..len {
                let child = ctx
                    .pool
                    .get(handle)
                    .get_element(index as u32)
                    .and_then(|p| p.as_value().cloned())
                    .unwrap_or(Value::Undefined);
                let revived = walk(ctx, reviver, Value::Object(handle), EStr::new(index.to_string()), child)?;
                if matches!(revived, Value::Undefined) {
                    ctx.pool.get_mut(handle).delete_element(index as u32);
                } else {
                    ctx.pool.get_mut(handle).set_element(index as u32, revived, PropertyFlags::ALL);
                }
            }
        } else {
            let keys: Vec<Key> = ctx.pool.get(handle).own_keys().collect();
            for key in keys {
                let child = ctx.pool.get(handle).get_own(key).and_then(|p| p.as_value().cloned()).unwrap_or(Value::Undefined);
                let name = EStr::new(ctx.keys.text_of(key).to_string());
                let revived = walk(ctx, reviver, Value::Object(handle), name, child)?;
                if matches!(revived, Value::Undefined) {
                    ctx.pool.get_mut(handle).delete_own(key);
                } else {
                    ctx.pool.get_mut(handle).set_own(key, Property::data(revived, PropertyFlags::ALL));
                }
            }
        }
    }
    call_function_value(ctx, reviver, holder, &[Value::Str(name), value])
}

struct Parser<'a, 'c> {
    chars: Peekable<Chars<'a>>,
    ctx: &'c mut Context,
}

impl<'a, 'c> Parser<'a, 'c> {
    fn skip_ws(&mut self) {
        while matches!(self.chars.peek(), Some(' ') | Some('\t') | Some('\n') | Some('\r')) {
            self.chars.next();
        }
    }

    fn parse_value(&mut self) -> EvalResult<Value> {
        self.skip_ws();
        match self.chars.peek().copied() {
            Some('t') => self.expect_word("true", Value::Boolean(true)),
            Some('f') => self.expect_word("false", Value::Boolean(false)),
            Some('n') => self.expect_word("null", Value::Null),
            Some('"') => {
                self.chars.next();
                Ok(Value::Str(EStr::new(self.parse_string()?)))
            }
            Some('{') => {
                self.chars.next();
                self.parse_object()
            }
            Some('[') => {
                self.chars.next();
                self.parse_array()
            }
            Some(c) if c == '-' || c.is_ascii_digit() => self.parse_number(),
            Some(c) => Err(syntax_error(format!("unexpected '{}'", c))),
            None => Err(syntax_error("unexpected end of input")),
        }
    }

    fn expect_word(&mut self, word: &str, value: Value) -> EvalResult<Value> {
        for expected in word.chars() {
            if self.chars.next() != Some(expected) {
                return Err(syntax_error(format!("expected '{}'", word)));
            }
        }
        Ok(value)
    }

    fn parse_object(&mut self) -> EvalResult<Value> {
        let object_proto = self.ctx.prototypes().object;
        let handle = self.ctx.pool.alloc(ObjectData::new(ObjectKind::Plain, Some(object_proto)));
        self.skip_ws();
        if self.chars.peek() == Some(&'}') {
            self.chars.next();
            return Ok(Value::Object(handle));
        }
        loop {
            self.skip_ws();
            if self.chars.next() != Some('"') {
                return Err(syntax_error("expect property name"));
            }
            let name = self.parse_string()?;
            self.skip_ws();
            if self.chars.next() != Some(':') {
                return Err(syntax_error("expect colon"));
            }
            let value = self.parse_value()?;
            let key = self.ctx.keys.intern(&name);
            self.ctx.pool.get_mut(handle).set_own(key, Property::data(value, PropertyFlags::ALL));
            self.skip_ws();
            match self.chars.next() {
                Some('}') => break,
                Some(',') => continue,
                _ => return Err(syntax_error("expected ',' or '}'")),
            }
        }
        Ok(Value::Object(handle))
    }

    fn parse_array(&mut self) -> EvalResult<Value> {
        let array_proto = self.ctx.prototypes().array;
        let handle = self.ctx.pool.alloc(ObjectData::new(ObjectKind::Array, Some(array_proto)));
        self.skip_ws();
        if self.chars.peek() == Some(&']') {
            self.chars.next();
            return Ok(Value::Object(handle));
        }
        let mut index = 0u32;
        loop {
            let value = self.parse_value()?;
            self.ctx.pool.get_mut(handle).set_element(index, value, PropertyFlags::ALL);
            index += 1;
            self.skip_ws();
            match self.chars.next() {
                Some(']') => break,
                Some(',') => continue,
                _ => return Err(syntax_error("expected ',' or ']'")),
            }
        }
        Ok(Value::Object(handle))
    }

    fn parse_string(&mut self) -> EvalResult<String> {
        let mut s = String::new();
        loop {
            match self.chars.next() {
                None => return Err(syntax_error("unterminated string")),
                Some('"') => break,
                Some('\\') => self.parse_escape(&mut s)?,
                Some(c) => s.push(c),
            }
        }
        Ok(s)
    }

    fn parse_escape(&mut self, s: &mut String) -> EvalResult<()> {
        match self.chars.next() {
            Some('"') => s.push('"'),
            Some('\\') => s.push('\\'),
            Some('/') => s.push('/'),
            Some('b') => s.push('\u{8}'),
            Some('f') => s.push('\u{c}'),
            Some('n') => s.push('\n'),
            Some('r') => s.push('\r'),
            Some('t') => s.push('\t'),
            Some('u') => {
                let high = self.read_hex4()?;
                if (0xD800..=0xDBFF).contains(&high) && self.peek_surrogate_escape() {
                    self.chars.next();
                    self.chars.next();
                    let low = self.read_hex4()?;
                    if (0xDC00..=0xDFFF).contains(&low) {
                        let combined = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                        s.push(char::from_u32(combined).unwrap_or('\u{fffd}'));
                        return Ok(());
                    }
                    s.push('\u{fffd}');
                    s.push(char::from_u32(low).unwrap_or('\u{fffd}'));
                    return Ok(());
                }
                s.push(char::from_u32(high).unwrap_or('\u{fffd}'));
            }
            Some(other) => return Err(syntax_error(format!("invalid escape '\\{}'", other))),
            None => return Err(syntax_error("unterminated string")),
        }
        Ok(())
    }

    fn peek_surrogate_escape(&self) -> bool {
        let mut lookahead = self.chars.clone();
        lookahead.next() == Some('\\') && lookahead.next() == Some('u')
    }

    fn read_hex4(&mut self) -> EvalResult<u32> {
        let mut value = 0u32;
        for _ in 0..4 {
            let digit = self.chars.next().and_then(|c| c.to_digit(16)).ok_or_else(|| syntax_error("invalid unicode escape"))?;
            value = value * 16 + digit;
        }
        Ok(value)
    }

    fn parse_number(&mut self) -> EvalResult<Value> {
        let mut text = String::new();
        let mut is_float = false;
        if self.chars.peek() == Some(&'-') {
            text.push(self.chars.next().expect("peeked"));
        }
        match self.chars.peek() {
            Some('0') => text.push(self.chars.next().expect("peeked")),
            Some(d) if d.is_ascii_digit() => {
                while self.chars.peek().map_or(false, |d| d.is_ascii_digit()) {
                    text.push(self.chars.next().expect("peeked"));
                }
            }
            _ => return Err(syntax_error("invalid number")),
        }
        if self.chars.peek() == Some(&'.') {
            is_float = true;
            text.push(self.chars.next().expect("peeked"));
            if !self.chars.peek().map_or(false, |d| d.is_ascii_digit()) {
                return Err(syntax_error("invalid number"));
            }
            while self.chars.peek().map_or(false, |d| d.is_ascii_digit()) {
                text.push(self.chars.next().expect("peeked"));
            }
        }
        if matches!(self.chars.peek(), Some('e') | Some('E')) {
            is_float = true;
            text.push(self.chars.next().expect("peeked"));
            if matches!(self.chars.peek(), Some('+') | Some('-')) {
                text.push(self.chars.next().expect("peeked"));
            }
            if !self.chars.peek().map_or(false, |d| d.is_ascii_digit()) {
                return Err(syntax_error("invalid number"));
            }
            while self.chars.peek().map_or(false, |d| d.is_ascii_digit()) {
                text.push(self.chars.next().expect("peeked"));
            }
        }
        if !is_float {
            if let Ok(v) = text.parse::<i32>() {
                return Ok(Value::Int(v));
            }
        }
        text.parse::<f64>().map(Value::Number).map_err(|_| syntax_error("invalid number"))
    }
}

/// `JSON.stringify(value, replacer?, space?)`. Returns `Value::Undefined`
/// when the top-level value itself serializes to nothing (a function, or
/// `undefined`) — real `JSON.stringify(undefined)` yields the `undefined`
/// value, not the four-character string `"null"` the source's top-level
/// call (which always passes its array-element codepath) would produce.
pub fn stringify(ctx: &mut Context, value: Value, replacer: Value, space: Value) -> EvalResult<Value> {
    let filter = match &replacer {
        Value::Object(h) if matches!(ctx.pool.get(*h).kind, ObjectKind::Array) => Some(property_allowlist(ctx, *h)),
        _ => None,
    };
    let replacer_fn = match &replacer {
        Value::Object(h) if ctx.pool.get(*h).is_callable() => Some(*h),
        _ => None,
    };
    let indent = match &space {
        Value::Str(s) => s.as_str().chars().take(10).collect::<String>(),
        Value::Int(_) | Value::Number(_) => {
            let n = space.to_number_primitive();
            let n = if n.is_nan() { 0 } else { n.clamp(0.0, 10.0) as usize };
            " ".repeat(n)
        }
        _ => String::new(),
    };

    let mut w = Stringifier { ctx, filter, replacer_fn, indent };
    let object_proto = w.ctx.prototypes().object;
    let holder = w.ctx.pool.alloc(ObjectData::new(ObjectKind::Plain, Some(object_proto)));
    let empty_key = w.ctx.keys.intern("");
    w.ctx.pool.get_mut(holder).set_own(empty_key, Property::data(value.clone(), PropertyFlags::ALL));
    match w.serialize(Value::Object(holder), EStr::new(""), value, 0, false)? {
        Some(text) => Ok(Value::Str(EStr::new(text))),
        None => Ok(Value::Undefined),
    }
}

fn property_allowlist(ctx: &mut Context, array: ObjectHandle) -> Vec<EStr> {
    let len = ctx.pool.get(array).element_count();
    let mut names: Vec<EStr> = Vec::new();
    for index in 0..len {
        let Some(v) = ctx.pool.get(array).get_element(index as u32).and_then(|p| p.as_value().cloned()) else { continue };
        let name = match v {
            Value::Str(s) => Some(s),
            Value::Int(_) | Value::Number(_) => Some(v.to_string_primitive()),
            _ => None,
        };
        if let Some(name) = name {
            if !names.iter().any(|n| n == &name) {
                names.push(name);
            }
        }
    }
    names
}

struct Stringifier<'a> {
    ctx: &'a mut Context,
    filter: Option<Vec<EStr>>,
    replacer_fn: Option<ObjectHandle>,
    indent: String,
}

impl<'a> Stringifier<'a> {
    /// Serializes `value` (the property `name` of `holder`). `as_element`
    /// marks an array-element context, where undefined/function render as
    /// `"null"` instead of being omitted, and the replacer array's
    /// allow-list doesn't apply (spec §4.6).
    fn serialize(&mut self, holder: Value, name: EStr, mut value: Value, level: usize, as_element: bool) -> EvalResult<Option<String>> {
        if let Some(replacer) = self.replacer_fn {
            value = call_function_value(self.ctx, replacer, holder, &[Value::Str(name.clone()), value])?;
        }

        let omittable = matches!(value, Value::Undefined) || matches!(&value, Value::Object(h) if self.ctx.pool.get(*h).is_callable());
        if !as_element {
            if omittable {
                return Ok(None);
            }
            if let Some(filter) = &self.filter {
                if !filter.iter().any(|n| n.as_str() == name.as_str()) {
                    return Ok(None);
                }
            }
        }

        if omittable {
            return Ok(Some("null".to_string()));
        }

        let rendered = match &value {
            Value::Object(handle) => self.serialize_object(*handle, value.clone(), level)?,
            Value::Str(s) => {
                let mut out = String::with_capacity(s.len() + 2);
                out.push('"');
                escape_into(&mut out, s.as_str());
                out.push('"');
                out
            }
            Value::Boolean(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Number(n) if n.is_finite() => value::format_number(*n),
            Value::Number(_) => "null".to_string(),
            Value::Null => "null".to_string(),
            Value::Undefined => unreachable!("handled by `omittable` above"),
        };
        Ok(Some(rendered))
    }

    fn serialize_object(&mut self, handle: ObjectHandle, holder: Value, level: usize) -> EvalResult<String> {
        let is_array = matches!(self.ctx.pool.get(handle).kind, ObjectKind::Array);
        let newline = if self.indent.is_empty() { "" } else { "\n" };
        let pad = self.indent.repeat(level + 1);
        let closing_pad = self.indent.repeat(level);

        let mut body = String::new();
        let mut first = true;

        if is_array {
            let len = self.ctx.pool.get(handle).element_count();
            for index in 0..len {
                let child = self.ctx.pool.get(handle).get_element(index as u32).and_then(|p| p.as_value().cloned()).unwrap_or(Value::Undefined);
                let rendered = self
                    .serialize(holder.clone(), EStr::new(index.to_string()), child, level + 1, true)?
                    .expect("array-element context never omits");
                if !first {
                    body.push(',');
                    body.push_str(newline);
                }
                first = false;
                body.push_str(&pad);
                body.push_str(&rendered);
            }
        } else {
            let entries: Vec<(Key, crate::object::Property)> = self.ctx.pool.get(handle).own_entries().map(|(k, p)| (k, p.clone())).collect();
            for (key, prop) in entries {
                if !prop.flags.enumerable() {
                    continue;
                }
                let name = EStr::new(self.ctx.keys.text_of(key).to_string());
                let child = match prop.content {
                    crate::object::PropertyContent::Data(v) => v,
                    crate::object::PropertyContent::Accessor { get, .. } => match get {
                        Some(getter) => call_function_value(self.ctx, getter, holder.clone(), &[])?,
                        None => Value::Undefined,
                    },
                };
                let Some(rendered) = self.serialize(holder.clone(), name.clone(), child, level + 1, false)? else { continue };
                if !first {
                    body.push(',');
                    body.push_str(newline);
                }
                first = false;
                body.push_str(&pad);
                body.push('"');
                escape_into(&mut body, name.as_str());
                body.push('"');
                body.push(':');
                if !self.indent.is_empty() {
                    body.push(' ');
                }
                body.push_str(&rendered);
            }
        }

        let mut out = String::new();
        out.push(if is_array { '[' } else { '{' });
        if !first {
            out.push_str(newline);
            out.push_str(&body);
            out.push_str(newline);
            out.push_str(&closing_pad);
        }
        out.push(if is_array { ']' } else { '}' });
        Ok(out)
    }
}

fn escape_into(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Limits, Prototypes};

    fn new_context() -> Context {
        let mut ctx = Context::new(Limits::default());
        let object = ctx.pool.alloc(ObjectData::new(ObjectKind::Plain, None));
        let proto = Prototypes {
            object,
            function: object,
            array: object,
            string: object,
            number: object,
            boolean: object,
            error: object,
            regexp: object,
            date: object,
        };
        ctx.set_prototypes(proto);
        ctx
    }

    #[test]
    fn parses_nested_structures() {
        let mut ctx = new_context();
        let value = parse(&mut ctx, r#"{"a": [1, 2.5, "x", true, null]}"#, Value::Undefined).unwrap();
        let Value::Object(h) = value else { panic!("expected object") };
        let a_key = ctx.keys.intern("a");
        let Some(Value::Object(arr)) = ctx.pool.get(h).get_own(a_key).and_then(|p| p.as_value().cloned()) else {
            panic!("expected array property")
        };
        assert_eq!(ctx.pool.get(arr).element_count(), 5);
    }

    #[test]
    fn decodes_escapes() {
        let mut ctx = new_context();
        let value = parse(&mut ctx, r#""a\nbAc""#, Value::Undefined).unwrap();
        assert_eq!(value.to_string_primitive().as_str(), "a\nbAc");
    }

    #[test]
    fn stringify_round_trips_plain_values() {
        let mut ctx = new_context();
        let out = stringify(&mut ctx, Value::Int(7), Value::Undefined, Value::Undefined).unwrap();
        assert_eq!(out.to_string_primitive().as_str(), "7");
        let back = parse(&mut ctx, out.to_string_primitive().as_str(), Value::Undefined).unwrap();
        assert!(matches!(back, Value::Int(7)));
    }

    #[test]
    fn stringify_indents_with_space_count() {
        let mut ctx = new_context();
        let object_proto = ctx.prototypes().object;
        let handle = ctx.pool.alloc(ObjectData::new(ObjectKind::Plain, Some(object_proto)));
        let key = ctx.keys.intern("x");
        ctx.pool.get_mut(handle).set_own(key, Property::data(Value::Int(1), PropertyFlags::ALL));
        let out = stringify(&mut ctx, Value::Object(handle), Value::Undefined, Value::Int(2)).unwrap();
        assert_eq!(out.to_string_primitive().as_str(), "{\n  \"x\": 1\n}");
    }

    #[test]
    fn undefined_top_level_value_stringifies_to_undefined() {
        let mut ctx = new_context();
        let out = stringify(&mut ctx, Value::Undefined, Value::Undefined, Value::Undefined).unwrap();
        assert!(matches!(out, Value::Undefined));
    }
}
