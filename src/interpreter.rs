//! The op-list walker: every operation's runtime contract, spec §4.3.
//!
//! Grounded on `original_source/src/op.c`. The C original threads a single
//! `const struct Op **ops` cursor through mutually-recursive `native`
//! function calls; [`Cursor`] plays the same role without function
//! pointers or `unsafe`, and every op's handler is a `match` arm here
//! instead of a `static struct Value foo(...)` instantiated from
//! `io_libecc_op_List`. Jump-ish ops carry an offset relative to their own
//! position, exactly as `op.c`'s `*ops += offset` does.

use crate::context::Context;
use crate::error::{Error, Position, Unwind};
use crate::estr::EStr;
use crate::key::Key;
use crate::object::{FunctionData, ObjectData, ObjectKind, Property, PropertyContent, PropertyFlags};
use crate::op::{CompareOp, Const, Op, PropertyInit};
use crate::pool::ObjectHandle;
use crate::value::{self, Value};
use std::rc::Rc;
use tracing::trace;

pub type EvalResult<T> = Result<T, Unwind>;

pub(crate) fn type_error(message: impl Into<String>) -> Unwind {
    Unwind::Throw(Value::Str(EStr::new(message.into())), Position::NONE)
}

pub(crate) fn reference_error(message: impl Into<String>) -> Unwind {
    Unwind::Throw(Value::Str(EStr::new(message.into())), Position::NONE)
}

/// Lifts a resource-limit failure (the only `Error` the interpreter itself
/// raises mid-execution) into the `Unwind` channel everything else already
/// propagates through.
fn limit_unwind(e: Error) -> Unwind {
    match e {
        Error::ResourceLimit(what) => Unwind::Throw(Value::Str(EStr::new(format!("resource limit: {}", what))), Position::NONE),
        other => Unwind::Throw(Value::Str(EStr::new(other.to_string())), Position::NONE),
    }
}

struct Cursor<'a> {
    ops: &'a [Op],
    pc: usize,
}

impl<'a> Cursor<'a> {
    fn new(ops: &'a [Op]) -> Self {
        Cursor { ops, pc: 0 }
    }

    fn take(&mut self) -> (usize, &'a Op) {
        let i = self.pc;
        self.pc += 1;
        (i, &self.ops[i])
    }

    fn jump_from(&mut self, origin: usize, offset: i32) {
        self.pc = (origin as i32 + offset) as usize;
    }

    fn goto(&mut self, pc: usize) {
        self.pc = pc;
    }
}

/// Run a compiled function/program body to completion, returning its
/// completion value (the value of the last expression statement executed,
/// ECMAScript's "normal completion" for a script) or propagating whatever
/// `Unwind` escaped (only `Return`/`Throw` should ever reach the caller of
/// a whole body; stray `Break`/`Continue` are a parser bug).
pub fn run(ctx: &mut Context, ops: &Rc<Vec<Op>>) -> EvalResult<Value> {
    let mut cursor = Cursor::new(ops);
    exec_sequence(ctx, &mut cursor)
}

/// Convenience for a function call: run its body and collapse an explicit
/// `return` into a plain value, since the caller only cares about the
/// result, not how it was produced.
pub fn run_function_body(ctx: &mut Context, ops: &Rc<Vec<Op>>) -> EvalResult<Value> {
    match run(ctx, ops) {
        Ok(v) => Ok(v),
        Err(Unwind::Return(v)) => Ok(v),
        Err(other) => Err(other),
    }
}

fn exec_sequence(ctx: &mut Context, cur: &mut Cursor) -> EvalResult<Value> {
    let mut completion = Value::Undefined;
    loop {
        ctx.count_operation().map_err(limit_unwind)?;
        if cur.pc >= cur.ops.len() {
            return Ok(completion);
        }
        let (idx, op) = cur.take();
        match op {
            Op::End => return Ok(completion),
            Op::Expression => completion = eval_value(ctx, cur)?,
            Op::Discard => {
                eval_value(ctx, cur)?;
            }
            Op::Jump(offset) => cur.jump_from(idx, *offset),
            Op::JumpIf(offset) => {
                let v = eval_value(ctx, cur)?;
                if v.to_boolean() {
                    cur.jump_from(idx, *offset);
                }
            }
            Op::JumpIfNot(offset) => {
                let v = eval_value(ctx, cur)?;
                if !v.to_boolean() {
                    cur.jump_from(idx, *offset);
                }
            }
            Op::Return => {
                let v = eval_value(ctx, cur)?;
                return Err(Unwind::Return(v));
            }
            Op::Throw => {
                let v = eval_value(ctx, cur)?;
                return Err(Unwind::Throw(v, Position::NONE));
            }
            Op::Break(label) => return Err(Unwind::Break(label.clone())),
            Op::Continue(label) => return Err(Unwind::Continue(label.clone())),
            Op::Try { catch_offset, end_offset } => {
                let v = exec_try(ctx, cur, idx, *catch_offset, *end_offset)?;
                completion = v;
            }
            Op::Iterate { condition_offset, end_offset, label } => {
                exec_iterate(ctx, cur, idx, *condition_offset, *end_offset, label)?;
            }
            Op::IterateRange { cmp, end_offset, label } => {
                exec_iterate_range(ctx, cur, idx, *cmp, *end_offset, label)?;
            }
            Op::IterateIn { end_offset, label } => {
                exec_iterate_in(ctx, cur, idx, *end_offset, label)?;
            }
            Op::IterateDoWhile { condition_offset, end_offset, label } => {
                exec_iterate_do_while(ctx, cur, idx, *condition_offset, *end_offset, label)?;
            }
            Op::IterateFor { condition_offset, step_offset, end_offset, label } => {
                exec_iterate_for(ctx, cur, idx, *condition_offset, *step_offset, *end_offset, label)?;
            }
            Op::Switch { arm_count, end_offset, label } => {
                completion = exec_switch(ctx, cur, idx, *arm_count, *end_offset, label)?;
            }
            Op::Labeled { label, end_offset } => {
                completion = exec_labeled(ctx, cur, idx, label, *end_offset)?;
            }
            Op::With { end_offset } => {
                completion = exec_with(ctx, cur, idx, *end_offset)?;
            }
            Op::DeclareLocal(key) => {
                ctx.declare_local(*key, Value::Undefined, PropertyFlags::ALL);
            }
            _ => {
                // A bare expression used directly as a statement (no
                // `Expression` wrapper) — evaluate it as a value and keep
                // going, matching the language's implicit "last value"
                // completion semantics.
                cur.goto(idx);
                completion = eval_value(ctx, cur)?;
            }
        }
    }
}

/// Execute a nested block (loop body, try body/handler/finalizer) whose
/// ops begin at `cur`'s current position and run until an `Op::End`
/// sentinel. `Break`/`Continue` escape to the caller, which decides whether
/// this block is the one they target.
fn exec_block(ctx: &mut Context, cur: &mut Cursor) -> EvalResult<Value> {
    exec_sequence(ctx, cur)
}

fn exec_try(ctx: &mut Context, cur: &mut Cursor, idx: usize, catch_offset: i32, end_offset: i32) -> EvalResult<Value> {
    let catch_pc = if catch_offset == 0 { None } else { Some((idx as i32 + catch_offset) as usize) };
    let end_pc = (idx as i32 + end_offset) as usize;

    let body_result = exec_block(ctx, cur);

    let after_body = match body_result {
        Ok(v) => Ok(v),
        Err(Unwind::Throw(thrown, pos)) => {
            if let Some(catch_pc) = catch_pc {
                cur.goto(catch_pc);
                let (_, bind_op) = cur.take();
                let key = match bind_op {
                    Op::CatchBind(k) => *k,
                    _ => unreachable!("parser always emits CatchBind at a try's catch_offset"),
                };
                let env = ctx.pool.alloc(ObjectData::new(ObjectKind::Plain, Some(ctx.environment())));
                ctx.pool.get_mut(env).set_own(key, Property::data(thrown, PropertyFlags::ALL));
                ctx.push_frame(env, ctx.this_value(), ctx.strict_mode(), None, Default::default()).map_err(limit_unwind)?;
                let result = exec_block(ctx, cur);
                ctx.pop_frame();
                result
            } else {
                Err(Unwind::Throw(thrown, pos))
            }
        }
        Err(other) => Err(other),
    };

    cur.goto(end_pc);
    // A `finally` clause, if present, occupies the slots up to `end_pc`;
    // the parser leaves `end_pc` pointing just past it. We always run it
    // (for its side effects) and let it override the outcome only if it
    // itself transfers control (return/throw/break/continue).
    match exec_block(ctx, cur) {
        Ok(_) => after_body,
        Err(finally_unwind) => Err(finally_unwind),
    }
}

/// A `break`/`continue` with no label always targets the nearest enclosing
/// construct; a labeled one targets the construct whose own `label`
/// matches, passing through any unlabeled ones in between.
fn label_matches(requested: &Option<Box<str>>, own: &Option<Box<str>>) -> bool {
    match requested {
        None => true,
        Some(name) => own.as_deref() == Some(name.as_ref()),
    }
}

fn exec_iterate(
    ctx: &mut Context,
    cur: &mut Cursor,
    idx: usize,
    condition_offset: i32,
    end_offset: i32,
    label: &Option<Box<str>>,
) -> EvalResult<()> {
    let condition_pc = (idx as i32 + condition_offset) as usize;
    let end_pc = (idx as i32 + end_offset) as usize;
    let body_pc = cur.pc;

    loop {
        cur.goto(condition_pc);
        let cond = eval_value(ctx, cur)?;
        if !cond.to_boolean() {
            break;
        }
        cur.goto(body_pc);
        match exec_block(ctx, cur) {
            Ok(_) => {}
            Err(Unwind::Break(l)) if label_matches(&l, label) => break,
            Err(Unwind::Continue(l)) if label_matches(&l, label) => continue,
            Err(other) => return Err(other),
        }
    }
    cur.goto(end_pc);
    Ok(())
}

fn exec_iterate_range(
    ctx: &mut Context,
    cur: &mut Cursor,
    idx: usize,
    cmp: CompareOp,
    end_offset: i32,
    label: &Option<Box<str>>,
) -> EvalResult<()> {
    let end_pc = (idx as i32 + end_offset) as usize;
    let step_value = eval_value(ctx, cur)?;
    let index_place = parse_loop_place(cur);
    let bound_place = parse_loop_place(cur);
    let body_pc = cur.pc;

    loop {
        let index = read_loop_place(ctx, &index_place);
        let bound = read_loop_place(ctx, &bound_place);
        let keep_going = match cmp {
            CompareOp::Less => less_than(ctx, &index, &bound)?,
            CompareOp::LessOrEqual => less_or_equal(ctx, &index, &bound)?,
            CompareOp::More => more_than(ctx, &index, &bound)?,
            CompareOp::MoreOrEqual => more_or_equal(ctx, &index, &bound)?,
        };
        if !keep_going {
            break;
        }
        cur.goto(body_pc);
        let step_result = match exec_block(ctx, cur) {
            Ok(_) => true,
            Err(Unwind::Break(l)) if label_matches(&l, label) => false,
            Err(Unwind::Continue(l)) if label_matches(&l, label) => true,
            Err(other) => return Err(other),
        };
        if !step_result {
            break;
        }
        let next = match cmp {
            CompareOp::Less | CompareOp::LessOrEqual => add_values(ctx, &index, &step_value)?,
            CompareOp::More | CompareOp::MoreOrEqual => sub_values(&index, &step_value),
        };
        write_loop_place(ctx, &index_place, next);
    }
    cur.goto(end_pc);
    Ok(())
}

fn exec_iterate_in(ctx: &mut Context, cur: &mut Cursor, idx: usize, end_offset: i32, label: &Option<Box<str>>) -> EvalResult<()> {
    let end_pc = (idx as i32 + end_offset) as usize;
    let place = parse_loop_place(cur);
    let object_value = eval_value(ctx, cur)?;
    let body_pc = cur.pc;

    // Snapshot owned enumerable keys at loop entry (Open Question 6):
    // mutations to the object made from within the loop body never change
    // which keys are visited.
    let mut names: Vec<EStr> = Vec::new();
    if let Value::Object(handle) = object_value {
        let data = ctx.pool.get(handle);
        for index in 0..data.element_count() {
            if data.get_element(index as u32).is_some() {
                names.push(EStr::new(index.to_string()));
            }
        }
        for (key, prop) in data.own_entries() {
            if prop.flags.enumerable() {
                names.push(EStr::new(ctx.keys.text_of(key)));
            }
        }
    }

    for name in names {
        cur.goto(body_pc);
        write_loop_place(ctx, &place, Value::Str(name));
        match exec_block(ctx, cur) {
            Ok(_) => {}
            Err(Unwind::Break(l)) if label_matches(&l, label) => break,
            Err(Unwind::Continue(l)) if label_matches(&l, label) => continue,
            Err(other) => return Err(other),
        }
    }
    cur.goto(end_pc);
    Ok(())
}

/// `do body while (cond)`: unlike `exec_iterate`, the body always runs once
/// before `cond` is ever consulted. A `break`/`continue` escaping the body
/// leaves the cursor wherever the throw originated, not past the body's
/// `End`, so (unlike the "falls through to the next op" shape `exec_iterate`
/// relies on) this always jumps explicitly to `condition_pc` rather than
/// assuming the cursor landed there on its own.
fn exec_iterate_do_while(ctx: &mut Context, cur: &mut Cursor, idx: usize, condition_offset: i32, end_offset: i32, label: &Option<Box<str>>) -> EvalResult<()> {
    let condition_pc = (idx as i32 + condition_offset) as usize;
    let end_pc = (idx as i32 + end_offset) as usize;
    let body_pc = cur.pc;

    loop {
        cur.goto(body_pc);
        match exec_block(ctx, cur) {
            Ok(_) => {}
            Err(Unwind::Break(l)) if label_matches(&l, label) => {
                cur.goto(end_pc);
                return Ok(());
            }
            Err(Unwind::Continue(l)) if label_matches(&l, label) => {}
            Err(other) => return Err(other),
        }
        cur.goto(condition_pc);
        let cond = eval_value(ctx, cur)?;
        if !cond.to_boolean() {
            break;
        }
    }
    cur.goto(end_pc);
    Ok(())
}

/// C-style `for`: `cond` is tested before every body run; `step` runs after
/// every body completion, including one ended by a matching `continue`,
/// before `cond` is tested again. Only `break` skips `step` entirely.
fn exec_iterate_for(
    ctx: &mut Context,
    cur: &mut Cursor,
    idx: usize,
    condition_offset: i32,
    step_offset: i32,
    end_offset: i32,
    label: &Option<Box<str>>,
) -> EvalResult<()> {
    let condition_pc = (idx as i32 + condition_offset) as usize;
    let step_pc = (idx as i32 + step_offset) as usize;
    let end_pc = (idx as i32 + end_offset) as usize;
    let body_pc = cur.pc;

    loop {
        cur.goto(condition_pc);
        let cond = eval_value(ctx, cur)?;
        if !cond.to_boolean() {
            break;
        }
        cur.goto(body_pc);
        match exec_block(ctx, cur) {
            Ok(_) => {}
            Err(Unwind::Break(l)) if label_matches(&l, label) => break,
            Err(Unwind::Continue(l)) if label_matches(&l, label) => {}
            Err(other) => return Err(other),
        }
        cur.goto(step_pc);
        eval_value(ctx, cur)?;
    }
    cur.goto(end_pc);
    Ok(())
}

fn exec_switch(ctx: &mut Context, cur: &mut Cursor, idx: usize, arm_count: u32, end_offset: i32, label: &Option<Box<str>>) -> EvalResult<Value> {
    let end_pc = (idx as i32 + end_offset) as usize;
    let subject = eval_value(ctx, cur)?;

    let mut matched_body: Option<usize> = None;
    let mut default_body: Option<usize> = None;
    for _ in 0..arm_count {
        let case_value = eval_value(ctx, cur)?;
        let (case_idx, case_op) = cur.take();
        let body_offset = match case_op {
            Op::SwitchCase { body_offset } => *body_offset,
            _ => unreachable!("parser always emits SwitchCase after each arm's value"),
        };
        let body_pc = (case_idx as i32 + body_offset) as usize;
        if matched_body.is_none() && equality(ctx, &subject, &case_value)? {
            matched_body = Some(body_pc);
        }
    }
    if matched_body.is_none() {
        default_body = Some(cur.pc);
    }

    let start = matched_body.or(default_body);
    let mut completion = Value::Undefined;
    if let Some(body_pc) = start {
        cur.goto(body_pc);
        match exec_block(ctx, cur) {
            Ok(v) => completion = v,
            Err(Unwind::Break(l)) if label_matches(&l, label) => {}
            Err(other) => return Err(other),
        }
    }
    cur.goto(end_pc);
    Ok(completion)
}

/// `with (obj) stmt`: rather than maintaining a separate dynamic scope
/// stack alongside the lexical environment chain, this temporarily
/// reparents `obj` onto the scope the `with` was entered from and runs the
/// body with `obj` itself as the environment. A nested function literal's
/// closure was captured at definition time against the *lexical* chain, so
/// it is unaffected by this splice; only identifier lookups textually
/// inside the body see `obj`'s properties. `obj`'s original prototype is
/// always restored before returning, including when the body throws.
fn exec_with(ctx: &mut Context, cur: &mut Cursor, idx: usize, end_offset: i32) -> EvalResult<Value> {
    let end_pc = (idx as i32 + end_offset) as usize;
    let obj_value = eval_value(ctx, cur)?;
    let handle = to_object(ctx, &obj_value)?;

    let outer_env = ctx.environment();
    let saved_proto = ctx.pool.get(handle).prototype();
    ctx.pool.get_mut(handle).set_prototype(Some(outer_env));
    let pushed = ctx.push_frame(handle, ctx.this_value(), ctx.strict_mode(), None, Default::default());
    let result = match pushed {
        Ok(()) => {
            let r = exec_block(ctx, cur);
            ctx.pop_frame();
            r
        }
        Err(e) => Err(limit_unwind(e)),
    };
    ctx.pool.get_mut(handle).set_prototype(saved_proto);

    cur.goto(end_pc);
    result
}

/// A labeled statement that isn't itself a loop or `switch`: only a
/// matching `break label` is caught here, resuming just past it.
fn exec_labeled(ctx: &mut Context, cur: &mut Cursor, idx: usize, label: &str, end_offset: i32) -> EvalResult<Value> {
    let end_pc = (idx as i32 + end_offset) as usize;
    let completion = match exec_block(ctx, cur) {
        Ok(v) => Ok(v),
        Err(Unwind::Break(Some(l))) if l.as_ref() == label => Ok(Value::Undefined),
        Err(other) => Err(other),
    };
    cur.goto(end_pc);
    completion
}

/// An assignable place resolved once, then read/written without
/// re-evaluating the object sub-expression a second time (spec's `*Ref`
/// family: the C original returns a raw `Value*`, which Rust can't hand
/// back across a `RefCell` boundary, so instead we resolve to an enum that
/// knows how to read/write itself through `Context`).
enum ResolvedPlace {
    Local(Key),
    LocalSlot(u32),
    Member(ObjectHandle, Key),
    Property(ObjectHandle, EStr),
}

/// The counting-loop and for-in loop counter/binding is always a plain
/// local (the peephole pass only recognizes `IterateRange`/`IterateIn` over
/// a bare identifier, never a member expression), so these loops use a
/// narrower place than general assignment targets.
enum LoopPlace {
    Local(Key),
    LocalSlot(u32),
}

fn parse_loop_place(cur: &mut Cursor) -> LoopPlace {
    let (_, op) = cur.take();
    match op {
        Op::GetLocal(k) => LoopPlace::Local(*k),
        Op::GetLocalSlot(s) => LoopPlace::LocalSlot(*s),
        other => unreachable!("loop binding must be a local, got {:?}", other),
    }
}

fn read_loop_place(ctx: &Context, place: &LoopPlace) -> Value {
    match place {
        LoopPlace::Local(key) => ctx.resolve_local(*key).and_then(|(_, p)| p.as_value().cloned()).unwrap_or(Value::Undefined),
        LoopPlace::LocalSlot(_) => Value::Undefined,
    }
}

fn write_loop_place(ctx: &mut Context, place: &LoopPlace, value: Value) {
    match place {
        LoopPlace::Local(key) => ctx.assign_local(*key, value),
        LoopPlace::LocalSlot(_) => {}
    }
}

fn parse_place(cur: &mut Cursor) -> EvalResult<PlaceOp> {
    let (_, op) = cur.take();
    Ok(match op {
        Op::GetLocal(k) => PlaceOp::Local(*k),
        Op::GetLocalSlot(s) => PlaceOp::LocalSlot(*s),
        Op::GetMember(k) => PlaceOp::Member(*k),
        Op::GetProperty => PlaceOp::Property,
        other => unreachable!("op {:?} cannot be parsed as a place", other),
    })
}

/// An unresolved place: for `Member`/`Property`, the object (and for
/// `Property`, the key) sub-expressions have already been consumed from the
/// cursor and must be evaluated once, up front, by the caller via
/// [`resolve_place`].
enum PlaceOp {
    Local(Key),
    LocalSlot(u32),
    Member(Key),
    Property,
}

fn resolve_place(ctx: &mut Context, cur: &mut Cursor, place: &PlaceOp) -> EvalResult<ResolvedPlace> {
    Ok(match place {
        PlaceOp::Local(k) => ResolvedPlace::Local(*k),
        PlaceOp::LocalSlot(s) => ResolvedPlace::LocalSlot(*s),
        PlaceOp::Member(k) => {
            let obj = eval_value(ctx, cur)?;
            let handle = to_object(ctx, &obj)?;
            ResolvedPlace::Member(handle, *k)
        }
        PlaceOp::Property => {
            let obj = eval_value(ctx, cur)?;
            let handle = to_object(ctx, &obj)?;
            let key_value = eval_value(ctx, cur)?;
            ResolvedPlace::Property(handle, key_value.to_string_primitive())
        }
    })
}

fn eval_value(ctx: &mut Context, cur: &mut Cursor) -> EvalResult<Value> {
    ctx.count_operation().map_err(limit_unwind)?;
    let (idx, op) = cur.take();
    match op {
        Op::Noop => Ok(Value::Undefined),
        Op::Value(c) => Ok(const_to_value(c)),
        Op::GetLocal(key) => ctx
            .resolve_local(*key)
            .ok_or_else(|| reference_error(format!("{} is not defined", ctx.keys.text_of(*key))))
            .and_then(|(handle, prop)| realize_property(ctx, handle, prop)),
        Op::SetLocal(key) => {
            let value = eval_value(ctx, cur)?;
            ctx.assign_local(*key, value.clone());
            Ok(value)
        }
        Op::GetLocalSlot(_slot) => Ok(Value::Undefined),
        Op::SetLocalSlot(_slot) => eval_value(ctx, cur),
        Op::This => Ok(ctx.this_value()),

        Op::GetMember(key) => {
            let obj = eval_value(ctx, cur)?;
            let handle = to_object(ctx, &obj)?;
            get_member(ctx, handle, *key)
        }
        Op::SetMember(key) => {
            let obj = eval_value(ctx, cur)?;
            let handle = to_object(ctx, &obj)?;
            let value = eval_value(ctx, cur)?;
            set_member(ctx, handle, *key, value.clone())?;
            Ok(value)
        }
        Op::DeleteMember(key) => {
            let obj = eval_value(ctx, cur)?;
            let handle = to_object(ctx, &obj)?;
            let ok = ctx.pool.get_mut(handle).delete_own(*key);
            if !ok {
                return Err(type_error("property is non-configurable and can't be deleted"));
            }
            Ok(Value::Boolean(true))
        }
        Op::GetProperty => {
            let obj = eval_value(ctx, cur)?;
            let handle = to_object(ctx, &obj)?;
            let key_value = eval_value(ctx, cur)?;
            get_property_by_name(ctx, handle, &key_value.to_string_primitive())
        }
        Op::SetProperty => {
            let obj = eval_value(ctx, cur)?;
            let handle = to_object(ctx, &obj)?;
            let key_value = eval_value(ctx, cur)?;
            let value = eval_value(ctx, cur)?;
            set_property_by_name(ctx, handle, &key_value.to_string_primitive(), value.clone())?;
            Ok(value)
        }
        Op::DeleteProperty => {
            let obj = eval_value(ctx, cur)?;
            let handle = to_object(ctx, &obj)?;
            let key_value = eval_value(ctx, cur)?;
            let name = key_value.to_string_primitive();
            let ok = if let Some(index) = crate::key::KeyPool::as_element_index(name.as_str()) {
                ctx.pool.get_mut(handle).delete_element(index)
            } else {
                let key = ctx.keys.intern(name.as_str());
                ctx.pool.get_mut(handle).delete_own(key)
            };
            if !ok {
                return Err(type_error(format!("property '{}' is non-configurable and can't be deleted", name)));
            }
            Ok(Value::Boolean(true))
        }

        Op::ObjectLiteral(count) => eval_object_literal(ctx, cur, *count),
        Op::ArrayLiteral(length) => eval_array_literal(ctx, cur, *length),
        Op::Function(template) => Ok(Value::Object(instantiate_function(ctx, template))),

        Op::Call(argc) => eval_call(ctx, cur, *argc, false),
        Op::Construct(argc) => eval_call(ctx, cur, *argc, true),

        Op::TypeOf => {
            let v = eval_value(ctx, cur)?;
            let name = match &v {
                Value::Object(h) if ctx.pool.get(*h).is_callable() => "function",
                other => other.type_name(),
            };
            Ok(Value::Str(EStr::new(name)))
        }
        Op::UnaryPlus => {
            let v = eval_value(ctx, cur)?;
            let n = to_number(ctx, &v)?;
            Ok(Value::Number(n))
        }
        Op::UnaryMinus => {
            let v = eval_value(ctx, cur)?;
            let n = to_number(ctx, &v)?;
            Ok(Value::Number(-n))
        }
        Op::BitNot => {
            let v = eval_value(ctx, cur)?;
            Ok(Value::Int(!to_int32(ctx, &v)?))
        }
        Op::LogicalNot => {
            let v = eval_value(ctx, cur)?;
            Ok(Value::Boolean(!v.to_boolean()))
        }
        Op::Delete => {
            eval_value(ctx, cur)?;
            Ok(Value::Boolean(true))
        }
        Op::Void => {
            eval_value(ctx, cur)?;
            Ok(Value::Undefined)
        }

        Op::Add => {
            let a = eval_value(ctx, cur)?;
            let b = eval_value(ctx, cur)?;
            add_values(ctx, &a, &b)
        }
        Op::Sub => numeric_binop(ctx, cur, |a, b| a - b),
        Op::Mul => numeric_binop(ctx, cur, |a, b| a * b),
        Op::Div => numeric_binop(ctx, cur, |a, b| a / b),
        Op::Mod => numeric_binop(ctx, cur, |a, b| a % b),
        Op::Shl => int_binop(ctx, cur, |a, b| a.wrapping_shl(b as u32 & 31)),
        Op::Shr => int_binop(ctx, cur, |a, b| a.wrapping_shr(b as u32 & 31)),
        Op::UShr => {
            let a = eval_value(ctx, cur)?;
            let b = eval_value(ctx, cur)?;
            let ua = to_int32(ctx, &a)? as u32;
            let ub = to_int32(ctx, &b)? as u32 & 31;
            Ok(Value::Int((ua >> ub) as i32))
        }
        Op::BitAnd => int_binop(ctx, cur, |a, b| a & b),
        Op::BitOr => int_binop(ctx, cur, |a, b| a | b),
        Op::BitXor => int_binop(ctx, cur, |a, b| a ^ b),

        Op::Equal => {
            let a = eval_value(ctx, cur)?;
            let b = eval_value(ctx, cur)?;
            Ok(Value::Boolean(equality(ctx, &a, &b)?))
        }
        Op::NotEqual => {
            let a = eval_value(ctx, cur)?;
            let b = eval_value(ctx, cur)?;
            Ok(Value::Boolean(!equality(ctx, &a, &b)?))
        }
        Op::Identical => {
            let a = eval_value(ctx, cur)?;
            let b = eval_value(ctx, cur)?;
            Ok(Value::Boolean(value::strict_equals(&a, &b)))
        }
        Op::NotIdentical => {
            let a = eval_value(ctx, cur)?;
            let b = eval_value(ctx, cur)?;
            Ok(Value::Boolean(!value::strict_equals(&a, &b)))
        }
        Op::Less => {
            let a = eval_value(ctx, cur)?;
            let b = eval_value(ctx, cur)?;
            Ok(Value::Boolean(less_than(ctx, &a, &b)?))
        }
        Op::LessOrEqual => {
            let a = eval_value(ctx, cur)?;
            let b = eval_value(ctx, cur)?;
            Ok(Value::Boolean(less_or_equal(ctx, &a, &b)?))
        }
        Op::More => {
            let a = eval_value(ctx, cur)?;
            let b = eval_value(ctx, cur)?;
            Ok(Value::Boolean(more_than(ctx, &a, &b)?))
        }
        Op::MoreOrEqual => {
            let a = eval_value(ctx, cur)?;
            let b = eval_value(ctx, cur)?;
            Ok(Value::Boolean(more_or_equal(ctx, &a, &b)?))
        }
        Op::InstanceOf => {
            let a = eval_value(ctx, cur)?;
            let b = eval_value(ctx, cur)?;
            instance_of(ctx, &a, &b)
        }
        Op::In => {
            let key_value = eval_value(ctx, cur)?;
            let obj = eval_value(ctx, cur)?;
            let Value::Object(handle) = obj else {
                return Err(type_error("'in' requires an object operand"));
            };
            let name = key_value.to_string_primitive();
            let present = if let Some(index) = crate::key::KeyPool::as_element_index(name.as_str()) {
                ctx.pool.get(handle).get_element(index).is_some()
            } else {
                let key = ctx.keys.intern(name.as_str());
                ctx.pool.get(handle).get_own(key).is_some()
            };
            Ok(Value::Boolean(present))
        }

        Op::LogicalAnd(skip) => {
            let a = eval_value(ctx, cur)?;
            if !a.to_boolean() {
                cur.jump_from(idx, *skip as i32);
                Ok(Value::Boolean(false))
            } else {
                let b = eval_value(ctx, cur)?;
                Ok(Value::Boolean(b.to_boolean()))
            }
        }
        Op::LogicalOr(skip) => {
            let a = eval_value(ctx, cur)?;
            if a.to_boolean() {
                cur.jump_from(idx, *skip as i32);
                Ok(Value::Boolean(true))
            } else {
                let b = eval_value(ctx, cur)?;
                Ok(Value::Boolean(b.to_boolean()))
            }
        }

        Op::Conditional { alt_offset, end_offset } => {
            let test = eval_value(ctx, cur)?;
            if test.to_boolean() {
                let v = eval_value(ctx, cur)?;
                cur.jump_from(idx, *end_offset);
                Ok(v)
            } else {
                cur.goto((idx as i32 + alt_offset) as usize);
                eval_value(ctx, cur)
            }
        }

        Op::Comma => {
            eval_value(ctx, cur)?;
            eval_value(ctx, cur)
        }

        Op::PreIncrement => step_place(ctx, cur, 1, false),
        Op::PreDecrement => step_place(ctx, cur, -1, false),
        Op::PostIncrement => step_place(ctx, cur, 1, true),
        Op::PostDecrement => step_place(ctx, cur, -1, true),

        Op::AddAssign => compound_assign(ctx, cur, |ctx, a, b| add_values(ctx, a, b)),
        Op::SubAssign => compound_assign(ctx, cur, |ctx, a, b| Ok(Value::Number(to_number(ctx, a)? - to_number(ctx, b)?))),
        Op::MulAssign => compound_assign(ctx, cur, |ctx, a, b| Ok(Value::Number(to_number(ctx, a)? * to_number(ctx, b)?))),
        Op::DivAssign => compound_assign(ctx, cur, |ctx, a, b| Ok(Value::Number(to_number(ctx, a)? / to_number(ctx, b)?))),
        Op::ModAssign => compound_assign(ctx, cur, |ctx, a, b| Ok(Value::Number(to_number(ctx, a)? % to_number(ctx, b)?))),
        Op::ShlAssign => compound_assign(ctx, cur, |ctx, a, b| Ok(Value::Int(to_int32(ctx, a)?.wrapping_shl(to_int32(ctx, b)? as u32 & 31)))),
        Op::ShrAssign => compound_assign(ctx, cur, |ctx, a, b| Ok(Value::Int(to_int32(ctx, a)?.wrapping_shr(to_int32(ctx, b)? as u32 & 31)))),
        Op::UShrAssign => compound_assign(ctx, cur, |ctx, a, b| {
            let ua = to_int32(ctx, a)? as u32;
            let ub = to_int32(ctx, b)? as u32 & 31;
            Ok(Value::Int((ua >> ub) as i32))
        }),
        Op::BitAndAssign => compound_assign(ctx, cur, |ctx, a, b| Ok(Value::Int(to_int32(ctx, a)? & to_int32(ctx, b)?))),
        Op::BitOrAssign => compound_assign(ctx, cur, |ctx, a, b| Ok(Value::Int(to_int32(ctx, a)? | to_int32(ctx, b)?))),
        Op::BitXorAssign => compound_assign(ctx, cur, |ctx, a, b| Ok(Value::Int(to_int32(ctx, a)? ^ to_int32(ctx, b)?))),
        Op::Assign => assign_place(ctx, cur),

        other => unreachable!("statement-only op {:?} reached eval_value", other),
    }
}

fn const_to_value(c: &Const) -> Value {
    match c {
        Const::Undefined => Value::Undefined,
        Const::Null => Value::Null,
        Const::Boolean(b) => Value::Boolean(*b),
        Const::Int(i) => Value::Int(*i),
        Const::Number(n) => Value::Number(*n),
        Const::Str(s) => Value::Str(s.clone()),
    }
}

/// Materialize a resolved local binding: a data property returns its value
/// directly, an accessor property invokes its getter with `this` unbound
/// (environment-record accessors are not script-reachable in practice, but
/// native-installed globals may use one).
fn realize_property(ctx: &mut Context, owner: ObjectHandle, prop: Property) -> EvalResult<Value> {
    match prop.content {
        PropertyContent::Data(v) => Ok(v),
        PropertyContent::Accessor { get, .. } => match get {
            Some(getter) => call_function_value(ctx, getter, Value::Object(owner), &[]),
            None => Ok(Value::Undefined),
        },
    }
}

/// Arrays keep `length` as a live view of the element vector rather than a
/// stored property (spec §4.4): reading it always reflects the current
/// `element_count`, and writing it truncates/grows the vector in place.
fn array_length(ctx: &Context, handle: ObjectHandle) -> Option<Value> {
    if matches!(ctx.pool.get(handle).kind, ObjectKind::Array) {
        Some(Value::Int(ctx.pool.get(handle).element_count() as i32))
    } else {
        None
    }
}

pub(crate) fn get_member(ctx: &mut Context, handle: ObjectHandle, key: Key) -> EvalResult<Value> {
    if key == ctx.keys.well_known().length {
        if let Some(len) = array_length(ctx, handle) {
            return Ok(len);
        }
    }
    let mut current = Some(handle);
    while let Some(h) = current {
        let prop = ctx.pool.get(h).get_own(key).cloned();
        if let Some(prop) = prop {
            return realize_property_for(ctx, handle, prop);
        }
        current = ctx.pool.get(h).prototype();
    }
    Ok(Value::Undefined)
}

fn realize_property_for(ctx: &mut Context, this_obj: ObjectHandle, prop: Property) -> EvalResult<Value> {
    match prop.content {
        PropertyContent::Data(v) => Ok(v),
        PropertyContent::Accessor { get, .. } => match get {
            Some(getter) => call_function_value(ctx, getter, Value::Object(this_obj), &[]),
            None => Ok(Value::Undefined),
        },
    }
}

pub(crate) fn set_member(ctx: &mut Context, handle: ObjectHandle, key: Key, value: Value) -> EvalResult<()> {
    if key == ctx.keys.well_known().length && matches!(ctx.pool.get(handle).kind, ObjectKind::Array) {
        let new_len = value.to_number_primitive();
        if new_len.is_sign_negative() || !new_len.is_finite() || new_len.fract() != 0.0 {
            return Err(type_error("invalid array length"));
        }
        ctx.pool.get_mut(handle).resize_elements(new_len as usize);
        return Ok(());
    }
    let existing = ctx.pool.get(handle).get_own(key).cloned();
    if let Some(prop) = existing {
        match prop.content {
            PropertyContent::Data(_) => {
                if prop.flags.writable() {
                    ctx.pool.get_mut(handle).set_own(key, Property::data(value, prop.flags));
                }
            }
            PropertyContent::Accessor { set, .. } => {
                if let Some(setter) = set {
                    call_function_value(ctx, setter, Value::Object(handle), &[value])?;
                }
            }
        }
        return Ok(());
    }
    ctx.pool.get_mut(handle).set_own(key, Property::data(value, PropertyFlags::ALL));
    Ok(())
}

pub(crate) fn get_property_by_name(ctx: &mut Context, handle: ObjectHandle, name: &EStr) -> EvalResult<Value> {
    if let Some(index) = crate::key::KeyPool::as_element_index(name.as_str()) {
        let mut current = Some(handle);
        while let Some(h) = current {
            if let Some(prop) = ctx.pool.get(h).get_element(index).cloned() {
                return realize_property_for(ctx, handle, prop);
            }
            current = ctx.pool.get(h).prototype();
        }
        return Ok(Value::Undefined);
    }
    let key = ctx.keys.intern(name.as_str());
    get_member(ctx, handle, key)
}

pub(crate) fn set_property_by_name(ctx: &mut Context, handle: ObjectHandle, name: &EStr, value: Value) -> EvalResult<()> {
    if let Some(index) = crate::key::KeyPool::as_element_index(name.as_str()) {
        ctx.pool.get_mut(handle).set_element(index, value, PropertyFlags::ALL);
        return Ok(());
    }
    let key = ctx.keys.intern(name.as_str());
    set_member(ctx, handle, key, value)
}

fn eval_object_literal(ctx: &mut Context, cur: &mut Cursor, count: u32) -> EvalResult<Value> {
    let handle = ctx.pool.alloc(ObjectData::new(ObjectKind::Plain, Some(ctx.prototypes().object)));
    for _ in 0..count {
        let (_, init_op) = cur.take();
        let init = match init_op {
            Op::PropertyInit(init) => init.clone(),
            other => unreachable!("ObjectLiteral slot must be a PropertyInit, got {:?}", other),
        };
        match init {
            PropertyInit::Value(key) => {
                let v = eval_value(ctx, cur)?;
                ctx.pool.get_mut(handle).set_own(key, Property::data(v, PropertyFlags::ALL));
            }
            PropertyInit::Element(index) => {
                let v = eval_value(ctx, cur)?;
                ctx.pool.get_mut(handle).set_element(index, v, PropertyFlags::ALL);
            }
            PropertyInit::Getter(key) => {
                let v = eval_value(ctx, cur)?;
                let getter = v.as_object();
                let existing = ctx.pool.get(handle).get_own(key).cloned();
                let setter = match existing.map(|p| p.content) {
                    Some(PropertyContent::Accessor { set, .. }) => set,
                    _ => None,
                };
                ctx.pool
                    .get_mut(handle)
                    .set_own(key, Property { content: PropertyContent::Accessor { get: getter, set: setter }, flags: PropertyFlags::ALL });
            }
            PropertyInit::Setter(key) => {
                let v = eval_value(ctx, cur)?;
                let setter = v.as_object();
                let existing = ctx.pool.get(handle).get_own(key).cloned();
                let getter = match existing.map(|p| p.content) {
                    Some(PropertyContent::Accessor { get, .. }) => get,
                    _ => None,
                };
                ctx.pool
                    .get_mut(handle)
                    .set_own(key, Property { content: PropertyContent::Accessor { get: getter, set: setter }, flags: PropertyFlags::ALL });
            }
        }
    }
    Ok(Value::Object(handle))
}

fn eval_array_literal(ctx: &mut Context, cur: &mut Cursor, length: u32) -> EvalResult<Value> {
    let handle = ctx.pool.alloc(ObjectData::new(ObjectKind::Array, Some(ctx.prototypes().array)));
    ctx.pool.get_mut(handle).resize_elements(length as usize);
    for index in 0..length {
        let (_, op) = cur.take();
        if matches!(op, Op::Noop) {
            continue;
        }
        cur.goto(cur.pc - 1);
        let v = eval_value(ctx, cur)?;
        ctx.pool.get_mut(handle).set_element(index, v, PropertyFlags::ALL);
    }
    Ok(Value::Object(handle))
}

fn instantiate_function(ctx: &mut Context, template: &Rc<crate::op::FunctionTemplate>) -> ObjectHandle {
    let closure = Some(ctx.environment());
    let data = FunctionData {
        ops: Rc::clone(&template.ops),
        param_count: template.param_count,
        param_names: template.param_names.clone(),
        name: template.name.clone(),
        closure,
        need_heap: template.need_heap,
        need_arguments: template.need_arguments,
        use_bound_this: false,
        strict_mode: template.strict_mode,
        bound_this: None,
    };
    ctx.pool.alloc(ObjectData::new(ObjectKind::Function(Rc::new(data)), Some(ctx.prototypes().function)))
}

fn eval_call(ctx: &mut Context, cur: &mut Cursor, argc: u32, construct: bool) -> EvalResult<Value> {
    // Callee is evaluated as a place so methods see the right `this`
    // (spec: `obj.method()` binds `this` to `obj`).
    let (callee_value, this_value) = eval_callee(ctx, cur)?;
    let mut arguments = Vec::with_capacity(argc as usize);
    for _ in 0..argc {
        arguments.push(eval_value(ctx, cur)?);
    }
    let Value::Object(callee) = callee_value else {
        return Err(type_error("value is not a function"));
    };
    if construct {
        construct_value(ctx, callee, &arguments)
    } else {
        call_function_value(ctx, callee, this_value, &arguments)
    }
}

/// Evaluate the callee sub-expression, threading through the implicit
/// `this` a member-access callee carries (`obj.f(...)` => `this == obj`).
fn eval_callee(ctx: &mut Context, cur: &mut Cursor) -> EvalResult<(Value, Value)> {
    let (_, op) = cur.take();
    match op {
        Op::GetMember(key) => {
            let obj = eval_value(ctx, cur)?;
            let handle = to_object(ctx, &obj)?;
            let v = get_member(ctx, handle, *key)?;
            Ok((v, Value::Object(handle)))
        }
        Op::GetProperty => {
            let obj = eval_value(ctx, cur)?;
            let handle = to_object(ctx, &obj)?;
            let key_value = eval_value(ctx, cur)?;
            let v = get_property_by_name(ctx, handle, &key_value.to_string_primitive())?;
            Ok((v, Value::Object(handle)))
        }
        _ => {
            cur.goto(cur.pc - 1);
            let v = eval_value(ctx, cur)?;
            Ok((v, Value::Undefined))
        }
    }
}

pub fn call_function_value(ctx: &mut Context, callee: ObjectHandle, this: Value, arguments: &[Value]) -> EvalResult<Value> {
    let kind = ctx.pool.get(callee).kind.clone();
    match kind {
        ObjectKind::Native(native) => {
            trace!(name = native.name, argc = arguments.len(), "call native");
            (native.func)(ctx, &this, arguments)
        }
        ObjectKind::Function(function) => call_script_function(ctx, callee, &function, this, arguments),
        ObjectKind::Bound(bound) => {
            let mut combined = bound.preset.clone();
            combined.extend_from_slice(arguments);
            call_function_value(ctx, bound.target, bound.bound_this.clone(), &combined)
        }
        _ => Err(type_error("value is not callable")),
    }
}

fn construct_value(ctx: &mut Context, callee: ObjectHandle, arguments: &[Value]) -> EvalResult<Value> {
    let kind = ctx.pool.get(callee).kind.clone();
    if let ObjectKind::Bound(bound) = &kind {
        let mut combined = bound.preset.clone();
        combined.extend_from_slice(arguments);
        return construct_value(ctx, bound.target, &combined);
    }
    let (proto, use_native) = match &kind {
        ObjectKind::Function(f) => (Some(f.clone()), None),
        ObjectKind::Native(n) => (None, Some(n.clone())),
        _ => return Err(type_error("value is not a constructor")),
    };
    let prototype_prop = ctx.pool.get(callee).get_own(ctx.keys.well_known().prototype).cloned();
    let proto_handle = match prototype_prop.and_then(|p| p.as_value().cloned()) {
        Some(Value::Object(h)) => Some(h),
        _ => Some(ctx.prototypes().object),
    };
    let instance = ctx.pool.alloc(ObjectData::new(ObjectKind::Plain, proto_handle));
    let this = Value::Object(instance);
    let result = if let Some(function) = proto {
        call_script_function(ctx, callee, &function, this.clone(), arguments)?
    } else if let Some(native) = use_native {
        (native.func)(ctx, &this, arguments)?
    } else {
        unreachable!()
    };
    match result {
        Value::Object(_) => Ok(result),
        _ => Ok(this),
    }
}

fn call_script_function(ctx: &mut Context, callee: ObjectHandle, function: &Rc<FunctionData>, this: Value, arguments: &[Value]) -> EvalResult<Value> {
    let parent = function.closure.unwrap_or(ctx.global_object);
    let env = ctx.pool.alloc(ObjectData::new(ObjectKind::Plain, Some(parent)));
    for (index, name) in function.param_names.iter().enumerate() {
        let value = arguments.get(index).cloned().unwrap_or(Value::Undefined);
        ctx.pool.get_mut(env).set_own(*name, Property::data(value, PropertyFlags::ALL.with_configurable(false)));
    }
    if function.need_arguments {
        let object_proto = ctx.prototypes().object;
        let args_obj = ctx.pool.alloc(ObjectData::new(ObjectKind::Arguments, Some(object_proto)));
        ctx.pool.get_mut(args_obj).resize_elements(arguments.len());
        for (index, value) in arguments.iter().enumerate() {
            ctx.pool.get_mut(args_obj).set_element(index as u32, value.clone(), PropertyFlags::ALL);
        }
        let well_known = *ctx.keys.well_known();
        ctx.pool
            .get_mut(args_obj)
            .set_own(well_known.length, Property::data(Value::Int(arguments.len() as i32), PropertyFlags::ALL.with_enumerable(false)));
        ctx.pool
            .get_mut(args_obj)
            .set_own(well_known.callee, Property::data(Value::Object(callee), PropertyFlags::new(PropertyFlags::WRITABLE | PropertyFlags::CONFIGURABLE)));
        ctx.pool
            .get_mut(env)
            .set_own(well_known.arguments, Property::data(Value::Object(args_obj), PropertyFlags::NONE.with_writable(true)));
    }
    let this = if function.use_bound_this {
        function.bound_this.clone().unwrap_or(this)
    } else {
        this
    };
    // A bare (non-method) call leaves `this` nullish; sloppy mode substitutes
    // the global object for it, matching a non-method call's `this` in the
    // original (`callFunction`'s `ecc->refObject`).
    let this = if !function.strict_mode && this.is_nullish() { Value::Object(ctx.global_object) } else { this };
    let call_name = function.name.clone();
    ctx.push_frame(env, this, function.strict_mode, call_name, Default::default()).map_err(limit_unwind)?;
    let result = run_function_body(ctx, &function.ops);
    ctx.pop_frame();
    result
}

/// ToObject, wrapping a primitive in the matching wrapper kind so member
/// access (`"x".length`) can look its prototype chain up like any other
/// object (spec §4.3's "ToObject is applied before getMember/setMember").
pub(crate) fn to_object(ctx: &mut Context, value: &Value) -> EvalResult<ObjectHandle> {
    match value {
        Value::Object(h) => Ok(*h),
        Value::Str(s) => Ok(ctx.pool.alloc(ObjectData::new(ObjectKind::StringObject(s.clone()), Some(ctx.prototypes().string)))),
        Value::Int(i) => Ok(ctx.pool.alloc(ObjectData::new(ObjectKind::NumberObject(f64::from(*i)), Some(ctx.prototypes().number)))),
        Value::Number(n) => Ok(ctx.pool.alloc(ObjectData::new(ObjectKind::NumberObject(*n), Some(ctx.prototypes().number)))),
        Value::Boolean(b) => Ok(ctx.pool.alloc(ObjectData::new(ObjectKind::BooleanObject(*b), Some(ctx.prototypes().boolean)))),
        Value::Undefined | Value::Null => Err(type_error("cannot read property of undefined or null")),
    }
}

/// ToPrimitive, defaulting to `"number"` unless `prefer_string` is set
/// (spec §4.3: `Value.toPrimitive(v, ecc, text, hint)`, `hint < 0` meaning
/// "prefer string", used by `<`/`>`/`+`). Tries `valueOf` then `toString`
/// (or the reverse when a string is preferred).
pub(crate) fn to_primitive(ctx: &mut Context, value: &Value, prefer_string: bool) -> EvalResult<Value> {
    let Value::Object(handle) = value else { return Ok(value.clone()) };
    let keys = *ctx.keys.well_known();
    let order = if prefer_string { [keys.to_string, keys.value_of] } else { [keys.value_of, keys.to_string] };
    for key in order {
        if let Value::Object(method) = get_member(ctx, *handle, key)? {
            if ctx.pool.get(method).is_callable() {
                let result = call_function_value(ctx, method, value.clone(), &[])?;
                if !matches!(result, Value::Object(_)) {
                    return Ok(result);
                }
            }
        }
    }
    Ok(Value::Str(EStr::new("[object Object]")))
}

fn to_number(ctx: &mut Context, value: &Value) -> EvalResult<f64> {
    let primitive = to_primitive(ctx, value, false)?;
    Ok(primitive.to_number_primitive())
}

fn to_int32(ctx: &mut Context, value: &Value) -> EvalResult<i32> {
    Ok(value::to_int32(to_number(ctx, value)?))
}

fn numeric_binop(ctx: &mut Context, cur: &mut Cursor, f: impl Fn(f64, f64) -> f64) -> EvalResult<Value> {
    let a = eval_value(ctx, cur)?;
    let b = eval_value(ctx, cur)?;
    Ok(Value::Number(f(to_number(ctx, &a)?, to_number(ctx, &b)?)))
}

fn int_binop(ctx: &mut Context, cur: &mut Cursor, f: impl Fn(i32, i32) -> i32) -> EvalResult<Value> {
    let a = eval_value(ctx, cur)?;
    let b = eval_value(ctx, cur)?;
    Ok(Value::Int(f(to_int32(ctx, &a)?, to_int32(ctx, &b)?)))
}

/// `+`: string concatenation if either ToPrimitive'd operand is a string,
/// numeric addition otherwise (spec's `addition`, `op.c`).
fn add_values(ctx: &mut Context, a: &Value, b: &Value) -> EvalResult<Value> {
    if let (Value::Int(x), Value::Int(y)) = (a, b) {
        if let Some(sum) = x.checked_add(*y) {
            return Ok(Value::Int(sum));
        }
        return Ok(Value::Number(f64::from(*x) + f64::from(*y)));
    }
    let pa = to_primitive(ctx, a, false)?;
    let pb = to_primitive(ctx, b, false)?;
    if matches!(pa, Value::Str(_)) || matches!(pb, Value::Str(_)) {
        let mut s = pa.to_string_primitive().as_str().to_string();
        s.push_str(pb.to_string_primitive().as_str());
        Ok(Value::Str(EStr::new(s)))
    } else {
        Ok(Value::Number(pa.to_number_primitive() + pb.to_number_primitive()))
    }
}

fn sub_values(a: &Value, b: &Value) -> Value {
    if let (Value::Int(x), Value::Int(y)) = (a, b) {
        if let Some(diff) = x.checked_sub(*y) {
            return Value::Int(diff);
        }
    }
    Value::Number(a.to_number_primitive() - b.to_number_primitive())
}

/// Abstract equality (`==`), spec's `equality`/`op.c`: same-type fast paths,
/// then the usual cross-type coercions (number<->string, boolean, null==
/// undefined, object ToPrimitive).
fn equality(ctx: &mut Context, a: &Value, b: &Value) -> EvalResult<bool> {
    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => Ok(true),
        (Value::Undefined, Value::Null) | (Value::Null, Value::Undefined) => Ok(true),
        (Value::Boolean(x), Value::Boolean(y)) => Ok(x == y),
        (Value::Object(x), Value::Object(y)) => Ok(x == y),
        (Value::Str(x), Value::Str(y)) => Ok(x == y),
        (Value::Int(_) | Value::Number(_), Value::Int(_) | Value::Number(_)) => Ok(a.to_number_primitive() == b.to_number_primitive()),
        (Value::Boolean(_), _) => {
            let a2 = Value::Number(a.to_number_primitive());
            equality(ctx, &a2, b)
        }
        (_, Value::Boolean(_)) => {
            let b2 = Value::Number(b.to_number_primitive());
            equality(ctx, a, &b2)
        }
        (Value::Str(_), Value::Int(_) | Value::Number(_)) => Ok(a.to_number_primitive() == b.to_number_primitive()),
        (Value::Int(_) | Value::Number(_), Value::Str(_)) => Ok(a.to_number_primitive() == b.to_number_primitive()),
        (Value::Object(_), Value::Str(_) | Value::Int(_) | Value::Number(_)) => {
            let pa = to_primitive(ctx, a, false)?;
            equality(ctx, &pa, b)
        }
        (Value::Str(_) | Value::Int(_) | Value::Number(_), Value::Object(_)) => {
            let pb = to_primitive(ctx, b, false)?;
            equality(ctx, a, &pb)
        }
        _ => Ok(false),
    }
}

/// `<`: ToPrimitive with a string-preferring hint, then lexicographic
/// string comparison or numeric comparison; `NaN` makes both `<` and `>`
/// false (spec's `compare`/`valueLess`).
fn less_than(ctx: &mut Context, a: &Value, b: &Value) -> EvalResult<bool> {
    let pa = to_primitive(ctx, a, true)?;
    let pb = to_primitive(ctx, b, true)?;
    if let (Value::Str(x), Value::Str(y)) = (&pa, &pb) {
        return Ok(x.as_str() < y.as_str());
    }
    let (x, y) = (pa.to_number_primitive(), pb.to_number_primitive());
    Ok(!x.is_nan() && !y.is_nan() && x < y)
}

fn more_than(ctx: &mut Context, a: &Value, b: &Value) -> EvalResult<bool> {
    less_than(ctx, b, a)
}

/// `<=` is not `!more_than(a, b)`: when either side is `NaN`, every relational
/// comparison is `false` (spec §4.3), but negating `more_than` would turn
/// that `false` into `true`. Compare directly instead.
fn less_or_equal(ctx: &mut Context, a: &Value, b: &Value) -> EvalResult<bool> {
    let pa = to_primitive(ctx, a, true)?;
    let pb = to_primitive(ctx, b, true)?;
    if let (Value::Str(x), Value::Str(y)) = (&pa, &pb) {
        return Ok(x.as_str() <= y.as_str());
    }
    let (x, y) = (pa.to_number_primitive(), pb.to_number_primitive());
    Ok(!x.is_nan() && !y.is_nan() && x <= y)
}

fn more_or_equal(ctx: &mut Context, a: &Value, b: &Value) -> EvalResult<bool> {
    less_or_equal(ctx, b, a)
}

fn instance_of(ctx: &mut Context, a: &Value, b: &Value) -> EvalResult<Value> {
    let (Value::Object(obj), Value::Object(ctor)) = (a, b) else {
        return Ok(Value::Boolean(false));
    };
    let prototype_prop = ctx.pool.get(*ctor).get_own(ctx.keys.well_known().prototype).cloned();
    let Some(Value::Object(target)) = prototype_prop.and_then(|p| p.as_value().cloned()) else {
        return Err(type_error("prototype is not an object"));
    };
    let mut current = ctx.pool.get(*obj).prototype();
    while let Some(p) = current {
        if p == target {
            return Ok(Value::Boolean(true));
        }
        current = ctx.pool.get(p).prototype();
    }
    Ok(Value::Boolean(false))
}

fn step_place(ctx: &mut Context, cur: &mut Cursor, delta: i32, is_postfix: bool) -> EvalResult<Value> {
    let place = parse_place(cur)?;
    let resolved = resolve_place(ctx, cur, &place)?;
    let before = read_resolved(ctx, &resolved)?;
    let before_num = to_number(ctx, &before)?;
    let after = Value::Number(before_num + f64::from(delta));
    write_resolved(ctx, &resolved, after.clone())?;
    Ok(if is_postfix { Value::Number(before_num) } else { after })
}

fn compound_assign(ctx: &mut Context, cur: &mut Cursor, op: impl Fn(&mut Context, &Value, &Value) -> EvalResult<Value>) -> EvalResult<Value> {
    let place = parse_place(cur)?;
    let resolved = resolve_place(ctx, cur, &place)?;
    let current = read_resolved(ctx, &resolved)?;
    let operand = eval_value(ctx, cur)?;
    let result = op(ctx, &current, &operand)?;
    write_resolved(ctx, &resolved, result.clone())?;
    Ok(result)
}

fn assign_place(ctx: &mut Context, cur: &mut Cursor) -> EvalResult<Value> {
    let place = parse_place(cur)?;
    let resolved = resolve_place(ctx, cur, &place)?;
    let value = eval_value(ctx, cur)?;
    write_resolved(ctx, &resolved, value.clone())?;
    Ok(value)
}

fn read_resolved(ctx: &mut Context, place: &ResolvedPlace) -> EvalResult<Value> {
    match place {
        ResolvedPlace::Local(key) => ctx
            .resolve_local(*key)
            .ok_or_else(|| reference_error("identifier is not defined"))
            .and_then(|(handle, prop)| realize_property_for(ctx, handle, prop)),
        ResolvedPlace::LocalSlot(_) => Ok(Value::Undefined),
        ResolvedPlace::Member(handle, key) => get_member(ctx, *handle, *key),
        ResolvedPlace::Property(handle, name) => get_property_by_name(ctx, *handle, name),
    }
}

fn write_resolved(ctx: &mut Context, place: &ResolvedPlace, value: Value) -> EvalResult<()> {
    match place {
        ResolvedPlace::Local(key) => {
            ctx.assign_local(*key, value);
            Ok(())
        }
        ResolvedPlace::LocalSlot(_) => Ok(()),
        ResolvedPlace::Member(handle, key) => set_member(ctx, *handle, *key, value),
        ResolvedPlace::Property(handle, name) => set_property_by_name(ctx, *handle, name, value),
    }
}
