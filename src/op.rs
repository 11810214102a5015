//! The flat operation list produced by the parser and walked by the
//! interpreter, spec §4.3.
//!
//! `original_source/src/op.c` threads execution through an array of
//! `struct Op { native, value, text }` and a shared cursor: a native
//! function reads its own `value`/`text`, then recurses into the *next*
//! slots of the same array (via `nextOp()`) to obtain its operands, which
//! may themselves be multi-slot sub-expressions. This file keeps that flat,
//! cursor-driven shape — [`Op`] is data-only (no function pointers, no
//! `unsafe`), dispatched by `match` in `interpreter.rs`, which owns the
//! cursor and performs the same "recurse into the following slots" walk.
//! Composite instructions (`Call`, `ObjectLiteral`, loops, `try`, ...) carry
//! the slot counts/offsets the parser computed so the interpreter knows how
//! many following slots to consume, exactly as `op.c`'s `value.data.integer`
//! operand counts do.
//!
//! Jump-ish ops (`Jump`, `JumpIf`, loops, `try`, `switch`) carry an offset:
//! the number of slots to advance the cursor by, relative to the op's own
//! position — the same convention `op.c` uses (`*ops += offset`), which
//! keeps an `OpList` relocatable and makes a function body's compiled slots
//! independently splice-able into a surrounding list.

use crate::estr::EStr;
use crate::key::Key;
use smallvec::SmallVec;
use std::rc::Rc;

/// A literal constant folded in by the parser (spec `value`/`integerValue`).
#[derive(Debug, Clone)]
pub enum Const {
    Undefined,
    Null,
    Boolean(bool),
    Int(i32),
    Number(f64),
    Str(EStr),
}

/// One property initializer in an object literal (spec §4.3 `object`); each
/// variant is immediately followed in the op list by the one or two op
/// slots it names (a getter/setter pair's body, or a value expression).
#[derive(Debug, Clone)]
pub enum PropertyInit {
    Value(Key),
    Element(u32),
    Getter(Key),
    Setter(Key),
}

/// A compiled function literal's static shape. `object.rs`'s `FunctionData`
/// pairs one of these with the closure environment captured at the point
/// the literal executed.
#[derive(Debug)]
pub struct FunctionTemplate {
    pub ops: Rc<Vec<Op>>,
    pub param_count: u32,
    pub param_names: Vec<Key>,
    pub name: Option<EStr>,
    /// Set when the parser proved some nested closure outlives the call
    /// (spec's `needHeap`): the call frame's locals must be heap-allocated
    /// rather than living in a stack-popped `Vec`.
    pub need_heap: bool,
    /// Set when the body references `arguments`.
    pub need_arguments: bool,
    pub strict_mode: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Less,
    LessOrEqual,
    More,
    MoreOrEqual,
}

/// One instruction. A slot's operands (if any) are the op(s) immediately
/// following it in the owning `Vec<Op>`; see the module doc for the walk
/// convention.
#[derive(Debug, Clone)]
pub enum Op {
    /// Evaluates to `undefined`, consuming no further slots.
    Noop,
    Value(Const),

    /// Named local lookup (spec `getLocal`); the interpreter decides
    /// value-vs-place at the call site rather than needing a second
    /// `getLocalRef` entry point, since `Result` already distinguishes
    /// "read" from "assign".
    GetLocal(Key),
    SetLocal(Key),
    /// Slot-indexed local, used when the parser proved the binding can't be
    /// shadowed by `with`/`eval` (spec `getLocalSlot`).
    GetLocalSlot(u32),
    SetLocalSlot(u32),
    This,

    /// `a.b` / `a["b"]` with a statically known name.
    GetMember(Key),
    SetMember(Key),
    DeleteMember(Key),
    /// `a[expr]`: the next op slot evaluates the property name.
    GetProperty,
    SetProperty,
    DeleteProperty,

    /// `count` property initializers follow, each a [`PropertyInit`] slot
    /// followed by its value op(s).
    ObjectLiteral(u32),
    /// One property initializer within an `ObjectLiteral`'s slot run.
    PropertyInit(PropertyInit),
    /// `length` element ops follow (`Noop` standing in for an elided hole).
    ArrayLiteral(u32),
    Function(Rc<FunctionTemplate>),

    /// `argument_count` argument ops follow the callee op.
    Call(u32),
    Construct(u32),

    TypeOf,
    UnaryPlus,
    UnaryMinus,
    BitNot,
    LogicalNot,
    Delete,
    Void,

    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Shl,
    Shr,
    UShr,
    BitAnd,
    BitOr,
    BitXor,

    Equal,
    NotEqual,
    Identical,
    NotIdentical,
    Less,
    LessOrEqual,
    More,
    MoreOrEqual,
    InstanceOf,
    In,

    /// Short-circuiting: `skip` is how many slots to jump forward by when
    /// the left operand already decides the result (spec `logicalAnd`).
    LogicalAnd(u32),
    LogicalOr(u32),
    /// `test ? cons : alt`. The consequent falls through naturally into
    /// `end_offset` after evaluating; the alternate is reached by jumping to
    /// `alt_offset` and needs no further jump since it already ends at the
    /// same position. Kept distinct from the statement-only `Jump` family
    /// since this must be usable from `eval_value`, not just `exec_sequence`.
    Conditional { alt_offset: i32, end_offset: i32 },
    /// `left, right` (the comma operator): `left` is evaluated and
    /// discarded, then `right` is evaluated and its value returned. Needs
    /// its own op for the same reason `Conditional` does — `Discard` is
    /// only ever dispatched from `exec_sequence`, but a comma expression
    /// can appear anywhere an expression can, e.g. a `for` loop's update
    /// clause or a parenthesized argument.
    Comma,

    /// Pre/post increment/decrement of the place named by the next op slot
    /// (a `GetLocal`/`GetLocalSlot`/`GetMember`/`GetProperty` reinterpreted
    /// as an assignable place by the interpreter).
    PreIncrement,
    PreDecrement,
    PostIncrement,
    PostDecrement,
    /// Compound assignment: place op, then value op.
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    ShlAssign,
    ShrAssign,
    UShrAssign,
    BitAndAssign,
    BitOrAssign,
    BitXorAssign,
    /// Plain `place = value`.
    Assign,

    /// Set the completion value to the next op's result, then continue
    /// (spec `expression`; every statement compiles to one of these).
    Expression,
    /// Evaluate and discard the next op's result (e.g. the update clause of
    /// a C-style `for`), then continue.
    Discard,

    /// Advance the cursor by `offset` slots, unconditionally.
    Jump(i32),
    /// Consume the next op as a condition; advance by `offset` if true.
    JumpIf(i32),
    JumpIfNot(i32),
    /// `subject` op, then `arm_count` `(case value ops..., SwitchCase)`
    /// pairs up to `end_offset`, matched top-to-bottom with `Equal`
    /// semantics; `SwitchCase` carries the jump-past-body offset for its
    /// arm. Falls through to `end_offset` if nothing matches and there's no
    /// default arm. `label` is this switch's name for a labeled `break`.
    Switch { arm_count: u32, end_offset: i32, label: Option<Box<str>> },
    SwitchCase { body_offset: i32 },

    Return,
    Throw,
    /// `break [label]`: an unlabeled break is caught by the nearest
    /// enclosing loop or `switch`; a labeled one skips past any that don't
    /// carry a matching `label` (spec: "labels stack with a depth counter").
    Break(Option<Box<str>>),
    Continue(Option<Box<str>>),

    /// `catch_offset` is 0 when there is no `catch` clause; the binding's
    /// key otherwise follows the body at `catch_offset` as a `CatchBind`.
    /// `end_offset` marks where an (optional) `finally` block begins, and
    /// where control resumes after it.
    Try { catch_offset: i32, end_offset: i32 },
    CatchBind(Key),

    /// General `while`-shaped loop (spec `iterate`): `condition_offset`
    /// slots forward is the loop condition; the body follows immediately;
    /// `end_offset` is where to resume after the loop. `label` is the name
    /// this loop answers to for a labeled `break`/`continue`, if any.
    Iterate { condition_offset: i32, end_offset: i32, label: Option<Box<str>> },
    /// Specialized counting loop recognized by the peephole pass (spec
    /// `iterateLessRef`/`iterateMoreRef`/...). Slot order: step value,
    /// index place, bound place, then body; `cmp` picks the comparison and
    /// step direction.
    IterateRange { cmp: CompareOp, end_offset: i32, label: Option<Box<str>> },
    /// `for (x in obj)`: `place` op, then `object` op, then body; snapshots
    /// owned enumerable keys at loop entry (Open Question 6).
    IterateIn { end_offset: i32, label: Option<Box<str>> },
    /// `do body while (cond)`: body runs unconditionally once, then `cond`
    /// (at `condition_offset`, right after the body's `End`) gates every
    /// repeat. Kept separate from `Iterate` rather than overloading it,
    /// since a test-at-bottom loop's first entry must skip the condition
    /// check entirely — unlike `while`/`for`, where the parser places the
    /// condition so it's always reached before the body runs the first time.
    IterateDoWhile { condition_offset: i32, end_offset: i32, label: Option<Box<str>> },
    /// C-style `for (init; cond; step) body`, with `init` already emitted
    /// ahead of this op as ordinary statements. Body runs first (slot order:
    /// body, `End`, then `cond`, then `step`); unlike `Iterate`, `step` is a
    /// distinct region run after every body completion *including* a
    /// `continue`, matching `for`'s requirement that the update expression
    /// still runs when the body is skipped early — `Iterate`'s single
    /// condition region can't express that without re-running `cond` in its
    /// place, which would be wrong when `cond` has side effects.
    IterateFor { condition_offset: i32, step_offset: i32, end_offset: i32, label: Option<Box<str>> },

    /// Hoists a `var`/function-declared binding as `undefined` in the
    /// current scope before the rest of the body runs (spec's hoisting
    /// pass). A no-op if a non-`undefined` value is already bound there —
    /// see `Context::declare_local`. Statement-only, emitted once per
    /// hoisted name at the front of each function/program body.
    DeclareLocal(Key),

    /// `with (obj) stmt` (spec §4.2; rejected by the parser in strict
    /// scopes). The next op evaluates `obj`; the interpreter temporarily
    /// reparents it onto the current scope chain and runs the body with
    /// `obj` itself as the environment, restoring its original prototype
    /// afterward — see `interpreter.rs::exec_with` for why this is sound.
    With { end_offset: i32 },

    /// Wraps a labeled statement that isn't itself a loop or `switch` (spec
    /// allows labeling any statement). Only `break label` targets it;
    /// `continue label` is a parse error unless `label` names a loop.
    Labeled { label: Box<str>, end_offset: i32 },

    /// Marks the end of the enclosing block. Emitted by the parser after a
    /// function body / top-level program, and after every nested block a
    /// loop/`try`/`catch`/`finally` introduces, so the interpreter's
    /// sequence walker knows where to stop without needing the surrounding
    /// jump offset to double as a length.
    End,
}
