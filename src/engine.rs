//! The host-facing entry point: construct an interpreter, install the
//! global object and builtins, evaluate source text, collect garbage, tear
//! down. Mirrors the host API surface a single-threaded embeddable
//! interpreter exposes to its caller.

use crate::context::{Context, Limits};
use crate::error::{Error, Position, Unwind};
use crate::interpreter::{self, EvalResult};
use crate::key::Key;
use crate::object::{NativeFn, NativeFunctionData, ObjectData, ObjectKind, Property, PropertyFlags};
use crate::text::{Input, Text};
use crate::value::Value;
use std::rc::Rc;
use tracing::{debug, trace};

/// Resource bounds handed to [`Engine::new`]. Converts into the internal
/// [`Limits`] the [`Context`] enforces while running.
#[derive(Debug, Clone, Copy)]
pub struct EngineLimits {
    pub max_call_depth: u32,
    pub max_operations: Option<u64>,
}

impl Default for EngineLimits {
    fn default() -> Self {
        EngineLimits { max_call_depth: 1024, max_operations: None }
    }
}

impl From<EngineLimits> for Limits {
    fn from(limits: EngineLimits) -> Self {
        Limits { max_call_depth: limits.max_call_depth, max_operations: limits.max_operations }
    }
}

/// Per-call evaluation options. Each [`Engine::eval`] call gets its own
/// frame, so these never leak between unrelated evaluations on the same
/// engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvalFlags {
    /// Bind top-level `this` to the global object instead of `undefined`.
    pub treat_as_global_this: bool,
    /// Coerce the completion value to a primitive before returning it.
    pub coerce_result_to_primitive: bool,
    /// Coerce the completion value to a string before returning it.
    pub coerce_result_to_string: bool,
    pub strict_mode: bool,
}

/// A single interpreter instance: one global object, one key pool, one
/// object pool. Not `Sync` — the model is one engine per thread.
pub struct Engine {
    ctx: Context,
    last_error_position: Position,
}

impl Engine {
    pub fn new(limits: EngineLimits) -> Self {
        trace!(max_call_depth = limits.max_call_depth, "constructing engine");
        let mut ctx = Context::new(limits.into());
        crate::builtins::install(&mut ctx);
        debug!("engine bootstrap complete");
        Engine { ctx, last_error_position: Position::NONE }
    }

    /// Installs a value as a global property, e.g. a configuration object
    /// or constant the host wants visible to scripts.
    pub fn register_value(&mut self, name: &str, value: Value) {
        let key = self.ctx.keys.intern(name);
        let global = self.ctx.global_object;
        self.ctx.pool.get_mut(global).set_own(key, Property::data(value, PropertyFlags::ALL));
    }

    /// Installs a native function as a global callable.
    pub fn register_fn(&mut self, name: &'static str, arity: u32, func: NativeFn) {
        let key = self.ctx.keys.intern(name);
        let function_prototype = self.ctx.prototypes().function;
        let data = Rc::new(NativeFunctionData { name, arity, func });
        let handle = self.ctx.pool.alloc(ObjectData::new(ObjectKind::Native(data), Some(function_prototype)));
        let global = self.ctx.global_object;
        self.ctx.pool.get_mut(global).set_own(key, Property::data(Value::Object(handle), PropertyFlags::new(PropertyFlags::WRITABLE | PropertyFlags::CONFIGURABLE)));
    }

    /// Parses and runs `input` as a top-level program, returning its
    /// completion value or the uncaught exception that escaped it.
    pub fn eval(&mut self, input: &Input, flags: EvalFlags) -> Result<Value, Error> {
        trace!(name = input.name(), "evaluating program");
        let ops = match crate::parser::parse_program(input, &mut self.ctx.keys, flags.strict_mode) {
            Ok(ops) => ops,
            Err(err) => {
                self.last_error_position = err.position;
                return Err(Error::Parse(err));
            }
        };

        let global = self.ctx.global_object;
        let this = if flags.treat_as_global_this { Value::Object(global) } else { Value::Undefined };
        self.ctx.push_frame(global, this, flags.strict_mode, None, Text::default())?;
        let result = interpreter::run_function_body(&mut self.ctx, &ops);
        self.ctx.pop_frame();

        match result {
            Ok(value) => {
                self.last_error_position = Position::NONE;
                self.coerce_completion(value, flags)
            }
            Err(unwind) => {
                let (value, position) = self.unwind_to_error(unwind);
                self.last_error_position = position;
                let backtrace = self.ctx.backtrace();
                debug!(?position, "program terminated with uncaught exception");
                Err(Error::Uncaught { value, position, backtrace })
            }
        }
    }

    /// Convenience wrapper over [`Engine::eval`] that builds the [`Input`]
    /// from a name and source string.
    pub fn eval_str(&mut self, name: &str, source: &str, flags: EvalFlags) -> Result<Value, Error> {
        let input = Input::new(name, source);
        self.eval(&input, flags)
    }

    fn coerce_completion(&mut self, value: Value, flags: EvalFlags) -> Result<Value, Error> {
        if flags.coerce_result_to_string {
            let text = value.to_string_primitive();
            Ok(Value::Str(text))
        } else if flags.coerce_result_to_primitive {
            interpreter::to_primitive(&mut self.ctx, &value, false).map_err(|unwind| {
                let (value, position) = self.unwind_to_error(unwind);
                Error::Uncaught { value, position, backtrace: self.ctx.backtrace() }
            })
        } else {
            Ok(value)
        }
    }

    fn unwind_to_error(&self, unwind: Unwind) -> (Value, Position) {
        match unwind {
            Unwind::Throw(value, position) => (value, position),
            other => {
                debug_assert!(false, "unexpected non-local transfer escaped top level: {other:?}");
                (Value::Undefined, Position::NONE)
            }
        }
    }

    /// The position of the last parse error or uncaught exception, or
    /// [`Position::NONE`] if the last [`Engine::eval`] call succeeded.
    pub fn last_error_position(&self) -> Position {
        self.last_error_position
    }

    /// Runs a mark-and-sweep cycle rooted at the global object and every
    /// live call frame, returning how many objects were reclaimed.
    pub fn collect_garbage(&mut self) -> usize {
        let roots = self.ctx.gc_roots();
        let collected = self.ctx.pool.collect(roots);
        debug!(collected, live = self.ctx.pool.live_count(), "gc cycle complete");
        collected
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.ctx
    }

    /// Reads a global property by name, for hosts inspecting results left
    /// behind by a script (e.g. a function it defined).
    pub fn global_value(&mut self, name: &str) -> EvalResult<Value> {
        let key: Key = self.ctx.keys.intern(name);
        let global = self.ctx.global_object;
        interpreter::get_member(&mut self.ctx, global, key)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        trace!("engine torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags() -> EvalFlags {
        EvalFlags { treat_as_global_this: true, ..Default::default() }
    }

    #[test]
    fn arithmetic_and_precedence() {
        let mut engine = Engine::new(EngineLimits::default());
        let result = engine.eval_str("test", "1 + 2 * 3", flags()).unwrap();
        assert_eq!(result.to_number_primitive(), 7.0);
    }

    #[test]
    fn uncaught_throw_reports_value_and_backtrace() {
        let mut engine = Engine::new(EngineLimits::default());
        let err = engine.eval_str("test", "function f() { throw 'boom'; } f();", flags()).unwrap_err();
        match err {
            Error::Uncaught { value, backtrace, .. } => {
                assert_eq!(value.to_string_primitive().as_str(), "boom");
                assert!(!backtrace.is_empty());
            }
            other => panic!("expected Uncaught, got {other:?}"),
        }
    }

    #[test]
    fn coerce_result_to_string_stringifies_numbers() {
        let mut engine = Engine::new(EngineLimits::default());
        let mut flags = flags();
        flags.coerce_result_to_string = true;
        let result = engine.eval_str("test", "42", flags).unwrap();
        assert_eq!(result.to_string_primitive().as_str(), "42");
    }

    #[test]
    fn register_fn_is_callable_from_script() {
        fn double(_ctx: &mut Context, _this: &Value, args: &[Value]) -> EvalResult<Value> {
            let n = args.first().cloned().unwrap_or(Value::Undefined).to_number_primitive();
            Ok(Value::Number(n * 2.0))
        }
        let mut engine = Engine::new(EngineLimits::default());
        engine.register_fn("double", 1, double);
        let result = engine.eval_str("test", "double(21)", flags()).unwrap();
        assert_eq!(result.to_number_primitive(), 42.0);
    }

    #[test]
    fn parse_error_reports_position_without_panicking() {
        let mut engine = Engine::new(EngineLimits::default());
        let err = engine.eval_str("test", "1 +", flags()).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }
}
