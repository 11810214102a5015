//! Call frames: environment chain, `this` binding, strict-mode flag, and the
//! resource-limit bookkeeping every op execution passes through.
//!
//! Grounded on `original_source/src/context.c` (`struct Context`'s parent
//! pointer / environment / `this` / strict-mode / text-index shape) and the
//! teacher's `scope.rs` idea of modeling lexical scope as a chain of
//! name-indexed records. The C original also uses `Context` to reconstruct
//! a human-readable call site for diagnostics by walking back through the
//! op cursor (`textSeek`); this crate instead has each [`Frame`] remember
//! the call-site `Text` and callee name directly when it's pushed, which
//! needs no op-cursor archaeology at throw time.

use crate::error::Error;
use crate::estr::EStr;
use crate::key::{Key, KeyPool};
use crate::object::{ObjectData, ObjectKind, Property, PropertyFlags};
use crate::pool::{ObjectHandle, Pool};
use crate::text::Text;
use crate::value::Value;

/// Resource ceilings the interpreter enforces while running a script (spec
/// §5 "Stack discipline"). `None`/`0` disables a particular limit.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    /// Maximum live call-frame depth, including the top-level program frame.
    pub max_call_depth: u32,
    /// Maximum number of ops the interpreter will execute in one `eval`
    /// call before raising `Error::ResourceLimit`. `None` means unbounded.
    pub max_operations: Option<u64>,
}

impl Default for Limits {
    fn default() -> Self {
        Limits { max_call_depth: 1024, max_operations: None }
    }
}

struct Frame {
    environment: ObjectHandle,
    this: Value,
    strict_mode: bool,
    callee_name: Option<EStr>,
    call_site: Text,
}

/// The global prototype objects builtins hang their methods off of, and that
/// primitive member access (`"x".length`, `(1).toFixed`) consults. Wired in
/// by `engine.rs` right after bootstrap, before any script runs.
#[derive(Debug, Clone, Copy)]
pub struct Prototypes {
    pub object: ObjectHandle,
    pub function: ObjectHandle,
    pub array: ObjectHandle,
    pub string: ObjectHandle,
    pub number: ObjectHandle,
    pub boolean: ObjectHandle,
    pub error: ObjectHandle,
    pub regexp: ObjectHandle,
    pub date: ObjectHandle,
}

/// The interpreter's full mutable state: object pool, interned keys, the
/// global object, and the call-frame stack. Native functions receive this
/// (as `&mut Context`) the same way script-defined functions receive an
/// environment: it is both the "ecc" (engine state) and the per-call
/// "context" of the C original, merged, since Rust has no equivalent of a
/// thread-local singleton to split them across.
pub struct Context {
    pub pool: Pool,
    pub keys: KeyPool,
    pub global_object: ObjectHandle,
    frames: Vec<Frame>,
    limits: Limits,
    operations_executed: u64,
    prototypes: Option<Prototypes>,
}

impl Context {
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        let mut pool = Pool::new();
        let global_object = pool.alloc(ObjectData::new(ObjectKind::Plain, None));
        let frames = vec![Frame {
            environment: global_object,
            this: Value::Object(global_object),
            strict_mode: false,
            callee_name: None,
            call_site: Text::default(),
        }];
        Context { pool, keys: KeyPool::new(), global_object, frames, limits, operations_executed: 0, prototypes: None }
    }

    /// Wire up the builtin prototype objects. Called exactly once by
    /// `engine.rs` during bootstrap, before any user script runs.
    pub fn set_prototypes(&mut self, prototypes: Prototypes) {
        self.prototypes = Some(prototypes);
    }

    #[must_use]
    pub fn prototypes(&self) -> &Prototypes {
        self.prototypes.as_ref().expect("Context::set_prototypes was not called during bootstrap")
    }

    #[must_use]
    pub fn environment(&self) -> ObjectHandle {
        self.frames.last().expect("frame stack is never empty").environment
    }

    #[must_use]
    pub fn this_value(&self) -> Value {
        self.frames.last().expect("frame stack is never empty").this.clone()
    }

    #[must_use]
    pub fn strict_mode(&self) -> bool {
        self.frames.last().expect("frame stack is never empty").strict_mode
    }

    #[must_use]
    pub fn call_depth(&self) -> usize {
        self.frames.len()
    }

    /// Push a new call frame. Fails with `Error::ResourceLimit` rather than
    /// overflowing the host stack via unbounded script recursion.
    pub fn push_frame(
        &mut self,
        environment: ObjectHandle,
        this: Value,
        strict_mode: bool,
        callee_name: Option<EStr>,
        call_site: Text,
    ) -> Result<(), Error> {
        if self.frames.len() as u32 >= self.limits.max_call_depth {
            return Err(Error::ResourceLimit("maximum call depth exceeded"));
        }
        self.frames.push(Frame { environment, this, strict_mode, callee_name, call_site });
        Ok(())
    }

    pub fn pop_frame(&mut self) {
        self.frames.pop();
        debug_assert!(!self.frames.is_empty(), "popped the top-level frame");
    }

    /// Called once per executed op by the interpreter; the budget guards
    /// against non-terminating scripts when the host configured one.
    pub fn count_operation(&mut self) -> Result<(), Error> {
        self.operations_executed += 1;
        if let Some(max) = self.limits.max_operations {
            if self.operations_executed > max {
                return Err(Error::ResourceLimit("maximum operation count exceeded"));
            }
        }
        Ok(())
    }

    /// Render the current call stack for an uncaught exception's backtrace,
    /// innermost frame first.
    #[must_use]
    pub fn backtrace(&self) -> Vec<String> {
        self.frames
            .iter()
            .rev()
            .map(|f| match &f.callee_name {
                Some(name) if !f.call_site.is_empty() => format!("at {} ({})", name, f.call_site.as_str()),
                Some(name) => format!("at {}", name),
                None if !f.call_site.is_empty() => format!("at {}", f.call_site.as_str()),
                None => "at <program>".to_string(),
            })
            .collect()
    }

    /// Walk the environment chain for a binding named `key`, innermost
    /// scope first (spec `getLocal`). Returns the owning environment's
    /// handle alongside the property so the interpreter can invoke an
    /// accessor getter if one is found.
    #[must_use]
    pub fn resolve_local(&self, key: Key) -> Option<(ObjectHandle, Property)> {
        let mut current = Some(self.environment());
        while let Some(handle) = current {
            let data = self.pool.get(handle);
            if let Some(prop) = data.get_own(key) {
                return Some((handle, prop.clone()));
            }
            current = data.prototype();
        }
        None
    }

    /// Assign to an existing binding found by walking the environment
    /// chain, or (non-strict fallback, spec §4.3 `setLocal`) create it on
    /// the global object if nothing in the chain owns it yet.
    pub fn assign_local(&mut self, key: Key, value: Value) {
        let mut current = Some(self.environment());
        while let Some(handle) = current {
            if self.pool.get(handle).get_own(key).is_some() {
                self.pool.get_mut(handle).set_own(key, Property::data(value, PropertyFlags::ALL));
                return;
            }
            current = self.pool.get(handle).prototype();
        }
        self.pool.get_mut(self.global_object).set_own(key, Property::data(value, PropertyFlags::ALL));
    }

    /// Declare a binding directly on the current scope (`var`/function
    /// parameter hoisting), overwriting only the value if it already
    /// exists so repeated `var x;` doesn't reset flags.
    pub fn declare_local(&mut self, key: Key, value: Value, flags: PropertyFlags) {
        let env = self.environment();
        let mut data = self.pool.get_mut(env);
        if let Some(existing) = data.get_own_mut(key) {
            if !matches!(value, Value::Undefined) {
                *existing = Property::data(value, existing.flags);
            }
        } else {
            data.set_own(key, Property::data(value, flags));
        }
    }

    /// Every `ObjectHandle` directly reachable from live interpreter state,
    /// for [`Pool::collect`]'s root set.
    #[must_use]
    pub fn gc_roots(&self) -> Vec<ObjectHandle> {
        let mut roots = Vec::with_capacity(self.frames.len() * 2 + 1);
        roots.push(self.global_object);
        for frame in &self.frames {
            roots.push(frame.environment);
            if let Value::Object(h) = &frame.this {
                roots.push(*h);
            }
        }
        roots
    }
}
