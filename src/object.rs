//! The object model: prototype-linked property objects with both an
//! ordered "element" vector (dense integer indices) and a hashed "hashmap"
//! (named properties, insertion-ordered for `for...in`).
//!
//! Grounded on `original_source/src/object/object.h` and spec §3/§4.4. The
//! spec describes the hashmap as a 4-bit-nibble trie over the 16-bit key
//! handle; this crate uses `ahash::AHashMap<Key, usize>` indexing into a
//! parallel insertion-ordered `Vec` instead (DESIGN.md Open Question 2) —
//! same two observable properties (bounded lookup, insertion-order
//! enumeration), built from an off-the-shelf hasher instead of a hand-rolled
//! trie.

use crate::estr::EStr;
use crate::key::Key;
use crate::op::Op;
use crate::pool::ObjectHandle;
use crate::value::Value;
use ahash::AHashMap;
use std::rc::Rc;

/// Per-property attribute bits, spec §3.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PropertyFlags(u8);

impl PropertyFlags {
    pub const WRITABLE: u8 = 1 << 0;
    pub const ENUMERABLE: u8 = 1 << 1;
    pub const CONFIGURABLE: u8 = 1 << 2;
    /// Not visited by `for...in` or `Object.keys`, but still reachable by
    /// direct name (used for a few internal-ish properties like a bound
    /// function's captured arguments count).
    pub const HIDDEN: u8 = 1 << 3;

    pub const ALL: PropertyFlags = PropertyFlags(Self::WRITABLE | Self::ENUMERABLE | Self::CONFIGURABLE);
    pub const NONE: PropertyFlags = PropertyFlags(0);

    #[must_use]
    pub fn new(bits: u8) -> Self {
        PropertyFlags(bits)
    }

    #[must_use]
    pub fn writable(self) -> bool {
        self.0 & Self::WRITABLE != 0
    }
    #[must_use]
    pub fn enumerable(self) -> bool {
        self.0 & Self::ENUMERABLE != 0
    }
    #[must_use]
    pub fn configurable(self) -> bool {
        self.0 & Self::CONFIGURABLE != 0
    }
    #[must_use]
    pub fn hidden(self) -> bool {
        self.0 & Self::HIDDEN != 0
    }

    #[must_use]
    pub fn with_writable(mut self, v: bool) -> Self {
        self.set(Self::WRITABLE, v);
        self
    }
    #[must_use]
    pub fn with_enumerable(mut self, v: bool) -> Self {
        self.set(Self::ENUMERABLE, v);
        self
    }
    #[must_use]
    pub fn with_configurable(mut self, v: bool) -> Self {
        self.set(Self::CONFIGURABLE, v);
        self
    }
    #[must_use]
    pub fn with_hidden(mut self, v: bool) -> Self {
        self.set(Self::HIDDEN, v);
        self
    }

    fn set(&mut self, bit: u8, v: bool) {
        if v {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }
}

impl Default for PropertyFlags {
    fn default() -> Self {
        Self::ALL
    }
}

/// The stored content of a property: a plain value, or a getter/setter pair.
/// An accessor's `get`/`set` are function values (or `None` for a
/// write-only/read-only pair), per spec §9 "Accessor properties".
#[derive(Clone, Debug)]
pub enum PropertyContent {
    Data(Value),
    Accessor { get: Option<ObjectHandle>, set: Option<ObjectHandle> },
}

#[derive(Clone, Debug)]
pub struct Property {
    pub content: PropertyContent,
    pub flags: PropertyFlags,
}

impl Property {
    #[must_use]
    pub fn data(value: Value, flags: PropertyFlags) -> Self {
        Property { content: PropertyContent::Data(value), flags }
    }

    #[must_use]
    pub fn as_value(&self) -> Option<&Value> {
        match &self.content {
            PropertyContent::Data(v) => Some(v),
            PropertyContent::Accessor { .. } => None,
        }
    }
}

/// One of the object "subkinds" spec §3 lists; the discriminator replaces
/// the C original's `type` descriptor pointer.
#[derive(Clone, Debug)]
pub enum ObjectKind {
    Plain,
    Array,
    Arguments,
    Function(Rc<FunctionData>),
    /// A native (host-provided) function: not backed by an operation list.
    Native(Rc<NativeFunctionData>),
    StringObject(EStr),
    NumberObject(f64),
    BooleanObject(bool),
    /// Milliseconds since epoch, or `NaN` for an invalid date.
    Date(f64),
    RegExpObject(Rc<crate::regex::Program>, EStr /* source */, RegExpFlags),
    /// Error kind discriminant (by prototype identity in spec; here a plain
    /// tag is simpler and just as observable).
    Error(ErrorKind),
    /// The exotic object `Function.prototype.bind` returns: calling it
    /// calls `target` with `bound_this` and `preset` prepended to whatever
    /// arguments the call supplies (spec-supplemented, ES5 `[[BoundThis]]`/
    /// `[[BoundArgs]]`/`[[BoundTargetFunction]]`, grounded in `builtins/
    /// function.rs`). A distinct kind rather than a `FunctionData` variant
    /// because native functions have no captured-state slot to hold it in.
    Bound(Rc<BoundData>),
}

#[derive(Debug)]
pub struct BoundData {
    pub target: ObjectHandle,
    pub bound_this: Value,
    pub preset: Vec<Value>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegExpFlags {
    pub global: bool,
    pub ignore_case: bool,
    pub multiline: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Error,
    RangeError,
    ReferenceError,
    SyntaxError,
    TypeError,
    URIError,
}

impl ErrorKind {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Error => "Error",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::ReferenceError => "ReferenceError",
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::URIError => "URIError",
        }
    }
}

/// A script-defined function: closed-over environment template, compiled
/// operation list, and the flags the parser computed for it (spec §3, §4.2).
#[derive(Debug)]
pub struct FunctionData {
    pub ops: Rc<Vec<Op>>,
    pub param_count: u32,
    pub param_names: Vec<Key>,
    pub name: Option<EStr>,
    /// The environment template to copy (heap regime) or seed (stack-frame
    /// regime) for each activation. `None` for a function with no free
    /// variables captured from an outer scope.
    pub closure: Option<ObjectHandle>,
    pub need_heap: bool,
    pub need_arguments: bool,
    pub use_bound_this: bool,
    pub strict_mode: bool,
    pub bound_this: Option<Value>,
}

pub type NativeFn = fn(&mut crate::context::Context, &Value, &[Value]) -> crate::interpreter::EvalResult<Value>;

pub struct NativeFunctionData {
    pub name: &'static str,
    pub arity: u32,
    pub func: NativeFn,
}

impl std::fmt::Debug for NativeFunctionData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NativeFunctionData({})", self.name)
    }
}

/// One slot of the element vector; `None` encodes a gap (spec's `check=0`).
pub type ElementSlot = Option<Property>;

/// An object: prototype link, dense element vector, and an insertion-ordered
/// hashmap of named properties.
#[derive(Debug)]
pub struct ObjectData {
    pub kind: ObjectKind,
    prototype: Option<ObjectHandle>,
    elements: Vec<ElementSlot>,
    /// Insertion-ordered named properties; `None` marks a deleted slot
    /// (tombstone) so existing indices in `hash_index` stay valid.
    entries: Vec<Option<(Key, Property)>>,
    hash_index: AHashMap<Key, usize>,
    pub sealed: bool,
    pub extensible: bool,
}

impl ObjectData {
    #[must_use]
    pub fn new(kind: ObjectKind, prototype: Option<ObjectHandle>) -> Self {
        ObjectData {
            kind,
            prototype,
            elements: Vec::new(),
            entries: Vec::new(),
            hash_index: AHashMap::new(),
            sealed: false,
            extensible: true,
        }
    }

    #[must_use]
    pub fn prototype(&self) -> Option<ObjectHandle> {
        self.prototype
    }

    pub fn set_prototype(&mut self, proto: Option<ObjectHandle>) {
        self.prototype = proto;
    }

    // -- elements --------------------------------------------------------

    #[must_use]
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    #[must_use]
    pub fn get_element(&self, index: u32) -> Option<&Property> {
        self.elements.get(index as usize).and_then(|s| s.as_ref())
    }

    pub fn set_element(&mut self, index: u32, value: Value, flags: PropertyFlags) {
        let index = index as usize;
        if index >= self.elements.len() {
            self.elements.resize_with(index + 1, || None);
        }
        self.elements[index] = Some(Property::data(value, flags));
    }

    pub fn delete_element(&mut self, index: u32) -> bool {
        if let Some(slot) = self.elements.get_mut(index as usize) {
            if slot.as_ref().map_or(true, |p| p.flags.configurable()) {
                *slot = None;
                return true;
            }
            return false;
        }
        true
    }

    /// Grow or shrink the element vector. Returns `false` if shrinking would
    /// drop a non-configurable element (caller raises `TypeError` in strict
    /// mode per spec §4.4).
    pub fn resize_elements(&mut self, new_len: usize) -> bool {
        if new_len < self.elements.len() {
            let has_non_configurable = self.elements[new_len..]
                .iter()
                .any(|s| s.as_ref().map_or(false, |p| !p.flags.configurable()));
            if has_non_configurable {
                return false;
            }
        }
        self.elements.resize_with(new_len, || None);
        true
    }

    pub fn push_element(&mut self, value: Value) -> usize {
        let index = self.elements.len();
        self.elements.push(Some(Property::data(value, PropertyFlags::ALL)));
        index
    }

    #[must_use]
    pub fn elements(&self) -> &[ElementSlot] {
        &self.elements
    }

    pub fn elements_mut(&mut self) -> &mut Vec<ElementSlot> {
        &mut self.elements
    }

    // -- named properties --------------------------------------------------

    #[must_use]
    pub fn get_own(&self, key: Key) -> Option<&Property> {
        self.hash_index
            .get(&key)
            .and_then(|&i| self.entries[i].as_ref())
            .map(|(_, p)| p)
    }

    pub fn get_own_mut(&mut self, key: Key) -> Option<&mut Property> {
        let i = *self.hash_index.get(&key)?;
        self.entries[i].as_mut().map(|(_, p)| p)
    }

    /// Insert or overwrite a named property, preserving its original
    /// insertion position if it already existed.
    pub fn set_own(&mut self, key: Key, property: Property) {
        if let Some(&i) = self.hash_index.get(&key) {
            self.entries[i] = Some((key, property));
        } else {
            let i = self.entries.len();
            self.entries.push(Some((key, property)));
            self.hash_index.insert(key, i);
        }
    }

    /// `true` if the property existed and was configurable (removed);
    /// `false` if it existed but is not configurable (caller should not
    /// delete it, and in strict mode should raise `TypeError`).
    pub fn delete_own(&mut self, key: Key) -> bool {
        let Some(&i) = self.hash_index.get(&key) else { return true };
        let Some((_, prop)) = &self.entries[i] else { return true };
        if !prop.flags.configurable() {
            return false;
        }
        self.entries[i] = None;
        self.hash_index.remove(&key);
        true
    }

    /// Own named property keys in insertion order (spec §4.3 enumeration
    /// order: elements first, handled by the caller, then these).
    pub fn own_keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.entries.iter().filter_map(|e| e.as_ref().map(|(k, _)| *k))
    }

    pub fn own_entries(&self) -> impl Iterator<Item = (Key, &Property)> {
        self.entries.iter().filter_map(|e| e.as_ref().map(|(k, p)| (*k, p)))
    }

    #[must_use]
    pub fn is_callable(&self) -> bool {
        matches!(self.kind, ObjectKind::Function(_) | ObjectKind::Native(_) | ObjectKind::Bound(_))
    }

    /// Push every `ObjectHandle` this object directly references onto
    /// `stack`, for the pool's mark phase.
    pub fn trace(&self, stack: &mut Vec<ObjectHandle>) {
        if let Some(p) = self.prototype {
            stack.push(p);
        }
        for slot in &self.elements {
            if let Some(prop) = slot {
                trace_property(prop, stack);
            }
        }
        for entry in &self.entries {
            if let Some((_, prop)) = entry {
                trace_property(prop, stack);
            }
        }
        if let ObjectKind::Function(f) = &self.kind {
            if let Some(c) = f.closure {
                stack.push(c);
            }
            if let Some(Value::Object(h)) = &f.bound_this {
                stack.push(*h);
            }
        }
        if let ObjectKind::Bound(b) = &self.kind {
            stack.push(b.target);
            if let Value::Object(h) = &b.bound_this {
                stack.push(*h);
            }
            for v in &b.preset {
                if let Value::Object(h) = v {
                    stack.push(*h);
                }
            }
        }
    }
}

fn trace_property(prop: &Property, stack: &mut Vec<ObjectHandle>) {
    match &prop.content {
        PropertyContent::Data(Value::Object(h)) => stack.push(*h),
        PropertyContent::Data(_) => {}
        PropertyContent::Accessor { get, set } => {
            if let Some(g) = get {
                stack.push(*g);
            }
            if let Some(s) = set {
                stack.push(*s);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn properties_enumerate_in_insertion_order() {
        let mut obj = ObjectData::new(ObjectKind::Plain, None);
        let a = Key::from_raw(1);
        let b = Key::from_raw(2);
        obj.set_own(a, Property::data(Value::Int(1), PropertyFlags::ALL));
        obj.set_own(b, Property::data(Value::Int(2), PropertyFlags::ALL));
        let keys: Vec<Key> = obj.own_keys().collect();
        assert_eq!(keys, vec![a, b]);
    }

    #[test]
    fn deleting_non_configurable_fails() {
        let mut obj = ObjectData::new(ObjectKind::Plain, None);
        let k = Key::from_raw(1);
        obj.set_own(k, Property::data(Value::Int(1), PropertyFlags::new(PropertyFlags::WRITABLE | PropertyFlags::ENUMERABLE)));
        assert!(!obj.delete_own(k));
        assert!(obj.get_own(k).is_some());
    }
}
