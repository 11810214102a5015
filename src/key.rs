//! Interned property-name handles.
//!
//! Every named property access — `obj.foo`, `{bar: 1}`, `for (k in obj)` —
//! goes through a [`Key`] rather than comparing strings. A `Key` is a
//! 16-bit handle into a process-wide (well, engine-wide: see below) table
//! bijective with the property's text, grounded on `original_source/src/key.c`.
//!
//! Unlike the C original, which keeps one process-global table torn down by
//! a reference-counted `setup`/`teardown` pair, each [`KeyPool`] here is
//! owned by one [`crate::engine::Engine`]; multiple engines in one process
//! do not share key numbering. This sidesteps global mutable state (and the
//! need for `unsafe`) at the cost of not being able to compare `Key`s minted
//! by different engines — never an observable difference within a single
//! script evaluation.

use ahash::AHashMap;
use std::fmt;

/// An interned property name. Two keys compare equal iff they were interned
/// from equal text by the same [`KeyPool`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key(u16);

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.0)
    }
}

impl Key {
    /// Construct a `Key` from a raw handle value, for tests that need a
    /// `Key` without going through a `KeyPool`.
    #[cfg(test)]
    pub(crate) fn from_raw(n: u16) -> Key {
        Key(n)
    }
}

/// The well-known keys the interpreter and builtins refer to directly,
/// interned once at pool construction (mirrors `key.c`'s `setup`).
#[derive(Debug, Clone, Copy)]
pub struct WellKnownKeys {
    pub prototype: Key,
    pub constructor: Key,
    pub length: Key,
    pub arguments: Key,
    pub callee: Key,
    pub name: Key,
    pub message: Key,
    pub to_string: Key,
    pub value_of: Key,
    pub value: Key,
    pub writable: Key,
    pub enumerable: Key,
    pub configurable: Key,
    pub get: Key,
    pub set: Key,
    pub join: Key,
    pub index: Key,
    pub last_index: Key,
    pub source: Key,
    pub global: Key,
    pub ignore_case: Key,
    pub multiline: Key,
}

/// Table mapping interned text to [`Key`] handles and back.
pub struct KeyPool {
    texts: Vec<Box<str>>,
    index: AHashMap<Box<str>, Key>,
    well_known: WellKnownKeys,
}

impl KeyPool {
    #[must_use]
    pub fn new() -> Self {
        let mut texts = Vec::new();
        let mut index = AHashMap::new();
        macro_rules! intern {
            ($s:expr) => {{
                let k = Key(texts.len() as u16);
                texts.push(Box::from($s));
                index.insert(Box::from($s), k);
                k
            }};
        }
        let well_known = WellKnownKeys {
            prototype: intern!("prototype"),
            constructor: intern!("constructor"),
            length: intern!("length"),
            arguments: intern!("arguments"),
            callee: intern!("callee"),
            name: intern!("name"),
            message: intern!("message"),
            to_string: intern!("toString"),
            value_of: intern!("valueOf"),
            value: intern!("value"),
            writable: intern!("writable"),
            enumerable: intern!("enumerable"),
            configurable: intern!("configurable"),
            get: intern!("get"),
            set: intern!("set"),
            join: intern!("join"),
            index: intern!("index"),
            last_index: intern!("lastIndex"),
            source: intern!("source"),
            global: intern!("global"),
            ignore_case: intern!("ignoreCase"),
            multiline: intern!("multiline"),
        };
        KeyPool { texts, index, well_known }
    }

    #[must_use]
    pub fn well_known(&self) -> &WellKnownKeys {
        &self.well_known
    }

    /// Interns `text`, returning the same [`Key`] if it was already seen.
    ///
    /// # Panics
    /// Panics if more than `u16::MAX` distinct keys are interned in one
    /// engine's lifetime — matching the original's 16-bit handle width.
    pub fn intern(&mut self, text: &str) -> Key {
        if let Some(&k) = self.index.get(text) {
            return k;
        }
        let count = self.texts.len();
        assert!(count < u16::MAX as usize, "key pool exhausted (more than 65535 distinct property names)");
        let k = Key(count as u16);
        let boxed: Box<str> = Box::from(text);
        self.texts.push(boxed.clone());
        self.index.insert(boxed, k);
        k
    }

    #[must_use]
    pub fn text_of(&self, key: Key) -> &str {
        &self.texts[key.0 as usize]
    }

    /// A key that looks like a non-negative array index (`"0"`, `"42"`, but
    /// not `"01"` or `"-1"`), per spec §4.3's `getProperty`/`setProperty`.
    #[must_use]
    pub fn as_element_index(text: &str) -> Option<u32> {
        if text.is_empty() || (text.len() > 1 && text.starts_with('0')) {
            return None;
        }
        text.parse::<u32>().ok()
    }
}

impl Default for KeyPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_bijective() {
        let mut pool = KeyPool::new();
        let a = pool.intern("foo");
        let b = pool.intern("foo");
        let c = pool.intern("bar");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(pool.text_of(a), "foo");
        assert_eq!(pool.text_of(c), "bar");
    }

    #[test]
    fn element_index_parsing_rejects_leading_zero() {
        assert_eq!(KeyPool::as_element_index("0"), Some(0));
        assert_eq!(KeyPool::as_element_index("42"), Some(42));
        assert_eq!(KeyPool::as_element_index("01"), None);
        assert_eq!(KeyPool::as_element_index("-1"), None);
        assert_eq!(KeyPool::as_element_index(""), None);
    }
}
