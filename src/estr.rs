//! Immutable, reference-counted string value — the engine's `Chars`.
//!
//! Adapted from the teacher's `ImmutableString` (`rhai/src/immutable_string.rs`,
//! an `Rc<SmartString>`): `EStr` wraps an `Rc<str>` directly. The spec's three
//! string representations (raw `Text` slice into source, an inline
//! small-buffer, and a heap `Chars` buffer) collapse into this one type —
//! see DESIGN.md Open Question 3. Cloning an `EStr` is a refcount bump, never
//! a byte copy, which is the property the original cared about.

use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

#[derive(Clone, Eq)]
pub struct EStr(Rc<str>);

impl EStr {
    #[must_use]
    pub fn new(s: impl Into<Rc<str>>) -> Self {
        EStr(s.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn len_utf16(&self) -> usize {
        self.0.chars().map(char::len_utf16).sum()
    }

    pub fn concat(&self, other: &EStr) -> EStr {
        let mut s = String::with_capacity(self.0.len() + other.0.len());
        s.push_str(&self.0);
        s.push_str(&other.0);
        EStr::new(s)
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &EStr) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for EStr {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl PartialEq for EStr {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl std::hash::Hash for EStr {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl fmt::Debug for EStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for EStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EStr {
    fn from(s: &str) -> Self {
        EStr::new(s)
    }
}

impl From<String> for EStr {
    fn from(s: String) -> Self {
        EStr::new(s)
    }
}

impl From<&crate::text::Text> for EStr {
    fn from(t: &crate::text::Text) -> Self {
        EStr::new(t.as_str())
    }
}
