//! # esflow - an embeddable ECMAScript 3-family interpreter
//!
//! `esflow` lexes and parses a small ECMAScript-3-family scripting language
//! down to a flat, threaded operation list, then walks that list directly
//! rather than re-descending an AST at eval time. Values follow the usual
//! ECMAScript tagged-union model (`undefined`/`null`/boolean/number/string/
//! object) with prototype-chained objects, a hand-rolled backtracking regex
//! engine for `RegExp`, and a slab-allocated object pool collected by
//! mark-and-sweep.
//!
//! # A Quick Example
//!
//! ```no_run
//! use esflow::{Engine, EngineLimits, EvalFlags};
//!
//! let mut engine = Engine::new(EngineLimits::default());
//! let flags = EvalFlags { treat_as_global_this: true, ..Default::default() };
//! let result = engine.eval_str("main", "1 + 2 * 3", flags).unwrap();
//! assert_eq!(result.to_number_primitive(), 7.0);
//! ```
//!
//! # Layout
//!
//! `lexer` turns source [`Text`] into a token stream; `parser` drives a
//! recursive-descent pass over that stream straight into [`op`]'s flat
//! operation list, folding constant subexpressions as it goes; `interpreter`
//! walks the operation list against a [`Context`] (call frames, scopes, the
//! exception stack); `object` and `value` hold the runtime's data model;
//! `builtins` installs the global object surface (`Array`, `String`,
//! `Object`, `Number`, `Boolean`, `Error` and its subclasses, `RegExp`,
//! `Math`, `JSON`, `Function`); `regex` is the standalone pattern engine
//! `RegExp` sits on; `json` and `sort` are the two builtin algorithms
//! substantial enough to warrant their own modules. `engine` is the host
//! entry point tying all of it together.

mod builtins;
mod context;
mod engine;
mod error;
mod estr;
mod interpreter;
mod json;
mod key;
mod lexer;
mod object;
mod op;
mod parser;
mod pool;
mod regex;
mod sort;
mod text;
mod token;
mod value;

pub use context::{Context, Limits, Prototypes};
pub use engine::{Engine, EngineLimits, EvalFlags};
pub use error::{Error, ParseError, Position, Unwind};
pub use estr::EStr;
pub use interpreter::EvalResult;
pub use key::Key;
pub use object::{ErrorKind, NativeFn, ObjectData, ObjectKind, Property, PropertyFlags};
pub use pool::{ObjectHandle, Pool};
pub use text::{Input, Text};
pub use value::Value;
