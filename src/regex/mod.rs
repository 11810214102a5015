//! Regex engine, spec §4.5: pattern compiler → linear node program →
//! recursive backtracking matcher.
//!
//! Grounded on `original_source/src/builtin/regexp.c`, which compiles a
//! pattern into a flat array of `Node { opcode, offset, bytes }` and walks it
//! with a `goto`-driven `match()` that recurses only at the genuine
//! backtracking choice points (`split`, `redo`, `save`, lookahead). This
//! module keeps that same shape: [`compiler::compile`] produces a
//! `Vec<Op>` using the bottom-up relative-offset convention `parser.rs`
//! already established for the main operation list (a fragment's jump
//! offsets are relative to each op's own position, so fragments concatenate
//! without rewriting), and [`matcher::run`] is the recursive walker.
//!
//! Two of the source's three flags are dead weight there: grepping
//! `regexp.c` shows `ignoreCase` and `multiline` are stored as accessor
//! properties but never consulted inside `match()` itself — the comparison
//! and anchor opcodes don't look at them. Since both flags are genuinely
//! observable here (`RegExpFlags` in `object.rs`, `.ignoreCase`/`.multiline`
//! properties), the matcher below actually implements them rather than
//! reproducing that gap: case folding in literal/class/backreference
//! comparisons, and multiline-aware `^`/`$` anchors.

mod compiler;
mod matcher;

use std::rc::Rc;

#[derive(Debug, Clone, Copy)]
enum ClassItem {
    Char(char),
    Range(char, char),
    Digit(bool),
    Space(bool),
    Word(bool),
}

/// One compiled instruction. Jump-ish variants carry an offset relative to
/// their own index in the owning `Vec<Op>`, exactly like `op.rs`'s `Op`.
#[derive(Debug, Clone)]
enum Op {
    Start,
    End,
    /// `\b` (true) / `\B` (false).
    Boundary(bool),
    Any,
    /// `\d` (true) / `\D` (false), and likewise for the other two.
    Digit(bool),
    Space(bool),
    Word(bool),
    /// A run of literal characters to match verbatim (merged by the
    /// compiler's peephole step when consecutive unquantified literals
    /// appear back to back).
    Bytes(Box<str>),
    OneOf(Rc<[ClassItem]>),
    NeitherOf(Rc<[ClassItem]>),
    /// Backreference to capture group `N` (1-based).
    Reference(u16),
    /// Records the current position into capture slot `N` (`2*group` for the
    /// open boundary, `2*group+1` for the close).
    Save(u16),
    /// Try falling through first; on failure, jump by `offset`.
    Split(i32),
    Jump(i32),
    /// Run the subprogram ending at this op's `offset`; continue past it
    /// only if the subprogram matched.
    Lookahead(i32),
    /// As `Lookahead`, but continue only if the subprogram did NOT match.
    NLookahead(i32),
    /// Bounded repeat: `offset` is where to retry the loop body (relative to
    /// this op); `clears` lists capture slots to reset on each iteration so
    /// a later zero-length pass doesn't freeze an earlier capture.
    Redo { min: u32, max: u32, offset: i32, clears: Rc<[u16]> },
    Match,
}

/// A compiled pattern, ready to search any haystack any number of times.
#[derive(Debug)]
pub struct Program {
    nodes: Vec<Op>,
    /// Number of capturing groups, not counting the implicit whole-match
    /// group 0.
    pub capture_count: u16,
}

/// One successful search: the overall match bounds plus each capturing
/// group's bounds (`None` when the group didn't participate). Bounds are
/// `char` indices into the haystack, not byte offsets.
#[derive(Debug, Clone)]
pub struct RegexMatch {
    pub start: usize,
    pub end: usize,
    pub groups: Vec<Option<(usize, usize)>>,
}

#[derive(Debug, Clone)]
pub struct RegexSyntaxError {
    pub message: String,
}

impl std::fmt::Display for RegexSyntaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl Program {
    /// Compile a pattern body (without the surrounding `/.../` delimiters).
    /// `i`/`m` flags don't affect compilation — they're supplied again to
    /// [`Program::exec`], since they live on the `RegExp` object rather
    /// than the (potentially shared, e.g. via `RegExp(re)`) compiled program.
    pub fn compile(pattern: &str) -> Result<Program, RegexSyntaxError> {
        let (nodes, capture_count) = compiler::compile(pattern)?;
        Ok(Program { nodes, capture_count })
    }

    /// Search `haystack` for the first match starting at or after
    /// `start_index` (a `char` index). Mirrors `matchWithState`'s scan over
    /// successive starting positions until the input is exhausted.
    #[must_use]
    pub fn exec(&self, haystack: &str, start_index: usize, ignore_case: bool, multiline: bool) -> Option<RegexMatch> {
        let chars: Vec<char> = haystack.chars().collect();
        matcher::search(&self.nodes, self.capture_count, &chars, start_index, ignore_case, multiline)
    }
}
