//! Pattern → linear node program, grounded on `regexp.c`'s `term`/
//! `alternative`/`disjunction` recursive-descent trio.
//!
//! Every fragment-building function returns a `Vec<Op>` sized exactly to
//! the slots it occupies, so offsets are computed the same bottom-up way
//! `parser.rs` computes them for the main operation list: a fragment's
//! internal jump offsets are relative to each op's own position, which
//! stays correct no matter where the fragment ends up concatenated.

use super::{ClassItem, Op, RegexSyntaxError};
use std::iter::Peekable;
use std::rc::Rc;
use std::str::Chars;

pub(super) fn compile(pattern: &str) -> Result<(Vec<Op>, u16), RegexSyntaxError> {
    let mut c = Compiler { chars: pattern.chars().peekable(), group_count: 0 };
    let mut nodes = c.disjunction()?;
    if c.chars.peek().is_some() {
        return Err(c.error("unexpected trailing characters"));
    }
    nodes.push(Op::Match);
    Ok((nodes, c.group_count))
}

struct Compiler<'a> {
    chars: Peekable<Chars<'a>>,
    group_count: u16,
}

enum Escape {
    Digit(bool),
    Space(bool),
    Word(bool),
    Literal(char),
}

impl<'a> Compiler<'a> {
    fn error(&self, message: impl Into<String>) -> RegexSyntaxError {
        RegexSyntaxError { message: message.into() }
    }

    fn disjunction(&mut self) -> Result<Vec<Op>, RegexSyntaxError> {
        let left = self.alternative()?;
        if self.chars.peek() == Some(&'|') {
            self.chars.next();
            let right = self.disjunction()?;
            let mut left_arm = left;
            left_arm.push(Op::Jump(right.len() as i32 + 1));
            let mut out = Vec::with_capacity(1 + left_arm.len() + right.len());
            out.push(Op::Split(left_arm.len() as i32 + 1));
            out.extend(left_arm);
            out.extend(right);
            return Ok(out);
        }
        Ok(left)
    }

    fn alternative(&mut self) -> Result<Vec<Op>, RegexSyntaxError> {
        let mut out: Vec<Op> = Vec::new();
        while let Some((mut t, disallow_quantifier)) = self.term()? {
            let merged_single_literal = if !disallow_quantifier {
                let before_quantifier_len = t.len();
                t = self.apply_quantifier(t)?;
                // Only a bare, unquantified single-char literal is eligible
                // for the peephole merge below.
                before_quantifier_len == 1 && t.len() == 1
            } else {
                false
            };

            if merged_single_literal {
                if let (Some(Op::Bytes(prev)), Some(Op::Bytes(next))) = (out.last(), t.first()) {
                    let mut merged = String::with_capacity(prev.len() + next.len());
                    merged.push_str(prev);
                    merged.push_str(next);
                    let last = out.len() - 1;
                    out[last] = Op::Bytes(merged.into_boxed_str());
                    continue;
                }
            }
            out.extend(t);
        }
        Ok(out)
    }

    /// Returns `(fragment, disallow_quantifier)`, or `None` at the end of
    /// the current alternative (EOF or a `|`/`)` that closes an enclosing
    /// group).
    fn term(&mut self) -> Result<Option<(Vec<Op>, bool)>, RegexSyntaxError> {
        match self.chars.peek() {
            None => return Ok(None),
            Some('|') | Some(')') => return Ok(None),
            _ => {}
        }

        let c = *self.chars.peek().expect("checked above");

        if c == '^' {
            self.chars.next();
            return Ok(Some((vec![Op::Start], true)));
        }
        if c == '$' {
            self.chars.next();
            return Ok(Some((vec![Op::End], true)));
        }
        if c == '\\' {
            self.chars.next();
            return self.term_escape();
        }
        if c == '(' {
            self.chars.next();
            return self.term_group();
        }
        if c == '.' {
            self.chars.next();
            return Ok(Some((vec![Op::Any], false)));
        }
        if c == '[' {
            self.chars.next();
            return Ok(Some((self.char_class()?, false)));
        }
        if c == '*' || c == '+' || c == '?' || c == '}' {
            return Err(self.error("nothing to repeat"));
        }

        self.chars.next();
        Ok(Some((vec![Op::Bytes(c.to_string().into_boxed_str())], false)))
    }

    fn term_escape(&mut self) -> Result<Option<(Vec<Op>, bool)>, RegexSyntaxError> {
        match self.chars.peek() {
            Some('b') => {
                self.chars.next();
                return Ok(Some((vec![Op::Boundary(true)], true)));
            }
            Some('B') => {
                self.chars.next();
                return Ok(Some((vec![Op::Boundary(false)], true)));
            }
            Some(d) if d.is_ascii_digit() && *d != '0' => {
                let mut n: u32 = 0;
                while let Some(d) = self.chars.peek() {
                    if d.is_ascii_digit() {
                        n = n * 10 + self.chars.next().expect("peeked").to_digit(10).expect("ascii digit");
                    } else {
                        break;
                    }
                }
                return Ok(Some((vec![Op::Reference(n as u16)], false)));
            }
            _ => {}
        }

        let op = match self.escape_common()? {
            Escape::Digit(want) => Op::Digit(want),
            Escape::Space(want) => Op::Space(want),
            Escape::Word(want) => Op::Word(want),
            Escape::Literal(ch) => Op::Bytes(ch.to_string().into_boxed_str()),
        };
        Ok(Some((vec![op], false)))
    }

    /// Shared `\X` decoding used both at term level (after the `\b`/`\B`/
    /// backreference cases are peeled off) and inside `[...]` classes,
    /// mirroring `regexp.c`'s single `escape()` helper.
    fn escape_common(&mut self) -> Result<Escape, RegexSyntaxError> {
        let c = self.chars.next().ok_or_else(|| self.error("trailing backslash"))?;
        Ok(match c {
            'd' => Escape::Digit(true),
            'D' => Escape::Digit(false),
            's' => Escape::Space(true),
            'S' => Escape::Space(false),
            'w' => Escape::Word(true),
            'W' => Escape::Word(false),
            'b' => Escape::Literal('\u{8}'),
            'f' => Escape::Literal('\u{c}'),
            'n' => Escape::Literal('\n'),
            'r' => Escape::Literal('\r'),
            't' => Escape::Literal('\t'),
            'v' => Escape::Literal('\u{b}'),
            'c' => match self.chars.peek() {
                Some(letter) if letter.is_ascii_alphabetic() => {
                    let letter = self.chars.next().expect("peeked");
                    Escape::Literal(((letter.to_ascii_uppercase() as u8) % 32) as char)
                }
                _ => Escape::Literal('c'),
            },
            '0'..='7' => {
                let mut value = c as u32 - '0' as u32;
                for _ in 0..2 {
                    match self.chars.peek() {
                        Some(d) if ('0'..='7').contains(d) => {
                            value = value * 8 + (self.chars.next().expect("peeked") as u32 - '0' as u32);
                        }
                        _ => break,
                    }
                }
                Escape::Literal(char::from_u32(value).unwrap_or('\0'))
            }
            'x' => {
                if let Some(value) = self.peek_hex(2) {
                    self.chars.nth(1);
                    Escape::Literal(char::from_u32(value).unwrap_or('x'))
                } else {
                    Escape::Literal('x')
                }
            }
            'u' => {
                if let Some(value) = self.peek_hex(4) {
                    self.chars.nth(3);
                    Escape::Literal(char::from_u32(value).unwrap_or('u'))
                } else {
                    Escape::Literal('u')
                }
            }
            other => Escape::Literal(other),
        })
    }

    /// Peeks `count` hex digits without consuming unless they're all valid;
    /// caller advances with `chars.nth(count - 1)` on success.
    fn peek_hex(&self, count: usize) -> Option<u32> {
        let mut clone = self.chars.clone();
        let mut value = 0u32;
        for _ in 0..count {
            let d = clone.next()?;
            value = value * 16 + d.to_digit(16)?;
        }
        Some(value)
    }

    fn term_group(&mut self) -> Result<Option<(Vec<Op>, bool)>, RegexSyntaxError> {
        enum Kind {
            Capture(u16),
            Lookahead,
            NLookahead,
            NonCapture,
        }

        let kind = if self.chars.peek() == Some(&'?') {
            self.chars.next();
            match self.chars.next() {
                Some('=') => Kind::Lookahead,
                Some('!') => Kind::NLookahead,
                Some(':') => Kind::NonCapture,
                _ => return Err(self.error("invalid group")),
            }
        } else {
            self.group_count += 1;
            let index = self.group_count;
            if (index as u32) * 2 + 1 > 0xff {
                return Err(self.error("too many captures"));
            }
            Kind::Capture(index)
        };

        let body = self.disjunction()?;
        if self.chars.next() != Some(')') {
            return Err(self.error("expect ')'"));
        }

        Ok(Some(match kind {
            Kind::Capture(index) => {
                let mut out = Vec::with_capacity(body.len() + 2);
                out.push(Op::Save(index * 2));
                out.extend(body);
                out.push(Op::Save(index * 2 + 1));
                (out, false)
            }
            Kind::Lookahead => {
                let mut out = Vec::with_capacity(body.len() + 1);
                out.push(Op::Lookahead(body.len() as i32 + 1));
                out.extend(body);
                (out, true)
            }
            Kind::NLookahead => {
                let mut out = Vec::with_capacity(body.len() + 1);
                out.push(Op::NLookahead(body.len() as i32 + 1));
                out.extend(body);
                (out, true)
            }
            Kind::NonCapture => (body, false),
        }))
    }

    fn char_class(&mut self) -> Result<Vec<Op>, RegexSyntaxError> {
        let negate = self.chars.peek() == Some(&'^');
        if negate {
            self.chars.next();
        }

        let mut items: Vec<ClassItem> = Vec::new();

        loop {
            match self.chars.peek() {
                None => return Err(self.error("expect ']'")),
                Some(']') => break,
                _ => {}
            }

            let item = if self.chars.peek() == Some(&'\\') {
                self.chars.next();
                match self.escape_common()? {
                    Escape::Digit(want) => ClassItem::Digit(want),
                    Escape::Space(want) => ClassItem::Space(want),
                    Escape::Word(want) => ClassItem::Word(want),
                    Escape::Literal(ch) => ClassItem::Char(ch),
                }
            } else {
                ClassItem::Char(self.chars.next().expect("peeked"))
            };

            // A literal char immediately followed by `-<char>` (and that
            // char isn't the closing `]`) forms a range; a class shorthand
            // (`\d` etc.) can't be a range endpoint.
            if let ClassItem::Char(lo) = item {
                if self.chars.peek() == Some(&'-') {
                    let mut lookahead = self.chars.clone();
                    lookahead.next();
                    if lookahead.next().map_or(false, |n| n != ']') {
                        self.chars.next();
                        let hi = match self.chars.peek() {
                            Some('\\') => {
                                self.chars.next();
                                match self.escape_common()? {
                                    Escape::Literal(hi) => hi,
                                    _ => return Err(self.error("invalid range")),
                                }
                            }
                            _ => self.chars.next().ok_or_else(|| self.error("expect ']'"))?,
                        };
                        items.push(ClassItem::Range(lo, hi));
                        continue;
                    }
                }
            }

            items.push(item);
        }

        if self.chars.next() != Some(']') {
            return Err(self.error("expect ']'"));
        }

        let items: Rc<[ClassItem]> = items.into();
        Ok(vec![if negate { Op::NeitherOf(items) } else { Op::OneOf(items) }])
    }

    fn apply_quantifier(&mut self, t: Vec<Op>) -> Result<Vec<Op>, RegexSyntaxError> {
        let (min, max, present, noop) = match self.chars.peek() {
            Some('?') => {
                self.chars.next();
                (0, 1, true, false)
            }
            Some('*') => {
                self.chars.next();
                (0, 0, true, false)
            }
            Some('+') => {
                self.chars.next();
                (1, 0, true, false)
            }
            Some('{') => {
                let mut lookahead = self.chars.clone();
                lookahead.next();
                if lookahead.peek().map_or(false, |d| d.is_ascii_digit()) {
                    self.chars.next();
                    let min = self.read_int()?;
                    let (max, noop) = if self.chars.peek() == Some(&',') {
                        self.chars.next();
                        if self.chars.peek().map_or(false, |d| d.is_ascii_digit()) {
                            let max = self.read_int()?;
                            (max, max == 0)
                        } else {
                            (0, false)
                        }
                    } else {
                        (min, min == 0)
                    };
                    if self.chars.next() != Some('}') {
                        return Err(self.error("expect '}'"));
                    }
                    (min, max, true, noop)
                } else {
                    (1, 1, false, false)
                }
            }
            _ => (1, 1, false, false),
        };

        if !present {
            return Ok(t);
        }

        let lazy = self.chars.peek() == Some(&'?');
        if lazy {
            self.chars.next();
        }

        if noop {
            return Ok(Vec::new());
        }

        let mut out = t;
        if max != 1 {
            let clears: Rc<[u16]> = out
                .iter()
                .filter_map(|op| match op {
                    Op::Save(idx) => Some(*idx),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .into();
            let body_len = out.len() as i32;
            if lazy {
                out.push(Op::Redo { min, max, offset: 2, clears });
                out.push(Op::Jump(-(body_len + 1)));
            } else {
                out.push(Op::Redo { min, max, offset: -body_len, clears });
            }
        }

        if min == 0 {
            let body_len = out.len() as i32;
            if lazy {
                let mut wrapped = Vec::with_capacity(out.len() + 2);
                wrapped.push(Op::Split(2));
                wrapped.push(Op::Jump(body_len + 1));
                wrapped.extend(out);
                out = wrapped;
            } else {
                let mut wrapped = Vec::with_capacity(out.len() + 1);
                wrapped.push(Op::Split(body_len + 1));
                wrapped.extend(out);
                out = wrapped;
            }
        }

        Ok(out)
    }

    fn read_int(&mut self) -> Result<u32, RegexSyntaxError> {
        let mut value: u32 = 0;
        let mut any = false;
        while let Some(d) = self.chars.peek() {
            if d.is_ascii_digit() {
                any = true;
                value = value * 10 + self.chars.next().expect("peeked").to_digit(10).expect("ascii digit");
            } else {
                break;
            }
        }
        if !any {
            return Err(self.error("expect number"));
        }
        Ok(value)
    }
}
