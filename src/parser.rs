//! Recursive-descent parser producing the flat operation list `interpreter.rs`
//! walks, spec §4.2.
//!
//! Grounded on `original_source/src/parser.c`'s single-pass "parse directly
//! into the op array, patch jump offsets once the fragment's length is known"
//! strategy, and on the teacher's `optimize.rs` peephole-pass idiom for
//! [`try_build_iterate_range`]. Unlike a tree-building parser, there is no
//! separate lowering pass: every `parse_*` function returns a `Vec<Op>`
//! fragment whose first slot is an entry point and whose length is exactly
//! the number of slots a containing fragment must skip to get past it, which
//! is what lets the offset arithmetic below be computed bottom-up as each
//! fragment completes.
//!
//! A `place` (the left side of `=`, `++`, `delete`, or a `for-in` binding) is
//! never treated specially during parsing: [`GetLocal`]/[`GetLocalSlot`]/
//! [`GetMember`]/[`GetProperty`] fragments already carry everything
//! `interpreter.rs::resolve_place` needs to reinterpret a read as a write, so
//! an assignment's left-hand side is parsed with the exact same function that
//! parses any other expression, then validated in place.
//!
//! [`GetLocal`]: crate::op::Op::GetLocal
//! [`GetLocalSlot`]: crate::op::Op::GetLocalSlot
//! [`GetMember`]: crate::op::Op::GetMember
//! [`GetProperty`]: crate::op::Op::GetProperty

use crate::error::{ParseError, Position};
use crate::estr::EStr;
use crate::key::{Key, KeyPool};
use crate::lexer::{LexFlags, Lexer};
use crate::op::{CompareOp, Const, FunctionTemplate, Op, PropertyInit};
use crate::text::Input;
use crate::token::{Token, TokenKind};
use std::rc::Rc;

/// A fragment of the flat operation list under construction.
type Ops = Vec<Op>;

/// Parse a complete program (or a function body, via [`Parser::parse_function_rest`]
/// recursing into this same machinery) into the op list `interpreter.rs::run`
/// executes.
pub fn parse_program(input: &Input, keys: &mut KeyPool, strict: bool) -> Result<Rc<Vec<Op>>, ParseError> {
    let mut parser = Parser::new(input, keys, strict);
    let body = parser.parse_function_body_statements()?;
    parser.expect(TokenKind::Eof)?;
    let scope = parser.scopes.pop().expect("program scope is always present");
    let mut ops = build_hoist_prologue(&scope);
    ops.extend(body);
    ops.push(Op::End);
    Ok(Rc::new(ops))
}

/// Per-function bookkeeping accumulated while parsing its body: every `var`
/// and function-declaration name that must be hoisted as `undefined` before
/// the body runs (spec's hoisting pass), and whether the body needs an
/// `arguments` object or heap-allocated locals (spec `needHeap`/`needArguments`,
/// see `FunctionTemplate`'s doc comment).
struct FunctionScope {
    hoisted_vars: Vec<Key>,
    hoisted_fns: Vec<(Key, Rc<FunctionTemplate>)>,
    need_heap: bool,
    need_arguments: bool,
}

impl FunctionScope {
    fn new() -> Self {
        FunctionScope { hoisted_vars: Vec::new(), hoisted_fns: Vec::new(), need_heap: false, need_arguments: false }
    }
}

/// One entry on the label/loop/switch stack, consulted when validating a
/// `break`/`continue label` target (spec: "labels stack with a depth
/// counter").
struct DepthEntry {
    label: Option<Box<str>>,
    is_loop: bool,
    is_switch: bool,
}

pub struct Parser<'a> {
    input: &'a Input,
    lexer: Lexer<'a>,
    keys: &'a mut KeyPool,
    cur: Token,
    strict: bool,
    /// Set by `parse_labeled_statement` just before parsing the labeled
    /// statement itself, so a `for`/`while`/`do`/`switch` immediately inside
    /// a label can claim it as its own rather than wrapping in `Op::Labeled`.
    pending_label: Option<Box<str>>,
    depths: Vec<DepthEntry>,
    scopes: Vec<FunctionScope>,
    temp_counter: u32,
}

impl<'a> Parser<'a> {
    fn new(input: &'a Input, keys: &'a mut KeyPool, strict: bool) -> Self {
        let mut lexer = Lexer::at(input, 0, strict);
        let cur = lexer.next_token(LexFlags { allow_regex: true, disallow_keyword: false });
        Parser {
            input,
            lexer,
            keys,
            cur,
            strict,
            pending_label: None,
            depths: Vec::new(),
            scopes: vec![FunctionScope::new()],
            temp_counter: 0,
        }
    }

    // -- token plumbing ---------------------------------------------------

    fn at(&self, kind: &TokenKind) -> bool {
        self.cur.kind == *kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn bump(&mut self) {
        let allow_regex = regex_allowed_after(&self.cur.kind);
        self.cur = self.lexer.next_token(LexFlags { allow_regex, disallow_keyword: false });
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), ParseError> {
        if self.cur.kind == kind {
            self.bump();
            Ok(())
        } else {
            Err(self.error(format!("expected {:?}, found {:?}", kind, self.cur.kind)))
        }
    }

    fn expect_identifier_name(&mut self) -> Result<EStr, ParseError> {
        match self.cur.kind.clone() {
            TokenKind::Identifier(name) => {
                self.bump();
                Ok(name)
            }
            other => Err(self.error(format!("expected an identifier, found {:?}", other))),
        }
    }

    /// ASI: a statement terminator is a `;`, a `}` that closes the
    /// surrounding block, a line break before the next token, or end of
    /// input. Anything else is a real syntax error.
    fn consume_semicolon(&mut self) -> Result<(), ParseError> {
        if self.eat(&TokenKind::Semicolon) {
            return Ok(());
        }
        if self.at(&TokenKind::RightBrace) || self.at(&TokenKind::Eof) || self.cur.did_line_break {
            return Ok(());
        }
        Err(self.error(format!("expected ';', found {:?}", self.cur.kind)))
    }

    /// Peek exactly one token past `self.cur` without disturbing `self.cur`
    /// or `self.lexer`, by lexing from a throwaway `Lexer` positioned right
    /// after `self.cur`'s text. Used only to distinguish `ident:` (a labeled
    /// statement) from `ident` starting some other statement.
    fn peek_is_colon(&self) -> bool {
        let mut probe = Lexer::at(self.input, self.lexer.offset(), self.strict);
        let next = probe.next_token(LexFlags { allow_regex: false, disallow_keyword: false });
        next.kind == TokenKind::Colon
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.cur.text.clone(), Position::new(0, self.cur.text.len() as u32))
    }

    /// Rebuild `self.lexer` at its current offset under the new strict
    /// setting. `Lexer` has no strict-mode setter — `strict` is fixed at
    /// construction and consulted by `scan_identifier` on every call — so
    /// toggling mid-parse means swapping in a fresh `Lexer` that continues
    /// from exactly where the old one left off. Tokens already lexed (in
    /// particular `self.cur`) are unaffected, which is fine: the directive
    /// prologue that triggers this is itself plain string literals.
    fn resync_lexer(&mut self) {
        self.lexer = Lexer::at(self.input, self.lexer.offset(), self.strict);
    }

    // -- function-scope bookkeeping -----------------------------------------

    fn hoist_var(&mut self, key: Key) {
        if let Some(scope) = self.scopes.last_mut() {
            if !scope.hoisted_vars.contains(&key) {
                scope.hoisted_vars.push(key);
            }
        }
    }

    fn hoist_function(&mut self, key: Key, template: Rc<FunctionTemplate>) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.hoisted_fns.retain(|(k, _)| *k != key);
            scope.hoisted_fns.push((key, template));
        }
    }

    /// Records a reference to the bare identifier `name`, marking the
    /// enclosing scope as needing a constructed `arguments` object when it's
    /// exactly `"arguments"` (spec `needArguments`; see `FunctionTemplate`).
    fn reference_identifier(&mut self, name: &EStr) -> Ops {
        if name.as_str() == "arguments" {
            if let Some(scope) = self.scopes.last_mut() {
                scope.need_arguments = true;
                scope.need_heap = true;
            }
        }
        let key = self.keys.intern(name.as_str());
        vec![Op::GetLocal(key)]
    }

    fn new_temp_key(&mut self) -> Key {
        let name = format!(" t{}", self.temp_counter);
        self.temp_counter += 1;
        self.keys.intern(&name)
    }

    // -- statements -----------------------------------------------------

    fn parse_statement(&mut self) -> Result<Ops, ParseError> {
        match &self.cur.kind {
            TokenKind::LeftBrace => self.parse_block(),
            TokenKind::Var => self.parse_var_statement(),
            TokenKind::Semicolon => {
                self.bump();
                Ok(Vec::new())
            }
            TokenKind::If => self.parse_if_statement(),
            TokenKind::Do => self.parse_do_statement(),
            TokenKind::While => self.parse_while_statement(),
            TokenKind::For => self.parse_for_statement(),
            TokenKind::Continue => self.parse_continue_statement(),
            TokenKind::Break => self.parse_break_statement(),
            TokenKind::Return => self.parse_return_statement(),
            TokenKind::With => self.parse_with_statement(),
            TokenKind::Switch => self.parse_switch_statement(),
            TokenKind::Throw => self.parse_throw_statement(),
            TokenKind::Try => self.parse_try_statement(),
            TokenKind::Function => {
                self.parse_function_declaration()?;
                Ok(Vec::new())
            }
            TokenKind::Debugger => {
                self.bump();
                self.consume_semicolon()?;
                Ok(Vec::new())
            }
            TokenKind::Identifier(_) if self.peek_is_colon() => self.parse_labeled_statement(),
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_block(&mut self) -> Result<Ops, ParseError> {
        self.bump();
        let mut ops = Vec::new();
        while !self.at(&TokenKind::RightBrace) && !self.at(&TokenKind::Eof) {
            ops.extend(self.parse_statement()?);
        }
        self.expect(TokenKind::RightBrace)?;
        Ok(ops)
    }

    fn parse_expression_statement(&mut self) -> Result<Ops, ParseError> {
        let value = self.parse_expression(false)?;
        self.consume_semicolon()?;
        let mut ops = vec![Op::Expression];
        ops.extend(value);
        Ok(ops)
    }

    fn parse_var_statement(&mut self) -> Result<Ops, ParseError> {
        self.bump();
        let ops = self.parse_var_declarator_list(false)?;
        self.consume_semicolon()?;
        Ok(ops)
    }

    /// `in_for_init` suppresses the bare `in` operator in each initializer so
    /// `for (var x in obj)` isn't swallowed as `for (var x; in obj; ...)`'s
    /// malformed cousin.
    fn parse_var_declarator_list(&mut self, in_for_init: bool) -> Result<Ops, ParseError> {
        let mut ops = Vec::new();
        loop {
            let name = self.expect_identifier_name()?;
            let key = self.keys.intern(name.as_str());
            self.hoist_var(key);
            if self.eat(&TokenKind::Assign) {
                let value = self.parse_assignment(in_for_init)?;
                ops.push(Op::Expression);
                ops.push(Op::SetLocal(key));
                ops.extend(value);
            }
            if self.eat(&TokenKind::Comma) {
                continue;
            }
            break;
        }
        Ok(ops)
    }

    fn parse_if_statement(&mut self) -> Result<Ops, ParseError> {
        self.bump();
        self.expect(TokenKind::LeftParen)?;
        let test = self.parse_expression(false)?;
        self.expect(TokenKind::RightParen)?;
        let cons = self.parse_statement()?;
        if self.eat(&TokenKind::Else) {
            let alt = self.parse_statement()?;
            let jump_if_not_offset = (2 + test.len() + cons.len()) as i32;
            let jump_offset = (1 + alt.len()) as i32;
            let mut ops = vec![Op::JumpIfNot(jump_if_not_offset)];
            ops.extend(test);
            ops.extend(cons);
            ops.push(Op::Jump(jump_offset));
            ops.extend(alt);
            Ok(ops)
        } else {
            let jump_if_not_offset = (1 + test.len() + cons.len()) as i32;
            let mut ops = vec![Op::JumpIfNot(jump_if_not_offset)];
            ops.extend(test);
            ops.extend(cons);
            Ok(ops)
        }
    }

    fn parse_while_statement(&mut self) -> Result<Ops, ParseError> {
        self.bump();
        self.expect(TokenKind::LeftParen)?;
        let cond = self.parse_expression(false)?;
        self.expect(TokenKind::RightParen)?;
        let label = self.pending_label.take();
        self.depths.push(DepthEntry { label: label.clone(), is_loop: true, is_switch: false });
        let body = self.parse_statement()?;
        self.depths.pop();
        Ok(build_iterate(cond, body, label))
    }

    fn parse_do_statement(&mut self) -> Result<Ops, ParseError> {
        self.bump();
        let label = self.pending_label.take();
        self.depths.push(DepthEntry { label: label.clone(), is_loop: true, is_switch: false });
        let body = self.parse_statement()?;
        self.depths.pop();
        self.expect(TokenKind::While)?;
        self.expect(TokenKind::LeftParen)?;
        let cond = self.parse_expression(false)?;
        self.expect(TokenKind::RightParen)?;
        self.consume_semicolon()?;
        Ok(build_iterate_do_while(cond, body, label))
    }

    fn parse_for_statement(&mut self) -> Result<Ops, ParseError> {
        self.bump();
        self.expect(TokenKind::LeftParen)?;

        if self.eat(&TokenKind::Var) {
            let name = self.expect_identifier_name()?;
            let key = self.keys.intern(name.as_str());
            self.hoist_var(key);
            if self.eat(&TokenKind::In) {
                return self.finish_iterate_in(Op::GetLocal(key));
            }
            let mut init = Vec::new();
            if self.eat(&TokenKind::Assign) {
                let value = self.parse_assignment(true)?;
                init.push(Op::Expression);
                init.push(Op::SetLocal(key));
                init.extend(value);
            }
            if self.eat(&TokenKind::Comma) {
                let mut rest = self.parse_var_declarator_list(true)?;
                init.append(&mut rest);
            }
            self.expect(TokenKind::Semicolon)?;
            return self.finish_c_style_for(init);
        }

        if self.eat(&TokenKind::Semicolon) {
            return self.finish_c_style_for(Vec::new());
        }

        let first = self.parse_expression(true)?;
        if self.eat(&TokenKind::In) {
            let place = self.require_loop_place(first)?;
            return self.finish_iterate_in(place);
        }
        let mut init = vec![Op::Discard];
        init.extend(first);
        self.expect(TokenKind::Semicolon)?;
        self.finish_c_style_for(init)
    }

    /// Validates that `ops` is a single op the interpreter can reinterpret as
    /// an assignable place (spec `iterateIn`'s binding slot), the same
    /// restriction `resolve_place` imposes on `=`/`++`/`delete` targets.
    fn require_loop_place(&self, ops: Ops) -> Result<Op, ParseError> {
        if ops.len() != 1 {
            return Err(self.error("invalid for-in loop variable"));
        }
        match ops.into_iter().next().unwrap() {
            op @ (Op::GetLocal(_) | Op::GetLocalSlot(_)) => Ok(op),
            _ => Err(self.error("invalid for-in loop variable")),
        }
    }

    fn finish_iterate_in(&mut self, place: Op) -> Result<Ops, ParseError> {
        let object = self.parse_expression(false)?;
        self.expect(TokenKind::RightParen)?;
        let label = self.pending_label.take();
        self.depths.push(DepthEntry { label: label.clone(), is_loop: true, is_switch: false });
        let body = self.parse_statement()?;
        self.depths.pop();
        Ok(build_iterate_in(place, object, body, label))
    }

    fn finish_c_style_for(&mut self, init: Ops) -> Result<Ops, ParseError> {
        let cond = if self.at(&TokenKind::Semicolon) { Vec::new() } else { self.parse_expression(false)? };
        self.expect(TokenKind::Semicolon)?;
        let step = if self.at(&TokenKind::RightParen) { None } else { Some(self.parse_expression(false)?) };
        self.expect(TokenKind::RightParen)?;

        let label = self.pending_label.take();
        self.depths.push(DepthEntry { label: label.clone(), is_loop: true, is_switch: false });
        let body = self.parse_statement()?;
        self.depths.pop();

        if !cond.is_empty() {
            if let Some(range) = self.try_build_iterate_range(&cond, step.as_ref(), &body, &label) {
                let mut ops = init;
                ops.extend(range);
                return Ok(ops);
            }
        }

        let mut ops = init;
        ops.extend(build_iterate_for(cond, step, body, label));
        Ok(ops)
    }

    /// Peephole pass recognizing `for (i = lo; i <op> bound; i++ )`-shaped
    /// loops and lowering them to `Op::IterateRange`, which reads the index
    /// and bound through a place rather than re-running the generic
    /// condition/step op fragments every iteration (spec's
    /// `iterateLessRef`/`iterateMoreRef`/... family). Declines (returning
    /// `None`) for anything that doesn't match exactly, falling back to the
    /// fully general `Op::IterateFor`.
    fn try_build_iterate_range(&mut self, cond: &Ops, step: Option<&Ops>, body: &Ops, label: &Option<Box<str>>) -> Option<Ops> {
        let (cmp, index_key, bound_ops) = match cond.as_slice() {
            [Op::Less, Op::GetLocal(k), rest @ ..] => (CompareOp::Less, *k, rest),
            [Op::LessOrEqual, Op::GetLocal(k), rest @ ..] => (CompareOp::LessOrEqual, *k, rest),
            [Op::More, Op::GetLocal(k), rest @ ..] => (CompareOp::More, *k, rest),
            [Op::MoreOrEqual, Op::GetLocal(k), rest @ ..] => (CompareOp::MoreOrEqual, *k, rest),
            _ => return None,
        };
        let step = step?;
        let ascending = matches!(cmp, CompareOp::Less | CompareOp::LessOrEqual);
        let step_value: Ops = match step.as_slice() {
            [Op::PostIncrement, Op::GetLocal(k)] | [Op::PreIncrement, Op::GetLocal(k)] if ascending && *k == index_key => {
                vec![Op::Value(Const::Int(1))]
            }
            [Op::PostDecrement, Op::GetLocal(k)] | [Op::PreDecrement, Op::GetLocal(k)] if !ascending && *k == index_key => {
                vec![Op::Value(Const::Int(1))]
            }
            [Op::AddAssign, Op::GetLocal(k), rest @ ..] if ascending && *k == index_key => rest.to_vec(),
            [Op::SubAssign, Op::GetLocal(k), rest @ ..] if !ascending && *k == index_key => rest.to_vec(),
            _ => return None,
        };

        let bound_is_simple = matches!(bound_ops, [Op::GetLocal(_)] | [Op::Value(_)]);
        if !bound_is_simple {
            return None;
        }

        if let [Op::GetLocal(bound_key)] = bound_ops {
            return Some(build_iterate_range(cmp, step_value, Op::GetLocal(index_key), Op::GetLocal(*bound_key), body.clone(), label.clone()));
        }

        // A literal bound (`i < 10`) is re-evaluated fresh each iteration by
        // `exec_iterate_range`'s generic place-read, so it's stashed in a
        // hidden local once up front rather than being re-parsed as a
        // constant every pass.
        let temp_key = self.new_temp_key();
        let mut ops = vec![Op::Discard, Op::SetLocal(temp_key)];
        ops.extend(bound_ops.iter().cloned());
        ops.extend(build_iterate_range(cmp, step_value, Op::GetLocal(index_key), Op::GetLocal(temp_key), body.clone(), label.clone()));
        Some(ops)
    }

    fn parse_continue_statement(&mut self) -> Result<Ops, ParseError> {
        self.bump();
        let label = self.parse_optional_label()?;
        self.consume_semicolon()?;
        self.validate_continue(&label)?;
        Ok(vec![Op::Continue(label)])
    }

    fn parse_break_statement(&mut self) -> Result<Ops, ParseError> {
        self.bump();
        let label = self.parse_optional_label()?;
        self.consume_semicolon()?;
        self.validate_break(&label)?;
        Ok(vec![Op::Break(label)])
    }

    /// A `break`/`continue`'s label must be on the same line (no line break
    /// between the keyword and the identifier, same ASI rule as `return`).
    fn parse_optional_label(&mut self) -> Result<Option<Box<str>>, ParseError> {
        if self.cur.did_line_break {
            return Ok(None);
        }
        if let TokenKind::Identifier(name) = self.cur.kind.clone() {
            self.bump();
            return Ok(Some(Box::from(name.as_str())));
        }
        Ok(None)
    }

    fn validate_break(&self, label: &Option<Box<str>>) -> Result<(), ParseError> {
        match label {
            None => {
                if self.depths.iter().any(|d| d.is_loop || d.is_switch) {
                    Ok(())
                } else {
                    Err(self.error("illegal break statement"))
                }
            }
            Some(name) => {
                if self.depths.iter().any(|d| d.label.as_deref() == Some(name.as_ref())) {
                    Ok(())
                } else {
                    Err(self.error(format!("undefined label '{}'", name)))
                }
            }
        }
    }

    fn validate_continue(&self, label: &Option<Box<str>>) -> Result<(), ParseError> {
        match label {
            None => {
                if self.depths.iter().any(|d| d.is_loop) {
                    Ok(())
                } else {
                    Err(self.error("illegal continue statement"))
                }
            }
            Some(name) => {
                if self.depths.iter().any(|d| d.is_loop && d.label.as_deref() == Some(name.as_ref())) {
                    Ok(())
                } else {
                    Err(self.error(format!("undefined label '{}'", name)))
                }
            }
        }
    }

    fn parse_return_statement(&mut self) -> Result<Ops, ParseError> {
        self.bump();
        let value = if self.cur.did_line_break || self.at(&TokenKind::Semicolon) || self.at(&TokenKind::RightBrace) || self.at(&TokenKind::Eof) {
            vec![Op::Value(Const::Undefined)]
        } else {
            self.parse_expression(false)?
        };
        self.consume_semicolon()?;
        let mut ops = vec![Op::Return];
        ops.extend(value);
        Ok(ops)
    }

    fn parse_with_statement(&mut self) -> Result<Ops, ParseError> {
        if self.strict {
            return Err(self.error("'with' is not allowed in strict mode"));
        }
        self.bump();
        self.expect(TokenKind::LeftParen)?;
        let object = self.parse_expression(false)?;
        self.expect(TokenKind::RightParen)?;
        let body = self.parse_statement()?;
        let end_offset = (2 + object.len() + body.len()) as i32;
        let mut ops = vec![Op::With { end_offset }];
        ops.extend(object);
        ops.extend(body);
        ops.push(Op::End);
        Ok(ops)
    }

    fn parse_throw_statement(&mut self) -> Result<Ops, ParseError> {
        self.bump();
        if self.cur.did_line_break {
            return Err(self.error("illegal newline after 'throw'"));
        }
        let value = self.parse_expression(false)?;
        self.consume_semicolon()?;
        let mut ops = vec![Op::Throw];
        ops.extend(value);
        Ok(ops)
    }

    fn parse_try_statement(&mut self) -> Result<Ops, ParseError> {
        self.bump();
        let try_body = self.parse_block()?;

        let has_catch = self.at(&TokenKind::Catch);
        let mut catch_key = None;
        let mut catch_body = Vec::new();
        if has_catch {
            self.bump();
            self.expect(TokenKind::LeftParen)?;
            let name = self.expect_identifier_name()?;
            catch_key = Some(self.keys.intern(name.as_str()));
            self.expect(TokenKind::RightParen)?;
            catch_body = self.parse_block()?;
        }

        let has_finally = self.at(&TokenKind::Finally);
        let mut finally_body = Vec::new();
        if has_finally {
            self.bump();
            finally_body = self.parse_block()?;
        }

        if !has_catch && !has_finally {
            return Err(self.error("missing catch or finally after try"));
        }

        let try_len = try_body.len() as i32;
        let (catch_offset, middle_len) = if has_catch {
            (2 + try_len, 2 + catch_body.len() as i32)
        } else {
            (0, 0)
        };
        let end_offset = 2 + try_len + middle_len;

        let mut ops = vec![Op::Try { catch_offset, end_offset }];
        ops.extend(try_body);
        ops.push(Op::End);
        if has_catch {
            ops.push(Op::CatchBind(catch_key.expect("has_catch implies a binding")));
            ops.extend(catch_body);
            ops.push(Op::End);
        }
        ops.extend(finally_body);
        ops.push(Op::End);
        Ok(ops)
    }

    /// `switch`'s bodies region always starts with the `default` arm's body
    /// (if any), followed by the remaining arms in source order, chained
    /// with no `End` between them so an unlabeled `break` is required to
    /// leave a case (spec §4.2 fallthrough). `exec_switch`'s "nothing
    /// matched" path always resumes exactly at the start of the bodies
    /// region with no awareness of where `default` sits in source — laying
    /// `default`'s body first is what makes that correct. When there's no
    /// `default` clause at all, the bodies region opens with a bare
    /// `Op::Jump` skipping every case body, since an empty synthetic
    /// default would otherwise leave the "nothing matched" fallback running
    /// straight into the first real case's body.
    fn parse_switch_statement(&mut self) -> Result<Ops, ParseError> {
        self.bump();
        self.expect(TokenKind::LeftParen)?;
        let subject = self.parse_expression(false)?;
        self.expect(TokenKind::RightParen)?;
        self.expect(TokenKind::LeftBrace)?;

        let label = self.pending_label.take();
        self.depths.push(DepthEntry { label: label.clone(), is_loop: false, is_switch: true });

        struct Arm {
            test: Option<Ops>,
            body: Ops,
        }
        let mut arms: Vec<Arm> = Vec::new();
        let mut default_index: Option<usize> = None;

        while !self.at(&TokenKind::RightBrace) && !self.at(&TokenKind::Eof) {
            let test = if self.eat(&TokenKind::Case) {
                let t = self.parse_expression(false)?;
                self.expect(TokenKind::Colon)?;
                Some(t)
            } else {
                self.expect(TokenKind::Default)?;
                self.expect(TokenKind::Colon)?;
                if default_index.is_some() {
                    return Err(self.error("duplicate 'default' clause in switch"));
                }
                default_index = Some(arms.len());
                None
            };
            let mut body = Vec::new();
            while !self.at(&TokenKind::Case) && !self.at(&TokenKind::Default) && !self.at(&TokenKind::RightBrace) && !self.at(&TokenKind::Eof) {
                body.extend(self.parse_statement()?);
            }
            arms.push(Arm { test, body });
        }
        self.expect(TokenKind::RightBrace)?;
        self.depths.pop();

        // Bodies are laid out default-first, everything else in source
        // order, each carrying the source index it came from so `SwitchCase`
        // headers (emitted in source order) can compute the offset to their
        // own body wherever it actually landed.
        let mut body_order: Vec<usize> = (0..arms.len()).collect();
        if let Some(d) = default_index {
            body_order.remove(d);
            body_order.insert(0, d);
        }

        let header_start = 1 + subject.len(); // slot index, relative to the Switch op, where headers begin
        let mut header_len = 0usize;
        for arm in &arms {
            header_len += arm.test.as_ref().map_or(0, |t| t.len()) + 1; // + SwitchCase slot
        }
        let bodies_start = header_start + header_len;

        let mut body_slot_of = vec![0usize; arms.len()];
        let mut cursor = bodies_start + if default_index.is_none() { 1 } else { 0 };
        for &i in &body_order {
            body_slot_of[i] = cursor;
            cursor += arms[i].body.len();
        }
        let end_slot = cursor;

        let mut ops = vec![Op::Switch { arm_count: arms.len() as u32, end_offset: end_slot as i32, label }];
        ops.extend(subject);

        let mut slot = header_start;
        for (i, arm) in arms.iter().enumerate() {
            if let Some(test) = &arm.test {
                ops.extend(test.clone());
                slot += test.len();
            }
            let body_offset = (body_slot_of[i] as i32) - (slot as i32);
            ops.push(Op::SwitchCase { body_offset });
            slot += 1;
        }

        debug_assert_eq!(ops.len(), bodies_start);
        if default_index.is_none() {
            let rest_len: usize = arms.iter().map(|a| a.body.len()).sum();
            ops.push(Op::Jump((1 + rest_len) as i32));
        }
        for &i in &body_order {
            ops.extend(arms[i].body.clone());
        }
        ops.push(Op::End);
        Ok(ops)
    }

    // -- labeled statements -----------------------------------------------

    fn parse_labeled_statement(&mut self) -> Result<Ops, ParseError> {
        let name = self.expect_identifier_name()?;
        self.expect(TokenKind::Colon)?;
        let label: Box<str> = Box::from(name.as_str());
        if self.depths.iter().any(|d| d.label.as_deref() == Some(label.as_ref())) {
            return Err(self.error(format!("label '{}' has already been declared", label)));
        }

        // A loop or switch immediately under this label claims it directly
        // (so `break label`/`continue label` target the loop itself, not a
        // wrapping `Op::Labeled`); anything else gets wrapped.
        if matches!(self.cur.kind, TokenKind::For | TokenKind::While | TokenKind::Do | TokenKind::Switch) {
            self.pending_label = Some(label);
            return self.parse_statement();
        }

        self.depths.push(DepthEntry { label: Some(label.clone()), is_loop: false, is_switch: false });
        let body = self.parse_statement()?;
        self.depths.pop();
        let end_offset = (1 + body.len()) as i32;
        let mut ops = vec![Op::Labeled { label, end_offset }];
        ops.extend(body);
        Ok(ops)
    }

    // -- functions --------------------------------------------------------

    fn parse_function_declaration(&mut self) -> Result<(), ParseError> {
        self.bump();
        let name = self.expect_identifier_name()?;
        let key = self.keys.intern(name.as_str());
        let template = self.parse_function_rest(Some(name))?;
        self.hoist_function(key, template);
        Ok(())
    }

    fn parse_function_expr(&mut self) -> Result<Ops, ParseError> {
        self.bump();
        let name = if let TokenKind::Identifier(name) = self.cur.kind.clone() {
            self.bump();
            Some(name)
        } else {
            None
        };
        let template = self.parse_function_rest(name)?;
        Ok(vec![Op::Function(template)])
    }

    fn parse_function_rest(&mut self, name: Option<EStr>) -> Result<Rc<FunctionTemplate>, ParseError> {
        self.expect(TokenKind::LeftParen)?;
        let mut param_names = Vec::new();
        if !self.at(&TokenKind::RightParen) {
            loop {
                let param = self.expect_identifier_name()?;
                param_names.push(self.keys.intern(param.as_str()));
                if self.eat(&TokenKind::Comma) {
                    continue;
                }
                break;
            }
        }
        self.expect(TokenKind::RightParen)?;
        self.expect(TokenKind::LeftBrace)?;

        self.scopes.push(FunctionScope::new());
        let outer_strict = self.strict;
        let body = self.parse_function_body_statements()?;
        self.expect(TokenKind::RightBrace)?;
        let scope = self.scopes.pop().expect("just pushed");
        self.strict = outer_strict;

        let mut ops = build_hoist_prologue(&scope);
        ops.extend(body);
        ops.push(Op::End);

        if let Some(outer) = self.scopes.last_mut() {
            outer.need_heap = true;
        }

        Ok(Rc::new(FunctionTemplate {
            ops: Rc::new(ops),
            param_count: param_names.len() as u32,
            param_names,
            name,
            need_heap: scope.need_heap,
            need_arguments: scope.need_arguments,
            strict_mode: self.strict,
        }))
    }

    /// Shared by a function body and the top-level program: parses
    /// statements until the enclosing `}`/EOF, recognizing a leading run of
    /// bare string-literal expression statements as the directive prologue
    /// (spec §4.2) and switching on strict mode the moment `"use strict"`
    /// appears among them.
    fn parse_function_body_statements(&mut self) -> Result<Ops, ParseError> {
        let mut ops = Vec::new();
        let mut in_prologue = true;
        while !self.at(&TokenKind::RightBrace) && !self.at(&TokenKind::Eof) {
            let stmt = self.parse_statement()?;
            if in_prologue {
                match stmt.as_slice() {
                    [Op::Expression, Op::Value(Const::Str(s))] => {
                        if s.as_str() == "use strict" && !self.strict {
                            self.strict = true;
                            self.resync_lexer();
                        }
                    }
                    _ => in_prologue = false,
                }
            }
            ops.extend(stmt);
        }
        Ok(ops)
    }

    // -- expressions, lowest to highest precedence -------------------------

    /// The comma operator; top of the expression grammar. Never used to
    /// parse one item of a list (call arguments, array elements, ...) —
    /// those call `parse_assignment` directly so a bare `,` terminates the
    /// item instead of being swallowed.
    fn parse_expression(&mut self, no_in: bool) -> Result<Ops, ParseError> {
        let mut left = self.parse_assignment(no_in)?;
        while self.at(&TokenKind::Comma) {
            self.bump();
            let right = self.parse_assignment(no_in)?;
            let mut ops = vec![Op::Comma];
            ops.extend(left);
            ops.extend(right);
            left = ops;
        }
        Ok(left)
    }

    fn parse_assignment(&mut self, no_in: bool) -> Result<Ops, ParseError> {
        let left = self.parse_conditional(no_in)?;
        let op = match self.cur.kind {
            TokenKind::Assign => Op::Assign,
            TokenKind::PlusAssign => Op::AddAssign,
            TokenKind::MinusAssign => Op::SubAssign,
            TokenKind::MulAssign => Op::MulAssign,
            TokenKind::DivAssign => Op::DivAssign,
            TokenKind::ModAssign => Op::ModAssign,
            TokenKind::ShlAssign => Op::ShlAssign,
            TokenKind::ShrAssign => Op::ShrAssign,
            TokenKind::UShrAssign => Op::UShrAssign,
            TokenKind::AndAssign => Op::BitAndAssign,
            TokenKind::OrAssign => Op::BitOrAssign,
            TokenKind::XorAssign => Op::BitXorAssign,
            _ => return Ok(left),
        };
        self.validate_assignment_target(&left)?;
        self.bump();
        let right = self.parse_assignment(no_in)?;
        Ok(binary(op, left, right))
    }

    fn validate_assignment_target(&self, ops: &Ops) -> Result<(), ParseError> {
        match ops.first() {
            Some(Op::GetLocal(_)) | Some(Op::GetLocalSlot(_)) | Some(Op::GetMember(_)) | Some(Op::GetProperty) => Ok(()),
            _ => Err(self.error("invalid assignment target")),
        }
    }

    fn parse_conditional(&mut self, no_in: bool) -> Result<Ops, ParseError> {
        let test = self.parse_logical_or(no_in)?;
        if self.eat(&TokenKind::Question) {
            let cons = self.parse_assignment(false)?;
            self.expect(TokenKind::Colon)?;
            let alt = self.parse_assignment(no_in)?;
            let alt_offset = (1 + test.len() + cons.len()) as i32;
            let end_offset = alt_offset + alt.len() as i32;
            let mut ops = vec![Op::Conditional { alt_offset, end_offset }];
            ops.extend(test);
            ops.extend(cons);
            ops.extend(alt);
            Ok(ops)
        } else {
            Ok(test)
        }
    }

    fn parse_logical_or(&mut self, no_in: bool) -> Result<Ops, ParseError> {
        let mut left = self.parse_logical_and(no_in)?;
        while self.at(&TokenKind::OrOr) {
            self.bump();
            let right = self.parse_logical_and(no_in)?;
            let skip = (1 + left.len() + right.len()) as u32;
            let mut ops = vec![Op::LogicalOr(skip)];
            ops.extend(left);
            ops.extend(right);
            left = ops;
        }
        Ok(left)
    }

    fn parse_logical_and(&mut self, no_in: bool) -> Result<Ops, ParseError> {
        let mut left = self.parse_bitor(no_in)?;
        while self.at(&TokenKind::AndAnd) {
            self.bump();
            let right = self.parse_bitor(no_in)?;
            let skip = (1 + left.len() + right.len()) as u32;
            let mut ops = vec![Op::LogicalAnd(skip)];
            ops.extend(left);
            ops.extend(right);
            left = ops;
        }
        Ok(left)
    }

    fn parse_bitor(&mut self, no_in: bool) -> Result<Ops, ParseError> {
        let mut left = self.parse_bitxor(no_in)?;
        while self.at(&TokenKind::Pipe) {
            self.bump();
            let right = self.parse_bitxor(no_in)?;
            left = binary(Op::BitOr, left, right);
        }
        Ok(left)
    }

    fn parse_bitxor(&mut self, no_in: bool) -> Result<Ops, ParseError> {
        let mut left = self.parse_bitand(no_in)?;
        while self.at(&TokenKind::Caret) {
            self.bump();
            let right = self.parse_bitand(no_in)?;
            left = binary(Op::BitXor, left, right);
        }
        Ok(left)
    }

    fn parse_bitand(&mut self, no_in: bool) -> Result<Ops, ParseError> {
        let mut left = self.parse_equality(no_in)?;
        while self.at(&TokenKind::Amp) {
            self.bump();
            let right = self.parse_equality(no_in)?;
            left = binary(Op::BitAnd, left, right);
        }
        Ok(left)
    }

    fn parse_equality(&mut self, no_in: bool) -> Result<Ops, ParseError> {
        let mut left = self.parse_relational(no_in)?;
        loop {
            let op = match self.cur.kind {
                TokenKind::Eq => Op::Equal,
                TokenKind::NotEq => Op::NotEqual,
                TokenKind::StrictEq => Op::Identical,
                TokenKind::StrictNotEq => Op::NotIdentical,
                _ => break,
            };
            self.bump();
            let right = self.parse_relational(no_in)?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_relational(&mut self, no_in: bool) -> Result<Ops, ParseError> {
        let mut left = self.parse_shift()?;
        loop {
            let op = match self.cur.kind {
                TokenKind::Lt => Op::Less,
                TokenKind::Gt => Op::More,
                TokenKind::LtEq => Op::LessOrEqual,
                TokenKind::GtEq => Op::MoreOrEqual,
                TokenKind::InstanceOf => Op::InstanceOf,
                TokenKind::In if !no_in => Op::In,
                _ => break,
            };
            self.bump();
            let right = self.parse_shift()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_shift(&mut self) -> Result<Ops, ParseError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.cur.kind {
                TokenKind::Shl => Op::Shl,
                TokenKind::Shr => Op::Shr,
                TokenKind::UShr => Op::UShr,
                _ => break,
            };
            self.bump();
            let right = self.parse_additive()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Ops, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.cur.kind {
                TokenKind::Plus => Op::Add,
                TokenKind::Minus => Op::Sub,
                _ => break,
            };
            self.bump();
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Ops, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.cur.kind {
                TokenKind::Star => Op::Mul,
                TokenKind::Slash => Op::Div,
                TokenKind::Percent => Op::Mod,
                _ => break,
            };
            self.bump();
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Ops, ParseError> {
        let prefix_op = match self.cur.kind {
            TokenKind::Plus => Some(Op::UnaryPlus),
            TokenKind::Minus => Some(Op::UnaryMinus),
            TokenKind::Tilde => Some(Op::BitNot),
            TokenKind::Bang => Some(Op::LogicalNot),
            TokenKind::TypeOf => Some(Op::TypeOf),
            TokenKind::Void => Some(Op::Void),
            _ => None,
        };
        if let Some(op) = prefix_op {
            self.bump();
            let operand = self.parse_unary()?;
            return Ok(prefix(op, operand));
        }
        if self.eat(&TokenKind::Delete) {
            let operand = self.parse_unary()?;
            return Ok(build_delete(operand));
        }
        if self.eat(&TokenKind::PlusPlus) {
            let operand = self.parse_unary()?;
            self.validate_assignment_target(&operand)?;
            return Ok(prefix(Op::PreIncrement, operand));
        }
        if self.eat(&TokenKind::MinusMinus) {
            let operand = self.parse_unary()?;
            self.validate_assignment_target(&operand)?;
            return Ok(prefix(Op::PreDecrement, operand));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Ops, ParseError> {
        let operand = self.parse_lhs()?;
        if !self.cur.did_line_break {
            if self.at(&TokenKind::PlusPlus) {
                self.validate_assignment_target(&operand)?;
                self.bump();
                return Ok(prefix(Op::PostIncrement, operand));
            }
            if self.at(&TokenKind::MinusMinus) {
                self.validate_assignment_target(&operand)?;
                self.bump();
                return Ok(prefix(Op::PostDecrement, operand));
            }
        }
        Ok(operand)
    }

    /// `new`, member access (`.`/`[]`), and calls, unified into one
    /// left-to-right chain the way a real Pratt-style member parser does —
    /// `new Foo().bar()` and `Foo().bar()` share every step past the initial
    /// `new`-prefix handling.
    fn parse_lhs(&mut self) -> Result<Ops, ParseError> {
        let mut target = if self.eat(&TokenKind::New) {
            let callee = self.parse_member_only()?;
            let args = if self.at(&TokenKind::LeftParen) {
                self.bump();
                self.parse_arguments()?
            } else {
                Vec::new()
            };
            concat_call(Op::Construct(args.len() as u32), callee, args)
        } else {
            self.parse_primary()?
        };

        loop {
            target = match self.cur.kind {
                TokenKind::Dot => {
                    self.bump();
                    let name = self.expect_identifier_name()?;
                    let key = self.keys.intern(name.as_str());
                    prefix(Op::GetMember(key), target)
                }
                TokenKind::LeftBracket => {
                    self.bump();
                    let key_expr = self.parse_expression(false)?;
                    self.expect(TokenKind::RightBracket)?;
                    binary(Op::GetProperty, target, key_expr)
                }
                TokenKind::LeftParen => {
                    self.bump();
                    let args = self.parse_arguments()?;
                    concat_call(Op::Call(args.len() as u32), target, args)
                }
                _ => break,
            };
        }
        Ok(target)
    }

    /// `new`'s callee expression: member access only, stopping before any
    /// `(...)` so `new Foo(1)(2)` parses as `(new Foo(1))(2)` rather than
    /// `new (Foo(1)(2))`.
    fn parse_member_only(&mut self) -> Result<Ops, ParseError> {
        let mut target = if self.eat(&TokenKind::New) {
            let callee = self.parse_member_only()?;
            let args = if self.at(&TokenKind::LeftParen) {
                self.bump();
                self.parse_arguments()?
            } else {
                Vec::new()
            };
            concat_call(Op::Construct(args.len() as u32), callee, args)
        } else {
            self.parse_primary()?
        };
        loop {
            target = match self.cur.kind {
                TokenKind::Dot => {
                    self.bump();
                    let name = self.expect_identifier_name()?;
                    let key = self.keys.intern(name.as_str());
                    prefix(Op::GetMember(key), target)
                }
                TokenKind::LeftBracket => {
                    self.bump();
                    let key_expr = self.parse_expression(false)?;
                    self.expect(TokenKind::RightBracket)?;
                    binary(Op::GetProperty, target, key_expr)
                }
                _ => break,
            };
        }
        Ok(target)
    }

    fn parse_arguments(&mut self) -> Result<Vec<Ops>, ParseError> {
        let mut args = Vec::new();
        if !self.at(&TokenKind::RightParen) {
            loop {
                args.push(self.parse_assignment(false)?);
                if self.eat(&TokenKind::Comma) {
                    continue;
                }
                break;
            }
        }
        self.expect(TokenKind::RightParen)?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Ops, ParseError> {
        match self.cur.kind.clone() {
            TokenKind::IntegerLiteral(i) => {
                self.bump();
                Ok(vec![Op::Value(Const::Int(i))])
            }
            TokenKind::NumberLiteral(n) => {
                self.bump();
                Ok(vec![Op::Value(Const::Number(n))])
            }
            TokenKind::StringLiteral(s) => {
                self.bump();
                Ok(vec![Op::Value(Const::Str(s))])
            }
            TokenKind::RegexLiteral(raw) => {
                self.bump();
                self.build_regex_literal(&raw)
            }
            TokenKind::Null => {
                self.bump();
                Ok(vec![Op::Value(Const::Null)])
            }
            TokenKind::True => {
                self.bump();
                Ok(vec![Op::Value(Const::Boolean(true))])
            }
            TokenKind::False => {
                self.bump();
                Ok(vec![Op::Value(Const::Boolean(false))])
            }
            TokenKind::This => {
                self.bump();
                Ok(vec![Op::This])
            }
            TokenKind::Identifier(name) => {
                self.bump();
                Ok(self.reference_identifier(&name))
            }
            TokenKind::LeftParen => {
                self.bump();
                let inner = self.parse_expression(false)?;
                self.expect(TokenKind::RightParen)?;
                Ok(inner)
            }
            TokenKind::LeftBracket => self.parse_array_literal(),
            TokenKind::LeftBrace => self.parse_object_literal(),
            TokenKind::Function => self.parse_function_expr(),
            other => Err(self.error(format!("unexpected token {:?}", other))),
        }
    }

    /// The raw slice still carries its delimiting `/`s and trailing flags
    /// (e.g. `/ab+c/gi`); the regex engine's own compiler splits pattern from
    /// flags, so this just hands the text through as a string constant
    /// passed to the `RegExp` constructor — see `builtins::regexp`.
    fn build_regex_literal(&mut self, raw: &EStr) -> Result<Ops, ParseError> {
        let text = raw.as_str();
        let last_slash = text.rfind('/').ok_or_else(|| self.error("malformed regex literal"))?;
        let pattern = &text[1..last_slash];
        let flags = &text[last_slash + 1..];
        let callee = self.reference_identifier(&EStr::new("RegExp"));
        let args = vec![vec![Op::Value(Const::Str(EStr::new(pattern)))], vec![Op::Value(Const::Str(EStr::new(flags)))]];
        Ok(concat_call(Op::Construct(2), callee, args))
    }

    fn parse_array_literal(&mut self) -> Result<Ops, ParseError> {
        self.bump();
        let mut elements = Vec::new();
        while !self.at(&TokenKind::RightBracket) {
            if self.at(&TokenKind::Comma) {
                elements.push(vec![Op::Noop]);
                self.bump();
                continue;
            }
            elements.push(self.parse_assignment(false)?);
            if !self.at(&TokenKind::RightBracket) {
                self.expect(TokenKind::Comma)?;
            }
        }
        self.expect(TokenKind::RightBracket)?;
        let mut ops = vec![Op::ArrayLiteral(elements.len() as u32)];
        for element in elements {
            ops.extend(element);
        }
        Ok(ops)
    }

    fn parse_object_literal(&mut self) -> Result<Ops, ParseError> {
        self.bump();
        let mut entries = Vec::new();
        while !self.at(&TokenKind::RightBrace) {
            entries.push(self.parse_property_init()?);
            if !self.at(&TokenKind::RightBrace) {
                self.expect(TokenKind::Comma)?;
            }
        }
        self.expect(TokenKind::RightBrace)?;
        let mut ops = vec![Op::ObjectLiteral(entries.len() as u32)];
        for (head, value) in entries {
            ops.push(Op::PropertyInit(head));
            ops.extend(value);
        }
        Ok(ops)
    }

    fn parse_property_init(&mut self) -> Result<(PropertyInit, Ops), ParseError> {
        if self.at(&TokenKind::Identifier(EStr::new("get"))) && self.peek_is_property_name_start() {
            self.bump();
            let key = self.parse_object_key()?;
            let template = self.parse_function_rest(None)?;
            return Ok((PropertyInit::Getter(key), vec![Op::Function(template)]));
        }
        if self.at(&TokenKind::Identifier(EStr::new("set"))) && self.peek_is_property_name_start() {
            self.bump();
            let key = self.parse_object_key()?;
            let template = self.parse_function_rest(None)?;
            return Ok((PropertyInit::Setter(key), vec![Op::Function(template)]));
        }
        let key = self.parse_object_key()?;
        self.expect(TokenKind::Colon)?;
        let value = self.parse_assignment(false)?;
        Ok((PropertyInit::Value(key), value))
    }

    /// `get`/`set` introduce an accessor only when followed by another
    /// property-name token; `{ get: 1 }` must still parse as a plain data
    /// property named `get`. Mirrors `peek_is_colon`'s throwaway-lexer probe.
    fn peek_is_property_name_start(&self) -> bool {
        let mut probe = Lexer::at(self.input, self.lexer.offset(), self.strict);
        let next = probe.next_token(LexFlags { allow_regex: false, disallow_keyword: true });
        !matches!(next.kind, TokenKind::Colon | TokenKind::LeftParen | TokenKind::Comma | TokenKind::RightBrace | TokenKind::Eof)
    }

    /// An object literal key is an identifier (keywords included, spec
    /// §4.2), a string, or a number — all folded down to one interned `Key`.
    fn parse_object_key(&mut self) -> Result<Key, ParseError> {
        match self.cur.kind.clone() {
            TokenKind::Identifier(name) => {
                self.bump();
                Ok(self.keys.intern(name.as_str()))
            }
            TokenKind::StringLiteral(s) => {
                self.bump();
                Ok(self.keys.intern(s.as_str()))
            }
            TokenKind::IntegerLiteral(i) => {
                self.bump();
                Ok(self.keys.intern(&i.to_string()))
            }
            TokenKind::NumberLiteral(n) => {
                self.bump();
                Ok(self.keys.intern(&crate::value::format_number(n)))
            }
            other => {
                // Keywords are valid property names; re-read the current
                // token's text as a bare identifier rather than rejecting it.
                if let Some(name) = keyword_spelling(&other) {
                    self.bump();
                    Ok(self.keys.intern(name))
                } else {
                    Err(self.error(format!("expected a property name, found {:?}", other)))
                }
            }
        }
    }
}

// -- free helper functions ------------------------------------------------

fn prefix(op: Op, operand: Ops) -> Ops {
    let mut ops = vec![op];
    ops.extend(operand);
    ops
}

fn binary(op: Op, a: Ops, b: Ops) -> Ops {
    let mut ops = vec![op];
    ops.extend(a);
    ops.extend(b);
    ops
}

fn concat_call(head: Op, callee: Ops, args: Vec<Ops>) -> Ops {
    let mut ops = vec![head];
    ops.extend(callee);
    for arg in args {
        ops.extend(arg);
    }
    ops
}

/// `delete`'s operand, if it names a member/property place, compiles to the
/// dedicated `DeleteMember`/`DeleteProperty` op (which also removes the
/// binding); anything else — `delete x` on a bare identifier, `delete 1` —
/// falls back to the general `Op::Delete`, which the interpreter always
/// answers `true` for without side effects (non-strict ES3 `delete` on a
/// non-configurable/non-reference target).
fn build_delete(operand: Ops) -> Ops {
    match operand.first() {
        Some(Op::GetMember(key)) => {
            let key = *key;
            let mut ops = vec![Op::DeleteMember(key)];
            ops.extend(operand.into_iter().skip(1));
            ops
        }
        Some(Op::GetProperty) => {
            let mut ops = vec![Op::DeleteProperty];
            ops.extend(operand.into_iter().skip(1));
            ops
        }
        _ => prefix(Op::Delete, operand),
    }
}

fn build_iterate(cond: Ops, body: Ops, label: Option<Box<str>>) -> Ops {
    let condition_offset = (2 + body.len()) as i32;
    let end_offset = condition_offset + cond.len() as i32;
    let mut ops = vec![Op::Iterate { condition_offset, end_offset, label }];
    ops.extend(body);
    ops.push(Op::End);
    ops.extend(cond);
    ops
}

fn build_iterate_do_while(cond: Ops, body: Ops, label: Option<Box<str>>) -> Ops {
    let condition_offset = (2 + body.len()) as i32;
    let end_offset = condition_offset + cond.len() as i32;
    let mut ops = vec![Op::IterateDoWhile { condition_offset, end_offset, label }];
    ops.extend(body);
    ops.push(Op::End);
    ops.extend(cond);
    ops
}

fn build_iterate_for(cond: Ops, step: Option<Ops>, body: Ops, label: Option<Box<str>>) -> Ops {
    let step = step.unwrap_or_default();
    let condition_offset = (2 + body.len()) as i32;
    let step_offset = condition_offset + cond.len() as i32;
    let end_offset = step_offset + step.len() as i32;
    let mut ops = vec![Op::IterateFor { condition_offset, step_offset, end_offset, label }];
    ops.extend(body);
    ops.push(Op::End);
    ops.extend(cond);
    ops.extend(step);
    ops
}

/// Layout: `[IterateRange][step][index_place][bound_place][body][End]`. The
/// op's own slot counts toward `end_offset` alongside the step/body
/// fragments, since `end_offset` is measured from `IterateRange`'s own
/// position, not from after it.
fn build_iterate_range(cmp: CompareOp, step_value: Ops, index_place: Op, bound_place: Op, body: Ops, label: Option<Box<str>>) -> Ops {
    let end_offset = 4 + step_value.len() as i32 + body.len() as i32;
    let mut ops = vec![Op::IterateRange { cmp, end_offset, label }];
    ops.extend(step_value);
    ops.push(index_place);
    ops.push(bound_place);
    ops.extend(body);
    ops.push(Op::End);
    ops
}

/// Layout: `[IterateIn][place][object][body][End]`; `end_offset` likewise
/// counts the op's own slot.
fn build_iterate_in(place: Op, object: Ops, body: Ops, label: Option<Box<str>>) -> Ops {
    let end_offset = 3 + object.len() as i32 + body.len() as i32;
    let mut ops = vec![Op::IterateIn { end_offset, label }];
    ops.push(place);
    ops.extend(object);
    ops.extend(body);
    ops.push(Op::End);
    ops
}

/// Hoists every `var` (as `undefined`, unless already bound — see
/// `Context::declare_local`) and every function declaration (in source
/// order, so a later one wins) at the front of a function/program body,
/// exactly the way `original_source/src/parser.c` walks a finished body once
/// to collect its hoisted names before emitting them ahead of the body.
fn build_hoist_prologue(scope: &FunctionScope) -> Ops {
    let mut ops = Vec::with_capacity(scope.hoisted_vars.len() + scope.hoisted_fns.len());
    for &key in &scope.hoisted_vars {
        ops.push(Op::DeclareLocal(key));
    }
    for (key, template) in &scope.hoisted_fns {
        ops.push(Op::Expression);
        ops.push(Op::SetLocal(*key));
        ops.push(Op::Function(template.clone()));
    }
    ops
}

/// Whether a `/` immediately following a just-lexed token should be read as
/// the start of a regex literal rather than the division operator: true
/// unless the previous token could itself end an expression (spec §4.1).
fn regex_allowed_after(kind: &TokenKind) -> bool {
    !matches!(
        kind,
        TokenKind::Identifier(_)
            | TokenKind::IntegerLiteral(_)
            | TokenKind::NumberLiteral(_)
            | TokenKind::StringLiteral(_)
            | TokenKind::RegexLiteral(_)
            | TokenKind::RightParen
            | TokenKind::RightBracket
            | TokenKind::RightBrace
            | TokenKind::This
            | TokenKind::Null
            | TokenKind::True
            | TokenKind::False
            | TokenKind::PlusPlus
            | TokenKind::MinusMinus
    )
}

fn keyword_spelling(kind: &TokenKind) -> Option<&'static str> {
    Some(match kind {
        TokenKind::Break => "break",
        TokenKind::Case => "case",
        TokenKind::Catch => "catch",
        TokenKind::Continue => "continue",
        TokenKind::Debugger => "debugger",
        TokenKind::Default => "default",
        TokenKind::Delete => "delete",
        TokenKind::Do => "do",
        TokenKind::Else => "else",
        TokenKind::Finally => "finally",
        TokenKind::For => "for",
        TokenKind::Function => "function",
        TokenKind::If => "if",
        TokenKind::In => "in",
        TokenKind::InstanceOf => "instanceof",
        TokenKind::New => "new",
        TokenKind::Return => "return",
        TokenKind::Switch => "switch",
        TokenKind::This => "this",
        TokenKind::Throw => "throw",
        TokenKind::Try => "try",
        TokenKind::TypeOf => "typeof",
        TokenKind::Var => "var",
        TokenKind::Void => "void",
        TokenKind::While => "while",
        TokenKind::With => "with",
        TokenKind::Null => "null",
        TokenKind::True => "true",
        TokenKind::False => "false",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::Input;

    fn parse(src: &str) -> Rc<Vec<Op>> {
        let input = Input::new("t.js", src);
        let mut keys = KeyPool::new();
        parse_program(&input, &mut keys, false).expect("parse should succeed")
    }

    #[test]
    fn if_else_offsets_land_on_end() {
        let ops = parse("if (a) 1; else 2;");
        assert!(matches!(ops[0], Op::JumpIfNot(_)));
        assert!(matches!(ops.last(), Some(Op::End)));
    }

    #[test]
    fn for_loop_with_literal_bound_becomes_iterate_range() {
        let ops = parse("for (var i = 0; i < 10; i++) x;");
        assert!(ops.iter().any(|op| matches!(op, Op::IterateRange { .. })));
    }

    #[test]
    fn for_loop_with_non_matching_step_falls_back_to_iterate_for() {
        let ops = parse("for (var i = 0; i < 10; i += 2) x;");
        assert!(ops.iter().any(|op| matches!(op, Op::IterateFor { .. })));
        assert!(!ops.iter().any(|op| matches!(op, Op::IterateRange { .. })));
    }

    #[test]
    fn switch_with_default_orders_default_body_first() {
        let ops = parse("switch (x) { case 1: a(); break; default: d(); break; case 2: b(); break; }");
        assert!(matches!(ops[0], Op::Switch { arm_count: 3, .. }));
    }

    #[test]
    fn switch_without_default_skips_bodies_on_no_match() {
        let ops = parse("switch (x) { case 1: a(); break; }");
        // bodies region must open with a Jump since there's no default arm
        let has_jump_before_body = ops.iter().any(|op| matches!(op, Op::Jump(_)));
        assert!(has_jump_before_body);
    }

    #[test]
    fn use_strict_prologue_toggles_strict_mode() {
        let input = Input::new("t.js", "'use strict'; var x = 1;");
        let mut keys = KeyPool::new();
        let mut parser = Parser::new(&input, &mut keys, false);
        let _ = parser.parse_function_body_statements().expect("parse should succeed");
        assert!(parser.strict);
    }

    #[test]
    fn arguments_reference_sets_need_arguments() {
        let ops = parse("function f() { return arguments.length; }");
        let found = ops.iter().any(|op| match op {
            Op::Function(template) => template.need_arguments,
            _ => false,
        });
        assert!(found);
    }

    #[test]
    fn delete_on_member_compiles_to_delete_member() {
        let ops = parse("delete obj.prop;");
        assert!(ops.iter().any(|op| matches!(op, Op::DeleteMember(_))));
    }

    #[test]
    fn regex_literal_becomes_regexp_construct() {
        let ops = parse("var r = /ab+c/gi;");
        assert!(ops.iter().any(|op| matches!(op, Op::Construct(2))));
    }

    #[test]
    fn labeled_loop_break_is_valid() {
        let ops = parse("outer: for (;;) { break outer; }");
        assert!(ops.iter().any(|op| matches!(op, Op::IterateFor { label: Some(l), .. } if &**l == "outer")));
    }

    #[test]
    fn break_outside_loop_is_a_parse_error() {
        let input = Input::new("t.js", "break;");
        let mut keys = KeyPool::new();
        assert!(parse_program(&input, &mut keys, false).is_err());
    }

    #[test]
    fn try_catch_finally_always_has_a_finally_region() {
        let ops = parse("try { a(); } catch (e) { b(); }");
        assert!(matches!(ops[0], Op::Try { catch_offset, .. } if catch_offset > 0));
    }

    #[test]
    fn for_in_over_bare_identifier_builds_iterate_in() {
        let ops = parse("for (k in obj) use(k);");
        assert!(ops.iter().any(|op| matches!(op, Op::IterateIn { .. })));
    }

    #[test]
    fn comma_expression_compiles_to_comma_op() {
        let ops = parse("x = (a, b);");
        assert!(ops.iter().any(|op| matches!(op, Op::Comma)));
    }
}
