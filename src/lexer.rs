//! Byte-stream tokenizer, spec §4.1.
//!
//! Grounded on `original_source/src/lexer.c`: whitespace/comment skipping,
//! maximal-munch punctuator disambiguation, numeric/string/regex literal
//! scanning. Operates directly on the `Input`'s UTF-8 bytes (identifiers and
//! punctuators are ASCII; string-literal bodies may contain arbitrary UTF-8,
//! which is preserved byte-for-byte when unescaped).

use crate::estr::EStr;
use crate::text::Input;
use crate::token::{Token, TokenKind};

/// Lexer flags controlling how the next token is read (spec §4.1).
#[derive(Clone, Copy, Debug, Default)]
pub struct LexFlags {
    /// A `/` should be read as the start of a regex literal rather than the
    /// division operator (set after tokens that cannot end an expression:
    /// `(`, `,`, operators, keywords, start-of-statement, ...).
    pub allow_regex: bool,
    /// Suppress keyword recognition (used when re-lexing an identifier
    /// position, e.g. object-literal property names).
    pub disallow_keyword: bool,
}

pub struct Lexer<'a> {
    input: &'a Input,
    bytes: &'a [u8],
    offset: u32,
    strict: bool,
}

impl<'a> Lexer<'a> {
    #[must_use]
    pub fn new(input: &'a Input, strict: bool) -> Self {
        Lexer { input, bytes: input.bytes(), offset: 0, strict }
    }

    #[must_use]
    pub fn at(input: &'a Input, offset: u32, strict: bool) -> Self {
        Lexer { input, bytes: input.bytes(), offset, strict }
    }

    #[must_use]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.offset as usize).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.offset as usize + ahead).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.offset += 1;
        Some(b)
    }

    fn error(&mut self, message: impl Into<String>, start: u32, did_line_break: bool) -> Token {
        let text = self.input.text_slice(start, self.offset - start);
        Token { kind: TokenKind::Error(message.into()), text, did_line_break }
    }

    /// Skip whitespace and comments; returns whether a line terminator was
    /// seen along the way.
    fn skip_trivia(&mut self) -> Result<bool, Token> {
        let mut saw_newline = false;
        loop {
            match self.peek() {
                Some(b' ') | Some(b'\t') | Some(b'\r') => {
                    self.offset += 1;
                }
                Some(b'\n') => {
                    saw_newline = true;
                    self.offset += 1;
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    self.offset += 2;
                    while let Some(b) = self.peek() {
                        if b == b'\n' {
                            break;
                        }
                        self.offset += 1;
                    }
                }
                Some(b'/') if self.peek_at(1) == Some(b'*') => {
                    let start = self.offset;
                    self.offset += 2;
                    let mut closed = false;
                    while let Some(b) = self.peek() {
                        if b == b'\n' {
                            saw_newline = true;
                        }
                        if b == b'*' && self.peek_at(1) == Some(b'/') {
                            self.offset += 2;
                            closed = true;
                            break;
                        }
                        self.offset += 1;
                    }
                    if !closed {
                        return Err(self.error("unterminated comment", start, saw_newline));
                    }
                }
                _ => break,
            }
        }
        Ok(saw_newline)
    }

    pub fn next_token(&mut self, flags: LexFlags) -> Token {
        let did_line_break = match self.skip_trivia() {
            Ok(b) => b,
            Err(tok) => return tok,
        };
        let start = self.offset;
        let Some(b) = self.peek() else {
            return Token { kind: TokenKind::Eof, text: self.input.text_slice(start, 0), did_line_break };
        };

        let kind = match b {
            b'0'..=b'9' => self.scan_number(),
            b'.' if self.peek_at(1).map_or(false, |c| c.is_ascii_digit()) => self.scan_number(),
            b'\'' | b'"' => self.scan_string(b),
            b'/' if flags.allow_regex => return self.scan_regex(start, did_line_break),
            c if is_ident_start(c) => self.scan_identifier(flags.disallow_keyword),
            _ => self.scan_punctuator(),
        };

        let text = self.input.text_slice(start, self.offset - start);
        Token { kind, text, did_line_break }
    }

    fn scan_identifier(&mut self, disallow_keyword: bool) -> TokenKind {
        let start = self.offset;
        while self.peek().map_or(false, is_ident_continue) {
            self.offset += 1;
        }
        let word = std::str::from_utf8(&self.bytes[start as usize..self.offset as usize]).unwrap_or("");
        if !disallow_keyword {
            if let Some(kw) = TokenKind::keyword(word) {
                return kw;
            }
            if self.strict && TokenKind::is_future_reserved(word) {
                return TokenKind::Error(format!("'{}' is a reserved word", word));
            }
        }
        TokenKind::Identifier(EStr::new(word))
    }

    fn scan_number(&mut self) -> TokenKind {
        let start = self.offset;
        let mut is_float = false;

        if self.peek() == Some(b'0') && matches!(self.peek_at(1), Some(b'x') | Some(b'X')) {
            self.offset += 2;
            let digits_start = self.offset;
            while self.peek().map_or(false, |c| c.is_ascii_hexdigit()) {
                self.offset += 1;
            }
            if self.offset == digits_start {
                return TokenKind::Error("malformed hex literal".into());
            }
            return self.finish_numeric(start, false);
        }

        while self.peek().map_or(false, |c| c.is_ascii_digit()) {
            self.offset += 1;
        }
        if self.peek() == Some(b'.') {
            is_float = true;
            self.offset += 1;
            while self.peek().map_or(false, |c| c.is_ascii_digit()) {
                self.offset += 1;
            }
        }
        if matches!(self.peek(), Some(b'e') | Some(b'E')) {
            let save = self.offset;
            self.offset += 1;
            if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                self.offset += 1;
            }
            if self.peek().map_or(false, |c| c.is_ascii_digit()) {
                is_float = true;
                while self.peek().map_or(false, |c| c.is_ascii_digit()) {
                    self.offset += 1;
                }
            } else {
                self.offset = save;
            }
        }
        self.finish_numeric(start, is_float)
    }

    fn finish_numeric(&mut self, start: u32, forced_float: bool) -> TokenKind {
        if self.peek().map_or(false, is_ident_start) {
            while self.peek().map_or(false, is_ident_continue) {
                self.offset += 1;
            }
            return TokenKind::Error("identifier starts immediately after numeric literal".into());
        }
        let text = std::str::from_utf8(&self.bytes[start as usize..self.offset as usize]).unwrap_or("");
        if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            return match i64::from_str_radix(hex, 16) {
                Ok(v) if v >= i32::MIN as i64 && v <= i32::MAX as i64 => TokenKind::IntegerLiteral(v as i32),
                Ok(v) => TokenKind::NumberLiteral(v as f64),
                Err(_) => TokenKind::Error("malformed hex literal".into()),
            };
        }
        if !forced_float {
            if let Ok(v) = text.parse::<i32>() {
                return TokenKind::IntegerLiteral(v);
            }
        }
        match text.parse::<f64>() {
            Ok(v) => TokenKind::NumberLiteral(v),
            Err(_) => TokenKind::Error("malformed numeric literal".into()),
        }
    }

    fn scan_string(&mut self, quote: u8) -> TokenKind {
        self.offset += 1; // opening quote
        let mut decoded: Option<String> = None;
        let raw_start = self.offset;
        loop {
            let Some(b) = self.peek() else {
                return TokenKind::Error("unterminated string literal".into());
            };
            if b == quote {
                self.offset += 1;
                break;
            }
            if b == b'\n' {
                return TokenKind::Error("newline in string literal".into());
            }
            if b == b'\\' {
                let buf = decoded.get_or_insert_with(|| {
                    std::str::from_utf8(&self.bytes[raw_start as usize..self.offset as usize])
                        .unwrap_or("")
                        .to_string()
                });
                let _ = buf; // ensure initialized before consuming escape
                self.offset += 1;
                match self.scan_escape() {
                    Ok(c) => decoded.as_mut().unwrap().push(c),
                    Err(msg) => return TokenKind::Error(msg),
                }
                continue;
            }
            if let Some(buf) = decoded.as_mut() {
                // Safety: we only ever step by whole UTF-8 scalar boundaries
                // below via `char` decode, but fast-path single-byte ASCII.
                if b < 0x80 {
                    buf.push(b as char);
                    self.offset += 1;
                } else {
                    let rest = std::str::from_utf8(&self.bytes[self.offset as usize..]).unwrap_or("");
                    if let Some(c) = rest.chars().next() {
                        buf.push(c);
                        self.offset += c.len_utf8() as u32;
                    } else {
                        self.offset += 1;
                    }
                }
            } else {
                self.offset += 1;
            }
        }
        match decoded {
            Some(s) => TokenKind::StringLiteral(EStr::new(s)),
            None => {
                let raw = std::str::from_utf8(&self.bytes[raw_start as usize..self.offset as usize - 1]).unwrap_or("");
                TokenKind::StringLiteral(EStr::new(raw))
            }
        }
    }

    fn scan_escape(&mut self) -> Result<char, String> {
        let Some(b) = self.bump() else {
            return Err("unterminated escape sequence".into());
        };
        Ok(match b {
            b'0' => '\0',
            b'b' => '\u{8}',
            b'f' => '\u{C}',
            b'n' => '\n',
            b'r' => '\r',
            b't' => '\t',
            b'v' => '\u{B}',
            b'x' => self.scan_hex_escape(2)?,
            b'u' => self.scan_hex_escape(4)?,
            b'c' => {
                let c = self.bump().ok_or("unterminated \\c escape")?;
                ((c.to_ascii_uppercase() as u8) & 0x1f) as char
            }
            b'\n' => return Err("newline after backslash inside string literal".into()),
            b'0'..=b'7' => {
                let mut value = (b - b'0') as u32;
                for _ in 0..2 {
                    match self.peek() {
                        Some(d @ b'0'..=b'7') if value * 8 + (d - b'0') as u32 <= 0xFF => {
                            value = value * 8 + (d - b'0') as u32;
                            self.offset += 1;
                        }
                        _ => break,
                    }
                }
                char::from_u32(value).unwrap_or('\0')
            }
            other => other as char,
        })
    }

    fn scan_hex_escape(&mut self, digits: usize) -> Result<char, String> {
        let start = self.offset as usize;
        for _ in 0..digits {
            match self.peek() {
                Some(c) if c.is_ascii_hexdigit() => self.offset += 1,
                _ => return Err(format!("expected {} hex digits in escape", digits)),
            }
        }
        let text = std::str::from_utf8(&self.bytes[start..self.offset as usize]).unwrap_or("0");
        let value = u32::from_str_radix(text, 16).unwrap_or(0);
        Ok(char::from_u32(value).unwrap_or('\u{FFFD}'))
    }

    fn scan_regex(&mut self, start: u32, did_line_break: bool) -> Token {
        self.offset += 1; // opening `/`
        let mut in_class = false;
        loop {
            match self.peek() {
                None | Some(b'\n') => {
                    let text = self.input.text_slice(start, self.offset - start);
                    return Token { kind: TokenKind::Error("unterminated regex literal".into()), text, did_line_break };
                }
                Some(b'\\') => {
                    self.offset += 1;
                    if self.peek().is_some() {
                        self.offset += 1;
                    }
                }
                Some(b'[') => {
                    in_class = true;
                    self.offset += 1;
                }
                Some(b']') => {
                    in_class = false;
                    self.offset += 1;
                }
                Some(b'/') if !in_class => {
                    self.offset += 1;
                    break;
                }
                Some(_) => {
                    self.offset += 1;
                }
            }
        }
        while self.peek().map_or(false, |c| c.is_ascii_alphabetic()) {
            self.offset += 1;
        }
        let text = self.input.text_slice(start, self.offset - start);
        Token { kind: TokenKind::RegexLiteral(EStr::new(text.as_str())), text, did_line_break }
    }

    fn scan_punctuator(&mut self) -> TokenKind {
        use TokenKind::*;
        macro_rules! eat {
            ($n:expr) => {
                self.offset += $n
            };
        }
        let c0 = self.bump().unwrap();
        let c1 = self.peek();
        let c2 = self.peek_at(1);
        match (c0, c1, c2) {
            (b'{', _, _) => LeftBrace,
            (b'}', _, _) => RightBrace,
            (b'(', _, _) => LeftParen,
            (b')', _, _) => RightParen,
            (b'[', _, _) => LeftBracket,
            (b']', _, _) => RightBracket,
            (b';', _, _) => Semicolon,
            (b',', _, _) => Comma,
            (b'.', _, _) => Dot,
            (b':', _, _) => Colon,
            (b'?', _, _) => Question,
            (b'~', _, _) => Tilde,

            (b'<', Some(b'<'), Some(b'=')) => { eat!(2); ShlAssign }
            (b'<', Some(b'<'), _) => { eat!(1); Shl }
            (b'<', Some(b'='), _) => { eat!(1); LtEq }
            (b'<', _, _) => Lt,

            (b'>', Some(b'>'), Some(b'>')) if self.peek_at(2) == Some(b'=') => { eat!(3); UShrAssign }
            (b'>', Some(b'>'), Some(b'>')) => { eat!(2); UShr }
            (b'>', Some(b'>'), Some(b'=')) => { eat!(2); ShrAssign }
            (b'>', Some(b'>'), _) => { eat!(1); Shr }
            (b'>', Some(b'='), _) => { eat!(1); GtEq }
            (b'>', _, _) => Gt,

            (b'=', Some(b'='), Some(b'=')) => { eat!(2); StrictEq }
            (b'=', Some(b'='), _) => { eat!(1); Eq }
            (b'=', _, _) => Assign,

            (b'!', Some(b'='), Some(b'=')) => { eat!(2); StrictNotEq }
            (b'!', Some(b'='), _) => { eat!(1); NotEq }
            (b'!', _, _) => Bang,

            (b'+', Some(b'+'), _) => { eat!(1); PlusPlus }
            (b'+', Some(b'='), _) => { eat!(1); PlusAssign }
            (b'+', _, _) => Plus,

            (b'-', Some(b'-'), _) => { eat!(1); MinusMinus }
            (b'-', Some(b'='), _) => { eat!(1); MinusAssign }
            (b'-', _, _) => Minus,

            (b'*', Some(b'='), _) => { eat!(1); MulAssign }
            (b'*', _, _) => Star,

            (b'/', Some(b'='), _) => { eat!(1); DivAssign }
            (b'/', _, _) => Slash,

            (b'%', Some(b'='), _) => { eat!(1); ModAssign }
            (b'%', _, _) => Percent,

            (b'&', Some(b'&'), _) => { eat!(1); AndAnd }
            (b'&', Some(b'='), _) => { eat!(1); AndAssign }
            (b'&', _, _) => Amp,

            (b'|', Some(b'|'), _) => { eat!(1); OrOr }
            (b'|', Some(b'='), _) => { eat!(1); OrAssign }
            (b'|', _, _) => Pipe,

            (b'^', Some(b'='), _) => { eat!(1); XorAssign }
            (b'^', _, _) => Caret,

            (other, _, _) => Error(format!("unexpected character '{}'", other as char)),
        }
    }
}

#[must_use]
fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$'
}

#[must_use]
fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::Input;

    fn tokens(src: &str) -> Vec<TokenKind> {
        let input = Input::new("t.js", src);
        let mut lexer = Lexer::new(&input, false);
        let mut out = Vec::new();
        loop {
            let tok = lexer.next_token(LexFlags { allow_regex: true, disallow_keyword: false });
            if tok.kind == TokenKind::Eof {
                break;
            }
            out.push(tok.kind);
        }
        out
    }

    #[test]
    fn integer_vs_binary() {
        let toks = tokens("1 1.5 1e3 0x1F");
        assert_eq!(toks[0], TokenKind::IntegerLiteral(1));
        assert_eq!(toks[1], TokenKind::NumberLiteral(1.5));
        assert_eq!(toks[2], TokenKind::NumberLiteral(1000.0));
        assert_eq!(toks[3], TokenKind::IntegerLiteral(31));
    }

    #[test]
    fn maximal_munch_shifts() {
        let toks = tokens("a >>>= b >> c >>> d");
        assert!(toks.contains(&TokenKind::UShrAssign));
        assert!(toks.contains(&TokenKind::Shr));
        assert!(toks.contains(&TokenKind::UShr));
    }

    #[test]
    fn string_escape_decoding() {
        let toks = tokens(r#"'a\nb\x41B'"#);
        match &toks[0] {
            TokenKind::StringLiteral(s) => assert_eq!(s.as_str(), "a\nbAB"),
            other => panic!("expected string literal, got {:?}", other),
        }
    }

    #[test]
    fn unescaped_string_keeps_raw_bytes() {
        let toks = tokens("'hello world'");
        match &toks[0] {
            TokenKind::StringLiteral(s) => assert_eq!(s.as_str(), "hello world"),
            other => panic!("expected string literal, got {:?}", other),
        }
    }

    #[test]
    fn regex_literal_is_sliced_whole() {
        let input = Input::new("t.js", "/a(b+)c/gi");
        let mut lexer = Lexer::new(&input, false);
        let tok = lexer.next_token(LexFlags { allow_regex: true, disallow_keyword: false });
        match tok.kind {
            TokenKind::RegexLiteral(s) => assert_eq!(s.as_str(), "/a(b+)c/gi"),
            other => panic!("expected regex literal, got {:?}", other),
        }
    }

    #[test]
    fn number_immediately_followed_by_identifier_is_an_error() {
        let toks = tokens("1abc");
        assert!(matches!(toks[0], TokenKind::Error(_)));
    }
}
