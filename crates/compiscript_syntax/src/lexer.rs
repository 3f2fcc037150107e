//! Hand-written lexer for Compiscript source text.
//!
//! Byte-walking scanner with line/column bookkeeping: lines are 1-based,
//! columns 0-based, and every token records the position of its first
//! character. `//` line comments and `/* ... */` block comments are
//! skipped; string literals support the usual escapes.
//!
//! Lexing never aborts: unknown characters and unterminated literals are
//! reported as diagnostics and scanning continues, so the parser always
//! receives a token stream ending in [`TokenKind::Eof`].

use compiscript_base::{Diagnostic, Interner, Loc};

use crate::token::{Token, TokenKind};

/// Streaming scanner over a source string.
pub struct Lexer<'src> {
    source: &'src str,
    bytes: &'src [u8],
    pos: usize,
    line: u32,
    column: u32,
    diagnostics: Vec<Diagnostic>,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            line: 1,
            column: 0,
            diagnostics: Vec::new(),
        }
    }

    /// Scans the whole input, returning the token stream (terminated by
    /// `Eof`) and any lexical diagnostics.
    pub fn tokenize(mut self, interner: &mut Interner) -> (Vec<Token>, Vec<Diagnostic>) {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token(interner);
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        (tokens, self.diagnostics)
    }

    fn loc(&self) -> Loc {
        Loc::new(self.line, self.column)
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.pos + ahead).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        if byte == b'\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        Some(byte)
    }

    fn error(&mut self, message: impl Into<String>, loc: Loc) {
        self.diagnostics.push(Diagnostic::new(message, loc));
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(b' ') | Some(b'\t') | Some(b'\r') | Some(b'\n') => {
                    self.bump();
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    while let Some(byte) = self.peek() {
                        if byte == b'\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some(b'/') if self.peek_at(1) == Some(b'*') => {
                    let start = self.loc();
                    self.bump();
                    self.bump();
                    let mut closed = false;
                    while let Some(byte) = self.bump() {
                        if byte == b'*' && self.peek() == Some(b'/') {
                            self.bump();
                            closed = true;
                            break;
                        }
                    }
                    if !closed {
                        self.error("Unterminated block comment", start);
                    }
                }
                _ => break,
            }
        }
    }

    fn next_token(&mut self, interner: &mut Interner) -> Token {
        self.skip_trivia();
        let loc = self.loc();
        let byte = match self.peek() {
            Some(b) => b,
            None => return Token::new(TokenKind::Eof, loc),
        };

        if byte.is_ascii_digit() {
            return self.lex_number(loc);
        }
        if byte == b'_' || byte.is_ascii_alphabetic() {
            return self.lex_word(loc, interner);
        }
        if byte == b'"' {
            return self.lex_string(loc, interner);
        }

        self.bump();
        let kind = match byte {
            b'+' => TokenKind::Plus,
            b'-' => TokenKind::Minus,
            b'*' => TokenKind::Star,
            b'/' => TokenKind::Slash,
            b'%' => TokenKind::Percent,
            b'=' => {
                if self.peek() == Some(b'=') {
                    self.bump();
                    TokenKind::EqEq
                } else {
                    TokenKind::Assign
                }
            }
            b'!' => {
                if self.peek() == Some(b'=') {
                    self.bump();
                    TokenKind::NotEq
                } else {
                    TokenKind::Bang
                }
            }
            b'<' => {
                if self.peek() == Some(b'=') {
                    self.bump();
                    TokenKind::LtEq
                } else {
                    TokenKind::Lt
                }
            }
            b'>' => {
                if self.peek() == Some(b'=') {
                    self.bump();
                    TokenKind::GtEq
                } else {
                    TokenKind::Gt
                }
            }
            b'&' => {
                if self.peek() == Some(b'&') {
                    self.bump();
                    TokenKind::AndAnd
                } else {
                    self.error("Unexpected character '&' (did you mean '&&'?)", loc);
                    return self.next_token(interner);
                }
            }
            b'|' => {
                if self.peek() == Some(b'|') {
                    self.bump();
                    TokenKind::OrOr
                } else {
                    self.error("Unexpected character '|' (did you mean '||'?)", loc);
                    return self.next_token(interner);
                }
            }
            b'?' => TokenKind::Question,
            b':' => TokenKind::Colon,
            b';' => TokenKind::Semicolon,
            b',' => TokenKind::Comma,
            b'.' => TokenKind::Dot,
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'{' => TokenKind::LBrace,
            b'}' => TokenKind::RBrace,
            b'[' => TokenKind::LBracket,
            b']' => TokenKind::RBracket,
            other => {
                self.error(format!("Unexpected character '{}'", other as char), loc);
                return self.next_token(interner);
            }
        };
        Token::new(kind, loc)
    }

    fn lex_number(&mut self, loc: Loc) -> Token {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
            self.bump();
        }
        let text = &self.source[start..self.pos];
        match text.parse::<i64>() {
            Ok(value) => Token::new(TokenKind::IntLiteral(value), loc),
            Err(_) => {
                self.error(format!("Integer literal '{}' is out of range", text), loc);
                Token::new(TokenKind::IntLiteral(0), loc)
            }
        }
    }

    fn lex_word(&mut self, loc: Loc, interner: &mut Interner) -> Token {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if b == b'_' || b.is_ascii_alphanumeric()) {
            self.bump();
        }
        let text = &self.source[start..self.pos];
        let kind = match TokenKind::keyword(text) {
            Some(kw) => kw,
            None => TokenKind::Identifier(interner.intern(text)),
        };
        Token::new(kind, loc)
    }

    fn lex_string(&mut self, loc: Loc, interner: &mut Interner) -> Token {
        self.bump(); // opening quote
        let mut value = String::new();
        loop {
            match self.bump() {
                None => {
                    self.error("Unterminated string literal", loc);
                    break;
                }
                Some(b'\n') => {
                    self.error("Unterminated string literal", loc);
                    break;
                }
                Some(b'"') => break,
                Some(b'\\') => match self.bump() {
                    Some(b'n') => value.push('\n'),
                    Some(b't') => value.push('\t'),
                    Some(b'\\') => value.push('\\'),
                    Some(b'"') => value.push('"'),
                    Some(other) => {
                        self.error(format!("Unknown escape sequence '\\{}'", other as char), loc);
                        value.push(other as char);
                    }
                    None => {
                        self.error("Unterminated string literal", loc);
                        break;
                    }
                },
                Some(byte) => value.push(byte as char),
            }
        }
        Token::new(TokenKind::StringLiteral(interner.intern(&value)), loc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compiscript_base::Interner;

    fn lex(source: &str) -> (Vec<Token>, Vec<Diagnostic>, Interner) {
        let mut interner = Interner::new();
        let (tokens, diags) = Lexer::new(source).tokenize(&mut interner);
        (tokens, diags, interner)
    }

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).0.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_keywords_and_identifiers() {
        let (tokens, diags, interner) = lex("let suma: integer;");
        assert!(diags.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::Let);
        match tokens[1].kind {
            TokenKind::Identifier(sym) => assert_eq!(interner.resolve(sym), "suma"),
            other => panic!("expected identifier, got {:?}", other),
        }
        assert_eq!(tokens[2].kind, TokenKind::Colon);
        assert_eq!(tokens[3].kind, TokenKind::IntegerType);
        assert_eq!(tokens[4].kind, TokenKind::Semicolon);
        assert_eq!(tokens[5].kind, TokenKind::Eof);
    }

    #[test]
    fn lexes_two_char_operators() {
        assert_eq!(
            kinds("== != <= >= && ||"),
            vec![
                TokenKind::EqEq,
                TokenKind::NotEq,
                TokenKind::LtEq,
                TokenKind::GtEq,
                TokenKind::AndAnd,
                TokenKind::OrOr,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn single_char_lookalikes_do_not_merge() {
        assert_eq!(
            kinds("= ! < >"),
            vec![
                TokenKind::Assign,
                TokenKind::Bang,
                TokenKind::Lt,
                TokenKind::Gt,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn tracks_line_and_column() {
        let (tokens, _, _) = lex("let a;\n  a = 1;");
        assert_eq!(tokens[0].loc, Loc::new(1, 0)); // let
        assert_eq!(tokens[1].loc, Loc::new(1, 4)); // a
        assert_eq!(tokens[3].loc, Loc::new(2, 2)); // a on line 2
    }

    #[test]
    fn skips_line_and_block_comments() {
        let (tokens, diags, _) = lex("// encabezado\nlet /* medio */ a;");
        assert!(diags.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::Let);
        assert!(matches!(tokens[1].kind, TokenKind::Identifier(_)));
    }

    #[test]
    fn string_escapes_are_decoded() {
        let (tokens, diags, interner) = lex(r#""hola\n\"mundo\"""#);
        assert!(diags.is_empty());
        match tokens[0].kind {
            TokenKind::StringLiteral(sym) => {
                assert_eq!(interner.resolve(sym), "hola\n\"mundo\"");
            }
            other => panic!("expected string, got {:?}", other),
        }
    }

    #[test]
    fn unterminated_string_is_reported() {
        let (_, diags, _) = lex("\"sin cierre");
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("Unterminated string"));
    }

    #[test]
    fn unknown_character_is_reported_and_skipped() {
        let (tokens, diags, _) = lex("let @ a;");
        assert_eq!(diags.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Let);
        assert!(matches!(tokens[1].kind, TokenKind::Identifier(_)));
    }

    #[test]
    fn empty_input_yields_only_eof() {
        let (tokens, diags, _) = lex("");
        assert!(diags.is_empty());
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Eof);
    }
}
