//! Lexer implementation: byte stream -> token stream.

use crate::{lookup_keyword, Token, TokenType, TokenUtils};
use unicode_xid::UnicodeXID;
use volta_common::{Diagnostics, Position, Span, VoltaError, VoltaResult};

pub struct Lexer<'a> {
    input: &'a str,
    input_bytes: &'a [u8],
    position: usize,
    current_pos: Position,
    file_id: u32,
    diagnostics: Diagnostics,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str, file_id: u32) -> Self {
        Self {
            input,
            input_bytes: input.as_bytes(),
            position: 0,
            current_pos: Position::start(),
            file_id,
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Tokenize the entire input, always ending with `EndOfFile`.
    pub fn tokenize(&mut self) -> VoltaResult<Vec<Token>> {
        let mut tokens = Vec::new();

        while !self.is_at_end() {
            if let Some(token) = self.next_token()? {
                tokens.push(token);
            }
        }

        let eof_span = Span::single(self.current_pos, self.file_id);
        tokens.push(TokenUtils::new(TokenType::EndOfFile, eof_span));

        Ok(tokens)
    }

    fn next_token(&mut self) -> VoltaResult<Option<Token>> {
        self.skip_whitespace_and_comments();

        if self.is_at_end() {
            return Ok(None);
        }

        let start_pos = self.current_pos;

        let token_type = match self.current_char() {
            '(' => { self.advance(); Some(TokenType::LParen) }
            ')' => { self.advance(); Some(TokenType::RParen) }
            '{' => { self.advance(); Some(TokenType::LBrace) }
            '}' => { self.advance(); Some(TokenType::RBrace) }
            '[' => { self.advance(); Some(TokenType::LBracket) }
            ']' => { self.advance(); Some(TokenType::RBracket) }
            ';' => { self.advance(); Some(TokenType::Semicolon) }
            ',' => { self.advance(); Some(TokenType::Comma) }

            '+' => Some(self.scan_plus()),
            '-' => Some(self.scan_minus()),
            '*' => Some(self.scan_star()),
            '/' => Some(self.scan_slash()),
            '%' => Some(self.scan_percent()),
            '=' => Some(self.scan_equal()),
            '<' => Some(self.scan_less()),
            '>' => Some(self.scan_greater()),
            ':' => Some(self.scan_colon()),
            '.' => Some(self.scan_dot()),

            '!' => self.scan_bang(start_pos),

            '"' => Some(self.scan_string()),
            'r' if self.peek_char() == Some('"') => Some(self.scan_raw_string()),

            c if c.is_ascii_digit() => Some(self.scan_number()?),
            c if c.is_xid_start() || c == '_' => Some(self.scan_identifier_or_keyword()),

            c => {
                self.advance();
                self.diagnostics.error_at(
                    format!("unexpected character '{}'", c),
                    Span::single(start_pos, self.file_id),
                );
                None
            }
        };

        let end_pos = self.current_pos;
        let span = Span::new(start_pos, end_pos, self.file_id);

        Ok(token_type.map(|t| TokenUtils::new(t, span)))
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.current_char() {
                ' ' | '\t' | '\r' => { self.advance(); }
                '\n' => { self.advance_line(); }
                '/' if self.peek_char() == Some('/') => self.skip_line_comment(),
                '/' if self.peek_char() == Some('*') => self.skip_block_comment(),
                _ => break,
            }
            if self.is_at_end() {
                break;
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while !self.is_at_end() && self.current_char() != '\n' {
            self.advance();
        }
    }

    /// Block comments do not nest: the first `*/` closes the comment
    /// regardless of any `/*` seen since the opening delimiter.
    fn skip_block_comment(&mut self) {
        let start_pos = self.current_pos;
        self.advance();
        self.advance();

        loop {
            if self.is_at_end() {
                self.diagnostics.error_at(
                    "unterminated block comment",
                    Span::single(start_pos, self.file_id),
                );
                return;
            }
            if self.current_char() == '*' && self.peek_char() == Some('/') {
                self.advance();
                self.advance();
                return;
            }
            if self.current_char() == '\n' {
                self.advance_line();
            } else {
                self.advance();
            }
        }
    }

    fn scan_bang(&mut self, start_pos: Position) -> Option<TokenType> {
        self.advance();
        if self.current_char() == '=' {
            self.advance();
            Some(TokenType::NotEq)
        } else {
            self.diagnostics.error_at(
                "unexpected character '!' (did you mean 'not'?)",
                Span::single(start_pos, self.file_id),
            );
            None
        }
    }

    fn scan_identifier_or_keyword(&mut self) -> TokenType {
        let start = self.position;

        while !self.is_at_end() && self.current_char().is_xid_continue() {
            self.advance();
        }

        let identifier = &self.input[start..self.position];
        lookup_keyword(identifier).unwrap_or_else(|| TokenType::Identifier(identifier.to_string()))
    }

    /// `"..."`: `\`-escapes are kept verbatim in the lexeme; only `\"`
    /// is special, to avoid prematurely closing the string.
    fn scan_string(&mut self) -> TokenType {
        let start_pos = self.current_pos;
        self.advance();
        let start = self.position;

        loop {
            if self.is_at_end() {
                self.diagnostics.error_at(
                    "unterminated string literal",
                    Span::single(start_pos, self.file_id),
                );
                return TokenType::Str(self.input[start..self.position].to_string());
            }
            match self.current_char() {
                '"' => break,
                '\\' => {
                    self.advance();
                    if self.is_at_end() {
                        self.diagnostics.error_at(
                            "unterminated string literal",
                            Span::single(start_pos, self.file_id),
                        );
                        return TokenType::Str(self.input[start..self.position].to_string());
                    }
                    self.advance();
                }
                '\n' => self.advance_line(),
                _ => self.advance(),
            }
        }

        let text = self.input[start..self.position].to_string();
        self.advance();
        TokenType::Str(text)
    }

    /// `r"..."`: no escape processing at all.
    fn scan_raw_string(&mut self) -> TokenType {
        let start_pos = self.current_pos;
        self.advance(); // 'r'
        self.advance(); // opening quote
        let start = self.position;

        loop {
            if self.is_at_end() {
                self.diagnostics.error_at(
                    "unterminated raw string literal",
                    Span::single(start_pos, self.file_id),
                );
                return TokenType::RawStr(self.input[start..self.position].to_string());
            }
            match self.current_char() {
                '"' => break,
                '\n' => self.advance_line(),
                _ => self.advance(),
            }
        }

        let text = self.input[start..self.position].to_string();
        self.advance();
        TokenType::RawStr(text)
    }

    /// Digit sequence, optionally `.` digit-sequence. A second `.` is an
    /// error but lexing continues by folding it into the same literal.
    fn scan_number(&mut self) -> VoltaResult<TokenType> {
        let start = self.position;
        self.advance_while_digits();

        let mut is_float = false;
        if self.current_char() == '.' && self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
            is_float = true;
            self.advance();
            self.advance_while_digits();
        }

        while self.current_char() == '.' && self.peek_char().map_or(false, |c| c.is_ascii_digit())
        {
            self.diagnostics.error_at(
                "multiple decimal points in numeric literal",
                Span::single(self.current_pos, self.file_id),
            );
            self.advance();
            self.advance_while_digits();
        }

        let text = &self.input[start..self.position];
        if is_float {
            Ok(TokenType::Float(text.to_string()))
        } else {
            let value = text
                .parse::<i64>()
                .map_err(|_| VoltaError::lex_error(format!("invalid integer literal: {}", text)))?;
            Ok(TokenType::Integer(value))
        }
    }

    fn advance_while_digits(&mut self) {
        while !self.is_at_end() && self.current_char().is_ascii_digit() {
            self.advance();
        }
    }

    fn scan_plus(&mut self) -> TokenType {
        self.advance();
        match self.current_char() {
            '=' => { self.advance(); TokenType::PlusEq }
            '+' => { self.advance(); TokenType::PlusPlus }
            _ => TokenType::Plus,
        }
    }

    fn scan_minus(&mut self) -> TokenType {
        self.advance();
        match self.current_char() {
            '=' => { self.advance(); TokenType::MinusEq }
            '-' => { self.advance(); TokenType::MinusMinus }
            '>' => { self.advance(); TokenType::Arrow }
            _ => TokenType::Minus,
        }
    }

    fn scan_star(&mut self) -> TokenType {
        self.advance();
        if self.current_char() == '=' {
            self.advance();
            TokenType::StarEq
        } else {
            TokenType::Star
        }
    }

    fn scan_slash(&mut self) -> TokenType {
        self.advance();
        if self.current_char() == '=' {
            self.advance();
            TokenType::SlashEq
        } else {
            TokenType::Slash
        }
    }

    fn scan_percent(&mut self) -> TokenType {
        self.advance();
        if self.current_char() == '=' {
            self.advance();
            TokenType::PercentEq
        } else {
            TokenType::Percent
        }
    }

    fn scan_equal(&mut self) -> TokenType {
        self.advance();
        match self.current_char() {
            '=' => { self.advance(); TokenType::EqEq }
            '>' => { self.advance(); TokenType::FatArrow }
            _ => TokenType::Eq,
        }
    }

    fn scan_less(&mut self) -> TokenType {
        self.advance();
        if self.current_char() == '=' {
            self.advance();
            TokenType::LtEq
        } else {
            TokenType::Lt
        }
    }

    fn scan_greater(&mut self) -> TokenType {
        self.advance();
        if self.current_char() == '=' {
            self.advance();
            TokenType::GtEq
        } else {
            TokenType::Gt
        }
    }

    fn scan_colon(&mut self) -> TokenType {
        self.advance();
        match self.current_char() {
            ':' => { self.advance(); TokenType::ColonColon }
            '=' => { self.advance(); TokenType::ColonEq }
            _ => TokenType::Colon,
        }
    }

    fn scan_dot(&mut self) -> TokenType {
        self.advance();
        if self.current_char() == '.' {
            self.advance();
            if self.current_char() == '=' {
                self.advance();
                TokenType::DotDotEq
            } else {
                TokenType::DotDot
            }
        } else {
            TokenType::Dot
        }
    }

    fn current_char(&self) -> char {
        if self.position >= self.input_bytes.len() {
            return '\0';
        }
        let byte = self.input_bytes[self.position];
        if byte < 128 {
            return byte as char;
        }
        self.input[self.position..].chars().next().unwrap_or('\0')
    }

    fn peek_char(&self) -> Option<char> {
        if self.is_at_end() {
            return None;
        }
        let current_len = self.current_char().len_utf8();
        let next_pos = self.position + current_len;
        if next_pos >= self.input_bytes.len() {
            return None;
        }
        let byte = self.input_bytes[next_pos];
        if byte < 128 {
            return Some(byte as char);
        }
        self.input[next_pos..].chars().next()
    }

    fn advance(&mut self) {
        if self.is_at_end() {
            return;
        }
        let len = self.current_char().len_utf8();
        self.position += len;
        self.current_pos.column += 1;
        self.current_pos.offset = self.position as u32;
    }

    fn advance_line(&mut self) {
        if self.is_at_end() {
            return;
        }
        let len = self.current_char().len_utf8();
        self.position += len;
        self.current_pos.line += 1;
        self.current_pos.column = 1;
        self.current_pos.offset = self.position as u32;
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.input_bytes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> Vec<TokenType> {
        let mut lexer = Lexer::new(src, 0);
        lexer.tokenize().unwrap().into_iter().map(|t| t.value).collect()
    }

    #[test]
    fn lexes_minimal_function() {
        let tokens = lex("fn main() -> i32 { return 0; }");
        assert_eq!(tokens[0], TokenType::KwFn);
        assert_eq!(tokens[1], TokenType::Identifier("main".into()));
        assert_eq!(tokens[2], TokenType::LParen);
        assert_eq!(tokens[3], TokenType::RParen);
        assert_eq!(tokens[4], TokenType::Arrow);
        assert!(tokens.contains(&TokenType::KwReturn));
        assert!(tokens.contains(&TokenType::Integer(0)));
        assert_eq!(*tokens.last().unwrap(), TokenType::EndOfFile);
    }

    #[test]
    fn greedy_multi_char_operators() {
        let tokens = lex("x += 1; y ++; a..=b; c:=1; d=>e");
        assert!(tokens.contains(&TokenType::PlusEq));
        assert!(tokens.contains(&TokenType::PlusPlus));
        assert!(tokens.contains(&TokenType::DotDotEq));
        assert!(tokens.contains(&TokenType::ColonEq));
        assert!(tokens.contains(&TokenType::FatArrow));
    }

    #[test]
    fn word_keywords_for_logic() {
        let tokens = lex("a and b or not c");
        assert!(tokens.contains(&TokenType::KwAnd));
        assert!(tokens.contains(&TokenType::KwOr));
        assert!(tokens.contains(&TokenType::KwNot));
    }

    #[test]
    fn block_comments_do_not_nest() {
        // the first `*/` closes the comment; the trailing `*/` becomes `1`
        let tokens = lex("/* outer /* inner */ 1 */ 2");
        assert_eq!(tokens, vec![
            TokenType::Integer(1),
            TokenType::Star,
            TokenType::Slash,
            TokenType::Integer(2),
            TokenType::EndOfFile,
        ]);
    }

    #[test]
    fn string_escapes_kept_verbatim() {
        let tokens = lex(r#""a\nb""#);
        assert_eq!(tokens[0], TokenType::Str("a\\nb".to_string()));
    }

    #[test]
    fn raw_string_has_no_escapes() {
        let tokens = lex(r#"r"a\nb""#);
        assert_eq!(tokens[0], TokenType::RawStr("a\\nb".to_string()));
    }

    #[test]
    fn second_decimal_point_errors_but_continues() {
        let mut lexer = Lexer::new("1.2.3", 0);
        let tokens = lexer.tokenize().unwrap();
        assert!(lexer.diagnostics().has_errors());
        assert_eq!(tokens[0].value, TokenType::Float("1.2.3".to_string()));
    }

    #[test]
    fn unterminated_string_errors() {
        let mut lexer = Lexer::new("\"abc", 0);
        lexer.tokenize().unwrap();
        assert!(lexer.diagnostics().has_errors());
    }
}
