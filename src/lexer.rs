use crate::{
    ast::{Token, TokenKind},
    error::Position,
};

/// Pull-based tokenizer.
///
/// Yields tokens in source order and finishes with exactly one
/// [`TokenKind::Eof`]. A lexical problem is reported as a single
/// [`TokenKind::Error`] token whose text is the message, followed by the EOF
/// token.
pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    col: usize,
    last_kind: Option<TokenKind>,
    parens: usize,
    brackets: usize,
    braces: usize,
    failed: bool,
    finished: bool,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            col: 1,
            last_kind: None,
            parens: 0,
            brackets: 0,
            braces: 0,
            failed: false,
            finished: false,
        }
    }

    /// Position of the next unread character.
    pub fn location(&self) -> Position {
        Position::new(self.line, self.col)
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current_char() {
            self.position += 1;
            if ch == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
    }

    fn starts_with(&self, pattern: &str) -> bool {
        pattern
            .chars()
            .enumerate()
            .all(|(i, c)| self.peek_char(i) == Some(c))
    }

    fn emit(&mut self, kind: TokenKind, start: Position, text: impl Into<String>) -> Token {
        self.last_kind = Some(kind);
        Token::new(kind, start, text)
    }

    fn error(&mut self, start: Position, message: impl Into<String>) -> Token {
        self.failed = true;
        Token::new(TokenKind::Error, start, message)
    }

    fn single(&mut self, kind: TokenKind, start: Position) -> Token {
        let ch = self.current_char().map(String::from).unwrap_or_default();
        self.advance();
        self.emit(kind, start, ch)
    }

    fn double(&mut self, kind: TokenKind, start: Position) -> Token {
        let text: String = self.input[self.position..self.position + 2].iter().collect();
        self.advance();
        self.advance();
        self.emit(kind, start, text)
    }

    /// Skips whitespace and comments. Returns an error message for an
    /// unterminated block comment.
    fn skip_trivia(&mut self) -> Result<(), (Position, &'static str)> {
        loop {
            match self.current_char() {
                Some(' ' | '\t' | '\r' | '\n') => self.advance(),
                Some('/') if self.peek_char(1) == Some('/') => {
                    while let Some(ch) = self.current_char() {
                        self.advance();
                        if ch == '\n' {
                            break;
                        }
                    }
                }
                Some('/') if self.peek_char(1) == Some('*') => {
                    let start = self.location();
                    self.advance();
                    self.advance();
                    loop {
                        if self.starts_with("*/") {
                            self.advance();
                            self.advance();
                            break;
                        }
                        if self.current_char().is_none() {
                            return Err((start, "unclosed comment"));
                        }
                        self.advance();
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn read_identifier(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current_char() {
            if ch.is_alphanumeric() || ch == '_' {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    /// Reads a quoted literal. The opening quote is the current character.
    fn read_quoted(&mut self, quote: char) -> Result<String, &'static str> {
        let mut result = String::new();
        self.advance();

        loop {
            match self.current_char() {
                None | Some('\n') => {
                    return Err(if quote == '"' {
                        "unterminated string constant"
                    } else {
                        "unterminated character constant"
                    });
                }
                Some(c) if c == quote => {
                    self.advance();
                    return Ok(result);
                }
                Some('\\') => {
                    self.advance();
                    match self.current_char() {
                        Some('n') => result.push('\n'),
                        Some('t') => result.push('\t'),
                        Some('r') => result.push('\r'),
                        Some('"') => result.push('"'),
                        Some('\'') => result.push('\''),
                        Some('\\') => result.push('\\'),
                        None | Some('\n') => continue,
                        Some(_) => return Err("invalid escape sequence"),
                    }
                    self.advance();
                }
                Some(ch) => {
                    result.push(ch);
                    self.advance();
                }
            }
        }
    }

    fn accept_run(&mut self, number: &mut String, valid: impl Fn(char) -> bool) -> usize {
        let mut count = 0;
        while let Some(ch) = self.current_char() {
            if !valid(ch) {
                break;
            }
            number.push(ch);
            self.advance();
            count += 1;
        }
        count
    }

    /// Scans a number, including an already-recognised leading sign.
    fn read_number(&mut self, start: Position) -> Token {
        let mut number = String::new();
        if let Some(sign @ ('+' | '-')) = self.current_char() {
            number.push(sign);
            self.advance();
        }

        let hex = self.current_char() == Some('0') && matches!(self.peek_char(1), Some('x' | 'X'));
        if hex {
            self.accept_run(&mut number, |c| c == '0');
            self.accept_run(&mut number, |c| c == 'x' || c == 'X');
            if self.accept_run(&mut number, |c| c.is_ascii_hexdigit()) == 0 {
                return self.error(start, format!("bad number syntax: \"{}\"", number));
            }
        } else {
            self.accept_run(&mut number, |c| c.is_ascii_digit());
            if self.current_char() == Some('.') {
                number.push('.');
                self.advance();
                if self.accept_run(&mut number, |c| c.is_ascii_digit()) == 0 {
                    if let Some(ch) = self.current_char() {
                        number.push(ch);
                        self.advance();
                    }
                    return self.error(start, format!("bad number syntax: \"{}\"", number));
                }
            }
            if matches!(self.current_char(), Some('e' | 'E'))
                && (self.peek_char(1).is_some_and(|c| c.is_ascii_digit())
                    || (matches!(self.peek_char(1), Some('+' | '-'))
                        && self.peek_char(2).is_some_and(|c| c.is_ascii_digit())))
            {
                number.push(self.current_char().unwrap_or('e'));
                self.advance();
                if let Some(sign @ ('+' | '-')) = self.current_char() {
                    number.push(sign);
                    self.advance();
                }
                self.accept_run(&mut number, |c| c.is_ascii_digit());
            }
        }

        // The next thing mustn't be alphanumeric.
        if let Some(ch) = self.current_char()
            && (ch.is_alphanumeric() || ch == '_')
        {
            number.push(ch);
            self.advance();
            return self.error(start, format!("bad number syntax: \"{}\"", number));
        }

        self.emit(TokenKind::Number, start, number)
    }

    fn starts_signed_number(&self) -> bool {
        let digit_follows = self.peek_char(1).is_some_and(|c| c.is_ascii_digit())
            || (self.peek_char(1) == Some('.')
                && self.peek_char(2).is_some_and(|c| c.is_ascii_digit()));
        digit_follows && !self.last_kind.is_some_and(TokenKind::produces_value)
    }

    fn close(&mut self, kind: TokenKind, start: Position) -> Token {
        let ch = self.current_char().unwrap_or(' ');
        let depth = match kind {
            TokenKind::RightParen => &mut self.parens,
            TokenKind::RightBracket => &mut self.brackets,
            _ => &mut self.braces,
        };
        if *depth == 0 {
            self.advance();
            return self.error(start, format!("unexpected closing '{}'", ch));
        }
        *depth -= 1;
        self.single(kind, start)
    }

    fn open(&mut self, kind: TokenKind, start: Position) -> Token {
        match kind {
            TokenKind::LeftParen => self.parens += 1,
            TokenKind::LeftBracket => self.brackets += 1,
            _ => self.braces += 1,
        }
        self.single(kind, start)
    }

    // Unclosed braces are left to the parser, which reports the block.
    fn end_of_input(&mut self, start: Position) -> Token {
        let unclosed = if self.parens > 0 {
            Some('(')
        } else if self.brackets > 0 {
            Some('[')
        } else {
            None
        };
        match unclosed {
            Some(ch) => self.error(start, format!("unclosed '{}'", ch)),
            None => {
                self.finished = true;
                self.emit(TokenKind::Eof, start, "")
            }
        }
    }

    /// Returns the next token, or `None` once the EOF token has been handed
    /// out.
    pub fn next_token(&mut self) -> Option<Token> {
        if self.finished {
            return None;
        }
        if self.failed {
            self.finished = true;
            return Some(Token::eof(self.location()));
        }

        if let Err((pos, message)) = self.skip_trivia() {
            return Some(self.error(pos, message));
        }

        let start = self.location();
        let token = match self.current_char() {
            None => self.end_of_input(start),
            Some(',') => self.single(TokenKind::Comma, start),
            Some(';') => self.single(TokenKind::Semicolon, start),
            Some('*') => self.single(TokenKind::Mul, start),
            Some('/') => self.single(TokenKind::Div, start),
            Some('%') => self.single(TokenKind::Mod, start),
            Some('^') => self.single(TokenKind::Pow, start),
            Some('?') => self.single(TokenKind::Question, start),
            Some('-' | '+') if self.starts_signed_number() => self.read_number(start),
            Some('-') => self.single(TokenKind::Sub, start),
            Some('+') => self.single(TokenKind::Add, start),
            Some('&') => {
                if self.peek_char(1) == Some('&') {
                    self.double(TokenKind::And, start)
                } else {
                    self.single(TokenKind::Ampersand, start)
                }
            }
            Some('|') => {
                if self.peek_char(1) == Some('|') {
                    self.double(TokenKind::Or, start)
                } else {
                    self.single(TokenKind::Pipe, start)
                }
            }
            Some('<') => match self.peek_char(1) {
                Some('=') => self.double(TokenKind::LessEquals, start),
                Some('>') => self.double(TokenKind::NotEquals, start),
                _ => self.single(TokenKind::Less, start),
            },
            Some('>') => {
                if self.peek_char(1) == Some('=') {
                    self.double(TokenKind::GreaterEquals, start)
                } else {
                    self.single(TokenKind::Greater, start)
                }
            }
            Some('!') => {
                if self.peek_char(1) == Some('=') {
                    self.double(TokenKind::NotEquals, start)
                } else {
                    self.single(TokenKind::Not, start)
                }
            }
            Some('=') => {
                if self.peek_char(1) == Some('=') {
                    self.double(TokenKind::Equals, start)
                } else {
                    self.single(TokenKind::Assign, start)
                }
            }
            Some(':') => {
                if self.peek_char(1) == Some('=') {
                    self.double(TokenKind::Assign, start)
                } else {
                    self.single(TokenKind::Colon, start)
                }
            }
            Some('.') => match self.peek_char(1) {
                Some(c) if c.is_ascii_digit() => self.read_number(start),
                Some(c) if c.is_alphanumeric() || c == '_' => {
                    self.advance();
                    let name = self.read_identifier();
                    self.emit(TokenKind::Field, start, name)
                }
                _ => {
                    self.advance();
                    self.error(start, "bad character: \".\"")
                }
            },
            Some('(') => self.open(TokenKind::LeftParen, start),
            Some('[') => self.open(TokenKind::LeftBracket, start),
            Some('{') => self.open(TokenKind::LeftBrace, start),
            Some(')') => self.close(TokenKind::RightParen, start),
            Some(']') => self.close(TokenKind::RightBracket, start),
            Some('}') => self.close(TokenKind::RightBrace, start),
            Some('"') => match self.read_quoted('"') {
                Ok(s) => self.emit(TokenKind::String, start, s),
                Err(message) => self.error(start, message),
            },
            Some('\'') => match self.read_quoted('\'') {
                Ok(s) => self.emit(TokenKind::CharConstant, start, s),
                Err(message) => self.error(start, message),
            },
            Some(ch) if ch.is_ascii_digit() => self.read_number(start),
            Some(ch) if ch.is_alphanumeric() || ch == '_' => {
                let ident = self.read_identifier();
                let kind = match ident.as_str() {
                    "true" | "false" => TokenKind::Bool,
                    "in" => TokenKind::In,
                    "and" => TokenKind::And,
                    "or" => TokenKind::Or,
                    "nil" => TokenKind::Nil,
                    _ => TokenKind::Identifier,
                };
                self.emit(kind, start, ident)
            }
            Some(ch) if ch.is_ascii_graphic() => self.single(TokenKind::Char, start),
            Some(ch) => {
                self.advance();
                self.error(start, format!("unrecognized character: {:?}", ch))
            }
        };
        Some(token)
    }
}

impl Iterator for Lexer {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.next_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::new(input).map(|t| t.kind).collect()
    }

    #[test]
    fn test_keywords() {
        assert_eq!(
            kinds("and or true false nil in"),
            vec![
                TokenKind::And,
                TokenKind::Or,
                TokenKind::Bool,
                TokenKind::Bool,
                TokenKind::Nil,
                TokenKind::In,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_sign_folding() {
        let tokens: Vec<Token> = Lexer::new("a -1 * (-2)").collect();
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "-", "1", "*", "(", "-2", ")", ""]);
    }

    #[test]
    fn test_exactly_one_eof_after_error() {
        let mut lexer = Lexer::new("\"open");
        assert_eq!(lexer.next_token().map(|t| t.kind), Some(TokenKind::Error));
        assert_eq!(lexer.next_token().map(|t| t.kind), Some(TokenKind::Eof));
        assert_eq!(lexer.next_token(), None);
    }
}
