//! Lexer: tokenizes condition expressions

use super::errors::{ConditionError, ConditionResult};

/// A token produced by the lexer
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Raw text; for string literals, the unescaped contents
    pub text: String,
    pub line: usize,
    pub col: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, line: usize, col: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            line,
            col,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    // Keywords
    And,
    Or,
    Not,
    True,
    False,
    Null,

    // Identifiers and literals
    Identifier,
    StringLiteral,
    NumberLiteral,

    // Operators
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    // Structural
    Dot,
    OpenParen,
    CloseParen,
    OpenBracket,
    CloseBracket,

    Eof,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::And => write!(f, "and"),
            Self::Or => write!(f, "or"),
            Self::Not => write!(f, "not"),
            Self::True => write!(f, "true"),
            Self::False => write!(f, "false"),
            Self::Null => write!(f, "null"),
            Self::Identifier => write!(f, "identifier"),
            Self::StringLiteral => write!(f, "string literal"),
            Self::NumberLiteral => write!(f, "number"),
            Self::Eq => write!(f, "=="),
            Self::Ne => write!(f, "!="),
            Self::Lt => write!(f, "<"),
            Self::Le => write!(f, "<="),
            Self::Gt => write!(f, ">"),
            Self::Ge => write!(f, ">="),
            Self::Plus => write!(f, "+"),
            Self::Minus => write!(f, "-"),
            Self::Star => write!(f, "*"),
            Self::Slash => write!(f, "/"),
            Self::Percent => write!(f, "%"),
            Self::Dot => write!(f, "."),
            Self::OpenParen => write!(f, "("),
            Self::CloseParen => write!(f, ")"),
            Self::OpenBracket => write!(f, "["),
            Self::CloseBracket => write!(f, "]"),
            Self::Eof => write!(f, "end of input"),
        }
    }
}

pub struct Lexer {
    input: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    /// Tokenize the entire input; the last token is always `Eof`
    pub fn tokenize(&mut self) -> ConditionResult<Vec<Token>> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace();

            if self.pos >= self.input.len() {
                tokens.push(Token::new(TokenKind::Eof, "", self.line, self.col));
                break;
            }

            tokens.push(self.next_token()?);
        }

        Ok(tokens)
    }

    fn next_token(&mut self) -> ConditionResult<Token> {
        let ch = self.input[self.pos];
        let line = self.line;
        let col = self.col;

        let single = |kind: TokenKind| Token::new(kind, ch.to_string(), line, col);
        match ch {
            '.' => {
                self.advance();
                Ok(single(TokenKind::Dot))
            }
            '(' => {
                self.advance();
                Ok(single(TokenKind::OpenParen))
            }
            ')' => {
                self.advance();
                Ok(single(TokenKind::CloseParen))
            }
            '[' => {
                self.advance();
                Ok(single(TokenKind::OpenBracket))
            }
            ']' => {
                self.advance();
                Ok(single(TokenKind::CloseBracket))
            }
            '+' => {
                self.advance();
                Ok(single(TokenKind::Plus))
            }
            '-' => {
                self.advance();
                Ok(single(TokenKind::Minus))
            }
            '*' => {
                self.advance();
                Ok(single(TokenKind::Star))
            }
            '/' => {
                self.advance();
                Ok(single(TokenKind::Slash))
            }
            '%' => {
                self.advance();
                Ok(single(TokenKind::Percent))
            }
            '=' => self.two_char('=', TokenKind::Eq, None, line, col),
            '!' => self.two_char('=', TokenKind::Ne, Some(TokenKind::Not), line, col),
            '<' => self.two_char('=', TokenKind::Le, Some(TokenKind::Lt), line, col),
            '>' => self.two_char('=', TokenKind::Ge, Some(TokenKind::Gt), line, col),
            '&' => self.two_char('&', TokenKind::And, None, line, col),
            '|' => self.two_char('|', TokenKind::Or, None, line, col),
            '"' => self.read_string(line, col),
            c if c.is_ascii_digit() => self.read_number(line, col),
            c if c.is_alphabetic() || c == '_' => Ok(self.read_word(line, col)),
            other => Err(ConditionError::ParseError {
                line,
                col,
                message: format!("unexpected character '{}'", other),
            }),
        }
    }

    /// Lex `ch` followed by `second` as `paired`; a lone `ch` is `alone`
    fn two_char(
        &mut self,
        second: char,
        paired: TokenKind,
        alone: Option<TokenKind>,
        line: usize,
        col: usize,
    ) -> ConditionResult<Token> {
        let first = self.input[self.pos];
        self.advance();
        if self.current() == Some(second) {
            self.advance();
            return Ok(Token::new(paired, format!("{}{}", first, second), line, col));
        }
        match alone {
            Some(kind) => Ok(Token::new(kind, first.to_string(), line, col)),
            None => Err(ConditionError::ParseError {
                line,
                col,
                message: format!("expected '{}{}'", first, second),
            }),
        }
    }

    fn read_string(&mut self, line: usize, col: usize) -> ConditionResult<Token> {
        self.advance(); // opening quote
        let mut text = String::new();

        loop {
            match self.current() {
                None => {
                    return Err(ConditionError::ParseError {
                        line,
                        col,
                        message: "unterminated string literal".into(),
                    })
                }
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    let escaped = match self.current() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('"') => '"',
                        Some('\\') => '\\',
                        Some(other) => {
                            return Err(ConditionError::ParseError {
                                line: self.line,
                                col: self.col,
                                message: format!("unknown escape '\\{}'", other),
                            })
                        }
                        None => continue,
                    };
                    text.push(escaped);
                    self.advance();
                }
                Some(c) => {
                    text.push(c);
                    self.advance();
                }
            }
        }

        Ok(Token::new(TokenKind::StringLiteral, text, line, col))
    }

    fn read_number(&mut self, line: usize, col: usize) -> ConditionResult<Token> {
        let start = self.pos;
        self.consume_digits();

        // A fraction needs a digit after the dot.
        if self.current() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            self.consume_digits();
        }

        if matches!(self.current(), Some('e') | Some('E')) {
            let sign = matches!(self.peek_at(1), Some('+') | Some('-'));
            let digit_at = if sign { 2 } else { 1 };
            if self.peek_at(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                for _ in 0..digit_at {
                    self.advance();
                }
                self.consume_digits();
            }
        }

        let text: String = self.input[start..self.pos].iter().collect();
        if text.parse::<f64>().is_err() {
            return Err(ConditionError::ParseError {
                line,
                col,
                message: format!("invalid number '{}'", text),
            });
        }
        Ok(Token::new(TokenKind::NumberLiteral, text, line, col))
    }

    fn read_word(&mut self, line: usize, col: usize) -> Token {
        let start = self.pos;
        while self
            .current()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            self.advance();
        }
        let text: String = self.input[start..self.pos].iter().collect();
        let kind = match text.as_str() {
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            _ => TokenKind::Identifier,
        };
        Token::new(kind, text, line, col)
    }

    fn consume_digits(&mut self) {
        while self.current().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.current().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    fn current(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.input.get(self.pos + offset).copied()
    }

    fn advance(&mut self) {
        if let Some(&ch) = self.input.get(self.pos) {
            self.pos += 1;
            if ch == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
    }
}
