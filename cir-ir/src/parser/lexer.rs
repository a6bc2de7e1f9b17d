//! Textual IR lexer
//!
//! Splits `.cir` text into tokens. Sigil-prefixed names (`%0`, `^bb1`,
//! `@f`, `!s32i`, `#cir.int`) are single tokens carrying the name without
//! the sigil. `//` starts a comment that runs to the end of the line.

use cir_common::{CirError, SourceLocation, SourceTracker};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenType {
    /// `%name`
    ValueId(String),
    /// `^name`
    BlockId(String),
    /// `@name` or `@"quoted name"`
    SymbolRef(String),
    /// `!name`
    TypeId(String),
    /// `#name`
    AttrId(String),
    /// Bare identifier such as an operation name or attribute key
    Ident(String),
    StringLiteral(String),
    IntLiteral(i128),
    FloatLiteral(f64),

    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Less,
    Greater,
    Comma,
    Colon,
    Equal,
    Arrow,
    Minus,
    Ellipsis,

    EndOfFile,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::ValueId(s) => write!(f, "%{}", s),
            TokenType::BlockId(s) => write!(f, "^{}", s),
            TokenType::SymbolRef(s) => write!(f, "@{}", s),
            TokenType::TypeId(s) => write!(f, "!{}", s),
            TokenType::AttrId(s) => write!(f, "#{}", s),
            TokenType::Ident(s) => write!(f, "{}", s),
            TokenType::StringLiteral(s) => write!(f, "\"{}\"", s),
            TokenType::IntLiteral(n) => write!(f, "{}", n),
            TokenType::FloatLiteral(x) => write!(f, "{:?}", x),
            TokenType::LeftParen => write!(f, "("),
            TokenType::RightParen => write!(f, ")"),
            TokenType::LeftBrace => write!(f, "{{"),
            TokenType::RightBrace => write!(f, "}}"),
            TokenType::LeftBracket => write!(f, "["),
            TokenType::RightBracket => write!(f, "]"),
            TokenType::Less => write!(f, "<"),
            TokenType::Greater => write!(f, ">"),
            TokenType::Comma => write!(f, ","),
            TokenType::Colon => write!(f, ":"),
            TokenType::Equal => write!(f, "="),
            TokenType::Arrow => write!(f, "->"),
            TokenType::Minus => write!(f, "-"),
            TokenType::Ellipsis => write!(f, "..."),
            TokenType::EndOfFile => write!(f, "end of file"),
        }
    }
}

/// A token with the location of its first character
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    pub location: SourceLocation,
}

fn is_name_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '$')
}

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    tracker: SourceTracker,
}

impl Lexer {
    pub fn new(input: &str, filename: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            tracker: SourceTracker::new(filename),
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current_char()?;
        self.position += 1;
        self.tracker.advance(ch);
        Some(ch)
    }

    fn skip_trivia(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch.is_whitespace() {
                self.advance();
            } else if ch == '/' && self.peek_char(1) == Some('/') {
                while let Some(ch) = self.current_char() {
                    if ch == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else {
                break;
            }
        }
    }

    fn read_name(&mut self) -> String {
        let mut name = String::new();
        while let Some(ch) = self.current_char() {
            if !is_name_char(ch) {
                break;
            }
            name.push(ch);
            self.advance();
        }
        name
    }

    fn read_string(&mut self) -> Result<String, CirError> {
        let start = self.tracker.location();
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.advance() {
                Some('"') => return Ok(value),
                Some('\\') => match self.advance() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('"') => value.push('"'),
                    Some('\\') => value.push('\\'),
                    Some(other) => {
                        return Err(CirError::parse_error(
                            format!("unknown escape sequence '\\{}'", other),
                            self.tracker.location(),
                        ))
                    }
                    None => break,
                },
                Some(ch) => value.push(ch),
                None => break,
            }
        }
        Err(CirError::parse_error("unterminated string literal", start))
    }

    fn read_number(&mut self, negative: bool) -> Result<TokenType, CirError> {
        let location = self.tracker.location();
        let mut text = String::new();
        if negative {
            text.push('-');
        }
        let mut is_float = false;
        while let Some(ch) = self.current_char() {
            let exponent_sign = matches!(ch, '+' | '-') && text.ends_with(|c| c == 'e' || c == 'E');
            if ch.is_ascii_digit() || exponent_sign {
                text.push(ch);
            } else if matches!(ch, '.' | 'e' | 'E') {
                is_float = true;
                text.push(ch);
            } else {
                break;
            }
            self.advance();
        }
        if is_float {
            text.parse::<f64>()
                .map(TokenType::FloatLiteral)
                .map_err(|_| CirError::parse_error(format!("invalid float literal '{}'", text), location))
        } else {
            text.parse::<i128>()
                .map(TokenType::IntLiteral)
                .map_err(|_| CirError::parse_error(format!("invalid integer literal '{}'", text), location))
        }
    }

    fn sigil_name(&mut self, sigil: char) -> Result<String, CirError> {
        let location = self.tracker.location();
        self.advance();
        let quoted = sigil == '@' && self.current_char() == Some('"');
        let name = if quoted { self.read_string()? } else { self.read_name() };
        if name.is_empty() && !quoted {
            return Err(CirError::parse_error(
                format!("expected a name after '{}'", sigil),
                location,
            ));
        }
        Ok(name)
    }

    fn next_token(&mut self) -> Result<Token, CirError> {
        self.skip_trivia();
        let location = self.tracker.location();
        let Some(ch) = self.current_char() else {
            return Ok(Token {
                token_type: TokenType::EndOfFile,
                location,
            });
        };

        let token_type = match ch {
            '%' => TokenType::ValueId(self.sigil_name(ch)?),
            '^' => TokenType::BlockId(self.sigil_name(ch)?),
            '@' => TokenType::SymbolRef(self.sigil_name(ch)?),
            '!' => TokenType::TypeId(self.sigil_name(ch)?),
            '#' => TokenType::AttrId(self.sigil_name(ch)?),
            '"' => TokenType::StringLiteral(self.read_string()?),
            '0'..='9' => self.read_number(false)?,
            '-' => {
                self.advance();
                match self.current_char() {
                    Some('>') => {
                        self.advance();
                        TokenType::Arrow
                    }
                    Some(d) if d.is_ascii_digit() => self.read_number(true)?,
                    _ => TokenType::Minus,
                }
            }
            '.' if self.peek_char(1) == Some('.') && self.peek_char(2) == Some('.') => {
                self.advance();
                self.advance();
                self.advance();
                TokenType::Ellipsis
            }
            c if c.is_ascii_alphabetic() || c == '_' => TokenType::Ident(self.read_name()),
            _ => {
                self.advance();
                match ch {
                    '(' => TokenType::LeftParen,
                    ')' => TokenType::RightParen,
                    '{' => TokenType::LeftBrace,
                    '}' => TokenType::RightBrace,
                    '[' => TokenType::LeftBracket,
                    ']' => TokenType::RightBracket,
                    '<' => TokenType::Less,
                    '>' => TokenType::Greater,
                    ',' => TokenType::Comma,
                    ':' => TokenType::Colon,
                    '=' => TokenType::Equal,
                    other => {
                        return Err(CirError::parse_error(
                            format!("unexpected character '{}'", other),
                            location,
                        ))
                    }
                }
            }
        };
        Ok(Token {
            token_type,
            location,
        })
    }

    /// Tokenize the whole input; the last token is always `EndOfFile`
    pub fn tokenize(&mut self) -> Result<Vec<Token>, CirError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.token_type == TokenType::EndOfFile;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }
}
