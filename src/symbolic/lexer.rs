use super::rational::{Rational, MAX_DECIMAL_EXPONENT};
use super::{SymbolicError, SymbolicResult};

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: usize,
    pub length: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Number(Rational),
    Symbol(String),

    // Operators
    Plus,
    Minus,
    Times,
    Divide,
    Power, // ^ or **

    // Grouping
    LeftParen,
    RightParen,
    Comma,

    Eof,
}

pub struct Lexer {
    chars: Vec<char>,
    position: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            chars: input.chars().collect(),
            position: 0,
        }
    }

    pub fn tokenize(&mut self) -> SymbolicResult<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let is_eof = matches!(token.kind, TokenKind::Eof);
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    fn current(&self) -> Option<char> {
        self.chars.get(self.position).copied()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.position + 1).copied()
    }

    fn single(&mut self, kind: TokenKind) -> Token {
        let position = self.position;
        self.position += 1;
        Token {
            kind,
            position,
            length: 1,
        }
    }

    fn next_token(&mut self) -> SymbolicResult<Token> {
        while self.current().map_or(false, char::is_whitespace) {
            self.position += 1;
        }

        let start = self.position;
        let ch = match self.current() {
            Some(ch) => ch,
            None => {
                return Ok(Token {
                    kind: TokenKind::Eof,
                    position: start,
                    length: 0,
                })
            }
        };

        match ch {
            '+' => Ok(self.single(TokenKind::Plus)),
            '-' => Ok(self.single(TokenKind::Minus)),
            '/' => Ok(self.single(TokenKind::Divide)),
            '^' => Ok(self.single(TokenKind::Power)),
            '(' => Ok(self.single(TokenKind::LeftParen)),
            ')' => Ok(self.single(TokenKind::RightParen)),
            ',' => Ok(self.single(TokenKind::Comma)),
            '*' => {
                if self.peek() == Some('*') {
                    self.position += 2;
                    Ok(Token {
                        kind: TokenKind::Power,
                        position: start,
                        length: 2,
                    })
                } else {
                    Ok(self.single(TokenKind::Times))
                }
            }
            c if c.is_ascii_digit() || c == '.' => self.read_number(start),
            c if c.is_alphabetic() || c == '_' => Ok(self.read_symbol(start)),
            other => Err(SymbolicError::Parse {
                message: format!("Unexpected character '{}'", other),
                position: start,
            }),
        }
    }

    fn read_number(&mut self, start: usize) -> SymbolicResult<Token> {
        while self
            .current()
            .map_or(false, |c| c.is_ascii_digit() || c == '.')
        {
            self.position += 1;
        }
        // Exponent only when followed by digits, so `2e` stays `2*e`.
        if matches!(self.current(), Some('e') | Some('E')) {
            let after = self.peek();
            let signed_digit = matches!(after, Some('+') | Some('-'))
                && self
                    .chars
                    .get(self.position + 2)
                    .map_or(false, char::is_ascii_digit);
            if after.map_or(false, |c| c.is_ascii_digit()) || signed_digit {
                self.position += if signed_digit { 2 } else { 1 };
                let digits_start = self.position;
                while self.current().map_or(false, |c| c.is_ascii_digit()) {
                    self.position += 1;
                }
                let digits: String = self.chars[digits_start..self.position].iter().collect();
                let in_range = digits
                    .parse::<u32>()
                    .map_or(false, |e| e <= MAX_DECIMAL_EXPONENT);
                if !in_range {
                    let text: String = self.chars[start..self.position].iter().collect();
                    return Err(SymbolicError::Parse {
                        message: format!(
                            "Exponent out of range in '{}' (at most {})",
                            text, MAX_DECIMAL_EXPONENT
                        ),
                        position: start,
                    });
                }
            }
        }

        let text: String = self.chars[start..self.position].iter().collect();
        let value = Rational::from_decimal_str(&text).ok_or_else(|| SymbolicError::Parse {
            message: format!("Invalid number '{}'", text),
            position: start,
        })?;
        Ok(Token {
            kind: TokenKind::Number(value),
            position: start,
            length: self.position - start,
        })
    }

    fn read_symbol(&mut self, start: usize) -> Token {
        while self
            .current()
            .map_or(false, |c| c.is_alphanumeric() || c == '_')
        {
            self.position += 1;
        }
        let name: String = self.chars[start..self.position].iter().collect();
        Token {
            kind: TokenKind::Symbol(name),
            position: start,
            length: self.position - start,
        }
    }
}
