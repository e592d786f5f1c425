use super::expr::{Constant, Expr, Function};
use super::lexer::{Lexer, Token, TokenKind};
use super::{SymbolicError, SymbolicResult};

/// Parse `source` into an expression. Identifiers listed in `allowed` are
/// variables; an identifier spelled only with single-letter allowed
/// variables (`xy`) is read as their product.
pub fn parse(source: &str, allowed: &[&str]) -> SymbolicResult<Expr> {
    let mut parser = Parser::from_source(source, allowed)?;
    parser.parse_expression()
}

pub struct Parser<'a> {
    tokens: Vec<Token>,
    current: usize,
    allowed: &'a [&'a str],
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token>, allowed: &'a [&'a str]) -> Self {
        Parser {
            tokens,
            current: 0,
            allowed,
        }
    }

    pub fn from_source(source: &str, allowed: &'a [&'a str]) -> SymbolicResult<Self> {
        let mut lexer = Lexer::new(source);
        let tokens = lexer.tokenize()?;
        Ok(Parser::new(tokens, allowed))
    }

    /// Parse a complete expression, rejecting trailing input.
    pub fn parse_expression(&mut self) -> SymbolicResult<Expr> {
        let expr = self.term()?;
        if !self.is_at_end() {
            return Err(self.unexpected());
        }
        Ok(expr)
    }

    fn term(&mut self) -> SymbolicResult<Expr> {
        let mut terms = vec![self.factor()?];
        loop {
            if self.match_token(&TokenKind::Plus) {
                terms.push(self.factor()?);
            } else if self.match_token(&TokenKind::Minus) {
                terms.push(Expr::neg(self.factor()?));
            } else {
                break;
            }
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            Expr::plus(terms)
        })
    }

    fn factor(&mut self) -> SymbolicResult<Expr> {
        let mut factors = vec![self.unary()?];
        loop {
            if self.match_token(&TokenKind::Times) {
                factors.push(self.unary()?);
            } else if self.match_token(&TokenKind::Divide) {
                factors.push(Expr::recip(self.unary()?));
            } else if self.starts_operand() {
                // Implicit multiplication: `2x`, `2(x + 1)`, `(x + 1)(y + 1)`.
                factors.push(self.power()?);
            } else {
                break;
            }
        }
        Ok(if factors.len() == 1 {
            factors.remove(0)
        } else {
            Expr::times(factors)
        })
    }

    fn unary(&mut self) -> SymbolicResult<Expr> {
        if self.match_token(&TokenKind::Minus) {
            return Ok(Expr::neg(self.unary()?));
        }
        if self.match_token(&TokenKind::Plus) {
            return self.unary();
        }
        self.power()
    }

    fn power(&mut self) -> SymbolicResult<Expr> {
        let base = self.primary()?;
        if self.match_token(&TokenKind::Power) {
            // Right associative; the exponent may carry its own sign.
            let exponent = self.unary()?;
            return Ok(Expr::power(base, exponent));
        }
        Ok(base)
    }

    fn primary(&mut self) -> SymbolicResult<Expr> {
        let token = match self.advance() {
            Some(token) => token.clone(),
            None => return Err(self.unexpected()),
        };
        match token.kind {
            TokenKind::Number(value) => Ok(Expr::Number(value)),
            TokenKind::Symbol(name) => self.identifier(name),
            TokenKind::LeftParen => {
                let expr = self.term()?;
                self.consume(&TokenKind::RightParen, "Expected ')' after expression")?;
                Ok(expr)
            }
            TokenKind::Eof => Err(SymbolicError::Parse {
                message: "Unexpected end of input".to_string(),
                position: token.position,
            }),
            other => Err(SymbolicError::Parse {
                message: format!("Unexpected token {}", describe(&other)),
                position: token.position,
            }),
        }
    }

    fn identifier(&mut self, name: String) -> SymbolicResult<Expr> {
        if let Some(function) = Function::from_name(&name) {
            if self.match_token(&TokenKind::LeftParen) {
                let argument = self.term()?;
                if self.check(&TokenKind::Comma) {
                    return Err(SymbolicError::Parse {
                        message: format!("{}() takes exactly one argument", name),
                        position: self.current_position(),
                    });
                }
                self.consume(&TokenKind::RightParen, "Expected ')' after function argument")?;
                return Ok(Expr::apply(function, argument));
            }
        }
        if let Some(constant) = Constant::from_name(&name) {
            return Ok(Expr::Constant(constant));
        }
        if self.allowed.contains(&name.as_str()) {
            return Ok(Expr::Symbol(name));
        }
        let splits = name.chars().count() > 1
            && name.chars().all(|c| {
                let mut buf = [0u8; 4];
                self.allowed.contains(&&*c.encode_utf8(&mut buf))
            });
        if splits {
            return Ok(Expr::times(
                name.chars().map(|c| Expr::symbol(c.to_string())).collect(),
            ));
        }
        Ok(Expr::Symbol(name))
    }

    // Helper methods
    fn starts_operand(&self) -> bool {
        matches!(
            self.peek().map(|t| &t.kind),
            Some(TokenKind::Number(_)) | Some(TokenKind::Symbol(_)) | Some(TokenKind::LeftParen)
        )
    }

    fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek().map_or(false, |token| {
            std::mem::discriminant(&token.kind) == std::mem::discriminant(kind)
        })
    }

    fn advance(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.current);
        if token.map_or(false, |t| !matches!(t.kind, TokenKind::Eof)) {
            self.current += 1;
        }
        token
    }

    fn is_at_end(&self) -> bool {
        self.peek().map_or(true, |token| matches!(token.kind, TokenKind::Eof))
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.current)
    }

    fn consume(&mut self, kind: &TokenKind, message: &str) -> SymbolicResult<()> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(SymbolicError::Parse {
                message: message.to_string(),
                position: self.current_position(),
            })
        }
    }

    fn unexpected(&self) -> SymbolicError {
        match self.peek() {
            Some(token) if !matches!(token.kind, TokenKind::Eof) => SymbolicError::Parse {
                message: format!("Unexpected token {}", describe(&token.kind)),
                position: token.position,
            },
            _ => SymbolicError::Parse {
                message: "Unexpected end of input".to_string(),
                position: self.current_position(),
            },
        }
    }

    fn current_position(&self) -> usize {
        self.peek().map(|t| t.position).unwrap_or(0)
    }
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Number(value) => format!("'{}'", value),
        TokenKind::Symbol(name) => format!("'{}'", name),
        TokenKind::Plus => "'+'".to_string(),
        TokenKind::Minus => "'-'".to_string(),
        TokenKind::Times => "'*'".to_string(),
        TokenKind::Divide => "'/'".to_string(),
        TokenKind::Power => "'**'".to_string(),
        TokenKind::LeftParen => "'('".to_string(),
        TokenKind::RightParen => "')'".to_string(),
        TokenKind::Comma => "','".to_string(),
        TokenKind::Eof => "end of input".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const XY: &[&str] = &["x", "y"];

    fn parse_xy(input: &str) -> SymbolicResult<Expr> {
        parse(input, XY)
    }

    #[test]
    fn test_precedence_and_rendering() {
        assert_eq!(parse_xy("(2*x+3*y+2)/28").unwrap().to_string(), "(2*x + 3*y + 2)/28");
        assert_eq!(parse_xy("x - y - 1").unwrap().to_string(), "x - y - 1");
        assert_eq!(
            parse_xy("-x^2").unwrap(),
            Expr::neg(Expr::power(Expr::symbol("x"), Expr::integer(2)))
        );
    }

    #[test]
    fn test_power_is_right_associative() {
        let e = parse_xy("x**y**2").unwrap();
        assert_eq!(
            e,
            Expr::power(
                Expr::symbol("x"),
                Expr::power(Expr::symbol("y"), Expr::integer(2))
            )
        );
        assert_eq!(
            parse_xy("x^-1").unwrap(),
            Expr::power(Expr::symbol("x"), Expr::integer(-1))
        );
    }

    #[test]
    fn test_implicit_multiplication() {
        assert_eq!(parse_xy("4xy").unwrap(), parse_xy("4*x*y").unwrap());
        assert_eq!(parse_xy("2(x+1)").unwrap(), parse_xy("2*(x+1)").unwrap());
        assert_eq!(parse_xy("(x+1)(y+1)").unwrap(), parse_xy("(x+1)*(y+1)").unwrap());
        assert_eq!(parse_xy("x y").unwrap(), parse_xy("x*y").unwrap());
    }

    #[test]
    fn test_functions_and_constants() {
        let e = parse_xy("ln(x) + sqrt(y) + pi").unwrap();
        assert_eq!(e.to_string(), "log(x) + sqrt(y) + pi");
        assert!(e.free_symbols().iter().all(|s| s == "x" || s == "y"));
    }

    #[test]
    fn test_unknown_identifiers_stay_free() {
        let e = parse_xy("x*z").unwrap();
        let names: Vec<String> = e.free_symbols().into_iter().collect();
        assert_eq!(names, vec!["x".to_string(), "z".to_string()]);

        let e = parse_xy("xyz").unwrap();
        assert!(e.free_symbols().contains("xyz"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse_xy(""), Err(SymbolicError::Parse { .. })));
        assert!(matches!(parse_xy("(x + y"), Err(SymbolicError::Parse { .. })));
        assert!(matches!(parse_xy("x +* y"), Err(SymbolicError::Parse { .. })));
        assert!(matches!(parse_xy("x)"), Err(SymbolicError::Parse { position: 1, .. })));
        assert!(matches!(parse_xy("sqrt(x, y)"), Err(SymbolicError::Parse { .. })));
    }
}
