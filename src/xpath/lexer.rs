//! XPath 1.0 tokenizer
//!
//! Applies the lexical disambiguation rules of XPath 1.0 section 3.7 while
//! scanning: `*` and the keywords `and`/`or`/`mod`/`div` are operators only
//! when the preceding token can end an operand, and a name is classified as
//! a function name, node type or axis name by the token that follows it.

use super::XPathError;

const NODE_TYPES: &[&str] = &["node", "text", "comment", "processing-instruction"];

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    DotDot,
    At,
    Comma,
    ColonColon,
    Slash,
    DoubleSlash,
    Pipe,
    Plus,
    Minus,
    /// Multiplication operator
    Star,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    And,
    Or,
    Mod,
    Div,
    Number(f64),
    Literal(String),
    /// Name test, including the `*` wildcard
    Name(String),
    FunctionName(String),
    NodeType(String),
    AxisName(String),
}

impl Token {
    /// Whether a `*` or NCName following this token is an operator.
    fn ends_operand(&self) -> bool {
        !matches!(
            self,
            Token::At
                | Token::ColonColon
                | Token::LParen
                | Token::LBracket
                | Token::Comma
                | Token::Slash
                | Token::DoubleSlash
                | Token::Pipe
                | Token::Plus
                | Token::Minus
                | Token::Star
                | Token::Eq
                | Token::Neq
                | Token::Lt
                | Token::Lte
                | Token::Gt
                | Token::Gte
                | Token::And
                | Token::Or
                | Token::Mod
                | Token::Div
        )
    }
}

/// Tokenize an XPath expression.
pub fn tokenize(input: &str) -> Result<Vec<Token>, XPathError> {
    Lexer {
        chars: input.chars().collect(),
        pos: 0,
        tokens: Vec::new(),
    }
    .run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    tokens: Vec<Token>,
}

impl Lexer {
    fn run(mut self) -> Result<Vec<Token>, XPathError> {
        loop {
            self.skip_whitespace();
            let Some(c) = self.peek() else { break };
            let start = self.pos;
            let token = match c {
                '(' => self.single(Token::LParen),
                ')' => self.single(Token::RParen),
                '[' => self.single(Token::LBracket),
                ']' => self.single(Token::RBracket),
                '@' => self.single(Token::At),
                ',' => self.single(Token::Comma),
                '|' => self.single(Token::Pipe),
                '+' => self.single(Token::Plus),
                '-' => self.single(Token::Minus),
                '=' => self.single(Token::Eq),
                '*' => {
                    self.pos += 1;
                    if self.operator_context() {
                        Token::Star
                    } else {
                        Token::Name("*".to_string())
                    }
                }
                '/' => {
                    self.pos += 1;
                    if self.eat('/') {
                        Token::DoubleSlash
                    } else {
                        Token::Slash
                    }
                }
                ':' => {
                    self.pos += 1;
                    if !self.eat(':') {
                        return Err(XPathError::syntax("expected '::'", start));
                    }
                    Token::ColonColon
                }
                '!' => {
                    self.pos += 1;
                    if !self.eat('=') {
                        return Err(XPathError::syntax("expected '!='", start));
                    }
                    Token::Neq
                }
                '<' => {
                    self.pos += 1;
                    if self.eat('=') {
                        Token::Lte
                    } else {
                        Token::Lt
                    }
                }
                '>' => {
                    self.pos += 1;
                    if self.eat('=') {
                        Token::Gte
                    } else {
                        Token::Gt
                    }
                }
                '.' => {
                    if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
                        self.number()?
                    } else if self.peek_at(1) == Some('.') {
                        self.pos += 2;
                        Token::DotDot
                    } else {
                        self.single(Token::Dot)
                    }
                }
                '"' | '\'' => self.literal(c)?,
                '$' => return Err(XPathError::syntax("variables are not supported", start)),
                c if c.is_ascii_digit() => self.number()?,
                c if is_name_start(c) => self.name()?,
                c => {
                    return Err(XPathError::syntax(
                        &format!("unexpected character '{}'", c),
                        start,
                    ))
                }
            };
            self.tokens.push(token);
        }
        Ok(self.tokens)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn single(&mut self, token: Token) -> Token {
        self.pos += 1;
        token
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn operator_context(&self) -> bool {
        self.tokens.last().is_some_and(Token::ends_operand)
    }

    fn number(&mut self) -> Result<Token, XPathError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.eat('.') {
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| XPathError::syntax(&format!("invalid number '{}'", text), start))
    }

    fn literal(&mut self, quote: char) -> Result<Token, XPathError> {
        let start = self.pos;
        self.pos += 1;
        let content_start = self.pos;
        while self.peek().is_some_and(|c| c != quote) {
            self.pos += 1;
        }
        if self.peek().is_none() {
            return Err(XPathError::syntax("unterminated string literal", start));
        }
        let text = self.chars[content_start..self.pos].iter().collect();
        self.pos += 1;
        Ok(Token::Literal(text))
    }

    fn name(&mut self) -> Result<Token, XPathError> {
        let start = self.pos;
        while self.peek().is_some_and(is_name_char) {
            self.pos += 1;
        }
        // QName, but not an axis separator
        if self.peek() == Some(':') && self.peek_at(1).is_some_and(is_name_start) {
            self.pos += 1;
            while self.peek().is_some_and(is_name_char) {
                self.pos += 1;
            }
        }
        let name: String = self.chars[start..self.pos].iter().collect();

        if self.operator_context() {
            return match name.as_str() {
                "and" => Ok(Token::And),
                "or" => Ok(Token::Or),
                "mod" => Ok(Token::Mod),
                "div" => Ok(Token::Div),
                _ => Err(XPathError::syntax(
                    &format!("expected an operator, found '{}'", name),
                    start,
                )),
            };
        }

        let mut look = self.pos;
        while self.chars.get(look).is_some_and(|c| c.is_whitespace()) {
            look += 1;
        }
        match (self.chars.get(look), self.chars.get(look + 1)) {
            (Some('('), _) if NODE_TYPES.contains(&name.as_str()) => Ok(Token::NodeType(name)),
            (Some('('), _) => Ok(Token::FunctionName(name)),
            (Some(':'), Some(':')) => Ok(Token::AxisName(name)),
            _ => Ok(Token::Name(name)),
        }
    }
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || !c.is_ascii()
}

fn is_name_char(c: char) -> bool {
    is_name_start(c) || c.is_ascii_digit() || c == '-' || c == '.'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_disambiguation() {
        let tokens = tokenize("*[2 * 3]").unwrap();
        assert_eq!(tokens[0], Token::Name("*".to_string()));
        assert_eq!(tokens[3], Token::Star);
    }

    #[test]
    fn test_name_classification() {
        let tokens = tokenize("descendant::div[contains(@class, 'x')]/text()").unwrap();
        assert_eq!(tokens[0], Token::AxisName("descendant".to_string()));
        assert_eq!(tokens[1], Token::ColonColon);
        assert_eq!(tokens[2], Token::Name("div".to_string()));
        assert_eq!(tokens[4], Token::FunctionName("contains".to_string()));
        assert_eq!(tokens[6], Token::At);
        assert_eq!(tokens[7], Token::Name("class".to_string()));
        assert_eq!(tokens[9], Token::Literal("x".to_string()));
        assert_eq!(tokens[13], Token::NodeType("text".to_string()));
    }

    #[test]
    fn test_keyword_operators() {
        let tokens = tokenize("@a and not(@b) or 5 mod 2").unwrap();
        assert!(tokens.contains(&Token::And));
        assert!(tokens.contains(&Token::Or));
        assert!(tokens.contains(&Token::Mod));
        // element named "and" in operand position stays a name
        let tokens = tokenize("//and").unwrap();
        assert_eq!(tokens[1], Token::Name("and".to_string()));
    }

    #[test]
    fn test_numbers_and_dots() {
        let tokens = tokenize(".5 + 1.25 .. .").unwrap();
        assert_eq!(tokens[0], Token::Number(0.5));
        assert_eq!(tokens[2], Token::Number(1.25));
        assert_eq!(tokens[3], Token::DotDot);
        assert_eq!(tokens[4], Token::Dot);
    }

    #[test]
    fn test_lexer_errors() {
        assert!(tokenize("'open").is_err());
        assert!(tokenize("a ! b").is_err());
        assert!(tokenize("$var").is_err());
        assert!(tokenize("#id").is_err());
    }
}
