//! Recursive descent parser for XPath 1.0
//!
//! Precedence, lowest first: `or`, `and`, equality, relational, additive,
//! multiplicative, unary minus, union, path/filter expressions.

use super::ast::{Axis, BinaryOp, Expr, NodeTest, Step};
use super::lexer::{tokenize, Token};
use super::XPathError;

/// Deepest expression tree the parser builds. Each parenthesized
/// expression, predicate, argument, unary minus and binary operator adds a
/// level.
const MAX_DEPTH: usize = 128;

/// Parse an XPath expression string into an [`Expr`].
pub fn parse(input: &str) -> Result<Expr, XPathError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(XPathError::syntax("empty expression", 0));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.expr()?;
    if let Some(token) = parser.peek() {
        return Err(parser.error(&format!("unexpected token {:?}", token)));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), XPathError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(&format!("expected {:?}, found {:?}", token, self.peek())))
        }
    }

    fn error(&self, message: &str) -> XPathError {
        XPathError::syntax(message, self.pos)
    }

    fn expr(&mut self) -> Result<Expr, XPathError> {
        let depth = self.depth;
        self.descend()?;
        let expr = self.or_expr();
        self.depth = depth;
        expr
    }

    fn descend(&mut self) -> Result<(), XPathError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error(&format!(
                "expression nested more than {} levels deep",
                MAX_DEPTH
            )));
        }
        Ok(())
    }

    fn binary(&mut self, op: BinaryOp, left: Expr, right: Expr) -> Result<Expr, XPathError> {
        self.descend()?;
        Ok(Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn or_expr(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.and_expr()?;
        while self.eat(&Token::Or) {
            let right = self.and_expr()?;
            left = self.binary(BinaryOp::Or, left, right)?;
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.equality_expr()?;
        while self.eat(&Token::And) {
            let right = self.equality_expr()?;
            left = self.binary(BinaryOp::And, left, right)?;
        }
        Ok(left)
    }

    fn equality_expr(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.relational_expr()?;
        loop {
            let op = match self.peek() {
                Some(Token::Eq) => BinaryOp::Eq,
                Some(Token::Neq) => BinaryOp::Neq,
                _ => break,
            };
            self.pos += 1;
            let right = self.relational_expr()?;
            left = self.binary(op, left, right)?;
        }
        Ok(left)
    }

    fn relational_expr(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.additive_expr()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Lte) => BinaryOp::Lte,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Gte) => BinaryOp::Gte,
                _ => break,
            };
            self.pos += 1;
            let right = self.additive_expr()?;
            left = self.binary(op, left, right)?;
        }
        Ok(left)
    }

    fn additive_expr(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.multiplicative_expr()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let right = self.multiplicative_expr()?;
            left = self.binary(op, left, right)?;
        }
        Ok(left)
    }

    fn multiplicative_expr(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.unary_expr()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Div) => BinaryOp::Div,
                Some(Token::Mod) => BinaryOp::Mod,
                _ => break,
            };
            self.pos += 1;
            let right = self.unary_expr()?;
            left = self.binary(op, left, right)?;
        }
        Ok(left)
    }

    fn unary_expr(&mut self) -> Result<Expr, XPathError> {
        if self.eat(&Token::Minus) {
            self.descend()?;
            Ok(Expr::Negate(Box::new(self.unary_expr()?)))
        } else {
            self.union_expr()
        }
    }

    fn union_expr(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.path_expr()?;
        while self.eat(&Token::Pipe) {
            let right = self.path_expr()?;
            self.descend()?;
            left = Expr::Union(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn path_expr(&mut self) -> Result<Expr, XPathError> {
        match self.peek() {
            Some(Token::Slash) => {
                self.pos += 1;
                let mut steps = Vec::new();
                if self.at_step_start() {
                    self.relative_path(&mut steps)?;
                }
                Ok(Expr::Path {
                    absolute: true,
                    steps,
                })
            }
            Some(Token::DoubleSlash) => {
                self.pos += 1;
                let mut steps = vec![Step::new(Axis::DescendantOrSelf, NodeTest::Node)];
                self.relative_path(&mut steps)?;
                Ok(Expr::Path {
                    absolute: true,
                    steps,
                })
            }
            Some(
                Token::Literal(_) | Token::Number(_) | Token::LParen | Token::FunctionName(_),
            ) => self.filter_expr(),
            _ if self.at_step_start() => {
                let mut steps = Vec::new();
                self.relative_path(&mut steps)?;
                Ok(Expr::Path {
                    absolute: false,
                    steps,
                })
            }
            other => Err(self.error(&format!("expected an expression, found {:?}", other))),
        }
    }

    fn filter_expr(&mut self) -> Result<Expr, XPathError> {
        let primary = self.primary_expr()?;
        let predicates = self.predicates()?;
        let mut steps = Vec::new();
        if self.eat(&Token::DoubleSlash) {
            steps.push(Step::new(Axis::DescendantOrSelf, NodeTest::Node));
            self.relative_path(&mut steps)?;
        } else if self.eat(&Token::Slash) {
            self.relative_path(&mut steps)?;
        }
        if predicates.is_empty() && steps.is_empty() {
            return Ok(primary);
        }
        Ok(Expr::Filter {
            primary: Box::new(primary),
            predicates,
            steps,
        })
    }

    fn primary_expr(&mut self) -> Result<Expr, XPathError> {
        match self.tokens.get(self.pos).cloned() {
            Some(Token::Literal(s)) => {
                self.pos += 1;
                Ok(Expr::Literal(s))
            }
            Some(Token::Number(n)) => {
                self.pos += 1;
                Ok(Expr::Number(n))
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.expr()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(Token::FunctionName(name)) => {
                self.pos += 1;
                self.expect(&Token::LParen)?;
                let mut args = Vec::new();
                if !self.eat(&Token::RParen) {
                    args.push(self.expr()?);
                    while self.eat(&Token::Comma) {
                        args.push(self.expr()?);
                    }
                    self.expect(&Token::RParen)?;
                }
                Ok(Expr::Call { name, args })
            }
            other => Err(self.error(&format!("expected a primary expression, found {:?}", other))),
        }
    }

    fn at_step_start(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                Token::Dot
                    | Token::DotDot
                    | Token::At
                    | Token::Name(_)
                    | Token::NodeType(_)
                    | Token::AxisName(_)
            )
        )
    }

    fn relative_path(&mut self, steps: &mut Vec<Step>) -> Result<(), XPathError> {
        steps.push(self.step()?);
        loop {
            if self.eat(&Token::DoubleSlash) {
                steps.push(Step::new(Axis::DescendantOrSelf, NodeTest::Node));
                steps.push(self.step()?);
            } else if self.eat(&Token::Slash) {
                steps.push(self.step()?);
            } else {
                return Ok(());
            }
        }
    }

    fn step(&mut self) -> Result<Step, XPathError> {
        if self.eat(&Token::Dot) {
            return Ok(Step::new(Axis::SelfAxis, NodeTest::Node));
        }
        if self.eat(&Token::DotDot) {
            return Ok(Step::new(Axis::Parent, NodeTest::Node));
        }

        let axis = if self.eat(&Token::At) {
            Axis::Attribute
        } else if let Some(Token::AxisName(name)) = self.peek().cloned() {
            let axis = Axis::parse(&name)
                .ok_or_else(|| self.error(&format!("unsupported axis '{}'", name)))?;
            self.pos += 1;
            self.expect(&Token::ColonColon)?;
            axis
        } else {
            Axis::Child
        };

        let test = self.node_test()?;
        let predicates = self.predicates()?;
        Ok(Step {
            axis,
            test,
            predicates,
        })
    }

    fn node_test(&mut self) -> Result<NodeTest, XPathError> {
        match self.tokens.get(self.pos).cloned() {
            Some(Token::Name(name)) => {
                self.pos += 1;
                if name == "*" {
                    Ok(NodeTest::Wildcard)
                } else {
                    Ok(NodeTest::Name(name))
                }
            }
            Some(Token::NodeType(kind)) => {
                self.pos += 1;
                self.expect(&Token::LParen)?;
                let test = match kind.as_str() {
                    "node" => NodeTest::Node,
                    "text" => NodeTest::Text,
                    "comment" => NodeTest::Comment,
                    _ => {
                        let target = match self.tokens.get(self.pos).cloned() {
                            Some(Token::Literal(target)) => {
                                self.pos += 1;
                                Some(target)
                            }
                            _ => None,
                        };
                        NodeTest::ProcessingInstruction(target)
                    }
                };
                self.expect(&Token::RParen)?;
                Ok(test)
            }
            other => Err(self.error(&format!("expected a node test, found {:?}", other))),
        }
    }

    fn predicates(&mut self) -> Result<Vec<Expr>, XPathError> {
        let mut predicates = Vec::new();
        while self.eat(&Token::LBracket) {
            predicates.push(self.expr()?);
            self.expect(&Token::RBracket)?;
        }
        Ok(predicates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abbreviated_descendant_path() {
        let expr = parse("//div/span").unwrap();
        match expr {
            Expr::Path { absolute, steps } => {
                assert!(absolute);
                assert_eq!(steps.len(), 3);
                assert_eq!(steps[0].axis, Axis::DescendantOrSelf);
                assert_eq!(steps[1].test, NodeTest::Name("div".to_string()));
                assert_eq!(steps[2].test, NodeTest::Name("span".to_string()));
            }
            other => panic!("unexpected expression: {:?}", other),
        }
    }

    #[test]
    fn test_explicit_axis_with_predicates() {
        let expr = parse("descendant::*[@id = 'main'][1]").unwrap();
        let Expr::Path { absolute, steps } = expr else {
            panic!("expected a path");
        };
        assert!(!absolute);
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].axis, Axis::Descendant);
        assert_eq!(steps[0].test, NodeTest::Wildcard);
        assert_eq!(steps[0].predicates.len(), 2);
        assert_eq!(steps[0].predicates[1], Expr::Number(1.0));
    }

    #[test]
    fn test_operator_precedence() {
        let expr = parse("1 + 2 * 3 = 7 or false()").unwrap();
        let Expr::Binary { op, left, .. } = expr else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Or);
        let Expr::Binary { op, left, .. } = *left else {
            panic!("expected equality");
        };
        assert_eq!(op, BinaryOp::Eq);
        let Expr::Binary { op, right, .. } = *left else {
            panic!("expected addition");
        };
        assert_eq!(op, BinaryOp::Add);
        assert!(matches!(*right, Expr::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn test_filter_expression_with_path() {
        let expr = parse("(//ul)[2]/li").unwrap();
        let Expr::Filter {
            predicates, steps, ..
        } = expr
        else {
            panic!("expected filter");
        };
        assert_eq!(predicates.len(), 1);
        assert_eq!(steps.len(), 1);
    }

    #[test]
    fn test_union_and_root() {
        assert!(matches!(parse("//a | //b").unwrap(), Expr::Union(..)));
        assert_eq!(
            parse("/").unwrap(),
            Expr::Path {
                absolute: true,
                steps: vec![]
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse("").is_err());
        assert!(parse("//").is_err());
        assert!(parse("div[").is_err());
        assert!(parse("namespace::x").is_err());
        assert!(parse("count(1,").is_err());
        assert!(parse("a b").is_err());
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("//p[{}1{}]", "(".repeat(3000), ")".repeat(3000));
        match parse(&deep) {
            Err(XPathError::Syntax { message, .. }) => assert!(message.contains("nested")),
            other => panic!("unexpected {:?}", other),
        }
        assert!(parse(&format!("{}1", "-".repeat(3000))).is_err());
        assert!(parse(&vec!["1"; 3000].join(" + ")).is_err());

        let shallow = format!("//p[{}1{}]", "(".repeat(20), ")".repeat(20));
        assert!(parse(&shallow).is_ok());
        assert!(parse(&vec!["//a"; 50].join(" | ")).is_ok());
    }
}
