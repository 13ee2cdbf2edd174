//! CSS selector parser
//!
//! Parses Selectors Level 3 (plus `:is`, `:where`, `:has`, `:contains` and
//! the `!=` attribute operator) into a small tree that the translator turns
//! into XPath. Element and attribute names are lowercased while parsing.

use super::CssError;

/// A comma-separated selector group.
pub type SelectorList = Vec<ComplexSelector>;

/// Compound selectors joined by combinators: `div > p.note + a`
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexSelector {
    pub first: CompoundSelector,
    pub rest: Vec<(Combinator, CompoundSelector)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    /// whitespace
    Descendant,
    /// `>`
    Child,
    /// `+`
    NextSibling,
    /// `~`
    SubsequentSibling,
}

/// A type selector (or `*`) followed by simple selectors: `a.ext[href]`
#[derive(Debug, Clone, PartialEq)]
pub struct CompoundSelector {
    /// Lowercased element name; `None` for `*` or an omitted type
    pub element: Option<String>,
    pub components: Vec<SelectorComponent>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectorComponent {
    /// ID selector #id
    Id(String),
    /// Class selector .class
    Class(String),
    /// Attribute selector [attr], [attr=value], etc.
    Attribute(AttributeSelector),
    /// Pseudo-class :first-child, :nth-child(), etc.
    PseudoClass(PseudoClass),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSelector {
    pub name: String,
    pub matcher: Option<AttributeMatcher>,
    pub case_insensitive: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeMatcher {
    /// [attr=value]
    Exact(String),
    /// [attr~=value], whitespace-separated list contains
    Includes(String),
    /// [attr|=value], exact or prefix with hyphen
    DashMatch(String),
    /// [attr^=value]
    Prefix(String),
    /// [attr$=value]
    Suffix(String),
    /// [attr*=value]
    Substring(String),
    /// [attr!=value], missing or different
    NotEqual(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PseudoClass {
    FirstChild,
    LastChild,
    OnlyChild,
    FirstOfType,
    LastOfType,
    OnlyOfType,
    NthChild(NthExpression),
    NthLastChild(NthExpression),
    NthOfType(NthExpression),
    NthLastOfType(NthExpression),
    Empty,
    Root,
    Link,
    Checked,
    Enabled,
    Disabled,
    /// Pseudo-classes that depend on user interaction; a static document
    /// never matches them
    Interactive(String),
    Not(Vec<CompoundSelector>),
    /// `:is()`, `:where()` and `:matches()`
    Is(Vec<CompoundSelector>),
    Has(Vec<RelativeSelector>),
    Contains(String),
    Lang(String),
}

const INTERACTIVE: &[&str] = &[
    "hover",
    "active",
    "focus",
    "focus-within",
    "focus-visible",
    "visited",
    "target",
];

const LEGACY_PSEUDO_ELEMENTS: &[&str] = &["before", "after", "first-line", "first-letter"];

/// How many functional pseudo-classes may enclose each other.
const MAX_NESTING: usize = 32;

/// Argument of `:has()`: a complex selector anchored at the subject.
#[derive(Debug, Clone, PartialEq)]
pub struct RelativeSelector {
    pub combinator: Combinator,
    pub selector: ComplexSelector,
}

/// An+B expression for :nth-* selectors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NthExpression {
    /// Coefficient (A in An+B)
    pub a: i32,
    /// Offset (B in An+B)
    pub b: i32,
}

impl NthExpression {
    pub fn odd() -> Self {
        Self { a: 2, b: 1 }
    }

    pub fn even() -> Self {
        Self { a: 2, b: 0 }
    }

    /// Parse from "2n+1", "odd", "even", "-n+3", "3"
    ///
    /// Whitespace is allowed at either end and around the sign joining
    /// the `An` and `B` terms, nowhere else.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_ascii_lowercase();

        match s.as_str() {
            "odd" => return Some(Self::odd()),
            "even" => return Some(Self::even()),
            _ => {}
        }

        if let Some(b) = integer(&s) {
            return Some(Self { a: 0, b });
        }

        let n_pos = s.find('n')?;
        let a = match &s[..n_pos] {
            "" | "+" => 1,
            "-" => -1,
            digits => integer(digits)?,
        };
        let rest = s[n_pos + 1..].trim_start();
        if rest.is_empty() {
            return Some(Self { a, b: 0 });
        }
        let (negative, digits) = if let Some(digits) = rest.strip_prefix('+') {
            (false, digits.trim_start())
        } else if let Some(digits) = rest.strip_prefix('-') {
            (true, digits.trim_start())
        } else {
            return None;
        };
        if digits.is_empty() || !digits.bytes().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let magnitude: i64 = digits.parse().ok()?;
        let b = i32::try_from(if negative { -magnitude } else { magnitude }).ok()?;
        Some(Self { a, b })
    }
}

/// Optionally signed decimal integer with no inner whitespace.
fn integer(s: &str) -> Option<i32> {
    let digits = s.strip_prefix(['+', '-']).unwrap_or(s);
    if digits.is_empty() || !digits.bytes().all(|c| c.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Parse a full selector group.
pub fn parse(input: &str) -> Result<SelectorList, CssError> {
    let mut parser = Parser {
        chars: input.chars().collect(),
        pos: 0,
        depth: 0,
    };
    parser.skip_whitespace();
    if parser.at_end() {
        return Err(parser.error("empty selector"));
    }
    let list = parser.selector_list()?;
    if let Some(c) = parser.peek() {
        return Err(parser.error(&format!("unexpected character '{}'", c)));
    }
    Ok(list)
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> Result<(), CssError> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", c)))
        }
    }

    /// Returns whether any whitespace was consumed.
    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn error(&self, message: &str) -> CssError {
        CssError::Syntax {
            message: message.to_string(),
            position: self.pos,
        }
    }

    fn selector_list(&mut self) -> Result<SelectorList, CssError> {
        let mut list = vec![self.complex()?];
        loop {
            self.skip_whitespace();
            if !self.eat(',') {
                return Ok(list);
            }
            self.skip_whitespace();
            list.push(self.complex()?);
        }
    }

    fn complex(&mut self) -> Result<ComplexSelector, CssError> {
        let first = self.compound()?;
        let mut rest = Vec::new();
        while let Some(combinator) = self.combinator()? {
            rest.push((combinator, self.compound()?));
        }
        Ok(ComplexSelector { first, rest })
    }

    /// Consume a combinator if one follows; stops before `,` and `)`.
    fn combinator(&mut self) -> Result<Option<Combinator>, CssError> {
        let start = self.pos;
        let spaced = self.skip_whitespace();
        let combinator = match self.peek() {
            Some('>') => Combinator::Child,
            Some('+') => Combinator::NextSibling,
            Some('~') => Combinator::SubsequentSibling,
            None | Some(',') | Some(')') => {
                self.pos = start;
                return Ok(None);
            }
            Some(_) if spaced => return Ok(Some(Combinator::Descendant)),
            Some(c) => return Err(self.error(&format!("unexpected character '{}'", c))),
        };
        self.pos += 1;
        self.skip_whitespace();
        Ok(Some(combinator))
    }

    fn compound(&mut self) -> Result<CompoundSelector, CssError> {
        let start = self.pos;
        let element = if self.eat('*') {
            None
        } else if self.at_ident_start() {
            Some(self.ident()?.to_ascii_lowercase())
        } else {
            None
        };
        if self.peek() == Some('|') {
            return Err(CssError::Unsupported(
                "namespace prefixes are not supported".to_string(),
            ));
        }

        let mut components = Vec::new();
        loop {
            let component = match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    SelectorComponent::Id(self.ident()?)
                }
                Some('.') => {
                    self.pos += 1;
                    SelectorComponent::Class(self.ident()?)
                }
                Some('[') => {
                    self.pos += 1;
                    SelectorComponent::Attribute(self.attribute()?)
                }
                Some(':') => {
                    self.pos += 1;
                    SelectorComponent::PseudoClass(self.pseudo_class()?)
                }
                _ => break,
            };
            components.push(component);
        }

        if self.pos == start {
            return Err(match self.peek() {
                Some(c) => self.error(&format!("expected a selector, found '{}'", c)),
                None => self.error("expected a selector"),
            });
        }
        Ok(CompoundSelector {
            element,
            components,
        })
    }

    fn attribute(&mut self) -> Result<AttributeSelector, CssError> {
        self.skip_whitespace();
        let name = self.ident()?.to_ascii_lowercase();
        if self.peek() == Some('|') && self.peek_at(1) != Some('=') {
            return Err(CssError::Unsupported(
                "namespace prefixes are not supported".to_string(),
            ));
        }
        self.skip_whitespace();
        if self.eat(']') {
            return Ok(AttributeSelector {
                name,
                matcher: None,
                case_insensitive: false,
            });
        }

        let op = match (self.peek(), self.peek_at(1)) {
            (Some('='), _) => {
                self.pos += 1;
                '='
            }
            (Some(c @ ('~' | '|' | '^' | '$' | '*' | '!')), Some('=')) => {
                self.pos += 2;
                c
            }
            _ => return Err(self.error("expected an attribute operator")),
        };
        self.skip_whitespace();
        let value = match self.peek() {
            Some(q @ ('"' | '\'')) => self.string(q)?,
            _ => self.ident()?,
        };
        self.skip_whitespace();
        let case_insensitive = match self.peek() {
            Some('i' | 'I') => {
                self.pos += 1;
                true
            }
            Some('s' | 'S') => {
                self.pos += 1;
                false
            }
            _ => false,
        };
        self.skip_whitespace();
        self.expect(']')?;

        let matcher = match op {
            '=' => AttributeMatcher::Exact(value),
            '~' => AttributeMatcher::Includes(value),
            '|' => AttributeMatcher::DashMatch(value),
            '^' => AttributeMatcher::Prefix(value),
            '$' => AttributeMatcher::Suffix(value),
            '*' => AttributeMatcher::Substring(value),
            _ => AttributeMatcher::NotEqual(value),
        };
        Ok(AttributeSelector {
            name,
            matcher: Some(matcher),
            case_insensitive,
        })
    }

    fn pseudo_class(&mut self) -> Result<PseudoClass, CssError> {
        if self.peek() == Some(':') {
            self.pos += 1;
            let name = self.ident()?;
            return Err(CssError::Unsupported(format!(
                "pseudo-elements are not supported: ::{}",
                name
            )));
        }
        let name = self.ident()?.to_ascii_lowercase();

        if !self.eat('(') {
            if LEGACY_PSEUDO_ELEMENTS.contains(&name.as_str()) {
                return Err(CssError::Unsupported(format!(
                    "pseudo-elements are not supported: :{}",
                    name
                )));
            }
            if INTERACTIVE.contains(&name.as_str()) {
                return Ok(PseudoClass::Interactive(name));
            }
            return Ok(match name.as_str() {
                "first-child" => PseudoClass::FirstChild,
                "last-child" => PseudoClass::LastChild,
                "only-child" => PseudoClass::OnlyChild,
                "first-of-type" => PseudoClass::FirstOfType,
                "last-of-type" => PseudoClass::LastOfType,
                "only-of-type" => PseudoClass::OnlyOfType,
                "empty" => PseudoClass::Empty,
                "root" => PseudoClass::Root,
                "link" | "any-link" => PseudoClass::Link,
                "checked" => PseudoClass::Checked,
                "enabled" => PseudoClass::Enabled,
                "disabled" => PseudoClass::Disabled,
                _ => return Err(unknown_pseudo_class(&name)),
            });
        }

        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.error(&format!(
                "pseudo-classes nested more than {} levels deep",
                MAX_NESTING
            )));
        }
        self.skip_whitespace();
        let pseudo = match name.as_str() {
            "nth-child" => PseudoClass::NthChild(self.nth()?),
            "nth-last-child" => PseudoClass::NthLastChild(self.nth()?),
            "nth-of-type" => PseudoClass::NthOfType(self.nth()?),
            "nth-last-of-type" => PseudoClass::NthLastOfType(self.nth()?),
            "not" => PseudoClass::Not(self.compound_list(&name)?),
            "is" | "where" | "matches" => PseudoClass::Is(self.compound_list(&name)?),
            "has" => PseudoClass::Has(self.relative_list()?),
            "contains" => PseudoClass::Contains(self.string_or_ident()?),
            "lang" => PseudoClass::Lang(self.string_or_ident()?),
            _ => return Err(unknown_pseudo_class(&name)),
        };
        self.skip_whitespace();
        self.expect(')')?;
        self.depth -= 1;
        Ok(pseudo)
    }

    fn nth(&mut self) -> Result<NthExpression, CssError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c != ')') {
            self.pos += 1;
        }
        let raw: String = self.chars[start..self.pos].iter().collect();
        NthExpression::parse(&raw).ok_or_else(|| CssError::Syntax {
            message: format!("invalid An+B expression '{}'", raw.trim()),
            position: start,
        })
    }

    fn compound_list(&mut self, pseudo: &str) -> Result<Vec<CompoundSelector>, CssError> {
        let mut list = Vec::new();
        loop {
            list.push(self.compound()?);
            self.skip_whitespace();
            match self.peek() {
                Some(',') => {
                    self.pos += 1;
                    self.skip_whitespace();
                }
                Some(')') => return Ok(list),
                _ => {
                    return Err(CssError::Unsupported(format!(
                        "only compound selectors are supported inside :{}()",
                        pseudo
                    )))
                }
            }
        }
    }

    fn relative_list(&mut self) -> Result<Vec<RelativeSelector>, CssError> {
        let mut list = Vec::new();
        loop {
            let combinator = match self.peek() {
                Some('>') => Combinator::Child,
                Some('+') => Combinator::NextSibling,
                Some('~') => Combinator::SubsequentSibling,
                _ => Combinator::Descendant,
            };
            if combinator != Combinator::Descendant {
                self.pos += 1;
                self.skip_whitespace();
            }
            list.push(RelativeSelector {
                combinator,
                selector: self.complex()?,
            });
            self.skip_whitespace();
            if !self.eat(',') {
                return Ok(list);
            }
            self.skip_whitespace();
        }
    }

    fn string_or_ident(&mut self) -> Result<String, CssError> {
        match self.peek() {
            Some(q @ ('"' | '\'')) => self.string(q),
            _ => self.ident(),
        }
    }

    fn at_ident_start(&self) -> bool {
        match self.peek() {
            Some('-') => self
                .peek_at(1)
                .is_some_and(|c| is_ident_start(c) || c == '-' || c == '\\'),
            Some('\\') => true,
            Some(c) => is_ident_start(c),
            None => false,
        }
    }

    fn ident(&mut self) -> Result<String, CssError> {
        if !self.at_ident_start() {
            return Err(match self.peek() {
                Some(c) => self.error(&format!("expected an identifier, found '{}'", c)),
                None => self.error("expected an identifier"),
            });
        }
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c == '\\' {
                self.pos += 1;
                out.push(self.escape()?);
            } else if is_ident_char(c) {
                self.pos += 1;
                out.push(c);
            } else {
                break;
            }
        }
        Ok(out)
    }

    /// Escape body after the backslash: up to six hex digits or one literal
    /// character.
    fn escape(&mut self) -> Result<char, CssError> {
        let start = self.pos;
        while self.pos - start < 6 && self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
            self.pos += 1;
        }
        if self.pos > start {
            let hex: String = self.chars[start..self.pos].iter().collect();
            // one whitespace terminates a hex escape
            if self.peek().is_some_and(char::is_whitespace) {
                self.pos += 1;
            }
            return Ok(u32::from_str_radix(&hex, 16)
                .ok()
                .and_then(char::from_u32)
                .unwrap_or(char::REPLACEMENT_CHARACTER));
        }
        match self.peek() {
            Some(c) => {
                self.pos += 1;
                Ok(c)
            }
            None => Err(self.error("unterminated escape")),
        }
    }

    fn string(&mut self, quote: char) -> Result<String, CssError> {
        let start = self.pos;
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.peek() {
                None => {
                    return Err(CssError::Syntax {
                        message: "unterminated string".to_string(),
                        position: start,
                    })
                }
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some('\\') => {
                    self.pos += 1;
                    out.push(self.escape()?);
                }
                Some(c) => {
                    self.pos += 1;
                    out.push(c);
                }
            }
        }
    }
}

fn unknown_pseudo_class(name: &str) -> CssError {
    CssError::Unsupported(format!("unknown pseudo-class ':{}'", name))
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || !c.is_ascii()
}

fn is_ident_char(c: char) -> bool {
    is_ident_start(c) || c.is_ascii_digit() || c == '-'
}
