//! Selector matching for shadow tree queries.
//!
//! Supports the subset components query with: type (`li`), universal (`*`),
//! id (`#roll`), class (`.history-list`), attribute (`[data-sides]`,
//! `[data-sides="20"]`, `~=`, `^=`, `$=`, `*=`), compound selectors,
//! descendant and child (`>`) combinators, and comma-separated lists.

use thiserror::Error;

use super::dom::{NodeId, ShadowTree};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("Empty selector")]
    Empty,

    #[error("Unexpected '{found}' at position {position} in selector '{selector}'")]
    Unexpected {
        selector: String,
        position: usize,
        found: char,
    },

    #[error("Unexpected end of selector '{0}'")]
    UnexpectedEnd(String),

    #[error("Unsupported selector syntax '{found}' in '{selector}'")]
    Unsupported { selector: String, found: char },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrMatch {
    Exists,
    Equals(String),
    Includes(String),
    Prefix(String),
    Suffix(String),
    Substring(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrSelector {
    name: String,
    matcher: AttrMatch,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrSelector>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

/// `compounds[i]` and `compounds[i + 1]` are joined by `combinators[i]`
#[derive(Debug, Clone, PartialEq, Eq)]
struct Complex {
    compounds: Vec<Compound>,
    combinators: Vec<Combinator>,
}

/// Parsed selector list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    alternatives: Vec<Complex>,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        Parser::new(source).parse()
    }

    /// Whether `node` matches any alternative of the list
    pub fn matches(&self, tree: &ShadowTree, node: NodeId) -> bool {
        self.alternatives.iter().any(|complex| complex.matches(tree, node))
    }
}

impl std::str::FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ============================================================================
// Matching
// ============================================================================

impl Complex {
    fn matches(&self, tree: &ShadowTree, node: NodeId) -> bool {
        self.matches_at(tree, node, self.compounds.len() - 1)
    }

    // Right to left: `compounds[index]` must match `node`
    fn matches_at(&self, tree: &ShadowTree, node: NodeId, index: usize) -> bool {
        if !self.compounds[index].matches(tree, node) {
            return false;
        }
        if index == 0 {
            return true;
        }

        match self.combinators[index - 1] {
            Combinator::Child => tree
                .parent_element(node)
                .map_or(false, |parent| self.matches_at(tree, parent, index - 1)),
            Combinator::Descendant => {
                let mut ancestor = tree.parent_element(node);
                while let Some(current) = ancestor {
                    if self.matches_at(tree, current, index - 1) {
                        return true;
                    }
                    ancestor = tree.parent_element(current);
                }
                false
            }
        }
    }
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none() && self.id.is_none() && self.classes.is_empty() && self.attrs.is_empty()
    }

    fn matches(&self, tree: &ShadowTree, node: NodeId) -> bool {
        let Some(element) = tree.element(node) else {
            return false;
        };

        if let Some(tag) = &self.tag {
            if !element.tag.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if element.id() != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.iter().all(|class| element.has_class(class)) {
            return false;
        }

        self.attrs.iter().all(|attr| {
            let Some(value) = element.attrs.get(&attr.name) else {
                return false;
            };
            match &attr.matcher {
                AttrMatch::Exists => true,
                AttrMatch::Equals(expected) => value == expected,
                AttrMatch::Includes(expected) => value.split_ascii_whitespace().any(|v| v == expected),
                AttrMatch::Prefix(expected) => !expected.is_empty() && value.starts_with(expected.as_str()),
                AttrMatch::Suffix(expected) => !expected.is_empty() && value.ends_with(expected.as_str()),
                AttrMatch::Substring(expected) => !expected.is_empty() && value.contains(expected.as_str()),
            }
        })
    }
}

// ============================================================================
// Parsing
// ============================================================================

struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        self.pos += 1;
        c
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self.peek().map_or(false, char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn unexpected(&self, found: char) -> SelectorError {
        SelectorError::Unexpected {
            selector: self.source.to_string(),
            position: self.pos,
            found,
        }
    }

    fn parse(mut self) -> Result<Selector, SelectorError> {
        self.skip_whitespace();
        if self.peek().is_none() {
            return Err(SelectorError::Empty);
        }

        let mut alternatives = Vec::new();
        loop {
            self.skip_whitespace();
            alternatives.push(self.parse_complex()?);
            match self.peek() {
                None => break,
                Some(',') => {
                    self.bump();
                }
                Some(c) => return Err(self.unexpected(c)),
            }
        }

        Ok(Selector { alternatives })
    }

    fn parse_complex(&mut self) -> Result<Complex, SelectorError> {
        let mut compounds = vec![self.parse_compound()?];
        let mut combinators = Vec::new();

        loop {
            let had_whitespace = self.skip_whitespace();
            match self.peek() {
                None | Some(',') => break,
                Some('>') => {
                    self.bump();
                    self.skip_whitespace();
                    combinators.push(Combinator::Child);
                }
                Some(_) if had_whitespace => combinators.push(Combinator::Descendant),
                Some(c) => return Err(self.unexpected(c)),
            }
            compounds.push(self.parse_compound()?);
        }

        Ok(Complex { compounds, combinators })
    }

    fn parse_compound(&mut self) -> Result<Compound, SelectorError> {
        let mut compound = Compound::default();
        let mut universal = false;

        match self.peek() {
            Some('*') => {
                self.bump();
                universal = true;
            }
            Some(c) if is_ident_char(c) => compound.tag = Some(self.parse_ident()?.to_ascii_lowercase()),
            _ => {}
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.bump();
                    compound.id = Some(self.parse_ident()?);
                }
                Some('.') => {
                    self.bump();
                    compound.classes.push(self.parse_ident()?);
                }
                Some('[') => {
                    self.bump();
                    compound.attrs.push(self.parse_attr()?);
                }
                Some(c @ (':' | '+' | '~' | '|')) => {
                    return Err(SelectorError::Unsupported {
                        selector: self.source.to_string(),
                        found: c,
                    })
                }
                _ => break,
            }
        }

        if compound.is_empty() && !universal {
            return match self.peek() {
                Some(c) => Err(self.unexpected(c)),
                None => Err(SelectorError::UnexpectedEnd(self.source.to_string())),
            };
        }
        Ok(compound)
    }

    fn parse_ident(&mut self) -> Result<String, SelectorError> {
        let start = self.pos;
        while self.peek().map_or(false, is_ident_char) {
            self.pos += 1;
        }
        if self.pos == start {
            return match self.peek() {
                Some(c) => Err(self.unexpected(c)),
                None => Err(SelectorError::UnexpectedEnd(self.source.to_string())),
            };
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn parse_attr(&mut self) -> Result<AttrSelector, SelectorError> {
        self.skip_whitespace();
        let name = self.parse_ident()?.to_ascii_lowercase();
        self.skip_whitespace();

        let operator = match self.bump() {
            Some(']') => {
                return Ok(AttrSelector {
                    name,
                    matcher: AttrMatch::Exists,
                })
            }
            Some('=') => '=',
            Some(op @ ('~' | '^' | '$' | '*')) => {
                match self.bump() {
                    Some('=') => {}
                    Some(c) => {
                        self.pos -= 1;
                        return Err(self.unexpected(c));
                    }
                    None => return Err(SelectorError::UnexpectedEnd(self.source.to_string())),
                }
                op
            }
            Some(c) => {
                self.pos -= 1;
                return Err(self.unexpected(c));
            }
            None => return Err(SelectorError::UnexpectedEnd(self.source.to_string())),
        };

        self.skip_whitespace();
        let value = match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.bump();
                let start = self.pos;
                while self.peek().map_or(false, |c| c != quote) {
                    self.pos += 1;
                }
                if self.peek().is_none() {
                    return Err(SelectorError::UnexpectedEnd(self.source.to_string()));
                }
                let value: String = self.chars[start..self.pos].iter().collect();
                self.bump();
                value
            }
            _ => self.parse_ident()?,
        };

        self.skip_whitespace();
        match self.bump() {
            Some(']') => {}
            Some(c) => {
                self.pos -= 1;
                return Err(self.unexpected(c));
            }
            None => return Err(SelectorError::UnexpectedEnd(self.source.to_string())),
        }

        let matcher = match operator {
            '~' => AttrMatch::Includes(value),
            '^' => AttrMatch::Prefix(value),
            '$' => AttrMatch::Suffix(value),
            '*' => AttrMatch::Substring(value),
            _ => AttrMatch::Equals(value),
        };
        Ok(AttrSelector { name, matcher })
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}
