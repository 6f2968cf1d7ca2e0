//! CSS selector subset used by page queries.
//!
//! Supported: type selectors, `*`, `.class`, `#id`, attribute selectors (`[a]`, `[a=v]`,
//! `[a~=v]`, `[a|=v]`, `[a^=v]`, `[a$=v]`, `[a*=v]`), the descendant (` `) and child (`>`)
//! combinators, and comma-separated selector lists. Pseudo-classes are rejected rather than
//! silently ignored.

use crate::Element;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid selector `{selector}`: {message}")]
pub struct SelectorError {
    pub selector: String,
    pub message: String,
}

/// A parsed, comma-separated selector list.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectorList(Vec<ComplexSelector>);

#[derive(Debug, Clone, PartialEq)]
struct ComplexSelector {
    /// Left to right; `combinators[i]` joins `compounds[i]` and `compounds[i + 1]`.
    compounds: Vec<CompoundSelector>,
    combinators: Vec<Combinator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct CompoundSelector {
    tag: Option<String>,
    ids: Vec<String>,
    classes: Vec<String>,
    attributes: Vec<AttributeSelector>,
}

#[derive(Debug, Clone, PartialEq)]
struct AttributeSelector {
    name: String,
    matcher: Option<(AttributeOp, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttributeOp {
    Equals,
    Includes,
    DashMatch,
    Prefix,
    Suffix,
    Substring,
}

impl FromStr for SelectorList {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Parser::new(s).parse_list()
    }
}

impl SelectorList {
    pub fn matches(&self, el: &Element) -> bool {
        self.0.iter().any(|c| c.matches(el))
    }
}

impl ComplexSelector {
    fn matches(&self, el: &Element) -> bool {
        self.matches_at(self.compounds.len() - 1, el)
    }

    fn matches_at(&self, idx: usize, el: &Element) -> bool {
        if !self.compounds[idx].matches(el) {
            return false;
        }
        if idx == 0 {
            return true;
        }
        match self.combinators[idx - 1] {
            Combinator::Child => el
                .parent_element()
                .is_some_and(|p| self.matches_at(idx - 1, &p)),
            Combinator::Descendant => {
                let mut cur = el.parent_element();
                while let Some(ancestor) = cur {
                    if self.matches_at(idx - 1, &ancestor) {
                        return true;
                    }
                    cur = ancestor.parent_element();
                }
                false
            }
        }
    }
}

impl CompoundSelector {
    fn matches(&self, el: &Element) -> bool {
        if let Some(tag) = &self.tag {
            if !el.tag_name().eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if !self.ids.is_empty() {
            let id = el.id();
            if !self.ids.iter().all(|want| id.as_deref() == Some(want.as_str())) {
                return false;
            }
        }
        self.classes.iter().all(|c| el.has_class(c))
            && self.attributes.iter().all(|a| a.matches(el))
    }
}

impl AttributeSelector {
    fn matches(&self, el: &Element) -> bool {
        let Some(value) = el.attribute(&self.name) else {
            return false;
        };
        let Some((op, want)) = &self.matcher else {
            return true;
        };
        let want = want.as_str();
        match op {
            AttributeOp::Equals => value == want,
            AttributeOp::Includes => {
                !want.is_empty() && value.split_ascii_whitespace().any(|v| v == want)
            }
            AttributeOp::DashMatch => {
                value == want
                    || value
                        .strip_prefix(want)
                        .is_some_and(|rest| rest.starts_with('-'))
            }
            AttributeOp::Prefix => !want.is_empty() && value.starts_with(want),
            AttributeOp::Suffix => !want.is_empty() && value.ends_with(want),
            AttributeOp::Substring => !want.is_empty() && value.contains(want),
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '-' || !c.is_ascii()
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-' || !c.is_ascii()
}

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

    fn error(&self, message: impl Into<String>) -> SelectorError {
        SelectorError {
            selector: self.source.to_string(),
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn parse_list(mut self) -> Result<SelectorList, SelectorError> {
        let mut list = Vec::new();
        loop {
            self.skip_ws();
            list.push(self.parse_complex()?);
            self.skip_ws();
            match self.peek() {
                None => break,
                Some(',') => self.pos += 1,
                Some(c) => return Err(self.error(format!("unexpected `{c}`"))),
            }
        }
        Ok(SelectorList(list))
    }

    fn parse_complex(&mut self) -> Result<ComplexSelector, SelectorError> {
        let mut compounds = vec![self.parse_compound()?];
        let mut combinators = Vec::new();
        loop {
            let had_ws = self.skip_ws();
            match self.peek() {
                None | Some(',') => break,
                Some('>') => {
                    self.pos += 1;
                    self.skip_ws();
                    combinators.push(Combinator::Child);
                }
                Some(_) if had_ws => combinators.push(Combinator::Descendant),
                Some(c) => return Err(self.error(format!("unexpected `{c}`"))),
            }
            compounds.push(self.parse_compound()?);
        }
        Ok(ComplexSelector {
            compounds,
            combinators,
        })
    }

    fn parse_compound(&mut self) -> Result<CompoundSelector, SelectorError> {
        let mut compound = CompoundSelector::default();
        let mut empty = true;

        match self.peek() {
            Some('*') => {
                self.pos += 1;
                empty = false;
            }
            Some(c) if is_ident_start(c) => {
                compound.tag = Some(self.ident()?.to_ascii_lowercase());
                empty = false;
            }
            _ => {}
        }

        loop {
            match self.peek() {
                Some('.') => {
                    self.pos += 1;
                    compound.classes.push(self.ident()?);
                }
                Some('#') => {
                    self.pos += 1;
                    compound.ids.push(self.ident()?);
                }
                Some('[') => {
                    self.pos += 1;
                    compound.attributes.push(self.attribute()?);
                }
                Some(':') => return Err(self.error("pseudo-classes are not supported")),
                _ => break,
            }
            empty = false;
        }

        if empty {
            return Err(match self.peek() {
                Some(c) => self.error(format!("expected a selector, found `{c}`")),
                None => self.error("expected a selector"),
            });
        }
        Ok(compound)
    }

    fn ident(&mut self) -> Result<String, SelectorError> {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error("expected an identifier"));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn attribute(&mut self) -> Result<AttributeSelector, SelectorError> {
        self.skip_ws();
        let name = self.ident()?.to_ascii_lowercase();
        self.skip_ws();

        let op = match self.peek() {
            Some(']') => {
                self.pos += 1;
                return Ok(AttributeSelector {
                    name,
                    matcher: None,
                });
            }
            Some('=') => {
                self.pos += 1;
                AttributeOp::Equals
            }
            Some(c @ ('~' | '|' | '^' | '$' | '*')) => {
                self.pos += 1;
                if self.peek() != Some('=') {
                    return Err(self.error(format!("expected `=` after `{c}`")));
                }
                self.pos += 1;
                match c {
                    '~' => AttributeOp::Includes,
                    '|' => AttributeOp::DashMatch,
                    '^' => AttributeOp::Prefix,
                    '$' => AttributeOp::Suffix,
                    _ => AttributeOp::Substring,
                }
            }
            _ => return Err(self.error("malformed attribute selector")),
        };

        self.skip_ws();
        let value = match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                let start = self.pos;
                while self.peek().is_some_and(|c| c != quote) {
                    self.pos += 1;
                }
                if self.peek().is_none() {
                    return Err(self.error("unterminated string in attribute selector"));
                }
                let value: String = self.chars[start..self.pos].iter().collect();
                self.pos += 1;
                value
            }
            _ => self.ident()?,
        };

        self.skip_ws();
        if self.peek() != Some(']') {
            return Err(self.error("expected `]`"));
        }
        self.pos += 1;

        Ok(AttributeSelector {
            name,
            matcher: Some((op, value)),
        })
    }
}
