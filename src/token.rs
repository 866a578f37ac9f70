//! Token adapter.
//!
//! Everything past the lexer sees statements as a tree of [`Node`]s: a
//! category, a normalized text and, for parenthesised groups, children.

use std::ops::Range;

/// Lexical category of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenCategory {
    Keyword,
    Identifier,
    Literal,
    Punctuation,
    Operator,
    /// `%s` or `%(name)s`, before parameter binding
    Placeholder,
    /// Parenthesised sub-tree
    Group,
}

/// One token, or a parenthesised group of tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub category: TokenCategory,
    /// Keywords are upper-cased, identifiers unquoted, literals raw.
    pub text: String,
    /// Byte range in the source text.
    pub span: Range<usize>,
    pub children: Vec<Node>,
}

impl Node {
    pub fn token(category: TokenCategory, text: impl Into<String>, span: Range<usize>) -> Self {
        Self {
            category,
            text: text.into(),
            span,
            children: Vec::new(),
        }
    }

    pub fn group(children: Vec<Node>, span: Range<usize>) -> Self {
        Self {
            category: TokenCategory::Group,
            text: String::new(),
            span,
            children,
        }
    }

    /// True if this is the keyword `kw` (given upper-case).
    pub fn is_keyword(&self, kw: &str) -> bool {
        self.category == TokenCategory::Keyword && self.text == kw
    }

    pub fn is_punct(&self, p: &str) -> bool {
        self.category == TokenCategory::Punctuation && self.text == p
    }

    pub fn is_operator(&self, op: &str) -> bool {
        self.category == TokenCategory::Operator && self.text == op
    }

    pub fn is_group(&self) -> bool {
        self.category == TokenCategory::Group
    }

    /// Keywords that may stand where a literal value is expected.
    pub fn is_value_keyword(&self) -> bool {
        self.category == TokenCategory::Keyword
            && matches!(self.text.as_str(), "NONE" | "NULL" | "TRUE" | "FALSE")
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.category {
            TokenCategory::Group => {
                write!(f, "(")?;
                for (i, child) in self.children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", child)?;
                }
                write!(f, ")")
            }
            _ => write!(f, "{}", self.text),
        }
    }
}
