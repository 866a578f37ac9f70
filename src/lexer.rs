//! SQL tokenizer using nom.
//!
//! Turns statement text into the [`Node`] tree consumed by the query model
//! builder. Parenthesised sections become [`TokenCategory::Group`] nodes.
//!
//! ```text
//! SELECT "users"."name" FROM "users" WHERE ("users"."age" > 30)
//! ───┬── ──────┬─────── ──┬─ ───┬─── ──┬── ───────────┬───────
//!    │         │          │     │      │              └── Group
//!    │         │          │     │      └── Keyword
//!    │         │          │     └── Identifier "users"
//!    │         │          └── Keyword
//!    │         └── Identifier "users.name"
//!    └── Keyword
//! ```

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_until, take_while, take_while1},
    character::complete::{char, digit0, digit1, multispace1, not_line_ending, one_of},
    combinator::{opt, recognize, value},
    multi::many0,
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

use crate::error::{FaunaError, FaunaResult};
use crate::token::{Node, TokenCategory};

const KEYWORDS: &[&str] = &[
    "SELECT", "FROM", "WHERE", "INSERT", "INTO", "VALUES", "UPDATE", "SET", "DELETE", "DROP",
    "TABLE", "AND", "OR", "NOT", "JOIN", "INNER", "LEFT", "RIGHT", "FULL", "OUTER", "CROSS", "ON",
    "AS", "ORDER", "BY", "ASC", "DESC", "LIMIT", "OFFSET", "DISTINCT", "IS", "IN", "LIKE", "GROUP",
    "HAVING", "UNION", "IF", "EXISTS", "NONE", "NULL", "TRUE", "FALSE", "CREATE", "ALTER",
    "BEGIN", "COMMIT", "ROLLBACK", "WITH", "CASCADE",
];

/// Tokenize a SQL statement into a flat sequence of top-level nodes.
pub fn tokenize(input: &str) -> FaunaResult<Vec<Node>> {
    let mut stack: Vec<(usize, Vec<Node>)> = Vec::new();
    let mut current: Vec<Node> = Vec::new();
    let mut rest = input;

    loop {
        rest = match ws_or_comment(rest) {
            Ok((remaining, _)) => remaining,
            Err(_) => rest,
        };
        if rest.is_empty() {
            break;
        }
        let start = input.len() - rest.len();

        if let Some(remaining) = rest.strip_prefix('(') {
            stack.push((start, std::mem::take(&mut current)));
            rest = remaining;
            continue;
        }
        if let Some(remaining) = rest.strip_prefix(')') {
            let (open, parent) = stack.pop().ok_or_else(|| {
                FaunaError::syntax(format!("unbalanced ')' at position {}", start))
            })?;
            let children = std::mem::replace(&mut current, parent);
            current.push(Node::group(children, open..start + 1));
            rest = remaining;
            continue;
        }

        let signed = rest.starts_with('-') && !ends_operand(current.last());
        let (remaining, node) = lex_token(rest, start, signed)?;
        current.push(node);
        rest = remaining;
    }

    if let Some((open, _)) = stack.last() {
        return Err(FaunaError::syntax(format!(
            "unbalanced '(' at position {}",
            open
        )));
    }
    Ok(current)
}

/// Whether the previous node can end an operand, making a following `-` binary.
fn ends_operand(prev: Option<&Node>) -> bool {
    match prev {
        Some(node) => matches!(
            node.category,
            TokenCategory::Identifier
                | TokenCategory::Literal
                | TokenCategory::Group
                | TokenCategory::Placeholder
        ) || node.is_value_keyword(),
        None => false,
    }
}

fn lex_token(input: &str, start: usize, signed: bool) -> FaunaResult<(&str, Node)> {
    let end = |rest: &str| input.len() - rest.len() + start;

    if let Ok((rest, text)) = placeholder(input) {
        return Ok((rest, Node::token(TokenCategory::Placeholder, text, start..end(rest))));
    }

    if input.starts_with('\'') {
        return match string_literal(input) {
            Ok((rest, text)) => Ok((rest, Node::token(TokenCategory::Literal, text, start..end(rest)))),
            Err(_) => Err(FaunaError::syntax(format!(
                "unterminated string literal at position {}",
                start
            ))),
        };
    }

    if signed {
        if let Ok((rest, text)) = recognize(preceded(char('-'), number))(input) {
            return Ok((rest, Node::token(TokenCategory::Literal, text, start..end(rest))));
        }
    }
    if let Ok((rest, text)) = number(input) {
        return Ok((rest, Node::token(TokenCategory::Literal, text, start..end(rest))));
    }

    if let Ok((rest, (parts, quoted))) = name(input) {
        let span = start..end(rest);
        if parts.len() == 1 && !quoted {
            let upper = parts[0].to_ascii_uppercase();
            if KEYWORDS.contains(&upper.as_str()) {
                return Ok((rest, Node::token(TokenCategory::Keyword, upper, span)));
            }
        }
        return Ok((rest, Node::token(TokenCategory::Identifier, parts.join("."), span)));
    }

    if let Ok((rest, op)) = operator(input) {
        return Ok((rest, Node::token(TokenCategory::Operator, op, start..end(rest))));
    }

    if let Ok((rest, p)) = punctuation(input) {
        return Ok((rest, Node::token(TokenCategory::Punctuation, p, start..end(rest))));
    }

    let c = input.chars().next().unwrap_or(' ');
    Err(FaunaError::syntax(format!(
        "unexpected character '{}' at position {}",
        c, start
    )))
}

/// Parse whitespace or comments.
fn ws_or_comment(input: &str) -> IResult<&str, ()> {
    value(
        (),
        many0(alt((
            value((), multispace1),
            value((), pair(tag("--"), not_line_ending)),
            value((), tuple((tag("/*"), take_until("*/"), tag("*/")))),
        ))),
    )(input)
}

/// `%s` or `%(name)s`.
fn placeholder(input: &str) -> IResult<&str, &str> {
    alt((
        tag("%s"),
        recognize(tuple((
            tag("%("),
            take_while1(|c: char| c.is_alphanumeric() || c == '_'),
            tag(")s"),
        ))),
    ))(input)
}

/// Single-quoted string, quotes kept. `''` inside stays part of the literal.
fn string_literal(input: &str) -> IResult<&str, &str> {
    recognize(delimited(
        char('\''),
        many0(alt((tag("''"), is_not("'")))),
        char('\''),
    ))(input)
}

/// Unsigned integer or decimal with optional exponent.
fn number(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        digit1,
        opt(pair(char('.'), digit0)),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
    )))(input)
}

fn bare_word(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_' || c == '$'),
    ))(input)
}

fn quoted_ident(input: &str) -> IResult<&str, &str> {
    delimited(char('"'), take_while(|c: char| c != '"'), char('"'))(input)
}

/// A possibly qualified name. Returns the parts and whether the first was quoted.
fn name(input: &str) -> IResult<&str, (Vec<&str>, bool)> {
    let (input, (quoted, first)) = alt((
        nom::combinator::map(quoted_ident, |s| (true, s)),
        nom::combinator::map(bare_word, |s| (false, s)),
    ))(input)?;
    let (input, more) = many0(preceded(char('.'), alt((quoted_ident, bare_word, tag("*")))))(input)?;

    let mut parts = vec![first];
    parts.extend(more);
    Ok((input, (parts, quoted)))
}

fn operator(input: &str) -> IResult<&str, &str> {
    alt((
        tag("<="),
        tag(">="),
        tag("<>"),
        tag("!="),
        tag("||"),
        tag("="),
        tag("<"),
        tag(">"),
        tag("*"),
        tag("+"),
        tag("-"),
        tag("/"),
    ))(input)
}

fn punctuation(input: &str) -> IResult<&str, &str> {
    alt((tag(","), tag(";"), tag(".")))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(nodes: &[Node]) -> Vec<&str> {
        nodes.iter().map(|n| n.text.as_str()).collect()
    }

    #[test]
    fn test_keywords_are_uppercased() {
        let nodes = tokenize("select id from users").unwrap();
        assert_eq!(texts(&nodes), vec!["SELECT", "id", "FROM", "users"]);
        assert_eq!(nodes[0].category, TokenCategory::Keyword);
        assert_eq!(nodes[1].category, TokenCategory::Identifier);
    }

    #[test]
    fn test_quoted_qualified_identifier() {
        let nodes = tokenize(r#"SELECT "users"."name" FROM "users""#).unwrap();
        assert_eq!(nodes[1].category, TokenCategory::Identifier);
        assert_eq!(nodes[1].text, "users.name");
        assert_eq!(nodes[3].text, "users");
    }

    #[test]
    fn test_quoted_keyword_is_identifier() {
        let nodes = tokenize(r#"SELECT "order" FROM t"#).unwrap();
        assert_eq!(nodes[1].category, TokenCategory::Identifier);
        assert_eq!(nodes[1].text, "order");
    }

    #[test]
    fn test_string_literal_keeps_quotes() {
        let nodes = tokenize("WHERE name = 'O''Brien'").unwrap();
        assert_eq!(nodes[3].category, TokenCategory::Literal);
        assert_eq!(nodes[3].text, "'O''Brien'");
    }

    #[test]
    fn test_groups() {
        let nodes = tokenize("VALUES ('Bob', 30), ('Ann', 4)").unwrap();
        assert_eq!(nodes.len(), 4);
        assert!(nodes[1].is_group());
        assert_eq!(texts(&nodes[1].children), vec!["'Bob'", ",", "30"]);
        assert_eq!(nodes[1].span, 7..18);
    }

    #[test]
    fn test_negative_numbers() {
        let nodes = tokenize("WHERE t.x = -5").unwrap();
        assert_eq!(nodes[3].text, "-5");
        assert_eq!(nodes[3].category, TokenCategory::Literal);

        let nodes = tokenize("a - 5").unwrap();
        assert_eq!(texts(&nodes), vec!["a", "-", "5"]);
    }

    #[test]
    fn test_placeholders() {
        let nodes = tokenize("WHERE a = %s AND b = %(name)s").unwrap();
        assert_eq!(nodes[3].category, TokenCategory::Placeholder);
        assert_eq!(nodes[7].text, "%(name)s");
    }

    #[test]
    fn test_comments_skipped() {
        let nodes = tokenize("SELECT a -- trailing\nFROM /* inline */ t").unwrap();
        assert_eq!(texts(&nodes), vec!["SELECT", "a", "FROM", "t"]);
    }

    #[test]
    fn test_qualified_star() {
        let nodes = tokenize("SELECT users.* FROM users").unwrap();
        assert_eq!(nodes[1].text, "users.*");
    }

    #[test]
    fn test_unbalanced_and_unterminated() {
        assert!(tokenize("SELECT (a FROM t").unwrap_err().is_syntax());
        assert!(tokenize("SELECT a) FROM t").unwrap_err().is_syntax());
        assert!(tokenize("WHERE a = 'oops").unwrap_err().is_syntax());
        assert!(tokenize("SELECT a ? b").unwrap_err().is_syntax());
    }
}
