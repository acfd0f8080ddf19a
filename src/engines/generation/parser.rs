//! Restricted formula language for trading signals.
//!
//! ```text
//! formula  := clause ( CONNECTIVE clause )*     one connective kind per formula
//! clause   := operand CMP operand | "(" formula ")"
//! operand  := NAME "(" args ")" | variable | number
//! args     := arg ( "," arg )*
//! arg      := number | key "=" number
//! ```
//!
//! `CONNECTIVE` is `AND` or `OR` (case-insensitive), `CMP` one of
//! `>= <= == != > < =`. This is not a general expression language: there is
//! no precedence between connectives and no arithmetic.

use crate::config::ParserConfig;
use crate::engines::generation::ast::{Comparator, Node, Operator, Variable};
use crate::error::{Result, TradegeneError};
use crate::functions::indicators::{self, Params};
use serde::{Deserialize, Serialize};

/// How to treat text the grammar does not cover
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    /// Unparseable operands become `close`, clauses without a comparator
    /// become their bare operand, mixed connectives split on `AND`.
    #[default]
    Lenient,
    /// Anything outside the grammar is an error.
    Strict,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FormulaParser {
    mode: ParseMode,
}

impl FormulaParser {
    pub fn new(mode: ParseMode) -> Self {
        Self { mode }
    }

    pub fn from_config(config: &ParserConfig) -> Self {
        Self::new(config.mode)
    }

    pub fn lenient() -> Self {
        Self::new(ParseMode::Lenient)
    }

    pub fn strict() -> Self {
        Self::new(ParseMode::Strict)
    }

    pub fn mode(&self) -> ParseMode {
        self.mode
    }

    pub fn parse(&self, formula: &str) -> Result<Node> {
        let text = strip_outer_parens(formula.trim());
        if text.is_empty() {
            return self.fallback(formula, "empty formula");
        }

        let and_parts = split_keyword(text, "AND");
        let or_parts = split_keyword(text, "OR");

        let (connective, clauses) = match (and_parts.len() > 1, or_parts.len() > 1) {
            (true, true) => {
                if self.mode == ParseMode::Strict {
                    return Err(TradegeneError::Parse(format!(
                        "mixed AND/OR connectives in '{}'",
                        formula
                    )));
                }
                (Some(Operator::And), and_parts)
            }
            (true, false) => (Some(Operator::And), and_parts),
            (false, true) => (Some(Operator::Or), or_parts),
            (false, false) => (None, vec![text]),
        };

        let mut nodes = clauses
            .into_iter()
            .map(|clause| self.parse_clause(clause))
            .collect::<Result<Vec<_>>>()?
            .into_iter();

        let first = match nodes.next() {
            Some(node) => node,
            None => return self.fallback(formula, "no clauses"),
        };

        Ok(nodes.fold(first, |acc, node| match connective {
            Some(Operator::Or) => Node::or(acc, node),
            _ => Node::and(acc, node),
        }))
    }

    fn parse_clause(&self, clause: &str) -> Result<Node> {
        let trimmed = clause.trim();
        let inner = strip_outer_parens(trimmed);
        if inner.len() != trimmed.len() {
            return self.parse(inner);
        }
        // Lenient split of a mixed formula leaves OR inside AND clauses
        if split_keyword(inner, "OR").len() > 1 {
            return self.parse(inner);
        }

        if inner.is_empty() {
            return self.fallback(clause, "empty clause");
        }

        match find_comparator(inner) {
            Some((pos, len, cmp)) => {
                let left = self.parse_operand(&inner[..pos])?;
                let right = self.parse_operand(&inner[pos + len..])?;
                Ok(Node::compare(cmp, left, right))
            }
            None if self.mode == ParseMode::Strict => Err(TradegeneError::Parse(format!(
                "clause '{}' has no comparator",
                clause
            ))),
            None => self.parse_operand(inner),
        }
    }

    fn parse_operand(&self, text: &str) -> Result<Node> {
        let text = strip_outer_parens(text.trim());
        if text.is_empty() {
            return self.fallback(text, "empty operand");
        }

        if let Ok(value) = text.parse::<f64>() {
            if value.is_finite() {
                return Ok(Node::constant(value));
            }
        }

        if let Ok(var) = text.parse::<Variable>() {
            return Ok(Node::variable(var));
        }

        if let Some((name, args)) = split_call(text) {
            return self.parse_indicator(text, name, args);
        }

        self.fallback(text, "unrecognised operand")
    }

    fn parse_indicator(&self, text: &str, name: &str, args: &str) -> Result<Node> {
        let Some(indicator) = indicators::lookup(name) else {
            return self.fallback(text, "unknown indicator");
        };

        let specs = indicator.params();
        let mut params = Params::new();
        let args = args.trim();
        if !args.is_empty() {
            for (i, arg) in args.split(',').enumerate() {
                let arg = arg.trim();
                let (key, raw) = match arg.split_once('=') {
                    Some((k, v)) => (k.trim().to_ascii_lowercase(), v.trim()),
                    None => match specs.get(i) {
                        Some(spec) => (spec.name.to_string(), arg),
                        None => {
                            if self.mode == ParseMode::Strict {
                                return Err(TradegeneError::Parse(format!(
                                    "{} takes {} arguments, got extra '{}'",
                                    indicator.alias(),
                                    specs.len(),
                                    arg
                                )));
                            }
                            log::debug!("Ignoring extra argument '{}' to {}", arg, indicator.alias());
                            continue;
                        }
                    },
                };

                match raw.parse::<f64>() {
                    Ok(v) if v.is_finite() => {
                        params.insert(key, v);
                    }
                    _ if self.mode == ParseMode::Strict => {
                        return Err(TradegeneError::Parse(format!(
                            "argument '{}' to {} is not a number",
                            arg,
                            indicator.alias()
                        )));
                    }
                    _ => log::debug!("Ignoring non-numeric argument '{}' to {}", arg, indicator.alias()),
                }
            }
        }

        for spec in specs {
            params.entry(spec.name.to_string()).or_insert(spec.default);
        }

        Node::indicator(indicator.alias(), params)
    }

    fn fallback(&self, text: &str, reason: &str) -> Result<Node> {
        match self.mode {
            ParseMode::Strict => Err(TradegeneError::Parse(format!("{}: '{}'", reason, text))),
            ParseMode::Lenient => {
                log::debug!("{} '{}', falling back to close", reason, text);
                Ok(Node::variable(Variable::Close))
            }
        }
    }
}

/// Parse with the default (lenient) parser.
pub fn parse_formula(formula: &str) -> Result<Node> {
    FormulaParser::lenient().parse(formula)
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Split on a keyword at parenthesis depth 0, respecting word boundaries.
fn split_keyword<'a>(text: &'a str, keyword: &str) -> Vec<&'a str> {
    let bytes = text.as_bytes();
    let kw = keyword.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'(' => depth += 1,
            b')' => depth -= 1,
            _ => {}
        }

        let fits = i + kw.len() <= bytes.len();
        if depth == 0
            && fits
            && bytes[i..i + kw.len()].eq_ignore_ascii_case(kw)
            && (i == 0 || !is_ident_byte(bytes[i - 1]))
            && (i + kw.len() == bytes.len() || !is_ident_byte(bytes[i + kw.len()]))
        {
            parts.push(&text[start..i]);
            i += kw.len();
            start = i;
            continue;
        }
        i += 1;
    }

    parts.push(&text[start..]);
    parts
}

/// First comparator at depth 0: (byte offset, byte length, comparator).
fn find_comparator(text: &str) -> Option<(usize, usize, Comparator)> {
    let mut depth = 0i32;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            _ if depth != 0 => {}
            '≥' => return Some((i, c.len_utf8(), Comparator::Ge)),
            '≤' => return Some((i, c.len_utf8(), Comparator::Le)),
            '≠' => return Some((i, c.len_utf8(), Comparator::Ne)),
            '>' | '<' | '=' | '!' => {
                let next = chars.peek().map(|(_, n)| *n);
                let two = match (c, next) {
                    ('>', Some('=')) => Some(Comparator::Ge),
                    ('<', Some('=')) => Some(Comparator::Le),
                    ('=', Some('=')) => Some(Comparator::Eq),
                    ('!', Some('=')) => Some(Comparator::Ne),
                    ('<', Some('>')) => Some(Comparator::Ne),
                    _ => None,
                };
                if let Some(cmp) = two {
                    return Some((i, 2, cmp));
                }
                match c {
                    '>' => return Some((i, 1, Comparator::Gt)),
                    '<' => return Some((i, 1, Comparator::Lt)),
                    '=' => return Some((i, 1, Comparator::Eq)),
                    _ => {}
                }
            }
            _ => {}
        }
    }
    None
}

/// `NAME(args)` → (NAME, args)
fn split_call(text: &str) -> Option<(&str, &str)> {
    let open = text.find('(')?;
    if !text.ends_with(')') {
        return None;
    }
    let name = text[..open].trim();
    let valid = !name.is_empty()
        && name.bytes().all(is_ident_byte)
        && !name.as_bytes()[0].is_ascii_digit();
    if !valid {
        return None;
    }
    let args = &text[open + 1..text.len() - 1];
    if args.contains('(') || args.contains(')') {
        return None;
    }
    Some((name, args))
}

/// Remove parentheses that wrap the whole text, repeatedly.
fn strip_outer_parens(text: &str) -> &str {
    let mut current = text.trim();
    while current.starts_with('(') && current.ends_with(')') && wraps_whole(current) {
        current = current[1..current.len() - 1].trim();
    }
    current
}

fn wraps_whole(text: &str) -> bool {
    let mut depth = 0i32;
    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 && i != text.len() - 1 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_keyword_respects_words_and_parens() {
        assert_eq!(split_keyword("a > 1 AND b < 2", "AND"), vec!["a > 1 ", " b < 2"]);
        assert_eq!(split_keyword("BAND > 1", "AND"), vec!["BAND > 1"]);
        assert_eq!(split_keyword("(a AND b) or c", "OR"), vec!["(a AND b) ", " c"]);
        assert_eq!(split_keyword("(a AND b)", "AND"), vec!["(a AND b)"]);
    }

    #[test]
    fn test_find_comparator_prefers_two_char_ops() {
        assert_eq!(find_comparator("a >= b").map(|(p, l, c)| (p, l, c)), Some((2, 2, Comparator::Ge)));
        assert_eq!(find_comparator("a = b").map(|(_, _, c)| c), Some(Comparator::Eq));
        assert_eq!(find_comparator("a ≠ b").map(|(_, l, c)| (l, c)), Some((3, Comparator::Ne)));
        assert!(find_comparator("RSI(14)").is_none());
    }

    #[test]
    fn test_strip_outer_parens() {
        assert_eq!(strip_outer_parens("((a > b))"), "a > b");
        assert_eq!(strip_outer_parens("(a) > (b)"), "(a) > (b)");
    }

    #[test]
    fn test_split_call() {
        assert_eq!(split_call("RSI(14)"), Some(("RSI", "14")));
        assert_eq!(split_call("MACD(fast=12, slow=26)"), Some(("MACD", "fast=12, slow=26")));
        assert_eq!(split_call("14(3)"), None);
    }
}
