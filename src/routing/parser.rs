//! Reader for the relay config text format.
//!
//! # Responsibilities
//! - Recognise `[name]` sections, `[[endpoints]]` rules and `key = value` lines
//! - Fold `[endpoints.<sub>]` tables into the current rule as dotted keys
//! - Decode quoted strings, string arrays, booleans and integers
//!
//! # Design Decisions
//! - Permissive: unknown bare tokens and non-assignment lines are skipped
//! - Single-line values only; multi-line arrays are not part of the format

use thiserror::Error;

use crate::routing::model::{RoutingConfig, RoutingRule, Value};

/// Header that opens a new routing rule.
pub const RULE_HEADER: &str = "endpoints";

/// A structural error in the config text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {kind}")]
pub struct ParseError {
    pub line: usize,
    pub kind: ParseErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("unterminated string")]
    UnterminatedString,

    #[error("unterminated array")]
    UnterminatedArray,

    #[error("malformed section header `{0}`")]
    MalformedHeader(String),

    #[error("unsupported array of tables `[[{0}]]`")]
    UnsupportedTableArray(String),
}

/// Where `key = value` lines currently land.
enum Cursor {
    Root,
    Section(usize),
    Rule(usize),
    RuleTable(usize, String),
}

/// Parse config text into a [`RoutingConfig`].
pub fn parse(text: &str) -> Result<RoutingConfig, ParseError> {
    let mut config = RoutingConfig::default();
    let mut cursor = Cursor::Root;

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let err = |kind| ParseError { line: line_no, kind };

        let line = strip_comment(raw.trim()).map_err(err)?.trim_end();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix("[[") {
            let name = rest
                .strip_suffix("]]")
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .ok_or_else(|| err(ParseErrorKind::MalformedHeader(line.to_string())))?;
            if name != RULE_HEADER {
                return Err(err(ParseErrorKind::UnsupportedTableArray(name.to_string())));
            }
            config.rules.push(RoutingRule::default());
            cursor = Cursor::Rule(config.rules.len() - 1);
            continue;
        }

        if let Some(rest) = line.strip_prefix('[') {
            let name = rest
                .strip_suffix(']')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .ok_or_else(|| err(ParseErrorKind::MalformedHeader(line.to_string())))?;

            let rule_table = name
                .strip_prefix(RULE_HEADER)
                .and_then(|n| n.strip_prefix('.'))
                .filter(|n| !n.is_empty());
            cursor = match (rule_table, &cursor) {
                (Some(sub), Cursor::Rule(i) | Cursor::RuleTable(i, _)) => {
                    Cursor::RuleTable(*i, sub.to_string())
                }
                _ => Cursor::Section(config.section_index_or_insert(name)),
            };
            continue;
        }

        let Some((key, value_text)) = line.split_once('=') else {
            tracing::debug!(line = line_no, "skipping line without assignment");
            continue;
        };
        let key = key.trim();
        if !is_bare_key(key) {
            tracing::debug!(line = line_no, key, "skipping unsupported key");
            continue;
        }
        let Some(value) = parse_value(value_text.trim()).map_err(err)? else {
            tracing::debug!(line = line_no, key, "dropping unsupported value");
            continue;
        };

        match &cursor {
            Cursor::Root => config.root.insert(key, value),
            Cursor::Section(i) => config.sections[*i].table.insert(key, value),
            Cursor::Rule(i) => config.rules[*i].set(key, value),
            Cursor::RuleTable(i, sub) => config.rules[*i].set(&format!("{sub}.{key}"), value),
        }
    }

    Ok(config)
}

fn is_bare_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Cut a trailing `#` comment that sits outside any quoted string.
///
/// `'...'` literals have no escapes and are skipped as opaque spans; the
/// value itself is unsupported and gets dropped later.
fn strip_comment(line: &str) -> Result<&str, ParseErrorKind> {
    let mut in_string = false;
    let mut in_literal = false;
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
        } else if in_literal {
            if c == '\'' {
                in_literal = false;
            }
        } else if c == '"' {
            in_string = true;
        } else if c == '\'' {
            in_literal = true;
        } else if c == '#' {
            return Ok(&line[..i]);
        }
    }
    if in_string {
        return Err(ParseErrorKind::UnterminatedString);
    }
    Ok(line)
}

/// Decode one value. `Ok(None)` means the token is not part of the format.
fn parse_value(text: &str) -> Result<Option<Value>, ParseErrorKind> {
    if text.starts_with('"') {
        let (s, _) = parse_quoted(text)?;
        return Ok(Some(Value::String(s)));
    }

    if let Some(rest) = text.strip_prefix('[') {
        let inner = rest
            .trim_end()
            .strip_suffix(']')
            .ok_or(ParseErrorKind::UnterminatedArray)?;
        return parse_array(inner).map(|items| Some(Value::Array(items)));
    }

    if text.eq_ignore_ascii_case("true") {
        return Ok(Some(Value::Bool(true)));
    }
    if text.eq_ignore_ascii_case("false") {
        return Ok(Some(Value::Bool(false)));
    }

    let digits = text.strip_prefix('-').unwrap_or(text);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(text.parse::<i64>().ok().map(Value::Integer));
    }

    Ok(None)
}

/// Collect the quoted strings of an array body; bare items are ignored.
fn parse_array(mut inner: &str) -> Result<Vec<String>, ParseErrorKind> {
    let mut items = Vec::new();
    loop {
        inner = inner.trim_start_matches(|c: char| c.is_whitespace() || c == ',');
        if inner.is_empty() {
            return Ok(items);
        }
        if inner.starts_with('"') {
            let (item, rest) = parse_quoted(inner)?;
            items.push(item);
            inner = rest;
        } else {
            let end = inner.find(',').unwrap_or(inner.len());
            inner = &inner[end..];
        }
    }
}

/// Decode a `"..."` literal at the start of `text`, returning it and the rest.
fn parse_quoted(text: &str) -> Result<(String, &str), ParseErrorKind> {
    let mut out = String::new();
    let mut chars = text.char_indices().skip(1);
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((out, &text[i + 1..])),
            '\\' => match chars.next() {
                Some((_, '"')) => out.push('"'),
                Some((_, '\\')) => out.push('\\'),
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, other)) => {
                    out.push('\\');
                    out.push(other);
                }
                None => break,
            },
            _ => out.push(c),
        }
    }
    Err(ParseErrorKind::UnterminatedString)
}
