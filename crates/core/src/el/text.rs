//! Scanner for attribute text that may embed `#{..}` or `${..}` expressions.

use crate::error::ExpressionError;

/// One piece of scanned attribute text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    /// A complete expression including its marker and braces, e.g. `#{bean.name}`.
    Expression { deferred: bool, text: String },
}

impl Segment {
    pub fn is_expression(&self) -> bool {
        matches!(self, Segment::Expression { .. })
    }
}

/// Splits `input` into literal and expression segments.
///
/// A backslash directly before a marker escapes it; escaped markers end up in the
/// literal text without the backslash. Adjacent literal characters are merged.
pub fn parse(input: &str) -> Result<Vec<Segment>, ExpressionError> {
    let chars: Vec<char> = input.chars().collect();
    let len = chars.len();
    let mut segments = Vec::new();
    let mut buffer = String::new();
    let mut escaped = false;
    let mut i = 0;

    while i < len {
        let c = chars[i];
        if c == '\\' {
            escaped = !escaped;
            if escaped && i + 1 < len && matches!(chars[i + 1], '$' | '#') {
                i += 1;
                continue;
            }
        } else if !escaped && matches!(c, '$' | '#') && i + 1 < len && chars[i + 1] == '{' {
            if !buffer.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut buffer)));
            }
            let length = expression_length(&chars, i)?;
            segments.push(Segment::Expression {
                deferred: c == '#',
                text: chars[i..i + length].iter().collect(),
            });
            i += length;
            continue;
        }
        escaped = false;
        buffer.push(c);
        i += 1;
    }

    if !buffer.is_empty() {
        segments.push(Segment::Literal(buffer));
    }
    Ok(segments)
}

/// True when `input` contains no expression.
pub fn is_literal(input: &str) -> Result<bool, ExpressionError> {
    Ok(!parse(input)?.iter().any(Segment::is_expression))
}

/// Length of the expression starting at `start` (the marker), braces included.
fn expression_length(chars: &[char], start: usize) -> Result<usize, ExpressionError> {
    let mut quote: Option<char> = None;
    let mut nested = 0_usize;
    let mut i = start;

    while i < chars.len() {
        let c = chars[i];
        match (c, quote) {
            ('\\', _) if i + 1 < chars.len() => i += 1,
            ('\'' | '"', None) => quote = Some(c),
            ('\'' | '"', Some(open)) if open == c => quote = None,
            ('{', None) => nested += 1,
            ('}', None) => {
                if nested > 1 {
                    nested -= 1;
                } else {
                    return Ok(i - start + 1);
                }
            }
            _ => {}
        }
        i += 1;
    }

    Err(ExpressionError::Unbalanced(chars[start..].iter().collect()))
}
