use std::sync::Arc;

use tagforge_core::el::{FaceletContext, MethodExpression};
use tagforge_core::{ExpressionError, Value, ValueType};

/// Strips the marker and braces from `#{..}` / `${..}`.
pub(crate) fn body(expression: &str) -> Result<&str, ExpressionError> {
    expression
        .strip_prefix("#{")
        .or_else(|| expression.strip_prefix("${"))
        .and_then(|rest| rest.strip_suffix('}'))
        .map(str::trim)
        .ok_or_else(|| syntax(expression, "expected #{..} or ${..}"))
}

pub(crate) fn evaluate(body: &str, ctx: &dyn FaceletContext) -> Result<Value, ExpressionError> {
    let body = body.trim();
    if body.is_empty() {
        return Err(syntax(body, "empty expression"));
    }
    if let Some(value) = literal(body) {
        return Ok(value);
    }
    if let Some(open) = body.find('(') {
        return call(body, open, ctx);
    }
    path(body, ctx, false)
}

/// Resolves `body` to a callback; a missing base object is an error here.
pub(crate) fn resolve_method(
    body: &str,
    ctx: &dyn FaceletContext,
) -> Result<Arc<dyn MethodExpression>, ExpressionError> {
    match path(body, ctx, true)? {
        Value::Method(method) => Ok(method),
        other => Err(ExpressionError::NotCallable(format!(
            "'{body}' resolved to {} instead of a method",
            other.value_type()
        ))),
    }
}

fn literal(body: &str) -> Option<Value> {
    let quoted = body.len() >= 2
        && ((body.starts_with('\'') && body.ends_with('\''))
            || (body.starts_with('"') && body.ends_with('"')));
    if quoted {
        return Some(Value::from(&body[1..body.len() - 1]));
    }
    match body {
        "true" => return Some(Value::Bool(true)),
        "false" => return Some(Value::Bool(false)),
        "null" => return Some(Value::Null),
        _ => {}
    }
    if !body.starts_with(|c: char| c.is_ascii_digit() || c == '-') {
        return None;
    }
    body.parse::<i64>()
        .map(Value::Int)
        .ok()
        .or_else(|| body.parse::<f64>().map(Value::Float).ok())
}

fn call(body: &str, open: usize, ctx: &dyn FaceletContext) -> Result<Value, ExpressionError> {
    let callee = body[..open].trim();
    let arguments = body[open + 1..]
        .strip_suffix(')')
        .ok_or_else(|| syntax(body, "unterminated argument list"))?;
    let (prefix, name) =
        callee.split_once(':').ok_or_else(|| syntax(body, "functions must be prefixed"))?;
    let function = ctx
        .resolve_function(prefix, name)
        .ok_or_else(|| ExpressionError::UnknownFunction(callee.to_owned()))?;
    let args = split_arguments(arguments)
        .into_iter()
        .map(|argument| evaluate(argument, ctx))
        .collect::<Result<Vec<_>, _>>()?;
    function.call(&args)
}

fn split_arguments(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0_usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (index, c) in text.char_indices() {
        match (c, quote) {
            ('\'' | '"', None) => quote = Some(c),
            (c, Some(open)) if c == open => quote = None,
            ('(', None) => depth += 1,
            (')', None) => depth = depth.saturating_sub(1),
            (',', None) if depth == 0 => {
                parts.push(&text[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    if !text[start..].trim().is_empty() || !parts.is_empty() {
        parts.push(&text[start..]);
    }
    parts
}

fn path(body: &str, ctx: &dyn FaceletContext, strict: bool) -> Result<Value, ExpressionError> {
    let mut segments = body.split('.').map(str::trim);
    let head = segments.next().unwrap_or_default();
    if !is_identifier(head) {
        return Err(syntax(body, "expected an identifier"));
    }

    let mut current = match ctx.resolve_variable(head) {
        Some(value) => value,
        None if strict => return Err(ExpressionError::TargetUnreachable(head.to_owned())),
        None => Value::Null,
    };
    let mut resolved = head.to_owned();

    for segment in segments {
        if !is_identifier(segment) {
            return Err(syntax(body, "expected an identifier"));
        }
        current = match current {
            Value::Null if strict => {
                return Err(ExpressionError::TargetUnreachable(resolved));
            }
            Value::Null => Value::Null,
            Value::Map(mut map) => map.remove(segment).ok_or_else(|| {
                ExpressionError::PropertyNotFound {
                    base: resolved.clone(),
                    property: segment.to_owned(),
                }
            })?,
            _ => {
                return Err(ExpressionError::PropertyNotFound {
                    base: resolved,
                    property: segment.to_owned(),
                });
            }
        };
        resolved.push('.');
        resolved.push_str(segment);
    }
    Ok(current)
}

fn is_identifier(text: &str) -> bool {
    !text.is_empty()
        && !text.starts_with(|c: char| c.is_ascii_digit())
        && text.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// Converts `value` to `expected` using the usual expression-language rules.
pub(crate) fn coerce_value(value: Value, expected: ValueType) -> Result<Value, ExpressionError> {
    let mismatch = |value: &Value| ExpressionError::Coercion { value: value.to_string(), expected };
    match (expected, value) {
        (ValueType::Any, value) => Ok(value),
        (ValueType::String, value @ (Value::Method(_) | Value::Expression(_) | Value::Object(_))) => {
            Err(mismatch(&value))
        }
        (ValueType::String, value) => Ok(Value::String(value.to_string())),
        (ValueType::Bool, Value::Null) => Ok(Value::Bool(false)),
        (ValueType::Bool, Value::Bool(flag)) => Ok(Value::Bool(flag)),
        (ValueType::Bool, Value::String(text)) => Ok(Value::Bool(text.eq_ignore_ascii_case("true"))),
        (ValueType::Int, Value::Null) => Ok(Value::Int(0)),
        (ValueType::Int, Value::Int(number)) => Ok(Value::Int(number)),
        (ValueType::Int, Value::String(text)) => {
            text.trim().parse().map(Value::Int).map_err(|_| mismatch(&Value::String(text)))
        }
        (ValueType::Float, Value::Null) => Ok(Value::Float(0.0)),
        (ValueType::Float, Value::Float(number)) => Ok(Value::Float(number)),
        #[allow(clippy::cast_precision_loss)]
        (ValueType::Float, Value::Int(number)) => Ok(Value::Float(number as f64)),
        (ValueType::Float, Value::String(text)) => {
            text.trim().parse().map(Value::Float).map_err(|_| mismatch(&Value::String(text)))
        }
        (ValueType::List, Value::String(text)) => Ok(Value::List(
            text.split(',').map(|item| Value::from(item.trim())).collect(),
        )),
        (
            ValueType::List | ValueType::Map | ValueType::Method | ValueType::ValueExpression | ValueType::Object,
            Value::Null,
        ) => Ok(Value::Null),
        (ValueType::List, value @ Value::List(_))
        | (ValueType::Map, value @ Value::Map(_))
        | (ValueType::Method, value @ Value::Method(_))
        | (ValueType::ValueExpression, value @ Value::Expression(_))
        | (ValueType::Object, value @ Value::Object(_)) => Ok(value),
        (_, value) => Err(mismatch(&value)),
    }
}

fn syntax(expression: &str, message: &str) -> ExpressionError {
    ExpressionError::Syntax { expression: expression.to_owned(), message: message.to_owned() }
}
