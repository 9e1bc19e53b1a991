//! Detection of composite-component (`cc.`) expressions inside attribute values.

use std::sync::LazyLock;

use fancy_regex::Regex;

static COMPOSITE_COMPONENT_EXPRESSION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r".(?:[ ]+|[\[{,(])cc[.].+[}]").ok());

static COMPOSITE_COMPONENT_LOOKUP_WITH_ARGS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?:[ ]+|[\[{,(])cc[.]attrs[.]\w+[(].+[)]").ok());

static METHOD_EXPRESSION_LOOKUP: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^.[{]cc[.]attrs[.]\w+[}]$").ok());

fn finds(pattern: &LazyLock<Option<Regex>>, text: &str) -> bool {
    pattern.as_ref().is_some_and(|regex| regex.is_match(text).unwrap_or(false))
}

/// Expression refers to the enclosing composite component (`cc.`).
pub fn is_composite_component_expr(expression: &str) -> bool {
    finds(&COMPOSITE_COMPONENT_EXPRESSION, expression)
}

/// Expression invokes a composite attribute with arguments, e.g. `#{cc.attrs.action('x')}`.
pub fn is_composite_component_lookup_with_args(expression: &str) -> bool {
    finds(&COMPOSITE_COMPONENT_LOOKUP_WITH_ARGS, expression)
}

/// Expression is nothing but a composite attribute reference, e.g. `#{cc.attrs.action}`.
pub fn is_composite_component_method_lookup(expression: &str) -> bool {
    finds(&METHOD_EXPRESSION_LOOKUP, expression)
}
