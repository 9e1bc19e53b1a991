use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tagforge_core::el::text::{self, Segment};
use tagforge_core::el::{ExpressionFactory, FaceletContext, MethodExpression, ValueExpression};
use tagforge_core::{ExpressionError, Value, ValueType};

use crate::eval;

/// Expression factory that counts every coercion and compilation.
#[derive(Debug, Default)]
pub struct MockExpressionFactory {
    coercions: AtomicUsize,
    value_compilations: AtomicUsize,
    method_compilations: AtomicUsize,
}

impl MockExpressionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of literal coercions performed so far.
    pub fn coercions(&self) -> usize {
        self.coercions.load(Ordering::SeqCst)
    }

    pub fn value_compilations(&self) -> usize {
        self.value_compilations.load(Ordering::SeqCst)
    }

    pub fn method_compilations(&self) -> usize {
        self.method_compilations.load(Ordering::SeqCst)
    }
}

impl ExpressionFactory for MockExpressionFactory {
    fn coerce(&self, raw: &str, expected: ValueType) -> Result<Value, ExpressionError> {
        self.coercions.fetch_add(1, Ordering::SeqCst);
        eval::coerce_value(Value::from(raw), expected)
    }

    fn create_value_expression(
        &self,
        raw: &str,
        expected: ValueType,
    ) -> Result<Arc<dyn ValueExpression>, ExpressionError> {
        self.value_compilations.fetch_add(1, Ordering::SeqCst);
        let segments = text::parse(raw)?;
        for segment in &segments {
            if let Segment::Expression { text, .. } = segment {
                eval::body(text)?;
            }
        }
        Ok(Arc::new(MockValueExpression { raw: raw.to_owned(), expected, segments }))
    }

    fn create_method_expression(
        &self,
        raw: &str,
        returns: ValueType,
        _params: &[ValueType],
    ) -> Result<Arc<dyn MethodExpression>, ExpressionError> {
        self.method_compilations.fetch_add(1, Ordering::SeqCst);
        match text::parse(raw)?.as_slice() {
            [Segment::Expression { text, .. }] => Ok(Arc::new(MockMethodExpression {
                raw: raw.to_owned(),
                body: eval::body(text)?.to_owned(),
                returns,
            })),
            _ => Err(ExpressionError::Syntax {
                expression: raw.to_owned(),
                message: "a method expression must be a single expression".to_owned(),
            }),
        }
    }
}

struct MockValueExpression {
    raw: String,
    expected: ValueType,
    segments: Vec<Segment>,
}

impl ValueExpression for MockValueExpression {
    fn expression_string(&self) -> &str {
        &self.raw
    }

    fn expected_type(&self) -> ValueType {
        self.expected
    }

    fn get_value(&self, ctx: &dyn FaceletContext) -> Result<Value, ExpressionError> {
        let value = match self.segments.as_slice() {
            [Segment::Expression { text, .. }] => eval::evaluate(eval::body(text)?, ctx)?,
            segments => {
                let mut joined = String::new();
                for segment in segments {
                    match segment {
                        Segment::Literal(literal) => joined.push_str(literal),
                        Segment::Expression { text, .. } => {
                            joined.push_str(&eval::evaluate(eval::body(text)?, ctx)?.to_string());
                        }
                    }
                }
                Value::String(joined)
            }
        };
        eval::coerce_value(value, self.expected)
    }

    fn is_literal_text(&self) -> bool {
        !self.segments.iter().any(Segment::is_expression)
    }
}

struct MockMethodExpression {
    raw: String,
    body: String,
    returns: ValueType,
}

impl MethodExpression for MockMethodExpression {
    fn expression_string(&self) -> &str {
        &self.raw
    }

    fn invoke(&self, ctx: &dyn FaceletContext, args: &[Value]) -> Result<Value, ExpressionError> {
        let method = eval::resolve_method(&self.body, ctx)?;
        eval::coerce_value(method.invoke(ctx, args)?, self.returns)
    }
}
