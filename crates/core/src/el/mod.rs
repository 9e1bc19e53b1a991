//! Boundary to the expression language.
//!
//! The engine never evaluates expressions itself: it classifies attribute text
//! (see [`text`]), hands deferred text to an [`ExpressionFactory`] and evaluates
//! the compiled expressions against a [`FaceletContext`].

mod composite;
pub mod text;
mod wrappers;

use std::fmt;
use std::sync::Arc;

use crate::error::{ExpressionError, FaceletError};
use crate::tag::Location;
use crate::value::{Value, ValueType};

pub use composite::{
    is_composite_component_expr, is_composite_component_lookup_with_args,
    is_composite_component_method_lookup,
};
pub use wrappers::{
    AttributeLookupMethodExpression, ContextualCompositeMethodExpression,
    ContextualCompositeValueExpression, TagMethodExpression, TagValueExpression,
};

/// A compiled expression producing a value each time it is evaluated.
pub trait ValueExpression: Send + Sync {
    fn expression_string(&self) -> &str;

    fn expected_type(&self) -> ValueType;

    fn get_value(&self, ctx: &dyn FaceletContext) -> Result<Value, ExpressionError>;

    /// True when the expression text holds no `#{..}`/`${..}` part.
    fn is_literal_text(&self) -> bool {
        false
    }
}

/// A compiled callback reference.
pub trait MethodExpression: Send + Sync {
    fn expression_string(&self) -> &str;

    fn invoke(&self, ctx: &dyn FaceletContext, args: &[Value]) -> Result<Value, ExpressionError>;
}

/// Classifies, coerces and compiles expression text.
pub trait ExpressionFactory: Send + Sync {
    /// Whether `raw` holds no deferred part. Used by [`TagAttribute::classified_by`](crate::TagAttribute::classified_by).
    fn is_literal(&self, raw: &str) -> Result<bool, ExpressionError> {
        text::is_literal(raw)
    }

    /// Converts literal text to `expected`.
    fn coerce(&self, raw: &str, expected: ValueType) -> Result<Value, ExpressionError>;

    fn create_value_expression(
        &self,
        raw: &str,
        expected: ValueType,
    ) -> Result<Arc<dyn ValueExpression>, ExpressionError>;

    fn create_method_expression(
        &self,
        raw: &str,
        returns: ValueType,
        params: &[ValueType],
    ) -> Result<Arc<dyn MethodExpression>, ExpressionError>;
}

/// Live evaluation context for one tree construction.
pub trait FaceletContext {
    fn expression_factory(&self) -> &dyn ExpressionFactory;

    fn resolve_variable(&self, name: &str) -> Option<Value>;

    /// Function bound to `prefix:name` in the current document.
    fn resolve_function(&self, _prefix: &str, _name: &str) -> Option<Function> {
        None
    }

    /// Makes the composite component authored at `location` current. Returns whether
    /// something was pushed, in which case the caller pops it again.
    fn push_composite_component(&self, _location: &Location) -> bool {
        false
    }

    fn pop_composite_component(&self) {}

    /// Includes the template at `source` with `params` bound as variables.
    fn include_template(&self, source: &str, _params: &[(String, Value)]) -> Result<(), FaceletError> {
        Err(ExpressionError::Evaluation(format!(
            "template inclusion of '{source}' is not supported by this context"
        ))
        .into())
    }
}

type FunctionBody = dyn Fn(&[Value]) -> Result<Value, ExpressionError> + Send + Sync;

/// A namespace-scoped function callable from expressions.
#[derive(Clone)]
pub struct Function {
    name: Arc<str>,
    body: Arc<FunctionBody>,
}

impl Function {
    pub fn new<F>(name: impl Into<Arc<str>>, body: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, ExpressionError> + Send + Sync + 'static,
    {
        Self { name: name.into(), body: Arc::new(body) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, ExpressionError> {
        (self.body)(args)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function").field("name", &self.name).finish_non_exhaustive()
    }
}
