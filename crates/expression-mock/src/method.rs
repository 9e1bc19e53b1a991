use std::fmt;
use std::sync::Arc;

use tagforge_core::el::{FaceletContext, MethodExpression};
use tagforge_core::{ExpressionError, Value};

type Body = dyn Fn(&[Value]) -> Result<Value, ExpressionError> + Send + Sync;

/// Callback backed by a closure; what a bean exposes as an invocable member.
#[derive(Clone)]
pub struct FnMethod {
    name: String,
    body: Arc<Body>,
}

impl FnMethod {
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, ExpressionError> + Send + Sync + 'static,
    {
        Self { name: name.into(), body: Arc::new(body) }
    }

    /// Wraps the closure directly into a [`Value::Method`].
    pub fn value<F>(name: impl Into<String>, body: F) -> Value
    where
        F: Fn(&[Value]) -> Result<Value, ExpressionError> + Send + Sync + 'static,
    {
        Value::Method(Arc::new(Self::new(name, body)))
    }
}

impl MethodExpression for FnMethod {
    fn expression_string(&self) -> &str {
        &self.name
    }

    fn invoke(&self, _ctx: &dyn FaceletContext, args: &[Value]) -> Result<Value, ExpressionError> {
        (self.body)(args)
    }
}

impl fmt::Debug for FnMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnMethod").field("name", &self.name).finish_non_exhaustive()
    }
}
