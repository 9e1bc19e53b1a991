use std::sync::Arc;

use super::{FaceletContext, MethodExpression, ValueExpression};
use crate::error::ExpressionError;
use crate::tag::Location;
use crate::value::{Value, ValueType};

/// Value expression compiled from a tag attribute; failures name the attribute.
pub struct TagValueExpression {
    attribute: String,
    delegate: Arc<dyn ValueExpression>,
}

impl TagValueExpression {
    pub fn new(attribute: impl Into<String>, delegate: Arc<dyn ValueExpression>) -> Self {
        Self { attribute: attribute.into(), delegate }
    }

    pub fn delegate(&self) -> &Arc<dyn ValueExpression> {
        &self.delegate
    }
}

impl ValueExpression for TagValueExpression {
    fn expression_string(&self) -> &str {
        self.delegate.expression_string()
    }

    fn expected_type(&self) -> ValueType {
        self.delegate.expected_type()
    }

    fn get_value(&self, ctx: &dyn FaceletContext) -> Result<Value, ExpressionError> {
        self.delegate.get_value(ctx).map_err(|err| err.with_context(self.attribute.clone()))
    }

    fn is_literal_text(&self) -> bool {
        self.delegate.is_literal_text()
    }
}

/// Method expression compiled from a tag attribute; failures name the attribute.
pub struct TagMethodExpression {
    attribute: String,
    delegate: Arc<dyn MethodExpression>,
}

impl TagMethodExpression {
    pub fn new(attribute: impl Into<String>, delegate: Arc<dyn MethodExpression>) -> Self {
        Self { attribute: attribute.into(), delegate }
    }
}

impl MethodExpression for TagMethodExpression {
    fn expression_string(&self) -> &str {
        self.delegate.expression_string()
    }

    fn invoke(&self, ctx: &dyn FaceletContext, args: &[Value]) -> Result<Value, ExpressionError> {
        self.delegate.invoke(ctx, args).map_err(|err| err.with_context(self.attribute.clone()))
    }
}

/// Evaluates a `cc.` expression with the composite component authored at `location` current.
pub struct ContextualCompositeValueExpression {
    location: Location,
    delegate: Arc<dyn ValueExpression>,
}

impl ContextualCompositeValueExpression {
    pub fn new(location: Location, delegate: Arc<dyn ValueExpression>) -> Self {
        Self { location, delegate }
    }

    pub fn location(&self) -> &Location {
        &self.location
    }
}

impl ValueExpression for ContextualCompositeValueExpression {
    fn expression_string(&self) -> &str {
        self.delegate.expression_string()
    }

    fn expected_type(&self) -> ValueType {
        self.delegate.expected_type()
    }

    fn get_value(&self, ctx: &dyn FaceletContext) -> Result<Value, ExpressionError> {
        with_composite(ctx, &self.location, || self.delegate.get_value(ctx))
    }
}

/// Invokes a `cc.` method expression with the composite component authored at `location` current.
pub struct ContextualCompositeMethodExpression {
    location: Location,
    delegate: Arc<dyn MethodExpression>,
}

impl ContextualCompositeMethodExpression {
    pub fn new(location: Location, delegate: Arc<dyn MethodExpression>) -> Self {
        Self { location, delegate }
    }

    pub fn location(&self) -> &Location {
        &self.location
    }
}

impl MethodExpression for ContextualCompositeMethodExpression {
    fn expression_string(&self) -> &str {
        self.delegate.expression_string()
    }

    fn invoke(&self, ctx: &dyn FaceletContext, args: &[Value]) -> Result<Value, ExpressionError> {
        with_composite(ctx, &self.location, || self.delegate.invoke(ctx, args))
    }
}

fn with_composite<T>(
    ctx: &dyn FaceletContext,
    location: &Location,
    call: impl FnOnce() -> Result<T, ExpressionError>,
) -> Result<T, ExpressionError> {
    let pushed = ctx.push_composite_component(location);
    let result = call();
    if pushed {
        ctx.pop_composite_component();
    }
    result.map_err(|err| err.with_context(location.to_string()))
}

/// Resolves a bare `cc.attrs.name` reference when invoked and calls the callback found there.
pub struct AttributeLookupMethodExpression {
    lookup: Arc<dyn ValueExpression>,
}

impl AttributeLookupMethodExpression {
    pub fn new(lookup: Arc<dyn ValueExpression>) -> Self {
        Self { lookup }
    }
}

impl MethodExpression for AttributeLookupMethodExpression {
    fn expression_string(&self) -> &str {
        self.lookup.expression_string()
    }

    fn invoke(&self, ctx: &dyn FaceletContext, args: &[Value]) -> Result<Value, ExpressionError> {
        match self.lookup.get_value(ctx)? {
            Value::Null => Err(ExpressionError::NotCallable(format!(
                "Unable to resolve composite component from using page using EL expression '{}'",
                self.lookup.expression_string()
            ))),
            Value::Method(method) => method.invoke(ctx, args),
            _ => Err(ExpressionError::NotCallable(format!(
                "Successfully resolved expression '{}', but the value is not a MethodExpression",
                self.lookup.expression_string()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::el::ExpressionFactory;
    use std::cell::RefCell;

    struct Fixed(Value);

    impl ValueExpression for Fixed {
        fn expression_string(&self) -> &str {
            "#{cc.attrs.action}"
        }

        fn expected_type(&self) -> ValueType {
            ValueType::Any
        }

        fn get_value(&self, _ctx: &dyn FaceletContext) -> Result<Value, ExpressionError> {
            Ok(self.0.clone())
        }
    }

    struct Failing;

    impl ValueExpression for Failing {
        fn expression_string(&self) -> &str {
            "#{cc.attrs.missing}"
        }

        fn expected_type(&self) -> ValueType {
            ValueType::Any
        }

        fn get_value(&self, _ctx: &dyn FaceletContext) -> Result<Value, ExpressionError> {
            Err(ExpressionError::TargetUnreachable("cc".into()))
        }
    }

    struct Echo;

    impl MethodExpression for Echo {
        fn expression_string(&self) -> &str {
            "#{bean.echo}"
        }

        fn invoke(&self, _ctx: &dyn FaceletContext, args: &[Value]) -> Result<Value, ExpressionError> {
            Ok(Value::List(args.to_vec()))
        }
    }

    struct NoFactory;

    impl ExpressionFactory for NoFactory {
        fn coerce(&self, raw: &str, expected: ValueType) -> Result<Value, ExpressionError> {
            Err(ExpressionError::Coercion { value: raw.into(), expected })
        }

        fn create_value_expression(
            &self,
            raw: &str,
            _expected: ValueType,
        ) -> Result<Arc<dyn ValueExpression>, ExpressionError> {
            Err(ExpressionError::Evaluation(raw.into()))
        }

        fn create_method_expression(
            &self,
            raw: &str,
            _returns: ValueType,
            _params: &[ValueType],
        ) -> Result<Arc<dyn MethodExpression>, ExpressionError> {
            Err(ExpressionError::Evaluation(raw.into()))
        }
    }

    #[derive(Default)]
    struct StackContext {
        stack: RefCell<Vec<Location>>,
        seen: RefCell<Vec<usize>>,
    }

    impl FaceletContext for StackContext {
        fn expression_factory(&self) -> &dyn ExpressionFactory {
            &NoFactory
        }

        fn resolve_variable(&self, _name: &str) -> Option<Value> {
            self.seen.borrow_mut().push(self.stack.borrow().len());
            None
        }

        fn push_composite_component(&self, location: &Location) -> bool {
            self.stack.borrow_mut().push(location.clone());
            true
        }

        fn pop_composite_component(&self) {
            self.stack.borrow_mut().pop();
        }
    }

    struct Probe;

    impl ValueExpression for Probe {
        fn expression_string(&self) -> &str {
            "#{cc.attrs.probe}"
        }

        fn expected_type(&self) -> ValueType {
            ValueType::Any
        }

        fn get_value(&self, ctx: &dyn FaceletContext) -> Result<Value, ExpressionError> {
            Ok(ctx.resolve_variable("probe").unwrap_or_default())
        }
    }

    #[test]
    fn lookup_invokes_resolved_method() {
        let ctx = StackContext::default();
        let lookup = AttributeLookupMethodExpression::new(Arc::new(Fixed(Value::Method(
            Arc::new(Echo),
        ))));
        let result = lookup.invoke(&ctx, &[Value::from(1)]).unwrap();
        assert_eq!(result, Value::List(vec![Value::from(1)]));
    }

    #[test]
    fn lookup_reports_null_and_non_callable_values() {
        let ctx = StackContext::default();
        let null = AttributeLookupMethodExpression::new(Arc::new(Fixed(Value::Null)));
        assert_eq!(
            null.invoke(&ctx, &[]).unwrap_err().to_string(),
            "Unable to resolve composite component from using page using EL expression '#{cc.attrs.action}'"
        );
        let text = AttributeLookupMethodExpression::new(Arc::new(Fixed(Value::from("go"))));
        assert_eq!(
            text.invoke(&ctx, &[]).unwrap_err().to_string(),
            "Successfully resolved expression '#{cc.attrs.action}', but the value is not a MethodExpression"
        );
    }

    #[test]
    fn contextual_expression_pushes_location_for_the_evaluation_only() {
        let ctx = StackContext::default();
        let expression =
            ContextualCompositeValueExpression::new(Location::new("cc.xhtml", 4, 2), Arc::new(Probe));
        expression.get_value(&ctx).unwrap();
        assert_eq!(*ctx.seen.borrow(), vec![1]);
        assert!(ctx.stack.borrow().is_empty());
    }

    #[test]
    fn wrappers_add_attribute_and_location_context() {
        let ctx = StackContext::default();
        let contextual =
            ContextualCompositeValueExpression::new(Location::new("cc.xhtml", 4, 2), Arc::new(Failing));
        let tagged = TagValueExpression::new("page.xhtml @1,1 value=\"#{cc.attrs.missing}\"", Arc::new(contextual));
        let err = tagged.get_value(&ctx).unwrap_err();
        assert_eq!(
            err.to_string(),
            "page.xhtml @1,1 value=\"#{cc.attrs.missing}\": cc.xhtml @4,2: target unreachable, identifier 'cc' resolved to null"
        );
        assert!(ctx.stack.borrow().is_empty());
    }
}
