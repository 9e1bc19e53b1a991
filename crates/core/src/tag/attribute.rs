use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};

use super::{Location, Tag};
use crate::el::{
    self, AttributeLookupMethodExpression, ContextualCompositeMethodExpression,
    ContextualCompositeValueExpression, ExpressionFactory, FaceletContext, MethodExpression,
    TagMethodExpression, TagValueExpression, ValueExpression,
};
use crate::error::{ExpressionError, TagAttributeError};
use crate::value::{Value, ValueType};

const ARGUMENTS_NOT_LEGAL: &str =
    "composite component attribute expressions must not be invoked with arguments";

/// One attribute of a tag occurrence.
pub struct TagAttribute {
    location: Location,
    namespace: String,
    local_name: String,
    qname: String,
    value: String,
    literal: bool,
    tag: OnceLock<Weak<Tag>>,
    expressions: Mutex<HashMap<ValueType, Arc<dyn ValueExpression>>>,
}

impl TagAttribute {
    /// Creates the attribute and classifies its value as literal or deferred.
    ///
    /// An empty `local_name` falls back to `qname`.
    pub fn new(
        location: Location,
        namespace: impl Into<String>,
        local_name: impl Into<String>,
        qname: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, TagAttributeError> {
        let (namespace, local_name, qname, value) =
            (namespace.into(), local_name.into(), qname.into(), value.into());
        Self::build(location, namespace, local_name, qname, value, el::text::is_literal)
    }

    /// Like [`new`](Self::new), with `factory` deciding whether the value is literal.
    pub fn classified_by(
        factory: &dyn ExpressionFactory,
        location: Location,
        namespace: impl Into<String>,
        local_name: impl Into<String>,
        qname: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, TagAttributeError> {
        let (namespace, local_name, qname, value) =
            (namespace.into(), local_name.into(), qname.into(), value.into());
        Self::build(location, namespace, local_name, qname, value, |raw| factory.is_literal(raw))
    }

    fn build(
        location: Location,
        namespace: String,
        local_name: String,
        qname: String,
        value: String,
        classify: impl FnOnce(&str) -> Result<bool, ExpressionError>,
    ) -> Result<Self, TagAttributeError> {
        let mut attribute = Self {
            location,
            namespace,
            local_name: if local_name.is_empty() { qname.clone() } else { local_name },
            qname,
            value,
            literal: false,
            tag: OnceLock::new(),
            expressions: Mutex::new(HashMap::new()),
        };
        attribute.literal =
            classify(&attribute.value).map_err(|err| TagAttributeError::caused_by(&attribute, err))?;
        Ok(attribute)
    }

    /// Copy with the same data, no owning tag and an empty expression cache.
    pub fn detached(&self) -> Self {
        Self {
            location: self.location.clone(),
            namespace: self.namespace.clone(),
            local_name: self.local_name.clone(),
            qname: self.qname.clone(),
            value: self.value.clone(),
            literal: self.literal,
            tag: OnceLock::new(),
            expressions: Mutex::new(HashMap::new()),
        }
    }

    /// Records the owning tag. Returns `false` when an owner was already set.
    pub(crate) fn attach(&self, tag: &Weak<Tag>) -> bool {
        self.tag.set(Weak::clone(tag)).is_ok()
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    pub fn qname(&self) -> &str {
        &self.qname
    }

    /// Raw attribute text as written in the source.
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_literal(&self) -> bool {
        self.literal
    }

    pub fn tag(&self) -> Option<Arc<Tag>> {
        self.tag.get().and_then(Weak::upgrade)
    }

    pub fn get_boolean(&self, ctx: &dyn FaceletContext) -> Result<bool, TagAttributeError> {
        if self.literal {
            return Ok(self.value.eq_ignore_ascii_case("true"));
        }
        match self.get_object(ctx, ValueType::Bool)? {
            Value::Bool(value) => Ok(value),
            Value::Null => Ok(false),
            other => Err(self.unexpected(ValueType::Bool, &other)),
        }
    }

    pub fn get_int(&self, ctx: &dyn FaceletContext) -> Result<i32, TagAttributeError> {
        if self.literal {
            return self.value.parse().map_err(|err| TagAttributeError::caused_by(self, err));
        }
        match self.get_object(ctx, ValueType::Int)? {
            Value::Int(value) => {
                i32::try_from(value).map_err(|err| TagAttributeError::caused_by(self, err))
            }
            other => Err(self.unexpected(ValueType::Int, &other)),
        }
    }

    /// String value: the raw text when literal, otherwise the evaluated expression.
    pub fn get_value(&self, ctx: &dyn FaceletContext) -> Result<String, TagAttributeError> {
        if self.literal {
            return Ok(self.value.clone());
        }
        Ok(self.get_object(ctx, ValueType::String)?.to_string())
    }

    pub fn get_object(
        &self,
        ctx: &dyn FaceletContext,
        expected: ValueType,
    ) -> Result<Value, TagAttributeError> {
        if self.literal {
            if expected == ValueType::String {
                return Ok(Value::String(self.value.clone()));
            }
            return ctx
                .expression_factory()
                .coerce(&self.value, expected)
                .map_err(|err| TagAttributeError::caused_by(self, err));
        }
        let expression = self.get_value_expression(ctx, expected)?;
        expression.get_value(ctx).map_err(|err| TagAttributeError::from_expression(self, err))
    }

    /// Compiled value expression for `expected`, cached on this attribute.
    pub fn get_value_expression(
        &self,
        ctx: &dyn FaceletContext,
        expected: ValueType,
    ) -> Result<Arc<dyn ValueExpression>, TagAttributeError> {
        if let Some(cached) = self.cache().get(&expected) {
            return Ok(Arc::clone(cached));
        }

        let delegate = ctx
            .expression_factory()
            .create_value_expression(&self.value, expected)
            .map_err(|err| TagAttributeError::caused_by(self, err))?;
        tracing::trace!(attribute = %self.qname, %expected, "compiled value expression");
        let expression: Arc<dyn ValueExpression> = if el::is_composite_component_expr(&self.value) {
            if el::is_composite_component_lookup_with_args(&self.value) {
                return Err(TagAttributeError::new(self, ARGUMENTS_NOT_LEGAL));
            }
            let contextual = ContextualCompositeValueExpression::new(self.location.clone(), delegate);
            Arc::new(TagValueExpression::new(self.to_string(), Arc::new(contextual)))
        } else {
            Arc::new(TagValueExpression::new(self.to_string(), delegate))
        };

        Ok(Arc::clone(self.cache().entry(expected).or_insert(expression)))
    }

    /// Compiled callback with the given signature.
    ///
    /// A bare `cc.attrs.name` reference is resolved at invocation time instead of
    /// being compiled here.
    pub fn get_method_expression(
        &self,
        ctx: &dyn FaceletContext,
        returns: ValueType,
        params: &[ValueType],
    ) -> Result<Arc<dyn MethodExpression>, TagAttributeError> {
        if el::is_composite_component_lookup_with_args(&self.value) {
            return Err(TagAttributeError::new(self, ARGUMENTS_NOT_LEGAL));
        }
        if el::is_composite_component_method_lookup(&self.value) {
            let lookup = self.get_value_expression(ctx, ValueType::Method)?;
            return Ok(Arc::new(AttributeLookupMethodExpression::new(lookup)));
        }

        let compiled = ctx
            .expression_factory()
            .create_method_expression(&self.value, returns, params)
            .map_err(|err| TagAttributeError::caused_by(self, err))?;
        let tagged: Arc<dyn MethodExpression> =
            Arc::new(TagMethodExpression::new(self.to_string(), compiled));
        if el::is_composite_component_expr(&self.value) {
            Ok(Arc::new(ContextualCompositeMethodExpression::new(self.location.clone(), tagged)))
        } else {
            Ok(tagged)
        }
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, HashMap<ValueType, Arc<dyn ValueExpression>>> {
        self.expressions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn unexpected(&self, expected: ValueType, actual: &Value) -> TagAttributeError {
        TagAttributeError::caused_by(
            self,
            ExpressionError::Coercion { value: actual.to_string(), expected },
        )
    }
}

impl fmt::Display for TagAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}=\"{}\"", self.location, self.qname, self.value)
    }
}

impl fmt::Debug for TagAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagAttribute")
            .field("location", &self.location)
            .field("namespace", &self.namespace)
            .field("qname", &self.qname)
            .field("value", &self.value)
            .field("literal", &self.literal)
            .finish_non_exhaustive()
    }
}
