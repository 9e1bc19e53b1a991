//! Attribute-to-property binding.
//!
//! A [`MetaRuleset`] collects the attributes of one tag occurrence and asks its
//! [`MetaRule`]s, newest first, to turn each into an [`Applier`]. The finished
//! [`Binder`] is immutable and applies the same bindings to any number of
//! target instances.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, LazyLock, OnceLock};

use tagforge_core::el::FaceletContext;
use tagforge_core::{
    Diagnostic, DiagnosticCode, DiagnosticSink, FaceletError, PropertyDescriptor, Severity, Tag,
    TagAttribute, TagAttributeError, TargetType, Value, ValueType,
};

use crate::metadata::TargetMetadata;

/// Custom binding step added to a ruleset through [`MetaRuleset::add`].
pub trait Metadata: Send + Sync {
    fn apply_metadata(&self, ctx: &dyn FaceletContext, instance: &mut dyn Any) -> Result<(), FaceletError>;
}

/// Literal attribute bound to a property; coerced on first use only.
pub struct LiteralApplier {
    property: PropertyDescriptor,
    attribute: Arc<TagAttribute>,
    coerced: OnceLock<Value>,
}

impl LiteralApplier {
    fn value(&self, ctx: &dyn FaceletContext) -> Result<Value, TagAttributeError> {
        if let Some(value) = self.coerced.get() {
            return Ok(value.clone());
        }
        let value = self.attribute.get_object(ctx, self.property.value_type())?;
        // A concurrent first apply may have won; both values are equal.
        let _ = self.coerced.set(value.clone());
        Ok(value)
    }
}

/// Deferred attribute bound to a property; evaluated on every apply.
pub struct DeferredApplier {
    property: PropertyDescriptor,
    attribute: Arc<TagAttribute>,
}

impl DeferredApplier {
    fn value(&self, ctx: &dyn FaceletContext) -> Result<Value, TagAttributeError> {
        if self.property.value_type() == ValueType::ValueExpression {
            return Ok(Value::Expression(self.attribute.get_value_expression(ctx, ValueType::Any)?));
        }
        self.attribute.get_object(ctx, self.property.value_type())
    }
}

/// Callback attribute bound to a property of [`ValueType::Method`].
pub struct MethodApplier {
    property: PropertyDescriptor,
    attribute: Arc<TagAttribute>,
    returns: ValueType,
    params: Vec<ValueType>,
}

impl MethodApplier {
    fn value(&self, ctx: &dyn FaceletContext) -> Result<Value, TagAttributeError> {
        let method = self.attribute.get_method_expression(ctx, self.returns, &self.params)?;
        Ok(Value::Method(method))
    }
}

/// One attribute bound to one property.
#[derive(Clone)]
pub enum Applier {
    Literal(Arc<LiteralApplier>),
    Deferred(Arc<DeferredApplier>),
    Method(Arc<MethodApplier>),
    Custom(Arc<dyn Metadata>),
}

impl Applier {
    pub fn literal(property: PropertyDescriptor, attribute: Arc<TagAttribute>) -> Self {
        Applier::Literal(Arc::new(LiteralApplier { property, attribute, coerced: OnceLock::new() }))
    }

    pub fn deferred(property: PropertyDescriptor, attribute: Arc<TagAttribute>) -> Self {
        Applier::Deferred(Arc::new(DeferredApplier { property, attribute }))
    }

    pub fn method(
        property: PropertyDescriptor,
        attribute: Arc<TagAttribute>,
        returns: ValueType,
        params: Vec<ValueType>,
    ) -> Self {
        Applier::Method(Arc::new(MethodApplier { property, attribute, returns, params }))
    }

    pub fn custom(metadata: Arc<dyn Metadata>) -> Self {
        Applier::Custom(metadata)
    }

    /// Bound attribute; `None` for custom appliers.
    pub fn attribute(&self) -> Option<&Arc<TagAttribute>> {
        match self {
            Applier::Literal(applier) => Some(&applier.attribute),
            Applier::Deferred(applier) => Some(&applier.attribute),
            Applier::Method(applier) => Some(&applier.attribute),
            Applier::Custom(_) => None,
        }
    }

    /// Target property; `None` for custom appliers.
    pub fn property(&self) -> Option<&PropertyDescriptor> {
        match self {
            Applier::Literal(applier) => Some(&applier.property),
            Applier::Deferred(applier) => Some(&applier.property),
            Applier::Method(applier) => Some(&applier.property),
            Applier::Custom(_) => None,
        }
    }

    pub fn apply(&self, ctx: &dyn FaceletContext, instance: &mut dyn Any) -> Result<(), FaceletError> {
        let (property, attribute, value) = match self {
            Applier::Custom(metadata) => return metadata.apply_metadata(ctx, instance),
            Applier::Literal(applier) => (&applier.property, &applier.attribute, applier.value(ctx)?),
            Applier::Deferred(applier) => (&applier.property, &applier.attribute, applier.value(ctx)?),
            Applier::Method(applier) => (&applier.property, &applier.attribute, applier.value(ctx)?),
        };
        property
            .write(instance, value)
            .map_err(|err| TagAttributeError::caused_by(attribute, err).into())
    }

    fn kind(&self) -> &'static str {
        match self {
            Applier::Literal(_) => "literal",
            Applier::Deferred(_) => "deferred",
            Applier::Method(_) => "method",
            Applier::Custom(_) => "custom",
        }
    }
}

impl PartialEq for Applier {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Applier::Custom(a), Applier::Custom(b)) => Arc::ptr_eq(a, b),
            (a, b) if a.kind() == b.kind() => {
                a.property().map(PropertyDescriptor::name) == b.property().map(PropertyDescriptor::name)
                    && match (a.attribute(), b.attribute()) {
                        (Some(x), Some(y)) => Arc::ptr_eq(x, y),
                        _ => false,
                    }
            }
            _ => false,
        }
    }
}

impl fmt::Debug for Applier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Applier")
            .field("kind", &self.kind())
            .field("property", &self.property().map(PropertyDescriptor::name))
            .field("attribute", &self.attribute().map(|attribute| attribute.qname()))
            .finish()
    }
}

static NONE: LazyLock<Binder> = LazyLock::new(|| Binder { appliers: Arc::from(Vec::new()) });

/// Ordered, immutable set of appliers produced by [`MetaRuleset::finish`].
#[derive(Clone, Debug)]
pub struct Binder {
    appliers: Arc<[Applier]>,
}

impl Binder {
    /// The shared binder that binds nothing.
    pub fn none() -> Binder {
        NONE.clone()
    }

    pub fn is_none(&self) -> bool {
        self.appliers.is_empty()
    }

    pub fn appliers(&self) -> &[Applier] {
        &self.appliers
    }

    pub fn len(&self) -> usize {
        self.appliers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.appliers.is_empty()
    }

    /// Applies every applier in order; the first failure aborts.
    pub fn apply(&self, ctx: &dyn FaceletContext, instance: &mut dyn Any) -> Result<(), FaceletError> {
        for applier in self.appliers.iter() {
            applier.apply(ctx, instance)?;
        }
        Ok(())
    }

    /// Both binders share the same applier storage.
    pub fn ptr_eq(&self, other: &Binder) -> bool {
        Arc::ptr_eq(&self.appliers, &other.appliers)
    }
}

/// Turns one attribute into an applier, or declines.
pub trait MetaRule: Send + Sync {
    fn apply_rule(
        &self,
        name: &str,
        attribute: &Arc<TagAttribute>,
        metadata: &TargetMetadata,
    ) -> Option<Applier>;
}

/// Binds an attribute to the writable property of the same name.
#[derive(Debug, Default, Clone, Copy)]
pub struct BeanPropertyRule;

impl MetaRule for BeanPropertyRule {
    fn apply_rule(
        &self,
        name: &str,
        attribute: &Arc<TagAttribute>,
        metadata: &TargetMetadata,
    ) -> Option<Applier> {
        let property = metadata.write_method(name)?.clone();
        if attribute.is_literal() {
            Some(Applier::literal(property, Arc::clone(attribute)))
        } else {
            Some(Applier::deferred(property, Arc::clone(attribute)))
        }
    }
}

/// Binds one named attribute as a compiled callback with a fixed signature.
#[derive(Debug, Clone)]
pub struct MethodRule {
    method_name: String,
    return_type: ValueType,
    params: Vec<ValueType>,
}

impl MethodRule {
    pub fn new(method_name: impl Into<String>, return_type: ValueType, params: Vec<ValueType>) -> Self {
        Self { method_name: method_name.into(), return_type, params }
    }
}

impl MetaRule for MethodRule {
    fn apply_rule(
        &self,
        name: &str,
        attribute: &Arc<TagAttribute>,
        metadata: &TargetMetadata,
    ) -> Option<Applier> {
        if name != self.method_name {
            return None;
        }
        let property = metadata.write_method(name)?;
        if property.value_type() != ValueType::Method {
            return None;
        }
        Some(Applier::method(
            property.clone(),
            Arc::clone(attribute),
            self.return_type,
            self.params.clone(),
        ))
    }
}

/// Per-occurrence builder of a [`Binder`].
pub struct MetaRuleset {
    tag: Arc<Tag>,
    metadata: Arc<TargetMetadata>,
    attributes: BTreeMap<String, Arc<TagAttribute>>,
    rules: Vec<Arc<dyn MetaRule>>,
    appliers: Vec<Applier>,
}

impl MetaRuleset {
    /// Seeds the ruleset with every attribute of `tag` keyed by local name
    /// (`class` as `styleClass`) and with the [`BeanPropertyRule`].
    pub fn new(tag: &Arc<Tag>, metadata: Arc<TargetMetadata>) -> Self {
        let attributes = tag
            .attributes()
            .all()
            .iter()
            .map(|attribute| {
                let name = match attribute.local_name() {
                    "class" => "styleClass",
                    other => other,
                };
                (name.to_owned(), Arc::clone(attribute))
            })
            .collect();
        Self {
            tag: Arc::clone(tag),
            metadata,
            attributes,
            rules: vec![Arc::new(BeanPropertyRule)],
            appliers: Vec::new(),
        }
    }

    pub fn target(&self) -> TargetType {
        self.metadata.target()
    }

    pub fn tag(&self) -> &Arc<Tag> {
        &self.tag
    }

    /// Leaves attribute `name` unbound without a diagnostic.
    pub fn ignore(&mut self, name: &str) -> &mut Self {
        self.attributes.remove(name);
        self
    }

    pub fn ignore_all(&mut self) -> &mut Self {
        self.attributes.clear();
        self
    }

    /// Binds attribute `attribute` to property `property` instead of its own name.
    pub fn alias(&mut self, attribute: &str, property: &str) -> &mut Self {
        if let Some(found) = self.attributes.remove(attribute) {
            self.attributes.insert(property.to_owned(), found);
        }
        self
    }

    pub fn add(&mut self, applier: Applier) -> &mut Self {
        if !self.appliers.contains(&applier) {
            self.appliers.push(applier);
        }
        self
    }

    /// Rules added later are consulted first.
    pub fn add_rule(&mut self, rule: Arc<dyn MetaRule>) -> &mut Self {
        self.rules.push(rule);
        self
    }

    /// Binds every remaining attribute. Attributes no rule claims are reported to
    /// `diagnostics` and skipped.
    pub fn finish(mut self, diagnostics: &dyn DiagnosticSink) -> Binder {
        let target = self.metadata.target();
        let attributes = std::mem::take(&mut self.attributes);
        for (name, attribute) in attributes {
            let claimed = self
                .rules
                .iter()
                .rev()
                .find_map(|rule| rule.apply_rule(&name, &attribute, &self.metadata));
            match claimed {
                Some(applier) => {
                    self.add(applier);
                }
                None => {
                    let message = format!(
                        "{attribute} Unhandled by MetaTagHandler for type {}",
                        target.name()
                    );
                    tracing::error!(attribute = %name, target_type = target.name(), "{message}");
                    diagnostics.report(
                        Diagnostic::new(name, DiagnosticCode::UnhandledAttribute, Severity::Error, message)
                            .with_location(attribute.location().clone()),
                    );
                }
            }
        }

        if self.appliers.is_empty() {
            return Binder::none();
        }
        tracing::debug!(
            tag = self.tag.qname(),
            target_type = target.name(),
            appliers = self.appliers.len(),
            "binder finished"
        );
        Binder { appliers: Arc::from(self.appliers) }
    }
}
