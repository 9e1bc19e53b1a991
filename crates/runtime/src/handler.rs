//! Tag handlers and the configuration they are built from.

use std::any::TypeId;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tagforge_core::el::FaceletContext;
use tagforge_core::{
    Bindable, ConfigurationError, DiagnosticLog, DiagnosticSink, FaceletError, Tag, TargetType,
    Value, ValueType,
};

use crate::binding::{Binder, MetaRuleset};
use crate::library::Resource;
use crate::metadata::MetadataCache;
use crate::options::EngineOptions;

/// Entries kept by the diagnostic log an environment creates for itself.
pub const DEFAULT_DIAGNOSTIC_CAPACITY: usize = 256;

fn default_diagnostics() -> Arc<dyn DiagnosticSink> {
    Arc::new(DiagnosticLog::bounded(DEFAULT_DIAGNOSTIC_CAPACITY))
}

/// Engine-wide collaborators shared by every handler.
pub struct TagEnvironment {
    options: EngineOptions,
    metadata: Arc<MetadataCache>,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl TagEnvironment {
    /// Environment with its own metadata cache sized from `options`.
    ///
    /// Diagnostics go to a log holding the newest [`DEFAULT_DIAGNOSTIC_CAPACITY`]
    /// entries; use [`with_diagnostics`](Self::with_diagnostics) to keep them elsewhere.
    pub fn new(options: EngineOptions) -> Self {
        let metadata = Arc::new(MetadataCache::new(options.metadata_cache_capacity));
        Self { options, metadata, diagnostics: default_diagnostics() }
    }

    /// Environment backed by the process-wide metadata cache.
    pub fn shared(options: EngineOptions) -> Self {
        Self { options, metadata: MetadataCache::global(), diagnostics: default_diagnostics() }
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn with_metadata_cache(mut self, metadata: Arc<MetadataCache>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn metadata(&self) -> &Arc<MetadataCache> {
        &self.metadata
    }

    pub fn diagnostics(&self) -> &dyn DiagnosticSink {
        self.diagnostics.as_ref()
    }
}

impl Default for TagEnvironment {
    fn default() -> Self {
        Self::new(EngineOptions::default())
    }
}

/// Configuration every handler is constructed from.
#[derive(Clone)]
pub struct TagConfig {
    pub tag: Arc<Tag>,
    pub tag_id: String,
    pub environment: Arc<TagEnvironment>,
}

impl TagConfig {
    pub fn new(tag: Arc<Tag>, tag_id: impl Into<String>, environment: Arc<TagEnvironment>) -> Self {
        Self { tag, tag_id: tag_id.into(), environment }
    }
}

impl fmt::Debug for TagConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagConfig")
            .field("tag", &self.tag.qname())
            .field("tag_id", &self.tag_id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct ComponentConfig {
    pub tag_config: TagConfig,
    pub component_type: String,
    pub renderer_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ConverterConfig {
    pub tag_config: TagConfig,
    pub converter_id: String,
}

#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    pub tag_config: TagConfig,
    pub validator_id: String,
}

#[derive(Debug, Clone)]
pub struct BehaviorConfig {
    pub tag_config: TagConfig,
    pub behavior_id: String,
}

/// Builds or configures part of the tree for one tag occurrence.
pub trait TagHandler: Send + Sync {
    fn tag(&self) -> &Arc<Tag>;

    fn apply(&self, ctx: &dyn FaceletContext, target: &mut dyn Bindable) -> Result<(), FaceletError>;
}

type RulesetCustomizer = dyn Fn(&mut MetaRuleset) + Send + Sync;

/// Binds the tag's attributes onto the target through a [`MetaRuleset`].
///
/// The binder is cached for the target type seen last, so a handler applied to
/// many instances of one type builds it once.
pub struct MetaTagHandler {
    config: TagConfig,
    customizers: Vec<Box<RulesetCustomizer>>,
    cached: Mutex<Option<(TypeId, Binder)>>,
}

impl MetaTagHandler {
    pub fn new(config: TagConfig) -> Self {
        Self { config, customizers: Vec::new(), cached: Mutex::new(None) }
    }

    /// Adds a step that adjusts every ruleset this handler creates.
    pub fn with_rules<F>(mut self, customize: F) -> Self
    where
        F: Fn(&mut MetaRuleset) + Send + Sync + 'static,
    {
        self.customizers.push(Box::new(customize));
        self
    }

    pub fn config(&self) -> &TagConfig {
        &self.config
    }

    pub fn binder_for(&self, target: TargetType) -> Binder {
        if let Some((id, binder)) = self.cached.lock().unwrap_or_else(PoisonError::into_inner).as_ref()
            && *id == target.id()
        {
            return binder.clone();
        }

        let environment = &self.config.environment;
        let metadata = environment.metadata().metadata_for(&target);
        let mut ruleset = MetaRuleset::new(&self.config.tag, metadata);
        for customize in &self.customizers {
            customize(&mut ruleset);
        }
        let binder = ruleset.finish(environment.diagnostics());
        *self.cached.lock().unwrap_or_else(PoisonError::into_inner) =
            Some((target.id(), binder.clone()));
        binder
    }

    pub fn set_attributes(
        &self,
        ctx: &dyn FaceletContext,
        target: &mut dyn Bindable,
    ) -> Result<(), FaceletError> {
        let binder = self.binder_for(target.target_type());
        binder.apply(ctx, target.as_any_mut())
    }
}

impl TagHandler for MetaTagHandler {
    fn tag(&self) -> &Arc<Tag> {
        &self.config.tag
    }

    fn apply(&self, ctx: &dyn FaceletContext, target: &mut dyn Bindable) -> Result<(), FaceletError> {
        self.set_attributes(ctx, target)
    }
}

/// Handler for a component tag; `binding` and `id` are handled by the tree, not bound.
pub struct ComponentHandler {
    meta: MetaTagHandler,
    component_type: String,
    renderer_type: Option<String>,
}

impl ComponentHandler {
    pub fn new(config: ComponentConfig) -> Self {
        let meta = MetaTagHandler::new(config.tag_config).with_rules(|ruleset| {
            ruleset.ignore("binding").ignore("id");
        });
        Self { meta, component_type: config.component_type, renderer_type: config.renderer_type }
    }

    pub fn with_rules<F>(mut self, customize: F) -> Self
    where
        F: Fn(&mut MetaRuleset) + Send + Sync + 'static,
    {
        self.meta = self.meta.with_rules(customize);
        self
    }

    pub fn component_type(&self) -> &str {
        &self.component_type
    }

    pub fn renderer_type(&self) -> Option<&str> {
        self.renderer_type.as_deref()
    }

    /// The `id` attribute if present, otherwise the generated tag id.
    pub fn component_id(&self, ctx: &dyn FaceletContext) -> Result<String, FaceletError> {
        match self.meta.config.tag.attributes().get_local("id") {
            Some(id) => Ok(id.get_value(ctx)?),
            None => Ok(self.meta.config.tag_id.clone()),
        }
    }
}

impl TagHandler for ComponentHandler {
    fn tag(&self) -> &Arc<Tag> {
        self.meta.tag()
    }

    fn apply(&self, ctx: &dyn FaceletContext, target: &mut dyn Bindable) -> Result<(), FaceletError> {
        self.meta.set_attributes(ctx, target)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacesObjectKind {
    Converter,
    Validator,
    Behavior,
}

impl FacesObjectKind {
    fn ignored(self) -> &'static [&'static str] {
        match self {
            FacesObjectKind::Converter => &["binding", "for"],
            FacesObjectKind::Validator => &["binding", "disabled", "for"],
            FacesObjectKind::Behavior => &["binding", "event", "for"],
        }
    }
}

/// Handler for converter, validator and behavior tags.
pub struct FacesObjectHandler {
    meta: MetaTagHandler,
    kind: FacesObjectKind,
    object_id: String,
}

impl FacesObjectHandler {
    pub fn new(kind: FacesObjectKind, object_id: impl Into<String>, config: TagConfig) -> Self {
        let meta = MetaTagHandler::new(config).with_rules(move |ruleset| {
            for name in kind.ignored() {
                ruleset.ignore(name);
            }
        });
        Self { meta, kind, object_id: object_id.into() }
    }

    pub fn converter(config: ConverterConfig) -> Self {
        Self::new(FacesObjectKind::Converter, config.converter_id, config.tag_config)
    }

    pub fn validator(config: ValidatorConfig) -> Self {
        Self::new(FacesObjectKind::Validator, config.validator_id, config.tag_config)
    }

    pub fn behavior(config: BehaviorConfig) -> Self {
        Self::new(FacesObjectKind::Behavior, config.behavior_id, config.tag_config)
    }

    pub fn kind(&self) -> FacesObjectKind {
        self.kind
    }

    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    /// Whether a `disabled` attribute switches the object off.
    pub fn is_disabled(&self, ctx: &dyn FaceletContext) -> Result<bool, FaceletError> {
        match self.meta.config.tag.attributes().get_local("disabled") {
            Some(disabled) => Ok(disabled.get_boolean(ctx)?),
            None => Ok(false),
        }
    }
}

impl TagHandler for FacesObjectHandler {
    fn tag(&self) -> &Arc<Tag> {
        self.meta.tag()
    }

    fn apply(&self, ctx: &dyn FaceletContext, target: &mut dyn Bindable) -> Result<(), FaceletError> {
        if self.is_disabled(ctx)? {
            return Ok(());
        }
        self.meta.set_attributes(ctx, target)
    }
}

/// Literal attributes as strings, deferred ones as unevaluated expressions.
fn template_params(
    tag: &Tag,
    ctx: &dyn FaceletContext,
) -> Result<Vec<(String, Value)>, FaceletError> {
    tag.attributes()
        .all()
        .iter()
        .map(|attribute| -> Result<(String, Value), FaceletError> {
            let value = if attribute.is_literal() {
                Value::from(attribute.value())
            } else {
                Value::Expression(attribute.get_value_expression(ctx, ValueType::Any)?)
            };
            Ok((attribute.local_name().to_owned(), value))
        })
        .collect()
}

/// Includes a template with the tag's attributes bound as parameters.
pub struct UserTagHandler {
    tag: Arc<Tag>,
    source: String,
}

impl UserTagHandler {
    pub fn new(config: TagConfig, source: impl Into<String>) -> Self {
        Self { tag: config.tag, source: source.into() }
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl TagHandler for UserTagHandler {
    fn tag(&self) -> &Arc<Tag> {
        &self.tag
    }

    fn apply(&self, ctx: &dyn FaceletContext, _target: &mut dyn Bindable) -> Result<(), FaceletError> {
        let params = template_params(&self.tag, ctx)?;
        tracing::debug!(tag = self.tag.qname(), source = %self.source, "including user tag");
        ctx.include_template(&self.source, &params)
    }
}

/// Instantiates a composite component from its located resource.
pub struct CompositeComponentTagHandler {
    tag: Arc<Tag>,
    resource: Resource,
}

impl CompositeComponentTagHandler {
    pub fn new(config: ComponentConfig, resource: Resource) -> Self {
        Self { tag: config.tag_config.tag, resource }
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }
}

impl TagHandler for CompositeComponentTagHandler {
    fn tag(&self) -> &Arc<Tag> {
        &self.tag
    }

    fn apply(&self, ctx: &dyn FaceletContext, _target: &mut dyn Bindable) -> Result<(), FaceletError> {
        let params = template_params(&self.tag, ctx)?;
        let pushed = ctx.push_composite_component(self.tag.location());
        let result = ctx.include_template(self.resource.id(), &params);
        if pushed {
            ctx.pop_composite_component();
        }
        result
    }
}

type Construct<C> = dyn Fn(C) -> Result<Arc<dyn TagHandler>, FaceletError> + Send + Sync;

/// Constructor contract of a user handler class: the one config it accepts.
#[derive(Clone)]
pub enum HandlerConstructor {
    Tag(Arc<Construct<TagConfig>>),
    Component(Arc<Construct<ComponentConfig>>),
    Converter(Arc<Construct<ConverterConfig>>),
    Validator(Arc<Construct<ValidatorConfig>>),
    Behavior(Arc<Construct<BehaviorConfig>>),
}

impl HandlerConstructor {
    fn accepts(&self) -> &'static str {
        match self {
            HandlerConstructor::Tag(_) => "TagConfig",
            HandlerConstructor::Component(_) => "ComponentConfig",
            HandlerConstructor::Converter(_) => "ConverterConfig",
            HandlerConstructor::Validator(_) => "ValidatorConfig",
            HandlerConstructor::Behavior(_) => "BehaviorConfig",
        }
    }
}

/// A user-supplied handler type registered with a tag library.
#[derive(Clone)]
pub struct HandlerClass {
    name: Arc<str>,
    constructor: HandlerConstructor,
}

macro_rules! handler_class_constructor {
    ($fn_name:ident, $variant:ident, $config:ty) => {
        pub fn $fn_name<F>(name: impl Into<Arc<str>>, construct: F) -> Self
        where
            F: Fn($config) -> Result<Arc<dyn TagHandler>, FaceletError> + Send + Sync + 'static,
        {
            Self { name: name.into(), constructor: HandlerConstructor::$variant(Arc::new(construct)) }
        }
    };
}

impl HandlerClass {
    handler_class_constructor!(tag, Tag, TagConfig);
    handler_class_constructor!(component, Component, ComponentConfig);
    handler_class_constructor!(converter, Converter, ConverterConfig);
    handler_class_constructor!(validator, Validator, ValidatorConfig);
    handler_class_constructor!(behavior, Behavior, BehaviorConfig);

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn constructor(&self) -> &HandlerConstructor {
        &self.constructor
    }

    fn shape_error(&self, expected: &'static str) -> FaceletError {
        tracing::error!(
            handler = %self.name,
            accepts = self.constructor.accepts(),
            expected,
            "handler class has the wrong constructor shape"
        );
        ConfigurationError::ConstructorShape { handler: self.name.to_string(), expected }.into()
    }

    pub fn instantiate_tag(&self, config: TagConfig) -> Result<Arc<dyn TagHandler>, FaceletError> {
        match &self.constructor {
            HandlerConstructor::Tag(construct) => construct(config),
            _ => Err(self.shape_error("TagConfig")),
        }
    }

    pub fn instantiate_component(
        &self,
        config: ComponentConfig,
    ) -> Result<Arc<dyn TagHandler>, FaceletError> {
        match &self.constructor {
            HandlerConstructor::Component(construct) => construct(config),
            _ => Err(self.shape_error("ComponentConfig")),
        }
    }

    pub fn instantiate_converter(
        &self,
        config: ConverterConfig,
    ) -> Result<Arc<dyn TagHandler>, FaceletError> {
        match &self.constructor {
            HandlerConstructor::Converter(construct) => construct(config),
            _ => Err(self.shape_error("ConverterConfig")),
        }
    }

    pub fn instantiate_validator(
        &self,
        config: ValidatorConfig,
    ) -> Result<Arc<dyn TagHandler>, FaceletError> {
        match &self.constructor {
            HandlerConstructor::Validator(construct) => construct(config),
            _ => Err(self.shape_error("ValidatorConfig")),
        }
    }

    pub fn instantiate_behavior(
        &self,
        config: BehaviorConfig,
    ) -> Result<Arc<dyn TagHandler>, FaceletError> {
        match &self.constructor {
            HandlerConstructor::Behavior(construct) => construct(config),
            _ => Err(self.shape_error("BehaviorConfig")),
        }
    }
}

impl fmt::Debug for HandlerClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerClass")
            .field("name", &self.name)
            .field("accepts", &self.constructor.accepts())
            .finish()
    }
}
