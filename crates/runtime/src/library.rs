//! Tag libraries: where a namespaced tag finds its handler.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tagforge_core::component::{ComponentTagRegistration, component_tag_registrations};
use tagforge_core::{FaceletError, Function, Location, TagError, namespaces};

use crate::handler::{
    BehaviorConfig, ComponentConfig, ComponentHandler, CompositeComponentTagHandler,
    ConverterConfig, FacesObjectHandler, HandlerClass, TagConfig, TagHandler, UserTagHandler,
    ValidatorConfig,
};

/// Component type every composite component is created as.
pub const COMPOSITE_COMPONENT_TYPE: &str = "jakarta.faces.NamingContainer";

const MISSING_COMPOSITE_SOURCE: &str =
    "Cannot create composite component tag handler for composite-source element in taglib.xml file";

/// Source of tag handlers and functions for one or more namespaces.
pub trait TagLibrary: Send + Sync {
    fn contains_namespace(&self, namespace: &str) -> bool;

    fn contains_tag_handler(&self, namespace: &str, local_name: &str) -> bool;

    /// Handler for the tag described by `config`, or `None` when this library
    /// does not define it.
    fn create_tag_handler(
        &self,
        namespace: &str,
        local_name: &str,
        config: TagConfig,
    ) -> Result<Option<Arc<dyn TagHandler>>, FaceletError>;

    fn contains_function(&self, namespace: &str, name: &str) -> bool;

    fn create_function(&self, namespace: &str, name: &str) -> Option<Function>;
}

/// A template resource addressed by library and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Resource {
    id: String,
    library: String,
    name: String,
}

impl Resource {
    pub fn new(library: impl Into<String>, name: impl Into<String>) -> Self {
        let library = library.into();
        let name = name.into();
        let id = if library.is_empty() { name.clone() } else { format!("{library}/{name}") };
        Self { id, library, name }
    }

    /// Parses `library/name`; an id without a slash has no library.
    pub fn from_id(id: &str) -> Self {
        match id.rsplit_once('/') {
            Some((library, name)) => Self::new(library, name),
            None => Self::new("", id),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn library(&self) -> &str {
        &self.library
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Finds template resources for composite components.
pub trait ResourceLocator: Send + Sync {
    fn create_resource_from_id(&self, id: &str) -> Option<Resource>;

    fn create_resource(&self, name: &str, library: &str) -> Option<Resource>;

    fn library_exists(&self, library: &str) -> bool;
}

/// Locator over a fixed set of resources.
#[derive(Debug, Clone, Default)]
pub struct StaticResourceLocator {
    resources: HashMap<String, Resource>,
}

impl StaticResourceLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource(mut self, library: &str, name: &str) -> Self {
        let resource = Resource::new(library, name);
        self.resources.insert(resource.id().to_owned(), resource);
        self
    }
}

impl ResourceLocator for StaticResourceLocator {
    fn create_resource_from_id(&self, id: &str) -> Option<Resource> {
        self.resources.get(id).cloned()
    }

    fn create_resource(&self, name: &str, library: &str) -> Option<Resource> {
        self.create_resource_from_id(Resource::new(library, name).id())
    }

    fn library_exists(&self, library: &str) -> bool {
        self.resources.values().any(|resource| resource.library() == library)
    }
}

/// How a registered tag turns into a handler.
#[derive(Clone)]
enum TagHandlerFactory {
    Component { component_type: String, renderer_type: Option<String>, class: Option<HandlerClass> },
    Converter { converter_id: String, class: Option<HandlerClass> },
    Validator { validator_id: String, class: Option<HandlerClass> },
    Behavior { behavior_id: String, class: Option<HandlerClass> },
    Handler(HandlerClass),
    UserTag { source: String },
    CompositeComponent { resource_id: String },
}

impl TagHandlerFactory {
    fn create(
        &self,
        config: TagConfig,
        locator: Option<&dyn ResourceLocator>,
    ) -> Result<Arc<dyn TagHandler>, FaceletError> {
        match self {
            TagHandlerFactory::Component { component_type, renderer_type, class } => {
                let config = ComponentConfig {
                    tag_config: config,
                    component_type: component_type.clone(),
                    renderer_type: renderer_type.clone(),
                };
                match class {
                    Some(class) => class.instantiate_component(config),
                    None => Ok(Arc::new(ComponentHandler::new(config))),
                }
            }
            TagHandlerFactory::Converter { converter_id, class } => {
                let config = ConverterConfig { tag_config: config, converter_id: converter_id.clone() };
                match class {
                    Some(class) => class.instantiate_converter(config),
                    None => Ok(Arc::new(FacesObjectHandler::converter(config))),
                }
            }
            TagHandlerFactory::Validator { validator_id, class } => {
                let config = ValidatorConfig { tag_config: config, validator_id: validator_id.clone() };
                match class {
                    Some(class) => class.instantiate_validator(config),
                    None => Ok(Arc::new(FacesObjectHandler::validator(config))),
                }
            }
            TagHandlerFactory::Behavior { behavior_id, class } => {
                let config = BehaviorConfig { tag_config: config, behavior_id: behavior_id.clone() };
                match class {
                    Some(class) => class.instantiate_behavior(config),
                    None => Ok(Arc::new(FacesObjectHandler::behavior(config))),
                }
            }
            TagHandlerFactory::Handler(class) => class.instantiate_tag(config),
            TagHandlerFactory::UserTag { source } => Ok(Arc::new(UserTagHandler::new(config, source.clone()))),
            TagHandlerFactory::CompositeComponent { resource_id } => {
                let Some(resource) = locator.and_then(|locator| locator.create_resource_from_id(resource_id))
                else {
                    return Err(TagError::at(
                        Location::new(resource_id.as_str(), 0, 0),
                        config.tag.qname(),
                        MISSING_COMPOSITE_SOURCE,
                    )
                    .into());
                };
                let config = ComponentConfig {
                    tag_config: config,
                    component_type: COMPOSITE_COMPONENT_TYPE.to_owned(),
                    renderer_type: None,
                };
                Ok(Arc::new(CompositeComponentTagHandler::new(config, resource)))
            }
        }
    }
}

/// Library for a single namespace with explicitly registered tags and functions.
#[derive(Clone)]
pub struct SimpleTagLibrary {
    namespace: String,
    factories: HashMap<String, TagHandlerFactory>,
    functions: HashMap<String, Function>,
    locator: Option<Arc<dyn ResourceLocator>>,
}

impl SimpleTagLibrary {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            factories: HashMap::new(),
            functions: HashMap::new(),
            locator: None,
        }
    }

    pub fn with_resource_locator(mut self, locator: Arc<dyn ResourceLocator>) -> Self {
        self.locator = Some(locator);
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn register(&mut self, name: &str, factory: TagHandlerFactory) -> &mut Self {
        if self.factories.insert(name.to_owned(), factory).is_some() {
            tracing::debug!(namespace = %self.namespace, tag = name, "tag registration replaced");
        }
        self
    }

    pub fn add_component(
        &mut self,
        name: &str,
        component_type: &str,
        renderer_type: Option<&str>,
    ) -> &mut Self {
        self.register(name, TagHandlerFactory::Component {
            component_type: component_type.to_owned(),
            renderer_type: renderer_type.map(str::to_owned),
            class: None,
        })
    }

    /// Component tag whose handler is built by `class` from a [`ComponentConfig`].
    pub fn add_component_with_handler(
        &mut self,
        name: &str,
        component_type: &str,
        renderer_type: Option<&str>,
        class: HandlerClass,
    ) -> &mut Self {
        self.register(name, TagHandlerFactory::Component {
            component_type: component_type.to_owned(),
            renderer_type: renderer_type.map(str::to_owned),
            class: Some(class),
        })
    }

    pub fn add_converter(&mut self, name: &str, converter_id: &str, class: Option<HandlerClass>) -> &mut Self {
        self.register(name, TagHandlerFactory::Converter { converter_id: converter_id.to_owned(), class })
    }

    pub fn add_validator(&mut self, name: &str, validator_id: &str, class: Option<HandlerClass>) -> &mut Self {
        self.register(name, TagHandlerFactory::Validator { validator_id: validator_id.to_owned(), class })
    }

    pub fn add_behavior(&mut self, name: &str, behavior_id: &str, class: Option<HandlerClass>) -> &mut Self {
        self.register(name, TagHandlerFactory::Behavior { behavior_id: behavior_id.to_owned(), class })
    }

    /// Raw handler class constructed from a [`TagConfig`].
    pub fn add_tag_handler(&mut self, name: &str, class: HandlerClass) -> &mut Self {
        self.register(name, TagHandlerFactory::Handler(class))
    }

    /// Tag that includes the template at `source`.
    pub fn add_user_tag(&mut self, name: &str, source: &str) -> &mut Self {
        self.register(name, TagHandlerFactory::UserTag { source: source.to_owned() })
    }

    /// Composite component defined by the resource `resource_id` (`library/name`).
    pub fn add_composite_component_tag(&mut self, name: &str, resource_id: &str) -> &mut Self {
        self.register(name, TagHandlerFactory::CompositeComponent { resource_id: resource_id.to_owned() })
    }

    pub fn add_function(&mut self, function: Function) -> &mut Self {
        self.functions.insert(function.name().to_owned(), function);
        self
    }
}

impl TagLibrary for SimpleTagLibrary {
    fn contains_namespace(&self, namespace: &str) -> bool {
        self.namespace == namespace
    }

    fn contains_tag_handler(&self, namespace: &str, local_name: &str) -> bool {
        self.contains_namespace(namespace) && self.factories.contains_key(local_name)
    }

    fn create_tag_handler(
        &self,
        namespace: &str,
        local_name: &str,
        config: TagConfig,
    ) -> Result<Option<Arc<dyn TagHandler>>, FaceletError> {
        if !self.contains_namespace(namespace) {
            return Ok(None);
        }
        match self.factories.get(local_name) {
            Some(factory) => factory.create(config, self.locator.as_deref()).map(Some),
            None => Ok(None),
        }
    }

    fn contains_function(&self, namespace: &str, name: &str) -> bool {
        self.contains_namespace(namespace) && self.functions.contains_key(name)
    }

    fn create_function(&self, namespace: &str, name: &str) -> Option<Function> {
        if !self.contains_namespace(namespace) {
            return None;
        }
        self.functions.get(name).cloned()
    }
}

impl fmt::Debug for SimpleTagLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<_> = self.factories.keys().collect();
        tags.sort();
        f.debug_struct("SimpleTagLibrary")
            .field("namespace", &self.namespace)
            .field("tags", &tags)
            .field("functions", &self.functions.len())
            .finish_non_exhaustive()
    }
}

/// A kind of library that exists for a namespace only once someone asks for it.
pub trait LazyLibraryFamily: Send + Sync {
    fn name(&self) -> &str;

    fn tag_library_for_ns_exists(&self, namespace: &str) -> bool;

    fn create_library(&self, namespace: &str) -> Arc<dyn TagLibrary>;
}

/// Ordered set of libraries queried first-match.
///
/// Libraries discovered through a lazy family are appended to the published
/// list at most once per namespace. Readers load a snapshot and are never
/// blocked by discovery.
pub struct CompositeTagLibrary {
    libraries: ArcSwap<Vec<Arc<dyn TagLibrary>>>,
    families: Vec<Arc<dyn LazyLibraryFamily>>,
}

impl Default for CompositeTagLibrary {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl CompositeTagLibrary {
    pub fn new(libraries: Vec<Arc<dyn TagLibrary>>) -> Self {
        Self { libraries: ArcSwap::from_pointee(libraries), families: Vec::new() }
    }

    pub fn with_family(mut self, family: Arc<dyn LazyLibraryFamily>) -> Self {
        self.families.push(family);
        self
    }

    /// Snapshot of the current member list in registration order.
    pub fn libraries(&self) -> Arc<Vec<Arc<dyn TagLibrary>>> {
        self.libraries.load_full()
    }

    pub fn len(&self) -> usize {
        self.libraries.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn add_library(&self, library: Arc<dyn TagLibrary>) {
        self.libraries.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(Arc::clone(&library));
            next
        });
    }

    fn claimed(&self, namespace: &str) -> bool {
        self.libraries.load().iter().any(|library| library.contains_namespace(namespace))
    }

    /// Appends a library for `namespace` from the first family that has one.
    fn discover(&self, namespace: &str) -> bool {
        let Some(family) = self.families.iter().find(|family| family.tag_library_for_ns_exists(namespace))
        else {
            return false;
        };

        let library = family.create_library(namespace);
        let mut appended = false;
        self.libraries.rcu(|current| {
            if current.iter().any(|existing| existing.contains_namespace(namespace)) {
                appended = false;
                return Arc::clone(current);
            }
            appended = true;
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(Arc::clone(&library));
            Arc::new(next)
        });
        if appended {
            tracing::debug!(namespace, family = family.name(), "discovered tag library");
        }
        true
    }

    fn ensure(&self, namespace: &str) {
        if !self.claimed(namespace) {
            self.discover(namespace);
        }
    }
}

impl TagLibrary for CompositeTagLibrary {
    fn contains_namespace(&self, namespace: &str) -> bool {
        self.claimed(namespace) || self.discover(namespace)
    }

    fn contains_tag_handler(&self, namespace: &str, local_name: &str) -> bool {
        self.ensure(namespace);
        self.libraries.load().iter().any(|library| library.contains_tag_handler(namespace, local_name))
    }

    fn create_tag_handler(
        &self,
        namespace: &str,
        local_name: &str,
        config: TagConfig,
    ) -> Result<Option<Arc<dyn TagHandler>>, FaceletError> {
        self.ensure(namespace);
        let libraries = self.libraries.load_full();
        match libraries.iter().find(|library| library.contains_tag_handler(namespace, local_name)) {
            Some(library) => library.create_tag_handler(namespace, local_name, config),
            None => Ok(None),
        }
    }

    fn contains_function(&self, namespace: &str, name: &str) -> bool {
        self.ensure(namespace);
        self.libraries.load().iter().any(|library| library.contains_function(namespace, name))
    }

    fn create_function(&self, namespace: &str, name: &str) -> Option<Function> {
        self.ensure(namespace);
        self.libraries
            .load()
            .iter()
            .find(|library| library.contains_function(namespace, name))
            .and_then(|library| library.create_function(namespace, name))
    }
}

impl fmt::Debug for CompositeTagLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeTagLibrary")
            .field("libraries", &self.len())
            .field("families", &self.families.iter().map(|family| family.name()).collect::<Vec<_>>())
            .finish()
    }
}

/// Library of composite components whose templates live in a resource library
/// named after the namespace, e.g. `jakarta.faces.composite/ui`.
pub struct CompositeComponentTagLibrary {
    namespace: String,
    library_name: Option<String>,
    locator: Arc<dyn ResourceLocator>,
    detect_missing_libraries: bool,
}

impl CompositeComponentTagLibrary {
    pub fn new(namespace: impl Into<String>, locator: Arc<dyn ResourceLocator>) -> Self {
        let namespace = namespace.into();
        let library_name = namespaces::composite_library_name(&namespace).map(str::to_owned);
        Self { namespace, library_name, locator, detect_missing_libraries: false }
    }

    /// Only claim a namespace whose resource library actually exists.
    pub fn with_missing_resource_library_detection(mut self, enabled: bool) -> Self {
        self.detect_missing_libraries = enabled;
        self
    }

    pub fn library_name(&self) -> Option<&str> {
        self.library_name.as_deref()
    }

    pub fn tag_library_for_ns_exists(&self, namespace: &str) -> bool {
        match namespaces::composite_library_name(namespace) {
            Some(library) if self.detect_missing_libraries => self.locator.library_exists(library),
            Some(_) => true,
            None => false,
        }
    }

    fn resource_for(&self, local_name: &str) -> Option<Resource> {
        let library = self.library_name.as_deref()?;
        self.locator.create_resource(&format!("{local_name}.xhtml"), library)
    }
}

impl TagLibrary for CompositeComponentTagLibrary {
    fn contains_namespace(&self, namespace: &str) -> bool {
        self.namespace == namespace
    }

    fn contains_tag_handler(&self, namespace: &str, local_name: &str) -> bool {
        self.contains_namespace(namespace) && self.resource_for(local_name).is_some()
    }

    fn create_tag_handler(
        &self,
        namespace: &str,
        local_name: &str,
        config: TagConfig,
    ) -> Result<Option<Arc<dyn TagHandler>>, FaceletError> {
        if !self.contains_namespace(namespace) {
            return Ok(None);
        }
        let Some(resource) = self.resource_for(local_name) else {
            return Ok(None);
        };
        let config = ComponentConfig {
            tag_config: config,
            component_type: COMPOSITE_COMPONENT_TYPE.to_owned(),
            renderer_type: None,
        };
        Ok(Some(Arc::new(CompositeComponentTagHandler::new(config, resource))))
    }

    fn contains_function(&self, _namespace: &str, _name: &str) -> bool {
        false
    }

    fn create_function(&self, _namespace: &str, _name: &str) -> Option<Function> {
        None
    }
}

/// Discovers [`CompositeComponentTagLibrary`] instances by namespace convention.
pub struct CompositeComponentFamily {
    locator: Arc<dyn ResourceLocator>,
    detect_missing_libraries: bool,
}

impl CompositeComponentFamily {
    pub fn new(locator: Arc<dyn ResourceLocator>, detect_missing_libraries: bool) -> Self {
        Self { locator, detect_missing_libraries }
    }

    fn library(&self, namespace: &str) -> CompositeComponentTagLibrary {
        CompositeComponentTagLibrary::new(namespace, Arc::clone(&self.locator))
            .with_missing_resource_library_detection(self.detect_missing_libraries)
    }
}

impl LazyLibraryFamily for CompositeComponentFamily {
    fn name(&self) -> &str {
        "composite-component"
    }

    fn tag_library_for_ns_exists(&self, namespace: &str) -> bool {
        self.library(namespace).tag_library_for_ns_exists(namespace)
    }

    fn create_library(&self, namespace: &str) -> Arc<dyn TagLibrary> {
        Arc::new(self.library(namespace))
    }
}

/// Components registered for tag creation under one namespace.
#[derive(Debug, Clone)]
pub struct AnnotatedComponentTagLibrary {
    namespace: String,
    components: HashMap<String, (String, Option<String>)>,
}

impl AnnotatedComponentTagLibrary {
    /// Library holding every registration in `registrations` for `namespace`.
    pub fn new<'a>(
        namespace: impl Into<String>,
        registrations: impl IntoIterator<Item = &'a ComponentTagRegistration>,
    ) -> Self {
        let namespace = namespace.into();
        let components = registrations
            .into_iter()
            .filter(|registration| registration.namespace == namespace)
            .map(|registration| {
                (
                    registration.tag_name.to_owned(),
                    (
                        registration.component_type.to_owned(),
                        registration.renderer_type.map(str::to_owned),
                    ),
                )
            })
            .collect();
        Self { namespace, components }
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl TagLibrary for AnnotatedComponentTagLibrary {
    fn contains_namespace(&self, namespace: &str) -> bool {
        self.namespace == namespace
    }

    fn contains_tag_handler(&self, namespace: &str, local_name: &str) -> bool {
        self.contains_namespace(namespace) && self.components.contains_key(local_name)
    }

    fn create_tag_handler(
        &self,
        namespace: &str,
        local_name: &str,
        config: TagConfig,
    ) -> Result<Option<Arc<dyn TagHandler>>, FaceletError> {
        if !self.contains_namespace(namespace) {
            return Ok(None);
        }
        let Some((component_type, renderer_type)) = self.components.get(local_name) else {
            return Ok(None);
        };
        let config = ComponentConfig {
            tag_config: config,
            component_type: component_type.clone(),
            renderer_type: renderer_type.clone(),
        };
        Ok(Some(Arc::new(ComponentHandler::new(config))))
    }

    fn contains_function(&self, _namespace: &str, _name: &str) -> bool {
        false
    }

    fn create_function(&self, _namespace: &str, _name: &str) -> Option<Function> {
        None
    }
}

/// Discovers [`AnnotatedComponentTagLibrary`] instances from link-time
/// registrations plus any added explicitly.
#[derive(Debug, Clone, Default)]
pub struct AnnotatedComponentFamily {
    extra: Vec<ComponentTagRegistration>,
}

impl AnnotatedComponentFamily {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registration(mut self, registration: ComponentTagRegistration) -> Self {
        self.extra.push(registration);
        self
    }

    fn registrations(&self) -> impl Iterator<Item = &ComponentTagRegistration> {
        component_tag_registrations()
            .map(|registration| registration as &ComponentTagRegistration)
            .chain(&self.extra)
    }
}

impl LazyLibraryFamily for AnnotatedComponentFamily {
    fn name(&self) -> &str {
        "annotated-component"
    }

    fn tag_library_for_ns_exists(&self, namespace: &str) -> bool {
        self.registrations().any(|registration| registration.namespace == namespace)
    }

    fn create_library(&self, namespace: &str) -> Arc<dyn TagLibrary> {
        Arc::new(AnnotatedComponentTagLibrary::new(namespace, self.registrations()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::TagEnvironment;
    use rstest::{fixture, rstest};
    use tagforge_core::{
        ConfigurationError, Introspect, PropertyDescriptor, Tag, TagAttributes, Value,
    };
    use tagforge_expression_mock::MockContext;

    struct Blank;

    impl Introspect for Blank {
        fn properties() -> Vec<PropertyDescriptor> {
            Vec::new()
        }
    }

    const UI: &str = "jakarta.faces.composite/ui";

    fn config(namespace: &str, local_name: &str) -> TagConfig {
        let tag = Tag::new(
            Location::new("page.xhtml", 4, 3),
            namespace,
            local_name,
            format!("x:{local_name}"),
            TagAttributes::default(),
        );
        TagConfig::new(tag, "j_id1", Arc::new(TagEnvironment::default()))
    }

    #[fixture]
    fn locator() -> Arc<dyn ResourceLocator> {
        Arc::new(
            StaticResourceLocator::new()
                .with_resource("ui", "button.xhtml")
                .with_resource("forms", "field.xhtml"),
        )
    }

    fn library(namespace: &str, tag: &str) -> Arc<dyn TagLibrary> {
        let mut library = SimpleTagLibrary::new(namespace);
        library.add_component(tag, &format!("{namespace}.{tag}"), None);
        Arc::new(library)
    }

    #[rstest]
    #[case("ui/button.xhtml", "ui", "button.xhtml")]
    #[case("a/b/c.xhtml", "a/b", "c.xhtml")]
    #[case("plain.xhtml", "", "plain.xhtml")]
    fn resource_ids_split_at_last_slash(#[case] id: &str, #[case] library: &str, #[case] name: &str) {
        let resource = Resource::from_id(id);
        assert_eq!(resource.library(), library);
        assert_eq!(resource.name(), name);
        assert_eq!(resource.id(), id);
    }

    #[test]
    fn simple_library_creates_registered_handlers() {
        let mut library = SimpleTagLibrary::new("urn:app");
        library
            .add_component("panel", "app.Panel", Some("app.PanelRenderer"))
            .add_user_tag("card", "/tags/card.xhtml")
            .add_function(Function::new("upper", |args| {
                Ok(Value::from(
                    args.first().map(ToString::to_string).unwrap_or_default().to_uppercase(),
                ))
            }));

        assert!(library.contains_tag_handler("urn:app", "panel"));
        assert!(!library.contains_tag_handler("urn:other", "panel"));
        assert!(library.create_tag_handler("urn:app", "panel", config("urn:app", "panel")).unwrap().is_some());
        assert!(library.create_tag_handler("urn:app", "missing", config("urn:app", "missing")).unwrap().is_none());
        assert!(library.contains_function("urn:app", "upper"));
        let upper = library.create_function("urn:app", "upper").expect("function");
        assert_eq!(upper.call(&["a".into()]).unwrap(), Value::from("A"));
        assert!(library.create_function("urn:other", "upper").is_none());
    }

    #[rstest]
    fn composite_source_resolves_through_locator(locator: Arc<dyn ResourceLocator>) {
        let mut library = SimpleTagLibrary::new("urn:app").with_resource_locator(locator);
        library
            .add_composite_component_tag("button", "ui/button.xhtml")
            .add_composite_component_tag("ghost", "ui/ghost.xhtml");

        let handler = library.create_tag_handler("urn:app", "button", config("urn:app", "button"));
        assert!(handler.unwrap().is_some());

        let err = library
            .create_tag_handler("urn:app", "ghost", config("urn:app", "ghost"))
            .err()
            .expect("missing resource");
        let FaceletError::Tag(err) = err else { panic!("expected tag error, got {err:?}") };
        assert_eq!(err.location.path(), "ui/ghost.xhtml");
        assert_eq!(err.message, MISSING_COMPOSITE_SOURCE);
    }

    #[test]
    fn user_handler_class_with_wrong_shape_fails_at_creation() {
        let mut library = SimpleTagLibrary::new("urn:app");
        library.add_tag_handler(
            "odd",
            HandlerClass::validator("app.OddHandler", |config| {
                Ok(Arc::new(FacesObjectHandler::validator(config)) as Arc<dyn TagHandler>)
            }),
        );
        assert!(library.contains_tag_handler("urn:app", "odd"));
        let err = library.create_tag_handler("urn:app", "odd", config("urn:app", "odd")).err().expect("error");
        assert!(matches!(err, FaceletError::Configuration(ConfigurationError::ConstructorShape { .. })));
    }

    #[test]
    fn composite_library_is_first_match() {
        let mut first = SimpleTagLibrary::new("urn:a");
        first.add_user_tag("item", "/first.xhtml");
        let mut second = SimpleTagLibrary::new("urn:a");
        second.add_user_tag("item", "/second.xhtml").add_user_tag("extra", "/extra.xhtml");
        let composite = CompositeTagLibrary::new(vec![Arc::new(first), Arc::new(second)]);

        assert!(composite.contains_namespace("urn:a"));
        assert!(composite.contains_tag_handler("urn:a", "extra"));
        assert!(!composite.contains_tag_handler("urn:a", "none"));
        assert!(!composite.contains_namespace("urn:b"));

        let handler = composite
            .create_tag_handler("urn:a", "item", config("urn:a", "item"))
            .unwrap()
            .expect("handler");
        let ctx = MockContext::new();
        handler.apply(&ctx, &mut Blank).unwrap();
        assert_eq!(ctx.includes()[0].0, "/first.xhtml");
    }

    #[rstest]
    fn lazy_discovery_appends_once(locator: Arc<dyn ResourceLocator>) {
        let composite = CompositeTagLibrary::new(vec![library("urn:app", "panel")])
            .with_family(Arc::new(CompositeComponentFamily::new(locator, false)));
        assert_eq!(composite.len(), 1);

        assert!(composite.contains_namespace(UI));
        assert_eq!(composite.len(), 2);
        assert!(composite.contains_namespace(UI));
        assert!(composite.contains_tag_handler(UI, "button"));
        assert!(!composite.contains_tag_handler(UI, "missing"));
        assert_eq!(composite.len(), 2);
        assert!(!composite.contains_namespace("urn:unknown"));
        assert_eq!(composite.len(), 2);
    }

    #[rstest]
    #[case(false, "jakarta.faces.composite/nowhere", true)]
    #[case(true, "jakarta.faces.composite/nowhere", false)]
    #[case(true, "http://xmlns.jcp.org/jsf/composite/forms", true)]
    #[case(false, "jakarta.faces.html", false)]
    fn missing_library_detection_gates_discovery(
        locator: Arc<dyn ResourceLocator>,
        #[case] detect: bool,
        #[case] namespace: &str,
        #[case] exists: bool,
    ) {
        let family = CompositeComponentFamily::new(locator, detect);
        assert_eq!(family.tag_library_for_ns_exists(namespace), exists);
    }

    #[rstest]
    fn composite_component_library_creates_handlers(locator: Arc<dyn ResourceLocator>) {
        let library = CompositeComponentTagLibrary::new(UI, locator);
        assert_eq!(library.library_name(), Some("ui"));
        let handler = library.create_tag_handler(UI, "button", config(UI, "button")).unwrap();
        assert!(handler.is_some());
        assert!(library.create_tag_handler(UI, "ghost", config(UI, "ghost")).unwrap().is_none());
        assert!(!library.contains_function(UI, "anything"));
    }

    #[test]
    fn annotated_family_discovers_registered_components() {
        let family = AnnotatedComponentFamily::new().with_registration(ComponentTagRegistration {
            namespace: "urn:annotated",
            tag_name: "chart",
            component_type: "app.Chart",
            renderer_type: None,
        });
        assert!(family.tag_library_for_ns_exists("urn:annotated"));
        assert!(!family.tag_library_for_ns_exists("urn:nothing"));

        let composite = CompositeTagLibrary::default().with_family(Arc::new(family));
        assert!(composite.is_empty());
        assert!(composite.contains_tag_handler("urn:annotated", "chart"));
        assert_eq!(composite.len(), 1);
        assert!(
            composite
                .create_tag_handler("urn:annotated", "chart", config("urn:annotated", "chart"))
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn concurrent_discovery_appends_one_library() {
        let composite = Arc::new(CompositeTagLibrary::default().with_family(Arc::new(
            CompositeComponentFamily::new(Arc::new(StaticResourceLocator::new()), false),
        )));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let composite = Arc::clone(&composite);
                std::thread::spawn(move || composite.contains_namespace(UI))
            })
            .collect();
        for handle in handles {
            assert!(handle.join().expect("thread"));
        }
        assert_eq!(composite.len(), 1);
    }
}
