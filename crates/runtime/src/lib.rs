pub mod binding;
pub mod decorator;
pub mod handler;
pub mod library;
pub mod metadata;
pub mod options;
pub mod resolver;

pub use binding::{Applier, BeanPropertyRule, Binder, MetaRule, MetaRuleset, Metadata, MethodRule};
pub use decorator::{CompositeTagDecorator, DefaultTagDecorator, TagDecorator};
pub use handler::{
    BehaviorConfig, ComponentConfig, ComponentHandler, CompositeComponentTagHandler,
    ConverterConfig, DEFAULT_DIAGNOSTIC_CAPACITY, FacesObjectHandler, FacesObjectKind,
    HandlerClass, HandlerConstructor, MetaTagHandler, TagConfig, TagEnvironment, TagHandler,
    UserTagHandler, ValidatorConfig,
};
pub use library::{
    AnnotatedComponentFamily, AnnotatedComponentTagLibrary, CompositeComponentFamily,
    CompositeComponentTagLibrary, CompositeTagLibrary, LazyLibraryFamily, Resource,
    ResourceLocator, SimpleTagLibrary, StaticResourceLocator, TagLibrary,
};
pub use metadata::{MetadataCache, TargetMetadata};
pub use options::{EngineOptions, EngineOptionsBuilder, OptionsError, ProjectStage};
pub use resolver::{Resolution, TagResolver};
