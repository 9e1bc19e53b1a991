pub mod component;
pub mod diagnostics;
pub mod el;
pub mod error;
pub mod introspect;
pub mod namespaces;
pub mod tag;
pub mod value;

pub use diagnostics::{Diagnostic, DiagnosticCode, DiagnosticLog, DiagnosticSink, Severity};
pub use el::{
    ExpressionFactory, FaceletContext, Function, MethodExpression, ValueExpression,
};
pub use error::{
    ConfigurationError, ExpressionError, FaceletError, PropertyError, TagAttributeError, TagError,
};
pub use introspect::{Bindable, Introspect, PropertyDescriptor, PropertyIntrospector, TargetType};
pub use tag::{Location, Tag, TagAttribute, TagAttributes};
pub use value::{Value, ValueType};
