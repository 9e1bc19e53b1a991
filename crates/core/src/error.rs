use std::error::Error as StdError;

use thiserror::Error;

use crate::tag::{Location, Tag, TagAttribute};
use crate::value::ValueType;

/// Failures reported by the expression layer (parsing, coercion, evaluation).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    #[error("EL Expression Unbalanced: ... {0}")]
    Unbalanced(String),
    #[error("invalid expression '{expression}': {message}")]
    Syntax { expression: String, message: String },
    #[error("cannot coerce '{value}' to {expected}")]
    Coercion { value: String, expected: ValueType },
    #[error("target unreachable, identifier '{0}' resolved to null")]
    TargetUnreachable(String),
    #[error("property '{property}' not found on {base}")]
    PropertyNotFound { base: String, property: String },
    #[error("function '{0}' is not defined")]
    UnknownFunction(String),
    #[error("{0}")]
    NotCallable(String),
    #[error("{0}")]
    Evaluation(String),
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<ExpressionError>,
    },
}

impl ExpressionError {
    /// Wraps `self` with a textual context such as the attribute or location it came from.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::Context { context: context.into(), source: Box::new(self) }
    }

    /// Innermost error, skipping any context layers.
    pub fn root(&self) -> &ExpressionError {
        match self {
            Self::Context { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Writing to or reading from a target property failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PropertyError {
    #[error("property '{property}' is not writable on {target}")]
    NotWritable { property: String, target: String },
    #[error("property '{property}' is not readable on {target}")]
    NotReadable { property: String, target: String },
    #[error("property '{property}' expects {expected}, got {actual}")]
    TypeMismatch { property: String, expected: ValueType, actual: ValueType },
    #[error("property '{property}' was applied to an instance that is not a {target}")]
    WrongTarget { property: String, target: String },
}

/// Attribute-scoped failure: coercion, compilation or evaluation of one attribute.
#[derive(Debug, Error)]
#[error("{attribute} {message}")]
pub struct TagAttributeError {
    pub location: Location,
    pub attribute: String,
    pub message: String,
    #[source]
    pub cause: Option<Box<dyn StdError + Send + Sync>>,
}

impl TagAttributeError {
    pub fn new(attribute: &TagAttribute, message: impl Into<String>) -> Self {
        Self {
            location: attribute.location().clone(),
            attribute: attribute.to_string(),
            message: message.into(),
            cause: None,
        }
    }

    /// Builds the error from an underlying cause, reusing its message.
    pub fn caused_by<E>(attribute: &TagAttribute, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            location: attribute.location().clone(),
            attribute: attribute.to_string(),
            message: cause.to_string(),
            cause: Some(Box::new(cause)),
        }
    }

    /// Like [`caused_by`](Self::caused_by), but reports the innermost expression message
    /// since the context layers already name this attribute.
    pub fn from_expression(attribute: &TagAttribute, cause: ExpressionError) -> Self {
        Self {
            location: attribute.location().clone(),
            attribute: attribute.to_string(),
            message: cause.root().to_string(),
            cause: Some(Box::new(cause)),
        }
    }

    /// Cause as an expression error, if that is what it was.
    pub fn expression_cause(&self) -> Option<&ExpressionError> {
        self.cause.as_deref().and_then(|cause| cause.downcast_ref::<ExpressionError>())
    }
}

/// Tag-scoped failure: unresolvable tag or disallowed markup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{location} <{qname}> {message}")]
pub struct TagError {
    pub location: Location,
    pub qname: String,
    pub message: String,
}

impl TagError {
    pub fn new(tag: &Tag, message: impl Into<String>) -> Self {
        Self {
            location: tag.location().clone(),
            qname: tag.qname().to_owned(),
            message: message.into(),
        }
    }

    pub fn at(location: Location, qname: impl Into<String>, message: impl Into<String>) -> Self {
        Self { location, qname: qname.into(), message: message.into() }
    }
}

/// Structurally invalid extension or configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("{handler} must have a constructor that takes in a {expected}")]
    ConstructorShape { handler: String, expected: &'static str },
    #[error("invalid engine options: {0}")]
    Options(String),
}

/// Umbrella error returned by handler application and resolution.
#[derive(Debug, Error)]
pub enum FaceletError {
    #[error(transparent)]
    Expression(#[from] ExpressionError),
    #[error(transparent)]
    Attribute(#[from] TagAttributeError),
    #[error(transparent)]
    Tag(#[from] TagError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Property(#[from] PropertyError),
}
