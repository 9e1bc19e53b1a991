//! Property metadata for bind targets.
//!
//! Rust has no runtime reflection, so target types describe their properties
//! through [`Introspect`]. Each [`PropertyDescriptor`] carries type-erased
//! accessors that downcast the target before touching it.

use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::PropertyError;
use crate::value::{Value, ValueType};

type Writer = dyn Fn(&mut dyn Any, Value) -> Result<(), PropertyError> + Send + Sync;
type Reader = dyn Fn(&dyn Any) -> Result<Value, PropertyError> + Send + Sync;

/// One named property of a target type.
#[derive(Clone)]
pub struct PropertyDescriptor {
    name: Arc<str>,
    value_type: ValueType,
    writer: Option<Arc<Writer>>,
    reader: Option<Arc<Reader>>,
}

impl PropertyDescriptor {
    pub fn new(name: impl Into<Arc<str>>, value_type: ValueType) -> Self {
        Self { name: name.into(), value_type, writer: None, reader: None }
    }

    /// Makes the property writable on targets of type `T`.
    ///
    /// Values not accepted by the declared type are rejected before `set` runs.
    pub fn with_writer<T, F>(mut self, set: F) -> Self
    where
        T: Any,
        F: Fn(&mut T, Value) + Send + Sync + 'static,
    {
        let name = Arc::clone(&self.name);
        let value_type = self.value_type;
        self.writer = Some(Arc::new(move |target: &mut dyn Any, value: Value| {
            let target = target.downcast_mut::<T>().ok_or_else(|| PropertyError::WrongTarget {
                property: name.to_string(),
                target: type_name::<T>().to_owned(),
            })?;
            if !value_type.accepts(&value) {
                return Err(PropertyError::TypeMismatch {
                    property: name.to_string(),
                    expected: value_type,
                    actual: value.value_type(),
                });
            }
            set(target, value);
            Ok(())
        }));
        self
    }

    pub fn with_reader<T, F>(mut self, get: F) -> Self
    where
        T: Any,
        F: Fn(&T) -> Value + Send + Sync + 'static,
    {
        let name = Arc::clone(&self.name);
        self.reader = Some(Arc::new(move |target: &dyn Any| {
            target.downcast_ref::<T>().map(&get).ok_or_else(|| PropertyError::WrongTarget {
                property: name.to_string(),
                target: type_name::<T>().to_owned(),
            })
        }));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn is_writable(&self) -> bool {
        self.writer.is_some()
    }

    pub fn is_readable(&self) -> bool {
        self.reader.is_some()
    }

    pub fn write(&self, target: &mut dyn Any, value: Value) -> Result<(), PropertyError> {
        match &self.writer {
            Some(writer) => writer(target, value),
            None => Err(PropertyError::NotWritable {
                property: self.name.to_string(),
                target: "target".to_owned(),
            }),
        }
    }

    pub fn read(&self, target: &dyn Any) -> Result<Value, PropertyError> {
        match &self.reader {
            Some(reader) => reader(target),
            None => Err(PropertyError::NotReadable {
                property: self.name.to_string(),
                target: "target".to_owned(),
            }),
        }
    }
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("name", &self.name)
            .field("value_type", &self.value_type)
            .field("writable", &self.is_writable())
            .field("readable", &self.is_readable())
            .finish()
    }
}

/// Static property table of a bind target.
pub trait Introspect: Any {
    fn properties() -> Vec<PropertyDescriptor>;
}

/// Identity of a bind target type plus the entry point to its property table.
#[derive(Clone, Copy)]
pub struct TargetType {
    id: TypeId,
    name: &'static str,
    properties: fn() -> Vec<PropertyDescriptor>,
}

impl TargetType {
    pub fn of<T: Introspect>() -> Self {
        Self { id: TypeId::of::<T>(), name: type_name::<T>(), properties: T::properties }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Short type name without the module path.
    pub fn simple_name(&self) -> &'static str {
        self.name.rsplit("::").next().unwrap_or(self.name)
    }
}

impl PartialEq for TargetType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TargetType {}

impl Hash for TargetType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TargetType").field(&self.name).finish()
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Extracts property descriptors from a target type.
pub trait PropertyIntrospector: Send + Sync {
    fn introspect(&self, target: &TargetType) -> Vec<PropertyDescriptor>;
}

/// Reads the table a type declares through [`Introspect`].
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticIntrospector;

impl PropertyIntrospector for StaticIntrospector {
    fn introspect(&self, target: &TargetType) -> Vec<PropertyDescriptor> {
        (target.properties)()
    }
}

/// Object a tag handler can bind attributes onto.
pub trait Bindable: Any {
    fn target_type(&self) -> TargetType;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Introspect> Bindable for T {
    fn target_type(&self) -> TargetType {
        TargetType::of::<T>()
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
