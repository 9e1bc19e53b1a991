mod attribute;
mod attributes;

use std::fmt;
use std::sync::{Arc, Weak};

pub use attribute::TagAttribute;
pub use attributes::TagAttributes;

/// Position of a tag or attribute in its source document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    path: Arc<str>,
    line: u32,
    column: u32,
}

impl Location {
    pub fn new(path: impl Into<Arc<str>>, line: u32, column: u32) -> Self {
        Self { path: path.into(), line, column }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn column(&self) -> u32 {
        self.column
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @{},{}", self.path, self.line, self.column)
    }
}

/// One occurrence of a namespaced element in source markup.
#[derive(Debug)]
pub struct Tag {
    location: Location,
    namespace: String,
    local_name: String,
    qname: String,
    attributes: TagAttributes,
}

impl Tag {
    /// Creates the tag and attaches each attribute to it.
    ///
    /// Attributes already owned by another tag (e.g. when a decorator rewrites a tag)
    /// are copied, so every attribute's owner stays the tag it was first attached to.
    pub fn new(
        location: Location,
        namespace: impl Into<String>,
        local_name: impl Into<String>,
        qname: impl Into<String>,
        attributes: TagAttributes,
    ) -> Arc<Self> {
        let namespace = namespace.into();
        let local_name = local_name.into();
        let qname = qname.into();
        Arc::new_cyclic(|weak: &Weak<Tag>| {
            let attached = attributes
                .all()
                .iter()
                .map(|attribute| {
                    if attribute.attach(weak) {
                        Arc::clone(attribute)
                    } else {
                        let copy = Arc::new(attribute.detached());
                        copy.attach(weak);
                        copy
                    }
                })
                .collect();
            Tag {
                location,
                namespace,
                local_name,
                qname,
                attributes: TagAttributes::from_shared(attached),
            }
        })
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

    /// Prefix part of the qualified name, if any.
    pub fn prefix(&self) -> Option<&str> {
        self.qname.split_once(':').map(|(prefix, _)| prefix)
    }

    pub fn attributes(&self) -> &TagAttributes {
        &self.attributes
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.location, self.qname)
    }
}
